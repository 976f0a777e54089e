//! Writer side of the text encoding: separators, quoting, and the scalar
//! and composite emitters.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use eyre::Result;

use super::{Sep, TextProfile, TextWire, INDENT};
use crate::alias;
use crate::cells::{CellForm, Int32Ref, Int64ArrayRef, Int64Ref, TEXT_I32_WIDTH, TEXT_I64_WIDTH};
use crate::compress;
use crate::value::uuid_to_string;

/// Quoting decision for one scalar token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Quotes {
    None,
    Double,
    Single,
}

/// Characters that force quoting when they appear at position 0.
fn starts_quote(ch: char) -> bool {
    matches!(
        ch,
        '?' | '0'..='9' | '+' | '-' | ' ' | '\t' | '\'' | ',' | '#' | ':' | '{' | '}' | '['
            | ']' | '|' | '>' | '!' | '\0' | '\u{8}' | '\\'
    )
}

/// Characters that force quoting anywhere after position 0.
fn must_quote(ch: char) -> bool {
    matches!(
        ch,
        '?' | ',' | '#' | ':' | '{' | '}' | '[' | ']' | '|' | '>' | '\0' | '\u{8}' | '\\'
    ) || (ch.is_control() && ch != '\t')
}

pub(crate) fn needs_quotes(s: &str) -> Quotes {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return Quotes::Double;
    };
    if starts_quote(first) {
        return Quotes::Double;
    }
    if first == '"' {
        return Quotes::Single;
    }
    if s.ends_with(|c: char| c.is_whitespace()) {
        return Quotes::Double;
    }
    let mut quotes = Quotes::None;
    for ch in chars {
        if must_quote(ch) {
            return Quotes::Double;
        }
        if ch == '"' {
            quotes = Quotes::Single;
        }
    }
    quotes
}

/// Escapes `s` for a double-quoted token.
pub(crate) fn escape_double(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn escape_single(s: &str) -> String {
    s.replace('\'', "''")
}

/// Keeps a float's token in the float lane of the read chain; a value
/// that formats without `.` or an exponent would re-read as an integer.
fn float_token(mut s: String) -> String {
    if s.chars().all(|c| c.is_ascii_digit() || c == '-') {
        s.push_str(".0");
    }
    s
}

pub(crate) fn quote_token(s: &str) -> String {
    match needs_quotes(s) {
        Quotes::None => s.to_string(),
        Quotes::Double => format!("\"{}\"", escape_double(s)),
        Quotes::Single => format!("'{}'", escape_single(s)),
    }
}

impl TextWire {
    pub(crate) fn push_indent(&mut self) -> Result<()> {
        for _ in 0..self.out.indent {
            self.bytes.push_str(INDENT)?;
        }
        Ok(())
    }

    /// Writes the pending separator, then clears it.
    pub(crate) fn prepend_sep(&mut self) -> Result<()> {
        match self.out.sep {
            Sep::None => {}
            Sep::CommaSpace => self.bytes.push_str(", ")?,
            Sep::CommaNewline => {
                self.bytes.push_str(",\n")?;
                self.push_indent()?;
            }
            Sep::Newline => {
                self.bytes.push_str("\n")?;
                self.push_indent()?;
            }
        }
        self.out.sep = Sep::None;
        self.out.after_open = None;
        Ok(())
    }

    pub(crate) fn end_of_value(&mut self) {
        self.out.sep = if self.profile == TextProfile::Csv {
            Sep::CommaSpace
        } else if self.leaf_on() {
            Sep::CommaSpace
        } else if self.out.indent == 0 {
            Sep::Newline
        } else {
            Sep::CommaNewline
        };
    }

    fn push_token(&mut self, token: &str) -> Result<()> {
        self.prepend_sep()?;
        self.bytes.push_str(token)?;
        self.end_of_value();
        Ok(())
    }

    pub fn write_field(&mut self, name: &str) -> Result<()> {
        if self.profile == TextProfile::Csv {
            return Ok(());
        }
        self.prepend_sep()?;
        let quoted = if self.profile == TextProfile::Json {
            format!("\"{}\"", escape_double(name))
        } else {
            quote_token(name)
        };
        self.bytes.push_str(&quoted)?;
        self.bytes.push_str(": ")?;
        self.out.sep = Sep::None;
        Ok(())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.push_token(if v { "true" } else { "false" })
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        self.push_token(&v.to_string())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.push_token(&v.to_string())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.push_token(&float_token(v.to_string()))
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        self.push_token(&float_token(v.to_string()))
    }

    pub fn write_text(&mut self, s: &str) -> Result<()> {
        let token = if self.profile == TextProfile::Json {
            format!("\"{}\"", escape_double(s))
        } else {
            quote_token(s)
        };
        self.push_token(&token)
    }

    pub fn write_bytes(&mut self, b: &[u8]) -> Result<()> {
        if self.profile == TextProfile::Json {
            return self.push_token(&format!("\"{}\"", BASE64.encode(b)));
        }
        self.push_token(&format!("!binary {}", BASE64.encode(b)))
    }

    pub fn write_time(&mut self, t: NaiveTime) -> Result<()> {
        self.push_token(&t.format("%H:%M:%S%.f").to_string())
    }

    pub fn write_date(&mut self, d: NaiveDate) -> Result<()> {
        self.push_token(&d.format("%Y-%m-%d").to_string())
    }

    pub fn write_date_time(&mut self, dt: NaiveDateTime) -> Result<()> {
        self.push_token(&dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }

    pub fn write_zoned_date_time(&mut self, zdt: DateTime<FixedOffset>) -> Result<()> {
        self.push_token(&zdt.to_rfc3339())
    }

    pub fn write_uuid(&mut self, u: [u8; 16]) -> Result<()> {
        self.push_token(&uuid_to_string(&u))
    }

    pub fn write_null(&mut self) -> Result<()> {
        if self.profile == TextProfile::Json {
            return self.push_token("null");
        }
        self.push_token("!!null \"\"")
    }

    /// Attaches a type tag to the next value; JSON drops tags.
    ///
    /// Tags are opaque identifiers lexed up to the next whitespace, so
    /// they are written raw, never quoted.
    pub fn write_type_prefix(&mut self, tag: &str) -> Result<()> {
        if self.profile == TextProfile::Json {
            return Ok(());
        }
        self.prepend_sep()?;
        self.bytes.push_str("!")?;
        let short = alias::wire_tag(tag);
        self.bytes.push_str(&short)?;
        self.bytes.push_str(" ")?;
        self.out.sep = Sep::None;
        Ok(())
    }

    pub fn write_type_literal(&mut self, name: &str) -> Result<()> {
        let short = alias::wire_tag(name);
        self.push_token(&format!("!type {short}"))
    }

    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        if self.profile != TextProfile::Yaml {
            return Ok(());
        }
        self.prepend_sep()?;
        self.bytes.push_str("# ")?;
        self.bytes.push_str(text)?;
        self.out.sep = Sep::Newline;
        Ok(())
    }

    pub fn open_record(&mut self) -> Result<()> {
        self.open_composite("{", "{ ")
    }

    pub fn close_record(&mut self) -> Result<()> {
        self.close_composite("}", " }")
    }

    pub fn open_sequence(&mut self) -> Result<()> {
        self.open_composite("[", "[ ")
    }

    pub fn close_sequence(&mut self) -> Result<()> {
        self.close_composite("]", " ]")
    }

    fn open_composite(&mut self, open: &str, open_leaf: &str) -> Result<()> {
        if self.profile == TextProfile::Csv {
            self.out.leaf_depth += 1;
            return Ok(());
        }
        self.prepend_sep()?;
        let leaf = self.leaf_on() || self.out.leaf_pending;
        self.out.leaf_pending = false;
        if leaf {
            self.out.leaf_depth += 1;
            self.bytes.push_str(open_leaf)?;
        } else {
            self.bytes.push_str(open)?;
            self.out.indent += 1;
            self.out.sep = Sep::Newline;
        }
        self.out.after_open = Some(self.bytes.write_pos());
        Ok(())
    }

    fn close_composite(&mut self, close: &str, close_leaf: &str) -> Result<()> {
        if self.profile == TextProfile::Csv {
            self.out.leaf_depth = self.out.leaf_depth.saturating_sub(1);
            if self.out.leaf_depth == 0 {
                // End of row.
                self.bytes.push_str("\n")?;
                self.out.sep = Sep::None;
            }
            return Ok(());
        }
        let empty = self.out.after_open == Some(self.bytes.write_pos());
        self.out.after_open = None;
        if self.out.leaf_depth > 0 {
            self.out.leaf_depth -= 1;
            if empty {
                // Rewind the opener's trailing space for a compact `{}`.
                let pos = self.bytes.write_pos() - 1;
                self.bytes.set_write_pos(pos);
                self.bytes.push_str(close)?;
            } else {
                self.bytes.push_str(close_leaf)?;
            }
        } else {
            self.out.indent -= 1;
            if empty {
                self.bytes.push_str(close)?;
            } else {
                self.bytes.push_str("\n")?;
                self.push_indent()?;
                self.bytes.push_str(close)?;
            }
        }
        self.out.sep = Sep::None;
        self.end_of_value();
        Ok(())
    }

    pub fn write_i32_ref(&mut self, init: i32) -> Result<Int32Ref> {
        self.prepend_sep()?;
        let offset = self.bytes.write_pos();
        self.bytes
            .push_str(&format!("{init:>width$}", width = TEXT_I32_WIDTH))?;
        self.end_of_value();
        Ok(Int32Ref::new(offset, CellForm::Text))
    }

    pub fn write_i64_ref(&mut self, init: i64) -> Result<Int64Ref> {
        self.prepend_sep()?;
        let offset = self.bytes.write_pos();
        self.bytes
            .push_str(&format!("{init:>width$}", width = TEXT_I64_WIDTH))?;
        self.end_of_value();
        Ok(Int64Ref::new(offset, CellForm::Text))
    }

    /// Fixed-width array cell: `[ used, v0, v1, ... ]`, every entry 20
    /// digits wide so in-place updates never change the document length.
    pub fn write_i64_array_ref(&mut self, capacity: usize) -> Result<Int64ArrayRef> {
        self.prepend_sep()?;
        self.bytes.push_str("[ ")?;
        let base = self.bytes.write_pos();
        for k in 0..=capacity {
            if k > 0 {
                self.bytes.push_str(", ")?;
            }
            self.bytes.push_str(&format!("{:>width$}", 0, width = TEXT_I64_WIDTH))?;
        }
        self.bytes.push_str(" ]")?;
        self.end_of_value();
        Ok(Int64ArrayRef::new(base, capacity, CellForm::Text))
    }

    /// Wraps `raw` in a compressed sub-blob tagged by codec name.
    pub fn write_compressed(&mut self, codec_name: &str, raw: &[u8]) -> Result<()> {
        let codec = compress::codec(codec_name)?;
        let packed = codec.compress(raw)?;
        self.write_type_prefix("compressed")?;
        self.open_record()?;
        self.write_field("codec")?;
        self.write_text(codec_name)?;
        self.write_field("length")?;
        self.write_u64(raw.len() as u64)?;
        self.write_field("data")?;
        self.write_bytes(&packed)?;
        self.close_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Bytes;
    use crate::wire::config::WireConfig;

    fn yaml_wire() -> TextWire {
        TextWire::new(Bytes::elastic(), TextProfile::Yaml, WireConfig::default())
    }

    fn written(wire: &TextWire) -> String {
        String::from_utf8(wire.bytes().all_readable().to_vec()).unwrap()
    }

    #[test]
    fn quoting_classes() {
        assert_eq!(needs_quotes("hello"), Quotes::None);
        assert_eq!(needs_quotes("Hello World"), Quotes::None);
        assert_eq!(needs_quotes(""), Quotes::Double);
        assert_eq!(needs_quotes("123abc"), Quotes::Double);
        assert_eq!(needs_quotes("-x"), Quotes::Double);
        assert_eq!(needs_quotes("a:b"), Quotes::Double);
        assert_eq!(needs_quotes("a,b"), Quotes::Double);
        assert_eq!(needs_quotes("trailing "), Quotes::Double);
        assert_eq!(needs_quotes("has \"quote\""), Quotes::Single);
        assert_eq!(needs_quotes("x y"), Quotes::None);
    }

    #[test]
    fn escape_round_worthy_characters() {
        assert_eq!(escape_double("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
        assert_eq!(quote_token("it's"), "it's");
        assert_eq!(quote_token("'leading"), "\"'leading\"");
    }

    #[test]
    fn multi_line_record_layout() {
        let mut w = yaml_wire();
        w.write_field("A").unwrap();
        w.open_record().unwrap();
        w.write_field("B_FLAG").unwrap();
        w.write_bool(true).unwrap();
        w.write_field("S_NUM").unwrap();
        w.write_i64(12345).unwrap();
        w.write_field("D_NUM").unwrap();
        w.write_f64(123.456).unwrap();
        w.write_field("L_NUM").unwrap();
        w.write_i64(0).unwrap();
        w.write_field("I_NUM").unwrap();
        w.write_i64(-12345789).unwrap();
        w.write_field("TEXT").unwrap();
        w.write_text("Hello World").unwrap();
        w.close_record().unwrap();

        assert_eq!(
            written(&w),
            "A: {\n  B_FLAG: true,\n  S_NUM: 12345,\n  D_NUM: 123.456,\n  L_NUM: 0,\n  I_NUM: -12345789,\n  TEXT: Hello World\n}"
        );
    }

    #[test]
    fn leaf_record_is_single_line() {
        let mut w = yaml_wire();
        w.write_field("p").unwrap();
        w.set_leaf(true);
        w.open_record().unwrap();
        w.write_field("x").unwrap();
        w.write_i64(1).unwrap();
        w.write_field("y").unwrap();
        w.write_i64(2).unwrap();
        w.close_record().unwrap();
        assert_eq!(written(&w), "p: { x: 1, y: 2 }");
    }

    #[test]
    fn empty_record_closes_compactly() {
        let mut w = yaml_wire();
        w.write_field("e").unwrap();
        w.open_record().unwrap();
        w.close_record().unwrap();
        assert_eq!(written(&w), "e: {}");
    }

    #[test]
    fn nested_records_indent_two_spaces_per_level() {
        let mut w = yaml_wire();
        w.write_field("outer").unwrap();
        w.open_record().unwrap();
        w.write_field("inner").unwrap();
        w.open_record().unwrap();
        w.write_field("x").unwrap();
        w.write_i64(1).unwrap();
        w.close_record().unwrap();
        w.close_record().unwrap();
        assert_eq!(written(&w), "outer: {\n  inner: {\n    x: 1\n  }\n}");
    }

    #[test]
    fn typed_and_null_tokens() {
        let mut w = yaml_wire();
        w.write_field("side").unwrap();
        w.write_type_prefix("Side").unwrap();
        w.write_text("BUY").unwrap();
        assert_eq!(written(&w), "side: !Side BUY");

        let mut w = yaml_wire();
        w.write_field("gone").unwrap();
        w.write_null().unwrap();
        assert_eq!(written(&w), "gone: !!null \"\"");
    }

    #[test]
    fn bytes_emit_base64() {
        let mut w = yaml_wire();
        w.write_field("blob").unwrap();
        w.write_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(written(&w), "blob: !binary AQID");
    }

    #[test]
    fn text_ref_cells_have_fixed_width() {
        let mut w = yaml_wire();
        w.write_field("count").unwrap();
        let cell = w.write_i32_ref(42).unwrap();
        let s = written(&w);
        assert_eq!(s, format!("count: {:>10}", 42));
        assert_eq!(cell.get(w.bytes()).unwrap(), 42);
    }

    #[test]
    fn json_profile_quotes_names_and_strings() {
        let mut w = TextWire::new(Bytes::elastic(), TextProfile::Json, WireConfig::default());
        w.write_field("a").unwrap();
        w.open_record().unwrap();
        w.write_field("s").unwrap();
        w.write_text("hi").unwrap();
        w.write_field("n").unwrap();
        w.write_null().unwrap();
        w.close_record().unwrap();
        assert_eq!(written(&w), "\"a\": { \"s\": \"hi\", \"n\": null }");
    }

    #[test]
    fn csv_profile_is_row_oriented() {
        let mut w = TextWire::new(Bytes::elastic(), TextProfile::Csv, WireConfig::default());
        w.open_record().unwrap();
        w.write_field("ignored").unwrap();
        w.write_i64(1).unwrap();
        w.write_field("ignored").unwrap();
        w.write_text("two").unwrap();
        w.close_record().unwrap();
        w.open_record().unwrap();
        w.write_i64(3).unwrap();
        w.write_text("four").unwrap();
        w.close_record().unwrap();
        assert_eq!(written(&w), "1, two\n3, four\n");
    }
}
