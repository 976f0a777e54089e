//! Reader side of the text encoding.
//!
//! The reader is a cursor-driven lexer over the document window. Bare
//! tokens stop at `,`, `}`, `]`, end of line, comments, and at `:` only
//! when followed by whitespace (so times like `12:30:00` stay whole).
//! Quoted tokens unescape C-style sequences (double quotes) or doubled
//! delimiters (single quotes). Ambiguous bare scalars resolve through the
//! chain integer, float, time, date, date-time, zoned-date-time, text.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use eyre::Result;

use super::{TextProfile, TextWire};
use crate::alias;
use crate::cells::{CellForm, Int32Ref, Int64ArrayRef, Int64Ref, TEXT_I32_WIDTH, TEXT_I64_WIDTH};
use crate::compress;
use crate::error::{wire_err, WireErrorKind};
use crate::value::{parse_uuid, WireValue};
use crate::wire::PeekKind;

/// A lexed scalar token; `quoted` distinguishes `"123"` from `123`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub text: String,
    pub quoted: bool,
}

pub(crate) fn parse_int_token(s: &str) -> Option<i128> {
    let t: String = s.chars().filter(|c| *c != '_').collect();
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i128::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = t.strip_prefix("-0x").or_else(|| t.strip_prefix("-0X")) {
        return i128::from_str_radix(hex, 16).ok().map(|v| -v);
    }
    t.parse::<i128>().ok()
}

fn parse_float_token(s: &str) -> Option<f64> {
    let t: String = s.chars().filter(|c| *c != '_').collect();
    t.parse::<f64>().ok()
}

pub(crate) fn parse_time_token(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").ok()
}

pub(crate) fn parse_date_token(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

pub(crate) fn parse_date_time_token(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

pub(crate) fn parse_zoned_token(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

/// Resolves a bare scalar token through the ambiguity chain.
pub fn parse_scalar_token(text: &str, quoted: bool) -> WireValue {
    if quoted {
        return WireValue::Text(text.to_string());
    }
    if text.eq_ignore_ascii_case("true") {
        return WireValue::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return WireValue::Bool(false);
    }
    if let Some(i) = parse_int_token(text) {
        if let Ok(v) = i64::try_from(i) {
            return WireValue::I64(v);
        }
        if let Ok(v) = u64::try_from(i) {
            return WireValue::U64(v);
        }
    }
    if let Some(f) = parse_float_token(text) {
        return WireValue::F64(f);
    }
    if let Some(t) = parse_time_token(text) {
        return WireValue::Time(t);
    }
    if let Some(d) = parse_date_token(text) {
        return WireValue::Date(d);
    }
    if let Some(dt) = parse_date_time_token(text) {
        return WireValue::DateTime(dt);
    }
    if let Some(z) = parse_zoned_token(text) {
        return WireValue::ZonedDateTime(z);
    }
    WireValue::Text(text.to_string())
}

fn unescape_double(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('b') => out.push('\u{8}'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Ok(v) = u8::from_str_radix(&hex, 16) {
                    out.push(v as char);
                }
            }
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(c);
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

impl TextWire {
    pub(crate) fn cur_limit(&self) -> usize {
        self.reader.limit().min(self.bytes.readable_limit())
    }

    pub(crate) fn peek_at(&self, pos: usize) -> Option<u8> {
        if pos < self.cur_limit() {
            self.bytes.slice(pos, 1).ok().map(|s| s[0])
        } else {
            None
        }
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(self.bytes.read_pos())
    }

    fn type_mismatch(&self, pos: usize, detail: impl Into<String>) -> eyre::Report {
        wire_err(
            WireErrorKind::TypeMismatch,
            pos,
            self.bytes.all_readable(),
            detail,
        )
    }

    fn truncated(&self, pos: usize, detail: impl Into<String>) -> eyre::Report {
        wire_err(
            WireErrorKind::Truncation,
            pos,
            self.bytes.all_readable(),
            detail,
        )
    }

    /// Skips whitespace, separators, comments, and document marker lines.
    pub(crate) fn skip_ws(&mut self) {
        loop {
            let pos = self.bytes.read_pos();
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b',') => {
                    self.bytes.set_read_pos(pos + 1);
                }
                Some(b'#') => {
                    let mut p = pos + 1;
                    while let Some(c) = self.peek_at(p) {
                        if c == b'\n' {
                            break;
                        }
                        p += 1;
                    }
                    self.bytes.set_read_pos(p);
                }
                Some(b'-')
                    if self.reader.depth() == 0
                        && self.at_line_start(pos)
                        && self.peek_at(pos + 1) == Some(b'-')
                        && self.peek_at(pos + 2) == Some(b'-') =>
                {
                    let mut p = pos + 3;
                    while let Some(c) = self.peek_at(p) {
                        if c == b'\n' {
                            break;
                        }
                        p += 1;
                    }
                    self.bytes.set_read_pos(p);
                }
                _ => return,
            }
        }
    }

    fn at_line_start(&self, pos: usize) -> bool {
        pos == 0 || self.bytes.slice(pos - 1, 1).map(|s| s[0] == b'\n').unwrap_or(false)
    }

    /// True when `:` at `pos` acts as a field separator.
    fn is_separator_colon(&self, pos: usize) -> bool {
        match self.peek_at(pos + 1) {
            None => true,
            Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => true,
            _ => false,
        }
    }

    fn bare_token_end(&self, start: usize) -> usize {
        let mut p = start;
        while let Some(c) = self.peek_at(p) {
            match c {
                b',' | b'}' | b']' | b'\n' | b'\r' | b'#' => break,
                b':' if self.is_separator_colon(p) => break,
                _ => p += 1,
            }
        }
        p
    }

    /// Lexes one scalar token at the cursor, consuming it.
    pub(crate) fn read_token(&mut self) -> Result<Token> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        match self.peek() {
            None => Err(self.truncated(start, "expected a scalar token")),
            Some(b'"') => {
                let mut p = start + 1;
                loop {
                    match self.peek_at(p) {
                        None => return Err(self.truncated(start, "unterminated double-quoted token")),
                        Some(b'\\') => p += 2,
                        Some(b'"') => break,
                        _ => p += 1,
                    }
                }
                let raw = self.bytes.slice(start + 1, p - start - 1)?.to_vec();
                self.bytes.set_read_pos(p + 1);
                Ok(Token {
                    text: unescape_double(&String::from_utf8_lossy(&raw)),
                    quoted: true,
                })
            }
            Some(b'\'') => {
                let mut p = start + 1;
                loop {
                    match self.peek_at(p) {
                        None => return Err(self.truncated(start, "unterminated single-quoted token")),
                        Some(b'\'') => {
                            if self.peek_at(p + 1) == Some(b'\'') {
                                p += 2;
                            } else {
                                break;
                            }
                        }
                        _ => p += 1,
                    }
                }
                let raw = self.bytes.slice(start + 1, p - start - 1)?.to_vec();
                self.bytes.set_read_pos(p + 1);
                Ok(Token {
                    text: String::from_utf8_lossy(&raw).replace("''", "'"),
                    quoted: true,
                })
            }
            Some(_) => {
                let end = self.bare_token_end(start);
                let raw = self.bytes.slice(start, end - start)?.to_vec();
                self.bytes.set_read_pos(end);
                let text = String::from_utf8_lossy(&raw).trim_end().to_string();
                Ok(Token { text, quoted: false })
            }
        }
    }

    /// Reads the next `name:` if one is ahead; `None` at a closing bracket,
    /// the window end, or in positional (CSV) mode.
    pub fn read_field_name(&mut self) -> Result<Option<String>> {
        if self.profile == TextProfile::Csv {
            return Ok(None);
        }
        self.skip_ws();
        let start = self.bytes.read_pos();
        match self.peek() {
            None | Some(b'}') | Some(b']') => return Ok(None),
            _ => {}
        }
        let token = self.read_token()?;
        self.skip_ws_no_sep();
        if self.peek() == Some(b':') {
            let colon = self.bytes.read_pos();
            self.bytes.set_read_pos(colon + 1);
            if self.peek() == Some(b' ') {
                self.bytes.set_read_pos(colon + 2);
            }
            Ok(Some(token.text))
        } else {
            // Not a field name; the cursor sits on a bare value.
            self.bytes.set_read_pos(start);
            Ok(None)
        }
    }

    /// Whitespace skip that keeps separators, for the gap before `:`.
    fn skip_ws_no_sep(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            let p = self.bytes.read_pos();
            self.bytes.set_read_pos(p + 1);
        }
    }

    /// Peeks the `!tag` ahead without consuming it. For `!!null` the
    /// returned tag is `!null`.
    pub(crate) fn peek_tag(&mut self) -> Option<String> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        if self.peek_at(start) != Some(b'!') {
            return None;
        }
        let mut p = start + 1;
        while let Some(c) = self.peek_at(p) {
            if c == b' ' || c == b'\n' || c == b'\r' || c == b'\t' {
                break;
            }
            p += 1;
        }
        let raw = self.bytes.slice(start + 1, p - start - 1).ok()?;
        Some(String::from_utf8_lossy(raw).to_string())
    }

    fn consume_tag(&mut self) -> Result<String> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        let tag = self
            .peek_tag()
            .ok_or_else(|| self.type_mismatch(start, "expected a type tag"))?;
        self.bytes.set_read_pos(start + 1 + tag.len());
        if self.peek() == Some(b' ') {
            let p = self.bytes.read_pos();
            self.bytes.set_read_pos(p + 1);
        }
        Ok(tag)
    }

    /// Consumes a `!Tag` prefix when the next value carries one.
    pub fn read_type_prefix(&mut self) -> Result<Option<String>> {
        match self.peek_tag() {
            Some(tag) if tag != "!null" && tag != "binary" && tag != "type" => {
                self.consume_tag()?;
                Ok(Some(alias::resolve(&tag)))
            }
            _ => Ok(None),
        }
    }

    pub fn read_type_literal(&mut self) -> Result<String> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        let tag = self.consume_tag()?;
        if tag != "type" {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(start, format!("expected !type, found !{tag}")));
        }
        let name = self.read_token()?;
        Ok(alias::resolve(&name.text))
    }

    /// Consumes the null sentinel if it is next; true when consumed.
    pub fn read_null(&mut self) -> Result<bool> {
        if self.profile == TextProfile::Json {
            self.skip_ws();
            let start = self.bytes.read_pos();
            let end = self.bare_token_end(start);
            if end - start == 4 && self.bytes.slice(start, 4)? == b"null" {
                self.bytes.set_read_pos(end);
                return Ok(true);
            }
            return Ok(false);
        }
        match self.peek_tag() {
            Some(tag) if tag == "!null" => {
                self.consume_tag()?;
                let _empty = self.read_token()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        let token = self.read_token()?;
        if token.text.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if token.text.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            self.bytes.set_read_pos(start);
            Err(self.type_mismatch(start, format!("expected true/false, found {:?}", token.text)))
        }
    }

    /// Widest integer pull; width validation happens in `ValueIn`.
    pub fn read_int(&mut self) -> Result<i128> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        let token = self.read_token()?;
        match parse_int_token(&token.text) {
            Some(v) => Ok(v),
            None => {
                self.bytes.set_read_pos(start);
                Err(self.type_mismatch(start, format!("expected an integer, found {:?}", token.text)))
            }
        }
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        let token = self.read_token()?;
        match parse_float_token(&token.text) {
            Some(v) => Ok(v),
            None => {
                self.bytes.set_read_pos(start);
                Err(self.type_mismatch(start, format!("expected a number, found {:?}", token.text)))
            }
        }
    }

    pub fn read_text(&mut self) -> Result<Option<String>> {
        if self.read_null()? {
            return Ok(None);
        }
        let token = self.read_token()?;
        Ok(Some(token.text))
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        if self.profile == TextProfile::Json {
            let token = self.read_token()?;
            return BASE64.decode(token.text.as_bytes()).map_err(|e| {
                self.bytes.set_read_pos(start);
                self.type_mismatch(start, format!("invalid base64: {e}"))
            });
        }
        let tag = self.consume_tag()?;
        // A byte-array typed field carries `!byte[]` before `!binary`.
        let tag = if tag != "binary" && self.peek_tag().as_deref() == Some("binary") {
            self.consume_tag()?
        } else {
            tag
        };
        if tag != "binary" {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(start, format!("expected !binary, found !{tag}")));
        }
        // An empty blob has no token after the tag.
        self.skip_ws_no_sep();
        let body = match self.peek() {
            None | Some(b'\n') | Some(b'\r') | Some(b',') | Some(b'}') | Some(b']')
            | Some(b'#') => String::new(),
            _ => self.read_token()?.text,
        };
        BASE64.decode(body.as_bytes()).map_err(|e| {
            self.bytes.set_read_pos(start);
            self.type_mismatch(start, format!("invalid base64: {e}"))
        })
    }

    fn read_parsed<T>(
        &mut self,
        what: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        let token = self.read_token()?;
        match parse(&token.text) {
            Some(v) => Ok(v),
            None => {
                self.bytes.set_read_pos(start);
                Err(self.type_mismatch(start, format!("expected {what}, found {:?}", token.text)))
            }
        }
    }

    pub fn read_time(&mut self) -> Result<NaiveTime> {
        self.read_parsed("a time", parse_time_token)
    }

    pub fn read_date(&mut self) -> Result<NaiveDate> {
        self.read_parsed("a date", parse_date_token)
    }

    pub fn read_date_time(&mut self) -> Result<NaiveDateTime> {
        self.read_parsed("a date-time", parse_date_time_token)
    }

    pub fn read_zoned_date_time(&mut self) -> Result<DateTime<FixedOffset>> {
        self.read_parsed("a zoned date-time", parse_zoned_token)
    }

    pub fn read_uuid(&mut self) -> Result<[u8; 16]> {
        self.read_parsed("a uuid", |s| parse_uuid(s))
    }

    /// Byte span of the next value from the cursor (whitespace skipped),
    /// without consuming it.
    pub fn measure_value(&mut self) -> Result<usize> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        let end = self.value_end(start)?;
        Ok(end - start)
    }

    fn value_end(&self, start: usize) -> Result<usize> {
        let mut p = start;
        // Leading type tags, including the null sentinel's `""`.
        while self.peek_at(p) == Some(b'!') {
            while let Some(c) = self.peek_at(p) {
                if c == b' ' {
                    break;
                }
                if c == b'\n' || c == b'\r' {
                    return Ok(p);
                }
                p += 1;
            }
            if self.peek_at(p) == Some(b' ') {
                p += 1;
            }
        }
        match self.peek_at(p) {
            None => Ok(p),
            Some(b'{') => self.matching_close(p, b'{', b'}'),
            Some(b'[') => self.matching_close(p, b'[', b']'),
            Some(b'"') => {
                let mut q = p + 1;
                loop {
                    match self.peek_at(q) {
                        None => return Err(self.truncated(p, "unterminated double-quoted token")),
                        Some(b'\\') => q += 2,
                        Some(b'"') => return Ok(q + 1),
                        _ => q += 1,
                    }
                }
            }
            Some(b'\'') => {
                let mut q = p + 1;
                loop {
                    match self.peek_at(q) {
                        None => return Err(self.truncated(p, "unterminated single-quoted token")),
                        Some(b'\'') => {
                            if self.peek_at(q + 1) == Some(b'\'') {
                                q += 2;
                            } else {
                                return Ok(q + 1);
                            }
                        }
                        _ => q += 1,
                    }
                }
            }
            Some(_) => Ok(self.bare_token_end(p)),
        }
    }

    /// Position just past the bracket matching the one at `open_pos`.
    fn matching_close(&self, open_pos: usize, open: u8, close: u8) -> Result<usize> {
        let mut depth = 0usize;
        let mut p = open_pos;
        while let Some(c) = self.peek_at(p) {
            match c {
                b'"' | b'\'' => {
                    let quote = c;
                    p += 1;
                    loop {
                        match self.peek_at(p) {
                            None => {
                                return Err(self.truncated(open_pos, "unterminated quote in composite"))
                            }
                            Some(b'\\') if quote == b'"' => p += 2,
                            Some(q) if q == quote => {
                                if quote == b'\'' && self.peek_at(p + 1) == Some(b'\'') {
                                    p += 2;
                                } else {
                                    p += 1;
                                    break;
                                }
                            }
                            _ => p += 1,
                        }
                    }
                }
                b'#' => {
                    while let Some(cc) = self.peek_at(p) {
                        if cc == b'\n' {
                            break;
                        }
                        p += 1;
                    }
                }
                _ => {
                    if c == open || (open == b'{' && c == b'[') || (open == b'[' && c == b'{') {
                        depth += 1;
                    } else if c == close || (open == b'{' && c == b']') || (open == b'[' && c == b'}')
                    {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(p + 1);
                        }
                    }
                    p += 1;
                }
            }
        }
        Err(wire_err(
            WireErrorKind::UnterminatedRecord,
            open_pos,
            self.bytes.all_readable(),
            "no matching close bracket before the window end",
        ))
    }

    pub fn skip_value(&mut self) -> Result<()> {
        let span = self.measure_value()?;
        let pos = self.bytes.read_pos();
        self.bytes.set_read_pos(pos + span);
        Ok(())
    }

    pub fn open_sequence_read(&mut self) -> Result<()> {
        if self.profile == TextProfile::Csv {
            let start = self.bytes.read_pos();
            let limit = self.line_end(start);
            self.reader.push(limit, limit);
            return Ok(());
        }
        self.skip_ws();
        let start = self.bytes.read_pos();
        if self.peek() != Some(b'[') {
            return Err(self.type_mismatch(start, "expected a sequence"));
        }
        let end = self.matching_close(start, b'[', b']')?;
        self.bytes.set_read_pos(start + 1);
        self.reader.push(end - 1, end);
        Ok(())
    }

    pub fn seq_has_next(&mut self) -> Result<bool> {
        self.skip_ws();
        Ok(self.peek().is_some())
    }

    pub fn close_sequence_read(&mut self) -> Result<()> {
        if let Some(frame) = self.reader.pop() {
            let resume = if self.profile == TextProfile::Csv {
                self.resume_past_newline(frame.resume)
            } else {
                frame.resume
            };
            self.bytes.set_read_pos(resume);
        }
        Ok(())
    }

    fn line_end(&self, from: usize) -> usize {
        let mut p = from;
        while let Some(c) = self.peek_at(p) {
            if c == b'\n' {
                break;
            }
            p += 1;
        }
        p
    }

    fn resume_past_newline(&self, pos: usize) -> usize {
        if self.peek_at(pos) == Some(b'\n') {
            pos + 1
        } else {
            pos
        }
    }

    /// Opens a record for reading, clipping the read limit to its measured
    /// length.
    pub fn open_record_read(&mut self) -> Result<()> {
        if self.profile == TextProfile::Csv {
            let start = self.bytes.read_pos();
            let limit = self.line_end(start);
            self.reader.push(limit, limit);
            return Ok(());
        }
        self.skip_ws();
        let start = self.bytes.read_pos();
        if self.peek() != Some(b'{') {
            return Err(self.type_mismatch(start, "expected a record"));
        }
        let end = self.matching_close(start, b'{', b'}')?;
        self.bytes.set_read_pos(start + 1);
        self.reader.push(end - 1, end);
        Ok(())
    }

    pub fn close_record_read(&mut self) -> Result<()> {
        if let Some(frame) = self.reader.pop() {
            let resume = if self.profile == TextProfile::Csv {
                self.resume_past_newline(frame.resume)
            } else {
                frame.resume
            };
            self.bytes.set_read_pos(resume);
        }
        Ok(())
    }

    pub fn read_i32_ref(&mut self) -> Result<Int32Ref> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        let raw = self.bytes.slice(start, TEXT_I32_WIDTH.min(self.cur_limit() - start))?;
        if raw.len() < TEXT_I32_WIDTH {
            return Err(self.truncated(start, "int32 cell extends past the window"));
        }
        self.bytes.set_read_pos(start + TEXT_I32_WIDTH);
        let cell = Int32Ref::new(start, CellForm::Text);
        cell.get(&self.bytes)?;
        Ok(cell)
    }

    pub fn read_i64_ref(&mut self) -> Result<Int64Ref> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        let raw = self.bytes.slice(start, TEXT_I64_WIDTH.min(self.cur_limit() - start))?;
        if raw.len() < TEXT_I64_WIDTH {
            return Err(self.truncated(start, "int64 cell extends past the window"));
        }
        self.bytes.set_read_pos(start + TEXT_I64_WIDTH);
        let cell = Int64Ref::new(start, CellForm::Text);
        cell.get(&self.bytes)?;
        Ok(cell)
    }

    pub fn read_i64_array_ref(&mut self) -> Result<Int64ArrayRef> {
        self.skip_ws();
        let open = self.bytes.read_pos();
        if self.peek() != Some(b'[') {
            return Err(self.type_mismatch(open, "expected an array cell"));
        }
        let end = self.matching_close(open, b'[', b']')?;
        let base = open + 2;
        let span = end - 1 - base;
        // Entries are TEXT_I64_WIDTH wide, ", "-separated, plus " ]".
        let entries = (span + 2) / (TEXT_I64_WIDTH + 2);
        if entries == 0 {
            return Err(self.type_mismatch(open, "array cell has no entries"));
        }
        self.bytes.set_read_pos(end);
        Ok(Int64ArrayRef::new(base, entries - 1, CellForm::Text))
    }

    pub fn read_compressed(&mut self) -> Result<Vec<u8>> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        let tag = self.consume_tag()?;
        if tag != "compressed" {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(start, format!("expected !compressed, found !{tag}")));
        }
        self.open_record_read()?;
        let mut codec_name = None;
        let mut length = None;
        let mut data = None;
        while let Some(name) = self.read_field_name()? {
            match name.as_str() {
                "codec" => codec_name = self.read_text()?,
                "length" => length = Some(self.read_int()? as usize),
                "data" => data = Some(self.read_bytes()?),
                _ => self.skip_value()?,
            }
        }
        self.close_record_read()?;
        let codec_name = codec_name
            .ok_or_else(|| self.type_mismatch(start, "compressed blob is missing its codec"))?;
        let length =
            length.ok_or_else(|| self.type_mismatch(start, "compressed blob is missing its length"))?;
        let data =
            data.ok_or_else(|| self.type_mismatch(start, "compressed blob is missing its data"))?;
        compress::codec(&codec_name)?.decompress(&data, length)
    }

    /// Classifies the next element without consuming it.
    pub fn peek_kind(&mut self) -> Result<PeekKind> {
        self.skip_ws();
        let start = self.bytes.read_pos();
        if self.profile == TextProfile::Json {
            let end = self.bare_token_end(start);
            if end - start == 4 && self.bytes.slice(start, 4).map(|s| s == b"null").unwrap_or(false)
            {
                return Ok(PeekKind::Null);
            }
        }
        match self.peek() {
            None => Ok(PeekKind::EndOfValue),
            Some(b'{') => Ok(PeekKind::Record),
            Some(b'[') => Ok(PeekKind::Sequence),
            Some(b'"') | Some(b'\'') => Ok(PeekKind::Text),
            Some(b'!') => {
                let tag = self.peek_tag().unwrap_or_default();
                Ok(match tag.as_str() {
                    "!null" => PeekKind::Null,
                    "binary" => PeekKind::Bytes,
                    "type" => PeekKind::TypeLiteral,
                    "compressed" => PeekKind::Compressed,
                    _ => PeekKind::TypePrefix(alias::resolve(&tag)),
                })
            }
            Some(b'}') | Some(b']') => Ok(PeekKind::EndOfValue),
            Some(_) => {
                let end = self.bare_token_end(start);
                let raw = self.bytes.slice(start, end - start)?;
                let text = String::from_utf8_lossy(raw).trim_end().to_string();
                Ok(match parse_scalar_token(&text, false) {
                    WireValue::Bool(_) => PeekKind::Bool,
                    WireValue::I64(_) | WireValue::U64(_) => PeekKind::Int,
                    WireValue::F64(_) => PeekKind::Float,
                    WireValue::Time(_) => PeekKind::Time,
                    WireValue::Date(_) => PeekKind::Date,
                    WireValue::DateTime(_) => PeekKind::DateTime,
                    WireValue::ZonedDateTime(_) => PeekKind::ZonedDateTime,
                    _ => PeekKind::Text,
                })
            }
        }
    }
}
