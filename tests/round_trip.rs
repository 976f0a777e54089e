//! Round-trip coverage of the value universe in both encodings, plus
//! cross-encoding stream translation.

use chrono::{DateTime, NaiveDate, NaiveTime};
use turwire::document::{read_document, write_document};
use turwire::{Bytes, WireType, WireValue};

fn universe() -> Vec<WireValue> {
    let date = NaiveDate::from_ymd_opt(2020, 5, 17).unwrap();
    let time = NaiveTime::from_hms_milli_opt(12, 30, 15, 250).unwrap();
    let zoned = DateTime::parse_from_rfc3339("2020-05-17T12:30:15.25+09:00").unwrap();
    vec![
        WireValue::Null,
        WireValue::Bool(true),
        WireValue::Bool(false),
        WireValue::I64(0),
        WireValue::I64(127),
        WireValue::I64(-1),
        WireValue::I64(i64::MIN),
        WireValue::I64(i64::MAX),
        WireValue::U64(u64::MAX),
        WireValue::F64(0.0),
        WireValue::F64(123.456),
        WireValue::F64(-1.25e10),
        WireValue::Text(String::new()),
        WireValue::Text("Hello World".into()),
        WireValue::Text("reserved: {chars}, [brackets] #hash".into()),
        WireValue::Text("line\nbreak\tand \"quotes\"".into()),
        WireValue::Text("0123 leading digit".into()),
        WireValue::Bytes(vec![]),
        WireValue::Bytes(vec![0, 1, 2, 250, 255]),
        WireValue::Time(time),
        WireValue::Date(date),
        WireValue::DateTime(date.and_time(time)),
        WireValue::ZonedDateTime(zoned),
        WireValue::Uuid([7u8; 16]),
        WireValue::TypeLiteral("net.Example".into()),
        WireValue::Sequence(vec![
            WireValue::I64(1),
            WireValue::Text("two".into()),
            WireValue::Sequence(vec![WireValue::Bool(true)]),
        ]),
        WireValue::Record(vec![
            ("id".into(), WireValue::I64(42)),
            (
                "nested".into(),
                WireValue::Record(vec![("deep".into(), WireValue::Text("yes".into()))]),
            ),
        ]),
        WireValue::Typed {
            tag: "Order".into(),
            value: Box::new(WireValue::Record(vec![(
                "px".into(),
                WireValue::F64(1.5),
            )])),
        },
    ]
}

#[test]
fn every_value_round_trips_in_both_encodings() {
    for wire_type in [WireType::Text, WireType::Binary] {
        for (i, value) in universe().into_iter().enumerate() {
            let mut wire = wire_type.wire(Bytes::elastic());
            wire.write("v").unwrap().object(&value).unwrap();
            wire.rewind_read();
            let back = wire.read("v").unwrap().object().unwrap();
            assert_eq!(back, value, "value #{i} corrupted by {wire_type:?}");
        }
    }
}

#[test]
fn framed_round_trip_of_many_values_in_one_buffer() {
    for wire_type in [WireType::Text, WireType::Binary] {
        let mut wire = wire_type.wire(Bytes::elastic());
        let values = universe();
        for v in &values {
            write_document(&mut wire, false, |w| w.write("v")?.object(v)).unwrap();
        }
        wire.rewind_read();
        for expected in &values {
            let mut seen = None;
            read_document(&mut wire, |w, _| {
                seen = Some(w.read("v")?.object()?);
                Ok(())
            })
            .unwrap()
            .unwrap();
            assert_eq!(seen.as_ref(), Some(expected), "under {wire_type:?}");
        }
        assert!(read_document(&mut wire, |_, _| Ok(())).unwrap().is_none());
    }
}

#[test]
fn stream_copy_preserves_scalar_semantics_across_encodings() {
    let pairs = [
        (WireType::Text, WireType::Binary),
        (WireType::Binary, WireType::Text),
        (WireType::Text, WireType::Json),
    ];
    for (from, to) in pairs {
        let mut src = from.wire(Bytes::elastic());
        src.write("flag").unwrap().bool(true).unwrap();
        src.write("num").unwrap().i64(-12345789).unwrap();
        src.write("price").unwrap().f64(123.456).unwrap();
        src.write("who").unwrap().text("Hello World").unwrap();
        src.rewind_read();

        let mut dst = to.wire(Bytes::elastic());
        src.copy_to(&mut dst).unwrap();
        dst.rewind_read();

        assert!(dst.read("flag").unwrap().bool().unwrap());
        assert_eq!(dst.read("num").unwrap().i64().unwrap(), -12345789);
        assert_eq!(dst.read("price").unwrap().f64().unwrap(), 123.456);
        assert_eq!(
            dst.read("who").unwrap().text().unwrap().as_deref(),
            Some("Hello World")
        );
    }
}

#[test]
fn translated_composites_survive_a_two_hop_copy() {
    let value = WireValue::Record(vec![
        ("sym".into(), WireValue::Text("ACME".into())),
        (
            "fills".into(),
            WireValue::Sequence(vec![WireValue::F64(1.5), WireValue::F64(2.5)]),
        ),
    ]);

    // text -> binary -> text
    let mut a = WireType::Text.wire(Bytes::elastic());
    a.write("trade").unwrap().object(&value).unwrap();
    a.rewind_read();
    let mut b = WireType::Binary.wire(Bytes::elastic());
    a.copy_to(&mut b).unwrap();
    b.rewind_read();
    let mut c = WireType::Text.wire(Bytes::elastic());
    b.copy_to(&mut c).unwrap();
    c.rewind_read();
    assert_eq!(c.read("trade").unwrap().object().unwrap(), value);
}

#[test]
fn sealed_header_length_matches_payload_extent() {
    for wire_type in [WireType::Text, WireType::Binary] {
        let mut wire = wire_type.wire(Bytes::elastic());
        write_document(&mut wire, false, |w| w.write("n")?.i64(1)).unwrap();
        write_document(&mut wire, true, |w| w.write("m")?.i64(2)).unwrap();

        let mut pos = 0usize;
        while pos + 4 <= wire.bytes().write_pos() {
            let header = wire.bytes().load_u32_at(pos).unwrap();
            assert!(turwire::framing::is_ready(header));
            let len = turwire::framing::length_of(header);
            pos += 4 + len;
        }
        assert_eq!(pos, wire.bytes().write_pos());
    }
}
