//! Descriptor-driven marshalling: generated records and enums, nested and
//! embedded composition, derived equality and deep copy, leaf layout.

use turwire::marshal::strategy;
use turwire::{
    deep_copy, record_eq, wire_enum, wire_record, Bytes, WireRecord, WireType, WireValue,
};

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Side { BUY, SELL }
}

wire_record! {
    #[derive(Debug, Clone)]
    pub struct Price {
        value: f64,
        currency: String,
    }
}

wire_record! {
    #[derive(Debug, Clone)]
    pub struct Order {
        symbol: String,
        qty: i64,
        @enum side: Side,
        @record price: Price,
        @record_opt parent: Option<Price>,
        tags: Vec<String>,
        @bytes payload: Vec<u8>,
    }
}

fn sample() -> Order {
    Order {
        symbol: "ACME".into(),
        qty: 250,
        side: Side::SELL,
        price: Price {
            value: 123.456,
            currency: "USD".into(),
        },
        parent: None,
        tags: vec!["prio".into(), "book-a".into()],
        payload: vec![1, 2, 3],
    }
}

#[test]
fn record_round_trips_in_both_encodings() {
    for wire_type in [WireType::Text, WireType::Binary] {
        let mut wire = wire_type.wire(Bytes::elastic());
        let order = sample();
        wire.write("order").unwrap().marshallable(&order).unwrap();

        wire.rewind_read();
        let mut back = Order::default();
        wire.read("order").unwrap().marshallable(&mut back, true).unwrap();
        assert!(record_eq(&order, &back), "mismatch under {wire_type:?}");
    }
}

#[test]
fn optional_nested_record_round_trips_when_set() {
    let mut order = sample();
    order.parent = Some(Price {
        value: 100.0,
        currency: "EUR".into(),
    });
    for wire_type in [WireType::Text, WireType::Binary] {
        let mut wire = wire_type.wire(Bytes::elastic());
        wire.write("o").unwrap().marshallable(&order).unwrap();
        wire.rewind_read();
        let mut back = Order::default();
        wire.read("o").unwrap().marshallable(&mut back, true).unwrap();
        assert!(record_eq(&order, &back));
        assert!(back.parent.is_some());
    }
}

#[test]
fn scalar_only_records_render_as_leaf_lines() {
    let mut wire = WireType::Text.wire(Bytes::elastic());
    let p = Price {
        value: 1.5,
        currency: "USD".into(),
    };
    wire.write("p").unwrap().marshallable(&p).unwrap();
    let text = String::from_utf8(wire.bytes().all_readable().to_vec()).unwrap();
    assert_eq!(text, "p: { value: 1.5, currency: USD }");
}

wire_record! {
    #[derive(Debug, Clone)]
    pub struct Audited {
        created_by: String,
        revision: i32,
    }
}

wire_record! {
    #[derive(Debug, Clone)]
    pub struct AuditedOrder {
        @base audit: Audited,
        symbol: String,
    }
}

#[test]
fn embedded_base_fields_serialize_first() {
    let rec = AuditedOrder {
        audit: Audited {
            created_by: "gil".into(),
            revision: 3,
        },
        symbol: "ACME".into(),
    };

    let names: Vec<&str> = AuditedOrder::descriptor()
        .fields()
        .iter()
        .map(|f| f.name())
        .collect();
    assert_eq!(names, vec!["created_by", "revision", "symbol"]);

    let mut wire = WireType::Text.wire(Bytes::elastic());
    wire.write("r").unwrap().marshallable(&rec).unwrap();
    let text = String::from_utf8(wire.bytes().all_readable().to_vec()).unwrap();
    assert_eq!(text, "r: { created_by: gil, revision: 3, symbol: ACME }");

    wire.rewind_read();
    let mut back = AuditedOrder::default();
    wire.read("r").unwrap().marshallable(&mut back, true).unwrap();
    assert!(record_eq(&rec, &back));
    assert_eq!(back.audit.revision, 3);
}

#[test]
fn descriptor_equality_compares_per_field() {
    let a = sample();
    let mut b = sample();
    assert!(record_eq(&a, &b));
    b.qty += 1;
    assert!(!record_eq(&a, &b));
}

#[test]
fn deep_copy_routes_through_a_binary_wire() {
    let order = sample();
    let copy = deep_copy(&order).unwrap();
    assert!(record_eq(&order, &copy));
    // Owned data is independent, not shared.
    assert_ne!(order.symbol.as_ptr(), copy.symbol.as_ptr());
}

#[test]
fn enum_fields_serialize_as_variant_names() {
    let mut wire = WireType::Text.wire(Bytes::elastic());
    wire.write("o").unwrap().marshallable(&sample()).unwrap();
    let text = String::from_utf8(wire.bytes().all_readable().to_vec()).unwrap();
    assert!(text.contains("side: SELL"));

    // An unknown variant surfaces instead of silently defaulting.
    let mut bad = WireType::Text.wire(Bytes::from_slice(
        b"o: { symbol: X, qty: 1, side: HOLD, price: { value: 1.0, currency: U }, parent: !!null \"\", tags: [], payload: !byte[] !binary }",
    ));
    let mut target = Order::default();
    assert!(bad.read("o").unwrap().marshallable(&mut target, true).is_err());
}

#[test]
fn registered_record_strategy_guides_dynamic_reads() {
    strategy::register_record::<Price>();
    let mut wire = WireType::Binary.wire(Bytes::elastic());
    wire.write("p")
        .unwrap()
        .type_prefix(Price::type_tag())
        .unwrap()
        .marshallable(&Price {
            value: 2.5,
            currency: "GBP".into(),
        })
        .unwrap();
    wire.rewind_read();

    let v = wire.read("p").unwrap().object().unwrap();
    let (tag, body) = v.untag();
    assert_eq!(tag, Some("Price"));
    assert_eq!(body.record_field("value"), Some(&WireValue::F64(2.5)));
    assert_eq!(
        body.record_field("currency"),
        Some(&WireValue::Text("GBP".into()))
    );
}

#[test]
fn string_keyed_map_fields_round_trip() {
    wire_record! {
        #[derive(Debug, Clone)]
        pub struct Config {
            @map limits: Vec<(String, i64)>,
        }
    }

    let cfg = Config {
        limits: vec![("orders".into(), 100), ("cancels".into(), 10)],
    };
    for wire_type in [WireType::Text, WireType::Binary] {
        let mut wire = wire_type.wire(Bytes::elastic());
        wire.write("cfg").unwrap().marshallable(&cfg).unwrap();
        wire.rewind_read();
        let mut back = Config::default();
        wire.read("cfg").unwrap().marshallable(&mut back, true).unwrap();
        assert!(record_eq(&cfg, &back));
    }
}
