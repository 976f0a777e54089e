//! The wire-type registry beyond the two core encodings: JSON and CSV
//! profiles, field-less and numeric-id binary modes, read-any sniffing,
//! aliasing, comments, and compressed sub-blobs.

use turwire::document::{read_document, write_document};
use turwire::wire::WireConfig;
use turwire::{alias, Bytes, Wire, WireType};

fn rendered(wire: &Wire) -> String {
    String::from_utf8(wire.bytes().all_readable().to_vec()).unwrap()
}

#[test]
fn json_profile_is_single_line_and_fully_quoted() {
    let mut wire = WireType::Json.wire(Bytes::elastic());
    wire.write("order")
        .unwrap()
        .record(|w| {
            w.write("sym")?.text("ACME")?;
            w.write("qty")?.i64(250)?;
            w.write("gone")?.null()
        })
        .unwrap();

    assert_eq!(
        rendered(&wire),
        "\"order\": { \"sym\": \"ACME\", \"qty\": 250, \"gone\": null }"
    );

    wire.rewind_read();
    wire.read("order")
        .unwrap()
        .record(|w| {
            assert_eq!(w.read("sym")?.text()?.as_deref(), Some("ACME"));
            assert_eq!(w.read("qty")?.i64()?, 250);
            assert_eq!(w.read("gone")?.text()?, None);
            Ok(())
        })
        .unwrap();
}

#[test]
fn csv_profile_reads_rows_positionally() {
    let mut wire = WireType::Csv.wire(Bytes::elastic());
    for (qty, sym) in [(1i64, "ACME"), (2, "GLOBEX")] {
        wire.value_out()
            .record(|w| {
                w.write("qty")?.i64(qty)?;
                w.write("sym")?.text(sym)
            })
            .unwrap();
    }
    assert_eq!(rendered(&wire), "1, ACME\n2, GLOBEX\n");

    wire.rewind_read();
    for (qty, sym) in [(1i64, "ACME"), (2, "GLOBEX")] {
        wire.value_in()
            .record(|w| {
                assert_eq!(w.value_in().i64()?, qty);
                assert_eq!(w.value_in().text()?.as_deref(), Some(sym));
                Ok(())
            })
            .unwrap();
    }
}

#[test]
fn field_less_binary_reads_positionally() {
    let config = WireConfig {
        field_less: true,
        ..WireConfig::default()
    };
    let mut wire = WireType::Binary.wire_with(Bytes::elastic(), config);
    wire.write("ignored").unwrap().i64(42).unwrap();
    wire.write("also_ignored").unwrap().text("next").unwrap();

    wire.rewind_read();
    assert_eq!(wire.read("whatever").unwrap().i64().unwrap(), 42);
    assert_eq!(
        wire.read("name_free").unwrap().text().unwrap().as_deref(),
        Some("next")
    );
}

#[test]
fn binary_fieldless_wire_type_matches_manual_config() {
    let mut wire = WireType::BinaryFieldless.wire(Bytes::elastic());
    wire.write("x").unwrap().i64(1).unwrap();
    assert_eq!(wire.bytes().all_readable(), &[1]);
}

#[test]
fn numeric_id_mode_round_trips_one_byte_names() {
    let config = WireConfig {
        numeric_id: true,
        ..WireConfig::default()
    };
    let mut wire = WireType::Binary.wire_with(Bytes::elastic(), config);
    wire.write("7").unwrap().i64(77).unwrap();
    wire.write("9").unwrap().i64(99).unwrap();
    // One byte for each name, one for each small-int value.
    assert_eq!(wire.bytes().all_readable(), &[7, 77, 9, 99]);

    wire.rewind_read();
    assert_eq!(wire.read("9").unwrap().i64().unwrap(), 99);
    assert_eq!(wire.read("7").unwrap().i64().unwrap(), 77);
}

#[test]
fn read_any_picks_the_right_decoder_for_framed_streams() {
    for wire_type in [WireType::Text, WireType::Binary] {
        let mut wire = wire_type.wire(Bytes::elastic());
        write_document(&mut wire, false, |w| w.write("n")?.i64(5)).unwrap();
        let bytes = wire.into_bytes();

        let mut any = WireType::ReadAny.wire(bytes);
        read_document(&mut any, |w, _| {
            assert_eq!(w.read("n")?.i64()?, 5);
            Ok(())
        })
        .unwrap()
        .unwrap();
    }
}

#[test]
fn aliases_shorten_tags_and_resolve_on_read() {
    alias::add_alias("com.example.orders.OrderEvent", "OrderEvt");
    for wire_type in [WireType::Text, WireType::Binary] {
        let mut wire = wire_type.wire(Bytes::elastic());
        wire.write("e")
            .unwrap()
            .type_prefix("com.example.orders.OrderEvent")
            .unwrap()
            .record(|w| w.write("id")?.i64(1))
            .unwrap();

        if wire.is_text() {
            assert!(rendered(&wire).contains("!OrderEvt"));
        }

        wire.rewind_read();
        let v = wire.read("e").unwrap().object().unwrap();
        let (tag, _) = v.untag();
        assert_eq!(tag, Some("com.example.orders.OrderEvent"));
    }
}

#[test]
fn comments_are_written_and_skipped_transparently() {
    let mut wire = WireType::Text.wire(Bytes::elastic());
    wire.write_comment("price feed snapshot").unwrap();
    wire.write("px").unwrap().f64(1.5).unwrap();
    let text = rendered(&wire);
    assert!(text.starts_with("# price feed snapshot\n"));

    wire.rewind_read();
    assert_eq!(wire.read("px").unwrap().f64().unwrap(), 1.5);

    let mut bin = WireType::Binary.wire(Bytes::elastic());
    bin.write_comment("price feed snapshot").unwrap();
    bin.write("px").unwrap().f64(1.5).unwrap();
    bin.rewind_read();
    assert_eq!(bin.read("px").unwrap().f64().unwrap(), 1.5);
}

#[test]
fn explicit_compressed_blobs_round_trip_by_codec_name() {
    let raw = b"market data market data market data".repeat(10);
    for codec in ["lzw", "gzip"] {
        for wire_type in [WireType::Text, WireType::Binary] {
            let mut wire = wire_type.wire(Bytes::elastic());
            wire.write("blob").unwrap().compressed(codec, &raw).unwrap();
            wire.rewind_read();
            assert_eq!(
                wire.read("blob").unwrap().compressed().unwrap(),
                raw,
                "codec {codec} under {wire_type:?}"
            );
        }
    }
}

#[test]
fn gzip_codec_threshold_is_configurable() {
    let config = WireConfig {
        compression_threshold: 16,
        compression_codec: turwire::wire::CompressionCodec::Gzip,
        ..WireConfig::default()
    };
    let mut wire = WireType::CompressedBinary.wire_with(Bytes::elastic(), config);
    let body = "abcdefgh".repeat(8);
    write_document(&mut wire, false, |w| w.write("body")?.text(&body)).unwrap();

    wire.rewind_read();
    read_document(&mut wire, |w, _| {
        assert_eq!(w.read("body")?.text()?.as_deref(), Some(body.as_str()));
        Ok(())
    })
    .unwrap()
    .unwrap();
}
