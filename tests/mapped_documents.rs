//! Documents over shared memory-mapped buffers: concurrent header
//! acquisition and numbering, in-place reference cells in sealed
//! documents, and file-backed persistence.

use std::sync::Arc;

use turwire::document::{read_document, write_document, write_end_of_stream};
use turwire::framing::DocumentCursor;
use turwire::{Bytes, MappedBytes, WireType};

#[test]
fn s7_concurrent_writers_get_unique_monotonic_numbers() {
    let store = Arc::new(MappedBytes::anon(1 << 16).unwrap());
    let mut handles = Vec::new();
    for writer_id in 0..2i64 {
        let store = store.clone();
        handles.push(std::thread::spawn(move || {
            let mut wire = WireType::Binary.wire(Bytes::mapped(store));
            for seq in 0..4i64 {
                // A meta document from each writer must stay unnumbered.
                if seq == 2 {
                    write_document(&mut wire, true, |w| w.write("note")?.text("meta")).unwrap();
                }
                write_document(&mut wire, false, |w| {
                    w.write("writer")?.i64(writer_id)?;
                    w.write("seq")?.i64(seq)
                })
                .unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let bytes = Bytes::mapped(store);
    let frames: Vec<_> = DocumentCursor::new(&bytes).collect();
    assert_eq!(frames.len(), 10);

    let data_numbers: Vec<u64> = frames.iter().filter_map(|f| f.number).collect();
    assert_eq!(data_numbers, (0..8).collect::<Vec<u64>>());
    assert!(frames.iter().filter(|f| f.meta).all(|f| f.number.is_none()));
}

#[test]
fn reference_cell_updates_are_visible_across_buffer_views() {
    let store = Arc::new(MappedBytes::anon(4096).unwrap());
    let mut wire = WireType::Binary.wire(Bytes::mapped(store.clone()));

    let mut cell = None;
    write_document(&mut wire, false, |w| {
        w.write("name")?.text("hits")?;
        cell = Some(w.write("count")?.int64_ref(5)?);
        Ok(())
    })
    .unwrap();
    let cell = cell.unwrap();

    // Mutate through one view, observe through another.
    let mut writer_view = Bytes::mapped(store.clone());
    assert!(cell.cas(&mut writer_view, 5, 6).unwrap());
    assert!(!cell.cas(&mut writer_view, 5, 99).unwrap());
    assert_eq!(cell.add(&mut writer_view, 4).unwrap(), 10);

    let reader_view = Bytes::mapped(store);
    assert_eq!(cell.get(&reader_view).unwrap(), 10);
}

#[test]
fn reading_context_re_reads_cells_at_their_offsets() {
    let mut wire = WireType::Binary.wire(Bytes::elastic());
    write_document(&mut wire, false, |w| {
        w.write("counter")?.int32_ref(7)?;
        Ok(())
    })
    .unwrap();

    wire.rewind_read();
    let mut found = None;
    read_document(&mut wire, |w, _| {
        found = Some(w.read("counter")?.int32_ref()?);
        Ok(())
    })
    .unwrap()
    .unwrap();
    let cell = found.unwrap();
    assert_eq!(cell.get(wire.bytes()).unwrap(), 7);
    assert!(cell.cas(wire.bytes_mut(), 7, 8).unwrap());
    assert_eq!(cell.get(wire.bytes()).unwrap(), 8);
}

#[test]
fn text_cells_update_without_changing_document_length() {
    let mut wire = WireType::Text.wire(Bytes::elastic());
    let mut cell = None;
    write_document(&mut wire, false, |w| {
        cell = Some(w.write("count")?.int64_ref(1)?);
        Ok(())
    })
    .unwrap();
    let cell = cell.unwrap();
    let sealed_len = wire.bytes().write_pos();

    cell.set(wire.bytes_mut(), -1234567890123456789).unwrap();
    assert_eq!(wire.bytes().write_pos(), sealed_len);
    assert_eq!(cell.get(wire.bytes()).unwrap(), -1234567890123456789);

    // The sealed header still matches the payload extent.
    let header = wire.bytes().load_u32_at(0).unwrap();
    assert_eq!(turwire::framing::length_of(header) + 4, sealed_len);
}

#[test]
fn array_cells_track_capacity_and_used() {
    for wire_type in [WireType::Text, WireType::Binary] {
        let mut wire = wire_type.wire(Bytes::elastic());
        let mut cell = None;
        write_document(&mut wire, false, |w| {
            cell = Some(w.write("values")?.int64_array(4)?);
            Ok(())
        })
        .unwrap();
        let arr = cell.unwrap();
        assert_eq!(arr.capacity(), 4);

        arr.set(wire.bytes_mut(), 0, 11).unwrap();
        arr.set(wire.bytes_mut(), 3, 44).unwrap();
        arr.set_used(wire.bytes_mut(), 2).unwrap();
        assert_eq!(arr.get(wire.bytes(), 0).unwrap(), 11);
        assert_eq!(arr.get(wire.bytes(), 3).unwrap(), 44);
        assert_eq!(arr.used(wire.bytes()).unwrap(), 2);
        assert!(arr.cas(wire.bytes_mut(), 0, 11, 12).unwrap());
    }
}

#[test]
fn file_backed_stream_is_seek_safe_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.wire");
    {
        let store = Arc::new(MappedBytes::create(&path, 4096).unwrap());
        let mut wire = WireType::Binary.wire(Bytes::mapped(store.clone()));
        for i in 0..3i64 {
            write_document(&mut wire, false, |w| w.write("i")?.i64(i)).unwrap();
        }
        write_end_of_stream(&mut wire).unwrap();
        store.sync().unwrap();
    }

    let store = Arc::new(MappedBytes::open(&path).unwrap());
    let mut wire = WireType::Binary.wire(Bytes::mapped(store));
    for expected in 0..3i64 {
        read_document(&mut wire, |w, info| {
            assert!(info.is_data());
            assert_eq!(w.read("i")?.i64()?, expected);
            Ok(())
        })
        .unwrap()
        .unwrap();
    }
    // End-of-stream sentinel reads as absent.
    assert!(read_document(&mut wire, |_, _| Ok(())).unwrap().is_none());
}

#[test]
fn exhausted_mapped_buffer_surfaces_io_failure() {
    let store = Arc::new(MappedBytes::anon(16).unwrap());
    let mut wire = WireType::Binary.wire(Bytes::mapped(store));
    let err = write_document(&mut wire, false, |w| {
        w.write("too")?.text(&"x".repeat(64))
    })
    .unwrap_err();
    let we = err.downcast_ref::<turwire::WireError>().unwrap();
    assert_eq!(we.kind, turwire::WireErrorKind::IoFailure);
}
