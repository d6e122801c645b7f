//! ISO 2709 reader/writer integration tests.

mod common;

use std::io::Cursor;

use common::{arb_record, create_book, encode_all};
use marc_catalog::{decode_record, encode_record, MarcError, MarcReader, RecoveryMode};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_decode_inverts_encode(record in arb_record()) {
        let bytes = encode_record(&record).unwrap();
        let decoded = decode_record(&bytes, RecoveryMode::Strict).unwrap();
        prop_assert!(decoded.warnings.is_empty());
        prop_assert_eq!(decoded, record);
    }

    #[test]
    fn prop_length_prefix_matches_output(record in arb_record()) {
        let bytes = encode_record(&record).unwrap();
        let declared: usize = std::str::from_utf8(&bytes[..5]).unwrap().parse().unwrap();
        prop_assert_eq!(declared, bytes.len());
        prop_assert_eq!(bytes.last(), Some(&0x1D));
    }
}

#[test]
fn test_stream_of_books() {
    let books = vec![
        create_book("ocm001", "Moby Dick", "Melville, Herman"),
        create_book("ocm002", "Middlemarch", "Eliot, George"),
        create_book("ocm003", "Bleak House", "Dickens, Charles"),
    ];
    let bytes = encode_all(&books);

    let mut reader = MarcReader::new(Cursor::new(bytes));
    let decoded: Vec<_> = reader.by_ref().collect::<Result<_, _>>().unwrap();

    assert_eq!(decoded, books);
    assert_eq!(reader.records_read(), 3);
    assert_eq!(reader.records_skipped(), 0);
    assert_eq!(decoded[1].first_subfield("245", 'a'), Some("Middlemarch"));
    assert_eq!(decoded[2].get_control_field("001"), Some("ocm003"));
}

#[test]
fn test_garbage_between_records_is_skipped() {
    let first = encode_record(&create_book("ocm001", "One", "Smith")).unwrap();
    let second = encode_record(&create_book("ocm002", "Two", "Jones")).unwrap();

    let mut bytes = first.clone();
    bytes.extend_from_slice(b"xx#garbage\x1d");
    bytes.extend_from_slice(&second);

    let mut reader = MarcReader::new(Cursor::new(bytes));
    let titles: Vec<String> = reader
        .by_ref()
        .map(|record| record.unwrap().first_subfield("245", 'a').unwrap().to_string())
        .collect();

    assert_eq!(titles, vec!["One", "Two"]);
    assert_eq!(reader.records_skipped(), 1);
}

#[test]
fn test_strict_mode_rejects_bad_directory() {
    let mut bytes = encode_record(&create_book("ocm001", "One", "Smith")).unwrap();
    // Point the first directory entry's offset far past the field data.
    bytes[24 + 7..24 + 12].copy_from_slice(b"99999");

    let lenient = decode_record(&bytes, RecoveryMode::Lenient).unwrap();
    assert_eq!(lenient.warnings.len(), 1);
    assert_eq!(lenient.warnings[0].tag.as_deref(), Some("001"));
    assert!(lenient.get_control_field("001").is_none());
    assert_eq!(lenient.first_subfield("245", 'a'), Some("One"));

    assert!(matches!(
        decode_record(&bytes, RecoveryMode::Strict),
        Err(MarcError::InvalidRecord(_))
    ));
}

#[test]
fn test_writer_refuses_oversized_field() {
    let note = "x".repeat(10_000);
    let mut record = create_book("ocm001", "One", "Smith");
    record.add_field(common::data_field("500", ' ', ' ', &[('a', note.as_str())]));

    let mut buffer = Vec::new();
    let mut writer = marc_catalog::MarcWriter::new(&mut buffer);
    assert!(matches!(
        writer.write_record(&record),
        Err(MarcError::EncodeError(_))
    ));
    assert_eq!(writer.records_written(), 0);
    drop(writer);
    assert!(buffer.is_empty());
}
