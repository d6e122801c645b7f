//! Common test helpers and utilities shared across test suite.

#![allow(dead_code)]

use marc_catalog::{ControlField, DataField, Field, Leader, MarcWriter, Record};
use proptest::prelude::*;

/// Creates a default leader for test records.
pub fn create_test_leader() -> Leader {
    Leader {
        record_status: 'c',
        cataloging_form: 'a',
        ..Leader::default()
    }
}

/// A data field built from `(code, data)` pairs.
pub fn data_field(tag: &str, ind1: char, ind2: char, subfields: &[(char, &str)]) -> DataField {
    let mut field = DataField::new(tag, ind1, ind2).unwrap();
    for (code, data) in subfields {
        field.add_subfield(*code, *data);
    }
    field
}

/// A book record with a control number, an author and a title statement.
pub fn create_book(control_number: &str, title: &str, author: &str) -> Record {
    let responsibility = format!("by {author}");
    Record::builder(create_test_leader())
        .control_field("001", control_number)
        .control_field("008", "240301s2024    xxu           000 0 eng d")
        .field(data_field("100", '1', ' ', &[('a', author)]))
        .field(data_field(
            "245",
            '1',
            '0',
            &[('a', title), ('c', responsibility.as_str())],
        ))
        .field(data_field(
            "650",
            ' ',
            '0',
            &[('a', "Whaling"), ('v', "Fiction")],
        ))
        .field(data_field("852", ' ', ' ', &[('p', "31234000012345")]))
        .build()
        .unwrap()
}

/// Encode records back to back into one byte stream.
pub fn encode_all(records: &[Record]) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut writer = MarcWriter::new(&mut buffer);
    for record in records {
        writer.write_record(record).unwrap();
    }
    writer.finish().unwrap();
    buffer
}

/// Field data free of the three structural bytes.
pub fn arb_data() -> impl Strategy<Value = String> {
    "[^\u{1d}\u{1e}\u{1f}]{0,24}"
}

/// Field text that may contain the structural bytes the writer reserves.
pub fn arb_text_with_reserved() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => any::<char>(),
            1 => prop::sample::select(vec!['\u{1d}', '\u{1e}', '\u{1f}']),
        ],
        0..16,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// A descriptive leader position and a byte outside ASCII to put there.
pub fn arb_leader_damage() -> impl Strategy<Value = (usize, u8)> {
    (
        prop::sample::select(vec![5usize, 6, 7, 8, 9, 17, 18, 19, 20, 21, 22, 23]),
        0x80u8..=0xFF,
    )
}

fn arb_indicator() -> impl Strategy<Value = char> {
    prop::sample::select(vec![' ', '0', '1', '2', '4', 'a'])
}

fn arb_code() -> impl Strategy<Value = char> {
    prop::sample::select(vec!['a', 'b', 'c', 'd', 'e', 'v', 'x', 'z', '0', '6'])
}

fn arb_control_field() -> impl Strategy<Value = (String, String)> {
    ("00[1-9]", arb_data())
}

fn arb_data_field() -> impl Strategy<Value = DataField> {
    (
        "0[1-9][0-9]|[1-9][0-9][0-9]",
        arb_indicator(),
        arb_indicator(),
        prop::collection::vec((arb_code(), arb_data()), 0..6),
    )
        .prop_map(|(tag, ind1, ind2, subfields)| {
            let mut field = DataField::new(tag, ind1, ind2).unwrap();
            for (code, data) in subfields {
                field.add_subfield(code, data);
            }
            field
        })
}

/// Structurally valid records with control and data fields in mixed order.
pub fn arb_record() -> impl Strategy<Value = Record> {
    let status = prop::sample::select(vec!['a', 'c', 'n', 'p']);
    let kind = prop::sample::select(vec!['a', 'c', 'e', 'm']);
    let fields = prop::collection::vec(
        prop_oneof![
            arb_control_field()
                .prop_map(|(tag, data)| Field::from(ControlField::new(tag, data).unwrap())),
            arb_data_field().prop_map(Field::from),
        ],
        0..12,
    );
    (status, kind, fields).prop_map(|(record_status, record_type, fields)| {
        let mut record = Record::new(Leader {
            record_status,
            record_type,
            ..Leader::default()
        });
        record.fields = fields;
        record
    })
}
