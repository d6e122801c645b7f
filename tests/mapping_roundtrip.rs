//! Record to row flattening and reconstruction.

mod common;

use chrono::Utc;
use common::{arb_leader_damage, arb_record, create_book};
use marc_catalog::mapper::{flatten, reconstruct, IdSequence};
use marc_catalog::{decode_record, encode_record, MarcError, RecoveryMode};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_reconstruct_inverts_flatten(record in arb_record()) {
        let mut ids = IdSequence::new();
        let flat = flatten(&record, &mut ids, Utc::now());
        prop_assert_eq!(flat.reconstruct().unwrap(), record);
    }

    #[test]
    fn prop_row_order_does_not_matter(record in arb_record(), seed in any::<u64>()) {
        let mut ids = IdSequence::starting_after(40, 400, 4000);
        let flat = flatten(&record, &mut ids, Utc::now());

        let mut fields = flat.fields.clone();
        let mut subfields = flat.subfields.clone();
        // Deterministic shuffle: rotate and reverse depending on the seed.
        if !fields.is_empty() {
            let by = usize::try_from(seed % fields.len() as u64).unwrap();
            fields.rotate_left(by);
        }
        if seed % 2 == 0 {
            subfields.reverse();
        }

        prop_assert_eq!(reconstruct(&flat.record, &fields, &subfields).unwrap(), record);
    }

    #[test]
    fn prop_damaged_leader_survives_flatten(
        record in arb_record(),
        (position, byte) in arb_leader_damage(),
    ) {
        let mut bytes = encode_record(&record).unwrap();
        bytes[position] = byte;

        let decoded = decode_record(&bytes, RecoveryMode::Lenient).unwrap();
        prop_assert_eq!(decoded.warnings.len(), 1);
        let flat = flatten(&decoded, &mut IdSequence::new(), Utc::now());
        prop_assert_eq!(flat.record.leader.as_deref().map(str::len), Some(24));
        prop_assert_eq!(flat.reconstruct().unwrap(), decoded.clone());
        prop_assert!(encode_record(&decoded).is_ok());
    }
}

#[test]
fn test_ids_continue_across_records() {
    let mut ids = IdSequence::new();
    let first = flatten(&create_book("1", "One", "Smith"), &mut ids, Utc::now());
    let second = flatten(&create_book("2", "Two", "Jones"), &mut ids, Utc::now());

    assert_eq!(first.record.id, 1);
    assert_eq!(second.record.id, 2);
    assert_eq!(first.fields.len(), 6);
    assert_eq!(second.fields[0].id, 7);
    assert!(second.fields.iter().all(|f| f.record_id == 2));
    assert_eq!(second.subfields[0].id, first.subfields.len() as i64 + 1);
}

#[test]
fn test_summary_is_derived_on_flatten() {
    let mut ids = IdSequence::new();
    let flat = flatten(&create_book("1", "Moby Dick", "Melville"), &mut ids, Utc::now());
    let summary = &flat.record.summary;

    assert_eq!(summary.author.as_deref(), Some("Melville"));
    assert_eq!(summary.title.as_deref(), Some("Moby Dick"));
    assert_eq!(summary.barcode.as_deref(), Some("31234000012345"));
    assert_eq!(summary.main_entry.as_deref(), Some("Melville"));
    assert_eq!(flat.record.date_changed, None);
}

#[test]
fn test_orphan_subfield_is_reported() {
    let mut ids = IdSequence::new();
    let flat = flatten(&create_book("1", "One", "Smith"), &mut ids, Utc::now());
    let fields: Vec<_> = flat
        .fields
        .iter()
        .filter(|f| f.tag != "245")
        .cloned()
        .collect();

    assert!(matches!(
        reconstruct(&flat.record, &fields, &flat.subfields),
        Err(MarcError::InconsistentRows(_))
    ));
}
