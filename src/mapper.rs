//! Relational decomposition of records.
//!
//! A [`Record`] is mirrored into three row kinds: one [`RecordRow`], one
//! [`FieldRow`] per field and one [`SubfieldRow`] per data-field subfield.
//! Rows carry surrogate ids handed out by an [`IdSequence`]; ids only ever
//! grow, so ascending id order is insertion order, and that is the order
//! [`reconstruct`] rebuilds fields and subfields in.
//!
//! Deletion is planned here as well. A [`CascadePlan`] lists every dependent
//! row of a record or field so the store can delete them explicitly,
//! dependents first.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{MarcError, Result};
use crate::leader::Leader;
use crate::record::{is_control_tag, ControlField, DataField, Field, Record, Subfield};
use crate::summary::Summary;

/// Surrogate id of a record row.
pub type RecordId = i64;
/// Surrogate id of a field row.
pub type FieldId = i64;
/// Surrogate id of a subfield row.
pub type SubfieldId = i64;

/// One row of the `Records` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRow {
    /// Surrogate id
    pub id: RecordId,
    /// When the record was created
    pub date_added: DateTime<Utc>,
    /// When the record was last edited, if ever
    pub date_changed: Option<DateTime<Utc>>,
    /// Derived summary columns
    #[serde(flatten)]
    pub summary: Summary,
    /// The 24-character leader, with zeroed length and base address
    pub leader: Option<String>,
}

/// One row of the `Fields` table.
///
/// Control fields carry `control_data` and no indicators; data fields carry
/// indicators and own subfield rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRow {
    /// Surrogate id
    pub id: FieldId,
    /// Owning record
    pub record_id: RecordId,
    /// Three-character tag
    pub tag: String,
    /// First indicator (data fields)
    pub indicator1: Option<char>,
    /// Second indicator (data fields)
    pub indicator2: Option<char>,
    /// Field data (control fields)
    pub control_data: Option<String>,
}

impl FieldRow {
    /// True when the tag names a control field.
    #[must_use]
    pub fn is_control(&self) -> bool {
        is_control_tag(&self.tag)
    }
}

/// One row of the `Subfields` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubfieldRow {
    /// Surrogate id
    pub id: SubfieldId,
    /// Owning field
    pub field_id: FieldId,
    /// Subfield code
    pub code: char,
    /// Subfield data
    pub data: String,
}

/// Hands out strictly increasing surrogate ids for the three tables.
///
/// The store seeds it with the largest id each table has ever issued, so new
/// rows always sort after existing ones.
#[derive(Debug, Clone, Default)]
pub struct IdSequence {
    last_record: RecordId,
    last_field: FieldId,
    last_subfield: SubfieldId,
}

impl IdSequence {
    /// A sequence for empty tables: every kind starts at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sequence continuing after the given last-issued ids.
    #[must_use]
    pub fn starting_after(
        last_record: RecordId,
        last_field: FieldId,
        last_subfield: SubfieldId,
    ) -> Self {
        IdSequence {
            last_record,
            last_field,
            last_subfield,
        }
    }

    /// Next record id
    pub fn next_record(&mut self) -> RecordId {
        self.last_record += 1;
        self.last_record
    }

    /// Next field id
    pub fn next_field(&mut self) -> FieldId {
        self.last_field += 1;
        self.last_field
    }

    /// Next subfield id
    pub fn next_subfield(&mut self) -> SubfieldId {
        self.last_subfield += 1;
        self.last_subfield
    }
}

/// The three row sets of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatRecord {
    /// The record row
    pub record: RecordRow,
    /// Field rows in ascending id order
    pub fields: Vec<FieldRow>,
    /// Subfield rows in ascending id order
    pub subfields: Vec<SubfieldRow>,
}

impl FlatRecord {
    /// Rebuild the record these rows describe.
    ///
    /// # Errors
    ///
    /// See [`reconstruct`].
    pub fn reconstruct(&self) -> Result<Record> {
        reconstruct(&self.record, &self.fields, &self.subfields)
    }

    /// Subfield rows owned by one field, in id order.
    pub fn subfields_of(&self, field_id: FieldId) -> impl Iterator<Item = &SubfieldRow> {
        self.subfields
            .iter()
            .filter(move |subfield| subfield.field_id == field_id)
    }
}

/// Decompose a record into rows, drawing ids from `ids`.
///
/// The record row gets the summary derived from the record itself and
/// `now` as its creation time.
#[must_use]
pub fn flatten(record: &Record, ids: &mut IdSequence, now: DateTime<Utc>) -> FlatRecord {
    let record_id = ids.next_record();
    let mut fields = Vec::with_capacity(record.fields.len());
    let mut subfields = Vec::new();

    for field in &record.fields {
        let field_id = ids.next_field();
        match field {
            Field::Control(control) => fields.push(FieldRow {
                id: field_id,
                record_id,
                tag: control.tag().to_string(),
                indicator1: None,
                indicator2: None,
                control_data: Some(control.data.clone()),
            }),
            Field::Data(data) => {
                fields.push(FieldRow {
                    id: field_id,
                    record_id,
                    tag: data.tag().to_string(),
                    indicator1: Some(data.indicator1),
                    indicator2: Some(data.indicator2),
                    control_data: None,
                });
                subfields.extend(data.subfields.iter().map(|subfield| SubfieldRow {
                    id: ids.next_subfield(),
                    field_id,
                    code: subfield.code,
                    data: subfield.data.clone(),
                }));
            },
        }
    }

    FlatRecord {
        record: RecordRow {
            id: record_id,
            date_added: now,
            date_changed: None,
            summary: Summary::from_record(record),
            leader: Some(record.leader.without_lengths().to_string()),
        },
        fields,
        subfields,
    }
}

/// Rebuild a record from its rows.
///
/// Field and subfield rows may arrive in any order; they are sorted by id.
/// A data-field row without an indicator gets a blank one. A missing leader
/// becomes [`Leader::default`].
///
/// # Errors
///
/// [`MarcError::InconsistentRows`] when a field row belongs to another
/// record, a control field owns subfields, or a subfield row's owning field
/// is not among `fields`. [`MarcError::InvalidLeader`] for a malformed
/// stored leader.
pub fn reconstruct(
    record: &RecordRow,
    fields: &[FieldRow],
    subfields: &[SubfieldRow],
) -> Result<Record> {
    let leader = match &record.leader {
        Some(text) => text.parse::<Leader>()?,
        None => Leader::default(),
    };

    let mut sorted_subfields: Vec<&SubfieldRow> = subfields.iter().collect();
    sorted_subfields.sort_by_key(|row| row.id);
    let mut by_field: IndexMap<FieldId, Vec<&SubfieldRow>> = IndexMap::new();
    for row in sorted_subfields {
        by_field.entry(row.field_id).or_default().push(row);
    }

    let mut sorted_fields: Vec<&FieldRow> = fields.iter().collect();
    sorted_fields.sort_by_key(|row| row.id);

    let mut rebuilt = Record::new(leader);
    for row in sorted_fields {
        if row.record_id != record.id {
            return Err(MarcError::InconsistentRows(format!(
                "Field {} belongs to record {}, not {}",
                row.id, row.record_id, record.id
            )));
        }
        let owned = by_field.shift_remove(&row.id).unwrap_or_default();

        if row.is_control() {
            if !owned.is_empty() {
                return Err(MarcError::InconsistentRows(format!(
                    "Control field {} ({}) owns {} subfield rows",
                    row.id,
                    row.tag,
                    owned.len()
                )));
            }
            let data = row.control_data.clone().unwrap_or_default();
            rebuilt.add_field(ControlField::new(row.tag.clone(), data)?);
        } else {
            let mut field = DataField::new(
                row.tag.clone(),
                row.indicator1.unwrap_or(' '),
                row.indicator2.unwrap_or(' '),
            )?;
            field.subfields = owned
                .into_iter()
                .map(|sf| Subfield::new(sf.code, sf.data.clone()))
                .collect();
            rebuilt.add_field(field);
        }
    }

    if let Some((field_id, orphans)) = by_field.first() {
        return Err(MarcError::InconsistentRows(format!(
            "{} subfield rows reference field {field_id}, which is not part of record {}",
            orphans.len(),
            record.id
        )));
    }

    Ok(rebuilt)
}

/// Every row a delete must remove, grouped by table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadePlan {
    /// Records to delete
    pub record_ids: Vec<RecordId>,
    /// Fields to delete
    pub field_ids: Vec<FieldId>,
    /// Subfields to delete
    pub subfield_ids: Vec<SubfieldId>,
}

impl CascadePlan {
    /// Plan the deletion of a record with all of its fields and subfields.
    ///
    /// Rows owned by other records are ignored.
    #[must_use]
    pub fn for_record(record_id: RecordId, fields: &[FieldRow], subfields: &[SubfieldRow]) -> Self {
        let field_ids: Vec<FieldId> = fields
            .iter()
            .filter(|row| row.record_id == record_id)
            .map(|row| row.id)
            .collect();
        let subfield_ids = subfields
            .iter()
            .filter(|row| field_ids.contains(&row.field_id))
            .map(|row| row.id)
            .collect();
        CascadePlan {
            record_ids: vec![record_id],
            field_ids,
            subfield_ids,
        }
    }

    /// Plan the deletion of one field with its subfields.
    #[must_use]
    pub fn for_field(field_id: FieldId, subfields: &[SubfieldRow]) -> Self {
        CascadePlan {
            record_ids: Vec::new(),
            field_ids: vec![field_id],
            subfield_ids: subfields
                .iter()
                .filter(|row| row.field_id == field_id)
                .map(|row| row.id)
                .collect(),
        }
    }

    /// Total number of rows the plan removes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.record_ids.len() + self.field_ids.len() + self.subfield_ids.len()
    }

    /// True when there is nothing to delete.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        let mut record = Record::new(Leader {
            record_status: 'c',
            ..Leader::default()
        });
        record.add_control_field("001", "ocm0001").unwrap();
        record.add_field(
            DataField::builder("100", '1', ' ')
                .subfield('a', "Smith, John")
                .build()
                .unwrap(),
        );
        record.add_control_field("008", "200101s2020").unwrap();
        record.add_field(
            DataField::builder("245", '1', '0')
                .subfield('a', "Title")
                .subfield('b', "subtitle")
                .subfield('c', "Jones")
                .build()
                .unwrap(),
        );
        record
    }

    #[test]
    fn test_flatten_shapes_rows() {
        let mut ids = IdSequence::new();
        let flat = flatten(&sample_record(), &mut ids, Utc::now());

        assert_eq!(flat.record.id, 1);
        assert_eq!(flat.fields.len(), 4);
        assert_eq!(flat.subfields.len(), 4);

        let control = &flat.fields[0];
        assert_eq!(control.tag, "001");
        assert_eq!(control.control_data.as_deref(), Some("ocm0001"));
        assert_eq!(control.indicator1, None);

        let data = &flat.fields[3];
        assert_eq!(data.tag, "245");
        assert_eq!(data.indicator1, Some('1'));
        assert_eq!(data.control_data, None);
        assert_eq!(flat.subfields_of(data.id).count(), 3);

        assert_eq!(flat.record.summary.author.as_deref(), Some("Smith, John"));
        assert_eq!(flat.record.summary.title.as_deref(), Some("Title subtitle"));
    }

    #[test]
    fn test_ids_strictly_increase_across_records() {
        let mut ids = IdSequence::starting_after(10, 100, 1000);
        let first = flatten(&sample_record(), &mut ids, Utc::now());
        let second = flatten(&sample_record(), &mut ids, Utc::now());

        assert_eq!(first.record.id, 11);
        assert_eq!(second.record.id, 12);
        let field_ids: Vec<FieldId> = first
            .fields
            .iter()
            .chain(&second.fields)
            .map(|row| row.id)
            .collect();
        assert!(field_ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(field_ids[0], 101);
        assert_eq!(first.subfields[0].id, 1001);
    }

    #[test]
    fn test_reconstruct_inverts_flatten() {
        let record = sample_record();
        let flat = flatten(&record, &mut IdSequence::new(), Utc::now());
        assert_eq!(flat.reconstruct().unwrap(), record);
    }

    #[test]
    fn test_reconstruct_orders_by_id_not_slice_order() {
        let record = sample_record();
        let mut flat = flatten(&record, &mut IdSequence::new(), Utc::now());
        flat.fields.reverse();
        flat.subfields.reverse();
        assert_eq!(flat.reconstruct().unwrap(), record);
    }

    #[test]
    fn test_missing_leader_and_indicator_defaults() {
        let row = RecordRow {
            id: 7,
            date_added: Utc::now(),
            date_changed: None,
            summary: Summary::default(),
            leader: None,
        };
        let fields = vec![FieldRow {
            id: 1,
            record_id: 7,
            tag: "500".to_string(),
            indicator1: None,
            indicator2: Some('4'),
            control_data: None,
        }];
        let record = reconstruct(&row, &fields, &[]).unwrap();
        assert_eq!(record.leader, Leader::default());
        let field = record.fields[0].as_data().unwrap();
        assert_eq!(field.indicator1, ' ');
        assert_eq!(field.indicator2, '4');
        assert!(field.subfields.is_empty());
    }

    #[test]
    fn test_orphan_subfield_is_an_error() {
        let mut flat = flatten(&sample_record(), &mut IdSequence::new(), Utc::now());
        flat.subfields[0].field_id = 999;
        assert!(matches!(
            flat.reconstruct(),
            Err(MarcError::InconsistentRows(_))
        ));
    }

    #[test]
    fn test_foreign_field_row_is_an_error() {
        let mut flat = flatten(&sample_record(), &mut IdSequence::new(), Utc::now());
        flat.fields[1].record_id = 2;
        assert!(flat.reconstruct().is_err());
    }

    #[test]
    fn test_cascade_plans() {
        let mut ids = IdSequence::new();
        let first = flatten(&sample_record(), &mut ids, Utc::now());
        let second = flatten(&sample_record(), &mut ids, Utc::now());
        let fields: Vec<FieldRow> = first.fields.iter().chain(&second.fields).cloned().collect();
        let subfields: Vec<SubfieldRow> = first
            .subfields
            .iter()
            .chain(&second.subfields)
            .cloned()
            .collect();

        let plan = CascadePlan::for_record(first.record.id, &fields, &subfields);
        assert_eq!(plan.record_ids, vec![first.record.id]);
        assert_eq!(plan.field_ids.len(), 4);
        assert_eq!(plan.subfield_ids.len(), 4);
        assert!(plan
            .subfield_ids
            .iter()
            .all(|id| first.subfields.iter().any(|row| row.id == *id)));

        let title_field = second.fields[3].id;
        let plan = CascadePlan::for_field(title_field, &subfields);
        assert!(plan.record_ids.is_empty());
        assert_eq!(plan.field_ids, vec![title_field]);
        assert_eq!(plan.subfield_ids.len(), 3);
        assert_eq!(plan.len(), 4);
    }
}
