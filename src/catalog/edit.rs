//! Validated record, field and subfield edits.
//!
//! Every edit checks its input before writing anything, runs in one
//! transaction, and recomputes the owning record's summary in that same
//! transaction. The refreshed record row is handed back so a record list can
//! be updated with [`RecordList::refresh`](crate::summary::RecordList::refresh).

use chrono::Utc;
use rusqlite::params;
use tracing::{debug, info};

use super::{
    execute_plan, field_by_id, insert_flat, load_rows, rebuild_in, record_row_by_id,
    refresh_summary, schema, subfield_by_id, subfields_of_field, Catalog,
};
use crate::error::Result;
use crate::leader::Leader;
use crate::mapper::{flatten, CascadePlan, FieldId, RecordId, RecordRow, SubfieldId};
use crate::record::{ControlField, DataField, Indicator, Record};
use crate::validation::{
    check_field_data, check_tag, check_tag_change, parse_indicator, parse_subfield_code,
    require_class, validate_indicator, validate_subfield_code, FieldClass, ValidationError,
};
use crate::writer::encode_record;

/// Result of an edit that created a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit<T> {
    /// Id of the new row
    pub id: T,
    /// Refreshed row of the owning record
    pub row: RecordRow,
}

impl Catalog {
    /// Add an empty record with the default leader.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_blank_record(&mut self) -> Result<RecordRow> {
        self.insert_record(&Record::new(Leader::default()))
    }

    /// Store a record, returning its new row.
    ///
    /// Only records the writer can encode are accepted, so everything stored
    /// can be exported again.
    ///
    /// # Errors
    ///
    /// [`MarcError::EncodeError`](crate::MarcError::EncodeError) or
    /// [`MarcError::InvalidLeader`](crate::MarcError::InvalidLeader) for a
    /// record that cannot be encoded; store errors otherwise. Nothing is
    /// stored in either case.
    pub fn insert_record(&mut self, record: &Record) -> Result<RecordRow> {
        encode_record(record)?;
        let tx = self.conn.transaction()?;
        let mut ids = schema::id_sequence(&tx)?;
        let flat = flatten(record, &mut ids, Utc::now());
        insert_flat(&tx, &flat)?;
        tx.commit()?;
        debug!(record = flat.record.id, fields = flat.fields.len(), "inserted record");
        Ok(flat.record)
    }

    /// Delete a record with all of its fields and subfields.
    ///
    /// Returns the plan that was executed.
    ///
    /// # Errors
    ///
    /// [`MarcError::NotFound`](crate::MarcError::NotFound) for an unknown record.
    pub fn delete_record(&mut self, id: RecordId) -> Result<CascadePlan> {
        let tx = self.conn.transaction()?;
        let flat = load_rows(&tx, id)?;
        let plan = CascadePlan::for_record(id, &flat.fields, &flat.subfields);
        execute_plan(&tx, &plan)?;
        tx.commit()?;
        debug!(record = id, rows = plan.len(), "deleted record");
        Ok(plan)
    }

    /// Delete every record. Ids keep increasing afterwards.
    ///
    /// Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a delete fails.
    pub fn clear(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM Subfields", [])?;
        tx.execute("DELETE FROM Fields", [])?;
        let removed = tx.execute("DELETE FROM Records", [])?;
        tx.commit()?;
        info!(records = removed, "cleared catalog");
        Ok(removed)
    }

    /// Drop and recreate the schema, discarding all rows and restarting ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be rebuilt.
    pub fn reset(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        schema::recreate(&tx)?;
        tx.commit()?;
        info!("reset catalog schema");
        Ok(())
    }

    /// Append a control field to a record.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] for a malformed tag, a tag outside `00x` or data
    /// holding a reserved byte; [`MarcError::NotFound`](crate::MarcError::NotFound)
    /// for an unknown record.
    pub fn add_control_field(
        &mut self,
        record_id: RecordId,
        tag: &str,
        data: &str,
    ) -> Result<Edit<FieldId>> {
        check_tag(tag)?;
        check_field_data(tag, data)?;
        let field = ControlField::new(tag, data)?;

        let tx = self.conn.transaction()?;
        record_row_by_id(&tx, record_id)?;
        let id = schema::id_sequence(&tx)?.next_field();
        tx.execute(
            "INSERT INTO Fields (id, record_id, tag, control_data) VALUES (?1, ?2, ?3, ?4)",
            params![id, record_id, field.tag(), field.data],
        )?;
        let row = refresh_summary(&tx, record_id)?;
        tx.commit()?;
        Ok(Edit { id, row })
    }

    /// Append an empty data field to a record.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] for a malformed tag, a `00x` tag or an invalid
    /// indicator; [`MarcError::NotFound`](crate::MarcError::NotFound) for an
    /// unknown record.
    pub fn add_data_field(
        &mut self,
        record_id: RecordId,
        tag: &str,
        indicator1: char,
        indicator2: char,
    ) -> Result<Edit<FieldId>> {
        check_tag(tag)?;
        let field = DataField::new(tag, indicator1, indicator2)?;
        for (which, value) in [
            (Indicator::First, indicator1),
            (Indicator::Second, indicator2),
        ] {
            if !validate_indicator(value) {
                return Err(ValidationError::InvalidIndicator {
                    which,
                    value: value.to_string(),
                }
                .into());
            }
        }

        let tx = self.conn.transaction()?;
        record_row_by_id(&tx, record_id)?;
        let id = schema::id_sequence(&tx)?.next_field();
        tx.execute(
            "INSERT INTO Fields (id, record_id, tag, indicator1, indicator2) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                record_id,
                field.tag(),
                String::from(indicator1),
                String::from(indicator2)
            ],
        )?;
        let row = refresh_summary(&tx, record_id)?;
        tx.commit()?;
        Ok(Edit { id, row })
    }

    /// Retag a field within its class.
    ///
    /// # Errors
    ///
    /// [`ValidationError::ClassChange`] when the new tag crosses the
    /// control/data boundary, [`ValidationError::InvalidTag`] when it is
    /// malformed.
    pub fn update_field_tag(&mut self, field_id: FieldId, tag: &str) -> Result<RecordRow> {
        let tx = self.conn.transaction()?;
        let field = field_by_id(&tx, field_id)?;
        check_tag_change(&field.tag, tag)?;
        tx.execute(
            "UPDATE Fields SET tag = ?1 WHERE id = ?2",
            params![tag, field_id],
        )?;
        let row = refresh_summary(&tx, field.record_id)?;
        tx.commit()?;
        Ok(row)
    }

    /// Set one indicator of a data field from cell text.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidIndicator`] unless `value` is one valid
    /// indicator character; [`ValidationError::WrongFieldClass`] for a
    /// control field.
    pub fn update_indicator(
        &mut self,
        field_id: FieldId,
        which: Indicator,
        value: &str,
    ) -> Result<RecordRow> {
        let indicator = parse_indicator(which, value)?;
        let tx = self.conn.transaction()?;
        let field = field_by_id(&tx, field_id)?;
        require_class(&field.tag, FieldClass::Data)?;
        let column = match which {
            Indicator::First => "indicator1",
            Indicator::Second => "indicator2",
        };
        tx.execute(
            &format!("UPDATE Fields SET {column} = ?1 WHERE id = ?2"),
            params![String::from(indicator), field_id],
        )?;
        let row = refresh_summary(&tx, field.record_id)?;
        tx.commit()?;
        Ok(row)
    }

    /// Replace the data of a control field.
    ///
    /// # Errors
    ///
    /// [`ValidationError::WrongFieldClass`] for a data field,
    /// [`ValidationError::ReservedByte`] for data holding a structural byte.
    pub fn update_control_data(&mut self, field_id: FieldId, data: &str) -> Result<RecordRow> {
        let tx = self.conn.transaction()?;
        let field = field_by_id(&tx, field_id)?;
        require_class(&field.tag, FieldClass::Control)?;
        check_field_data(&field.tag, data)?;
        tx.execute(
            "UPDATE Fields SET control_data = ?1 WHERE id = ?2",
            params![data, field_id],
        )?;
        let row = refresh_summary(&tx, field.record_id)?;
        tx.commit()?;
        Ok(row)
    }

    /// Delete a field with its subfields.
    ///
    /// # Errors
    ///
    /// [`MarcError::NotFound`](crate::MarcError::NotFound) for an unknown field.
    pub fn delete_field(&mut self, field_id: FieldId) -> Result<RecordRow> {
        let tx = self.conn.transaction()?;
        let field = field_by_id(&tx, field_id)?;
        let subfields = subfields_of_field(&tx, field_id)?;
        execute_plan(&tx, &CascadePlan::for_field(field_id, &subfields))?;
        let row = refresh_summary(&tx, field.record_id)?;
        tx.commit()?;
        Ok(row)
    }

    /// Append a subfield to a data field.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidSubfieldCode`] for an invalid code;
    /// [`ValidationError::WrongFieldClass`] for a control field;
    /// [`ValidationError::ReservedByte`] for data holding a structural byte.
    pub fn add_subfield(
        &mut self,
        field_id: FieldId,
        code: char,
        data: &str,
    ) -> Result<Edit<SubfieldId>> {
        if !validate_subfield_code(code) {
            return Err(ValidationError::InvalidSubfieldCode(code.to_string()).into());
        }
        let tx = self.conn.transaction()?;
        let field = field_by_id(&tx, field_id)?;
        require_class(&field.tag, FieldClass::Data)?;
        check_field_data(&field.tag, data)?;
        let id = schema::id_sequence(&tx)?.next_subfield();
        tx.execute(
            "INSERT INTO Subfields (id, field_id, code, data) VALUES (?1, ?2, ?3, ?4)",
            params![id, field_id, String::from(code), data],
        )?;
        let row = refresh_summary(&tx, field.record_id)?;
        tx.commit()?;
        Ok(Edit { id, row })
    }

    /// Change a subfield's code from cell text.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidSubfieldCode`] unless `code` is one valid
    /// code character.
    pub fn update_subfield_code(&mut self, subfield_id: SubfieldId, code: &str) -> Result<RecordRow> {
        let code = parse_subfield_code(code)?;
        let tx = self.conn.transaction()?;
        let (_, record_id) = subfield_by_id(&tx, subfield_id)?;
        tx.execute(
            "UPDATE Subfields SET code = ?1 WHERE id = ?2",
            params![String::from(code), subfield_id],
        )?;
        let row = refresh_summary(&tx, record_id)?;
        tx.commit()?;
        Ok(row)
    }

    /// Replace a subfield's data.
    ///
    /// # Errors
    ///
    /// [`MarcError::NotFound`](crate::MarcError::NotFound) for an unknown
    /// subfield, [`ValidationError::ReservedByte`] for data holding a
    /// structural byte.
    pub fn update_subfield_data(&mut self, subfield_id: SubfieldId, data: &str) -> Result<RecordRow> {
        let tx = self.conn.transaction()?;
        let (subfield, record_id) = subfield_by_id(&tx, subfield_id)?;
        let field = field_by_id(&tx, subfield.field_id)?;
        check_field_data(&field.tag, data)?;
        tx.execute(
            "UPDATE Subfields SET data = ?1 WHERE id = ?2",
            params![data, subfield_id],
        )?;
        let row = refresh_summary(&tx, record_id)?;
        tx.commit()?;
        Ok(row)
    }

    /// Delete one subfield.
    ///
    /// # Errors
    ///
    /// [`MarcError::NotFound`](crate::MarcError::NotFound) for an unknown subfield.
    pub fn delete_subfield(&mut self, subfield_id: SubfieldId) -> Result<RecordRow> {
        let tx = self.conn.transaction()?;
        let (_, record_id) = subfield_by_id(&tx, subfield_id)?;
        tx.execute("DELETE FROM Subfields WHERE id = ?1", [subfield_id])?;
        let row = refresh_summary(&tx, record_id)?;
        tx.commit()?;
        Ok(row)
    }

    /// Recompute derived summary columns for one record or, with `None`, for
    /// every record. Returns the number of records updated.
    ///
    /// # Errors
    ///
    /// [`MarcError::NotFound`](crate::MarcError::NotFound) when `target`
    /// names an unknown record.
    pub fn rebuild_summaries(&mut self, target: Option<RecordId>) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let updated = rebuild_in(&tx, target)?;
        tx.commit()?;
        info!(records = updated, "rebuilt summaries");
        Ok(updated)
    }
}
