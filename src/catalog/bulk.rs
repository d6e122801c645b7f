//! Import, export and filtered find-and-replace.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use chrono::Utc;
use rusqlite::{params, params_from_iter};
use serde::Serialize;
use tracing::{info, instrument};

use super::{insert_flat, rebuild_in, schema, Catalog};
use crate::error::Result;
use crate::filter::ReplaceRequest;
use crate::mapper::{flatten, RecordId, SubfieldId};
use crate::reader::MarcReader;
use crate::writer::MarcWriter;

/// Progress of a bulk operation, reported through a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// This many records have been handled so far
    Processed(usize),
    /// All records handled; the transaction is being committed
    Committing,
    /// Done, with the final record count
    Finished(usize),
}

/// Totals of one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Records stored
    pub records: usize,
    /// Field rows stored
    pub fields: usize,
    /// Subfield rows stored
    pub subfields: usize,
    /// Records dropped because they could not be framed
    pub skipped: usize,
    /// Decode warnings across all stored records
    pub warnings: usize,
}

impl Catalog {
    /// Decode every record of a byte stream and store it, all in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// I/O and store errors, and in strict recovery mode the first malformed
    /// record. Nothing is stored when an error is returned.
    #[instrument(skip_all, fields(mode = ?self.recovery_mode))]
    pub fn import_stream<R: Read>(
        &mut self,
        source: R,
        mut progress: impl FnMut(Progress),
    ) -> Result<ImportSummary> {
        let mut reader = MarcReader::new(source).with_recovery_mode(self.recovery_mode);
        let tx = self.conn.transaction()?;
        let mut ids = schema::id_sequence(&tx)?;
        let now = Utc::now();
        let mut summary = ImportSummary::default();

        while let Some(record) = reader.read_record()? {
            let flat = flatten(&record, &mut ids, now);
            insert_flat(&tx, &flat)?;
            summary.records += 1;
            summary.fields += flat.fields.len();
            summary.subfields += flat.subfields.len();
            summary.warnings += record.warnings.len();
            progress(Progress::Processed(summary.records));
        }
        summary.skipped = reader.records_skipped();

        progress(Progress::Committing);
        tx.commit()?;
        progress(Progress::Finished(summary.records));
        info!(
            records = summary.records,
            fields = summary.fields,
            subfields = summary.subfields,
            skipped = summary.skipped,
            warnings = summary.warnings,
            "import complete"
        );
        Ok(summary)
    }

    /// Import a file of records.
    ///
    /// # Errors
    ///
    /// See [`Catalog::import_stream`].
    pub fn import_file(
        &mut self,
        path: impl AsRef<Path>,
        progress: impl FnMut(Progress),
    ) -> Result<ImportSummary> {
        let file = File::open(path)?;
        self.import_stream(file, progress)
    }

    /// Encode records to a byte stream, in id order.
    ///
    /// With `None` every record is exported; otherwise the given ids in the
    /// given order. Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Unknown ids, inconsistent rows, records that cannot be encoded, and
    /// I/O errors. A record that cannot be encoded is never partially written.
    #[instrument(skip_all)]
    pub fn export_stream<W: Write>(
        &self,
        destination: W,
        record_ids: Option<&[RecordId]>,
        mut progress: impl FnMut(Progress),
    ) -> Result<usize> {
        let ids = match record_ids {
            Some(ids) => ids.to_vec(),
            None => self.all_record_ids()?,
        };

        let mut writer = MarcWriter::new(destination);
        for id in ids {
            let record = self.record(id)?;
            writer.write_record(&record)?;
            progress(Progress::Processed(writer.records_written()));
        }
        writer.finish()?;

        let written = writer.records_written();
        progress(Progress::Finished(written));
        info!(records = written, "export complete");
        Ok(written)
    }

    /// Export records to a file, replacing it.
    ///
    /// # Errors
    ///
    /// See [`Catalog::export_stream`].
    pub fn export_file(
        &self,
        path: impl AsRef<Path>,
        record_ids: Option<&[RecordId]>,
        progress: impl FnMut(Progress),
    ) -> Result<usize> {
        let file = BufWriter::new(File::create(path)?);
        self.export_stream(file, record_ids, progress)
    }

    /// Rewrite the data of every subfield selected by the request's filters.
    ///
    /// Returns the number of subfields whose data changed. The summary of
    /// every record owning a changed subfield is recomputed in the same
    /// transaction. `progress` receives one tick per rewritten subfield.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptySearch`](crate::ValidationError::EmptySearch)
    /// for an empty search text, before any row is read; store errors roll
    /// the whole replace back.
    #[instrument(skip_all, fields(find = %request.find, case_sensitive = request.case_sensitive))]
    pub fn apply_filtered_replace(
        &mut self,
        request: &ReplaceRequest,
        mut progress: impl FnMut(Progress),
    ) -> Result<usize> {
        let substitution = request.substitution()?;
        let predicate = request.predicate();

        let tx = self.conn.transaction()?;
        let changes: Vec<(SubfieldId, RecordId, String)> = {
            let sql = format!(
                "SELECT s.id, f.record_id, s.data
                 FROM Subfields s JOIN Fields f ON f.id = s.field_id
                 WHERE {}
                 ORDER BY s.id",
                predicate.sql
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(predicate.params.iter()), |row| {
                Ok((
                    row.get::<_, SubfieldId>(0)?,
                    row.get::<_, RecordId>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            let mut changes = Vec::new();
            for row in rows {
                let (id, record_id, data) = row?;
                if let Some(rewritten) = substitution.apply(&data) {
                    changes.push((id, record_id, rewritten));
                }
            }
            changes
        };

        {
            let mut update = tx.prepare_cached("UPDATE Subfields SET data = ?1 WHERE id = ?2")?;
            for (done, (id, _, data)) in changes.iter().enumerate() {
                update.execute(params![data, id])?;
                progress(Progress::Processed(done + 1));
            }
        }

        let touched: BTreeSet<RecordId> = changes.iter().map(|(_, record_id, _)| *record_id).collect();
        for record_id in &touched {
            rebuild_in(&tx, Some(*record_id))?;
        }
        progress(Progress::Committing);
        tx.commit()?;
        progress(Progress::Finished(changes.len()));

        info!(
            subfields = changes.len(),
            records = touched.len(),
            "find and replace complete"
        );
        Ok(changes.len())
    }

    fn all_record_ids(&self) -> Result<Vec<RecordId>> {
        let mut stmt = self.conn.prepare("SELECT id FROM Records ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<RecordId>>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::book;
    use super::*;
    use crate::error::MarcError;
    use crate::filter::ReplaceFilters;
    use crate::reader::RecoveryMode;
    use crate::record::Record;
    use crate::validation::ValidationError;
    use crate::writer::encode_record;
    use std::io::Cursor;

    fn stream_of(records: &[Record]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|record| encode_record(record).unwrap())
            .collect()
    }

    #[test]
    fn test_import_reports_progress_and_totals() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let records = vec![book("A", "X"), book("B", "Y")];
        let mut ticks = Vec::new();
        let summary = catalog
            .import_stream(Cursor::new(stream_of(&records)), |p| ticks.push(p))
            .unwrap();

        assert_eq!(summary.records, 2);
        assert_eq!(summary.fields, 6);
        assert_eq!(summary.subfields, 6);
        assert_eq!(summary.skipped, 0);
        assert_eq!(
            ticks,
            vec![
                Progress::Processed(1),
                Progress::Processed(2),
                Progress::Committing,
                Progress::Finished(2)
            ]
        );
        let list = catalog.list_records().unwrap();
        assert_eq!(list.rows()[1].summary.author.as_deref(), Some("Y"));
    }

    #[test]
    fn test_import_skips_garbage_in_lenient_mode() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let mut bytes = b"junk\x1d".to_vec();
        bytes.extend(stream_of(&[book("A", "X")]));
        let summary = catalog.import_stream(Cursor::new(bytes.clone()), |_| {}).unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(summary.skipped, 1);

        let mut strict = Catalog::open_in_memory().unwrap();
        strict.set_recovery_mode(RecoveryMode::Strict);
        assert!(strict.import_stream(Cursor::new(bytes), |_| {}).is_err());
        assert_eq!(strict.record_count().unwrap(), 0);
    }

    #[test]
    fn test_export_round_trip() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let records = vec![book("A", "X"), book("B", "Y"), book("C", "Z")];
        catalog
            .import_stream(Cursor::new(stream_of(&records)), |_| {})
            .unwrap();

        let mut out = Vec::new();
        assert_eq!(catalog.export_stream(&mut out, None, |_| {}).unwrap(), 3);
        let decoded: Vec<Record> = MarcReader::new(Cursor::new(out))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(decoded, records);

        let mut out = Vec::new();
        catalog.export_stream(&mut out, Some(&[3, 1][..]), |_| {}).unwrap();
        let decoded: Vec<Record> = MarcReader::new(Cursor::new(out))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(decoded, vec![records[2].clone(), records[0].clone()]);
    }

    #[test]
    fn test_replace_respects_filters() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let id = catalog.insert_record(&book("abc", "abc")).unwrap().id;

        let request = ReplaceRequest::new("abc", "xyz")
            .with_filters(ReplaceFilters::new().tag("245").codes(['a', 'b']));
        assert_eq!(catalog.apply_filtered_replace(&request, |_| {}).unwrap(), 1);

        let record = catalog.record(id).unwrap();
        assert_eq!(record.first_subfield("245", 'a'), Some("xyz"));
        assert_eq!(record.first_subfield("100", 'a'), Some("abc"));
        let row = catalog.record_row(id).unwrap();
        assert_eq!(row.summary.title.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_replace_case_asymmetry() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let id = catalog.insert_record(&book("ABCabc", "ABCabc")).unwrap().id;
        let only_title = ReplaceFilters::new().tag("245").codes(['a']);

        let sensitive = ReplaceRequest::new("abc", "-").with_filters(only_title.clone());
        assert_eq!(catalog.apply_filtered_replace(&sensitive, |_| {}).unwrap(), 1);
        assert_eq!(
            catalog.record(id).unwrap().first_subfield("245", 'a'),
            Some("ABC-")
        );

        let insensitive = ReplaceRequest::new("abc", "+")
            .with_filters(ReplaceFilters::new().tag("100"))
            .case_sensitive(false);
        assert_eq!(catalog.apply_filtered_replace(&insensitive, |_| {}).unwrap(), 1);
        assert_eq!(
            catalog.record(id).unwrap().first_subfield("100", 'a'),
            Some("+abc")
        );
    }

    #[test]
    fn test_replace_counts_only_changed_rows() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        catalog.insert_record(&book("same", "other")).unwrap();
        let request = ReplaceRequest::new("same", "same");
        assert_eq!(catalog.apply_filtered_replace(&request, |_| {}).unwrap(), 0);
        let request = ReplaceRequest::new("missing", "x");
        assert_eq!(catalog.apply_filtered_replace(&request, |_| {}).unwrap(), 0);
    }

    #[test]
    fn test_replace_rejects_empty_search() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        catalog.insert_record(&book("A", "X")).unwrap();
        assert!(matches!(
            catalog.apply_filtered_replace(&ReplaceRequest::new("", "x"), |_| {}),
            Err(MarcError::Validation(ValidationError::EmptySearch))
        ));
    }

    #[test]
    fn test_replace_reports_progress() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        catalog.insert_record(&book("abc", "abc")).unwrap();
        catalog.insert_record(&book("abc two", "other")).unwrap();

        let mut ticks = Vec::new();
        let request = ReplaceRequest::new("abc", "xyz");
        let changed = catalog
            .apply_filtered_replace(&request, |p| ticks.push(p))
            .unwrap();

        // 100$a and 245$a of the first book, 245$a of the second.
        assert_eq!(changed, 3);
        assert_eq!(
            ticks,
            vec![
                Progress::Processed(1),
                Progress::Processed(2),
                Progress::Processed(3),
                Progress::Committing,
                Progress::Finished(3)
            ]
        );
    }

    #[test]
    fn test_replace_rejects_reserved_replacement() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let id = catalog.insert_record(&book("abc", "X")).unwrap().id;

        let request = ReplaceRequest::new("abc", "a\u{1e}b");
        assert!(matches!(
            catalog.apply_filtered_replace(&request, |_| {}),
            Err(MarcError::Validation(ValidationError::ReservedByte { byte: 0x1E, .. }))
        ));
        assert_eq!(catalog.record(id).unwrap(), book("abc", "X"));

        let mut out = Vec::new();
        assert_eq!(catalog.export_stream(&mut out, None, |_| {}).unwrap(), 1);
    }
}
