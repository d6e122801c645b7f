//! SQLite-backed catalog store.
//!
//! A [`Catalog`] owns one connection to a database holding the three-table
//! relational mirror of the records (`Records`, `Fields`, `Subfields`). It is
//! the only writer: every mutating operation takes `&mut self` and runs in
//! one transaction, so a failure leaves the tables as they were.
//!
//! Operations are split across submodules:
//! - reading and rendering records lives here
//! - validated record, field and subfield edits live in `edit`
//! - import, export and find-and-replace live in `bulk`
//!
//! Deletes never rely on the engine's `ON DELETE CASCADE`: the rows to remove
//! are planned with [`CascadePlan`] and deleted dependents first.
//!
//! # Examples
//!
//! ```
//! use marc_catalog::{Catalog, DataField, Leader, Record};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut catalog = Catalog::open_in_memory()?;
//!
//! let mut record = Record::new(Leader::default());
//! record.add_field(DataField::builder("245", '1', '0').subfield('a', "Title").build()?);
//! let row = catalog.insert_record(&record)?;
//!
//! assert_eq!(row.summary.title.as_deref(), Some("Title"));
//! assert_eq!(catalog.record(row.id)?, record);
//! # Ok(())
//! # }
//! ```

mod bulk;
mod edit;
mod schema;

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

pub use bulk::{ImportSummary, Progress};
pub use edit::Edit;

use crate::config::CatalogConfig;
use crate::error::{MarcError, Result};
use crate::mapper::{CascadePlan, FieldRow, FlatRecord, RecordId, RecordRow, SubfieldRow};
use crate::reader::RecoveryMode;
use crate::record::Record;
use crate::summary::{derive_summaries, RecordList, Summary, SummarySource};

/// Handle on a catalog database.
#[derive(Debug)]
pub struct Catalog {
    conn: Connection,
    recovery_mode: RecoveryMode,
}

impl Catalog {
    /// Open (creating if needed) the database named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub fn open(config: &CatalogConfig) -> Result<Self> {
        let conn = Connection::open(&config.database)?;
        debug!(database = %config.database.display(), "opened catalog");
        Self::with_connection(conn, config)
    }

    /// Open a private in-memory catalog with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, &CatalogConfig::default())
    }

    fn with_connection(conn: Connection, config: &CatalogConfig) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;
        schema::create(&conn)?;
        Ok(Catalog {
            conn,
            recovery_mode: config.recovery_mode,
        })
    }

    /// Recovery mode used when importing.
    #[must_use]
    pub fn recovery_mode(&self) -> RecoveryMode {
        self.recovery_mode
    }

    /// Change the recovery mode used when importing.
    pub fn set_recovery_mode(&mut self, mode: RecoveryMode) {
        self.recovery_mode = mode;
    }

    /// Number of records in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn record_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM Records", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// All record rows, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_records(&self) -> Result<RecordList> {
        let sql = format!("SELECT {} FROM Records ORDER BY id", schema::RECORD_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], schema::record_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(RecordList::new(rows))
    }

    /// One record row.
    ///
    /// # Errors
    ///
    /// [`MarcError::NotFound`] when no such record exists.
    pub fn record_row(&self, id: RecordId) -> Result<RecordRow> {
        record_row_by_id(&self.conn, id)
    }

    /// The rows of one record, fields and subfields ordered by id.
    ///
    /// # Errors
    ///
    /// [`MarcError::NotFound`] when no such record exists.
    pub fn load_record(&self, id: RecordId) -> Result<FlatRecord> {
        load_rows(&self.conn, id)
    }

    /// One record, rebuilt from its rows.
    ///
    /// # Errors
    ///
    /// [`MarcError::NotFound`] when no such record exists,
    /// [`MarcError::InconsistentRows`] when its rows do not form a record.
    pub fn record(&self, id: RecordId) -> Result<Record> {
        self.load_record(id)?.reconstruct()
    }

    /// Multi-line human rendering of one record.
    ///
    /// # Errors
    ///
    /// See [`Catalog::record`].
    pub fn preview_text(&self, id: RecordId) -> Result<String> {
        Ok(self.record(id)?.to_string())
    }
}

fn record_row_by_id(conn: &Connection, id: RecordId) -> Result<RecordRow> {
    let sql = format!("SELECT {} FROM Records WHERE id = ?1", schema::RECORD_COLUMNS);
    conn.query_row(&sql, [id], schema::record_row)
        .optional()?
        .ok_or_else(|| MarcError::not_found("record", id))
}

fn field_by_id(conn: &Connection, id: i64) -> Result<FieldRow> {
    let sql = format!("SELECT {} FROM Fields WHERE id = ?1", schema::FIELD_COLUMNS);
    conn.query_row(&sql, [id], schema::field_row)
        .optional()?
        .ok_or_else(|| MarcError::not_found("field", id))
}

fn subfield_by_id(conn: &Connection, id: i64) -> Result<(SubfieldRow, RecordId)> {
    let sql = "SELECT s.id, s.field_id, s.code, s.data, f.record_id
               FROM Subfields s JOIN Fields f ON f.id = s.field_id
               WHERE s.id = ?1";
    conn.query_row(sql, [id], |row| Ok((schema::subfield_row(row)?, row.get(4)?)))
        .optional()?
        .ok_or_else(|| MarcError::not_found("subfield", id))
}

fn subfields_of_field(conn: &Connection, field_id: i64) -> Result<Vec<SubfieldRow>> {
    let sql = format!(
        "SELECT {} FROM Subfields WHERE field_id = ?1 ORDER BY id",
        schema::SUBFIELD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([field_id], schema::subfield_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn load_rows(conn: &Connection, id: RecordId) -> Result<FlatRecord> {
    let record = record_row_by_id(conn, id)?;

    let sql = format!(
        "SELECT {} FROM Fields WHERE record_id = ?1 ORDER BY id",
        schema::FIELD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let fields = stmt
        .query_map([id], schema::field_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT s.id, s.field_id, s.code, s.data
         FROM Subfields s JOIN Fields f ON f.id = s.field_id
         WHERE f.record_id = ?1
         ORDER BY s.id",
    )?;
    let subfields = stmt
        .query_map([id], schema::subfield_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(FlatRecord {
        record,
        fields,
        subfields,
    })
}

fn insert_flat(conn: &Connection, flat: &FlatRecord) -> Result<()> {
    schema::insert_record(conn, &flat.record)?;
    for field in &flat.fields {
        schema::insert_field(conn, field)?;
    }
    for subfield in &flat.subfields {
        schema::insert_subfield(conn, subfield)?;
    }
    Ok(())
}

/// Delete every row of a plan, subfields first. Returns the number of rows removed.
fn execute_plan(conn: &Connection, plan: &CascadePlan) -> Result<usize> {
    let mut removed = 0;
    for (table, ids) in [
        ("Subfields", &plan.subfield_ids),
        ("Fields", &plan.field_ids),
        ("Records", &plan.record_ids),
    ] {
        let mut stmt = conn.prepare_cached(&format!("DELETE FROM {table} WHERE id = ?1"))?;
        for id in ids {
            removed += stmt.execute([id])?;
        }
    }
    Ok(removed)
}

/// Recompute derived columns for one record or, with `None`, for all.
///
/// Returns the number of record rows updated.
fn rebuild_in(conn: &Connection, target: Option<RecordId>) -> Result<usize> {
    let now = Utc::now();

    let mut stmt = conn.prepare_cached(
        "SELECT f.record_id, f.tag, s.code, s.data
         FROM Subfields s JOIN Fields f ON f.id = s.field_id
         WHERE ?1 IS NULL OR f.record_id = ?1
         ORDER BY f.record_id, f.id, s.code, s.id",
    )?;
    let sources = stmt
        .query_map([target], |row| {
            let code: String = row.get(2)?;
            Ok(SummarySource {
                record_id: row.get(0)?,
                tag: row.get(1)?,
                code: code.chars().next().unwrap_or(' '),
                data: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let mut derived: BTreeMap<RecordId, Summary> = derive_summaries(sources).into_iter().collect();

    let mut ids_stmt =
        conn.prepare_cached("SELECT id FROM Records WHERE ?1 IS NULL OR id = ?1 ORDER BY id")?;
    let record_ids = ids_stmt
        .query_map([target], |row| row.get::<_, RecordId>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut update = conn.prepare_cached(
        "UPDATE Records
         SET author = ?1, title = ?2, barcode = ?3, classification = ?4, main_entry = ?5,
             date_changed = ?6
         WHERE id = ?7",
    )?;
    for id in &record_ids {
        let summary = derived.remove(id).unwrap_or_default();
        update.execute(params![
            summary.author,
            summary.title,
            summary.barcode,
            summary.classification,
            summary.main_entry,
            now,
            id,
        ])?;
    }

    if let (Some(id), true) = (target, record_ids.is_empty()) {
        return Err(MarcError::not_found("record", id));
    }
    Ok(record_ids.len())
}

/// Recompute one record's summary and return its refreshed row.
fn refresh_summary(conn: &Connection, id: RecordId) -> Result<RecordRow> {
    rebuild_in(conn, Some(id))?;
    record_row_by_id(conn, id)
}
