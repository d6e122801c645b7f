//! Table definitions and row mapping for the catalog store.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::mapper::{FieldRow, IdSequence, RecordRow, SubfieldRow};
use crate::summary::Summary;
use crate::validation::ValidationError;

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS Records (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    date_added     TEXT NOT NULL,
    date_changed   TEXT,
    author         TEXT,
    title          TEXT,
    barcode        TEXT,
    classification TEXT,
    main_entry     TEXT,
    leader         TEXT
);
CREATE TABLE IF NOT EXISTS Fields (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id    INTEGER NOT NULL REFERENCES Records(id) ON DELETE CASCADE,
    tag          TEXT NOT NULL,
    indicator1   TEXT,
    indicator2   TEXT,
    control_data TEXT
);
CREATE TABLE IF NOT EXISTS Subfields (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    field_id INTEGER NOT NULL REFERENCES Fields(id) ON DELETE CASCADE,
    code     TEXT NOT NULL,
    data     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_fields_record_id ON Fields(record_id);
CREATE INDEX IF NOT EXISTS idx_subfields_field_id ON Subfields(field_id);
";

const DROP_TABLES: &str = "
DROP TABLE IF EXISTS Subfields;
DROP TABLE IF EXISTS Fields;
DROP TABLE IF EXISTS Records;
";

pub(super) const RECORD_COLUMNS: &str =
    "id, date_added, date_changed, author, title, barcode, classification, main_entry, leader";
pub(super) const FIELD_COLUMNS: &str =
    "id, record_id, tag, indicator1, indicator2, control_data";
pub(super) const SUBFIELD_COLUMNS: &str = "id, field_id, code, data";

/// Create the three tables and their owner indexes if they are missing.
pub(super) fn create(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_TABLES)
}

/// Drop and recreate every table, which also restarts the id sequences.
pub(super) fn recreate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(DROP_TABLES)?;
    create(conn)
}

/// The id sequence continuing after the largest id each table ever issued.
pub(super) fn id_sequence(conn: &Connection) -> rusqlite::Result<IdSequence> {
    let last = |table: &str| -> rusqlite::Result<i64> {
        let seq: Option<i64> = conn
            .query_row(
                "SELECT seq FROM sqlite_sequence WHERE name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(seq.unwrap_or(0))
    };
    Ok(IdSequence::starting_after(
        last("Records")?,
        last("Fields")?,
        last("Subfields")?,
    ))
}

pub(super) fn record_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        date_added: row.get::<_, DateTime<Utc>>(1)?,
        date_changed: row.get(2)?,
        summary: Summary {
            author: row.get(3)?,
            title: row.get(4)?,
            barcode: row.get(5)?,
            classification: row.get(6)?,
            main_entry: row.get(7)?,
        },
        leader: row.get(8)?,
    })
}

pub(super) fn field_row(row: &Row<'_>) -> rusqlite::Result<FieldRow> {
    let indicator1: Option<String> = row.get(3)?;
    let indicator2: Option<String> = row.get(4)?;
    Ok(FieldRow {
        id: row.get(0)?,
        record_id: row.get(1)?,
        tag: row.get(2)?,
        indicator1: indicator1.and_then(|text| text.chars().next()),
        indicator2: indicator2.and_then(|text| text.chars().next()),
        control_data: row.get(5)?,
    })
}

pub(super) fn subfield_row(row: &Row<'_>) -> rusqlite::Result<SubfieldRow> {
    let code: String = row.get(2)?;
    let mut chars = code.chars();
    let (Some(ch), None) = (chars.next(), chars.next()) else {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            Box::new(ValidationError::InvalidSubfieldCode(code)),
        ));
    };
    Ok(SubfieldRow {
        id: row.get(0)?,
        field_id: row.get(1)?,
        code: ch,
        data: row.get(3)?,
    })
}

/// Insert a record row with its explicit id.
pub(super) fn insert_record(conn: &Connection, row: &RecordRow) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO Records (id, date_added, date_changed, author, title, barcode, classification, main_entry, leader)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    stmt.execute(rusqlite::params![
        row.id,
        row.date_added,
        row.date_changed,
        row.summary.author,
        row.summary.title,
        row.summary.barcode,
        row.summary.classification,
        row.summary.main_entry,
        row.leader,
    ])?;
    Ok(())
}

/// Insert a field row with its explicit id.
pub(super) fn insert_field(conn: &Connection, row: &FieldRow) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO Fields (id, record_id, tag, indicator1, indicator2, control_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    stmt.execute(rusqlite::params![
        row.id,
        row.record_id,
        row.tag,
        row.indicator1.map(String::from),
        row.indicator2.map(String::from),
        row.control_data,
    ])?;
    Ok(())
}

/// Insert a subfield row with its explicit id.
pub(super) fn insert_subfield(conn: &Connection, row: &SubfieldRow) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO Subfields (id, field_id, code, data) VALUES (?1, ?2, ?3, ?4)",
    )?;
    stmt.execute(rusqlite::params![
        row.id,
        row.field_id,
        String::from(row.code),
        row.data,
    ])?;
    Ok(())
}
