//! Records report.
//!
//! Writes a [`RecordList`] for external viewers, either as CSV with one row
//! per record or as a fixed-width text table for the terminal.
//!
//! # Examples
//!
//! ```
//! use marc_catalog::{report, Catalog};
//!
//! let catalog = Catalog::open_in_memory()?;
//! let mut out = Vec::new();
//! report::write_csv(&mut out, &catalog.list_records()?)?;
//! assert!(String::from_utf8_lossy(&out).starts_with("id,date_added"));
//! # Ok::<(), marc_catalog::MarcError>(())
//! ```

use std::io::Write;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::mapper::RecordRow;
use crate::summary::RecordList;

/// CSV column headers, in output order.
pub const CSV_HEADERS: [&str; 8] = [
    "id",
    "date_added",
    "date_changed",
    "author",
    "title",
    "barcode",
    "classification",
    "main_entry",
];

/// Write `records` as CSV, header first. Timestamps are RFC 3339; missing
/// values are empty cells.
///
/// # Errors
///
/// Returns [`MarcError::Report`](crate::MarcError::Report) if a row cannot be
/// written.
pub fn write_csv<W: Write>(writer: W, records: &RecordList) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(CSV_HEADERS)?;
    for row in records.rows() {
        let summary = &row.summary;
        out.write_record([
            row.id.to_string().as_str(),
            row.date_added.to_rfc3339().as_str(),
            row.date_changed
                .map(|d| d.to_rfc3339())
                .unwrap_or_default()
                .as_str(),
            summary.author.as_deref().unwrap_or(""),
            summary.title.as_deref().unwrap_or(""),
            summary.barcode.as_deref().unwrap_or(""),
            summary.classification.as_deref().unwrap_or(""),
            summary.main_entry.as_deref().unwrap_or(""),
        ])?;
    }
    out.flush()?;
    Ok(())
}

const TABLE_COLUMNS: [(&str, usize); 6] = [
    ("ID", 6),
    ("ADDED", 16),
    ("AUTHOR", 24),
    ("TITLE", 40),
    ("BARCODE", 14),
    ("CLASS", 16),
];

/// Write `records` as a fixed-width table. Long values are cut with `~`.
///
/// # Errors
///
/// Returns [`MarcError::IoError`](crate::MarcError::IoError) on write failure.
pub fn write_table<W: Write>(mut writer: W, records: &RecordList) -> Result<()> {
    let header: Vec<&str> = TABLE_COLUMNS.iter().map(|(name, _)| *name).collect();
    writeln!(writer, "{}", table_line(&header))?;
    for row in records.rows() {
        let cells = table_cells(row);
        let cells: Vec<&str> = cells.iter().map(String::as_str).collect();
        writeln!(writer, "{}", table_line(&cells))?;
    }
    writeln!(writer, "{} record(s)", records.len())?;
    Ok(())
}

fn table_cells(row: &RecordRow) -> [String; 6] {
    let summary = &row.summary;
    [
        row.id.to_string(),
        short_date(row.date_added),
        summary.author.clone().unwrap_or_default(),
        summary.title.clone().unwrap_or_default(),
        summary.barcode.clone().unwrap_or_default(),
        summary.classification.clone().unwrap_or_default(),
    ]
}

fn short_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M").to_string()
}

fn table_line(cells: &[&str]) -> String {
    let mut line = String::new();
    for (cell, (_, width)) in cells.iter().zip(TABLE_COLUMNS) {
        if !line.is_empty() {
            line.push_str("  ");
        }
        line.push_str(&fit(cell, width));
    }
    line.trim_end().to_string()
}

/// Pad or cut `value` to exactly `width` characters.
fn fit(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        let mut cut: String = value.chars().take(width - 1).collect();
        cut.push('~');
        cut
    } else {
        format!("{value:<width$}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::Summary;
    use chrono::TimeZone;

    fn row(id: i64, title: &str, author: Option<&str>) -> RecordRow {
        RecordRow {
            id,
            date_added: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            date_changed: None,
            summary: Summary {
                author: author.map(str::to_string),
                title: Some(title.to_string()),
                ..Summary::default()
            },
            leader: None,
        }
    }

    #[test]
    fn test_csv_rows() {
        let list = RecordList::new(vec![
            row(2, "Second, with comma", None),
            row(1, "First", Some("Smith")),
        ]);
        let mut out = Vec::new();
        write_csv(&mut out, &list).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "id,date_added,date_changed,author,title,barcode,classification,main_entry"
        );
        assert_eq!(lines[1], "1,2024-03-01T09:30:00+00:00,,Smith,First,,,");
        assert_eq!(lines[2], "2,2024-03-01T09:30:00+00:00,,,\"Second, with comma\",,,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_table_layout() {
        let list = RecordList::new(vec![row(7, "Moby Dick", Some("Melville"))]);
        let mut out = Vec::new();
        write_table(&mut out, &list).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("ID      ADDED"));
        assert!(lines[1].starts_with("7       2024-03-01 09:30  Melville"));
        assert!(lines[1].contains("Moby Dick"));
        assert_eq!(lines[2], "1 record(s)");
    }

    #[test]
    fn test_fit_cuts_long_values() {
        assert_eq!(fit("abcdef", 4), "abc~");
        assert_eq!(fit("ab", 4), "ab  ");
        assert_eq!(fit("ééééé", 3), "éé~");
    }
}
