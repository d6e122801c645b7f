//! Derived summary columns.
//!
//! Each record row carries five derived attributes (author, title, barcode,
//! classification and main entry) that are recomputed from the record's
//! subfields after every change and never edited by hand.
//!
//! Every attribute has a ranked list of `(tag, code)` sources. The value of
//! the best-ranked source present wins, whatever order the subfields come
//! in; among occurrences of the same source the first one wins. The title is
//! the first `245$a`, followed by one space and the first `245$b` when both
//! are present.
//!
//! [`derive_summaries`] runs the accumulator over subfield rows of many
//! records in one pass. [`Summary::from_record`] runs the same accumulator
//! over an in-memory [`Record`].

use serde::Serialize;

use crate::mapper::{RecordId, RecordRow};
use crate::record::Record;

const AUTHOR_SOURCES: &[(&str, char)] = &[("100", 'a'), ("245", 'c')];
const TITLE_SOURCES: &[(&str, char)] = &[("245", 'a')];
const SUBTITLE_SOURCES: &[(&str, char)] = &[("245", 'b')];
const BARCODE_SOURCES: &[(&str, char)] = &[("852", 'p'), ("949", 'i')];
const CLASSIFICATION_SOURCES: &[(&str, char)] = &[("050", 'a'), ("082", 'a'), ("090", 'a')];
const MAIN_ENTRY_SOURCES: &[(&str, char)] =
    &[("100", 'a'), ("110", 'a'), ("111", 'a'), ("130", 'a')];

/// The derived columns of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// `100$a`, else `245$c`
    pub author: Option<String>,
    /// `245$a`, with ` 245$b` appended when present
    pub title: Option<String>,
    /// `852$p`, else `949$i`
    pub barcode: Option<String>,
    /// `050$a`, else `082$a`, else `090$a`
    pub classification: Option<String>,
    /// `100$a`, else `110$a`, else `111$a`, else `130$a`
    pub main_entry: Option<String>,
}

impl Summary {
    /// Derive the summary of an in-memory record.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        let mut acc = SummaryAccumulator::new();
        for field in record.fields.iter().filter_map(|f| f.as_data()) {
            for subfield in &field.subfields {
                acc.offer(field.tag(), subfield.code, &subfield.data);
            }
        }
        acc.finish()
    }
}

/// Best value seen so far for one attribute.
#[derive(Debug, Clone, Default)]
struct Ranked {
    best: Option<(usize, String)>,
}

impl Ranked {
    fn offer(&mut self, sources: &[(&str, char)], tag: &str, code: char, data: &str) {
        let Some(rank) = sources.iter().position(|&(t, c)| t == tag && c == code) else {
            return;
        };
        if self.best.as_ref().map_or(true, |(best, _)| rank < *best) {
            self.best = Some((rank, data.to_string()));
        }
    }

    fn into_value(self) -> Option<String> {
        self.best.map(|(_, value)| value)
    }
}

/// Accumulates one record's summary from its subfields.
#[derive(Debug, Clone, Default)]
pub struct SummaryAccumulator {
    author: Ranked,
    title: Ranked,
    subtitle: Ranked,
    barcode: Ranked,
    classification: Ranked,
    main_entry: Ranked,
}

impl SummaryAccumulator {
    /// An empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consider one subfield occurrence.
    pub fn offer(&mut self, tag: &str, code: char, data: &str) {
        self.author.offer(AUTHOR_SOURCES, tag, code, data);
        self.title.offer(TITLE_SOURCES, tag, code, data);
        self.subtitle.offer(SUBTITLE_SOURCES, tag, code, data);
        self.barcode.offer(BARCODE_SOURCES, tag, code, data);
        self.classification
            .offer(CLASSIFICATION_SOURCES, tag, code, data);
        self.main_entry.offer(MAIN_ENTRY_SOURCES, tag, code, data);
    }

    /// The finished summary.
    #[must_use]
    pub fn finish(self) -> Summary {
        let title = match (self.title.into_value(), self.subtitle.into_value()) {
            (Some(title), Some(subtitle)) => Some(format!("{title} {subtitle}")),
            (title, _) => title,
        };
        Summary {
            author: self.author.into_value(),
            title,
            barcode: self.barcode.into_value(),
            classification: self.classification.into_value(),
            main_entry: self.main_entry.into_value(),
        }
    }
}

/// One subfield as seen by the deriver, joined with its field's tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySource {
    /// Owning record
    pub record_id: RecordId,
    /// Tag of the owning field
    pub tag: String,
    /// Subfield code
    pub code: char,
    /// Subfield data
    pub data: String,
}

/// Derive summaries in one pass over subfield rows sorted by record id.
///
/// The accumulator is reset whenever the record id changes. Records with no
/// subfields produce no entry; callers fill those with [`Summary::default`].
pub fn derive_summaries<I>(rows: I) -> Vec<(RecordId, Summary)>
where
    I: IntoIterator<Item = SummarySource>,
{
    let mut out = Vec::new();
    let mut current: Option<(RecordId, SummaryAccumulator)> = None;

    for row in rows {
        if let Some((id, acc)) = current.as_mut() {
            if *id == row.record_id {
                acc.offer(&row.tag, row.code, &row.data);
                continue;
            }
        }
        if let Some((id, acc)) = current.take() {
            out.push((id, acc.finish()));
        }
        let mut acc = SummaryAccumulator::new();
        acc.offer(&row.tag, row.code, &row.data);
        current = Some((row.record_id, acc));
    }
    if let Some((id, acc)) = current {
        out.push((id, acc.finish()));
    }
    out
}

/// Presentation rows of the record list, in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordList {
    rows: Vec<RecordRow>,
}

impl RecordList {
    /// Wrap rows, sorting them by id.
    #[must_use]
    pub fn new(mut rows: Vec<RecordRow>) -> Self {
        rows.sort_by_key(|row| row.id);
        RecordList { rows }
    }

    /// The rows
    #[must_use]
    pub fn rows(&self) -> &[RecordRow] {
        &self.rows
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for one record
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&RecordRow> {
        self.position(id).ok().map(|at| &self.rows[at])
    }

    /// Replace the row for `row.id`, or insert it in id order.
    pub fn refresh(&mut self, row: RecordRow) {
        match self.position(row.id) {
            Ok(at) => self.rows[at] = row,
            Err(at) => self.rows.insert(at, row),
        }
    }

    /// Drop the row for a deleted record.
    pub fn remove(&mut self, id: RecordId) -> Option<RecordRow> {
        self.position(id).ok().map(|at| self.rows.remove(at))
    }

    fn position(&self, id: RecordId) -> std::result::Result<usize, usize> {
        self.rows.binary_search_by_key(&id, |row| row.id)
    }
}
