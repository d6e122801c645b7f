//! Reading records from ISO 2709 binary streams.
//!
//! [`MarcReader`] decodes one record at a time from any [`std::io::Read`]
//! source and is also an [`Iterator`] over `Result<Record>`. Decoding is lazy
//! and forward-only.
//!
//! Each record goes through the same stages: read the 5-digit length that
//! opens the leader, read exactly that many bytes, parse the leader, walk the
//! directory, slice and split each field, then assemble the [`Record`].
//!
//! # Recovery
//!
//! In [`RecoveryMode::Lenient`] (the default) structural inconsistencies
//! inside a record become [`Warning`]s on that record and the well-formed
//! fields are kept. A record whose length or base address cannot be
//! established is dropped and counted in [`MarcReader::records_skipped`]:
//! when its length was readable the reader is already at the next record,
//! otherwise it skips past the next record terminator (`0x1D`).
//!
//! [`RecoveryMode::Strict`] returns the first inconsistency as an error.
//!
//! # Examples
//!
//! ```
//! use marc_catalog::{DataField, Leader, MarcReader, Record};
//! use std::io::Cursor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut record = Record::new(Leader::default());
//! record.add_field(DataField::builder("245", '0', '0').subfield('a', "Title").build()?);
//! let bytes = record.to_raw()?;
//!
//! let reader = MarcReader::new(Cursor::new(bytes));
//! for decoded in reader {
//!     assert_eq!(decoded?, record);
//! }
//! # Ok(())
//! # }
//! ```

use std::io::{BufRead, BufReader, ErrorKind, Read};

use encoding_rs::WINDOWS_1252;
use memchr::{memchr, memchr_iter};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MarcError, Result};
use crate::leader::{Leader, LEADER_LEN};
use crate::record::{is_control_tag, ControlField, DataField, Field, Record, Warning};
use crate::validation::is_reserved_byte;
use crate::writer::{DIRECTORY_ENTRY_LEN, FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_DELIMITER};

const LENGTH_PREFIX_LEN: usize = 5;

/// How the decoder reacts to malformed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryMode {
    /// Keep well-formed fields, record warnings, drop unframeable records.
    #[default]
    Lenient,
    /// Return the first structural inconsistency as an error.
    Strict,
}

/// Reader for ISO 2709 binary format.
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    reader: BufReader<R>,
    recovery_mode: RecoveryMode,
    records_read: usize,
    records_skipped: usize,
    exhausted: bool,
    /// Bytes read as a length prefix that belong to the next record.
    carry: Vec<u8>,
}

impl<R: Read> MarcReader<R> {
    /// Create a new reader in [`RecoveryMode::Lenient`].
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader: BufReader::new(reader),
            recovery_mode: RecoveryMode::default(),
            records_read: 0,
            records_skipped: 0,
            exhausted: false,
            carry: Vec::new(),
        }
    }

    /// Set the recovery mode for handling malformed records.
    #[must_use]
    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery_mode = mode;
        self
    }

    /// Number of records decoded so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Number of records dropped because they could not be framed.
    #[must_use]
    pub fn records_skipped(&self) -> usize {
        self.records_skipped
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at the end of the stream.
    ///
    /// # Errors
    ///
    /// I/O errors are always returned. In [`RecoveryMode::Strict`] any
    /// malformed or truncated record is returned as an error as well.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        loop {
            let mut prefix = [0u8; LENGTH_PREFIX_LEN];
            let filled = self.read_prefix(&mut prefix)?;
            if filled == 0 {
                return Ok(None);
            }
            if filled < LENGTH_PREFIX_LEN {
                if prefix[..filled].iter().all(u8::is_ascii_whitespace) {
                    return Ok(None);
                }
                self.drop_record(MarcError::TruncatedRecord(format!(
                    "Stream ends after {filled} bytes of a record"
                )))?;
                return Ok(None);
            }

            let Some(length) = parse_length_prefix(&prefix) else {
                self.drop_record(MarcError::InvalidLeader(format!(
                    "Unreadable record length '{}'",
                    String::from_utf8_lossy(&prefix)
                )))?;
                self.skip_past_terminator(&prefix)?;
                continue;
            };
            if length <= LEADER_LEN {
                self.drop_record(MarcError::InvalidLeader(format!(
                    "Record length must be greater than 24, got {length}"
                )))?;
                self.skip_past_terminator(&prefix)?;
                continue;
            }

            let mut body = vec![0u8; length];
            body[..LENGTH_PREFIX_LEN].copy_from_slice(&prefix);
            match self.reader.read_exact(&mut body[LENGTH_PREFIX_LEN..]) {
                Ok(()) => {},
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    self.drop_record(MarcError::TruncatedRecord(format!(
                        "Stream ends inside a record of {length} bytes"
                    )))?;
                    return Ok(None);
                },
                Err(e) => return Err(MarcError::IoError(e)),
            }

            match decode_record(&body, self.recovery_mode) {
                Ok(record) => {
                    self.records_read += 1;
                    debug!(
                        record = self.records_read,
                        fields = record.fields.len(),
                        warnings = record.warnings.len(),
                        "decoded record"
                    );
                    return Ok(Some(record));
                },
                Err(e @ MarcError::InvalidLeader(_)) => {
                    self.drop_record(e)?;
                },
                Err(e) => return Err(e),
            }
        }
    }

    fn read_prefix(&mut self, prefix: &mut [u8; LENGTH_PREFIX_LEN]) -> Result<usize> {
        let mut filled = self.carry.len().min(prefix.len());
        prefix[..filled].copy_from_slice(&self.carry[..filled]);
        self.carry.drain(..filled);
        while filled < prefix.len() {
            match self.reader.read(&mut prefix[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => return Err(MarcError::IoError(e)),
            }
        }
        Ok(filled)
    }

    /// Count a record that cannot be framed, or fail in strict mode.
    fn drop_record(&mut self, reason: MarcError) -> Result<()> {
        if self.recovery_mode == RecoveryMode::Strict {
            return Err(reason);
        }
        self.records_skipped += 1;
        warn!(
            after_record = self.records_read,
            error = %reason,
            "skipping record"
        );
        Ok(())
    }

    fn skip_past_terminator(&mut self, prefix: &[u8]) -> Result<()> {
        if let Some(at) = memchr(RECORD_TERMINATOR, prefix) {
            self.carry.extend_from_slice(&prefix[at + 1..]);
            return Ok(());
        }
        let mut discarded = Vec::new();
        self.reader.read_until(RECORD_TERMINATOR, &mut discarded)?;
        debug!(bytes = discarded.len(), "resynchronized after record terminator");
        Ok(())
    }
}

impl<R: Read> Iterator for MarcReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let next = self.read_record().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.exhausted = true;
        }
        next
    }
}

/// Decode one complete record body (leader through record terminator).
///
/// # Errors
///
/// [`MarcError::InvalidLeader`] when the leader or base address cannot be
/// parsed. In [`RecoveryMode::Strict`], [`MarcError::InvalidRecord`] for the
/// first structural inconsistency.
pub fn decode_record(bytes: &[u8], mode: RecoveryMode) -> Result<Record> {
    if bytes.len() <= LEADER_LEN {
        return Err(MarcError::InvalidLeader(format!(
            "Record of {} bytes has no room for a directory",
            bytes.len()
        )));
    }
    let mut diagnostics = Diagnostics::new(mode);
    let leader = decode_leader(&bytes[..LEADER_LEN], &mut diagnostics)?;
    leader.validate_for_reading()?;
    let base = leader.data_base_address as usize;
    if base > bytes.len() {
        return Err(MarcError::InvalidLeader(format!(
            "Base address of data {base} lies beyond the {} bytes read",
            bytes.len()
        )));
    }

    let directory = &bytes[LEADER_LEN..base];
    let entries = match directory.split_last() {
        Some((&FIELD_TERMINATOR, entries)) => entries,
        _ => {
            diagnostics.structural(Warning::record("Directory is not terminated by 0x1E"))?;
            directory
        },
    };
    if entries.len() % DIRECTORY_ENTRY_LEN != 0 {
        diagnostics.structural(Warning::record(format!(
            "Directory length {} is not a multiple of {DIRECTORY_ENTRY_LEN}",
            entries.len()
        )))?;
    }

    let data = match bytes[base..].split_last() {
        Some((&RECORD_TERMINATOR, data)) => data,
        _ => {
            diagnostics.structural(Warning::record("Record does not end with 0x1D"))?;
            &bytes[base..]
        },
    };

    let mut record = Record::new(leader);
    for entry in entries.chunks_exact(DIRECTORY_ENTRY_LEN) {
        if let Some(field) = decode_entry(entry, data, &mut diagnostics)? {
            record.fields.push(field);
        }
    }
    record.warnings = diagnostics.warnings;
    Ok(record)
}

/// Parse the leader, reading non-ASCII bytes as blanks.
fn decode_leader(raw: &[u8], diag: &mut Diagnostics) -> Result<Leader> {
    let mut bytes = [0u8; LEADER_LEN];
    bytes.copy_from_slice(raw);
    for (position, byte) in bytes.iter_mut().enumerate() {
        if !byte.is_ascii() {
            diag.structural(Warning::record(format!(
                "Leader position {position} holds non-ASCII byte 0x{byte:02X} and was read as a blank"
            )))?;
            *byte = b' ';
        }
    }
    Leader::from_bytes(&bytes)
}

/// True for a byte the writer accepts as a tag, indicator or code character.
fn is_plain_ascii(byte: u8) -> bool {
    byte.is_ascii() && !is_reserved_byte(byte)
}

fn decode_entry(entry: &[u8], data: &[u8], diag: &mut Diagnostics) -> Result<Option<Field>> {
    if !entry[0..3].iter().all(|&b| is_plain_ascii(b)) {
        diag.structural(Warning::record(format!(
            "Directory entry tag {:02X?} is not three ASCII characters; field ignored",
            &entry[0..3]
        )))?;
        return Ok(None);
    }
    let tag: String = entry[0..3].iter().copied().map(char::from).collect();
    let (Some(length), Some(offset)) = (parse_digits(&entry[3..7]), parse_digits(&entry[7..12]))
    else {
        diag.structural(Warning::field(
            &tag,
            format!(
                "Directory entry has non-numeric length or offset '{}'",
                String::from_utf8_lossy(&entry[3..12])
            ),
        ))?;
        return Ok(None);
    };

    let end = offset + length;
    if end > data.len() {
        diag.structural(Warning::field(
            &tag,
            format!(
                "Field at offset {offset} with length {length} lies outside the {} bytes of field data",
                data.len()
            ),
        ))?;
        return Ok(None);
    }

    let slice = match data[offset..end].split_last() {
        Some((&FIELD_TERMINATOR, body)) => body,
        _ => {
            diag.structural(Warning::field(&tag, "Field is not terminated by 0x1E"))?;
            &data[offset..end]
        },
    };

    if is_control_tag(&tag) {
        let text = diag.text(&tag, slice)?;
        return Ok(Some(ControlField::new(tag, text)?.into()));
    }

    let [indicator1, indicator2, rest @ ..] = slice else {
        diag.structural(Warning::field(&tag, "Data field is too short to hold indicators"))?;
        return Ok(None);
    };
    let indicator1 = diag.indicator(&tag, 1, *indicator1)?;
    let indicator2 = diag.indicator(&tag, 2, *indicator2)?;
    let mut field = DataField::new(tag.clone(), indicator1, indicator2)?;

    let mut delimiters = memchr_iter(SUBFIELD_DELIMITER, rest).peekable();
    match delimiters.peek() {
        Some(&0) => {},
        None if rest.is_empty() => {},
        _ => diag.structural(Warning::field(
            &tag,
            "Data precedes the first subfield delimiter and was ignored",
        ))?,
    }
    while let Some(start) = delimiters.next() {
        let stop = delimiters.peek().copied().unwrap_or(rest.len());
        let chunk = &rest[start + 1..stop];
        let Some((&code, value)) = chunk.split_first() else {
            diag.structural(Warning::field(&tag, "Subfield delimiter without a code"))?;
            continue;
        };
        if !is_plain_ascii(code) {
            diag.structural(Warning::field(
                &tag,
                format!("Subfield code 0x{code:02X} is not ASCII; subfield ignored"),
            ))?;
            continue;
        }
        let value = diag.text(&tag, value)?;
        field.add_subfield(char::from(code), value);
    }

    Ok(Some(field.into()))
}

/// Warnings collected while decoding one record.
struct Diagnostics {
    mode: RecoveryMode,
    warnings: Vec<Warning>,
}

impl Diagnostics {
    fn new(mode: RecoveryMode) -> Self {
        Diagnostics {
            mode,
            warnings: Vec::new(),
        }
    }

    /// A structural problem: fatal in strict mode, a warning otherwise.
    fn structural(&mut self, warning: Warning) -> Result<()> {
        if self.mode == RecoveryMode::Strict {
            return Err(MarcError::InvalidRecord(warning.to_string()));
        }
        self.note(warning);
        Ok(())
    }

    fn note(&mut self, warning: Warning) {
        warn!(tag = warning.tag.as_deref(), "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Field text as UTF-8, falling back to Windows-1252. Structural bytes
    /// inside the text are removed.
    fn text(&mut self, tag: &str, bytes: &[u8]) -> Result<String> {
        let mut text = if let Ok(text) = std::str::from_utf8(bytes) {
            text.to_string()
        } else {
            self.note(Warning::field(
                tag,
                "Field data is not valid UTF-8 and was decoded as Windows-1252",
            ));
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text.into_owned()
        };
        if text.bytes().any(is_reserved_byte) {
            self.structural(Warning::field(
                tag,
                "Field data holds a structural byte, which was removed",
            ))?;
            text.retain(|ch| !u8::try_from(ch).is_ok_and(is_reserved_byte));
        }
        Ok(text)
    }

    /// An indicator byte, or a blank when the byte cannot be written back.
    fn indicator(&mut self, tag: &str, which: u8, byte: u8) -> Result<char> {
        if is_plain_ascii(byte) {
            return Ok(char::from(byte));
        }
        self.structural(Warning::field(
            tag,
            format!("Indicator {which} byte 0x{byte:02X} is not ASCII and was read as a blank"),
        ))?;
        Ok(' ')
    }
}

fn parse_length_prefix(bytes: &[u8]) -> Option<usize> {
    parse_digits(bytes)
}

/// Parse an ASCII decimal number; `None` unless every byte is a digit.
fn parse_digits(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(
        bytes
            .iter()
            .fold(0usize, |acc, &b| acc * 10 + usize::from(b - b'0')),
    )
}
