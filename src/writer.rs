//! Writing records in ISO 2709 binary format.
//!
//! [`encode_record`] turns one [`Record`] into its wire bytes. [`MarcWriter`]
//! streams encoded records to any [`std::io::Write`] destination.
//!
//! Encoding fails closed: every length, offset and structural byte is checked
//! while the record is assembled in memory, and nothing reaches the
//! destination unless the whole record is representable.
//!
//! # Examples
//!
//! ```
//! use marc_catalog::{DataField, Leader, MarcWriter, Record};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut record = Record::new(Leader::default());
//! record.add_field(DataField::builder("245", '1', '0').subfield('a', "Title").build()?);
//!
//! let mut buffer = Vec::new();
//! let mut writer = MarcWriter::new(&mut buffer);
//! writer.write_record(&record)?;
//! writer.finish()?;
//! assert_eq!(&buffer[0..5], b"00048");
//! # Ok(())
//! # }
//! ```

use std::io::Write;

use crate::error::{MarcError, Result};
use crate::leader::{LEADER_LEN, MAX_FIVE_DIGITS};
use crate::record::{Field, Record};
use crate::validation::is_reserved_byte;

pub(crate) const FIELD_TERMINATOR: u8 = 0x1E;
pub(crate) const SUBFIELD_DELIMITER: u8 = 0x1F;
pub(crate) const RECORD_TERMINATOR: u8 = 0x1D;

/// Length of one directory entry: tag (3), field length (4), offset (5).
pub(crate) const DIRECTORY_ENTRY_LEN: usize = 12;

const MAX_FIELD_LENGTH: usize = 9_999;

/// Encode a record to its ISO 2709 bytes.
///
/// The leader's record length and base address are recomputed; every other
/// leader position is written as stored.
///
/// # Errors
///
/// [`MarcError::EncodeError`] when a field is longer than 9999 bytes, an
/// offset or the record length exceeds 99999, a tag is not three ASCII
/// characters, an indicator or subfield code is not ASCII, or data contains
/// one of the three structural bytes.
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let mut data_area = Vec::new();
    let mut directory = Vec::with_capacity(record.fields.len() * DIRECTORY_ENTRY_LEN + 1);

    for field in &record.fields {
        let tag = field.tag();
        check_tag_bytes(tag)?;

        let start = data_area.len();
        encode_field_body(field, &mut data_area)?;
        data_area.push(FIELD_TERMINATOR);
        let field_length = data_area.len() - start;

        if field_length > MAX_FIELD_LENGTH {
            return Err(MarcError::EncodeError(format!(
                "Field {tag} is {field_length} bytes, the limit is {MAX_FIELD_LENGTH}"
            )));
        }
        if start > MAX_FIVE_DIGITS as usize {
            return Err(MarcError::EncodeError(format!(
                "Field {tag} starts at offset {start}, the limit is {MAX_FIVE_DIGITS}"
            )));
        }

        directory.extend_from_slice(tag.as_bytes());
        directory.extend_from_slice(format!("{field_length:04}").as_bytes());
        directory.extend_from_slice(format!("{start:05}").as_bytes());
    }
    directory.push(FIELD_TERMINATOR);

    let base_address = LEADER_LEN + directory.len();
    let record_length = base_address + data_area.len() + 1;
    if record_length > MAX_FIVE_DIGITS as usize {
        return Err(MarcError::EncodeError(format!(
            "Record is {record_length} bytes, the limit is {MAX_FIVE_DIGITS}"
        )));
    }

    let mut leader = record.leader.clone();
    leader.record_length = u32::try_from(record_length)
        .map_err(|_| MarcError::EncodeError("Record length out of range".to_string()))?;
    leader.data_base_address = u32::try_from(base_address)
        .map_err(|_| MarcError::EncodeError("Base address out of range".to_string()))?;

    let mut bytes = Vec::with_capacity(record_length);
    bytes.extend_from_slice(&leader.as_bytes()?);
    bytes.extend_from_slice(&directory);
    bytes.extend_from_slice(&data_area);
    bytes.push(RECORD_TERMINATOR);
    Ok(bytes)
}

fn encode_field_body(field: &Field, out: &mut Vec<u8>) -> Result<()> {
    match field {
        Field::Control(control) => {
            check_data(control.tag(), &control.data)?;
            out.extend_from_slice(control.data.as_bytes());
        },
        Field::Data(data) => {
            let tag = data.tag();
            out.push(structural_ascii(tag, "indicator", data.indicator1)?);
            out.push(structural_ascii(tag, "indicator", data.indicator2)?);
            for subfield in &data.subfields {
                out.push(SUBFIELD_DELIMITER);
                out.push(structural_ascii(tag, "subfield code", subfield.code)?);
                check_data(tag, &subfield.data)?;
                out.extend_from_slice(subfield.data.as_bytes());
            }
        },
    }
    Ok(())
}

fn check_tag_bytes(tag: &str) -> Result<()> {
    let bytes = tag.as_bytes();
    if bytes.len() != 3 || !tag.is_ascii() || bytes.iter().any(|&b| is_reserved_byte(b)) {
        return Err(MarcError::EncodeError(format!(
            "Tag '{tag}' is not three ASCII characters"
        )));
    }
    Ok(())
}

fn structural_ascii(tag: &str, what: &str, ch: char) -> Result<u8> {
    match u8::try_from(ch) {
        Ok(byte) if byte.is_ascii() && !is_reserved_byte(byte) => Ok(byte),
        _ => Err(MarcError::EncodeError(format!(
            "Field {tag} has a {what} that is not a printable ASCII character: {ch:?}"
        ))),
    }
}

fn check_data(tag: &str, data: &str) -> Result<()> {
    if data.bytes().any(is_reserved_byte) {
        return Err(MarcError::EncodeError(format!(
            "Field {tag} contains a reserved delimiter byte"
        )));
    }
    Ok(())
}

/// Writer for ISO 2709 binary format.
///
/// Records are written one at a time. A record that fails [`encode_record`]
/// leaves the destination untouched.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    records_written: usize,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a new writer.
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            records_written: 0,
            finished: false,
        }
    }

    /// Encode and write a single record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded, an I/O error occurs,
    /// or [`MarcWriter::finish`] was already called.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::InvalidRecord(
                "Cannot write to a finished writer".to_string(),
            ));
        }

        let bytes = encode_record(record)?;
        self.writer.write_all(&bytes)?;
        self.records_written += 1;
        Ok(())
    }

    /// Flush the writer and mark it as finished.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leader::Leader;
    use crate::reader::MarcReader;
    use crate::record::{ControlField, DataField};
    use std::io::Cursor;

    fn title_record(title: &str) -> Record {
        let mut record = Record::new(Leader::default());
        record.add_field(
            DataField::builder("245", '1', '0')
                .subfield('a', title)
                .build()
                .unwrap(),
        );
        record
    }

    #[test]
    fn test_write_simple_record() {
        let bytes = encode_record(&title_record("Test title")).unwrap();

        // 24 (leader) + 13 (directory entry + terminator) + 15 (field) + 1 = 53
        assert_eq!(&bytes[0..5], b"00053");
        assert_eq!(&bytes[12..17], b"00037");
        assert_eq!(&bytes[24..36], b"245001500000");
        assert_eq!(bytes[36], FIELD_TERMINATOR);
        assert_eq!(bytes.len(), 53);
        assert_eq!(*bytes.last().unwrap(), RECORD_TERMINATOR);
    }

    #[test]
    fn test_empty_record_layout() {
        let bytes = encode_record(&Record::new(Leader::default())).unwrap();
        assert_eq!(bytes.len(), 26);
        assert_eq!(&bytes[0..5], b"00026");
        assert_eq!(&bytes[12..17], b"00025");
    }

    #[test]
    fn test_interleaved_order_is_kept() {
        let mut record = Record::new(Leader::default());
        record.add_field(DataField::new("650", ' ', '0').unwrap());
        record.add_field(ControlField::new("001", "id").unwrap());
        record.add_field(DataField::new("245", '0', '0').unwrap());

        let bytes = encode_record(&record).unwrap();
        let tags: Vec<&[u8]> = bytes[24..24 + 3 * DIRECTORY_ENTRY_LEN]
            .chunks(DIRECTORY_ENTRY_LEN)
            .map(|entry| &entry[0..3])
            .collect();
        assert_eq!(tags, vec![&b"650"[..], b"001", b"245"]);
    }

    #[test]
    fn test_write_and_read_roundtrip() {
        let mut record = title_record("Test title");
        record.fields[0]
            .as_data_mut()
            .unwrap()
            .add_subfield('c', "Author");
        record.add_control_field("001", "12345").unwrap();

        let mut buffer = Vec::new();
        {
            let mut writer = MarcWriter::new(&mut buffer);
            writer.write_record(&record).unwrap();
        }

        let mut reader = MarcReader::new(Cursor::new(buffer));
        let read_record = reader.read_record().unwrap().unwrap();
        assert_eq!(read_record, record);
        assert_eq!(read_record.get_control_field("001"), Some("12345"));
        assert_eq!(read_record.first_subfield("245", 'c'), Some("Author"));
    }

    #[test]
    fn test_multibyte_lengths_are_bytes() {
        let bytes = encode_record(&title_record("Caf\u{e9}")).unwrap();
        // "10" + 0x1F 'a' + 5 bytes of data + terminator
        assert_eq!(&bytes[27..31], b"0010");
    }

    #[test]
    fn test_records_written_and_finish() {
        let record = title_record("Test");
        let mut buffer = Vec::new();
        let mut writer = MarcWriter::new(&mut buffer);
        assert_eq!(writer.records_written(), 0);
        writer.write_record(&record).unwrap();
        writer.write_record(&record).unwrap();
        assert_eq!(writer.records_written(), 2);
        writer.finish().unwrap();
        assert!(writer.write_record(&record).is_err());
    }

    #[test]
    fn test_field_too_long_fails_closed() {
        let record = title_record(&"x".repeat(10_000));
        let mut buffer = Vec::new();
        let mut writer = MarcWriter::new(&mut buffer);
        let err = writer.write_record(&record).unwrap_err();
        assert!(matches!(err, MarcError::EncodeError(_)));
        assert_eq!(writer.records_written(), 0);
        drop(writer);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_record_too_long_fails_closed() {
        let mut record = Record::new(Leader::default());
        for _ in 0..12 {
            record.add_field(
                DataField::builder("500", ' ', ' ')
                    .subfield('a', "y".repeat(9_000))
                    .build()
                    .unwrap(),
            );
        }
        assert!(matches!(
            encode_record(&record),
            Err(MarcError::EncodeError(_))
        ));
    }

    #[test]
    fn test_structural_bytes_in_data_rejected() {
        for bad in ["a\u{1d}b", "a\u{1e}b", "a\u{1f}b"] {
            assert!(encode_record(&title_record(bad)).is_err(), "{bad:?}");
        }

        let mut record = Record::new(Leader::default());
        record.add_control_field("001", "x\u{1e}").unwrap();
        assert!(encode_record(&record).is_err());
    }

    #[test]
    fn test_non_ascii_indicator_and_code_rejected() {
        let mut record = title_record("ok");
        record.fields[0].as_data_mut().unwrap().indicator1 = '\u{e9}';
        assert!(encode_record(&record).is_err());

        let mut record = title_record("ok");
        record.fields[0].as_data_mut().unwrap().add_subfield('\u{e9}', "x");
        assert!(encode_record(&record).is_err());
    }

    #[test]
    fn test_bad_tag_rejected() {
        let mut record = Record::new(Leader::default());
        record.add_field(DataField::new("24", ' ', ' ').unwrap());
        assert!(encode_record(&record).is_err());

        let mut record = Record::new(Leader::default());
        record.add_field(DataField::new("2\u{e9}", ' ', ' ').unwrap());
        assert!(encode_record(&record).is_err());
    }
}
