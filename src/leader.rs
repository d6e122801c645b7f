//! Record leader parsing and serialization.
//!
//! The leader is the 24-byte fixed-length header at the start of every record.
//! Two of its positions are structural and computed by the writer: the record
//! length and the base address of the field data. The remaining positions
//! describe the record and are carried through unchanged.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Record type (a = language material, c = music, etc.)
//! - Position 7: Bibliographic level (m = monograph, s = serial, etc.)
//! - Position 8: Control record type
//! - Position 9: Character coding (space = MARC-8, a = UTF-8)
//! - Position 10: Indicator count (usually 2)
//! - Position 11: Subfield code count (usually 2)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Encoding level, cataloging form, multipart level
//! - Positions 20-23: Entry map (usually "4500")

use std::fmt;
use std::str::FromStr;

use crate::error::{MarcError, Result};
use serde::{Deserialize, Serialize};

/// Length of the leader in bytes.
pub const LEADER_LEN: usize = 24;

/// Largest value a 5-digit leader number can hold.
pub const MAX_FIVE_DIGITS: u32 = 99_999;

/// Record leader: the 24 bytes at the start of every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    /// Record length (5 digits) - positions 0-4
    pub record_length: u32,
    /// Record status (1 char) - position 5
    pub record_status: char,
    /// Type of record (1 char) - position 6
    pub record_type: char,
    /// Bibliographic level (1 char) - position 7
    pub bibliographic_level: char,
    /// Type of control record (1 char) - position 8
    pub control_record_type: char,
    /// Character coding scheme (1 char) - position 9
    pub character_coding: char,
    /// Indicator count (1 digit) - position 10 (usually 2)
    pub indicator_count: u8,
    /// Subfield code count (1 digit) - position 11 (usually 2)
    pub subfield_code_count: u8,
    /// Base address of data (5 digits) - positions 12-16
    pub data_base_address: u32,
    /// Encoding level (1 char) - position 17
    pub encoding_level: char,
    /// Cataloging form (1 char) - position 18
    pub cataloging_form: char,
    /// Multipart resource record level (1 char) - position 19
    pub multipart_level: char,
    /// Entry map (4 chars) - positions 20-23
    pub reserved: String,
}

impl Default for Leader {
    /// Leader of a new, empty UTF-8 monograph record. Length and base address
    /// are zero until the record is encoded.
    fn default() -> Self {
        Leader {
            record_length: 0,
            record_status: 'n',
            record_type: 'a',
            bibliographic_level: 'm',
            control_record_type: ' ',
            character_coding: 'a',
            indicator_count: 2,
            subfield_code_count: 2,
            data_base_address: 0,
            encoding_level: ' ',
            cataloging_form: ' ',
            multipart_level: ' ',
            reserved: "4500".to_string(),
        }
    }
}

impl Leader {
    /// Parse a leader from its 24 bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 24 bytes are given, a numeric position
    /// does not hold digits or a descriptive position holds a non-ASCII byte.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LEADER_LEN {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be at least 24 bytes, got {}",
                bytes.len()
            )));
        }

        let record_length = parse_digits(&bytes[0..5])?;
        let indicator_count = parse_count(bytes[10], 10)?;
        let subfield_code_count = parse_count(bytes[11], 11)?;
        let data_base_address = parse_digits(&bytes[12..17])?;

        let position = |at: usize| descriptive(bytes[at], at);

        Ok(Leader {
            record_length,
            record_status: position(5)?,
            record_type: position(6)?,
            bibliographic_level: position(7)?,
            control_record_type: position(8)?,
            character_coding: position(9)?,
            indicator_count,
            subfield_code_count,
            data_base_address,
            encoding_level: position(17)?,
            cataloging_form: position(18)?,
            multipart_level: position(19)?,
            reserved: (20..LEADER_LEN).map(position).collect::<Result<String>>()?,
        })
    }

    /// Validate that the leader can frame a record of `available` bytes.
    ///
    /// The base address must lie after the leader and inside the record;
    /// without that the directory and field data cannot be located.
    ///
    /// # Errors
    ///
    /// Returns an error if `record_length` or `data_base_address` is out of range.
    pub fn validate_for_reading(&self) -> Result<()> {
        if (self.record_length as usize) <= LEADER_LEN {
            return Err(MarcError::InvalidLeader(format!(
                "Record length must be greater than 24, got {}",
                self.record_length
            )));
        }
        if (self.data_base_address as usize) <= LEADER_LEN {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data must be greater than 24, got {}",
                self.data_base_address
            )));
        }
        if self.data_base_address > self.record_length {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data {} lies beyond record length {}",
                self.data_base_address, self.record_length
            )));
        }
        Ok(())
    }

    /// Serialize the leader to its 24 bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if a number does not fit its width or a position holds
    /// a non-ASCII character.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        if self.record_length > MAX_FIVE_DIGITS {
            return Err(MarcError::EncodeError(format!(
                "Record length {} exceeds 5 digits",
                self.record_length
            )));
        }
        if self.data_base_address > MAX_FIVE_DIGITS {
            return Err(MarcError::EncodeError(format!(
                "Base address {} exceeds 5 digits",
                self.data_base_address
            )));
        }
        if self.indicator_count > 9 || self.subfield_code_count > 9 {
            return Err(MarcError::InvalidLeader(
                "Indicator and subfield code counts must be single digits".to_string(),
            ));
        }

        let mut bytes = Vec::with_capacity(LEADER_LEN);
        bytes.extend_from_slice(format!("{:05}", self.record_length).as_bytes());
        for ch in [
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
        ] {
            bytes.push(ascii_byte(ch)?);
        }
        bytes.push(b'0' + self.indicator_count);
        bytes.push(b'0' + self.subfield_code_count);
        bytes.extend_from_slice(format!("{:05}", self.data_base_address).as_bytes());
        for ch in [
            self.encoding_level,
            self.cataloging_form,
            self.multipart_level,
        ] {
            bytes.push(ascii_byte(ch)?);
        }

        let reserved_bytes = self.reserved.as_bytes();
        if reserved_bytes.len() != 4 || !self.reserved.is_ascii() {
            return Err(MarcError::InvalidLeader(format!(
                "Entry map must be 4 ASCII characters, got '{}'",
                self.reserved
            )));
        }
        bytes.extend_from_slice(reserved_bytes);

        Ok(bytes)
    }

    /// Copy of this leader with the two computed positions zeroed.
    ///
    /// Two leaders describe the same record when their descriptive positions
    /// agree, whatever lengths the last encoding produced.
    #[must_use]
    pub fn without_lengths(&self) -> Leader {
        Leader {
            record_length: 0,
            data_base_address: 0,
            ..self.clone()
        }
    }
}

impl fmt::Display for Leader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:05}{}{}{}{}{}{}{}{:05}{}{}{}{}",
            self.record_length,
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
            self.indicator_count,
            self.subfield_code_count,
            self.data_base_address,
            self.encoding_level,
            self.cataloging_form,
            self.multipart_level,
            self.reserved
        )
    }
}

impl FromStr for Leader {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != LEADER_LEN {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be exactly 24 bytes, got {}",
                s.len()
            )));
        }
        Leader::from_bytes(s.as_bytes())
    }
}

fn ascii_byte(ch: char) -> Result<u8> {
    if ch.is_ascii() {
        Ok(ch as u8)
    } else {
        Err(MarcError::InvalidLeader(format!(
            "Leader position holds non-ASCII character '{ch}'"
        )))
    }
}

fn descriptive(byte: u8, position: usize) -> Result<char> {
    if byte.is_ascii() {
        Ok(char::from(byte))
    } else {
        Err(MarcError::InvalidLeader(format!(
            "Position {position} holds non-ASCII byte 0x{byte:02X}"
        )))
    }
}

fn parse_count(byte: u8, position: usize) -> Result<u8> {
    if byte.is_ascii_digit() {
        Ok(byte - b'0')
    } else {
        Err(MarcError::InvalidLeader(format!(
            "Invalid count at position {position}: '{}'",
            char::from(byte)
        )))
    }
}

/// Parse 5-digit ASCII number from bytes
fn parse_digits(bytes: &[u8]) -> Result<u32> {
    if bytes.len() != 5 || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(MarcError::InvalidLeader(format!(
            "Invalid numeric field: '{}'",
            String::from_utf8_lossy(bytes)
        )));
    }
    Ok(bytes
        .iter()
        .fold(0u32, |acc, &b| acc * 10 + u32::from(b - b'0')))
}
