//! Structural validation of tags, indicators and subfield codes.
//!
//! Only the structural grammar of the record format is enforced here: a tag is
//! three digits or uppercase letters, an indicator is a blank, digit or
//! lowercase letter, and a subfield code is a digit or lowercase letter.
//! Per-tag cataloging rules are not checked.
//!
//! Edits are checked with the `check_*` / `parse_*` functions, which return a
//! [`ValidationError`] naming what was wrong. Callers run them before touching
//! any row so that a rejected edit never leaves a partial write behind.

use thiserror::Error;

use crate::record::{is_control_tag, Indicator};

/// Reason a field-level edit was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Tag is not three digits or uppercase letters.
    #[error("Invalid tag number: '{0}'")]
    InvalidTag(String),

    /// Indicator value is not a single blank, digit or lowercase letter.
    #[error("Invalid indicator {which}: '{value}'")]
    InvalidIndicator {
        /// Which indicator was being set
        which: Indicator,
        /// The rejected value
        value: String,
    },

    /// Subfield code is not a single digit or lowercase letter.
    #[error("Invalid subfield code: '{0}'")]
    InvalidSubfieldCode(String),

    /// The new tag would turn a control field into a data field or back.
    #[error("Cannot change a {from} field to a {to} field ('{tag}')")]
    ClassChange {
        /// Class of the field being edited
        from: FieldClass,
        /// Class the proposed tag belongs to
        to: FieldClass,
        /// The rejected tag
        tag: String,
    },

    /// The edit only applies to the other field class, for example setting an
    /// indicator on a control field.
    #[error("Operation requires a {expected} field, but field {tag} is a {actual} field")]
    WrongFieldClass {
        /// Class the operation needs
        expected: FieldClass,
        /// Class of the addressed field
        actual: FieldClass,
        /// Tag of the addressed field
        tag: String,
    },

    /// Find-and-replace was asked to search for the empty string.
    #[error("Search text must not be empty")]
    EmptySearch,

    /// Field data holds one of the record format's structural bytes
    /// (`0x1D`, `0x1E`, `0x1F`), which the writer cannot encode.
    #[error("{what} contains the reserved byte 0x{byte:02X}")]
    ReservedByte {
        /// What held the byte, such as `Data for field 245`
        what: String,
        /// The offending byte
        byte: u8,
    },
}

/// Control field or data field, as decided by the tag prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// Tag starts with `00`
    Control,
    /// Any other tag
    Data,
}

impl FieldClass {
    /// Class a tag belongs to.
    #[must_use]
    pub fn of(tag: &str) -> Self {
        if is_control_tag(tag) {
            FieldClass::Control
        } else {
            FieldClass::Data
        }
    }
}

impl std::fmt::Display for FieldClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldClass::Control => write!(f, "control"),
            FieldClass::Data => write!(f, "data"),
        }
    }
}

/// True iff `tag` is exactly three ASCII digits or uppercase letters.
///
/// ```
/// use marc_catalog::validation::validate_tag;
///
/// assert!(validate_tag("245"));
/// assert!(validate_tag("CAT"));
/// assert!(!validate_tag("24"));
/// assert!(!validate_tag("abc"));
/// ```
#[must_use]
pub fn validate_tag(tag: &str) -> bool {
    tag.len() == 3
        && tag
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}

/// True iff `ch` is a blank, an ASCII digit or an ASCII lowercase letter.
#[must_use]
pub fn validate_indicator(ch: char) -> bool {
    ch == ' ' || ch.is_ascii_digit() || ch.is_ascii_lowercase()
}

/// True iff `ch` is an ASCII digit or an ASCII lowercase letter.
#[must_use]
pub fn validate_subfield_code(ch: char) -> bool {
    ch.is_ascii_digit() || ch.is_ascii_lowercase()
}

/// Check that a field currently tagged `current` may be retagged `proposed`.
///
/// The class check runs first: crossing the control/data boundary is rejected
/// even when the proposed tag is otherwise well formed.
///
/// # Errors
///
/// [`ValidationError::ClassChange`] when the classes differ,
/// [`ValidationError::InvalidTag`] when `proposed` fails [`validate_tag`].
pub fn check_tag_change(current: &str, proposed: &str) -> Result<(), ValidationError> {
    let from = FieldClass::of(current);
    let to = FieldClass::of(proposed);
    if from != to {
        return Err(ValidationError::ClassChange {
            from,
            to,
            tag: proposed.to_string(),
        });
    }
    check_tag(proposed)
}

/// Check a tag against [`validate_tag`].
///
/// # Errors
///
/// [`ValidationError::InvalidTag`] when the tag is malformed.
pub fn check_tag(tag: &str) -> Result<(), ValidationError> {
    if validate_tag(tag) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTag(tag.to_string()))
    }
}

/// Check that the field tagged `tag` belongs to the `expected` class.
///
/// # Errors
///
/// [`ValidationError::WrongFieldClass`] when it does not.
pub fn require_class(tag: &str, expected: FieldClass) -> Result<(), ValidationError> {
    let actual = FieldClass::of(tag);
    if actual == expected {
        Ok(())
    } else {
        Err(ValidationError::WrongFieldClass {
            expected,
            actual,
            tag: tag.to_string(),
        })
    }
}

/// True for the record terminator, field terminator and subfield delimiter.
#[must_use]
pub fn is_reserved_byte(byte: u8) -> bool {
    matches!(byte, 0x1D..=0x1F)
}

/// Check field data for the structural bytes the wire format reserves.
///
/// # Errors
///
/// [`ValidationError::ReservedByte`] naming the first one found.
pub fn check_field_data(tag: &str, data: &str) -> Result<(), ValidationError> {
    check_reserved(format_args!("Data for field {tag}"), data)
}

pub(crate) fn check_reserved(
    what: impl std::fmt::Display,
    text: &str,
) -> Result<(), ValidationError> {
    match text.bytes().find(|&b| is_reserved_byte(b)) {
        Some(byte) => Err(ValidationError::ReservedByte {
            what: what.to_string(),
            byte,
        }),
        None => Ok(()),
    }
}

/// Parse user input for an indicator cell: exactly one valid character.
///
/// # Errors
///
/// [`ValidationError::InvalidIndicator`] for empty, multi-character or
/// out-of-alphabet input.
pub fn parse_indicator(which: Indicator, value: &str) -> Result<char, ValidationError> {
    match single_char(value) {
        Some(ch) if validate_indicator(ch) => Ok(ch),
        _ => Err(ValidationError::InvalidIndicator {
            which,
            value: value.to_string(),
        }),
    }
}

/// Parse user input for a subfield code cell: exactly one valid character.
///
/// # Errors
///
/// [`ValidationError::InvalidSubfieldCode`] for empty, multi-character or
/// out-of-alphabet input.
pub fn parse_subfield_code(value: &str) -> Result<char, ValidationError> {
    match single_char(value) {
        Some(ch) if validate_subfield_code(ch) => Ok(ch),
        _ => Err(ValidationError::InvalidSubfieldCode(value.to_string())),
    }
}

fn single_char(value: &str) -> Option<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tag() {
        assert!(validate_tag("001"));
        assert!(validate_tag("245"));
        assert!(validate_tag("9XX"));
        assert!(validate_tag("LDR"));
        assert!(!validate_tag(""));
        assert!(!validate_tag("24"));
        assert!(!validate_tag("2450"));
        assert!(!validate_tag("24a"));
        assert!(!validate_tag("2 5"));
        assert!(!validate_tag("2\u{e9}5"));
    }

    #[test]
    fn test_validate_indicator() {
        assert!(validate_indicator(' '));
        assert!(validate_indicator('0'));
        assert!(validate_indicator('9'));
        assert!(validate_indicator('a'));
        assert!(!validate_indicator('A'));
        assert!(!validate_indicator('#'));
        assert!(!validate_indicator('\u{1f}'));
    }

    #[test]
    fn test_validate_subfield_code() {
        assert!(validate_subfield_code('a'));
        assert!(validate_subfield_code('6'));
        assert!(!validate_subfield_code(' '));
        assert!(!validate_subfield_code('Z'));
    }

    #[test]
    fn test_field_data_reserved_bytes() {
        assert!(check_field_data("245", "Plain text, caf\u{e9}").is_ok());
        assert!(check_field_data("245", "").is_ok());
        assert_eq!(
            check_field_data("245", "x\u{1d}y"),
            Err(ValidationError::ReservedByte {
                what: "Data for field 245".to_string(),
                byte: 0x1D
            })
        );
        assert!(check_field_data("001", "a\u{1e}").is_err());
        assert!(check_field_data("500", "\u{1f}a").is_err());
        assert!(!is_reserved_byte(0x1C));
        assert!(!is_reserved_byte(0x20));
    }

    #[test]
    fn test_require_class() {
        assert!(require_class("001", FieldClass::Control).is_ok());
        assert!(matches!(
            require_class("245", FieldClass::Control),
            Err(ValidationError::WrongFieldClass {
                expected: FieldClass::Control,
                actual: FieldClass::Data,
                ..
            })
        ));
    }

    #[test]
    fn test_tag_change_within_class() {
        assert!(check_tag_change("245", "246").is_ok());
        assert!(check_tag_change("001", "003").is_ok());
    }

    #[test]
    fn test_tag_change_across_class_rejected() {
        let err = check_tag_change("001", "245").unwrap_err();
        assert_eq!(
            err,
            ValidationError::ClassChange {
                from: FieldClass::Control,
                to: FieldClass::Data,
                tag: "245".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "Cannot change a control field to a data field ('245')"
        );

        let err = check_tag_change("245", "008").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ClassChange {
                from: FieldClass::Data,
                to: FieldClass::Control,
                ..
            }
        ));
    }

    #[test]
    fn test_tag_change_class_checked_before_grammar() {
        // "00x" is not a valid tag, but the class error wins.
        let err = check_tag_change("245", "00x").unwrap_err();
        assert!(matches!(err, ValidationError::ClassChange { .. }));
    }

    #[test]
    fn test_tag_change_invalid_grammar() {
        let err = check_tag_change("245", "2x5").unwrap_err();
        assert_eq!(err, ValidationError::InvalidTag("2x5".to_string()));
    }

    #[test]
    fn test_parse_indicator() {
        assert_eq!(parse_indicator(Indicator::First, "1"), Ok('1'));
        assert_eq!(parse_indicator(Indicator::Second, " "), Ok(' '));
        assert!(parse_indicator(Indicator::First, "").is_err());
        assert!(parse_indicator(Indicator::First, "10").is_err());
        let err = parse_indicator(Indicator::Second, "X").unwrap_err();
        assert_eq!(err.to_string(), "Invalid indicator 2: 'X'");
    }

    #[test]
    fn test_parse_subfield_code() {
        assert_eq!(parse_subfield_code("a"), Ok('a'));
        assert!(parse_subfield_code("ab").is_err());
        assert!(parse_subfield_code(" ").is_err());
    }
}
