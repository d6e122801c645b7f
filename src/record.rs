//! Bibliographic record structures.
//!
//! This module provides the in-memory record model:
//! - [`Record`]: a leader, an ordered list of fields and decode warnings
//! - [`Field`]: either a [`ControlField`] (tag `00x`) or a [`DataField`]
//! - [`Subfield`]: a code/data pair inside a data field
//!
//! Fields are kept in a single `Vec` in occurrence order, so a record that is
//! decoded and re-encoded (or flattened to rows and rebuilt) keeps control
//! and data fields interleaved exactly as they were.
//!
//! The control/data split is decided once, when a field is constructed, by
//! the tag prefix rule ([`is_control_tag`]). The tag of an existing field can
//! only be changed within its class.
//!
//! # Examples
//!
//! ```
//! use marc_catalog::{DataField, Leader, Record};
//!
//! let record = Record::builder(Leader::default())
//!     .control_field("001", "12345")
//!     .field(
//!         DataField::builder("245", '1', '0')
//!             .subfield('a', "Title")
//!             .subfield('b', "subtitle")
//!             .build()
//!             .unwrap(),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(record.first_subfield("245", 'b'), Some("subtitle"));
//! assert_eq!(record.fields[1].format_field(&[]), "10 ‡aTitle ‡bsubtitle");
//! ```

use std::fmt;

use serde::Serialize;
use smallvec::SmallVec;

use crate::error::Result;
use crate::leader::Leader;
use crate::validation::{
    check_tag_change, require_class, validate_indicator, FieldClass, ValidationError,
};

/// Subfield delimiter used when rendering fields for people.
pub const DISPLAY_DELIMITER: char = '\u{2021}';

/// Whether a tag names a control field.
///
/// This is the single classification rule of the model: a tag starting with
/// `"00"` is a control field, anything else is a data field.
#[must_use]
pub fn is_control_tag(tag: &str) -> bool {
    tag.starts_with("00")
}

/// One of the two indicator positions of a data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Indicator {
    /// First indicator
    First,
    /// Second indicator
    Second,
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::First => write!(f, "1"),
            Indicator::Second => write!(f, "2"),
        }
    }
}

/// A subfield within a data field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield data
    pub data: String,
}

impl Subfield {
    /// Create a subfield.
    pub fn new(code: char, data: impl Into<String>) -> Self {
        Subfield {
            code,
            data: data.into(),
        }
    }
}

/// A control field (tag `00x`): raw data, no indicators or subfields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlField {
    tag: String,
    /// Field data
    pub data: String,
}

impl ControlField {
    /// Create a control field.
    ///
    /// # Errors
    ///
    /// [`ValidationError::WrongFieldClass`] if `tag` does not start with `00`.
    pub fn new(
        tag: impl Into<String>,
        data: impl Into<String>,
    ) -> std::result::Result<Self, ValidationError> {
        let tag = tag.into();
        require_class(&tag, FieldClass::Control)?;
        Ok(ControlField {
            tag,
            data: data.into(),
        })
    }

    /// Field tag
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Retag the field. The new tag must also be a control tag.
    ///
    /// # Errors
    ///
    /// See [`check_tag_change`].
    pub fn set_tag(&mut self, tag: impl Into<String>) -> std::result::Result<(), ValidationError> {
        let tag = tag.into();
        check_tag_change(&self.tag, &tag)?;
        self.tag = tag;
        Ok(())
    }

    /// True when the field holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A data field: two indicators and an ordered list of subfields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataField {
    tag: String,
    /// First indicator
    pub indicator1: char,
    /// Second indicator
    pub indicator2: char,
    /// Subfields in occurrence order (stored in `SmallVec` to avoid allocation
    /// for typical fields with 4 or fewer subfields)
    pub subfields: SmallVec<[Subfield; 4]>,
}

impl DataField {
    /// Create a data field with no subfields.
    ///
    /// Indicators are taken as given so that decoded records keep whatever
    /// their source carried; edits go through [`DataField::set_indicator`].
    ///
    /// # Errors
    ///
    /// [`ValidationError::WrongFieldClass`] if `tag` starts with `00`.
    pub fn new(
        tag: impl Into<String>,
        indicator1: char,
        indicator2: char,
    ) -> std::result::Result<Self, ValidationError> {
        let tag = tag.into();
        require_class(&tag, FieldClass::Data)?;
        Ok(DataField {
            tag,
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        })
    }

    /// Create a builder for constructing fields fluently
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_catalog::DataField;
    ///
    /// let field = DataField::builder("100", '1', ' ')
    ///     .subfield('a', "Fitzgerald, F. Scott")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(field.get_subfield('a'), Some("Fitzgerald, F. Scott"));
    /// ```
    #[must_use]
    pub fn builder(tag: impl Into<String>, indicator1: char, indicator2: char) -> DataFieldBuilder {
        DataFieldBuilder {
            tag: tag.into(),
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Field tag
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Retag the field. The new tag must also be a data tag.
    ///
    /// # Errors
    ///
    /// See [`check_tag_change`].
    pub fn set_tag(&mut self, tag: impl Into<String>) -> std::result::Result<(), ValidationError> {
        let tag = tag.into();
        check_tag_change(&self.tag, &tag)?;
        self.tag = tag;
        Ok(())
    }

    /// Value of one indicator.
    #[must_use]
    pub fn indicator(&self, which: Indicator) -> char {
        match which {
            Indicator::First => self.indicator1,
            Indicator::Second => self.indicator2,
        }
    }

    /// Set one indicator after checking it against [`validate_indicator`].
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidIndicator`] for a character outside the
    /// indicator alphabet.
    pub fn set_indicator(
        &mut self,
        which: Indicator,
        value: char,
    ) -> std::result::Result<(), ValidationError> {
        if !validate_indicator(value) {
            return Err(ValidationError::InvalidIndicator {
                which,
                value: value.to_string(),
            });
        }
        match which {
            Indicator::First => self.indicator1 = value,
            Indicator::Second => self.indicator2 = value,
        }
        Ok(())
    }

    /// Append a subfield
    pub fn add_subfield(&mut self, code: char, data: impl Into<String>) {
        self.subfields.push(Subfield::new(code, data));
    }

    /// Get first value for a subfield code
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.data.as_str())
    }

    /// Iterate over subfields with a specific code
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |sf| sf.code == code)
            .map(|sf| sf.data.as_str())
    }

    /// Render as `<ind1><ind2> ‡<code><data> ‡<code><data> …`, skipping
    /// subfields whose code is in `exclude_codes`.
    #[must_use]
    pub fn format_field(&self, exclude_codes: &[char]) -> String {
        let mut out = String::new();
        out.push(self.indicator1);
        out.push(self.indicator2);
        for subfield in &self.subfields {
            if exclude_codes.contains(&subfield.code) {
                continue;
            }
            out.push(' ');
            out.push(DISPLAY_DELIMITER);
            out.push(subfield.code);
            out.push_str(&subfield.data);
        }
        out
    }

    /// True when the field has no subfields or only empty ones.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subfields.iter().all(|sf| sf.data.is_empty())
    }
}

/// Builder for fluently constructing data fields
#[derive(Debug)]
pub struct DataFieldBuilder {
    tag: String,
    indicator1: char,
    indicator2: char,
    subfields: SmallVec<[Subfield; 4]>,
}

impl DataFieldBuilder {
    /// Add a subfield to the field being built
    #[must_use]
    pub fn subfield(mut self, code: char, data: impl Into<String>) -> Self {
        self.subfields.push(Subfield::new(code, data));
        self
    }

    /// Build the field
    ///
    /// # Errors
    ///
    /// [`ValidationError::WrongFieldClass`] if the tag is a control tag.
    pub fn build(self) -> std::result::Result<DataField, ValidationError> {
        let mut field = DataField::new(self.tag, self.indicator1, self.indicator2)?;
        field.subfields = self.subfields;
        Ok(field)
    }
}

/// A field of a record: control or data, decided by its tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Field {
    /// Tag `00x`
    Control(ControlField),
    /// Any other tag
    Data(DataField),
}

impl Field {
    /// Field tag
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Field::Control(field) => field.tag(),
            Field::Data(field) => field.tag(),
        }
    }

    /// Class of this field
    #[must_use]
    pub fn class(&self) -> FieldClass {
        match self {
            Field::Control(_) => FieldClass::Control,
            Field::Data(_) => FieldClass::Data,
        }
    }

    /// True for control fields
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self, Field::Control(_))
    }

    /// The data field, if this is one
    #[must_use]
    pub fn as_data(&self) -> Option<&DataField> {
        match self {
            Field::Data(field) => Some(field),
            Field::Control(_) => None,
        }
    }

    /// The data field, mutably, if this is one
    pub fn as_data_mut(&mut self) -> Option<&mut DataField> {
        match self {
            Field::Data(field) => Some(field),
            Field::Control(_) => None,
        }
    }

    /// The control field, if this is one
    #[must_use]
    pub fn as_control(&self) -> Option<&ControlField> {
        match self {
            Field::Control(field) => Some(field),
            Field::Data(_) => None,
        }
    }

    /// Retag the field within its class.
    ///
    /// # Errors
    ///
    /// See [`check_tag_change`].
    pub fn set_tag(&mut self, tag: impl Into<String>) -> std::result::Result<(), ValidationError> {
        match self {
            Field::Control(field) => field.set_tag(tag),
            Field::Data(field) => field.set_tag(tag),
        }
    }

    /// Render the field body: raw data for a control field,
    /// [`DataField::format_field`] for a data field.
    #[must_use]
    pub fn format_field(&self, exclude_codes: &[char]) -> String {
        match self {
            Field::Control(field) => field.data.clone(),
            Field::Data(field) => field.format_field(exclude_codes),
        }
    }

    /// True when the field carries no data
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Field::Control(field) => field.is_empty(),
            Field::Data(field) => field.is_empty(),
        }
    }
}

impl From<ControlField> for Field {
    fn from(field: ControlField) -> Self {
        Field::Control(field)
    }
}

impl From<DataField> for Field {
    fn from(field: DataField) -> Self {
        Field::Data(field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tag(), self.format_field(&[]))
    }
}

/// A non-fatal structural problem found while decoding a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Tag of the directory entry involved, when there is one
    pub tag: Option<String>,
    /// What was wrong
    pub message: String,
}

impl Warning {
    pub(crate) fn record(message: impl Into<String>) -> Self {
        Warning {
            tag: None,
            message: message.into(),
        }
    }

    pub(crate) fn field(tag: &str, message: impl Into<String>) -> Self {
        Warning {
            tag: Some(tag.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{tag}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A bibliographic record
///
/// Equality compares the descriptive leader positions and the ordered
/// fields. The computed length/base address and the decode warnings are
/// ignored, so a record equals itself after an encode/decode or a
/// flatten/reconstruct round trip.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    /// Record leader (24 bytes)
    pub leader: Leader,
    /// Fields in occurrence order
    pub fields: Vec<Field>,
    /// Problems found while decoding this record
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.leader.without_lengths() == other.leader.without_lengths()
            && self.fields == other.fields
    }
}

impl Eq for Record {}

impl Record {
    /// Create an empty record with the given leader
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            fields: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Create a builder for fluently constructing records
    #[must_use]
    pub fn builder(leader: Leader) -> RecordBuilder {
        RecordBuilder {
            record: Record::new(leader),
            error: None,
        }
    }

    /// Append a field
    pub fn add_field(&mut self, field: impl Into<Field>) {
        self.fields.push(field.into());
    }

    /// Append a control field
    ///
    /// # Errors
    ///
    /// [`ValidationError::WrongFieldClass`] if `tag` is not a control tag.
    pub fn add_control_field(
        &mut self,
        tag: impl Into<String>,
        data: impl Into<String>,
    ) -> std::result::Result<(), ValidationError> {
        self.add_field(ControlField::new(tag, data)?);
        Ok(())
    }

    /// Remove and return the field at `index`
    pub fn remove_field(&mut self, index: usize) -> Option<Field> {
        (index < self.fields.len()).then(|| self.fields.remove(index))
    }

    /// Iterate over fields with the given tag, in occurrence order
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |field| field.tag() == tag)
    }

    /// Iterate over data fields with the given tag
    pub fn data_fields<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a DataField> + 'a {
        self.fields_by_tag(tag).filter_map(Field::as_data)
    }

    /// Data of the first control field with the given tag
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .filter_map(Field::as_control)
            .find(|field| field.tag() == tag)
            .map(|field| field.data.as_str())
    }

    /// First value of subfield `code` across all fields tagged `tag`
    #[must_use]
    pub fn first_subfield(&self, tag: &str, code: char) -> Option<&str> {
        self.fields
            .iter()
            .filter_map(Field::as_data)
            .filter(|field| field.tag() == tag)
            .find_map(|field| field.get_subfield(code))
    }

    /// True when decoding recorded any structural warning
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Encode the record in the wire format.
    ///
    /// # Errors
    ///
    /// See [`crate::writer::encode_record`].
    pub fn to_raw(&self) -> Result<Vec<u8>> {
        crate::writer::encode_record(self)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LDR {}", self.leader)?;
        for field in &self.fields {
            write!(f, "\n{field}")?;
        }
        Ok(())
    }
}

/// Builder for fluently constructing records
///
/// The first invalid field is remembered and reported by [`RecordBuilder::build`].
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
    error: Option<ValidationError>,
}

impl RecordBuilder {
    /// Append a control field
    #[must_use]
    pub fn control_field(mut self, tag: &str, data: &str) -> Self {
        if let Err(e) = self.record.add_control_field(tag, data) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Append a field
    #[must_use]
    pub fn field(mut self, field: impl Into<Field>) -> Self {
        self.record.add_field(field);
        self
    }

    /// Build the record
    ///
    /// # Errors
    ///
    /// The first [`ValidationError`] raised while adding fields.
    pub fn build(self) -> std::result::Result<Record, ValidationError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.record),
        }
    }
}
