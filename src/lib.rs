#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # marc-catalog: MARC record editor core
//!
//! Reads and writes MARC bibliographic records in the ISO 2709 binary format
//! and mirrors them into a three-table SQLite catalog (records, fields,
//! subfields) where they can be edited, summarized and bulk-corrected.
//!
//! ## Quick Start
//!
//! ### Reading MARC Records
//!
//! ```no_run
//! use marc_catalog::MarcReader;
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = File::open("records.mrc")?;
//! let mut reader = MarcReader::new(file);
//!
//! while let Some(record) = reader.read_record()? {
//!     if let Some(title) = record.first_subfield("245", 'a') {
//!         println!("Title: {title}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Creating and Writing MARC Records
//!
//! ```
//! use marc_catalog::{DataField, Leader, MarcWriter, Record};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut record = Record::new(Leader::default());
//! record.add_control_field("001", "12345")?;
//! record.add_field(
//!     DataField::builder("245", '1', '0')
//!         .subfield('a', "Test Title")
//!         .build()?,
//! );
//!
//! let mut buffer = Vec::new();
//! let mut writer = MarcWriter::new(&mut buffer);
//! writer.write_record(&record)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Editing a Catalog
//!
//! ```
//! use marc_catalog::filter::{ReplaceFilters, ReplaceRequest};
//! use marc_catalog::{Catalog, DataField, Leader, Record};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut catalog = Catalog::open_in_memory()?;
//!
//! let mut record = Record::new(Leader::default());
//! record.add_field(
//!     DataField::builder("245", '1', '0')
//!         .subfield('a', "Colour theory")
//!         .build()?,
//! );
//! let row = catalog.insert_record(&record)?;
//! assert_eq!(row.summary.title.as_deref(), Some("Colour theory"));
//!
//! let request = ReplaceRequest::new("Colour", "Color")
//!     .with_filters(ReplaceFilters::new().tag("245").codes(['a']));
//! assert_eq!(catalog.apply_filtered_replace(&request, |_| {})?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`record`], [`leader`]: the in-memory record model
//! - [`reader`], [`writer`]: the ISO 2709 codec
//! - [`mapper`]: record to row flattening and back
//! - [`summary`]: derived author, title, barcode and classification columns
//! - [`filter`]: bulk find-and-replace predicates
//! - [`catalog`]: the SQLite-backed store
//! - [`report`]: CSV and text listings of the catalog

pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod leader;
pub mod logging;
pub mod mapper;
pub mod reader;
/// Core MARC record structures (`Record`, `Field`, `Subfield`)
pub mod record;
pub mod report;
pub mod summary;
pub mod validation;
pub mod writer;

pub use catalog::{Catalog, Edit, ImportSummary, Progress};
pub use config::CatalogConfig;
pub use error::{MarcError, Result};
pub use filter::{Filter, ReplaceFilters, ReplaceRequest, Substitution};
pub use leader::Leader;
pub use mapper::{CascadePlan, FieldRow, FlatRecord, RecordId, RecordRow, SubfieldRow};
pub use reader::{decode_record, MarcReader, RecoveryMode};
pub use record::{
    ControlField, DataField, DataFieldBuilder, Field, Indicator, Record, RecordBuilder, Subfield,
    Warning,
};
pub use summary::{RecordList, Summary};
pub use validation::{FieldClass, ValidationError};
pub use writer::{encode_record, MarcWriter};
