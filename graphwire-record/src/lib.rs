//! # graphwire-record
//!
//! Record model for graphwire.
//!
//! This crate provides:
//! - Record identities (`#cluster:position`)
//! - Document and blob records with version and cached serialized form
//! - Pluggable record formats selected by name (`json`, `binary`)
//! - Type-tag to empty-instance construction for decoding

pub mod binary;
pub mod codec;
pub mod error;
pub mod factory;
pub mod json;
pub mod record;
pub mod rid;

pub use binary::BinaryCodec;
pub use codec::{RecordCodec, SerializerRegistry};
pub use error::RecordError;
pub use factory::{RecordConstructor, RecordTypeRegistry};
pub use json::JsonCodec;
pub use record::{Document, FieldValue, Record, RecordContent, RecordType};
pub use rid::{RecordId, CLUSTER_ID_INVALID, CLUSTER_POS_INVALID};

/// Registry name of the JSON record format.
pub const JSON_FORMAT: &str = "json";

/// Registry name of the compact binary record format.
pub const BINARY_FORMAT: &str = "binary";
