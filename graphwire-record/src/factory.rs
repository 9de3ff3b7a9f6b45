//! Type-tag to empty-instance construction.

use crate::error::RecordError;
use crate::record::{Document, Record, RecordType};
use crate::rid::RecordId;
use bytes::Bytes;
use std::collections::HashMap;

/// Builds an empty record of one concrete type.
pub type RecordConstructor = fn(RecordId) -> Record;

fn new_document(identity: RecordId) -> Record {
    Record::document(identity, 0, Document::new())
}

fn new_blob(identity: RecordId) -> Record {
    Record::blob(identity, 0, Bytes::new())
}

/// Maps wire type tags to constructors of empty record instances.
#[derive(Debug, Clone)]
pub struct RecordTypeRegistry {
    constructors: HashMap<RecordType, RecordConstructor>,
}

impl RecordTypeRegistry {
    /// Creates a registry that knows no record types.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Creates a registry for documents and blobs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(RecordType::Document, new_document);
        registry.register(RecordType::Blob, new_blob);
        registry
    }

    pub fn register(&mut self, record_type: RecordType, constructor: RecordConstructor) {
        self.constructors.insert(record_type, constructor);
    }

    pub fn supports(&self, tag: u8) -> bool {
        RecordType::try_from(tag)
            .map(|t| self.constructors.contains_key(&t))
            .unwrap_or(false)
    }

    /// Creates an empty instance of the record type identified by `tag`.
    pub fn new_instance(&self, tag: u8, identity: RecordId) -> Result<Record, RecordError> {
        let record_type = RecordType::try_from(tag)?;
        let constructor = self
            .constructors
            .get(&record_type)
            .ok_or(RecordError::UnknownRecordType(tag))?;
        Ok(constructor(identity))
    }
}

impl Default for RecordTypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
