//! Read-only collaborators shared by the record-level codecs.

use graphwire_record::{
    RecordCodec, RecordError, RecordTypeRegistry, SerializerRegistry, JSON_FORMAT,
};
use std::sync::Arc;

/// Record formats, record constructors and the name of the format the local
/// database is configured with.
///
/// A context is built once per connection (or once per process) and passed
/// by reference to every record-level codec call. Nothing in it changes while
/// a message is being encoded or decoded.
#[derive(Debug, Clone)]
pub struct CodecContext {
    serializers: SerializerRegistry,
    record_types: RecordTypeRegistry,
    active_serializer: String,
}

impl CodecContext {
    pub fn new(
        serializers: SerializerRegistry,
        record_types: RecordTypeRegistry,
        active_serializer: impl Into<String>,
    ) -> Result<Self, RecordError> {
        let active_serializer = active_serializer.into();
        serializers.get(&active_serializer)?;
        Ok(Self {
            serializers,
            record_types,
            active_serializer,
        })
    }

    /// Built-in formats and record types with `active_serializer` as the
    /// local format.
    pub fn with_active(active_serializer: impl Into<String>) -> Result<Self, RecordError> {
        Self::new(
            SerializerRegistry::with_defaults(),
            RecordTypeRegistry::with_defaults(),
            active_serializer,
        )
    }

    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    pub fn record_types(&self) -> &RecordTypeRegistry {
        &self.record_types
    }

    /// Name of the format the local database stores records in.
    pub fn active_serializer(&self) -> &str {
        &self.active_serializer
    }

    pub fn active_codec(&self) -> Result<Arc<dyn RecordCodec>, RecordError> {
        self.serializers.get(&self.active_serializer)
    }

    pub fn codec(&self, name: &str) -> Result<Arc<dyn RecordCodec>, RecordError> {
        self.serializers.get(name)
    }
}

impl Default for CodecContext {
    fn default() -> Self {
        Self {
            serializers: SerializerRegistry::with_defaults(),
            record_types: RecordTypeRegistry::with_defaults(),
            active_serializer: JSON_FORMAT.to_string(),
        }
    }
}
