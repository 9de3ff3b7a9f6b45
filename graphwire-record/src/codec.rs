//! Record serialization formats and the name-keyed registry that selects them.

use crate::binary::BinaryCodec;
use crate::error::RecordError;
use crate::json::JsonCodec;
use crate::record::Record;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A record serialization format.
///
/// Formats turn a record's content into body bytes and populate an empty
/// record instance from body bytes. Identity and version travel outside the
/// body and are never touched by a format.
pub trait RecordCodec: Send + Sync {
    /// Name the format is registered and negotiated under.
    fn name(&self) -> &str;

    /// Encodes the record's content.
    fn encode(&self, record: &Record) -> Result<Bytes, RecordError>;

    /// Populates `record` (an empty instance of the right type) from `bytes`.
    fn decode(&self, bytes: Bytes, record: Record) -> Result<Record, RecordError>;
}

/// Registry of record formats keyed by name.
///
/// Built once and handed to codec calls; it is never mutated while in use.
#[derive(Clone, Default)]
pub struct SerializerRegistry {
    formats: HashMap<String, Arc<dyn RecordCodec>>,
}

impl SerializerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in `json` and `binary` formats.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JsonCodec));
        registry.register(Arc::new(BinaryCodec));
        registry
    }

    /// Registers a format under its own name, replacing any previous one.
    pub fn register(&mut self, codec: Arc<dyn RecordCodec>) {
        self.formats.insert(codec.name().to_string(), codec);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn RecordCodec>, RecordError> {
        self.formats
            .get(name)
            .cloned()
            .ok_or_else(|| RecordError::UnknownSerializer(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    /// Registered format names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formats.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("formats", &self.names())
            .finish()
    }
}
