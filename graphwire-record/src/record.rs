//! Records: typed content plus identity, version and cached serialized form.

use crate::codec::RecordCodec;
use crate::error::RecordError;
use crate::rid::RecordId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire tag identifying the concrete record variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordType {
    /// Field map with an optional class name.
    Document = b'd',
    /// Opaque byte content.
    Blob = b'b',
}

impl RecordType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Document => "document",
            RecordType::Blob => "blob",
        }
    }
}

impl TryFrom<u8> for RecordType {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'd' => Ok(RecordType::Document),
            b'b' => Ok(RecordType::Blob),
            _ => Err(RecordError::UnknownRecordType(value)),
        }
    }
}

/// A single document field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Link(RecordId),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<RecordId> for FieldValue {
    fn from(value: RecordId) -> Self {
        FieldValue::Link(value)
    }
}

/// Document content.
///
/// A document read from storage may carry only its serialized form; until
/// [`Record::deserialize_fields`] runs, its field map is empty and
/// [`Document::is_loaded`] reports `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    class_name: Option<String>,
    fields: BTreeMap<String, FieldValue>,
    loaded: bool,
}

impl Document {
    pub fn new() -> Self {
        Self {
            class_name: None,
            fields: BTreeMap::new(),
            loaded: true,
        }
    }

    pub fn with_class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Self::new()
        }
    }

    /// Builder-style field setter.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn set_class_name(&mut self, class_name: Option<String>) {
        self.class_name = class_name;
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn unloaded() -> Self {
        Self {
            loaded: false,
            ..Self::new()
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Typed record content.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordContent {
    Document(Document),
    Blob(Bytes),
}

impl RecordContent {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordContent::Document(_) => RecordType::Document,
            RecordContent::Blob(_) => RecordType::Blob,
        }
    }
}

/// A full record as exchanged between client and server.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    identity: RecordId,
    version: i32,
    content: RecordContent,
    /// Serialized form produced by the local active format, if still valid.
    source: Option<Bytes>,
}

impl Record {
    pub fn new(identity: RecordId, version: i32, content: RecordContent) -> Self {
        Self {
            identity,
            version,
            content,
            source: None,
        }
    }

    pub fn document(identity: RecordId, version: i32, document: Document) -> Self {
        Self::new(identity, version, RecordContent::Document(document))
    }

    pub fn blob(identity: RecordId, version: i32, data: impl Into<Bytes>) -> Self {
        Self::new(identity, version, RecordContent::Blob(data.into()))
    }

    /// Creates a document whose fields stay encoded in `source` until
    /// [`Record::deserialize_fields`] is called.
    pub fn unloaded_document(identity: RecordId, version: i32, source: Bytes) -> Self {
        Self {
            identity,
            version,
            content: RecordContent::Document(Document::unloaded()),
            source: Some(source),
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.content.record_type()
    }

    pub fn identity(&self) -> RecordId {
        self.identity
    }

    pub fn set_identity(&mut self, identity: RecordId) {
        self.identity = identity;
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    pub fn content(&self) -> &RecordContent {
        &self.content
    }

    /// Replaces the content and drops the cached serialized form.
    pub fn set_content(&mut self, content: RecordContent) {
        self.content = content;
        self.source = None;
    }

    pub fn as_document(&self) -> Option<&Document> {
        match &self.content {
            RecordContent::Document(doc) => Some(doc),
            RecordContent::Blob(_) => None,
        }
    }

    /// Mutable access to document fields. Drops the cached serialized form.
    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match &mut self.content {
            RecordContent::Document(doc) if doc.loaded => {
                self.source = None;
                Some(doc)
            }
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Bytes> {
        match &self.content {
            RecordContent::Blob(data) => Some(data),
            RecordContent::Document(_) => None,
        }
    }

    pub fn source(&self) -> Option<&Bytes> {
        self.source.as_ref()
    }

    /// Caches `source` as the record's serialized form in the active format.
    pub fn set_source(&mut self, source: Bytes) {
        self.source = Some(source);
    }

    /// Returns whether the content is fully materialized.
    pub fn is_loaded(&self) -> bool {
        match &self.content {
            RecordContent::Document(doc) => doc.loaded,
            RecordContent::Blob(_) => true,
        }
    }

    /// Returns the record's serialized form, reusing the cached bytes when
    /// present and encoding with `codec` otherwise.
    pub fn to_stream(&self, codec: &dyn RecordCodec) -> Result<Bytes, RecordError> {
        match &self.source {
            Some(source) => Ok(source.clone()),
            None => codec.encode(self),
        }
    }

    /// Decomposes an unloaded document's cached bytes into fields using
    /// `codec`, which must be the format the bytes were produced with.
    pub fn deserialize_fields(&mut self, codec: &dyn RecordCodec) -> Result<(), RecordError> {
        if self.is_loaded() {
            return Ok(());
        }
        let source = self
            .source
            .clone()
            .ok_or(RecordError::FieldsNotLoaded(self.identity))?;
        let empty = Record::document(self.identity, self.version, Document::new());
        let decoded = codec.decode(source.clone(), empty)?;
        self.content = decoded.content;
        self.source = Some(source);
        tracing::trace!(rid = %self.identity, codec = codec.name(), "deserialized record fields");
        Ok(())
    }
}
