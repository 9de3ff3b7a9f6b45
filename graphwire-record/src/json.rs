//! JSON record format.
//!
//! A document body is a JSON object; the class name lives under `@class` and
//! every other key is a field. Field values keep their type tag so that links
//! and strings survive a round trip. Blob bodies are the raw bytes.

use crate::codec::RecordCodec;
use crate::error::RecordError;
use crate::record::{Document, FieldValue, Record, RecordContent};
use crate::JSON_FORMAT;
use bytes::Bytes;
use serde_json::{Map, Value};

const CLASS_KEY: &str = "@class";

/// The `json` record format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl RecordCodec for JsonCodec {
    fn name(&self) -> &str {
        JSON_FORMAT
    }

    fn encode(&self, record: &Record) -> Result<Bytes, RecordError> {
        match record.content() {
            RecordContent::Blob(data) => Ok(data.clone()),
            RecordContent::Document(doc) => {
                if !doc.is_loaded() {
                    return Err(RecordError::FieldsNotLoaded(record.identity()));
                }
                let mut object = Map::new();
                if let Some(class) = doc.class_name() {
                    object.insert(CLASS_KEY.to_string(), Value::String(class.to_string()));
                }
                for (name, value) in doc.fields() {
                    if name == CLASS_KEY {
                        return Err(RecordError::malformed(format!(
                            "field name '{}' is reserved",
                            CLASS_KEY
                        )));
                    }
                    check_finite(name, value)?;
                    object.insert(name.clone(), serde_json::to_value(value)?);
                }
                Ok(Bytes::from(serde_json::to_vec(&Value::Object(object))?))
            }
        }
    }

    fn decode(&self, bytes: Bytes, mut record: Record) -> Result<Record, RecordError> {
        match record.content() {
            RecordContent::Blob(_) => {
                record.set_content(RecordContent::Blob(bytes));
                Ok(record)
            }
            RecordContent::Document(_) => {
                let object = match serde_json::from_slice::<Value>(&bytes)? {
                    Value::Object(object) => object,
                    other => {
                        return Err(RecordError::malformed(format!(
                            "expected a JSON object, got {}",
                            json_kind(&other)
                        )))
                    }
                };

                let mut doc = Document::new();
                for (name, value) in object {
                    if name == CLASS_KEY {
                        match value {
                            Value::String(class) => doc.set_class_name(Some(class)),
                            Value::Null => {}
                            other => {
                                return Err(RecordError::malformed(format!(
                                    "{} must be a string, got {}",
                                    CLASS_KEY,
                                    json_kind(&other)
                                )))
                            }
                        }
                        continue;
                    }
                    let value: FieldValue = serde_json::from_value(value)?;
                    doc.set(name, value);
                }
                record.set_content(RecordContent::Document(doc));
                Ok(record)
            }
        }
    }
}

/// JSON has no encoding for NaN or infinities.
fn check_finite(name: &str, value: &FieldValue) -> Result<(), RecordError> {
    match value {
        FieldValue::Double(v) if !v.is_finite() => Err(RecordError::malformed(format!(
            "field '{}' holds non-finite double {}",
            name, v
        ))),
        FieldValue::List(items) => items.iter().try_for_each(|item| check_finite(name, item)),
        FieldValue::Map(entries) => entries
            .iter()
            .try_for_each(|(key, item)| check_finite(&format!("{}.{}", name, key), item)),
        _ => Ok(()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
