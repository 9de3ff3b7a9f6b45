//! Compact binary record format.
//!
//! Document layout (big-endian):
//!
//! ```text
//! +---------+------------------+-------------+---------------------------+
//! | version | class name       | field count | fields                    |
//! | 1 byte  | i32 len + utf-8  | i32         | (name, tag, value) * count|
//! +---------+------------------+-------------+---------------------------+
//! ```
//!
//! A class name length of `-1` means no class. Values are a one-byte tag
//! followed by the tag's payload; lists and maps nest up to
//! [`MAX_NESTING`] levels. Blob bodies are the raw bytes.

use crate::codec::RecordCodec;
use crate::error::RecordError;
use crate::record::{Document, FieldValue, Record, RecordContent};
use crate::rid::RecordId;
use crate::BINARY_FORMAT;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;

/// Layout version written in the first byte of every document body.
pub const BINARY_FORMAT_VERSION: u8 = 0;

/// Deepest list/map nesting accepted on encode and decode.
pub const MAX_NESTING: usize = 64;

const TAG_NULL: u8 = 0;
const TAG_BOOLEAN: u8 = 1;
const TAG_INTEGER: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_LINK: u8 = 5;
const TAG_LIST: u8 = 6;
const TAG_MAP: u8 = 7;

/// The `binary` record format.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl RecordCodec for BinaryCodec {
    fn name(&self) -> &str {
        BINARY_FORMAT
    }

    fn encode(&self, record: &Record) -> Result<Bytes, RecordError> {
        let doc = match record.content() {
            RecordContent::Blob(data) => return Ok(data.clone()),
            RecordContent::Document(doc) => doc,
        };
        if !doc.is_loaded() {
            return Err(RecordError::FieldsNotLoaded(record.identity()));
        }

        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(BINARY_FORMAT_VERSION);
        put_opt_str(&mut buf, doc.class_name())?;
        put_len(&mut buf, doc.len())?;
        for (name, value) in doc.fields() {
            put_opt_str(&mut buf, Some(name))?;
            put_value(&mut buf, value, 0)?;
        }
        Ok(buf.freeze())
    }

    fn decode(&self, bytes: Bytes, mut record: Record) -> Result<Record, RecordError> {
        if let RecordContent::Blob(_) = record.content() {
            record.set_content(RecordContent::Blob(bytes));
            return Ok(record);
        }

        let mut buf = bytes;
        let version = get_u8(&mut buf)?;
        if version != BINARY_FORMAT_VERSION {
            return Err(RecordError::malformed(format!(
                "unsupported binary layout version {}",
                version
            )));
        }

        let mut doc = Document::new();
        doc.set_class_name(get_opt_str(&mut buf)?);
        let count = get_len(&mut buf)?;
        for _ in 0..count {
            let name = get_opt_str(&mut buf)?
                .ok_or_else(|| RecordError::malformed("null field name"))?;
            let value = get_value(&mut buf, 0)?;
            doc.set(name, value);
        }
        if buf.has_remaining() {
            return Err(RecordError::malformed(format!(
                "{} trailing bytes after document",
                buf.remaining()
            )));
        }

        record.set_content(RecordContent::Document(doc));
        Ok(record)
    }
}

fn put_len(buf: &mut BytesMut, len: usize) -> Result<(), RecordError> {
    let len = i32::try_from(len)
        .map_err(|_| RecordError::malformed(format!("length {} exceeds i32", len)))?;
    buf.put_i32(len);
    Ok(())
}

fn put_opt_str(buf: &mut BytesMut, value: Option<&str>) -> Result<(), RecordError> {
    match value {
        Some(s) => {
            put_len(buf, s.len())?;
            buf.put_slice(s.as_bytes());
        }
        None => buf.put_i32(-1),
    }
    Ok(())
}

fn put_value(buf: &mut BytesMut, value: &FieldValue, depth: usize) -> Result<(), RecordError> {
    if depth > MAX_NESTING {
        return Err(RecordError::malformed("field nesting too deep"));
    }
    match value {
        FieldValue::Null => buf.put_u8(TAG_NULL),
        FieldValue::Boolean(b) => {
            buf.put_u8(TAG_BOOLEAN);
            buf.put_u8(u8::from(*b));
        }
        FieldValue::Integer(n) => {
            buf.put_u8(TAG_INTEGER);
            buf.put_i64(*n);
        }
        FieldValue::Double(d) => {
            buf.put_u8(TAG_DOUBLE);
            buf.put_f64(*d);
        }
        FieldValue::String(s) => {
            buf.put_u8(TAG_STRING);
            put_opt_str(buf, Some(s))?;
        }
        FieldValue::Link(rid) => {
            buf.put_u8(TAG_LINK);
            buf.put_i16(rid.cluster_id);
            buf.put_i64(rid.cluster_position);
        }
        FieldValue::List(items) => {
            buf.put_u8(TAG_LIST);
            put_len(buf, items.len())?;
            for item in items {
                put_value(buf, item, depth + 1)?;
            }
        }
        FieldValue::Map(entries) => {
            buf.put_u8(TAG_MAP);
            put_len(buf, entries.len())?;
            for (key, item) in entries {
                put_opt_str(buf, Some(key))?;
                put_value(buf, item, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn ensure(buf: &Bytes, needed: usize) -> Result<(), RecordError> {
    if buf.remaining() < needed {
        return Err(RecordError::malformed(format!(
            "truncated body: need {} bytes, {} left",
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

fn get_u8(buf: &mut Bytes) -> Result<u8, RecordError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_len(buf: &mut Bytes) -> Result<usize, RecordError> {
    ensure(buf, 4)?;
    let len = buf.get_i32();
    usize::try_from(len).map_err(|_| RecordError::malformed(format!("negative length {}", len)))
}

fn get_opt_str(buf: &mut Bytes) -> Result<Option<String>, RecordError> {
    ensure(buf, 4)?;
    let len = buf.get_i32();
    if len == -1 {
        return Ok(None);
    }
    let len = usize::try_from(len)
        .map_err(|_| RecordError::malformed(format!("negative string length {}", len)))?;
    ensure(buf, len)?;
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec())
        .map(Some)
        .map_err(|_| RecordError::malformed("invalid UTF-8 in string"))
}

fn get_value(buf: &mut Bytes, depth: usize) -> Result<FieldValue, RecordError> {
    if depth > MAX_NESTING {
        return Err(RecordError::malformed("field nesting too deep"));
    }
    let tag = get_u8(buf)?;
    let value = match tag {
        TAG_NULL => FieldValue::Null,
        TAG_BOOLEAN => match get_u8(buf)? {
            0 => FieldValue::Boolean(false),
            1 => FieldValue::Boolean(true),
            other => {
                return Err(RecordError::malformed(format!(
                    "invalid boolean byte {:#04x}",
                    other
                )))
            }
        },
        TAG_INTEGER => {
            ensure(buf, 8)?;
            FieldValue::Integer(buf.get_i64())
        }
        TAG_DOUBLE => {
            ensure(buf, 8)?;
            FieldValue::Double(buf.get_f64())
        }
        TAG_STRING => {
            let s = get_opt_str(buf)?.ok_or_else(|| RecordError::malformed("null string value"))?;
            FieldValue::String(s)
        }
        TAG_LINK => {
            ensure(buf, 10)?;
            let cluster_id = buf.get_i16();
            let cluster_position = buf.get_i64();
            FieldValue::Link(RecordId::new(cluster_id, cluster_position))
        }
        TAG_LIST => {
            let count = get_len(buf)?;
            let mut items = Vec::with_capacity(count.min(buf.remaining()));
            for _ in 0..count {
                items.push(get_value(buf, depth + 1)?);
            }
            FieldValue::List(items)
        }
        TAG_MAP => {
            let count = get_len(buf)?;
            let mut entries = BTreeMap::new();
            for _ in 0..count {
                let key =
                    get_opt_str(buf)?.ok_or_else(|| RecordError::malformed("null map key"))?;
                entries.insert(key, get_value(buf, depth + 1)?);
            }
            FieldValue::Map(entries)
        }
        other => {
            return Err(RecordError::malformed(format!(
                "unknown value tag {:#04x}",
                other
            )))
        }
    };
    Ok(value)
}
