//! Record envelope codec.
//!
//! ```text
//! null       : marker i16 = -2
//! reference  : marker i16 = -3 | rid
//! full record: marker i16 = 0  | type u8 | rid | version | body (bytes)
//! ```
//!
//! The full-record marker is a retired class id and is always written as `0`.
//! A body length of `-1` marks a body that could not be produced.

use crate::channel::{ChannelInput, ChannelOutput};
use crate::context::CodecContext;
use crate::error::ProtocolError;
use crate::{RECORD_FULL, RECORD_NULL, RECORD_RID};
use bytes::Bytes;
use graphwire_record::{Record, RecordError, RecordId, RecordType};

/// A value that identifies a record, either by reference or in full.
#[derive(Debug, Clone, PartialEq)]
pub enum Identifiable {
    /// A bare reference, sent without the record body.
    Id(RecordId),
    /// A record sent in full.
    Record(Record),
    /// A record that must be sent in full but has not been fetched yet.
    /// Writing it fails with [`ProtocolError::UnresolvedRecord`].
    Unresolved(RecordId),
}

impl Identifiable {
    pub fn identity(&self) -> RecordId {
        match self {
            Identifiable::Id(rid) | Identifiable::Unresolved(rid) => *rid,
            Identifiable::Record(record) => record.identity(),
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Identifiable::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl From<RecordId> for Identifiable {
    fn from(rid: RecordId) -> Self {
        Identifiable::Id(rid)
    }
}

impl From<Record> for Identifiable {
    fn from(record: Record) -> Self {
        Identifiable::Record(record)
    }
}

/// Writes a record reference, a full record, or the null marker.
pub fn write_identifiable<W: ChannelOutput + ?Sized>(
    out: &mut W,
    value: Option<&Identifiable>,
    serializer: &str,
    ctx: &CodecContext,
) -> Result<(), ProtocolError> {
    match value {
        None => out.write_i16(RECORD_NULL),
        Some(Identifiable::Id(rid)) => {
            out.write_i16(RECORD_RID)?;
            out.write_rid(*rid)
        }
        Some(Identifiable::Record(record)) => write_record(out, record, serializer, ctx),
        Some(Identifiable::Unresolved(rid)) => Err(ProtocolError::UnresolvedRecord(*rid)),
    }
}

/// Writes a full record with its body encoded in the `serializer` format.
///
/// If the body cannot be produced, a null body is still written so the peer
/// stays aligned, and the failure is returned with the record's identity.
pub fn write_record<W: ChannelOutput + ?Sized>(
    out: &mut W,
    record: &Record,
    serializer: &str,
    ctx: &CodecContext,
) -> Result<(), ProtocolError> {
    let rid = record.identity();
    out.write_i16(RECORD_FULL)?;
    out.write_u8(record.record_type().tag())?;
    out.write_rid(rid)?;
    out.write_version(record.version())?;

    match get_record_bytes(record, serializer, ctx) {
        Ok(body) => out.write_bytes(Some(&body)),
        Err(e) => {
            out.write_bytes(None)?;
            tracing::warn!(%rid, serializer, error = %e, "failed to serialize record body");
            Err(ProtocolError::serialization(rid, e))
        }
    }
}

/// Produces the body bytes a peer expecting the `serializer` format can read.
///
/// Documents are re-encoded with the requested format whenever it differs
/// from the local active one, decomposing cached bytes first so they are
/// never forwarded in the wrong format. Everything else reuses the record's
/// own serialized form.
pub fn get_record_bytes(
    record: &Record,
    serializer: &str,
    ctx: &CodecContext,
) -> Result<Bytes, RecordError> {
    if record.record_type() == RecordType::Document && ctx.active_serializer() != serializer {
        let target = ctx.codec(serializer)?;
        if record.is_loaded() {
            return target.encode(record);
        }
        let mut loaded = record.clone();
        loaded.deserialize_fields(ctx.active_codec()?.as_ref())?;
        return target.encode(&loaded);
    }
    record.to_stream(ctx.active_codec()?.as_ref())
}

/// Reads a null marker, a record reference or a full record.
pub fn read_identifiable<R: ChannelInput + ?Sized>(
    input: &mut R,
    serializer: &str,
    ctx: &CodecContext,
) -> Result<Option<Identifiable>, ProtocolError> {
    match input.read_i16()? {
        RECORD_NULL => Ok(None),
        RECORD_RID => Ok(Some(Identifiable::Id(input.read_rid()?))),
        RECORD_FULL => read_record_fields(input, serializer, ctx)
            .map(Identifiable::Record)
            .map(Some),
        marker => Err(ProtocolError::InvalidMarker(marker)),
    }
}

/// Reads a full record written by [`write_record`], decoding its body with
/// the `serializer` format.
pub fn read_record<R: ChannelInput + ?Sized>(
    input: &mut R,
    serializer: &str,
    ctx: &CodecContext,
) -> Result<Record, ProtocolError> {
    match input.read_i16()? {
        RECORD_FULL => read_record_fields(input, serializer, ctx),
        marker => Err(ProtocolError::InvalidMarker(marker)),
    }
}

fn read_record_fields<R: ChannelInput + ?Sized>(
    input: &mut R,
    serializer: &str,
    ctx: &CodecContext,
) -> Result<Record, ProtocolError> {
    let tag = input.read_u8()?;
    let rid = input.read_rid()?;
    let version = input.read_version()?;
    let body = input.read_bytes()?;

    let mut record = ctx
        .record_types()
        .new_instance(tag, rid)
        .map_err(|e| ProtocolError::serialization(rid, e))?;

    if let Some(body) = body {
        let codec = ctx.codec(serializer)?;
        record = codec
            .decode(body.clone(), record)
            .map_err(|e| ProtocolError::serialization(rid, e))?;
        if serializer == ctx.active_serializer() {
            record.set_source(body);
        }
    } else {
        tracing::debug!(%rid, "record arrived without a body");
    }
    record.set_version(version);
    Ok(record)
}
