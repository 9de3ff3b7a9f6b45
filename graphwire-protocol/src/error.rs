//! Protocol error types and error kinds.

use graphwire_record::{RecordError, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while encoding or decoding a message body.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("error on serializing record {rid}: {source}")]
    Serialization {
        rid: RecordId,
        #[source]
        source: RecordError,
    },

    #[error("unknown record type: {0:#04x}")]
    UnknownRecordType(u8),

    #[error("unknown record operation: {0}")]
    UnknownOperation(u8),

    #[error("invalid record marker: {0}")]
    InvalidMarker(i16),

    #[error("invalid entry present flag: {0}")]
    InvalidPresentFlag(i8),

    #[error("record {0} is not loaded; resolve it before writing")]
    UnresolvedRecord(RecordId),

    #[error("invalid cluster id: {0}")]
    InvalidClusterId(i16),

    #[error("too many {what}: {count} (max {max})")]
    TooManyEntries {
        what: &'static str,
        count: usize,
        max: usize,
    },

    #[error("invalid length prefix: {0}")]
    InvalidLength(i32),

    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("varint exceeds 32 bits")]
    VarintOverflow,

    #[error("record error: {0}")]
    Record(#[from] RecordError),
}

impl ProtocolError {
    /// Wraps a record body failure with the identity of the offending record.
    pub fn serialization(rid: RecordId, source: RecordError) -> Self {
        match source {
            RecordError::UnknownRecordType(tag) => ProtocolError::UnknownRecordType(tag),
            source => ProtocolError::Serialization { rid, source },
        }
    }

    pub(crate) fn eof(needed: usize, remaining: usize) -> Self {
        ProtocolError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("need {} bytes, {} remaining", needed, remaining),
        ))
    }

    pub(crate) fn write_zero(needed: usize, remaining: usize) -> Self {
        ProtocolError::Io(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            format!("need {} bytes of capacity, {} remaining", needed, remaining),
        ))
    }

    /// Returns the stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Io(_) => ErrorKind::ChannelIoFailure,
            ProtocolError::Serialization { .. } => ErrorKind::SerializationFailure,
            ProtocolError::UnknownRecordType(_) => ErrorKind::UnknownRecordType,
            ProtocolError::Record(RecordError::UnknownRecordType(_)) => {
                ErrorKind::UnknownRecordType
            }
            ProtocolError::Record(RecordError::UnknownSerializer(_)) => {
                ErrorKind::UnknownSerializer
            }
            ProtocolError::Record(_) => ErrorKind::SerializationFailure,
            ProtocolError::UnresolvedRecord(_) => ErrorKind::UnresolvedRecord,
            ProtocolError::UnknownOperation(_)
            | ProtocolError::InvalidMarker(_)
            | ProtocolError::InvalidPresentFlag(_)
            | ProtocolError::InvalidClusterId(_)
            | ProtocolError::TooManyEntries { .. }
            | ProtocolError::InvalidLength(_)
            | ProtocolError::InvalidUtf8
            | ProtocolError::VarintOverflow => ErrorKind::MalformedMessage,
        }
    }

    /// Returns the identity of the record the error is attached to, if any.
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            ProtocolError::Serialization { rid, .. } | ProtocolError::UnresolvedRecord(rid) => {
                Some(*rid)
            }
            _ => None,
        }
    }
}

/// Stable classification of protocol errors, reported to callers that build
/// user-facing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    SerializationFailure,
    UnknownRecordType,
    UnknownSerializer,
    UnresolvedRecord,
    MalformedMessage,
    ChannelIoFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::SerializationFailure => write!(f, "SERIALIZATION_FAILURE"),
            ErrorKind::UnknownRecordType => write!(f, "UNKNOWN_RECORD_TYPE"),
            ErrorKind::UnknownSerializer => write!(f, "UNKNOWN_SERIALIZER"),
            ErrorKind::UnresolvedRecord => write!(f, "UNRESOLVED_RECORD"),
            ErrorKind::MalformedMessage => write!(f, "MALFORMED_MESSAGE"),
            ErrorKind::ChannelIoFailure => write!(f, "CHANNEL_IO_FAILURE"),
        }
    }
}
