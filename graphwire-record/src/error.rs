//! Record error types.

use crate::rid::RecordId;
use thiserror::Error;

/// Errors raised while building, serializing or materializing records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("unknown record type: {0:#04x}")]
    UnknownRecordType(u8),

    #[error("unknown record serializer: {0}")]
    UnknownSerializer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed record body: {0}")]
    Malformed(String),

    #[error("fields of record {0} are not loaded and no serialized form is cached")]
    FieldsNotLoaded(RecordId),

    #[error("invalid record id: {0}")]
    InvalidRecordId(String),
}

impl RecordError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        RecordError::Malformed(reason.into())
    }
}
