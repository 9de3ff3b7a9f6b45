//! Transaction entry codec.
//!
//! Each entry of a transaction's change set is written as:
//!
//! ```text
//! +---------+------+-----+-------------+---------------------------------+
//! | present | kind | rid | record type | kind-specific fields            |
//! | i8 = 1  | u8   |     | u8          |                                 |
//! +---------+------+-----+-------------+---------------------------------+
//!
//! CREATED : body
//! UPDATED : version | body | content changed (bool)
//! DELETED : version
//! ```
//!
//! A list of entries ends with a single `0` present byte.

use crate::channel::{ChannelInput, ChannelOutput, NULL_LENGTH};
use crate::context::CodecContext;
use crate::envelope::get_record_bytes;
use crate::error::ProtocolError;
use graphwire_record::{Record, RecordId, RecordType};

/// Present flag preceding every entry.
pub const TX_ENTRY_PRESENT: i8 = 1;

/// Present flag terminating an entry list.
pub const TX_ENTRY_END: i8 = 0;

/// Operation kinds, numbered as in the peer's record operation enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationKind {
    Updated = 1,
    Deleted = 2,
    Created = 3,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Updated => "UPDATED",
            OperationKind::Deleted => "DELETED",
            OperationKind::Created => "CREATED",
        }
    }
}

impl TryFrom<u8> for OperationKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OperationKind::Updated),
            2 => Ok(OperationKind::Deleted),
            3 => Ok(OperationKind::Created),
            _ => Err(ProtocolError::UnknownOperation(value)),
        }
    }
}

/// Kind-specific payload of a transaction entry.
#[derive(Debug, Clone, PartialEq)]
pub enum TxChange {
    Created {
        record: Record,
    },
    Updated {
        version: i32,
        record: Record,
        content_changed: bool,
    },
    Deleted {
        version: i32,
    },
}

/// One entry of a transaction's pending change set.
#[derive(Debug, Clone, PartialEq)]
pub struct TxOperation {
    pub id: RecordId,
    pub record_type: RecordType,
    pub change: TxChange,
}

impl TxOperation {
    pub fn created(record: Record) -> Self {
        Self {
            id: record.identity(),
            record_type: record.record_type(),
            change: TxChange::Created { record },
        }
    }

    /// An update based on the record's current version.
    pub fn updated(record: Record, content_changed: bool) -> Self {
        Self {
            id: record.identity(),
            record_type: record.record_type(),
            change: TxChange::Updated {
                version: record.version(),
                record,
                content_changed,
            },
        }
    }

    pub fn deleted(id: RecordId, record_type: RecordType, version: i32) -> Self {
        Self {
            id,
            record_type,
            change: TxChange::Deleted { version },
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self.change {
            TxChange::Created { .. } => OperationKind::Created,
            TxChange::Updated { .. } => OperationKind::Updated,
            TxChange::Deleted { .. } => OperationKind::Deleted,
        }
    }

    /// Expected base version; absent for creations.
    pub fn version(&self) -> Option<i32> {
        match self.change {
            TxChange::Created { .. } => None,
            TxChange::Updated { version, .. } | TxChange::Deleted { version } => Some(version),
        }
    }

    /// Record body; absent for deletions.
    pub fn record(&self) -> Option<&Record> {
        match &self.change {
            TxChange::Created { record } | TxChange::Updated { record, .. } => Some(record),
            TxChange::Deleted { .. } => None,
        }
    }
}

/// Writes one transaction entry with its body in the `serializer` format.
///
/// A body failure is returned with the record's identity. Unlike
/// [`crate::envelope::write_record`] the entry is left incomplete, so the
/// message must be abandoned.
pub fn write_transaction_entry<W: ChannelOutput + ?Sized>(
    out: &mut W,
    op: &TxOperation,
    serializer: &str,
    ctx: &CodecContext,
) -> Result<(), ProtocolError> {
    out.write_i8(TX_ENTRY_PRESENT)?;
    out.write_u8(op.kind() as u8)?;
    out.write_rid(op.id)?;
    out.write_u8(op.record_type.tag())?;

    match &op.change {
        TxChange::Created { record } => {
            let body = body_bytes(op.id, record, serializer, ctx)?;
            out.write_bytes(Some(&body))?;
        }
        TxChange::Updated {
            version,
            record,
            content_changed,
        } => {
            out.write_version(*version)?;
            let body = body_bytes(op.id, record, serializer, ctx)?;
            out.write_bytes(Some(&body))?;
            out.write_bool(*content_changed)?;
        }
        TxChange::Deleted { version } => {
            out.write_version(*version)?;
        }
    }
    Ok(())
}

fn body_bytes(
    id: RecordId,
    record: &Record,
    serializer: &str,
    ctx: &CodecContext,
) -> Result<bytes::Bytes, ProtocolError> {
    get_record_bytes(record, serializer, ctx).map_err(|e| {
        tracing::warn!(rid = %id, serializer, error = %e, "failed to serialize transaction entry");
        ProtocolError::serialization(id, e)
    })
}

/// Reads one transaction entry, or `None` at the end-of-list marker.
///
/// Unknown operation kinds are rejected after the four leading fields; the
/// stream cannot be resynchronized past them.
pub fn read_transaction_entry<R: ChannelInput + ?Sized>(
    input: &mut R,
    serializer: &str,
    ctx: &CodecContext,
) -> Result<Option<TxOperation>, ProtocolError> {
    match input.read_i8()? {
        TX_ENTRY_END => return Ok(None),
        TX_ENTRY_PRESENT => {}
        flag => return Err(ProtocolError::InvalidPresentFlag(flag)),
    }

    let kind = input.read_u8()?;
    let id = input.read_rid()?;
    let tag = input.read_u8()?;
    let kind = OperationKind::try_from(kind)?;

    let record = ctx
        .record_types()
        .new_instance(tag, id)
        .map_err(|e| ProtocolError::serialization(id, e))?;
    let record_type = record.record_type();

    let change = match kind {
        OperationKind::Created => TxChange::Created {
            record: read_body(input, record, serializer, ctx)?,
        },
        OperationKind::Updated => {
            let version = input.read_version()?;
            let mut record = read_body(input, record, serializer, ctx)?;
            record.set_version(version);
            let content_changed = input.read_bool()?;
            TxChange::Updated {
                version,
                record,
                content_changed,
            }
        }
        OperationKind::Deleted => TxChange::Deleted {
            version: input.read_version()?,
        },
    };

    Ok(Some(TxOperation {
        id,
        record_type,
        change,
    }))
}

fn read_body<R: ChannelInput + ?Sized>(
    input: &mut R,
    empty: Record,
    serializer: &str,
    ctx: &CodecContext,
) -> Result<Record, ProtocolError> {
    let id = empty.identity();
    let body = input
        .read_bytes()?
        .ok_or(ProtocolError::InvalidLength(NULL_LENGTH))?;
    ctx.codec(serializer)?
        .decode(body, empty)
        .map_err(|e| ProtocolError::serialization(id, e))
}

/// Writes every operation followed by the end-of-list marker.
pub fn write_transaction_entries<W: ChannelOutput + ?Sized>(
    out: &mut W,
    ops: &[TxOperation],
    serializer: &str,
    ctx: &CodecContext,
) -> Result<(), ProtocolError> {
    for op in ops {
        write_transaction_entry(out, op, serializer, ctx)?;
    }
    out.write_i8(TX_ENTRY_END)?;
    tracing::debug!(entries = ops.len(), serializer, "wrote transaction entries");
    Ok(())
}

/// Reads entries until the end-of-list marker.
pub fn read_transaction_entries<R: ChannelInput + ?Sized>(
    input: &mut R,
    serializer: &str,
    ctx: &CodecContext,
) -> Result<Vec<TxOperation>, ProtocolError> {
    let mut ops = Vec::new();
    while let Some(op) = read_transaction_entry(input, serializer, ctx)? {
        ops.push(op);
    }
    tracing::debug!(entries = ops.len(), serializer, "read transaction entries");
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Buf, Bytes, BytesMut};
    use graphwire_record::{Document, FieldValue, RecordCodec, BINARY_FORMAT, JSON_FORMAT};
    use proptest::prelude::*;

    fn doc(cluster: i16, position: i64, version: i32) -> Record {
        Record::document(
            RecordId::new(cluster, position),
            version,
            Document::with_class("Account")
                .field("owner", "ada")
                .field("balance", 100i64),
        )
    }

    fn encode(ops: &[TxOperation], serializer: &str, ctx: &CodecContext) -> Bytes {
        let mut buf = BytesMut::new();
        write_transaction_entries(&mut buf, ops, serializer, ctx).unwrap();
        buf.freeze()
    }

    #[test]
    fn test_operation_kind_values() {
        assert_eq!(OperationKind::Updated as u8, 1);
        assert_eq!(OperationKind::Deleted as u8, 2);
        assert_eq!(OperationKind::Created as u8, 3);
        assert_eq!(OperationKind::try_from(3).unwrap(), OperationKind::Created);
        assert!(matches!(
            OperationKind::try_from(0),
            Err(ProtocolError::UnknownOperation(0))
        ));
        assert_eq!(OperationKind::Deleted.as_str(), "DELETED");
    }

    #[test]
    fn test_delete_layout() {
        let ctx = CodecContext::default();
        let op = TxOperation::deleted(RecordId::new(7, 9), RecordType::Document, 4);
        let mut buf = BytesMut::new();
        write_transaction_entry(&mut buf, &op, JSON_FORMAT, &ctx).unwrap();

        assert_eq!(
            buf.as_ref(),
            &[1, 2, 0, 7, 0, 0, 0, 0, 0, 0, 0, 9, b'd', 8]
        );
    }

    #[test]
    fn test_create_layout() {
        let ctx = CodecContext::default();
        let record = doc(3, -1, 0);
        let op = TxOperation::created(record.clone());
        let mut buf = BytesMut::new();
        write_transaction_entry(&mut buf, &op, JSON_FORMAT, &ctx).unwrap();

        let mut input = buf.freeze();
        assert_eq!(input.read_i8().unwrap(), TX_ENTRY_PRESENT);
        assert_eq!(input.read_u8().unwrap(), 3);
        assert_eq!(input.read_rid().unwrap(), RecordId::new(3, -1));
        assert_eq!(input.read_u8().unwrap(), b'd');
        let body = input.read_bytes().unwrap().unwrap();
        assert_eq!(body, graphwire_record::JsonCodec.encode(&record).unwrap());
        assert!(!input.has_remaining());
    }

    #[test]
    fn test_update_layout() {
        let ctx = CodecContext::default();
        let op = TxOperation::updated(doc(3, 5, 2), true);
        let mut buf = BytesMut::new();
        write_transaction_entry(&mut buf, &op, BINARY_FORMAT, &ctx).unwrap();

        let mut input = buf.freeze();
        input.advance(1 + 1 + 10 + 1);
        assert_eq!(input.read_version().unwrap(), 2);
        assert!(input.read_bytes().unwrap().is_some());
        assert!(input.read_bool().unwrap());
        assert!(!input.has_remaining());
    }

    #[test]
    fn test_entries_roundtrip() {
        let ctx = CodecContext::default();
        let ops = vec![
            TxOperation::created(doc(3, -2, 0)),
            TxOperation::updated(doc(3, 10, 6), false),
            TxOperation::updated(doc(3, 11, 1), true),
            TxOperation::deleted(RecordId::new(4, 0), RecordType::Blob, 12),
            TxOperation::created(Record::blob(RecordId::new(5, -3), 0, &b"payload"[..])),
        ];

        for serializer in [JSON_FORMAT, BINARY_FORMAT] {
            let mut input = encode(&ops, serializer, &ctx);
            let decoded = read_transaction_entries(&mut input, serializer, &ctx).unwrap();
            assert_eq!(decoded, ops);
            assert!(!input.has_remaining());
        }
    }

    #[test]
    fn test_empty_list_is_single_terminator() {
        let ctx = CodecContext::default();
        let bytes = encode(&[], JSON_FORMAT, &ctx);
        assert_eq!(bytes.as_ref(), &[0]);

        let mut input = bytes;
        assert!(read_transaction_entries(&mut input, JSON_FORMAT, &ctx)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_accessors() {
        let op = TxOperation::updated(doc(1, 1, 9), true);
        assert_eq!(op.kind(), OperationKind::Updated);
        assert_eq!(op.version(), Some(9));
        assert!(op.record().is_some());

        let op = TxOperation::created(doc(1, -1, 0));
        assert_eq!(op.version(), None);

        let op = TxOperation::deleted(RecordId::new(1, 1), RecordType::Document, 3);
        assert_eq!(op.version(), Some(3));
        assert!(op.record().is_none());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let ctx = CodecContext::default();
        let mut buf = BytesMut::new();
        buf.write_i8(TX_ENTRY_PRESENT).unwrap();
        buf.write_u8(9).unwrap();
        buf.write_rid(RecordId::new(1, 1)).unwrap();
        buf.write_u8(b'd').unwrap();
        buf.write_version(1).unwrap();
        buf.write_i8(TX_ENTRY_END).unwrap();

        let mut input = buf.freeze();
        let err = read_transaction_entry(&mut input, JSON_FORMAT, &ctx).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownOperation(9)));
        // only the four leading fields were consumed
        assert_eq!(input.remaining(), 2);
    }

    #[test]
    fn test_invalid_present_flag() {
        let ctx = CodecContext::default();
        let mut input = Bytes::from_static(&[2]);
        assert!(matches!(
            read_transaction_entry(&mut input, JSON_FORMAT, &ctx),
            Err(ProtocolError::InvalidPresentFlag(2))
        ));
    }

    #[test]
    fn test_unknown_record_type_on_delete() {
        let ctx = CodecContext::default();
        let mut buf = BytesMut::new();
        buf.write_i8(TX_ENTRY_PRESENT).unwrap();
        buf.write_u8(OperationKind::Deleted as u8).unwrap();
        buf.write_rid(RecordId::new(1, 1)).unwrap();
        buf.write_u8(b'v').unwrap();
        buf.write_version(1).unwrap();

        let err = read_transaction_entry(&mut buf.freeze(), JSON_FORMAT, &ctx).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownRecordType(b'v')));
    }

    #[test]
    fn test_create_without_body_is_rejected() {
        let ctx = CodecContext::default();
        let mut buf = BytesMut::new();
        buf.write_i8(TX_ENTRY_PRESENT).unwrap();
        buf.write_u8(OperationKind::Created as u8).unwrap();
        buf.write_rid(RecordId::new(1, -1)).unwrap();
        buf.write_u8(b'd').unwrap();
        buf.write_bytes(None).unwrap();

        let err = read_transaction_entry(&mut buf.freeze(), JSON_FORMAT, &ctx).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidLength(-1)));
    }

    #[test]
    fn test_body_failure_carries_identity() {
        let ctx = CodecContext::default();
        let unloaded = Record::unloaded_document(
            RecordId::new(6, 6),
            1,
            Bytes::from_static(b"not json at all"),
        );
        let op = TxOperation::updated(unloaded, true);
        let mut buf = BytesMut::new();

        let err = write_transaction_entry(&mut buf, &op, BINARY_FORMAT, &ctx).unwrap_err();
        assert!(matches!(err, ProtocolError::Serialization { .. }));
        assert_eq!(err.record_id(), Some(RecordId::new(6, 6)));
    }

    #[test]
    fn test_non_finite_double_fails_entry() {
        let ctx = CodecContext::default();
        let record = Record::document(
            RecordId::new(4, 4),
            0,
            Document::new().field("rate", FieldValue::List(vec![FieldValue::Double(f64::NAN)])),
        );
        let op = TxOperation::created(record);
        let mut buf = BytesMut::new();

        let err = write_transaction_entry(&mut buf, &op, JSON_FORMAT, &ctx).unwrap_err();
        assert!(matches!(err, ProtocolError::Serialization { .. }));
        assert_eq!(err.record_id(), Some(RecordId::new(4, 4)));
    }

    #[test]
    fn test_truncated_entry_is_io_error() {
        let ctx = CodecContext::default();
        let bytes = encode(&[TxOperation::updated(doc(2, 2, 2), true)], JSON_FORMAT, &ctx);
        let mut cut = bytes.slice(..bytes.len() - 3);
        let err = read_transaction_entries(&mut cut, JSON_FORMAT, &ctx).unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
    }

    fn operation() -> impl Strategy<Value = TxOperation> {
        let fields = prop::collection::btree_map(
            "[a-z]{1,6}",
            prop_oneof![
                any::<i64>().prop_map(FieldValue::Integer),
                "[a-z]{0,10}".prop_map(FieldValue::String),
                any::<bool>().prop_map(FieldValue::Boolean),
                (-1.0e6f64..1.0e6).prop_map(FieldValue::Double),
            ]
            .prop_recursive(2, 12, 3, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..3).prop_map(FieldValue::List),
                    prop::collection::btree_map("[a-z]{1,4}", inner, 0..3)
                        .prop_map(FieldValue::Map),
                ]
            }),
            0..5,
        );
        let id = (0i16..100, -1i64..10_000).prop_map(|(c, p)| RecordId::new(c, p));
        (0u8..3, id, fields, any::<i32>(), any::<bool>()).prop_map(
            |(kind, id, fields, version, changed)| {
                let mut doc = Document::new();
                for (name, value) in fields {
                    doc.set(name, value);
                }
                match kind {
                    0 => TxOperation::created(Record::document(id, 0, doc)),
                    1 => TxOperation::updated(Record::document(id, version, doc), changed),
                    _ => TxOperation::deleted(id, RecordType::Document, version),
                }
            },
        )
    }

    proptest! {
        #[test]
        fn prop_entries_roundtrip(
            ops in prop::collection::vec(operation(), 1..8),
            binary in any::<bool>(),
        ) {
            let ctx = CodecContext::default();
            let serializer = if binary { BINARY_FORMAT } else { JSON_FORMAT };
            let mut input = encode(&ops, serializer, &ctx);
            let decoded = read_transaction_entries(&mut input, serializer, &ctx).unwrap();
            prop_assert_eq!(decoded, ops);
        }
    }
}
