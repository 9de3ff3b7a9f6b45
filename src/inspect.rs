//! Offline decoding of captured message bodies.
//!
//! A capture is the raw bytes of one message body, given as hex on the
//! command line or as a file (`@path`) holding either hex text or raw bytes.

use bytes::{Buf, Bytes};
use colored::Colorize;
use graphwire_protocol::{
    read_clusters, read_collection_changes, read_identifiable, read_physical_positions,
    read_record, read_transaction_entries, ClusterEntry, CodecContext, CollectionChanges,
    Identifiable, PhysicalPosition, ProtocolError, TxChange, TxOperation,
};
use graphwire_record::{FieldValue, Record, RecordContent};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Message structure to decode a capture as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Target {
    /// A full record envelope
    Record,
    /// A null marker, record reference or full record
    Identifiable,
    /// A terminated list of transaction entries
    Tx,
    /// A cluster directory
    Clusters,
    /// A collection change map
    Collections,
    /// A physical position array
    Positions,
}

#[derive(Debug)]
pub enum Decoded {
    Record(Record),
    Identifiable(Option<Identifiable>),
    Transaction(Vec<TxOperation>),
    Clusters(Vec<Option<ClusterEntry>>),
    Collections(CollectionChanges),
    Positions(Vec<PhysicalPosition>),
}

/// A decoded capture and the number of bytes left after it.
#[derive(Debug)]
pub struct Inspection {
    pub decoded: Decoded,
    pub trailing: usize,
}

/// Parameters that must match the peer that produced the capture.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions<'a> {
    pub serializer: &'a str,
    pub protocol_version: i16,
}

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("failed to read capture '{}': {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("invalid hex input: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("empty capture")]
    Empty,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Parses a capture argument: `@path` reads a file, anything else is hex.
pub fn parse_input(arg: &str) -> Result<Bytes, InspectError> {
    let bytes = match arg.strip_prefix('@') {
        Some(path) => {
            let raw =
                std::fs::read(path).map_err(|e| InspectError::Io(PathBuf::from(path), e))?;
            match std::str::from_utf8(&raw).ok().and_then(|text| decode_hex(text).ok()) {
                Some(decoded) => decoded,
                None => raw,
            }
        }
        None => decode_hex(arg)?,
    };
    if bytes.is_empty() {
        return Err(InspectError::Empty);
    }
    Ok(Bytes::from(bytes))
}

fn decode_hex(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let text = text.trim();
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(digits)
}

/// Decodes `input` as `target`.
pub fn decode(
    target: Target,
    mut input: Bytes,
    options: DecodeOptions<'_>,
    ctx: &CodecContext,
) -> Result<Inspection, InspectError> {
    let serializer = options.serializer;
    let decoded = match target {
        Target::Record => Decoded::Record(read_record(&mut input, serializer, ctx)?),
        Target::Identifiable => {
            Decoded::Identifiable(read_identifiable(&mut input, serializer, ctx)?)
        }
        Target::Tx => Decoded::Transaction(read_transaction_entries(&mut input, serializer, ctx)?),
        Target::Clusters => {
            Decoded::Clusters(read_clusters(&mut input, options.protocol_version)?)
        }
        Target::Collections => Decoded::Collections(read_collection_changes(&mut input)?),
        Target::Positions => Decoded::Positions(read_physical_positions(&mut input)?),
    };

    let trailing = input.remaining();
    if trailing > 0 {
        tracing::warn!(trailing, "capture has bytes past the decoded value");
    }
    Ok(Inspection { decoded, trailing })
}

/// Renders an inspection for the terminal.
pub fn render(inspection: &Inspection) -> String {
    let mut output = match &inspection.decoded {
        Decoded::Record(record) => render_record(record),
        Decoded::Identifiable(None) => "null".dimmed().to_string(),
        Decoded::Identifiable(Some(Identifiable::Record(record))) => render_record(record),
        Decoded::Identifiable(Some(value)) => {
            format!("{} {}", "ref".yellow(), value.identity().to_string().cyan())
        }
        Decoded::Transaction(ops) => render_transaction(ops),
        Decoded::Clusters(clusters) => render_clusters(clusters),
        Decoded::Collections(changes) => render_collections(changes),
        Decoded::Positions(positions) => render_positions(positions),
    };

    if inspection.trailing > 0 {
        output.push_str(&format!(
            "\n{}: {} trailing byte(s)",
            "Warning".yellow(),
            inspection.trailing
        ));
    }
    output
}

fn render_record(record: &Record) -> String {
    let header = format!(
        "{} {} v{}",
        record.identity().to_string().cyan(),
        record.record_type().as_str().yellow(),
        record.version()
    );
    match record.content() {
        RecordContent::Blob(data) => {
            format!("{}\n  {} bytes: {}", header, data.len(), hex::encode(data))
        }
        RecordContent::Document(doc) if doc.is_loaded() => {
            let mut object = Map::new();
            if let Some(class) = doc.class_name() {
                object.insert("@class".to_string(), Value::String(class.to_string()));
            }
            for (name, value) in doc.fields() {
                object.insert(name.clone(), plain_value(value));
            }
            let body = serde_json::to_string_pretty(&Value::Object(object))
                .unwrap_or_else(|_| "{}".to_string());
            format!("{}\n{}", header, indent(&body))
        }
        RecordContent::Document(_) => format!("{} {}", header, "(fields not loaded)".dimmed()),
    }
}

fn plain_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Boolean(b) => Value::Bool(*b),
        FieldValue::Integer(i) => Value::from(*i),
        FieldValue::Double(d) => Value::from(*d),
        FieldValue::String(s) => Value::String(s.clone()),
        FieldValue::Link(rid) => Value::String(rid.to_string()),
        FieldValue::List(items) => Value::Array(items.iter().map(plain_value).collect()),
        FieldValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), plain_value(v)))
                .collect(),
        ),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_transaction(ops: &[TxOperation]) -> String {
    if ops.is_empty() {
        return "No transaction entries".yellow().to_string();
    }

    let mut output = String::new();
    for (i, op) in ops.iter().enumerate() {
        output.push_str(&format!(
            "[{:>3}] {:<7} {} ({})",
            i,
            op.kind().as_str().yellow(),
            op.id.to_string().cyan(),
            op.record_type.as_str()
        ));
        match &op.change {
            TxChange::Created { record } => {
                output.push('\n');
                output.push_str(&indent(&render_record(record)));
            }
            TxChange::Updated {
                record,
                content_changed,
                ..
            } => {
                output.push_str(&format!(" content changed: {}\n", content_changed));
                output.push_str(&indent(&render_record(record)));
            }
            TxChange::Deleted { version } => {
                output.push_str(&format!(" v{}", version));
            }
        }
        output.push('\n');
    }
    output.trim_end().to_string()
}

fn render_clusters(clusters: &[Option<ClusterEntry>]) -> String {
    let present: Vec<&ClusterEntry> = clusters.iter().flatten().collect();
    if present.is_empty() {
        return "No clusters".yellow().to_string();
    }
    present
        .iter()
        .map(|c| format!("{:>5}  {}", c.id().to_string().cyan(), c.name()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_collections(changes: &CollectionChanges) -> String {
    if changes.is_empty() {
        return "No collection changes".yellow().to_string();
    }
    let mut lines: Vec<String> = changes
        .iter()
        .map(|(id, pointer)| {
            let pointer = if pointer.is_valid() {
                pointer.to_string()
            } else {
                "invalid".red().to_string()
            };
            format!("{}  {}", id.to_string().cyan(), pointer)
        })
        .collect();
    lines.sort();
    lines.join("\n")
}

fn render_positions(positions: &[PhysicalPosition]) -> String {
    if positions.is_empty() {
        return "No positions".yellow().to_string();
    }
    positions
        .iter()
        .map(|p| {
            format!(
                "{:>12} {} size {} v{}",
                p.cluster_position.to_string().cyan(),
                "|".dimmed(),
                p.record_size,
                p.record_version
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use graphwire_protocol::{
        write_clusters, write_record, write_transaction_entries, ChannelOutput,
        CURRENT_PROTOCOL_VERSION,
    };
    use graphwire_record::{Document, RecordId, RecordType, BINARY_FORMAT, JSON_FORMAT};
    use std::io::Write;

    fn options(serializer: &str) -> DecodeOptions<'_> {
        DecodeOptions {
            serializer,
            protocol_version: CURRENT_PROTOCOL_VERSION,
        }
    }

    fn account() -> Record {
        Record::document(
            RecordId::new(3, 7),
            2,
            Document::with_class("Account")
                .field("owner", "ada")
                .field("manager", RecordId::new(4, 1)),
        )
    }

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(parse_input("00ff").unwrap().as_ref(), &[0x00, 0xFF]);
        assert_eq!(parse_input("0x00 FF\n10").unwrap().as_ref(), &[0x00, 0xFF, 0x10]);
        assert!(matches!(parse_input("0g"), Err(InspectError::Hex(_))));
        assert!(matches!(parse_input(""), Err(InspectError::Empty)));
    }

    #[test]
    fn test_parse_file_hex_and_raw() {
        let mut hex_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(hex_file, "fffe").unwrap();
        let arg = format!("@{}", hex_file.path().display());
        assert_eq!(parse_input(&arg).unwrap().as_ref(), &[0xFF, 0xFE]);

        let mut raw_file = tempfile::NamedTempFile::new().unwrap();
        raw_file.write_all(&[0xFF, 0xFE, 0x00]).unwrap();
        let arg = format!("@{}", raw_file.path().display());
        assert_eq!(parse_input(&arg).unwrap().as_ref(), &[0xFF, 0xFE, 0x00]);
    }

    #[test]
    fn test_parse_missing_file() {
        assert!(matches!(
            parse_input("@/nonexistent/capture.bin"),
            Err(InspectError::Io(_, _))
        ));
    }

    #[test]
    fn test_decode_record() {
        let ctx = CodecContext::default();
        let mut buf = BytesMut::new();
        write_record(&mut buf, &account(), JSON_FORMAT, &ctx).unwrap();

        let inspection = decode(Target::Record, buf.freeze(), options(JSON_FORMAT), &ctx).unwrap();
        assert_eq!(inspection.trailing, 0);
        match &inspection.decoded {
            Decoded::Record(record) => assert_eq!(record.identity(), RecordId::new(3, 7)),
            other => panic!("unexpected {:?}", other),
        }

        let text = render(&inspection);
        assert!(text.contains("#3:7"));
        assert!(text.contains("\"owner\": \"ada\""));
        assert!(text.contains("\"manager\": \"#4:1\""));
    }

    #[test]
    fn test_decode_reports_trailing_bytes() {
        let ctx = CodecContext::default();
        let mut buf = BytesMut::new();
        buf.write_i16(graphwire_protocol::RECORD_RID).unwrap();
        buf.write_rid(RecordId::new(1, 2)).unwrap();
        buf.write_u8(0xAA).unwrap();

        let inspection =
            decode(Target::Identifiable, buf.freeze(), options(JSON_FORMAT), &ctx).unwrap();
        assert_eq!(inspection.trailing, 1);
        let text = render(&inspection);
        assert!(text.contains("#1:2"));
        assert!(text.contains("1 trailing byte(s)"));
    }

    #[test]
    fn test_decode_transaction() {
        let ctx = CodecContext::with_active(BINARY_FORMAT).unwrap();
        let ops = vec![
            TxOperation::created(account()),
            TxOperation::deleted(RecordId::new(9, 9), RecordType::Blob, 4),
        ];
        let mut buf = BytesMut::new();
        write_transaction_entries(&mut buf, &ops, BINARY_FORMAT, &ctx).unwrap();

        let inspection = decode(Target::Tx, buf.freeze(), options(BINARY_FORMAT), &ctx).unwrap();
        match &inspection.decoded {
            Decoded::Transaction(decoded) => assert_eq!(decoded.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        let text = render(&inspection);
        assert!(text.contains("#9:9"));
        assert!(text.contains(" v4"));
    }

    #[test]
    fn test_decode_legacy_clusters() {
        let ctx = CodecContext::default();
        let mut buf = BytesMut::new();
        write_clusters(&mut buf, &[Some(ClusterEntry::new("Person", 2))], 22).unwrap();

        let legacy = DecodeOptions {
            serializer: JSON_FORMAT,
            protocol_version: 22,
        };
        let inspection = decode(Target::Clusters, buf.freeze(), legacy, &ctx).unwrap();
        assert_eq!(inspection.trailing, 0);
        assert!(render(&inspection).contains("person"));
    }

    #[test]
    fn test_decode_error_propagates() {
        let ctx = CodecContext::default();
        let input = Bytes::from_static(&[0x00, 0x07]);
        assert!(matches!(
            decode(Target::Identifiable, input, options(JSON_FORMAT), &ctx),
            Err(InspectError::Protocol(ProtocolError::InvalidMarker(7)))
        ));
    }

    #[test]
    fn test_render_empty_positions() {
        let inspection = Inspection {
            decoded: Decoded::Positions(Vec::new()),
            trailing: 0,
        };
        assert!(render(&inspection).contains("No positions"));
    }
}
