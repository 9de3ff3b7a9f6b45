//! # graphwire-protocol
//!
//! Binary message codec for the graphwire client/server channel.
//!
//! This crate provides:
//! - Big-endian primitive encodings over any `bytes` buffer
//! - Record envelopes (null, reference, full record)
//! - Transaction entry lists with per-entry present flags
//! - Cluster directories, including legacy fields for old peers
//! - Collection change maps and physical position arrays

pub mod channel;
pub mod cluster;
pub mod collection;
pub mod context;
pub mod envelope;
pub mod error;
pub mod position;
pub mod tx;

pub use channel::{ChannelInput, ChannelOutput, NULL_LENGTH, RID_SIZE};
pub use cluster::{find_cluster, read_clusters, write_clusters, ClusterEntry};
pub use collection::{
    read_collection_changes, write_collection_changes, BucketPointer, CollectionChanges,
    CollectionPointer,
};
pub use context::CodecContext;
pub use envelope::{
    get_record_bytes, read_identifiable, read_record, write_identifiable, write_record,
    Identifiable,
};
pub use error::{ErrorKind, ProtocolError};
pub use position::{read_physical_positions, write_physical_positions, PhysicalPosition};
pub use tx::{
    read_transaction_entries, read_transaction_entry, write_transaction_entries,
    write_transaction_entry, OperationKind, TxChange, TxOperation,
};

/// Envelope marker for an absent record.
pub const RECORD_NULL: i16 = -2;

/// Envelope marker for a bare record reference.
pub const RECORD_RID: i16 = -3;

/// Envelope marker for a full record.
pub const RECORD_FULL: i16 = 0;

/// First protocol version without data-segment fields in cluster directories.
pub const DATA_SEGMENT_REMOVED_VERSION: i16 = 24;

/// Protocol version spoken by this implementation.
pub const CURRENT_PROTOCOL_VERSION: i16 = 37;

/// Oldest protocol version a peer may negotiate.
pub const OLDEST_SUPPORTED_PROTOCOL_VERSION: i16 = 21;
