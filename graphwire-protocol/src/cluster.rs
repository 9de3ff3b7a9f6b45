//! Cluster directory codec.
//!
//! ```text
//! count i16 | (name string | id i16 [| "none" string | -1 i16])*
//! ```
//!
//! The bracketed pair is a retired data-segment name/id, still written for
//! peers that negotiated a protocol version below
//! [`DATA_SEGMENT_REMOVED_VERSION`].

use crate::channel::{ChannelInput, ChannelOutput};
use crate::error::ProtocolError;
use crate::DATA_SEGMENT_REMOVED_VERSION;
use serde::{Deserialize, Serialize};

/// Placeholder data-segment name written for legacy peers.
pub const LEGACY_DATA_SEGMENT_NAME: &str = "none";

/// Placeholder data-segment id written for legacy peers.
pub const LEGACY_DATA_SEGMENT_ID: i16 = -1;

/// A storage cluster as seen by a client. Names compare case-insensitively;
/// the reader lowercases them, the writer sends them as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEntry {
    name: String,
    id: i16,
}

impl ClusterEntry {
    pub fn new(name: impl AsRef<str>, id: i16) -> Self {
        Self {
            name: name.as_ref().to_string(),
            id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> i16 {
        self.id
    }
}

/// Returns the entry registered under `name`, ignoring case.
pub fn find_cluster<'a>(
    clusters: &'a [Option<ClusterEntry>],
    name: &str,
) -> Option<&'a ClusterEntry> {
    let name = name.to_lowercase();
    clusters
        .iter()
        .flatten()
        .find(|c| c.name.to_lowercase() == name)
}

fn has_legacy_fields(protocol_version: i16) -> bool {
    protocol_version < DATA_SEGMENT_REMOVED_VERSION
}

/// Writes the non-empty slots of a sparse cluster array.
pub fn write_clusters<W: ChannelOutput + ?Sized>(
    out: &mut W,
    clusters: &[Option<ClusterEntry>],
    protocol_version: i16,
) -> Result<(), ProtocolError> {
    let present = clusters.iter().flatten().count();
    let count = i16::try_from(present).map_err(|_| ProtocolError::TooManyEntries {
        what: "clusters",
        count: present,
        max: i16::MAX as usize,
    })?;

    let legacy = has_legacy_fields(protocol_version);
    if legacy {
        tracing::debug!(protocol_version, "writing legacy data-segment fields");
    }

    out.write_i16(count)?;
    for cluster in clusters.iter().flatten() {
        out.write_string(Some(&cluster.name))?;
        out.write_i16(cluster.id)?;
        if legacy {
            out.write_string(Some(LEGACY_DATA_SEGMENT_NAME))?;
            out.write_i16(LEGACY_DATA_SEGMENT_ID)?;
        }
    }
    Ok(())
}

/// Reads a cluster directory into an array indexed by cluster id.
///
/// The array grows to fit the largest id; ids that were not sent stay
/// `None`. Entries with a null name are skipped.
pub fn read_clusters<R: ChannelInput + ?Sized>(
    input: &mut R,
    protocol_version: i16,
) -> Result<Vec<Option<ClusterEntry>>, ProtocolError> {
    let count = input.read_i16()?;
    let count = usize::try_from(count).map_err(|_| ProtocolError::InvalidLength(count.into()))?;
    let legacy = has_legacy_fields(protocol_version);

    let mut clusters: Vec<Option<ClusterEntry>> = vec![None; count];
    for _ in 0..count {
        let name = input.read_string()?;
        let id = input.read_i16()?;
        if legacy {
            input.read_string()?;
            input.read_i16()?;
        }

        let Some(name) = name else {
            continue;
        };
        let index = usize::try_from(id).map_err(|_| ProtocolError::InvalidClusterId(id))?;
        if index >= clusters.len() {
            clusters.resize(index + 1, None);
        }
        clusters[index] = Some(ClusterEntry::new(name.to_lowercase(), id));
    }
    Ok(clusters)
}
