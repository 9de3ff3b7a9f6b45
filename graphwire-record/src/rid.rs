//! Record identities.

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cluster id meaning "no cluster".
pub const CLUSTER_ID_INVALID: i16 = -1;

/// Cluster position of a record that has not been assigned storage yet.
pub const CLUSTER_POS_INVALID: i64 = -1;

/// Reference to a persisted record: `#<cluster id>:<cluster position>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    pub cluster_id: i16,
    pub cluster_position: i64,
}

impl RecordId {
    /// Identity of a record that has neither a cluster nor a position.
    pub const EMPTY: RecordId = RecordId {
        cluster_id: CLUSTER_ID_INVALID,
        cluster_position: CLUSTER_POS_INVALID,
    };

    pub fn new(cluster_id: i16, cluster_position: i64) -> Self {
        Self {
            cluster_id,
            cluster_position,
        }
    }

    /// Returns whether the record still waits for a storage position.
    pub fn is_new(&self) -> bool {
        self.cluster_position < 0
    }

    /// Returns whether the id points at a real cluster.
    pub fn is_valid(&self) -> bool {
        self.cluster_id != CLUSTER_ID_INVALID
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster_id, self.cluster_position)
    }
}

impl FromStr for RecordId {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RecordError::InvalidRecordId(s.to_string());
        let body = s.trim().strip_prefix('#').unwrap_or(s.trim());
        let (cluster, position) = body.split_once(':').ok_or_else(invalid)?;
        let cluster_id: i16 = cluster.parse().map_err(|_| invalid())?;
        let cluster_position: i64 = position.parse().map_err(|_| invalid())?;
        if cluster_id < CLUSTER_ID_INVALID {
            return Err(invalid());
        }
        Ok(Self::new(cluster_id, cluster_position))
    }
}
