//! Out-of-line collection changes.
//!
//! Large collections live in their own persistent tree; a message only
//! carries each changed collection's id and the pointer to its tree root.
//!
//! ```text
//! count i32 | (id msb i64 | id lsb i64 | file id i64 | page index i64 | page offset i32)*
//! ```

use crate::channel::{ChannelInput, ChannelOutput};
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Encoded size of a [`CollectionPointer`].
pub const COLLECTION_POINTER_SIZE: usize = 8 + 8 + 4;

/// Changed collections keyed by collection id.
pub type CollectionChanges = HashMap<Uuid, CollectionPointer>;

/// Position of a tree bucket inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketPointer {
    pub page_index: i64,
    pub page_offset: i32,
}

impl BucketPointer {
    pub const NULL: BucketPointer = BucketPointer {
        page_index: -1,
        page_offset: -1,
    };

    pub fn new(page_index: i64, page_offset: i32) -> Self {
        Self {
            page_index,
            page_offset,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.page_index >= 0
    }
}

/// Pointer to the root of a collection's backing tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionPointer {
    pub file_id: i64,
    pub root: BucketPointer,
}

impl CollectionPointer {
    /// Sentinel for a collection whose tree could not be found.
    pub const INVALID: CollectionPointer = CollectionPointer {
        file_id: -1,
        root: BucketPointer::NULL,
    };

    pub fn new(file_id: i64, root: BucketPointer) -> Self {
        Self { file_id, root }
    }

    pub fn is_valid(&self) -> bool {
        self.file_id >= 0 && self.root.is_valid()
    }

    pub fn write_to<W: ChannelOutput + ?Sized>(&self, out: &mut W) -> Result<(), ProtocolError> {
        out.write_i64(self.file_id)?;
        out.write_i64(self.root.page_index)?;
        out.write_i32(self.root.page_offset)
    }

    pub fn read_from<R: ChannelInput + ?Sized>(input: &mut R) -> Result<Self, ProtocolError> {
        let file_id = input.read_i64()?;
        let page_index = input.read_i64()?;
        let page_offset = input.read_i32()?;
        Ok(Self::new(file_id, BucketPointer::new(page_index, page_offset)))
    }
}

impl fmt::Display for CollectionPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "file {} page {} offset {}",
            self.file_id, self.root.page_index, self.root.page_offset
        )
    }
}

pub fn write_collection_changes<W: ChannelOutput + ?Sized>(
    out: &mut W,
    changes: &CollectionChanges,
) -> Result<(), ProtocolError> {
    let count = i32::try_from(changes.len()).map_err(|_| ProtocolError::TooManyEntries {
        what: "collection changes",
        count: changes.len(),
        max: i32::MAX as usize,
    })?;
    out.write_i32(count)?;
    for (id, pointer) in changes {
        let (msb, lsb) = id.as_u64_pair();
        out.write_i64(msb as i64)?;
        out.write_i64(lsb as i64)?;
        pointer.write_to(out)?;
    }
    Ok(())
}

/// Reads collection changes. A repeated id keeps the pointer read last.
pub fn read_collection_changes<R: ChannelInput + ?Sized>(
    input: &mut R,
) -> Result<CollectionChanges, ProtocolError> {
    let count = input.read_i32()?;
    let count = usize::try_from(count).map_err(|_| ProtocolError::InvalidLength(count))?;

    let mut changes = CollectionChanges::new();
    for _ in 0..count {
        let msb = input.read_i64()? as u64;
        let lsb = input.read_i64()? as u64;
        let pointer = CollectionPointer::read_from(input)?;
        changes.insert(Uuid::from_u64_pair(msb, lsb), pointer);
    }
    Ok(changes)
}
