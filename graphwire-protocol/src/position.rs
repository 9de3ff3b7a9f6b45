//! Physical position arrays returned by positional cluster queries.
//!
//! ```text
//! count i32 | (cluster position i64 | record size i32 | record version)*
//! ```

use crate::channel::{ChannelInput, ChannelOutput};
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

/// Low-level coordinates of a stored record version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalPosition {
    pub cluster_position: i64,
    pub record_size: i32,
    pub record_version: i32,
}

impl PhysicalPosition {
    pub fn new(cluster_position: i64, record_size: i32, record_version: i32) -> Self {
        Self {
            cluster_position,
            record_size,
            record_version,
        }
    }
}

/// Writes a position array. `None` is written exactly like an empty array.
pub fn write_physical_positions<W: ChannelOutput + ?Sized>(
    out: &mut W,
    positions: Option<&[PhysicalPosition]>,
) -> Result<(), ProtocolError> {
    let positions = positions.unwrap_or_default();
    let count = i32::try_from(positions.len()).map_err(|_| ProtocolError::TooManyEntries {
        what: "physical positions",
        count: positions.len(),
        max: i32::MAX as usize,
    })?;

    out.write_i32(count)?;
    for position in positions {
        out.write_i64(position.cluster_position)?;
        out.write_i32(position.record_size)?;
        out.write_version(position.record_version)?;
    }
    Ok(())
}

pub fn read_physical_positions<R: ChannelInput + ?Sized>(
    input: &mut R,
) -> Result<Vec<PhysicalPosition>, ProtocolError> {
    let count = input.read_i32()?;
    let count = usize::try_from(count).map_err(|_| ProtocolError::InvalidLength(count))?;
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut positions = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let cluster_position = input.read_i64()?;
        let record_size = input.read_i32()?;
        let record_version = input.read_version()?;
        positions.push(PhysicalPosition::new(
            cluster_position,
            record_size,
            record_version,
        ));
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Buf, Bytes, BytesMut};

    fn encode(positions: Option<&[PhysicalPosition]>) -> Bytes {
        let mut buf = BytesMut::new();
        write_physical_positions(&mut buf, positions).unwrap();
        buf.freeze()
    }

    #[test]
    fn test_none_and_empty_are_identical() {
        let none = encode(None);
        let empty = encode(Some(&[]));
        assert_eq!(none, empty);
        assert_eq!(none.as_ref(), &[0, 0, 0, 0]);

        assert!(read_physical_positions(&mut none.clone()).unwrap().is_empty());
        assert!(read_physical_positions(&mut empty.clone()).unwrap().is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let positions = [
            PhysicalPosition::new(0, 120, 1),
            PhysicalPosition::new(1 << 40, 4096, 300),
            PhysicalPosition::new(-1, 0, -1),
        ];
        let mut input = encode(Some(&positions));
        let decoded = read_physical_positions(&mut input).unwrap();
        assert_eq!(decoded, positions);
        assert!(!input.has_remaining());
    }

    #[test]
    fn test_entry_layout() {
        let mut input = encode(Some(&[PhysicalPosition::new(5, 64, 2)]));
        assert_eq!(input.get_i32(), 1);
        assert_eq!(input.get_i64(), 5);
        assert_eq!(input.get_i32(), 64);
        assert_eq!(input.read_version().unwrap(), 2);
        assert!(!input.has_remaining());
    }

    #[test]
    fn test_count_larger_than_input() {
        let mut input = Bytes::from_static(&[0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(matches!(
            read_physical_positions(&mut input),
            Err(ProtocolError::Io(_))
        ));
    }

    #[test]
    fn test_negative_count_rejected() {
        let mut input = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            read_physical_positions(&mut input),
            Err(ProtocolError::InvalidLength(-1))
        ));
    }
}
