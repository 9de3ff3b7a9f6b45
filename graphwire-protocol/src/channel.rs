//! Primitive channel reads and writes.
//!
//! Every codec in this crate is written against two small traits:
//! [`ChannelOutput`] (implemented for any [`BufMut`]) and [`ChannelInput`]
//! (implemented for any [`Buf`]). All integers are big-endian.
//!
//! ```text
//! bool    : 1 byte (1 = true, 0 = false)
//! string  : i32 length + UTF-8 bytes   (length -1 = null)
//! bytes   : i32 length + raw bytes     (length -1 = null)
//! rid     : i16 cluster id + i64 cluster position
//! version : zig-zag LEB128 varint of an i32 (1..=5 bytes)
//! ```
//!
//! Running out of input or output space is reported as
//! [`ProtocolError::Io`]; reads never fall back to default values.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes};
use graphwire_record::{RecordId, CLUSTER_ID_INVALID};

/// Length prefix denoting a null string or blob.
pub const NULL_LENGTH: i32 = -1;

/// Longest encoding of a 32-bit varint.
const MAX_VARINT_LEN: usize = 5;

/// Encoded size of a record id.
pub const RID_SIZE: usize = 10;

/// Write half of the byte channel.
pub trait ChannelOutput {
    fn write_i8(&mut self, value: i8) -> Result<(), ProtocolError>;
    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError>;
    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError>;
    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError>;

    fn write_u8(&mut self, value: u8) -> Result<(), ProtocolError> {
        self.write_i8(value as i8)
    }

    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.write_i8(i8::from(value))
    }

    /// Writes a length-prefixed UTF-8 string, or the null length for `None`.
    fn write_string(&mut self, value: Option<&str>) -> Result<(), ProtocolError>;

    /// Writes a length-prefixed blob, or the null length for `None`.
    fn write_bytes(&mut self, value: Option<&[u8]>) -> Result<(), ProtocolError>;

    fn write_rid(&mut self, rid: RecordId) -> Result<(), ProtocolError> {
        self.write_i16(rid.cluster_id)?;
        self.write_i64(rid.cluster_position)
    }

    /// Writes a record version as a zig-zag varint.
    fn write_version(&mut self, version: i32) -> Result<(), ProtocolError>;
}

/// Read half of the byte channel.
pub trait ChannelInput {
    fn read_i8(&mut self) -> Result<i8, ProtocolError>;
    fn read_i16(&mut self) -> Result<i16, ProtocolError>;
    fn read_i32(&mut self) -> Result<i32, ProtocolError>;
    fn read_i64(&mut self) -> Result<i64, ProtocolError>;

    fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        self.read_i8().map(|v| v as u8)
    }

    /// Reads a boolean; any non-zero byte is `true`.
    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        self.read_i8().map(|v| v != 0)
    }

    fn read_string(&mut self) -> Result<Option<String>, ProtocolError>;

    fn read_bytes(&mut self) -> Result<Option<Bytes>, ProtocolError>;

    /// Reads a record id. Cluster ids below -1 are rejected after the full
    /// ten bytes are consumed.
    fn read_rid(&mut self) -> Result<RecordId, ProtocolError> {
        let cluster_id = self.read_i16()?;
        let cluster_position = self.read_i64()?;
        if cluster_id < CLUSTER_ID_INVALID {
            return Err(ProtocolError::InvalidClusterId(cluster_id));
        }
        Ok(RecordId::new(cluster_id, cluster_position))
    }

    fn read_version(&mut self) -> Result<i32, ProtocolError>;
}

fn reserve<B: BufMut + ?Sized>(buf: &B, needed: usize) -> Result<(), ProtocolError> {
    if buf.remaining_mut() < needed {
        return Err(ProtocolError::write_zero(needed, buf.remaining_mut()));
    }
    Ok(())
}

fn length_prefix(len: usize) -> Result<i32, ProtocolError> {
    i32::try_from(len).map_err(|_| ProtocolError::TooManyEntries {
        what: "bytes",
        count: len,
        max: i32::MAX as usize,
    })
}

impl<B: BufMut + ?Sized> ChannelOutput for B {
    fn write_i8(&mut self, value: i8) -> Result<(), ProtocolError> {
        reserve(self, 1)?;
        self.put_i8(value);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError> {
        reserve(self, 2)?;
        self.put_i16(value);
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        reserve(self, 4)?;
        self.put_i32(value);
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError> {
        reserve(self, 8)?;
        self.put_i64(value);
        Ok(())
    }

    fn write_string(&mut self, value: Option<&str>) -> Result<(), ProtocolError> {
        self.write_bytes(value.map(str::as_bytes))
    }

    fn write_bytes(&mut self, value: Option<&[u8]>) -> Result<(), ProtocolError> {
        match value {
            Some(data) => {
                let len = length_prefix(data.len())?;
                reserve(self, 4 + data.len())?;
                self.put_i32(len);
                self.put_slice(data);
            }
            None => self.write_i32(NULL_LENGTH)?,
        }
        Ok(())
    }

    fn write_version(&mut self, version: i32) -> Result<(), ProtocolError> {
        let mut zigzag = ((version << 1) ^ (version >> 31)) as u32;
        let mut encoded = [0u8; MAX_VARINT_LEN];
        let mut len = 0;
        while zigzag >= 0x80 {
            encoded[len] = (zigzag as u8 & 0x7F) | 0x80;
            zigzag >>= 7;
            len += 1;
        }
        encoded[len] = zigzag as u8;
        len += 1;

        reserve(self, len)?;
        self.put_slice(&encoded[..len]);
        Ok(())
    }
}

fn ensure<B: Buf + ?Sized>(buf: &B, needed: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::eof(needed, buf.remaining()));
    }
    Ok(())
}

impl<B: Buf + ?Sized> ChannelInput for B {
    fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        ensure(self, 1)?;
        Ok(self.get_i8())
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        ensure(self, 2)?;
        Ok(self.get_i16())
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        ensure(self, 4)?;
        Ok(self.get_i32())
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        ensure(self, 8)?;
        Ok(self.get_i64())
    }

    fn read_string(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.read_bytes()? {
            Some(raw) => String::from_utf8(raw.to_vec())
                .map(Some)
                .map_err(|_| ProtocolError::InvalidUtf8),
            None => Ok(None),
        }
    }

    fn read_bytes(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        let len = self.read_i32()?;
        if len == NULL_LENGTH {
            return Ok(None);
        }
        let len = usize::try_from(len).map_err(|_| ProtocolError::InvalidLength(len))?;
        ensure(self, len)?;
        Ok(Some(self.copy_to_bytes(len)))
    }

    fn read_version(&mut self) -> Result<i32, ProtocolError> {
        let mut zigzag: u32 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            if i == MAX_VARINT_LEN - 1 && byte > 0x0F {
                return Err(ProtocolError::VarintOverflow);
            }
            zigzag |= u32::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(((zigzag >> 1) as i32) ^ -((zigzag & 1) as i32));
            }
        }
        Err(ProtocolError::VarintOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use proptest::prelude::*;

    #[test]
    fn test_fixed_width_layout() {
        let mut buf = BytesMut::new();
        buf.write_i8(-1).unwrap();
        buf.write_i16(0x0102).unwrap();
        buf.write_i32(0x03040506).unwrap();
        buf.write_i64(7).unwrap();
        buf.write_bool(true).unwrap();

        assert_eq!(
            buf.as_ref(),
            &[0xFF, 1, 2, 3, 4, 5, 6, 0, 0, 0, 0, 0, 0, 0, 7, 1]
        );

        let mut input = buf.freeze();
        assert_eq!(input.read_i8().unwrap(), -1);
        assert_eq!(input.read_i16().unwrap(), 0x0102);
        assert_eq!(input.read_i32().unwrap(), 0x03040506);
        assert_eq!(input.read_i64().unwrap(), 7);
        assert!(input.read_bool().unwrap());
        assert!(!input.has_remaining());
    }

    #[test]
    fn test_string_and_null_string() {
        let mut buf = BytesMut::new();
        buf.write_string(Some("none")).unwrap();
        buf.write_string(None).unwrap();
        assert_eq!(buf.len(), 4 + 4 + 4);

        let mut input = buf.freeze();
        assert_eq!(input.read_string().unwrap().as_deref(), Some("none"));
        assert_eq!(input.read_string().unwrap(), None);
    }

    #[test]
    fn test_bytes_null_marker() {
        let mut buf = BytesMut::new();
        buf.write_bytes(None).unwrap();
        assert_eq!(buf.as_ref(), &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_rid_layout() {
        let mut buf = BytesMut::new();
        buf.write_rid(RecordId::new(3, 258)).unwrap();
        assert_eq!(buf.len(), RID_SIZE);
        assert_eq!(buf.as_ref(), &[0, 3, 0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(buf.freeze().read_rid().unwrap(), RecordId::new(3, 258));
    }

    #[test]
    fn test_version_encoding() {
        let cases: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (-1, &[0x01]),
            (1, &[0x02]),
            (63, &[0x7E]),
            (64, &[0x80, 0x01]),
            (i32::MAX, &[0xFE, 0xFF, 0xFF, 0xFF, 0x0F]),
            (i32::MIN, &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]),
        ];
        for (version, expected) in cases {
            let mut buf = BytesMut::new();
            buf.write_version(*version).unwrap();
            assert_eq!(buf.as_ref(), *expected, "version {}", version);
            assert_eq!(buf.freeze().read_version().unwrap(), *version);
        }
    }

    #[test]
    fn test_version_overflow() {
        let mut input = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF, 0x1F]);
        assert!(matches!(
            input.read_version(),
            Err(ProtocolError::VarintOverflow)
        ));
    }

    #[test]
    fn test_truncated_reads_are_io_errors() {
        let mut input = Bytes::from_static(&[0, 1]);
        match input.read_i32() {
            Err(ProtocolError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected EOF, got {:?}", other),
        }

        let mut input = Bytes::from_static(&[0, 0, 0, 9, b'a']);
        assert!(matches!(input.read_bytes(), Err(ProtocolError::Io(_))));

        let mut input = Bytes::from_static(&[0x80]);
        assert!(matches!(input.read_version(), Err(ProtocolError::Io(_))));
    }

    #[test]
    fn test_rid_cluster_below_invalid_rejected() {
        let mut input = Bytes::from_static(&[0xFF, 0xFE, 0, 0, 0, 0, 0, 0, 0, 7, 0x2A]);
        assert!(matches!(
            input.read_rid(),
            Err(ProtocolError::InvalidClusterId(-2))
        ));
        assert_eq!(input.remaining(), 1);

        let mut input = Bytes::from_static(&[0xFF; 10]);
        assert_eq!(input.read_rid().unwrap(), RecordId::EMPTY);
    }

    #[test]
    fn test_negative_length_rejected() {
        let mut input = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFE]);
        assert!(matches!(
            input.read_bytes(),
            Err(ProtocolError::InvalidLength(-2))
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut input = Bytes::from_static(&[0, 0, 0, 2, 0xC3, 0x28]);
        assert!(matches!(input.read_string(), Err(ProtocolError::InvalidUtf8)));
    }

    #[test]
    fn test_write_into_full_slice() {
        let mut storage = [0u8; 3];
        let mut out: &mut [u8] = &mut storage;
        match out.write_i32(1) {
            Err(ProtocolError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::WriteZero),
            other => panic!("expected write failure, got {:?}", other),
        }
        out.write_i16(5).unwrap();
        assert_eq!(storage[..2], [0, 5]);
    }

    proptest! {
        #[test]
        fn prop_version_roundtrip(version in any::<i32>()) {
            let mut buf = BytesMut::new();
            buf.write_version(version).unwrap();
            prop_assert!(buf.len() <= MAX_VARINT_LEN);
            let mut input = buf.freeze();
            prop_assert_eq!(input.read_version().unwrap(), version);
            prop_assert!(!input.has_remaining());
        }
    }
}
