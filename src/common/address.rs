//! Address cookies: opaque identifiers for block-manager extents.

use crate::common::config::MAX_COOKIE_LEN;
use crate::common::error::{Error, Result};

/// An opaque, bounded (≤255-byte) identifier for a block extent.
///
/// Encodes `(offset, size, checksum)` as a self-describing varint triple.
/// All persistent references to pages pass through one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressCookie {
    pub offset: u64,
    pub size: u32,
    pub checksum: u32,
}

impl AddressCookie {
    pub fn new(offset: u64, size: u32, checksum: u32) -> Self {
        AddressCookie {
            offset,
            size,
            checksum,
        }
    }

    /// Encode as a varint triple. Always fits within `MAX_COOKIE_LEN`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(24);
        write_varint(&mut buf, self.offset);
        write_varint(&mut buf, self.size as u64);
        write_varint(&mut buf, self.checksum as u64);
        debug_assert!(buf.len() <= MAX_COOKIE_LEN);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_COOKIE_LEN {
            return Err(Error::Corrupt("address cookie exceeds max length".into()));
        }
        let mut cursor = 0usize;
        let offset = read_varint(bytes, &mut cursor)?;
        let size = read_varint(bytes, &mut cursor)?;
        let checksum = read_varint(bytes, &mut cursor)?;
        if size > u32::MAX as u64 || checksum > u32::MAX as u64 {
            return Err(Error::Corrupt("address cookie field out of range".into()));
        }
        Ok(AddressCookie {
            offset,
            size: size as u32,
            checksum: checksum as u32,
        })
    }
}

/// LEB128-style variable-length integer encoding: 7 bits of payload per
/// byte, high bit set while more bytes follow. Self-describing so decoding
/// can validate field counts before use.
pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn read_varint(bytes: &[u8], cursor: &mut usize) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *bytes
            .get(*cursor)
            .ok_or_else(|| Error::Corrupt("truncated varint".into()))?;
        *cursor += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 64 {
            return Err(Error::Corrupt("varint too long".into()));
        }
    }
    Ok(result)
}

/// A list of address cookies, used for the four extent lists a checkpoint
/// cookie carries (alloc, avail, discard, free-after-checkpoint).
pub fn encode_cookie_list(list: &[AddressCookie]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_varint(&mut buf, list.len() as u64);
    for cookie in list {
        let encoded = cookie.encode();
        write_varint(&mut buf, encoded.len() as u64);
        buf.extend_from_slice(&encoded);
    }
    buf
}

pub fn decode_cookie_list(bytes: &[u8], cursor: &mut usize) -> Result<Vec<AddressCookie>> {
    let count = read_varint(bytes, cursor)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = read_varint(bytes, cursor)? as usize;
        let end = *cursor + len;
        let slice = bytes
            .get(*cursor..end)
            .ok_or_else(|| Error::Corrupt("truncated cookie list entry".into()))?;
        out.push(AddressCookie::decode(slice)?);
        *cursor = end;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_roundtrip() {
        for value in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            let mut cursor = 0;
            assert_eq!(read_varint(&buf, &mut cursor).unwrap(), value);
            assert_eq!(cursor, buf.len());
        }
    }

    #[test]
    fn test_address_cookie_roundtrip() {
        let cookie = AddressCookie::new(4096 * 17, 4096, 0xDEAD_BEEF);
        let encoded = cookie.encode();
        assert!(encoded.len() <= MAX_COOKIE_LEN);
        let decoded = AddressCookie::decode(&encoded).unwrap();
        assert_eq!(cookie, decoded);
    }

    #[test]
    fn test_cookie_list_roundtrip() {
        let list = vec![
            AddressCookie::new(0, 4096, 1),
            AddressCookie::new(4096, 8192, 2),
            AddressCookie::new(12288, 4096, 3),
        ];
        let encoded = encode_cookie_list(&list);
        let mut cursor = 0;
        let decoded = decode_cookie_list(&encoded, &mut cursor).unwrap();
        assert_eq!(list, decoded);
        assert_eq!(cursor, encoded.len());
    }

    #[test]
    fn test_decode_truncated_fails() {
        assert!(AddressCookie::decode(&[0x80]).is_err());
    }
}
