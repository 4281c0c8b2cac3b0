//! Cell codec: the tagged-union records packed into a page body.
//!
//! A page's body (everything after [`super::page_header::PageHeader`]) is a
//! sequence of cells. Internal pages alternate key cells with address cells
//! pointing at child pages; leaf pages alternate key cells with value cells
//! (row-store) or carry bare value cells keyed by implicit record number
//! (column-store).
//!
//! Every cell starts with a one-byte [`CellType`] discriminant followed by
//! a varint-encoded body, using the same LEB128 varint codec as
//! [`crate::common::address`].

use crate::common::address::{read_varint, write_varint};
use crate::common::error::{Error, Result};

/// Discriminant for the tagged union of on-disk cell records.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Key = 1,
    ShortKey = 2,
    PrefixCompressedKey = 3,
    Value = 4,
    ShortValue = 5,
    ValueCopy = 6,
    Deleted = 7,
    OverflowKey = 8,
    OverflowValue = 9,
    OverflowRemoved = 10,
    AddressInternal = 11,
    AddressLeaf = 12,
    AddressLeafNoOverflow = 13,
    AddressDeleted = 14,
}

impl CellType {
    fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            1 => CellType::Key,
            2 => CellType::ShortKey,
            3 => CellType::PrefixCompressedKey,
            4 => CellType::Value,
            5 => CellType::ShortValue,
            6 => CellType::ValueCopy,
            7 => CellType::Deleted,
            8 => CellType::OverflowKey,
            9 => CellType::OverflowValue,
            10 => CellType::OverflowRemoved,
            11 => CellType::AddressInternal,
            12 => CellType::AddressLeaf,
            13 => CellType::AddressLeafNoOverflow,
            14 => CellType::AddressDeleted,
            other => return Err(Error::Corrupt(format!("unknown cell type {}", other))),
        })
    }
}

/// A single record packed into a page body.
///
/// `ShortKey`/`ShortValue` are the same payload as `Key`/`Value` but with a
/// length that fits the compact single-byte-length fast path; callers
/// choose the short variant via [`Cell::key`]/[`Cell::value`] based on
/// length, so decoders never need to special-case them beyond the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Full key bytes.
    Key(Vec<u8>),
    /// Key bytes, guaranteed short enough to skip the prefix-compression
    /// path during reconciliation.
    ShortKey(Vec<u8>),
    /// Key stored as a shared prefix length plus a suffix, relative to the
    /// previous key cell on the page.
    PrefixCompressedKey { prefix_len: u32, suffix: Vec<u8> },
    /// Full value bytes.
    Value(Vec<u8>),
    /// Value bytes, short form.
    ShortValue(Vec<u8>),
    /// A value identical to an earlier value cell on the same page,
    /// referenced by its cell index (run-length style dedup).
    ValueCopy { cell_index: u32 },
    /// Tombstone: the key existed but its value has been removed.
    Deleted,
    /// Key stored out-of-line on an overflow page, referenced by cookie.
    OverflowKey { cookie: Vec<u8>, total_len: u32 },
    /// Value stored out-of-line on an overflow page, referenced by cookie.
    OverflowValue { cookie: Vec<u8>, total_len: u32 },
    /// An overflow value cell whose backing page was freed (no readers with
    /// an outstanding reference remain).
    OverflowRemoved,
    /// Address cell on an internal page pointing at a child subtree that may
    /// itself contain overflow records.
    AddressInternal { cookie: Vec<u8>, recno: u64 },
    /// Address cell pointing at a leaf child.
    AddressLeaf { cookie: Vec<u8>, recno: u64 },
    /// Address cell pointing at a leaf child known to contain no overflow
    /// items, letting readers skip overflow tracking for that subtree.
    AddressLeafNoOverflow { cookie: Vec<u8>, recno: u64 },
    /// Address cell for a child subtree that was deleted wholesale (fast-
    /// truncate) and has not yet been instantiated.
    AddressDeleted,
}

impl Cell {
    pub fn cell_type(&self) -> CellType {
        match self {
            Cell::Key(_) => CellType::Key,
            Cell::ShortKey(_) => CellType::ShortKey,
            Cell::PrefixCompressedKey { .. } => CellType::PrefixCompressedKey,
            Cell::Value(_) => CellType::Value,
            Cell::ShortValue(_) => CellType::ShortValue,
            Cell::ValueCopy { .. } => CellType::ValueCopy,
            Cell::Deleted => CellType::Deleted,
            Cell::OverflowKey { .. } => CellType::OverflowKey,
            Cell::OverflowValue { .. } => CellType::OverflowValue,
            Cell::OverflowRemoved => CellType::OverflowRemoved,
            Cell::AddressInternal { .. } => CellType::AddressInternal,
            Cell::AddressLeaf { .. } => CellType::AddressLeaf,
            Cell::AddressLeafNoOverflow { .. } => CellType::AddressLeafNoOverflow,
            Cell::AddressDeleted => CellType::AddressDeleted,
        }
    }

    /// Build a key cell, choosing the short form under 64 bytes the way
    /// reconciliation does to keep common cells compact.
    pub fn key(bytes: Vec<u8>) -> Cell {
        if bytes.len() < 64 {
            Cell::ShortKey(bytes)
        } else {
            Cell::Key(bytes)
        }
    }

    /// Build a value cell, choosing the short form under 64 bytes.
    pub fn value(bytes: Vec<u8>) -> Cell {
        if bytes.len() < 64 {
            Cell::ShortValue(bytes)
        } else {
            Cell::Value(bytes)
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Cell::Deleted | Cell::AddressDeleted)
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.cell_type() as u8);
        match self {
            Cell::Key(bytes) | Cell::ShortKey(bytes) => write_bytes(buf, bytes),
            Cell::PrefixCompressedKey { prefix_len, suffix } => {
                write_varint(buf, *prefix_len as u64);
                write_bytes(buf, suffix);
            }
            Cell::Value(bytes) | Cell::ShortValue(bytes) => write_bytes(buf, bytes),
            Cell::ValueCopy { cell_index } => write_varint(buf, *cell_index as u64),
            Cell::Deleted | Cell::OverflowRemoved | Cell::AddressDeleted => {}
            Cell::OverflowKey { cookie, total_len } | Cell::OverflowValue { cookie, total_len } => {
                write_varint(buf, *total_len as u64);
                write_bytes(buf, cookie);
            }
            Cell::AddressInternal { cookie, recno }
            | Cell::AddressLeaf { cookie, recno }
            | Cell::AddressLeafNoOverflow { cookie, recno } => {
                write_varint(buf, *recno);
                write_bytes(buf, cookie);
            }
        }
    }

    pub fn decode(bytes: &[u8], cursor: &mut usize) -> Result<Cell> {
        let tag = *bytes
            .get(*cursor)
            .ok_or_else(|| Error::Corrupt("truncated cell: missing tag".into()))?;
        *cursor += 1;
        let cell_type = CellType::from_u8(tag)?;
        Ok(match cell_type {
            CellType::Key => Cell::Key(read_bytes(bytes, cursor)?),
            CellType::ShortKey => Cell::ShortKey(read_bytes(bytes, cursor)?),
            CellType::PrefixCompressedKey => {
                let prefix_len = read_varint(bytes, cursor)? as u32;
                let suffix = read_bytes(bytes, cursor)?;
                Cell::PrefixCompressedKey { prefix_len, suffix }
            }
            CellType::Value => Cell::Value(read_bytes(bytes, cursor)?),
            CellType::ShortValue => Cell::ShortValue(read_bytes(bytes, cursor)?),
            CellType::ValueCopy => {
                let cell_index = read_varint(bytes, cursor)? as u32;
                Cell::ValueCopy { cell_index }
            }
            CellType::Deleted => Cell::Deleted,
            CellType::OverflowKey => {
                let total_len = read_varint(bytes, cursor)? as u32;
                let cookie = read_bytes(bytes, cursor)?;
                Cell::OverflowKey { cookie, total_len }
            }
            CellType::OverflowValue => {
                let total_len = read_varint(bytes, cursor)? as u32;
                let cookie = read_bytes(bytes, cursor)?;
                Cell::OverflowValue { cookie, total_len }
            }
            CellType::OverflowRemoved => Cell::OverflowRemoved,
            CellType::AddressInternal => {
                let recno = read_varint(bytes, cursor)?;
                let cookie = read_bytes(bytes, cursor)?;
                Cell::AddressInternal { cookie, recno }
            }
            CellType::AddressLeaf => {
                let recno = read_varint(bytes, cursor)?;
                let cookie = read_bytes(bytes, cursor)?;
                Cell::AddressLeaf { cookie, recno }
            }
            CellType::AddressLeafNoOverflow => {
                let recno = read_varint(bytes, cursor)?;
                let cookie = read_bytes(bytes, cursor)?;
                Cell::AddressLeafNoOverflow { cookie, recno }
            }
            CellType::AddressDeleted => Cell::AddressDeleted,
        })
    }
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn read_bytes(bytes: &[u8], cursor: &mut usize) -> Result<Vec<u8>> {
    let len = read_varint(bytes, cursor)? as usize;
    let end = *cursor + len;
    let slice = bytes
        .get(*cursor..end)
        .ok_or_else(|| Error::Corrupt("truncated cell payload".into()))?;
    *cursor = end;
    Ok(slice.to_vec())
}

/// Encode a sequence of cells into a page body buffer.
pub fn encode_cells(cells: &[Cell]) -> Vec<u8> {
    let mut buf = Vec::new();
    for cell in cells {
        cell.encode(&mut buf);
    }
    buf
}

/// Decode `count` cells from the start of `bytes`.
pub fn decode_cells(bytes: &[u8], count: usize) -> Result<Vec<Cell>> {
    let mut cursor = 0;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(Cell::decode(bytes, &mut cursor)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_roundtrip() {
        let cell = Cell::key(b"hello".to_vec());
        assert_eq!(cell.cell_type(), CellType::ShortKey);
        let mut buf = Vec::new();
        cell.encode(&mut buf);
        let mut cursor = 0;
        assert_eq!(Cell::decode(&buf, &mut cursor).unwrap(), cell);
        assert_eq!(cursor, buf.len());
    }

    #[test]
    fn test_long_key_uses_full_form() {
        let bytes = vec![b'x'; 100];
        let cell = Cell::key(bytes);
        assert_eq!(cell.cell_type(), CellType::Key);
    }

    #[test]
    fn test_deleted_cell_has_no_payload() {
        let mut buf = Vec::new();
        Cell::Deleted.encode(&mut buf);
        assert_eq!(buf.len(), 1);
        let mut cursor = 0;
        assert_eq!(Cell::decode(&buf, &mut cursor).unwrap(), Cell::Deleted);
    }

    #[test]
    fn test_address_leaf_roundtrip() {
        let cell = Cell::AddressLeaf {
            cookie: vec![1, 2, 3],
            recno: 42,
        };
        let mut buf = Vec::new();
        cell.encode(&mut buf);
        let mut cursor = 0;
        assert_eq!(Cell::decode(&buf, &mut cursor).unwrap(), cell);
    }

    #[test]
    fn test_overflow_value_roundtrip() {
        let cell = Cell::OverflowValue {
            cookie: vec![9, 9, 9],
            total_len: 90_000,
        };
        let mut buf = Vec::new();
        cell.encode(&mut buf);
        let mut cursor = 0;
        assert_eq!(Cell::decode(&buf, &mut cursor).unwrap(), cell);
    }

    #[test]
    fn test_encode_decode_cells_sequence() {
        let cells = vec![
            Cell::key(b"a".to_vec()),
            Cell::value(b"1".to_vec()),
            Cell::key(b"b".to_vec()),
            Cell::Deleted,
        ];
        let encoded = encode_cells(&cells);
        let decoded = decode_cells(&encoded, cells.len()).unwrap();
        assert_eq!(cells, decoded);
    }

    #[test]
    fn test_decode_unknown_tag_fails() {
        let bytes = [0xFFu8];
        let mut cursor = 0;
        assert!(Cell::decode(&bytes, &mut cursor).is_err());
    }

    #[test]
    fn test_value_copy_roundtrip() {
        let cell = Cell::ValueCopy { cell_index: 7 };
        let mut buf = Vec::new();
        cell.encode(&mut buf);
        let mut cursor = 0;
        assert_eq!(Cell::decode(&buf, &mut cursor).unwrap(), cell);
    }
}
