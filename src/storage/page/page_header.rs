//! Page header and type definitions.
//!
//! Every page starts with a [`PageHeader`] containing metadata:
//! - [`PageType`] discriminator
//! - [`PageFlags`] bit set
//! - CRC32 checksum for integrity
//! - LSN for WAL/recovery
//! - a record-number field (meaningful for column-store pages) and an
//!   entry-count / data-length field, per the on-disk page image layout.

use std::fmt;

/// Type of page stored on disk.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or corrupted page.
    #[default]
    Invalid = 0,
    /// Row-store internal (non-leaf) node: alternating {key, address} cells.
    RowInternal = 1,
    /// Row-store leaf node.
    RowLeaf = 2,
    /// Column-store internal node.
    ColInternal = 3,
    /// Column-store fixed-length leaf (bit-slab of values).
    ColFixedLeaf = 4,
    /// Column-store variable-length leaf (RLE-encoded cells).
    ColVariableLeaf = 5,
    /// Overflow page: a single oversized key or value.
    Overflow = 6,
    /// Block-manager descriptor page (free-list / extent bookkeeping).
    BlockManagerDesc = 7,
}

impl PageType {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::RowInternal,
            2 => PageType::RowLeaf,
            3 => PageType::ColInternal,
            4 => PageType::ColFixedLeaf,
            5 => PageType::ColVariableLeaf,
            6 => PageType::Overflow,
            7 => PageType::BlockManagerDesc,
            _ => PageType::Invalid,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, PageType::RowInternal | PageType::ColInternal)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            PageType::RowLeaf | PageType::ColFixedLeaf | PageType::ColVariableLeaf
        )
    }

    pub fn is_column_store(&self) -> bool {
        matches!(
            self,
            PageType::ColInternal | PageType::ColFixedLeaf | PageType::ColVariableLeaf
        )
    }
}

/// Bit flags carried in every page header.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageFlags(pub u8);

impl PageFlags {
    pub const COMPRESSED: u8 = 0x01;
    pub const ENCRYPTED: u8 = 0x02;
    pub const HAS_LOOKASIDE: u8 = 0x04;
    pub const EMPTY_VALUES_ALL: u8 = 0x08;
    pub const EMPTY_VALUES_NONE: u8 = 0x10;

    pub fn new() -> Self {
        PageFlags(0)
    }

    pub fn has(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn set(&mut self, bit: u8, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

/// Metadata stored at the beginning of every page.
///
/// # Layout (26 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type
/// 1       1     flags
/// 2       4     checksum (CRC32, little-endian)
/// 6       8     lsn (Log Sequence Number, little-endian)
/// 14      8     recno (record number, column trees only; 0 otherwise)
/// 22      4     entry_count (leaf entries) or data length (overflow/blockmgr)
/// ```
///
/// # Checksum
/// The checksum is computed over the entire page with the checksum field
/// itself zeroed out, so verification doesn't need special-case handling.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub flags: PageFlags,
    pub checksum: u32,
    pub lsn: u64,
    pub recno: u64,
    pub entry_count: u32,
}

impl PageHeader {
    pub const SIZE: usize = 26;

    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_FLAGS: usize = 1;
    pub const OFFSET_CHECKSUM: usize = 2;
    pub const OFFSET_LSN: usize = 6;
    pub const OFFSET_RECNO: usize = 14;
    pub const OFFSET_ENTRY_COUNT: usize = 22;

    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            flags: PageFlags::new(),
            checksum: 0,
            lsn: 0,
            recno: 0,
            entry_count: 0,
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        let page_type = PageType::from_u8(data[Self::OFFSET_PAGE_TYPE]);
        let flags = PageFlags(data[Self::OFFSET_FLAGS]);

        let checksum = u32::from_le_bytes(
            data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
                .try_into()
                .unwrap(),
        );
        let lsn = u64::from_le_bytes(
            data[Self::OFFSET_LSN..Self::OFFSET_LSN + 8]
                .try_into()
                .unwrap(),
        );
        let recno = u64::from_le_bytes(
            data[Self::OFFSET_RECNO..Self::OFFSET_RECNO + 8]
                .try_into()
                .unwrap(),
        );
        let entry_count = u32::from_le_bytes(
            data[Self::OFFSET_ENTRY_COUNT..Self::OFFSET_ENTRY_COUNT + 4]
                .try_into()
                .unwrap(),
        );

        Self {
            page_type,
            flags,
            checksum,
            lsn,
            recno,
            entry_count,
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        data[Self::OFFSET_FLAGS] = self.flags.0;
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        data[Self::OFFSET_LSN..Self::OFFSET_LSN + 8].copy_from_slice(&self.lsn.to_le_bytes());
        data[Self::OFFSET_RECNO..Self::OFFSET_RECNO + 8]
            .copy_from_slice(&self.recno.to_le_bytes());
        data[Self::OFFSET_ENTRY_COUNT..Self::OFFSET_ENTRY_COUNT + 4]
            .copy_from_slice(&self.entry_count.to_le_bytes());
    }

    /// Compute CRC32 checksum of a page, with the checksum field zeroed.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&page_data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Verify that the stored checksum matches the computed checksum.
    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}

impl fmt::Display for PageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PageHeader {{ type: {:?}, entries: {}, lsn: {} }}",
            self.page_type, self.entry_count, self.lsn
        )
    }
}
