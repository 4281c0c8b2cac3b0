//! The "turtle" file: a tiny bootstrap record, outside the metadata table
//! itself, describing where the metadata table's own root page lives.
//!
//! The metadata table can't record its own location inside itself — the
//! original engine solves this with a small plain-text file written
//! alongside the database (`WiredTiger.turtle`); this is that file's
//! equivalent.

use std::fs;
use std::path::Path;

use crate::common::error::{Error, Result};
use crate::common::PageId;
use crate::common::config::{MIN_MAJOR, MIN_MINOR};

/// Bootstrap record: format version plus the metadata table's root page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurtleRecord {
    pub major: u16,
    pub minor: u16,
    pub metadata_root: PageId,
}

impl TurtleRecord {
    pub fn new(metadata_root: PageId) -> Self {
        Self { major: MIN_MAJOR, minor: MIN_MINOR, metadata_root }
    }

    fn encode(&self) -> String {
        format!(
            "version=(major={},minor={}),metadata_root={}",
            self.major, self.minor, self.metadata_root.0
        )
    }

    fn decode(text: &str) -> Result<Self> {
        let mut major = None;
        let mut minor = None;
        let mut metadata_root = None;

        for field in text.split(',') {
            if let Some(rest) = field.strip_prefix("version=(major=") {
                let (m, tail) = rest
                    .split_once(",minor=")
                    .ok_or_else(|| Error::Corrupt("malformed turtle version field".into()))?;
                major = Some(m.parse::<u16>().map_err(|e| Error::Corrupt(e.to_string()))?);
                let minor_str = tail.trim_end_matches(')');
                minor = Some(minor_str.parse::<u16>().map_err(|e| Error::Corrupt(e.to_string()))?);
            } else if let Some(rest) = field.strip_prefix("metadata_root=") {
                metadata_root = Some(
                    rest.parse::<u32>()
                        .map(PageId::new)
                        .map_err(|e| Error::Corrupt(e.to_string()))?,
                );
            }
        }

        Ok(Self {
            major: major.ok_or_else(|| Error::Corrupt("turtle file missing version".into()))?,
            minor: minor.ok_or_else(|| Error::Corrupt("turtle file missing version".into()))?,
            metadata_root: metadata_root
                .ok_or_else(|| Error::Corrupt("turtle file missing metadata_root".into()))?,
        })
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.encode())?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::decode(text.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.turtle");
        let record = TurtleRecord::new(PageId::new(3));
        record.write(&path).unwrap();
        let loaded = TurtleRecord::read(&path).unwrap();
        assert_eq!(record, loaded);
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(TurtleRecord::decode("version=(major=1,minor=0)").is_err());
    }
}
