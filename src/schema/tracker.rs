//! Tracks a schema-change operation's sub-steps so a failure partway
//! through (rename a file, then fail updating the metadata table) can be
//! undone in reverse order rather than leaving the schema inconsistent.
//!
//! Grounded on `schema_rename.c`'s own comment: "we track rename
//! operations, if we fail in the middle, we want to undo the ones that
//! were already done."

use log::warn;

use crate::common::error::Result;
use crate::schema::metadata::MetadataTable;

/// One already-applied sub-step of a schema change, paired with how to
/// undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum UndoAction {
    /// `uri` was renamed to `new_uri`; undo by renaming it back.
    Rename { uri: String, new_uri: String },
    /// `uri` was removed; undo by restoring its saved config.
    Remove { uri: String, saved_config: String },
    /// `uri`'s config was overwritten; undo by restoring the old value.
    Overwrite { uri: String, saved_config: String },
}

/// Records schema-change sub-steps for one multi-part operation (rename,
/// drop, truncate) and can undo everything recorded so far if a later
/// step fails.
#[derive(Default)]
pub struct SchemaChangeTracker {
    actions: Vec<UndoAction>,
}

impl SchemaChangeTracker {
    pub fn new() -> Self {
        Self { actions: Vec::new() }
    }

    /// Rename `uri` to `new_uri` in `table`, recording how to undo it.
    pub fn rename(&mut self, table: &MetadataTable, uri: &str, new_uri: &str) -> Result<()> {
        let config = table.get(uri)?.unwrap_or_default();
        table.remove(uri)?;
        table.set(new_uri, &config)?;
        self.actions.push(UndoAction::Rename {
            uri: uri.to_string(),
            new_uri: new_uri.to_string(),
        });
        Ok(())
    }

    /// Drop `uri` from `table`, recording its prior config for undo.
    pub fn drop_uri(&mut self, table: &MetadataTable, uri: &str) -> Result<()> {
        let saved_config = table.get(uri)?.unwrap_or_default();
        table.remove(uri)?;
        self.actions.push(UndoAction::Remove { uri: uri.to_string(), saved_config });
        Ok(())
    }

    /// Overwrite `uri`'s config (e.g. truncate resetting record counts),
    /// recording the previous value for undo.
    pub fn overwrite(&mut self, table: &MetadataTable, uri: &str, new_config: &str) -> Result<()> {
        let saved_config = table.get(uri)?.unwrap_or_default();
        table.set(uri, new_config)?;
        self.actions.push(UndoAction::Overwrite { uri: uri.to_string(), saved_config });
        Ok(())
    }

    /// Undo every recorded step, most-recent first, leaving `table` as it
    /// was before this tracker's first action.
    pub fn undo_all(&mut self, table: &MetadataTable) -> Result<()> {
        while let Some(action) = self.actions.pop() {
            match action {
                UndoAction::Rename { uri, new_uri } => {
                    let config = table.get(&new_uri)?.unwrap_or_default();
                    table.remove(&new_uri)?;
                    table.set(&uri, &config)?;
                }
                UndoAction::Remove { uri, saved_config } => {
                    table.set(&uri, &saved_config)?;
                }
                UndoAction::Overwrite { uri, saved_config } => {
                    table.set(&uri, &saved_config)?;
                }
            }
        }
        warn!("schema change rolled back");
        Ok(())
    }

    /// Commit: the operation succeeded, so there's nothing left to track.
    pub fn commit(&mut self) {
        self.actions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::storage::DiskManager;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn make_table() -> (MetadataTable, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("meta.db")).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(32, dm));
        (MetadataTable::create(bpm).unwrap(), dir)
    }

    #[test]
    fn test_rename_then_undo_restores_original() {
        let (table, _dir) = make_table();
        table.set("table:old", "cfg").unwrap();

        let mut tracker = SchemaChangeTracker::new();
        tracker.rename(&table, "table:old", "table:new").unwrap();
        assert_eq!(table.get("table:new").unwrap(), Some("cfg".to_string()));

        tracker.undo_all(&table).unwrap();
        assert_eq!(table.get("table:old").unwrap(), Some("cfg".to_string()));
        assert_eq!(table.get("table:new").unwrap(), None);
    }

    #[test]
    fn test_drop_then_undo_restores_entry() {
        let (table, _dir) = make_table();
        table.set("table:users", "cfg").unwrap();

        let mut tracker = SchemaChangeTracker::new();
        tracker.drop_uri(&table, "table:users").unwrap();
        assert_eq!(table.get("table:users").unwrap(), None);

        tracker.undo_all(&table).unwrap();
        assert_eq!(table.get("table:users").unwrap(), Some("cfg".to_string()));
    }

    #[test]
    fn test_commit_clears_without_undoing() {
        let (table, _dir) = make_table();
        table.set("table:users", "cfg").unwrap();

        let mut tracker = SchemaChangeTracker::new();
        tracker.drop_uri(&table, "table:users").unwrap();
        tracker.commit();
        assert!(tracker.is_empty());
        assert_eq!(table.get("table:users").unwrap(), None);
    }

    #[test]
    fn test_multi_step_undo_reverses_in_order() {
        let (table, _dir) = make_table();
        table.set("table:a", "cfg_a").unwrap();

        let mut tracker = SchemaChangeTracker::new();
        tracker.rename(&table, "table:a", "table:b").unwrap();
        tracker.overwrite(&table, "table:b", "cfg_b_updated").unwrap();

        tracker.undo_all(&table).unwrap();
        assert_eq!(table.get("table:a").unwrap(), Some("cfg_a".to_string()));
        assert_eq!(table.get("table:b").unwrap(), None);
    }
}
