//! Layered netplan YAML hierarchy for nmplan.
//!
//! This crate provides the storage layer: `HierarchyLayout` for the
//! `lib`/`etc`/`run` layer directories, `Hierarchy` which loads every layer
//! into one `DefinitionSet` with override precedence, and `WritePlan` which
//! renders the changed layer files in memory and then persists them with
//! atomic writes.

pub mod hierarchy;
pub mod layout;
pub mod plan;

pub use hierarchy::Hierarchy;
pub use layout::HierarchyLayout;
pub use plan::{PlannedChange, WritePlan};

use nmplan_schema::SchemaError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory so a preceding `rename()` or `unlink()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("hierarchy I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to load '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("definition '{0}' has no target layer file")]
    Unplaced(String),
    #[error("invalid layer file name: {0}")]
    InvalidFilename(String),
}

impl StoreError {
    /// Whether the failure comes from malformed input rather than the
    /// filesystem.
    pub fn is_parse(&self) -> bool {
        matches!(self, StoreError::Parse { .. } | StoreError::Schema(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_parse_names_file() {
        let e = StoreError::Parse {
            path: PathBuf::from("/etc/netplan/01-a.yaml"),
            source: SchemaError::InvalidDocument("bad".to_owned()),
        };
        let msg = e.to_string();
        assert!(msg.contains("01-a.yaml"));
        assert!(msg.contains("bad"));
        assert!(e.is_parse());
    }

    #[test]
    fn store_error_display_unplaced() {
        let e = StoreError::Unplaced("eth0".to_owned());
        assert!(e.to_string().contains("eth0"));
        assert!(!e.is_parse());
    }

    #[test]
    fn io_error_is_not_parse() {
        let e = StoreError::from(std::io::Error::other("disk on fire"));
        assert!(e.to_string().contains("disk on fire"));
        assert!(!e.is_parse());
    }
}
