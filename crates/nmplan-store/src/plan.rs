use crate::{fsync_dir, StoreError};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// One file-level change computed by [`crate::Hierarchy::plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedChange {
    Write { path: PathBuf, contents: String },
    Remove { path: PathBuf },
}

impl PlannedChange {
    pub fn path(&self) -> &Path {
        match self {
            PlannedChange::Write { path, .. } | PlannedChange::Remove { path } => path,
        }
    }
}

/// Fully rendered set of changes to the hierarchy.
///
/// Nothing touches the disk until [`apply`](Self::apply) is called, so every
/// error that can be detected while rendering surfaces before the first write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritePlan {
    changes: Vec<PlannedChange>,
}

impl WritePlan {
    pub(crate) fn new(changes: Vec<PlannedChange>) -> Self {
        Self { changes }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &[PlannedChange] {
        &self.changes
    }

    /// Persist the plan. Writes go first so a definition that moves between
    /// files is never absent from both.
    pub fn apply(&self) -> Result<(), StoreError> {
        for change in &self.changes {
            if let PlannedChange::Write { path, contents } = change {
                write_atomic(path, contents)?;
                info!("wrote {}", path.display());
            }
        }
        for change in &self.changes {
            if let PlannedChange::Remove { path } = change {
                remove_durable(path)?;
                info!("removed {}", path.display());
            }
        }
        Ok(())
    }
}

/// Write `contents` to `path` via a temp file in the same directory.
///
/// The temp file is created with mode 0600 and keeps it across the rename.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::InvalidFilename(path.display().to_string()))?;
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

fn remove_durable(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }
    if let Some(dir) = path.parent() {
        fsync_dir(dir)?;
    }
    Ok(())
}
