use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;

const SLOT_FILE: &str = "config.json";

/// Trait for the single persisted slot.
///
/// A slot either holds one blob or nothing. Writes replace the previous
/// blob wholesale; there is no partial update and no versioning.
pub trait SlotStore: Send + Sync {
    /// Read the stored blob, or `None` if nothing was ever written.
    fn read(&self) -> Result<Option<String>, StoreError>;

    /// Overwrite the slot with `blob`.
    fn write(&self, blob: &str) -> Result<(), StoreError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &str;
}

/// File backend. The slot is one file; it survives process restarts.
///
/// Writes land in a sibling `.tmp` file first and are renamed into place,
/// so a reader never observes a half-written blob.
pub struct FileSlotStore {
    path: PathBuf,
}

impl FileSlotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default slot location: ~/.klk/config.json
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".klk")
            .join(SLOT_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| SLOT_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SlotStore for FileSlotStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn write(&self, blob: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.tmp_path();
        std::fs::write(&tmp, blob)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), bytes = blob.len(), "Slot written");
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "file"
    }
}

/// In-memory slot for tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySlotStore {
    slot: Mutex<Option<String>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot that already holds `blob`.
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(blob.into())),
        }
    }
}

impl SlotStore for MemorySlotStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        let slot = self
            .slot
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(slot.clone())
    }

    fn write(&self, blob: &str) -> Result<(), StoreError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        *slot = Some(blob.to_string());
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
