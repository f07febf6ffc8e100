#![forbid(unsafe_code)]

//! Template snapshots: persisting learned templates per component type.
//!
//! A snapshot holds every template of one component type, keyed by state
//! key and then by patch address (`path` or `path@attr`):
//!
//! ```json
//! {
//!   "formatVersion": 1,
//!   "componentType": "Counter",
//!   "templates": {
//!     "count": {
//!       "00010000": { "template": "Count: {0}", "bindings": ["count"], "slots": [7] }
//!     }
//!   }
//! }
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Returns error, predictor unaffected |
//! | `StorageError::Serialization` | JSON encode/decode | Returns error |
//! | `StorageError::Corruption` | Bad address key or mismatched component | Returns error |
//! | Format version mismatch | Older or newer writer | Logged, treated as absent |

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use presage_core::patch::patch_from_template_key;
use presage_core::{Patch, TemplatePatch};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during template storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Serialization or deserialization error.
    Serialization(String),
    /// Stored data is structurally invalid.
    Corruption(String),
    /// The component type cannot be used as a storage name.
    InvalidComponent(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
            StorageError::InvalidComponent(name) => {
                write!(f, "invalid component type for storage: {name:?}")
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// All templates of one component type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSnapshot {
    pub format_version: u32,
    pub component_type: String,
    /// State key -> patch address -> template.
    pub templates: BTreeMap<String, BTreeMap<String, TemplatePatch>>,
}

impl TemplateSnapshot {
    pub const FORMAT_VERSION: u32 = 1;

    #[must_use]
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            format_version: Self::FORMAT_VERSION,
            component_type: component_type.into(),
            templates: BTreeMap::new(),
        }
    }

    /// Add the templated patches of `state_key`. Concrete patches are skipped.
    pub fn insert(&mut self, state_key: &str, patches: &[Patch]) {
        let slot = self.templates.entry(state_key.to_string()).or_default();
        for patch in patches {
            if let (Some(key), Some(template_patch)) = (patch.template_key(), patch.template_patch()) {
                slot.insert(key, template_patch.clone());
            }
        }
        if slot.is_empty() {
            self.templates.remove(state_key);
        }
    }

    /// Rebuild the templated patch list of every state key.
    pub fn to_patches(&self) -> StorageResult<BTreeMap<String, Vec<Patch>>> {
        let mut out = BTreeMap::new();
        for (state_key, entries) in &self.templates {
            let mut patches = Vec::with_capacity(entries.len());
            for (address, template_patch) in entries {
                template_patch.validate().map_err(|e| {
                    StorageError::Corruption(format!("template for {state_key} at {address:?}: {e}"))
                })?;
                let patch = patch_from_template_key(address, template_patch.clone()).ok_or_else(
                    || StorageError::Corruption(format!("bad patch address {address:?}")),
                )?;
                patches.push(patch);
            }
            out.insert(state_key.clone(), patches);
        }
        Ok(out)
    }

    /// Number of state keys with templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Pluggable storage for template snapshots.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait TemplateStorage: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Load the snapshot of `component_type`, or `None` if nothing is stored.
    fn load(&self, component_type: &str) -> StorageResult<Option<TemplateSnapshot>>;

    /// Store `snapshot`, replacing any previous snapshot of its component.
    fn save(&self, snapshot: &TemplateSnapshot) -> StorageResult<()>;

    /// Delete the snapshot of `component_type`. Returns whether one existed.
    fn remove(&self, component_type: &str) -> StorageResult<bool>;

    /// Component types with a stored snapshot, sorted.
    fn components(&self) -> StorageResult<Vec<String>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Storage
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory storage for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryTemplateStorage {
    data: RwLock<BTreeMap<String, TemplateSnapshot>>,
}

impl MemoryTemplateStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Corruption("lock poisoned".into())
}

impl TemplateStorage for MemoryTemplateStorage {
    fn name(&self) -> &str {
        "MemoryTemplateStorage"
    }

    fn load(&self, component_type: &str) -> StorageResult<Option<TemplateSnapshot>> {
        let guard = self.data.read().map_err(poisoned)?;
        Ok(guard.get(component_type).cloned())
    }

    fn save(&self, snapshot: &TemplateSnapshot) -> StorageResult<()> {
        let mut guard = self.data.write().map_err(poisoned)?;
        guard.insert(snapshot.component_type.clone(), snapshot.clone());
        Ok(())
    }

    fn remove(&self, component_type: &str) -> StorageResult<bool> {
        let mut guard = self.data.write().map_err(poisoned)?;
        Ok(guard.remove(component_type).is_some())
    }

    fn components(&self) -> StorageResult<Vec<String>> {
        let guard = self.data.read().map_err(poisoned)?;
        Ok(guard.keys().cloned().collect())
    }
}

impl fmt::Debug for MemoryTemplateStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.data.read().map(|g| g.len()).unwrap_or(0);
        f.debug_struct("MemoryTemplateStorage")
            .field("components", &count)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Extension of snapshot files.
pub const TEMPLATE_EXTENSION: &str = "template";

/// One `{component}.template` JSON file per component type in a directory.
///
/// Writes go to `{component}.template.tmp`, are synced, then renamed over the
/// previous file.
pub struct FileTemplateStorage {
    dir: PathBuf,
}

impl FileTemplateStorage {
    /// Storage rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the snapshot of `component_type`.
    pub fn path_for(&self, component_type: &str) -> StorageResult<PathBuf> {
        let valid = !component_type.is_empty()
            && component_type != "."
            && component_type != ".."
            && !component_type.contains(['/', '\\', '\0']);
        if !valid {
            return Err(StorageError::InvalidComponent(component_type.to_string()));
        }
        Ok(self
            .dir
            .join(format!("{component_type}.{TEMPLATE_EXTENSION}")))
    }
}

impl TemplateStorage for FileTemplateStorage {
    fn name(&self) -> &str {
        "FileTemplateStorage"
    }

    fn load(&self, component_type: &str) -> StorageResult<Option<TemplateSnapshot>> {
        let path = self.path_for(component_type)?;
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&path)?);
        let snapshot: TemplateSnapshot = serde_json::from_reader(reader).map_err(|e| {
            StorageError::Serialization(format!("failed to parse {}: {e}", path.display()))
        })?;

        if snapshot.format_version != TemplateSnapshot::FORMAT_VERSION {
            tracing::warn!(
                path = %path.display(),
                stored = snapshot.format_version,
                expected = TemplateSnapshot::FORMAT_VERSION,
                "template format version mismatch, ignoring stored templates"
            );
            return Ok(None);
        }
        if snapshot.component_type != component_type {
            return Err(StorageError::Corruption(format!(
                "{} holds templates for {:?}",
                path.display(),
                snapshot.component_type
            )));
        }
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &TemplateSnapshot) -> StorageResult<()> {
        let path = self.path_for(&snapshot.component_type)?;
        fs::create_dir_all(&self.dir)?;

        let mut tmp_path = path.clone();
        tmp_path.set_extension(format!("{TEMPLATE_EXTENSION}.tmp"));
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, snapshot).map_err(|e| {
                StorageError::Serialization(format!("failed to serialize templates: {e}"))
            })?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        tracing::debug!(
            path = %path.display(),
            state_keys = snapshot.len(),
            "saved template snapshot"
        );
        Ok(())
    }

    fn remove(&self, component_type: &str) -> StorageResult<bool> {
        let path = self.path_for(component_type)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    fn components(&self) -> StorageResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl fmt::Debug for FileTemplateStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTemplateStorage")
            .field("dir", &self.dir)
            .finish()
    }
}
