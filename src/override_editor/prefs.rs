use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    override_editor::io::{IoError, read_json_file_blocking, write_json_file_blocking},
    override_types::ObjectHandle,
};

pub const DEFAULT_MIRROR_POINTER_KEY: &str = "override_sync.mirror_root";

/// Process-wide scalar key/value preferences that outlive any editor session.
///
/// Backed by a JSON file when constructed with [`Preferences::open`]; every
/// mutation is written through. Last writer wins.
#[derive(Debug, Clone, Default)]
pub struct Preferences {
    path: Option<PathBuf>,
    values: BTreeMap<String, i64>,
}

impl Preferences {
    /// Preferences that live only as long as this value.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the preference file at `path`. A missing or unreadable file starts
    /// empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match read_json_file_blocking(&path) {
            Ok(values) => values,
            Err(err) if err.is_missing() => BTreeMap::new(),
            Err(err) => {
                warn!(prefs = %path.display(), error = %err, "ignoring unreadable preferences");
                BTreeMap::new()
            }
        };
        Self {
            path: Some(path),
            values,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values.get(key).copied().unwrap_or(default)
    }

    pub fn set_int(&mut self, key: &str, value: i64) -> Result<(), IoError> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }

    pub fn delete_key(&mut self, key: &str) -> Result<(), IoError> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), IoError> {
        match &self.path {
            Some(path) => write_json_file_blocking(path, &self.values),
            None => Ok(()),
        }
    }
}

/// The persisted reference to the last runtime mirror the editor worked with.
/// Drives automatic replay after a simulation ends.
#[derive(Debug, Clone)]
pub struct MirrorPointer {
    key: String,
}

impl MirrorPointer {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the pointer. Absent keys, zero and negative values mean none.
    pub fn load(&self, prefs: &Preferences) -> Option<ObjectHandle> {
        if !prefs.has_key(&self.key) {
            return None;
        }
        match prefs.get_int(&self.key, 0) {
            raw if raw > 0 => Some(ObjectHandle(raw as u64)),
            _ => None,
        }
    }

    /// Stores `mirror`, or deletes the key when there is no mirror.
    pub fn store(&self, prefs: &mut Preferences, mirror: Option<ObjectHandle>) -> Result<(), IoError> {
        match mirror.and_then(|handle| i64::try_from(handle.raw()).ok()) {
            Some(raw) if raw > 0 => {
                debug!(key = %self.key, mirror = raw, "persisting mirror pointer");
                prefs.set_int(&self.key, raw)
            }
            _ => {
                debug!(key = %self.key, "clearing mirror pointer");
                prefs.delete_key(&self.key)
            }
        }
    }
}

impl Default for MirrorPointer {
    fn default() -> Self {
        Self::new(DEFAULT_MIRROR_POINTER_KEY)
    }
}
