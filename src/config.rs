use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::override_editor::{
    io::{IoError, read_json_file_blocking, read_yaml_file_blocking},
    menu::DEFAULT_LABEL_LIMIT,
    prefs::{DEFAULT_MIRROR_POINTER_KEY, MirrorPointer, Preferences},
    store::DocumentStore,
};

fn default_document_path() -> PathBuf {
    PathBuf::from("overrides/override_document.json")
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("overrides/preferences.json")
}

fn default_mirror_pointer_key() -> String {
    DEFAULT_MIRROR_POINTER_KEY.to_string()
}

fn default_mirror_root_name() -> String {
    "Override Mirror".to_string()
}

fn default_menu_label_limit() -> usize {
    DEFAULT_LABEL_LIMIT
}

/// Where an editor session keeps its files and how it names things.
///
/// Loaded from `.json`, `.yaml` or `.yml`; every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_document_path")]
    pub document: PathBuf,
    #[serde(default = "default_preferences_path")]
    pub preferences: PathBuf,
    #[serde(default = "default_mirror_pointer_key")]
    pub mirror_pointer_key: String,
    #[serde(default = "default_mirror_root_name")]
    pub mirror_root_name: String,
    #[serde(default = "default_menu_label_limit")]
    pub menu_label_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            document: default_document_path(),
            preferences: default_preferences_path(),
            mirror_pointer_key: default_mirror_pointer_key(),
            mirror_root_name: default_mirror_root_name(),
            menu_label_limit: default_menu_label_limit(),
        }
    }
}

impl SessionConfig {
    pub fn load_blocking(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("json") => read_json_file_blocking(path).map_err(ConfigError::Io),
            Some("yaml") | Some("yml") => read_yaml_file_blocking(path).map_err(ConfigError::Io),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Anchors relative paths at `root`.
    pub fn rooted_at(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        if self.document.is_relative() {
            self.document = root.join(&self.document);
        }
        if self.preferences.is_relative() {
            self.preferences = root.join(&self.preferences);
        }
        self
    }

    pub fn document_store(&self) -> DocumentStore {
        DocumentStore::new(&self.document)
    }

    pub fn mirror_pointer(&self) -> MirrorPointer {
        MirrorPointer::new(&self.mirror_pointer_key)
    }

    pub fn open_preferences(&self) -> Preferences {
        Preferences::open(&self.preferences)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(IoError),
    UnsupportedFormat(PathBuf),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "failed to read session config: {err}"),
            ConfigError::UnsupportedFormat(path) => write!(
                f,
                "unsupported session config format: {} (expected .json, .yaml or .yml)",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::UnsupportedFormat(_) => None,
        }
    }
}
