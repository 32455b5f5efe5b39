use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    host::AssetIndex,
    override_editor::io::{IoError, read_json_file_blocking, write_json_file_blocking},
    override_types::OverrideDocument,
};

/// The on-disk system of record for an [`OverrideDocument`].
#[derive(Debug, Clone)]
pub struct DocumentStore {
    path: PathBuf,
}

impl DocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `document` and refreshes the host asset index.
    pub fn save(
        &self,
        document: &OverrideDocument,
        index: &mut (impl AssetIndex + ?Sized),
    ) -> Result<(), IoError> {
        write_json_file_blocking(&self.path, document)?;
        index.refresh(&self.path);
        debug!(
            store = %self.path.display(),
            renderers = document.renderers.len(),
            "saved override document"
        );
        Ok(())
    }

    /// Best-effort load. Anything that is not a readable document comes back
    /// as an empty one; the document can be rebuilt by re-adding renderers.
    pub fn load(&self) -> OverrideDocument {
        match self.load_snapshot() {
            Ok(Some(document)) => document,
            Ok(None) => OverrideDocument::default(),
            Err(err) => {
                warn!(store = %self.path.display(), error = %err, "discarding unreadable override document");
                OverrideDocument::default()
            }
        }
    }

    /// Returns `Ok(None)` when nothing has been persisted yet. Empty files and
    /// a literal `null` count as nothing persisted.
    pub fn load_snapshot(&self) -> Result<Option<OverrideDocument>, IoError> {
        match read_json_file_blocking::<Option<OverrideDocument>>(&self.path) {
            Ok(document) => Ok(document),
            Err(err) if err.is_missing() => Ok(None),
            Err(err) if err.is_blank() => {
                info!(store = %self.path.display(), "override document is empty");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
