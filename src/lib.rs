pub mod config;
pub mod host;
pub mod override_editor;
pub mod override_types;
pub mod utils;

pub use config::SessionConfig;
pub use host::{AssetIndex, MemoryScene, MirrorGraph, SceneHost, UserDialogs};
pub use override_editor::{
    DocumentStore, EnvironmentMode, ImportMode, OverrideEditor, RuntimeMirror, SyncEngine,
    SyncState,
};
pub use override_types::OverrideDocument;
pub use utils::OverrideError;
