//! Editor-side authoring of per-renderer material property overrides.
//!
//! [`editor::OverrideEditor`] owns the document for one session and persists
//! structural edits through [`store::DocumentStore`]. Overrides reach live
//! renderers through [`apply`], travel into the simulated environment as a
//! [`mirror::RuntimeMirror`], and are replayed after simulation by
//! [`sync::SyncEngine`].

pub mod apply;
pub mod editor;
pub mod io;
pub mod menu;
pub mod mirror;
pub mod prefs;
pub mod store;
pub mod sync;

pub use editor::OverrideEditor;
pub use mirror::{ImportMode, RuntimeMirror};
pub use store::DocumentStore;
pub use sync::{EnvironmentMode, SyncEngine, SyncState};
