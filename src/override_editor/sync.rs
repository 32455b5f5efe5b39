//! Keeps live object state in line with the persisted overrides across
//! environment mode transitions.
//!
//! Leaving a simulation may reset every live property block, so on the way
//! back to authoring the persisted document is reapplied from disk and the
//! persisted runtime mirror is replayed. Opening a document only replays the
//! mirror, and does so from the idle queue because objects are not safe to
//! mutate while the open is still in flight.
//!
//! Every replay is idempotent and renderers never depend on each other, so
//! duplicate idle tasks are run rather than coalesced.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::{
    host::{MirrorGraph, SceneHost},
    override_editor::{
        apply::apply_persisted,
        prefs::{MirrorPointer, Preferences},
        store::DocumentStore,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Simulating,
    PostSimulationReplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentMode {
    Authoring,
    Simulating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    ReplayPersistedMirror,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Renderers reapplied from the persisted document.
    pub renderers: usize,
    /// Mirror nodes replayed from the persisted runtime mirror.
    pub mirror_nodes: usize,
}

#[derive(Debug)]
pub struct SyncEngine {
    state: SyncState,
    store: DocumentStore,
    pointer: MirrorPointer,
    pending: VecDeque<DeferredTask>,
}

impl SyncEngine {
    pub fn new(store: DocumentStore, pointer: MirrorPointer) -> Self {
        Self {
            state: SyncState::Idle,
            store,
            pointer,
            pending: VecDeque::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn pending_tasks(&self) -> usize {
        self.pending.len()
    }

    /// Feeds an environment mode notification. Returns the replay report when
    /// the transition ran the post-simulation replay.
    pub fn on_mode_changed<H>(
        &mut self,
        mode: EnvironmentMode,
        host: &mut H,
        prefs: &Preferences,
    ) -> Option<ReplayReport>
    where
        H: SceneHost + MirrorGraph + ?Sized,
    {
        match (self.state, mode) {
            (SyncState::Idle, EnvironmentMode::Simulating) => {
                debug!("entering simulation");
                self.state = SyncState::Simulating;
                None
            }
            (SyncState::Simulating, EnvironmentMode::Authoring) => {
                self.state = SyncState::PostSimulationReplay;
                let report = ReplayReport {
                    renderers: apply_persisted(&self.store, host),
                    mirror_nodes: replay_persisted_mirror(&self.pointer, prefs, host),
                };
                self.state = SyncState::Idle;
                info!(
                    renderers = report.renderers,
                    mirror_nodes = report.mirror_nodes,
                    "replayed overrides after simulation"
                );
                Some(report)
            }
            (state, mode) => {
                debug!(?state, ?mode, "ignoring redundant mode notification");
                None
            }
        }
    }

    /// Schedules a mirror replay for the next idle tick.
    pub fn on_document_opened(&mut self) {
        self.pending.push_back(DeferredTask::ReplayPersistedMirror);
    }

    /// Runs the tasks that were queued before this tick. Tasks queued while
    /// running wait for the next tick. Returns the number of tasks run.
    pub fn run_idle<H>(&mut self, host: &mut H, prefs: &Preferences) -> usize
    where
        H: SceneHost + MirrorGraph + ?Sized,
    {
        let due = self.pending.len();
        for _ in 0..due {
            let Some(task) = self.pending.pop_front() else {
                break;
            };
            match task {
                DeferredTask::ReplayPersistedMirror => {
                    replay_persisted_mirror(&self.pointer, prefs, host);
                }
            }
        }
        due
    }
}

/// Replays the runtime mirror named by the persisted pointer through each
/// node's own apply routine. Returns the number of nodes applied.
pub fn replay_persisted_mirror<H>(pointer: &MirrorPointer, prefs: &Preferences, host: &mut H) -> usize
where
    H: SceneHost + MirrorGraph + ?Sized,
{
    let Some(root) = pointer.load(prefs) else {
        debug!(key = pointer.key(), "no persisted mirror to replay");
        return 0;
    };
    let Some(mirror) = host.mirror(root) else {
        debug!(mirror = %root, "persisted mirror no longer exists");
        return 0;
    };

    let applied = mirror.apply_all(host);
    if applied > 0 {
        info!(mirror = %root, name = %mirror.name, nodes = applied, "auto-applied persisted mirror");
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::{MemoryScene, PropertyBlock},
        override_editor::mirror::export_to_mirror,
        override_types::{
            Color, ObjectHandle, OverrideDocument, PropertyKind, PropertyOverride, PropertyValue,
            RendererOverrideSet,
        },
    };
    use tempfile::tempdir;

    fn engine(dir: &std::path::Path) -> SyncEngine {
        SyncEngine::new(DocumentStore::new(dir.join("doc.json")), MirrorPointer::default())
    }

    #[test]
    fn simulate_then_stop_returns_to_idle() {
        let dir = tempdir().expect("temp dir");
        let mut sync = engine(dir.path());
        let mut scene = MemoryScene::new();
        let prefs = Preferences::in_memory();

        assert!(sync.on_mode_changed(EnvironmentMode::Simulating, &mut scene, &prefs).is_none());
        assert_eq!(sync.state(), SyncState::Simulating);
        // Repeated notifications do nothing.
        assert!(sync.on_mode_changed(EnvironmentMode::Simulating, &mut scene, &prefs).is_none());

        let report = sync
            .on_mode_changed(EnvironmentMode::Authoring, &mut scene, &prefs)
            .expect("replay ran");
        assert_eq!(report, ReplayReport::default());
        assert_eq!(sync.state(), SyncState::Idle);
        assert!(sync.on_mode_changed(EnvironmentMode::Authoring, &mut scene, &prefs).is_none());
    }

    #[test]
    fn stopping_reapplies_the_persisted_document() {
        let dir = tempdir().expect("temp dir");
        let mut sync = engine(dir.path());
        let mut scene = MemoryScene::new();
        let material = scene.add_material("Body", None);
        let renderer = scene.add_renderer("Cube", vec![Some(material)]);

        let mut set = RendererOverrideSet::new(renderer, [material]);
        set.materials[0]
            .add_property("_Glow", PropertyKind::Scalar)
            .unwrap()
            .value = PropertyValue::Scalar(4.0);
        let document = OverrideDocument {
            renderers: vec![set],
        };
        DocumentStore::new(dir.path().join("doc.json"))
            .save(&document, &mut scene)
            .unwrap();

        let prefs = Preferences::in_memory();
        sync.on_mode_changed(EnvironmentMode::Simulating, &mut scene, &prefs);
        scene.reset_property_blocks();
        let report = sync
            .on_mode_changed(EnvironmentMode::Authoring, &mut scene, &prefs)
            .unwrap();
        assert_eq!(report.renderers, 1);
        assert_eq!(scene.property_block(renderer, 0).unwrap().get_float("_Glow"), Some(4.0));
    }

    #[test]
    fn document_open_replays_on_next_idle_tick() {
        let dir = tempdir().expect("temp dir");
        let mut sync = engine(dir.path());
        let mut scene = MemoryScene::new();
        let material = scene.add_material("Body", None);
        let renderer = scene.add_renderer("Cube", vec![Some(material)]);

        let mut set = RendererOverrideSet::new(renderer, [material]);
        set.materials[0].properties.push(PropertyOverride::with_value(
            "_Color",
            PropertyValue::Color(Color::new(0.0, 0.0, 1.0, 1.0)),
        ));
        let exported = export_to_mirror(
            &OverrideDocument {
                renderers: vec![set],
            },
            &mut scene,
            None,
            "Override Mirror",
        );
        let mut prefs = Preferences::in_memory();
        MirrorPointer::default()
            .store(&mut prefs, Some(exported.root))
            .unwrap();

        sync.on_document_opened();
        sync.on_document_opened();
        assert_eq!(scene.property_block(renderer, 0).unwrap(), PropertyBlock::default());

        assert_eq!(sync.run_idle(&mut scene, &prefs), 2);
        assert_eq!(sync.pending_tasks(), 0);
        assert_eq!(
            scene.property_block(renderer, 0).unwrap().get_color("_Color"),
            Some(Color::new(0.0, 0.0, 1.0, 1.0))
        );
        assert_eq!(sync.run_idle(&mut scene, &prefs), 0);
    }

    #[test]
    fn dangling_pointer_replays_nothing() {
        let mut scene = MemoryScene::new();
        let mut prefs = Preferences::in_memory();
        let pointer = MirrorPointer::default();
        pointer.store(&mut prefs, Some(ObjectHandle(99))).unwrap();
        assert_eq!(replay_persisted_mirror(&pointer, &prefs, &mut scene), 0);
    }
}
