//! Pushes override sets onto live property blocks and pulls persisted state
//! back into the working document.

use tracing::{debug, info, warn};

use crate::{
    host::{PropertyBlock, SceneHost},
    override_editor::store::DocumentStore,
    override_types::{
        OverrideDocument, PropertyKind, PropertyOverride, PropertyValue, RendererOverrideSet,
    },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Slots whose property block was rewritten.
    pub slots: usize,
    pub properties: usize,
    /// Overrides whose value did not match their kind.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyAllReport {
    pub applied: usize,
    /// Entries without a live renderer.
    pub missing: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    Reverted,
    NoPersistedCopy,
    NoMatch,
}

/// Sets one override on `block`. Returns false when the record's value does
/// not match its kind, leaving the block untouched.
pub fn write_override(block: &mut PropertyBlock, prop: &PropertyOverride) -> bool {
    if prop.name.is_empty() {
        return false;
    }
    match (prop.kind, prop.value) {
        (PropertyKind::Scalar, PropertyValue::Scalar(value)) => block.set_float(&prop.name, value),
        (PropertyKind::Color, PropertyValue::Color(value)) => block.set_color(&prop.name, value),
        (PropertyKind::Vector4, PropertyValue::Vector4(value)) => {
            block.set_vector(&prop.name, value)
        }
        (PropertyKind::Texture, PropertyValue::Texture(value)) => {
            block.set_texture(&prop.name, value)
        }
        _ => return false,
    }
    true
}

/// Applies every material set of `renderer` to the matching live slots.
///
/// Each slot is read, patched and written back so entries owned by other
/// systems survive. Returns `None` when the target renderer is gone; the dirty
/// flag is only cleared on success.
pub fn apply<H>(renderer: &mut RendererOverrideSet, host: &mut H) -> Option<ApplyReport>
where
    H: SceneHost + ?Sized,
{
    let handle = renderer.target_renderer?;
    let Some(slots) = host.renderer_materials(handle) else {
        debug!(renderer = %handle, "skipping apply for missing renderer");
        return None;
    };

    let mut report = ApplyReport::default();
    for (slot, material) in slots.into_iter().enumerate() {
        let Some(material) = material else {
            continue;
        };
        let Some(set) = renderer.material(material) else {
            continue;
        };
        if set.properties.is_empty() {
            continue;
        }
        let Some(mut block) = host.property_block(handle, slot) else {
            continue;
        };

        for prop in &set.properties {
            if write_override(&mut block, prop) {
                report.properties += 1;
            } else {
                debug!(renderer = %handle, property = %prop.name, kind = %prop.kind, "skipping inconsistent override");
                report.skipped += 1;
            }
        }
        host.set_property_block(handle, slot, block);
        report.slots += 1;
    }

    renderer.dirty = false;
    info!(
        renderer = %handle,
        slots = report.slots,
        properties = report.properties,
        "applied overrides"
    );
    Some(report)
}

/// Applies every renderer entry in document order.
pub fn apply_all<H>(document: &mut OverrideDocument, host: &mut H) -> ApplyAllReport
where
    H: SceneHost + ?Sized,
{
    let mut report = ApplyAllReport::default();
    for renderer in &mut document.renderers {
        match apply(renderer, host) {
            Some(_) => report.applied += 1,
            None => report.missing += 1,
        }
    }
    info!(
        applied = report.applied,
        missing = report.missing,
        "applied overrides to all renderers"
    );
    report
}

/// Applies the persisted document straight from disk without touching any
/// in-memory working copy. Returns the number of renderers applied.
pub fn apply_persisted<H>(store: &DocumentStore, host: &mut H) -> usize
where
    H: SceneHost + ?Sized,
{
    let mut document = match store.load_snapshot() {
        Ok(Some(document)) => document,
        Ok(None) => return 0,
        Err(err) => {
            warn!(store = %store.path().display(), error = %err, "cannot reapply unreadable override document");
            return 0;
        }
    };

    let report = apply_all(&mut document, host);
    if report.applied > 0 {
        info!(renderers = report.applied, "reapplied persisted overrides");
    }
    report.applied
}

/// Replaces the material sets of `renderer` with the persisted copy.
pub fn revert(renderer: &mut RendererOverrideSet, store: &DocumentStore) -> RevertOutcome {
    let snapshot = match store.load_snapshot() {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            warn!(store = %store.path().display(), "no persisted overrides to revert to");
            return RevertOutcome::NoPersistedCopy;
        }
        Err(err) => {
            warn!(store = %store.path().display(), error = %err, "no readable persisted overrides to revert to");
            return RevertOutcome::NoPersistedCopy;
        }
    };

    let saved = renderer
        .target_renderer
        .and_then(|handle| snapshot.renderers.into_iter().find(|set| set.target_renderer == Some(handle)));

    match saved {
        Some(saved) => {
            renderer.materials = saved.materials;
            renderer.dirty = false;
            info!(renderer = ?renderer.target_renderer, "reverted overrides");
            RevertOutcome::Reverted
        }
        None => {
            warn!(renderer = ?renderer.target_renderer, "renderer has no persisted overrides");
            RevertOutcome::NoMatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::MemoryScene,
        override_types::{Color, MaterialHandle, RendererHandle, TextureHandle},
    };
    use glam::Vec4;
    use tempfile::tempdir;

    fn scene_with_two_slots() -> (MemoryScene, RendererHandle, MaterialHandle, MaterialHandle) {
        let mut scene = MemoryScene::new();
        let body = scene.add_material("Body", None);
        let trim = scene.add_material("Trim", None);
        let renderer = scene.add_renderer("Car", vec![Some(body), None, Some(trim)]);
        (scene, renderer, body, trim)
    }

    #[test]
    fn apply_preserves_unmanaged_entries() {
        let (mut scene, handle, body, _) = scene_with_two_slots();
        let mut foreign = PropertyBlock::new();
        foreign.set_float("_Wetness", 0.5);
        scene.set_property_block(handle, 0, foreign);

        let mut renderer = RendererOverrideSet::new(handle, [body]);
        renderer.materials[0]
            .add_property("_Color", PropertyKind::Color)
            .unwrap()
            .value = PropertyValue::Color(Color::new(0.0, 1.0, 0.0, 1.0));
        renderer.dirty = true;

        let report = apply(&mut renderer, &mut scene).expect("renderer is live");
        assert_eq!(report.slots, 1);
        assert!(!renderer.dirty);

        let block = scene.property_block(handle, 0).unwrap();
        assert_eq!(block.get_float("_Wetness"), Some(0.5));
        assert_eq!(block.get_color("_Color"), Some(Color::new(0.0, 1.0, 0.0, 1.0)));
        assert!(scene.property_block(handle, 2).unwrap().is_empty());
    }

    #[test]
    fn inconsistent_records_are_skipped() {
        let (mut scene, handle, body, _) = scene_with_two_slots();
        let mut renderer = RendererOverrideSet::new(handle, [body]);
        renderer.materials[0].properties = vec![
            PropertyOverride {
                name: "_Broken".into(),
                kind: PropertyKind::Texture,
                value: PropertyValue::Scalar(3.0),
            },
            PropertyOverride::with_value("_Offset", PropertyValue::Vector4(Vec4::new(1.0, 2.0, 3.0, 4.0))),
            PropertyOverride::with_value("_Detail", PropertyValue::Texture(Some(TextureHandle(40)))),
        ];

        let report = apply(&mut renderer, &mut scene).unwrap();
        assert_eq!(report.properties, 2);
        assert_eq!(report.skipped, 1);
        let block = scene.property_block(handle, 0).unwrap();
        assert!(block.get("_Broken").is_none());
        assert_eq!(block.get_vector("_Offset"), Some(Vec4::new(1.0, 2.0, 3.0, 4.0)));
        assert_eq!(block.get_texture("_Detail"), Some(Some(TextureHandle(40))));
    }

    #[test]
    fn missing_renderer_keeps_dirty_flag() {
        let (mut scene, handle, body, _) = scene_with_two_slots();
        let mut renderer = RendererOverrideSet::new(handle, [body]);
        renderer.dirty = true;
        scene.remove_renderer(handle);
        assert!(apply(&mut renderer, &mut scene).is_none());
        assert!(renderer.dirty);
    }

    #[test]
    fn revert_restores_persisted_materials() {
        let dir = tempdir().expect("temp dir");
        let store = DocumentStore::new(dir.path().join("doc.json"));
        let (mut scene, handle, body, trim) = scene_with_two_slots();

        let mut document = OverrideDocument::default();
        document.renderers.push(RendererOverrideSet::new(handle, [body, trim]));
        document.renderers[0].materials[0]
            .add_property("_Glow", PropertyKind::Scalar)
            .unwrap();
        store.save(&document, &mut scene).unwrap();

        let mut working = document.renderers[0].clone();
        working.materials.remove(1);
        working.materials[0].properties.clear();
        working.dirty = true;

        assert_eq!(revert(&mut working, &store), RevertOutcome::Reverted);
        assert_eq!(working, document.renderers[0]);
    }

    #[test]
    fn revert_without_match_leaves_renderer_alone() {
        let dir = tempdir().expect("temp dir");
        let store = DocumentStore::new(dir.path().join("doc.json"));
        let (mut scene, handle, body, _) = scene_with_two_slots();
        store.save(&OverrideDocument::default(), &mut scene).unwrap();

        let mut working = RendererOverrideSet::new(handle, [body]);
        working.dirty = true;
        let before = working.clone();
        assert_eq!(revert(&mut working, &store), RevertOutcome::NoMatch);
        assert_eq!(working, before);
    }
}
