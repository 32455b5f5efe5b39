//! Runtime mirror bridge.
//!
//! A runtime mirror is a projection of the [`OverrideDocument`] into the host's
//! object graph that a constrained runtime can replay on its own. Runtimes of
//! that kind have no tagged values, so each material's overrides are flattened
//! into parallel arrays indexed by property position:
//!
//! ```text
//! names[i]   kinds[i]   scalar_values[i]   color_values[i]   vector_values[i]   texture_values[i]
//! ```
//!
//! Every array carries one slot per property; slots of the wrong type hold that
//! type's default. Import rebuilds properties by index, so property order must
//! be preserved on export. The document stays the source of truth.

use std::fmt;

use glam::Vec4;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    host::{MirrorGraph, PropertyBlock, SceneHost},
    override_types::{
        Color, MaterialHandle, ObjectHandle, OverrideDocument, PropertyKind, PropertyOverride,
        PropertyValue, RendererHandle, TextureHandle,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorMaterial {
    pub object: ObjectHandle,
    pub name: String,
    #[serde(default)]
    pub target_material: Option<MaterialHandle>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub kinds: Vec<i32>,
    #[serde(default)]
    pub scalar_values: Vec<f32>,
    #[serde(default)]
    pub color_values: Vec<Color>,
    #[serde(default)]
    pub vector_values: Vec<Vec4>,
    #[serde(default)]
    pub texture_values: Vec<Option<TextureHandle>>,
}

impl MirrorMaterial {
    fn encode(
        object: ObjectHandle,
        name: String,
        material: MaterialHandle,
        properties: &[PropertyOverride],
    ) -> Self {
        let mut encoded = Self {
            object,
            name,
            target_material: Some(material),
            names: Vec::with_capacity(properties.len()),
            kinds: Vec::with_capacity(properties.len()),
            scalar_values: Vec::with_capacity(properties.len()),
            color_values: Vec::with_capacity(properties.len()),
            vector_values: Vec::with_capacity(properties.len()),
            texture_values: Vec::with_capacity(properties.len()),
        };

        for prop in properties {
            encoded.names.push(prop.name.clone());
            encoded.kinds.push(prop.kind.mirror_code());
            let (mut scalar, mut color, mut vector, mut texture) = (0.0, Color::WHITE, Vec4::ZERO, None);
            match prop.value {
                PropertyValue::Scalar(value) => scalar = value,
                PropertyValue::Color(value) => color = value,
                PropertyValue::Vector4(value) => vector = value,
                PropertyValue::Texture(value) => texture = value,
            }
            encoded.scalar_values.push(scalar);
            encoded.color_values.push(color);
            encoded.vector_values.push(vector);
            encoded.texture_values.push(texture);
        }
        encoded
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Rebuilds the property at `index`. Unknown kind codes yield `None`; a
    /// typed array that is too short leaves the kind's default value.
    pub fn property(&self, index: usize) -> Option<PropertyOverride> {
        let name = self.names.get(index)?;
        let kind = PropertyKind::from_mirror_code(*self.kinds.get(index)?)?;
        let value = match kind {
            PropertyKind::Scalar => self.scalar_values.get(index).copied().map(PropertyValue::Scalar),
            PropertyKind::Color => self.color_values.get(index).copied().map(PropertyValue::Color),
            PropertyKind::Vector4 => self
                .vector_values
                .get(index)
                .copied()
                .map(PropertyValue::Vector4),
            PropertyKind::Texture => self
                .texture_values
                .get(index)
                .copied()
                .map(PropertyValue::Texture),
        }
        .unwrap_or_else(|| kind.default_value());
        Some(PropertyOverride {
            name: name.clone(),
            kind,
            value,
        })
    }

    /// Rebuilds every property in order, returning how many were skipped.
    pub fn decode(&self) -> (Vec<PropertyOverride>, usize) {
        let mut skipped = 0;
        let properties = (0..self.len())
            .filter_map(|index| {
                let prop = self.property(index);
                if prop.is_none() {
                    warn!(mirror = %self.object, index, "skipping mirror property with unknown kind");
                    skipped += 1;
                }
                prop
            })
            .collect();
        (properties, skipped)
    }

    /// Writes the flattened overrides straight into `block`.
    pub fn write_into(&self, block: &mut PropertyBlock) -> usize {
        let mut written = 0;
        for (index, name) in self.names.iter().enumerate() {
            let Some(kind) = self
                .kinds
                .get(index)
                .and_then(|code| PropertyKind::from_mirror_code(*code))
            else {
                continue;
            };
            let wrote = match kind {
                PropertyKind::Scalar => self
                    .scalar_values
                    .get(index)
                    .map(|value| block.set_float(name, *value)),
                PropertyKind::Color => self
                    .color_values
                    .get(index)
                    .map(|value| block.set_color(name, *value)),
                PropertyKind::Vector4 => self
                    .vector_values
                    .get(index)
                    .map(|value| block.set_vector(name, *value)),
                PropertyKind::Texture => self
                    .texture_values
                    .get(index)
                    .map(|value| block.set_texture(name, *value)),
            };
            if wrote.is_some() {
                written += 1;
            }
        }
        written
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorNode {
    pub object: ObjectHandle,
    pub name: String,
    #[serde(default)]
    pub target_renderer: Option<RendererHandle>,
    #[serde(default)]
    pub materials: Vec<MirrorMaterial>,
}

impl MirrorNode {
    /// Replays this node onto its renderer's live property blocks. Returns
    /// false when the renderer is gone.
    pub fn apply<H>(&self, host: &mut H) -> bool
    where
        H: SceneHost + ?Sized,
    {
        let Some(renderer) = self.target_renderer else {
            return false;
        };
        let Some(slots) = host.renderer_materials(renderer) else {
            return false;
        };

        for (slot, material) in slots.into_iter().enumerate() {
            let Some(material) = material else {
                continue;
            };
            let Some(mirrored) = self
                .materials
                .iter()
                .find(|entry| entry.target_material == Some(material))
            else {
                continue;
            };
            let Some(mut block) = host.property_block(renderer, slot) else {
                continue;
            };
            mirrored.write_into(&mut block);
            host.set_property_block(renderer, slot, block);
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMirror {
    pub root: ObjectHandle,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<MirrorNode>,
}

impl RuntimeMirror {
    /// Replays every node. Returns the number of nodes whose renderer was live.
    pub fn apply_all<H>(&self, host: &mut H) -> usize
    where
        H: SceneHost + ?Sized,
    {
        self.nodes.iter().filter(|node| node.apply(host)).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    ClearExisting,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportReport {
    pub root: ObjectHandle,
    pub created: bool,
    pub nodes: usize,
    pub materials: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub meshes: usize,
    pub materials: usize,
    /// Properties dropped because of an unknown kind code.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MirrorError {
    NoMirrorSelected,
    MissingMirror(ObjectHandle),
    EmptyMirror { name: String },
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorError::NoMirrorSelected => {
                write!(f, "Please select a runtime mirror to import from.")
            }
            MirrorError::MissingMirror(object) => {
                write!(f, "The selected runtime mirror ({object}) no longer exists.")
            }
            MirrorError::EmptyMirror { name } => {
                write!(f, "The runtime mirror '{name}' has no meshes to import.")
            }
        }
    }
}

impl std::error::Error for MirrorError {}

/// Rebuilds a runtime mirror from `document`.
///
/// When `existing` names a live mirror root it is reused and all of its
/// children are destroyed first; anything else, including a plain scene
/// object, leads to a new root named `root_name`. Node and material objects are recreated on every export.
pub fn export_to_mirror<H>(
    document: &OverrideDocument,
    host: &mut H,
    existing: Option<ObjectHandle>,
    root_name: &str,
) -> ExportReport
where
    H: SceneHost + MirrorGraph + ?Sized,
{
    let reused = existing.filter(|root| host.mirror(*root).is_some());
    let (root, name, created) = match reused {
        Some(root) => {
            for child in host.children(root) {
                host.destroy_object(child);
            }
            let name = host
                .mirror(root)
                .map(|mirror| mirror.name)
                .unwrap_or_else(|| root_name.to_string());
            info!(mirror = %root, "reusing runtime mirror");
            (root, name, false)
        }
        None => {
            let root = host.create_object(root_name, None);
            info!(mirror = %root, "created runtime mirror");
            (root, root_name.to_string(), true)
        }
    };

    let mut mirror = RuntimeMirror {
        root,
        name,
        nodes: Vec::new(),
    };
    let mut material_count = 0;

    for renderer in &document.renderers {
        let Some(handle) = renderer.target_renderer else {
            continue;
        };
        if !host.renderer_exists(handle) || !renderer.has_overrides() {
            continue;
        }

        let node_name = format!(
            "Mesh_{}",
            host.renderer_name(handle).unwrap_or_else(|| handle.to_string())
        );
        let node_object = host.create_object(&node_name, Some(root));
        let mut node = MirrorNode {
            object: node_object,
            name: node_name,
            target_renderer: Some(handle),
            materials: Vec::new(),
        };

        for set in &renderer.materials {
            let Some(material) = set.target_material else {
                continue;
            };
            if set.properties.is_empty() || !host.material_exists(material) {
                continue;
            }
            let material_name = format!(
                "Mat_{}",
                host.material_name(material)
                    .unwrap_or_else(|| material.to_string())
            );
            let material_object = host.create_object(&material_name, Some(node_object));
            node.materials.push(MirrorMaterial::encode(
                material_object,
                material_name,
                material,
                &set.properties,
            ));
            material_count += 1;
        }

        debug!(renderer = %handle, materials = node.materials.len(), "exported renderer");
        mirror.nodes.push(node);
    }

    let report = ExportReport {
        root,
        created,
        nodes: mirror.nodes.len(),
        materials: material_count,
    };
    host.attach_mirror(mirror);
    info!(
        mirror = %root,
        created,
        nodes = report.nodes,
        materials = report.materials,
        "exported overrides to runtime mirror"
    );
    report
}

/// Checks the import preconditions and returns the mirror to import from.
pub fn resolve_import_source<H>(
    mirror: Option<ObjectHandle>,
    host: &H,
) -> Result<RuntimeMirror, MirrorError>
where
    H: MirrorGraph + ?Sized,
{
    let root = mirror.ok_or(MirrorError::NoMirrorSelected)?;
    let mirror = host.mirror(root).ok_or(MirrorError::MissingMirror(root))?;
    if mirror.nodes.is_empty() {
        return Err(MirrorError::EmptyMirror { name: mirror.name });
    }
    Ok(mirror)
}

/// Reads a runtime mirror back into `document`.
///
/// Fails without touching the document when no mirror is given, when it does
/// not resolve, or when it has no nodes. Matching material sets have their
/// properties replaced outright. Nodes and materials whose host object has
/// been deleted since export are dropped.
pub fn import_from_mirror<H>(
    mirror: Option<ObjectHandle>,
    host: &H,
    document: &mut OverrideDocument,
    mode: ImportMode,
) -> Result<ImportReport, MirrorError>
where
    H: SceneHost + MirrorGraph + ?Sized,
{
    let mirror = resolve_import_source(mirror, host)?;
    let root = mirror.root;

    if mode == ImportMode::ClearExisting {
        document.renderers.clear();
    }

    let mut report = ImportReport::default();
    for node in &mirror.nodes {
        let Some(renderer) = node.target_renderer.filter(|r| host.renderer_exists(*r)) else {
            debug!(node = %node.object, "skipping mirror node without a live renderer");
            continue;
        };
        let (renderer_set, _) = document.renderer_entry(renderer);

        for mirrored in &node.materials {
            let Some(material) = mirrored.target_material.filter(|m| host.material_exists(*m))
            else {
                debug!(material = %mirrored.object, "skipping mirror material without a live material");
                continue;
            };
            let (properties, skipped) = mirrored.decode();
            let (material_set, _) = renderer_set.material_entry(material);
            material_set.properties = properties;
            report.skipped += skipped;
            report.materials += 1;
        }
        report.meshes += 1;
    }

    info!(
        mirror = %root,
        meshes = report.meshes,
        materials = report.materials,
        "imported overrides from runtime mirror"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{host::MemoryScene, override_types::RendererOverrideSet};

    struct Fixture {
        scene: MemoryScene,
        renderer: RendererHandle,
        body: MaterialHandle,
        trim: MaterialHandle,
    }

    fn fixture() -> Fixture {
        let mut scene = MemoryScene::new();
        let body = scene.add_material("Body", None);
        let trim = scene.add_material("Trim", None);
        let renderer = scene.add_renderer("Car", vec![Some(body), Some(trim)]);
        Fixture {
            scene,
            renderer,
            body,
            trim,
        }
    }

    fn document_for(fx: &mut Fixture) -> OverrideDocument {
        let texture = fx.scene.add_texture("Noise");
        let mut renderer = RendererOverrideSet::new(fx.renderer, [fx.body, fx.trim]);
        renderer.materials[0].properties = vec![
            PropertyOverride::with_value("_Color", PropertyValue::Color(Color::new(1.0, 0.0, 0.0, 1.0))),
            PropertyOverride::with_value("_Glow", PropertyValue::Scalar(0.75)),
            PropertyOverride::with_value("_Offset", PropertyValue::Vector4(Vec4::new(1.0, 2.0, 3.0, 4.0))),
            PropertyOverride::with_value("_Detail", PropertyValue::Texture(Some(texture))),
        ];
        OverrideDocument {
            renderers: vec![renderer],
        }
    }

    #[test]
    fn export_fills_every_array_in_property_order() {
        let mut fx = fixture();
        let document = document_for(&mut fx);
        let report = export_to_mirror(&document, &mut fx.scene, None, "Override Mirror");
        assert!(report.created);
        assert_eq!(report.nodes, 1);
        // Trim has no properties and is left out.
        assert_eq!(report.materials, 1);

        let mirror = fx.scene.mirror(report.root).expect("mirror registered");
        assert_eq!(mirror.nodes[0].name, "Mesh_Car");
        let mirrored = &mirror.nodes[0].materials[0];
        assert_eq!(mirrored.name, "Mat_Body");
        assert_eq!(mirrored.names, vec!["_Color", "_Glow", "_Offset", "_Detail"]);
        assert_eq!(mirrored.kinds, vec![0, 2, 1, 4]);
        assert_eq!(mirrored.scalar_values, vec![0.0, 0.75, 0.0, 0.0]);
        assert_eq!(mirrored.color_values[1], Color::WHITE);
        assert_eq!(mirrored.vector_values[2], Vec4::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(mirrored.texture_values.len(), 4);
    }

    #[test]
    fn re_export_rebuilds_children() {
        let mut fx = fixture();
        let document = document_for(&mut fx);
        let first = export_to_mirror(&document, &mut fx.scene, None, "Override Mirror");
        let old_node = fx.scene.mirror(first.root).unwrap().nodes[0].object;

        let second = export_to_mirror(&document, &mut fx.scene, Some(first.root), "Ignored");
        assert!(!second.created);
        assert_eq!(second.root, first.root);
        assert!(!fx.scene.object_exists(old_node));
        assert_eq!(fx.scene.children(first.root).len(), 1);

        let mirror = fx.scene.mirror(first.root).unwrap();
        assert_eq!(mirror.name, "Override Mirror");
        assert_ne!(mirror.nodes[0].object, old_node);
    }

    #[test]
    fn export_never_reuses_a_plain_object() {
        let mut fx = fixture();
        let document = document_for(&mut fx);
        let level = fx.scene.create_object("Level", None);
        let lamp = fx.scene.create_object("Lamp", Some(level));

        let report = export_to_mirror(&document, &mut fx.scene, Some(level), "Override Mirror");
        assert!(report.created);
        assert_ne!(report.root, level);
        assert!(fx.scene.object_exists(lamp));
        assert_eq!(fx.scene.children(level), vec![lamp]);
        assert!(fx.scene.mirror(level).is_none());
    }

    #[test]
    fn export_skips_renderers_without_properties() {
        let mut fx = fixture();
        let document = OverrideDocument {
            renderers: vec![RendererOverrideSet::new(fx.renderer, [fx.body])],
        };
        let report = export_to_mirror(&document, &mut fx.scene, None, "Override Mirror");
        assert_eq!(report.nodes, 0);
        assert!(fx.scene.children(report.root).is_empty());
    }

    #[test]
    fn import_reconstructs_exported_document() {
        let mut fx = fixture();
        let document = document_for(&mut fx);
        let report = export_to_mirror(&document, &mut fx.scene, None, "Override Mirror");

        let mut imported = OverrideDocument::default();
        let counts =
            import_from_mirror(Some(report.root), &fx.scene, &mut imported, ImportMode::ClearExisting)
                .expect("import succeeds");
        assert_eq!(counts.meshes, 1);
        assert_eq!(counts.materials, 1);
        assert_eq!(
            imported.renderers[0].materials[0].properties,
            document.renderers[0].materials[0].properties
        );
    }

    #[test]
    fn import_drops_deleted_renderers_and_materials() {
        let mut fx = fixture();
        let mut document = document_for(&mut fx);
        document.renderers[0].materials[1]
            .add_property("_Cutoff", PropertyKind::Scalar)
            .unwrap();
        let bus = fx.scene.add_renderer("Bus", vec![Some(fx.body)]);
        let mut bus_set = RendererOverrideSet::new(bus, [fx.body]);
        bus_set.materials[0]
            .add_property("_Glow", PropertyKind::Scalar)
            .unwrap();
        document.renderers.push(bus_set);

        let report = export_to_mirror(&document, &mut fx.scene, None, "Override Mirror");
        assert_eq!((report.nodes, report.materials), (2, 3));

        fx.scene.remove_renderer(bus);
        fx.scene.remove_material(fx.trim);

        let mut imported = OverrideDocument::default();
        let counts =
            import_from_mirror(Some(report.root), &fx.scene, &mut imported, ImportMode::ClearExisting)
                .expect("import succeeds");
        assert_eq!((counts.meshes, counts.materials), (1, 1));
        assert_eq!(imported.renderers.len(), 1);
        assert_eq!(imported.renderers[0].target_renderer, Some(fx.renderer));
        let materials: Vec<_> = imported.renderers[0]
            .materials
            .iter()
            .map(|set| set.target_material)
            .collect();
        assert_eq!(materials, vec![Some(fx.body)]);
    }

    #[test]
    fn import_preconditions_leave_document_alone() {
        let mut fx = fixture();
        let mut document = document_for(&mut fx);
        let before = document.clone();

        assert_eq!(
            import_from_mirror(None, &fx.scene, &mut document, ImportMode::ClearExisting),
            Err(MirrorError::NoMirrorSelected)
        );

        let empty = export_to_mirror(&OverrideDocument::default(), &mut fx.scene, None, "Empty");
        assert!(matches!(
            import_from_mirror(Some(empty.root), &fx.scene, &mut document, ImportMode::ClearExisting),
            Err(MirrorError::EmptyMirror { .. })
        ));

        fx.scene.destroy_object(empty.root);
        assert_eq!(
            import_from_mirror(Some(empty.root), &fx.scene, &mut document, ImportMode::Merge),
            Err(MirrorError::MissingMirror(empty.root))
        );
        assert_eq!(document, before);
    }

    #[test]
    fn short_typed_arrays_fall_back_to_defaults() {
        let mirrored = MirrorMaterial {
            object: ObjectHandle(1),
            name: "Mat_Body".into(),
            target_material: Some(MaterialHandle(2)),
            names: vec!["_Tint".into(), "_Mystery".into(), "_Glow".into(), "_Orphan".into()],
            kinds: vec![0, 42, 3],
            scalar_values: vec![0.0, 0.0, 0.5],
            color_values: Vec::new(),
            vector_values: Vec::new(),
            texture_values: Vec::new(),
        };

        let (properties, skipped) = mirrored.decode();
        assert_eq!(skipped, 2);
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0].value, PropertyValue::Color(Color::WHITE));
        assert_eq!(properties[1].kind, PropertyKind::Scalar);
        assert_eq!(properties[1].value, PropertyValue::Scalar(0.5));
    }

    #[test]
    fn node_apply_writes_matching_slots() {
        let mut fx = fixture();
        let document = document_for(&mut fx);
        let report = export_to_mirror(&document, &mut fx.scene, None, "Override Mirror");
        let mirror = fx.scene.mirror(report.root).unwrap();

        assert_eq!(mirror.apply_all(&mut fx.scene), 1);
        let block = fx.scene.property_block(fx.renderer, 0).unwrap();
        assert_eq!(block.get_color("_Color"), Some(Color::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(block.get_float("_Glow"), Some(0.75));
        assert!(fx.scene.property_block(fx.renderer, 1).unwrap().is_empty());

        fx.scene.remove_renderer(fx.renderer);
        assert_eq!(mirror.apply_all(&mut fx.scene), 0);
    }
}
