use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    host::{AssetIndex, MirrorGraph, PropertyBlock, SceneHost},
    override_editor::{
        io::{IoError, read_json_file_blocking, write_json_file_blocking},
        mirror::RuntimeMirror,
    },
    override_types::{
        MaterialHandle, ObjectHandle, RendererHandle, ShaderProperty, TextureHandle,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRenderer {
    pub name: String,
    #[serde(default)]
    pub materials: Vec<Option<MaterialHandle>>,
    #[serde(default)]
    pub blocks: Vec<PropertyBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneShader {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<ShaderProperty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneMaterial {
    pub name: String,
    #[serde(default)]
    pub shader: Option<SceneShader>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(default)]
    pub parent: Option<ObjectHandle>,
}

/// Serializable in-memory host. Backs the command-line tool (one JSON scene
/// file per invocation) and the test suites.
///
/// All handle kinds share one id space and id `0` is never handed out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryScene {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    renderers: BTreeMap<u64, SceneRenderer>,
    #[serde(default)]
    materials: BTreeMap<u64, SceneMaterial>,
    #[serde(default)]
    textures: BTreeMap<u64, String>,
    #[serde(default)]
    objects: BTreeMap<u64, SceneObject>,
    #[serde(default)]
    mirrors: BTreeMap<u64, RuntimeMirror>,
    #[serde(skip)]
    refreshed: Vec<PathBuf>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_blocking(path: impl AsRef<Path>) -> Result<Self, IoError> {
        read_json_file_blocking(path)
    }

    pub fn save_blocking(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write_json_file_blocking(path, self)
    }

    fn in_use(&self, id: u64) -> bool {
        self.renderers.contains_key(&id)
            || self.materials.contains_key(&id)
            || self.textures.contains_key(&id)
            || self.objects.contains_key(&id)
    }

    fn allocate(&mut self) -> u64 {
        loop {
            self.next_id += 1;
            if !self.in_use(self.next_id) {
                return self.next_id;
            }
        }
    }

    pub fn add_material(
        &mut self,
        name: &str,
        shader: Option<(&str, Vec<ShaderProperty>)>,
    ) -> MaterialHandle {
        let id = self.allocate();
        self.materials.insert(
            id,
            SceneMaterial {
                name: name.to_string(),
                shader: shader.map(|(shader_name, properties)| SceneShader {
                    name: shader_name.to_string(),
                    properties,
                }),
            },
        );
        MaterialHandle(id)
    }

    pub fn add_renderer(
        &mut self,
        name: &str,
        materials: Vec<Option<MaterialHandle>>,
    ) -> RendererHandle {
        let id = self.allocate();
        let blocks = vec![PropertyBlock::default(); materials.len()];
        self.renderers.insert(
            id,
            SceneRenderer {
                name: name.to_string(),
                materials,
                blocks,
            },
        );
        RendererHandle(id)
    }

    pub fn add_texture(&mut self, name: &str) -> TextureHandle {
        let id = self.allocate();
        self.textures.insert(id, name.to_string());
        TextureHandle(id)
    }

    /// Deletes a renderer out-of-band, leaving any references to it dangling.
    pub fn remove_renderer(&mut self, renderer: RendererHandle) -> bool {
        self.renderers.remove(&renderer.0).is_some()
    }

    pub fn remove_material(&mut self, material: MaterialHandle) -> bool {
        self.materials.remove(&material.0).is_some()
    }

    /// Clears every live property block, as leaving a simulation does.
    pub fn reset_property_blocks(&mut self) {
        for renderer in self.renderers.values_mut() {
            renderer
                .blocks
                .iter_mut()
                .for_each(|block| *block = PropertyBlock::default());
        }
    }

    pub fn renderer_handles(&self) -> Vec<RendererHandle> {
        self.renderers.keys().copied().map(RendererHandle).collect()
    }

    pub fn texture_name(&self, texture: TextureHandle) -> Option<&str> {
        self.textures.get(&texture.0).map(String::as_str)
    }

    pub fn mirror_roots(&self) -> Vec<ObjectHandle> {
        self.mirrors
            .keys()
            .copied()
            .filter(|id| self.objects.contains_key(id))
            .map(ObjectHandle)
            .collect()
    }

    pub fn object_name(&self, object: ObjectHandle) -> Option<&str> {
        self.objects.get(&object.0).map(|obj| obj.name.as_str())
    }

    pub fn refreshed_paths(&self) -> &[PathBuf] {
        &self.refreshed
    }
}

impl SceneHost for MemoryScene {
    fn renderer_exists(&self, renderer: RendererHandle) -> bool {
        self.renderers.contains_key(&renderer.0)
    }

    fn renderer_name(&self, renderer: RendererHandle) -> Option<String> {
        self.renderers.get(&renderer.0).map(|r| r.name.clone())
    }

    fn renderer_materials(&self, renderer: RendererHandle) -> Option<Vec<Option<MaterialHandle>>> {
        let entry = self.renderers.get(&renderer.0)?;
        // Deleted materials read as empty slots.
        Some(
            entry
                .materials
                .iter()
                .map(|slot| slot.filter(|material| self.materials.contains_key(&material.0)))
                .collect(),
        )
    }

    fn material_exists(&self, material: MaterialHandle) -> bool {
        self.materials.contains_key(&material.0)
    }

    fn material_name(&self, material: MaterialHandle) -> Option<String> {
        self.materials.get(&material.0).map(|m| m.name.clone())
    }

    fn shader_name(&self, material: MaterialHandle) -> Option<String> {
        self.materials
            .get(&material.0)
            .and_then(|m| m.shader.as_ref())
            .map(|shader| shader.name.clone())
    }

    fn shader_properties(&self, material: MaterialHandle) -> Option<Vec<ShaderProperty>> {
        self.materials
            .get(&material.0)
            .and_then(|m| m.shader.as_ref())
            .map(|shader| shader.properties.clone())
    }

    fn property_block(&self, renderer: RendererHandle, slot: usize) -> Option<PropertyBlock> {
        let entry = self.renderers.get(&renderer.0)?;
        if slot >= entry.materials.len() {
            return None;
        }
        Some(entry.blocks.get(slot).cloned().unwrap_or_default())
    }

    fn set_property_block(&mut self, renderer: RendererHandle, slot: usize, block: PropertyBlock) {
        if let Some(entry) = self.renderers.get_mut(&renderer.0) {
            if slot >= entry.materials.len() {
                return;
            }
            if entry.blocks.len() < entry.materials.len() {
                entry
                    .blocks
                    .resize(entry.materials.len(), PropertyBlock::default());
            }
            entry.blocks[slot] = block;
        }
    }
}

impl MirrorGraph for MemoryScene {
    fn create_object(&mut self, name: &str, parent: Option<ObjectHandle>) -> ObjectHandle {
        let id = self.allocate();
        self.objects.insert(
            id,
            SceneObject {
                name: name.to_string(),
                parent,
            },
        );
        ObjectHandle(id)
    }

    fn destroy_object(&mut self, object: ObjectHandle) {
        for child in self.children(object) {
            self.destroy_object(child);
        }
        self.objects.remove(&object.0);
        self.mirrors.remove(&object.0);
    }

    fn object_exists(&self, object: ObjectHandle) -> bool {
        self.objects.contains_key(&object.0)
    }

    fn children(&self, object: ObjectHandle) -> Vec<ObjectHandle> {
        self.objects
            .iter()
            .filter(|(_, obj)| obj.parent == Some(object))
            .map(|(id, _)| ObjectHandle(*id))
            .collect()
    }

    fn mirror(&self, root: ObjectHandle) -> Option<RuntimeMirror> {
        if !self.objects.contains_key(&root.0) {
            return None;
        }
        self.mirrors.get(&root.0).cloned()
    }

    fn attach_mirror(&mut self, mirror: RuntimeMirror) {
        self.mirrors.insert(mirror.root.0, mirror);
    }
}

impl AssetIndex for MemoryScene {
    fn refresh(&mut self, path: &Path) {
        self.refreshed.push(path.to_path_buf());
    }
}
