//! Collaborator interfaces the override tooling needs from its host.
//!
//! The host owns the scene graph, the per-slot property blocks, the object
//! graph that carries runtime mirrors, the asset index and the dialogs. The
//! override tooling only reads and writes through these traits so that it can
//! run inside an editor plugin or against [`MemoryScene`] in a standalone tool.

use std::{collections::BTreeMap, path::Path};

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::{
    override_editor::mirror::RuntimeMirror,
    override_types::{
        Color, MaterialHandle, ObjectHandle, PropertyValue, RendererHandle, ShaderProperty,
        TextureHandle,
    },
};

pub mod memory;

pub use memory::MemoryScene;

/// Live per-slot override container. Entries not managed by the override
/// document must survive a get/modify/set cycle untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyBlock {
    #[serde(default)]
    values: BTreeMap<String, PropertyValue>,
}

impl PropertyBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.values
            .insert(name.to_string(), PropertyValue::Scalar(value));
    }

    pub fn set_color(&mut self, name: &str, value: Color) {
        self.values
            .insert(name.to_string(), PropertyValue::Color(value));
    }

    pub fn set_vector(&mut self, name: &str, value: Vec4) {
        self.values
            .insert(name.to_string(), PropertyValue::Vector4(value));
    }

    pub fn set_texture(&mut self, name: &str, value: Option<TextureHandle>) {
        self.values
            .insert(name.to_string(), PropertyValue::Texture(value));
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn get_float(&self, name: &str) -> Option<f32> {
        match self.values.get(name) {
            Some(PropertyValue::Scalar(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_color(&self, name: &str) -> Option<Color> {
        match self.values.get(name) {
            Some(PropertyValue::Color(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_vector(&self, name: &str) -> Option<Vec4> {
        match self.values.get(name) {
            Some(PropertyValue::Vector4(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_texture(&self, name: &str) -> Option<Option<TextureHandle>> {
        match self.values.get(name) {
            Some(PropertyValue::Texture(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Read access to renderer/material bindings and write access to per-slot
/// property blocks.
pub trait SceneHost {
    fn renderer_exists(&self, renderer: RendererHandle) -> bool;

    fn renderer_name(&self, renderer: RendererHandle) -> Option<String>;

    /// Materials bound to each slot of `renderer`, `None` for an empty slot.
    /// Returns `None` when the renderer no longer exists.
    fn renderer_materials(&self, renderer: RendererHandle) -> Option<Vec<Option<MaterialHandle>>>;

    fn material_exists(&self, material: MaterialHandle) -> bool;

    fn material_name(&self, material: MaterialHandle) -> Option<String>;

    fn shader_name(&self, material: MaterialHandle) -> Option<String>;

    /// Properties declared by the material's shader, `None` without a shader.
    fn shader_properties(&self, material: MaterialHandle) -> Option<Vec<ShaderProperty>>;

    fn property_block(&self, renderer: RendererHandle, slot: usize) -> Option<PropertyBlock>;

    fn set_property_block(&mut self, renderer: RendererHandle, slot: usize, block: PropertyBlock);
}

/// The host's object graph, which owns runtime mirrors beyond a tool session.
pub trait MirrorGraph {
    fn create_object(&mut self, name: &str, parent: Option<ObjectHandle>) -> ObjectHandle;

    /// Destroys `object` and all of its descendants.
    fn destroy_object(&mut self, object: ObjectHandle);

    fn object_exists(&self, object: ObjectHandle) -> bool;

    fn children(&self, object: ObjectHandle) -> Vec<ObjectHandle>;

    fn mirror(&self, root: ObjectHandle) -> Option<RuntimeMirror>;

    /// Registers `mirror` under its root object, replacing any previous copy.
    fn attach_mirror(&mut self, mirror: RuntimeMirror);
}

/// Notified after every on-disk write so dependent views observe the file.
pub trait AssetIndex {
    fn refresh(&mut self, path: &Path);
}

/// Blocking dialogs shown to the user.
pub trait UserDialogs {
    fn confirm(&mut self, title: &str, message: &str) -> bool;

    fn alert(&mut self, title: &str, message: &str);
}

/// Dialog implementation that answers every confirmation with a fixed value and
/// routes alerts to the log.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl UserDialogs for FixedAnswer {
    fn confirm(&mut self, title: &str, message: &str) -> bool {
        tracing::debug!(dialog = title, message, answer = self.0, "confirmation");
        self.0
    }

    fn alert(&mut self, title: &str, message: &str) {
        tracing::warn!(dialog = title, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_setters_overwrite_by_name() {
        let mut block = PropertyBlock::new();
        block.set_float("_Glow", 1.0);
        block.set_color("_Glow", Color::WHITE);
        assert_eq!(block.len(), 1);
        assert_eq!(block.get_float("_Glow"), None);
        assert_eq!(block.get_color("_Glow"), Some(Color::WHITE));
    }

    #[test]
    fn texture_getter_distinguishes_unset_from_cleared() {
        let mut block = PropertyBlock::new();
        assert_eq!(block.get_texture("_MainTex"), None);
        block.set_texture("_MainTex", None);
        assert_eq!(block.get_texture("_MainTex"), Some(None));
    }
}
