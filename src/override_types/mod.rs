//! Editor-side types for per-renderer material property overrides.
//!
//! ## Editable structures
//! - **Overrides** (`PropertyOverride`) are named shader inputs with a typed
//!   value, applied on top of a material for one renderer instance only.
//! - **Material sets** (`MaterialOverrideSet`) group the overrides that target a
//!   single material bound to the renderer. Names are unique within a set.
//! - **Renderer sets** (`RendererOverrideSet`) group material sets by renderer
//!   and carry the `dirty` flag tracking divergence from live object state.
//! - **Documents** (`OverrideDocument`) are the top-level aggregate serialized
//!   to disk as the system of record.
//!
//! Handles are opaque host object identifiers. A set whose handle is `None` (or
//! whose handle no longer resolves in the host) is considered stale.

use std::fmt;

use glam::Vec4;
use serde::{Deserialize, Serialize};

macro_rules! object_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

object_handle!(
    /// Identifies a renderer component in the host scene.
    RendererHandle,
    "renderer"
);
object_handle!(
    /// Identifies a shared material asset.
    MaterialHandle,
    "material"
);
object_handle!(
    /// Identifies a texture asset.
    TextureHandle,
    "texture"
);
object_handle!(
    /// Identifies a generic scene object, used for runtime mirror nodes.
    ObjectHandle,
    "object"
);

/// Linear RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

// Kind codes used by the runtime mirror's `kinds` array.
pub const MIRROR_KIND_COLOR: i32 = 0;
pub const MIRROR_KIND_VECTOR: i32 = 1;
pub const MIRROR_KIND_FLOAT: i32 = 2;
pub const MIRROR_KIND_RANGE: i32 = 3;
pub const MIRROR_KIND_TEXTURE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Scalar,
    Color,
    Vector4,
    Texture,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 4] = [
        PropertyKind::Scalar,
        PropertyKind::Color,
        PropertyKind::Vector4,
        PropertyKind::Texture,
    ];

    /// Value a freshly added override of this kind starts with.
    pub fn default_value(self) -> PropertyValue {
        match self {
            PropertyKind::Scalar => PropertyValue::Scalar(0.0),
            PropertyKind::Color => PropertyValue::Color(Color::WHITE),
            PropertyKind::Vector4 => PropertyValue::Vector4(Vec4::ZERO),
            PropertyKind::Texture => PropertyValue::Texture(None),
        }
    }

    pub fn mirror_code(self) -> i32 {
        match self {
            PropertyKind::Color => MIRROR_KIND_COLOR,
            PropertyKind::Vector4 => MIRROR_KIND_VECTOR,
            PropertyKind::Scalar => MIRROR_KIND_FLOAT,
            PropertyKind::Texture => MIRROR_KIND_TEXTURE,
        }
    }

    /// Decodes a mirror kind code. Ranges collapse onto scalars.
    pub fn from_mirror_code(code: i32) -> Option<Self> {
        match code {
            MIRROR_KIND_COLOR => Some(PropertyKind::Color),
            MIRROR_KIND_VECTOR => Some(PropertyKind::Vector4),
            MIRROR_KIND_FLOAT | MIRROR_KIND_RANGE => Some(PropertyKind::Scalar),
            MIRROR_KIND_TEXTURE => Some(PropertyKind::Texture),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKind::Scalar => write!(f, "scalar"),
            PropertyKind::Color => write!(f, "color"),
            PropertyKind::Vector4 => write!(f, "vector4"),
            PropertyKind::Texture => write!(f, "texture"),
        }
    }
}

impl std::str::FromStr for PropertyKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scalar" | "float" | "range" => Ok(PropertyKind::Scalar),
            "color" => Ok(PropertyKind::Color),
            "vector" | "vector4" => Ok(PropertyKind::Vector4),
            "texture" | "texenv" => Ok(PropertyKind::Texture),
            _ => Err(ModelError::UnknownKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Scalar(f32),
    Color(Color),
    Vector4(Vec4),
    Texture(Option<TextureHandle>),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Scalar(_) => PropertyKind::Scalar,
            PropertyValue::Color(_) => PropertyKind::Color,
            PropertyValue::Vector4(_) => PropertyKind::Vector4,
            PropertyValue::Texture(_) => PropertyKind::Texture,
        }
    }
}

/// Property type as declared by a material's shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderPropertyType {
    Color,
    Vector,
    Float,
    Range,
    Texture,
}

impl ShaderPropertyType {
    pub fn override_kind(self) -> PropertyKind {
        match self {
            ShaderPropertyType::Color => PropertyKind::Color,
            ShaderPropertyType::Vector => PropertyKind::Vector4,
            ShaderPropertyType::Float | ShaderPropertyType::Range => PropertyKind::Scalar,
            ShaderPropertyType::Texture => PropertyKind::Texture,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ShaderPropertyType::Color => "Color",
            ShaderPropertyType::Vector => "Vector",
            ShaderPropertyType::Float => "Float",
            ShaderPropertyType::Range => "Range",
            ShaderPropertyType::Texture => "TexEnv",
        }
    }
}

/// A property declared by a shader, as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderProperty {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub ty: ShaderPropertyType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyOverride {
    pub name: String,
    pub kind: PropertyKind,
    pub value: PropertyValue,
}

impl PropertyOverride {
    /// Creates an override holding the default value for `kind`.
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: kind.default_value(),
        }
    }

    pub fn with_value(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            kind: value.kind(),
            value,
        }
    }

    /// False for records whose value does not match their declared kind. Those
    /// can only come from hand-edited or foreign documents.
    pub fn is_consistent(&self) -> bool {
        !self.name.is_empty() && self.value.kind() == self.kind
    }

    pub fn set_value(&mut self, value: PropertyValue) -> Result<(), ModelError> {
        if value.kind() != self.kind {
            return Err(ModelError::KindMismatch {
                name: self.name.clone(),
                expected: self.kind,
                found: value.kind(),
            });
        }
        self.value = value;
        Ok(())
    }
}

fn default_expanded() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialOverrideSet {
    #[serde(default)]
    pub target_material: Option<MaterialHandle>,
    #[serde(default)]
    pub properties: Vec<PropertyOverride>,
    #[serde(default = "default_expanded")]
    pub expanded: bool,
}

impl MaterialOverrideSet {
    pub fn new(material: MaterialHandle) -> Self {
        Self {
            target_material: Some(material),
            properties: Vec::new(),
            expanded: true,
        }
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|prop| prop.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyOverride> {
        self.properties.iter().find(|prop| prop.name == name)
    }

    pub fn add_property(
        &mut self,
        name: &str,
        kind: PropertyKind,
    ) -> Result<&mut PropertyOverride, ModelError> {
        if name.is_empty() {
            return Err(ModelError::EmptyName);
        }
        if self.has_property(name) {
            return Err(ModelError::DuplicateProperty(name.to_string()));
        }
        self.properties.push(PropertyOverride::new(name, kind));
        let last = self.properties.len() - 1;
        Ok(&mut self.properties[last])
    }

    pub fn remove_property(&mut self, index: usize) -> Option<PropertyOverride> {
        if index < self.properties.len() {
            Some(self.properties.remove(index))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererOverrideSet {
    #[serde(default)]
    pub target_renderer: Option<RendererHandle>,
    #[serde(default)]
    pub materials: Vec<MaterialOverrideSet>,
    #[serde(default = "default_expanded")]
    pub expanded: bool,
    #[serde(default)]
    pub dirty: bool,
}

impl RendererOverrideSet {
    /// Seeds one empty material set per distinct material.
    pub fn new(renderer: RendererHandle, materials: impl IntoIterator<Item = MaterialHandle>) -> Self {
        let mut set = Self {
            target_renderer: Some(renderer),
            materials: Vec::new(),
            expanded: true,
            dirty: false,
        };
        for material in materials {
            let _ = set.add_material(material);
        }
        set
    }

    pub fn material(&self, material: MaterialHandle) -> Option<&MaterialOverrideSet> {
        self.materials
            .iter()
            .find(|set| set.target_material == Some(material))
    }

    pub fn material_mut(&mut self, material: MaterialHandle) -> Option<&mut MaterialOverrideSet> {
        self.materials
            .iter_mut()
            .find(|set| set.target_material == Some(material))
    }

    pub fn add_material(&mut self, material: MaterialHandle) -> Result<(), ModelError> {
        if self.material(material).is_some() {
            return Err(ModelError::DuplicateMaterial(material));
        }
        self.materials.push(MaterialOverrideSet::new(material));
        Ok(())
    }

    pub fn remove_material(&mut self, index: usize) -> Option<MaterialOverrideSet> {
        if index < self.materials.len() {
            Some(self.materials.remove(index))
        } else {
            None
        }
    }

    /// Returns the set for `material`, creating an empty one at the end if needed.
    pub fn material_entry(&mut self, material: MaterialHandle) -> (&mut MaterialOverrideSet, bool) {
        let existing = self
            .materials
            .iter()
            .position(|set| set.target_material == Some(material));
        match existing {
            Some(index) => (&mut self.materials[index], false),
            None => {
                self.materials.push(MaterialOverrideSet::new(material));
                let last = self.materials.len() - 1;
                (&mut self.materials[last], true)
            }
        }
    }

    /// True when at least one material set carries a property.
    pub fn has_overrides(&self) -> bool {
        self.materials.iter().any(|set| !set.properties.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OverrideDocument {
    #[serde(default)]
    pub renderers: Vec<RendererOverrideSet>,
}

impl OverrideDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    pub fn position(&self, renderer: RendererHandle) -> Option<usize> {
        self.renderers
            .iter()
            .position(|set| set.target_renderer == Some(renderer))
    }

    pub fn contains(&self, renderer: RendererHandle) -> bool {
        self.position(renderer).is_some()
    }

    pub fn renderer(&self, renderer: RendererHandle) -> Option<&RendererOverrideSet> {
        self.position(renderer).map(|index| &self.renderers[index])
    }

    /// Returns the set for `renderer`, appending an empty one if needed.
    pub fn renderer_entry(&mut self, renderer: RendererHandle) -> (&mut RendererOverrideSet, bool) {
        match self.position(renderer) {
            Some(index) => (&mut self.renderers[index], false),
            None => {
                self.renderers
                    .push(RendererOverrideSet::new(renderer, std::iter::empty()));
                let last = self.renderers.len() - 1;
                (&mut self.renderers[last], true)
            }
        }
    }

    pub fn property_count(&self) -> usize {
        self.renderers
            .iter()
            .flat_map(|renderer| renderer.materials.iter())
            .map(|material| material.properties.len())
            .sum()
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json_string_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Violations of the override model's invariants.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    EmptyName,
    DuplicateProperty(String),
    DuplicateMaterial(MaterialHandle),
    KindMismatch {
        name: String,
        expected: PropertyKind,
        found: PropertyKind,
    },
    UnknownKind(String),
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::EmptyName => write!(f, "property name must not be empty"),
            ModelError::DuplicateProperty(name) => {
                write!(f, "property '{name}' is already overridden")
            }
            ModelError::DuplicateMaterial(material) => {
                write!(f, "{material} already has an override set")
            }
            ModelError::KindMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "property '{name}' holds {expected} values, got a {found} value"
            ),
            ModelError::UnknownKind(kind) => write!(f, "unknown property kind '{kind}'"),
            ModelError::IndexOutOfRange { what, index, len } => {
                write!(f, "{what} index {index} out of range (len {len})")
            }
        }
    }
}

impl std::error::Error for ModelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_kind() {
        for kind in PropertyKind::ALL {
            let prop = PropertyOverride::new("_Prop", kind);
            assert!(prop.is_consistent());
        }
        assert_eq!(
            PropertyKind::Color.default_value(),
            PropertyValue::Color(Color::new(1.0, 1.0, 1.0, 1.0))
        );
        assert_eq!(
            PropertyKind::Texture.default_value(),
            PropertyValue::Texture(None)
        );
    }

    #[test]
    fn add_property_rejects_duplicates_and_empty_names() {
        let mut set = MaterialOverrideSet::new(MaterialHandle(3));
        set.add_property("_Glow", PropertyKind::Scalar).unwrap();
        assert_eq!(
            set.add_property("_Glow", PropertyKind::Color).unwrap_err(),
            ModelError::DuplicateProperty("_Glow".into())
        );
        assert_eq!(
            set.add_property("", PropertyKind::Color).unwrap_err(),
            ModelError::EmptyName
        );
        assert_eq!(set.properties.len(), 1);
    }

    #[test]
    fn set_value_checks_kind() {
        let mut prop = PropertyOverride::new("_Tint", PropertyKind::Color);
        assert!(prop.set_value(PropertyValue::Scalar(2.0)).is_err());
        prop.set_value(PropertyValue::Color(Color::new(0.5, 0.0, 0.0, 1.0)))
            .unwrap();
        assert_eq!(prop.value, PropertyValue::Color(Color::new(0.5, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn renderer_seeding_skips_duplicate_materials() {
        let set = RendererOverrideSet::new(
            RendererHandle(1),
            [MaterialHandle(2), MaterialHandle(3), MaterialHandle(2)],
        );
        assert_eq!(set.materials.len(), 2);
        assert!(!set.has_overrides());
    }

    #[test]
    fn mirror_codes_decode_ranges_as_scalars() {
        assert_eq!(
            PropertyKind::from_mirror_code(MIRROR_KIND_RANGE),
            Some(PropertyKind::Scalar)
        );
        assert_eq!(PropertyKind::from_mirror_code(9), None);
        for kind in PropertyKind::ALL {
            assert_eq!(PropertyKind::from_mirror_code(kind.mirror_code()), Some(kind));
        }
    }

    #[test]
    fn document_parses_without_optional_fields() {
        let doc = OverrideDocument::from_json_str(
            r#"{"renderers":[{"target_renderer":4,"materials":[{"target_material":5}]}]}"#,
        )
        .unwrap();
        let renderer = doc.renderer(RendererHandle(4)).unwrap();
        assert!(renderer.expanded);
        assert!(!renderer.dirty);
        assert_eq!(renderer.materials[0].target_material, Some(MaterialHandle(5)));
        assert!(renderer.materials[0].properties.is_empty());
    }
}
