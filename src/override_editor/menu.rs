use std::collections::BTreeMap;

use crate::{
    host::SceneHost,
    override_types::{MaterialOverrideSet, PropertyKind, ShaderPropertyType},
};

pub const DEFAULT_LABEL_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMenuEntry {
    /// `"{Type}/{label}"`.
    pub path: String,
    pub name: String,
    pub description: String,
    pub kind: PropertyKind,
    pub shader_type: ShaderPropertyType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyMenu {
    Entries(Vec<PropertyMenuEntry>),
    /// Nothing can be added; carries the reason shown in place of the menu.
    Unavailable(&'static str),
}

impl PropertyMenu {
    pub fn entries(&self) -> &[PropertyMenuEntry] {
        match self {
            PropertyMenu::Entries(entries) => entries,
            PropertyMenu::Unavailable(_) => &[],
        }
    }
}

fn truncate_label(name: &str, limit: usize) -> String {
    if name.chars().count() <= limit {
        return name.to_string();
    }
    let keep = limit.saturating_sub(3);
    let mut label: String = name.chars().take(keep).collect();
    label.push_str("...");
    label
}

/// Lists the shader properties of `set`'s material that are not overridden
/// yet, grouped by shader type (groups ordered by type name) and sorted by
/// name within each group.
pub fn property_menu<H>(host: &H, set: &MaterialOverrideSet, label_limit: usize) -> PropertyMenu
where
    H: SceneHost + ?Sized,
{
    let Some(properties) = set
        .target_material
        .and_then(|material| host.shader_properties(material))
    else {
        return PropertyMenu::Unavailable("No shader available");
    };

    let mut groups: BTreeMap<&'static str, Vec<PropertyMenuEntry>> = BTreeMap::new();
    for prop in properties {
        if set.has_property(&prop.name) {
            continue;
        }
        let group = prop.ty.label();
        groups.entry(group).or_default().push(PropertyMenuEntry {
            path: format!("{}/{}", group, truncate_label(&prop.name, label_limit)),
            kind: prop.ty.override_kind(),
            shader_type: prop.ty,
            name: prop.name,
            description: prop.description,
        });
    }

    if groups.is_empty() {
        return PropertyMenu::Unavailable("No properties available");
    }

    let entries = groups
        .into_values()
        .flat_map(|mut entries| {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            entries
        })
        .collect();
    PropertyMenu::Entries(entries)
}
