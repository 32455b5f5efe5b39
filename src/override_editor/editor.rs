use tracing::{debug, info};

use crate::{
    config::SessionConfig,
    host::{AssetIndex, MirrorGraph, SceneHost, UserDialogs},
    override_editor::{
        apply::{self, ApplyAllReport, ApplyReport, RevertOutcome},
        menu::{self, PropertyMenu},
        mirror::{self, ExportReport, ImportMode, ImportReport},
        prefs::{MirrorPointer, Preferences},
        store::DocumentStore,
    },
    override_types::{
        MaterialHandle, MaterialOverrideSet, ModelError, ObjectHandle, OverrideDocument,
        PropertyKind, PropertyOverride, PropertyValue, RendererHandle, RendererOverrideSet,
    },
    utils::error::OverrideError,
};

/// One editing session over the override document.
///
/// Structural edits (adding or removing renderers, materials and properties,
/// clearing, importing) are flushed to the store immediately. Value edits only
/// mark the owning renderer dirty until it is applied or reverted.
#[derive(Debug)]
pub struct OverrideEditor {
    document: OverrideDocument,
    store: DocumentStore,
    pointer: MirrorPointer,
    selected: Option<usize>,
    mirror: Option<ObjectHandle>,
    mirror_root_name: String,
    label_limit: usize,
}

impl OverrideEditor {
    /// Loads the persisted document and mirror selection, then drops entries
    /// whose host objects are gone.
    pub fn open<H>(
        config: &SessionConfig,
        prefs: &Preferences,
        host: &mut H,
    ) -> Result<Self, OverrideError>
    where
        H: SceneHost + MirrorGraph + AssetIndex + ?Sized,
    {
        let store = config.document_store();
        let pointer = config.mirror_pointer();
        let mirror = pointer
            .load(prefs)
            .filter(|root| host.mirror(*root).is_some());

        let mut editor = Self {
            document: store.load(),
            store,
            pointer,
            selected: None,
            mirror,
            mirror_root_name: config.mirror_root_name.clone(),
            label_limit: config.menu_label_limit,
        };
        editor.prune_stale(host)?;
        info!(
            store = %editor.store.path().display(),
            renderers = editor.document.renderers.len(),
            "opened override editor"
        );
        Ok(editor)
    }

    /// Flushes the document and remembers the selected mirror for replay.
    pub fn close<H>(&self, prefs: &mut Preferences, host: &mut H) -> Result<(), OverrideError>
    where
        H: AssetIndex + ?Sized,
    {
        self.persist(host)?;
        self.pointer.store(prefs, self.mirror)?;
        Ok(())
    }

    pub fn document(&self) -> &OverrideDocument {
        &self.document
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn select(&mut self, index: Option<usize>) {
        self.selected = index.filter(|index| *index < self.document.renderers.len());
    }

    pub fn selected_renderer(&self) -> Option<&RendererOverrideSet> {
        self.selected
            .and_then(|index| self.document.renderers.get(index))
    }

    pub fn selected_mirror(&self) -> Option<ObjectHandle> {
        self.mirror
    }

    pub fn select_mirror(&mut self, mirror: Option<ObjectHandle>) {
        self.mirror = mirror;
    }

    pub fn persist<H>(&self, host: &mut H) -> Result<(), OverrideError>
    where
        H: AssetIndex + ?Sized,
    {
        self.store.save(&self.document, host)?;
        Ok(())
    }

    fn clamp_selection(&mut self) {
        if self
            .selected
            .is_some_and(|index| index >= self.document.renderers.len())
        {
            self.selected = None;
        }
    }

    fn renderer_at(&mut self, index: usize) -> Result<&mut RendererOverrideSet, ModelError> {
        let len = self.document.renderers.len();
        self.document
            .renderers
            .get_mut(index)
            .ok_or(ModelError::IndexOutOfRange {
                what: "renderer",
                index,
                len,
            })
    }

    fn material_at(
        &mut self,
        renderer: usize,
        material: usize,
    ) -> Result<&mut MaterialOverrideSet, ModelError> {
        let set = self.renderer_at(renderer)?;
        let len = set.materials.len();
        set.materials
            .get_mut(material)
            .ok_or(ModelError::IndexOutOfRange {
                what: "material",
                index: material,
                len,
            })
    }

    /// Drops renderer and material entries whose host objects no longer exist
    /// and persists the cleanup. Returns the number of entries dropped.
    pub fn prune_stale<H>(&mut self, host: &mut H) -> Result<usize, OverrideError>
    where
        H: SceneHost + AssetIndex + ?Sized,
    {
        let mut dropped = 0;
        self.document.renderers.retain(|set| {
            let live = set
                .target_renderer
                .is_some_and(|renderer| host.renderer_exists(renderer));
            if !live {
                debug!(renderer = ?set.target_renderer, "dropping stale renderer entry");
                dropped += 1;
            }
            live
        });
        for set in &mut self.document.renderers {
            set.materials.retain(|material| {
                let live = material
                    .target_material
                    .is_some_and(|handle| host.material_exists(handle));
                if !live {
                    debug!(material = ?material.target_material, "dropping stale material entry");
                    dropped += 1;
                }
                live
            });
        }

        if dropped > 0 {
            self.clamp_selection();
            self.persist(host)?;
            info!(dropped, "pruned stale override entries");
        }
        Ok(dropped)
    }

    /// Adds `renderer` with one empty material set per bound material. Returns
    /// false when it is already present or not a live renderer.
    pub fn add_renderer<H>(&mut self, renderer: RendererHandle, host: &mut H) -> Result<bool, OverrideError>
    where
        H: SceneHost + AssetIndex + ?Sized,
    {
        if self.document.contains(renderer) {
            return Ok(false);
        }
        let Some(slots) = host.renderer_materials(renderer) else {
            debug!(renderer = %renderer, "ignoring unknown renderer");
            return Ok(false);
        };

        self.document
            .renderers
            .push(RendererOverrideSet::new(renderer, slots.into_iter().flatten()));
        self.persist(host)?;
        info!(renderer = %renderer, "added renderer");
        Ok(true)
    }

    /// Adds every handle in `renderers`. Returns how many were new.
    pub fn add_renderers<H>(
        &mut self,
        renderers: &[RendererHandle],
        host: &mut H,
    ) -> Result<usize, OverrideError>
    where
        H: SceneHost + AssetIndex + ?Sized,
    {
        let mut added = 0;
        for renderer in renderers {
            if self.add_renderer(*renderer, host)? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn remove_renderer<H>(
        &mut self,
        index: usize,
        host: &mut H,
    ) -> Result<RendererOverrideSet, OverrideError>
    where
        H: AssetIndex + ?Sized,
    {
        self.renderer_at(index)?;
        let removed = self.document.renderers.remove(index);
        self.clamp_selection();
        self.persist(host)?;
        Ok(removed)
    }

    pub fn add_material<H>(
        &mut self,
        renderer: usize,
        material: MaterialHandle,
        host: &mut H,
    ) -> Result<bool, OverrideError>
    where
        H: SceneHost + AssetIndex + ?Sized,
    {
        if !host.material_exists(material) {
            return Ok(false);
        }
        match self.renderer_at(renderer)?.add_material(material) {
            Ok(()) => {}
            Err(ModelError::DuplicateMaterial(_)) => return Ok(false),
            Err(err) => return Err(err.into()),
        }
        self.persist(host)?;
        Ok(true)
    }

    pub fn remove_material<H>(
        &mut self,
        renderer: usize,
        material: usize,
        host: &mut H,
    ) -> Result<MaterialOverrideSet, OverrideError>
    where
        H: AssetIndex + ?Sized,
    {
        self.material_at(renderer, material)?;
        let removed = self.document.renderers[renderer].materials.remove(material);
        self.persist(host)?;
        Ok(removed)
    }

    /// Appends a default-valued property. A name that is already overridden
    /// is ignored and reported as `Ok(false)`.
    pub fn add_property<H>(
        &mut self,
        renderer: usize,
        material: usize,
        name: &str,
        kind: PropertyKind,
        host: &mut H,
    ) -> Result<bool, OverrideError>
    where
        H: AssetIndex + ?Sized,
    {
        match self.material_at(renderer, material)?.add_property(name, kind) {
            Ok(_) => {}
            Err(ModelError::DuplicateProperty(name)) => {
                debug!(property = %name, "ignoring duplicate property");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        }
        self.persist(host)?;
        Ok(true)
    }

    pub fn remove_property<H>(
        &mut self,
        renderer: usize,
        material: usize,
        property: usize,
        host: &mut H,
    ) -> Result<PropertyOverride, OverrideError>
    where
        H: AssetIndex + ?Sized,
    {
        let set = self.material_at(renderer, material)?;
        let len = set.properties.len();
        let removed = set
            .remove_property(property)
            .ok_or(ModelError::IndexOutOfRange {
                what: "property",
                index: property,
                len,
            })?;
        self.persist(host)?;
        Ok(removed)
    }

    /// Edits a value in memory and marks the renderer dirty.
    pub fn set_property_value(
        &mut self,
        renderer: usize,
        material: usize,
        property: usize,
        value: PropertyValue,
    ) -> Result<(), OverrideError> {
        let set = self.material_at(renderer, material)?;
        let len = set.properties.len();
        set.properties
            .get_mut(property)
            .ok_or(ModelError::IndexOutOfRange {
                what: "property",
                index: property,
                len,
            })?
            .set_value(value)?;
        self.document.renderers[renderer].dirty = true;
        Ok(())
    }

    pub fn apply<H>(&mut self, renderer: usize, host: &mut H) -> Result<Option<ApplyReport>, OverrideError>
    where
        H: SceneHost + ?Sized,
    {
        Ok(apply::apply(self.renderer_at(renderer)?, host))
    }

    pub fn revert(&mut self, renderer: usize) -> Result<RevertOutcome, OverrideError> {
        let store = self.store.clone();
        Ok(apply::revert(self.renderer_at(renderer)?, &store))
    }

    pub fn apply_all<H>(&mut self, host: &mut H) -> ApplyAllReport
    where
        H: SceneHost + ?Sized,
    {
        apply::apply_all(&mut self.document, host)
    }

    /// Exports into the selected mirror, creating one when none is selected,
    /// and selects the result.
    pub fn export<H>(&mut self, host: &mut H) -> ExportReport
    where
        H: SceneHost + MirrorGraph + ?Sized,
    {
        let report =
            mirror::export_to_mirror(&self.document, host, self.mirror, &self.mirror_root_name);
        self.mirror = Some(report.root);
        report
    }

    /// Imports from the selected mirror. Precondition failures are shown to
    /// the user and leave the document untouched.
    pub fn import<H>(
        &mut self,
        mode: ImportMode,
        host: &mut H,
        dialogs: &mut (impl UserDialogs + ?Sized),
    ) -> Result<ImportReport, OverrideError>
    where
        H: SceneHost + MirrorGraph + AssetIndex + ?Sized,
    {
        let report = match mirror::import_from_mirror(self.mirror, &*host, &mut self.document, mode) {
            Ok(report) => report,
            Err(err) => {
                dialogs.alert("Import Error", &err.to_string());
                return Err(err.into());
            }
        };
        if mode == ImportMode::ClearExisting {
            self.selected = None;
        }
        self.persist(host)?;
        dialogs.alert(
            "Import Complete",
            &format!(
                "Successfully imported {} mesh(es) with {} material(s).",
                report.meshes, report.materials
            ),
        );
        Ok(report)
    }

    /// Checks the import preconditions, then asks whether to clear the
    /// document first or merge into it.
    pub fn import_interactive<H>(
        &mut self,
        host: &mut H,
        dialogs: &mut (impl UserDialogs + ?Sized),
    ) -> Result<ImportReport, OverrideError>
    where
        H: SceneHost + MirrorGraph + AssetIndex + ?Sized,
    {
        if let Err(err) = mirror::resolve_import_source(self.mirror, &*host) {
            dialogs.alert("Import Error", &err.to_string());
            return Err(err.into());
        }
        let mode = if dialogs.confirm(
            "Import",
            "Do you want to clear existing configuration before importing?",
        ) {
            ImportMode::ClearExisting
        } else {
            ImportMode::Merge
        };
        self.import(mode, host, dialogs)
    }

    /// Removes every renderer after the user confirms. Returns whether the
    /// document was cleared.
    pub fn clear_all<H>(
        &mut self,
        host: &mut H,
        dialogs: &mut (impl UserDialogs + ?Sized),
    ) -> Result<bool, OverrideError>
    where
        H: AssetIndex + ?Sized,
    {
        if !dialogs.confirm("Clear All", "Remove all renderers and their properties?") {
            return Ok(false);
        }
        self.document.renderers.clear();
        self.selected = None;
        self.persist(host)?;
        info!("cleared override document");
        Ok(true)
    }

    pub fn property_menu<H>(
        &self,
        renderer: usize,
        material: usize,
        host: &H,
    ) -> Result<PropertyMenu, OverrideError>
    where
        H: SceneHost + ?Sized,
    {
        let set = self
            .document
            .renderers
            .get(renderer)
            .and_then(|set| set.materials.get(material))
            .ok_or(ModelError::IndexOutOfRange {
                what: "material",
                index: material,
                len: self
                    .document
                    .renderers
                    .get(renderer)
                    .map_or(0, |set| set.materials.len()),
            })?;
        Ok(menu::property_menu(host, set, self.label_limit))
    }
}
