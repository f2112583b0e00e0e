// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The entity database.

use alloc::string::String;
use alloc::vec::Vec;

use crate::EvalMode;
use crate::anim::Action;
use crate::armature::Armature;
use crate::collection::Collection;
use crate::data::{Camera, CacheFile, Light, LightProbe, Mask, MovieClip, Sound, Speaker};
use crate::error::SceneError;
use crate::geometry::{
    Curve, Curves, GreasePencil, Key, Lattice, Mesh, MetaBall, PointCloud, Volume,
};
use crate::id::*;
use crate::object::{Object, ObjectType, ParentType};
use crate::particles::ParticleSettings;
use crate::scene::{LayerCollection, Scene, ViewLayer};
use crate::shading::{Image, LineStyle, Material, NodeTree, Texture, World};

macro_rules! database {
    ($(
        $kind:ident($ty:ty, $handle:ident) {
            $field:ident, $add:ident, $get:ident, $try_get:ident, $get_mut:ident, $iter:ident
        }
    )*) => {
        /// Owns every entity of a scene file, one store per kind.
        ///
        /// Handles index into the stores and stay valid for the lifetime of
        /// the database; entities are never removed.
        #[derive(Clone, Debug, Default)]
        pub struct Main {
            $($field: Vec<$ty>,)*
        }

        impl Main {
            $(
                #[doc = concat!("Stores a `", stringify!($kind), "` and returns its handle.")]
                ///
                /// # Panics
                ///
                /// Panics if the store already holds `u32::MAX` entities.
                pub fn $add(&mut self, value: $ty) -> $handle {
                    let index = u32::try_from(self.$field.len())
                        .expect(concat!("too many ", stringify!($kind), " entities"));
                    self.$field.push(value);
                    $handle(index)
                }

                #[doc = concat!("Returns the `", stringify!($kind), "` for `id`.")]
                ///
                /// # Panics
                ///
                /// Panics if `id` was not allocated by this database.
                #[must_use]
                pub fn $get(&self, id: $handle) -> &$ty {
                    &self.$field[id.index()]
                }

                #[doc = concat!("Returns the `", stringify!($kind), "` for `id`, if stored.")]
                #[must_use]
                pub fn $try_get(&self, id: $handle) -> Option<&$ty> {
                    self.$field.get(id.index())
                }

                #[doc = concat!("Mutable access to the `", stringify!($kind), "` for `id`.")]
                ///
                /// # Panics
                ///
                /// Panics if `id` was not allocated by this database.
                pub fn $get_mut(&mut self, id: $handle) -> &mut $ty {
                    &mut self.$field[id.index()]
                }

                #[doc = concat!("Iterates over all `", stringify!($kind), "` entities in creation order.")]
                pub fn $iter(&self) -> impl Iterator<Item = ($handle, &$ty)> + '_ {
                    self.$field
                        .iter()
                        .enumerate()
                        .filter_map(|(i, value)| Some(($handle(u32::try_from(i).ok()?), value)))
                }
            )*

            /// Returns the header of any entity.
            #[must_use]
            pub fn header(&self, id: IdRef) -> Option<&IdHeader> {
                match id {
                    $(IdRef::$kind(h) => self.$field.get(h.index()).map(Datablock::header),)*
                }
            }

            /// Mutable access to the header of any entity.
            pub fn header_mut(&mut self, id: IdRef) -> Option<&mut IdHeader> {
                match id {
                    $(IdRef::$kind(h) => self.$field.get_mut(h.index()).map(Datablock::header_mut),)*
                }
            }
        }

        $(
            impl Datablock for $ty {
                fn header(&self) -> &IdHeader {
                    &self.id
                }

                fn header_mut(&mut self) -> &mut IdHeader {
                    &mut self.id
                }
            }
        )*
    };
}

database! {
    Object(Object, ObjectId) { objects, add_object, object, get_object, object_mut, objects }
    Collection(Collection, CollectionId) {
        collections, add_collection, collection, get_collection, collection_mut, collections
    }
    Mesh(Mesh, MeshId) { meshes, add_mesh, mesh, get_mesh, mesh_mut, meshes }
    Curve(Curve, CurveId) { curves_legacy, add_curve, curve, get_curve, curve_mut, curves_legacy }
    Curves(Curves, CurvesId) { hair_curves, add_curves, curves, get_curves, curves_mut, hair_curves }
    PointCloud(PointCloud, PointCloudId) {
        point_clouds, add_point_cloud, point_cloud, get_point_cloud, point_cloud_mut, point_clouds
    }
    Volume(Volume, VolumeId) { volumes, add_volume, volume, get_volume, volume_mut, volumes }
    GreasePencil(GreasePencil, GreasePencilId) {
        grease_pencils, add_grease_pencil, grease_pencil, get_grease_pencil, grease_pencil_mut,
        grease_pencils
    }
    Lattice(Lattice, LatticeId) { lattices, add_lattice, lattice, get_lattice, lattice_mut, lattices }
    MetaBall(MetaBall, MetaBallId) {
        metaballs, add_metaball, metaball, get_metaball, metaball_mut, metaballs
    }
    Key(Key, KeyId) { keys, add_key, key, get_key, key_mut, keys }
    Armature(Armature, ArmatureId) {
        armatures, add_armature, armature, get_armature, armature_mut, armatures
    }
    Camera(Camera, CameraId) { cameras, add_camera, camera, get_camera, camera_mut, cameras }
    Light(Light, LightId) { lights, add_light, light, get_light, light_mut, lights }
    LightProbe(LightProbe, LightProbeId) {
        light_probes, add_light_probe, light_probe, get_light_probe, light_probe_mut, light_probes
    }
    Speaker(Speaker, SpeakerId) { speakers, add_speaker, speaker, get_speaker, speaker_mut, speakers }
    Sound(Sound, SoundId) { sounds, add_sound, sound, get_sound, sound_mut, sounds }
    Material(Material, MaterialId) {
        materials, add_material, material, get_material, material_mut, materials
    }
    NodeTree(NodeTree, NodeTreeId) {
        node_trees, add_node_tree, node_tree, get_node_tree, node_tree_mut, node_trees
    }
    Texture(Texture, TextureId) { textures, add_texture, texture, get_texture, texture_mut, textures }
    Image(Image, ImageId) { images, add_image, image, get_image, image_mut, images }
    World(World, WorldId) { worlds, add_world, world, get_world, world_mut, worlds }
    LineStyle(LineStyle, LineStyleId) {
        line_styles, add_line_style, line_style, get_line_style, line_style_mut, line_styles
    }
    ParticleSettings(ParticleSettings, ParticleSettingsId) {
        particle_settings, add_particle_settings, particle_settings, get_particle_settings,
        particle_settings_mut, all_particle_settings
    }
    Action(Action, ActionId) { actions, add_action, action, get_action, action_mut, actions }
    CacheFile(CacheFile, CacheFileId) {
        cache_files, add_cache_file, cache_file, get_cache_file, cache_file_mut, cache_files
    }
    Mask(Mask, MaskId) { masks, add_mask, mask, get_mask, mask_mut, masks }
    MovieClip(MovieClip, MovieClipId) {
        movie_clips, add_movie_clip, movie_clip, get_movie_clip, movie_clip_mut, movie_clips
    }
    Scene(Scene, SceneId) { scenes, add_scene, scene, get_scene, scene_mut, scenes }
}

/// An object cached for a collection, with the collection-level visibility
/// it inherits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CollectionBase {
    /// The object.
    pub object: ObjectId,
    /// Reachable through a path of collections not hidden in the viewport.
    pub viewport: bool,
    /// Reachable through a path of collections not hidden in renders.
    pub render: bool,
}

impl CollectionBase {
    /// Returns `true` if the collections allow the object in `mode`.
    #[must_use]
    pub const fn enabled_in(&self, mode: EvalMode) -> bool {
        match mode {
            EvalMode::Viewport => self.viewport,
            EvalMode::Render => self.render,
        }
    }
}

/// An object of a view layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LayerBase {
    /// The object.
    pub object: ObjectId,
    /// Visible for the evaluation mode the bases were collected for.
    pub visible: bool,
}

impl Main {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `id` refers to a stored entity.
    #[must_use]
    pub fn contains(&self, id: IdRef) -> bool {
        self.header(id).is_some()
    }

    /// Returns the name of any entity, or `""` for stale handles.
    #[must_use]
    pub fn name(&self, id: IdRef) -> &str {
        self.header(id).map_or("", |h| h.name.as_str())
    }

    /// Creates a scene with a master collection and one view layer.
    pub fn new_scene(&mut self, name: impl Into<String>) -> SceneId {
        let master = self.add_collection(Collection::new("Scene Collection"));
        let layer = ViewLayer {
            name: "ViewLayer".into(),
            layer_collections: alloc::vec![LayerCollection::new(master)],
            ..ViewLayer::default()
        };
        self.add_scene(Scene {
            id: IdHeader::new(name),
            master_collection: Some(master),
            view_layers: alloc::vec![layer],
            ..Scene::default()
        })
    }

    /// Finds the first object named `name`.
    #[must_use]
    pub fn find_object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects()
            .find_map(|(id, object)| (object.id.name == name).then_some(id))
    }

    /// Returns `true` if `ancestor` is on the parent chain of `object`.
    #[must_use]
    pub fn is_child_of(&self, object: ObjectId, ancestor: ObjectId) -> bool {
        let mut current = self.get_object(object).and_then(|ob| ob.parent);
        // Parent cycles are rejected by `set_parent`; bound the walk anyway
        // for databases edited through direct field access.
        let mut steps = self.objects.len();
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if steps == 0 {
                return false;
            }
            steps -= 1;
            current = self.get_object(id).and_then(|ob| ob.parent);
        }
        false
    }

    /// Parents `child` to `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::ParentCycle`] if `parent` is `child` or one of
    /// its descendants, and [`SceneError::StaleHandle`] for unknown handles.
    pub fn set_parent(
        &mut self,
        child: ObjectId,
        parent: ObjectId,
        parent_type: ParentType,
    ) -> Result<(), SceneError> {
        for id in [child, parent] {
            if self.get_object(id).is_none() {
                return Err(SceneError::StaleHandle(id.into()));
            }
        }
        if child == parent || self.is_child_of(parent, child) {
            return Err(SceneError::ParentCycle { child, parent });
        }
        let ob = self.object_mut(child);
        ob.parent = Some(parent);
        ob.parent_type = parent_type;
        Ok(())
    }

    /// Links `object` into `collection`; linking twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::StaleHandle`] for unknown handles.
    pub fn link_object(
        &mut self,
        collection: CollectionId,
        object: ObjectId,
    ) -> Result<(), SceneError> {
        if self.get_object(object).is_none() {
            return Err(SceneError::StaleHandle(object.into()));
        }
        let coll = self
            .collections
            .get_mut(collection.index())
            .ok_or(SceneError::StaleHandle(collection.into()))?;
        if !coll.objects.contains(&object) {
            coll.objects.push(object);
        }
        Ok(())
    }

    /// Links `child` as a child collection of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::CollectionCycle`] if `parent` is reachable from
    /// `child`, and [`SceneError::StaleHandle`] for unknown handles.
    pub fn link_collection(
        &mut self,
        parent: CollectionId,
        child: CollectionId,
    ) -> Result<(), SceneError> {
        for id in [parent, child] {
            if self.get_collection(id).is_none() {
                return Err(SceneError::StaleHandle(id.into()));
            }
        }
        if parent == child || self.collection_contains(child, parent) {
            return Err(SceneError::CollectionCycle { child, parent });
        }
        let coll = self.collection_mut(parent);
        if !coll.children.contains(&child) {
            coll.children.push(child);
        }
        Ok(())
    }

    /// Returns `true` if `needle` is a (transitive) child of `haystack`.
    #[must_use]
    pub fn collection_contains(&self, haystack: CollectionId, needle: CollectionId) -> bool {
        let mut stack = alloc::vec![haystack];
        let mut visited: Vec<CollectionId> = Vec::new();
        while let Some(id) = stack.pop() {
            if visited.contains(&id) {
                continue;
            }
            visited.push(id);
            let Some(coll) = self.get_collection(id) else {
                continue;
            };
            for &child in &coll.children {
                if child == needle {
                    return true;
                }
                stack.push(child);
            }
        }
        false
    }

    /// Objects of `collection` and all its children, each once, in the
    /// order they are first reached: own objects before child collections.
    ///
    /// Every base records whether some path of non-hidden collections
    /// reaches it in each mode. Object visibility flags are not applied.
    #[must_use]
    pub fn collection_object_cache(&self, collection: CollectionId) -> Vec<CollectionBase> {
        let mut bases = Vec::new();
        let mut path = Vec::new();
        self.fill_object_cache(&mut bases, &mut path, collection, false, false);
        bases
    }

    fn fill_object_cache(
        &self,
        bases: &mut Vec<CollectionBase>,
        path: &mut Vec<CollectionId>,
        collection: CollectionId,
        parent_hide_viewport: bool,
        parent_hide_render: bool,
    ) {
        let Some(coll) = self.get_collection(collection) else {
            return;
        };
        if path.contains(&collection) {
            return;
        }
        let hide_viewport = parent_hide_viewport || coll.hide_viewport;
        let hide_render = parent_hide_render || coll.hide_render;
        for &object in &coll.objects {
            let index = match bases.iter().position(|b| b.object == object) {
                Some(index) => index,
                None => {
                    bases.push(CollectionBase {
                        object,
                        viewport: false,
                        render: false,
                    });
                    bases.len() - 1
                }
            };
            bases[index].viewport |= !hide_viewport;
            bases[index].render |= !hide_render;
        }
        path.push(collection);
        for &child in &coll.children {
            self.fill_object_cache(bases, path, child, hide_viewport, hide_render);
        }
        path.pop();
    }

    /// Visible objects of `collection` and its children in `mode`, paired
    /// with their position in [`collection_object_cache`](Self::collection_object_cache).
    ///
    /// The position counts hidden objects too, so it stays stable when
    /// visibility changes.
    #[must_use]
    pub fn collection_visible_objects(
        &self,
        collection: CollectionId,
        mode: EvalMode,
    ) -> Vec<(usize, ObjectId)> {
        self.collection_object_cache(collection)
            .into_iter()
            .enumerate()
            .filter(|(_, base)| {
                base.enabled_in(mode)
                    && self
                        .get_object(base.object)
                        .is_some_and(|ob| !ob.is_hidden(mode))
            })
            .map(|(index, base)| (index, base.object))
            .collect()
    }

    /// Objects of a view layer, each once.
    ///
    /// Excluded layer collections are skipped with their children. Objects
    /// only reachable through collections hidden in `mode`, or hidden
    /// themselves, are reported as not visible.
    #[must_use]
    pub fn view_layer_bases(&self, layer: &ViewLayer, mode: EvalMode) -> Vec<LayerBase> {
        let mut bases: Vec<LayerBase> = Vec::new();
        let mut stack: Vec<(&LayerCollection, bool)> =
            layer.layer_collections.iter().rev().map(|lc| (lc, false)).collect();
        while let Some((lc, parent_hidden)) = stack.pop() {
            if lc.exclude {
                continue;
            }
            let Some(coll) = self.get_collection(lc.collection) else {
                continue;
            };
            let hidden = parent_hidden || coll.is_hidden(mode);
            for &object in &coll.objects {
                let visible =
                    !hidden && self.get_object(object).is_some_and(|ob| !ob.is_hidden(mode));
                match bases.iter_mut().find(|b| b.object == object) {
                    Some(base) => base.visible |= visible,
                    None => bases.push(LayerBase { object, visible }),
                }
            }
            stack.extend(lc.children.iter().rev().map(|child| (child, hidden)));
        }
        bases
    }

    /// The metaball object that owns the merged surface of `object`'s family.
    ///
    /// Metaball objects sharing a base name (the part before a numeric
    /// `.NNN` suffix) are merged; the one with the lowest suffix is the
    /// basis.
    #[must_use]
    pub fn metaball_basis(&self, object: ObjectId) -> Option<ObjectId> {
        let ob = self.get_object(object)?;
        if ob.kind != ObjectType::MetaBall {
            return None;
        }
        let (base, _) = split_name_number(&ob.id.name);
        self.objects()
            .filter(|(_, other)| other.kind == ObjectType::MetaBall)
            .filter_map(|(id, other)| {
                let (other_base, number) = split_name_number(&other.id.name);
                (other_base == base).then_some((number, id))
            })
            .min_by_key(|&(number, id)| (number, id))
            .map(|(_, id)| id)
    }

    /// Material slots stored on an object-data entity.
    #[must_use]
    pub fn data_materials(&self, data: IdRef) -> &[Option<MaterialId>] {
        let slots = match data {
            IdRef::Mesh(id) => self.get_mesh(id).map(|d| &d.materials),
            IdRef::Curve(id) => self.get_curve(id).map(|d| &d.materials),
            IdRef::Curves(id) => self.get_curves(id).map(|d| &d.materials),
            IdRef::PointCloud(id) => self.get_point_cloud(id).map(|d| &d.materials),
            IdRef::Volume(id) => self.get_volume(id).map(|d| &d.materials),
            IdRef::GreasePencil(id) => self.get_grease_pencil(id).map(|d| &d.materials),
            IdRef::MetaBall(id) => self.get_metaball(id).map(|d| &d.materials),
            _ => None,
        };
        slots.map_or(&[], Vec::as_slice)
    }

    /// Shape keys of an object-data entity.
    #[must_use]
    pub fn data_key(&self, data: IdRef) -> Option<KeyId> {
        match data {
            IdRef::Mesh(id) => self.get_mesh(id)?.key,
            IdRef::Curve(id) => self.get_curve(id)?.key,
            IdRef::Lattice(id) => self.get_lattice(id)?.key,
            _ => None,
        }
    }
}

/// Splits `Name.001` into `("Name", 1)`; names without a numeric suffix
/// get number `0`.
#[must_use]
pub fn split_name_number(name: &str) -> (&str, u32) {
    if let Some((base, suffix)) = name.rsplit_once('.') {
        if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(number) = suffix.parse() {
                return (base, number);
            }
        }
    }
    (name, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn parenting_rejects_cycles() {
        let mut main = Main::new();
        let a = main.add_object(Object::new("A", ObjectType::Empty));
        let b = main.add_object(Object::new("B", ObjectType::Empty));
        main.set_parent(b, a, ParentType::Object).unwrap();
        assert!(main.is_child_of(b, a));
        assert_eq!(
            main.set_parent(a, b, ParentType::Object),
            Err(SceneError::ParentCycle {
                child: a,
                parent: b
            })
        );
        assert_eq!(
            main.set_parent(a, a, ParentType::Object),
            Err(SceneError::ParentCycle {
                child: a,
                parent: a
            })
        );
    }

    #[test]
    fn collection_links_reject_cycles() {
        let mut main = Main::new();
        let outer = main.add_collection(Collection::new("outer"));
        let inner = main.add_collection(Collection::new("inner"));
        main.link_collection(outer, inner).unwrap();
        assert!(main.collection_contains(outer, inner));
        assert!(matches!(
            main.link_collection(inner, outer),
            Err(SceneError::CollectionCycle { .. })
        ));
    }

    #[test]
    fn object_cache_dedups_and_tracks_hidden_children() {
        let mut main = Main::new();
        let root = main.add_collection(Collection::new("root"));
        let hidden = main.add_collection(Collection {
            hide_viewport: true,
            ..Collection::new("hidden")
        });
        let a = main.add_object(Object::new("A", ObjectType::Empty));
        let b = main.add_object(Object::new("B", ObjectType::Empty));
        main.link_object(root, a).unwrap();
        main.link_object(hidden, b).unwrap();
        main.link_object(hidden, a).unwrap();
        main.link_collection(root, hidden).unwrap();

        let cache = main.collection_object_cache(root);
        assert_eq!(cache.len(), 2);
        assert!(cache[0].viewport, "reached through the visible root");
        assert!(!cache[1].viewport);
        assert!(cache[1].render);

        assert_eq!(
            main.collection_visible_objects(root, EvalMode::Viewport),
            vec![(0, a)]
        );
        assert_eq!(
            main.collection_visible_objects(root, EvalMode::Render),
            vec![(0, a), (1, b)]
        );
    }

    #[test]
    fn view_layer_skips_excluded_collections() {
        let mut main = Main::new();
        let scene = main.new_scene("Scene");
        let master = main.scene(scene).master_collection.unwrap();
        let excluded = main.add_collection(Collection::new("excluded"));
        let a = main.add_object(Object::new("A", ObjectType::Empty));
        let b = main.add_object(Object::new("B", ObjectType::Empty));
        main.link_object(master, a).unwrap();
        main.link_object(excluded, b).unwrap();
        main.link_collection(master, excluded).unwrap();
        main.scene_mut(scene).view_layers[0].layer_collections[0]
            .children
            .push(LayerCollection {
                exclude: true,
                ..LayerCollection::new(excluded)
            });

        let bases = main.view_layer_bases(&main.scene(scene).view_layers[0], EvalMode::Viewport);
        assert_eq!(
            bases,
            vec![LayerBase {
                object: a,
                visible: true
            }]
        );
    }

    #[test]
    fn metaball_basis_is_lowest_suffix() {
        let mut main = Main::new();
        let b1 = main.add_object(Object::new("Ball.001", ObjectType::MetaBall));
        let b0 = main.add_object(Object::new("Ball", ObjectType::MetaBall));
        let other = main.add_object(Object::new("Other", ObjectType::MetaBall));
        assert_eq!(main.metaball_basis(b1), Some(b0));
        assert_eq!(main.metaball_basis(other), Some(other));
        assert_eq!(split_name_number("Cube.v2"), ("Cube.v2", 0));
    }
}
