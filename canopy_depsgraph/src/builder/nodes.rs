// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! First build pass: every node the relation pass wires.

use alloc::vec::Vec;

use canopy_scene::{
    ActionId, ArmatureId, CacheFileId, CameraId, CollectionId, Constraint, ConstraintKind,
    DupliFlags, GeometrySet, IdRef, ImageId, InstanceReference, KeyId, LayerCollection, LightId,
    LightProbeId, LineStyleId, Main, MaskId, MaterialId, Modifier, MovieClipId, NlaStrip,
    NodeTreeId, Object, ObjectId, ParticlePhysics, ParticleRenderAs, ParticleSettingsId,
    SceneId, SoundId, SpeakerId, StripKind, TextureId, WorldId,
};

use super::map::{BuildTags, BuilderMap};
use super::pose::{has_bbone_segments, ik_chain, spline_ik_chain};
use super::{has_point_cache, modifier_ids, rna};
use crate::graph::Depsgraph;
use crate::key::{NodeType, OperationCode, OperationKey};
use crate::node::OperationId;

/// Creates the ID, component and operation nodes of a scene.
///
/// Every `build_*` entry point is memoized per entity, so callers may request
/// the same entity from as many places as they like.
#[derive(Debug)]
pub struct NodeBuilder<'a> {
    main: &'a Main,
    graph: &'a mut Depsgraph,
    built: BuilderMap,
}

impl<'a> NodeBuilder<'a> {
    /// Creates a builder adding nodes to `graph`.
    pub fn new(main: &'a Main, graph: &'a mut Depsgraph) -> Self {
        Self {
            main,
            graph,
            built: BuilderMap::new(),
        }
    }

    fn add(&mut self, key: OperationKey<'_>) -> OperationId {
        self.graph.add_operation_node(&key)
    }

    fn op(&mut self, id: impl Into<IdRef>, kind: NodeType, opcode: OperationCode) -> OperationId {
        self.add(OperationKey::new(id, kind, opcode))
    }

    fn entry(&mut self, key: OperationKey<'_>) {
        let op = self.add(key);
        self.graph.set_entry(op);
    }

    fn exit(&mut self, key: OperationKey<'_>) {
        let op = self.add(key);
        self.graph.set_exit(op);
    }

    /// Builds a scene through one of its view layers.
    pub fn build_scene(&mut self, scene: SceneId, view_layer: usize) {
        self.build_view_layer(scene, view_layer, true);
    }

    fn build_view_layer(&mut self, scene: SceneId, view_layer: usize, linked_directly: bool) {
        let main = self.main;
        let Some(sce) = main.get_scene(scene) else {
            log::debug!("scene {scene:?} is not in the database");
            return;
        };
        if self
            .built
            .check_is_built_and_tag(scene.into(), BuildTags::COMPLETE)
        {
            return;
        }
        self.build_scene_parameters(scene);
        self.op(scene, NodeType::LayerCollections, OperationCode::ViewLayerEval);

        if let Some(layer) = sce.view_layers.get(view_layer) {
            for base in main.view_layer_bases(layer, self.graph.mode()) {
                if !base.visible {
                    continue;
                }
                self.build_object(base.object);
                self.op(
                    base.object,
                    NodeType::ObjectFromLayer,
                    OperationCode::ObjectBaseFlags,
                );
            }
            self.build_layer_collections(&layer.layer_collections);
            if let Some(material) = layer.material_override {
                self.build_material(material);
            }
            for &line_style in &layer.line_styles {
                self.build_line_style(line_style);
            }
        }
        if let Some(camera) = sce.camera {
            self.build_object(camera);
        }
        if let Some(world) = sce.world {
            self.build_world(world);
        }
        for (mask, _) in main.masks() {
            self.build_mask(mask);
        }
        for (clip, _) in main.movie_clips() {
            self.build_movie_clip(clip);
        }
        if let Some(clip) = sce.clip {
            self.build_movie_clip(clip);
        }
        self.build_scene_compositor(scene);
        if linked_directly {
            self.build_scene_audio(scene);
            self.build_scene_sequencer(scene);
        }
        if let Some(set) = sce.set {
            self.build_view_layer(set, 0, false);
        }
    }

    fn build_layer_collections(&mut self, layer_collections: &[LayerCollection]) {
        let mode = self.graph.mode();
        for lc in layer_collections {
            let Some(collection) = self.main.get_collection(lc.collection) else {
                continue;
            };
            if collection.is_hidden(mode) {
                continue;
            }
            if !lc.exclude {
                self.build_collection_nodes(lc.collection);
            }
            self.build_layer_collections(&lc.children);
        }
    }

    /// Builds any entity, dispatching on its kind.
    pub fn build_id(&mut self, id: IdRef) {
        match id {
            IdRef::Object(ob) => self.build_object(ob),
            IdRef::Collection(collection) => self.build_collection(collection),
            IdRef::Mesh(_)
            | IdRef::Curve(_)
            | IdRef::Curves(_)
            | IdRef::PointCloud(_)
            | IdRef::Volume(_)
            | IdRef::GreasePencil(_)
            | IdRef::Lattice(_)
            | IdRef::MetaBall(_) => self.build_object_data_geometry_datablock(id),
            IdRef::Key(key) => self.build_shapekeys(key),
            IdRef::Armature(armature) => self.build_armature(armature),
            IdRef::Camera(camera) => self.build_camera(camera),
            IdRef::Light(light) => self.build_light(light),
            IdRef::LightProbe(probe) => self.build_light_probe(probe),
            IdRef::Speaker(speaker) => self.build_speaker(speaker),
            IdRef::Sound(sound) => self.build_sound(sound),
            IdRef::Material(material) => self.build_material(material),
            IdRef::NodeTree(tree) => self.build_nodetree(tree),
            IdRef::Texture(texture) => self.build_texture(texture),
            IdRef::Image(image) => self.build_image(image),
            IdRef::World(world) => self.build_world(world),
            IdRef::LineStyle(line_style) => self.build_line_style(line_style),
            IdRef::ParticleSettings(part) => self.build_particle_settings(part),
            IdRef::Action(action) => self.build_action(action),
            IdRef::CacheFile(cache_file) => self.build_cache_file(cache_file),
            IdRef::Mask(mask) => self.build_mask(mask),
            IdRef::MovieClip(clip) => self.build_movie_clip(clip),
            IdRef::Scene(scene) => self.build_scene_parameters(scene),
        }
    }

    /// Returns `true` the first time `id` is seen.
    fn begin(&mut self, id: impl Into<IdRef>) -> bool {
        let id = id.into();
        if !self.main.contains(id) {
            log::debug!("{id:?} is not in the database");
            return false;
        }
        !self.built.check_is_built_and_tag(id, BuildTags::COMPLETE)
    }

    fn build_id_common(&mut self, id: IdRef) {
        self.build_parameters(id);
        self.build_animdata(id);
    }

    fn build_parameters(&mut self, id: IdRef) {
        if self.built.check_is_built_and_tag(id, BuildTags::PARAMETERS) {
            return;
        }
        let key = |opcode| OperationKey::new(id, NodeType::Parameters, opcode);
        self.entry(key(OperationCode::ParametersEntry));
        self.add(key(OperationCode::ParametersEval));
        self.exit(key(OperationCode::ParametersExit));
        if id.kind().needs_copy_on_eval() {
            self.op(id, NodeType::CopyOnEval, OperationCode::CopyOnEval);
        }

        let main = self.main;
        let Some(header) = main.header(id) else {
            return;
        };
        for (name, _) in header.properties.iter() {
            self.add(key(OperationCode::IdProperty).named(name));
        }
        let mut referenced = Vec::new();
        header.properties.for_each_id(&mut |target| referenced.push(target));
        for target in referenced {
            self.build_id(target);
        }
    }

    fn build_animdata(&mut self, id: IdRef) {
        if self.built.check_is_built_and_tag(id, BuildTags::ANIMATION) {
            return;
        }
        let main = self.main;
        let Some(adt) = main.header(id).and_then(|header| header.anim_data.as_ref()) else {
            return;
        };
        if adt.has_animation() {
            let key = |opcode| OperationKey::new(id, NodeType::Animation, opcode);
            self.entry(key(OperationCode::AnimationEntry));
            self.add(key(OperationCode::AnimationEval));
            self.exit(key(OperationCode::AnimationExit));
            if let Some(action) = adt.action {
                self.build_action(action);
            }
            for track in &adt.nla_tracks {
                self.build_nla_strips(&track.strips);
            }
        }
        for fcurve in &adt.drivers {
            self.add(
                OperationKey::new(id, NodeType::Parameters, OperationCode::Driver)
                    .named(&fcurve.rna_path)
                    .tagged(fcurve.array_index),
            );
            self.build_id_property(id, &fcurve.rna_path);
            let Some(driver) = &fcurve.driver else {
                continue;
            };
            for variable in &driver.variables {
                for target in variable.used_targets() {
                    let Some(target_id) = target.id else {
                        continue;
                    };
                    self.build_id(target_id);
                    self.build_id_property(target_id, &target.rna_path);
                }
            }
        }
    }

    fn build_nla_strips(&mut self, strips: &[NlaStrip]) {
        for strip in strips {
            if let Some(action) = strip.action {
                self.build_action(action);
            }
            self.build_nla_strips(&strip.strips);
        }
    }

    /// Property operation for a driver path naming a custom property.
    fn build_id_property(&mut self, id: IdRef, path: &str) {
        let main = self.main;
        let (owner, rest) = rna::resolve_owner(main, id, path);
        if let Some(name) = canopy_scene::rna::custom_property_name(rest) {
            self.add(
                OperationKey::new(owner, NodeType::Parameters, OperationCode::IdProperty)
                    .named(name),
            );
        }
    }

    fn build_action(&mut self, action: ActionId) {
        if !self.begin(action) {
            return;
        }
        self.build_parameters(action.into());
        self.op(action, NodeType::Animation, OperationCode::AnimationEval);
    }

    /// Builds an object and everything it references.
    pub fn build_object(&mut self, ob: ObjectId) {
        if !self.begin(ob) {
            return;
        }
        let main = self.main;
        let object = main.object(ob);
        let id = IdRef::from(ob);
        self.build_id_common(id);

        self.entry(OperationKey::new(
            ob,
            NodeType::ObjectFromLayer,
            OperationCode::ObjectFromLayerEntry,
        ));
        self.exit(OperationKey::new(
            ob,
            NodeType::ObjectFromLayer,
            OperationCode::ObjectFromLayerExit,
        ));
        self.build_object_transform(ob, object);

        if let Some(parent) = object.parent {
            self.build_object(parent);
        }
        self.build_modifier_targets(&object.modifiers);
        self.build_constraint_targets(&object.constraints);
        if let Some(data) = object.data {
            self.build_object_data(ob, object, data);
        }
        self.build_materials(&object.materials);
        if !object.particle_systems.is_empty() {
            self.build_particle_systems(ob, object);
        }
        if let Some(texture) = object.force_field.as_ref().and_then(|field| field.texture) {
            self.build_texture(texture);
        }
        if let Some(collection) = object.instance_collection {
            self.build_collection(collection);
        }
        if let Some(geometry_set) = &object.geometry_set {
            self.build_geometry_set(geometry_set);
        }
        if has_point_cache(object) {
            self.op(ob, NodeType::PointCache, OperationCode::PointCacheReset);
        }

        self.op(ob, NodeType::Synchronization, OperationCode::SynchronizeToOriginal);
        self.op(ob, NodeType::Visibility, OperationCode::Visibility);
        self.op(ob, NodeType::Instancing, OperationCode::Instance);
        if object.has_geometry_instances() || object.dupli.intersects(DupliFlags::INSTANCERS) {
            self.op(ob, NodeType::Instancing, OperationCode::Instancer);
        }
        self.op(ob, NodeType::Shading, OperationCode::Shading);
        self.op(ob, NodeType::Hierarchy, OperationCode::Hierarchy);
    }

    fn build_object_transform(&mut self, ob: ObjectId, object: &Object) {
        let key = |opcode| OperationKey::new(ob, NodeType::Transform, opcode);
        self.entry(key(OperationCode::TransformInit));
        self.add(key(OperationCode::TransformLocal));
        if object.parent.is_some() {
            self.add(key(OperationCode::TransformParent));
        }
        if !object.constraints.is_empty() {
            self.add(key(OperationCode::TransformConstraints));
        }
        self.add(key(OperationCode::TransformEval));
        self.add(key(OperationCode::TransformSimulationInit));
        self.exit(key(OperationCode::TransformFinal));
    }

    fn build_geometry_set(&mut self, geometry_set: &GeometrySet) {
        let components = [
            geometry_set.mesh.map(IdRef::from),
            geometry_set.curves.map(IdRef::from),
            geometry_set.point_cloud.map(IdRef::from),
            geometry_set.volume.map(IdRef::from),
            geometry_set.grease_pencil.map(IdRef::from),
        ];
        for data in components.into_iter().flatten() {
            self.build_object_data_geometry_datablock(data);
        }
        let Some(instances) = &geometry_set.instances else {
            return;
        };
        for reference in &instances.references {
            match reference {
                InstanceReference::None => {}
                InstanceReference::Object(ob) => self.build_object(*ob),
                InstanceReference::Collection(collection) => self.build_collection(*collection),
                InstanceReference::GeometrySet(nested) => self.build_geometry_set(nested),
            }
        }
    }

    fn build_modifier_targets(&mut self, modifiers: &[Modifier]) {
        for modifier in modifiers {
            for id in modifier_ids(&modifier.kind) {
                self.build_id(id);
            }
        }
    }

    fn build_constraint_targets(&mut self, constraints: &[Constraint]) {
        for con in constraints {
            for target in &con.targets {
                if let Some(ob) = target.object {
                    self.build_object(ob);
                }
            }
            match &con.kind {
                ConstraintKind::Kinematic {
                    pole: Some(pole), ..
                } => {
                    if let Some(ob) = pole.object {
                        self.build_object(ob);
                    }
                }
                ConstraintKind::FollowTrack {
                    clip,
                    depth_object,
                    ..
                } => {
                    if let Some(clip) = clip {
                        self.build_movie_clip(*clip);
                    }
                    if let Some(ob) = depth_object {
                        self.build_object(*ob);
                    }
                }
                ConstraintKind::TransformCache {
                    cache_file: Some(cache_file),
                } => self.build_cache_file(*cache_file),
                _ => {}
            }
        }
    }

    fn build_object_data(&mut self, ob: ObjectId, object: &Object, data: IdRef) {
        match data {
            IdRef::Armature(armature) => self.build_rig(ob, object, armature),
            IdRef::LightProbe(probe) => {
                self.build_light_probe(probe);
                self.op(ob, NodeType::Parameters, OperationCode::LightProbeEval);
            }
            IdRef::Speaker(speaker) => {
                self.build_speaker(speaker);
                self.op(ob, NodeType::Audio, OperationCode::SpeakerEval);
            }
            _ if data.kind().is_geometry() => self.build_object_data_geometry(ob, object, data),
            _ => self.build_id(data),
        }
    }

    fn build_object_data_geometry(&mut self, ob: ObjectId, object: &Object, data: IdRef) {
        let key = |opcode| OperationKey::new(ob, NodeType::Geometry, opcode);
        self.entry(key(OperationCode::GeometryEvalInit));
        for modifier in &object.modifiers {
            self.add(key(OperationCode::Modifier).named(&modifier.name));
        }
        self.add(key(OperationCode::GeometryEval));
        self.exit(key(OperationCode::GeometryEvalDone));
        self.op(ob, NodeType::BatchCache, OperationCode::GeometrySelectUpdate);
        self.build_object_data_geometry_datablock(data);
    }

    fn build_object_data_geometry_datablock(&mut self, data: IdRef) {
        if !self.begin(data) {
            return;
        }
        let main = self.main;
        self.build_id_common(data);
        self.entry(OperationKey::new(data, NodeType::Geometry, OperationCode::GeometryEval));
        self.exit(OperationKey::new(
            data,
            NodeType::Geometry,
            OperationCode::GeometryEvalDone,
        ));
        self.op(data, NodeType::BatchCache, OperationCode::GeometrySelectUpdate);
        if let Some(key) = main.data_key(data) {
            self.build_shapekeys(key);
        }
        match data {
            IdRef::Curve(cu) => {
                let curve = main.curve(cu);
                let objects = [curve.bevel_object, curve.taper_object, curve.text_on_curve];
                for ob in objects.into_iter().flatten() {
                    self.build_object(ob);
                }
            }
            IdRef::Curves(cv) => {
                if let Some(surface) = main.curves(cv).surface {
                    self.build_object(surface);
                }
            }
            _ => {}
        }
        self.build_materials(main.data_materials(data));
    }

    fn build_shapekeys(&mut self, key: KeyId) {
        if !self.begin(key) {
            return;
        }
        let main = self.main;
        self.build_id_common(key.into());
        self.op(key, NodeType::Geometry, OperationCode::GeometryShapekey);
        for block in &main.key(key).blocks {
            self.add(
                OperationKey::new(key, NodeType::Parameters, OperationCode::ParametersEval)
                    .named(&block.name),
            );
        }
    }

    fn build_armature(&mut self, armature: ArmatureId) {
        if !self.begin(armature) {
            return;
        }
        self.build_id_common(armature.into());
        self.op(armature, NodeType::Armature, OperationCode::ArmatureEval);
    }

    fn build_rig(&mut self, ob: ObjectId, object: &Object, armature: ArmatureId) {
        self.build_armature(armature);
        let Some(pose) = &object.pose else {
            return;
        };
        let main = self.main;
        let pose_key = |opcode| OperationKey::new(ob, NodeType::EvalPose, opcode);
        self.entry(pose_key(OperationCode::PoseInit));
        self.add(pose_key(OperationCode::PoseInitIk));
        self.add(pose_key(OperationCode::PoseCleanup));
        self.exit(pose_key(OperationCode::PoseDone));

        for (index, pchan) in pose.channels.iter().enumerate() {
            let bone = |opcode| OperationKey::new(ob, NodeType::Bone, opcode).in_component(&pchan.name);
            self.entry(bone(OperationCode::BoneLocal));
            self.add(bone(OperationCode::BonePoseParent));
            if !pchan.constraints.is_empty() {
                self.add(bone(OperationCode::BoneConstraints));
            }
            self.add(bone(OperationCode::BoneReady));
            self.exit(bone(OperationCode::BoneDone));
            if has_bbone_segments(main, armature, &pchan.name) {
                self.add(bone(OperationCode::BoneSegments));
            }

            for con in pchan.constraints.iter().filter(|con| con.enabled) {
                let solver = match &con.kind {
                    ConstraintKind::Kinematic {
                        chain_length,
                        use_tail,
                        ..
                    } => ik_chain(pose, index, *chain_length, *use_tail)
                        .map(|chain| (OperationCode::PoseIkSolver, chain.root)),
                    ConstraintKind::SplineIk { chain_length } => {
                        spline_ik_chain(pose, index, *chain_length)
                            .map(|chain| (OperationCode::PoseSplineIkSolver, chain.root))
                    }
                    _ => None,
                };
                if let Some((opcode, root)) = solver {
                    self.add(pose_key(opcode).named(&pose.channels[root].name));
                }
            }
            self.build_constraint_targets(&pchan.constraints);
            if let Some(shape) = pchan.custom_shape {
                self.build_object(shape);
            }
        }
    }

    fn build_particle_systems(&mut self, ob: ObjectId, object: &Object) {
        let main = self.main;
        let key = |opcode| OperationKey::new(ob, NodeType::ParticleSystem, opcode);
        self.entry(key(OperationCode::ParticleSystemInit));
        for psys in &object.particle_systems {
            self.add(key(OperationCode::ParticleSystemEval).named(&psys.name));
            let Some(part_id) = psys.settings else {
                continue;
            };
            self.build_particle_settings(part_id);
            let Some(part) = main.get_particle_settings(part_id) else {
                continue;
            };
            if matches!(part.physics, ParticlePhysics::Keyed | ParticlePhysics::Boids) {
                for target in &psys.targets {
                    if let Some(target_ob) = target.object
                        && target_ob != ob
                    {
                        self.build_object(target_ob);
                    }
                }
            }
            match part.render_as {
                ParticleRenderAs::Object => {
                    if let Some(instance) = part.instance_object {
                        self.build_object(instance);
                    }
                }
                ParticleRenderAs::Collection => {
                    if let Some(collection) = part.instance_collection {
                        self.build_collection(collection);
                    }
                }
                _ => {}
            }
        }
        self.exit(key(OperationCode::ParticleSystemDone));
    }

    fn build_particle_settings(&mut self, part_id: ParticleSettingsId) {
        if !self.begin(part_id) {
            return;
        }
        let main = self.main;
        let part = main.particle_settings(part_id);
        self.build_id_common(part_id.into());
        let key = |opcode| OperationKey::new(part_id, NodeType::ParticleSettings, opcode);
        self.add(key(OperationCode::ParticleSettingsInit));
        self.exit(key(OperationCode::ParticleSettingsEval));
        self.entry(key(OperationCode::ParticleSettingsReset));

        for slot in &part.textures {
            if let Some(texture) = slot.texture {
                self.build_texture(texture);
            }
            if let Some(ob) = slot.object {
                self.build_object(ob);
            }
        }
        for rule in &part.boid_rules {
            if let Some(ob) = rule.object {
                self.build_object(ob);
            }
        }
    }

    /// Builds a collection, its objects and its child collections.
    pub fn build_collection(&mut self, collection: CollectionId) {
        if !self.begin(collection) {
            return;
        }
        let main = self.main;
        self.build_collection_nodes(collection);
        let data = main.collection(collection);
        for &ob in &data.objects {
            self.build_object(ob);
        }
        for &child in &data.children {
            self.build_collection(child);
        }
    }

    /// Nodes of the collection itself. Layer collections stop here; their
    /// objects come in through the view layer bases.
    fn build_collection_nodes(&mut self, collection: CollectionId) {
        self.build_id_common(collection.into());
        self.op(collection, NodeType::Hierarchy, OperationCode::Hierarchy);
        self.op(collection, NodeType::Geometry, OperationCode::GeometryEvalDone);
    }

    fn build_materials(&mut self, slots: &[Option<MaterialId>]) {
        for &material in slots.iter().flatten() {
            self.build_material(material);
        }
    }

    fn build_material(&mut self, material: MaterialId) {
        if !self.begin(material) {
            return;
        }
        self.build_id_common(material.into());
        self.op(material, NodeType::Shading, OperationCode::MaterialUpdate);
        if let Some(tree) = self.main.material(material).node_tree {
            self.build_nodetree(tree);
        }
    }

    fn build_nodetree(&mut self, tree: NodeTreeId) {
        if !self.begin(tree) {
            return;
        }
        let main = self.main;
        self.build_id_common(tree.into());
        self.op(tree, NodeType::NTreeOutput, OperationCode::NTreeOutput);
        for node in &main.node_tree(tree).nodes {
            let mut referenced = Vec::new();
            node.properties.for_each_id(&mut |id| referenced.push(id));
            referenced.extend(node.id);
            for id in referenced {
                self.build_id(id);
                // The defocus node reads the scene camera.
                if let IdRef::Scene(scene) = id
                    && let Some(camera) = main.scene(scene).camera
                {
                    self.build_object(camera);
                }
            }
        }
    }

    fn build_texture(&mut self, texture: TextureId) {
        if !self.begin(texture) {
            return;
        }
        let data = self.main.texture(texture);
        self.build_id_common(texture.into());
        self.op(texture, NodeType::GenericDatablock, OperationCode::GenericDatablock);
        if let Some(tree) = data.node_tree {
            self.build_nodetree(tree);
        }
        if let Some(image) = data.image {
            self.build_image(image);
        }
    }

    fn build_image(&mut self, image: ImageId) {
        if !self.begin(image) {
            return;
        }
        self.build_id_common(image.into());
        self.op(image, NodeType::GenericDatablock, OperationCode::GenericDatablock);
        if self.main.image(image).is_sequence {
            self.op(image, NodeType::ImageAnimation, OperationCode::ImageAnimation);
        }
    }

    fn build_world(&mut self, world: WorldId) {
        if !self.begin(world) {
            return;
        }
        self.build_id_common(world.into());
        self.op(world, NodeType::Shading, OperationCode::WorldUpdate);
        if let Some(tree) = self.main.world(world).node_tree {
            self.build_nodetree(tree);
        }
    }

    fn build_light(&mut self, light: LightId) {
        if !self.begin(light) {
            return;
        }
        self.build_id_common(light.into());
        self.op(light, NodeType::Shading, OperationCode::LightUpdate);
        if let Some(tree) = self.main.light(light).node_tree {
            self.build_nodetree(tree);
        }
    }

    fn build_light_probe(&mut self, probe: LightProbeId) {
        if !self.begin(probe) {
            return;
        }
        self.build_id_common(probe.into());
        self.op(probe, NodeType::Parameters, OperationCode::LightProbeEval);
    }

    fn build_camera(&mut self, camera: CameraId) {
        if !self.begin(camera) {
            return;
        }
        self.build_id_common(camera.into());
        if let Some(ob) = self.main.camera(camera).dof_object {
            self.build_object(ob);
        }
    }

    fn build_line_style(&mut self, line_style: LineStyleId) {
        if !self.begin(line_style) {
            return;
        }
        self.build_id_common(line_style.into());
        if let Some(tree) = self.main.line_style(line_style).node_tree {
            self.build_nodetree(tree);
        }
    }

    fn build_speaker(&mut self, speaker: SpeakerId) {
        if !self.begin(speaker) {
            return;
        }
        self.build_id_common(speaker.into());
        self.op(speaker, NodeType::Audio, OperationCode::SpeakerEval);
        if let Some(sound) = self.main.speaker(speaker).sound {
            self.build_sound(sound);
        }
    }

    fn build_sound(&mut self, sound: SoundId) {
        if !self.begin(sound) {
            return;
        }
        self.build_id_common(sound.into());
        self.op(sound, NodeType::Audio, OperationCode::SoundEval);
    }

    fn build_cache_file(&mut self, cache_file: CacheFileId) {
        if !self.begin(cache_file) {
            return;
        }
        self.build_id_common(cache_file.into());
        self.op(cache_file, NodeType::Cache, OperationCode::FileCacheUpdate);
    }

    fn build_mask(&mut self, mask: MaskId) {
        if !self.begin(mask) {
            return;
        }
        let main = self.main;
        self.build_id_common(mask.into());
        self.op(mask, NodeType::Parameters, OperationCode::MaskEval);
        for &parent in &main.mask(mask).point_parents {
            self.build_id(parent);
        }
    }

    fn build_movie_clip(&mut self, clip: MovieClipId) {
        if !self.begin(clip) {
            return;
        }
        self.build_id_common(clip.into());
        self.op(clip, NodeType::Parameters, OperationCode::MovieClipEval);
    }

    fn build_scene_parameters(&mut self, scene: SceneId) {
        if !self.main.contains(scene.into()) {
            return;
        }
        self.build_id_common(scene.into());
        self.op(scene, NodeType::Parameters, OperationCode::SceneEval);
    }

    fn build_scene_compositor(&mut self, scene: SceneId) {
        if self
            .built
            .check_is_built_and_tag(scene.into(), BuildTags::SCENE_COMPOSITOR)
        {
            return;
        }
        if let Some(tree) = self.main.scene(scene).compositor {
            self.build_nodetree(tree);
        }
    }

    fn build_scene_audio(&mut self, scene: SceneId) {
        if self
            .built
            .check_is_built_and_tag(scene.into(), BuildTags::SCENE_AUDIO)
        {
            return;
        }
        let key = |opcode| OperationKey::new(scene, NodeType::Audio, opcode);
        self.entry(key(OperationCode::AudioEntry));
        self.add(key(OperationCode::AudioVolume));
        self.exit(key(OperationCode::AudioExit));
    }

    fn build_scene_sequencer(&mut self, scene: SceneId) {
        let main = self.main;
        let Some(sequencer) = &main.scene(scene).sequencer else {
            return;
        };
        if self
            .built
            .check_is_built_and_tag(scene.into(), BuildTags::SCENE_SEQUENCER)
        {
            return;
        }
        self.build_scene_audio(scene);
        self.op(scene, NodeType::Sequencer, OperationCode::SequencesEval);
        for strip in &sequencer.strips {
            match strip.kind {
                StripKind::Sound(sound) => self.build_sound(sound),
                StripKind::Scene {
                    scene: strip_scene,
                    use_strips,
                } => {
                    self.build_scene_parameters(strip_scene);
                    if use_strips {
                        self.build_scene_sequencer(strip_scene);
                    }
                    self.build_scene_speakers(strip_scene);
                }
                StripKind::MovieClip(clip) => self.build_movie_clip(clip),
                StripKind::Mask(mask) => self.build_mask(mask),
                StripKind::Effect => {}
            }
        }
    }

    /// Speaker objects of a scene used by a sequencer strip.
    fn build_scene_speakers(&mut self, scene: SceneId) {
        let main = self.main;
        let Some(layer) = main.scene(scene).view_layers.first() else {
            return;
        };
        for base in main.view_layer_bases(layer, self.graph.mode()) {
            if base.visible
                && matches!(main.object(base.object).data, Some(IdRef::Speaker(_)))
            {
                self.build_object(base.object);
            }
        }
    }
}
