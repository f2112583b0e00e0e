// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Objects: transform, parenting, object data and instancing.

use canopy_scene::{
    DupliFlags, GeometrySet, IdRef, InstanceReference, KeyId, Object, ObjectId, ObjectType,
    ParentType, ParticleRenderAs,
};

use smallvec::SmallVec;

use super::{RelationBuilder, comp, op};
use crate::builder::{has_point_cache, modifier_ids};
use crate::key::{NodeKey, NodeType, OperationCode, TimeSourceKey};
use crate::node::{CustomDataMask, EvalFlags};
use crate::relation::RelationFlags;

impl RelationBuilder<'_> {
    /// Wires an object and everything it references.
    pub fn build_object(&mut self, ob: ObjectId) {
        if !self.begin(ob) {
            return;
        }
        let main = self.main;
        let object = main.object(ob);

        let init = op(ob, NodeType::Transform, OperationCode::TransformInit);
        let local = op(ob, NodeType::Transform, OperationCode::TransformLocal);
        let parent_key = op(ob, NodeType::Transform, OperationCode::TransformParent);
        let eval = op(ob, NodeType::Transform, OperationCode::TransformEval);
        let simulation_init = op(ob, NodeType::Transform, OperationCode::TransformSimulationInit);
        let final_key = op(ob, NodeType::Transform, OperationCode::TransformFinal);
        let base_key = if object.parent.is_some() {
            parent_key
        } else {
            local
        };
        self.add_relation(init, local, "Transform Init");

        self.build_object_layer_component_relations(ob);

        if let Some(parent) = object.parent {
            self.build_object(parent);
            self.build_object_parent(ob, object, parent);
            self.add_relation(local, parent_key, "ObLocal -> ObParent");
            self.add_relation(
                comp(parent, NodeType::Hierarchy),
                comp(ob, NodeType::Hierarchy),
                "Parent -> Child Hierarchy",
            );
        }

        self.build_object_modifier_targets(object);

        if object.constraints.is_empty() {
            self.add_relation(base_key, eval, "Eval");
        } else {
            let constraints = op(ob, NodeType::Transform, OperationCode::TransformConstraints);
            self.build_constraints(ob, None, &object.constraints);
            self.add_relation(base_key, constraints, "ObBase-> Constraint Stack");
            self.add_relation(constraints, final_key, "ObConstraints -> Done");
            self.add_relation(constraints, eval, "Constraint -> Transform Eval");
        }
        self.add_relation(eval, simulation_init, "Transform Eval -> Simulation Init");
        self.add_relation(simulation_init, final_key, "Simulation -> Final Transform");

        self.build_id_common(ob.into());
        if let Some(data) = object.data {
            self.build_object_data(ob, object, data);
        }
        self.build_materials(ob, &object.materials);
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
            self.build_geometry_set(ob, geometry_set);
        }
        self.build_object_pointcache(ob, object);

        let synchronize = op(ob, NodeType::Synchronization, OperationCode::SynchronizeToOriginal);
        self.add_relation(final_key, synchronize, "Synchronize to Original");
        self.add_relation(
            comp(ob, NodeType::ObjectFromLayer),
            comp(ob, NodeType::Visibility),
            "Object Visibility",
        );
        self.build_object_instancing(ob, object);
        self.add_relation(
            op(ob, NodeType::Shading, OperationCode::Shading),
            op(ob, NodeType::Instancing, OperationCode::Instance),
            "Shading -> Instance",
        );
        self.add_relation(
            final_key,
            op(ob, NodeType::Instancing, OperationCode::Instance),
            "Transform -> Instance",
        );
    }

    fn build_object_layer_component_relations(&mut self, ob: ObjectId) {
        let entry = op(ob, NodeType::ObjectFromLayer, OperationCode::ObjectFromLayerEntry);
        let exit = op(ob, NodeType::ObjectFromLayer, OperationCode::ObjectFromLayerExit);
        let base_flags = op(ob, NodeType::ObjectFromLayer, OperationCode::ObjectBaseFlags);
        if !self.has_node(base_flags) {
            self.add_relation(entry, exit, "Object from Layer");
            return;
        }
        self.add_relation(entry, base_flags, "Base flags flush Entry");
        self.add_relation(base_flags, exit, "Base flags flush Exit");
        self.add_relation(
            exit,
            op(ob, NodeType::Synchronization, OperationCode::SynchronizeToOriginal),
            "Synchronize to Original",
        );
        if let Some(scene) = self.scene {
            self.add_relation(
                op(scene, NodeType::LayerCollections, OperationCode::ViewLayerEval),
                entry,
                "View Layer flags to Object",
            );
        }
        self.add_relation_with_flags(
            base_flags,
            op(ob, NodeType::BatchCache, OperationCode::GeometrySelectUpdate),
            "Base flags -> Select Update",
            RelationFlags::NO_FLUSH,
        );
    }

    fn build_object_parent(&mut self, ob: ObjectId, object: &Object, parent: ObjectId) {
        let main = self.main;
        let Some(parent_object) = main.get_object(parent) else {
            return;
        };
        let target = op(ob, NodeType::Transform, OperationCode::TransformParent);
        match object.parent_type {
            ParentType::Armature => {
                let parent_transform = comp(parent, NodeType::Transform);
                self.add_relation(parent_transform, target, "Parent Armature Transform");
                if parent_object.kind == ObjectType::Armature {
                    let geometry = comp(ob, NodeType::Geometry);
                    self.add_relation(
                        parent_transform,
                        geometry,
                        "Parent Armature Transform -> Geometry",
                    );
                    self.add_relation(
                        comp(parent, NodeType::EvalPose),
                        geometry,
                        "Parent Armature Pose -> Geometry",
                    );
                    self.add_depends_on_transform_relation(ob, geometry, "Virtual Armature Modifier");
                }
            }
            ParentType::Vertex | ParentType::VertexTriangle => {
                self.add_relation(comp(parent, NodeType::Geometry), target, "Vertex Parent");
                self.add_customdata_mask(parent, CustomDataMask::ORIGINDEX);
                self.add_relation(comp(parent, NodeType::Transform), target, "Vertex Parent TFM");
            }
            ParentType::Bone => {
                if !object.parent_bone.is_empty() {
                    self.add_relation(
                        comp(parent, NodeType::Bone).named(&object.parent_bone),
                        target,
                        "Bone Parent",
                    );
                    self.add_relation(
                        op(parent, NodeType::Transform, OperationCode::TransformFinal),
                        target,
                        "Armature Parent",
                    );
                }
            }
            ParentType::Object => {
                let follows_path = match parent_object.data {
                    Some(IdRef::Curve(cu)) => main.get_curve(cu).is_some_and(|curve| curve.use_path),
                    _ => false,
                };
                if parent_object.kind == ObjectType::Lattice {
                    self.add_relation(
                        comp(parent, NodeType::Transform),
                        target,
                        "Lattice Deform Parent",
                    );
                    self.add_relation(
                        comp(parent, NodeType::Geometry),
                        target,
                        "Lattice Deform Parent Geom",
                    );
                } else if parent_object.kind.is_legacy_curve() && follows_path {
                    self.add_relation(comp(parent, NodeType::Geometry), target, "Curve Follow Parent");
                    self.add_relation(comp(parent, NodeType::Transform), target, "Curve Follow TFM");
                } else {
                    self.add_relation(comp(parent, NodeType::Transform), target, "Parent");
                }
            }
        }
        // Metaballs read the instances of their parent; only the transform
        // is hooked up here.
        if object.kind == ObjectType::MetaBall
            && parent_object.dupli.intersects(DupliFlags::INSTANCERS)
        {
            self.add_relation(comp(parent, NodeType::Geometry), target, "Parent");
        }
        if parent_object.dupli.contains(DupliFlags::VERTS) {
            self.add_customdata_mask(parent, CustomDataMask::ORIGINDEX);
        }
    }

    pub(super) fn add_depends_on_transform_relation<'k>(
        &mut self,
        ob: ObjectId,
        key: impl Into<NodeKey<'k>>,
        description: &'static str,
    ) {
        self.add_relation(
            op(ob, NodeType::Transform, OperationCode::TransformFinal),
            key,
            description,
        );
    }

    fn build_object_modifier_targets(&mut self, object: &Object) {
        for modifier in &object.modifiers {
            for id in modifier_ids(&modifier.kind) {
                self.build_id(id);
            }
        }
    }

    fn build_object_data(&mut self, ob: ObjectId, object: &Object, data: IdRef) {
        match data {
            IdRef::Armature(armature) => self.build_rig(ob, object, armature),
            IdRef::Light(light) => {
                self.build_light(light);
                let light_parameters = comp(light, NodeType::Parameters);
                self.add_relation(
                    light_parameters,
                    comp(ob, NodeType::Parameters),
                    "Light -> Object",
                );
                self.add_relation(
                    light_parameters,
                    op(ob, NodeType::Shading, OperationCode::Shading),
                    "Light -> Object Shading",
                );
            }
            IdRef::Camera(camera) => {
                self.build_camera(camera);
                self.add_relation(
                    comp(camera, NodeType::Parameters),
                    comp(ob, NodeType::Parameters),
                    "Camera -> Object",
                );
            }
            IdRef::LightProbe(probe) => {
                self.build_light_probe(probe);
                self.add_relation(
                    op(probe, NodeType::Parameters, OperationCode::LightProbeEval),
                    op(ob, NodeType::Parameters, OperationCode::LightProbeEval),
                    "Light Probe Update",
                );
            }
            IdRef::Speaker(speaker) => {
                self.build_speaker(speaker);
                self.add_relation(
                    comp(speaker, NodeType::Audio),
                    comp(ob, NodeType::Audio),
                    "Speaker -> Object Audio",
                );
                if let Some(scene) = self.scene {
                    self.add_relation(
                        op(scene, NodeType::Audio, OperationCode::AudioVolume),
                        op(ob, NodeType::Audio, OperationCode::SpeakerEval),
                        "Audio Volume -> Speaker",
                    );
                }
            }
            _ if data.kind().is_geometry() => {
                self.build_object_data_geometry(ob, object, data);
                if object.kind == ObjectType::Font
                    && let IdRef::Curve(cu) = data
                    && let Some(text_on_curve) =
                        self.main.get_curve(cu).and_then(|curve| curve.text_on_curve)
                {
                    self.add_special_eval_flag(text_on_curve, EvalFlags::NEED_CURVE_PATH);
                }
            }
            _ => self.build_id(data),
        }
    }

    fn build_object_data_geometry(&mut self, ob: ObjectId, object: &Object, data: IdRef) {
        let main = self.main;
        let init = op(ob, NodeType::Geometry, OperationCode::GeometryEvalInit);
        let eval = op(ob, NodeType::Geometry, OperationCode::GeometryEval);
        let geometry = comp(ob, NodeType::Geometry);

        self.build_object_data_geometry_datablock(data);
        self.add_relation(
            comp(data, NodeType::Geometry),
            geometry,
            "Object Geometry Base Data",
        );
        if let Some(scene) = self.scene {
            self.add_relation_with_flags(
                op(scene, NodeType::Parameters, OperationCode::SceneEval),
                eval,
                "CoW Relation",
                RelationFlags::NO_FLUSH | RelationFlags::GODMODE,
            );
        }

        let mut previous = init;
        for modifier in &object.modifiers {
            let modifier_key =
                op(ob, NodeType::Geometry, OperationCode::Modifier).named(&modifier.name);
            self.add_relation(previous, modifier_key, "Modifier");
            self.update_modifier_relations(ob, modifier, modifier_key);
            if modifier.kind.depends_on_time() {
                self.add_relation(TimeSourceKey, modifier_key, "Time Source -> Modifier");
            }
            previous = modifier_key;
        }
        self.add_relation(previous, eval, "modifier stack order");
        self.add_relation_with_flags(
            comp(ob, NodeType::Visibility),
            eval,
            "Object Visibility -> Geometry Eval",
            RelationFlags::NO_FLUSH,
        );

        if let Some(key) = main.data_key(data) {
            self.add_relation(
                comp(key, NodeType::Geometry),
                comp(data, NodeType::Geometry),
                "Shapekeys",
            );
            self.build_nested_shapekey(ob.into(), key);
        }

        if let IdRef::Curves(cv) = data
            && let Some(surface) = main.get_curves(cv).and_then(|curves| curves.surface)
        {
            self.add_relation(comp(surface, NodeType::Geometry), init, "Hair Surface Geometry");
            self.add_relation(comp(surface, NodeType::Transform), init, "Hair Surface Transform");
        }

        if object.kind == ObjectType::MetaBall
            && let Some(mom) = main.metaball_basis(ob)
        {
            let mom_geometry = comp(mom, NodeType::Geometry);
            if mom == ob {
                self.add_relation(
                    comp(mom, NodeType::Transform),
                    mom_geometry,
                    "Metaball Motherball Transform -> Geometry",
                );
            } else {
                self.add_relation(geometry, mom_geometry, "Metaball Motherball");
                self.add_relation(comp(ob, NodeType::Transform), mom_geometry, "Metaball Motherball");
            }
        }

        self.add_relation(
            geometry,
            op(ob, NodeType::Synchronization, OperationCode::SynchronizeToOriginal),
            "Synchronize to Original",
        );
        let select = op(ob, NodeType::BatchCache, OperationCode::GeometrySelectUpdate);
        self.add_relation(
            op(data, NodeType::BatchCache, OperationCode::GeometrySelectUpdate),
            select,
            "Data Selection -> Object Selection",
        );
        self.add_relation_with_flags(
            geometry,
            select,
            "Object Geometry -> Select Update",
            RelationFlags::NO_FLUSH,
        );
        self.add_relation(
            geometry,
            op(ob, NodeType::Instancing, OperationCode::Instance),
            "Geometry -> Instance",
        );
    }

    pub(super) fn build_object_data_geometry_datablock(&mut self, data: IdRef) {
        if !self.begin(data) {
            return;
        }
        let main = self.main;
        self.build_id_common(data);
        if let Some(key) = main.data_key(data) {
            self.build_nested_shapekey(data, key);
        }
        let eval = op(data, NodeType::Geometry, OperationCode::GeometryEval);
        let done = op(data, NodeType::Geometry, OperationCode::GeometryEvalDone);
        self.add_relation(eval, done, "ObData Geom Eval Done");

        match data {
            IdRef::Curve(cu) => {
                let curve = main.curve(cu);
                if let Some(bevel) = curve.bevel_object {
                    self.build_object(bevel);
                    self.add_relation(comp(bevel, NodeType::Geometry), eval, "Curve Bevel Geometry");
                    self.add_relation(comp(bevel, NodeType::Transform), eval, "Curve Bevel Transform");
                }
                if let Some(taper) = curve.taper_object {
                    self.build_object(taper);
                    self.add_relation(comp(taper, NodeType::Geometry), eval, "Curve Taper");
                }
                if let Some(text_on_curve) = curve.text_on_curve {
                    self.build_object(text_on_curve);
                    self.add_relation(
                        comp(text_on_curve, NodeType::Geometry),
                        eval,
                        "Text on Curve Geometry",
                    );
                    self.add_relation(
                        comp(text_on_curve, NodeType::Transform),
                        eval,
                        "Text on Curve Transform",
                    );
                }
            }
            IdRef::Curves(cv) => {
                if let Some(surface) = main.curves(cv).surface {
                    self.build_object(surface);
                }
            }
            IdRef::Volume(vo) => {
                if main.volume(vo).is_sequence {
                    self.add_relation(
                        TimeSourceKey,
                        comp(data, NodeType::Geometry),
                        "Volume sequence time",
                    );
                }
            }
            _ => {}
        }
        for &material in main.data_materials(data).iter().flatten() {
            self.build_material(material);
        }
    }

    pub(super) fn build_shapekeys(&mut self, key: KeyId) {
        if !self.begin(key) {
            return;
        }
        let main = self.main;
        self.build_id_common(key.into());
        let geometry = comp(key, NodeType::Geometry);
        let parameters_eval = op(key, NodeType::Parameters, OperationCode::ParametersEval);
        for block in &main.key(key).blocks {
            let block_key = parameters_eval.named(&block.name);
            self.add_relation(block_key, geometry, "Key Block Properties");
            self.add_relation(block_key, parameters_eval, "Key Block Properties");
        }
    }

    fn build_nested_shapekey(&mut self, owner: IdRef, key: KeyId) {
        self.build_shapekeys(key);
        self.build_nested_datablock(owner, key.into(), true);
        if self.main.header(key.into()).is_some_and(|header| header.has_animation()) {
            for data in self.shapekey_users(key) {
                self.add_relation(
                    comp(key, NodeType::Animation),
                    comp(data, NodeType::Geometry),
                    "Shapekey Animation",
                );
            }
        }
    }

    fn shapekey_users(&self, key: KeyId) -> SmallVec<[IdRef; 1]> {
        let main = self.main;
        let meshes = main.meshes().map(|(id, _)| IdRef::Mesh(id));
        let curves = main.curves_legacy().map(|(id, _)| IdRef::Curve(id));
        let lattices = main.lattices().map(|(id, _)| IdRef::Lattice(id));
        meshes
            .chain(curves)
            .chain(lattices)
            .filter(|&data| main.data_key(data) == Some(key))
            .collect()
    }

    fn build_object_pointcache(&mut self, ob: ObjectId, object: &Object) {
        if !has_point_cache(object) {
            return;
        }
        let point_cache = comp(ob, NodeType::PointCache);
        if object.rigid_body {
            self.add_relation(
                point_cache,
                op(ob, NodeType::Transform, OperationCode::TransformSimulationInit),
                "Point Cache -> Rigid Body",
            );
        }
        let has_geometry_cache = !object.particle_systems.is_empty()
            || object.modifiers.iter().any(|md| md.kind.has_point_cache());
        if has_geometry_cache {
            self.add_relation(
                point_cache,
                op(ob, NodeType::Geometry, OperationCode::GeometryEval),
                "Point Cache -> Geometry",
            );
        }
        self.add_relation_with_flags(
            op(ob, NodeType::Transform, OperationCode::TransformEval),
            point_cache,
            "Transform Simulation -> Point Cache",
            RelationFlags::FLUSH_USER_EDIT_ONLY,
        );
        self.add_relation_with_flags(
            op(ob, NodeType::Geometry, OperationCode::GeometryEvalInit),
            point_cache,
            "Geometry Init -> Point Cache",
            RelationFlags::FLUSH_USER_EDIT_ONLY,
        );
    }

    fn build_object_instancing(&mut self, ob: ObjectId, object: &Object) {
        let instancer = op(ob, NodeType::Instancing, OperationCode::Instancer);
        if !self.has_node(instancer) {
            return;
        }
        let main = self.main;
        let mode = self.graph.mode();
        if let Some(collection) = object.instance_collection {
            for (_, member) in main.collection_visible_objects(collection, mode) {
                self.add_relation(
                    op(member, NodeType::Instancing, OperationCode::Instance),
                    instancer,
                    "Instance -> Instancer",
                );
            }
            self.add_relation(
                op(collection, NodeType::Geometry, OperationCode::GeometryEvalDone),
                instancer,
                "Collection -> Instancer",
            );
        }
        for psys in &object.particle_systems {
            let Some(part) = psys.settings.and_then(|part| main.get_particle_settings(part)) else {
                continue;
            };
            match part.render_as {
                ParticleRenderAs::Object => {
                    if let Some(instance) = part.instance_object {
                        self.add_relation(
                            op(instance, NodeType::Instancing, OperationCode::Instance),
                            instancer,
                            "Instance -> Instancer",
                        );
                    }
                }
                ParticleRenderAs::Collection => {
                    if let Some(collection) = part.instance_collection {
                        for (_, member) in main.collection_visible_objects(collection, mode) {
                            self.add_relation(
                                op(member, NodeType::Instancing, OperationCode::Instance),
                                instancer,
                                "Instance -> Instancer",
                            );
                        }
                    }
                }
                _ => {}
            }
        }
        self.add_relation(
            op(ob, NodeType::Geometry, OperationCode::GeometryEvalDone),
            instancer,
            "Geometry -> Instancer",
        );
        self.add_relation(
            op(ob, NodeType::Transform, OperationCode::TransformFinal),
            instancer,
            "Transform -> Instancer",
        );
    }

    fn build_geometry_set(&mut self, ob: ObjectId, geometry_set: &GeometrySet) {
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
        let instancer = op(ob, NodeType::Instancing, OperationCode::Instancer);
        for reference in &instances.references {
            match reference {
                InstanceReference::None => {}
                InstanceReference::Object(instance) => {
                    self.build_object(*instance);
                    self.add_relation(
                        op(*instance, NodeType::Instancing, OperationCode::Instance),
                        instancer,
                        "Instance -> Instancer",
                    );
                }
                InstanceReference::Collection(collection) => {
                    self.build_collection(*collection);
                    self.add_relation(
                        op(*collection, NodeType::Geometry, OperationCode::GeometryEvalDone),
                        instancer,
                        "Collection -> Instancer",
                    );
                }
                InstanceReference::GeometrySet(nested) => self.build_geometry_set(ob, nested),
            }
        }
    }
}
