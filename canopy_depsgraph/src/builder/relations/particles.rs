// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Particle systems and the physics they interact with.

use alloc::vec::Vec;

use canopy_scene::{
    CollectionId, ModifierKind, Object, ObjectId, ObjectType, ParticleKind, ParticlePhysics,
    ParticleRenderAs, ParticleSettingsId, ParticleSystem,
};

use super::{RelationBuilder, comp, op};
use crate::builder::has_point_cache;
use crate::key::{NodeType, OperationCode, OperationKey};
use crate::relation::RelationFlags;

impl RelationBuilder<'_> {
    pub(super) fn build_particle_systems(&mut self, ob: ObjectId, object: &Object) {
        if object.particle_systems.is_empty() {
            return;
        }
        let main = self.main;
        let geometry_eval = op(ob, NodeType::Geometry, OperationCode::GeometryEval);
        let init = op(ob, NodeType::ParticleSystem, OperationCode::ParticleSystemInit);
        let done = op(ob, NodeType::ParticleSystem, OperationCode::ParticleSystemDone);

        if has_point_cache(object) {
            self.add_relation_with_flags(
                comp(ob, NodeType::ParticleSystem),
                comp(ob, NodeType::PointCache),
                "Particle Point Cache",
                RelationFlags::FLUSH_USER_EDIT_ONLY,
            );
        }

        for psys in &object.particle_systems {
            let psys_key =
                op(ob, NodeType::ParticleSystem, OperationCode::ParticleSystemEval).named(&psys.name);
            self.add_relation(init, psys_key, "Init -> PSys");
            self.add_relation(psys_key, done, "PSys -> Done");
            self.add_relation(psys_key, geometry_eval, "PSys -> UberEval");

            let Some(part_id) = psys.settings else {
                continue;
            };
            self.build_particle_settings(part_id);
            let Some(part) = main.get_particle_settings(part_id) else {
                continue;
            };
            self.add_relation(
                op(part_id, NodeType::ParticleSettings, OperationCode::ParticleSettingsEval),
                init,
                "Particle Settings Change",
            );

            if part.kind != ParticleKind::Hair {
                self.build_collision_relations(
                    ob,
                    part.collision_collection,
                    psys_key,
                    "Particle Collision",
                );
            } else if psys.hair_dynamics {
                self.build_collision_relations(
                    ob,
                    part.collision_collection,
                    psys_key,
                    "Hair Collision",
                );
            }
            self.build_effector_relations(ob, part.effector_collection, psys_key, "Particle Field");

            for rule_ob in part.boid_rules.iter().filter_map(|rule| rule.object) {
                self.add_relation(comp(rule_ob, NodeType::Transform), psys_key, "Boid Rule");
            }

            if matches!(part.physics, ParticlePhysics::Keyed | ParticlePhysics::Boids) {
                for target_ob in psys.targets.iter().filter_map(|target| target.object) {
                    if target_ob == ob {
                        continue;
                    }
                    self.build_object(target_ob);
                    // Particles are evaluated as part of the geometry.
                    self.add_relation(comp(target_ob, NodeType::Geometry), psys_key, "Keyed Target");
                }
            }

            match part.render_as {
                ParticleRenderAs::Object => {
                    if let Some(instance) = part.instance_object {
                        self.build_object(instance);
                        self.build_particle_visualization_object(ob, psys, instance);
                    }
                }
                ParticleRenderAs::Collection => {
                    if let Some(collection) = part.instance_collection {
                        self.build_collection(collection);
                        for &member in &main.collection(collection).objects {
                            self.build_particle_visualization_object(ob, psys, member);
                        }
                    }
                }
                _ => {}
            }
        }

        self.add_depends_on_transform_relation(ob, geometry_eval, "Particle Eval");
        self.add_relation(comp(ob, NodeType::Transform), geometry_eval, "Particle Eval");
        let reset = op(ob, NodeType::PointCache, OperationCode::PointCacheReset);
        self.add_relation_with_flags(
            comp(ob, NodeType::Transform),
            reset,
            "Transform -> Point Cache Reset",
            RelationFlags::GODMODE,
        );
        self.add_relation_with_flags(
            reset,
            geometry_eval,
            "Point Cache Reset -> UberEval",
            RelationFlags::GODMODE,
        );
    }

    fn build_particle_visualization_object(
        &mut self,
        ob: ObjectId,
        psys: &ParticleSystem,
        draw_object: ObjectId,
    ) {
        let psys_key =
            op(ob, NodeType::ParticleSystem, OperationCode::ParticleSystemEval).named(&psys.name);
        self.add_relation(
            comp(draw_object, NodeType::Transform),
            psys_key,
            "Particle Object Visualization",
        );
        if self
            .main
            .get_object(draw_object)
            .is_some_and(|object| object.kind == ObjectType::MetaBall)
        {
            self.add_relation(
                op(ob, NodeType::Geometry, OperationCode::GeometryEval),
                comp(draw_object, NodeType::Geometry),
                "Particle MBall Visualization",
            );
        }
    }

    pub(super) fn build_particle_settings(&mut self, part_id: ParticleSettingsId) {
        if !self.begin(part_id) {
            return;
        }
        let main = self.main;
        let part = main.particle_settings(part_id);
        self.build_id_common(part_id.into());
        let init = op(part_id, NodeType::ParticleSettings, OperationCode::ParticleSettingsInit);
        let eval = op(part_id, NodeType::ParticleSettings, OperationCode::ParticleSettingsEval);
        let reset = op(part_id, NodeType::ParticleSettings, OperationCode::ParticleSettingsReset);
        self.add_relation(init, eval, "Particle Settings Init Order");
        self.add_relation(reset, eval, "Particle Settings Reset");

        for slot in &part.textures {
            let Some(texture) = slot.texture else {
                continue;
            };
            self.build_texture(texture);
            self.add_relation_with_flags(
                comp(texture, NodeType::GenericDatablock),
                reset,
                "Particle Texture",
                RelationFlags::FLUSH_USER_EDIT_ONLY,
            );
            if let Some(space) = slot.object {
                self.build_object(space);
                self.add_relation(comp(space, NodeType::Transform), eval, "Particle Texture Space");
            }
        }
        for rule_ob in part.boid_rules.iter().filter_map(|rule| rule.object) {
            self.build_object(rule_ob);
        }
        if part.id.has_animation() {
            self.add_relation(
                comp(part_id, NodeType::Animation),
                eval,
                "Particle Settings Animation",
            );
        }
    }

    /// Objects with a collision modifier in `collection`, or in the view
    /// layer without one, feed `key`.
    pub(super) fn build_collision_relations(
        &mut self,
        ob: ObjectId,
        collection: Option<CollectionId>,
        key: OperationKey<'_>,
        description: &'static str,
    ) {
        let main = self.main;
        for collider in self.physics_candidates(collection) {
            if collider == ob {
                continue;
            }
            let is_collider = main.get_object(collider).is_some_and(|object| {
                object
                    .modifiers
                    .iter()
                    .any(|modifier| modifier.kind == ModifierKind::Collision)
            });
            if is_collider {
                self.add_relation(comp(collider, NodeType::Transform), key, description);
                self.add_relation(comp(collider, NodeType::Geometry), key, description);
            }
        }
    }

    /// Force fields in `collection`, or in the view layer without one, feed
    /// `key`.
    pub(super) fn build_effector_relations(
        &mut self,
        ob: ObjectId,
        collection: Option<CollectionId>,
        key: OperationKey<'_>,
        description: &'static str,
    ) {
        let main = self.main;
        for effector in self.physics_candidates(collection) {
            if effector == ob {
                continue;
            }
            let Some(field) = main.get_object(effector).and_then(|object| object.force_field.as_ref())
            else {
                continue;
            };
            self.add_relation(comp(effector, NodeType::Transform), key, description);
            if let Some(texture) = field.texture {
                self.build_texture(texture);
                self.add_relation(comp(texture, NodeType::GenericDatablock), key, description);
            }
        }
    }

    fn physics_candidates(&self, collection: Option<CollectionId>) -> Vec<ObjectId> {
        match collection {
            Some(collection) => self
                .main
                .collection_object_cache(collection)
                .into_iter()
                .map(|base| base.object)
                .collect(),
            None => self.bases.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NodeBuilder;
    use crate::graph::Depsgraph;
    use canopy_scene::{EvalMode, IdHeader, Main, Mesh, ParticleSettings};

    #[test]
    fn settings_feed_system_init() {
        let mut main = Main::new();
        let part = main.add_particle_settings(ParticleSettings {
            id: IdHeader::new("Sparks"),
            ..ParticleSettings::default()
        });
        let mesh = main.add_mesh(Mesh {
            id: IdHeader::new("Emitter"),
            ..Mesh::default()
        });
        let mut emitter = Object::new("Emitter", ObjectType::Mesh);
        emitter.data = Some(mesh.into());
        emitter.particle_systems.push(ParticleSystem::new("Sparks", part));
        let ob = main.add_object(emitter);

        let mut graph = Depsgraph::new(EvalMode::Viewport);
        NodeBuilder::new(&main, &mut graph).build_object(ob);
        RelationBuilder::new(&main, &mut graph).build_object(ob);

        let psys = op(ob, NodeType::ParticleSystem, OperationCode::ParticleSystemEval).named("Sparks");
        assert!(
            graph
                .relation_between(
                    op(part, NodeType::ParticleSettings, OperationCode::ParticleSettingsEval),
                    op(ob, NodeType::ParticleSystem, OperationCode::ParticleSystemInit),
                )
                .is_some(),
            "settings changes restart the systems"
        );
        assert!(
            graph
                .relation_between(psys, op(ob, NodeType::Geometry, OperationCode::GeometryEval))
                .is_some(),
            "geometry waits for the particles"
        );
    }
}
