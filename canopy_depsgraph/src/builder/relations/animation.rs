// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Animation data, actions and drivers.

use alloc::vec::Vec;

use canopy_scene::{
    ActionId, Driver, DriverTarget, FCurve, IdRef, NlaStrip, ObjectType, rna::custom_property_name,
};

use super::{RelationBuilder, comp, op};
use crate::builder::map::BuildTags;
use crate::builder::rna::{RnaPointSource, property_key, resolve_owner, split_collection_item};
use crate::key::{NodeKey, NodeType, OperationCode, OperationKey, TimeSourceKey};
use crate::node::NodeRef;
use crate::relation::RelationFlags;

impl RelationBuilder<'_> {
    /// Animation runs before parameters; drivers run after animation.
    pub(super) fn build_animdata(&mut self, id: IdRef) {
        if self.built.check_is_built_and_tag(id, BuildTags::ANIMATION) {
            return;
        }
        let main = self.main;
        let Some(adt) = main.header(id).and_then(|header| header.anim_data.as_ref()) else {
            return;
        };
        if adt.has_animation() {
            self.build_animdata_curves(id);
            self.add_relation(
                comp(id, NodeType::Animation),
                comp(id, NodeType::Parameters),
                "Animation -> Parameters",
            );
        }
        for fcurve in &adt.drivers {
            let driver_key = driver_key(id, fcurve);
            self.build_driver(id, fcurve, driver_key);
            if adt.has_animation() {
                self.add_relation(
                    comp(id, NodeType::Animation),
                    driver_key,
                    "AnimData Before Drivers",
                );
            }
        }
    }

    fn build_animdata_curves(&mut self, id: IdRef) {
        let main = self.main;
        let Some(adt) = main.header(id).and_then(|header| header.anim_data.as_ref()) else {
            return;
        };
        let entry = op(id, NodeType::Animation, OperationCode::AnimationEntry);
        let eval = op(id, NodeType::Animation, OperationCode::AnimationEval);
        let exit = op(id, NodeType::Animation, OperationCode::AnimationExit);
        self.add_relation(entry, eval, "Init -> Eval");
        self.add_relation(eval, exit, "Eval -> Exit");

        if let Some(action) = adt.action {
            self.build_action(action);
            self.add_relation(
                comp(action, NodeType::Animation),
                comp(id, NodeType::Animation),
                "Action -> Animation",
            );
            self.build_animdata_curves_targets(id, &main.action(action).fcurves);
        }
        for track in &adt.nla_tracks {
            self.build_animdata_nlastrip_targets(id, &track.strips);
        }
    }

    fn build_animdata_nlastrip_targets(&mut self, id: IdRef, strips: &[NlaStrip]) {
        let main = self.main;
        for strip in strips {
            if let Some(action) = strip.action {
                self.build_action(action);
                self.add_relation(
                    comp(action, NodeType::Animation),
                    comp(id, NodeType::Animation),
                    "Action -> Animation",
                );
                self.build_animdata_curves_targets(id, &main.action(action).fcurves);
            } else {
                self.build_animdata_nlastrip_targets(id, &strip.strips);
            }
        }
    }

    /// Animation writes each animated property.
    fn build_animdata_curves_targets(&mut self, id: IdRef, fcurves: &[FCurve]) {
        let main = self.main;
        let adt_key = comp(id, NodeType::Animation);
        for fcurve in fcurves {
            let target = property_key(main, id, &fcurve.rna_path, RnaPointSource::Entry);
            let Some(NodeRef::Operation(operation_to)) = self.graph.resolve_to(&target) else {
                continue;
            };
            // Bones can only start from the pose init.
            if self.graph.opcode(operation_to) == OperationCode::BoneLocal {
                self.add_relation(
                    adt_key,
                    op(id, NodeType::EvalPose, OperationCode::PoseInit),
                    "Animation -> Prop",
                );
                continue;
            }
            self.add_relation(adt_key, target, "Animation -> Prop");

            // Animation writing into a nested entity waits for its copy.
            let target_id = self.graph.operation_owner(operation_to);
            if target_id != id {
                self.add_relation_with_flags(
                    comp(target_id, NodeType::CopyOnEval),
                    adt_key,
                    "Animated CoW -> Animation",
                    RelationFlags::NO_FLUSH,
                );
            }
        }
    }

    pub(super) fn build_action(&mut self, action: ActionId) {
        if !self.begin(action) {
            return;
        }
        self.build_parameters(action.into());
        self.add_relation(
            TimeSourceKey,
            comp(action, NodeType::Animation),
            "TimeSrc -> Animation",
        );
    }

    fn build_driver(&mut self, id: IdRef, fcurve: &FCurve, driver_key: OperationKey<'_>) {
        self.build_driver_data(id, fcurve, driver_key);
        if let Some(driver) = &fcurve.driver {
            self.build_driver_variables(id, fcurve, driver, driver_key);
            if self.driver_depends_on_time(driver) {
                self.add_relation(TimeSourceKey, driver_key, "TimeSrc -> Driver");
            }
        }
    }

    /// The driver writes the property at the end of its path.
    fn build_driver_data(&mut self, id: IdRef, fcurve: &FCurve, driver_key: OperationKey<'_>) {
        let main = self.main;
        let path = fcurve.rna_path.as_str();
        if let IdRef::Armature(armature) = id
            && let Some((bone, rest)) = split_collection_item(path, "bones")
        {
            // Armature bone settings drive the pose bones of every object
            // using the armature.
            let targets_bbone = rest.trim_start_matches('.').starts_with("bbone_");
            let users: Vec<IdRef> = self
                .graph
                .id_nodes()
                .map(|(_, node)| node.id)
                .filter(|node_id| match node_id {
                    IdRef::Object(ob) => main.get_object(*ob).is_some_and(|object| {
                        object.data == Some(IdRef::Armature(armature))
                            && object
                                .pose
                                .as_ref()
                                .is_some_and(|pose| pose.channels.iter().any(|pchan| pchan.name == bone))
                    }),
                    _ => false,
                })
                .collect();
            for user in users {
                let local = op(user, NodeType::Bone, OperationCode::BoneLocal).in_component(bone);
                let segments =
                    op(user, NodeType::Bone, OperationCode::BoneSegments).in_component(bone);
                let target = if targets_bbone && self.has_node(segments) {
                    segments
                } else {
                    local
                };
                self.add_relation(driver_key, target, "Arm Bone -> Drivers");
            }
            return;
        }

        let driven = property_key(main, id, path, RnaPointSource::Entry);
        self.add_relation(driver_key, driven, "Driver -> Driven Property");
        let (owner, _) = resolve_owner(main, id, path);
        if owner != id {
            self.add_relation(
                comp(owner, NodeType::CopyOnEval),
                driver_key,
                "Driven CoW -> Driver",
            );
        }
        if let IdRef::NodeTree(_) = id {
            self.add_relation(
                driver_key,
                comp(id, NodeType::NTreeOutput),
                "Drivers -> NTree Output",
            );
        }
    }

    fn build_driver_variables(
        &mut self,
        id: IdRef,
        fcurve: &FCurve,
        driver: &Driver,
        driver_key: OperationKey<'_>,
    ) {
        let main = self.main;
        let self_key = property_key(main, id, &fcurve.rna_path, RnaPointSource::Entry);
        for variable in &driver.variables {
            for target in variable.used_targets() {
                let Some(target_id) = target.id else {
                    continue;
                };
                if !main.contains(target_id) {
                    continue;
                }
                self.build_id(target_id);

                let armature_object = match target_id {
                    IdRef::Object(ob) => main
                        .get_object(ob)
                        .is_some_and(|object| object.kind == ObjectType::Armature),
                    _ => false,
                };
                if variable.kind.uses_struct_ref() && armature_object && !target.bone.is_empty() {
                    let has_channel = match target_id {
                        IdRef::Object(ob) => main.object(ob).pose.as_ref().is_some_and(|pose| {
                            pose.channels.iter().any(|pchan| pchan.name == target.bone)
                        }),
                        _ => false,
                    };
                    if !has_channel {
                        continue;
                    }
                    let variable_key = op(target_id, NodeType::Bone, OperationCode::BoneDone)
                        .in_component(&target.bone);
                    if self.is_same_bone_dependency(&variable_key.into(), &self_key) {
                        continue;
                    }
                    self.add_relation(variable_key, driver_key, "Bone Target -> Driver");
                } else if variable.kind.uses_struct_ref() {
                    // Reading the transform of the driven entity would be a
                    // cycle.
                    if target_id == id {
                        continue;
                    }
                    self.add_relation(
                        op(target_id, NodeType::Transform, OperationCode::TransformFinal),
                        driver_key,
                        "Target -> Driver",
                    );
                } else if !target.rna_path.is_empty() {
                    let variable_key =
                        property_key(main, target_id, &target.rna_path, RnaPointSource::Exit);
                    if self.is_same_bone_dependency(&variable_key, &self_key) {
                        continue;
                    }
                    self.add_relation(variable_key, driver_key, "RNA Target -> Driver");
                    self.build_driver_id_property(target_id, target);
                }
            }
        }
    }

    /// Custom properties read through a pointer live on the pointed-to entity.
    fn build_driver_id_property(&mut self, id: IdRef, target: &DriverTarget) {
        let (owner, rest) = resolve_owner(self.main, id, &target.rna_path);
        if owner != id && custom_property_name(rest).is_some() {
            self.build_parameters(owner);
        }
    }

    fn driver_depends_on_time(&self, driver: &Driver) -> bool {
        driver.expression_depends_on_time()
            || driver.variables.iter().any(|variable| {
                variable.used_targets().any(|target| {
                    matches!(target.id, Some(IdRef::Scene(_))) && target.rna_path == "frame_current"
                })
            })
    }

    /// A bone reading its own final value from its local stage.
    fn is_same_bone_dependency(&self, from: &NodeKey<'_>, to: &NodeKey<'_>) -> bool {
        let (Some(NodeRef::Operation(op_from)), Some(NodeRef::Operation(op_to))) =
            (self.graph.resolve_from(from), self.graph.resolve_to(to))
        else {
            return false;
        };
        if self.graph.operation(op_from).owner != self.graph.operation(op_to).owner {
            return false;
        }
        matches!(
            self.graph.opcode(op_from),
            OperationCode::BoneDone | OperationCode::BoneReady
        ) && matches!(
            self.graph.opcode(op_to),
            OperationCode::BoneLocal | OperationCode::BonePoseParent
        )
    }
}

fn driver_key<'f>(id: IdRef, fcurve: &'f FCurve) -> OperationKey<'f> {
    OperationKey::new(id, NodeType::Parameters, OperationCode::Driver)
        .named(&fcurve.rna_path)
        .tagged(fcurve.array_index)
}
