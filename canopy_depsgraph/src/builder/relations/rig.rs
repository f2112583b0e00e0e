// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pose evaluation of armature objects.
//!
//! Every bone runs `Local -> Pose Parent -> [Constraints] -> Ready -> Done`.
//! IK solvers sit between `Ready` and `Done` of the bones they solve, and
//! relations between bones of one chain read `Ready` so the solver can run.

use canopy_scene::{
    ArmatureId, Constraint, ConstraintKind, ConstraintTarget, IkSolver, Object, ObjectId,
    ObjectType, Pose,
};

use super::constraints::BoneScope;
use super::{RelationBuilder, comp, op};
use crate::builder::pose::{IkChain, RootMap, has_bbone_segments, ik_chain, spline_ik_chain};
use crate::key::{NodeType, OperationCode, OperationKey};
use crate::node::{CustomDataMask, EvalFlags};
use crate::relation::RelationFlags;

fn bone_key(ob: ObjectId, bone: &str, opcode: OperationCode) -> OperationKey<'_> {
    OperationKey::new(ob, NodeType::Bone, opcode).in_component(bone)
}

impl RelationBuilder<'_> {
    pub(super) fn build_rig(&mut self, ob: ObjectId, object: &Object, armature: ArmatureId) {
        let main = self.main;
        let pose_init = op(ob, NodeType::EvalPose, OperationCode::PoseInit);
        let pose_init_ik = op(ob, NodeType::EvalPose, OperationCode::PoseInitIk);
        let pose_cleanup = op(ob, NodeType::EvalPose, OperationCode::PoseCleanup);
        let pose_done = op(ob, NodeType::EvalPose, OperationCode::PoseDone);

        self.add_relation(
            comp(ob, NodeType::Transform),
            pose_init,
            "Local Transform -> Pose Init",
        );
        self.add_relation(pose_init, pose_init_ik, "Pose Init -> Pose Init IK");
        self.add_relation(pose_init_ik, pose_done, "Pose Init IK -> Pose Cleanup");
        self.build_armature(armature);
        self.add_relation(
            op(armature, NodeType::Armature, OperationCode::ArmatureEval),
            pose_init,
            "Data dependency",
        );
        // Cleanup runs even without bones.
        self.add_relation(pose_init, pose_cleanup, "Init -> Cleanup");

        let Some(pose) = &object.pose else {
            return;
        };

        // Solvers go first: bone relations below depend on which bones share
        // a chain.
        let mut roots = RootMap::default();
        let mut pose_depends_on_local_transform = false;
        for (index, pchan) in pose.channels.iter().enumerate() {
            for con in &pchan.constraints {
                match &con.kind {
                    ConstraintKind::Kinematic { .. } => {
                        self.build_ik_pose(ob, pose, index, con, &mut roots);
                        pose_depends_on_local_transform = true;
                    }
                    ConstraintKind::SplineIk { .. } => {
                        self.build_splineik_pose(ob, pose, index, con, &mut roots);
                        pose_depends_on_local_transform = true;
                    }
                    ConstraintKind::CopyRotation
                    | ConstraintKind::CopyScale
                    | ConstraintKind::CopyLocation
                    | ConstraintKind::CopyTransforms => pose_depends_on_local_transform = true,
                    _ => {}
                }
            }
        }
        if pose_depends_on_local_transform {
            self.add_relation(
                comp(ob, NodeType::Transform),
                comp(ob, NodeType::EvalPose),
                "Local Transforms",
            );
        }

        for (index, pchan) in pose.channels.iter().enumerate() {
            let name = pchan.name.as_str();
            let local = bone_key(ob, name, OperationCode::BoneLocal);
            let pose_parent = bone_key(ob, name, OperationCode::BonePoseParent);
            let ready = bone_key(ob, name, OperationCode::BoneReady);
            let done = bone_key(ob, name, OperationCode::BoneDone);

            pchan.properties.for_each_id(&mut |id| self.build_id(id));
            self.add_relation_with_flags(
                pose_init,
                local,
                "Pose Init - Bone Local",
                RelationFlags::GODMODE,
            );
            self.add_relation(local, pose_parent, "Bone Local - Bone Pose");

            if let Some(parent_index) = pchan.parent
                && let Some(parent) = pose.channels.get(parent_index)
            {
                // Bones of one chain are solved together, so a child only
                // waits for the pre-solver result of its parent.
                let opcode = if roots.has_common_root(index, parent_index) {
                    OperationCode::BoneReady
                } else {
                    OperationCode::BoneDone
                };
                self.add_relation_with_flags(
                    bone_key(ob, &parent.name, opcode),
                    pose_parent,
                    "Parent Bone -> Child Bone",
                    RelationFlags::GODMODE,
                );
            }

            if pchan.constraints.is_empty() {
                self.add_relation(pose_parent, ready, "Pose -> Ready");
            } else {
                let scope = BoneScope {
                    name,
                    index,
                    pose,
                    roots: &roots,
                };
                self.build_constraints(ob, Some(scope), &pchan.constraints);
                let constraints = bone_key(ob, name, OperationCode::BoneConstraints);
                self.add_relation(pose_parent, constraints, "Pose -> Constraints Stack");
                self.add_relation(local, constraints, "Local -> Constraints Stack");
                self.add_relation(constraints, ready, "Constraints -> Ready");
            }

            // For IK chains the solver also feeds `Done`; transitive
            // reduction drops this one.
            self.add_relation(ready, done, "Ready -> Done");

            if has_bbone_segments(main, armature, name) {
                let segments = bone_key(ob, name, OperationCode::BoneSegments);
                self.add_relation(done, segments, "Done -> B-Bone Segments");
                if let Some(prev) = pchan.bbone_prev.and_then(|prev| pose.channels.get(prev)) {
                    self.add_relation(
                        bone_key(ob, &prev.name, OperationCode::BoneDone),
                        segments,
                        "Prev Handle -> B-Bone Segments",
                    );
                }
                if let Some(next) = pchan.bbone_next.and_then(|next| pose.channels.get(next)) {
                    self.add_relation(
                        bone_key(ob, &next.name, OperationCode::BoneDone),
                        segments,
                        "Next Handle -> B-Bone Segments",
                    );
                }
                self.add_relation_with_flags(
                    segments,
                    pose_done,
                    "PoseEval Result-Bone Link",
                    RelationFlags::GODMODE,
                );
                self.add_relation(segments, pose_cleanup, "Cleanup dependency");
            } else {
                self.add_relation(done, pose_done, "PoseEval Result-Bone Link");
                self.add_relation(done, pose_cleanup, "Done -> Cleanup");
                self.add_relation(ready, pose_cleanup, "Ready -> Cleanup");
            }

            if let Some(shape) = pchan.custom_shape {
                self.build_object(shape);
            }
        }
    }

    fn build_ik_pose(
        &mut self,
        ob: ObjectId,
        pose: &Pose,
        tip: usize,
        con: &Constraint,
        roots: &mut RootMap,
    ) {
        // Disabled IK is added back temporarily by interactive tools.
        if !con.enabled {
            return;
        }
        let ConstraintKind::Kinematic {
            chain_length,
            use_tail,
            pole,
        } = &con.kind
        else {
            return;
        };
        let Some(IkChain { bones, root }) = ik_chain(pose, tip, *chain_length, *use_tail) else {
            return;
        };
        let tip_name = pose.channels[tip].name.as_str();
        let root_name = pose.channels[root].name.as_str();
        let init_ik = op(ob, NodeType::EvalPose, OperationCode::PoseInitIk);
        let solver = op(ob, NodeType::EvalPose, OperationCode::PoseIkSolver).named(root_name);

        // Only one Init IK exists per armature, so this link is only made
        // when the tree really has to be rebuilt.
        let is_itasc = pose.ik_solver == IkSolver::Itasc;
        if is_itasc || self.is_constraint_animated(ob, tip_name, &con.name) {
            self.add_relation(
                bone_key(ob, tip_name, OperationCode::BoneLocal),
                init_ik,
                "IK Constraint -> Init IK Tree",
            );
        }
        self.add_relation(init_ik, solver, "Init IK -> IK Solver");
        self.add_relation_with_flags(
            solver,
            op(ob, NodeType::EvalPose, OperationCode::PoseCleanup),
            "IK Solver -> Cleanup",
            RelationFlags::GODMODE,
        );

        // iTaSC reads target transforms while building its tree.
        let target_dependent = if is_itasc { init_ik } else { solver };
        if let Some(target) = con.targets.first() {
            self.build_ik_target(ob, target, target_dependent);
            if target.object == Some(ob)
                && let Some(sub) = pose.find_channel(&target.subtarget)
            {
                // Keep the target's own constraints off the chain it drives.
                roots.add_bone(sub, root);
            }
        }
        if let Some(pole) = pole {
            self.build_ik_target(ob, pole, target_dependent);
        }

        let first = bones[0];
        self.add_relation(
            bone_key(ob, &pose.channels[first].name, OperationCode::BoneReady),
            solver,
            "IK Solver Owner",
        );
        for &bone in &bones {
            let name = pose.channels[bone].name.as_str();
            if bone == tip {
                self.add_relation(
                    solver,
                    bone_key(ob, name, OperationCode::BoneDone),
                    "IK Solver Result",
                );
            } else {
                self.add_relation(
                    bone_key(ob, name, OperationCode::BoneReady),
                    solver,
                    "IK Chain Parent",
                );
                self.add_relation(
                    solver,
                    bone_key(ob, name, OperationCode::BoneDone),
                    "IK Chain Result",
                );
            }
            roots.add_bone(bone, root);
        }
        self.add_relation(
            solver,
            op(ob, NodeType::EvalPose, OperationCode::PoseDone),
            "PoseEval Result-Bone Link",
        );
        self.build_inter_ik_chains(ob, pose, solver, root, roots);
    }

    fn build_ik_target(
        &mut self,
        ob: ObjectId,
        target: &ConstraintTarget,
        dependent: OperationKey<'_>,
    ) {
        let main = self.main;
        let description = "IK Target";
        let Some(target_ob) = target.object else {
            return;
        };
        let Some(target_object) = main.get_object(target_ob) else {
            return;
        };
        self.build_object(target_ob);
        if target_ob != ob {
            self.add_relation(comp(target_ob, NodeType::Transform), dependent, description);
            self.add_relation_with_flags(
                comp(target_ob, NodeType::CopyOnEval),
                op(ob, NodeType::EvalPose, OperationCode::PoseInitIk),
                "IK Target CoW -> Init IK Tree",
                RelationFlags::CHECK_BEFORE_ADD,
            );
        }
        if target.subtarget.is_empty() {
            return;
        }
        match target_object.kind {
            ObjectType::Armature => {
                self.add_relation(
                    bone_key(target_ob, &target.subtarget, OperationCode::BoneDone),
                    dependent,
                    description,
                );
            }
            ObjectType::Mesh | ObjectType::Lattice => {
                self.add_relation(comp(target_ob, NodeType::Geometry), dependent, description);
                self.add_customdata_mask(target_ob, CustomDataMask::MDEFORMVERT);
            }
            _ => {}
        }
    }

    fn build_splineik_pose(
        &mut self,
        ob: ObjectId,
        pose: &Pose,
        tip: usize,
        con: &Constraint,
        roots: &mut RootMap,
    ) {
        if !con.enabled {
            return;
        }
        let ConstraintKind::SplineIk { chain_length } = &con.kind else {
            return;
        };
        let Some(IkChain { bones, root }) = spline_ik_chain(pose, tip, *chain_length) else {
            return;
        };
        let tip_name = pose.channels[tip].name.as_str();
        let solver =
            op(ob, NodeType::EvalPose, OperationCode::PoseSplineIkSolver).named(&pose.channels[root].name);

        self.add_relation(
            op(ob, NodeType::EvalPose, OperationCode::PoseInitIk),
            solver,
            "Init IK -> IK Solver",
        );
        self.add_relation(
            solver,
            op(ob, NodeType::EvalPose, OperationCode::PoseCleanup),
            "IK Solver -> Cleanup",
        );
        self.add_relation_with_flags(
            bone_key(ob, tip_name, OperationCode::BoneReady),
            solver,
            "Spline IK Solver Owner",
            RelationFlags::GODMODE,
        );

        if let Some(curve) = con.targets.first().and_then(|target| target.object) {
            self.build_object(curve);
            self.add_relation(
                comp(curve, NodeType::Geometry),
                solver,
                "Curve.Path -> Spline IK",
            );
            self.add_relation(
                comp(curve, NodeType::Transform),
                solver,
                "Curve.Transform -> Spline IK",
            );
            self.add_special_eval_flag(curve, EvalFlags::NEED_CURVE_PATH);
        }

        self.add_relation(
            solver,
            bone_key(ob, tip_name, OperationCode::BoneDone),
            "Spline IK Result",
        );
        roots.add_bone(tip, root);
        for &bone in bones.iter().skip(1) {
            let name = pose.channels[bone].name.as_str();
            self.add_relation(
                bone_key(ob, name, OperationCode::BoneReady),
                solver,
                "Spline IK Solver Update",
            );
            self.add_relation(
                solver,
                bone_key(ob, name, OperationCode::BoneDone),
                "Spline IK Solver Result",
            );
            roots.add_bone(bone, root);
        }
        self.add_relation(
            solver,
            op(ob, NodeType::EvalPose, OperationCode::PoseDone),
            "PoseEval Result-Bone Link",
        );
        self.build_inter_ik_chains(ob, pose, solver, root, roots);
    }

    /// Orders a solver after the chain its root is parented into.
    ///
    /// Walks up from the root while the bones share a chain with it and links
    /// the deepest one found.
    fn build_inter_ik_chains(
        &mut self,
        ob: ObjectId,
        pose: &Pose,
        solver: OperationKey<'_>,
        root: usize,
        roots: &RootMap,
    ) {
        let deepest_root = pose
            .parent_chain(root)
            .skip(1)
            .take_while(|&parent| roots.has_common_root(root, parent))
            .last();
        if let Some(deepest) = deepest_root {
            self.add_relation(
                bone_key(ob, &pose.channels[deepest].name, OperationCode::BoneDone),
                solver,
                "IK Chain Overlap",
            );
        }
    }

    /// Returns `true` if animation or drivers of `ob` write a setting of the
    /// constraint `con_name` on the bone `bone`.
    fn is_constraint_animated(&self, ob: ObjectId, bone: &str, con_name: &str) -> bool {
        let main = self.main;
        let Some(adt) = main
            .get_object(ob)
            .and_then(|object| object.id.anim_data.as_ref())
        else {
            return false;
        };
        let targets_constraint = |path: &str| {
            path.strip_prefix("pose.bones[\"")
                .and_then(|rest| rest.strip_prefix(bone))
                .and_then(|rest| rest.strip_prefix("\"].constraints[\""))
                .and_then(|rest| rest.strip_prefix(con_name))
                .is_some_and(|rest| rest.starts_with("\"]"))
        };
        let animated = adt.action.and_then(|action| main.get_action(action)).is_some_and(|action| {
            action
                .fcurves
                .iter()
                .any(|fcurve| targets_constraint(&fcurve.rna_path))
        });
        animated || adt.drivers.iter().any(|fcurve| targets_constraint(&fcurve.rna_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NodeBuilder;
    use crate::graph::Depsgraph;
    use canopy_scene::{Action, AnimData, Armature, Bone, EvalMode, FCurve, Main, PoseChannel};

    fn rig() -> (Main, ObjectId) {
        let mut main = Main::new();
        let armature = main.add_armature(Armature {
            bones: ["root", "upper", "lower", "hand"]
                .into_iter()
                .map(|name| Bone {
                    name: name.into(),
                    segments: 1,
                })
                .collect(),
            ..Armature::default()
        });
        let mut object = Object::new("Rig", ObjectType::Armature);
        object.data = Some(armature.into());
        let mut pose = Pose::default();
        pose.channels.push(PoseChannel::new("root", None));
        pose.channels.push(PoseChannel::new("upper", Some(0)));
        pose.channels.push(PoseChannel::new("lower", Some(1)));
        pose.channels.push(PoseChannel::new("hand", Some(2)));
        pose.channels[3].constraints.push(Constraint::new(
            "IK",
            ConstraintKind::Kinematic {
                chain_length: 2,
                use_tail: true,
                pole: None,
            },
        ));
        object.pose = Some(pose);
        let ob = main.add_object(object);
        (main, ob)
    }

    fn build(main: &Main, ob: ObjectId) -> Depsgraph {
        let mut graph = Depsgraph::new(EvalMode::Viewport);
        NodeBuilder::new(main, &mut graph).build_object(ob);
        RelationBuilder::new(main, &mut graph).build_object(ob);
        graph
    }

    #[test]
    fn ik_chain_links_through_solver() {
        let (main, ob) = rig();
        let graph = build(&main, ob);
        let solver = OperationKey::new(ob, NodeType::EvalPose, OperationCode::PoseIkSolver)
            .named("lower");

        assert!(
            graph
                .relation_between(bone_key(ob, "lower", OperationCode::BoneReady), solver)
                .is_some(),
            "chain bones feed the solver"
        );
        assert!(
            graph
                .relation_between(solver, bone_key(ob, "hand", OperationCode::BoneDone))
                .is_some(),
            "solver writes the tip"
        );
        // Inside the chain the child waits for the pre-solver result.
        assert!(
            graph
                .relation_between(
                    bone_key(ob, "lower", OperationCode::BoneReady),
                    bone_key(ob, "hand", OperationCode::BonePoseParent),
                )
                .is_some(),
            "in-chain parent reads Ready"
        );
        assert!(
            graph
                .relation_between(
                    bone_key(ob, "upper", OperationCode::BoneDone),
                    bone_key(ob, "lower", OperationCode::BonePoseParent),
                )
                .is_some(),
            "chain root reads the finished parent"
        );
    }

    #[test]
    fn constraint_animation_detected_by_path() {
        let (mut main, ob) = rig();
        let action = main.add_action(Action {
            fcurves: alloc::vec![FCurve {
                rna_path: "pose.bones[\"hand\"].constraints[\"IK\"].influence".into(),
                ..FCurve::default()
            }],
            ..Action::default()
        });
        main.object_mut(ob).id.anim_data = Some(AnimData {
            action: Some(action),
            ..AnimData::default()
        });
        let mut graph = Depsgraph::new(EvalMode::Viewport);
        let builder = RelationBuilder::new(&main, &mut graph);
        assert!(builder.is_constraint_animated(ob, "hand", "IK"));
        assert!(!builder.is_constraint_animated(ob, "hand", "IK.001"));
        assert!(!builder.is_constraint_animated(ob, "lower", "IK"));
    }
}
