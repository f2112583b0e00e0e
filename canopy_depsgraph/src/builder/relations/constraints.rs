// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Constraint stacks of objects and bones.

use canopy_scene::{Constraint, ConstraintKind, IdRef, ObjectId, ObjectType, Pose, ShrinkType};

use super::{RelationBuilder, comp, op};
use crate::builder::pose::{RootMap, has_bbone_segments};
use crate::key::{NodeType, OperationCode, OperationKey, TimeSourceKey};
use crate::node::{CustomDataMask, EvalFlags};

/// The bone owning a constraint stack.
#[derive(Copy, Clone, Debug)]
pub(super) struct BoneScope<'a> {
    pub(super) name: &'a str,
    pub(super) index: usize,
    pub(super) pose: &'a Pose,
    pub(super) roots: &'a RootMap,
}

impl RelationBuilder<'_> {
    /// Wires the targets of `constraints` into the constraint operation of
    /// `owner`, or of the bone in `bone`.
    pub(super) fn build_constraints(
        &mut self,
        owner: ObjectId,
        bone: Option<BoneScope<'_>>,
        constraints: &[Constraint],
    ) {
        let main = self.main;
        let constraint_key = match bone {
            Some(scope) => OperationKey::new(owner, NodeType::Bone, OperationCode::BoneConstraints)
                .in_component(scope.name),
            None => op(owner, NodeType::Transform, OperationCode::TransformConstraints),
        };

        for con in constraints {
            let description = constraint_description(&con.kind);
            match &con.kind {
                ConstraintKind::FollowTrack { .. }
                | ConstraintKind::CameraSolver
                | ConstraintKind::ObjectSolver => {
                    let depends_on_camera = match &con.kind {
                        ConstraintKind::FollowTrack {
                            clip,
                            use_active_clip,
                            track,
                            depth_object,
                        } => {
                            if let Some(depth) = depth_object {
                                self.add_relation(
                                    comp(*depth, NodeType::Transform),
                                    constraint_key,
                                    description,
                                );
                            }
                            (clip.is_some() || *use_active_clip) && !track.is_empty()
                        }
                        ConstraintKind::ObjectSolver => true,
                        _ => false,
                    };
                    if depends_on_camera
                        && let Some(camera) = self
                            .scene
                            .and_then(|scene| main.get_scene(scene))
                            .and_then(|sce| sce.camera)
                    {
                        self.add_relation(
                            comp(camera, NodeType::Transform),
                            constraint_key,
                            description,
                        );
                    }
                    self.add_relation(TimeSourceKey, constraint_key, "TimeSrc -> Animation");
                }
                ConstraintKind::TransformCache { cache_file } => {
                    self.add_relation(TimeSourceKey, constraint_key, "TimeSrc -> Animation");
                    if let Some(cache_file) = cache_file {
                        self.build_cache_file(*cache_file);
                        self.add_relation(
                            comp(*cache_file, NodeType::Cache),
                            constraint_key,
                            description,
                        );
                    }
                }
                _ => self.build_constraint_targets(owner, bone, con, constraint_key),
            }
        }
    }

    fn build_constraint_targets(
        &mut self,
        owner: ObjectId,
        bone: Option<BoneScope<'_>>,
        con: &Constraint,
        constraint_key: OperationKey<'_>,
    ) {
        let main = self.main;
        let description = constraint_description(&con.kind);
        for target in &con.targets {
            let Some(target_ob) = target.object else {
                continue;
            };
            let Some(target_object) = main.get_object(target_ob) else {
                continue;
            };
            self.build_object(target_ob);
            let subtarget = target.subtarget.as_str();

            match &con.kind {
                // Solved on pose level.
                ConstraintKind::Kinematic { .. } | ConstraintKind::SplineIk { .. } => {}
                ConstraintKind::FollowPath | ConstraintKind::ClampTo => {
                    self.add_relation(comp(target_ob, NodeType::Geometry), constraint_key, description);
                    self.add_relation(comp(target_ob, NodeType::Transform), constraint_key, description);
                }
                _ if target_object.kind == ObjectType::Armature && !subtarget.is_empty() => {
                    let mut opcode = bone_target_opcode(owner, target_ob, bone, subtarget);
                    if con.kind == ConstraintKind::Armature {
                        opcode = OperationCode::BoneDone;
                    }
                    if con.use_bbone_shape
                        && let Some(IdRef::Armature(armature)) = target_object.data
                        && has_bbone_segments(main, armature, subtarget)
                    {
                        opcode = OperationCode::BoneSegments;
                    }
                    self.add_relation(
                        OperationKey::new(target_ob, NodeType::Bone, opcode).in_component(subtarget),
                        constraint_key,
                        description,
                    );
                }
                _ if matches!(target_object.kind, ObjectType::Mesh | ObjectType::Lattice)
                    && !subtarget.is_empty() =>
                {
                    // Vertex group targets read deformed vertices in world space.
                    self.add_relation(comp(target_ob, NodeType::Transform), constraint_key, description);
                    self.add_relation(comp(target_ob, NodeType::Geometry), constraint_key, description);
                    self.add_customdata_mask(target_ob, CustomDataMask::MDEFORMVERT);
                }
                ConstraintKind::Shrinkwrap {
                    shrink_type,
                    track_normal,
                    above_surface,
                } => {
                    self.add_relation(comp(target_ob, NodeType::Geometry), constraint_key, description);
                    if target_object.kind == ObjectType::Mesh
                        && *shrink_type != ShrinkType::NearestVertex
                    {
                        if *track_normal || *above_surface || *shrink_type == ShrinkType::Project {
                            self.add_customdata_mask(target_ob, CustomDataMask::NORMAL);
                        }
                        if shrink_type.needs_boundary() {
                            self.add_special_eval_flag(target_ob, EvalFlags::SHRINKWRAP_BOUNDARY);
                        }
                    }
                    self.add_relation(comp(target_ob, NodeType::Transform), constraint_key, description);
                }
                ConstraintKind::GeometryAttribute => {
                    self.add_relation(comp(target_ob, NodeType::Geometry), constraint_key, description);
                    self.add_relation(comp(target_ob, NodeType::Transform), constraint_key, description);
                }
                _ if target_ob == owner => {
                    // A bone reading its own armature is fine; an object reading
                    // itself falls back to its pre-constraint transform.
                    let opcode = if target_object.kind == ObjectType::Armature && bone.is_some() {
                        OperationCode::TransformFinal
                    } else {
                        OperationCode::TransformLocal
                    };
                    self.add_relation(
                        op(target_ob, NodeType::Transform, opcode),
                        constraint_key,
                        description,
                    );
                }
                _ => {
                    self.add_relation(
                        op(target_ob, NodeType::Transform, OperationCode::TransformFinal),
                        constraint_key,
                        description,
                    );
                }
            }

            // These read the world matrix of the target.
            if matches!(
                con.kind,
                ConstraintKind::CopyRotation
                    | ConstraintKind::CopyScale
                    | ConstraintKind::CopyLocation
                    | ConstraintKind::CopyTransforms
            ) {
                self.add_relation(comp(target_ob, NodeType::Transform), constraint_key, description);
            }
        }
    }
}

/// Stage of a target bone a constraint waits for.
///
/// Inside one armature, bones solved by the same IK chain read the
/// pre-solver result to keep the chain evaluable.
fn bone_target_opcode(
    owner: ObjectId,
    target: ObjectId,
    bone: Option<BoneScope<'_>>,
    subtarget: &str,
) -> OperationCode {
    if target == owner
        && let Some(scope) = bone
        && let Some(sub_index) = scope.pose.channels.iter().position(|pchan| pchan.name == subtarget)
        && scope.roots.has_common_root(scope.index, sub_index)
    {
        return OperationCode::BoneReady;
    }
    OperationCode::BoneDone
}

fn constraint_description(kind: &ConstraintKind) -> &'static str {
    match kind {
        ConstraintKind::CopyLocation => "Copy Location",
        ConstraintKind::CopyRotation => "Copy Rotation",
        ConstraintKind::CopyScale => "Copy Scale",
        ConstraintKind::CopyTransforms => "Copy Transforms",
        ConstraintKind::ChildOf => "Child Of",
        ConstraintKind::TrackTo => "Track To",
        ConstraintKind::DampedTrack => "Damped Track",
        ConstraintKind::LockedTrack => "Locked Track",
        ConstraintKind::LimitDistance => "Limit Distance",
        ConstraintKind::StretchTo => "Stretch To",
        ConstraintKind::Transform => "Transformation",
        ConstraintKind::Action => "Action",
        ConstraintKind::Armature => "Armature",
        ConstraintKind::FollowPath => "Follow Path",
        ConstraintKind::ClampTo => "Clamp To",
        ConstraintKind::GeometryAttribute => "Geometry Attribute",
        ConstraintKind::Pivot => "Pivot",
        ConstraintKind::Shrinkwrap { .. } => "Shrinkwrap",
        ConstraintKind::Kinematic { .. } => "IK",
        ConstraintKind::SplineIk { .. } => "Spline IK",
        ConstraintKind::FollowTrack { .. } => "Follow Track",
        ConstraintKind::CameraSolver => "Camera Solver",
        ConstraintKind::ObjectSolver => "Object Solver",
        ConstraintKind::TransformCache { .. } => "Transform Cache",
        ConstraintKind::LimitLocation => "Limit Location",
        ConstraintKind::LimitRotation => "Limit Rotation",
        ConstraintKind::LimitScale => "Limit Scale",
        ConstraintKind::MaintainVolume => "Maintain Volume",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use canopy_scene::{ConstraintTarget, Main, Object, PoseChannel};

    fn chain(target: ObjectId) -> Pose {
        let mut pose = Pose::default();
        pose.channels = vec![
            PoseChannel::new("root", None),
            PoseChannel::new("upper", Some(0)),
            PoseChannel::new("lower", Some(1)),
            PoseChannel::new("tip", Some(2)),
            PoseChannel::new("free", None),
        ];
        pose.channels[3].constraints.push(
            Constraint::new(
                "IK",
                ConstraintKind::Kinematic {
                    chain_length: 3,
                    use_tail: true,
                    pole: None,
                },
            )
            .with_target(ConstraintTarget::object(target)),
        );
        pose
    }

    fn scope<'a>(pose: &'a Pose, roots: &'a RootMap, index: usize) -> BoneScope<'a> {
        BoneScope {
            name: &pose.channels[index].name,
            index,
            pose,
            roots,
        }
    }

    #[test]
    fn same_chain_targets_read_ready() {
        let mut main = Main::new();
        let rig = main.add_object(Object::new("Rig", ObjectType::Armature));
        let other = main.add_object(Object::new("Other", ObjectType::Armature));
        let pose = chain(other);
        let mut roots = RootMap::default();
        for bone in [3, 2, 1] {
            roots.add_bone(bone, 1);
        }
        let bone = |index| Some(scope(&pose, &roots, index));

        assert_eq!(bone_target_opcode(rig, rig, bone(2), "upper"), OperationCode::BoneReady);
        assert_eq!(
            bone_target_opcode(rig, rig, bone(4), "upper"),
            OperationCode::BoneDone,
            "free bone is outside the chain"
        );
        assert_eq!(
            bone_target_opcode(rig, other, bone(2), "upper"),
            OperationCode::BoneDone,
            "other armature"
        );
        assert_eq!(bone_target_opcode(rig, rig, None, "upper"), OperationCode::BoneDone);
    }
}
