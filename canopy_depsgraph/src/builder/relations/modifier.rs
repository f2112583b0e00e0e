// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependencies declared by modifiers of a stack.

use canopy_scene::{BooleanOperand, Modifier, ModifierKind, ObjectId, ObjectType};

use super::{RelationBuilder, comp, op};
use crate::key::{NodeType, OperationCode, OperationKey};
use crate::node::{CustomDataMask, EvalFlags};

impl RelationBuilder<'_> {
    /// Wires what `modifier` reads into its operation `modifier_key`.
    pub(super) fn update_modifier_relations(
        &mut self,
        ob: ObjectId,
        modifier: &Modifier,
        modifier_key: OperationKey<'_>,
    ) {
        let main = self.main;
        match &modifier.kind {
            ModifierKind::Armature { object: Some(target) } => {
                self.add_relation(comp(*target, NodeType::EvalPose), modifier_key, "Armature Modifier");
                self.add_relation(comp(*target, NodeType::Transform), modifier_key, "Armature Modifier");
                self.add_depends_on_transform_relation(ob, modifier_key, "Armature Modifier");
                self.add_customdata_mask(ob, CustomDataMask::MDEFORMVERT);
            }
            ModifierKind::Lattice { object: Some(target) } => {
                self.add_object_geometry_relation(*target, modifier_key, "Lattice Modifier");
                self.add_depends_on_transform_relation(ob, modifier_key, "Lattice Modifier");
            }
            ModifierKind::Curve { object: Some(target) } => {
                self.add_object_geometry_relation(*target, modifier_key, "Curve Modifier");
                self.add_special_eval_flag(*target, EvalFlags::NEED_CURVE_PATH);
                self.add_depends_on_transform_relation(ob, modifier_key, "Curve Modifier");
            }
            ModifierKind::Hook {
                object: Some(target),
                subtarget,
            } => {
                let is_armature = main
                    .get_object(*target)
                    .is_some_and(|target| target.kind == ObjectType::Armature);
                if is_armature && !subtarget.is_empty() {
                    self.add_relation(
                        op(*target, NodeType::Bone, OperationCode::BoneDone).in_component(subtarget),
                        modifier_key,
                        "Hook Modifier",
                    );
                } else {
                    self.add_relation(comp(*target, NodeType::Transform), modifier_key, "Hook Modifier");
                }
                self.add_depends_on_transform_relation(ob, modifier_key, "Hook Modifier");
            }
            ModifierKind::Array {
                start_cap,
                end_cap,
                offset_object,
                curve,
            } => {
                for cap in [start_cap, end_cap].into_iter().flatten() {
                    self.add_object_geometry_relation(*cap, modifier_key, "Array Modifier Cap");
                }
                if let Some(curve) = curve {
                    self.add_relation(comp(*curve, NodeType::Geometry), modifier_key, "Array Modifier Curve");
                    self.add_special_eval_flag(*curve, EvalFlags::NEED_CURVE_PATH);
                }
                if let Some(offset) = offset_object {
                    self.add_relation(comp(*offset, NodeType::Transform), modifier_key, "Array Modifier Offset");
                }
                if start_cap.is_some() || end_cap.is_some() || offset_object.is_some() {
                    self.add_depends_on_transform_relation(ob, modifier_key, "Array Modifier");
                }
            }
            ModifierKind::Mirror {
                mirror_object: Some(target),
            } => {
                self.add_relation(comp(*target, NodeType::Transform), modifier_key, "Mirror Modifier");
                self.add_depends_on_transform_relation(ob, modifier_key, "Mirror Modifier");
            }
            ModifierKind::Boolean { operand } => {
                match operand {
                    BooleanOperand::Object(target) => {
                        self.add_object_geometry_relation(*target, modifier_key, "Boolean Modifier");
                    }
                    BooleanOperand::Collection(collection) => {
                        self.add_relation(
                            op(*collection, NodeType::Geometry, OperationCode::GeometryEvalDone),
                            modifier_key,
                            "Boolean Modifier",
                        );
                    }
                    BooleanOperand::None => return,
                }
                self.add_depends_on_transform_relation(ob, modifier_key, "Boolean Modifier");
            }
            ModifierKind::Shrinkwrap {
                target,
                auxiliary_target,
            } => {
                for target in [target, auxiliary_target].into_iter().flatten() {
                    self.add_object_geometry_relation(*target, modifier_key, "Shrinkwrap Modifier");
                    self.add_customdata_mask(*target, CustomDataMask::NORMAL);
                }
                if target.is_some() || auxiliary_target.is_some() {
                    self.add_depends_on_transform_relation(ob, modifier_key, "Shrinkwrap Modifier");
                }
            }
            ModifierKind::Displace {
                texture,
                map_object,
            }
            | ModifierKind::Wave {
                texture,
                map_object,
            } => {
                if let Some(texture) = texture {
                    self.build_texture(*texture);
                    self.add_relation(
                        comp(*texture, NodeType::GenericDatablock),
                        modifier_key,
                        "Texture Modifier",
                    );
                }
                if let Some(map_object) = map_object {
                    self.add_relation(
                        comp(*map_object, NodeType::Transform),
                        modifier_key,
                        "Texture Map Object",
                    );
                    self.add_depends_on_transform_relation(ob, modifier_key, "Texture Map Object");
                }
            }
            ModifierKind::MeshDeform { object: Some(target) } => {
                self.add_object_geometry_relation(*target, modifier_key, "Mesh Deform Modifier");
                self.add_depends_on_transform_relation(ob, modifier_key, "Mesh Deform Modifier");
            }
            ModifierKind::SurfaceDeform { target: Some(target) } => {
                self.add_object_geometry_relation(*target, modifier_key, "Surface Deform Modifier");
                self.add_depends_on_transform_relation(ob, modifier_key, "Surface Deform Modifier");
            }
            ModifierKind::DataTransfer { source: Some(source) } => {
                self.add_object_geometry_relation(*source, modifier_key, "Data Transfer Modifier");
                self.add_customdata_mask(*source, CustomDataMask::ORIGINDEX | CustomDataMask::NORMAL);
                self.add_depends_on_transform_relation(ob, modifier_key, "Data Transfer Modifier");
            }
            ModifierKind::Cast { object: Some(target) } => {
                self.add_relation(comp(*target, NodeType::Transform), modifier_key, "Cast Modifier");
                self.add_depends_on_transform_relation(ob, modifier_key, "Cast Modifier");
            }
            ModifierKind::UvProject { projectors } => {
                for &projector in projectors {
                    self.add_relation(comp(projector, NodeType::Transform), modifier_key, "UV Project Modifier");
                }
                if !projectors.is_empty() {
                    self.add_depends_on_transform_relation(ob, modifier_key, "UV Project Modifier");
                }
            }
            ModifierKind::ParticleInstance { object: Some(source) } => {
                self.add_relation(
                    comp(*source, NodeType::ParticleSystem),
                    modifier_key,
                    "Particle Instance Modifier",
                );
                self.add_relation(
                    comp(*source, NodeType::Transform),
                    modifier_key,
                    "Particle Instance Modifier",
                );
            }
            ModifierKind::Nodes {
                node_tree: Some(tree),
            } => {
                self.build_nodetree(*tree);
                self.add_relation(
                    op(*tree, NodeType::NTreeOutput, OperationCode::NTreeOutput),
                    modifier_key,
                    "Nodes Modifier",
                );
                self.add_depends_on_transform_relation(ob, modifier_key, "Nodes Modifier");
            }
            ModifierKind::MeshSequenceCache {
                cache_file: Some(cache_file),
            } => {
                self.build_cache_file(*cache_file);
                self.add_relation(comp(*cache_file, NodeType::Cache), modifier_key, "Cache File");
            }
            ModifierKind::Cloth | ModifierKind::SoftBody => {
                self.build_collision_relations(ob, None, modifier_key, "Cloth Collision");
                self.build_effector_relations(ob, None, modifier_key, "Cloth Field");
                self.add_depends_on_transform_relation(ob, modifier_key, "Cloth Modifier");
            }
            ModifierKind::DynamicPaint => {
                self.build_effector_relations(ob, None, modifier_key, "Dynamic Paint Field");
                self.add_depends_on_transform_relation(ob, modifier_key, "Dynamic Paint Modifier");
            }
            ModifierKind::Fluid => {
                self.build_collision_relations(ob, None, modifier_key, "Fluid Collision");
                self.build_effector_relations(ob, None, modifier_key, "Fluid Force Field");
                self.add_depends_on_transform_relation(ob, modifier_key, "Fluid Modifier");
            }
            ModifierKind::Collision => {
                self.add_depends_on_transform_relation(ob, modifier_key, "Collision Modifier");
            }
            _ => {}
        }
    }

    /// Orders `key` after the transform and geometry of `target`.
    fn add_object_geometry_relation(
        &mut self,
        target: ObjectId,
        key: OperationKey<'_>,
        description: &'static str,
    ) {
        self.add_relation(comp(target, NodeType::Transform), key, description);
        self.add_relation(comp(target, NodeType::Geometry), key, description);
    }
}
