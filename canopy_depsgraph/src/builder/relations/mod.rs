// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Second build pass: relations between the nodes of the first.
//!
//! The traversal mirrors [`NodeBuilder`](super::NodeBuilder). Relations whose
//! endpoints are missing are skipped with a debug message, so a partial node
//! pass yields a partial but consistent graph.

mod animation;
mod constraints;
mod datablocks;
mod modifier;
mod object;
mod particles;
mod rig;
mod scene;
mod shading;

use alloc::vec::Vec;

use canopy_scene::{IdKind, IdRef, Main, ObjectId, SceneId};

use super::map::{BuildTags, BuilderMap};
use crate::graph::Depsgraph;
use crate::key::{ComponentKey, NodeKey, NodeType, OperationCode, OperationKey};
use crate::node::{CustomDataMask, EvalFlags, NodeRef, OperationId};
use crate::relation::{RelationFlags, RelationId};

fn op(id: impl Into<IdRef>, kind: NodeType, opcode: OperationCode) -> OperationKey<'static> {
    OperationKey::new(id, kind, opcode)
}

fn comp(id: impl Into<IdRef>, kind: NodeType) -> ComponentKey<'static> {
    ComponentKey::new(id, kind)
}

/// Returns `true` if the copy-on-eval relation into `component` of an
/// entity of kind `kind` propagates updates.
///
/// Everything else only orders evaluation after the copy.
#[must_use]
pub fn copy_on_eval_flushes(kind: IdKind, component: NodeType) -> bool {
    matches!(
        (kind, component),
        (
            IdKind::Mesh | IdKind::Curves | IdKind::PointCloud | IdKind::Volume,
            NodeType::Geometry
        ) | (IdKind::CacheFile, NodeType::Cache)
            | (IdKind::Sound, _)
            | (_, NodeType::LayerCollections)
            | (IdKind::Mask, NodeType::Parameters)
            | (IdKind::Collection, NodeType::Hierarchy)
    )
}

/// Wires the nodes of a scene.
#[derive(Debug)]
pub struct RelationBuilder<'a> {
    main: &'a Main,
    graph: &'a mut Depsgraph,
    built: BuilderMap,
    scene: Option<SceneId>,
    /// Visible objects of the view layer being built.
    bases: Vec<ObjectId>,
}

impl<'a> RelationBuilder<'a> {
    /// Creates a builder adding relations to `graph`.
    pub fn new(main: &'a Main, graph: &'a mut Depsgraph) -> Self {
        Self {
            main,
            graph,
            built: BuilderMap::new(),
            scene: None,
            bases: Vec::new(),
        }
    }

    /// Wires a scene through one of its view layers.
    pub fn build_scene(&mut self, scene: SceneId, view_layer: usize) {
        self.scene = Some(scene);
        self.build_view_layer(scene, view_layer, true);
    }

    /// Adds `from -> to`, deduplicated against an identical relation.
    ///
    /// Returns `None` if either endpoint is not in the graph.
    pub fn add_relation<'f, 't>(
        &mut self,
        from: impl Into<NodeKey<'f>>,
        to: impl Into<NodeKey<'t>>,
        description: &'static str,
    ) -> Option<RelationId> {
        self.add_relation_with_flags(from, to, description, RelationFlags::empty())
    }

    /// Adds `from -> to` with `flags`.
    pub fn add_relation_with_flags<'f, 't>(
        &mut self,
        from: impl Into<NodeKey<'f>>,
        to: impl Into<NodeKey<'t>>,
        description: &'static str,
        flags: RelationFlags,
    ) -> Option<RelationId> {
        let from = from.into();
        let to = to.into();
        let op_from = self.graph.resolve_from(&from);
        let op_to = self.graph.resolve_to(&to);
        match (op_from, op_to) {
            (Some(op_from), Some(op_to)) => Some(self.graph.add_new_relation(
                op_from,
                op_to,
                description,
                flags | RelationFlags::CHECK_BEFORE_ADD,
            )),
            _ => {
                if op_from.is_none() {
                    log::debug!("add_relation({description}) - could not find op_from ({from})");
                }
                if op_to.is_none() {
                    log::debug!("add_relation({description}) - could not find op_to ({to})");
                }
                None
            }
        }
    }

    fn has_node<'k>(&self, key: impl Into<NodeKey<'k>>) -> bool {
        self.graph.resolve_to(&key.into()).is_some()
    }

    fn add_customdata_mask(&mut self, id: impl Into<IdRef>, mask: CustomDataMask) {
        if let Some(node) = self.graph.find_id_node(id.into()) {
            self.graph.id_node_mut(node).customdata_masks |= mask;
        }
    }

    fn add_special_eval_flag(&mut self, id: impl Into<IdRef>, flag: EvalFlags) {
        if let Some(node) = self.graph.find_id_node(id.into()) {
            self.graph.id_node_mut(node).eval_flags |= flag;
        }
    }

    /// Returns `true` the first time `id` is seen.
    fn begin(&mut self, id: impl Into<IdRef>) -> bool {
        let id = id.into();
        self.main.contains(id) && !self.built.check_is_built_and_tag(id, BuildTags::COMPLETE)
    }

    /// Wires any entity, dispatching on its kind.
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

    fn build_id_common(&mut self, id: IdRef) {
        self.build_parameters(id);
        self.build_animdata(id);
    }

    fn build_parameters(&mut self, id: IdRef) {
        if self.built.check_is_built_and_tag(id, BuildTags::PARAMETERS) {
            return;
        }
        let entry = op(id, NodeType::Parameters, OperationCode::ParametersEntry);
        let eval = op(id, NodeType::Parameters, OperationCode::ParametersEval);
        let exit = op(id, NodeType::Parameters, OperationCode::ParametersExit);
        self.add_relation(entry, eval, "Entry -> Eval");
        self.add_relation(eval, exit, "Entry -> Exit");

        let main = self.main;
        let Some(header) = main.header(id) else {
            return;
        };
        for (name, _) in header.properties.iter() {
            let property = op(id, NodeType::Parameters, OperationCode::IdProperty).named(name);
            self.add_relation(entry, property, "ID Property Entry");
            self.add_relation(property, exit, "ID Property Exit");
        }
        let mut referenced = Vec::new();
        header.properties.for_each_id(&mut |target| referenced.push(target));
        for target in referenced {
            self.build_id(target);
        }
    }

    /// Orders every component of copied entities after the copy.
    ///
    /// Runs once after all other relations exist, since it looks for
    /// operations without a dependency inside their own component.
    pub fn build_copy_on_write_relations(&mut self) {
        let ids: Vec<IdRef> = self.graph.id_nodes().map(|(_, node)| node.id).collect();
        for id in ids {
            if id.kind().needs_copy_on_eval() {
                self.build_copy_on_write_relations_for(id);
            }
        }
    }

    fn build_copy_on_write_relations_for(&mut self, id: IdRef) {
        let cow_key = op(id, NodeType::CopyOnEval, OperationCode::CopyOnEval);
        let Some(cow) = self.graph.find_operation(&cow_key) else {
            return;
        };
        let Some(id_node) = self.graph.find_id_node(id) else {
            return;
        };

        let mut targets: Vec<(OperationId, RelationFlags)> = Vec::new();
        for &comp_id in self.graph.id_node(id_node).components() {
            let component = self.graph.component(comp_id);
            if component.kind == NodeType::CopyOnEval {
                continue;
            }
            let mut flags = RelationFlags::NO_FLUSH | RelationFlags::GODMODE;
            if copy_on_eval_flushes(id.kind(), component.kind) {
                flags -= RelationFlags::NO_FLUSH;
            }
            let entry = component.entry_operation();
            if let Some(entry) = entry {
                targets.push((entry, flags));
            }
            for &operation in component.operations() {
                if Some(operation) == entry {
                    continue;
                }
                let has_same_comp_dependency =
                    self.graph.operation(operation).inlinks().iter().any(|&rel| {
                        match self.graph.relation(rel).from {
                            NodeRef::Operation(from) => {
                                self.graph.operation(from).owner == comp_id
                            }
                            NodeRef::TimeSource => false,
                        }
                    });
                if !has_same_comp_dependency {
                    targets.push((operation, flags));
                }
            }
        }
        for (target, flags) in targets {
            self.graph.add_new_relation(
                NodeRef::Operation(cow),
                NodeRef::Operation(target),
                "Copy-on-Eval Dependency",
                flags | RelationFlags::CHECK_BEFORE_ADD,
            );
        }

        if let IdRef::Object(ob) = id
            && let Some(data) = self.main.get_object(ob).and_then(|object| object.data)
            && data.kind().needs_copy_on_eval()
        {
            self.add_relation_with_flags(
                op(data, NodeType::CopyOnEval, OperationCode::CopyOnEval),
                cow_key,
                "Eval Order",
                RelationFlags::GODMODE,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flushing_copy_relations() {
        assert!(copy_on_eval_flushes(IdKind::Mesh, NodeType::Geometry));
        assert!(copy_on_eval_flushes(IdKind::Curves, NodeType::Geometry));
        assert!(copy_on_eval_flushes(IdKind::CacheFile, NodeType::Cache));
        assert!(copy_on_eval_flushes(IdKind::Sound, NodeType::Parameters));
        assert!(copy_on_eval_flushes(IdKind::Scene, NodeType::LayerCollections));
        assert!(copy_on_eval_flushes(IdKind::Mask, NodeType::Parameters));
        assert!(copy_on_eval_flushes(IdKind::Collection, NodeType::Hierarchy));

        assert!(!copy_on_eval_flushes(IdKind::Mesh, NodeType::Parameters));
        assert!(!copy_on_eval_flushes(IdKind::Curve, NodeType::Geometry), "legacy curves");
        assert!(!copy_on_eval_flushes(IdKind::Object, NodeType::Transform));
        assert!(!copy_on_eval_flushes(IdKind::Collection, NodeType::Geometry));
    }
}
