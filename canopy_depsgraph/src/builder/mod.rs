// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Building a [`Depsgraph`] from a scene.
//!
//! Building runs in two passes over the same memoized traversal. The
//! [`NodeBuilder`] creates ID, component and operation nodes; the
//! [`RelationBuilder`] then wires them. Both passes start from the bases of a
//! view layer and pull in everything those objects reference.
//!
//! [`build_depsgraph`] runs both passes and finalizes the graph according to
//! [`BuildOptions`].

mod map;
mod nodes;
mod pose;
mod relations;
mod rna;

use canopy_scene::{
    BooleanOperand, EvalMode, IdRef, Main, ModifierKind, Object, ObjectId, SceneId,
};
use smallvec::SmallVec;

use crate::graph::Depsgraph;

pub use map::{BuildTags, BuilderMap};
pub use nodes::NodeBuilder;
pub use relations::{RelationBuilder, copy_on_eval_flushes};
pub use rna::{RnaPointSource, property_key, resolve_owner};

/// Options for [`build_depsgraph`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    /// Visibility and culling mode of the graph.
    pub mode: EvalMode,
    /// Index of the view layer whose bases seed the build.
    pub view_layer: usize,
    /// Remove relations implied by longer paths after building.
    pub transitive_reduction: bool,
    /// Flag relations that close dependency cycles.
    pub detect_cycles: bool,
    /// Log node and relation counts at debug level.
    pub collect_stats: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            mode: EvalMode::Viewport,
            view_layer: 0,
            transitive_reduction: true,
            detect_cycles: true,
            collect_stats: false,
        }
    }
}

/// Builds the dependency graph of `scene`.
///
/// Entities missing from `main` are skipped with a debug message; building
/// itself never fails.
#[must_use]
pub fn build_depsgraph(main: &Main, scene: SceneId, options: &BuildOptions) -> Depsgraph {
    let mut graph = Depsgraph::new(options.mode);
    NodeBuilder::new(main, &mut graph).build_scene(scene, options.view_layer);
    let mut relations = RelationBuilder::new(main, &mut graph);
    relations.build_scene(scene, options.view_layer);
    relations.build_copy_on_write_relations();

    if options.detect_cycles {
        graph.detect_cycles();
    }
    if options.transitive_reduction {
        let removed = graph.transitive_reduction();
        log::debug!("transitive reduction removed {removed} relations");
    }
    if options.collect_stats {
        let stats = graph.stats();
        log::debug!(
            "depsgraph: {} ids, {} components, {} operations, {} relations ({} cyclic)",
            stats.id_nodes,
            stats.components,
            stats.operations,
            stats.relations,
            stats.cyclic_relations
        );
    }
    graph
}

/// Returns `true` if the object owns a point cache.
pub(crate) fn has_point_cache(object: &Object) -> bool {
    object.rigid_body
        || !object.particle_systems.is_empty()
        || object
            .modifiers
            .iter()
            .any(|modifier| modifier.kind.has_point_cache())
}

/// Entities a modifier reads from.
pub(crate) fn modifier_ids(kind: &ModifierKind) -> SmallVec<[IdRef; 4]> {
    let mut ids = SmallVec::new();
    let mut object = |ob: &Option<ObjectId>| ids.extend(ob.map(IdRef::Object));
    match kind {
        ModifierKind::Armature { object: ob }
        | ModifierKind::Lattice { object: ob }
        | ModifierKind::Curve { object: ob }
        | ModifierKind::Hook { object: ob, .. }
        | ModifierKind::MeshDeform { object: ob }
        | ModifierKind::Cast { object: ob }
        | ModifierKind::ParticleInstance { object: ob }
        | ModifierKind::Mirror { mirror_object: ob }
        | ModifierKind::SurfaceDeform { target: ob }
        | ModifierKind::DataTransfer { source: ob } => object(ob),
        ModifierKind::Array {
            start_cap,
            end_cap,
            offset_object,
            curve,
        } => {
            object(start_cap);
            object(end_cap);
            object(offset_object);
            object(curve);
        }
        ModifierKind::Shrinkwrap {
            target,
            auxiliary_target,
        } => {
            object(target);
            object(auxiliary_target);
        }
        ModifierKind::Displace {
            texture,
            map_object,
        }
        | ModifierKind::Wave {
            texture,
            map_object,
        } => {
            ids.extend(map_object.map(IdRef::Object));
            ids.extend(texture.map(IdRef::Texture));
        }
        ModifierKind::UvProject { projectors } => {
            ids.extend(projectors.iter().copied().map(IdRef::Object));
        }
        ModifierKind::Boolean { operand } => match operand {
            BooleanOperand::Object(ob) => ids.push(IdRef::Object(*ob)),
            BooleanOperand::Collection(collection) => ids.push(IdRef::Collection(*collection)),
            BooleanOperand::None => {}
        },
        ModifierKind::Nodes { node_tree } => ids.extend(node_tree.map(IdRef::NodeTree)),
        ModifierKind::MeshSequenceCache { cache_file } => {
            ids.extend(cache_file.map(IdRef::CacheFile));
        }
        ModifierKind::Build
        | ModifierKind::Ocean
        | ModifierKind::ParticleSystem
        | ModifierKind::Cloth
        | ModifierKind::SoftBody
        | ModifierKind::Collision
        | ModifierKind::DynamicPaint
        | ModifierKind::Fluid
        | ModifierKind::Subdivision
        | ModifierKind::Solidify
        | ModifierKind::Bevel
        | ModifierKind::Smooth => {}
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_scene::{Modifier, ObjectType};

    #[test]
    fn array_caps_are_referenced() {
        let mut main = Main::new();
        let cap = main.add_object(Object::new("Cap", ObjectType::Mesh));
        let kind = ModifierKind::Array {
            start_cap: Some(cap),
            end_cap: None,
            offset_object: Some(cap),
            curve: None,
        };
        let ids = modifier_ids(&kind);
        assert_eq!(ids.as_slice(), &[IdRef::Object(cap), IdRef::Object(cap)]);
        assert!(modifier_ids(&ModifierKind::Subdivision).is_empty());
    }

    #[test]
    fn point_cache_sources() {
        let mut object = Object::new("Ob", ObjectType::Mesh);
        assert!(!has_point_cache(&object));
        object.rigid_body = true;
        assert!(has_point_cache(&object));

        let mut cloth = Object::new("Cloth", ObjectType::Mesh);
        cloth
            .modifiers
            .push(Modifier::new("Cloth", ModifierKind::Cloth));
        assert!(has_point_cache(&cloth));
    }
}
