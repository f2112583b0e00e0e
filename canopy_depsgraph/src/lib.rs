// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Depsgraph: the dependency graph of an evaluated scene.
//!
//! Evaluation of a scene is split into small operations (compute the local
//! transform of an object, run one modifier, solve one IK chain, ...). This
//! crate records those operations and the order constraints between them:
//!
//! - **Nodes**: every entity gets an [`IdNode`]. Its [`ComponentNode`]s group
//!   the [`OperationNode`]s of one evaluation stage ([`NodeType`]). Operations
//!   are identified by an [`OperationCode`] and an optional name.
//! - **Keys** ([`ComponentKey`], [`OperationKey`], [`TimeSourceKey`]): how the
//!   builders address nodes. A component key resolves to the exit operation
//!   of the component when used as a source, and to its entry as a target.
//! - **Relations** ([`Relation`], [`RelationFlags`]): directed edges between
//!   operations, or from the time source.
//!
//! ## Quick Start
//!
//! ```rust
//! use canopy_depsgraph::{
//!     BuildOptions, NodeType, OperationCode, OperationKey, UpdateSource, build_depsgraph,
//! };
//! use canopy_scene::{Main, Object, ObjectId, ObjectType, ParentType};
//!
//! let mut main = Main::new();
//! let scene = main.new_scene("Scene");
//! let master = main.scene(scene).master_collection.unwrap();
//! let parent = main.add_object(Object::new("Parent", ObjectType::Empty));
//! let child = main.add_object(Object::new("Child", ObjectType::Empty));
//! main.link_object(master, parent).unwrap();
//! main.link_object(master, child).unwrap();
//! main.set_parent(child, parent, ParentType::Object).unwrap();
//!
//! let mut graph = build_depsgraph(&main, scene, &BuildOptions::default());
//!
//! // Evaluation visits the parent before the child.
//! let order = graph.evaluation_order().unwrap();
//! let position = |ob: ObjectId| {
//!     let key = OperationKey::new(ob, NodeType::Transform, OperationCode::TransformFinal);
//!     let op = graph.find_operation(&key).unwrap();
//!     order.iter().position(|&o| o == op).unwrap()
//! };
//! assert!(position(parent) < position(child));
//!
//! // Moving the parent updates the child.
//! graph.tag_id(parent.into(), Some(NodeType::Transform), UpdateSource::UserEdit);
//! graph.flush_updates();
//! let child_final = OperationKey::new(child, NodeType::Transform, OperationCode::TransformFinal);
//! assert!(graph.needs_update(graph.find_operation(&child_final).unwrap()));
//! ```
//!
//! ## Building
//!
//! [`build_depsgraph`] runs the [`NodeBuilder`] and then the
//! [`RelationBuilder`] from the bases of one view layer, adds the
//! copy-on-eval relations, flags cycles and removes redundant relations. The
//! builders can also be driven directly, e.g. to build a single object.
//!
//! Building never fails. References to entities missing from the database,
//! or relations whose endpoints do not exist, are skipped and logged at
//! debug level through the [`log`] facade.
//!
//! ## Updates
//!
//! [`Depsgraph::tag_id`] and [`Depsgraph::tag_time_source`] mark operations;
//! [`Depsgraph::flush_updates`] spreads the marks along relations. A
//! [`FlushTrace`] such as [`OneParentRecorder`] can explain afterwards why an
//! operation was marked.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.
//!
//! ## Features
//!
//! - `std` (default): forwards to `canopy_scene/std`.
//! - `libm`: forwards to `canopy_scene/libm` for `no_std` targets.

#![no_std]

extern crate alloc;

mod builder;
mod cycle;
mod flush;
mod graph;
pub mod intern;
mod key;
mod node;
mod relation;
mod schedule;
mod scratch;
mod trace;
mod transitive;

pub use builder::{
    BuildOptions, BuildTags, BuilderMap, NodeBuilder, RelationBuilder, RnaPointSource,
    build_depsgraph, copy_on_eval_flushes, property_key, resolve_owner,
};
pub use flush::UpdateSource;
pub use graph::{Depsgraph, DepsgraphStats};
pub use intern::NameId;
pub use key::{ComponentKey, NodeKey, NodeType, OperationCode, OperationKey, TimeSourceKey};
pub use node::{
    ComponentId, ComponentNode, CustomDataMask, EvalFlags, IdNode, IdNodeId, NodeRef,
    OperationFlags, OperationId, OperationNode, TimeSourceNode,
};
pub use relation::{Relation, RelationFlags, RelationId};
pub use schedule::{Schedule, ScheduleCompletion, ScheduleError};
pub use scratch::TraversalScratch;
pub use trace::{FlushCause, FlushTrace, NoTrace, OneParentRecorder};
