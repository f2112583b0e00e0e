// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node storage: ID nodes own components, components own operations.

use alloc::vec::Vec;

use bitflags::bitflags;
use canopy_scene::IdRef;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::intern::NameId;
use crate::key::{NodeType, OperationCode};
use crate::relation::RelationId;

macro_rules! node_ids {
    ($($(#[$meta:meta])* $name:ident,)*) => {
        $(
            $(#[$meta])*
            #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub(crate) u32);

            impl $name {
                /// Returns this id as an index into its node table.
                #[inline]
                #[must_use]
                pub const fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

node_ids! {
    /// Index of an [`IdNode`].
    IdNodeId,
    /// Index of a [`ComponentNode`].
    ComponentId,
    /// Index of an [`OperationNode`].
    OperationId,
}

/// A relation endpoint: the time source or an operation.
///
/// Component-level relations are resolved to the component's entry or exit
/// operation when they are added.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    /// The graph's time source.
    TimeSource,
    /// An operation node.
    Operation(OperationId),
}

impl NodeRef {
    /// Returns the operation id, or `None` for the time source.
    #[must_use]
    pub const fn operation(self) -> Option<OperationId> {
        match self {
            Self::TimeSource => None,
            Self::Operation(op) => Some(op),
        }
    }
}

impl From<OperationId> for NodeRef {
    fn from(op: OperationId) -> Self {
        Self::Operation(op)
    }
}

bitflags! {
    /// Custom data layers that evaluation must keep for dependents.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CustomDataMask: u32 {
        /// Original element indices.
        const ORIGINDEX = 1 << 0;
        /// Vertex group weights.
        const MDEFORMVERT = 1 << 1;
        /// Custom normals.
        const NORMAL = 1 << 2;
        /// Original coordinates.
        const ORCO = 1 << 3;
    }
}

bitflags! {
    /// Extra evaluation work requested by dependents.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EvalFlags: u32 {
        /// Evaluate the curve path used by follow-path and curve deform.
        const NEED_CURVE_PATH = 1 << 0;
        /// Compute mesh boundary data for shrinkwrap projections.
        const SHRINKWRAP_BOUNDARY = 1 << 1;
    }
}

bitflags! {
    /// Update state of an operation.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct OperationFlags: u32 {
        /// The operation must be evaluated.
        const NEEDS_UPDATE = 1 << 0;
        /// Tagged directly rather than reached by flushing.
        const DIRECTLY_MODIFIED = 1 << 1;
        /// Tagged by a direct user edit.
        const USER_MODIFIED = 1 << 2;
    }
}

/// The single time source of a graph.
#[derive(Clone, Debug, Default)]
pub struct TimeSourceNode {
    pub(crate) outlinks: Vec<RelationId>,
}

impl TimeSourceNode {
    /// Relations leaving the time source.
    #[must_use]
    pub fn outlinks(&self) -> &[RelationId] {
        &self.outlinks
    }
}

/// One entity of the scene.
#[derive(Clone, Debug)]
pub struct IdNode {
    /// The entity.
    pub id: IdRef,
    /// Extra evaluation requested by dependents.
    pub eval_flags: EvalFlags,
    /// Custom data requested by dependents.
    pub customdata_masks: CustomDataMask,
    pub(crate) components: HashMap<(NodeType, NameId), ComponentId>,
    pub(crate) component_order: Vec<ComponentId>,
}

impl IdNode {
    pub(crate) fn new(id: IdRef) -> Self {
        Self {
            id,
            eval_flags: EvalFlags::empty(),
            customdata_masks: CustomDataMask::empty(),
            components: HashMap::new(),
            component_order: Vec::new(),
        }
    }

    /// Components in creation order.
    #[must_use]
    pub fn components(&self) -> &[ComponentId] {
        &self.component_order
    }
}

/// One aspect of an entity, with its ordered operations.
#[derive(Clone, Debug)]
pub struct ComponentNode {
    /// Owning ID node.
    pub owner: IdNodeId,
    /// Component kind.
    pub kind: NodeType,
    /// Sub-name.
    pub name: NameId,
    pub(crate) operations: SmallVec<[OperationId; 4]>,
    pub(crate) operation_map: HashMap<(OperationCode, NameId, i32), OperationId>,
    pub(crate) entry: Option<OperationId>,
    pub(crate) exit: Option<OperationId>,
}

impl ComponentNode {
    pub(crate) fn new(owner: IdNodeId, kind: NodeType, name: NameId) -> Self {
        Self {
            owner,
            kind,
            name,
            operations: SmallVec::new(),
            operation_map: HashMap::new(),
            entry: None,
            exit: None,
        }
    }

    /// Operations in creation order.
    #[must_use]
    pub fn operations(&self) -> &[OperationId] {
        &self.operations
    }

    /// The operation relations into this component attach to.
    ///
    /// Falls back to the only operation when none was designated.
    #[must_use]
    pub fn entry_operation(&self) -> Option<OperationId> {
        self.entry.or_else(|| self.single_operation())
    }

    /// The operation relations out of this component leave from.
    ///
    /// Falls back to the only operation when none was designated.
    #[must_use]
    pub fn exit_operation(&self) -> Option<OperationId> {
        self.exit.or_else(|| self.single_operation())
    }

    fn single_operation(&self) -> Option<OperationId> {
        match self.operations.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}

/// The unit of scheduling.
#[derive(Clone, Debug)]
pub struct OperationNode {
    /// Owning component.
    pub owner: ComponentId,
    /// What the operation does.
    pub opcode: OperationCode,
    /// Operation name.
    pub name: NameId,
    /// Disambiguates operations sharing a name.
    pub name_tag: i32,
    pub(crate) flags: OperationFlags,
    pub(crate) inlinks: Vec<RelationId>,
    pub(crate) outlinks: Vec<RelationId>,
}

impl OperationNode {
    pub(crate) fn new(
        owner: ComponentId,
        opcode: OperationCode,
        name: NameId,
        name_tag: i32,
    ) -> Self {
        Self {
            owner,
            opcode,
            name,
            name_tag,
            flags: OperationFlags::empty(),
            inlinks: Vec::new(),
            outlinks: Vec::new(),
        }
    }

    /// Relations entering this operation.
    #[must_use]
    pub fn inlinks(&self) -> &[RelationId] {
        &self.inlinks
    }

    /// Relations leaving this operation.
    #[must_use]
    pub fn outlinks(&self) -> &[RelationId] {
        &self.outlinks
    }

    /// Current update state.
    #[must_use]
    pub fn flags(&self) -> OperationFlags {
        self.flags
    }
}
