// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Directed relations between scheduling nodes.

use bitflags::bitflags;

use crate::node::NodeRef;

bitflags! {
    /// Behavior flags of a [`Relation`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RelationFlags: u32 {
        /// Orders evaluation only; updates are not flushed along it.
        const NO_FLUSH = 1 << 0;
        /// Marked by cycle detection; ignored when scheduling.
        const CYCLIC = 1 << 1;
        /// Deduplicate against an existing relation with the same endpoints
        /// and description. Only affects insertion and is never stored.
        const CHECK_BEFORE_ADD = 1 << 2;
        /// Never sacrificed to break a cycle and never removed by transitive
        /// reduction.
        const GODMODE = 1 << 3;
        /// Flushes only updates that come from a direct user edit.
        const FLUSH_USER_EDIT_ONLY = 1 << 4;
    }
}

/// Index of a relation in its [`Depsgraph`](crate::Depsgraph).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationId(pub(crate) u32);

impl RelationId {
    /// Returns this id as an index into the relation table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A directed edge: `to` is evaluated after `from`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    /// Node evaluated first.
    pub from: NodeRef,
    /// Node that depends on `from`.
    pub to: NodeRef,
    /// Human readable description.
    pub name: &'static str,
    /// Behavior flags.
    pub flags: RelationFlags,
}

impl Relation {
    /// Returns `true` if updates propagate along this relation for a change
    /// that is (or is not) a direct user edit.
    #[must_use]
    pub fn flushes(&self, user_edit: bool) -> bool {
        if self.flags.contains(RelationFlags::NO_FLUSH) {
            return false;
        }
        user_edit || !self.flags.contains(RelationFlags::FLUSH_USER_EDIT_ONLY)
    }
}
