// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explaining why an operation was tagged for update.
//!
//! Flushing does not store provenance by itself. Passing a [`FlushTrace`] to
//! [`Depsgraph::flush_updates_with_trace`](crate::Depsgraph::flush_updates_with_trace)
//! reports every tag, and [`OneParentRecorder`] keeps one cause per operation
//! so the chain from a tagged entity to any updated operation can be printed.

use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};

use crate::node::{NodeRef, OperationId};
use crate::relation::RelationId;

/// The recorded cause of an update.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FlushCause {
    /// The operation was tagged directly.
    Root,
    /// The operation was reached from `because` through `relation`.
    Because {
        /// Upstream node (an operation or the time source).
        because: NodeRef,
        /// Relation the update travelled along.
        relation: RelationId,
    },
}

/// A callback sink for update flushing.
pub trait FlushTrace {
    /// Called for each directly tagged operation.
    fn root(&mut self, op: OperationId);

    /// Called when `op` is reached from `because` through `relation`.
    ///
    /// `newly_tagged` is `false` if `op` already needed an update.
    fn caused_by(
        &mut self,
        op: OperationId,
        because: NodeRef,
        relation: RelationId,
        newly_tagged: bool,
    );
}

/// A trace that records nothing.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoTrace;

impl FlushTrace for NoTrace {
    fn root(&mut self, _op: OperationId) {}

    fn caused_by(&mut self, _: OperationId, _: NodeRef, _: RelationId, _: bool) {}
}

/// Records one cause per updated operation (a spanning forest).
///
/// When an operation is reached along several relations the first one wins.
#[derive(Debug, Default, Clone)]
pub struct OneParentRecorder {
    causes: HashMap<OperationId, FlushCause>,
}

impl OneParentRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all recorded causes.
    pub fn clear(&mut self) {
        self.causes.clear();
    }

    /// Returns the recorded cause for `op`, if any.
    #[must_use]
    pub fn cause(&self, op: OperationId) -> Option<FlushCause> {
        self.causes.get(&op).copied()
    }

    /// Returns one path from a tag root to `op`, ordered root first.
    ///
    /// A path starting at the time source begins with [`NodeRef::TimeSource`].
    #[must_use]
    pub fn explain_path(&self, op: OperationId) -> Option<Vec<NodeRef>> {
        let mut out = Vec::new();
        let mut seen: HashSet<OperationId> = HashSet::new();

        let mut current = op;
        loop {
            if !seen.insert(current) {
                return None;
            }
            out.push(NodeRef::Operation(current));

            match self.cause(current)? {
                FlushCause::Root => break,
                FlushCause::Because {
                    because: NodeRef::TimeSource,
                    ..
                } => {
                    out.push(NodeRef::TimeSource);
                    break;
                }
                FlushCause::Because {
                    because: NodeRef::Operation(upstream),
                    ..
                } => current = upstream,
            }
        }

        out.reverse();
        Some(out)
    }
}

impl FlushTrace for OneParentRecorder {
    fn root(&mut self, op: OperationId) {
        self.causes.entry(op).or_insert(FlushCause::Root);
    }

    fn caused_by(&mut self, op: OperationId, because: NodeRef, relation: RelationId, _: bool) {
        self.causes
            .entry(op)
            .or_insert(FlushCause::Because { because, relation });
    }
}
