// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reusable scratch buffers for graph traversals.

use alloc::vec::Vec;

use hashbrown::HashSet;

use crate::node::OperationId;

/// Reusable scratch storage for operation traversals.
///
/// Update flushing runs every frame; keeping one scratch per update pass
/// avoids allocating the traversal stack and visited set each time.
///
/// # See Also
///
/// - [`Depsgraph::flush_updates_with_scratch`](crate::Depsgraph::flush_updates_with_scratch):
///   Scratch-powered flushing.
#[derive(Debug, Default)]
pub struct TraversalScratch {
    pub(crate) stack: Vec<OperationId>,
    pub(crate) visited: HashSet<OperationId>,
}

impl TraversalScratch {
    /// Creates an empty scratch buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scratch buffer with reserved capacity.
    #[must_use]
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            stack: Vec::with_capacity(cap),
            visited: HashSet::with_capacity(cap),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.stack.clear();
        self.visited.clear();
    }
}
