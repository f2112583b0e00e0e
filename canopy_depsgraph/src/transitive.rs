// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transitive reduction of operation relations.

use hashbrown::HashSet;

use crate::graph::Depsgraph;
use crate::node::{NodeRef, OperationId};
use crate::relation::{RelationFlags, RelationId};
use crate::scratch::TraversalScratch;

impl Depsgraph {
    /// Removes relations `a -> c` that are implied by a longer path
    /// `a -> b -> ... -> c`.
    ///
    /// Relations leaving the time source, god-mode relations and relations
    /// flagged cyclic are kept. Cyclic relations are also not followed when
    /// looking for longer paths.
    ///
    /// Returns the number of removed relations. Relation ids taken before
    /// the call are invalid afterwards.
    pub fn transitive_reduction(&mut self) -> usize {
        let mut scratch = TraversalScratch::new();
        let mut redundant = HashSet::new();

        for (op, node) in self.operations() {
            scratch.reset();
            // Seed with the successors of direct targets: anything reached
            // from there is reachable through a path of length two or more.
            for &rel in node.outlinks() {
                let Some(target) = self.follow(rel) else {
                    continue;
                };
                for &next in self.operation(target).outlinks() {
                    if let Some(next) = self.follow(next)
                        && scratch.visited.insert(next)
                    {
                        scratch.stack.push(next);
                    }
                }
            }
            while let Some(current) = scratch.stack.pop() {
                for &rel in self.operation(current).outlinks() {
                    if let Some(next) = self.follow(rel)
                        && scratch.visited.insert(next)
                    {
                        scratch.stack.push(next);
                    }
                }
            }

            for &rel in node.outlinks() {
                let relation = self.relation(rel);
                if relation
                    .flags
                    .intersects(RelationFlags::GODMODE | RelationFlags::CYCLIC)
                {
                    continue;
                }
                if let NodeRef::Operation(target) = relation.to
                    && target != op
                    && scratch.visited.contains(&target)
                {
                    redundant.insert(rel);
                }
            }
        }

        if redundant.is_empty() {
            return 0;
        }
        let removed = redundant.len();
        self.retain_relations(|rel, _| !redundant.contains(&rel));
        log::debug!("transitive reduction removed {removed} relations");
        removed
    }

    /// Target of a non-cyclic relation between operations.
    fn follow(&self, rel: RelationId) -> Option<OperationId> {
        let relation = self.relation(rel);
        if relation.flags.contains(RelationFlags::CYCLIC) {
            return None;
        }
        relation.to.operation()
    }
}
