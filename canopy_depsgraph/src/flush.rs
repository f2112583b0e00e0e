// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Update tagging and flushing.
//!
//! Tagging marks operations as needing evaluation and queues them. Flushing
//! propagates the marks along relations, honoring
//! [`RelationFlags::NO_FLUSH`](crate::RelationFlags::NO_FLUSH) and
//! [`RelationFlags::FLUSH_USER_EDIT_ONLY`](crate::RelationFlags::FLUSH_USER_EDIT_ONLY).

use alloc::vec::Vec;

use canopy_scene::IdRef;

use crate::graph::Depsgraph;
use crate::key::{ComponentKey, NodeType};
use crate::node::{NodeRef, OperationFlags, OperationId};
use crate::scratch::TraversalScratch;
use crate::trace::{FlushTrace, NoTrace};

/// Where an update request comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UpdateSource {
    /// The scene time changed.
    Time,
    /// The user edited the entity directly.
    UserEdit,
    /// Relations were rebuilt and everything is re-evaluated.
    Relations,
    /// Visibility of objects changed.
    Visibility,
}

impl Depsgraph {
    /// Tags one operation for update and queues it for flushing.
    pub fn tag_operation(&mut self, op: OperationId, source: UpdateSource) {
        let Some(node) = self.operations.get_mut(op.index()) else {
            log::debug!("tag_operation: no operation {op:?}");
            return;
        };
        node.flags |= OperationFlags::NEEDS_UPDATE | OperationFlags::DIRECTLY_MODIFIED;
        if source == UpdateSource::UserEdit {
            node.flags |= OperationFlags::USER_MODIFIED;
        }
        self.entry_tags.push(NodeRef::Operation(op));
    }

    /// Tags every operation of `id`, or of one of its components, for update.
    ///
    /// Returns the number of tagged operations. Entities without an ID node
    /// are not part of the graph and tag nothing.
    pub fn tag_id(
        &mut self,
        id: IdRef,
        component: Option<NodeType>,
        source: UpdateSource,
    ) -> usize {
        let Some(id_node) = self.find_id_node(id) else {
            log::debug!("tag_id: {id:?} is not in the graph");
            return 0;
        };
        let ops: Vec<OperationId> = match component {
            Some(kind) => {
                let Some(comp) = self.find_component(&ComponentKey::new(id, kind)) else {
                    return 0;
                };
                self.component(comp).operations().to_vec()
            }
            None => self
                .id_node(id_node)
                .components()
                .iter()
                .flat_map(|&comp| self.component(comp).operations().iter().copied())
                .collect(),
        };
        for &op in &ops {
            self.tag_operation(op, source);
        }
        ops.len()
    }

    /// Queues a time change: everything reachable from the time source will
    /// be flushed.
    pub fn tag_time_source(&mut self) {
        self.entry_tags.push(NodeRef::TimeSource);
    }

    /// Flushes queued tags along relations.
    ///
    /// Returns the number of operations newly tagged by the flush.
    pub fn flush_updates(&mut self) -> usize {
        let mut scratch = TraversalScratch::new();
        self.flush_updates_with_scratch(&mut scratch, &mut NoTrace)
    }

    /// Like [`flush_updates`](Self::flush_updates), reporting each tag to
    /// `trace`.
    pub fn flush_updates_with_trace(&mut self, trace: &mut impl FlushTrace) -> usize {
        let mut scratch = TraversalScratch::new();
        self.flush_updates_with_scratch(&mut scratch, trace)
    }

    /// Flushes queued tags using caller-provided scratch storage.
    pub fn flush_updates_with_scratch(
        &mut self,
        scratch: &mut TraversalScratch,
        trace: &mut impl FlushTrace,
    ) -> usize {
        scratch.reset();
        let mut newly_tagged = 0;
        let roots = core::mem::take(&mut self.entry_tags);
        for root in roots {
            match root {
                NodeRef::TimeSource => {
                    for i in 0..self.time_source.outlinks.len() {
                        let rel = self.time_source.outlinks[i];
                        let relation = self.relations[rel.index()];
                        let NodeRef::Operation(to) = relation.to else {
                            continue;
                        };
                        if !relation.flushes(false) {
                            continue;
                        }
                        let newly = self.mark(to);
                        newly_tagged += usize::from(newly);
                        trace.caused_by(to, NodeRef::TimeSource, rel, newly);
                        if scratch.visited.insert(to) {
                            scratch.stack.push(to);
                        }
                    }
                }
                NodeRef::Operation(op) => {
                    trace.root(op);
                    if scratch.visited.insert(op) {
                        scratch.stack.push(op);
                    }
                }
            }
        }

        while let Some(op) = scratch.stack.pop() {
            let user_edit = self.operations[op.index()]
                .flags
                .contains(OperationFlags::USER_MODIFIED);
            for i in 0..self.operations[op.index()].outlinks.len() {
                let rel = self.operations[op.index()].outlinks[i];
                let relation = self.relations[rel.index()];
                let NodeRef::Operation(to) = relation.to else {
                    continue;
                };
                if !relation.flushes(user_edit) {
                    continue;
                }
                let newly = self.mark(to);
                newly_tagged += usize::from(newly);
                trace.caused_by(to, NodeRef::Operation(op), rel, newly);
                if scratch.visited.insert(to) {
                    scratch.stack.push(to);
                }
            }
        }
        newly_tagged
    }

    fn mark(&mut self, op: OperationId) -> bool {
        let flags = &mut self.operations[op.index()].flags;
        let newly = !flags.contains(OperationFlags::NEEDS_UPDATE);
        *flags |= OperationFlags::NEEDS_UPDATE;
        newly
    }

    /// Returns `true` if `op` is tagged for update.
    #[must_use]
    pub fn needs_update(&self, op: OperationId) -> bool {
        self.operations
            .get(op.index())
            .is_some_and(|node| node.flags.contains(OperationFlags::NEEDS_UPDATE))
    }

    /// Operations tagged for update, in creation order.
    pub fn updated_operations(&self) -> impl Iterator<Item = OperationId> + '_ {
        self.operations()
            .filter(|(_, node)| node.flags.contains(OperationFlags::NEEDS_UPDATE))
            .map(|(op, _)| op)
    }

    /// Clears update flags after evaluation.
    pub fn clear_update_tags(&mut self) {
        self.entry_tags.clear();
        for node in &mut self.operations {
            node.flags = OperationFlags::empty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{OperationCode, OperationKey};
    use crate::relation::RelationFlags;
    use crate::trace::OneParentRecorder;
    use canopy_scene::{EvalMode, Main, Object, ObjectType};

    struct Chain {
        graph: Depsgraph,
        a: OperationId,
        b: OperationId,
        c: OperationId,
        id: IdRef,
    }

    fn chain(flags_bc: RelationFlags) -> Chain {
        let mut main = Main::new();
        let id: IdRef = main.add_object(Object::new("Ob", ObjectType::Empty)).into();
        let mut graph = Depsgraph::new(EvalMode::Viewport);
        let key = |opcode| OperationKey::new(id, NodeType::Transform, opcode);
        let a = graph.add_operation_node(&key(OperationCode::TransformInit));
        let b = graph.add_operation_node(&key(OperationCode::TransformLocal));
        let c = graph.add_operation_node(&key(OperationCode::TransformFinal));
        graph.add_new_relation(a.into(), b.into(), "a -> b", RelationFlags::empty());
        graph.add_new_relation(b.into(), c.into(), "b -> c", flags_bc);
        Chain { graph, a, b, c, id }
    }

    #[test]
    fn flush_follows_relations_and_records_causes() {
        let Chain {
            mut graph, a, b, c, ..
        } = chain(RelationFlags::empty());
        graph.tag_operation(a, UpdateSource::Relations);
        let mut trace = OneParentRecorder::new();
        assert_eq!(graph.flush_updates_with_trace(&mut trace), 2);
        assert!(graph.needs_update(c));
        assert_eq!(
            trace.explain_path(c),
            Some(alloc::vec![a.into(), b.into(), c.into()])
        );
    }

    #[test]
    fn no_flush_stops_propagation() {
        let Chain {
            mut graph, a, b, c, ..
        } = chain(RelationFlags::NO_FLUSH);
        graph.tag_operation(a, UpdateSource::UserEdit);
        graph.flush_updates();
        assert!(graph.needs_update(b));
        assert!(!graph.needs_update(c));
    }

    #[test]
    fn user_edit_only_relations_need_a_user_edit() {
        let Chain {
            mut graph, b, c, ..
        } = chain(RelationFlags::FLUSH_USER_EDIT_ONLY);
        graph.tag_operation(b, UpdateSource::Time);
        graph.flush_updates();
        assert!(!graph.needs_update(c), "programmatic change does not flush");

        graph.clear_update_tags();
        graph.tag_operation(b, UpdateSource::UserEdit);
        graph.flush_updates();
        assert!(graph.needs_update(c), "user edit flushes");
    }

    #[test]
    fn tag_id_tags_whole_entity() {
        let Chain { mut graph, id, .. } = chain(RelationFlags::empty());
        assert_eq!(graph.tag_id(id, None, UpdateSource::UserEdit), 3);
        assert_eq!(graph.tag_id(id, Some(NodeType::Geometry), UpdateSource::UserEdit), 0);
        assert_eq!(graph.updated_operations().count(), 3);
    }

    #[test]
    fn time_source_flush() {
        let Chain {
            mut graph, a, c, ..
        } = chain(RelationFlags::empty());
        graph.add_new_relation(NodeRef::TimeSource, a.into(), "Time", RelationFlags::empty());
        graph.tag_time_source();
        let mut trace = OneParentRecorder::new();
        graph.flush_updates_with_trace(&mut trace);
        assert!(graph.needs_update(c));
        assert_eq!(trace.explain_path(a), Some(alloc::vec![NodeRef::TimeSource, a.into()]));
    }
}
