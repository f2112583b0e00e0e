// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Evaluation order of operation nodes.

use alloc::collections::BinaryHeap;
use alloc::vec::Vec;
use core::cmp::Reverse;
use core::fmt;

use crate::graph::Depsgraph;
use crate::node::{NodeRef, OperationId};
use crate::relation::RelationFlags;

/// Indicates whether scheduling ordered every operation or stalled on a cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScheduleCompletion {
    /// Every operation was ordered.
    Complete,
    /// Some operations still had unsatisfied dependencies (a cycle that was
    /// not flagged [`RelationFlags::CYCLIC`]).
    Stalled {
        /// Number of operations that could not be ordered.
        remaining: usize,
    },
}

/// Error returned when an evaluation order cannot include every operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScheduleError {
    /// Number of operations that could not be ordered.
    pub remaining: usize,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} operations are part of unresolved dependency cycles",
            self.remaining
        )
    }
}

impl core::error::Error for ScheduleError {}

/// Operations in an order that evaluates dependencies first.
///
/// Uses Kahn's algorithm over the operation nodes. Relations flagged
/// [`RelationFlags::CYCLIC`] are ignored; the time source is always
/// considered evaluated.
///
/// When several operations are ready at once the one created first is
/// yielded first, so the order is deterministic for a given build.
///
/// # Performance
///
/// O(V log V + E) time and O(V) space for V operations and E relations.
#[derive(Clone, Debug)]
pub struct Schedule {
    order: Vec<OperationId>,
    completion: ScheduleCompletion,
}

impl Schedule {
    /// Orders every operation of `graph`.
    #[must_use]
    pub fn new(graph: &Depsgraph) -> Self {
        let count = graph.operation_count();
        let mut in_degree = alloc::vec![0_usize; count];
        for (_, relation) in graph.relations() {
            if relation.flags.contains(RelationFlags::CYCLIC) {
                continue;
            }
            if let NodeRef::Operation(to) = relation.to {
                in_degree[to.index()] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<OperationId>> = graph
            .operations()
            .filter(|(op, _)| in_degree[op.index()] == 0)
            .map(|(op, _)| Reverse(op))
            .collect();
        let mut order = Vec::with_capacity(count);
        while let Some(Reverse(op)) = ready.pop() {
            order.push(op);
            for &rel in graph.operation(op).outlinks() {
                let relation = graph.relation(rel);
                if relation.flags.contains(RelationFlags::CYCLIC) {
                    continue;
                }
                if let NodeRef::Operation(to) = relation.to {
                    let degree = &mut in_degree[to.index()];
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(to));
                    }
                }
            }
        }

        let completion = if order.len() == count {
            ScheduleCompletion::Complete
        } else {
            ScheduleCompletion::Stalled {
                remaining: count - order.len(),
            }
        };
        Self { order, completion }
    }

    /// The ordered operations.
    #[must_use]
    pub fn order(&self) -> &[OperationId] {
        &self.order
    }

    /// Whether every operation was ordered.
    #[must_use]
    pub fn completion(&self) -> ScheduleCompletion {
        self.completion
    }

    /// Returns `true` if a cycle kept some operations out of the order.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        matches!(self.completion, ScheduleCompletion::Stalled { .. })
    }

    /// Returns the order, or an error if it is incomplete.
    pub fn into_result(self) -> Result<Vec<OperationId>, ScheduleError> {
        match self.completion {
            ScheduleCompletion::Complete => Ok(self.order),
            ScheduleCompletion::Stalled { remaining } => Err(ScheduleError { remaining }),
        }
    }
}

impl Depsgraph {
    /// Computes the evaluation order of all operations.
    ///
    /// Fails if cycles remain that cycle detection did not flag.
    pub fn evaluation_order(&self) -> Result<Vec<OperationId>, ScheduleError> {
        Schedule::new(self).into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{NodeType, OperationCode, OperationKey};
    use canopy_scene::{EvalMode, IdRef, Main, Object, ObjectType};

    fn three_ops() -> (Depsgraph, [OperationId; 3]) {
        let mut main = Main::new();
        let id: IdRef = main.add_object(Object::new("Ob", ObjectType::Empty)).into();
        let mut graph = Depsgraph::new(EvalMode::Viewport);
        let key = |opcode| OperationKey::new(id, NodeType::Transform, opcode);
        let ops = [
            graph.add_operation_node(&key(OperationCode::TransformInit)),
            graph.add_operation_node(&key(OperationCode::TransformLocal)),
            graph.add_operation_node(&key(OperationCode::TransformFinal)),
        ];
        (graph, ops)
    }

    #[test]
    fn dependencies_come_first() {
        let (mut graph, [a, b, c]) = three_ops();
        graph.add_new_relation(c.into(), b.into(), "c -> b", RelationFlags::empty());
        graph.add_new_relation(b.into(), a.into(), "b -> a", RelationFlags::empty());
        assert_eq!(graph.evaluation_order(), Ok(alloc::vec![c, b, a]));
    }

    #[test]
    fn unflagged_cycle_stalls() {
        let (mut graph, [a, b, c]) = three_ops();
        graph.add_new_relation(a.into(), b.into(), "a -> b", RelationFlags::empty());
        let back = graph.add_new_relation(b.into(), a.into(), "b -> a", RelationFlags::empty());

        let schedule = Schedule::new(&graph);
        assert_eq!(schedule.order(), &[c]);
        assert_eq!(
            schedule.completion(),
            ScheduleCompletion::Stalled { remaining: 2 }
        );

        graph.relations[back.index()].flags |= RelationFlags::CYCLIC;
        assert_eq!(graph.evaluation_order(), Ok(alloc::vec![a, b, c]));
    }
}
