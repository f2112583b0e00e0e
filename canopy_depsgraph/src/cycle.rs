// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency cycle detection.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use crate::graph::Depsgraph;
use crate::node::{NodeRef, OperationId};
use crate::relation::{RelationFlags, RelationId};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    NotVisited,
    InStack,
    Done,
}

struct Frame {
    op: OperationId,
    next: usize,
    via: Option<RelationId>,
}

impl Depsgraph {
    /// Finds dependency cycles and breaks each by flagging one relation
    /// [`RelationFlags::CYCLIC`].
    ///
    /// The relation closing the cycle is flagged unless it is a god-mode
    /// relation, in which case the nearest non-god-mode relation along the
    /// cycle is flagged instead. Every cycle is logged as a warning.
    ///
    /// Returns the number of cycles found.
    pub fn detect_cycles(&mut self) -> usize {
        let count = self.operations.len();
        let mut marks = alloc::vec![Mark::NotVisited; count];
        let mut stack_pos = alloc::vec![0_usize; count];
        let mut frames: Vec<Frame> = Vec::new();
        let mut cycles = 0;

        // Roots first so reported cycles start where evaluation would.
        let starts: Vec<OperationId> = self
            .operations()
            .filter(|(_, node)| node.inlinks().is_empty())
            .map(|(op, _)| op)
            .chain(self.operations().map(|(op, _)| op))
            .collect();

        for start in starts {
            if marks[start.index()] != Mark::NotVisited {
                continue;
            }
            marks[start.index()] = Mark::InStack;
            stack_pos[start.index()] = 0;
            frames.push(Frame {
                op: start,
                next: 0,
                via: None,
            });

            while let Some(frame) = frames.last_mut() {
                let op = frame.op;
                let outlinks = &self.operations[op.index()].outlinks;
                let Some(&rel) = outlinks.get(frame.next) else {
                    marks[op.index()] = Mark::Done;
                    frames.pop();
                    continue;
                };
                frame.next += 1;

                let relation = self.relations[rel.index()];
                if relation.flags.contains(RelationFlags::CYCLIC) {
                    continue;
                }
                let NodeRef::Operation(to) = relation.to else {
                    continue;
                };
                match marks[to.index()] {
                    Mark::NotVisited => {
                        marks[to.index()] = Mark::InStack;
                        stack_pos[to.index()] = frames.len();
                        frames.push(Frame {
                            op: to,
                            next: 0,
                            via: Some(rel),
                        });
                    }
                    Mark::InStack => {
                        let path: Vec<RelationId> = frames[stack_pos[to.index()] + 1..]
                            .iter()
                            .filter_map(|f| f.via)
                            .chain(core::iter::once(rel))
                            .collect();
                        self.break_cycle(&path);
                        cycles += 1;
                    }
                    Mark::Done => {}
                }
            }
        }

        if cycles > 0 {
            log::warn!("Detected {cycles} dependency cycles");
        }
        cycles
    }

    /// Flags one relation of `path` (ordered along the cycle, closing
    /// relation last) and logs the cycle.
    fn break_cycle(&mut self, path: &[RelationId]) {
        let Some(&closing) = path.last() else {
            return;
        };
        let victim = path
            .iter()
            .rev()
            .copied()
            .find(|rel| {
                !self.relations[rel.index()]
                    .flags
                    .contains(RelationFlags::GODMODE)
            })
            .unwrap_or(closing);

        let mut message = String::from("Dependency cycle detected:");
        for &rel in path.iter().rev() {
            let relation = self.relations[rel.index()];
            let (NodeRef::Operation(from), NodeRef::Operation(to)) = (relation.from, relation.to)
            else {
                continue;
            };
            let _ = write!(
                message,
                "\n  {} depends on\n  {} via '{}'",
                self.operation_key(to),
                self.operation_key(from),
                relation.name
            );
        }
        log::warn!("{message}");

        self.relations[victim.index()].flags |= RelationFlags::CYCLIC;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{NodeType, OperationCode, OperationKey};
    use canopy_scene::{EvalMode, IdRef, Main, Object, ObjectType};

    fn ops(graph: &mut Depsgraph) -> [OperationId; 3] {
        let mut main = Main::new();
        let id: IdRef = main.add_object(Object::new("Ob", ObjectType::Empty)).into();
        let key = |opcode| OperationKey::new(id, NodeType::Transform, opcode);
        [
            graph.add_operation_node(&key(OperationCode::TransformInit)),
            graph.add_operation_node(&key(OperationCode::TransformLocal)),
            graph.add_operation_node(&key(OperationCode::TransformFinal)),
        ]
    }

    #[test]
    fn acyclic_graph_is_untouched() {
        let mut graph = Depsgraph::new(EvalMode::Viewport);
        let [a, b, c] = ops(&mut graph);
        graph.add_new_relation(a.into(), b.into(), "a -> b", RelationFlags::empty());
        graph.add_new_relation(a.into(), c.into(), "a -> c", RelationFlags::empty());
        graph.add_new_relation(b.into(), c.into(), "b -> c", RelationFlags::empty());
        assert_eq!(graph.detect_cycles(), 0);
        assert_eq!(graph.stats().cyclic_relations, 0);
    }

    #[test]
    fn closing_relation_is_flagged() {
        let mut graph = Depsgraph::new(EvalMode::Viewport);
        let [a, b, c] = ops(&mut graph);
        graph.add_new_relation(a.into(), b.into(), "a -> b", RelationFlags::empty());
        graph.add_new_relation(b.into(), c.into(), "b -> c", RelationFlags::empty());
        let back = graph.add_new_relation(c.into(), a.into(), "c -> a", RelationFlags::empty());

        assert_eq!(graph.detect_cycles(), 1);
        assert!(graph.relation(back).flags.contains(RelationFlags::CYCLIC));
        assert!(graph.evaluation_order().is_ok(), "schedulable once flagged");
    }

    #[test]
    fn godmode_relations_survive() {
        let mut graph = Depsgraph::new(EvalMode::Viewport);
        let [a, b, _] = ops(&mut graph);
        let forward = graph.add_new_relation(a.into(), b.into(), "a -> b", RelationFlags::empty());
        let back = graph.add_new_relation(b.into(), a.into(), "b -> a", RelationFlags::GODMODE);

        assert_eq!(graph.detect_cycles(), 1);
        assert!(!graph.relation(back).flags.contains(RelationFlags::CYCLIC));
        assert!(graph.relation(forward).flags.contains(RelationFlags::CYCLIC));
    }
}
