// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The dependency graph: node tables, relation table and key lookup.

use alloc::vec::Vec;

use canopy_scene::{EvalMode, IdRef};
use hashbrown::HashMap;

use crate::intern::{NameId, NameInterner};
use crate::key::{ComponentKey, NodeKey, NodeType, OperationCode, OperationKey};
use crate::node::{
    ComponentId, ComponentNode, IdNode, IdNodeId, NodeRef, OperationId, OperationNode,
    TimeSourceNode,
};
use crate::relation::{Relation, RelationFlags, RelationId};

/// Node and relation counts of a graph.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DepsgraphStats {
    /// Number of ID nodes.
    pub id_nodes: usize,
    /// Number of component nodes.
    pub components: usize,
    /// Number of operation nodes.
    pub operations: usize,
    /// Number of relations.
    pub relations: usize,
    /// Number of relations flagged [`RelationFlags::CYCLIC`].
    pub cyclic_relations: usize,
}

/// Which endpoint of a relation a component key is resolved for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Endpoint {
    From,
    To,
}

/// A scene dependency graph.
///
/// Nodes are never removed; the graph is rebuilt from scratch whenever the
/// scene topology changes. Between rebuilds only update flags change.
#[derive(Clone, Debug)]
pub struct Depsgraph {
    mode: EvalMode,
    pub(crate) names: NameInterner,
    pub(crate) time_source: TimeSourceNode,
    pub(crate) id_nodes: Vec<IdNode>,
    id_map: HashMap<IdRef, IdNodeId>,
    pub(crate) components: Vec<ComponentNode>,
    pub(crate) operations: Vec<OperationNode>,
    pub(crate) relations: Vec<Relation>,
    relation_index: HashMap<(NodeRef, NodeRef, &'static str), RelationId>,
    pub(crate) entry_tags: Vec<NodeRef>,
}

impl Depsgraph {
    /// Creates an empty graph for the given evaluation mode.
    #[must_use]
    pub fn new(mode: EvalMode) -> Self {
        Self {
            mode,
            names: NameInterner::new(),
            time_source: TimeSourceNode::default(),
            id_nodes: Vec::new(),
            id_map: HashMap::new(),
            components: Vec::new(),
            operations: Vec::new(),
            relations: Vec::new(),
            relation_index: HashMap::new(),
            entry_tags: Vec::new(),
        }
    }

    /// The evaluation mode the graph was built for.
    #[must_use]
    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    /// Returns the ID node for `id`, creating it if needed.
    pub fn add_id_node(&mut self, id: IdRef) -> IdNodeId {
        if let Some(&node) = self.id_map.get(&id) {
            return node;
        }
        let node = IdNodeId(
            u32::try_from(self.id_nodes.len()).expect("too many ID nodes for IdNodeId (u32)"),
        );
        self.id_nodes.push(IdNode::new(id));
        self.id_map.insert(id, node);
        node
    }

    /// Returns the ID node for `id`, if built.
    #[must_use]
    pub fn find_id_node(&self, id: IdRef) -> Option<IdNodeId> {
        self.id_map.get(&id).copied()
    }

    /// Returns the component for `key`, creating it and its ID node if needed.
    pub fn add_component_node(&mut self, key: &ComponentKey<'_>) -> ComponentId {
        let owner = self.add_id_node(key.id);
        let name = self.names.intern(key.name);
        if let Some(&comp) = self.id_nodes[owner.index()].components.get(&(key.kind, name)) {
            return comp;
        }
        let comp = ComponentId(
            u32::try_from(self.components.len())
                .expect("too many component nodes for ComponentId (u32)"),
        );
        self.components.push(ComponentNode::new(owner, key.kind, name));
        let id_node = &mut self.id_nodes[owner.index()];
        id_node.components.insert((key.kind, name), comp);
        id_node.component_order.push(comp);
        comp
    }

    /// Returns the component for `key`, if built.
    #[must_use]
    pub fn find_component(&self, key: &ComponentKey<'_>) -> Option<ComponentId> {
        let owner = self.find_id_node(key.id)?;
        let name = self.names.find(key.name)?;
        self.id_nodes[owner.index()]
            .components
            .get(&(key.kind, name))
            .copied()
    }

    /// Returns the operation for `key`, creating it and its owners if needed.
    pub fn add_operation_node(&mut self, key: &OperationKey<'_>) -> OperationId {
        let comp = self.add_component_node(&key.component);
        let name = self.names.intern(key.name);
        let map_key = (key.opcode, name, key.name_tag);
        if let Some(&op) = self.components[comp.index()].operation_map.get(&map_key) {
            return op;
        }
        let op = OperationId(
            u32::try_from(self.operations.len())
                .expect("too many operation nodes for OperationId (u32)"),
        );
        self.operations
            .push(OperationNode::new(comp, key.opcode, name, key.name_tag));
        let component = &mut self.components[comp.index()];
        component.operation_map.insert(map_key, op);
        component.operations.push(op);
        op
    }

    /// Returns the operation for `key`, if built.
    #[must_use]
    pub fn find_operation(&self, key: &OperationKey<'_>) -> Option<OperationId> {
        let comp = self.find_component(&key.component)?;
        let name = self.names.find(key.name)?;
        self.components[comp.index()]
            .operation_map
            .get(&(key.opcode, name, key.name_tag))
            .copied()
    }

    /// Returns `true` if an operation for `key` exists.
    #[must_use]
    pub fn has_operation(&self, key: &OperationKey<'_>) -> bool {
        self.find_operation(key).is_some()
    }

    /// Designates `op` as the entry operation of its component.
    pub fn set_entry(&mut self, op: OperationId) {
        let comp = self.operations[op.index()].owner;
        self.components[comp.index()].entry = Some(op);
    }

    /// Designates `op` as the exit operation of its component.
    pub fn set_exit(&mut self, op: OperationId) {
        let comp = self.operations[op.index()].owner;
        self.components[comp.index()].exit = Some(op);
    }

    /// Resolves a key to a relation source (component exit operation).
    #[must_use]
    pub fn resolve_from(&self, key: &NodeKey<'_>) -> Option<NodeRef> {
        self.resolve(key, Endpoint::From)
    }

    /// Resolves a key to a relation target (component entry operation).
    #[must_use]
    pub fn resolve_to(&self, key: &NodeKey<'_>) -> Option<NodeRef> {
        self.resolve(key, Endpoint::To)
    }

    fn resolve(&self, key: &NodeKey<'_>, endpoint: Endpoint) -> Option<NodeRef> {
        match key {
            NodeKey::TimeSource => Some(NodeRef::TimeSource),
            NodeKey::Operation(key) => self.find_operation(key).map(NodeRef::Operation),
            NodeKey::Component(key) => {
                let comp = &self.components[self.find_component(key)?.index()];
                let op = match endpoint {
                    Endpoint::From => comp.exit_operation(),
                    Endpoint::To => comp.entry_operation(),
                };
                op.map(NodeRef::Operation)
            }
        }
    }

    /// Adds a relation `from -> to`.
    ///
    /// With [`RelationFlags::CHECK_BEFORE_ADD`] an existing relation with the
    /// same endpoints and description is reused and gains the new flags.
    pub fn add_new_relation(
        &mut self,
        from: NodeRef,
        to: NodeRef,
        name: &'static str,
        flags: RelationFlags,
    ) -> RelationId {
        let stored = flags - RelationFlags::CHECK_BEFORE_ADD;
        if flags.contains(RelationFlags::CHECK_BEFORE_ADD)
            && let Some(&existing) = self.relation_index.get(&(from, to, name))
        {
            self.relations[existing.index()].flags |= stored;
            return existing;
        }
        let rel = RelationId(
            u32::try_from(self.relations.len()).expect("too many relations for RelationId (u32)"),
        );
        self.relations.push(Relation {
            from,
            to,
            name,
            flags: stored,
        });
        self.relation_index.entry((from, to, name)).or_insert(rel);
        self.link(rel);
        log::trace!("relation {name}: {from:?} -> {to:?}");
        rel
    }

    fn link(&mut self, rel: RelationId) {
        let Relation { from, to, .. } = self.relations[rel.index()];
        match from {
            NodeRef::TimeSource => self.time_source.outlinks.push(rel),
            NodeRef::Operation(op) => self.operations[op.index()].outlinks.push(rel),
        }
        if let NodeRef::Operation(op) = to {
            self.operations[op.index()].inlinks.push(rel);
        }
    }

    /// Keeps only the relations for which `keep` returns `true`.
    ///
    /// Relation ids are compacted, so ids taken before the call are invalid.
    pub(crate) fn retain_relations(
        &mut self,
        mut keep: impl FnMut(RelationId, &Relation) -> bool,
    ) {
        let old = core::mem::take(&mut self.relations);
        self.relation_index.clear();
        self.time_source.outlinks.clear();
        for op in &mut self.operations {
            op.inlinks.clear();
            op.outlinks.clear();
        }
        for (index, relation) in old.into_iter().enumerate() {
            let Ok(old_id) = u32::try_from(index) else {
                break;
            };
            if !keep(RelationId(old_id), &relation) {
                continue;
            }
            let Ok(new_id) = u32::try_from(self.relations.len()) else {
                break;
            };
            let rel = RelationId(new_id);
            self.relation_index
                .entry((relation.from, relation.to, relation.name))
                .or_insert(rel);
            self.relations.push(relation);
            self.link(rel);
        }
    }

    /// Returns the relation for `rel`.
    ///
    /// # Panics
    ///
    /// Panics if `rel` is out of range.
    #[must_use]
    pub fn relation(&self, rel: RelationId) -> &Relation {
        &self.relations[rel.index()]
    }

    /// Iterates over all relations.
    pub fn relations(&self) -> impl Iterator<Item = (RelationId, &Relation)> + '_ {
        (0_u32..)
            .zip(self.relations.iter())
            .map(|(index, relation)| (RelationId(index), relation))
    }

    /// Returns the first relation `from -> to`, if any.
    #[must_use]
    pub fn find_relation(&self, from: NodeRef, to: NodeRef) -> Option<&Relation> {
        let outlinks = match from {
            NodeRef::TimeSource => &self.time_source.outlinks,
            NodeRef::Operation(op) => &self.operations.get(op.index())?.outlinks,
        };
        outlinks
            .iter()
            .map(|rel| &self.relations[rel.index()])
            .find(|relation| relation.to == to)
    }

    /// Returns the first relation between two keys, resolving components the
    /// same way [`add_new_relation`](Self::add_new_relation) callers do.
    #[must_use]
    pub fn relation_between<'k>(
        &self,
        from: impl Into<NodeKey<'k>>,
        to: impl Into<NodeKey<'k>>,
    ) -> Option<&Relation> {
        let from = self.resolve_from(&from.into())?;
        let to = self.resolve_to(&to.into())?;
        self.find_relation(from, to)
    }

    /// Returns the ID node for `node`.
    #[must_use]
    pub fn id_node(&self, node: IdNodeId) -> &IdNode {
        &self.id_nodes[node.index()]
    }

    /// Mutable access to the ID node for `node`.
    pub fn id_node_mut(&mut self, node: IdNodeId) -> &mut IdNode {
        &mut self.id_nodes[node.index()]
    }

    /// Iterates over all ID nodes in creation order.
    pub fn id_nodes(&self) -> impl Iterator<Item = (IdNodeId, &IdNode)> + '_ {
        (0_u32..)
            .zip(self.id_nodes.iter())
            .map(|(index, node)| (IdNodeId(index), node))
    }

    /// Returns the component for `comp`.
    #[must_use]
    pub fn component(&self, comp: ComponentId) -> &ComponentNode {
        &self.components[comp.index()]
    }

    /// Returns the operation for `op`.
    #[must_use]
    pub fn operation(&self, op: OperationId) -> &OperationNode {
        &self.operations[op.index()]
    }

    /// Number of operation nodes.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Iterates over all operations in creation order.
    pub fn operations(&self) -> impl Iterator<Item = (OperationId, &OperationNode)> + '_ {
        (0_u32..)
            .zip(self.operations.iter())
            .map(|(index, node)| (OperationId(index), node))
    }

    /// The time source node.
    #[must_use]
    pub fn time_source(&self) -> &TimeSourceNode {
        &self.time_source
    }

    /// Resolves an interned node name.
    #[must_use]
    pub fn name(&self, name: NameId) -> &str {
        self.names.resolve(name)
    }

    /// The entity owning `op`.
    #[must_use]
    pub fn operation_owner(&self, op: OperationId) -> IdRef {
        let comp = self.operations[op.index()].owner;
        self.id_nodes[self.components[comp.index()].owner.index()].id
    }

    /// Rebuilds a key describing `op`, for diagnostics and tests.
    #[must_use]
    pub fn operation_key(&self, op: OperationId) -> OperationKey<'_> {
        let node = &self.operations[op.index()];
        let comp = &self.components[node.owner.index()];
        OperationKey {
            component: ComponentKey {
                id: self.id_nodes[comp.owner.index()].id,
                kind: comp.kind,
                name: self.names.resolve(comp.name),
            },
            opcode: node.opcode,
            name: self.names.resolve(node.name),
            name_tag: node.name_tag,
        }
    }

    /// Returns `true` if the component `kind` of `id` exists.
    #[must_use]
    pub fn has_component(&self, id: IdRef, kind: NodeType) -> bool {
        self.find_component(&ComponentKey::new(id, kind)).is_some()
    }

    /// Counts nodes and relations.
    #[must_use]
    pub fn stats(&self) -> DepsgraphStats {
        DepsgraphStats {
            id_nodes: self.id_nodes.len(),
            components: self.components.len(),
            operations: self.operations.len(),
            relations: self.relations.len(),
            cyclic_relations: self
                .relations
                .iter()
                .filter(|r| r.flags.contains(RelationFlags::CYCLIC))
                .count(),
        }
    }

    pub(crate) fn opcode(&self, op: OperationId) -> OperationCode {
        self.operations[op.index()].opcode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_scene::{Main, Object, ObjectType};

    fn transform_keys(main: &mut Main) -> (IdRef, OperationKey<'static>, OperationKey<'static>) {
        let ob: IdRef = main.add_object(Object::new("Ob", ObjectType::Empty)).into();
        let local = OperationKey::new(ob, NodeType::Transform, OperationCode::TransformLocal);
        let fin = OperationKey::new(ob, NodeType::Transform, OperationCode::TransformFinal);
        (ob, local, fin)
    }

    #[test]
    fn node_lookup_is_memoized() {
        let mut main = Main::new();
        let (ob, local, _) = transform_keys(&mut main);
        let mut graph = Depsgraph::new(EvalMode::Viewport);

        let a = graph.add_operation_node(&local);
        let b = graph.add_operation_node(&local);
        assert_eq!(a, b, "same key returns the same node");
        assert_eq!(graph.find_operation(&local), Some(a), "lookup finds it");
        assert_eq!(graph.operation_owner(a), ob, "owner is the object");
        assert_eq!(graph.stats().components, 1, "one transform component");
    }

    #[test]
    fn component_endpoints_use_entry_and_exit() {
        let mut main = Main::new();
        let (ob, local, fin) = transform_keys(&mut main);
        let mut graph = Depsgraph::new(EvalMode::Viewport);
        let l = graph.add_operation_node(&local);
        let f = graph.add_operation_node(&fin);

        let comp = ComponentKey::new(ob, NodeType::Transform);
        assert_eq!(graph.resolve_to(&comp.into()), None, "ambiguous without entry");
        graph.set_entry(l);
        graph.set_exit(f);
        assert_eq!(graph.resolve_to(&comp.into()), Some(NodeRef::Operation(l)));
        assert_eq!(graph.resolve_from(&comp.into()), Some(NodeRef::Operation(f)));
    }

    #[test]
    fn check_before_add_merges_flags() {
        let mut main = Main::new();
        let (_, local, fin) = transform_keys(&mut main);
        let mut graph = Depsgraph::new(EvalMode::Viewport);
        let l = NodeRef::Operation(graph.add_operation_node(&local));
        let f = NodeRef::Operation(graph.add_operation_node(&fin));

        let a = graph.add_new_relation(l, f, "Local -> Final", RelationFlags::CHECK_BEFORE_ADD);
        let b = graph.add_new_relation(
            l,
            f,
            "Local -> Final",
            RelationFlags::CHECK_BEFORE_ADD | RelationFlags::NO_FLUSH,
        );
        assert_eq!(a, b, "deduplicated");
        assert_eq!(
            graph.relation(a).flags,
            RelationFlags::NO_FLUSH,
            "flags are merged and the insertion flag is dropped"
        );

        graph.add_new_relation(l, f, "Local -> Final", RelationFlags::empty());
        assert_eq!(graph.stats().relations, 2, "no dedup without the flag");
    }

    #[test]
    fn retain_relations_relinks() {
        let mut main = Main::new();
        let (_, local, fin) = transform_keys(&mut main);
        let mut graph = Depsgraph::new(EvalMode::Viewport);
        let l = graph.add_operation_node(&local);
        let f = graph.add_operation_node(&fin);
        graph.add_new_relation(NodeRef::TimeSource, l.into(), "Time", RelationFlags::empty());
        graph.add_new_relation(l.into(), f.into(), "Local", RelationFlags::empty());

        graph.retain_relations(|_, r| r.from != NodeRef::TimeSource);
        assert_eq!(graph.stats().relations, 1, "time relation dropped");
        assert!(graph.time_source().outlinks().is_empty(), "time source unlinked");
        assert_eq!(graph.operation(f).inlinks().len(), 1, "remaining link kept");
    }
}
