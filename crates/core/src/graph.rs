/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! The ScriptGraph: an arena of bindable nodes (Tasks and Conditions) plus their Context.
//!
//! Nodes live in a flat `Vec` and refer to each other by `NodeId`, so there are no
//! back-pointers to keep alive and a graph can be duplicated with a plain clone of the
//! arena. Each node gets a `BindingId` derived from the graph seed and its slot, which
//! keeps the IDs (and so every PropertyPath authored against a template) stable across
//! duplicates.
//!
//! Nested graphs (e.g. the runtime instance of an Action asset, or the Conditions of a
//! group) are owned by the node behaviour that needs them. Bindings never cross graph
//! boundaries; values flow into nested graphs through their Context.

use bevy::prelude::Entity;
use bevy::reflect::PartialReflect;

use crate::action::Sequence;
use crate::bindings::{PropertyBindings, SourceView};
use crate::compatibility::{are_compatible, PropertyDescriptor};
use crate::condition::{ConditionSlot, ScriptableCondition};
use crate::context::Context;
use crate::errors::{GraphError, PathParseError};
use crate::identifiers::{graph_seed_from_name, BindingId, NodeId};
use crate::object_ref::ClassHierarchy;
use crate::property_path::PropertyPath;
use crate::task::{ScriptableTask, TaskControl, TaskSlot};
use crate::types::ClassHierarchyRef;


/// Passed to the `on_register()`/`on_unregister()` hooks of node behaviours.
pub struct RegisterCx<'a> {
    pub(crate) node: NodeId,
    pub(crate) owner: Option<Entity>,
    pub(crate) context: &'a Context,
    pub(crate) classes: &'a ClassHierarchyRef,
}

impl<'a> RegisterCx<'a> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The host object the graph is being registered for.
    pub fn owner(&self) -> Option<Entity> {
        self.owner
    }

    /// The Context of the graph the node lives in.
    pub fn context(&self) -> &'a Context {
        self.context
    }

    pub fn classes(&self) -> &'a ClassHierarchyRef {
        self.classes
    }
}


pub(crate) enum NodeKind {
    Task(TaskSlot),
    Condition(ConditionSlot),
}

impl NodeKind {
    pub(crate) fn as_partial_reflect(&self) -> &dyn PartialReflect {
        match self {
            Self::Task(slot) => (*slot.behaviour).as_partial_reflect(),
            Self::Condition(slot) => (*slot.behaviour).as_partial_reflect(),
        }
    }

    pub(crate) fn as_partial_reflect_mut(&mut self) -> &mut dyn PartialReflect {
        match self {
            Self::Task(slot) => (*slot.behaviour).as_partial_reflect_mut(),
            Self::Condition(slot) => (*slot.behaviour).as_partial_reflect_mut(),
        }
    }

    fn allows_sibling_bindings(&self) -> bool {
        match self {
            Self::Task(slot) => slot.behaviour.allows_sibling_bindings(),
            Self::Condition(slot) => slot.behaviour.allows_sibling_bindings(),
        }
    }

    fn on_register(&mut self, cx: &RegisterCx) {
        match self {
            Self::Task(slot) => slot.behaviour.on_register(cx),
            Self::Condition(slot) => slot.behaviour.on_register(cx),
        }
    }

    fn on_unregister(&mut self, cx: &RegisterCx) {
        match self {
            Self::Task(slot) => {
                slot.behaviour.on_unregister(cx);
                slot.clear_channels();
                slot.tick_enabled = false;
                slot.pending_finish = false;
            },
            Self::Condition(slot) => slot.behaviour.on_unregister(cx),
        }
    }

    fn duplicate(&self) -> Self {
        match self {
            Self::Task(slot) => Self::Task(slot.duplicate()),
            Self::Condition(slot) => Self::Condition(slot.duplicate()),
        }
    }
}


pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) binding_id: BindingId,
    pub(crate) enabled: bool,
    pub(crate) registered: bool,
    pub(crate) bindings: PropertyBindings,
    pub(crate) kind: NodeKind,
}


/// An arena of Tasks and Conditions sharing one Context.
pub struct ScriptGraph {
    name: String,
    seed: u64,
    pub(crate) nodes: Vec<Node>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) context: Context,
    pub(crate) classes: ClassHierarchyRef,
    pub(crate) owner: Option<Entity>,
    registered: bool,
    pub(crate) sequence: Sequence,
}

impl Default for ScriptGraph {
    fn default() -> Self {
        Self::new("")
    }
}

impl core::fmt::Debug for ScriptGraph {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScriptGraph")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots)
            .field("context", &self.context)
            .field("registered", &self.registered)
            .finish()
    }
}

impl ScriptGraph {
    /// Creates an empty graph. The name seeds the BindingIds of its nodes.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            seed: graph_seed_from_name(&name),
            name,
            nodes: Vec::new(),
            roots: Vec::new(),
            context: Context::default(),
            classes: ClassHierarchyRef::new(ClassHierarchy::default()),
            owner: None,
            registered: false,
            sequence: Sequence::default(),
        }
    }

    /// Builder-style; sets the class directory used for reference compatibility checks.
    pub fn with_classes(mut self, classes: ClassHierarchyRef) -> Self {
        self.classes = classes;
        self
    }

    /// Builder-style; sets the Context.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classes(&self) -> &ClassHierarchyRef {
        &self.classes
    }

    pub fn set_classes(&mut self, classes: ClassHierarchyRef) {
        self.classes = classes;
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn owner(&self) -> Option<Entity> {
        self.owner
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.nodes.len()
    }

    pub(crate) fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node.index())
    }

    pub(crate) fn node_mut(&mut self, node: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node.index())
    }

    /// Adds a Task under `parent` (or as a new root).
    pub fn add_task(&mut self, parent: Option<NodeId>, task: impl ScriptableTask) -> Result<NodeId, GraphError> {
        self.add_task_with_control(parent, task, TaskControl::default())
    }

    pub fn add_task_with_control(
        &mut self,
        parent: Option<NodeId>,
        task: impl ScriptableTask,
        control: TaskControl,
    ) -> Result<NodeId, GraphError> {
        self.push_node(parent, NodeKind::Task(TaskSlot::new(Box::new(task), control)))
    }

    /// Adds a Condition under `parent` (or as a new root).
    pub fn add_condition(&mut self, parent: Option<NodeId>, condition: impl ScriptableCondition) -> Result<NodeId, GraphError> {
        self.push_node(parent, NodeKind::Condition(ConditionSlot::new(Box::new(condition))))
    }

    fn push_node(&mut self, parent: Option<NodeId>, kind: NodeKind) -> Result<NodeId, GraphError> {
        if self.registered {
            return Err(GraphError::GraphRegistered);
        }
        if let Some(parent_id) = parent {
            if !self.contains(parent_id) {
                return Err(GraphError::UnknownNode(parent_id));
            }
        }

        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            binding_id: BindingId::from_slot(self.seed, id.0),
            enabled: true,
            registered: false,
            bindings: PropertyBindings::default(),
            kind,
        });

        match parent {
            Some(parent_id) => self.nodes[parent_id.index()].children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn binding_id(&self, node: NodeId) -> Option<BindingId> {
        self.node(node).map(|n| n.binding_id)
    }

    /// The node whose BindingId is `binding_id`, if any.
    pub fn find_by_binding_id(&self, binding_id: BindingId) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.binding_id == binding_id)
            .map(NodeId::from_index)
    }

    pub fn is_enabled(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|n| n.enabled)
    }

    pub fn set_enabled(&mut self, node: NodeId, enabled: bool) {
        if let Some(n) = self.node_mut(node) {
            n.enabled = enabled;
        }
    }

    pub fn is_node_registered(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|n| n.registered)
    }

    /// Reflected view of a node's behaviour (its bindable properties).
    pub fn behaviour(&self, node: NodeId) -> Option<&dyn PartialReflect> {
        self.node(node).map(|n| n.kind.as_partial_reflect())
    }

    pub fn behaviour_mut(&mut self, node: NodeId) -> Option<&mut dyn PartialReflect> {
        self.node_mut(node).map(|n| n.kind.as_partial_reflect_mut())
    }

    /// Parses `text` as a path into the properties of `node`.
    pub fn node_path(&self, node: NodeId, text: &str) -> Result<PropertyPath, PathParseError> {
        PropertyPath::parse(self.binding_id(node).unwrap_or_default(), text)
    }

    /// Every node in parent-first order, roots in declaration order.
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![node];

        while let Some(id) = stack.pop() {
            if !self.contains(id) {
                continue;
            }
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Nodes whose properties `node` may bind to: its ancestors, nearest first, then the
    /// siblings preceding it (and preceding each of its ancestors), nearest first.
    ///
    /// A parent whose behaviour disallows sibling bindings hides its children's siblings.
    /// The roots count as siblings of each other.
    pub(crate) fn accessible_nodes(&self, node: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut siblings = Vec::new();
        let mut current = node;

        while self.contains(current) {
            let parent = self.parent(current);
            let (allowed, peers) = match parent {
                Some(parent_id) => (
                    self.nodes[parent_id.index()].kind.allows_sibling_bindings(),
                    self.children(parent_id),
                ),
                None => (true, self.roots.as_slice()),
            };

            if allowed {
                let position = peers.iter().position(|peer| *peer == current).unwrap_or(0);
                siblings.extend(peers[..position].iter().rev().copied());
            }

            match parent {
                Some(parent_id) => {
                    ancestors.push(parent_id);
                    current = parent_id;
                },
                None => break,
            }
        }

        ancestors.extend(siblings);
        ancestors
    }

    /// BindingIds of every struct `node` may bind to, the Context first.
    pub fn accessible_structs(&self, node: NodeId) -> Vec<BindingId> {
        if !self.contains(node) {
            return Vec::new();
        }

        let mut structs = vec![BindingId::CONTEXT];
        structs.extend(self.accessible_nodes(node).into_iter().map(|id| self.nodes[id.index()].binding_id));
        structs
    }

    fn source_view(&self, binding_id: BindingId, accessible: &[NodeId]) -> Option<SourceView<'_>> {
        if binding_id.is_context() {
            return Some(SourceView::Context(&self.context));
        }

        accessible
            .iter()
            .map(|id| &self.nodes[id.index()])
            .find(|n| n.binding_id == binding_id)
            .map(|n| SourceView::Struct(n.kind.as_partial_reflect()))
    }

    /// Copies every resolvable binding of `node` into it. Returns the number of copies made.
    pub fn resolve_bindings(&mut self, node: NodeId) -> usize {
        match self.node(node) {
            Some(target) if !target.bindings.is_empty() => {},
            _ => return 0,
        }

        let accessible = self.accessible_nodes(node);
        let classes = self.classes.clone();

        let pending = {
            let this = &*self;
            this.nodes[node.index()].bindings.read_sources(
                |binding_id| this.source_view(binding_id, &accessible),
                &classes,
            )
        };

        let target = self.nodes[node.index()].kind.as_partial_reflect_mut();
        let mut copied = 0;
        for copy in pending {
            if copy.apply(target, &classes) {
                copied += 1;
            }
        }
        copied
    }

    /// Resolves the bindings of `node` and everything below it, parent-first.
    pub fn resolve_subtree_bindings(&mut self, node: NodeId) -> usize {
        self.subtree(node)
            .into_iter()
            .map(|id| self.resolve_bindings(id))
            .sum()
    }

    /// Resolves every binding in the graph, parent-first.
    pub fn resolve_all_bindings(&mut self) -> usize {
        self.pre_order()
            .into_iter()
            .map(|id| self.resolve_bindings(id))
            .sum()
    }

    pub fn add_property_binding(
        &mut self,
        node: NodeId,
        source_path: PropertyPath,
        target_path: PropertyPath,
    ) -> Result<(), GraphError> {
        let n = self.node_mut(node).ok_or(GraphError::UnknownNode(node))?;
        n.bindings.add_property_binding(source_path, target_path);
        Ok(())
    }

    pub fn remove_property_bindings(&mut self, node: NodeId, target_path: &PropertyPath) {
        if let Some(n) = self.node_mut(node) {
            n.bindings.remove_property_bindings(target_path);
        }
    }

    pub fn has_property_binding(&self, node: NodeId, target_path: &PropertyPath) -> bool {
        self.node(node).is_some_and(|n| n.bindings.has_property_binding(target_path))
    }

    pub fn get_property_binding(&self, node: NodeId, target_path: &PropertyPath) -> Option<&PropertyPath> {
        self.node(node).and_then(|n| n.bindings.get_property_binding(target_path))
    }

    pub fn property_bindings(&self, node: NodeId) -> Option<&PropertyBindings> {
        self.node(node).map(|n| &n.bindings)
    }

    /// Authoring-time check: would a binding from `source_path` into `target_path` of
    /// `node` be legal given the current values?
    pub fn can_bind(&self, node: NodeId, source_path: &PropertyPath, target_path: &PropertyPath) -> bool {
        let Some(target) = self.node(node) else {
            return false;
        };

        let accessible = self.accessible_nodes(node);
        let source_leaf = self
            .source_view(source_path.struct_id, &accessible)
            .and_then(|view| view.resolve(source_path).ok());
        let target_leaf = target_path.resolve(target.kind.as_partial_reflect()).ok();

        match (source_leaf, target_leaf) {
            (Some(src), Some(tgt)) => {
                let src_desc = PropertyDescriptor::of_value(src.leaf, &self.classes);
                let tgt_desc = PropertyDescriptor::of_value(tgt.leaf, &self.classes);
                match (src_desc, tgt_desc) {
                    (Some(src_desc), Some(tgt_desc)) => are_compatible(&src_desc, &tgt_desc, &self.classes),
                    _ => false,
                }
            },
            _ => false,
        }
    }

    /// Registers every node, parent-first, on behalf of `owner`.
    ///
    /// Must happen before any binding resolution, evaluation or execution.
    pub fn register(&mut self, owner: Option<Entity>) {
        if self.registered {
            #[cfg(feature = "logging")]
            bevy::log::warn!("ScriptGraph {:?} is already registered, ignoring", self.name);
            return;
        }

        self.registered = true;
        self.owner = owner;
        let order = self.pre_order();

        let Self { nodes, context, classes, .. } = self;
        for id in order {
            let node = &mut nodes[id.index()];
            if node.registered {
                continue;
            }
            node.registered = true;

            let cx = RegisterCx { node: id, owner, context: &*context, classes: &*classes };
            node.kind.on_register(&cx);
        }

        #[cfg(feature = "logging")]
        bevy::log::debug!("Registered ScriptGraph {:?} for {:?}", self.name, owner);
    }

    /// Unregisters every node, parent-first, releasing owned runtime instances and clearing
    /// all Task broadcast channels. Safe to call repeatedly or on a never-registered graph.
    pub fn unregister(&mut self) {
        if !self.registered {
            return;
        }

        let owner = self.owner;
        let order = self.pre_order();

        let Self { nodes, context, classes, .. } = self;
        for id in order {
            let node = &mut nodes[id.index()];
            if !node.registered {
                continue;
            }

            let cx = RegisterCx { node: id, owner, context: &*context, classes: &*classes };
            node.kind.on_unregister(&cx);
            node.registered = false;
        }

        self.registered = false;
        self.owner = None;
        self.sequence.running = false;
        self.sequence.current = None;

        #[cfg(feature = "logging")]
        bevy::log::debug!("Unregistered ScriptGraph {:?}", self.name);
    }

    /// A fresh, unregistered copy: same layout, BindingIds, bindings, controls and Context,
    /// with behaviours cloned and no listeners or runtime state.
    pub fn duplicate(&self) -> Self {
        Self {
            name: self.name.clone(),
            seed: self.seed,
            nodes: self.nodes
                .iter()
                .map(|n| Node {
                    parent: n.parent,
                    children: n.children.clone(),
                    binding_id: n.binding_id,
                    enabled: n.enabled,
                    registered: false,
                    bindings: n.bindings.clone(),
                    kind: n.kind.duplicate(),
                })
                .collect(),
            roots: self.roots.clone(),
            context: self.context.clone(),
            classes: self.classes.clone(),
            owner: None,
            registered: false,
            sequence: Sequence::default(),
        }
    }
}


#[cfg(test)]
mod tests {
    use bevy::reflect::Reflect;
    use crate::task::ScriptableTask;
    use super::*;

    #[derive(Reflect, Clone, Debug, Default)]
    struct Holder {
        value: f32,
        wide: f64,
    }

    impl ScriptableTask for Holder {}

    #[derive(Reflect, Clone, Debug, Default)]
    struct Isolating;

    impl ScriptableTask for Isolating {
        fn allows_sibling_bindings(&self) -> bool {
            false
        }
    }

    fn holder(graph: &ScriptGraph, node: NodeId) -> &Holder {
        graph.behaviour(node).and_then(|b| b.try_downcast_ref::<Holder>()).unwrap()
    }

    #[test]
    fn binding_ids_are_unique_and_survive_duplication() {
        let mut graph = ScriptGraph::new("Template");
        let a = graph.add_task(None, Holder::default()).unwrap();
        let b = graph.add_task(Some(a), Holder::default()).unwrap();

        let id_a = graph.binding_id(a).unwrap();
        let id_b = graph.binding_id(b).unwrap();
        assert_ne!(id_a, id_b);
        assert!(id_a.is_valid() && !id_a.is_context());

        let copy = graph.duplicate();
        assert_eq!(copy.binding_id(a), Some(id_a));
        assert_eq!(copy.binding_id(b), Some(id_b));
        assert_eq!(copy.find_by_binding_id(id_b), Some(b));
    }

    #[test]
    fn accessible_structs_cover_context_ancestors_and_previous_siblings() {
        let mut graph = ScriptGraph::new("Access");
        let first_root = graph.add_task(None, Holder::default()).unwrap();
        let parent = graph.add_task(None, Holder::default()).unwrap();
        let older = graph.add_task(Some(parent), Holder::default()).unwrap();
        let me = graph.add_task(Some(parent), Holder::default()).unwrap();
        let younger = graph.add_task(Some(parent), Holder::default()).unwrap();

        let accessible = graph.accessible_structs(me);
        let id = |n| graph.binding_id(n).unwrap();

        assert_eq!(accessible, vec![BindingId::CONTEXT, id(parent), id(older), id(first_root)]);
        assert!(!accessible.contains(&id(younger)));
        assert!(!accessible.contains(&id(me)));
    }

    #[test]
    fn parents_can_block_sibling_bindings() {
        let mut graph = ScriptGraph::new("Blocked");
        let parent = graph.add_task(None, Isolating).unwrap();
        let older = graph.add_task(Some(parent), Holder::default()).unwrap();
        let me = graph.add_task(Some(parent), Holder::default()).unwrap();

        let accessible = graph.accessible_structs(me);
        assert!(accessible.contains(&graph.binding_id(parent).unwrap()));
        assert!(!accessible.contains(&graph.binding_id(older).unwrap()));
    }

    #[test]
    fn resolves_from_siblings_and_context() {
        let mut graph = ScriptGraph::new("Resolve")
            .with_context(Context::new().with("range", 4.5f32));

        let source = graph.add_task(None, Holder { value: 2.0, wide: 0.0 }).unwrap();
        let target = graph.add_task(None, Holder::default()).unwrap();

        let from_sibling = graph.node_path(source, "value").unwrap();
        let into_wide = graph.node_path(target, "wide").unwrap();
        let into_value = graph.node_path(target, "value").unwrap();
        graph.add_property_binding(target, from_sibling, into_wide).unwrap();
        graph.add_property_binding(target, PropertyPath::context("range").unwrap(), into_value).unwrap();

        assert_eq!(graph.resolve_bindings(target), 2);
        assert_eq!(holder(&graph, target).wide, 2.0);
        assert_eq!(holder(&graph, target).value, 4.5);
    }

    #[test]
    fn later_siblings_are_not_sources() {
        let mut graph = ScriptGraph::new("Order");
        let target = graph.add_task(None, Holder::default()).unwrap();
        let source = graph.add_task(None, Holder { value: 2.0, wide: 0.0 }).unwrap();

        let path = graph.node_path(source, "value").unwrap();
        let into = graph.node_path(target, "value").unwrap();
        assert!(!graph.can_bind(target, &path, &into));

        graph.add_property_binding(target, path, into).unwrap();
        assert_eq!(graph.resolve_bindings(target), 0);
        assert_eq!(holder(&graph, target).value, 0.0);
    }

    #[test]
    fn registering_locks_the_layout_and_unregister_is_idempotent() {
        let mut graph = ScriptGraph::new("Lifecycle");
        let root = graph.add_task(None, Holder::default()).unwrap();

        graph.unregister();
        assert!(!graph.is_registered());

        graph.register(None);
        assert!(graph.is_node_registered(root));
        assert_eq!(graph.add_task(None, Holder::default()), Err(GraphError::GraphRegistered));

        graph.unregister();
        graph.unregister();
        assert!(!graph.is_node_registered(root));
    }

    #[test]
    fn unknown_parents_are_rejected() {
        let mut graph = ScriptGraph::new("Parents");
        let bogus = NodeId::from_index(3);
        assert_eq!(graph.add_task(Some(bogus), Holder::default()), Err(GraphError::UnknownNode(bogus)));
    }
}
