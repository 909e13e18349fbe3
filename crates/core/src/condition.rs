/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Conditions: the boolean nodes of a ScriptGraph.
//!
//! Evaluation is read-only and happens inside an `EvalScope`, which carries the owner the
//! evaluation is done on behalf of and the world used to look at objects. Anything that
//! needs mutation (binding copies, caching in `prepare()`) happens in a separate pass
//! beforehand, see `ScriptGraph::check_condition()`.

use bevy::prelude::Entity;
use bevy::reflect::{DynamicTypePath, Reflect};

use crate::context::Context;
use crate::graph::{NodeKind, RegisterCx, ScriptGraph};
use crate::identifiers::NodeId;
use crate::requirement::RequirementMode;
use crate::world::ScriptWorld;


pub trait CloneCondition {
    fn clone_condition(&self) -> Box<dyn ScriptableCondition>;
}

impl<T: ScriptableCondition + Clone> CloneCondition for T {
    fn clone_condition(&self) -> Box<dyn ScriptableCondition> {
        Box::new(self.clone())
    }
}


/// User-defined Condition logic.
pub trait ScriptableCondition: Reflect + CloneCondition {
    /// The raw result; negation is applied by the graph.
    fn evaluate(&self, cx: &ConditionCx) -> bool;

    /// Called after bindings were copied in and before `evaluate()`.
    fn prepare(&mut self) {}

    fn on_register(&mut self, _cx: &RegisterCx) {}

    fn on_unregister(&mut self, _cx: &RegisterCx) {}

    fn allows_sibling_bindings(&self) -> bool {
        true
    }

    /// A human-readable summary, e.g. for debug overlays.
    fn display_title(&self) -> String {
        self.reflect_short_type_path().to_string()
    }
}


pub(crate) struct ConditionSlot {
    pub(crate) negate: bool,
    pub(crate) behaviour: Box<dyn ScriptableCondition>,
}

impl ConditionSlot {
    pub(crate) fn new(behaviour: Box<dyn ScriptableCondition>) -> Self {
        Self { negate: false, behaviour }
    }

    pub(crate) fn duplicate(&self) -> Self {
        Self { negate: self.negate, behaviour: self.behaviour.clone_condition() }
    }
}


/// Who a Condition is evaluated for, and where.
#[derive(Clone, Copy)]
pub struct EvalScope<'w> {
    pub owner: Option<Entity>,
    pub world: &'w dyn ScriptWorld,
}

impl<'w> EvalScope<'w> {
    pub fn new(owner: Option<Entity>, world: &'w dyn ScriptWorld) -> Self {
        Self { owner, world }
    }

    /// The same world, evaluated on behalf of someone else.
    pub fn with_owner(&self, owner: Option<Entity>) -> Self {
        Self { owner, world: self.world }
    }
}


/// What `ScriptableCondition::evaluate()` gets to see.
pub struct ConditionCx<'a> {
    graph: &'a ScriptGraph,
    node: NodeId,
    scope: EvalScope<'a>,
}

impl<'a> ConditionCx<'a> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn owner(&self) -> Option<Entity> {
        self.scope.owner
    }

    pub fn world(&self) -> &'a dyn ScriptWorld {
        self.scope.world
    }

    pub fn scope(&self) -> EvalScope<'a> {
        self.scope
    }

    pub fn context(&self) -> &'a Context {
        self.graph.context()
    }

    pub fn children(&self) -> &'a [NodeId] {
        self.graph.children(self.node)
    }

    /// Evaluates one of this node's children in the current scope.
    pub fn evaluate_child(&self, child: NodeId) -> bool {
        self.graph.evaluate_in_scope(child, self.scope)
    }

    /// Folds the children of this node with AND/OR.
    pub fn combine_children(&self, mode: RequirementMode) -> bool {
        self.graph.combine(mode, self.children(), self.scope)
    }
}


impl ScriptGraph {
    pub(crate) fn condition_slot(&self, node: NodeId) -> Option<&ConditionSlot> {
        match self.node(node).map(|n| &n.kind) {
            Some(NodeKind::Condition(slot)) => Some(slot),
            _ => None,
        }
    }

    pub(crate) fn condition_slot_mut(&mut self, node: NodeId) -> Option<&mut ConditionSlot> {
        match self.node_mut(node).map(|n| &mut n.kind) {
            Some(NodeKind::Condition(slot)) => Some(slot),
            _ => None,
        }
    }

    pub fn is_condition(&self, node: NodeId) -> bool {
        self.condition_slot(node).is_some()
    }

    pub fn condition<T: ScriptableCondition>(&self, node: NodeId) -> Option<&T> {
        self.condition_slot(node).and_then(|slot| (*slot.behaviour).as_reflect().downcast_ref::<T>())
    }

    pub fn condition_mut<T: ScriptableCondition>(&mut self, node: NodeId) -> Option<&mut T> {
        self.condition_slot_mut(node).and_then(|slot| (*slot.behaviour).as_reflect_mut().downcast_mut::<T>())
    }

    pub fn is_negated(&self, node: NodeId) -> bool {
        self.condition_slot(node).is_some_and(|slot| slot.negate)
    }

    pub fn set_negated(&mut self, node: NodeId, negate: bool) {
        if let Some(slot) = self.condition_slot_mut(node) {
            slot.negate = negate;
        }
    }

    pub fn condition_title(&self, node: NodeId) -> Option<String> {
        self.condition_slot(node).map(|slot| slot.behaviour.display_title())
    }

    /// Resolves bindings and runs `prepare()` for `node` and every Condition under it.
    pub fn prepare_conditions(&mut self, node: NodeId) {
        let mut stack = vec![node];

        while let Some(id) = stack.pop() {
            if !self.contains(id) {
                continue;
            }
            self.resolve_bindings(id);
            if let Some(slot) = self.condition_slot_mut(id) {
                slot.behaviour.prepare();
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
    }

    /// Prepares the Condition subtree at `node`, then evaluates it in `scope`.
    ///
    /// False unless `node` is a registered Condition.
    pub fn check_condition(&mut self, node: NodeId, scope: &EvalScope) -> bool {
        if !self.is_condition(node) {
            return false;
        }
        if !self.is_node_registered(node) {
            #[cfg(feature = "logging")]
            bevy::log::warn!("Condition {} was checked before being registered", node);
            return false;
        }
        self.prepare_conditions(node);
        self.evaluate_in_scope(node, *scope)
    }

    /// Evaluates the Condition at `node` on behalf of `owner`.
    ///
    /// A missing or non-Condition node is false, a disabled Condition is true.
    pub fn evaluate_condition(&self, owner: Option<Entity>, node: NodeId, world: &dyn ScriptWorld) -> bool {
        self.evaluate_in_scope(node, EvalScope::new(owner, world))
    }

    pub fn evaluate_in_scope(&self, node: NodeId, scope: EvalScope) -> bool {
        let Some(slot) = self.condition_slot(node) else {
            return false;
        };
        if !self.is_enabled(node) {
            return true;
        }

        let cx = ConditionCx { graph: self, node, scope };
        slot.behaviour.evaluate(&cx) != slot.negate
    }

    /// AND/OR over `nodes`, short-circuiting. An empty list is false either way.
    pub fn combine(&self, mode: RequirementMode, nodes: &[NodeId], scope: EvalScope) -> bool {
        if nodes.is_empty() {
            return false;
        }

        match mode {
            RequirementMode::And => nodes.iter().all(|node| self.evaluate_in_scope(*node, scope)),
            RequirementMode::Or => nodes.iter().any(|node| self.evaluate_in_scope(*node, scope)),
        }
    }
}


/// True if all children are.
#[derive(Reflect, Clone, Copy, Debug, Default)]
pub struct ConditionAnd;

impl ScriptableCondition for ConditionAnd {
    fn evaluate(&self, cx: &ConditionCx) -> bool {
        cx.combine_children(RequirementMode::And)
    }

    fn display_title(&self) -> String {
        String::from("AND")
    }
}

/// True if any child is.
#[derive(Reflect, Clone, Copy, Debug, Default)]
pub struct ConditionOr;

impl ScriptableCondition for ConditionOr {
    fn evaluate(&self, cx: &ConditionCx) -> bool {
        cx.combine_children(RequirementMode::Or)
    }

    fn display_title(&self) -> String {
        String::from("OR")
    }
}


#[cfg(test)]
mod tests {
    use crate::condition_library::BoolCondition;
    use crate::context::Context;
    use crate::property_path::PropertyPath;
    use crate::world::NullWorld;
    use super::*;

    /// Must never be reached by a short-circuiting combinator.
    #[derive(Reflect, Clone, Copy, Debug, Default)]
    struct Unreachable;

    impl ScriptableCondition for Unreachable {
        fn evaluate(&self, _cx: &ConditionCx) -> bool {
            panic!("evaluated past a short circuit")
        }
    }

    fn scope() -> EvalScope<'static> {
        EvalScope::new(None, &NullWorld)
    }

    #[test]
    fn negation_flips_the_raw_result() {
        let mut graph = ScriptGraph::new("Negated");
        let node = graph.add_condition(None, BoolCondition { value: true }).unwrap();
        graph.set_negated(node, true);
        graph.register(None);

        assert!(!graph.check_condition(node, &scope()));

        graph.set_negated(node, false);
        assert!(graph.evaluate_condition(None, node, &NullWorld));
    }

    #[test]
    fn invalid_nodes_are_false_and_disabled_ones_true() {
        let mut graph = ScriptGraph::new("Edges");
        let node = graph.add_condition(None, BoolCondition { value: false }).unwrap();
        let task = graph.add_task(None, crate::task_library::Wait::default()).unwrap();
        graph.register(None);

        assert!(!graph.evaluate_condition(None, NodeId::from_index(9), &NullWorld));
        assert!(!graph.evaluate_condition(None, task, &NullWorld));

        graph.set_enabled(node, false);
        graph.set_negated(node, true);
        assert!(graph.evaluate_condition(None, node, &NullWorld));
    }

    #[test]
    fn unregistered_conditions_check_false() {
        let mut graph = ScriptGraph::new("Unregistered");
        let node = graph.add_condition(None, BoolCondition { value: true }).unwrap();

        assert!(!graph.check_condition(node, &scope()));

        graph.register(None);
        assert!(graph.check_condition(node, &scope()));

        graph.unregister();
        assert!(!graph.check_condition(node, &scope()));
    }

    #[test]
    fn empty_combinators_are_false() {
        let mut graph = ScriptGraph::new("Empty");
        let and = graph.add_condition(None, ConditionAnd).unwrap();
        let or = graph.add_condition(None, ConditionOr).unwrap();
        graph.register(None);

        assert!(!graph.check_condition(and, &scope()));
        assert!(!graph.check_condition(or, &scope()));
        assert!(!graph.combine(RequirementMode::And, &[], scope()));
        assert!(!graph.combine(RequirementMode::Or, &[], scope()));
    }

    #[test]
    fn combinators_short_circuit() {
        let mut graph = ScriptGraph::new("Short");
        let and = graph.add_condition(None, ConditionAnd).unwrap();
        graph.add_condition(Some(and), BoolCondition { value: false }).unwrap();
        graph.add_condition(Some(and), Unreachable).unwrap();

        let or = graph.add_condition(None, ConditionOr).unwrap();
        graph.add_condition(Some(or), BoolCondition { value: true }).unwrap();
        graph.add_condition(Some(or), Unreachable).unwrap();
        graph.register(None);

        assert!(!graph.check_condition(and, &scope()));
        assert!(graph.check_condition(or, &scope()));
    }

    #[test]
    fn child_bindings_resolve_before_evaluation() {
        let mut graph = ScriptGraph::new("Prepared")
            .with_context(Context::new().with("armed", true));
        let and = graph.add_condition(None, ConditionAnd).unwrap();
        let child = graph.add_condition(Some(and), BoolCondition { value: false }).unwrap();

        let target = graph.node_path(child, "value").unwrap();
        graph.add_property_binding(child, PropertyPath::context("armed").unwrap(), target).unwrap();
        graph.register(None);

        assert!(!graph.evaluate_condition(None, and, &NullWorld));
        assert!(graph.check_condition(and, &scope()));
        assert!(graph.condition::<BoolCondition>(child).unwrap().value);
    }

    #[test]
    fn titles_default_to_the_type_name() {
        let mut graph = ScriptGraph::new("Titles");
        let node = graph.add_condition(None, Unreachable).unwrap();
        let and = graph.add_condition(None, ConditionAnd).unwrap();

        assert_eq!(graph.condition_title(node).as_deref(), Some("Unreachable"));
        assert_eq!(graph.condition_title(and).as_deref(), Some("AND"));
    }
}
