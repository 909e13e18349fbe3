/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Requirements: a list of Conditions folded with AND or OR.
//!
//! A `ScriptableRequirement` owns its own graph (whose roots are the Conditions) and
//! Context. When it lives inside another graph (through a `ConditionGroup` or a
//! `ConditionAsset`), it is registered within the outer node and receives the outer
//! Context's values by name.

use bevy::reflect::Reflect;

#[cfg(any(feature = "serialize"))]
use serde::{Serialize, Deserialize};

use crate::condition::{ConditionCx, EvalScope, ScriptableCondition};
use crate::errors::GraphError;
use crate::graph::{RegisterCx, ScriptGraph};
use crate::identifiers::NodeId;
use crate::types::{OwnerRef, RequirementAssetRef};


#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, Reflect)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub enum RequirementMode {
    #[default]
    And,
    Or,
}


pub struct ScriptableRequirement {
    graph: ScriptGraph,
    pub mode: RequirementMode,
    pub negate: bool,
}

impl Default for ScriptableRequirement {
    fn default() -> Self {
        Self::new("", RequirementMode::default())
    }
}

impl ScriptableRequirement {
    pub fn new(name: impl Into<String>, mode: RequirementMode) -> Self {
        Self { graph: ScriptGraph::new(name), mode, negate: false }
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn graph(&self) -> &ScriptGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ScriptGraph {
        &mut self.graph
    }

    pub fn add_condition(&mut self, parent: Option<NodeId>, condition: impl ScriptableCondition) -> Result<NodeId, GraphError> {
        self.graph.add_condition(parent, condition)
    }

    pub fn conditions(&self) -> &[NodeId] {
        self.graph.roots()
    }

    pub fn is_registered(&self) -> bool {
        self.graph.is_registered()
    }

    pub fn register(&mut self, owner: OwnerRef) {
        self.graph.register(owner);
    }

    /// Registers as part of the node described by `cx`, pulling in the outer Context.
    pub fn register_within(&mut self, cx: &RegisterCx) {
        self.graph.set_classes(cx.classes().clone());
        let _migrated = self.graph.context_mut().migrate_from(cx.context(), cx.classes());

        #[cfg(feature = "logging")]
        bevy::log::debug!(
            "Requirement {:?} registered within {}, {} context values migrated",
            self.graph.name(),
            cx.node(),
            _migrated
        );

        self.graph.register(cx.owner());
    }

    pub fn unregister(&mut self) {
        self.graph.unregister();
    }

    /// Copies bindings into every Condition and lets them prepare.
    pub fn prepare(&mut self) {
        let roots = self.graph.roots().to_vec();
        for root in roots {
            self.graph.prepare_conditions(root);
        }
    }

    /// Folds the Conditions with the mode, then applies negation. No Conditions is false.
    pub fn evaluate(&self, scope: &EvalScope) -> bool {
        self.graph.combine(self.mode, self.graph.roots(), *scope) != self.negate
    }

    pub fn check(&mut self, scope: &EvalScope) -> bool {
        self.prepare();
        self.evaluate(scope)
    }

    /// A fresh, unregistered copy.
    pub fn duplicate(&self) -> Self {
        Self { graph: self.graph.duplicate(), mode: self.mode, negate: self.negate }
    }
}

impl Clone for ScriptableRequirement {
    fn clone(&self) -> Self {
        self.duplicate()
    }
}

impl core::fmt::Debug for ScriptableRequirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScriptableRequirement")
            .field("graph", &self.graph)
            .field("mode", &self.mode)
            .field("negate", &self.negate)
            .finish()
    }
}


/// An inline Requirement, usable as a single Condition.
#[derive(Reflect, Clone, Debug, Default)]
#[reflect(Clone)]
pub struct ConditionGroup {
    #[reflect(ignore)]
    pub requirement: ScriptableRequirement,
}

impl ConditionGroup {
    pub fn new(requirement: ScriptableRequirement) -> Self {
        Self { requirement }
    }
}

impl ScriptableCondition for ConditionGroup {
    fn evaluate(&self, cx: &ConditionCx) -> bool {
        self.requirement.evaluate(&cx.scope())
    }

    fn prepare(&mut self) {
        self.requirement.prepare();
    }

    fn on_register(&mut self, cx: &RegisterCx) {
        self.requirement.register_within(cx);
    }

    fn on_unregister(&mut self, _cx: &RegisterCx) {
        self.requirement.unregister();
    }

    fn display_title(&self) -> String {
        match self.requirement.mode {
            RequirementMode::And => String::from("Group (AND)"),
            RequirementMode::Or => String::from("Group (OR)"),
        }
    }
}


/// A shareable Requirement template. Never registered itself.
#[derive(Debug, Default)]
pub struct RequirementAsset {
    pub name: String,
    pub requirement: ScriptableRequirement,
}

impl RequirementAsset {
    pub fn new(name: impl Into<String>, requirement: ScriptableRequirement) -> Self {
        Self { name: name.into(), requirement }
    }
}


/// Evaluates a private copy of a `RequirementAsset`, instantiated on registration.
#[derive(Reflect, Default)]
#[reflect(Clone)]
pub struct ConditionAsset {
    #[reflect(ignore)]
    pub asset: Option<RequirementAssetRef>,
    #[reflect(ignore)]
    instance: Option<ScriptableRequirement>,
}

impl ConditionAsset {
    pub fn new(asset: RequirementAssetRef) -> Self {
        Self { asset: Some(asset), instance: None }
    }

    pub fn instance(&self) -> Option<&ScriptableRequirement> {
        self.instance.as_ref()
    }

    fn release(&mut self) {
        if let Some(mut instance) = self.instance.take() {
            instance.unregister();
        }
    }
}

impl Clone for ConditionAsset {
    fn clone(&self) -> Self {
        Self { asset: self.asset.clone(), instance: None }
    }
}

impl core::fmt::Debug for ConditionAsset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConditionAsset")
            .field("asset", &self.asset.as_ref().map(|asset| asset.name.as_str()))
            .field("instanced", &self.instance.is_some())
            .finish()
    }
}

impl ScriptableCondition for ConditionAsset {
    fn evaluate(&self, cx: &ConditionCx) -> bool {
        self.instance
            .as_ref()
            .is_some_and(|instance| instance.evaluate(&cx.scope()))
    }

    fn prepare(&mut self) {
        if let Some(instance) = self.instance.as_mut() {
            instance.prepare();
        }
    }

    fn on_register(&mut self, cx: &RegisterCx) {
        self.release();

        let Some(asset) = self.asset.as_ref() else {
            #[cfg(feature = "logging")]
            bevy::log::debug!("ConditionAsset at {} has no asset, it will evaluate to false", cx.node());
            return;
        };

        let mut instance = asset.requirement.duplicate();
        instance.register_within(cx);
        self.instance = Some(instance);
    }

    fn on_unregister(&mut self, _cx: &RegisterCx) {
        self.release();
    }

    fn display_title(&self) -> String {
        self.asset
            .as_ref()
            .map(|asset| asset.name.clone())
            .unwrap_or_else(|| String::from("None"))
    }
}


#[cfg(test)]
mod tests {
    use crate::condition_library::{BoolCondition, Probability};
    use crate::context::Context;
    use crate::property_path::PropertyPath;
    use crate::types::ThreadSafeRef;
    use crate::world::NullWorld;
    use super::*;

    fn scope() -> EvalScope<'static> {
        EvalScope::new(None, &NullWorld)
    }

    #[test]
    fn or_of_negated_true_and_certain_probability_is_true() {
        let mut requirement = ScriptableRequirement::new("Or", RequirementMode::Or);
        let flag = requirement.add_condition(None, BoolCondition { value: true }).unwrap();
        requirement.graph_mut().set_negated(flag, true);
        requirement.add_condition(None, Probability { chance: 1.0 }).unwrap();
        requirement.register(None);

        assert!(requirement.check(&scope()));
    }

    #[test]
    fn and_with_negation() {
        let mut requirement = ScriptableRequirement::new("And", RequirementMode::And);
        requirement.add_condition(None, BoolCondition { value: true }).unwrap();
        requirement.add_condition(None, BoolCondition { value: true }).unwrap();
        requirement.register(None);
        assert!(requirement.check(&scope()));

        requirement.negate = true;
        assert!(!requirement.check(&scope()));
    }

    #[test]
    fn empty_requirements_are_false() {
        let mut and = ScriptableRequirement::new("EmptyAnd", RequirementMode::And);
        let mut or = ScriptableRequirement::new("EmptyOr", RequirementMode::Or);
        and.register(None);
        or.register(None);

        assert!(!and.check(&scope()));
        assert!(!or.check(&scope()));
    }

    fn bound_to_armed(name: &str) -> ScriptableRequirement {
        let mut requirement = ScriptableRequirement::new(name, RequirementMode::And);
        requirement.graph_mut().context_mut().insert("armed", false);
        let flag = requirement.add_condition(None, BoolCondition { value: false }).unwrap();
        let target = requirement.graph().node_path(flag, "value").unwrap();
        requirement
            .graph_mut()
            .add_property_binding(flag, PropertyPath::context("armed").unwrap(), target)
            .unwrap();
        requirement
    }

    #[test]
    fn groups_receive_the_outer_context() {
        let mut graph = ScriptGraph::new("Outer")
            .with_context(Context::new().with("armed", true));
        let group = graph.add_condition(None, ConditionGroup::new(bound_to_armed("Inner"))).unwrap();
        graph.register(None);

        assert!(graph.check_condition(group, &scope()));

        let inner = graph.condition::<ConditionGroup>(group).unwrap();
        assert!(inner.requirement.is_registered());
        assert_eq!(inner.requirement.graph().context().get::<bool>("armed"), Some(&true));

        graph.unregister();
        let inner = graph.condition::<ConditionGroup>(group).unwrap();
        assert!(!inner.requirement.is_registered());
    }

    #[test]
    fn assets_are_instanced_per_registration() {
        let asset = ThreadSafeRef::new(RequirementAsset::new("Armed", bound_to_armed("Template")));

        let mut graph = ScriptGraph::new("User")
            .with_context(Context::new().with("armed", true));
        let node = graph.add_condition(None, ConditionAsset::new(asset.clone())).unwrap();

        assert!(!graph.evaluate_condition(None, node, &NullWorld));

        graph.register(None);
        assert!(graph.condition::<ConditionAsset>(node).unwrap().instance().is_some());
        assert!(graph.check_condition(node, &scope()));

        assert!(!asset.requirement.is_registered());
        assert_eq!(asset.requirement.graph().context().get::<bool>("armed"), Some(&false));

        graph.unregister();
        assert!(graph.condition::<ConditionAsset>(node).unwrap().instance().is_none());
        assert!(!graph.evaluate_condition(None, node, &NullWorld));
    }

    #[test]
    fn missing_assets_evaluate_false() {
        let mut graph = ScriptGraph::new("NoAsset");
        let node = graph.add_condition(None, ConditionAsset::default()).unwrap();
        graph.register(None);

        assert!(!graph.check_condition(node, &scope()));
        assert_eq!(graph.condition_title(node).as_deref(), Some("None"));
    }
}
