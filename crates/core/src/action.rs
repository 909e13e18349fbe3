/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Actions: an ordered list of Tasks run one after another.
//!
//! An Action is a ScriptGraph whose roots are its Tasks. Sequencing is driven entirely by
//! Task events: the Action subscribes a native listener to each root's finish channel,
//! and that listener begins the next enabled root. Tasks that finish instantly therefore
//! cascade through the whole sequence within a single `begin()` call.
//!
//! Actions can also be authored once as an `ActionAsset` and run from inside another
//! graph through the `RunActionAsset` Task, which keeps a private runtime copy.

use bevy::reflect::Reflect;

use crate::context::Context;
use crate::errors::{ActionError, GraphError};
use crate::events::{ActionEvent, Listener, Multicast, NativeListener, TaskEventKind};
use crate::graph::{RegisterCx, ScriptGraph};
use crate::identifiers::{NodeId, SubscriberId};
use crate::task::{ScriptableTask, TaskControl, TaskCx};
use crate::types::{ActionAssetRef, ClassHierarchyRef, DeltaSeconds, OwnerRef};


/// Subscriber key used by an Action for the sequencing listeners it puts on its Tasks.
const SEQUENCE_SUBSCRIBER: SubscriberId = SubscriberId(u64::MAX);


/// Sequencing state of a graph used as an Action.
#[derive(Default)]
pub(crate) struct Sequence {
    pub(crate) running: bool,
    /// Index into the graph roots of the Task currently running.
    pub(crate) current: Option<usize>,
    pub(crate) on_finish: Multicast<Listener<ActionEvent>>,
}


impl ScriptGraph {
    /// Native reaction to a root Task finishing.
    pub(crate) fn advance_sequence(&mut self, finished: NodeId) {
        if !self.sequence.running {
            return;
        }

        let Some(current) = self.sequence.current else {
            return;
        };
        if self.roots.get(current) != Some(&finished) {
            return;
        }

        self.begin_sequence_from(current + 1);
    }

    /// Begins the first enabled root at or after `start`, or completes the sequence.
    fn begin_sequence_from(&mut self, start: usize) {
        let mut index = start;

        while let Some(&node) = self.roots.get(index) {
            if !self.sequence.running {
                return;
            }

            if !self.is_task(node) || !self.is_enabled(node) {
                index += 1;
                continue;
            }

            self.sequence.current = Some(index);
            match self.begin_task(node) {
                // Whatever happens next is driven by the Task's finish event.
                Ok(()) => return,
                Err(_err) => {
                    #[cfg(feature = "logging")]
                    bevy::log::error!("Action {:?} skipping task #{}: {}", self.name(), index, _err);
                    index += 1;
                },
            }
        }

        self.complete_sequence();
    }

    fn complete_sequence(&mut self) {
        self.sequence.running = false;
        self.sequence.current = None;

        #[cfg(feature = "logging")]
        bevy::log::debug!("Action {:?} finished", self.name());

        let event = ActionEvent { action: self.name().to_string(), owner: self.owner };
        self.sequence.on_finish.broadcast(&event);
    }
}


/// Runs its Tasks in order, skipping disabled ones.
#[derive(Debug, Default)]
pub struct ScriptableAction {
    graph: ScriptGraph,
}

impl ScriptableAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { graph: ScriptGraph::new(name) }
    }

    pub fn name(&self) -> &str {
        self.graph.name()
    }

    pub fn graph(&self) -> &ScriptGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ScriptGraph {
        &mut self.graph
    }

    /// Appends a Task to the sequence.
    pub fn add_task(&mut self, task: impl ScriptableTask) -> Result<NodeId, GraphError> {
        self.graph.add_task(None, task)
    }

    pub fn add_task_with_control(&mut self, task: impl ScriptableTask, control: TaskControl) -> Result<NodeId, GraphError> {
        self.graph.add_task_with_control(None, task, control)
    }

    pub fn tasks(&self) -> &[NodeId] {
        self.graph.roots()
    }

    pub fn task_count(&self) -> usize {
        self.graph.roots().len()
    }

    pub fn is_registered(&self) -> bool {
        self.graph.is_registered()
    }

    pub fn is_running(&self) -> bool {
        self.graph.sequence.running
    }

    /// Index of the Task currently running, if any.
    pub fn current_task(&self) -> Option<NodeId> {
        self.graph.sequence.current.and_then(|index| self.graph.roots().get(index).copied())
    }

    pub fn register(&mut self, owner: OwnerRef) {
        if self.graph.is_registered() {
            #[cfg(feature = "logging")]
            bevy::log::warn!("Action {:?} is already registered, ignoring", self.name());
            return;
        }

        self.graph.register(owner);

        let roots = self.graph.roots().to_vec();
        for root in roots {
            self.graph.subscribe_native(root, TaskEventKind::Finished, SEQUENCE_SUBSCRIBER, NativeListener::Sequence);
        }
    }

    pub fn unregister(&mut self) {
        self.graph.unregister();
    }

    /// Starts the sequence from the first enabled Task. An Action with no Tasks to run
    /// finishes (and broadcasts) right away.
    pub fn begin(&mut self) -> Result<(), ActionError> {
        if !self.graph.is_registered() {
            let err = ActionError::NotRegistered(self.name().to_string());
            #[cfg(feature = "logging")]
            bevy::log::error!("{}", err);
            return Err(err);
        }

        if self.graph.sequence.running {
            let err = ActionError::AlreadyRunning(self.name().to_string());
            #[cfg(feature = "logging")]
            bevy::log::error!("{}", err);
            return Err(err);
        }

        #[cfg(feature = "logging")]
        bevy::log::debug!("Action {:?} begun", self.name());

        self.graph.sequence.running = true;
        self.graph.sequence.current = None;
        self.graph.begin_sequence_from(0);
        Ok(())
    }

    /// Stops a running Action: the current Task is force-finished without moving on to
    /// the next one, then the Action's finish is broadcast.
    pub fn finish(&mut self) {
        if !self.graph.sequence.running {
            return;
        }

        let current = self.current_task();
        self.graph.sequence.running = false;

        if let Some(node) = current {
            self.graph.force_finish_task(node);
        }
        self.graph.complete_sequence();
    }

    /// Returns every Task to its initial state, stopping the Action first if needed.
    pub fn reset(&mut self) {
        self.finish();

        let roots = self.graph.roots().to_vec();
        for root in roots {
            self.graph.reset_task(root);
        }
        self.graph.sequence.current = None;
    }

    pub fn tick(&mut self, delta: DeltaSeconds) {
        self.graph.tick(delta);
    }

    pub fn subscribe_finish(&mut self, subscriber: SubscriberId, listener: Listener<ActionEvent>) {
        self.graph.sequence.on_finish.add(subscriber, listener);
    }

    pub fn unsubscribe_finish(&mut self, subscriber: SubscriberId) -> usize {
        self.graph.sequence.on_finish.remove_all(subscriber)
    }

    pub fn finish_listener_count(&self) -> usize {
        self.graph.sequence.on_finish.len()
    }

    /// A fresh, unregistered, idle copy.
    pub fn duplicate(&self) -> Self {
        Self { graph: self.graph.duplicate() }
    }
}


/// A shareable Action template. Only ever duplicated, never registered itself.
#[derive(Debug, Default)]
pub struct ActionAsset {
    pub name: String,
    pub action: ScriptableAction,
}

impl ActionAsset {
    pub fn new(name: impl Into<String>, action: ScriptableAction) -> Self {
        Self { name: name.into(), action }
    }

    /// A private runtime copy of the template.
    pub fn instantiate(&self) -> ScriptableAction {
        self.action.duplicate()
    }
}


/// Runs an `ActionAsset` as a single Task.
///
/// The runtime copy is created on registration and torn down on unregistration.
///
/// It keeps the template's own Context. Outer variables only reach it when the template
/// declares a variable of the same name and a compatible type; outer-only variables are
/// not visible inside the asset.
#[derive(Reflect, Default)]
#[reflect(Clone)]
pub struct RunActionAsset {
    #[reflect(ignore)]
    pub asset: Option<ActionAssetRef>,
    #[reflect(ignore)]
    runtime: Option<ScriptableAction>,
}

impl RunActionAsset {
    pub fn new(asset: ActionAssetRef) -> Self {
        Self { asset: Some(asset), runtime: None }
    }

    pub fn runtime(&self) -> Option<&ScriptableAction> {
        self.runtime.as_ref()
    }

    fn instantiate(&mut self, owner: OwnerRef, context: &Context, classes: &ClassHierarchyRef) {
        self.release();

        let Some(asset) = self.asset.as_ref() else {
            return;
        };

        let mut action = asset.instantiate();
        action.graph_mut().set_classes(classes.clone());
        action.graph_mut().context_mut().migrate_from(context, classes);
        action.register(owner);

        #[cfg(feature = "logging")]
        bevy::log::debug!("Instantiated action asset {:?} for {:?}", asset.name, owner);

        self.runtime = Some(action);
    }

    fn release(&mut self) {
        if let Some(mut action) = self.runtime.take() {
            action.finish();
            action.unregister();
        }
    }
}

impl Clone for RunActionAsset {
    fn clone(&self) -> Self {
        Self { asset: self.asset.clone(), runtime: None }
    }
}

impl core::fmt::Debug for RunActionAsset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RunActionAsset")
            .field("asset", &self.asset.as_ref().map(|asset| asset.name.as_str()))
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl ScriptableTask for RunActionAsset {
    fn begin_task(&mut self, cx: &mut TaskCx) {
        let Some(action) = self.runtime.as_mut() else {
            cx.finish();
            return;
        };

        if action.task_count() == 0 || action.begin().is_err() || !action.is_running() {
            cx.finish();
        }
    }

    fn tick_task(&mut self, cx: &mut TaskCx, delta: DeltaSeconds) {
        match self.runtime.as_mut() {
            Some(action) => {
                action.tick(delta);
                if !action.is_running() {
                    cx.finish();
                }
            },
            None => cx.finish(),
        }
    }

    fn finish_task(&mut self, _cx: &mut TaskCx) {
        if let Some(action) = self.runtime.as_mut() {
            action.finish();
        }
    }

    fn reset_task(&mut self, cx: &mut TaskCx) {
        self.instantiate(cx.owner(), cx.context(), cx.classes());
    }

    fn on_register(&mut self, cx: &RegisterCx) {
        self.instantiate(cx.owner(), cx.context(), cx.classes());
    }

    fn on_unregister(&mut self, _cx: &RegisterCx) {
        self.release();
    }

    fn can_ever_tick(&self) -> bool {
        true
    }
}
