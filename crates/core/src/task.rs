/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Tasks: the executable nodes of a ScriptGraph.
//!
//! Every Task goes through a small state machine:
//!
//! `None -> Begun -> Finished`, and `Finished -> None` only through an explicit reset.
//!
//! The graph drives the transitions and the user-provided `ScriptableTask` behaviour
//! gets notified through its hooks. Looping and do-once semantics are handled by the
//! graph, so behaviours only ever need to decide when their work is done.

use bevy::prelude::Entity;
use bevy::reflect::Reflect;

#[cfg(any(feature = "serialize"))]
use serde::{Serialize, Deserialize};

use crate::context::Context;
use crate::errors::TaskError;
use crate::events::{Listener, Multicast, NativeListener, TaskEvent, TaskEventKind};
use crate::graph::{NodeKind, RegisterCx, ScriptGraph};
use crate::identifiers::{NodeId, SubscriberId};
use crate::types::{ClassHierarchyRef, DeltaSeconds};


#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, Reflect)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub enum TaskStatus {
    /// Never begun, or reset since.
    #[default]
    None,
    Begun,
    Finished,
}


/// Per-node execution options, authored alongside the node.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Reflect)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub struct TaskControl {
    /// After the first completion, later begins report an instant finish without running.
    pub do_once: bool,
    /// Re-run the begin hook instead of finishing, until `loop_count` runs have happened.
    pub looping: bool,
    /// 0 loops forever.
    pub loop_count: u32,
}

impl TaskControl {
    pub fn once() -> Self {
        Self { do_once: true, ..Default::default() }
    }

    pub fn repeat(loop_count: u32) -> Self {
        Self { looping: true, loop_count, ..Default::default() }
    }

    pub fn forever() -> Self {
        Self::repeat(0)
    }
}


/// Runtime bookkeeping of a Task; never authored.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Reflect)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub struct TaskState {
    pub status: TaskStatus,
    pub current_loop_index: u32,
    pub do_once_finished: bool,
}


pub trait CloneTask {
    fn clone_task(&self) -> Box<dyn ScriptableTask>;
}

impl<T: ScriptableTask + Clone> CloneTask for T {
    fn clone_task(&self) -> Box<dyn ScriptableTask> {
        Box::new(self.clone())
    }
}


/// User-defined Task logic.
///
/// Reflected fields are the Task's bindable properties; bindings are copied into them
/// right before `begin_task()` runs.
pub trait ScriptableTask: Reflect + CloneTask {
    /// Called when the Task begins, and again at the start of every loop iteration.
    fn begin_task(&mut self, _cx: &mut TaskCx) {}

    /// Called every tick while Begun, if `can_ever_tick()`.
    fn tick_task(&mut self, _cx: &mut TaskCx, _delta: DeltaSeconds) {}

    /// Called once on the true (non-looping) finish.
    fn finish_task(&mut self, _cx: &mut TaskCx) {}

    fn reset_task(&mut self, _cx: &mut TaskCx) {}

    fn on_register(&mut self, _cx: &RegisterCx) {}

    fn on_unregister(&mut self, _cx: &RegisterCx) {}

    fn can_ever_tick(&self) -> bool {
        false
    }

    /// Whether this Task's children may bind to each other's properties.
    fn allows_sibling_bindings(&self) -> bool {
        true
    }
}


/// What a Task hook gets to see of the graph it runs in.
pub struct TaskCx<'a> {
    node: NodeId,
    owner: Option<Entity>,
    context: &'a Context,
    classes: &'a ClassHierarchyRef,
    finish_requested: bool,
}

impl<'a> TaskCx<'a> {
    pub(crate) fn new(node: NodeId, owner: Option<Entity>, context: &'a Context, classes: &'a ClassHierarchyRef) -> Self {
        Self { node, owner, context, classes, finish_requested: false }
    }

    /// Asks the graph to finish this Task once the current hook returns.
    pub fn finish(&mut self) {
        self.finish_requested = true;
    }

    pub fn finish_requested(&self) -> bool {
        self.finish_requested
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn owner(&self) -> Option<Entity> {
        self.owner
    }

    pub fn context(&self) -> &'a Context {
        self.context
    }

    pub fn classes(&self) -> &'a ClassHierarchyRef {
        self.classes
    }
}


pub(crate) struct TaskSlot {
    pub(crate) control: TaskControl,
    pub(crate) state: TaskState,
    pub(crate) tick_enabled: bool,
    /// Set when an infinitely looping Task asked to finish from inside its begin hook.
    pub(crate) pending_finish: bool,
    pub(crate) behaviour: Box<dyn ScriptableTask>,
    pub(crate) on_begin_native: Multicast<NativeListener>,
    pub(crate) on_finish_native: Multicast<NativeListener>,
    pub(crate) on_begin: Multicast<Listener<TaskEvent>>,
    pub(crate) on_finish: Multicast<Listener<TaskEvent>>,
}

impl TaskSlot {
    pub(crate) fn new(behaviour: Box<dyn ScriptableTask>, control: TaskControl) -> Self {
        Self {
            control,
            state: TaskState::default(),
            tick_enabled: false,
            pending_finish: false,
            behaviour,
            on_begin_native: Multicast::new(),
            on_finish_native: Multicast::new(),
            on_begin: Multicast::new(),
            on_finish: Multicast::new(),
        }
    }

    pub(crate) fn duplicate(&self) -> Self {
        Self::new(self.behaviour.clone_task(), self.control)
    }

    pub(crate) fn clear_channels(&mut self) {
        self.on_begin_native.clear();
        self.on_finish_native.clear();
        self.on_begin.clear();
        self.on_finish.clear();
    }

    fn native_channel(&mut self, kind: TaskEventKind) -> &mut Multicast<NativeListener> {
        match kind {
            TaskEventKind::Begun => &mut self.on_begin_native,
            TaskEventKind::Finished => &mut self.on_finish_native,
        }
    }

    fn host_channel(&mut self, kind: TaskEventKind) -> &mut Multicast<Listener<TaskEvent>> {
        match kind {
            TaskEventKind::Begun => &mut self.on_begin,
            TaskEventKind::Finished => &mut self.on_finish,
        }
    }
}


impl ScriptGraph {
    pub(crate) fn task_slot(&self, node: NodeId) -> Option<&TaskSlot> {
        match self.node(node).map(|n| &n.kind) {
            Some(NodeKind::Task(slot)) => Some(slot),
            _ => None,
        }
    }

    pub(crate) fn task_slot_mut(&mut self, node: NodeId) -> Option<&mut TaskSlot> {
        match self.node_mut(node).map(|n| &mut n.kind) {
            Some(NodeKind::Task(slot)) => Some(slot),
            _ => None,
        }
    }

    pub fn is_task(&self, node: NodeId) -> bool {
        self.task_slot(node).is_some()
    }

    /// Typed access to a Task behaviour.
    pub fn task<T: ScriptableTask>(&self, node: NodeId) -> Option<&T> {
        self.task_slot(node).and_then(|slot| (*slot.behaviour).as_reflect().downcast_ref::<T>())
    }

    pub fn task_mut<T: ScriptableTask>(&mut self, node: NodeId) -> Option<&mut T> {
        self.task_slot_mut(node).and_then(|slot| (*slot.behaviour).as_reflect_mut().downcast_mut::<T>())
    }

    pub fn task_state(&self, node: NodeId) -> Option<TaskState> {
        self.task_slot(node).map(|slot| slot.state)
    }

    pub fn task_status(&self, node: NodeId) -> Option<TaskStatus> {
        self.task_slot(node).map(|slot| slot.state.status)
    }

    pub fn task_control(&self, node: NodeId) -> Option<TaskControl> {
        self.task_slot(node).map(|slot| slot.control)
    }

    pub fn task_control_mut(&mut self, node: NodeId) -> Option<&mut TaskControl> {
        self.task_slot_mut(node).map(|slot| &mut slot.control)
    }

    /// True while the Task is Begun and receiving ticks.
    pub fn is_tick_enabled(&self, node: NodeId) -> bool {
        self.task_slot(node).is_some_and(|slot| slot.tick_enabled)
    }

    /// Runs `hook` against the Task behaviour of `node`; returns whether it asked to finish.
    fn run_task_hook(&mut self, node: NodeId, hook: impl FnOnce(&mut dyn ScriptableTask, &mut TaskCx)) -> bool {
        let owner = self.owner;
        let Self { nodes, context, classes, .. } = self;

        match nodes.get_mut(node.index()).map(|n| &mut n.kind) {
            Some(NodeKind::Task(slot)) => {
                let mut cx = TaskCx::new(node, owner, &*context, &*classes);
                hook(&mut *slot.behaviour, &mut cx);
                cx.finish_requested
            },
            _ => false,
        }
    }

    fn check_task(&self, node: NodeId) -> Result<(), TaskError> {
        let Some(n) = self.node(node) else {
            return Err(TaskError::UnknownTask(node));
        };

        match &n.kind {
            NodeKind::Task(_) if !n.registered => Err(TaskError::NotRegistered(node)),
            NodeKind::Task(_) => Ok(()),
            NodeKind::Condition(_) => Err(TaskError::UnknownTask(node)),
        }
    }

    /// Begins the Task at `node`.
    ///
    /// Resolves the Task's bindings, moves it to Begun, runs its begin hook and broadcasts
    /// the begin event. Beginning a disabled Task does nothing.
    pub fn begin_task(&mut self, node: NodeId) -> Result<(), TaskError> {
        if let Err(err) = self.check_task(node) {
            #[cfg(feature = "logging")]
            bevy::log::error!("Cannot begin task: {}", err);
            return Err(err);
        }

        let enabled = self.is_enabled(node);
        let Some(slot) = self.task_slot_mut(node) else {
            return Err(TaskError::UnknownTask(node));
        };

        if slot.state.status == TaskStatus::Begun {
            let err = TaskError::AlreadyBegun(node);
            #[cfg(feature = "logging")]
            bevy::log::error!("Cannot begin task: {}", err);
            return Err(err);
        }

        if !enabled {
            let err = TaskError::Disabled(node);
            #[cfg(feature = "logging")]
            bevy::log::error!("Cannot begin task: {}", err);
            return Err(err);
        }

        if slot.control.do_once && slot.state.do_once_finished {
            self.broadcast(node, TaskEventKind::Finished);
            return Ok(());
        }

        slot.state.current_loop_index = 0;
        self.resolve_bindings(node);

        if let Some(slot) = self.task_slot_mut(node) {
            slot.state.status = TaskStatus::Begun;
            slot.pending_finish = false;
            slot.tick_enabled = slot.behaviour.can_ever_tick();
        }

        #[cfg(feature = "logging")]
        bevy::log::debug!("Task {} begun", node);

        let finish_requested = self.run_task_hook(node, |task, cx| task.begin_task(cx));
        self.broadcast(node, TaskEventKind::Begun);

        if finish_requested {
            self.finish_task(node);
        }
        Ok(())
    }

    /// Finishes the Task at `node`, or starts its next loop iteration.
    ///
    /// Does nothing unless the Task is Begun and enabled.
    pub fn finish_task(&mut self, node: NodeId) {
        self.finish_task_with(node, false);
    }

    /// Like `finish_task()`, but ends the Task even if it has loop iterations left.
    pub fn force_finish_task(&mut self, node: NodeId) {
        self.finish_task_with(node, true);
    }

    fn finish_task_with(&mut self, node: NodeId, force: bool) {
        let enabled = self.is_enabled(node);

        loop {
            let Some(slot) = self.task_slot_mut(node) else {
                return;
            };
            if slot.state.status != TaskStatus::Begun || !enabled {
                return;
            }

            slot.pending_finish = false;

            if force || !slot.control.looping {
                break;
            }

            slot.state.current_loop_index = slot.state.current_loop_index.saturating_add(1);
            let infinite = slot.control.loop_count == 0;
            if !infinite && slot.state.current_loop_index >= slot.control.loop_count {
                break;
            }

            let finish_requested = self.run_task_hook(node, |task, cx| task.begin_task(cx));
            if !finish_requested {
                return;
            }

            if infinite {
                // Revisited on the next tick instead of spinning forever.
                if let Some(slot) = self.task_slot_mut(node) {
                    slot.pending_finish = true;
                }
                return;
            }
        }

        if let Some(slot) = self.task_slot_mut(node) {
            if slot.control.do_once {
                slot.state.do_once_finished = true;
            }
            slot.state.status = TaskStatus::Finished;
            slot.tick_enabled = false;
            slot.pending_finish = false;
        }

        self.run_task_hook(node, |task, cx| task.finish_task(cx));

        #[cfg(feature = "logging")]
        bevy::log::debug!("Task {} finished", node);

        self.broadcast(node, TaskEventKind::Finished);
    }

    /// Returns a Finished Task to None. Does nothing in any other state.
    pub fn reset_task(&mut self, node: NodeId) {
        let Some(slot) = self.task_slot_mut(node) else {
            return;
        };
        if slot.state.status != TaskStatus::Finished {
            return;
        }

        slot.state = TaskState::default();
        slot.pending_finish = false;
        self.run_task_hook(node, |task, cx| task.reset_task(cx));
    }

    /// Ticks every Task that is Begun with ticking enabled.
    ///
    /// The set of Tasks to tick is fixed when the call starts; Tasks begun by this very
    /// tick get their first tick next time.
    pub fn tick(&mut self, delta: DeltaSeconds) {
        let pending: Vec<NodeId> = self.pre_order()
            .into_iter()
            .filter(|id| self.task_slot(*id).is_some_and(|slot| slot.pending_finish))
            .collect();
        for node in pending {
            self.finish_task(node);
        }

        let tickable: Vec<NodeId> = self.pre_order()
            .into_iter()
            .filter(|id| self.task_slot(*id).is_some_and(|slot| slot.tick_enabled))
            .collect();

        for node in tickable {
            let still_ticking = self.is_enabled(node) && self.task_slot(node).is_some_and(|slot| {
                slot.tick_enabled && slot.state.status == TaskStatus::Begun
            });
            if !still_ticking {
                continue;
            }

            if self.run_task_hook(node, |task, cx| task.tick_task(cx, delta)) {
                self.finish_task(node);
            }
        }
    }

    fn broadcast(&mut self, node: NodeId, kind: TaskEventKind) {
        let Some(binding_id) = self.binding_id(node) else {
            return;
        };
        let owner = self.owner;

        let natives: Vec<NativeListener> = match self.task_slot_mut(node) {
            Some(slot) => slot.native_channel(kind).listeners().copied().collect(),
            None => return,
        };

        for native in natives {
            match native {
                NativeListener::Sequence => self.advance_sequence(node),
            }
        }

        let event = TaskEvent { node, binding_id, kind, owner };
        if let Some(slot) = self.task_slot_mut(node) {
            slot.host_channel(kind).broadcast(&event);
        }
    }

    pub(crate) fn subscribe_native(&mut self, node: NodeId, kind: TaskEventKind, subscriber: SubscriberId, native: NativeListener) {
        if let Some(slot) = self.task_slot_mut(node) {
            slot.native_channel(kind).add(subscriber, native);
        }
    }

    pub fn subscribe_begin(&mut self, node: NodeId, subscriber: SubscriberId, listener: Listener<TaskEvent>) {
        if let Some(slot) = self.task_slot_mut(node) {
            slot.on_begin.add(subscriber, listener);
        }
    }

    pub fn subscribe_finish(&mut self, node: NodeId, subscriber: SubscriberId, listener: Listener<TaskEvent>) {
        if let Some(slot) = self.task_slot_mut(node) {
            slot.on_finish.add(subscriber, listener);
        }
    }

    /// Removes every host listener `subscriber` added to the Task at `node`.
    pub fn unsubscribe(&mut self, node: NodeId, subscriber: SubscriberId) -> usize {
        match self.task_slot_mut(node) {
            Some(slot) => slot.on_begin.remove_all(subscriber) + slot.on_finish.remove_all(subscriber),
            None => 0,
        }
    }

    /// Number of host listeners on both channels of the Task at `node`.
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.task_slot(node).map_or(0, |slot| slot.on_begin.len() + slot.on_finish.len())
    }
}


#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use bevy::reflect::Reflect;
    use crate::property_path::PropertyPath;
    use super::*;

    /// Records its hook calls; finishes from begin when `instant`.
    #[derive(Reflect, Clone, Debug, Default)]
    struct Probe {
        instant: bool,
        ticks_to_finish: u32,
        begins: u32,
        ticks: u32,
        finishes: u32,
        resets: u32,
        received: f32,
        registered: bool,
    }

    impl ScriptableTask for Probe {
        fn begin_task(&mut self, cx: &mut TaskCx) {
            self.begins += 1;
            if self.instant {
                cx.finish();
            }
        }

        fn tick_task(&mut self, cx: &mut TaskCx, _delta: DeltaSeconds) {
            self.ticks += 1;
            if self.ticks >= self.ticks_to_finish {
                cx.finish();
            }
        }

        fn finish_task(&mut self, _cx: &mut TaskCx) {
            self.finishes += 1;
        }

        fn reset_task(&mut self, _cx: &mut TaskCx) {
            self.resets += 1;
        }

        fn on_register(&mut self, _cx: &RegisterCx) {
            self.registered = true;
        }

        fn on_unregister(&mut self, _cx: &RegisterCx) {
            self.registered = false;
        }

        fn can_ever_tick(&self) -> bool {
            self.ticks_to_finish > 0
        }
    }

    fn instant() -> Probe {
        Probe { instant: true, ..Default::default() }
    }

    fn log_events(graph: &mut ScriptGraph, node: NodeId) -> Arc<Mutex<Vec<TaskEventKind>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for kind in [TaskEventKind::Begun, TaskEventKind::Finished] {
            let log = log.clone();
            let listener: Listener<TaskEvent> = Box::new(move |evt: &TaskEvent| log.lock().unwrap().push(evt.kind));
            match kind {
                TaskEventKind::Begun => graph.subscribe_begin(node, SubscriberId(7), listener),
                TaskEventKind::Finished => graph.subscribe_finish(node, SubscriberId(7), listener),
            }
        }
        log
    }

    #[test]
    fn begin_requires_registration() {
        let mut graph = ScriptGraph::new("Unregistered");
        let node = graph.add_task(None, instant()).unwrap();

        assert_eq!(graph.begin_task(node), Err(TaskError::NotRegistered(node)));
        assert_eq!(graph.task_status(node), Some(TaskStatus::None));
    }

    #[test]
    fn begin_while_begun_is_rejected() {
        let mut graph = ScriptGraph::new("Twice");
        let node = graph.add_task(None, Probe { ticks_to_finish: 5, ..Default::default() }).unwrap();
        graph.register(None);

        assert_eq!(graph.begin_task(node), Ok(()));
        assert_eq!(graph.begin_task(node), Err(TaskError::AlreadyBegun(node)));
        assert_eq!(graph.task::<Probe>(node).unwrap().begins, 1);
    }

    #[test]
    fn conditions_are_not_tasks() {
        let mut graph = ScriptGraph::new("NotATask");
        let node = graph.add_condition(None, crate::condition_library::BoolCondition::default()).unwrap();
        graph.register(None);

        assert_eq!(graph.begin_task(node), Err(TaskError::UnknownTask(node)));
    }

    #[test]
    fn instant_task_broadcasts_begun_then_finished() {
        let mut graph = ScriptGraph::new("Instant");
        let node = graph.add_task(None, instant()).unwrap();
        let log = log_events(&mut graph, node);
        graph.register(None);

        graph.begin_task(node).unwrap();

        assert_eq!(*log.lock().unwrap(), vec![TaskEventKind::Begun, TaskEventKind::Finished]);
        assert_eq!(graph.task_status(node), Some(TaskStatus::Finished));
        assert_eq!(graph.task::<Probe>(node).unwrap().finishes, 1);
    }

    #[test]
    fn do_once_only_runs_the_first_time() {
        let mut graph = ScriptGraph::new("Once");
        let node = graph.add_task_with_control(None, instant(), TaskControl::once()).unwrap();
        let log = log_events(&mut graph, node);
        graph.register(None);

        graph.begin_task(node).unwrap();
        graph.begin_task(node).unwrap();

        let probe = graph.task::<Probe>(node).unwrap();
        assert_eq!(probe.begins, 1);
        assert_eq!(probe.finishes, 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec![TaskEventKind::Begun, TaskEventKind::Finished, TaskEventKind::Finished]
        );
        assert!(graph.task_state(node).unwrap().do_once_finished);
    }

    #[test]
    fn finite_loops_rerun_begin_without_events() {
        let mut graph = ScriptGraph::new("Loops");
        let node = graph.add_task_with_control(None, instant(), TaskControl::repeat(3)).unwrap();
        let log = log_events(&mut graph, node);
        graph.register(None);

        graph.begin_task(node).unwrap();

        let probe = graph.task::<Probe>(node).unwrap();
        assert_eq!(probe.begins, 3);
        assert_eq!(probe.finishes, 1);
        assert_eq!(*log.lock().unwrap(), vec![TaskEventKind::Begun, TaskEventKind::Finished]);
        assert_eq!(graph.task_state(node).unwrap().current_loop_index, 3);
    }

    #[test]
    fn finite_loops_only_finish_on_the_last_external_finish() {
        let mut graph = ScriptGraph::new("DrivenLoops");
        let node = graph.add_task_with_control(None, Probe::default(), TaskControl::repeat(3)).unwrap();
        let log = log_events(&mut graph, node);
        graph.register(None);

        graph.begin_task(node).unwrap();
        assert_eq!(graph.task_status(node), Some(TaskStatus::Begun));

        let mut statuses = Vec::new();
        for _ in 0..3 {
            graph.finish_task(node);
            statuses.push(graph.task_status(node));
        }

        assert_eq!(
            statuses,
            vec![Some(TaskStatus::Begun), Some(TaskStatus::Begun), Some(TaskStatus::Finished)]
        );
        let probe = graph.task::<Probe>(node).unwrap();
        assert_eq!(probe.begins, 3);
        assert_eq!(probe.finishes, 1);
        assert_eq!(*log.lock().unwrap(), vec![TaskEventKind::Begun, TaskEventKind::Finished]);
    }

    #[test]
    fn infinite_instant_loops_advance_once_per_tick() {
        let mut graph = ScriptGraph::new("Forever");
        let node = graph.add_task_with_control(None, instant(), TaskControl::forever()).unwrap();
        graph.register(None);

        graph.begin_task(node).unwrap();
        assert_eq!(graph.task::<Probe>(node).unwrap().begins, 2);

        graph.tick(0.1);
        graph.tick(0.1);
        assert_eq!(graph.task::<Probe>(node).unwrap().begins, 4);
        assert_eq!(graph.task_status(node), Some(TaskStatus::Begun));
    }

    #[test]
    fn ticking_drives_completion() {
        let mut graph = ScriptGraph::new("Ticking");
        let node = graph.add_task(None, Probe { ticks_to_finish: 2, ..Default::default() }).unwrap();
        graph.register(None);

        graph.tick(0.1);
        assert_eq!(graph.task::<Probe>(node).unwrap().ticks, 0);

        graph.begin_task(node).unwrap();
        assert!(graph.is_tick_enabled(node));

        graph.tick(0.1);
        assert_eq!(graph.task_status(node), Some(TaskStatus::Begun));
        graph.tick(0.1);
        assert_eq!(graph.task_status(node), Some(TaskStatus::Finished));
        assert!(!graph.is_tick_enabled(node));

        graph.tick(0.1);
        assert_eq!(graph.task::<Probe>(node).unwrap().ticks, 2);
    }

    #[test]
    fn reset_is_a_no_op_unless_finished() {
        let mut graph = ScriptGraph::new("Reset");
        let node = graph.add_task_with_control(
            None,
            Probe { ticks_to_finish: 1, ..Default::default() },
            TaskControl::once(),
        ).unwrap();
        graph.register(None);

        graph.reset_task(node);
        assert_eq!(graph.task::<Probe>(node).unwrap().resets, 0);

        graph.begin_task(node).unwrap();
        graph.reset_task(node);
        assert_eq!(graph.task_status(node), Some(TaskStatus::Begun));
        assert_eq!(graph.task::<Probe>(node).unwrap().resets, 0);

        graph.tick(0.1);
        graph.reset_task(node);
        assert_eq!(graph.task_state(node), Some(TaskState::default()));
        assert_eq!(graph.task::<Probe>(node).unwrap().resets, 1);
    }

    #[test]
    fn forced_finish_is_ignored_when_not_begun() {
        let mut graph = ScriptGraph::new("Force");
        let node = graph.add_task(None, Probe { ticks_to_finish: 9, ..Default::default() }).unwrap();
        graph.register(None);

        graph.finish_task(node);
        assert_eq!(graph.task_status(node), Some(TaskStatus::None));

        graph.begin_task(node).unwrap();
        graph.finish_task(node);
        graph.finish_task(node);
        assert_eq!(graph.task_status(node), Some(TaskStatus::Finished));
        assert_eq!(graph.task::<Probe>(node).unwrap().finishes, 1);
    }

    #[test]
    fn forcing_skips_remaining_loops() {
        let mut graph = ScriptGraph::new("ForceLoop");
        let node = graph.add_task_with_control(
            None,
            Probe { ticks_to_finish: 9, ..Default::default() },
            TaskControl::forever(),
        ).unwrap();
        graph.register(None);

        graph.begin_task(node).unwrap();
        graph.finish_task(node);
        assert_eq!(graph.task_status(node), Some(TaskStatus::Begun));
        assert_eq!(graph.task::<Probe>(node).unwrap().begins, 2);

        graph.force_finish_task(node);
        assert_eq!(graph.task_status(node), Some(TaskStatus::Finished));
        assert_eq!(graph.task::<Probe>(node).unwrap().finishes, 1);
    }

    #[test]
    fn disabled_tasks_do_not_begin() {
        let mut graph = ScriptGraph::new("Disabled");
        let node = graph.add_task(None, instant()).unwrap();
        graph.set_enabled(node, false);
        graph.register(None);

        assert_eq!(graph.begin_task(node), Err(TaskError::Disabled(node)));
        assert_eq!(graph.task_status(node), Some(TaskStatus::None));
        assert_eq!(graph.task::<Probe>(node).unwrap().begins, 0);
    }

    #[test]
    fn bindings_resolve_on_begin() {
        let mut graph = ScriptGraph::new("Bound");
        let source = graph.add_task(None, Probe { received: 0.25, ..Default::default() }).unwrap();
        let target = graph.add_task(None, instant()).unwrap();
        let src = graph.node_path(source, "received").unwrap();
        let tgt = graph.node_path(target, "received").unwrap();
        graph.add_property_binding(target, src, tgt).unwrap();
        graph.register(None);

        graph.begin_task(target).unwrap();
        assert_eq!(graph.task::<Probe>(target).unwrap().received, 0.25);

        let ctx_src = PropertyPath::context("boost").unwrap();
        let tgt = graph.node_path(target, "received").unwrap();
        assert!(!graph.can_bind(target, &ctx_src, &tgt));
    }

    #[test]
    fn unregister_clears_listeners_and_notifies_behaviours() {
        let mut graph = ScriptGraph::new("Teardown");
        let node = graph.add_task(None, instant()).unwrap();
        let log = log_events(&mut graph, node);
        graph.register(None);
        assert!(graph.task::<Probe>(node).unwrap().registered);

        graph.unregister();
        assert_eq!(graph.listener_count(node), 0);
        assert!(!graph.task::<Probe>(node).unwrap().registered);

        graph.register(None);
        graph.begin_task(node).unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_removes_only_that_subscriber() {
        let mut graph = ScriptGraph::new("Unsubscribe");
        let node = graph.add_task(None, instant()).unwrap();
        graph.subscribe_finish(node, SubscriberId(1), Box::new(|_| {}));
        graph.subscribe_finish(node, SubscriberId(2), Box::new(|_| {}));
        graph.subscribe_begin(node, SubscriberId(1), Box::new(|_| {}));

        assert_eq!(graph.unsubscribe(node, SubscriberId(1)), 2);
        assert_eq!(graph.listener_count(node), 1);
    }
}
