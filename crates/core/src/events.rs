/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Broadcast channels and the events sent over them.
//!
//! Every Task exposes two independent channels (begun and finished), each in two flavours:
//! - *native* listeners are reactions internal to the owning graph (e.g. an Action moving
//!   on to its next Task once the current one finishes). They always run first.
//! - *host* listeners are arbitrary user callbacks, run after the native ones.
//!
//! Listeners are kept in registration order and can be removed in bulk by subscriber.

use bevy::prelude::Entity;

use crate::identifiers::{BindingId, NodeId, SubscriberId};


/// A boxed host callback reacting to events of type `E`.
pub type Listener<E> = Box<dyn FnMut(&E) + Send + Sync>;


/// An ordered list of listeners, keyed by who subscribed them.
pub struct Multicast<L> {
    listeners: Vec<(SubscriberId, L)>,
}

impl<L> Default for Multicast<L> {
    fn default() -> Self {
        Self { listeners: Vec::new() }
    }
}

impl<L> Multicast<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subscriber: SubscriberId, listener: L) {
        self.listeners.push((subscriber, listener));
    }

    /// Removes everything `subscriber` added; returns how many listeners went away.
    pub fn remove_all(&mut self, subscriber: SubscriberId) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|(owner, _)| *owner != subscriber);
        before - self.listeners.len()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn contains(&self, subscriber: SubscriberId) -> bool {
        self.listeners.iter().any(|(owner, _)| *owner == subscriber)
    }

    pub fn listeners(&self) -> impl Iterator<Item = &L> {
        self.listeners.iter().map(|(_, listener)| listener)
    }
}

impl<E> Multicast<Listener<E>> {
    /// Calls every current listener, in registration order.
    pub fn broadcast(&mut self, event: &E) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }
}

impl<L> core::fmt::Debug for Multicast<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.listeners.iter().map(|(owner, _)| owner))
            .finish()
    }
}


/// Graph-internal reactions to Task events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeListener {
    /// Advance the graph's Action sequence past the Task that raised the event.
    Sequence,
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskEventKind {
    Begun,
    Finished,
}

/// Sent to host listeners when a Task truly begins or finishes (never per loop iteration).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskEvent {
    pub node: NodeId,
    pub binding_id: BindingId,
    pub kind: TaskEventKind,
    pub owner: Option<Entity>,
}


/// Sent when an Action sequence (or an async runner wrapping one) completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionEvent {
    /// Name of the graph backing the Action.
    pub action: String,
    pub owner: Option<Entity>,
}
