/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Fire-and-forget execution of an Action on behalf of an owner.
//!
//! The runner registers and begins the Action, waits for it to complete (whether that
//! happens right away or after many ticks), then tears it down, broadcasts its own
//! finish and marks itself ready to be disposed of.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::action::ScriptableAction;
use crate::errors::ActionError;
use crate::events::{ActionEvent, Listener, Multicast};
use crate::identifiers::SubscriberId;
use crate::types::{DeltaSeconds, OwnerRef, ThreadSafeRef};


/// Subscriber key of the one listener a runner puts on its Action.
const RUNNER_SUBSCRIBER: SubscriberId = SubscriberId(u64::MAX - 1);


pub struct ScriptableActionRunner {
    owner: OwnerRef,
    action: ScriptableAction,
    /// Reset the Action before every activation.
    pub reset_on_activate: bool,
    finished: ThreadSafeRef<AtomicBool>,
    active: bool,
    ready_to_destroy: bool,
    on_finish: Multicast<Listener<ActionEvent>>,
}

impl ScriptableActionRunner {
    pub fn new(owner: OwnerRef, action: ScriptableAction, reset_on_activate: bool) -> Self {
        Self {
            owner,
            action,
            reset_on_activate,
            finished: ThreadSafeRef::new(AtomicBool::new(false)),
            active: false,
            ready_to_destroy: false,
            on_finish: Multicast::new(),
        }
    }

    pub fn owner(&self) -> OwnerRef {
        self.owner
    }

    pub fn action(&self) -> &ScriptableAction {
        &self.action
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once the Action completed and was torn down.
    pub fn is_ready_to_destroy(&self) -> bool {
        self.ready_to_destroy
    }

    pub fn subscribe_finish(&mut self, subscriber: SubscriberId, listener: Listener<ActionEvent>) {
        self.on_finish.add(subscriber, listener);
    }

    pub fn unsubscribe_finish(&mut self, subscriber: SubscriberId) -> usize {
        self.on_finish.remove_all(subscriber)
    }

    /// Registers and begins the Action. Does nothing while already active.
    pub fn activate(&mut self) -> Result<(), ActionError> {
        if self.active {
            #[cfg(feature = "logging")]
            bevy::log::warn!("Runner for {:?} is already active", self.action.name());
            return Ok(());
        }

        if self.reset_on_activate {
            self.action.reset();
        }

        self.finished.store(false, Ordering::SeqCst);
        self.ready_to_destroy = false;

        let finished = self.finished.clone();
        self.action.unsubscribe_finish(RUNNER_SUBSCRIBER);
        self.action.subscribe_finish(RUNNER_SUBSCRIBER, Box::new(move |_| {
            finished.store(true, Ordering::SeqCst);
        }));

        self.action.register(self.owner);
        self.active = true;

        if let Err(err) = self.action.begin() {
            self.action.unsubscribe_finish(RUNNER_SUBSCRIBER);
            self.action.unregister();
            self.active = false;
            return Err(err);
        }

        self.poll();
        Ok(())
    }

    pub fn tick(&mut self, delta: DeltaSeconds) {
        if !self.active {
            return;
        }
        self.action.tick(delta);
        self.poll();
    }

    /// Force-finishes the Action; the runner then completes as usual.
    pub fn cancel(&mut self) {
        if !self.active {
            return;
        }
        self.action.finish();
        self.poll();
    }

    fn poll(&mut self) {
        if !self.active || !self.finished.load(Ordering::SeqCst) {
            return;
        }

        self.action.unsubscribe_finish(RUNNER_SUBSCRIBER);
        self.action.unregister();
        self.active = false;
        self.ready_to_destroy = true;

        #[cfg(feature = "logging")]
        bevy::log::debug!("Runner for {:?} finished", self.action.name());

        let event = ActionEvent { action: self.action.name().to_string(), owner: self.owner };
        self.on_finish.broadcast(&event);
    }
}

impl core::fmt::Debug for ScriptableActionRunner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScriptableActionRunner")
            .field("owner", &self.owner)
            .field("action", &self.action)
            .field("active", &self.active)
            .field("ready_to_destroy", &self.ready_to_destroy)
            .finish()
    }
}
