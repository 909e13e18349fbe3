/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Ready-made Tasks. See also `crate::action::RunActionAsset`.

use bevy::reflect::Reflect;

#[cfg(any(feature = "serialize"))]
use serde::{Serialize, Deserialize};

use crate::task::{ScriptableTask, TaskCx};
use crate::types::DeltaSeconds;


/// Finishes once `duration` seconds worth of ticks have passed.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub struct Wait {
    pub duration: f32,
    pub elapsed: f32,
}

impl Wait {
    pub fn new(duration: f32) -> Self {
        Self { duration, elapsed: 0. }
    }
}

impl ScriptableTask for Wait {
    fn begin_task(&mut self, cx: &mut TaskCx) {
        self.elapsed = 0.;
        if self.duration <= 0. {
            cx.finish();
        }
    }

    fn tick_task(&mut self, cx: &mut TaskCx, delta: DeltaSeconds) {
        self.elapsed += delta;
        if self.elapsed >= self.duration {
            cx.finish();
        }
    }

    fn reset_task(&mut self, _cx: &mut TaskCx) {
        self.elapsed = 0.;
    }

    fn can_ever_tick(&self) -> bool {
        true
    }
}


/// Logs `message` and finishes straight away.
#[derive(Reflect, Clone, Debug, Default, PartialEq)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub struct LogMessage {
    pub message: String,
    /// How many times the message was emitted; handy when the log output is off.
    pub emitted: u32,
}

impl LogMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), emitted: 0 }
    }
}

impl ScriptableTask for LogMessage {
    fn begin_task(&mut self, cx: &mut TaskCx) {
        #[cfg(feature = "logging")]
        bevy::log::info!("[{:?}] {}", cx.owner(), self.message);

        self.emitted += 1;
        cx.finish();
    }
}
