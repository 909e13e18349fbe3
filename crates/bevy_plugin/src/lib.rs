/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/

//! This crate extends the Scriptable library with a plugin that streamlines running
//! Actions inside an existing Bevy application.
//!
//! The plugin ticks every `RunningAction` Component once per frame, writes a
//! `ScriptableActionFinished` Message when one completes and removes the Component.
//!
//! Conditions that need to look at the world (e.g. `DistanceCheck`) can be evaluated
//! from any System through the `ScriptableWorld` SystemParam, which reads object
//! locations from `ScriptableLocation` Components.

mod plugin;

pub use plugin::{RunningAction, ScriptableActionFinished, ScriptableLocation, ScriptablePlugin, ScriptableWorld};
