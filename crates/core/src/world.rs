/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! The host world, as seen by Conditions that need to look at objects.
//!
//! The library never dereferences an `Entity` itself; whoever evaluates Conditions
//! provides a `ScriptWorld` to answer questions about them.

use bevy::math::Vec3;
use bevy::prelude::Entity;

pub trait ScriptWorld {
    /// World-space location of `object`, if it has one.
    fn object_location(&self, _object: Entity) -> Option<Vec3> {
        None
    }

    fn is_object_valid(&self, _object: Entity) -> bool {
        true
    }
}

/// A world with no locations, where every non-null reference is valid.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWorld;

impl ScriptWorld for NullWorld {}
