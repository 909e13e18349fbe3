/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Type aliases, to express intent better.

pub use crate::thread_safe_wrapper::ThreadSafeRef;

/// Host-side objects are ECS entities; the library never dereferences them itself.
pub type ObjectId = bevy::prelude::Entity;
pub type OwnerRef = Option<ObjectId>;

pub type ClassHierarchyRef = ThreadSafeRef<crate::object_ref::ClassHierarchy>;

pub type ActionAssetRef = ThreadSafeRef<crate::action::ActionAsset>;
pub type RequirementAssetRef = ThreadSafeRef<crate::requirement::RequirementAsset>;

/// Seconds elapsed since the previous tick.
pub type DeltaSeconds = f32;
