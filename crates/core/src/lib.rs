/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Data-driven Tasks and Conditions, wired together with Property Bindings.
//!
//! A `ScriptGraph` holds Tasks (things that run), Conditions (things that are true or
//! false) and a Context of named variables. Any node property may be bound to a
//! property of an accessible node or to a Context variable; bindings are copied in right
//! before the node runs or evaluates.

pub mod action;
pub mod bindings;
pub mod compatibility;
pub mod condition;
pub mod condition_library;
pub mod context;
pub mod errors;
pub mod events;
pub mod graph;
pub mod identifiers;
pub mod object_ref;
pub mod property_path;
pub mod requirement;
pub mod runner;
pub mod task;
pub mod task_library;
mod thread_safe_wrapper;
pub mod types;
pub mod world;

pub mod prelude {
    pub use crate::action::{ActionAsset, RunActionAsset, ScriptableAction};
    pub use crate::condition::{ConditionAnd, ConditionCx, ConditionOr, EvalScope, ScriptableCondition};
    pub use crate::condition_library::{
        BoolCondition, BoolOp, CompareBooleans, CompareNumbers, ComparisonOp, DistanceCheck, IsValid, Probability,
    };
    pub use crate::context::Context;
    pub use crate::errors::{ActionError, GraphError, TaskError};
    pub use crate::events::{ActionEvent, TaskEvent, TaskEventKind};
    pub use crate::graph::{RegisterCx, ScriptGraph};
    pub use crate::identifiers::{BindingId, NodeId, SubscriberId};
    pub use crate::object_ref::{ClassHierarchy, ObjectRef, ScriptActor, ScriptClass, ScriptObject};
    pub use crate::property_path::PropertyPath;
    pub use crate::requirement::{
        ConditionAsset, ConditionGroup, RequirementAsset, RequirementMode, ScriptableRequirement,
    };
    pub use crate::runner::ScriptableActionRunner;
    pub use crate::task::{ScriptableTask, TaskControl, TaskCx, TaskStatus};
    pub use crate::task_library::{LogMessage, Wait};
    pub use crate::types::ThreadSafeRef;
    pub use crate::world::{NullWorld, ScriptWorld};
}
