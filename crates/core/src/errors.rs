/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Error types.
//!
//! Most failures in this library are *not* errors as far as the host is concerned:
//! a binding that does not resolve is simply inert, a missing condition is false and
//! an empty Action finishes immediately. The types here exist so that the internals
//! can reason about *why* something did not happen (and log it), plus a small set of
//! lifecycle violations that callers are expected to treat as bugs.

use crate::identifiers::NodeId;

/// Why a PropertyPath could not be walked against a concrete value.
///
/// These are data, not panics: the binding engine inspects them and skips the copy.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathResolutionError {
    #[error("segment {segment}: no field named {name:?} on {type_path}")]
    UnknownField {
        segment: usize,
        name: String,
        type_path: String,
    },

    #[error("segment {segment}: index {index} is out of bounds (len: {len})")]
    IndexOutOfBounds {
        segment: usize,
        index: usize,
        len: usize,
    },

    #[error("segment {segment}: {type_path} cannot be indexed")]
    NotIndexable {
        segment: usize,
        type_path: String,
    },

    #[error("segment {segment}: instanced slot is empty")]
    NullInstance {
        segment: usize,
    },

    #[error("segment {segment}: expected an instance of {expected:?}, found {found:?}")]
    InstanceTypeMismatch {
        segment: usize,
        expected: String,
        found: String,
    },

    #[error("segment {segment}: {type_path} has no fields")]
    NotAContainer {
        segment: usize,
        type_path: String,
    },

    #[error("struct {0} is not accessible from here")]
    UnknownStruct(crate::identifiers::BindingId),
}

impl PathResolutionError {
    /// Index of the segment that failed to resolve, if the failure is segment-specific.
    pub fn segment(&self) -> Option<usize> {
        match self {
            Self::UnknownField { segment, .. } => Some(*segment),
            Self::IndexOutOfBounds { segment, .. } => Some(*segment),
            Self::NotIndexable { segment, .. } => Some(*segment),
            Self::NullInstance { segment } => Some(*segment),
            Self::InstanceTypeMismatch { segment, .. } => Some(*segment),
            Self::NotAContainer { segment, .. } => Some(*segment),
            Self::UnknownStruct(_) => None,
        }
    }
}


/// Failures to parse the text form of a PropertyPath (e.g. `Shapes[1].Shape<Circle>.Radius`).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathParseError {
    #[error("empty segment at position {0}")]
    EmptySegment(usize),

    #[error("malformed index in segment {0:?}")]
    MalformedIndex(String),

    #[error("malformed instance type in segment {0:?}")]
    MalformedInstanceType(String),
}


/// Lifecycle contract violations raised by the Task engine.
///
/// These indicate a bug in the caller (e.g. beginning a task that has never been registered)
/// and would corrupt the loop/finish bookkeeping if allowed to proceed, so they are
/// surfaced rather than tolerated.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskError {
    #[error("task {0} was used before being registered")]
    NotRegistered(NodeId),

    #[error("task {0} was begun while already running")]
    AlreadyBegun(NodeId),

    #[error("node {0} is not a task")]
    UnknownTask(NodeId),

    #[error("task {0} is disabled")]
    Disabled(NodeId),
}


/// Lifecycle contract violations raised by Actions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("action {0:?} was begun before being registered")]
    NotRegistered(String),

    #[error("action {0:?} was begun while already running")]
    AlreadyRunning(String),
}


/// Errors raised when assembling a ScriptGraph by hand.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0} does not exist in this graph")]
    UnknownNode(NodeId),

    #[error("cannot add nodes to a registered graph")]
    GraphRegistered,
}
