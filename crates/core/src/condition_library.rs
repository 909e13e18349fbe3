/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Ready-made Conditions.
//!
//! All of these are plain data with reflected fields, so every input can be bound.

use bevy::reflect::Reflect;

#[cfg(any(feature = "serialize"))]
use serde::{Serialize, Deserialize};

use crate::condition::{ConditionCx, ScriptableCondition};
use crate::object_ref::{ObjectRef, ScriptActor, ScriptObject};


/// A constant (or bound) flag.
#[derive(Reflect, Clone, Copy, Debug, PartialEq)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub struct BoolCondition {
    pub value: bool,
}

impl Default for BoolCondition {
    fn default() -> Self {
        Self { value: true }
    }
}

impl ScriptableCondition for BoolCondition {
    fn evaluate(&self, _cx: &ConditionCx) -> bool {
        self.value
    }

    fn display_title(&self) -> String {
        self.value.to_string()
    }
}


#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub enum BoolOp {
    #[default]
    And,
    Or,
    Xor,
    Nand,
    Equal,
    NotEqual,
}

impl BoolOp {
    pub fn apply(&self, a: bool, b: bool) -> bool {
        match self {
            Self::And => a && b,
            Self::Or => a || b,
            Self::Xor => a ^ b,
            Self::Nand => !(a && b),
            Self::Equal => a == b,
            Self::NotEqual => a != b,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Nand => "NAND",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub struct CompareBooleans {
    pub a: bool,
    pub b: bool,
    pub operation: BoolOp,
}

impl ScriptableCondition for CompareBooleans {
    fn evaluate(&self, _cx: &ConditionCx) -> bool {
        self.operation.apply(self.a, self.b)
    }

    fn display_title(&self) -> String {
        format!("{} {} {}", self.a, self.operation.symbol(), self.b)
    }
}


#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub enum ComparisonOp {
    #[default]
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl ComparisonOp {
    /// Compares `a` to `b`; equality checks accept a difference of up to `tolerance`.
    pub fn apply(&self, a: f64, b: f64, tolerance: f64) -> bool {
        match self {
            Self::Equal => (a - b).abs() <= tolerance,
            Self::NotEqual => (a - b).abs() > tolerance,
            Self::Less => a < b,
            Self::LessOrEqual => a <= b,
            Self::Greater => a > b,
            Self::GreaterOrEqual => a >= b,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
        }
    }
}

/// Compares two numbers. Bind any numeric property into `a`/`b`; they widen to f64.
#[derive(Reflect, Clone, Copy, Debug, PartialEq)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub struct CompareNumbers {
    pub a: f64,
    pub b: f64,
    pub operation: ComparisonOp,
    pub tolerance: f64,
}

impl Default for CompareNumbers {
    fn default() -> Self {
        Self { a: 0., b: 0., operation: ComparisonOp::default(), tolerance: 1e-4 }
    }
}

impl ScriptableCondition for CompareNumbers {
    fn evaluate(&self, _cx: &ConditionCx) -> bool {
        self.operation.apply(self.a, self.b, self.tolerance)
    }

    fn display_title(&self) -> String {
        format!("{} {} {}", format_number(self.a), self.operation.symbol(), format_number(self.b))
    }
}

/// At most two decimals, trailing zeroes dropped.
fn format_number(value: f64) -> String {
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "" | "-" | "-0" => String::from("0"),
        _ => text.to_string(),
    }
}


/// True with the given chance, rolled anew on every evaluation.
#[derive(Reflect, Clone, Copy, Debug, PartialEq)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub struct Probability {
    /// 0 never passes, 1 always does.
    pub chance: f32,
}

impl Default for Probability {
    fn default() -> Self {
        Self { chance: 0.5 }
    }
}

impl ScriptableCondition for Probability {
    fn evaluate(&self, _cx: &ConditionCx) -> bool {
        if self.chance >= 1. {
            return true;
        }
        if self.chance <= 0. {
            return false;
        }
        rand::random::<f32>() < self.chance
    }

    fn display_title(&self) -> String {
        format!("{}% chance", format_number(f64::from(self.chance) * 100.))
    }
}


/// Compares the distance between two located objects against a threshold.
///
/// False if either reference is null or has no location in the world.
#[derive(Reflect, Clone, Debug, PartialEq)]
pub struct DistanceCheck {
    pub origin: ObjectRef<ScriptActor>,
    pub target: ObjectRef<ScriptActor>,
    pub operation: ComparisonOp,
    pub distance: f32,
}

impl Default for DistanceCheck {
    fn default() -> Self {
        Self {
            origin: ObjectRef::null(),
            target: ObjectRef::null(),
            operation: ComparisonOp::Less,
            distance: 500.,
        }
    }
}

impl ScriptableCondition for DistanceCheck {
    fn evaluate(&self, cx: &ConditionCx) -> bool {
        let (Some(origin), Some(target)) = (self.origin.get(), self.target.get()) else {
            return false;
        };

        let world = cx.world();
        let (Some(from), Some(to)) = (world.object_location(origin), world.object_location(target)) else {
            return false;
        };

        self.operation.apply(f64::from(from.distance(to)), f64::from(self.distance), 1e-4)
    }

    fn display_title(&self) -> String {
        format!("Distance {} {}", self.operation.symbol(), format_number(f64::from(self.distance)))
    }
}


/// True if the reference is set and the world still knows the object.
#[derive(Reflect, Clone, Debug, Default, PartialEq)]
pub struct IsValid {
    pub target: ObjectRef<ScriptObject>,
}

impl ScriptableCondition for IsValid {
    fn evaluate(&self, cx: &ConditionCx) -> bool {
        self.target.get().is_some_and(|object| cx.world().is_object_valid(object))
    }
}
