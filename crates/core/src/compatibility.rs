/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Deciding whether a value can flow from one property into another, and moving it.
//!
//! The decision is made on *descriptors* derived from reflected type information,
//! so it can run both when a binding is authored (no live values needed) and right
//! before a copy. The first matching rule wins:
//!
//! 1. identical types: direct copy;
//! 2. two arrays: identical element types, or object-reference elements where the source
//!    class is the target class or one of its subclasses (covariant arrays);
//!    any other element mismatch is incompatible, there is no element-wise conversion;
//! 3. an array on one side only: incompatible;
//! 4. two object references: source class is the target class or a subclass;
//! 5. two structs with the same layout (same field names and types, in order): raw copy;
//! 6. float and double: narrowing/widening;
//! 7. integer into float or double: promotion;
//! 8. bool into any numeric: 0/1;
//! 9. anything else: incompatible.

use core::any::TypeId;
use bevy::reflect::{PartialReflect, ReflectKind, ReflectMut, ReflectRef, TypeInfo};

use crate::object_ref::{ClassHierarchy, ClassId};


/// Coarse classification of a property's type, as far as bindings care.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    Bool,
    Integer,
    Float,
    Double,
    /// A reference to a host object of the given class.
    Object(ClassId),
    /// A List or Array; the element descriptor is missing if it is not statically known.
    Array(Option<Box<PropertyDescriptor>>),
    Struct,
    Enum,
    Opaque,
}

impl PropertyKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Double)
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

/// What the binding engine knows about the type of one property.
#[derive(Clone, Debug)]
pub struct PropertyDescriptor {
    pub type_id: TypeId,
    pub type_path: &'static str,
    pub kind: PropertyKind,
    info: &'static TypeInfo,
}

impl PartialEq for PropertyDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.kind == other.kind
    }
}

impl Eq for PropertyDescriptor {}

fn is_integer_type(type_id: TypeId) -> bool {
    [
        TypeId::of::<i8>(), TypeId::of::<i16>(), TypeId::of::<i32>(), TypeId::of::<i64>(),
        TypeId::of::<i128>(), TypeId::of::<isize>(),
        TypeId::of::<u8>(), TypeId::of::<u16>(), TypeId::of::<u32>(), TypeId::of::<u64>(),
        TypeId::of::<u128>(), TypeId::of::<usize>(),
    ].contains(&type_id)
}

impl PropertyDescriptor {
    pub fn from_type_info(info: &'static TypeInfo, classes: &ClassHierarchy) -> Self {
        let type_id = info.type_id();

        let kind = if type_id == TypeId::of::<bool>() {
            PropertyKind::Bool
        } else if type_id == TypeId::of::<f32>() {
            PropertyKind::Float
        } else if type_id == TypeId::of::<f64>() {
            PropertyKind::Double
        } else if is_integer_type(type_id) {
            PropertyKind::Integer
        } else if let Some(class) = classes.referenced_class(type_id) {
            PropertyKind::Object(class)
        } else {
            match info {
                TypeInfo::List(list) => PropertyKind::Array(
                    list.item_info().map(|item| Box::new(Self::from_type_info(item, classes)))
                ),
                TypeInfo::Array(array) => PropertyKind::Array(
                    array.item_info().map(|item| Box::new(Self::from_type_info(item, classes)))
                ),
                TypeInfo::Struct(_) | TypeInfo::TupleStruct(_) => PropertyKind::Struct,
                TypeInfo::Enum(_) => PropertyKind::Enum,
                _ => PropertyKind::Opaque,
            }
        };

        Self {
            type_id,
            type_path: info.type_path(),
            kind,
            info,
        }
    }

    /// Describes a live value, if it represents a concrete (non-dynamic) type.
    pub fn of_value(value: &dyn PartialReflect, classes: &ClassHierarchy) -> Option<Self> {
        value
            .get_represented_type_info()
            .map(|info| Self::from_type_info(info, classes))
    }

    pub fn type_info(&self) -> &'static TypeInfo {
        self.info
    }

    /// Same native value layout: distinct struct types whose fields line up exactly.
    pub fn same_layout(&self, other: &Self) -> bool {
        match (self.info, other.info) {
            (TypeInfo::Struct(mine), TypeInfo::Struct(theirs)) => {
                mine.field_len() == theirs.field_len()
                && mine.iter().zip(theirs.iter()).all(|(a, b)| {
                    a.name() == b.name() && a.type_id() == b.type_id()
                })
            },
            (TypeInfo::TupleStruct(mine), TypeInfo::TupleStruct(theirs)) => {
                mine.field_len() == theirs.field_len()
                && mine.iter().zip(theirs.iter()).all(|(a, b)| a.type_id() == b.type_id())
            },
            _ => false,
        }
    }
}


/// How a compatible value gets from the source property into the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CopyMethod {
    /// Same type; clone the value over.
    Direct,
    /// Different but structurally equivalent types (covariant references, same-layout
    /// structs, arrays thereof); applied field by field.
    Structural,
    FloatToDouble,
    DoubleToFloat,
    IntegerToReal,
    BoolToNumeric,
}

fn is_covariant_object(source: &PropertyKind, target: &PropertyKind, classes: &ClassHierarchy) -> bool {
    match (source, target) {
        (PropertyKind::Object(src_class), PropertyKind::Object(tgt_class)) => {
            classes.is_child_of(*src_class, *tgt_class)
        },
        _ => false,
    }
}

/// Picks the copy method for a source/target pair, or None if they are incompatible.
pub fn copy_method(
    source: &PropertyDescriptor,
    target: &PropertyDescriptor,
    classes: &ClassHierarchy,
) -> Option<CopyMethod> {
    if source.type_id == target.type_id {
        return Some(CopyMethod::Direct);
    }

    match (&source.kind, &target.kind) {
        (PropertyKind::Array(src_item), PropertyKind::Array(tgt_item)) => {
            let (src_item, tgt_item) = (src_item.as_deref()?, tgt_item.as_deref()?);

            if src_item.type_id == tgt_item.type_id
            || is_covariant_object(&src_item.kind, &tgt_item.kind, classes) {
                Some(CopyMethod::Structural)
            } else {
                None
            }
        },
        (PropertyKind::Array(_), _) | (_, PropertyKind::Array(_)) => None,
        (src, tgt) if is_covariant_object(src, tgt, classes) => Some(CopyMethod::Structural),
        (PropertyKind::Object(_), _) | (_, PropertyKind::Object(_)) => None,
        _ if source.same_layout(target) => Some(CopyMethod::Structural),
        (PropertyKind::Float, PropertyKind::Double) => Some(CopyMethod::FloatToDouble),
        (PropertyKind::Double, PropertyKind::Float) => Some(CopyMethod::DoubleToFloat),
        (PropertyKind::Integer, tgt) if tgt.is_real() => Some(CopyMethod::IntegerToReal),
        (PropertyKind::Bool, tgt) if tgt.is_numeric() => Some(CopyMethod::BoolToNumeric),
        _ => None,
    }
}

/// Whether a binding from `source` into `target` is legal.
pub fn are_compatible(
    source: &PropertyDescriptor,
    target: &PropertyDescriptor,
    classes: &ClassHierarchy,
) -> bool {
    copy_method(source, target, classes).is_some()
}


fn read_integer(value: &dyn PartialReflect) -> Option<i128> {
    macro_rules! try_int {
        ($($ty:ty),*) => {
            $(
                if let Some(num) = value.try_downcast_ref::<$ty>() {
                    return Some(*num as i128);
                }
            )*
        };
    }

    try_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
    None
}

fn write_integer(target: &mut dyn PartialReflect, num: i128) -> bool {
    macro_rules! try_int {
        ($($ty:ty),*) => {
            $(
                if let Some(slot) = target.try_downcast_mut::<$ty>() {
                    *slot = num as $ty;
                    return true;
                }
            )*
        };
    }

    try_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
    false
}

fn write_real(target: &mut dyn PartialReflect, num: f64) -> bool {
    if let Some(slot) = target.try_downcast_mut::<f32>() {
        *slot = num as f32;
        return true;
    }
    if let Some(slot) = target.try_downcast_mut::<f64>() {
        *slot = num;
        return true;
    }
    false
}

/// Drops trailing target elements so a List ends up as long as its source.
fn trim_list(source: &dyn PartialReflect, target: &mut dyn PartialReflect) {
    let source_len = match source.reflect_ref() {
        ReflectRef::List(list) => list.len(),
        _ => return,
    };

    if let ReflectMut::List(list) = target.reflect_mut() {
        while list.len() > source_len {
            list.pop();
        }
    }
}

/// Copies a List into an Array or an Array into a List, element by element.
///
/// None unless exactly one side is a List and the other an Array. A List target ends
/// up as long as its source; an Array target must already be.
fn copy_across_sequences(source: &dyn PartialReflect, target: &mut dyn PartialReflect) -> Option<bool> {
    let items: Vec<&dyn PartialReflect> = match (source.reflect_ref(), target.reflect_kind()) {
        (ReflectRef::List(list), ReflectKind::Array) => list.iter().collect(),
        (ReflectRef::Array(array), ReflectKind::List) => array.iter().collect(),
        _ => return None,
    };

    let copied = match target.reflect_mut() {
        ReflectMut::Array(array) => {
            if array.len() != items.len() {
                return Some(false);
            }
            items.iter().enumerate().all(|(idx, item)| {
                array.get_mut(idx).is_some_and(|slot| slot.try_apply(*item).is_ok())
            })
        },
        ReflectMut::List(list) => {
            let mut ok = true;
            for (idx, item) in items.iter().enumerate() {
                match list.get_mut(idx) {
                    Some(slot) => ok &= slot.try_apply(*item).is_ok(),
                    None => list.push(item.to_dynamic()),
                }
            }
            while list.len() > items.len() {
                list.pop();
            }
            ok
        },
        _ => false,
    };

    Some(copied)
}

/// Moves the value of `source` into `target` using `method`.
///
/// Returns false (leaving the target as untouched as the reflection layer allows)
/// if the values turn out not to fit the method after all.
pub fn copy_value(method: CopyMethod, source: &dyn PartialReflect, target: &mut dyn PartialReflect) -> bool {
    match method {
        CopyMethod::Direct => {
            if let Ok(cloned) = source.reflect_clone() {
                if let Some(concrete) = target.try_as_reflect_mut() {
                    if concrete.set(cloned).is_ok() {
                        return true;
                    }
                }
            }
            target.try_apply(source).is_ok()
        },
        CopyMethod::Structural => {
            if let Some(copied) = copy_across_sequences(source, target) {
                return copied;
            }
            let applied = target.try_apply(source).is_ok();
            if applied {
                trim_list(source, target);
            }
            applied
        },
        CopyMethod::FloatToDouble => match (source.try_downcast_ref::<f32>(), target.try_downcast_mut::<f64>()) {
            (Some(src), Some(tgt)) => { *tgt = f64::from(*src); true },
            _ => false,
        },
        CopyMethod::DoubleToFloat => match (source.try_downcast_ref::<f64>(), target.try_downcast_mut::<f32>()) {
            (Some(src), Some(tgt)) => { *tgt = *src as f32; true },
            _ => false,
        },
        CopyMethod::IntegerToReal => match read_integer(source) {
            Some(num) => write_real(target, num as f64),
            None => false,
        },
        CopyMethod::BoolToNumeric => match source.try_downcast_ref::<bool>() {
            Some(flag) => {
                let num = u8::from(*flag);
                write_integer(target, i128::from(num)) || write_real(target, f64::from(num))
            },
            None => false,
        },
    }
}
