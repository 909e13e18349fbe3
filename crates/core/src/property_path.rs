/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Property paths and their resolution against live reflected values.
//!
//! A PropertyPath names a property somewhere inside one bindable struct: the struct is
//! identified by a BindingId, the property by a sequence of segments. Each segment
//! names a field, optionally indexes into it (for Vecs and arrays) and optionally
//! carries an *instance type* tag for polymorphic slots.
//!
//! Polymorphic ('instanced') slots are modelled with plain reflection:
//! - an `Option<T>` is a nullable slot; resolving *through* it requires it to be `Some`,
//! - an enum is a tagged union; the tag names the variant the path was authored against,
//! - for anything else, the tag is compared against the (short or full) type path.
//!
//! The text form is `Field.Other[2].Slot<Variant>.Leaf` and is what `Display` prints.

use bevy::reflect::{DynamicTypePath, PartialReflect, Reflect, ReflectMut, ReflectRef};

#[cfg(any(feature = "serialize"))]
use serde::{Serialize, Deserialize};

use crate::errors::{PathParseError, PathResolutionError};
use crate::identifiers::BindingId;


/// One step of a PropertyPath.
#[derive(Reflect, Clone, Debug, Default, Hash, PartialEq, Eq)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub struct PropertyPathSegment {
    /// Field name. Tuple struct and tuple variant fields use their position, e.g. "0".
    pub name: String,

    /// Element to pick if the field is a List or an Array.
    pub array_index: Option<usize>,

    /// The concrete type observed in a polymorphic slot when the path was authored.
    pub instance_type: Option<String>,
}

impl PropertyPathSegment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            array_index: None,
            instance_type: None,
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.array_index = Some(index);
        self
    }

    pub fn with_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = Some(instance_type.into());
        self
    }

    fn parse(text: &str, position: usize) -> Result<Self, PathParseError> {
        let (rest, instance_type) = match text.find('<') {
            None => (text, None),
            Some(open) => {
                let tag = text[open + 1..]
                    .strip_suffix('>')
                    .filter(|tag| !tag.is_empty())
                    .ok_or_else(|| PathParseError::MalformedInstanceType(text.to_string()))?;
                (&text[..open], Some(tag.to_string()))
            }
        };

        let (name, array_index) = match rest.find('[') {
            None => (rest, None),
            Some(open) => {
                let index = rest[open + 1..]
                    .strip_suffix(']')
                    .and_then(|idx| idx.parse::<usize>().ok())
                    .ok_or_else(|| PathParseError::MalformedIndex(text.to_string()))?;
                (&rest[..open], Some(index))
            }
        };

        if name.is_empty() {
            return Err(PathParseError::EmptySegment(position));
        }

        Ok(Self {
            name: name.to_string(),
            array_index,
            instance_type,
        })
    }
}

impl core::fmt::Display for PropertyPathSegment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(index) = self.array_index {
            write!(f, "[{}]", index)?;
        }
        if let Some(instance_type) = &self.instance_type {
            write!(f, "<{}>", instance_type)?;
        }
        Ok(())
    }
}


/// A path from a bindable struct (identified by `struct_id`) to one of its properties.
///
/// A path without segments denotes the struct itself.
/// Equality is structural: same struct, same segments.
#[derive(Reflect, Clone, Debug, Default, Hash, PartialEq, Eq)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub struct PropertyPath {
    pub struct_id: BindingId,
    pub segments: Vec<PropertyPathSegment>,
}

impl PropertyPath {
    pub fn new(struct_id: BindingId) -> Self {
        Self {
            struct_id,
            segments: Vec::new(),
        }
    }

    /// Parses the text form (e.g. `Targets[0].Shape<Circle>.Radius`) under the given struct.
    ///
    /// An empty string yields the whole-struct path.
    pub fn parse(struct_id: BindingId, text: &str) -> Result<Self, PathParseError> {
        let mut path = Self::new(struct_id);
        if text.is_empty() {
            return Ok(path);
        }

        for (position, segment) in text.split('.').enumerate() {
            path.segments.push(PropertyPathSegment::parse(segment, position)?);
        }
        Ok(path)
    }

    /// Shorthand for a path rooted at the Context; the first segment names the variable.
    pub fn context(text: &str) -> Result<Self, PathParseError> {
        Self::parse(BindingId::CONTEXT, text)
    }

    /// Builder-style: appends a plain field segment.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PropertyPathSegment::new(name));
        self
    }

    /// Builder-style: appends a prebuilt segment.
    pub fn segment(mut self, segment: PropertyPathSegment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn is_whole_struct(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_context_path(&self) -> bool {
        self.struct_id.is_context()
    }

    /// True if this path is `other`, or lies underneath it.
    pub fn starts_with(&self, other: &PropertyPath) -> bool {
        self.struct_id == other.struct_id
        && self.segments.len() >= other.segments.len()
        && self.segments.iter().zip(other.segments.iter()).all(|(mine, theirs)| mine == theirs)
    }

    /// Walks the segments against `root`, which must be the struct `struct_id` refers to.
    pub fn resolve<'a>(&self, root: &'a dyn PartialReflect) -> Result<ResolvedProperty<'a>, PathResolutionError> {
        resolve_segments(root, &self.segments, false)
    }

    /// Mutable counterpart of `resolve()`; returns the leaf only.
    pub fn resolve_mut<'a>(&self, root: &'a mut dyn PartialReflect) -> Result<&'a mut dyn PartialReflect, PathResolutionError> {
        resolve_segments_mut(root, &self.segments, false)
    }
}

impl core::fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:", self.struct_id)?;
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}


/// What kind of hop an Indirection represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Field,
    Index,
    Instance,
}

/// One intermediate address visited while resolving a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Indirection {
    pub segment: usize,
    pub access: AccessKind,
    pub type_path: String,
}

/// The outcome of a successful resolution: the leaf plus how we got there.
pub struct ResolvedProperty<'a> {
    pub leaf: &'a dyn PartialReflect,
    pub indirections: Vec<Indirection>,
}

impl<'a> ResolvedProperty<'a> {
    pub fn leaf_type_path(&self) -> &str {
        self.leaf.reflect_type_path()
    }
}

impl core::fmt::Debug for ResolvedProperty<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResolvedProperty")
            .field("leaf", &self.leaf.reflect_type_path())
            .field("indirections", &self.indirections)
            .finish()
    }
}


fn is_option(value: &dyn PartialReflect) -> bool {
    matches!(value.reflect_ref(), ReflectRef::Enum(_))
    && value.reflect_type_path().starts_with("core::option::Option<")
}

fn field_ref<'a>(
    value: &'a dyn PartialReflect,
    segment: usize,
    name: &str,
) -> Result<&'a dyn PartialReflect, PathResolutionError> {
    let position = name.parse::<usize>().ok();

    let found = match value.reflect_ref() {
        ReflectRef::Struct(strukt) => strukt.field(name),
        ReflectRef::TupleStruct(tuple) => position.and_then(|idx| tuple.field(idx)),
        ReflectRef::Tuple(tuple) => position.and_then(|idx| tuple.field(idx)),
        ReflectRef::Enum(enm) => match position {
            Some(idx) => enm.field_at(idx),
            None => enm.field(name),
        },
        _ => {
            return Err(PathResolutionError::NotAContainer {
                segment,
                type_path: value.reflect_type_path().to_string(),
            })
        }
    };

    found.ok_or_else(|| PathResolutionError::UnknownField {
        segment,
        name: name.to_string(),
        type_path: value.reflect_type_path().to_string(),
    })
}

fn field_mut<'a>(value: &'a mut dyn PartialReflect, name: &str) -> Option<&'a mut dyn PartialReflect> {
    let position = name.parse::<usize>().ok();

    match value.reflect_mut() {
        ReflectMut::Struct(strukt) => strukt.field_mut(name),
        ReflectMut::TupleStruct(tuple) => position.and_then(|idx| tuple.field_mut(idx)),
        ReflectMut::Tuple(tuple) => position.and_then(|idx| tuple.field_mut(idx)),
        ReflectMut::Enum(enm) => match position {
            Some(idx) => enm.field_at_mut(idx),
            None => enm.field_mut(name),
        },
        _ => None,
    }
}

fn index_ref<'a>(
    value: &'a dyn PartialReflect,
    segment: usize,
    index: usize,
) -> Result<&'a dyn PartialReflect, PathResolutionError> {
    let (found, len) = match value.reflect_ref() {
        ReflectRef::List(list) => (list.get(index), list.len()),
        ReflectRef::Array(array) => (array.get(index), array.len()),
        _ => {
            return Err(PathResolutionError::NotIndexable {
                segment,
                type_path: value.reflect_type_path().to_string(),
            })
        }
    };

    found.ok_or(PathResolutionError::IndexOutOfBounds { segment, index, len })
}

fn index_mut(value: &mut dyn PartialReflect, index: usize) -> Option<&mut dyn PartialReflect> {
    match value.reflect_mut() {
        ReflectMut::List(list) => list.get_mut(index),
        ReflectMut::Array(array) => array.get_mut(index),
        _ => None,
    }
}

fn option_inner_ref(value: &dyn PartialReflect, segment: usize) -> Result<&dyn PartialReflect, PathResolutionError> {
    match value.reflect_ref() {
        ReflectRef::Enum(enm) if enm.variant_name() == "Some" => {
            enm.field_at(0).ok_or(PathResolutionError::NullInstance { segment })
        },
        _ => Err(PathResolutionError::NullInstance { segment }),
    }
}

fn option_inner_mut(value: &mut dyn PartialReflect) -> Option<&mut dyn PartialReflect> {
    match value.reflect_mut() {
        ReflectMut::Enum(enm) => enm.field_at_mut(0),
        _ => None,
    }
}

fn check_instance_type(
    value: &dyn PartialReflect,
    segment: usize,
    expected: &str,
) -> Result<(), PathResolutionError> {
    let found = match value.reflect_ref() {
        ReflectRef::Enum(enm) => enm.variant_name(),
        _ => value.reflect_short_type_path(),
    };

    let matches = found == expected
        || value.reflect_short_type_path() == expected
        || value.reflect_type_path() == expected;

    match matches {
        true => Ok(()),
        false => Err(PathResolutionError::InstanceTypeMismatch {
            segment,
            expected: expected.to_string(),
            found: found.to_string(),
        }),
    }
}

/// Shared walker for node-rooted and Context-rooted paths.
///
/// When `root_is_named` is set, `root` is the value already selected by the
/// first segment's name (i.e. a Context variable) and only its index/tag apply.
pub(crate) fn resolve_segments<'a>(
    root: &'a dyn PartialReflect,
    segments: &[PropertyPathSegment],
    root_is_named: bool,
) -> Result<ResolvedProperty<'a>, PathResolutionError> {
    let mut current = root;
    let mut indirections = Vec::with_capacity(segments.len());

    for (idx, segment) in segments.iter().enumerate() {
        if !(idx == 0 && root_is_named) {
            current = field_ref(current, idx, &segment.name)?;
            indirections.push(Indirection {
                segment: idx,
                access: AccessKind::Field,
                type_path: current.reflect_type_path().to_string(),
            });
        }

        if let Some(array_index) = segment.array_index {
            if is_option(current) {
                current = option_inner_ref(current, idx)?;
            }
            current = index_ref(current, idx, array_index)?;
            indirections.push(Indirection {
                segment: idx,
                access: AccessKind::Index,
                type_path: current.reflect_type_path().to_string(),
            });
        }

        let continues = idx + 1 < segments.len();
        if segment.instance_type.is_some() || continues {
            if is_option(current) {
                current = option_inner_ref(current, idx)?;
                indirections.push(Indirection {
                    segment: idx,
                    access: AccessKind::Instance,
                    type_path: current.reflect_type_path().to_string(),
                });
            }
            if let Some(expected) = &segment.instance_type {
                check_instance_type(current, idx, expected)?;
            }
        }
    }

    Ok(ResolvedProperty {
        leaf: current,
        indirections,
    })
}

pub(crate) fn resolve_segments_mut<'a>(
    root: &'a mut dyn PartialReflect,
    segments: &[PropertyPathSegment],
    root_is_named: bool,
) -> Result<&'a mut dyn PartialReflect, PathResolutionError> {
    // Validate on a shared view first; the mutable walk below then only repeats known-good steps.
    resolve_segments(&*root, segments, root_is_named)?;

    let lost = |segment: usize| PathResolutionError::NullInstance { segment };
    let mut current = root;

    for (idx, segment) in segments.iter().enumerate() {
        if !(idx == 0 && root_is_named) {
            current = field_mut(current, &segment.name).ok_or_else(|| lost(idx))?;
        }

        if let Some(array_index) = segment.array_index {
            if is_option(&*current) {
                current = option_inner_mut(current).ok_or_else(|| lost(idx))?;
            }
            current = index_mut(current, array_index).ok_or_else(|| lost(idx))?;
        }

        let continues = idx + 1 < segments.len();
        if (segment.instance_type.is_some() || continues) && is_option(&*current) {
            current = option_inner_mut(current).ok_or_else(|| lost(idx))?;
        }
    }

    Ok(current)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Reflect, Clone, Debug, PartialEq)]
    struct Circle {
        radius: f32,
    }

    #[derive(Reflect, Clone, Debug, PartialEq)]
    enum Shape {
        Circle(Circle),
        Square { side: f32 },
    }

    #[derive(Reflect, Clone, Debug, PartialEq)]
    struct Holder {
        count: i32,
        shapes: Vec<Shape>,
        maybe_circle: Option<Circle>,
        pair: (u8, u8),
    }

    fn holder() -> Holder {
        Holder {
            count: 3,
            shapes: vec![
                Shape::Square { side: 2.0 },
                Shape::Circle(Circle { radius: 5.0 }),
            ],
            maybe_circle: None,
            pair: (7, 9),
        }
    }

    fn path(text: &str) -> PropertyPath {
        PropertyPath::parse(BindingId::from_raw(42), text).unwrap()
    }

    #[test]
    fn parse_and_display_agree() {
        let parsed = path("shapes[1].0<Circle>.radius");
        assert_eq!(parsed.segments.len(), 3);
        assert_eq!(parsed.segments[0].array_index, Some(1));
        assert_eq!(parsed.segments[1].instance_type.as_deref(), Some("Circle"));
        assert_eq!(parsed.to_string(), format!("{}:shapes[1].0<Circle>.radius", BindingId::from_raw(42)));
    }

    #[test]
    fn parse_rejects_garbage() {
        let id = BindingId::from_raw(42);
        assert_eq!(PropertyPath::parse(id, "a..b"), Err(PathParseError::EmptySegment(1)));
        assert!(matches!(PropertyPath::parse(id, "a[x]"), Err(PathParseError::MalformedIndex(_))));
        assert!(matches!(PropertyPath::parse(id, "a<>"), Err(PathParseError::MalformedInstanceType(_))));
    }

    #[test]
    fn empty_path_is_whole_struct() {
        let value = holder();
        let parsed = path("");
        assert!(parsed.is_whole_struct());

        let resolved = parsed.resolve(&value).unwrap();
        assert!(resolved.indirections.is_empty());
        assert_eq!(resolved.leaf.try_downcast_ref::<Holder>(), Some(&value));
    }

    #[test]
    fn resolves_through_indexed_tagged_union() {
        let value = holder();
        let resolved = path("shapes[1]<Circle>.0.radius").resolve(&value).unwrap();
        assert_eq!(resolved.leaf.try_downcast_ref::<f32>(), Some(&5.0));

        let kinds: Vec<AccessKind> = resolved.indirections.iter().map(|ind| ind.access).collect();
        assert_eq!(kinds, vec![AccessKind::Field, AccessKind::Index, AccessKind::Field, AccessKind::Field]);
    }

    #[test]
    fn tuple_fields_resolve_by_position() {
        let value = holder();
        let resolved = path("pair.1").resolve(&value).unwrap();
        assert_eq!(resolved.leaf.try_downcast_ref::<u8>(), Some(&9));
    }

    #[test]
    fn failures_are_values() {
        let value = holder();

        assert!(matches!(
            path("nope").resolve(&value),
            Err(PathResolutionError::UnknownField { segment: 0, .. })
        ));
        assert!(matches!(
            path("shapes[5]").resolve(&value),
            Err(PathResolutionError::IndexOutOfBounds { index: 5, len: 2, .. })
        ));
        assert!(matches!(
            path("count[0]").resolve(&value),
            Err(PathResolutionError::NotIndexable { .. })
        ));
        assert!(matches!(
            path("count.inner").resolve(&value),
            Err(PathResolutionError::NotAContainer { segment: 1, .. })
        ));
        assert!(matches!(
            path("shapes[0]<Circle>.0").resolve(&value),
            Err(PathResolutionError::InstanceTypeMismatch { .. })
        ));
        assert!(matches!(
            path("maybe_circle.radius").resolve(&value),
            Err(PathResolutionError::NullInstance { segment: 0 })
        ));
    }

    #[test]
    fn nullable_slot_resolves_once_filled() {
        let mut value = holder();
        value.maybe_circle = Some(Circle { radius: 1.5 });

        let resolved = path("maybe_circle<Circle>.radius").resolve(&value).unwrap();
        assert_eq!(resolved.leaf.try_downcast_ref::<f32>(), Some(&1.5));

        // The leaf itself is not unwrapped.
        let slot = path("maybe_circle").resolve(&value).unwrap();
        assert!(slot.leaf.try_downcast_ref::<Option<Circle>>().is_some());
    }

    #[test]
    fn mutable_resolution_reaches_the_same_leaf() {
        let mut value = holder();
        let leaf = path("shapes[0].side").resolve_mut(&mut value).unwrap();
        leaf.try_apply(&8.0f32).unwrap();

        assert_eq!(value.shapes[0], Shape::Square { side: 8.0 });
    }

    #[test]
    fn prefix_check() {
        let base = path("shapes[1]");
        assert!(path("shapes[1].0").starts_with(&base));
        assert!(!path("shapes[0].0").starts_with(&base));
        assert!(base.starts_with(&base));
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn persisted_form_round_trips() {
        let original = path("shapes[1].0<Circle>.radius");
        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("\"Circle\""));

        let restored: PropertyPath = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
    }
}
