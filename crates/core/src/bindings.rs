/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Property bindings: directed links that copy a value from a source property into a
//! target property of the node owning the binding.
//!
//! A binding that cannot be resolved (the source struct is not reachable, a path went
//! stale, the types no longer fit) is *inert*, not an error: it is skipped and will
//! start working again as soon as it resolves.

use bevy::reflect::PartialReflect;

#[cfg(any(feature = "serialize"))]
use serde::{Serialize, Deserialize};

use crate::compatibility::{copy_method, copy_value, PropertyDescriptor};
use crate::context::Context;
use crate::errors::PathResolutionError;
use crate::identifiers::BindingId;
use crate::object_ref::ClassHierarchy;
use crate::property_path::{resolve_segments, PropertyPath, ResolvedProperty};


/// One `source -> target` link.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
pub struct PropertyBinding {
    pub source_path: PropertyPath,
    pub target_path: PropertyPath,
}


/// A read-only view of something a binding can pull values out of.
#[derive(Clone, Copy)]
pub enum SourceView<'a> {
    /// A bindable struct (a node's behaviour); paths start at its fields.
    Struct(&'a dyn PartialReflect),
    /// A Context; the first path segment names the variable.
    Context(&'a Context),
}

impl<'a> SourceView<'a> {
    pub fn resolve(&self, path: &PropertyPath) -> Result<ResolvedProperty<'a>, PathResolutionError> {
        match *self {
            Self::Struct(root) => path.resolve(root),
            Self::Context(context) => {
                let first = path.segments
                    .first()
                    .ok_or(PathResolutionError::UnknownStruct(path.struct_id))?;

                let variable = context
                    .value(&first.name)
                    .ok_or_else(|| PathResolutionError::UnknownField {
                        segment: 0,
                        name: first.name.clone(),
                        type_path: String::from("Context"),
                    })?;

                resolve_segments(variable, &path.segments, true)
            },
        }
    }
}


/// A source value already read out and detached, waiting to be written into its target.
///
/// Splitting a copy into a read and a write phase lets the source and the target
/// live in the same arena without aliasing borrows.
pub struct PendingCopy {
    pub target_path: PropertyPath,
    source_descriptor: PropertyDescriptor,
    value: Box<dyn PartialReflect>,
}

impl core::fmt::Debug for PendingCopy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PendingCopy")
            .field("target_path", &self.target_path)
            .field("source_type", &self.source_descriptor.type_path)
            .finish()
    }
}

impl PendingCopy {
    /// Reads the source side of `binding`; None if it does not currently resolve.
    pub fn read(binding: &PropertyBinding, source: SourceView<'_>, classes: &ClassHierarchy) -> Option<Self> {
        let resolved = match source.resolve(&binding.source_path) {
            Ok(resolved) => resolved,
            Err(_err) => {
                #[cfg(feature = "logging")]
                bevy::log::debug!("Binding source {} does not resolve: {}", binding.source_path, _err);
                return None
            }
        };

        let source_descriptor = PropertyDescriptor::of_value(resolved.leaf, classes)?;
        let value = match resolved.leaf.reflect_clone() {
            Ok(cloned) => cloned.into_partial_reflect(),
            Err(_) => resolved.leaf.to_dynamic(),
        };

        Some(Self {
            target_path: binding.target_path.clone(),
            source_descriptor,
            value,
        })
    }

    /// Writes the detached value into `target` (the struct owning the binding).
    ///
    /// Returns true if anything was copied.
    pub fn apply(&self, target: &mut dyn PartialReflect, classes: &ClassHierarchy) -> bool {
        let leaf = match self.target_path.resolve_mut(target) {
            Ok(leaf) => leaf,
            Err(_err) => {
                #[cfg(feature = "logging")]
                bevy::log::debug!("Binding target {} does not resolve: {}", self.target_path, _err);
                return false
            }
        };

        let method = PropertyDescriptor::of_value(&*leaf, classes)
            .and_then(|target_descriptor| copy_method(&self.source_descriptor, &target_descriptor, classes));

        match method {
            Some(method) => copy_value(method, &*self.value, leaf),
            None => {
                #[cfg(feature = "logging")]
                bevy::log::debug!(
                    "Binding into {} skipped, {} is not compatible with the target",
                    self.target_path,
                    self.source_descriptor.type_path
                );
                false
            }
        }
    }
}


/// The binding table of one node.
///
/// At most one binding exists per target path; adding another one for the same
/// target replaces the old one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
#[cfg_attr(any(feature = "serialize"), serde(transparent))]
pub struct PropertyBindings {
    bindings: Vec<PropertyBinding>,
}

impl PropertyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_property_binding(&mut self, source_path: PropertyPath, target_path: PropertyPath) {
        self.remove_property_bindings(&target_path);
        self.bindings.push(PropertyBinding { source_path, target_path });
    }

    /// Removes every binding targeting exactly `target_path`.
    pub fn remove_property_bindings(&mut self, target_path: &PropertyPath) {
        self.bindings.retain(|binding| &binding.target_path != target_path);
    }

    pub fn has_property_binding(&self, target_path: &PropertyPath) -> bool {
        self.get_property_binding(target_path).is_some()
    }

    /// The source bound into `target_path`, if any.
    pub fn get_property_binding(&self, target_path: &PropertyPath) -> Option<&PropertyPath> {
        self.bindings
            .iter()
            .find(|binding| &binding.target_path == target_path)
            .map(|binding| &binding.source_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Reads the source side of every binding whose source struct `sources` can provide.
    pub fn read_sources<'s>(
        &self,
        sources: impl Fn(BindingId) -> Option<SourceView<'s>>,
        classes: &ClassHierarchy,
    ) -> Vec<PendingCopy> {
        self.bindings
            .iter()
            .filter_map(|binding| {
                let view = sources(binding.source_path.struct_id);
                if view.is_none() {
                    #[cfg(feature = "logging")]
                    bevy::log::debug!("Binding source struct {} is not accessible", binding.source_path.struct_id);
                }
                PendingCopy::read(binding, view?, classes)
            })
            .collect()
    }

    /// Resolves every binding and copies the values it can into `target`.
    ///
    /// Returns the number of bindings that actually copied something.
    pub fn perform_copies<'s>(
        &self,
        sources: impl Fn(BindingId) -> Option<SourceView<'s>>,
        target: &mut dyn PartialReflect,
        classes: &ClassHierarchy,
    ) -> usize {
        let mut copied = 0;
        for pending in self.read_sources(sources, classes) {
            if pending.apply(target, classes) {
                copied += 1;
            }
        }
        copied
    }
}


#[cfg(test)]
mod tests {
    use bevy::reflect::Reflect;
    use super::*;

    #[derive(Reflect, Clone, Debug, Default, PartialEq)]
    struct Source {
        speed: f32,
        precise: f64,
        hits: i32,
        alive: bool,
        label: String,
        samples: Vec<f32>,
    }

    #[derive(Reflect, Clone, Debug, Default, PartialEq)]
    struct Target {
        speed: f32,
        speed_wide: f64,
        precise_narrow: f32,
        hits_real: f64,
        alive_count: u8,
        label: String,
        samples: Vec<f64>,
    }

    const SOURCE_ID: BindingId = BindingId::from_raw(100);
    const TARGET_ID: BindingId = BindingId::from_raw(200);

    fn src(text: &str) -> PropertyPath {
        PropertyPath::parse(SOURCE_ID, text).unwrap()
    }

    fn tgt(text: &str) -> PropertyPath {
        PropertyPath::parse(TARGET_ID, text).unwrap()
    }

    fn source() -> Source {
        Source {
            speed: 3.75,
            precise: 0.1,
            hits: 12,
            alive: true,
            label: "hello".into(),
            samples: vec![1.0, 2.0],
        }
    }

    #[test]
    fn last_write_wins_per_target() {
        let mut table = PropertyBindings::new();
        table.add_property_binding(src("speed"), tgt("speed"));
        table.add_property_binding(src("hits"), tgt("speed"));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get_property_binding(&tgt("speed")), Some(&src("hits")));
    }

    #[test]
    fn remove_is_exact_match() {
        let mut table = PropertyBindings::new();
        table.add_property_binding(src("speed"), tgt("speed"));
        table.add_property_binding(src("label"), tgt("label"));

        table.remove_property_bindings(&tgt("spee"));
        assert_eq!(table.len(), 2);

        table.remove_property_bindings(&tgt("speed"));
        assert!(!table.has_property_binding(&tgt("speed")));
        assert!(table.has_property_binding(&tgt("label")));
    }

    #[test]
    fn copies_and_converts() {
        let mut table = PropertyBindings::new();
        table.add_property_binding(src("speed"), tgt("speed"));
        table.add_property_binding(src("speed"), tgt("speed_wide"));
        table.add_property_binding(src("precise"), tgt("precise_narrow"));
        table.add_property_binding(src("hits"), tgt("hits_real"));
        table.add_property_binding(src("alive"), tgt("alive_count"));
        table.add_property_binding(src("label"), tgt("label"));

        let source = source();
        let mut target = Target::default();
        let copied = table.perform_copies(
            |id| (id == SOURCE_ID).then_some(SourceView::Struct(&source)),
            &mut target,
            &ClassHierarchy::default(),
        );

        assert_eq!(copied, 6);
        assert_eq!(target.speed.to_bits(), source.speed.to_bits());
        assert_eq!(target.speed_wide, f64::from(source.speed));
        assert_eq!(target.precise_narrow, source.precise as f32);
        assert_eq!(target.hits_real, 12.0);
        assert_eq!(target.alive_count, 1);
        assert_eq!(target.label, "hello");
    }

    #[test]
    fn unresolvable_bindings_are_inert() {
        let mut table = PropertyBindings::new();
        table.add_property_binding(src("missing"), tgt("speed"));
        table.add_property_binding(src("speed"), tgt("missing"));
        table.add_property_binding(src("samples"), tgt("samples"));
        table.add_property_binding(src("label"), tgt("speed"));
        table.add_property_binding(PropertyPath::parse(BindingId::from_raw(999), "speed").unwrap(), tgt("speed_wide"));

        let source = source();
        let mut target = Target::default();
        let copied = table.perform_copies(
            |id| (id == SOURCE_ID).then_some(SourceView::Struct(&source)),
            &mut target,
            &ClassHierarchy::default(),
        );

        assert_eq!(copied, 0);
        assert_eq!(target, Target::default());
    }

    #[test]
    fn context_sources_name_the_variable_first() {
        let context = Context::new()
            .with("speed", 9.5f32)
            .with("label", String::from("from context"));

        let mut table = PropertyBindings::new();
        table.add_property_binding(PropertyPath::context("speed").unwrap(), tgt("speed_wide"));
        table.add_property_binding(PropertyPath::context("label").unwrap(), tgt("label"));

        let mut target = Target::default();
        let copied = table.perform_copies(
            |id| id.is_context().then_some(SourceView::Context(&context)),
            &mut target,
            &ClassHierarchy::default(),
        );

        assert_eq!(copied, 2);
        assert_eq!(target.speed_wide, 9.5);
        assert_eq!(target.label, "from context");
    }
}
