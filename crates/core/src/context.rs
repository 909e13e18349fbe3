/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! The Context: a dynamically-shaped bag of named, reflected variables.
//!
//! Every ScriptGraph owns one. Its nodes can bind to Context variables exactly like they
//! bind to the fields of other nodes, using paths rooted at `BindingId::CONTEXT` whose
//! first segment names the variable.
//!
//! The host populates the Context before registration. Nested asset instances receive
//! the host's values by name through `Context::migrate_from()`.

use bevy::reflect::{DynamicTypePath, PartialReflect, Reflect};

use crate::compatibility::{copy_method, copy_value, PropertyDescriptor};
use crate::object_ref::ClassHierarchy;


/// Anything that can be stored in a Context.
///
/// Blanket-implemented for every `Reflect + Clone` type.
pub trait ContextEntry: Reflect {
    fn clone_entry(&self) -> Box<dyn ContextEntry>;
}

impl<T: Reflect + Clone> ContextEntry for T {
    fn clone_entry(&self) -> Box<dyn ContextEntry> {
        Box::new(self.clone())
    }
}


/// An ordered bag of named variables.
#[derive(Default)]
pub struct Context {
    entries: Vec<(String, Box<dyn ContextEntry>)>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `insert()`.
    pub fn with<T: ContextEntry>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    /// Stores `value` under `name`, replacing (in place) any previous value with that name.
    pub fn insert<T: ContextEntry>(&mut self, name: impl Into<String>, value: T) {
        self.insert_boxed(name, Box::new(value))
    }

    pub fn insert_boxed(&mut self, name: impl Into<String>, value: Box<dyn ContextEntry>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get<T: Reflect>(&self, name: &str) -> Option<&T> {
        self.entry(name).and_then(|entry| entry.as_reflect().downcast_ref::<T>())
    }

    pub fn get_mut<T: Reflect>(&mut self, name: &str) -> Option<&mut T> {
        self.entry_mut(name).and_then(|entry| entry.as_reflect_mut().downcast_mut::<T>())
    }

    /// Type-erased access, as used by property path resolution.
    pub fn value(&self, name: &str) -> Option<&dyn PartialReflect> {
        self.entry(name).map(|entry| entry.as_partial_reflect())
    }

    pub fn value_mut(&mut self, name: &str) -> Option<&mut dyn PartialReflect> {
        self.entry_mut(name).map(|entry| entry.as_partial_reflect_mut())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn ContextEntry>> {
        let position = self.entries.iter().position(|(existing, _)| existing == name)?;
        Some(self.entries.remove(position).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn PartialReflect)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value.as_partial_reflect()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every same-named, compatible value from `other` into this bag.
    ///
    /// Variables only `other` has are ignored, as are ones whose types do not fit.
    /// Returns how many values were copied.
    pub fn migrate_from(&mut self, other: &Context, classes: &ClassHierarchy) -> usize {
        let mut migrated = 0;

        for (name, source) in other.iter() {
            let Some(target) = self.value_mut(name) else {
                continue;
            };

            let method = PropertyDescriptor::of_value(source, classes)
                .zip(PropertyDescriptor::of_value(&*target, classes))
                .and_then(|(src_desc, tgt_desc)| copy_method(&src_desc, &tgt_desc, classes));

            match method {
                Some(method) if copy_value(method, source, target) => migrated += 1,
                _ => {
                    #[cfg(feature = "logging")]
                    bevy::log::debug!("Context variable {:?} could not be migrated, types do not match", name);
                }
            }
        }

        migrated
    }

    fn entry(&self, name: &str) -> Option<&dyn ContextEntry> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| &**value)
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut dyn ContextEntry> {
        self.entries
            .iter_mut()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| &mut **value)
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries
                .iter()
                .map(|(name, value)| (name.clone(), value.clone_entry()))
                .collect(),
        }
    }
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, value)| (name, value.reflect_short_type_path())))
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut ctx = Context::new()
            .with("speed", 1.0f32)
            .with("name", String::from("bob"));
        ctx.insert("speed", 2.5f32);

        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.names().collect::<Vec<_>>(), vec!["speed", "name"]);
        assert_eq!(ctx.get::<f32>("speed"), Some(&2.5));
        assert_eq!(ctx.get::<i32>("speed"), None);
    }

    #[test]
    fn get_mut_and_remove() {
        let mut ctx = Context::new().with("hits", 3i32);
        if let Some(hits) = ctx.get_mut::<i32>("hits") {
            *hits += 1;
        }
        assert_eq!(ctx.get::<i32>("hits"), Some(&4));

        assert!(ctx.remove("hits").is_some());
        assert!(ctx.remove("hits").is_none());
        assert!(ctx.is_empty());
    }

    #[test]
    fn migration_copies_only_known_compatible_names() {
        let classes = ClassHierarchy::default();
        let mut inner = Context::new()
            .with("range", 0.0f64)
            .with("label", String::new())
            .with("flag", false);
        let outer = Context::new()
            .with("range", 12.5f32)
            .with("label", 7i32)
            .with("flag", true)
            .with("extra", 1u8);

        let migrated = inner.migrate_from(&outer, &classes);

        assert_eq!(migrated, 2);
        assert_eq!(inner.get::<f64>("range"), Some(&12.5));
        assert_eq!(inner.get::<String>("label"), Some(&String::new()));
        assert_eq!(inner.get::<bool>("flag"), Some(&true));
        assert!(!inner.contains("extra"));
    }

    #[test]
    fn clones_are_deep() {
        let original = Context::new().with("hits", 3i32);
        let mut copy = original.clone();
        copy.insert("hits", 9i32);

        assert_eq!(original.get::<i32>("hits"), Some(&3));
        assert_eq!(copy.get::<i32>("hits"), Some(&9));
    }
}
