/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Typed references to host objects and the class tree they are checked against.
//!
//! Host objects are Bevy Entities. An `ObjectRef<C>` is a nullable Entity handle that
//! additionally declares, at the type level, the *class* of object it is meant to point at.
//! Classes form a single-inheritance tree that lives in a `ClassHierarchy`, which the
//! binding engine treats as an external directory service: it is populated by the host
//! and queried (never mutated) by the core.

use core::any::TypeId;
use core::marker::PhantomData;
use bevy::platform::collections::HashMap;
use bevy::prelude::Entity;
use bevy::reflect::{Reflect, TypePath};

/// Identifies a class of host objects. Built from the marker type's type path.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassId(pub &'static str);

impl core::fmt::Display for ClassId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A marker type naming a class of host objects.
///
/// Implementors are usually zero-sized. Override `superclass()` to place
/// the class under a parent; classes without one are roots.
pub trait ScriptClass: TypePath + Send + Sync + 'static {
    fn class_id() -> ClassId {
        ClassId(Self::type_path())
    }

    fn superclass() -> Option<ClassId> {
        None
    }
}

/// The root of all host object classes.
#[derive(Reflect, Clone, Copy, Debug, Default)]
pub struct ScriptObject;

impl ScriptClass for ScriptObject {}

/// Host objects that exist in the world and have a location.
#[derive(Reflect, Clone, Copy, Debug, Default)]
pub struct ScriptActor;

impl ScriptClass for ScriptActor {
    fn superclass() -> Option<ClassId> {
        Some(ScriptObject::class_id())
    }
}


/// A nullable reference to a host object of class `C` (or a subclass of it).
#[derive(Reflect)]
#[reflect(Clone)]
pub struct ObjectRef<C: ScriptClass> {
    pub object: Option<Entity>,

    #[reflect(ignore)]
    marker: PhantomData<fn() -> C>,
}

impl<C: ScriptClass> ObjectRef<C> {
    pub fn new(object: Entity) -> Self {
        Self { object: Some(object), marker: PhantomData }
    }

    pub fn null() -> Self {
        Self { object: None, marker: PhantomData }
    }

    pub fn is_null(&self) -> bool {
        self.object.is_none()
    }

    pub fn get(&self) -> Option<Entity> {
        self.object
    }
}

// Manual impls; deriving these would needlessly require C to implement them too.
impl<C: ScriptClass> Clone for ObjectRef<C> {
    fn clone(&self) -> Self {
        Self { object: self.object, marker: PhantomData }
    }
}

impl<C: ScriptClass> Default for ObjectRef<C> {
    fn default() -> Self {
        Self::null()
    }
}

impl<C: ScriptClass> PartialEq for ObjectRef<C> {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}

impl<C: ScriptClass> core::fmt::Debug for ObjectRef<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectRef")
            .field("class", &C::class_id())
            .field("object", &self.object)
            .finish()
    }
}

impl<C: ScriptClass> From<Entity> for ObjectRef<C> {
    fn from(value: Entity) -> Self {
        Self::new(value)
    }
}


/// The class tree, plus a lookup from reference types to the class they point at.
///
/// The binding engine needs both: a field's reflected TypeInfo tells us it is, say,
/// `ObjectRef<Pawn>`, and this directory tells us `Pawn` is a child of `ScriptActor`.
#[derive(Debug, Clone)]
pub struct ClassHierarchy {
    parents: HashMap<ClassId, Option<ClassId>>,
    reference_types: HashMap<TypeId, ClassId>,
}

impl Default for ClassHierarchy {
    fn default() -> Self {
        Self::empty()
            .with_class::<ScriptObject>()
            .with_class::<ScriptActor>()
    }
}

impl ClassHierarchy {
    /// A directory that knows nothing, not even the built-in classes.
    pub fn empty() -> Self {
        Self {
            parents: HashMap::default(),
            reference_types: HashMap::default(),
        }
    }

    /// Registers class `C` (and `ObjectRef<C>` as a reference to it).
    pub fn register<C: ScriptClass>(&mut self) -> &mut Self {
        self.parents.insert(C::class_id(), C::superclass());
        self.reference_types.insert(TypeId::of::<ObjectRef<C>>(), C::class_id());
        self
    }

    /// Builder-style counterpart of `register()`.
    pub fn with_class<C: ScriptClass>(mut self) -> Self {
        self.register::<C>();
        self
    }

    pub fn contains(&self, class: ClassId) -> bool {
        self.parents.contains_key(&class)
    }

    pub fn superclass_of(&self, class: ClassId) -> Option<ClassId> {
        self.parents.get(&class).copied().flatten()
    }

    /// The class an object reference type points at, if it is a registered reference type.
    pub fn referenced_class(&self, reference_type: TypeId) -> Option<ClassId> {
        self.reference_types.get(&reference_type).copied()
    }

    /// True if `class` is `ancestor` or (transitively) derives from it.
    pub fn is_child_of(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(class);
        // Bounded by the number of known classes so a malformed (cyclic) tree cannot hang us.
        for _ in 0..=self.parents.len() {
            match current {
                None => return false,
                Some(cls) if cls == ancestor => return true,
                Some(cls) => current = self.superclass_of(cls),
            }
        }
        false
    }
}
