//! Objects and the structures they reference.
//!
//! ```text
//! Object
//! ├── id: ObjectId                  (process-unique, never reused)
//! ├── class: RwLock<ClassRef>       (rewritable class pointer)
//! ├── ivars: declared instance variables
//! └── associations: AssociationTable (per-instance side storage)
//! ```
//!
//! The class pointer is the only thing isolation touches: an isolated object
//! keeps its id, ivars and associations.

pub mod associated;
pub mod class;
pub mod registry;

use crate::object::associated::AssociationTable;
use crate::object::class::ClassRef;
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use swizzle_core::{InternedString, intern};

// =============================================================================
// Object Id
// =============================================================================

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn allocate() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Object
// =============================================================================

/// Shared object handle.
pub type ObjectRef = Arc<Object>;

/// Non-owning object handle.
pub type WeakObjectRef = Weak<Object>;

/// An instance of some class.
pub struct Object {
    id: ObjectId,
    class: RwLock<ClassRef>,
    ivars: RwLock<FxHashMap<InternedString, Value>>,
    associations: AssociationTable,
}

impl Object {
    /// Allocate an instance. Prefer `Runtime::instantiate`.
    pub fn new(class: &ClassRef) -> ObjectRef {
        Arc::new(Self {
            id: ObjectId::allocate(),
            class: RwLock::new(class.clone()),
            ivars: RwLock::new(FxHashMap::default()),
            associations: AssociationTable::new(),
        })
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Current class.
    #[inline]
    pub fn class(&self) -> ClassRef {
        self.class.read().clone()
    }

    /// Rewrite the class pointer, returning the previous class.
    ///
    /// Nothing else about the object changes.
    pub fn set_class(&self, class: ClassRef) -> ClassRef {
        std::mem::replace(&mut *self.class.write(), class)
    }

    // =========================================================================
    // Instance Variables
    // =========================================================================

    /// Read an instance variable; `Nil` if unset.
    pub fn ivar(&self, name: &str) -> Value {
        self.ivars.read().get(&intern(name)).cloned().unwrap_or_default()
    }

    /// Write an instance variable.
    pub fn set_ivar(&self, name: &str, value: Value) {
        let displaced = self.ivars.write().insert(intern(name), value);
        drop(displaced);
    }

    /// Names of all set instance variables.
    pub fn ivar_names(&self) -> Vec<InternedString> {
        let mut names: Vec<InternedString> = self.ivars.read().keys().cloned().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Associated Storage
    // =========================================================================

    #[inline]
    pub fn associations(&self) -> &AssociationTable {
        &self.associations
    }

    // =========================================================================
    // Copying
    // =========================================================================

    /// Member-wise copy: same class, cloned ivars, empty associations.
    ///
    /// Reference-valued ivars are shared with the original.
    pub fn shallow_copy(&self) -> ObjectRef {
        Arc::new(Self {
            id: ObjectId::allocate(),
            class: RwLock::new(self.class()),
            ivars: RwLock::new(self.ivars.read().clone()),
            associations: AssociationTable::new(),
        })
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        tracing::trace!(object = self.id.raw(), "object released");
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("class", self.class().name())
            .field("ivars", &self.ivars.read().len())
            .field("associations", &self.associations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::class::Class;

    #[test]
    fn test_object_ids_are_unique() {
        let class = Arc::new(Class::new("Thing", None));
        let a = Object::new(&class);
        let b = Object::new(&class);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_ivars_default_to_nil() {
        let class = Arc::new(Class::new("Thing", None));
        let obj = Object::new(&class);
        assert!(obj.ivar("missing").is_nil());

        obj.set_ivar("age", Value::UInt(30));
        assert_eq!(obj.ivar("age"), Value::UInt(30));
        assert_eq!(obj.ivar_names().len(), 1);
    }

    #[test]
    fn test_set_class_returns_previous() {
        let base = Arc::new(Class::new("Base", None));
        let sub = Arc::new(Class::new("Sub", Some(base.clone())));
        let obj = Object::new(&base);

        let previous = obj.set_class(sub.clone());
        assert!(Arc::ptr_eq(&previous, &base));
        assert!(Arc::ptr_eq(&obj.class(), &sub));
    }

    #[test]
    fn test_shallow_copy_is_new_object() {
        let class = Arc::new(Class::new("Thing", None));
        let obj = Object::new(&class);
        obj.set_ivar("name", Value::str("original"));
        obj.associations().set(
            associated::AssociationKey::new("extra"),
            Value::Int(1),
            associated::StoragePolicy::Value,
        );

        let copy = obj.shallow_copy();
        assert_ne!(copy.id(), obj.id());
        assert_eq!(copy.ivar("name"), Value::str("original"));
        assert!(copy.associations().is_empty());

        copy.set_ivar("name", Value::str("changed"));
        assert_eq!(obj.ivar("name"), Value::str("original"));
    }
}
