//! Per-instance associated storage.
//!
//! Every object carries a small side table keyed by interned name. It backs
//! pseudo-properties: values live here instead of in declared instance
//! variables. Each entry records how it holds its value:
//!
//! | Policy    | Holds                                              |
//! |-----------|----------------------------------------------------|
//! | `Retain`  | shared ownership; keeps the referent alive          |
//! | `Copy`    | an independent copy taken by the writer             |
//! | `Unowned` | a non-owning handle; never extends lifetime         |
//! | `Value`   | a scalar stored by value                           |
//!
//! Reading an `Unowned` entry whose referent has been dropped yields `Nil`.
//! Entries die with the object that owns the table.

use crate::object::class::Class;
use crate::object::Object;
use crate::value::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};
use swizzle_core::{InternedString, intern};

// =============================================================================
// Keys and Policies
// =============================================================================

/// Key into an association table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssociationKey(InternedString);

impl AssociationKey {
    pub fn new(name: &str) -> Self {
        Self(intern(name))
    }

    #[inline]
    pub fn name(&self) -> &InternedString {
        &self.0
    }
}

/// Ownership discipline for a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoragePolicy {
    Retain,
    Copy,
    Unowned,
    Value,
}

/// Non-owning handle to a reference value.
#[derive(Debug, Clone)]
enum UnownedRef {
    Object(Weak<Object>),
    Class(Weak<Class>),
    Str(Weak<str>),
}

impl UnownedRef {
    fn upgrade(&self) -> Value {
        match self {
            Self::Object(weak) => weak.upgrade().map(Value::Object),
            Self::Class(weak) => weak.upgrade().map(Value::Class),
            Self::Str(weak) => weak.upgrade().map(Value::Str),
        }
        .unwrap_or(Value::Nil)
    }

    fn is_live(&self) -> bool {
        match self {
            Self::Object(weak) => weak.strong_count() > 0,
            Self::Class(weak) => weak.strong_count() > 0,
            Self::Str(weak) => weak.strong_count() > 0,
        }
    }
}

/// A stored entry.
#[derive(Debug, Clone)]
enum Association {
    /// Retained, copied, or scalar value held strongly.
    Owned(StoragePolicy, Value),
    /// Reference held without ownership.
    Unowned(UnownedRef),
}

impl Association {
    fn policy(&self) -> StoragePolicy {
        match self {
            Self::Owned(policy, _) => *policy,
            Self::Unowned(_) => StoragePolicy::Unowned,
        }
    }
}

// =============================================================================
// Association Table
// =============================================================================

/// Side table of associated values for one object.
#[derive(Debug, Default)]
pub struct AssociationTable {
    entries: Mutex<FxHashMap<AssociationKey, Association>>,
}

impl AssociationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value. `None` if the key was never set or was cleared.
    pub fn get(&self, key: &AssociationKey) -> Option<Value> {
        self.entries.lock().get(key).map(|entry| match entry {
            Association::Owned(_, value) => value.clone(),
            Association::Unowned(handle) => handle.upgrade(),
        })
    }

    /// Store a value under `policy`. Storing `Nil` removes the entry.
    ///
    /// `Copy` expects the caller to have produced the copy already; the table
    /// only records the policy. `Unowned` downgrades reference values; scalars
    /// have no lifetime to extend and are kept by value.
    pub fn set(&self, key: AssociationKey, value: Value, policy: StoragePolicy) {
        if value.is_nil() {
            let removed = self.entries.lock().remove(&key);
            drop(removed);
            return;
        }

        let entry = match (policy, value) {
            (StoragePolicy::Unowned, Value::Object(obj)) => {
                Association::Unowned(UnownedRef::Object(Arc::downgrade(&obj)))
            }
            (StoragePolicy::Unowned, Value::Class(class)) => {
                Association::Unowned(UnownedRef::Class(Arc::downgrade(&class)))
            }
            (StoragePolicy::Unowned, Value::Str(s)) => {
                Association::Unowned(UnownedRef::Str(Arc::downgrade(&s)))
            }
            (StoragePolicy::Unowned, scalar) => Association::Owned(StoragePolicy::Value, scalar),
            (policy, value) => Association::Owned(policy, value),
        };

        // The displaced value is released after the lock is dropped.
        let displaced = self.entries.lock().insert(key, entry);
        drop(displaced);
    }

    /// Remove an entry, returning its current value.
    pub fn remove(&self, key: &AssociationKey) -> Option<Value> {
        let removed = self.entries.lock().remove(key);
        removed.map(|entry| match entry {
            Association::Owned(_, value) => value,
            Association::Unowned(handle) => handle.upgrade(),
        })
    }

    /// Policy recorded for an entry.
    pub fn policy(&self, key: &AssociationKey) -> Option<StoragePolicy> {
        self.entries.lock().get(key).map(Association::policy)
    }

    /// Whether an unowned entry still points at a live referent.
    ///
    /// Owned entries are always live.
    pub fn is_live(&self, key: &AssociationKey) -> Option<bool> {
        self.entries.lock().get(key).map(|entry| match entry {
            Association::Owned(..) => true,
            Association::Unowned(handle) => handle.is_live(),
        })
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let drained: Vec<Association> = self.entries.lock().drain().map(|(_, v)| v).collect();
        drop(drained);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
