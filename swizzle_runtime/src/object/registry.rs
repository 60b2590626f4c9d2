//! Class registry.
//!
//! Maps class names and ids to class objects and records the subclass
//! relation so table mutations can invalidate every affected cache entry.
//!
//! Classes are never unregistered. Per-instance classes created by isolation
//! stay here after their instance is gone.

use crate::error::{SwizzleError, SwizzleResult};
use crate::object::class::{ClassFlags, ClassId, ClassRef};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use swizzle_core::{InternedString, intern};

/// Direct subclasses; most classes have few.
type Subclasses = SmallVec<[ClassId; 4]>;

/// Global-style class table, owned by a runtime.
pub struct ClassRegistry {
    by_name: RwLock<FxHashMap<InternedString, ClassRef>>,
    by_id: RwLock<FxHashMap<ClassId, ClassRef>>,
    subclasses: RwLock<FxHashMap<ClassId, Subclasses>>,
}

impl ClassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_name: RwLock::new(FxHashMap::default()),
            by_id: RwLock::new(FxHashMap::default()),
            subclasses: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register a class.
    ///
    /// Fails if the name is taken, the class is already registered, or its
    /// parent is not registered here.
    pub fn register(&self, class: ClassRef) -> SwizzleResult<()> {
        let refuse = |reason: &str| SwizzleError::ClassRegistrationFailed {
            name: class.name().to_string(),
            reason: reason.to_string(),
        };

        if class.is_registered() {
            return Err(refuse("already registered"));
        }
        if let Some(parent) = class.parent() {
            if !self.contains(parent.id()) {
                return Err(refuse("parent class is not registered"));
            }
            if parent.is_final() {
                return Err(refuse("parent class is final"));
            }
        }

        let mut by_name = self.by_name.write();
        if by_name.contains_key(class.name()) {
            return Err(refuse("a class with this name exists"));
        }
        by_name.insert(class.name().clone(), class.clone());
        self.by_id.write().insert(class.id(), class.clone());
        if let Some(parent) = class.parent() {
            self.subclasses
                .write()
                .entry(parent.id())
                .or_default()
                .push(class.id());
        }
        class.add_flags(ClassFlags::REGISTERED);

        tracing::debug!(class = %class.name(), id = class.id().raw(), "class registered");
        Ok(())
    }

    /// Look up a class by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<ClassRef> {
        self.by_name.read().get(&intern(name)).cloned()
    }

    /// Look up a class by id.
    #[inline]
    pub fn get_by_id(&self, id: ClassId) -> Option<ClassRef> {
        self.by_id.read().get(&id).cloned()
    }

    #[inline]
    pub fn contains(&self, id: ClassId) -> bool {
        self.by_id.read().contains_key(&id)
    }

    /// Direct subclasses of a class.
    pub fn direct_subclasses(&self, id: ClassId) -> Vec<ClassId> {
        self.subclasses
            .read()
            .get(&id)
            .map(|subs| subs.to_vec())
            .unwrap_or_default()
    }

    /// The class and all transitive subclasses.
    pub fn with_descendants(&self, id: ClassId) -> FxHashSet<ClassId> {
        let subclasses = self.subclasses.read();
        let mut seen = FxHashSet::default();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if seen.insert(next) {
                if let Some(children) = subclasses.get(&next) {
                    pending.extend(children.iter().copied());
                }
            }
        }
        seen
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}
