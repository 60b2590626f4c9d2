//! Class objects.
//!
//! A `Class` is a named dispatch unit with single inheritance. It owns two
//! method tables:
//!
//! ```text
//! Class
//! ├── id: ClassId
//! ├── name: InternedString
//! ├── parent: Option<ClassRef>
//! ├── flags: ClassFlags
//! ├── instance_methods: MethodTable   (messages sent to instances)
//! └── class_methods: MethodTable      (messages sent to the class itself)
//! ```
//!
//! Each table maps a selector to at most one implementation. Writes replace
//! whatever was there. Tables are only written through the runtime so the
//! method cache stays coherent; reads are free for anyone.

use crate::method::imp::Imp;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use swizzle_core::{InternedString, Selector, intern};

// =============================================================================
// Class Id
// =============================================================================

static NEXT_CLASS_ID: AtomicU32 = AtomicU32::new(1);

/// Unique class identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    fn allocate() -> Self {
        Self(NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

// =============================================================================
// Class Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags describing class state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClassFlags: u32 {
        /// Class is present in the class registry.
        const REGISTERED = 1 << 0;
        /// Class cannot be subclassed.
        const FINAL = 1 << 1;
        /// Per-instance class created by isolation.
        const ISOLATED = 1 << 2;
        /// Per-instance class created by the change notifier.
        const NOTIFYING = 1 << 3;
        /// Root of the hierarchy.
        const ROOT = 1 << 4;
    }
}

// =============================================================================
// Dispatch Kind
// =============================================================================

/// Which of a class's two tables a selector lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKind {
    /// Messages sent to instances.
    Instance,
    /// Messages sent to the class object.
    Class,
}

impl fmt::Display for DispatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance => f.write_str("instance"),
            Self::Class => f.write_str("class"),
        }
    }
}

// =============================================================================
// Method Table
// =============================================================================

/// Selector → implementation map for one dispatch kind of one class.
#[derive(Debug, Default)]
pub struct MethodTable {
    methods: RwLock<FxHashMap<Selector, Imp>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, selector: Selector) -> Option<Imp> {
        self.methods.read().get(&selector).cloned()
    }

    #[inline]
    pub fn contains(&self, selector: Selector) -> bool {
        self.methods.read().contains_key(&selector)
    }

    /// Install an implementation, returning the one it displaced.
    pub(crate) fn insert(&self, selector: Selector, imp: Imp) -> Option<Imp> {
        self.methods.write().insert(selector, imp)
    }

    /// Install only if the slot is empty. Returns false on collision.
    pub(crate) fn insert_new(&self, selector: Selector, imp: Imp) -> bool {
        let mut methods = self.methods.write();
        if methods.contains_key(&selector) {
            return false;
        }
        methods.insert(selector, imp);
        true
    }

    /// Own selectors, sorted by display form.
    pub fn selectors(&self) -> Vec<Selector> {
        let mut sels: Vec<Selector> = self.methods.read().keys().copied().collect();
        sels.sort_by_key(|s| s.to_string());
        sels
    }

    pub fn len(&self) -> usize {
        self.methods.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.read().is_empty()
    }
}

// =============================================================================
// Class
// =============================================================================

/// Shared class handle.
pub type ClassRef = Arc<Class>;

/// Result of walking the class chain.
#[derive(Debug, Clone)]
pub struct MethodSlot {
    pub imp: Imp,
    /// Class whose own table holds the implementation.
    pub defining_class: ClassId,
    /// 0 for the class itself, 1 for its parent, ...
    pub depth: u16,
}

/// A class: name, parent, flags and two method tables.
pub struct Class {
    id: ClassId,
    name: InternedString,
    parent: Option<ClassRef>,
    flags: RwLock<ClassFlags>,
    instance_methods: MethodTable,
    class_methods: MethodTable,
}

impl Class {
    /// Create a class. Not registered; see `Runtime::register_class`.
    pub fn new(name: &str, parent: Option<ClassRef>) -> Self {
        Self {
            id: ClassId::allocate(),
            name: intern(name),
            parent,
            flags: RwLock::new(ClassFlags::empty()),
            instance_methods: MethodTable::new(),
            class_methods: MethodTable::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn id(&self) -> ClassId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &InternedString {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<&ClassRef> {
        self.parent.as_ref()
    }

    #[inline]
    pub fn flags(&self) -> ClassFlags {
        *self.flags.read()
    }

    pub fn add_flags(&self, flags: ClassFlags) {
        *self.flags.write() |= flags;
    }

    #[inline]
    pub fn is_final(&self) -> bool {
        self.flags().contains(ClassFlags::FINAL)
    }

    #[inline]
    pub fn is_isolated(&self) -> bool {
        self.flags().contains(ClassFlags::ISOLATED)
    }

    #[inline]
    pub fn is_notifying(&self) -> bool {
        self.flags().contains(ClassFlags::NOTIFYING)
    }

    #[inline]
    pub fn is_registered(&self) -> bool {
        self.flags().contains(ClassFlags::REGISTERED)
    }

    /// Method table for a dispatch kind.
    #[inline]
    pub fn table(&self, kind: DispatchKind) -> &MethodTable {
        match kind {
            DispatchKind::Instance => &self.instance_methods,
            DispatchKind::Class => &self.class_methods,
        }
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// This class followed by each ancestor up to the root.
    pub fn ancestry(&self) -> Ancestry<'_> {
        Ancestry {
            next: Some(self),
        }
    }

    /// Check if `self` is `other` or inherits from it.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        self.ancestry().any(|c| c.id == other.id)
    }

    /// Nearest class in the chain that is not a per-instance class.
    pub fn visible_class(&self) -> &Class {
        self.ancestry()
            .find(|c| !c.flags().intersects(ClassFlags::ISOLATED | ClassFlags::NOTIFYING))
            .unwrap_or(self)
    }

    // =========================================================================
    // Method Lookup
    // =========================================================================

    /// Own implementation only; ancestors are not consulted.
    #[inline]
    pub fn own_method(&self, kind: DispatchKind, selector: Selector) -> Option<Imp> {
        self.table(kind).get(selector)
    }

    /// Check the own table only.
    #[inline]
    pub fn defines(&self, kind: DispatchKind, selector: Selector) -> bool {
        self.table(kind).contains(selector)
    }

    /// Walk the class chain for `selector`.
    ///
    /// This is the slow path; sends go through the runtime's method cache.
    pub fn lookup_method(&self, kind: DispatchKind, selector: Selector) -> Option<MethodSlot> {
        self.ancestry().enumerate().find_map(|(depth, class)| {
            class.table(kind).get(selector).map(|imp| MethodSlot {
                imp,
                defining_class: class.id,
                depth: depth as u16,
            })
        })
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name().clone()))
            .field("flags", &self.flags())
            .field("instance_methods", &self.instance_methods.len())
            .field("class_methods", &self.class_methods.len())
            .finish()
    }
}

/// Iterator over a class and its ancestors.
pub struct Ancestry<'a> {
    next: Option<&'a Class>,
}

impl<'a> Iterator for Ancestry<'a> {
    type Item = &'a Class;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent.as_deref();
        Some(current)
    }
}
