//! Method selectors.
//!
//! A selector names a slot in a dispatch table. It is the interned pair of a
//! method name and its argument count, reduced to a 32-bit id. Two selectors
//! are equal iff their ids are equal; ids are handed out once and never
//! reused, so a `Selector` stays valid for the whole process.
//!
//! ```text
//! ("fullName", 0)          -> Selector(0)   displayed as  fullName
//! ("setPriority", 1)       -> Selector(1)   displayed as  setPriority:
//! ("fullNameWithTitle", 1) -> Selector(2)   displayed as  fullNameWithTitle:
//! ```

use crate::intern::{InternedString, intern};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::OnceLock;

/// Maximum number of arguments a selector may declare.
pub const MAX_ARITY: u8 = 16;

// =============================================================================
// Selector
// =============================================================================

/// Interned (name, arity) token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(u32);

impl Selector {
    /// Intern a selector in the global table.
    ///
    /// Arities above [`MAX_ARITY`] are clamped.
    pub fn new(name: &str, arity: u8) -> Self {
        selector_table().intern(name, arity.min(MAX_ARITY))
    }

    /// Selector for a zero-argument method.
    #[inline]
    pub fn unary(name: &str) -> Self {
        Self::new(name, 0)
    }

    /// Selector for a one-argument method.
    #[inline]
    pub fn with_one_arg(name: &str) -> Self {
        Self::new(name, 1)
    }

    /// Raw interned id.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Method name without arity decoration.
    pub fn name(self) -> InternedString {
        selector_table().entry(self).0
    }

    /// Number of arguments, not counting the receiver.
    pub fn arity(self) -> u8 {
        selector_table().entry(self).1
    }

    /// A selector with the same arity but a different name.
    pub fn renamed(self, name: &str) -> Self {
        Self::new(name, self.arity())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, arity) = selector_table().entry(*self);
        f.write_str(name.as_str())?;
        for _ in 0..arity {
            f.write_str(":")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({}, #{})", self, self.0)
    }
}

// =============================================================================
// Selector Table
// =============================================================================

/// Global selector table.
///
/// Forward map for interning plus a dense reverse table indexed by id.
pub struct SelectorTable {
    by_key: RwLock<FxHashMap<(InternedString, u8), Selector>>,
    entries: RwLock<Vec<(InternedString, u8)>>,
}

impl SelectorTable {
    fn new() -> Self {
        Self {
            by_key: RwLock::new(FxHashMap::default()),
            entries: RwLock::new(Vec::new()),
        }
    }

    fn intern(&self, name: &str, arity: u8) -> Selector {
        let key = (intern(name), arity);
        if let Some(&sel) = self.by_key.read().get(&key) {
            return sel;
        }

        let mut by_key = self.by_key.write();
        // Re-check under the write lock.
        if let Some(&sel) = by_key.get(&key) {
            return sel;
        }
        let mut entries = self.entries.write();
        let sel = Selector(entries.len() as u32);
        entries.push(key.clone());
        by_key.insert(key, sel);
        sel
    }

    fn entry(&self, sel: Selector) -> (InternedString, u8) {
        // Ids only come from `intern`, so the index is always in bounds.
        self.entries.read()[sel.0 as usize].clone()
    }

    /// Look up an existing selector without creating it.
    pub fn lookup(&self, name: &str, arity: u8) -> Option<Selector> {
        let key = (intern(name), arity);
        self.by_key.read().get(&key).copied()
    }

    /// Number of selectors interned so far.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if no selectors exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static SELECTOR_TABLE: OnceLock<SelectorTable> = OnceLock::new();

/// Get the global selector table.
#[inline]
pub fn selector_table() -> &'static SelectorTable {
    SELECTOR_TABLE.get_or_init(SelectorTable::new)
}
