//! Process-wide string interning.
//!
//! Every distinct string is stored exactly once. An `InternedString` is a
//! shared pointer to that single copy, so equality and hashing reduce to a
//! pointer comparison instead of a byte-wise one.
//!
//! Interned strings are never freed; the table only grows. Method names,
//! class names and property keys all go through here.

use dashmap::DashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

// =============================================================================
// Interned String
// =============================================================================

/// A handle to a globally interned string.
#[derive(Clone)]
pub struct InternedString(Arc<str>);

impl InternedString {
    /// Get the string contents.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address of the interned storage.
    ///
    /// Stable for the lifetime of the process; usable as a cheap cache key.
    #[inline]
    pub fn as_ptr(&self) -> u64 {
        Arc::as_ptr(&self.0) as *const u8 as usize as u64
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the string is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for InternedString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for InternedString {}

impl Hash for InternedString {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ptr().hash(state);
    }
}

impl PartialOrd for InternedString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InternedString {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl std::ops::Deref for InternedString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for InternedString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Interner
// =============================================================================

/// Concurrent string table backing [`intern`].
pub struct StringInterner {
    strings: DashSet<Arc<str>>,
}

impl StringInterner {
    /// Create an empty interner.
    pub fn new() -> Self {
        Self {
            strings: DashSet::new(),
        }
    }

    /// Intern a string, returning the canonical handle.
    pub fn intern(&self, s: &str) -> InternedString {
        if let Some(existing) = self.strings.get(s) {
            return InternedString(existing.key().clone());
        }

        let candidate: Arc<str> = Arc::from(s);
        if self.strings.insert(candidate.clone()) {
            return InternedString(candidate);
        }

        // Lost an insertion race; another thread's copy is canonical.
        match self.strings.get(s) {
            Some(existing) => InternedString(existing.key().clone()),
            None => InternedString(candidate),
        }
    }

    /// Look up a string without interning it.
    pub fn lookup(&self, s: &str) -> Option<InternedString> {
        self.strings
            .get(s)
            .map(|existing| InternedString(existing.key().clone()))
    }

    /// Number of interned strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

static INTERNER: OnceLock<StringInterner> = OnceLock::new();

/// Get the global interner.
#[inline]
pub fn interner() -> &'static StringInterner {
    INTERNER.get_or_init(StringInterner::new)
}

/// Intern a string in the global table.
#[inline]
pub fn intern(s: &str) -> InternedString {
    interner().intern(s)
}
