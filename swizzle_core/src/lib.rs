//! Core identifiers for the swizzle runtime.
//!
//! This crate provides:
//! - Global string interning (`InternedString`)
//! - Method selectors as interned (name, arity) tokens

pub mod intern;
pub mod selector;

pub use intern::{InternedString, intern};
pub use selector::{MAX_ARITY, Selector};
