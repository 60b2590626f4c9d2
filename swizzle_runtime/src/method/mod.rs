//! Methods: signatures, implementations and the resolution cache.

pub mod cache;
pub mod imp;
pub mod signature;

pub use cache::{CachedMethod, MethodCache};
pub use imp::{Imp, ImpId, Implementation, MethodFn, MethodLogic};
pub use signature::{Signature, ValueKind};
