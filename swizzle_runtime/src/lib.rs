//! Dynamic object model with runtime method-table mutation.
//!
//! This crate provides:
//! - Object model substrate (values, objects, classes, class registry)
//! - Message send with a per-(class, selector) resolution cache
//! - Method mutator: alias, replace, override (instance and class level)
//! - Pseudo-properties backed by per-instance associated storage
//! - Per-instance isolation through private subclasses
//! - Change notification layered on setter interception

pub mod config;
pub mod error;
pub mod isolate;
pub mod method;
pub mod mutator;
pub mod object;
pub mod observe;
pub mod pseudo_property;
pub mod runtime;
pub mod value;

// Re-export commonly used items
pub use config::{ConfigError, PropertyRedefinition, RuntimeConfig};
pub use error::{MessageError, MessageResult, SwizzleError, SwizzleResult};
pub use isolate::isolate;
pub use method::{Imp, MethodLogic, Signature, ValueKind};
pub use mutator::{MethodMutator, ObjectMutator};
pub use object::associated::{AssociationKey, StoragePolicy};
pub use object::class::{Class, ClassFlags, ClassId, ClassRef, DispatchKind};
pub use object::{Object, ObjectId, ObjectRef};
pub use observe::{Change, ChangeNotifier};
pub use pseudo_property::{PropertyAccessors, PropertyAdder, PseudoPropertyKind, generate_adder};
pub use runtime::{Runtime, global_runtime};
pub use value::Value;

pub use swizzle_core::{Selector, intern};
