//! Error types.
//!
//! Two families:
//! - [`SwizzleError`]: a class-table mutation was refused. These are
//!   foreseeable misuse (unknown selector, name collision, ...) and are always
//!   returned, never raised.
//! - [`MessageError`]: a message send or direct `Imp` invocation failed.

use crate::method::signature::ValueKind;
use swizzle_core::Selector;
use thiserror::Error;

/// Errors reported by class-table mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwizzleError {
    /// Alias source does not resolve on the class or any ancestor.
    #[error("method `{selector}` is not resolvable on class `{class}`")]
    UnresolvedMethod { class: String, selector: Selector },

    /// Alias target is already defined directly on the class.
    #[error("method `{selector}` is already defined on class `{class}`")]
    NameCollision { class: String, selector: Selector },

    /// Supplied logic could not become an implementation for the selector.
    #[error("cannot build implementation for `{selector}`: {reason}")]
    ImplementationConstructionFailed { selector: Selector, reason: String },

    /// Receiver has no rewritable class pointer.
    #[error("receiver cannot be subclassed: {reason}")]
    UnsubclassableReceiver { reason: String },

    /// The class registry refused a new class.
    #[error("class `{name}` could not be registered: {reason}")]
    ClassRegistrationFailed { name: String, reason: String },

    /// A pseudo-property of another kind already exists under this name.
    #[error("pseudo-property `{name}` on `{class}` already installed as {existing}, refusing {requested}")]
    PropertyKindConflict {
        class: String,
        name: String,
        existing: &'static str,
        requested: &'static str,
    },

    /// Property name cannot produce getter/setter selectors.
    #[error("invalid pseudo-property name {name:?}")]
    InvalidPropertyName { name: String },
}

/// Result type for class-table mutations.
pub type SwizzleResult<T> = Result<T, SwizzleError>;

/// Errors raised while sending a message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MessageError {
    /// Neither the receiver's class nor any ancestor implements the selector.
    #[error("`{class}` does not recognize selector `{selector}`")]
    DoesNotRecognize { class: String, selector: Selector },

    /// Wrong number of arguments for the implementation's signature.
    #[error("`{selector}` expects {expected} argument(s), got {found}")]
    ArityMismatch {
        selector: Selector,
        expected: usize,
        found: usize,
    },

    /// An argument does not match the declared parameter kind.
    #[error("argument {index} of `{selector}` must be {expected}, got {found}")]
    ArgumentKind {
        selector: Selector,
        index: usize,
        expected: ValueKind,
        found: ValueKind,
    },

    /// Method logic returned a value of the wrong kind.
    #[error("`{selector}` must return {expected}, returned {found}")]
    ReturnKind {
        selector: Selector,
        expected: ValueKind,
        found: ValueKind,
    },

    /// The receiver kind cannot handle this message.
    #[error("`{selector}` sent to unsupported receiver of kind {found}")]
    InvalidReceiver { selector: Selector, found: ValueKind },

    /// Error raised by method logic itself.
    #[error("{0}")]
    Raised(String),
}

impl MessageError {
    /// Build a [`MessageError::Raised`] from any message.
    pub fn raised(message: impl Into<String>) -> Self {
        Self::Raised(message.into())
    }
}

/// Result type for message sends.
pub type MessageResult<T> = Result<T, MessageError>;
