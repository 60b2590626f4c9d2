//! Tagged method signatures.
//!
//! A signature is a return kind plus parameter kinds. It replaces reflection:
//! building an implementation from caller logic checks the logic's declared
//! signature against the selector arity and against whatever the selector
//! currently resolves to.
//!
//! Signatures render to a compact type encoding, receiver and selector
//! included:
//!
//! ```text
//! () -> Int            q@:
//! (Int) -> Void        v@:q
//! (Str, Any) -> Object @@:*?
//! ```

use crate::value::Value;
use smallvec::SmallVec;
use std::fmt;

// =============================================================================
// Value Kinds
// =============================================================================

/// Kind tag for values and signature slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// No value. Only valid as a return kind; accepts `Nil`.
    Void,
    /// Tag of `Value::Nil`. Not used in signatures.
    Nil,
    /// Accepts any value.
    Any,
    Bool,
    Int,
    UInt,
    Float,
    Double,
    Str,
    Object,
    Class,
}

impl ValueKind {
    /// Check whether a value may occupy a slot of this kind.
    ///
    /// Reference kinds (`Str`, `Object`, `Class`) also accept `Nil`.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (Self::Void | Self::Nil, Value::Nil) => true,
            (Self::Str | Self::Object | Self::Class, Value::Nil) => true,
            (kind, value) => kind == value.kind(),
        }
    }

    /// Single-character type encoding.
    pub fn encoding(self) -> char {
        match self {
            Self::Void => 'v',
            Self::Nil => '0',
            Self::Any => '?',
            Self::Bool => 'B',
            Self::Int => 'q',
            Self::UInt => 'Q',
            Self::Float => 'f',
            Self::Double => 'd',
            Self::Str => '*',
            Self::Object => '@',
            Self::Class => '#',
        }
    }

    /// Check whether two slot kinds can stand in for each other.
    #[inline]
    pub fn compatible(self, other: ValueKind) -> bool {
        self == other || self == Self::Any || other == Self::Any
    }

    /// Whether this kind is stored by value.
    #[inline]
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Int | Self::UInt | Self::Float | Self::Double
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Void => "void",
            Self::Nil => "nil",
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Double => "double",
            Self::Str => "string",
            Self::Object => "object",
            Self::Class => "class",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Signature
// =============================================================================

/// Parameter kinds; most methods take at most four arguments.
pub type Params = SmallVec<[ValueKind; 4]>;

/// Return kind plus ordered parameter kinds. The receiver is implicit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    returns: ValueKind,
    params: Params,
}

impl Signature {
    /// Zero-argument signature returning `returns`.
    pub fn new(returns: ValueKind) -> Self {
        Self {
            returns,
            params: Params::new(),
        }
    }

    /// Append a parameter kind.
    pub fn param(mut self, kind: ValueKind) -> Self {
        self.params.push(kind);
        self
    }

    /// Fully dynamic signature of the given arity.
    pub fn dynamic(arity: usize) -> Self {
        Self {
            returns: ValueKind::Any,
            params: std::iter::repeat(ValueKind::Any).take(arity).collect(),
        }
    }

    /// `() -> kind`.
    pub fn getter(kind: ValueKind) -> Self {
        Self::new(kind)
    }

    /// `(kind) -> void`.
    pub fn setter(kind: ValueKind) -> Self {
        Self::new(ValueKind::Void).param(kind)
    }

    #[inline]
    pub fn returns(&self) -> ValueKind {
        self.returns
    }

    #[inline]
    pub fn params(&self) -> &[ValueKind] {
        &self.params
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Reason the signature is unusable, if any.
    pub fn malformed(&self) -> Option<String> {
        if self.returns == ValueKind::Nil {
            return Some("return kind `nil` is not a signature kind; use `void`".to_string());
        }
        self.params
            .iter()
            .position(|k| matches!(k, ValueKind::Void | ValueKind::Nil))
            .map(|index| format!("parameter {} has non-value kind `{}`", index, self.params[index]))
    }

    /// Check whether an implementation with `other` may replace one with
    /// this signature.
    pub fn is_compatible_with(&self, other: &Signature) -> bool {
        self.arity() == other.arity()
            && self.returns.compatible(other.returns)
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| a.compatible(*b))
    }

    /// Type encoding including receiver (`@`) and selector (`:`).
    pub fn type_encoding(&self) -> String {
        let mut out = String::with_capacity(self.params.len() + 3);
        out.push(self.returns.encoding());
        out.push('@');
        out.push(':');
        out.extend(self.params.iter().map(|k| k.encoding()));
        out
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") -> {}", self.returns)
    }
}
