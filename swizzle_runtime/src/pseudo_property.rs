//! Pseudo-properties: getter/setter pairs backed by associated storage.
//!
//! ```text
//! generate_adder(rt, Widget, Integer) ──► adder
//! adder.add("priority")
//!     Widget.priority      () -> int      reads  associations["priority"]
//!     Widget.setPriority:  (int) -> void  writes associations["priority"]
//! ```
//!
//! Nothing is declared on the object. Values live in each instance's
//! association table under the property name, held according to the kind
//! the adder was generated for. The kind is fixed per adder, so every
//! instance of the class stores the key the same way.

use crate::config::PropertyRedefinition;
use crate::error::{SwizzleError, SwizzleResult};
use crate::method::imp::{Imp, MethodLogic};
use crate::method::signature::{Signature, ValueKind};
use crate::mutator::{EncodingCheck, MethodMutator};
use crate::object::associated::{AssociationKey, StoragePolicy};
use crate::object::class::{ClassRef, DispatchKind};
use crate::runtime::Runtime;
use crate::value::Value;
use std::fmt;
use swizzle_core::{Selector, intern};

// =============================================================================
// Property Kind
// =============================================================================

/// Storage discipline and value kind of a pseudo-property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoPropertyKind {
    /// Any value; reference values are kept alive.
    ObjectRetain,
    /// Any value; a copy is taken on every write.
    ObjectCopy,
    /// Any value; reference values are held without ownership.
    ObjectAssignUnsafe,
    Bool,
    Integer,
    UnsignedInteger,
    Float,
    Double,
}

impl PseudoPropertyKind {
    pub const ALL: [PseudoPropertyKind; 8] = [
        Self::ObjectRetain,
        Self::ObjectCopy,
        Self::ObjectAssignUnsafe,
        Self::Bool,
        Self::Integer,
        Self::UnsignedInteger,
        Self::Float,
        Self::Double,
    ];

    /// Kind of the getter's result and the setter's argument.
    pub fn value_kind(self) -> ValueKind {
        match self {
            Self::ObjectRetain | Self::ObjectCopy | Self::ObjectAssignUnsafe => ValueKind::Any,
            Self::Bool => ValueKind::Bool,
            Self::Integer => ValueKind::Int,
            Self::UnsignedInteger => ValueKind::UInt,
            Self::Float => ValueKind::Float,
            Self::Double => ValueKind::Double,
        }
    }

    pub fn storage_policy(self) -> StoragePolicy {
        match self {
            Self::ObjectRetain => StoragePolicy::Retain,
            Self::ObjectCopy => StoragePolicy::Copy,
            Self::ObjectAssignUnsafe => StoragePolicy::Unowned,
            _ => StoragePolicy::Value,
        }
    }

    /// What the getter returns before anything was stored.
    pub fn default_value(self) -> Value {
        match self {
            Self::ObjectRetain | Self::ObjectCopy | Self::ObjectAssignUnsafe => Value::Nil,
            Self::Bool => Value::Bool(false),
            Self::Integer => Value::Int(0),
            Self::UnsignedInteger => Value::UInt(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ObjectRetain => "object-retain",
            Self::ObjectCopy => "object-copy",
            Self::ObjectAssignUnsafe => "object-assign-unsafe",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::UnsignedInteger => "unsigned-integer",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

impl fmt::Display for PseudoPropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Accessor Names
// =============================================================================

/// Check a property name: a letter or `_`, then letters, digits or `_`.
fn validate_name(name: &str) -> SwizzleResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_alphabetic() || first == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SwizzleError::InvalidPropertyName {
            name: name.to_string(),
        })
    }
}

/// `priority` -> `setPriority`.
pub fn setter_name(name: &str) -> String {
    let mut chars = name.chars();
    let mut out = String::with_capacity(name.len() + 3);
    out.push_str("set");
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }
    out
}

/// Selectors installed for one pseudo-property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAccessors {
    pub getter: Selector,
    pub setter: Selector,
}

impl PropertyAccessors {
    pub fn for_name(name: &str) -> Self {
        Self {
            getter: Selector::unary(name),
            setter: Selector::with_one_arg(&setter_name(name)),
        }
    }
}

// =============================================================================
// Adder
// =============================================================================

/// Create an adder installing pseudo-properties of `kind` on `class`.
pub fn generate_adder<'rt>(
    runtime: &'rt Runtime,
    class: &ClassRef,
    kind: PseudoPropertyKind,
) -> PropertyAdder<'rt> {
    PropertyAdder {
        runtime,
        class: class.clone(),
        kind,
    }
}

/// Reusable installer for pseudo-properties of one kind on one class.
#[derive(Clone)]
pub struct PropertyAdder<'rt> {
    runtime: &'rt Runtime,
    class: ClassRef,
    kind: PseudoPropertyKind,
}

impl PropertyAdder<'_> {
    #[inline]
    pub fn kind(&self) -> PseudoPropertyKind {
        self.kind
    }

    #[inline]
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Install the getter `name` and setter `setName:`.
    ///
    /// Adding the same name again with the same kind re-installs. A different
    /// kind on the same class is refused unless the runtime is configured to
    /// overwrite.
    pub fn add(&self, name: &str) -> SwizzleResult<PropertyAccessors> {
        validate_name(name)?;
        let runtime = self.runtime;
        let class = &self.class;
        let property = intern(name);
        let accessors = PropertyAccessors::for_name(name);

        let _guard = runtime.mutation_guard();

        let check = match runtime.property_kind(class, &property) {
            None => EncodingCheck::Strict,
            Some(existing) if existing == self.kind => EncodingCheck::Relaxed,
            Some(existing) => match runtime.config().property_redefinition {
                PropertyRedefinition::Reject => {
                    return Err(SwizzleError::PropertyKindConflict {
                        class: class.name().to_string(),
                        name: name.to_string(),
                        existing: existing.name(),
                        requested: self.kind.name(),
                    });
                }
                PropertyRedefinition::Overwrite => {
                    tracing::warn!(
                        class = %class.name(),
                        property = name,
                        %existing,
                        requested = %self.kind,
                        "pseudo-property kind overwritten"
                    );
                    EncodingCheck::Relaxed
                }
            },
        };

        let mutator = MethodMutator::new(runtime);
        let instance = DispatchKind::Instance;
        let getter = mutator.prepare(class, instance, accessors.getter, &self.getter_logic(name), check)?;
        let setter = mutator.prepare(class, instance, accessors.setter, &self.setter_logic(name), check)?;

        self.install(accessors, getter, setter);
        runtime.record_property_kind(class, property, self.kind);

        tracing::debug!(
            class = %class.name(),
            property = name,
            kind = %self.kind,
            getter = %accessors.getter,
            setter = %accessors.setter,
            "pseudo-property installed"
        );
        Ok(accessors)
    }

    fn install(&self, accessors: PropertyAccessors, getter: Imp, setter: Imp) {
        let instance = DispatchKind::Instance;
        self.runtime
            .install_own(&self.class, instance, accessors.getter, getter);
        self.runtime
            .install_own(&self.class, instance, accessors.setter, setter);
    }

    fn getter_logic(&self, name: &str) -> MethodLogic {
        let key = AssociationKey::new(name);
        let fallback = self.kind.default_value();
        let value_kind = self.kind.value_kind();
        MethodLogic::new(
            Signature::getter(value_kind),
            move |runtime, receiver, _| {
                // Values written under an earlier kind read as unset.
                Ok(receiver
                    .as_object()
                    .and_then(|obj| runtime.associated(obj, &key))
                    .filter(|stored| value_kind.accepts(stored))
                    .unwrap_or_else(|| fallback.clone()))
            },
        )
    }

    fn setter_logic(&self, name: &str) -> MethodLogic {
        let key = AssociationKey::new(name);
        let policy = self.kind.storage_policy();
        MethodLogic::new(
            Signature::setter(self.kind.value_kind()),
            move |runtime, receiver, args| {
                if let Some(obj) = receiver.as_object() {
                    runtime.set_associated(obj, key.clone(), args[0].clone(), policy)?;
                }
                Ok(Value::Nil)
            },
        )
    }
}

impl fmt::Debug for PropertyAdder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAdder")
            .field("class", self.class.name())
            .field("kind", &self.kind)
            .finish()
    }
}
