//! Method mutation: alias, replace, override.
//!
//! ```text
//! alias(orig, new)        new  ──► same Imp as orig currently resolves to
//! replace(sel, logic)     sel  ──► Imp built from logic      (own table only)
//! override(sel, old, l)   old  ──► previous Imp of sel,  sel ──► Imp from l
//! ```
//!
//! Each operation works on one table of one class: the instance table or the
//! class-level table, picked by [`DispatchKind`]. Nothing is propagated to
//! ancestors or subclasses; subclasses that define the selector themselves
//! keep their own entry.
//!
//! Failures are reported as `Err(SwizzleError)` and leave the tables as they
//! were. Override builds its implementation before aliasing, so a failed
//! override never leaves the alias behind.
//!
//! Implementations fetched before a mutation stay valid and keep running the
//! old body.

use crate::error::{SwizzleError, SwizzleResult};
use crate::method::imp::{Imp, MethodLogic};
use crate::object::ObjectRef;
use crate::object::class::{ClassRef, DispatchKind};
use crate::runtime::Runtime;
use swizzle_core::Selector;

/// Whether replace checks the new signature against the current method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EncodingCheck {
    /// Reject logic whose signature is incompatible with the method the
    /// selector currently resolves to.
    Strict,
    /// Only check arity.
    Relaxed,
}

/// Alias/replace/override against a runtime's class tables.
#[derive(Clone, Copy)]
pub struct MethodMutator<'rt> {
    runtime: &'rt Runtime,
}

impl<'rt> MethodMutator<'rt> {
    pub fn new(runtime: &'rt Runtime) -> Self {
        Self { runtime }
    }

    #[inline]
    pub fn runtime(&self) -> &'rt Runtime {
        self.runtime
    }

    // =========================================================================
    // Alias
    // =========================================================================

    /// Install `new` on `class` pointing at the implementation `original`
    /// currently resolves to.
    ///
    /// `original` may come from an ancestor. `new` must not be defined on
    /// `class` itself; an ancestor definition of `new` is shadowed.
    pub fn alias(
        &self,
        class: &ClassRef,
        kind: DispatchKind,
        original: Selector,
        new: Selector,
    ) -> SwizzleResult<Imp> {
        let _guard = self.runtime.mutation_guard();

        let imp = self.runtime.resolve(class, kind, original).ok_or_else(|| {
            SwizzleError::UnresolvedMethod {
                class: class.name().to_string(),
                selector: original,
            }
        })?;

        if class.defines(kind, new) {
            return Err(SwizzleError::NameCollision {
                class: class.name().to_string(),
                selector: new,
            });
        }
        if original.arity() != new.arity() {
            tracing::warn!(
                class = %class.name(),
                %original,
                %new,
                "aliasing selectors of different arity; calls through the alias will fail"
            );
        }

        self.runtime.install_own(class, kind, new, imp.clone());
        tracing::debug!(class = %class.name(), %kind, %original, %new, "method aliased");
        Ok(imp)
    }

    pub fn alias_instance_method(
        &self,
        class: &ClassRef,
        original: Selector,
        new: Selector,
    ) -> SwizzleResult<Imp> {
        self.alias(class, DispatchKind::Instance, original, new)
    }

    pub fn alias_class_method(
        &self,
        class: &ClassRef,
        original: Selector,
        new: Selector,
    ) -> SwizzleResult<Imp> {
        self.alias(class, DispatchKind::Class, original, new)
    }

    // =========================================================================
    // Replace
    // =========================================================================

    /// Install an implementation built from `logic` under `selector` in the
    /// class's own table, overwriting any own entry.
    ///
    /// Returns the new implementation.
    pub fn replace(
        &self,
        class: &ClassRef,
        kind: DispatchKind,
        selector: Selector,
        logic: &MethodLogic,
    ) -> SwizzleResult<Imp> {
        let imp = self.prepare(class, kind, selector, logic, EncodingCheck::Strict)?;
        self.runtime.install_own(class, kind, selector, imp.clone());
        Ok(imp)
    }

    pub fn replace_instance_method(
        &self,
        class: &ClassRef,
        selector: Selector,
        logic: &MethodLogic,
    ) -> SwizzleResult<Imp> {
        self.replace(class, DispatchKind::Instance, selector, logic)
    }

    pub fn replace_class_method(
        &self,
        class: &ClassRef,
        selector: Selector,
        logic: &MethodLogic,
    ) -> SwizzleResult<Imp> {
        self.replace(class, DispatchKind::Class, selector, logic)
    }

    // =========================================================================
    // Override
    // =========================================================================

    /// Alias `selector` to `old`, then replace `selector` with `logic`.
    ///
    /// Afterwards `old` runs the pre-override behavior, so `logic` can call
    /// it. If either half would fail, nothing is installed.
    pub fn override_method(
        &self,
        class: &ClassRef,
        kind: DispatchKind,
        selector: Selector,
        old: Selector,
        logic: &MethodLogic,
    ) -> SwizzleResult<Imp> {
        let _guard = self.runtime.mutation_guard();

        let imp = self.prepare(class, kind, selector, logic, EncodingCheck::Strict)?;
        self.alias(class, kind, selector, old)?;
        self.runtime.install_own(class, kind, selector, imp.clone());
        tracing::debug!(class = %class.name(), %kind, %selector, %old, "method overridden");
        Ok(imp)
    }

    pub fn override_instance_method(
        &self,
        class: &ClassRef,
        selector: Selector,
        old: Selector,
        logic: &MethodLogic,
    ) -> SwizzleResult<Imp> {
        self.override_method(class, DispatchKind::Instance, selector, old, logic)
    }

    pub fn override_class_method(
        &self,
        class: &ClassRef,
        selector: Selector,
        old: Selector,
        logic: &MethodLogic,
    ) -> SwizzleResult<Imp> {
        self.override_method(class, DispatchKind::Class, selector, old, logic)
    }

    // =========================================================================
    // Object-Scoped
    // =========================================================================

    /// Operations against the current class of `object`.
    ///
    /// Without isolation this affects every instance of that class.
    pub fn for_object<'a>(&'a self, object: &'a ObjectRef) -> ObjectMutator<'a, 'rt> {
        ObjectMutator {
            mutator: self,
            object,
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Build the implementation a replace would install, without installing.
    pub(crate) fn prepare(
        &self,
        class: &ClassRef,
        kind: DispatchKind,
        selector: Selector,
        logic: &MethodLogic,
        check: EncodingCheck,
    ) -> SwizzleResult<Imp> {
        let imp = logic.build(selector)?;
        if check == EncodingCheck::Strict {
            if let Some(current) = self.runtime.resolve(class, kind, selector) {
                if !current.signature().is_compatible_with(imp.signature()) {
                    return Err(SwizzleError::ImplementationConstructionFailed {
                        selector,
                        reason: format!(
                            "type encoding {} does not match existing {}",
                            imp.signature().type_encoding(),
                            current.signature().type_encoding()
                        ),
                    });
                }
            }
        }
        Ok(imp)
    }
}

/// Mutator bound to the class of one object, instance dispatch.
pub struct ObjectMutator<'a, 'rt> {
    mutator: &'a MethodMutator<'rt>,
    object: &'a ObjectRef,
}

impl ObjectMutator<'_, '_> {
    pub fn alias(&self, original: Selector, new: Selector) -> SwizzleResult<Imp> {
        self.mutator
            .alias_instance_method(&self.object.class(), original, new)
    }

    pub fn replace(&self, selector: Selector, logic: &MethodLogic) -> SwizzleResult<Imp> {
        self.mutator
            .replace_instance_method(&self.object.class(), selector, logic)
    }

    pub fn override_method(
        &self,
        selector: Selector,
        old: Selector,
        logic: &MethodLogic,
    ) -> SwizzleResult<Imp> {
        self.mutator
            .override_instance_method(&self.object.class(), selector, old, logic)
    }
}
