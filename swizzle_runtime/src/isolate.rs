//! Per-instance isolation.
//!
//! ```text
//! before:  p ──► Person ──► Object          q ──► Person
//! after:   p ──► Person_Isolated_7 ──► Person ──► Object
//!                                          q ──► Person
//! ```
//!
//! The isolated class starts empty, so `p` behaves exactly as before until
//! something mutates the isolated class. Mutations through
//! `MethodMutator::for_object(p)` then only reach `p`.
//!
//! Ordering matters when the change notifier is involved: isolating an
//! instance that is already being observed puts the isolated class below the
//! notifying class, which is allowed but makes mutation of observed setters
//! on the isolated class bypass notification. Isolate first, then observe.
//!
//! Isolated classes are registered and never removed, even after their
//! instance is dropped.

use crate::error::{SwizzleError, SwizzleResult};
use crate::object::class::ClassFlags;
use crate::object::ObjectRef;
use crate::runtime::Runtime;
use crate::value::Value;

/// Move `receiver` onto a fresh subclass of its current class.
///
/// Returns the object. An already isolated object is returned unchanged.
/// Inline values, classes and instances of final classes cannot be
/// isolated.
pub fn isolate(runtime: &Runtime, receiver: &Value) -> SwizzleResult<ObjectRef> {
    let object = match receiver {
        Value::Object(obj) => obj,
        other => {
            return Err(SwizzleError::UnsubclassableReceiver {
                reason: format!("{} values have no class pointer to rewrite", other.kind()),
            });
        }
    };

    let _guard = runtime.mutation_guard();
    let class = object.class();

    if class.is_isolated() {
        tracing::trace!(object = object.id().raw(), class = %class.name(), "already isolated");
        return Ok(object.clone());
    }
    if class.is_final() {
        return Err(SwizzleError::UnsubclassableReceiver {
            reason: format!("class {} is final", class.name()),
        });
    }
    if class.is_notifying() {
        tracing::warn!(
            object = object.id().raw(),
            class = %class.name(),
            "isolating an observed instance; observation of setters mutated on the isolated class is lost"
        );
    }

    let name = format!(
        "{}{}{}",
        class.name(),
        runtime.config().isolated_class_infix,
        object.id()
    );
    let isolated = runtime.allocate_class(&name, &class);
    isolated.add_flags(ClassFlags::ISOLATED);
    runtime.register_class(&isolated)?;
    runtime.set_class(object, &isolated);

    tracing::debug!(object = object.id().raw(), class = %isolated.name(), "instance isolated");
    Ok(object.clone())
}
