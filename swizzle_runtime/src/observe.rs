//! Change notification built on method interception.
//!
//! Observing `key` on an object moves the object onto a per-instance
//! notifying subclass and overrides the key's setter there:
//!
//! ```text
//! p ──► Person_Notifying_7 ──► Person
//!        setValue:                    -> hook: original, then observers
//!        notifyingOriginal_setValue:  -> Person's setValue:
//! ```
//!
//! Observers are called after the original setter returned, with the value
//! the getter reports afterwards (or the argument if there is no getter).
//!
//! Hooks and observer lists belong to the runtime, so any number of
//! notifiers can watch the same object and key. Each notifier only removes
//! its own observers, and drops them when it goes away.
//!
//! The hook lives on the notifying class. Isolating the object afterwards
//! puts the isolated class below it, and a setter replaced there is never
//! seen by the hook. Isolate before observing.

use crate::error::{SwizzleError, SwizzleResult};
use crate::method::imp::MethodLogic;
use crate::mutator::MethodMutator;
use crate::object::class::{ClassFlags, ClassRef, DispatchKind};
use crate::object::{ObjectId, ObjectRef};
use crate::pseudo_property::setter_name;
use crate::runtime::Runtime;
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use swizzle_core::{InternedString, Selector, intern};

/// A change delivered to observers.
#[derive(Debug)]
pub struct Change<'a> {
    pub object: &'a ObjectRef,
    pub key: &'a str,
    pub new_value: &'a Value,
}

/// Observer callback.
pub type Observer = Arc<dyn Fn(&Change<'_>) + Send + Sync>;

static NEXT_NOTIFIER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies which notifier registered an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifierId(u64);

impl NotifierId {
    fn allocate() -> Self {
        Self(NEXT_NOTIFIER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type ObserverList = SmallVec<[(NotifierId, Observer); 2]>;

// =============================================================================
// Observer Registry
// =============================================================================

/// Observers per (object, key), owned by the runtime.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    by_key: RwLock<FxHashMap<(ObjectId, InternedString), ObserverList>>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn add(&self, object: ObjectId, key: InternedString, owner: NotifierId, observer: Observer) {
        self.by_key
            .write()
            .entry((object, key))
            .or_default()
            .push((owner, observer));
    }

    /// Observers to call for one change, cloned out of the lock.
    fn snapshot(&self, object: ObjectId, key: &InternedString) -> ObserverList {
        self.by_key
            .read()
            .get(&(object, key.clone()))
            .cloned()
            .unwrap_or_default()
    }

    fn remove(&self, object: ObjectId, key: &InternedString, owner: NotifierId) -> usize {
        let mut by_key = self.by_key.write();
        let map_key = (object, key.clone());
        let Some(list) = by_key.get_mut(&map_key) else {
            return 0;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != owner);
        let removed = before - list.len();
        if list.is_empty() {
            by_key.remove(&map_key);
        }
        removed
    }

    fn remove_owner(&self, owner: NotifierId) {
        let mut by_key = self.by_key.write();
        by_key.retain(|_, list| {
            list.retain(|(id, _)| *id != owner);
            !list.is_empty()
        });
    }

    fn count(&self, object: ObjectId, key: &InternedString, owner: NotifierId) -> usize {
        self.by_key
            .read()
            .get(&(object, key.clone()))
            .map_or(0, |list| list.iter().filter(|(id, _)| *id == owner).count())
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.read().len()
    }
}

// =============================================================================
// Change Notifier
// =============================================================================

/// Installs setter hooks and registers observers.
pub struct ChangeNotifier<'rt> {
    runtime: &'rt Runtime,
    id: NotifierId,
}

impl<'rt> ChangeNotifier<'rt> {
    pub fn new(runtime: &'rt Runtime) -> Self {
        Self {
            runtime,
            id: NotifierId::allocate(),
        }
    }

    #[inline]
    pub fn id(&self) -> NotifierId {
        self.id
    }

    /// Call `observer` whenever `key` is set on `object` through its setter.
    ///
    /// Fails if the object cannot be given a notifying class or its class
    /// has no `set<Key>:` method.
    pub fn observe<F>(&self, object: &ObjectRef, key: &str, observer: F) -> SwizzleResult<()>
    where
        F: Fn(&Change<'_>) + Send + Sync + 'static,
    {
        let _guard = self.runtime.mutation_guard();

        let class = self.notifying_class(object)?;
        let setter = Selector::with_one_arg(&setter_name(key));
        self.hook_setter(&class, key, setter)?;

        self.runtime
            .observers()
            .add(object.id(), intern(key), self.id, Arc::new(observer));

        tracing::debug!(object = object.id().raw(), key, notifier = self.id.0, "observer added");
        Ok(())
    }

    /// Drop this notifier's observers of `key` on `object`. Returns how many
    /// there were.
    ///
    /// The setter hook stays installed and becomes a pass-through once no
    /// observers are left.
    pub fn remove_observers(&self, object: &ObjectRef, key: &str) -> usize {
        let removed = self
            .runtime
            .observers()
            .remove(object.id(), &intern(key), self.id);
        tracing::debug!(object = object.id().raw(), key, removed, "observers removed");
        removed
    }

    /// Number of this notifier's observers of `key` on `object`.
    pub fn observer_count(&self, object: &ObjectRef, key: &str) -> usize {
        self.runtime
            .observers()
            .count(object.id(), &intern(key), self.id)
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    fn notifying_class(&self, object: &ObjectRef) -> SwizzleResult<ClassRef> {
        let class = object.class();
        if class.is_notifying() {
            return Ok(class);
        }
        if class.is_final() {
            return Err(SwizzleError::UnsubclassableReceiver {
                reason: format!("class {} is final", class.name()),
            });
        }

        let name = format!(
            "{}{}{}",
            class.name(),
            self.runtime.config().notifying_class_infix,
            object.id()
        );
        let notifying = self.runtime.allocate_class(&name, &class);
        notifying.add_flags(ClassFlags::NOTIFYING);
        self.runtime.register_class(&notifying)?;
        self.runtime.set_class(object, &notifying);
        Ok(notifying)
    }

    fn hook_setter(&self, class: &ClassRef, key: &str, setter: Selector) -> SwizzleResult<()> {
        let original = Selector::with_one_arg(&format!("notifyingOriginal_{}", setter.name()));
        if class.defines(DispatchKind::Instance, original) {
            return Ok(());
        }

        let current = self
            .runtime
            .resolve(class, DispatchKind::Instance, setter)
            .ok_or_else(|| SwizzleError::UnresolvedMethod {
                class: class.name().to_string(),
                selector: setter,
            })?;
        let getter = Selector::unary(key);
        let key = intern(key);

        let hook = MethodLogic::new(current.signature().clone(), move |runtime, receiver, args| {
            let result = runtime.send(receiver, original, args)?;

            if let Some(object) = receiver.as_object() {
                let list = runtime.observers().snapshot(object.id(), &key);
                if !list.is_empty() {
                    let new_value = if runtime.responds_to(receiver, getter) {
                        runtime.send(receiver, getter, &[])?
                    } else {
                        args[0].clone()
                    };
                    let change = Change {
                        object,
                        key: &key,
                        new_value: &new_value,
                    };
                    for (_, observer) in &list {
                        observer(&change);
                    }
                }
            }
            Ok(result)
        });

        MethodMutator::new(self.runtime).override_instance_method(class, setter, original, &hook)?;
        Ok(())
    }
}

impl Drop for ChangeNotifier<'_> {
    fn drop(&mut self) {
        self.runtime.observers().remove_owner(self.id);
    }
}

impl fmt::Debug for ChangeNotifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolate::isolate;
    use crate::method::signature::{Signature, ValueKind};
    use crate::pseudo_property::{PseudoPropertyKind, generate_adder};
    use parking_lot::Mutex;

    fn counter_class(rt: &Runtime) -> ClassRef {
        let class = rt.define_class("Counter", None).unwrap();
        generate_adder(rt, &class, PseudoPropertyKind::Integer)
            .add("value")
            .unwrap();
        class
    }

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, impl Fn(&Change<'_>) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |change: &Change<'_>| {
            sink.lock().push(change.new_value.clone())
        })
    }

    #[test]
    fn test_observer_sees_new_value() {
        let rt = Runtime::default();
        let class = counter_class(&rt);
        let obj = rt.instantiate(&class);
        let notifier = ChangeNotifier::new(&rt);
        let (seen, observer) = recorder();

        notifier.observe(&obj, "value", observer).unwrap();
        assert!(obj.class().is_notifying());

        let recv = Value::Object(obj.clone());
        rt.send(&recv, Selector::with_one_arg("setValue"), &[Value::Int(4)])
            .unwrap();
        assert_eq!(*seen.lock(), vec![Value::Int(4)]);
        assert_eq!(rt.send(&recv, Selector::unary("value"), &[]), Ok(Value::Int(4)));
    }

    #[test]
    fn test_other_instances_not_observed() {
        let rt = Runtime::default();
        let class = counter_class(&rt);
        let watched = rt.instantiate(&class);
        let other = Value::Object(rt.instantiate(&class));
        let notifier = ChangeNotifier::new(&rt);
        let (seen, observer) = recorder();

        notifier.observe(&watched, "value", observer).unwrap();
        rt.send(&other, Selector::with_one_arg("setValue"), &[Value::Int(1)])
            .unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_remove_observers() {
        let rt = Runtime::default();
        let class = counter_class(&rt);
        let obj = rt.instantiate(&class);
        let notifier = ChangeNotifier::new(&rt);
        let (seen, observer) = recorder();
        let (_, second) = recorder();

        notifier.observe(&obj, "value", observer).unwrap();
        notifier.observe(&obj, "value", second).unwrap();
        assert_eq!(notifier.observer_count(&obj, "value"), 2);
        assert_eq!(notifier.remove_observers(&obj, "value"), 2);

        rt.send(&Value::Object(obj.clone()), Selector::with_one_arg("setValue"), &[Value::Int(9)])
            .unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_two_notifiers_share_hook() {
        let rt = Runtime::default();
        let class = counter_class(&rt);
        let obj = rt.instantiate(&class);
        let first = ChangeNotifier::new(&rt);
        let second = ChangeNotifier::new(&rt);
        let (seen_first, observer_first) = recorder();
        let (seen_second, observer_second) = recorder();

        first.observe(&obj, "value", observer_first).unwrap();
        second.observe(&obj, "value", observer_second).unwrap();
        assert_eq!(first.observer_count(&obj, "value"), 1);
        assert_eq!(second.observer_count(&obj, "value"), 1);

        let recv = Value::Object(obj.clone());
        let setter = Selector::with_one_arg("setValue");
        rt.send(&recv, setter, &[Value::Int(1)]).unwrap();
        assert_eq!(*seen_first.lock(), vec![Value::Int(1)]);
        assert_eq!(*seen_second.lock(), vec![Value::Int(1)]);

        // Removing one notifier's observers leaves the other's in place.
        assert_eq!(first.remove_observers(&obj, "value"), 1);
        rt.send(&recv, setter, &[Value::Int(2)]).unwrap();
        assert_eq!(*seen_first.lock(), vec![Value::Int(1)]);
        assert_eq!(*seen_second.lock(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_observe_again_after_notifier_dropped() {
        let rt = Runtime::default();
        let class = counter_class(&rt);
        let obj = rt.instantiate(&class);
        let (seen_old, observer_old) = recorder();

        {
            let notifier = ChangeNotifier::new(&rt);
            notifier.observe(&obj, "value", observer_old).unwrap();
        }
        assert_eq!(rt.observers().len(), 0);

        let notifier = ChangeNotifier::new(&rt);
        let (seen, observer) = recorder();
        notifier.observe(&obj, "value", observer).unwrap();
        rt.send(&Value::Object(obj.clone()), Selector::with_one_arg("setValue"), &[Value::Int(7)])
            .unwrap();
        assert_eq!(*seen.lock(), vec![Value::Int(7)]);
        assert!(seen_old.lock().is_empty());
    }

    #[test]
    fn test_missing_setter() {
        let rt = Runtime::default();
        let class = rt.define_class("Silent", None).unwrap();
        let obj = rt.instantiate(&class);
        let err = ChangeNotifier::new(&rt)
            .observe(&obj, "volume", |_| {})
            .unwrap_err();
        assert!(matches!(err, SwizzleError::UnresolvedMethod { .. }));
    }

    #[test]
    fn test_mutation_before_observe_is_seen() {
        let rt = Runtime::default();
        let class = counter_class(&rt);
        let obj = rt.instantiate(&class);
        let recv = Value::Object(obj.clone());
        let setter = Selector::with_one_arg("setValue");

        isolate(&rt, &recv).unwrap();
        let doubled = MethodLogic::new(Signature::setter(ValueKind::Int), move |rt, receiver, args| {
            let n = args[0].as_int().unwrap_or_default();
            rt.send(receiver, Selector::with_one_arg("plainSetValue"), &[Value::Int(n * 2)])
        });
        MethodMutator::new(&rt)
            .for_object(&obj)
            .override_method(setter, Selector::with_one_arg("plainSetValue"), &doubled)
            .unwrap();

        let notifier = ChangeNotifier::new(&rt);
        let (seen, observer) = recorder();
        notifier.observe(&obj, "value", observer).unwrap();

        rt.send(&recv, setter, &[Value::Int(3)]).unwrap();
        assert_eq!(*seen.lock(), vec![Value::Int(6)]);
    }

    #[test]
    fn test_isolate_after_observe_loses_replaced_setter() {
        let rt = Runtime::default();
        let class = counter_class(&rt);
        let obj = rt.instantiate(&class);
        let recv = Value::Object(obj.clone());
        let setter = Selector::with_one_arg("setValue");

        let notifier = ChangeNotifier::new(&rt);
        let (seen, observer) = recorder();
        notifier.observe(&obj, "value", observer).unwrap();

        isolate(&rt, &recv).unwrap();
        assert!(obj.class().is_isolated());
        assert!(obj.class().parent().unwrap().is_notifying());

        let ignore = MethodLogic::new(Signature::setter(ValueKind::Int), |_, _, _| Ok(Value::Nil));
        MethodMutator::new(&rt)
            .for_object(&obj)
            .replace(setter, &ignore)
            .unwrap();
        rt.send(&recv, setter, &[Value::Int(3)]).unwrap();
        assert!(seen.lock().is_empty());
    }
}
