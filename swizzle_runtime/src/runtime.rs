//! The object-model substrate.
//!
//! A `Runtime` owns the class registry, the method cache and the mutation
//! lock. Everything the mutator, the pseudo-property synthesizer and the
//! isolator do goes through the primitives here:
//!
//! | Primitive                  | Meaning                                        |
//! |----------------------------|------------------------------------------------|
//! | `resolve(class, kind, sel)`| walk the class chain (cached)                  |
//! | `install_own(...)`         | write one slot of one class's table            |
//! | `allocate_class(...)`      | create a subclass, unregistered                |
//! | `register_class(...)`      | publish it in the class registry               |
//! | `Object::class/set_class`  | read/rewrite an instance's class pointer       |
//! | `set_associated(...)`      | per-instance side storage with ownership policy|
//!
//! There is one process-wide runtime behind [`global_runtime`], but nothing
//! depends on it: tests build their own.
//!
//! # Thread Safety
//!
//! Every table write is atomic. Multi-step mutations take the runtime's
//! reentrant mutation lock when `serialize_mutations` is on; message sends
//! never take it.

use crate::config::{ConfigError, RuntimeConfig};
use crate::error::{MessageError, MessageResult, SwizzleError, SwizzleResult};
use crate::method::cache::{CachedMethod, MethodCache};
use crate::method::imp::{Imp, MethodLogic};
use crate::method::signature::{Signature, ValueKind};
use crate::object::associated::{AssociationKey, StoragePolicy};
use crate::object::class::{Class, ClassFlags, ClassId, ClassRef, DispatchKind};
use crate::object::registry::ClassRegistry;
use crate::object::{Object, ObjectRef};
use crate::observe::ObserverRegistry;
use crate::pseudo_property::PseudoPropertyKind;
use crate::value::Value;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::{Arc, OnceLock};
use swizzle_core::{InternedString, MAX_ARITY, Selector};

/// Guard held across a multi-step mutation.
pub type MutationGuard<'a> = Option<ReentrantMutexGuard<'a, ()>>;

/// Runtime state: classes, cache, configuration.
pub struct Runtime {
    config: RuntimeConfig,
    registry: ClassRegistry,
    cache: MethodCache,
    mutation_lock: ReentrantMutex<()>,
    root: ClassRef,
    /// Kind each pseudo-property was installed with, per class.
    property_kinds: RwLock<FxHashMap<(ClassId, InternedString), PseudoPropertyKind>>,
    /// Change observers shared by every notifier.
    observers: ObserverRegistry,
}

impl Runtime {
    /// Build a runtime from a validated configuration.
    pub fn new(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RuntimeConfig) -> Self {
        let root = Arc::new(Class::new(&config.root_class_name, None));
        root.add_flags(ClassFlags::ROOT);

        let runtime = Self {
            config,
            registry: ClassRegistry::new(),
            cache: MethodCache::new(),
            mutation_lock: ReentrantMutex::new(()),
            root,
            property_kinds: RwLock::new(FxHashMap::default()),
            observers: ObserverRegistry::new(),
        };
        // A fresh registry always accepts a parentless root.
        if let Err(err) = runtime.registry.register(runtime.root.clone()) {
            tracing::error!(%err, "root class registration failed");
        }
        runtime.install_root_methods();
        runtime
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    #[inline]
    pub fn method_cache(&self) -> &MethodCache {
        &self.cache
    }

    /// Root of the class hierarchy.
    #[inline]
    pub fn root_class(&self) -> &ClassRef {
        &self.root
    }

    #[inline]
    pub(crate) fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    /// Lock held across a multi-step mutation; `None` when serialization is
    /// disabled.
    pub fn mutation_guard(&self) -> MutationGuard<'_> {
        self.config
            .serialize_mutations
            .then(|| self.mutation_lock.lock())
    }

    // =========================================================================
    // Classes
    // =========================================================================

    /// Create a subclass of `parent` without registering it.
    pub fn allocate_class(&self, name: &str, parent: &ClassRef) -> ClassRef {
        let class = Arc::new(Class::new(name, Some(parent.clone())));
        tracing::debug!(class = name, parent = %parent.name(), "class allocated");
        class
    }

    /// Publish a class in the registry.
    pub fn register_class(&self, class: &ClassRef) -> SwizzleResult<()> {
        self.registry.register(class.clone())
    }

    /// Allocate and register a class. `None` parent means the root class.
    pub fn define_class(&self, name: &str, parent: Option<&ClassRef>) -> SwizzleResult<ClassRef> {
        let parent = parent.unwrap_or(&self.root);
        let class = self.allocate_class(name, parent);
        self.register_class(&class)?;
        Ok(class)
    }

    /// Registered class by name.
    pub fn class_named(&self, name: &str) -> Option<ClassRef> {
        self.registry.get(name)
    }

    /// Create an instance.
    pub fn instantiate(&self, class: &ClassRef) -> ObjectRef {
        Object::new(class)
    }

    /// Class and dispatch table a receiver's messages resolve through.
    ///
    /// `None` for nil and inline values.
    pub fn class_of(&self, receiver: &Value) -> Option<(ClassRef, DispatchKind)> {
        match receiver {
            Value::Object(obj) => Some((obj.class(), DispatchKind::Instance)),
            Value::Class(class) => Some((class.clone(), DispatchKind::Class)),
            _ => None,
        }
    }

    /// Rewrite an object's class pointer.
    pub fn set_class(&self, object: &ObjectRef, class: &ClassRef) -> ClassRef {
        let previous = object.set_class(class.clone());
        tracing::debug!(
            object = object.id().raw(),
            from = %previous.name(),
            to = %class.name(),
            "class pointer rewritten"
        );
        previous
    }

    // =========================================================================
    // Method Tables
    // =========================================================================

    /// Add a method the class does not define yet.
    ///
    /// Fails with `NameCollision` if the class already has its own entry.
    /// Inherited definitions are shadowed.
    pub fn add_method(
        &self,
        class: &ClassRef,
        kind: DispatchKind,
        selector: Selector,
        logic: &MethodLogic,
    ) -> SwizzleResult<Imp> {
        let imp = logic.build(selector)?;
        if !class.table(kind).insert_new(selector, imp.clone()) {
            return Err(SwizzleError::NameCollision {
                class: class.name().to_string(),
                selector,
            });
        }
        self.invalidate(class);
        tracing::debug!(class = %class.name(), %kind, %selector, "method added");
        Ok(imp)
    }

    /// Write one slot of a class's own table, returning what it displaced.
    ///
    /// Last write wins. Ancestors and subclasses' own entries are untouched.
    pub fn install_own(
        &self,
        class: &ClassRef,
        kind: DispatchKind,
        selector: Selector,
        imp: Imp,
    ) -> Option<Imp> {
        let imp_id = imp.id().raw();
        let displaced = class.table(kind).insert(selector, imp);
        self.invalidate(class);
        tracing::debug!(
            class = %class.name(),
            %kind,
            %selector,
            imp = imp_id,
            displaced = displaced.as_ref().map(|d| d.id().raw()),
            "method installed"
        );
        displaced
    }

    /// Resolve a selector through the class chain.
    pub fn resolve(&self, class: &ClassRef, kind: DispatchKind, selector: Selector) -> Option<Imp> {
        let cacheable = self.config.method_cache && class.is_registered();
        if !cacheable {
            return class.lookup_method(kind, selector).map(|slot| slot.imp);
        }

        if let Some(hit) = self.cache.get(class.id(), kind, selector) {
            return Some(hit.imp);
        }
        let epoch = self.cache.epoch();
        let slot = class.lookup_method(kind, selector)?;
        self.cache.insert(
            class.id(),
            kind,
            selector,
            CachedMethod {
                imp: slot.imp.clone(),
                defining_class: slot.defining_class,
            },
            epoch,
        );
        Some(slot.imp)
    }

    fn invalidate(&self, class: &Class) {
        if !self.config.method_cache {
            return;
        }
        let affected = if class.is_registered() {
            self.registry.with_descendants(class.id())
        } else {
            let mut only = FxHashSet::default();
            only.insert(class.id());
            only
        };
        self.cache.invalidate_classes(&affected);
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Whether a send of `selector` to `receiver` would find a method.
    pub fn responds_to(&self, receiver: &Value, selector: Selector) -> bool {
        self.class_of(receiver)
            .is_some_and(|(class, kind)| self.resolve(&class, kind, selector).is_some())
    }

    /// Send a message.
    ///
    /// Sending to `Nil` does nothing and returns `Nil`. Inline values have no
    /// class and reject every message.
    pub fn send(&self, receiver: &Value, selector: Selector, args: &[Value]) -> MessageResult<Value> {
        let (class, kind) = match receiver {
            Value::Nil => return Ok(Value::Nil),
            Value::Object(obj) => (obj.class(), DispatchKind::Instance),
            Value::Class(class) => (class.clone(), DispatchKind::Class),
            other => {
                return Err(MessageError::InvalidReceiver {
                    selector,
                    found: other.kind(),
                });
            }
        };

        let imp = self
            .resolve(&class, kind, selector)
            .ok_or_else(|| MessageError::DoesNotRecognize {
                class: class.name().to_string(),
                selector,
            })?;
        imp.invoke(self, selector, receiver, args)
    }

    /// Send by name; arity is taken from the argument count.
    ///
    /// More than [`MAX_ARITY`] arguments is an `ArityMismatch`.
    pub fn send_named(&self, receiver: &Value, name: &str, args: &[Value]) -> MessageResult<Value> {
        let arity = u8::try_from(args.len())
            .ok()
            .filter(|arity| *arity <= MAX_ARITY)
            .ok_or_else(|| MessageError::ArityMismatch {
                selector: Selector::new(name, MAX_ARITY),
                expected: MAX_ARITY as usize,
                found: args.len(),
            })?;
        self.send(receiver, Selector::new(name, arity), args)
    }

    // =========================================================================
    // Associated Storage
    // =========================================================================

    /// Copy a value for `Copy` storage.
    ///
    /// Objects are sent `copy`; strings are duplicated; scalars and classes
    /// are returned as they are.
    pub fn copy_value(&self, value: &Value) -> MessageResult<Value> {
        match value {
            Value::Object(_) => self.send(value, Selector::unary("copy"), &[]),
            Value::Str(s) => Ok(Value::Str(Arc::from(&**s))),
            other => Ok(other.clone()),
        }
    }

    /// Read an associated value; `None` if absent.
    pub fn associated(&self, object: &ObjectRef, key: &AssociationKey) -> Option<Value> {
        object.associations().get(key)
    }

    /// Store an associated value under `policy`.
    ///
    /// `Copy` takes the copy here, before the value reaches the table.
    pub fn set_associated(
        &self,
        object: &ObjectRef,
        key: AssociationKey,
        value: Value,
        policy: StoragePolicy,
    ) -> MessageResult<()> {
        let stored = match policy {
            StoragePolicy::Copy => self.copy_value(&value)?,
            _ => value,
        };
        object.associations().set(key, stored, policy);
        Ok(())
    }

    // =========================================================================
    // Pseudo-Property Bookkeeping
    // =========================================================================

    /// Kind a pseudo-property was installed with on exactly this class.
    pub fn property_kind(&self, class: &Class, name: &InternedString) -> Option<PseudoPropertyKind> {
        self.property_kinds
            .read()
            .get(&(class.id(), name.clone()))
            .copied()
    }

    pub(crate) fn record_property_kind(
        &self,
        class: &Class,
        name: InternedString,
        kind: PseudoPropertyKind,
    ) {
        self.property_kinds.write().insert((class.id(), name), kind);
    }

    // =========================================================================
    // Root Methods
    // =========================================================================

    fn install_root_methods(&self) {
        let root = self.root.clone();
        let instance = DispatchKind::Instance;

        let methods: [(DispatchKind, Selector, MethodLogic); 6] = [
            (
                instance,
                Selector::unary("class"),
                MethodLogic::new(Signature::getter(ValueKind::Class), |_, receiver, _| {
                    Ok(receiver
                        .as_object()
                        .map(|obj| Value::Class(obj.class()))
                        .unwrap_or_default())
                }),
            ),
            (
                instance,
                Selector::unary("copy"),
                MethodLogic::new(Signature::getter(ValueKind::Object), |_, receiver, _| {
                    Ok(receiver
                        .as_object()
                        .map(|obj| Value::Object(obj.shallow_copy()))
                        .unwrap_or_default())
                }),
            ),
            (
                instance,
                Selector::with_one_arg("isEqual"),
                MethodLogic::new(
                    Signature::new(ValueKind::Bool).param(ValueKind::Any),
                    |_, receiver, args| Ok(Value::Bool(receiver.identical(&args[0]))),
                ),
            ),
            (
                instance,
                Selector::unary("description"),
                MethodLogic::new(Signature::getter(ValueKind::Str), |_, receiver, _| {
                    Ok(Value::from(format!("{:?}", receiver)))
                }),
            ),
            (
                DispatchKind::Class,
                Selector::unary("new"),
                MethodLogic::new(Signature::getter(ValueKind::Object), |rt, receiver, _| {
                    Ok(receiver
                        .as_class()
                        .map(|class| Value::Object(rt.instantiate(class)))
                        .unwrap_or_default())
                }),
            ),
            (
                DispatchKind::Class,
                Selector::unary("name"),
                MethodLogic::new(Signature::getter(ValueKind::Str), |_, receiver, _| {
                    Ok(receiver
                        .as_class()
                        .map(|class| Value::str(class.name()))
                        .unwrap_or_default())
                }),
            ),
        ];

        for (kind, selector, logic) in methods {
            if let Err(err) = self.add_method(&root, kind, selector, &logic) {
                tracing::error!(%err, "root method installation failed");
            }
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::build(RuntimeConfig::default())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("root", self.root.name())
            .field("classes", &self.registry.len())
            .field("cached_methods", &self.cache.len())
            .field("observed_keys", &self.observers.len())
            .finish()
    }
}

// =============================================================================
// Global Runtime
// =============================================================================

static GLOBAL_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Process-wide runtime with default configuration.
pub fn global_runtime() -> &'static Runtime {
    GLOBAL_RUNTIME.get_or_init(Runtime::default)
}
