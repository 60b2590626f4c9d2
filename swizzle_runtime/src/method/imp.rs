//! Method implementations.
//!
//! An [`Implementation`] is the callable stored in a dispatch table. Its body
//! uses an explicit receiver-first convention:
//!
//! ```text
//! body(runtime, receiver, [arg0, arg1, ...]) -> Result<Value, MessageError>
//! ```
//!
//! The runtime is passed so logic can send further messages, e.g. call the
//! aliased original from inside an override.
//!
//! Implementations are shared (`Imp = Arc<Implementation>`). Aliasing installs
//! the very same `Arc` under a second selector; replacing installs a new one
//! and leaves any previously fetched handle working with the old body.

use crate::error::{MessageError, MessageResult, SwizzleError, SwizzleResult};
use crate::method::signature::Signature;
use crate::runtime::Runtime;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use swizzle_core::Selector;

/// Signature of a method body.
pub type MethodFn = dyn Fn(&Runtime, &Value, &[Value]) -> MessageResult<Value> + Send + Sync;

/// Shared handle to an installed implementation.
pub type Imp = Arc<Implementation>;

static NEXT_IMP_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique implementation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImpId(u64);

impl ImpId {
    fn next() -> Self {
        Self(NEXT_IMP_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

// =============================================================================
// Implementation
// =============================================================================

/// A callable bound into a dispatch table.
pub struct Implementation {
    id: ImpId,
    /// Selector the implementation was originally built for.
    origin: Selector,
    signature: Signature,
    body: Arc<MethodFn>,
}

impl Implementation {
    #[inline]
    pub fn id(&self) -> ImpId {
        self.id
    }

    #[inline]
    pub fn origin(&self) -> Selector {
        self.origin
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Invoke the body after checking arguments against the signature.
    ///
    /// `selector` is the name the method was reached through; it is only used
    /// in error reports.
    pub fn invoke(
        &self,
        runtime: &Runtime,
        selector: Selector,
        receiver: &Value,
        args: &[Value],
    ) -> MessageResult<Value> {
        let params = self.signature.params();
        if params.len() != args.len() {
            return Err(MessageError::ArityMismatch {
                selector,
                expected: params.len(),
                found: args.len(),
            });
        }
        for (index, (kind, arg)) in params.iter().zip(args).enumerate() {
            if !kind.accepts(arg) {
                return Err(MessageError::ArgumentKind {
                    selector,
                    index,
                    expected: *kind,
                    found: arg.kind(),
                });
            }
        }

        let result = (self.body)(runtime, receiver, args)?;

        let returns = self.signature.returns();
        if !returns.accepts(&result) {
            return Err(MessageError::ReturnKind {
                selector,
                expected: returns,
                found: result.kind(),
            });
        }
        Ok(result)
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("signature", &self.signature.type_encoding())
            .finish()
    }
}

// =============================================================================
// Method Logic
// =============================================================================

/// Caller-supplied logic plus its declared signature.
///
/// This is the input to replace/override; it only becomes an
/// [`Implementation`] once checked against a selector.
#[derive(Clone)]
pub struct MethodLogic {
    signature: Signature,
    body: Arc<MethodFn>,
}

impl MethodLogic {
    /// Wrap a closure with an explicit signature.
    pub fn new<F>(signature: Signature, body: F) -> Self
    where
        F: Fn(&Runtime, &Value, &[Value]) -> MessageResult<Value> + Send + Sync + 'static,
    {
        Self {
            signature,
            body: Arc::new(body),
        }
    }

    /// Logic that ignores its arguments and returns a fixed value.
    pub fn constant(signature: Signature, value: Value) -> Self {
        Self::new(signature, move |_, _, _| Ok(value.clone()))
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Turn the logic into an implementation for `selector`.
    ///
    /// Fails if the signature is malformed or its arity differs from the
    /// selector's.
    pub fn build(&self, selector: Selector) -> SwizzleResult<Imp> {
        if let Some(reason) = self.signature.malformed() {
            return Err(SwizzleError::ImplementationConstructionFailed { selector, reason });
        }
        let arity = selector.arity() as usize;
        if self.signature.arity() != arity {
            return Err(SwizzleError::ImplementationConstructionFailed {
                selector,
                reason: format!(
                    "logic takes {} argument(s) but selector takes {}",
                    self.signature.arity(),
                    arity
                ),
            });
        }
        Ok(Arc::new(Implementation {
            id: ImpId::next(),
            origin: selector,
            signature: self.signature.clone(),
            body: self.body.clone(),
        }))
    }
}

impl fmt::Debug for MethodLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodLogic")
            .field("signature", &self.signature.to_string())
            .finish()
    }
}
