//! Execution Dispatcher
//!
//! Performs an approved call. Targets other than the identity go through the
//! [`ExternalCall`] collaborator. A call aimed at the identity itself is
//! decoded as a [`SelfCall`] and handed back to the identity's own
//! authorization surface through [`SelfCallHandler`], running with the
//! identity's address as caller. The inner call is authorized like any other
//! and its failure is reported as `DispatchFailed`.

use crate::call::SelfCall;
use crate::engine::DispatchRequest;
use keystone_core::{Address, IdentityError, IdentityResult};
use tracing::{debug, warn};

/// Collaborator that performs calls to targets other than the identity
pub trait ExternalCall: Send {
    /// Perform the call and return the target's output
    fn call(&mut self, target: Address, value: u128, payload: &[u8]) -> Result<Vec<u8>, String>;
}

/// Accepts every call and returns no data
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExternalCall;

impl ExternalCall for NoopExternalCall {
    fn call(&mut self, target: Address, value: u128, payload: &[u8]) -> Result<Vec<u8>, String> {
        debug!(target = %target, value, len = payload.len(), "noop external call");
        Ok(Vec::new())
    }
}

/// The identity's own mutation surface, re-entered by self-calls
pub trait SelfCallHandler {
    /// Address of the identity; self-calls run as this caller
    fn identity(&self) -> Address;

    /// Apply one self-call through the regular authorization checks
    fn handle(&mut self, call: SelfCall) -> IdentityResult<()>;
}

/// Routes approved executions to the identity or to the outside world
pub struct ExecutionDispatcher {
    external: Box<dyn ExternalCall>,
}

impl ExecutionDispatcher {
    /// Create a dispatcher using `external` for non-self targets
    pub fn new(external: Box<dyn ExternalCall>) -> Self {
        Self { external }
    }

    /// Perform `request`
    ///
    /// Every failure, including an inner self-call's authorization failure,
    /// comes back as `DispatchFailed` for `request.id`.
    pub fn dispatch<H>(
        &mut self,
        handler: &mut H,
        request: &DispatchRequest,
    ) -> IdentityResult<Vec<u8>>
    where
        H: SelfCallHandler + ?Sized,
    {
        let failed = |reason: String| {
            warn!(id = %request.id, target = %request.target, reason = %reason, "dispatch failed");
            IdentityError::DispatchFailed {
                id: request.id,
                reason,
            }
        };

        if request.target != handler.identity() {
            return self
                .external
                .call(request.target, request.value, &request.payload)
                .map_err(failed);
        }

        if request.value != 0 {
            return Err(failed(format!("self-call carries value {}", request.value)));
        }
        let call = SelfCall::decode(&request.payload)
            .map_err(|e| failed(format!("undecodable self-call: {e}")))?;
        debug!(id = %request.id, op = call.name(), "re-entering identity");
        handler
            .handle(call)
            .map(|()| Vec::new())
            .map_err(|e| failed(format!("{e} ({})", e.code())))
    }
}

impl Default for ExecutionDispatcher {
    fn default() -> Self {
        Self::new(Box::new(NoopExternalCall))
    }
}

impl std::fmt::Debug for ExecutionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionDispatcher").finish_non_exhaustive()
    }
}
