//! Identity facade
//!
//! [`Identity`] composes the registry, the approval engine and the dispatcher
//! behind the operations collaborators call. Each operation takes `&mut self`
//! and runs to completion before the next begins.
//!
//! Mutations of keys and thresholds all go through [`AuthorizationSurface`],
//! a short-lived view over the registry, engine and event log. Direct calls
//! use it, and so do approved self-calls: the dispatcher receives the surface
//! while the identity keeps only the dispatcher borrowed, so re-entry is a
//! plain nested call with no lock held.

use crate::call::SelfCall;
use crate::dispatch::{ExecutionDispatcher, ExternalCall, NoopExternalCall, SelfCallHandler};
use crate::engine::{ApprovalEngine, DispatchRequest, PendingExecution, Vote};
use crate::registry::{KeyRecord, KeyRegistry};
use crate::thresholds::ThresholdConfig;
use keystone_core::{
    Address, EventRecord, ExecutionId, IdentityConfig, IdentityError, IdentityEvent,
    IdentityResult, KeyId, KeyType, PurposeSet,
};
use std::collections::BTreeSet;
use tracing::info;

/// Ordered notifications emitted by one identity
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
    next_sequence: u64,
}

impl EventLog {
    /// Append an event and return its sequence number
    pub fn push(&mut self, event: IdentityEvent) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.records.push(EventRecord { sequence, event });
        sequence
    }

    /// Events not yet taken
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Remove and return buffered events; sequence numbers keep counting
    pub fn drain(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.records)
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no events are buffered
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn ensure_initialized(registry: &KeyRegistry) -> IdentityResult<()> {
    if registry.is_initialized() {
        Ok(())
    } else {
        Err(IdentityError::NotInitialized)
    }
}

/// Mutable view over the identity's authorization state
pub struct AuthorizationSurface<'a> {
    registry: &'a mut KeyRegistry,
    engine: &'a mut ApprovalEngine,
    log: &'a mut EventLog,
}

impl AuthorizationSurface<'_> {
    /// Replace the entry for `key`
    pub fn set_key(
        &mut self,
        caller: Address,
        key: KeyId,
        purposes: PurposeSet,
        key_type: KeyType,
    ) -> IdentityResult<()> {
        ensure_initialized(self.registry)?;
        let event = self.registry.set_key(caller, key, purposes, key_type)?;
        self.log.push(event);
        Ok(())
    }

    /// Merge one capability into `key`
    pub fn add_key(
        &mut self,
        caller: Address,
        key: KeyId,
        selector: u64,
        key_type: KeyType,
    ) -> IdentityResult<()> {
        ensure_initialized(self.registry)?;
        let event = self.registry.add_key(caller, key, selector, key_type)?;
        self.log.push(event);
        Ok(())
    }

    /// Delete `key`
    pub fn remove_key(&mut self, caller: Address, key: KeyId) -> IdentityResult<()> {
        ensure_initialized(self.registry)?;
        let event = self.registry.remove_key(caller, key)?;
        self.log.push(event);
        Ok(())
    }

    /// Clear one capability from `key`
    pub fn remove_key_purpose(
        &mut self,
        caller: Address,
        key: KeyId,
        selector: u64,
    ) -> IdentityResult<()> {
        ensure_initialized(self.registry)?;
        let event = self.registry.remove_key_purpose(caller, key, selector)?;
        self.log.push(event);
        Ok(())
    }

    /// Overwrite the approval threshold of one capability
    pub fn change_keys_required(
        &mut self,
        caller: Address,
        selector: u64,
        count: u32,
    ) -> IdentityResult<()> {
        ensure_initialized(self.registry)?;
        let event = self
            .engine
            .change_keys_required(self.registry, caller, selector, count)?;
        self.log.push(event);
        Ok(())
    }
}

impl SelfCallHandler for AuthorizationSurface<'_> {
    fn identity(&self) -> Address {
        self.registry.identity()
    }

    fn handle(&mut self, call: SelfCall) -> IdentityResult<()> {
        let me = self.registry.identity();
        match call {
            SelfCall::SetKey {
                key,
                purposes,
                key_type,
            } => self.set_key(me, key, purposes, key_type),
            SelfCall::AddKey {
                key,
                purpose,
                key_type,
            } => self.add_key(me, key, purpose.bits(), key_type),
            SelfCall::RemoveKey { key } => self.remove_key(me, key),
            SelfCall::RemoveKeyPurpose { key, purpose } => {
                self.remove_key_purpose(me, key, purpose.bits())
            }
            SelfCall::ChangeKeysRequired { purpose, count } => {
                self.change_keys_required(me, purpose.bits(), count)
            }
        }
    }
}

/// One identity: its keys, thresholds, executions and notifications
#[derive(Debug)]
pub struct Identity {
    config: IdentityConfig,
    registry: KeyRegistry,
    engine: ApprovalEngine,
    log: EventLog,
    dispatcher: ExecutionDispatcher,
}

impl Identity {
    /// Create an uninitialized identity whose external calls are no-ops
    pub fn new(address: Address, config: IdentityConfig) -> Self {
        Self::with_external(address, config, Box::new(NoopExternalCall))
    }

    /// Create an uninitialized identity with an external call collaborator
    pub fn with_external(
        address: Address,
        config: IdentityConfig,
        external: Box<dyn ExternalCall>,
    ) -> Self {
        let thresholds = ThresholdConfig::new(config.default_keys_required);
        Self {
            registry: KeyRegistry::new(address),
            engine: ApprovalEngine::new(address, thresholds),
            log: EventLog::default(),
            dispatcher: ExecutionDispatcher::new(external),
            config,
        }
    }

    /// The identity's own address
    pub fn address(&self) -> Address {
        self.registry.identity()
    }

    /// Configuration this identity was built with
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Whether `initialize` has run
    pub fn is_initialized(&self) -> bool {
        self.registry.is_initialized()
    }

    /// Install `caller`'s derived key as the first MANAGEMENT key
    pub fn initialize(&mut self, caller: Address) -> IdentityResult<KeyId> {
        self.registry.initialize(caller, self.config.default_key_type)
    }

    /// Read-only key registry
    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Read-only approval engine
    pub fn engine(&self) -> &ApprovalEngine {
        &self.engine
    }

    /// Purposes and type of `key`
    pub fn get_key(&self, key: &KeyId) -> KeyRecord {
        self.registry.get_key(key)
    }

    /// Whether `key` holds the single capability named by `selector`
    pub fn key_has_purpose(&self, key: &KeyId, selector: u64) -> IdentityResult<bool> {
        self.registry.key_has_purpose(key, selector)
    }

    /// All keys holding the single capability named by `selector`
    pub fn keys_by_purpose(&self, selector: u64) -> IdentityResult<BTreeSet<KeyId>> {
        self.registry.keys_by_purpose(selector)
    }

    /// Required approvals for the capability named by `selector`
    pub fn keys_required(&self, selector: u64) -> IdentityResult<u32> {
        self.engine.keys_required(selector)
    }

    /// Snapshot of execution `id`
    pub fn execution(&self, id: ExecutionId) -> Option<&PendingExecution> {
        self.engine.execution(id)
    }

    /// Executions still collecting approvals, ascending
    pub fn pending_executions(&self) -> Vec<ExecutionId> {
        self.engine.pending().collect()
    }

    /// Mutation surface for direct (non-executed) calls
    pub fn surface(&mut self) -> AuthorizationSurface<'_> {
        AuthorizationSurface {
            registry: &mut self.registry,
            engine: &mut self.engine,
            log: &mut self.log,
        }
    }

    /// Replace the entry for `key`
    pub fn set_key(
        &mut self,
        caller: Address,
        key: KeyId,
        purposes: PurposeSet,
        key_type: KeyType,
    ) -> IdentityResult<()> {
        self.surface().set_key(caller, key, purposes, key_type)
    }

    /// Merge one capability into `key`
    pub fn add_key(
        &mut self,
        caller: Address,
        key: KeyId,
        selector: u64,
        key_type: KeyType,
    ) -> IdentityResult<()> {
        self.surface().add_key(caller, key, selector, key_type)
    }

    /// Delete `key`
    pub fn remove_key(&mut self, caller: Address, key: KeyId) -> IdentityResult<()> {
        self.surface().remove_key(caller, key)
    }

    /// Clear one capability from `key`
    pub fn remove_key_purpose(
        &mut self,
        caller: Address,
        key: KeyId,
        selector: u64,
    ) -> IdentityResult<()> {
        self.surface().remove_key_purpose(caller, key, selector)
    }

    /// Overwrite the approval threshold of one capability
    pub fn change_keys_required(
        &mut self,
        caller: Address,
        selector: u64,
        count: u32,
    ) -> IdentityResult<()> {
        self.surface().change_keys_required(caller, selector, count)
    }

    /// Request a call on the identity's behalf
    ///
    /// A caller holding the capability that governs the target also casts
    /// the first approval, which dispatches at once when the threshold is 1.
    /// If that dispatch fails the execution still exists and is Executed; the
    /// failure is returned as `DispatchFailed`.
    pub fn execute(
        &mut self,
        caller: Address,
        target: Address,
        value: u128,
        payload: impl Into<Vec<u8>>,
    ) -> IdentityResult<ExecutionId> {
        ensure_initialized(&self.registry)?;
        let (id, event) = self
            .engine
            .request(&self.registry, caller, target, value, payload.into())?;
        self.log.push(event);

        if self.engine.is_eligible(&self.registry, &caller, id) {
            self.approve(caller, id, true)?;
        }
        Ok(id)
    }

    /// Vote on a Pending execution
    ///
    /// Returns `true` when this vote dispatched the execution.
    pub fn approve(
        &mut self,
        caller: Address,
        id: ExecutionId,
        decision: bool,
    ) -> IdentityResult<bool> {
        ensure_initialized(&self.registry)?;
        let outcome = self.engine.approve(&self.registry, caller, id, decision)?;
        self.log.push(outcome.event);

        match outcome.vote {
            Vote::Ready(request) => {
                self.dispatch(request)?;
                Ok(true)
            }
            Vote::Recorded { .. } | Vote::Rejected => Ok(false),
        }
    }

    fn dispatch(&mut self, request: DispatchRequest) -> IdentityResult<()> {
        let mut surface = AuthorizationSurface {
            registry: &mut self.registry,
            engine: &mut self.engine,
            log: &mut self.log,
        };
        let result = self.dispatcher.dispatch(&mut surface, &request);

        match result {
            Ok(output) => {
                info!(id = %request.id, target = %request.target, "execution dispatched");
                self.log.push(IdentityEvent::Executed {
                    id: request.id,
                    target: request.target,
                    value: request.value,
                    output,
                });
                Ok(())
            }
            Err(err) => {
                let reason = match &err {
                    IdentityError::DispatchFailed { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                self.log.push(IdentityEvent::ExecutionFailed {
                    id: request.id,
                    target: request.target,
                    value: request.value,
                    reason,
                });
                Err(err)
            }
        }
    }

    /// Buffered notifications in emission order
    pub fn events(&self) -> &[EventRecord] {
        self.log.records()
    }

    /// Take buffered notifications, leaving the buffer empty
    pub fn take_events(&mut self) -> Vec<EventRecord> {
        self.log.drain()
    }
}
