//! Approval Engine
//!
//! Tracks every requested execution and the n-of-m vote on it.
//!
//! # Execution Lifecycle
//!
//! ```text
//! Pending ──approve(true), tally >= required──▶ Executed
//!    │
//!    └──────approve(false)─────────────────────▶ Rejected
//! ```
//!
//! Executed and Rejected are terminal: any further vote fails with
//! `UnknownOrClosedExecution`. The engine only decides; it never performs the
//! call. A vote that reaches the threshold hands back a [`DispatchRequest`]
//! and the caller runs it after the engine's state has committed.
//!
//! # Applicable Purpose
//!
//! An execution targeting the identity itself reconfigures the identity and
//! is voted on by MANAGEMENT keys against the MANAGEMENT threshold. Any other
//! target is voted on by EXECUTION keys against the EXECUTION threshold.

use crate::registry::KeyRegistry;
use crate::thresholds::ThresholdConfig;
use indexmap::IndexSet;
use keystone_core::{
    Address, ExecutionId, IdentityError, IdentityEvent, IdentityResult, KeyId, Purpose,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Position of an execution in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    /// Collecting approvals
    Pending,
    /// Threshold reached and dispatched
    Executed,
    /// Closed by a rejecting vote
    Rejected,
}

impl ExecutionState {
    /// Whether no further votes are accepted
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionState::Pending)
    }
}

/// A requested call and the votes cast on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingExecution {
    /// Execution identifier
    pub id: ExecutionId,
    /// Principal that requested the execution
    pub requester: Address,
    /// Call target
    pub target: Address,
    /// Amount attached to the call
    pub value: u128,
    /// Opaque call data
    pub payload: Vec<u8>,
    /// Capability whose holders vote and whose threshold applies
    pub purpose: Purpose,
    /// Keys that approved, in vote order
    pub approved_by: IndexSet<KeyId>,
    /// Lifecycle position
    pub state: ExecutionState,
}

impl PendingExecution {
    /// Number of approving keys recorded, including revoked ones
    pub fn approvals(&self) -> usize {
        self.approved_by.len()
    }

    /// Number of approving keys that still hold the applicable capability
    pub fn standing_approvals(&self, registry: &KeyRegistry) -> usize {
        self.approved_by
            .iter()
            .filter(|key| registry.holds(key, self.purpose))
            .count()
    }

    fn dispatch_request(&self) -> DispatchRequest {
        DispatchRequest {
            id: self.id,
            target: self.target,
            value: self.value,
            payload: self.payload.clone(),
        }
    }
}

/// Call to perform once an execution is approved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    /// Execution being dispatched
    pub id: ExecutionId,
    /// Call target
    pub target: Address,
    /// Amount attached to the call
    pub value: u128,
    /// Opaque call data
    pub payload: Vec<u8>,
}

/// Effect of a single vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vote {
    /// Approval counted, threshold not yet met
    Recorded {
        /// Approvals so far
        approvals: usize,
        /// Approvals required
        required: u32,
    },
    /// Execution closed by this vote
    Rejected,
    /// Threshold met; the execution is now Executed and must be dispatched
    Ready(DispatchRequest),
}

/// Result of [`ApprovalEngine::approve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalOutcome {
    /// `Approved` notification for the vote
    pub event: IdentityEvent,
    /// What the vote did
    pub vote: Vote,
}

/// Owner of pending executions and approval thresholds
#[derive(Debug, Clone)]
pub struct ApprovalEngine {
    identity: Address,
    thresholds: ThresholdConfig,
    executions: BTreeMap<ExecutionId, PendingExecution>,
    next_id: ExecutionId,
}

impl ApprovalEngine {
    /// Create an engine for the identity at `identity`
    pub fn new(identity: Address, thresholds: ThresholdConfig) -> Self {
        Self {
            identity,
            thresholds,
            executions: BTreeMap::new(),
            next_id: ExecutionId::FIRST,
        }
    }

    /// Capability that governs an execution aimed at `target`
    pub fn applicable_purpose(&self, target: &Address) -> Purpose {
        if *target == self.identity {
            Purpose::MANAGEMENT
        } else {
            Purpose::EXECUTION
        }
    }

    /// Current threshold table
    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Required approvals for the capability named by `selector`
    pub fn keys_required(&self, selector: u64) -> IdentityResult<u32> {
        Purpose::from_bits(selector).map(|purpose| self.thresholds.get(purpose))
    }

    /// Overwrite the threshold for one capability
    pub fn change_keys_required(
        &mut self,
        registry: &KeyRegistry,
        caller: Address,
        selector: u64,
        count: u32,
    ) -> IdentityResult<IdentityEvent> {
        registry.authorize_management(&caller)?;
        let purpose = Purpose::from_bits(selector)?;
        self.thresholds.set(purpose, count)?;
        info!(purpose = %purpose, count, by = %caller, "keys required changed");
        Ok(IdentityEvent::KeysRequiredChanged { purpose, count })
    }

    /// Record a new Pending execution
    ///
    /// The caller must be the identity or hold EXECUTION or MANAGEMENT.
    pub fn request(
        &mut self,
        registry: &KeyRegistry,
        caller: Address,
        target: Address,
        value: u128,
        payload: Vec<u8>,
    ) -> IdentityResult<(ExecutionId, IdentityEvent)> {
        if !registry.is_authorized(&caller, Purpose::EXECUTION)
            && !registry.is_authorized(&caller, Purpose::MANAGEMENT)
        {
            debug!(caller = %caller, "execution request refused");
            return Err(IdentityError::Unauthorized {
                caller,
                required: Purpose::EXECUTION,
            });
        }

        let id = self.next_id;
        self.next_id = id.next();
        let purpose = self.applicable_purpose(&target);
        let event = IdentityEvent::ExecutionRequested {
            id,
            target,
            value,
            payload: payload.clone(),
        };
        self.executions.insert(
            id,
            PendingExecution {
                id,
                requester: caller,
                target,
                value,
                payload,
                purpose,
                approved_by: IndexSet::new(),
                state: ExecutionState::Pending,
            },
        );
        info!(
            id = %id,
            target = %target,
            value,
            purpose = %purpose,
            by = %caller,
            "execution requested"
        );
        Ok((id, event))
    }

    /// Whether `caller` holds the capability that governs execution `id`
    pub fn is_eligible(&self, registry: &KeyRegistry, caller: &Address, id: ExecutionId) -> bool {
        self.executions
            .get(&id)
            .is_some_and(|execution| registry.holds(&caller.key_id(), execution.purpose))
    }

    /// Cast a vote on a Pending execution
    ///
    /// Checks run in order: open execution, caller capability, duplicate vote.
    /// A failing check leaves the execution untouched.
    pub fn approve(
        &mut self,
        registry: &KeyRegistry,
        caller: Address,
        id: ExecutionId,
        decision: bool,
    ) -> IdentityResult<ApprovalOutcome> {
        let execution = match self.executions.get_mut(&id) {
            Some(execution) if !execution.state.is_terminal() => execution,
            _ => return Err(IdentityError::UnknownOrClosedExecution { id }),
        };

        let key = caller.key_id();
        if !registry.holds(&key, execution.purpose) {
            debug!(id = %id, caller = %caller, required = %execution.purpose, "vote refused");
            return Err(IdentityError::Unauthorized {
                caller,
                required: execution.purpose,
            });
        }
        if execution.approved_by.contains(&key) {
            return Err(IdentityError::DuplicateApproval { id, key });
        }

        let event = IdentityEvent::Approved {
            id,
            key,
            approved: decision,
        };

        if !decision {
            execution.state = ExecutionState::Rejected;
            info!(id = %id, key = %key, "execution rejected");
            return Ok(ApprovalOutcome {
                event,
                vote: Vote::Rejected,
            });
        }

        execution.approved_by.insert(key);
        // keys that lost the capability since voting no longer count
        let approvals = execution.standing_approvals(registry);
        let required = self.thresholds.get(execution.purpose);
        if approvals >= required as usize {
            execution.state = ExecutionState::Executed;
            info!(id = %id, approvals, required, "execution approved");
            Ok(ApprovalOutcome {
                event,
                vote: Vote::Ready(execution.dispatch_request()),
            })
        } else {
            debug!(id = %id, approvals, required, "approval recorded");
            Ok(ApprovalOutcome {
                event,
                vote: Vote::Recorded {
                    approvals,
                    required,
                },
            })
        }
    }

    /// Snapshot of execution `id` in any state
    pub fn execution(&self, id: ExecutionId) -> Option<&PendingExecution> {
        self.executions.get(&id)
    }

    /// Ids of executions still collecting approvals, ascending
    pub fn pending(&self) -> impl Iterator<Item = ExecutionId> + '_ {
        self.executions
            .values()
            .filter(|execution| execution.state == ExecutionState::Pending)
            .map(|execution| execution.id)
    }

    /// Id the next request will receive
    pub fn next_id(&self) -> ExecutionId {
        self.next_id
    }
}
