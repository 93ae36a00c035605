//! # Keystone Identity - Key Registry and n-of-m Execution
//!
//! Stateful half of Keystone: the purpose-keyed registry, per-purpose
//! approval thresholds, the execution approval engine and the dispatcher that
//! performs approved calls.
//!
//! ## What Belongs Here
//!
//! - Key registry mutations gated on MANAGEMENT
//! - Threshold configuration per capability
//! - Pending execution bookkeeping and vote tallying
//! - Routing approved calls to the identity itself or to an external target
//!
//! ## What Does NOT Belong Here
//!
//! - Identifier, purpose and error types (belong in keystone-core)
//! - Signature verification or key material; keys are opaque 32-byte ids
//! - Test fixtures (belong in keystone-testkit)
//!
//! ## Design Principles
//!
//! - One identity is one [`Identity`] value; every operation takes
//!   `&mut self` and completes before the next begins
//! - The engine decides and commits state before any call is dispatched
//! - Approved self-calls re-enter the same authorization checks as direct
//!   calls, with the identity's address as caller

#![forbid(unsafe_code)]

/// Self-call payload encoding
pub mod call;

/// Approved call routing
pub mod dispatch;

/// Pending executions and vote tallying
pub mod engine;

/// Identity facade composing registry, engine and dispatcher
pub mod identity;

/// Purpose-keyed key registry
pub mod registry;

/// Per-purpose approval thresholds
pub mod thresholds;

pub use call::SelfCall;
pub use dispatch::{ExecutionDispatcher, ExternalCall, NoopExternalCall, SelfCallHandler};
pub use engine::{
    ApprovalEngine, ApprovalOutcome, DispatchRequest, ExecutionState, PendingExecution, Vote,
};
pub use identity::{AuthorizationSurface, EventLog, Identity};
pub use registry::{KeyRecord, KeyRegistry};
pub use thresholds::ThresholdConfig;
