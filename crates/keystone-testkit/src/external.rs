//! Recording external call collaborator

use keystone_core::Address;
use keystone_identity::ExternalCall;
use std::sync::{Arc, Mutex};

/// One call observed by [`RecordingExternalCall`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Call target
    pub target: Address,
    /// Attached amount
    pub value: u128,
    /// Call data
    pub payload: Vec<u8>,
}

/// External collaborator that records calls and answers with fixed output
///
/// Clones share the same log, so a test can keep one handle while the
/// identity owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingExternalCall {
    calls: Arc<Mutex<Vec<CallRecord>>>,
    output: Vec<u8>,
    failure: Option<String>,
}

impl RecordingExternalCall {
    /// Succeeding collaborator returning no data
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed with `output`
    pub fn returning(output: impl Into<Vec<u8>>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    /// Fail every call with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Calls observed so far, including failed ones
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    /// Boxed clone sharing this log, ready for `Identity::with_external`
    pub fn boxed(&self) -> Box<dyn ExternalCall> {
        Box::new(self.clone())
    }
}

impl ExternalCall for RecordingExternalCall {
    fn call(&mut self, target: Address, value: u128, payload: &[u8]) -> Result<Vec<u8>, String> {
        self.calls.lock().unwrap().push(CallRecord {
            target,
            value,
            payload: payload.to_vec(),
        });
        match &self.failure {
            Some(reason) => Err(reason.clone()),
            None => Ok(self.output.clone()),
        }
    }
}
