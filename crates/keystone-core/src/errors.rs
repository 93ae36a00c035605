//! Unified error system for Keystone
//!
//! Every failure an identity operation can report is a variant of
//! [`IdentityError`]. Errors are local and synchronous: nothing here is
//! retried, and a call that returns an error has left all identity state
//! exactly as it found it. The one documented exception is
//! [`IdentityError::DispatchFailed`], which is reported after the approval
//! bookkeeping has already committed.

use crate::identifiers::{Address, ExecutionId, KeyId};
use crate::purpose::Purpose;
use serde::{Deserialize, Serialize};

/// Unified error type for all identity operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum IdentityError {
    /// Zero, malformed, or absent key identifier
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// What was wrong with the key
        message: String,
    },

    /// Zero or multi-bit purpose used where exactly one capability is required
    #[error("Invalid purpose selector {selector:#x}: exactly one capability bit must be set")]
    InvalidPurposeSelector {
        /// Raw selector as supplied by the caller
        selector: u64,
    },

    /// Caller lacks the capability the operation requires
    #[error("Unauthorized: {caller} lacks {required} capability")]
    Unauthorized {
        /// Principal that made the call
        caller: Address,
        /// Capability that would have allowed the call
        required: Purpose,
    },

    /// `initialize` was called on an identity that already has a manager
    #[error("Identity already initialized")]
    AlreadyInitialized,

    /// A mutation was attempted before `initialize`
    #[error("Identity not initialized")]
    NotInitialized,

    /// Execution id is unknown, or already Executed or Rejected
    #[error("Unknown or closed execution: {id}")]
    UnknownOrClosedExecution {
        /// Execution that was addressed
        id: ExecutionId,
    },

    /// Key already voted on this execution
    #[error("Duplicate approval of {id} by key {key}")]
    DuplicateApproval {
        /// Execution being approved
        id: ExecutionId,
        /// Key that already approved
        key: KeyId,
    },

    /// Required approval count must be positive
    #[error("Invalid threshold {count} for {purpose}")]
    InvalidThreshold {
        /// Purpose whose threshold was being changed
        purpose: Purpose,
        /// Rejected count
        count: u32,
    },

    /// Approval succeeded but the approved action itself failed
    #[error("Dispatch of {id} failed: {reason}")]
    DispatchFailed {
        /// Execution that was dispatched
        id: ExecutionId,
        /// Failure reported by the target
        reason: String,
    },

    /// Key already holds the purpose being added
    #[error("Key {key} already holds {purpose}")]
    KeyConflict {
        /// Key being extended
        key: KeyId,
        /// Purpose it already holds
        purpose: Purpose,
    },

    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },

    /// Encoding or decoding failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the codec failure
        message: String,
    },
}

impl IdentityError {
    /// Create an invalid key error
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey { .. } => "invalid_key",
            Self::InvalidPurposeSelector { .. } => "invalid_purpose_selector",
            Self::Unauthorized { .. } => "unauthorized",
            Self::AlreadyInitialized => "already_initialized",
            Self::NotInitialized => "not_initialized",
            Self::UnknownOrClosedExecution { .. } => "unknown_or_closed_execution",
            Self::DuplicateApproval { .. } => "duplicate_approval",
            Self::InvalidThreshold { .. } => "invalid_threshold",
            Self::DispatchFailed { .. } => "dispatch_failed",
            Self::KeyConflict { .. } => "key_conflict",
            Self::Config { .. } => "config",
            Self::Serialization { .. } => "serialization",
        }
    }
}

/// Standard Result type for identity operations
pub type IdentityResult<T> = std::result::Result<T, IdentityError>;

impl From<toml::de::Error> for IdentityError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<std::io::Error> for IdentityError {
    fn from(err: std::io::Error) -> Self {
        Self::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IdentityError::InvalidPurposeSelector { selector: 3 };
        assert_eq!(
            err.to_string(),
            "Invalid purpose selector 0x3: exactly one capability bit must be set"
        );

        let err = IdentityError::invalid_key("zero identifier");
        assert_eq!(err.to_string(), "Invalid key: zero identifier");
    }

    #[test]
    fn test_unauthorized_names_capability() {
        let err = IdentityError::Unauthorized {
            caller: Address::new([0xab; 20]),
            required: Purpose::MANAGEMENT,
        };
        let text = err.to_string();
        assert!(text.contains("MANAGEMENT"));
        assert!(text.contains("abababab"));
    }

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            IdentityError::invalid_key("x"),
            IdentityError::InvalidPurposeSelector { selector: 0 },
            IdentityError::AlreadyInitialized,
            IdentityError::NotInitialized,
            IdentityError::UnknownOrClosedExecution {
                id: ExecutionId::new(1),
            },
            IdentityError::InvalidThreshold {
                purpose: Purpose::EXECUTION,
                count: 0,
            },
            IdentityError::config("x"),
            IdentityError::serialization("x"),
        ];
        let mut codes: Vec<_> = errors.iter().map(IdentityError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.toml");
        let err = IdentityError::from(io_err);
        assert!(matches!(err, IdentityError::Config { .. }));
    }
}
