//! Error types for parallel call groups
//!
//! Errors fall into two groups:
//!
//! - **Validation errors** (`AlreadyExists`, `NotFound`, `DuplicateTarget`,
//!   `InvalidDirection`, `UnknownIdentity`, `InvalidTarget`, `InvalidCommand`)
//!   are returned to the caller of a single command and abort only that
//!   command.
//! - **Placement errors** (`PlacementFailed`, `DuplicateCallRecord`) happen per
//!   peer while a group is fanned out. The dispatcher logs them, reports them
//!   and carries on with the remaining peers.
//!
//! Nothing in this crate is fatal to the process; the worst outcome is an
//! empty or partial parallel call.
//!
//! ```rust
//! use rvoip_parcall_core::ParCallError;
//!
//! let err = ParCallError::not_found("sales");
//! assert!(err.is_validation_error());
//! assert_eq!(err.to_string(), "call group sales does not exist");
//! ```

use thiserror::Error;

use crate::types::CallId;

/// Result type for parallel call operations
pub type ParCallResult<T> = Result<T, ParCallError>;

/// Errors returned by the parallel call coordinator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParCallError {
    /// A group with this name is already registered
    #[error("call group {name} already exists")]
    AlreadyExists { name: String },

    /// No group with this name is registered
    #[error("call group {name} does not exist")]
    NotFound { name: String },

    /// The canonical target is already a peer of the group
    #[error("{target} already a target of {group}")]
    DuplicateTarget { group: String, target: String },

    /// Audio and video were both requested as inactive
    #[error("audio and video must not be inactive at the same time")]
    InvalidDirection,

    /// The call engine refused to place a call towards one peer
    #[error("failed to place call to {target}: {reason}")]
    PlacementFailed { target: String, reason: String },

    /// No local account can place calls towards the address
    #[error("could not find UA for {address}")]
    UnknownIdentity { address: String },

    /// The dial target is not a usable SIP URI
    #[error("invalid target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    /// The call engine handed out a call-id that is still tracked
    #[error("call {call_id} is already tracked")]
    DuplicateCallRecord { call_id: CallId },

    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Malformed operator command, carries the usage text
    #[error("{usage}")]
    InvalidCommand { usage: String },

    /// The coordinator loop is no longer running
    #[error("parallel call service is not running")]
    ServiceStopped,
}

impl ParCallError {
    /// Create an AlreadyExists error
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    /// Create a NotFound error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a DuplicateTarget error
    pub fn duplicate_target(group: impl Into<String>, target: impl Into<String>) -> Self {
        Self::DuplicateTarget {
            group: group.into(),
            target: target.into(),
        }
    }

    /// Create a PlacementFailed error
    pub fn placement_failed(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PlacementFailed {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create an UnknownIdentity error
    pub fn unknown_identity(address: impl Into<String>) -> Self {
        Self::UnknownIdentity {
            address: address.into(),
        }
    }

    /// Create an InvalidTarget error
    pub fn invalid_target(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an InvalidCommand error carrying usage text
    pub fn usage(usage: impl Into<String>) -> Self {
        Self::InvalidCommand {
            usage: usage.into(),
        }
    }

    /// Whether this error rejects a command before anything was changed
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists { .. }
                | Self::NotFound { .. }
                | Self::DuplicateTarget { .. }
                | Self::InvalidDirection
                | Self::UnknownIdentity { .. }
                | Self::InvalidTarget { .. }
                | Self::InvalidCommand { .. }
        )
    }

    /// Whether this error only affects a single peer of a fan-out
    pub fn is_placement_error(&self) -> bool {
        matches!(
            self,
            Self::PlacementFailed { .. } | Self::DuplicateCallRecord { .. }
        )
    }
}

/// Errors reported by the call engine behind [`crate::control::CallControl`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallControlError {
    /// The target could not be dialed
    #[error("target unreachable: {reason}")]
    Unreachable { reason: String },

    /// The call is unknown to the engine (already gone)
    #[error("call {call_id} not found")]
    CallNotFound { call_id: CallId },

    /// Any other engine failure
    #[error("call engine error: {0}")]
    Engine(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(ParCallError::already_exists("g").is_validation_error());
        assert!(ParCallError::InvalidDirection.is_validation_error());
        assert!(!ParCallError::ServiceStopped.is_validation_error());

        let placement = ParCallError::placement_failed("sip:a@x", "busy");
        assert!(placement.is_placement_error());
        assert!(!placement.is_validation_error());
    }

    #[test]
    fn test_messages_match_operator_wording() {
        assert_eq!(
            ParCallError::duplicate_target("G", "sip:a@x").to_string(),
            "sip:a@x already a target of G"
        );
        assert_eq!(
            ParCallError::unknown_identity("xmpp:bob@x").to_string(),
            "could not find UA for xmpp:bob@x"
        );
    }
}
