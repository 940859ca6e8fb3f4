//! Configuration for the parallel call coordinator
//!
//! Loaded from TOML; every field has a default so an empty file is a valid
//! (if account-less) configuration.
//!
//! ```rust
//! use rvoip_parcall_core::ParCallConfig;
//!
//! let config = ParCallConfig::from_toml_str(r#"
//!     event_capacity = 64
//!
//!     [[accounts]]
//!     aor = "sip:alice@example.com"
//!
//!     [supersede]
//!     status_code = 0
//!     reason = "Call completed elsewhere"
//! "#).unwrap();
//!
//! assert_eq!(config.accounts.len(), 1);
//! assert_eq!(config.supersede.reason.as_deref(), Some("Call completed elsewhere"));
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ParCallError, ParCallResult};
use crate::identity::{AccountTable, LocalIdentity};
use crate::types::MediaDirection;

/// Reason reported for calls that lost the race
pub const REJECTED_LOCALLY: &str = "Rejected locally";

/// Largest accepted `event_capacity`; the broadcast buffer is allocated up front
pub const MAX_EVENT_CAPACITY: usize = 65_536;

/// Top level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParCallConfig {
    /// Local accounts calls can be placed from
    pub accounts: Vec<AccountConfig>,

    /// Media directions used when a parallel call does not name them
    pub media: MediaDefaults,

    /// How calls that lost the race are hung up
    pub supersede: HangupPolicy,

    /// How calls are hung up by an explicit group hangup
    pub group_hangup: HangupPolicy,

    /// Capacity of the observer event broadcast channel
    pub event_capacity: usize,
}

/// One local account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountConfig {
    /// Address of record, e.g. `sip:alice@example.com`
    pub aor: String,
}

/// Default media directions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MediaDefaults {
    pub audio: MediaDirection,
    pub video: MediaDirection,
}

/// Status code and reason passed to the call engine on hangup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HangupPolicy {
    /// SIP status code, 0 lets the call engine pick (CANCEL or BYE)
    pub status_code: u16,
    pub reason: Option<String>,
}

impl Default for ParCallConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            media: MediaDefaults::default(),
            supersede: HangupPolicy::superseded(),
            group_hangup: HangupPolicy::default(),
            event_capacity: 256,
        }
    }
}

impl Default for MediaDefaults {
    fn default() -> Self {
        Self {
            audio: MediaDirection::SendRecv,
            video: MediaDirection::SendRecv,
        }
    }
}

impl Default for HangupPolicy {
    fn default() -> Self {
        Self {
            status_code: 0,
            reason: None,
        }
    }
}

impl HangupPolicy {
    /// Policy applied to siblings of the call that answered first
    pub fn superseded() -> Self {
        Self {
            status_code: 0,
            reason: Some(REJECTED_LOCALLY.to_string()),
        }
    }
}

impl ParCallConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> ParCallResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| ParCallError::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> ParCallResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ParCallError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_account(mut self, aor: impl Into<String>) -> Self {
        self.accounts.push(AccountConfig { aor: aor.into() });
        self
    }

    pub fn with_media_defaults(mut self, audio: MediaDirection, video: MediaDirection) -> Self {
        self.media = MediaDefaults { audio, video };
        self
    }

    pub fn with_supersede_policy(mut self, policy: HangupPolicy) -> Self {
        self.supersede = policy;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check value ranges and account syntax
    pub fn validate(&self) -> ParCallResult<()> {
        if self.event_capacity == 0 || self.event_capacity > MAX_EVENT_CAPACITY {
            return Err(ParCallError::config(format!(
                "event_capacity must be between 1 and {}, got {}",
                MAX_EVENT_CAPACITY, self.event_capacity
            )));
        }
        for (name, policy) in [("supersede", &self.supersede), ("group_hangup", &self.group_hangup)] {
            if policy.status_code != 0 && !(300..=699).contains(&policy.status_code) {
                return Err(ParCallError::config(format!(
                    "{}.status_code must be 0 or a final status 300-699, got {}",
                    name, policy.status_code
                )));
            }
        }
        for account in &self.accounts {
            LocalIdentity::parse(&account.aor)?;
        }
        Ok(())
    }

    /// Build the account table for identity lookup
    pub fn account_table(&self) -> ParCallResult<AccountTable> {
        AccountTable::from_aors(self.accounts.iter().map(|a| a.aor.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParCallConfig::default();
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.media.audio, MediaDirection::SendRecv);
        assert_eq!(config.supersede.reason.as_deref(), Some(REJECTED_LOCALLY));
        assert_eq!(config.group_hangup.reason, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = ParCallConfig::from_toml_str("").unwrap();
        assert!(config.accounts.is_empty());
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_toml_media_and_accounts() {
        let config = ParCallConfig::from_toml_str(
            r#"
            [[accounts]]
            aor = "sip:alice@example.com"

            [[accounts]]
            aor = "sip:ops@pbx.local:5080"

            [media]
            video = "inactive"
            "#,
        )
        .unwrap();

        assert_eq!(config.media.audio, MediaDirection::SendRecv);
        assert_eq!(config.media.video, MediaDirection::Inactive);
        let table = config.account_table().unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_validation_failures() {
        let zero = ParCallConfig::new().with_event_capacity(0);
        assert!(matches!(zero.validate(), Err(ParCallError::Configuration { .. })));

        let huge = ParCallConfig::new().with_event_capacity(usize::MAX);
        assert!(matches!(huge.validate(), Err(ParCallError::Configuration { .. })));
        let largest = ParCallConfig::new().with_event_capacity(MAX_EVENT_CAPACITY);
        assert!(largest.validate().is_ok());

        let provisional = ParCallConfig::new().with_supersede_policy(HangupPolicy {
            status_code: 180,
            reason: None,
        });
        assert!(provisional.validate().is_err());

        let decline = ParCallConfig::new().with_supersede_policy(HangupPolicy {
            status_code: 603,
            reason: Some("Decline".to_string()),
        });
        assert!(decline.validate().is_ok());

        let bad_account = ParCallConfig::new().with_account("alice@example.com");
        assert!(bad_account.validate().is_err());

        assert!(ParCallConfig::from_toml_str("event_capacity = \"lots\"").is_err());
    }
}
