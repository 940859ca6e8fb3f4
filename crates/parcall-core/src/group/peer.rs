use std::fmt;

use crate::error::ParCallResult;
use crate::identity::{IdentityDirectory, LocalIdentity};

/// One dial target of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Canonical dial string, unique within the group
    target: String,
    /// Identity the call towards this peer is placed from
    identity: LocalIdentity,
}

impl Peer {
    pub fn new(target: impl Into<String>, identity: LocalIdentity) -> Self {
        Self {
            target: target.into(),
            identity,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target)
    }
}

/// Canonical dial string for an address.
///
/// The address is completed by the identity (scheme and domain defaults).
/// With a display name the result is `"<display name>" <uri>`.
pub fn canonical_target(
    directory: &dyn IdentityDirectory,
    identity: &LocalIdentity,
    address: &str,
    display_name: Option<&str>,
) -> ParCallResult<String> {
    let uri = directory.complete_uri(identity, address)?;
    Ok(match display_name.map(str::trim).filter(|d| !d.is_empty()) {
        Some(name) => format!("\"{}\" <{}>", name, uri),
        None => uri,
    })
}
