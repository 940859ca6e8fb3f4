//! Local identities used to place calls
//!
//! Every peer of a group is dialed from a local identity (an account / user
//! agent). The [`IdentityDirectory`] trait is the seam towards whatever owns
//! the accounts; [`AccountTable`] is the implementation built from
//! configuration.
//!
//! Addresses are parsed with the SIP URI parser of `rvoip-sip-core`. Partial
//! targets (`bob`, `sip:bob`) are completed on the parsed [`Uri`].

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use rvoip_sip_core::types::uri::{Host, Scheme, Uri};

use crate::error::{ParCallError, ParCallResult};

const DEFAULT_SIP_PORT: u16 = 5060;

/// A local account that can originate calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    /// Address of record, e.g. `sip:alice@example.com`
    pub aor: Uri,
}

impl LocalIdentity {
    /// Parse an address of record such as `sip:alice@example.com:5080`
    pub fn parse(aor: &str) -> ParCallResult<Self> {
        let address = addr_spec(aor);
        let (scheme, rest) = split_scheme(address)
            .ok_or_else(|| ParCallError::config(format!("account {} has no sip: scheme", aor)))?;
        if !is_sip(&scheme) {
            return Err(ParCallError::config(format!(
                "account {} uses unsupported scheme {}",
                aor, scheme
            )));
        }

        let uri = parse_sip(&scheme, rest)
            .map_err(|reason| ParCallError::config(format!("account {}: {}", aor, reason)))?;
        Ok(Self { aor: uri })
    }

    /// Domain or address of the account, without brackets
    pub fn domain(&self) -> String {
        self.aor.host.to_string()
    }
}

impl fmt::Display for LocalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.aor)
    }
}

/// Lookup of the local identity that places calls towards a target
pub trait IdentityDirectory: Send + Sync + fmt::Debug {
    /// Find the identity used to call `target`, `None` if nothing matches
    fn find_identity(&self, target: &str) -> Option<LocalIdentity>;

    /// Complete a possibly partial target into a dialable URI.
    ///
    /// `bob` becomes `sip:bob@<account domain>`, `10.0.0.7` becomes
    /// `sip:10.0.0.7`, a full URI is only normalized. Targets that do not
    /// parse as a SIP URI are rejected.
    fn complete_uri(&self, identity: &LocalIdentity, target: &str) -> ParCallResult<String> {
        complete_uri(identity, target)
    }
}

/// Accounts known to this process, in configuration order
#[derive(Debug, Clone, Default)]
pub struct AccountTable {
    accounts: Vec<LocalIdentity>,
}

impl AccountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from address-of-record strings
    pub fn from_aors<I, S>(aors: I) -> ParCallResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for aor in aors {
            table.add(LocalIdentity::parse(aor.as_ref())?);
        }
        Ok(table)
    }

    pub fn add(&mut self, identity: LocalIdentity) {
        self.accounts.push(identity);
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalIdentity> {
        self.accounts.iter()
    }
}

impl IdentityDirectory for AccountTable {
    fn find_identity(&self, target: &str) -> Option<LocalIdentity> {
        let address = addr_spec(target);
        let domain = match split_scheme(address) {
            Some((scheme, rest)) if is_sip(&scheme) => target_domain(rest),
            Some(_) => return None,
            None => target_domain(address),
        };

        self.accounts
            .iter()
            .find(|account| {
                domain
                    .as_deref()
                    .map(|d| d.eq_ignore_ascii_case(&account.domain()))
                    .unwrap_or(false)
            })
            .or_else(|| self.accounts.first())
            .cloned()
    }
}

/// Complete `target` with scheme and account domain where missing
pub fn complete_uri(identity: &LocalIdentity, target: &str) -> ParCallResult<String> {
    let invalid = |reason: String| ParCallError::invalid_target(target.trim(), reason);

    let address = addr_spec(target);
    let (scheme, rest) = split_scheme(address).unwrap_or((Scheme::Sip, address));
    if !is_sip(&scheme) {
        return Err(invalid(format!("unsupported scheme {}", scheme)));
    }
    let mut uri = parse_sip(&scheme, rest).map_err(invalid)?;

    // Without a user part the name is a user at the account's domain
    if uri.user.is_none() && !is_ip_host(&uri.host) {
        if uri.port.is_some_and(|port| port != 0) {
            return Err(invalid("port given without a host".to_string()));
        }
        uri.user = Some(uri.host.to_string());
        uri.host = identity.aor.host.clone();
        uri.port = identity.aor.port.filter(|port| *port != DEFAULT_SIP_PORT);
    }

    Ok(uri.to_string())
}

/// The address inside `"Name" <...>`, or the trimmed input
fn addr_spec(input: &str) -> &str {
    let input = input.trim();
    match (input.find('<'), input.rfind('>')) {
        (Some(start), Some(end)) if start < end => input[start + 1..end].trim(),
        _ => input,
    }
}

/// Split off a leading `scheme:`. A bare `host:port` has no scheme.
fn split_scheme(address: &str) -> Option<(Scheme, &str)> {
    let (prefix, rest) = address.split_once(':')?;
    match prefix.to_ascii_lowercase().as_str() {
        "sip" => Some((Scheme::Sip, rest)),
        "sips" => Some((Scheme::Sips, rest)),
        "tel" => Some((Scheme::Tel, rest)),
        other => {
            let is_name = !other.is_empty() && other.chars().all(|c| c.is_ascii_alphabetic());
            let is_port = !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit());
            (is_name && !is_port).then(|| (Scheme::Custom(other.to_string()), rest))
        }
    }
}

fn is_sip(scheme: &Scheme) -> bool {
    matches!(scheme, Scheme::Sip | Scheme::Sips)
}

/// Parse `rest` as the part of a SIP URI after the scheme
fn parse_sip(scheme: &Scheme, rest: &str) -> Result<Uri, String> {
    Uri::from_str(&format!("{}:{}", scheme, rest)).map_err(|e| e.to_string())
}

fn is_ip_host(host: &Host) -> bool {
    match host {
        Host::Address(_) => true,
        Host::Domain(domain) => domain.parse::<IpAddr>().is_ok(),
    }
}

/// Domain of a `user@domain` target, if it names one
fn target_domain(rest: &str) -> Option<String> {
    let uri = parse_sip(&Scheme::Sip, rest).ok()?;
    uri.user.as_ref()?;
    Some(uri.host.to_string())
}
