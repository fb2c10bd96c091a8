//! Identity Configuration
//!
//! Network presets plus the tunables of the authorization decision:
//! - minimum balance an account needs before a derived key is usable
//! - safety margin (in blocks) subtracted before comparing expirations
//! - fee rate for the authorize-derived-key call
//! - timeout for remote reads

use std::time::Duration;

use url::Url;

use crate::error::{IdentityError, IdentityResult};
use crate::types::Network;

pub const DEFAULT_MIN_BALANCE_NANOS: u64 = 1500;
pub const DEFAULT_EXPIRATION_THRESHOLD_BLOCKS: u64 = 100;
pub const DEFAULT_MIN_FEE_RATE_NANOS_PER_KB: u64 = 1500;
pub const DEFAULT_IDENTITY_URL: &str = "https://identity.deso.org";

/// Configuration handed to [`crate::identity::Identity`] at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub network: Network,
    /// Base URL of the DeSo node; `/api/v0/` is appended per request
    pub node_url: String,
    /// Base URL of the identity service driving the browser handshake
    pub identity_url: String,

    // Authorization decision
    /// Accounts below this balance cannot (re)authorize a derived key
    pub min_balance_nanos: u64,
    /// Blocks subtracted from the current height before the expiry check
    pub expiration_threshold_blocks: u64,

    pub min_fee_rate_nanos_per_kb: u64,
    /// Upper bound on fetching the authorization facts
    pub remote_timeout: Duration,
    /// Length of the Base58Check prefix on public keys
    pub public_key_prefix_len: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl IdentityConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            node_url: network.default_node_url().to_string(),
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            min_balance_nanos: DEFAULT_MIN_BALANCE_NANOS,
            expiration_threshold_blocks: DEFAULT_EXPIRATION_THRESHOLD_BLOCKS,
            min_fee_rate_nanos_per_kb: DEFAULT_MIN_FEE_RATE_NANOS_PER_KB,
            remote_timeout: Duration::from_secs(30),
            public_key_prefix_len: 3,
        }
    }

    pub fn mainnet() -> Self {
        Self::for_network(Network::Mainnet)
    }

    pub fn testnet() -> Self {
        Self::for_network(Network::Testnet)
    }

    pub fn with_node_url(mut self, url: impl Into<String>) -> Self {
        self.node_url = url.into();
        self
    }

    pub fn with_identity_url(mut self, url: impl Into<String>) -> Self {
        self.identity_url = url.into();
        self
    }

    pub fn with_min_balance_nanos(mut self, nanos: u64) -> Self {
        self.min_balance_nanos = nanos;
        self
    }

    pub fn with_expiration_threshold_blocks(mut self, blocks: u64) -> Self {
        self.expiration_threshold_blocks = blocks;
        self
    }

    pub fn with_min_fee_rate_nanos_per_kb(mut self, nanos: u64) -> Self {
        self.min_fee_rate_nanos_per_kb = nanos;
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Node API base, always ending in `/api/v0/`
    pub fn api_base(&self) -> IdentityResult<Url> {
        let base = Url::parse(&self.node_url)?;
        Ok(base.join("api/v0/")?)
    }

    /// Reject unusable settings before any network call is made
    pub fn validate(&self) -> IdentityResult<()> {
        validate_endpoint("node_url", &self.node_url)?;
        validate_endpoint("identity_url", &self.identity_url)?;

        if self.remote_timeout.is_zero() {
            return Err(IdentityError::InvalidConfig("remote_timeout must be non-zero".to_string()));
        }
        if self.public_key_prefix_len == 0 {
            return Err(IdentityError::InvalidConfig(
                "public_key_prefix_len must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTPS is required except for local development hosts
fn validate_endpoint(name: &str, raw: &str) -> IdentityResult<()> {
    let parsed = Url::parse(raw).map_err(|e| IdentityError::InvalidConfig(format!("{}: {}", name, e)))?;

    match parsed.scheme() {
        "https" => {}
        "http" => {
            let local = matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1") | Some("[::1]"));
            if !local {
                return Err(IdentityError::InvalidConfig(format!(
                    "{}: HTTPS required for remote endpoints",
                    name
                )));
            }
        }
        other => {
            return Err(IdentityError::InvalidConfig(format!(
                "{}: unsupported URL scheme '{}'",
                name, other
            )));
        }
    }

    if parsed.username() != "" || parsed.password().is_some() {
        return Err(IdentityError::InvalidConfig(format!("{}: credentials in URL", name)));
    }
    Ok(())
}
