//! Login state decision over a stored derived key

use crate::config::IdentityConfig;
use crate::types::{AuthorizationFacts, LoginState};

/// Thresholds the decision is evaluated with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    pub min_balance_nanos: u64,
    pub expiration_threshold_blocks: u64,
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self::from_config(&IdentityConfig::default())
    }
}

impl AuthorizationPolicy {
    pub fn from_config(config: &IdentityConfig) -> Self {
        Self {
            min_balance_nanos: config.min_balance_nanos,
            expiration_threshold_blocks: config.expiration_threshold_blocks,
        }
    }

    /// Evaluate the login state.
    ///
    /// Balance is checked first: an unfunded account cannot pay to
    /// reauthorize whatever state its key is in. A key counts as expired
    /// `expiration_threshold_blocks` before its on-chain expiration block.
    pub fn decide(&self, facts: &AuthorizationFacts) -> LoginState {
        if facts.account_balance_nanos < self.min_balance_nanos {
            return LoginState::InsufficientBalanceForAuthorization;
        }

        let Some(record) = &facts.derived_key else {
            return LoginState::NotAuthorized;
        };

        let effective_height = facts
            .current_block_height
            .saturating_sub(self.expiration_threshold_blocks);
        if effective_height > record.expiration_block || !record.is_valid {
            return LoginState::ExpiredAuthorization;
        }

        LoginState::Authorized
    }
}
