//! Concurrent fetch of the facts a login decision needs
//!
//! Block height, balance and the on-chain derived key record are independent
//! reads, so they run concurrently. The first failure aborts the others; a
//! timeout or a cancelled token drops every in-flight read.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{IdentityError, IdentityResult};
use crate::log_warn;
use crate::node::NodeApi;
use crate::types::{AuthorizationFacts, DerivedKeyInfo};

/// Fetch [`AuthorizationFacts`] for a stored derived key.
pub async fn fetch_authorization_facts(
    node: &dyn NodeApi,
    info: &DerivedKeyInfo,
    timeout: Duration,
    cancel: &CancellationToken,
) -> IdentityResult<AuthorizationFacts> {
    let reads = async {
        tokio::try_join!(
            node.block_height(),
            node.balance_nanos(&info.owner_public_key),
            node.derived_key(&info.owner_public_key, &info.derived_public_key),
        )
    };

    let joined = tokio::select! {
        result = tokio::time::timeout(timeout, reads) => result,
        _ = cancel.cancelled() => {
            log_warn!("auth", "Authorization fact fetch cancelled", owner = info.owner_public_key);
            return Err(IdentityError::Timeout("Authorization fact fetch cancelled".to_string()));
        }
    };

    let (current_block_height, account_balance_nanos, derived_key) = joined.map_err(|_| {
        log_warn!("auth", "Authorization fact fetch timed out", timeout_ms = timeout.as_millis());
        IdentityError::Timeout(format!("Authorization facts not available within {:?}", timeout))
    })??;

    Ok(AuthorizationFacts {
        current_block_height,
        account_balance_nanos,
        derived_key,
    })
}
