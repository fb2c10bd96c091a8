//! HTTP client for a DeSo node
//!
//! Every endpoint is a JSON `POST` under `{node}/api/v0/`. Non-success
//! responses carry `{"error": "..."}` which is surfaced verbatim.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use super::types::*;
use super::NodeApi;
use crate::config::IdentityConfig;
use crate::error::{IdentityError, IdentityResult};
use crate::types::OnChainDerivedKey;
use crate::{log_debug, log_warn};

const USER_AGENT: &str = concat!("deso-identity/", env!("CARGO_PKG_VERSION"));

/// [`NodeApi`] over HTTPS
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    client: Client,
    api_base: Url,
}

impl HttpNodeClient {
    pub fn new(config: &IdentityConfig) -> IdentityResult<Self> {
        let client = Client::builder()
            .timeout(config.remote_timeout)
            .connect_timeout(config.remote_timeout.min(std::time::Duration::from_secs(10)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IdentityError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base()?,
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    async fn post<Req, Resp>(&self, endpoint: &'static str, body: &Req) -> IdentityResult<Resp>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.api_base.join(endpoint)?;
        log_debug!("node", "POST", endpoint = endpoint);

        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<BackendErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            log_warn!("node", "Node request failed", endpoint = endpoint, status = status.as_u16());
            return Err(IdentityError::RemoteReadFailed(format!("{}: {}", endpoint, message)));
        }

        serde_json::from_str(&text)
            .map_err(|e| IdentityError::RemoteReadFailed(format!("{}: unexpected response: {}", endpoint, e)))
    }
}

#[async_trait]
impl NodeApi for HttpNodeClient {
    async fn block_height(&self) -> IdentityResult<u64> {
        let response: AppStateResponse = self.post("get-app-state", &AppStateRequest::default()).await?;
        Ok(response.block_height)
    }

    async fn balance_nanos(&self, public_key: &str) -> IdentityResult<u64> {
        let request = UsersStatelessRequest {
            public_keys_base58_check: vec![public_key.to_string()],
            skip_for_leaderboard: true,
        };
        let response: UsersStatelessResponse = self.post("get-users-stateless", &request).await?;

        response
            .user_list
            .unwrap_or_default()
            .into_iter()
            .find(|user| user.public_key_base58_check == public_key)
            .map(|user| user.balance_nanos)
            .ok_or_else(|| IdentityError::RemoteReadFailed(format!("No user found for {}", public_key)))
    }

    async fn derived_key(
        &self,
        owner_public_key: &str,
        derived_public_key: &str,
    ) -> IdentityResult<Option<OnChainDerivedKey>> {
        let request = UserDerivedKeysRequest {
            public_key_base58_check: owner_public_key.to_string(),
        };
        let response: UserDerivedKeysResponse = self.post("get-user-derived-keys", &request).await?;
        Ok(response.derived_key(derived_public_key).map(OnChainDerivedKey::from))
    }

    async fn append_extra_data(
        &self,
        transaction_hex: &str,
        extra_data: &HashMap<String, String>,
    ) -> IdentityResult<String> {
        let request = AppendExtraDataRequest {
            transaction_hex,
            extra_data,
        };
        let response: TransactionHexResponse = self.post("append-extra-data", &request).await?;
        Ok(response.transaction_hex)
    }

    async fn submit_transaction(&self, signed_transaction_hex: &str) -> IdentityResult<String> {
        let request = SubmitTransactionRequest {
            transaction_hex: signed_transaction_hex,
        };
        let response: SubmitTransactionResponse = self.post("submit-transaction", &request).await?;
        Ok(response.txn_hash_hex)
    }

    async fn authorize_derived_key(
        &self,
        request: &AuthorizeDerivedKeyRequest,
    ) -> IdentityResult<AuthorizeDerivedKeyResponse> {
        self.post("authorize-derived-key", request).await
    }
}
