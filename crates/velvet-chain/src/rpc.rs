//! JSON-RPC 2.0 client over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::{ChainError, Result, RPC_RATE_LIMIT_CODE};

/// A thin JSON-RPC client bound to one node endpoint.
pub struct RpcClient {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Fails only if the underlying HTTP client cannot be constructed.
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Perform one JSON-RPC call and decode the `result` field.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let resp: Value = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = resp.get("error") {
            if !err.is_null() {
                let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
                let message = err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                if code == RPC_RATE_LIMIT_CODE {
                    return Err(ChainError::RateLimited);
                }
                return Err(ChainError::Rpc { code, message });
            }
        }

        let result = resp.get("result").cloned().unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| ChainError::Decode(format!("{method}: {e}")))
    }
}
