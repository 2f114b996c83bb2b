//! JSON-RPC Client
//!
//! Thin transport shared by the wallet and daemon interfaces: a JSON-RPC
//! 2.0 envelope posted over HTTP, optional basic authentication.

use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::config::RpcEndpointConfig;
use crate::error::{RpcError, RpcResult};

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a P,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC client for one endpoint
pub struct JsonRpcClient {
    client: Client,
    config: RpcEndpointConfig,
    request_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(config: RpcEndpointConfig) -> RpcResult<Self> {
        if config.url.is_empty() {
            return Err(RpcError::Configuration("empty RPC url".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RpcError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            config,
            request_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &RpcEndpointConfig {
        &self.config
    }

    fn auth_header(&self) -> Option<String> {
        if !self.config.has_credentials() {
            return None;
        }
        let auth = format!("{}:{}", self.config.username, self.config.password);
        Some(format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(auth)
        ))
    }

    /// Make an RPC call
    pub async fn call<P, T>(&self, method: &str, params: &P) -> RpcResult<T>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let body = serde_json::to_vec(&request).map_err(|e| RpcError::Serialization(e.to_string()))?;

        debug!(method, id, url = %self.config.url, "RPC call");

        let mut builder = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .body(body);
        if let Some(auth) = self.auth_header() {
            builder = builder.header("Authorization", auth);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        decode_response(method, &bytes)
    }
}

fn decode_response<T: DeserializeOwned>(method: &str, bytes: &[u8]) -> RpcResult<T> {
    let rpc_response: RpcResponse<T> = serde_json::from_slice(bytes)?;

    if let Some(error) = rpc_response.error {
        return Err(RpcError::Response {
            code: error.code,
            message: error.message,
        });
    }

    rpc_response
        .result
        .ok_or_else(|| RpcError::Malformed(format!("{}: empty result", method)))
}
