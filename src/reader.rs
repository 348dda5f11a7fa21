use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use alloy_primitives::hex;
use reqwest::Client;
use tracing::{debug, warn};

use crate::abi;
use crate::cache::{CallDescriptor, Fetcher, fetcher};
use crate::error::CallCacheError;
use crate::jsonrpc::{self, JsonRpcRequest, JsonRpcResponse};

/// Reads contract state from a JSON-RPC node.
pub struct RpcReader {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl RpcReader {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, CallCacheError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(20)
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn block_number(&self) -> Result<u64, CallCacheError> {
        let request = JsonRpcRequest::block_number(self.next_id());
        let result = self.send(&request).await?;
        jsonrpc::parse_quantity(&result)
    }

    /// Runs `eth_call` for `call` and returns the raw 0x-prefixed return data.
    pub async fn call(&self, call: &CallDescriptor) -> Result<String, CallCacheError> {
        let data = abi::encode_call(&call.method, &call.args)?;
        let data = format!("0x{}", hex::encode(data));
        let request = JsonRpcRequest::eth_call(self.next_id(), &call.target, &data);

        let start = Instant::now();
        let result = self.send(&request).await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => debug!(call = %call, latency_ms = %latency_ms, "eth_call succeeded"),
            Err(e) => warn!(call = %call, error = %e, "eth_call failed"),
        }

        result?
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| CallCacheError::InvalidResponse("eth_call result is not a string".to_string()))
    }

    /// A cache fetcher that reads `call` through this reader.
    pub fn fetcher(self: &Arc<Self>, call: CallDescriptor) -> Fetcher<String, CallCacheError> {
        let reader = Arc::clone(self);
        let call = Arc::new(call);
        fetcher(move || {
            let reader = reader.clone();
            let call = call.clone();
            async move { reader.call(&call).await }
        })
    }

    async fn send(&self, request: &JsonRpcRequest) -> Result<serde_json::Value, CallCacheError> {
        let body = serde_json::to_string(request)?;

        let resp = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(CallCacheError::Http(resp.status().as_u16()));
        }

        let text = resp.text().await?;
        let rpc_response: JsonRpcResponse = serde_json::from_str(&text)?;
        rpc_response.into_result()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}
