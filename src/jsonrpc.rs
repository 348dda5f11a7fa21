use serde::{Deserialize, Serialize};

use crate::error::CallCacheError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id: serde_json::json!(id),
        }
    }

    pub fn block_number(id: u64) -> Self {
        Self::new(id, "eth_blockNumber", serde_json::json!([]))
    }

    /// `eth_call` against the latest block. `data` is 0x-prefixed calldata.
    pub fn eth_call(id: u64, to: &str, data: &str) -> Self {
        Self::new(
            id,
            "eth_call",
            serde_json::json!([{ "to": to, "data": data }, "latest"]),
        )
    }
}

impl JsonRpcResponse {
    /// Unwraps the result, turning a JSON-RPC error object into an error.
    pub fn into_result(self) -> Result<serde_json::Value, CallCacheError> {
        if let Some(error) = self.error {
            return Err(CallCacheError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| CallCacheError::InvalidResponse("missing result field".to_string()))
    }
}

/// Parses a hex quantity such as `"0x1b4"`.
pub fn parse_quantity(value: &serde_json::Value) -> Result<u64, CallCacheError> {
    let s = value
        .as_str()
        .ok_or_else(|| CallCacheError::InvalidResponse(format!("expected hex string, got {value}")))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| CallCacheError::InvalidResponse(format!("invalid quantity {s}: {e}")))
}
