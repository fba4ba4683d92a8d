//! Orchestrator protocol message types.
//!
//! One JSON [`Request`] arrives on stdin, one JSON [`Response`] leaves on
//! stdout. Both `result` and `error` are always serialized; only one of them
//! carries information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::CpiError;

/// Request sent by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Method name, matched case-insensitively.
    pub method: String,
    /// Positional, loosely typed arguments.
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl Request {
    /// Parse a request from raw stdin bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("Failed to parse request JSON")
    }
}

/// Response returned to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub result: Option<Value>,
    pub error: Option<ResponseError>,
}

/// Error half of a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Error category name.
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub can_retry: bool,
}

impl Response {
    /// Successful response. A `null` result is normalized to `None`.
    pub fn success(result: Value) -> Self {
        let result = if result.is_null() { None } else { Some(result) };
        Self {
            result,
            error: None,
        }
    }

    /// Error response with the category and retry flag taken from `err`.
    pub fn failure(err: &CpiError) -> Self {
        Self {
            result: None,
            error: Some(ResponseError {
                kind: err.kind().as_str().to_string(),
                message: err.to_string(),
                can_retry: err.can_retry(),
            }),
        }
    }

    /// Serialize to the wire form.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Failed to serialize response")
    }
}

/// Write exactly one serialized response to `writer` and flush it.
pub async fn write_response<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<()> {
    let bytes = response.to_vec()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
