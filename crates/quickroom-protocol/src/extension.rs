//! Messages exchanged with the screen-capture browser extension

use serde::{Deserialize, Serialize};

use crate::types::CaptureSourceType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExtensionRequest {
    GetUserScreen { sources: Vec<CaptureSourceType> },
}

/// Reply from the extension. Anything that is not `success` or `error`
/// collapses into `Unknown`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExtensionResponse {
    Success {
        #[serde(rename = "streamId")]
        stream_id: String,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl ExtensionResponse {
    /// Interpret an arbitrary JSON reply; malformed or untyped replies are `Unknown`.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or(ExtensionResponse::Unknown)
    }
}
