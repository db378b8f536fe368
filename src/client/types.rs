//! Response envelope shared by the point services.

use serde::{Deserialize, Serialize};

/// `{status, message, data}` body returned by both the history and ledger endpoints
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}
