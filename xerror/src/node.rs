use err_derive::Error;
use serde::{Deserialize, Serialize};

use crate::wallet::WalletError;

/// Failures at the node-gateway boundary, before translation into the
/// user-facing taxonomy.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum NodeError {
    #[error(display = "node rpc unreachable or timed out")]
    Unavailable,
    #[error(display = "node rpc error {}: {}", code, message)]
    Rpc { code: i64, message: String },
    #[error(display = "unexpected node response: {}", _0)]
    BadResponse(String),
}

impl NodeError {
    pub fn code(&self) -> Option<i64> {
        match self {
            NodeError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Decode failures carry the node's reason; everything else surfaces as a
/// retryable node outage. `decodepay` call sites map their errors through
/// [`NodeError::into_decode_failure`] instead of this blanket conversion.
impl From<NodeError> for WalletError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Unavailable => WalletError::NodeUnavailable,
            NodeError::Rpc { .. } | NodeError::BadResponse(_) => WalletError::NodeUnavailable,
        }
    }
}

impl NodeError {
    pub fn into_decode_failure(self) -> WalletError {
        match self {
            NodeError::Rpc { message, .. } => WalletError::InvoiceDecodeFailed(message),
            NodeError::BadResponse(detail) => WalletError::InvoiceDecodeFailed(detail),
            NodeError::Unavailable => WalletError::NodeUnavailable,
        }
    }
}
