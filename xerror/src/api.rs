use err_derive::Error;
use serde::Serialize;
use serde_json::json;

use actix_web::{error, http::StatusCode, HttpResponse};

use crate::wallet::WalletError;

/// Errors exposed by the compatibility HTTP façade. The wire shape is the
/// mobile-wallet one: `{"error": true, "code": <n>, "message": <s>}`,
/// always delivered with status 200.
#[derive(Debug, Clone, Error, Serialize)]
pub enum FacadeError {
    #[error(display = "bad auth")]
    BadAuth,
    #[error(display = "Internal failure")]
    Internal,
    #[error(display = "invalid params")]
    InvalidParams,
    #[error(display = "{}", _0)]
    PaymentFailed(String),
}

impl FacadeError {
    pub const fn code(&self) -> u32 {
        match self {
            FacadeError::BadAuth => 1,
            FacadeError::Internal => 7,
            FacadeError::InvalidParams => 8,
            FacadeError::PaymentFailed(_) => 10,
        }
    }
}

impl From<WalletError> for FacadeError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Database | WalletError::InternalConsistency => FacadeError::Internal,
            other => FacadeError::PaymentFailed(other.to_string()),
        }
    }
}

impl error::ResponseError for FacadeError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::Ok().json(json!({
            "error": true,
            "code": self.code(),
            "message": self.to_string(),
        }))
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::OK
    }
}
