use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::gpio::LogicalState;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Pin {0} is not a usable GPIO pin")]
    InvalidPin(i64),
    #[error("Pin {0} is not configured")]
    NotConfigured(u32),
    #[error("Hardware error: {0}")]
    Hardware(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn pin(&self) -> Option<i64> {
        match self {
            AppError::InvalidPin(pin) => Some(*pin),
            AppError::NotConfigured(pin) => Some(i64::from(*pin)),
            _ => None,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidPin(_) | AppError::InvalidValue(_) => StatusCode::BAD_REQUEST,
            AppError::NotConfigured(_) => StatusCode::CONFLICT,
            AppError::Hardware(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({ "status": "error", "message": self.to_string() });
        if let Some(pin) = self.pin() {
            body["pin"] = json!(pin);
        }
        if matches!(self, AppError::NotConfigured(_)) {
            body["state"] = json!(LogicalState::Unknown);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}
