//! The unified error handling system for the application.

use axum::Json;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::logging::{LogComponent, LogStage};

pub use types::AppError;

/// A unified `Result` type for the entire application.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, AppError>;

pub mod types;

/// Error Category for monitoring and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Errors caused by the client (e.g., no session, unknown registration).
    /// Corresponds to 4xx HTTP status codes.
    Client,
    /// Errors caused by the server or its dependencies.
    /// Corresponds to 5xx HTTP status codes.
    Server,
}

/// # 标准错误信息
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    /// 错误代码
    pub code: &'static str,
    /// 面向调用方的错误信息
    pub message: String,
}

/// # 标准错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// 恒为 false
    pub success: bool,
    /// 错误信息
    pub error: ErrorInfo,
    /// 响应时间
    pub timestamp: DateTime<Utc>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.to_http_response_parts();
        if self.category() == ErrorCategory::Server {
            crate::lerror!(
                "system",
                LogStage::Error,
                LogComponent::Handler,
                "request_failed",
                &self.to_string(),
                code = code,
                error = ?self
            );
        } else {
            crate::ldebug!(
                "system",
                LogStage::Error,
                LogComponent::Handler,
                "request_rejected",
                &self.to_string(),
                code = code,
                error = ?self
            );
        }

        let body = ErrorResponse {
            success: false,
            error: ErrorInfo {
                code,
                message: self.public_message(),
            },
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}
