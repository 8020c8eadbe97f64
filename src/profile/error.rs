//! # 用户信息获取错误

use std::time::Duration;
use thiserror::Error;

/// 用户信息请求失败
///
/// 每个变体对当前请求都是致命的，不做重试。
#[derive(Debug, Error)]
pub enum ProfileFetchError {
    /// 用户信息端点不是合法 URL
    #[error("invalid user-info endpoint '{uri}': {source}")]
    InvalidUri {
        /// 配置的端点
        uri: String,
        /// 解析错误
        #[source]
        source: url::ParseError,
    },

    /// 请求超时
    #[error("user-info request timed out after {0:?}")]
    Timeout(Duration),

    /// 连接或传输失败
    #[error("user-info request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// 端点返回非 2xx 状态
    #[error("user-info endpoint returned {status}: {body}")]
    Status {
        /// HTTP 状态码
        status: u16,
        /// 截断后的响应体
        body: String,
    },

    /// 响应体不是 JSON 对象
    #[error("user-info response is not a JSON object: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ProfileFetchError {
    /// 上游返回的 HTTP 状态码
    #[must_use]
    pub const fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
