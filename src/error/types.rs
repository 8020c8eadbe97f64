//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 会话未认证或登录流程失败
    #[error("认证错误: {message}")]
    Authentication {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 无法为会话解析出已授权客户端
    #[error("授权客户端解析失败: {source}")]
    ClientResolution {
        /// 解析失败原因
        #[source]
        source: crate::auth::oauth::ClientResolutionError,
    },

    /// 获取用户信息失败
    #[error("用户信息获取失败: {source}")]
    ProfileFetch {
        /// 获取失败原因
        #[source]
        source: crate::profile::ProfileFetchError,
    },

    /// 资源未找到
    #[error("资源未找到: {resource_type} {identifier}")]
    NotFound {
        /// 资源类型
        resource_type: String,
        /// 资源标识
        identifier: String,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 服务器启动错误
    #[error("服务器启动错误: {message}")]
    ServerStart {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl AppError {
    /// 将错误转换为HTTP状态码和错误代码
    #[must_use]
    pub const fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Authentication { .. } => (StatusCode::UNAUTHORIZED, "AUTHENTICATION_ERROR"),
            Self::ClientResolution { .. } => (StatusCode::UNAUTHORIZED, "CLIENT_RESOLUTION_ERROR"),
            Self::ProfileFetch { .. } => (StatusCode::BAD_GATEWAY, "PROFILE_FETCH_ERROR"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::ServerStart { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_START_ERROR"),
        }
    }

    /// 错误分类
    #[must_use]
    pub fn category(&self) -> super::ErrorCategory {
        if self.to_http_response_parts().0.is_client_error() {
            super::ErrorCategory::Client
        } else {
            super::ErrorCategory::Server
        }
    }

    /// 返回给调用方的错误信息
    ///
    /// 服务端错误与授权客户端解析失败只给出固定文案，
    /// 上游响应体与登录主体名称只进入日志。
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::ProfileFetch { .. } => "用户信息服务暂时不可用".to_string(),
            Self::ClientResolution { .. } => "未找到会话的已授权客户端，请重新登录".to_string(),
            Self::Config { .. } | Self::Internal { .. } | Self::ServerStart { .. } => {
                "服务器内部错误".to_string()
            }
            Self::Authentication { .. } | Self::NotFound { .. } => self.to_string(),
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建认证错误
    pub fn authentication<T: Into<String>>(message: T) -> Self {
        Self::Authentication {
            message: message.into(),
            source: None,
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<T: Into<String>, I: Into<String>>(resource_type: T, identifier: I) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的服务器启动错误
    pub fn server_start_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ServerStart {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<crate::auth::oauth::ClientResolutionError> for AppError {
    fn from(source: crate::auth::oauth::ClientResolutionError) -> Self {
        Self::ClientResolution { source }
    }
}

impl From<crate::profile::ProfileFetchError> for AppError {
    fn from(source: crate::profile::ProfileFetchError) -> Self {
        Self::ProfileFetch { source }
    }
}

impl From<crate::auth::oauth::LoginError> for AppError {
    fn from(err: crate::auth::oauth::LoginError) -> Self {
        use crate::auth::oauth::LoginError;
        match err {
            LoginError::UnknownRegistration(id) => Self::not_found("client_registration", id),
            LoginError::ProfileFetch(source) => Self::ProfileFetch { source },
            LoginError::InvalidEndpoint { .. } => Self::config_with_source("OAuth2端点配置无效", err),
            LoginError::HttpClient(_) => Self::internal_with_source("HTTP客户端构建失败", err),
            other => Self::Authentication {
                message: other.to_string(),
                source: Some(anyhow::Error::new(other)),
            },
        }
    }
}
