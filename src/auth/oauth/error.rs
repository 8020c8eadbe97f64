//! OAuth2错误处理
//!
//! 定义授权客户端解析与登录流程中可能出现的错误类型

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::profile::ProfileFetchError;

/// 无法为会话解析出已授权客户端
///
/// 对当前请求是致命的，应返回认证失败响应。
#[derive(Debug, Error)]
pub enum ClientResolutionError {
    /// 会话引用的客户端注册不存在
    #[error("unknown client registration: {0}")]
    UnknownRegistration(String),

    /// 该主体没有已保存的授权客户端
    #[error("no authorized client for principal '{principal}' under registration '{registration_id}'")]
    NotFound {
        /// 客户端注册ID
        registration_id: String,
        /// 登录主体名称
        principal: String,
    },

    /// 访问令牌已过期
    #[error("access token for principal '{principal}' under registration '{registration_id}' expired at {expired_at}")]
    TokenExpired {
        /// 客户端注册ID
        registration_id: String,
        /// 登录主体名称
        principal: String,
        /// 过期时间
        expired_at: DateTime<Utc>,
    },
}

/// 登录（授权码）流程错误
#[derive(Debug, Error)]
pub enum LoginError {
    /// 客户端注册不存在
    #[error("unknown client registration: {0}")]
    UnknownRegistration(String),

    /// 授权或令牌端点不是合法 URL
    #[error("invalid {endpoint} for registration '{registration_id}': {source}")]
    InvalidEndpoint {
        /// 客户端注册ID
        registration_id: String,
        /// 端点名称
        endpoint: &'static str,
        /// 解析错误
        #[source]
        source: url::ParseError,
    },

    /// 令牌端点 HTTP 客户端构建失败
    #[error("failed to build token endpoint HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// 会话中没有进行中的授权请求
    #[error("authorization request not found or already used")]
    MissingAuthorizationRequest,

    /// 授权请求超过有效期
    #[error("authorization request expired")]
    AuthorizationRequestExpired,

    /// 回调的注册与发起授权时不一致
    #[error("callback registration mismatch: expected '{expected}', got '{actual}'")]
    RegistrationMismatch {
        /// 发起授权时的注册ID
        expected: String,
        /// 回调路径中的注册ID
        actual: String,
    },

    /// state 不匹配
    #[error("state parameter mismatch")]
    StateMismatch,

    /// 身份提供商拒绝授权
    #[error("authorization denied by provider: {error} ({description})")]
    ProviderDenied {
        /// OAuth2 错误码
        error: String,
        /// 错误描述
        description: String,
    },

    /// 回调缺少授权码
    #[error("authorization response has no code")]
    MissingCode,

    /// 授权码换取令牌失败
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// 注册未配置用户信息端点，无法确定登录主体
    #[error("registration '{0}' has no user-info endpoint to resolve the principal")]
    MissingUserInfoEndpoint(String),

    /// 用户信息中缺少主体名称属性
    #[error("user-info response has no '{0}' attribute")]
    MissingUserNameAttribute(String),

    /// 用户信息获取失败
    #[error(transparent)]
    ProfileFetch(#[from] ProfileFetchError),
}
