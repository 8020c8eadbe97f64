//! # 应用配置结构定义

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 出站 HTTP 客户端配置
    #[serde(default)]
    pub http_client: HttpClientConfig,
    /// 会话配置
    #[serde(default)]
    pub session: SessionConfig,
    /// OAuth2 客户端注册，键为 registration id
    #[serde(default)]
    pub registrations: BTreeMap<String, RegistrationConfig>,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 对外可见的基础地址，用于拼接回调地址
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// 解析监听地址
    pub fn socket_addr(&self) -> crate::error::Result<SocketAddr> {
        let ip = self.host.parse::<IpAddr>().map_err(|e| {
            crate::error::AppError::config_with_source(format!("无效的监听地址: {}", self.host), e)
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// 基础地址为 https 时会话 Cookie 带 `Secure`
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        url::Url::parse(&self.base_url).is_ok_and(|url| url.scheme() == "https")
    }
}

/// 出站 HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 建连超时（秒）
    pub connect_timeout_secs: u64,
    /// User-Agent
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
            user_agent: format!("login-profile/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// 请求超时
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 建连超时
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// 会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 已登录会话与已授权客户端的最长保留时间（分钟）
    pub ttl_minutes: u64,
    /// 过期会话清理间隔（秒）
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 480,
            cleanup_interval_secs: 60,
        }
    }
}

impl SessionConfig {
    /// 会话保留时间
    #[must_use]
    pub fn ttl(&self) -> chrono::TimeDelta {
        i64::try_from(self.ttl_minutes)
            .ok()
            .and_then(chrono::TimeDelta::try_minutes)
            .unwrap_or(chrono::TimeDelta::MAX)
    }

    /// 清理间隔
    #[must_use]
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// 默认回调地址模板
pub const DEFAULT_REDIRECT_URI: &str = "{baseUrl}/login/oauth2/code/{registrationId}";

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

fn default_user_name_attribute() -> String {
    "sub".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_string()]
}

/// 单个 OAuth2 客户端注册的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// 客户端ID
    pub client_id: String,
    /// 客户端密钥（公开客户端可省略）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// 申请的作用域
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// 回调地址模板，支持 `{baseUrl}` 与 `{registrationId}`
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// 授权端点
    pub authorization_uri: String,
    /// 令牌端点
    pub token_uri: String,
    /// 用户信息端点，留空则跳过用户信息请求
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info_uri: Option<String>,
    /// 用作登录主体名称的属性
    #[serde(default = "default_user_name_attribute")]
    pub user_name_attribute: String,
}
