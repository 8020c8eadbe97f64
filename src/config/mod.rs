//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;
mod manager;

pub use app_config::{
    AppConfig, DEFAULT_REDIRECT_URI, HttpClientConfig, RegistrationConfig, ServerConfig,
    SessionConfig,
};
pub use manager::ConfigManager;

use std::env;
use std::path::PathBuf;

use crate::error::{AppError, Result};

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "LOGIN_PROFILE_CONFIG_PATH";

/// 解析配置文件路径
///
/// 命令行参数优先，其次 `LOGIN_PROFILE_CONFIG_PATH`，最后 `config/config.{RUST_ENV}.toml`。
#[must_use]
pub fn resolve_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    PathBuf::from(format!("config/config.{env}.toml"))
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.server.port == 0 {
        return Err(AppError::config("服务器端口必须大于0"));
    }

    config.server.socket_addr()?;

    url::Url::parse(&config.server.base_url).map_err(|e| {
        AppError::config_with_source(format!("无效的base_url: {}", config.server.base_url), e)
    })?;

    if config.http_client.request_timeout_secs == 0 {
        return Err(AppError::config("request_timeout_secs必须大于0"));
    }

    if config.http_client.connect_timeout_secs == 0 {
        return Err(AppError::config("connect_timeout_secs必须大于0"));
    }

    if config.session.ttl_minutes == 0 {
        return Err(AppError::config("session.ttl_minutes必须大于0"));
    }

    if config.session.cleanup_interval_secs == 0 {
        return Err(AppError::config("session.cleanup_interval_secs必须大于0"));
    }

    if config.registrations.is_empty() {
        return Err(AppError::config("必须配置至少一个OAuth2客户端注册"));
    }

    for (registration_id, registration) in &config.registrations {
        validate_registration(registration_id, registration)?;
    }

    Ok(())
}

fn validate_registration(registration_id: &str, registration: &RegistrationConfig) -> Result<()> {
    if registration_id.trim().is_empty() {
        return Err(AppError::config("registration id不能为空"));
    }

    if registration.client_id.trim().is_empty() {
        return Err(AppError::config(format!("{registration_id}: client_id不能为空")));
    }

    for (field, value) in [
        ("authorization_uri", &registration.authorization_uri),
        ("token_uri", &registration.token_uri),
    ] {
        url::Url::parse(value).map_err(|e| {
            AppError::config_with_source(format!("{registration_id}: 无效的{field}: {value}"), e)
        })?;
    }

    if let Some(uri) = registration
        .user_info_uri
        .as_deref()
        .filter(|uri| !uri.trim().is_empty())
    {
        url::Url::parse(uri).map_err(|e| {
            AppError::config_with_source(format!("{registration_id}: 无效的user_info_uri: {uri}"), e)
        })?;
    }

    if registration.user_name_attribute.trim().is_empty() {
        return Err(AppError::config(format!(
            "{registration_id}: user_name_attribute不能为空"
        )));
    }

    Ok(())
}
