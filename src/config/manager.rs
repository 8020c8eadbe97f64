//! # 配置管理器
//!
//! 从 TOML 文件加载配置，并应用 `LOGIN_` 前缀的环境变量覆盖

use std::collections::HashMap;
use std::env;
use std::path::Path;
use tracing::{debug, warn};

use super::AppConfig;
use crate::error::{AppError, Result};
use crate::linfo;
use crate::logging::{LogComponent, LogStage};

/// 环境变量覆盖前缀
const ENV_PREFIX: &str = "LOGIN_";

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 当前配置
    config: AppConfig,
    /// 已应用的覆盖数量
    applied_overrides: usize,
}

impl ConfigManager {
    /// 从指定文件创建配置管理器，使用进程环境变量作为覆盖来源
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with_overrides(config_path, env::vars())
    }

    /// 从指定文件创建配置管理器，使用给定的环境变量集合作为覆盖来源
    pub fn from_file_with_overrides(
        config_path: impl AsRef<Path>,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let config_path = config_path.as_ref();
        let mut config = Self::load_config_file(config_path)?;

        let env_overrides = Self::build_env_overrides(vars);
        let applied_overrides = Self::apply_env_overrides(&mut config, &env_overrides)?;

        super::validate_config(&config)?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Config,
            "config_loaded",
            &format!("配置管理器初始化完成: {}", config_path.display()),
            registrations = config.registrations.len(),
            env_overrides = applied_overrides
        );

        Ok(Self {
            config,
            applied_overrides,
        })
    }

    /// 获取当前配置
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 取出配置
    #[must_use]
    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// 已应用的环境变量覆盖数量
    #[must_use]
    pub const fn applied_overrides(&self) -> usize {
        self.applied_overrides
    }

    /// 加载配置文件
    fn load_config_file(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            return Err(AppError::config(format!(
                "配置文件不存在: {}",
                path.display()
            )));
        }

        let config_content = std::fs::read_to_string(path).map_err(|e| {
            AppError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
        })?;

        toml::from_str(&config_content).map_err(|e| {
            AppError::config_with_source(
                format!("TOML解析失败 - 配置文件: {}, 详细错误: {e}", path.display()),
                e,
            )
        })
    }

    /// 构建环境变量覆盖映射
    ///
    /// 例如: `LOGIN_SERVER_PORT` -> `server.port`
    fn build_env_overrides(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> HashMap<String, String> {
        let overrides: HashMap<String, String> = vars
            .into_iter()
            .filter(|(key, _)| key != super::CONFIG_PATH_ENV)
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|config_key| (config_key.to_lowercase().replace('_', "."), value))
            })
            .collect();

        debug!("发现 {} 个环境变量覆盖", overrides.len());
        overrides
    }

    /// 应用环境变量覆盖，返回实际生效的数量
    fn apply_env_overrides(
        config: &mut AppConfig,
        overrides: &HashMap<String, String>,
    ) -> Result<usize> {
        let mut applied = 0;
        for (path, value) in overrides {
            if Self::apply_override_to_config(config, path, value)? {
                debug!(
                    "应用环境变量覆盖: {} = {}",
                    path,
                    if path.contains("secret") { "***" } else { value }
                );
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// 将环境变量覆盖应用到配置对象，未知路径返回 `false`
    ///
    /// 环境变量名不区分大小写，注册ID按忽略大小写匹配；
    /// 含 `-` 的注册ID无法通过环境变量覆盖。
    fn apply_override_to_config(config: &mut AppConfig, path: &str, value: &str) -> Result<bool> {
        let parts: Vec<&str> = path.split('.').collect();

        match parts.as_slice() {
            ["server", "host"] => config.server.host = value.to_string(),
            ["server", "port"] => {
                config.server.port = value.parse().map_err(|e| {
                    AppError::config_with_source(format!("无效的端口号: {value}"), e)
                })?;
            }
            ["server", "base", "url"] => config.server.base_url = value.to_string(),
            ["http", "client", "request", "timeout"] => {
                config.http_client.request_timeout_secs = value.parse().map_err(|e| {
                    AppError::config_with_source(format!("无效的请求超时: {value}"), e)
                })?;
            }
            ["http", "client", "connect", "timeout"] => {
                config.http_client.connect_timeout_secs = value.parse().map_err(|e| {
                    AppError::config_with_source(format!("无效的建连超时: {value}"), e)
                })?;
            }
            ["session", "ttl", "minutes"] => {
                config.session.ttl_minutes = value.parse().map_err(|e| {
                    AppError::config_with_source(format!("无效的会话有效期: {value}"), e)
                })?;
            }
            ["session", "cleanup", "interval", "secs"] => {
                config.session.cleanup_interval_secs = value.parse().map_err(|e| {
                    AppError::config_with_source(format!("无效的清理间隔: {value}"), e)
                })?;
            }
            ["registration", registration_id @ .., "client", field @ ("id" | "secret")] => {
                let registration_id = registration_id.join("_");
                let Some(registration) = config
                    .registrations
                    .iter_mut()
                    .find(|(id, _)| id.eq_ignore_ascii_case(&registration_id))
                    .map(|(_, registration)| registration)
                else {
                    warn!("未知的客户端注册，忽略环境变量覆盖: {}", registration_id);
                    return Ok(false);
                };
                if *field == "id" {
                    registration.client_id = value.to_string();
                } else {
                    registration.client_secret = Some(value.to_string());
                }
            }
            _ => {
                warn!("未知的配置路径，忽略环境变量覆盖: {}", path);
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE: &str = r#"
[server]
host = "0.0.0.0"
port = 9000
base_url = "https://app.example.com"

[http_client]
request_timeout_secs = 3

[registrations.onelogin]
client_id = "client-from-file"
client_secret = "file-secret"
scopes = ["openid", "profile"]
authorization_uri = "https://example.onelogin.com/oidc/2/auth"
token_uri = "https://example.onelogin.com/oidc/2/token"
user_info_uri = "https://example.onelogin.com/oidc/2/me"

[registrations.corp_sso]
client_id = "corp"
authorization_uri = "https://sso.corp.example/auth"
token_uri = "https://sso.corp.example/token"

[registrations.AzureAD]
client_id = "azure"
authorization_uri = "https://login.example.com/auth"
token_uri = "https://login.example.com/token"
"#;

    fn write_sample() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_file() {
        let file = write_sample();
        let manager =
            ConfigManager::from_file_with_overrides(file.path(), Vec::<(String, String)>::new())
                .unwrap();
        let config = manager.config();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.http_client.request_timeout_secs, 3);
        assert_eq!(config.http_client.connect_timeout_secs, 5);
        assert_eq!(config.registrations.len(), 3);

        let corp = &config.registrations["corp_sso"];
        assert_eq!(corp.client_secret, None);
        assert_eq!(corp.scopes, vec!["openid".to_string()]);
        assert_eq!(corp.user_info_uri, None);
        assert_eq!(corp.user_name_attribute, "sub");
        assert_eq!(corp.redirect_uri, super::super::DEFAULT_REDIRECT_URI);
    }

    #[test]
    fn test_env_overrides() {
        let file = write_sample();
        let vars = vec![
            ("LOGIN_SERVER_PORT".to_string(), "8443".to_string()),
            ("LOGIN_HTTP_CLIENT_REQUEST_TIMEOUT".to_string(), "7".to_string()),
            (
                "LOGIN_REGISTRATION_CORP_SSO_CLIENT_SECRET".to_string(),
                "env-secret".to_string(),
            ),
            ("LOGIN_REGISTRATION_ONELOGIN_CLIENT_ID".to_string(), "env-client".to_string()),
            ("LOGIN_UNKNOWN_KEY".to_string(), "ignored".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ];

        let manager = ConfigManager::from_file_with_overrides(file.path(), vars).unwrap();
        let config = manager.config();

        assert_eq!(manager.applied_overrides(), 4);
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.http_client.request_timeout_secs, 7);
        assert_eq!(
            config.registrations["corp_sso"].client_secret.as_deref(),
            Some("env-secret")
        );
        assert_eq!(config.registrations["onelogin"].client_id, "env-client");
    }

    #[test]
    fn test_override_matches_mixed_case_registration() {
        let file = write_sample();
        let vars = vec![
            ("LOGIN_REGISTRATION_AZUREAD_CLIENT_ID".to_string(), "env-azure".to_string()),
            ("LOGIN_REGISTRATION_GITHUB_CLIENT_ID".to_string(), "ignored".to_string()),
            ("LOGIN_SESSION_TTL_MINUTES".to_string(), "30".to_string()),
        ];

        let manager = ConfigManager::from_file_with_overrides(file.path(), vars).unwrap();
        let config = manager.config();

        assert_eq!(manager.applied_overrides(), 2);
        assert_eq!(config.registrations["AzureAD"].client_id, "env-azure");
        assert_eq!(config.session.ttl_minutes, 30);
        assert!(!config.registrations.contains_key("github"));
    }

    #[test]
    fn test_invalid_override_value() {
        let file = write_sample();
        let vars = vec![("LOGIN_SERVER_PORT".to_string(), "not-a-port".to_string())];
        let err = ConfigManager::from_file_with_overrides(file.path(), vars).unwrap_err();
        assert!(err.to_string().contains("无效的端口号"));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigManager::from_file_with_overrides(
            "/definitely/not/here.toml",
            Vec::<(String, String)>::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("配置文件不存在"));
    }
}
