//! # OAuth2 客户端注册
//!
//! 由配置构建的客户端注册信息及其内存仓库

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AppConfig, RegistrationConfig};

/// 用户信息端点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfoEndpoint {
    /// 端点地址，可能缺失或为空白
    pub uri: Option<String>,
    /// 登录主体名称所在的属性
    pub user_name_attribute: String,
}

impl UserInfoEndpoint {
    /// 实际可用的端点地址，空白视为未配置
    #[must_use]
    pub fn effective_uri(&self) -> Option<&str> {
        self.uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }
}

/// 身份提供商元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDetails {
    /// 授权端点
    pub authorization_uri: String,
    /// 令牌端点
    pub token_uri: String,
    /// 用户信息端点
    pub user_info_endpoint: UserInfoEndpoint,
}

/// OAuth2 客户端注册
#[derive(Clone, PartialEq, Eq)]
pub struct ClientRegistration {
    /// 注册ID
    pub registration_id: String,
    /// 客户端ID
    pub client_id: String,
    /// 客户端密钥
    pub client_secret: Option<String>,
    /// 申请的作用域
    pub scopes: Vec<String>,
    /// 已展开的回调地址
    pub redirect_uri: String,
    /// 提供商元数据
    pub provider: ProviderDetails,
}

impl std::fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("registration_id", &self.registration_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("scopes", &self.scopes)
            .field("redirect_uri", &self.redirect_uri)
            .field("provider", &self.provider)
            .finish()
    }
}

impl ClientRegistration {
    /// 从配置创建，展开回调地址模板中的 `{baseUrl}` 与 `{registrationId}`
    #[must_use]
    pub fn from_config(registration_id: &str, config: &RegistrationConfig, base_url: &str) -> Self {
        let redirect_uri = config
            .redirect_uri
            .replace("{baseUrl}", base_url.trim_end_matches('/'))
            .replace("{registrationId}", registration_id);

        Self {
            registration_id: registration_id.to_string(),
            client_id: config.client_id.clone(),
            client_secret: config
                .client_secret
                .clone()
                .filter(|secret| !secret.is_empty()),
            scopes: config.scopes.clone(),
            redirect_uri,
            provider: ProviderDetails {
                authorization_uri: config.authorization_uri.clone(),
                token_uri: config.token_uri.clone(),
                user_info_endpoint: UserInfoEndpoint {
                    uri: config.user_info_uri.clone(),
                    user_name_attribute: config.user_name_attribute.clone(),
                },
            },
        }
    }

    /// 用户信息端点地址（空白视为未配置）
    #[must_use]
    pub fn user_info_uri(&self) -> Option<&str> {
        self.provider.user_info_endpoint.effective_uri()
    }
}

/// 客户端注册仓库
#[derive(Debug, Clone, Default)]
pub struct ClientRegistrations {
    registrations: HashMap<String, Arc<ClientRegistration>>,
}

impl ClientRegistrations {
    /// 从应用配置构建
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        config
            .registrations
            .iter()
            .map(|(id, registration)| {
                ClientRegistration::from_config(id, registration, &config.server.base_url)
            })
            .collect()
    }

    /// 按注册ID查找
    #[must_use]
    pub fn find_by_registration_id(&self, registration_id: &str) -> Option<Arc<ClientRegistration>> {
        self.registrations.get(registration_id).cloned()
    }

    /// 全部注册ID（排序后）
    #[must_use]
    pub fn registration_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.registrations.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// 只有一个注册时返回其ID，用于未登录时自动跳转
    #[must_use]
    pub fn single_registration_id(&self) -> Option<&str> {
        if self.registrations.len() == 1 {
            self.registrations.keys().next().map(String::as_str)
        } else {
            None
        }
    }

    /// 注册数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl FromIterator<ClientRegistration> for ClientRegistrations {
    fn from_iter<I: IntoIterator<Item = ClientRegistration>>(iter: I) -> Self {
        Self {
            registrations: iter
                .into_iter()
                .map(|registration| (registration.registration_id.clone(), Arc::new(registration)))
                .collect(),
        }
    }
}
