//! # 已授权客户端
//!
//! 访问令牌与客户端注册的组合，以及按 (registration id, principal) 存取它的服务

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

use super::{ClientRegistration, ClientRegistrations, ClientResolutionError};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo};

/// 访问令牌
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// 令牌值
    pub value: String,
    /// 签发时间
    pub issued_at: DateTime<Utc>,
    /// 过期时间（提供商未返回时为空）
    pub expires_at: Option<DateTime<Utc>>,
    /// 授予的作用域
    pub scopes: Vec<String>,
}

impl AccessToken {
    /// 创建不带过期时间的令牌
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            issued_at: Utc::now(),
            expires_at: None,
            scopes: Vec::new(),
        }
    }

    /// 设置过期时间
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// 设置作用域
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// 在给定时间点是否已过期
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"***")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// 已授权客户端
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    /// 登录时使用的客户端注册
    pub registration: Arc<ClientRegistration>,
    /// 登录主体名称
    pub principal_name: String,
    /// 访问令牌
    pub access_token: AccessToken,
    /// 刷新令牌
    pub refresh_token: Option<String>,
}

impl AuthorizedClient {
    /// 注册ID
    #[must_use]
    pub fn registration_id(&self) -> &str {
        &self.registration.registration_id
    }
}

/// 已授权客户端服务
///
/// 登录完成处理器只依赖这个接口来解析会话对应的访问令牌。
#[async_trait]
pub trait AuthorizedClientService: Send + Sync {
    /// 加载已授权客户端；不存在、注册未知或令牌过期时返回错误
    async fn load_authorized_client(
        &self,
        registration_id: &str,
        principal_name: &str,
    ) -> Result<AuthorizedClient, ClientResolutionError>;

    /// 保存（覆盖）已授权客户端
    async fn save_authorized_client(&self, client: AuthorizedClient);

    /// 删除已授权客户端，返回是否存在
    async fn remove_authorized_client(&self, registration_id: &str, principal_name: &str) -> bool;

    /// 移除令牌已过期或保存超过 `max_age` 的客户端，返回移除数量
    async fn purge_stale(&self, now: DateTime<Utc>, max_age: TimeDelta) -> usize;
}

type ClientKey = (String, String);

/// 内存实现
#[derive(Debug)]
pub struct InMemoryAuthorizedClientService {
    registrations: Arc<ClientRegistrations>,
    clients: DashMap<ClientKey, AuthorizedClient>,
}

impl InMemoryAuthorizedClientService {
    /// 创建服务
    #[must_use]
    pub fn new(registrations: Arc<ClientRegistrations>) -> Self {
        Self {
            registrations,
            clients: DashMap::new(),
        }
    }

    /// 已保存的客户端数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn key(registration_id: &str, principal_name: &str) -> ClientKey {
        (registration_id.to_string(), principal_name.to_string())
    }
}

#[async_trait]
impl AuthorizedClientService for InMemoryAuthorizedClientService {
    async fn load_authorized_client(
        &self,
        registration_id: &str,
        principal_name: &str,
    ) -> Result<AuthorizedClient, ClientResolutionError> {
        if self
            .registrations
            .find_by_registration_id(registration_id)
            .is_none()
        {
            return Err(ClientResolutionError::UnknownRegistration(
                registration_id.to_string(),
            ));
        }

        let key = Self::key(registration_id, principal_name);
        // 先克隆再释放分片锁，过期时才能安全删除
        let client = self
            .clients
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ClientResolutionError::NotFound {
                registration_id: registration_id.to_string(),
                principal: principal_name.to_string(),
            })?;

        if client.access_token.is_expired_at(Utc::now()) {
            self.clients.remove(&key);
            ldebug!(
                "system",
                LogStage::Authentication,
                LogComponent::AuthorizedClient,
                "evict_expired_client",
                "Evicted authorized client with expired access token",
                registration_id = registration_id
            );
            return Err(ClientResolutionError::TokenExpired {
                registration_id: registration_id.to_string(),
                principal: principal_name.to_string(),
                expired_at: client.access_token.expires_at.unwrap_or_else(Utc::now),
            });
        }

        Ok(client)
    }

    async fn save_authorized_client(&self, client: AuthorizedClient) {
        let key = Self::key(client.registration_id(), &client.principal_name);
        linfo!(
            "system",
            LogStage::Callback,
            LogComponent::AuthorizedClient,
            "save_authorized_client",
            "Stored authorized client",
            registration_id = client.registration_id()
        );
        self.clients.insert(key, client);
    }

    async fn remove_authorized_client(&self, registration_id: &str, principal_name: &str) -> bool {
        self.clients
            .remove(&Self::key(registration_id, principal_name))
            .is_some()
    }

    async fn purge_stale(&self, now: DateTime<Utc>, max_age: TimeDelta) -> usize {
        let mut removed = 0;
        self.clients.retain(|_, client| {
            let stale = client.access_token.is_expired_at(now)
                || now - client.access_token.issued_at > max_age;
            removed += usize::from(stale);
            !stale
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oauth::{ProviderDetails, UserInfoEndpoint};
    use chrono::Duration;

    fn registration() -> ClientRegistration {
        ClientRegistration {
            registration_id: "onelogin".to_string(),
            client_id: "client".to_string(),
            client_secret: None,
            scopes: vec!["openid".to_string()],
            redirect_uri: "http://localhost/login/oauth2/code/onelogin".to_string(),
            provider: ProviderDetails {
                authorization_uri: "https://idp.example.com/auth".to_string(),
                token_uri: "https://idp.example.com/token".to_string(),
                user_info_endpoint: UserInfoEndpoint {
                    uri: None,
                    user_name_attribute: "sub".to_string(),
                },
            },
        }
    }

    fn service() -> (InMemoryAuthorizedClientService, Arc<ClientRegistration>) {
        let registrations: ClientRegistrations = [registration()].into_iter().collect();
        let registration = registrations.find_by_registration_id("onelogin").unwrap();
        (
            InMemoryAuthorizedClientService::new(Arc::new(registrations)),
            registration,
        )
    }

    fn client(registration: Arc<ClientRegistration>, token: AccessToken) -> AuthorizedClient {
        AuthorizedClient {
            registration,
            principal_name: "alice@example.com".to_string(),
            access_token: token,
            refresh_token: None,
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (service, registration) = service();
        service
            .save_authorized_client(client(registration, AccessToken::new("tok")))
            .await;

        let loaded = service
            .load_authorized_client("onelogin", "alice@example.com")
            .await
            .unwrap();
        assert_eq!(loaded.access_token.value, "tok");
        assert_eq!(loaded.registration_id(), "onelogin");
    }

    #[tokio::test]
    async fn test_missing_client() {
        let (service, _) = service();
        let err = service
            .load_authorized_client("onelogin", "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientResolutionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unknown_registration() {
        let (service, registration) = service();
        service
            .save_authorized_client(client(registration, AccessToken::new("tok")))
            .await;
        let err = service
            .load_authorized_client("github", "alice@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientResolutionError::UnknownRegistration(_)));
    }

    #[tokio::test]
    async fn test_expired_token_is_evicted() {
        let (service, registration) = service();
        let token = AccessToken::new("tok").with_expires_at(Utc::now() - Duration::seconds(1));
        service.save_authorized_client(client(registration, token)).await;

        let err = service
            .load_authorized_client("onelogin", "alice@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientResolutionError::TokenExpired { .. }));
        assert!(service.is_empty());
    }

    #[tokio::test]
    async fn test_remove_revokes() {
        let (service, registration) = service();
        service
            .save_authorized_client(client(registration, AccessToken::new("tok")))
            .await;
        assert!(service.remove_authorized_client("onelogin", "alice@example.com").await);
        assert!(!service.remove_authorized_client("onelogin", "alice@example.com").await);
        assert!(
            service
                .load_authorized_client("onelogin", "alice@example.com")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_purge_stale_clients() {
        let (service, registration) = service();
        let now = Utc::now();
        service
            .save_authorized_client(client(Arc::clone(&registration), AccessToken::new("fresh")))
            .await;
        service
            .save_authorized_client(AuthorizedClient {
                principal_name: "bob@example.com".to_string(),
                ..client(
                    registration,
                    AccessToken::new("old").with_expires_at(now + Duration::minutes(5)),
                )
            })
            .await;

        assert_eq!(service.purge_stale(now, Duration::hours(8)).await, 0);
        assert_eq!(service.purge_stale(now + Duration::minutes(6), Duration::hours(8)).await, 1);
        assert_eq!(service.len(), 1);

        assert_eq!(service.purge_stale(now + Duration::hours(9), Duration::hours(8)).await, 1);
        assert!(service.is_empty());
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("very-secret-token");
        assert!(!format!("{token:?}").contains("very-secret-token"));
    }
}
