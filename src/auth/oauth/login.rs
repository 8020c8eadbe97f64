//! # 授权码登录流程
//!
//! 生成带 PKCE 与 state 的授权跳转地址，处理回调：
//! 校验 state、用授权码换取令牌、读取用户信息并确定登录主体。

use chrono::{TimeDelta, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{
    AccessToken, AuthorizedClient, ClientRegistration, ClientRegistrations, LoginError,
};
use crate::auth::session::{PendingAuthorization, SessionIdentity};
use crate::config::HttpClientConfig;
use crate::logging::{LogComponent, LogStage};
use crate::profile::UserInfoClient;
use crate::{ldebug, linfo, lwarn};

/// 设置了授权端点与令牌端点的客户端
type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// 授权跳转
#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    /// 身份提供商授权地址
    pub url: String,
    /// 需要保存在会话中的授权请求
    pub pending: PendingAuthorization,
}

/// 回调查询参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// 授权码
    pub code: Option<String>,
    /// 回传的 CSRF state
    pub state: Option<String>,
    /// 提供商返回的错误码
    pub error: Option<String>,
    /// 错误描述
    pub error_description: Option<String>,
}

/// 登录结果
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// 写入会话的身份
    pub identity: SessionIdentity,
    /// 需要保存的已授权客户端
    pub authorized_client: AuthorizedClient,
}

/// OAuth2 授权码登录流程
#[derive(Debug, Clone)]
pub struct OAuth2LoginFlow {
    registrations: Arc<ClientRegistrations>,
    token_http_client: reqwest::Client,
    user_info_client: UserInfoClient,
}

impl OAuth2LoginFlow {
    /// 创建登录流程
    ///
    /// 令牌端点客户端不跟随重定向，避免授权码被转发。
    pub fn new(
        registrations: Arc<ClientRegistrations>,
        config: &HttpClientConfig,
        user_info_client: UserInfoClient,
    ) -> Result<Self, LoginError> {
        let token_http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(LoginError::HttpClient)?;

        Ok(Self {
            registrations,
            token_http_client,
            user_info_client,
        })
    }

    fn registration(&self, registration_id: &str) -> Result<Arc<ClientRegistration>, LoginError> {
        self.registrations
            .find_by_registration_id(registration_id)
            .ok_or_else(|| LoginError::UnknownRegistration(registration_id.to_string()))
    }

    fn oauth_client(registration: &ClientRegistration) -> Result<ConfiguredClient, LoginError> {
        let invalid = |endpoint: &'static str| {
            move |source: url::ParseError| LoginError::InvalidEndpoint {
                registration_id: registration.registration_id.clone(),
                endpoint,
                source,
            }
        };

        let client = BasicClient::new(ClientId::new(registration.client_id.clone()))
            .set_auth_uri(
                AuthUrl::new(registration.provider.authorization_uri.clone())
                    .map_err(invalid("authorization_uri"))?,
            )
            .set_token_uri(
                TokenUrl::new(registration.provider.token_uri.clone())
                    .map_err(invalid("token_uri"))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(registration.redirect_uri.clone())
                    .map_err(invalid("redirect_uri"))?,
            );

        Ok(match &registration.client_secret {
            Some(secret) => client.set_client_secret(ClientSecret::new(secret.clone())),
            None => client,
        })
    }

    /// 生成授权跳转地址
    pub fn authorization_redirect(
        &self,
        registration_id: &str,
    ) -> Result<AuthorizationRedirect, LoginError> {
        let registration = self.registration(registration_id)?;
        let client = Self::oauth_client(&registration)?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(registration.scopes.iter().map(|s| Scope::new(s.clone())))
            .set_pkce_challenge(pkce_challenge)
            .url();

        ldebug!(
            "system",
            LogStage::Authorization,
            LogComponent::OAuthLogin,
            "authorization_redirect",
            "Built authorization redirect",
            registration_id = registration_id
        );

        Ok(AuthorizationRedirect {
            url: url.to_string(),
            pending: PendingAuthorization::new(
                registration_id,
                csrf_token.secret().clone(),
                pkce_verifier.secret().clone(),
            ),
        })
    }

    /// 完成登录
    ///
    /// `pending` 是从会话中取出的授权请求，调用方负责保证它只被使用一次。
    pub async fn complete(
        &self,
        registration_id: &str,
        params: CallbackParams,
        pending: Option<PendingAuthorization>,
    ) -> Result<LoginOutcome, LoginError> {
        let registration = self.registration(registration_id)?;

        if let Some(error) = params.error {
            lwarn!(
                "system",
                LogStage::Callback,
                LogComponent::OAuthLogin,
                "provider_denied",
                "Identity provider returned an error",
                registration_id = registration_id,
                error = %error
            );
            return Err(LoginError::ProviderDenied {
                error,
                description: params.error_description.unwrap_or_default(),
            });
        }

        let pending = pending.ok_or(LoginError::MissingAuthorizationRequest)?;
        if pending.registration_id != registration_id {
            return Err(LoginError::RegistrationMismatch {
                expected: pending.registration_id,
                actual: registration_id.to_string(),
            });
        }
        if pending.is_expired_at(Utc::now()) {
            return Err(LoginError::AuthorizationRequestExpired);
        }
        if params.state.as_deref() != Some(pending.state.as_str()) {
            return Err(LoginError::StateMismatch);
        }
        let code = params
            .code
            .filter(|code| !code.is_empty())
            .ok_or(LoginError::MissingCode)?;

        let (access_token, refresh_token) = self
            .exchange_code(&registration, code, pending.pkce_verifier)
            .await?;

        let user_info_uri = registration
            .user_info_uri()
            .ok_or_else(|| LoginError::MissingUserInfoEndpoint(registration_id.to_string()))?;
        let profile = self
            .user_info_client
            .fetch(user_info_uri, &access_token.value)
            .await?;

        let attribute = &registration.provider.user_info_endpoint.user_name_attribute;
        let principal_name = profile
            .get(attribute)
            .map(ToString::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| LoginError::MissingUserNameAttribute(attribute.clone()))?;

        linfo!(
            "system",
            LogStage::Callback,
            LogComponent::OAuthLogin,
            "login_complete",
            "OAuth2 login completed",
            registration_id = registration_id
        );

        Ok(LoginOutcome {
            identity: SessionIdentity::new(principal_name.clone(), registration_id),
            authorized_client: AuthorizedClient {
                registration,
                principal_name,
                access_token,
                refresh_token,
            },
        })
    }

    /// 用授权码换取令牌，返回访问令牌与可选的刷新令牌
    async fn exchange_code(
        &self,
        registration: &ClientRegistration,
        code: String,
        pkce_verifier: String,
    ) -> Result<(AccessToken, Option<String>), LoginError> {
        let client = Self::oauth_client(registration)?;

        let token = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&self.token_http_client)
            .await
            .map_err(|e| LoginError::TokenExchange(e.to_string()))?;

        let now = Utc::now();
        let scopes = token.scopes().map_or_else(
            || registration.scopes.clone(),
            |scopes| scopes.iter().map(|s| s.to_string()).collect(),
        );
        let mut access_token =
            AccessToken::new(token.access_token().secret().clone()).with_scopes(scopes);
        if let Some(expires_at) = token
            .expires_in()
            .and_then(|duration| TimeDelta::from_std(duration).ok())
            .and_then(|delta| now.checked_add_signed(delta))
        {
            access_token = access_token.with_expires_at(expires_at);
        }

        Ok((
            access_token,
            token.refresh_token().map(|t| t.secret().clone()),
        ))
    }
}
