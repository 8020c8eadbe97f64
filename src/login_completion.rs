//! # 登录完成处理
//!
//! 登录成功后的落地处理：按会话身份解析已授权客户端，
//! 用它的访问令牌读取用户资料，返回 `"Success. "` 加上资料的文本形式。
//!
//! 用户资料每次请求都重新获取，不缓存也不合并。

use std::sync::Arc;

use crate::auth::oauth::AuthorizedClientService;
use crate::auth::session::SessionIdentity;
use crate::error::Result;
use crate::logging::{LogComponent, LogStage};
use crate::profile::{UserInfoClient, UserProfile};
use crate::{ldebug, linfo, lwarn};

/// 成功响应前缀
pub const SUCCESS_PREFIX: &str = "Success. ";

/// 登录完成服务
#[derive(Clone)]
pub struct LoginCompletionService {
    authorized_clients: Arc<dyn AuthorizedClientService>,
    user_info_client: UserInfoClient,
}

impl std::fmt::Debug for LoginCompletionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCompletionService")
            .field("user_info_client", &self.user_info_client)
            .finish_non_exhaustive()
    }
}

impl LoginCompletionService {
    /// 创建服务
    pub fn new(
        authorized_clients: Arc<dyn AuthorizedClientService>,
        user_info_client: UserInfoClient,
    ) -> Self {
        Self {
            authorized_clients,
            user_info_client,
        }
    }

    /// 读取会话对应的用户资料
    ///
    /// 已授权客户端解析失败时不会发出任何外部请求；
    /// 用户信息端点未配置或为空白时返回空资料。
    pub async fn load_profile(&self, identity: &SessionIdentity) -> Result<UserProfile> {
        let client = self
            .authorized_clients
            .load_authorized_client(identity.registration_id(), identity.principal_name())
            .await?;

        let Some(user_info_uri) = client.registration.user_info_uri() else {
            ldebug!(
                "system",
                LogStage::UpstreamRequest,
                LogComponent::UserInfo,
                "skip_user_info",
                "No user-info endpoint configured, returning empty profile",
                registration_id = identity.registration_id()
            );
            return Ok(UserProfile::empty());
        };

        let profile = self
            .user_info_client
            .fetch(user_info_uri, &client.access_token.value)
            .await
            .inspect_err(|e| {
                lwarn!(
                    "system",
                    LogStage::UpstreamRequest,
                    LogComponent::UserInfo,
                    "fetch_user_info_failed",
                    &e.to_string(),
                    registration_id = identity.registration_id(),
                    upstream_status = ?e.upstream_status()
                );
            })?;

        linfo!(
            "system",
            LogStage::UpstreamRequest,
            LogComponent::UserInfo,
            "fetch_user_info",
            "Fetched user profile",
            registration_id = identity.registration_id(),
            attributes = profile.len()
        );

        Ok(profile)
    }

    /// 生成登录完成响应文本
    pub async fn complete(&self, identity: &SessionIdentity) -> Result<String> {
        ldebug!(
            "system",
            LogStage::Authentication,
            LogComponent::Handler,
            "login_completion",
            "Completing login",
            principal = identity.principal_name()
        );

        let profile = self.load_profile(identity).await?;
        Ok(format!("{SUCCESS_PREFIX}{profile}"))
    }
}
