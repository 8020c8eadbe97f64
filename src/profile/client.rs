//! # 用户信息客户端
//!
//! 携带 Bearer 令牌向身份提供商的 user-info 端点发起一次 GET 请求

use reqwest::Client;
use reqwest::header::ACCEPT;
use std::time::Duration;

use super::{ProfileFetchError, UserProfile};
use crate::config::HttpClientConfig;
use crate::error::{AppError, Result};

/// 错误响应体最多保留的字符数
const MAX_ERROR_BODY_CHARS: usize = 512;

/// 用户信息客户端
///
/// 只发一次请求：没有重试、没有缓存，超时由 `[http_client]` 配置限定。
#[derive(Debug, Clone)]
pub struct UserInfoClient {
    /// HTTP客户端
    http_client: Client,
    /// 单次请求超时
    request_timeout: Duration,
}

impl UserInfoClient {
    /// 根据配置创建客户端
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let request_timeout = config.request_timeout();
        let http_client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::internal_with_source("构建用户信息HTTP客户端失败", e))?;

        Ok(Self {
            http_client,
            request_timeout,
        })
    }

    /// 获取用户资料
    ///
    /// 非 2xx 状态、传输失败、超时或响应体不是 JSON 对象都归为 [`ProfileFetchError`]。
    pub async fn fetch(
        &self,
        user_info_uri: &str,
        access_token: &str,
    ) -> std::result::Result<UserProfile, ProfileFetchError> {
        let url = url::Url::parse(user_info_uri).map_err(|source| ProfileFetchError::InvalidUri {
            uri: user_info_uri.to_string(),
            source,
        })?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProfileFetchError::Status {
                status: status.as_u16(),
                body: error_text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        serde_json::from_slice::<UserProfile>(&body).map_err(ProfileFetchError::Decode)
    }

    fn classify(&self, error: reqwest::Error) -> ProfileFetchError {
        if error.is_timeout() {
            ProfileFetchError::Timeout(self.request_timeout)
        } else {
            ProfileFetchError::Transport(error)
        }
    }
}
