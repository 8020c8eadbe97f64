//! # 会话认证提取器
//!
//! 从 `LOGIN_SESSION` Cookie 解析出已登录的会话身份。
//! 未登录时：只配置了一个客户端注册则跳转去登录，否则返回 401。

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use tower_cookies::Cookies;

use super::session::{SessionId, SessionIdentity, session_id_from_cookies};
use crate::error::AppError;
use crate::logging::{LogComponent, LogStage};
use crate::ldebug;
use crate::server::AppState;
use crate::server::handlers::found;

/// 已登录会话
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    /// 会话ID
    pub session_id: SessionId,
    /// 登录身份
    pub identity: SessionIdentity,
}

impl FromRequestParts<AppState> for AuthenticatedSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let authenticated = session_id_from_cookies(&cookies).and_then(|session_id| {
            state
                .sessions
                .identity(&session_id)
                .map(|identity| Self {
                    session_id,
                    identity,
                })
        });

        if let Some(session) = authenticated {
            return Ok(session);
        }

        ldebug!(
            "system",
            LogStage::Authentication,
            LogComponent::Session,
            "unauthenticated",
            "Request without an authenticated session",
            path = %parts.uri.path()
        );

        match state.registrations.single_registration_id() {
            Some(registration_id) => Err(found(&format!("/oauth2/authorization/{registration_id}"))),
            None => Err(AppError::authentication("未登录").into_response()),
        }
    }
}
