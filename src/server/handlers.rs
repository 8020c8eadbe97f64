//! # 路由处理器

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::response::{IntoResponse, Response};
use tower_cookies::Cookies;

use super::AppState;
use crate::auth::AuthenticatedSession;
use crate::auth::oauth::CallbackParams;
use crate::auth::session::{expired_session_cookie, session_cookie, session_id_from_cookies};
use crate::error::Result;
use crate::linfo;
use crate::logging::{LogComponent, LogStage};

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// 302 跳转
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// 登录完成页
pub async fn home(
    State(state): State<AppState>,
    session: AuthenticatedSession,
) -> Result<Response> {
    let body = state.completion.complete(&session.identity).await?;
    Ok(([(CONTENT_TYPE, TEXT_PLAIN_UTF8)], body).into_response())
}

/// 发起授权：记录 state 与 PKCE verifier 后跳转到身份提供商
pub async fn authorize(
    State(state): State<AppState>,
    Path(registration_id): Path<String>,
    cookies: Cookies,
) -> Result<Response> {
    let redirect = state.login_flow.authorization_redirect(&registration_id)?;

    let session_id = session_id_from_cookies(&cookies)
        .filter(|id| state.sessions.contains(id))
        .unwrap_or_else(|| state.sessions.create());
    state
        .sessions
        .begin_authorization(&session_id, redirect.pending);

    cookies.add(session_cookie(&session_id, state.secure_cookies));
    Ok(found(&redirect.url))
}

/// 授权回调
pub async fn callback(
    State(state): State<AppState>,
    Path(registration_id): Path<String>,
    Query(params): Query<CallbackParams>,
    cookies: Cookies,
) -> Result<Response> {
    let previous = session_id_from_cookies(&cookies);
    let pending = previous.and_then(|id| state.sessions.take_pending(&id));

    let outcome = state
        .login_flow
        .complete(&registration_id, params, pending)
        .await?;

    state
        .authorized_clients
        .save_authorized_client(outcome.authorized_client)
        .await;
    let session_id = state
        .sessions
        .authenticate(previous.as_ref(), outcome.identity);

    cookies.add(session_cookie(&session_id, state.secure_cookies));
    Ok(found("/"))
}

/// 退出登录
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> StatusCode {
    let identity = session_id_from_cookies(&cookies)
        .and_then(|id| state.sessions.invalidate(&id))
        .and_then(|session| session.identity);

    if let Some(identity) = identity {
        state
            .authorized_clients
            .remove_authorized_client(identity.registration_id(), identity.principal_name())
            .await;
        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::Session,
            "logout",
            "Session invalidated",
            registration_id = identity.registration_id()
        );
    }

    cookies.add(expired_session_cookie(state.secure_cookies));
    StatusCode::NO_CONTENT
}

/// 健康检查
pub async fn health() -> &'static str {
    "ok"
}
