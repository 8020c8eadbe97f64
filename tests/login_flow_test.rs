//! # 登录流程集成测试
//!
//! 通过路由发起完整的授权码登录：
//! 1. 未登录跳转
//! 2. 授权与回调
//! 3. 登录完成页与退出登录

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use login_profile::auth::oauth::{AccessToken, AuthorizedClient};
use login_profile::auth::session::SessionIdentity;
use login_profile::config::{AppConfig, DEFAULT_REDIRECT_URI, RegistrationConfig};
use login_profile::server::{AppState, build_router};

fn registration(server_uri: &str, user_info_uri: Option<String>) -> RegistrationConfig {
    RegistrationConfig {
        client_id: "client-1".to_string(),
        client_secret: Some("secret-1".to_string()),
        scopes: vec!["openid".to_string(), "profile".to_string()],
        redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        authorization_uri: format!("{server_uri}/auth"),
        token_uri: format!("{server_uri}/token"),
        user_info_uri,
        user_name_attribute: "email".to_string(),
    }
}

fn app_state(registrations: Vec<(&str, RegistrationConfig)>) -> AppState {
    app_state_with_base_url("http://localhost:8080", registrations)
}

fn app_state_with_base_url(
    base_url: &str,
    registrations: Vec<(&str, RegistrationConfig)>,
) -> AppState {
    let mut config = AppConfig::default();
    config.server.base_url = base_url.to_string();
    for (id, registration) in registrations {
        config.registrations.insert(id.to_string(), registration);
    }
    AppState::from_config(config).unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, cookie: Option<&str>) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    send(app, Method::GET, uri, cookie).await
}

fn location(response: &Response) -> String {
    response.headers()[LOCATION].to_str().unwrap().to_string()
}

/// `LOGIN_SESSION=<id>` 部分
fn session_cookie(response: &Response) -> String {
    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn mount_identity_provider(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"access_token":"tok-1","token_type":"bearer","expires_in":3600}"#,
            "application/json",
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"email":"alice@example.com","dept":"eng"}"#,
            "application/json",
        ))
        .mount(server)
        .await;
}

/// 发起授权，返回 (会话 Cookie, state)
async fn start_authorization(app: &Router) -> (String, String) {
    let response = get(app, "/oauth2/authorization/onelogin", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let redirect = url::Url::parse(&location(&response)).unwrap();
    let query: HashMap<_, _> = redirect.query_pairs().into_owned().collect();
    (session_cookie(&response), query["state"].clone())
}

/// 预置一个已登录会话与已授权客户端，返回会话 Cookie
async fn seed_login(state: &AppState, principal: &str) -> String {
    let registration = state.registrations.find_by_registration_id("onelogin").unwrap();
    state
        .authorized_clients
        .save_authorized_client(AuthorizedClient {
            registration,
            principal_name: principal.to_string(),
            access_token: AccessToken::new("tok-1"),
            refresh_token: None,
        })
        .await;
    let session_id = state
        .sessions
        .authenticate(None, SessionIdentity::new(principal, "onelogin"));
    format!("LOGIN_SESSION={session_id}")
}

#[tokio::test]
async fn test_full_login_flow() {
    let server = MockServer::start().await;
    mount_identity_provider(&server).await;
    let app = build_router(app_state(vec![(
        "onelogin",
        registration(&server.uri(), Some(format!("{}/userinfo", server.uri()))),
    )]));

    // 未登录时跳转到唯一的客户端注册
    let response = get(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/oauth2/authorization/onelogin");

    let (cookie, state) = start_authorization(&app).await;

    let response = get(
        &app,
        &format!("/login/oauth2/code/onelogin?code=auth-code&state={state}"),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    let authenticated = session_cookie(&response);
    assert_ne!(authenticated, cookie);

    let response = get(&app, "/", Some(&authenticated)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        body_text(response).await,
        "Success. {email=alice@example.com, dept=eng}"
    );

    let response = send(&app, Method::POST, "/logout", Some(&authenticated)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(
        response.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0")
    );

    let response = get(&app, "/", Some(&authenticated)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_authorization_redirect_targets_provider() {
    let app = build_router(app_state(vec![(
        "onelogin",
        registration("https://idp.example.com", None),
    )]));

    let response = get(&app, "/oauth2/authorization/onelogin", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("https://idp.example.com/auth?"));
    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("LOGIN_SESSION="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(!set_cookie.contains("Secure"));
}

#[tokio::test]
async fn test_https_base_url_marks_cookie_secure() {
    let app = build_router(app_state_with_base_url(
        "https://app.example.com",
        vec![("onelogin", registration("https://idp.example.com", None))],
    ));

    let response = get(&app, "/oauth2/authorization/onelogin", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("LOGIN_SESSION="));
    assert!(set_cookie.contains("Secure"));

    let response = send(&app, Method::POST, "/logout", None).await;
    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("Secure"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_duplicate_session_cookie_uses_last_value() {
    let server = MockServer::start().await;
    mount_identity_provider(&server).await;
    let state = app_state(vec![(
        "onelogin",
        registration(&server.uri(), Some(format!("{}/userinfo", server.uri()))),
    )]);
    let cookie = seed_login(&state, "alice@example.com").await;
    let app = build_router(state);

    let stale = format!("LOGIN_SESSION=stale; {cookie}");
    let response = get(&app, "/", Some(&stale)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "Success. {email=alice@example.com, dept=eng}"
    );
}

#[tokio::test]
async fn test_forged_state_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let app = build_router(app_state(vec![(
        "onelogin",
        registration(&server.uri(), Some(format!("{}/userinfo", server.uri()))),
    )]));

    let (cookie, _) = start_authorization(&app).await;
    let response = get(
        &app,
        "/login/oauth2/code/onelogin?code=auth-code&state=forged",
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_callback_without_session_is_rejected() {
    let app = build_router(app_state(vec![(
        "onelogin",
        registration("https://idp.example.com", None),
    )]));
    let response = get(&app, "/login/oauth2/code/onelogin?code=c&state=s", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_registration_is_not_found() {
    let app = build_router(app_state(vec![(
        "onelogin",
        registration("https://idp.example.com", None),
    )]));
    let response = get(&app, "/oauth2/authorization/github", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value =
        serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unauthenticated_with_several_registrations() {
    let app = build_router(app_state(vec![
        ("onelogin", registration("https://idp.example.com", None)),
        ("corp", registration("https://sso.corp.example", None)),
    ]));
    let response = get(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_blank_user_info_uri_renders_empty_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let state = app_state(vec![(
        "onelogin",
        registration(&server.uri(), Some("   ".to_string())),
    )]);
    let cookie = seed_login(&state, "alice@example.com").await;
    let app = build_router(state);

    let response = get(&app, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Success. {}");
}

#[tokio::test]
async fn test_revoked_client_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let state = app_state(vec![(
        "onelogin",
        registration(&server.uri(), Some(format!("{}/userinfo", server.uri()))),
    )]);
    let cookie = seed_login(&state, "alice@example.com").await;
    state
        .authorized_clients
        .remove_authorized_client("onelogin", "alice@example.com")
        .await;
    let app = build_router(state);

    let response = get(&app, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value =
        serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"]["code"], "CLIENT_RESOLUTION_ERROR");
    assert!(!body["error"]["message"].as_str().unwrap().contains("alice"));
}

#[tokio::test]
async fn test_user_info_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;
    let state = app_state(vec![(
        "onelogin",
        registration(&server.uri(), Some(format!("{}/userinfo", server.uri()))),
    )]);
    let cookie = seed_login(&state, "alice@example.com").await;
    let app = build_router(state);

    let response = get(&app, "/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value =
        serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"]["code"], "PROFILE_FETCH_ERROR");
    assert!(!body["error"]["message"].as_str().unwrap().contains("boom"));
}

#[tokio::test]
async fn test_health() {
    let app = build_router(app_state(vec![(
        "onelogin",
        registration("https://idp.example.com", None),
    )]));
    let response = get(&app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}
