//! # HTTP 服务器
//!
//! 组装应用状态与路由，并负责监听与优雅关闭

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::auth::oauth::{
    AuthorizedClientService, ClientRegistrations, InMemoryAuthorizedClientService,
    OAuth2LoginFlow,
};
use crate::auth::SessionCleanupTask;
use crate::auth::session::SessionStore;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::linfo;
use crate::logging::{LogComponent, LogStage};
use crate::login_completion::LoginCompletionService;
use crate::profile::UserInfoClient;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 会话 Cookie 是否带 `Secure`
    pub secure_cookies: bool,
    /// 客户端注册
    pub registrations: Arc<ClientRegistrations>,
    /// 会话存储
    pub sessions: Arc<SessionStore>,
    /// 已授权客户端服务
    pub authorized_clients: Arc<dyn AuthorizedClientService>,
    /// 授权码登录流程
    pub login_flow: Arc<OAuth2LoginFlow>,
    /// 登录完成服务
    pub completion: LoginCompletionService,
}

impl AppState {
    /// 根据配置构建全部组件
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let registrations = Arc::new(ClientRegistrations::from_config(&config));
        let user_info_client = UserInfoClient::new(&config.http_client)?;
        let authorized_clients: Arc<dyn AuthorizedClientService> = Arc::new(
            InMemoryAuthorizedClientService::new(Arc::clone(&registrations)),
        );
        let login_flow = OAuth2LoginFlow::new(
            Arc::clone(&registrations),
            &config.http_client,
            user_info_client.clone(),
        )?;
        let completion =
            LoginCompletionService::new(Arc::clone(&authorized_clients), user_info_client);

        Ok(Self {
            secure_cookies: config.server.secure_cookies(),
            registrations,
            sessions: Arc::new(SessionStore::new(config.session.ttl())),
            authorized_clients,
            login_flow: Arc::new(login_flow),
            completion,
        })
    }
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route(
            "/oauth2/authorization/{registration_id}",
            get(handlers::authorize),
        )
        .route(
            "/login/oauth2/code/{registration_id}",
            get(handlers::callback),
        )
        .route("/logout", post(handlers::logout))
        .route("/health", get(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new()),
        )
        .with_state(state)
}

/// 登录服务器
pub struct LoginServer {
    addr: SocketAddr,
    router: Router,
    cleanup: SessionCleanupTask,
}

impl LoginServer {
    /// 创建服务器
    pub fn new(config: AppConfig) -> Result<Self> {
        let addr = config.server.socket_addr()?;
        let cleanup_interval = config.session.cleanup_interval();
        let state = AppState::from_config(config)?;
        let cleanup = SessionCleanupTask::new(
            Arc::clone(&state.sessions),
            Arc::clone(&state.authorized_clients),
            cleanup_interval,
        );

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "router_ready",
            "Router configured",
            registrations = ?state.registrations.registration_ids()
        );

        Ok(Self {
            addr,
            router: build_router(state),
            cleanup,
        })
    }

    /// 启动服务器，直到收到 Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            AppError::server_start_with_source(format!("无法绑定地址 {}", self.addr), e)
        })?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "server_start",
            &format!("Starting login server on {}", self.addr)
        );

        let cleanup = tokio::spawn(self.cleanup.start());

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        cleanup.abort();
        served.map_err(|e| AppError::server_start_with_source("服务器运行失败", e))?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "server_stopped",
            "Login server stopped"
        );
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "无法监听关闭信号");
        std::future::pending::<()>().await;
    }
}
