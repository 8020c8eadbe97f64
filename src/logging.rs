//! # 日志配置模块
//!
//! 提供日志初始化以及带阶段、组件标签的结构化日志宏

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 请求处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// 服务启动
    Startup,
    /// 服务关闭
    Shutdown,
    /// 登录跳转（授权请求）
    Authorization,
    /// 授权码回调
    Callback,
    /// 会话/授权客户端解析
    Authentication,
    /// 上游（身份提供商）请求
    UpstreamRequest,
    /// 错误处理
    Error,
}

impl LogStage {
    /// 阶段标识
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Authorization => "authorization",
            Self::Callback => "callback",
            Self::Authentication => "authentication",
            Self::UpstreamRequest => "upstream_request",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 主程序
    Main,
    /// 配置加载
    Config,
    /// HTTP 服务器装配
    ServerSetup,
    /// 会话存储
    Session,
    /// OAuth2 登录流程
    OAuthLogin,
    /// 授权客户端服务
    AuthorizedClient,
    /// 用户信息客户端
    UserInfo,
    /// 登录完成处理器
    Handler,
}

impl LogComponent {
    /// 组件标识
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::ServerSetup => "server_setup",
            Self::Session => "session",
            Self::OAuthLogin => "oauth_login",
            Self::AuthorizedClient => "authorized_client",
            Self::UserInfo => "user_info",
            Self::Handler => "handler",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// INFO 级结构化日志
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $($field:tt)+)?) => {
        tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($field)+,)?
            "{}",
            $message
        )
    };
}

/// WARN 级结构化日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $($field:tt)+)?) => {
        tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($field)+,)?
            "{}",
            $message
        )
    };
}

/// ERROR 级结构化日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $($field:tt)+)?) => {
        tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($field)+,)?
            "{}",
            $message
        )
    };
}

/// DEBUG 级结构化日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $($field:tt)+)?) => {
        tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($field)+,)?
            "{}",
            $message
        )
    };
}

/// 默认过滤规则
#[must_use]
pub fn default_filter(level: &str) -> String {
    format!("{level},login_profile=debug,tower_http=info,hyper=warn,reqwest=warn")
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先，其次使用 `log_level`（缺省 `info`）拼出的默认规则。
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| default_filter(level));

    let result = tracing_subscriber::registry()
        .with(EnvFilter::try_new(&log_filter).unwrap_or_else(|_| EnvFilter::new(default_filter(level))))
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();

    if result.is_err() {
        // 已有全局 subscriber（例如测试中重复初始化）
        tracing::debug!("tracing subscriber already initialised");
    }
}

/// 环境变量设置指南
pub fn print_logging_help() {
    println!("📋 日志配置指南:");
    println!("  RUST_LOG=info                          # 标准日志级别");
    println!("  RUST_LOG=debug                         # 调试级别（包含登录主体标识）");
    println!("  RUST_LOG=login_profile=trace           # 应用详细追踪");
    println!("  RUST_LOG=info,tower_http=debug         # 打印每个 HTTP 请求");
}
