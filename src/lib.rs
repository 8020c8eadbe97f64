//! # Login Profile
//!
//! OAuth2 登录完成服务：登录后用会话的访问令牌读取用户资料并返回

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod login_completion;
pub mod profile;
pub mod server;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, Result};
