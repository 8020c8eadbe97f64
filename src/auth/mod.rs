//! # 认证模块
//!
//! OAuth2 登录、会话存储以及会话提取器

pub mod cleanup;
pub mod middleware;
pub mod oauth;
pub mod session;

pub use cleanup::SessionCleanupTask;
pub use middleware::AuthenticatedSession;
pub use session::{SessionId, SessionIdentity, SessionStore};
