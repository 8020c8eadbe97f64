//! # 会话管理
//!
//! 基于 Cookie 的内存会话：保存登录身份以及进行中的授权请求。
//! 未登录会话在授权请求有效期后失效，已登录会话在配置的有效期后失效，
//! 失效会话由后台清理任务移除。

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::fmt;
use std::str::FromStr;
use tower_cookies::cookie::{SameSite, time};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

/// 会话 Cookie 名称
pub const SESSION_COOKIE: &str = "LOGIN_SESSION";

/// 授权请求的有效期（分钟）
pub const AUTHORIZATION_REQUEST_TTL_MINUTES: i64 = 10;

/// 已登录会话的默认有效期（分钟）
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 480;

/// 会话ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// 生成随机会话ID
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// 会话身份
///
/// 由登录流程写入，登录完成处理器只读。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    principal_name: String,
    registration_id: String,
}

impl SessionIdentity {
    /// 创建会话身份
    pub fn new(principal_name: impl Into<String>, registration_id: impl Into<String>) -> Self {
        Self {
            principal_name: principal_name.into(),
            registration_id: registration_id.into(),
        }
    }

    /// 登录主体名称
    #[must_use]
    pub fn principal_name(&self) -> &str {
        &self.principal_name
    }

    /// 客户端注册ID
    #[must_use]
    pub fn registration_id(&self) -> &str {
        &self.registration_id
    }
}

/// 进行中的授权请求
#[derive(Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    /// 客户端注册ID
    pub registration_id: String,
    /// CSRF state
    pub state: String,
    /// PKCE code verifier
    pub pkce_verifier: String,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    /// 创建授权请求
    pub fn new(
        registration_id: impl Into<String>,
        state: impl Into<String>,
        pkce_verifier: impl Into<String>,
    ) -> Self {
        Self {
            registration_id: registration_id.into(),
            state: state.into(),
            pkce_verifier: pkce_verifier.into(),
            created_at: Utc::now(),
        }
    }

    /// 在给定时间点是否已过期
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::minutes(AUTHORIZATION_REQUEST_TTL_MINUTES)
    }
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("registration_id", &self.registration_id)
            .field("state", &self.state)
            .field("pkce_verifier", &"***")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// 会话
#[derive(Debug, Clone)]
pub struct Session {
    /// 登录身份
    pub identity: Option<SessionIdentity>,
    /// 进行中的授权请求
    pub pending: Option<PendingAuthorization>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            identity: None,
            pending: None,
            created_at: Utc::now(),
        }
    }
}

impl Session {
    /// 在给定时间点是否已失效
    ///
    /// 已登录会话按 `ttl` 计算；未登录会话以最近一次授权请求（或创建时间）为起点，
    /// 按授权请求有效期计算。
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        if self.identity.is_some() {
            return now - self.created_at > ttl;
        }
        let last_activity = self
            .pending
            .as_ref()
            .map_or(self.created_at, |pending| pending.created_at);
        now - last_activity > Duration::minutes(AUTHORIZATION_REQUEST_TTL_MINUTES)
    }
}

/// 内存会话存储
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Session>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_SESSION_TTL_MINUTES))
    }
}

impl SessionStore {
    /// 创建空存储，`ttl` 为已登录会话的有效期
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// 已登录会话有效期
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 创建新会话
    #[must_use]
    pub fn create(&self) -> SessionId {
        let id = SessionId::random();
        self.sessions.insert(id, Session::default());
        id
    }

    /// 会话是否存在且未失效
    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions
            .get(id)
            .is_some_and(|session| !session.is_expired_at(Utc::now(), self.ttl))
    }

    /// 读取会话身份，失效会话视为未登录
    #[must_use]
    pub fn identity(&self, id: &SessionId) -> Option<SessionIdentity> {
        self.sessions
            .get(id)
            .filter(|session| !session.is_expired_at(Utc::now(), self.ttl))
            .and_then(|session| session.identity.clone())
    }

    /// 记录授权请求（覆盖之前未完成的请求）
    pub fn begin_authorization(&self, id: &SessionId, pending: PendingAuthorization) -> bool {
        self.sessions
            .get_mut(id)
            .map(|mut session| session.pending = Some(pending))
            .is_some()
    }

    /// 取出授权请求，一次性使用
    #[must_use]
    pub fn take_pending(&self, id: &SessionId) -> Option<PendingAuthorization> {
        self.sessions
            .get_mut(id)
            .and_then(|mut session| session.pending.take())
    }

    /// 登录成功：轮换会话ID并写入身份，返回新的会话ID
    #[must_use]
    pub fn authenticate(&self, previous: Option<&SessionId>, identity: SessionIdentity) -> SessionId {
        if let Some(previous) = previous {
            self.sessions.remove(previous);
        }
        let id = SessionId::random();
        self.sessions.insert(
            id,
            Session {
                identity: Some(identity),
                ..Session::default()
            },
        );
        id
    }

    /// 销毁会话
    pub fn invalidate(&self, id: &SessionId) -> Option<Session> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    /// 移除在给定时间点已失效的会话，返回移除数量
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.sessions.retain(|_, session| {
            let expired = session.is_expired_at(now, self.ttl);
            removed += usize::from(expired);
            !expired
        });
        removed
    }

    /// 会话数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// 从请求 Cookie 读取会话ID
///
/// 同名 Cookie 出现多次时以最后一个为准。
#[must_use]
pub fn session_id_from_cookies(cookies: &Cookies) -> Option<SessionId> {
    cookies
        .get(SESSION_COOKIE)
        .and_then(|cookie| cookie.value().parse().ok())
}

/// 会话 Cookie
#[must_use]
pub fn session_cookie(id: &SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// 使会话 Cookie 失效
#[must_use]
pub fn expired_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .build()
}
