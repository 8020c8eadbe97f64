//! # 会话清理任务
//!
//! 定期移除失效的会话与过期的已授权客户端

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use super::oauth::AuthorizedClientService;
use super::session::SessionStore;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo};

/// 单轮清理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// 移除的会话数
    pub sessions: usize,
    /// 移除的已授权客户端数
    pub authorized_clients: usize,
}

/// 会话清理任务
pub struct SessionCleanupTask {
    sessions: Arc<SessionStore>,
    authorized_clients: Arc<dyn AuthorizedClientService>,
    interval: Duration,
}

impl SessionCleanupTask {
    /// 创建清理任务
    pub fn new(
        sessions: Arc<SessionStore>,
        authorized_clients: Arc<dyn AuthorizedClientService>,
        interval: Duration,
    ) -> Self {
        Self {
            sessions,
            authorized_clients,
            interval,
        }
    }

    /// 启动清理循环，不会返回
    pub async fn start(self) {
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Session,
            "cleanup_task_start",
            &format!(
                "Starting session cleanup task, interval: {}s, session ttl: {}min",
                self.interval.as_secs(),
                self.sessions.ttl().num_minutes()
            )
        );

        let mut interval = time::interval(self.interval);
        loop {
            interval.tick().await;
            self.run_once(Utc::now()).await;
        }
    }

    /// 按给定时间点执行一轮清理
    pub async fn run_once(&self, now: DateTime<Utc>) -> CleanupStats {
        let max_age: TimeDelta = self.sessions.ttl();
        let stats = CleanupStats {
            sessions: self.sessions.purge_expired(now),
            authorized_clients: self.authorized_clients.purge_stale(now, max_age).await,
        };

        if stats == CleanupStats::default() {
            ldebug!(
                "system",
                LogStage::Authentication,
                LogComponent::Session,
                "cleanup",
                "No expired sessions"
            );
        } else {
            linfo!(
                "system",
                LogStage::Authentication,
                LogComponent::Session,
                "cleanup",
                "Removed expired sessions",
                sessions = stats.sessions,
                authorized_clients = stats.authorized_clients,
                remaining = self.sessions.len()
            );
        }
        stats
    }
}
