pub mod handlers;

pub use handlers::*;

use axum::{
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::service::ReportService;

/// 会话 -> 最近生成的报表路径 (后写覆盖)
#[derive(Debug, Default)]
pub struct ReportSessions {
    last: DashMap<String, PathBuf>,
}

impl ReportSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, session: &str, path: PathBuf) {
        self.last.insert(session.to_string(), path);
    }

    pub fn last(&self, session: &str) -> Option<PathBuf> {
        self.last.get(session).map(|entry| entry.value().clone())
    }
}

/// 共享状态
#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<ReportService>,
    pub sessions: Arc<ReportSessions>,
}

impl AppState {
    pub fn new(reports: ReportService) -> Self {
        Self {
            reports: Arc::new(reports),
            sessions: Arc::new(ReportSessions::new()),
        }
    }
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/clients", get(list_clients))
        .route("/api/reports", post(generate_report))
        .route("/api/reports/last", get(last_report))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_are_isolated_and_last_writer_wins() {
        let sessions = ReportSessions::new();
        sessions.remember("a", PathBuf::from("/tmp/one.csv"));
        sessions.remember("a", PathBuf::from("/tmp/two.csv"));
        sessions.remember("b", PathBuf::from("/tmp/three.csv"));

        assert_eq!(sessions.last("a"), Some(PathBuf::from("/tmp/two.csv")));
        assert_eq!(sessions.last("b"), Some(PathBuf::from("/tmp/three.csv")));
        assert_eq!(sessions.last("c"), None);
    }
}
