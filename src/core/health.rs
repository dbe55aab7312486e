use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub session_id: Uuid,
    pub uptime_seconds: u64,
    pub last_tick: Option<DateTime<Utc>>,
    pub components: ComponentHealth,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub acquisition: bool,
    pub voting: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, bool>,
}

impl ComponentHealth {
    pub fn get(&self, key: &str) -> Option<bool> {
        match key {
            "acquisition" => Some(self.acquisition),
            "voting" => Some(self.voting),
            _ => self.extra.get(key).copied(),
        }
    }
}

#[derive(Debug, Clone)]
struct HealthState {
    components: ComponentHealth,
    session_id: Uuid,
    last_tick: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct HealthChecker {
    start_time: std::time::Instant,
    state: Arc<RwLock<HealthState>>,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            start_time: std::time::Instant::now(),
            state: Arc::new(RwLock::new(HealthState {
                components: ComponentHealth::default(),
                session_id: Uuid::new_v4(),
                last_tick: None,
            })),
        }
    }

    pub async fn get_status(&self) -> HealthStatus {
        let state = self.state.read().await.clone();

        let status = if state.components.acquisition && state.components.voting {
            "healthy"
        } else {
            "degraded"
        };

        HealthStatus {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            session_id: state.session_id,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            last_tick: state.last_tick,
            components: state.components,
        }
    }

    pub async fn update_component(&self, component: &str, healthy: bool) {
        let mut state = self.state.write().await;
        match component {
            "acquisition" => state.components.acquisition = healthy,
            "voting" => state.components.voting = healthy,
            _ => {
                state.components.extra.insert(component.to_string(), healthy);
            }
        }
    }

    pub async fn record_tick(&self) {
        let mut state = self.state.write().await;
        state.last_tick = Some(Utc::now());
        state.components.voting = true;
    }

    /// Starts a new voting session and returns its id.
    pub async fn new_session(&self) -> Uuid {
        let mut state = self.state.write().await;
        state.session_id = Uuid::new_v4();
        state.last_tick = None;
        state.session_id
    }

    pub async fn session_id(&self) -> Uuid {
        self.state.read().await.session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_degraded_until_all_components_up() {
        let checker = HealthChecker::new();
        assert_eq!(checker.get_status().await.status, "degraded");

        checker.update_component("acquisition", true).await;
        checker.record_tick().await;

        let status = checker.get_status().await;
        assert_eq!(status.status, "healthy");
        assert!(status.last_tick.is_some());
    }

    #[tokio::test]
    async fn test_extra_components() {
        let checker = HealthChecker::new();
        checker.update_component("export", false).await;
        let status = checker.get_status().await;
        assert_eq!(status.components.get("export"), Some(false));
        assert_eq!(status.components.get("missing"), None);
    }

    #[tokio::test]
    async fn test_new_session_changes_id() {
        let checker = HealthChecker::new();
        let before = checker.session_id().await;
        let after = checker.new_session().await;
        assert_ne!(before, after);
        assert_eq!(checker.session_id().await, after);
    }
}
