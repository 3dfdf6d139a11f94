//! WebSocket connection manager (C9).
//!
//! Tracks every live connection in four indices (by connection id, user id,
//! agent id, session id), runs a single process-wide heartbeat loop, and
//! drains every connection on `stop()`. Grounded on the four-registry,
//! heartbeat-loop, graceful-drain shape of a production WebSocket manager;
//! the registry itself holds no socket — it's the session supervisor's job
//! to close the underlying transport when `disconnect` fires.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Authenticated,
    Active,
    Closing,
    Closed,
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub state: ConnectionState,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub missed_pings: u32,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub session_id: Option<String>,
}

impl ConnectionInfo {
    fn new(connection_id: String, agent_id: Option<String>, session_id: Option<String>, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            connection_id,
            state: ConnectionState::Connecting,
            connected_at: now,
            last_activity: now,
            missed_pings: 0,
            user_id,
            agent_id,
            session_id,
        }
    }

    pub fn is_stale(&self, stale_timeout: Duration) -> bool {
        let elapsed = Utc::now().signed_duration_since(self.last_activity);
        elapsed.to_std().map(|d| d > stale_timeout).unwrap_or(false)
    }
}

struct Registries {
    connections: HashMap<String, ConnectionInfo>,
    by_user: HashMap<String, HashSet<String>>,
    by_agent: HashMap<String, HashSet<String>>,
    by_session: HashMap<String, HashSet<String>>,
}

/// Process-wide registry of active WebSocket connections, plus the
/// heartbeat/stale-disconnect loop that keeps it honest.
pub struct ConnectionRegistry {
    registries: RwLock<Registries>,
    max_connections: usize,
    heartbeat_interval: Duration,
    stale_timeout: Duration,
    shutdown: Notify,
}

/// A connection was refused because the registry is at `max_connections`.
#[derive(Debug, thiserror::Error)]
#[error("server overloaded: {0} connections at capacity")]
pub struct ServerOverloaded(pub usize);

impl ConnectionRegistry {
    pub fn new(max_connections: usize, heartbeat_interval: Duration, stale_timeout: Duration) -> Self {
        Self {
            registries: RwLock::new(Registries {
                connections: HashMap::new(),
                by_user: HashMap::new(),
                by_agent: HashMap::new(),
                by_session: HashMap::new(),
            }),
            max_connections,
            heartbeat_interval,
            stale_timeout,
            shutdown: Notify::new(),
        }
    }

    pub fn register(
        &self,
        connection_id: String,
        agent_id: Option<String>,
        session_id: Option<String>,
        user_id: Option<String>,
    ) -> Result<(), ServerOverloaded> {
        let mut reg = self.registries.write();
        if reg.connections.len() >= self.max_connections {
            return Err(ServerOverloaded(self.max_connections));
        }

        if let Some(uid) = &user_id {
            reg.by_user.entry(uid.clone()).or_default().insert(connection_id.clone());
        }
        if let Some(aid) = &agent_id {
            reg.by_agent.entry(aid.clone()).or_default().insert(connection_id.clone());
        }
        if let Some(sid) = &session_id {
            reg.by_session.entry(sid.clone()).or_default().insert(connection_id.clone());
        }
        reg.connections.insert(
            connection_id.clone(),
            ConnectionInfo::new(connection_id, agent_id, session_id, user_id),
        );
        Ok(())
    }

    pub fn set_state(&self, connection_id: &str, state: ConnectionState) {
        if let Some(info) = self.registries.write().connections.get_mut(connection_id) {
            info.state = state;
        }
    }

    pub fn touch(&self, connection_id: &str) {
        let mut reg = self.registries.write();
        if let Some(info) = reg.connections.get_mut(connection_id) {
            info.last_activity = Utc::now();
            info.missed_pings = 0;
        }
    }

    /// Record that a heartbeat ping was sent with no reply since the last
    /// `touch`. Returns the new consecutive-miss count (0 if the
    /// connection is no longer registered).
    pub fn record_ping_sent(&self, connection_id: &str) -> u32 {
        let mut reg = self.registries.write();
        match reg.connections.get_mut(connection_id) {
            Some(info) => {
                info.missed_pings += 1;
                info.missed_pings
            }
            None => 0,
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn get(&self, connection_id: &str) -> Option<ConnectionInfo> {
        self.registries.read().connections.get(connection_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.registries.read().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a connection from every index. Idempotent.
    pub fn disconnect(&self, connection_id: &str, _reason: &str) {
        let mut reg = self.registries.write();
        let Some(info) = reg.connections.remove(connection_id) else { return };
        if let Some(uid) = &info.user_id {
            if let Some(set) = reg.by_user.get_mut(uid) {
                set.remove(connection_id);
                if set.is_empty() {
                    reg.by_user.remove(uid);
                }
            }
        }
        if let Some(aid) = &info.agent_id {
            if let Some(set) = reg.by_agent.get_mut(aid) {
                set.remove(connection_id);
                if set.is_empty() {
                    reg.by_agent.remove(aid);
                }
            }
        }
        if let Some(sid) = &info.session_id {
            if let Some(set) = reg.by_session.get_mut(sid) {
                set.remove(connection_id);
                if set.is_empty() {
                    reg.by_session.remove(sid);
                }
            }
        }
    }

    /// List connection ids currently past `stale_timeout` with no activity.
    fn stale_connection_ids(&self) -> Vec<String> {
        let reg = self.registries.read();
        reg.connections
            .values()
            .filter(|c| c.is_stale(self.stale_timeout))
            .map(|c| c.connection_id.clone())
            .collect()
    }

    pub fn connection_ids(&self) -> Vec<String> {
        self.registries.read().connections.keys().cloned().collect()
    }

    /// Run the heartbeat loop: periodically disconnect stale connections.
    /// Sending the actual ping frame is the caller's job (it owns the
    /// socket); this loop only evicts connections that never answered.
    pub async fn run_heartbeat<F>(self: Arc<Self>, mut on_stale: F)
    where
        F: FnMut(&str) + Send,
    {
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for id in self.stale_connection_ids() {
                        on_stale(&id);
                        self.disconnect(&id, "stale");
                    }
                }
                _ = self.shutdown.notified() => return,
            }
        }
    }

    /// Drain every connection concurrently with reason `server_shutdown`
    /// and stop the heartbeat loop.
    pub fn stop(&self) {
        for id in self.connection_ids() {
            self.disconnect(&id, "server_shutdown");
        }
        self.shutdown.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_indexes_by_user_agent_session() {
        let registry = ConnectionRegistry::new(10, Duration::from_secs(30), Duration::from_secs(120));
        registry
            .register("c1".into(), Some("agent-1".into()), Some("sess-1".into()), Some("user-1".into()))
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("c1").is_some());
    }

    #[test]
    fn disconnect_removes_from_all_indices() {
        let registry = ConnectionRegistry::new(10, Duration::from_secs(30), Duration::from_secs(120));
        registry
            .register("c1".into(), Some("agent-1".into()), Some("sess-1".into()), Some("user-1".into()))
            .unwrap();
        registry.disconnect("c1", "normal");
        assert!(registry.is_empty());
        let reg = registry.registries.read();
        assert!(reg.by_user.is_empty());
        assert!(reg.by_agent.is_empty());
        assert!(reg.by_session.is_empty());
    }

    #[test]
    fn max_connections_enforced() {
        let registry = ConnectionRegistry::new(1, Duration::from_secs(30), Duration::from_secs(120));
        registry.register("c1".into(), None, None, None).unwrap();
        assert!(registry.register("c2".into(), None, None, None).is_err());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let registry = ConnectionRegistry::new(10, Duration::from_secs(30), Duration::from_secs(120));
        registry.register("c1".into(), None, None, None).unwrap();
        registry.disconnect("c1", "normal");
        registry.disconnect("c1", "normal");
        assert!(registry.is_empty());
    }

    #[test]
    fn stale_detection_respects_timeout() {
        let registry = ConnectionRegistry::new(10, Duration::from_secs(30), Duration::from_millis(0));
        registry.register("c1".into(), None, None, None).unwrap();
        assert_eq!(registry.stale_connection_ids(), vec!["c1".to_string()]);
    }

    #[test]
    fn record_ping_sent_increments_until_touch_resets() {
        let registry = ConnectionRegistry::new(10, Duration::from_secs(30), Duration::from_secs(120));
        registry.register("c1".into(), None, None, None).unwrap();
        assert_eq!(registry.record_ping_sent("c1"), 1);
        assert_eq!(registry.record_ping_sent("c1"), 2);
        registry.touch("c1");
        assert_eq!(registry.get("c1").unwrap().missed_pings, 0);
        assert_eq!(registry.record_ping_sent("c1"), 1);
    }

    #[test]
    fn stop_drains_all_connections() {
        let registry = ConnectionRegistry::new(10, Duration::from_secs(30), Duration::from_secs(120));
        registry.register("c1".into(), None, None, None).unwrap();
        registry.register("c2".into(), None, None, None).unwrap();
        registry.stop();
        assert!(registry.is_empty());
    }
}
