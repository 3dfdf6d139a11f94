//! Call/session registry (C7).
//!
//! Tracks one entry per live call from transport accept to transport close.
//! Backed by a `parking_lot::RwLock<HashMap>`, mutated through short
//! critical sections — no lock is held across an await point.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::usage::{UsageRecord, UsageTracker};

/// A single call/session, bound exclusively to one transport connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub organization_id: String,
    pub user_id: Option<String>,
    pub agent_id: String,
    pub transport_kind: String,
    pub created_at: DateTime<Utc>,
}

pub struct SessionHandle {
    pub session: Session,
    pub usage: Arc<UsageTracker>,
}

/// Registry of active calls, keyed by `session_id`.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new call and start its usage tracker.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        session_id: impl Into<String>,
        organization_id: impl Into<String>,
        user_id: Option<String>,
        agent_id: impl Into<String>,
        transport_kind: impl Into<String>,
        stt_provider: impl Into<String>,
        tts_provider: impl Into<String>,
    ) -> Arc<SessionHandle> {
        let session_id = session_id.into();
        let session = Session {
            session_id: session_id.clone(),
            organization_id: organization_id.into(),
            user_id,
            agent_id: agent_id.into(),
            transport_kind: transport_kind.into(),
            created_at: Utc::now(),
        };
        let usage = Arc::new(UsageTracker::start_call(
            session_id.clone(),
            stt_provider,
            tts_provider,
        ));
        let handle = Arc::new(SessionHandle { session, usage });
        self.sessions.write().insert(session_id, handle.clone());
        handle
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Remove a session, sealing its usage record. A session already
    /// removed returns `None`.
    pub fn remove(&self, session_id: &str) -> Option<UsageRecord> {
        let handle = self.sessions.write().remove(session_id)?;
        Some(handle.usage.end_call())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self) -> Vec<Session> {
        self.sessions.read().values().map(|h| h.session.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_remove_roundtrip() {
        let registry = SessionRegistry::new();
        let handle = registry.create(
            "sess-1",
            "org-1",
            Some("user-1".to_string()),
            "agent-1",
            "websocket",
            "deepgram",
            "elevenlabs",
        );
        assert_eq!(handle.session.session_id, "sess-1");
        assert_eq!(registry.len(), 1);

        handle.usage.add_llm_usage(3, 4);
        let fetched = registry.get("sess-1").unwrap();
        assert_eq!(fetched.usage.snapshot().llm_input_tokens, 3);

        let record = registry.remove("sess-1").unwrap();
        assert_eq!(record.llm_input_tokens, 3);
        assert!(registry.is_empty());
        assert!(registry.remove("sess-1").is_none());
    }
}
