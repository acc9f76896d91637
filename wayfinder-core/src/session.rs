// Per-session navigation state and the in-memory store that owns it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Mutable state for one navigation session: where the browser is, what has
/// happened so far and any key/value scratch data callers want carried along
/// (auth tokens, form prefills).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationContext {
    pub session_id: String,
    pub current_page: String,
    /// Event ids in execution order.
    pub history: Vec<String>,
    pub data: HashMap<String, serde_json::Value>,
    pub authenticated: bool,
    pub steps_executed: u64,
    pub failures: u64,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl NavigationContext {
    pub fn new(start_page: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            current_page: start_page.into(),
            history: Vec::new(),
            data: HashMap::new(),
            authenticated: false,
            steps_executed: 0,
            failures: 0,
            created_at: now,
            last_active: now,
        }
    }

    /// Records a completed step: moves the session to the step's destination
    /// and appends the event id to the history.
    pub fn record_event(&mut self, event_id: impl Into<String>, page: impl Into<String>, success: bool) {
        self.history.push(event_id.into());
        self.steps_executed += 1;
        if success {
            self.current_page = page.into();
        } else {
            self.failures += 1;
        }
        self.last_active = Utc::now();
    }

    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
        self.last_active = Utc::now();
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    pub fn idle_for(&self) -> Duration {
        Utc::now() - self.last_active
    }
}

/// Keyed collection of live sessions with age-based eviction.
#[derive(Debug, Default)]
pub struct ContextStore {
    sessions: HashMap<String, NavigationContext>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ctx: NavigationContext) -> String {
        let id = ctx.session_id.clone();
        self.sessions.insert(id.clone(), ctx);
        id
    }

    pub fn get(&self, session_id: &str) -> Option<&NavigationContext> {
        self.sessions.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut NavigationContext> {
        self.sessions.get_mut(session_id)
    }

    pub fn get_or_create(&mut self, session_id: &str, start_page: &str) -> &mut NavigationContext {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let mut ctx = NavigationContext::new(start_page);
                ctx.session_id = session_id.to_string();
                ctx
            })
    }

    pub fn remove(&mut self, session_id: &str) -> Option<NavigationContext> {
        self.sessions.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops sessions idle longer than `max_idle`, returning how many were
    /// evicted.
    pub fn cleanup_expired(&mut self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, ctx| ctx.idle_for() <= max_idle);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.sessions.len(), "evicted idle sessions");
        }
        evicted
    }
}
