use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use server_api::{ApiContext, SessionContext};
use shared::domain::SessionId;
use tokio::sync::Mutex;
use tracing::debug;

pub(crate) const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

struct SessionSlot {
    context: Arc<Mutex<SessionContext>>,
    last_touched: Instant,
}

/// Live sessions. Each session sits behind its own lock so one user's actions run one at a
/// time while other sessions proceed. A session untouched for longer than `idle_ttl` is gone.
#[derive(Clone)]
pub(crate) struct SessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, SessionSlot>>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_SESSION_IDLE)
    }
}

impl SessionStore {
    pub(crate) fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle_ttl,
        }
    }

    pub(crate) fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    pub(crate) async fn create(&self) -> (SessionId, Arc<Mutex<SessionContext>>) {
        let id = SessionId::new();
        let context = Arc::new(Mutex::new(SessionContext::new()));
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        evict_idle(&mut sessions, self.idle_ttl, now);
        sessions.insert(
            id,
            SessionSlot {
                context: context.clone(),
                last_touched: now,
            },
        );
        (id, context)
    }

    pub(crate) async fn get(&self, id: SessionId) -> Option<Arc<Mutex<SessionContext>>> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        let slot = sessions.get_mut(&id)?;
        if now.duration_since(slot.last_touched) > self.idle_ttl {
            sessions.remove(&id);
            debug!(session_id = %id, "idle session expired");
            return None;
        }
        slot.last_touched = now;
        Some(slot.context.clone())
    }

    pub(crate) async fn remove(&self, id: SessionId) -> bool {
        self.sessions.lock().await.remove(&id).is_some()
    }

    /// Drops every idle session and returns how many went.
    pub(crate) async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        evict_idle(&mut sessions, self.idle_ttl, Instant::now())
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

fn evict_idle(
    sessions: &mut HashMap<SessionId, SessionSlot>,
    idle_ttl: Duration,
    now: Instant,
) -> usize {
    let before = sessions.len();
    sessions.retain(|_, slot| now.duration_since(slot.last_touched) <= idle_ttl);
    let evicted = before - sessions.len();
    if evicted > 0 {
        debug!(evicted, "evicted idle sessions");
    }
    evicted
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) sessions: SessionStore,
}
