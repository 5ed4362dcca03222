use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 60;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("transport shutdown failed: {0}")]
pub struct TransportError(pub String);

/// Long-lived per-client connection owned by the registry.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn shutdown(&self) -> Result<(), TransportError>;
}

/// Snapshot of a registry entry. The transport is shared, the timestamps are
/// copies taken at lookup time.
pub struct Session<T> {
    pub id: Uuid,
    pub transport: Arc<T>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl<T> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            transport: Arc::clone(&self.transport),
            created_at: self.created_at,
            last_seen_at: self.last_seen_at,
        }
    }
}

/// Session id → transport map with lazy TTL eviction. The map lock guards a
/// single map operation and is never held across an await.
pub struct SessionRegistry<T> {
    sessions: Mutex<HashMap<Uuid, Session<T>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<T: SessionTransport> SessionRegistry<T> {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn create(&self, transport: Arc<T>) -> Session<T> {
        let now = self.clock.now();
        let session = Session {
            id: Uuid::now_v7(),
            transport,
            created_at: now,
            last_seen_at: now,
        };
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.id, session.clone());
        tracing::info!(event = "session_created", session_id = %session.id, "session created");
        session
    }

    pub fn lookup(&self, id: &Uuid) -> Option<Session<T>> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Mark the session as seen now. No-op for unknown or evicted ids.
    pub fn touch(&self, id: &Uuid) {
        let now = self.clock.now();
        if let Some(session) = self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(id)
        {
            session.last_seen_at = session.last_seen_at.max(now);
        }
    }

    /// Remove the session and shut its transport down. Returns false when the
    /// id was unknown. Shutdown failures are logged; the entry is gone either
    /// way.
    pub async fn close(&self, id: &Uuid) -> bool {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        match removed {
            Some(session) => {
                shutdown_transport(&session, "closed").await;
                true
            }
            None => false,
        }
    }

    /// Evict and close every session idle for longer than the TTL as of
    /// `now`. Returns how many were evicted.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<Session<T>> = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            let ids: Vec<Uuid> = sessions
                .values()
                .filter(|session| now - session.last_seen_at > self.ttl)
                .map(|session| session.id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };
        for session in &expired {
            shutdown_transport(session, "expired").await;
        }
        expired.len()
    }

    pub async fn sweep_expired(&self) -> usize {
        self.sweep(self.clock.now()).await
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn shutdown_transport<T: SessionTransport>(session: &Session<T>, reason: &'static str) {
    match session.transport.shutdown().await {
        Ok(()) => tracing::info!(
            event = "session_closed",
            session_id = %session.id,
            reason,
            "session closed"
        ),
        Err(e) => tracing::warn!(
            event = "session_shutdown_failed",
            session_id = %session.id,
            reason,
            error = %e,
            "transport shutdown failed; session evicted anyway"
        ),
    }
}
