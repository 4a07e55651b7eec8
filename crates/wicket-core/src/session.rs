//! Session registry — ephemeral proof that the QR stage passed.
//!
//! Sessions are created only on QR success and expire after a
//! configurable TTL. Expired entries answer `exists` with false and
//! are pruned opportunistically on the next `create`.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// One QR-validated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub qr_validated: bool,
}

/// Concurrent map of live sessions.
pub struct SessionRegistry {
    ttl: Duration,
    inner: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Create a fresh session and return its identifier.
    ///
    /// Identifiers are v4 UUIDs; concurrent calls always yield
    /// distinct tokens. Expired sessions are pruned here so the map
    /// cannot grow without bound on an unattended device.
    pub fn create(&self) -> String {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            qr_validated: true,
        };
        let id = session.id.clone();

        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.retain(|_, s| now - s.created_at <= self.ttl);
        map.insert(id.clone(), session);
        id
    }

    /// Whether a live (non-expired) session with this id exists.
    pub fn exists(&self, id: &str) -> bool {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match map.get(id) {
            Some(s) => s.qr_validated && Utc::now() - s.created_at <= self.ttl,
            None => false,
        }
    }

    /// Number of tracked sessions, including not-yet-pruned expired ones.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
