//! SQLite durable backend.
//!
//! Three tables mirror the service's historical document collections:
//! `users` (unique name key), `face_encodings` (vector stored as a
//! JSON array, owner related by name), and `access_logs` (append-only
//! audit trail).

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use wicket_core::{
    AccessEvent, Embedding, EventKind, Person, ReferenceEntry, EMBEDDING_DIM,
};

use super::{DurableBackend, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    phone       TEXT,
    email       TEXT,
    role        TEXT NOT NULL DEFAULT 'user',
    active      INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS face_encodings (
    id          INTEGER PRIMARY KEY,
    user_id     INTEGER NOT NULL REFERENCES users(id),
    user_name   TEXT NOT NULL,
    encoding    TEXT NOT NULL,
    image_name  TEXT,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_encodings_user ON face_encodings(user_id);

CREATE TABLE IF NOT EXISTS access_logs (
    id          INTEGER PRIMARY KEY,
    kind        TEXT NOT NULL,
    details     TEXT NOT NULL,
    timestamp   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON access_logs(timestamp);
";

pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (creating if needed) the database and bootstrap the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DurableBackend for SqliteBackend {
    fn upsert_person(&self, person: &Person) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO users (name, phone, email, role, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                 phone = COALESCE(excluded.phone, phone),
                 email = COALESCE(excluded.email, email),
                 active = excluded.active",
            params![
                person.name,
                person.phone,
                person.email,
                person.role.as_str(),
                person.active as i64,
                person.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn append_encoding(
        &self,
        person: &str,
        embedding: &Embedding,
        source: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.lock();
        let user_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE name = ?1",
                params![person],
                |row| row.get(0),
            )
            .optional()?;
        let user_id = match user_id {
            Some(id) => id,
            None => {
                conn.execute(
                    "INSERT INTO users (name, created_at) VALUES (?1, ?2)",
                    params![person, Utc::now().to_rfc3339()],
                )?;
                conn.last_insert_rowid()
            }
        };

        conn.execute(
            "INSERT INTO face_encodings (user_id, user_name, encoding, image_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                person,
                serde_json::to_string(&embedding.values)?,
                source,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list_encodings(&self) -> Result<Vec<ReferenceEntry>, StoreError> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT user_name, encoding FROM face_encodings ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (person, encoded) = row?;
            let values: Vec<f32> = match serde_json::from_str(&encoded) {
                Ok(v) => v,
                Err(error) => {
                    tracing::warn!(%person, %error, "skipping unparseable encoding row");
                    continue;
                }
            };
            // One corrupt row must not take down the whole gallery.
            if values.len() != EMBEDDING_DIM {
                tracing::warn!(
                    %person,
                    len = values.len(),
                    expected = EMBEDDING_DIM,
                    "skipping encoding row with wrong dimensionality"
                );
                continue;
            }
            entries.push(ReferenceEntry {
                person,
                embedding: Embedding::new(values),
            });
        }
        Ok(entries)
    }

    fn delete_person_encodings(&self, person: &str) -> Result<usize, StoreError> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM face_encodings WHERE user_name = ?1",
            params![person],
        )?;
        Ok(deleted)
    }

    fn append_event(&self, event: &AccessEvent) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO access_logs (kind, details, timestamp) VALUES (?1, ?2, ?3)",
            params![
                event.kind.as_str(),
                event.details,
                event.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list_events(
        &self,
        limit: usize,
        person: Option<&str>,
    ) -> Result<Vec<AccessEvent>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT kind, details, timestamp FROM access_logs
             WHERE ?2 IS NULL OR details LIKE '%' || ?2 || '%'
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64, person], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (kind, details, timestamp) = row?;
            let Some(kind) = EventKind::parse(&kind) else {
                tracing::warn!(%kind, "skipping audit row with unknown kind");
                continue;
            };
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            events.push(AccessEvent {
                kind,
                details,
                timestamp,
            });
        }
        Ok(events)
    }
}
