//! Encoding repository — owns the active reference set and its
//! layered persistence.
//!
//! Read path: the durable backend is tried first; if it errors or is
//! empty, the local snapshot file stands in, so a briefly unreachable
//! backend degrades the service to its last materialized gallery
//! instead of an empty one. Write path is best-effort: a backend
//! failure during persistence is logged and the new encodings live on
//! in memory and in the snapshot.

mod snapshot;
mod sqlite;

pub use snapshot::SnapshotFile;
pub use sqlite::SqliteBackend;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use wicket_core::{
    AccessEvent, AuditSink, Embedding, FeatureExtractor, Person, ReferenceEntry, ReferenceSet,
    EMBEDDING_DIM,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("no sample produced a usable encoding")]
    EmptyRebuild,
}

/// The durable document store behind the repository.
///
/// Writes are treated as eventually consistent and best-effort; the
/// read used by `load` is the source of truth when it succeeds.
pub trait DurableBackend: Send + Sync {
    fn upsert_person(&self, person: &Person) -> Result<(), StoreError>;
    fn append_encoding(
        &self,
        person: &str,
        embedding: &Embedding,
        source: Option<&str>,
    ) -> Result<(), StoreError>;
    fn list_encodings(&self) -> Result<Vec<ReferenceEntry>, StoreError>;
    fn delete_person_encodings(&self, person: &str) -> Result<usize, StoreError>;
    fn append_event(&self, event: &AccessEvent) -> Result<(), StoreError>;
    fn list_events(
        &self,
        limit: usize,
        person: Option<&str>,
    ) -> Result<Vec<AccessEvent>, StoreError>;
}

/// One enrollment sample: a person name and a raw captured image.
pub struct Sample {
    pub person: String,
    pub image: Vec<u8>,
    /// Provenance tag stored alongside the encoding.
    pub source: Option<String>,
}

/// What a rebuild produced.
#[derive(Debug, Clone, Copy)]
pub struct RebuildSummary {
    pub people: usize,
    pub encodings: usize,
    pub skipped: usize,
}

/// Owner of the active in-memory reference set.
///
/// The set is an immutable snapshot behind `RwLock<Arc<..>>`: readers
/// clone the `Arc` under a brief read lock and keep matching against
/// a consistent set even while a rebuild publishes a replacement.
pub struct EncodingRepository {
    backend: Arc<dyn DurableBackend>,
    snapshot: SnapshotFile,
    active: RwLock<Arc<ReferenceSet>>,
    loaded: AtomicBool,
}

impl EncodingRepository {
    pub fn new(backend: Arc<dyn DurableBackend>, snapshot_path: PathBuf) -> Self {
        Self {
            backend,
            snapshot: SnapshotFile::new(snapshot_path),
            active: RwLock::new(Arc::new(ReferenceSet::default())),
            loaded: AtomicBool::new(false),
        }
    }

    /// Populate the reference set: durable backend first, snapshot
    /// file second, empty-and-unloaded last. Returns whether any
    /// reference data was materialized.
    pub fn load(&self) -> bool {
        match self.backend.list_encodings() {
            Ok(entries) if !entries.is_empty() => {
                tracing::info!(count = entries.len(), "loaded reference set from backend");
                self.publish(ReferenceSet::new(entries));
                return true;
            }
            Ok(_) => {
                tracing::warn!("backend holds no encodings; trying local snapshot");
            }
            Err(error) => {
                tracing::warn!(%error, "backend load failed; trying local snapshot");
            }
        }

        match self.snapshot.read() {
            Ok(set) if !set.is_empty() => {
                tracing::info!(
                    count = set.len(),
                    path = %self.snapshot.path().display(),
                    "loaded reference set from snapshot"
                );
                self.publish(set);
                true
            }
            Ok(_) => {
                tracing::warn!("snapshot is empty; reference set unloaded");
                false
            }
            Err(error) => {
                tracing::warn!(%error, "no usable snapshot; reference set unloaded");
                false
            }
        }
    }

    /// Rebuild the reference set from enrollment samples.
    ///
    /// Per-item isolation: a sample with zero or multiple detected
    /// faces, or one the extractor cannot encode, is skipped without
    /// failing the batch. If at least one embedding was produced the
    /// new set atomically replaces the active one, every encoding is
    /// persisted to the backend best-effort, and a full snapshot is
    /// written; otherwise the previous set stays untouched.
    pub fn rebuild_from_samples(
        &self,
        samples: &[Sample],
        extractor: &dyn FeatureExtractor,
    ) -> Result<RebuildSummary, StoreError> {
        let mut entries = Vec::new();
        let mut sources = Vec::new();
        let mut skipped = 0usize;

        for sample in samples {
            let faces = extractor.detect_faces(&sample.image);
            if faces.len() != 1 {
                tracing::warn!(
                    person = %sample.person,
                    faces = faces.len(),
                    "skipping sample without exactly one face"
                );
                skipped += 1;
                continue;
            }
            let Some(embedding) = extractor.extract(&sample.image, &faces[0]) else {
                tracing::warn!(person = %sample.person, "skipping sample the extractor could not encode");
                skipped += 1;
                continue;
            };
            if embedding.len() != EMBEDDING_DIM {
                tracing::warn!(
                    person = %sample.person,
                    len = embedding.len(),
                    "skipping sample with malformed embedding"
                );
                skipped += 1;
                continue;
            }
            entries.push(ReferenceEntry {
                person: sample.person.clone(),
                embedding,
            });
            sources.push(sample.source.clone());
        }

        if entries.is_empty() {
            return Err(StoreError::EmptyRebuild);
        }

        // Persist before publishing so a crash mid-rebuild leaves the
        // old set active with the old snapshot. Backend failures are
        // logged, never fatal: read availability outranks write
        // durability for the live lock.
        for (entry, source) in entries.iter().zip(&sources) {
            if let Err(error) = self.backend.upsert_person(&Person::new(&entry.person)) {
                tracing::warn!(person = %entry.person, %error, "person upsert failed");
            }
            if let Err(error) =
                self.backend
                    .append_encoding(&entry.person, &entry.embedding, source.as_deref())
            {
                tracing::warn!(person = %entry.person, %error, "encoding persist failed");
            }
        }

        let set = ReferenceSet::new(entries);
        if let Err(error) = self.snapshot.write(&set) {
            tracing::warn!(%error, "snapshot write failed");
        }

        let summary = RebuildSummary {
            people: set.person_count(),
            encodings: set.len(),
            skipped,
        };
        self.publish(set);
        tracing::info!(
            people = summary.people,
            encodings = summary.encodings,
            skipped = summary.skipped,
            "reference set rebuilt"
        );
        Ok(summary)
    }

    /// Remove every encoding for one person, from the backend and the
    /// active set. Returns the number of backend rows deleted.
    pub fn remove_person(&self, person: &str) -> Result<usize, StoreError> {
        let deleted = self.backend.delete_person_encodings(person)?;

        let current = self.reference_set();
        let remaining: Vec<ReferenceEntry> = current
            .entries
            .iter()
            .filter(|e| e.person != person)
            .cloned()
            .collect();
        let set = ReferenceSet::new(remaining);
        if let Err(error) = self.snapshot.write(&set) {
            tracing::warn!(%error, "snapshot write failed after removal");
        }
        self.publish(set);

        tracing::info!(%person, deleted, "person encodings removed");
        Ok(deleted)
    }

    /// The current reference set. Never blocks on I/O; the lock is
    /// held only to clone the `Arc`.
    pub fn reference_set(&self) -> Arc<ReferenceSet> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    fn publish(&self, set: ReferenceSet) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *active = Arc::new(set);
        self.loaded.store(true, Ordering::Release);
    }
}

/// Audit sink writing through the durable backend. Failures are
/// swallowed with a warning; auditing must never fail a decision.
pub struct BackendAuditSink {
    backend: Arc<dyn DurableBackend>,
}

impl BackendAuditSink {
    pub fn new(backend: Arc<dyn DurableBackend>) -> Self {
        Self { backend }
    }
}

impl AuditSink for BackendAuditSink {
    fn record(&self, event: &AccessEvent) {
        tracing::info!(kind = %event.kind, details = %event.details, "access event");
        if let Err(error) = self.backend.append_event(event) {
            tracing::warn!(%error, "audit persist failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::sync::Mutex;
    use wicket_core::FaceRegion;

    /// In-memory backend for engine and repository tests.
    #[derive(Default)]
    pub struct MemoryBackend {
        pub encodings: Mutex<Vec<ReferenceEntry>>,
        pub events: Mutex<Vec<AccessEvent>>,
        /// When set, every operation fails (simulated outage).
        pub unavailable: std::sync::atomic::AtomicBool,
    }

    impl MemoryBackend {
        pub fn with_encodings(entries: Vec<ReferenceEntry>) -> Self {
            Self {
                encodings: Mutex::new(entries),
                ..Self::default()
            }
        }

        pub fn set_unavailable(&self, value: bool) {
            self.unavailable.store(value, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("backend down")));
            }
            Ok(())
        }
    }

    impl DurableBackend for MemoryBackend {
        fn upsert_person(&self, _person: &Person) -> Result<(), StoreError> {
            self.check()
        }

        fn append_encoding(
            &self,
            person: &str,
            embedding: &Embedding,
            _source: Option<&str>,
        ) -> Result<(), StoreError> {
            self.check()?;
            self.encodings.lock().unwrap().push(ReferenceEntry {
                person: person.into(),
                embedding: embedding.clone(),
            });
            Ok(())
        }

        fn list_encodings(&self) -> Result<Vec<ReferenceEntry>, StoreError> {
            self.check()?;
            Ok(self.encodings.lock().unwrap().clone())
        }

        fn delete_person_encodings(&self, person: &str) -> Result<usize, StoreError> {
            self.check()?;
            let mut encodings = self.encodings.lock().unwrap();
            let before = encodings.len();
            encodings.retain(|e| e.person != person);
            Ok(before - encodings.len())
        }

        fn append_event(&self, event: &AccessEvent) -> Result<(), StoreError> {
            self.check()?;
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn list_events(
            &self,
            limit: usize,
            _person: Option<&str>,
        ) -> Result<Vec<AccessEvent>, StoreError> {
            self.check()?;
            let events = self.events.lock().unwrap();
            Ok(events.iter().rev().take(limit).cloned().collect())
        }
    }

    /// Deterministic extractor keyed on the first image byte:
    /// 0 or empty = no faces, 2 = two faces, anything else = one face
    /// whose embedding is that byte scaled into [0, 1].
    pub struct FakeExtractor;

    const REGION: FaceRegion = FaceRegion { top: 0, right: 200, bottom: 200, left: 0 };

    impl FeatureExtractor for FakeExtractor {
        fn detect_faces(&self, image: &[u8]) -> Vec<FaceRegion> {
            match image.first() {
                None | Some(0) => vec![],
                Some(2) => vec![REGION, REGION],
                Some(_) => vec![REGION],
            }
        }

        fn extract(&self, image: &[u8], _region: &FaceRegion) -> Option<Embedding> {
            image
                .first()
                .map(|b| Embedding::new(vec![*b as f32 / 255.0; EMBEDDING_DIM]))
        }
    }

    pub fn sample(person: &str, first_byte: u8) -> Sample {
        Sample {
            person: person.into(),
            image: vec![first_byte, 1, 2, 3],
            source: Some(format!("img_{first_byte}")),
        }
    }
}
