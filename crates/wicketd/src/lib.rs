//! wicketd — the wicket access-decision daemon.
//!
//! Wires the core decision logic to its collaborators: SQLite-backed
//! persistence with a local snapshot fallback, session tracking,
//! audit recording, and the fire-and-forget notification worker.
//! Transport (how frames reach the engine) lives outside this crate;
//! callers embed [`engine::AccessEngine`] directly.

pub mod config;
pub mod engine;
pub mod notify;
pub mod store;

pub use config::Config;
pub use engine::{AccessEngine, Decision, EngineStatus, Outcome};
pub use notify::{spawn_notifier, LogNotifier, NotifyHandle, Notifier};
pub use store::{
    BackendAuditSink, DurableBackend, EncodingRepository, RebuildSummary, Sample, SnapshotFile,
    SqliteBackend, StoreError,
};
