use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use wicket_core::{AuditSink, SessionRegistry};
use wicketd::{
    spawn_notifier, AccessEngine, BackendAuditSink, Config, DurableBackend, EncodingRepository,
    LogNotifier, SqliteBackend,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("wicketd starting");

    let config = Config::from_env();
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let backend: Arc<dyn DurableBackend> = Arc::new(SqliteBackend::open(&config.db_path)?);
    tracing::info!(path = %config.db_path.display(), "database opened");

    let repository = Arc::new(EncodingRepository::new(
        Arc::clone(&backend),
        config.snapshot_path.clone(),
    ));
    if !repository.load() {
        tracing::warn!("no reference data; face stage will deny until encodings are enrolled");
    }

    let sessions = Arc::new(SessionRegistry::new(config.session_ttl_secs));
    let audit: Arc<dyn AuditSink> = Arc::new(BackendAuditSink::new(Arc::clone(&backend)));

    let mut engine = AccessEngine::new(
        repository,
        sessions,
        audit,
        config.qr_secret.clone(),
        config.match_config(),
        config.require_qr_session,
    );
    if config.notify_enabled {
        engine = engine.with_notify(spawn_notifier(Box::new(LogNotifier), config.notify_buffer));
    }

    let status = engine.status();
    tracing::info!(
        loaded = status.encodings_loaded,
        people = status.known_people,
        encodings = status.total_encodings,
        "wicketd ready"
    );

    // Keep running until signaled; the engine is driven by embedding
    // callers for the lifetime of the process.
    tokio::signal::ctrl_c().await?;
    tracing::info!("wicketd shutting down");

    Ok(())
}
