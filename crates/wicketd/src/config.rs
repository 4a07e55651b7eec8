use std::path::PathBuf;

use wicket_core::MatchConfig;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Path to the local reference-set snapshot (load fallback).
    pub snapshot_path: PathBuf,
    /// QR secret digest; decoded payloads are checked against it
    /// directly and via SHA-256.
    pub qr_secret: String,
    /// Maximum acceptable embedding distance for a match.
    pub match_tolerance: f32,
    /// Minimum confidence percentage (0-100) required to accept.
    pub min_confidence: f32,
    /// Minimum face-box area as a fraction of the frame area.
    pub min_face_area_ratio: f32,
    /// Seconds a QR session stays valid.
    pub session_ttl_secs: i64,
    /// Whether the face stage requires a live QR session.
    ///
    /// Set `WICKETD_REQUIRE_QR_SESSION=0` to disable. Any other
    /// value, including `false`, leaves the gate enabled.
    pub require_qr_session: bool,
    /// Whether to dispatch unlock notifications.
    /// `WICKETD_NOTIFY_ENABLED=0` disables; any other value enables.
    pub notify_enabled: bool,
    /// Bound of the notification channel; overflow drops messages.
    pub notify_buffer: usize,
}

// Placeholder digest matching the historical deployment default.
// Override via WICKETD_QR_SECRET in any real installation.
const DEFAULT_QR_SECRET: &str =
    "7eb04163ef896754651041b69afe0bb9a45eb932faa787d3e93a262f7e074186";

impl Config {
    /// Load configuration from `WICKETD_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("wicket");

        let db_path = std::env::var("WICKETD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("access.db"));

        let snapshot_path = std::env::var("WICKETD_SNAPSHOT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("encodings.json"));

        Self {
            db_path,
            snapshot_path,
            qr_secret: std::env::var("WICKETD_QR_SECRET")
                .unwrap_or_else(|_| DEFAULT_QR_SECRET.to_string()),
            match_tolerance: env_f32("WICKETD_MATCH_TOLERANCE", 0.45),
            min_confidence: env_f32("WICKETD_MIN_CONFIDENCE", 52.0),
            min_face_area_ratio: env_f32("WICKETD_MIN_FACE_AREA_RATIO", 0.05),
            session_ttl_secs: env_i64("WICKETD_SESSION_TTL_SECS", 120),
            require_qr_session: env_bool("WICKETD_REQUIRE_QR_SESSION", true),
            notify_enabled: env_bool("WICKETD_NOTIFY_ENABLED", false),
            notify_buffer: env_usize("WICKETD_NOTIFY_BUFFER", 16),
        }
    }

    /// Matcher knobs as a core config value.
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            tolerance: self.match_tolerance,
            min_confidence: self.min_confidence,
            min_face_area_ratio: self.min_face_area_ratio,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).map(|v| v != "0").unwrap_or(default)
}
