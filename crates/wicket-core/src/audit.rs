//! Audit events emitted for every terminal access decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of access event. Wire names match the historical log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "QR_VALID")]
    QrValid,
    #[serde(rename = "QR_INVALID")]
    QrInvalid,
    #[serde(rename = "QR_SCAN_FAILED")]
    QrScanFailed,
    #[serde(rename = "QR_ERROR")]
    QrError,
    #[serde(rename = "FACE_RECOGNIZED")]
    FaceRecognized,
    #[serde(rename = "FACE_NOT_RECOGNIZED")]
    FaceNotRecognized,
    #[serde(rename = "FACE_ERROR")]
    FaceError,
    #[serde(rename = "ENCODINGS_RELOADED")]
    EncodingsReloaded,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::QrValid => "QR_VALID",
            EventKind::QrInvalid => "QR_INVALID",
            EventKind::QrScanFailed => "QR_SCAN_FAILED",
            EventKind::QrError => "QR_ERROR",
            EventKind::FaceRecognized => "FACE_RECOGNIZED",
            EventKind::FaceNotRecognized => "FACE_NOT_RECOGNIZED",
            EventKind::FaceError => "FACE_ERROR",
            EventKind::EncodingsReloaded => "ENCODINGS_RELOADED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "QR_VALID" => EventKind::QrValid,
            "QR_INVALID" => EventKind::QrInvalid,
            "QR_SCAN_FAILED" => EventKind::QrScanFailed,
            "QR_ERROR" => EventKind::QrError,
            "FACE_RECOGNIZED" => EventKind::FaceRecognized,
            "FACE_NOT_RECOGNIZED" => EventKind::FaceNotRecognized,
            "FACE_ERROR" => EventKind::FaceError,
            "ENCODINGS_RELOADED" => EventKind::EncodingsReloaded,
            _ => return None,
        })
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    pub kind: EventKind,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl AccessEvent {
    pub fn now(kind: EventKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Destination for audit events.
///
/// Recording is best-effort by contract: implementations must swallow
/// their own failures (logging them) so that a broken sink can never
/// block or fail an access decision.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AccessEvent);
}

/// Sink that only emits to the tracing log.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, event: &AccessEvent) {
        tracing::info!(kind = %event.kind, details = %event.details, "access event");
    }
}
