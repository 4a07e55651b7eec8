//! Access decision engine.
//!
//! Orchestrates the QR validator, face matcher, session registry and
//! encoding repository into per-frame accept/reject decisions. The
//! engine is stateless across requests except through the reference
//! set and the session registry, so independent requests never
//! serialize on each other. Every internal failure is converted to a
//! structured error outcome at this boundary — the caller is an
//! unattended embedded device that cannot recover from a crashed
//! decision service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use wicket_core::{
    match_face, qr, AccessEvent, AuditSink, Embedding, EventKind, FaceRegion, FeatureExtractor,
    ImageSize, MatchConfig, SessionRegistry,
};

use crate::notify::NotifyHandle;
use crate::store::{EncodingRepository, RebuildSummary, Sample, StoreError};

/// Terminal state of one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Granted,
    Denied,
    Error,
}

/// Structured result of one verification request.
#[derive(Debug, Clone)]
pub struct Decision {
    pub outcome: Outcome,
    pub reason: String,
    /// Matched person, on a face-stage grant.
    pub name: Option<String>,
    /// Reported confidence, on the face stage.
    pub confidence: Option<f32>,
    /// Session issued on a QR-stage grant.
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    fn new(outcome: Outcome, reason: impl Into<String>) -> Self {
        Self {
            outcome,
            reason: reason.into(),
            name: None,
            confidence: None,
            session_id: None,
            timestamp: Utc::now(),
        }
    }

    fn denied(reason: impl Into<String>) -> Self {
        Self::new(Outcome::Denied, reason)
    }

    fn error(reason: impl Into<String>) -> Self {
        Self::new(Outcome::Error, reason)
    }
}

/// Daemon status summary.
#[derive(Debug, Clone, Copy)]
pub struct EngineStatus {
    pub encodings_loaded: bool,
    pub known_people: usize,
    pub total_encodings: usize,
}

pub struct AccessEngine {
    repository: Arc<EncodingRepository>,
    sessions: Arc<SessionRegistry>,
    audit: Arc<dyn AuditSink>,
    notify: Option<NotifyHandle>,
    qr_secret: String,
    match_config: MatchConfig,
    require_qr_session: bool,
}

impl AccessEngine {
    pub fn new(
        repository: Arc<EncodingRepository>,
        sessions: Arc<SessionRegistry>,
        audit: Arc<dyn AuditSink>,
        qr_secret: String,
        match_config: MatchConfig,
        require_qr_session: bool,
    ) -> Self {
        Self {
            repository,
            sessions,
            audit,
            notify: None,
            qr_secret,
            match_config,
            require_qr_session,
        }
    }

    /// Attach the unlock-notification channel.
    pub fn with_notify(mut self, notify: NotifyHandle) -> Self {
        self.notify = Some(notify);
        self
    }

    /// Decide a QR-stage request from an already-decoded payload.
    ///
    /// `None` or a blank payload means the decoder found no QR code —
    /// a distinct outcome from a present-but-wrong payload, and
    /// audited under a different kind.
    pub fn decide_qr(&self, payload: Option<&str>) -> Decision {
        let payload = payload.map(str::trim).filter(|p| !p.is_empty());

        let Some(text) = payload else {
            self.record(EventKind::QrScanFailed, "no QR code detected");
            return Decision::denied("no QR code detected");
        };

        if qr::validate(text, &self.qr_secret) {
            let session_id = self.sessions.create();
            self.record(EventKind::QrValid, format!("session: {session_id}"));
            let mut decision = Decision::new(Outcome::Granted, "QR code validated");
            decision.session_id = Some(session_id);
            decision
        } else {
            let shown: String = text.chars().take(50).collect();
            self.record(EventKind::QrInvalid, format!("wrong QR: {shown}"));
            Decision::denied("invalid QR code")
        }
    }

    /// Decide a face-stage request from an already-computed embedding
    /// and face geometry.
    pub fn decide_face(
        &self,
        probe: &Embedding,
        region: &FaceRegion,
        image: ImageSize,
        session_id: Option<&str>,
    ) -> Decision {
        // Two-factor gating: without a live QR session the face stage
        // is not reachable (configurable for single-factor setups).
        if self.require_qr_session {
            let live = session_id.is_some_and(|id| self.sessions.exists(id));
            if !live {
                self.record(EventKind::FaceNotRecognized, "no validated QR session");
                return Decision::denied("QR stage not completed");
            }
        }

        let references = self.repository.reference_set();
        match match_face(probe, region, image, &references, &self.match_config) {
            Ok(outcome) => match outcome.name {
                Some(name) => {
                    self.record(
                        EventKind::FaceRecognized,
                        format!("name: {name}, confidence: {:.1}%", outcome.confidence),
                    );
                    if let Some(notify) = &self.notify {
                        notify.send(format!(
                            "door unlocked by {name} at {}",
                            Utc::now().format("%H:%M:%S")
                        ));
                    }
                    let mut decision = Decision::new(
                        Outcome::Granted,
                        format!("recognized with {:.1}% confidence", outcome.confidence),
                    );
                    decision.name = Some(name);
                    decision.confidence = Some(outcome.confidence);
                    decision
                }
                None => {
                    let reason = outcome.reason.to_string();
                    self.record(EventKind::FaceNotRecognized, reason.clone());
                    let mut decision = Decision::denied(reason);
                    decision.confidence = Some(outcome.confidence);
                    decision
                }
            },
            Err(error) => {
                self.record(EventKind::FaceError, error.to_string());
                Decision::error(error.to_string())
            }
        }
    }

    /// Administrator-triggered rebuild of the reference set.
    pub fn rebuild(
        &self,
        samples: &[Sample],
        extractor: &dyn FeatureExtractor,
    ) -> Result<RebuildSummary, StoreError> {
        let summary = self.repository.rebuild_from_samples(samples, extractor)?;
        self.record(
            EventKind::EncodingsReloaded,
            format!(
                "{} encodings from {} people ({} samples skipped)",
                summary.encodings, summary.people, summary.skipped
            ),
        );
        Ok(summary)
    }

    pub fn status(&self) -> EngineStatus {
        let set = self.repository.reference_set();
        EngineStatus {
            encodings_loaded: self.repository.is_loaded(),
            known_people: set.person_count(),
            total_encodings: set.len(),
        }
    }

    fn record(&self, kind: EventKind, details: impl Into<String>) {
        self.audit.record(&AccessEvent::now(kind, details));
    }
}
