//! wicket-core — Access decision logic for the wicket door-lock service.
//!
//! Pure, I/O-free building blocks: the face matcher, QR secret
//! validation, the session registry, audit event types, and the
//! trait seams to external collaborators (feature extractor, audit
//! sink). Orchestration and persistence live in `wicketd`.

pub mod audit;
pub mod extract;
pub mod matcher;
pub mod qr;
pub mod session;
pub mod types;

pub use audit::{AccessEvent, AuditSink, EventKind, TracingSink};
pub use extract::FeatureExtractor;
pub use matcher::{match_face, MatchConfig, MatchError, MatchOutcome, MatchReason};
pub use session::{Session, SessionRegistry};
pub use types::{
    Embedding, FaceRegion, ImageSize, Person, ReferenceEntry, ReferenceSet, Role, EMBEDDING_DIM,
};
