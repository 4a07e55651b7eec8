//! Interface to the external feature extractor.
//!
//! The computer-vision model lives outside this system: the core only
//! consumes detected face regions and fixed-length embeddings. This
//! trait is the seam the repository rebuild path calls through; the
//! production implementation is supplied by the deployment, and tests
//! use deterministic fakes.

use crate::types::{Embedding, FaceRegion};

/// Produces face regions and embeddings from raw image bytes.
pub trait FeatureExtractor: Send + Sync {
    /// Detect face bounding boxes in a raw image. Zero detections is
    /// a normal outcome, not an error.
    fn detect_faces(&self, image: &[u8]) -> Vec<FaceRegion>;

    /// Compute the embedding for one detected face. `None` means the
    /// face could not be encoded; callers must tolerate this.
    fn extract(&self, image: &[u8], region: &FaceRegion) -> Option<Embedding>;
}
