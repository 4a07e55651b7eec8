//! Face matcher — compares a probe embedding against the active
//! reference set and decides whether to accept the best candidate.
//!
//! Gates run in a fixed order, each able to terminate with a
//! rejection: geometric admissibility, empty-reference guard,
//! distance argmin, dual-threshold acceptance, then a per-person
//! consistency re-score of the reported confidence.

use thiserror::Error;

use crate::types::{Embedding, FaceRegion, ImageSize, ReferenceSet, EMBEDDING_DIM};

/// Deployment-tunable matcher knobs.
#[derive(Debug, Clone, Copy)]
pub struct MatchConfig {
    /// Maximum acceptable embedding distance. Smaller = stricter.
    pub tolerance: f32,
    /// Minimum confidence percentage (0-100) required to accept.
    pub min_confidence: f32,
    /// Minimum face-box area as a fraction of the frame area.
    pub min_face_area_ratio: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.45,
            min_confidence: 52.0,
            min_face_area_ratio: 0.05,
        }
    }
}

/// Why a probe was not matched. These are normal outcomes, not
/// faults, and each maps to a distinct operator-facing diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    Recognized,
    FaceTooSmall,
    NoReferenceData,
    ConfidenceTooLow,
    NoMatch,
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            MatchReason::Recognized => "recognized",
            MatchReason::FaceTooSmall => "face too small or too far; move closer to the camera",
            MatchReason::NoReferenceData => "no reference data loaded",
            MatchReason::ConfidenceTooLow => "confidence too low; face not in database",
            MatchReason::NoMatch => "face not recognized; no match found",
        };
        f.write_str(msg)
    }
}

/// Result of matching one probe against the reference set.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Name of the accepted person, if any.
    pub name: Option<String>,
    /// Confidence percentage (0-100). For an accepted match this is
    /// the consistency-rescored value over all of the person's
    /// encodings; for a rejection it reflects the best candidate.
    pub confidence: f32,
    pub reason: MatchReason,
}

impl MatchOutcome {
    fn rejected(reason: MatchReason, confidence: f32) -> Self {
        Self { name: None, confidence, reason }
    }
}

/// Data-corruption conditions. Unlike [`MatchReason`] rejections these
/// are system faults and surface as errors.
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("embedding has {actual} components, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("frame has zero area")]
    DegenerateImage,
}

/// Re-express a distance as a 0-100 confidence percentage.
fn confidence_from_distance(distance: f32) -> f32 {
    ((1.0 - distance) * 100.0).clamp(0.0, 100.0)
}

/// Match a probe embedding against the reference set.
///
/// Read-only over the set; safe to call concurrently with a reload,
/// which publishes a fresh set rather than mutating this one.
pub fn match_face(
    probe: &Embedding,
    region: &FaceRegion,
    image: ImageSize,
    references: &ReferenceSet,
    config: &MatchConfig,
) -> Result<MatchOutcome, MatchError> {
    if image.area() == 0 {
        return Err(MatchError::DegenerateImage);
    }
    if probe.len() != EMBEDDING_DIM {
        return Err(MatchError::DimensionMismatch {
            expected: EMBEDDING_DIM,
            actual: probe.len(),
        });
    }

    // Gate 1: geometric admissibility. A face occupying too little of
    // the frame is rejected before any embedding comparison, so a
    // low-resolution capture can never produce a false accept.
    let area_ratio = region.area() as f32 / image.area() as f32;
    if area_ratio < config.min_face_area_ratio {
        tracing::debug!(area_ratio, "face below minimum area ratio");
        return Ok(MatchOutcome::rejected(MatchReason::FaceTooSmall, 0.0));
    }

    // Gate 2: nothing to match against.
    if references.is_empty() {
        return Ok(MatchOutcome::rejected(MatchReason::NoReferenceData, 0.0));
    }

    // Gate 3: full scan for the nearest reference.
    let mut best_distance = f32::INFINITY;
    let mut best_index = 0usize;
    for (i, entry) in references.entries.iter().enumerate() {
        if entry.embedding.len() != EMBEDDING_DIM {
            return Err(MatchError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: entry.embedding.len(),
            });
        }
        let distance = probe.euclidean_distance(&entry.embedding);
        if distance < best_distance {
            best_distance = distance;
            best_index = i;
        }
    }

    let confidence = confidence_from_distance(best_distance);
    let candidate = &references.entries[best_index].person;
    tracing::debug!(
        candidate = %candidate,
        best_distance,
        confidence,
        "best reference candidate"
    );

    // Gate 4: dual-threshold acceptance. Tolerance is the per-pair
    // go/no-go; the confidence floor is an independently tunable
    // corroborating knob.
    let within_tolerance = best_distance <= config.tolerance;
    if within_tolerance && confidence >= config.min_confidence {
        // Consistency re-score: judge the person on all of their
        // enrolled samples, not just the single nearest one.
        let person_distances: Vec<f32> = references
            .entries
            .iter()
            .filter(|e| e.person == *candidate)
            .map(|e| probe.euclidean_distance(&e.embedding))
            .collect();
        let avg_distance = person_distances.iter().sum::<f32>() / person_distances.len() as f32;
        let avg_confidence = confidence_from_distance(avg_distance);

        return Ok(MatchOutcome {
            name: Some(candidate.clone()),
            confidence: avg_confidence,
            reason: MatchReason::Recognized,
        });
    }

    if within_tolerance {
        Ok(MatchOutcome::rejected(MatchReason::ConfidenceTooLow, confidence))
    } else {
        Ok(MatchOutcome::rejected(MatchReason::NoMatch, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReferenceEntry;

    const IMAGE: ImageSize = ImageSize { width: 640, height: 480 };

    // Large, centered face: well above the 5% area gate.
    const BIG_FACE: FaceRegion = FaceRegion { top: 100, right: 420, bottom: 380, left: 180 };

    fn flat(value: f32) -> Embedding {
        Embedding::new(vec![value; EMBEDDING_DIM])
    }

    /// Embedding at exactly `distance` from the all-zeros vector,
    /// offset in a single component.
    fn at_distance(distance: f32) -> Embedding {
        let mut values = vec![0.0; EMBEDDING_DIM];
        values[0] = distance;
        Embedding::new(values)
    }

    fn gallery(entries: &[(&str, Embedding)]) -> ReferenceSet {
        ReferenceSet::new(
            entries
                .iter()
                .map(|(name, e)| ReferenceEntry { person: (*name).into(), embedding: e.clone() })
                .collect(),
        )
    }

    #[test]
    fn test_identical_embedding_full_confidence() {
        let refs = gallery(&[("alice", flat(0.1))]);
        let outcome =
            match_face(&flat(0.1), &BIG_FACE, IMAGE, &refs, &MatchConfig::default()).unwrap();
        assert_eq!(outcome.name.as_deref(), Some("alice"));
        assert_eq!(outcome.reason, MatchReason::Recognized);
        assert!((outcome.confidence - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_small_face_rejected_before_matching() {
        // 20x20 face in a 640x480 frame: ratio ~0.0013, far below 0.05.
        let tiny = FaceRegion { top: 0, right: 20, bottom: 20, left: 0 };
        let refs = gallery(&[("alice", flat(0.1))]);
        let outcome =
            match_face(&flat(0.1), &tiny, IMAGE, &refs, &MatchConfig::default()).unwrap();
        assert!(outcome.name.is_none());
        assert_eq!(outcome.reason, MatchReason::FaceTooSmall);
    }

    #[test]
    fn test_empty_reference_set_never_accepts() {
        let outcome = match_face(
            &flat(0.1),
            &BIG_FACE,
            IMAGE,
            &ReferenceSet::default(),
            &MatchConfig::default(),
        )
        .unwrap();
        assert!(outcome.name.is_none());
        assert_eq!(outcome.reason, MatchReason::NoReferenceData);
    }

    #[test]
    fn test_within_tolerance_accepted() {
        // Distance 0.30 -> confidence 70, both gates pass.
        let refs = gallery(&[("alice", at_distance(0.0))]);
        let probe = at_distance(0.30);
        let outcome =
            match_face(&probe, &BIG_FACE, IMAGE, &refs, &MatchConfig::default()).unwrap();
        assert_eq!(outcome.name.as_deref(), Some("alice"));
        assert!((outcome.confidence - 70.0).abs() < 0.1);
    }

    #[test]
    fn test_outside_tolerance_rejected() {
        let refs = gallery(&[("alice", at_distance(0.0))]);
        let probe = at_distance(0.60);
        let outcome =
            match_face(&probe, &BIG_FACE, IMAGE, &refs, &MatchConfig::default()).unwrap();
        assert!(outcome.name.is_none());
        assert_eq!(outcome.reason, MatchReason::NoMatch);
    }

    #[test]
    fn test_confidence_gate_independent_of_tolerance() {
        // Widened tolerance admits distance 0.55, but confidence 45
        // still fails the 52 floor: rejection must say so, distinctly
        // from the no-match case.
        let config = MatchConfig { tolerance: 0.60, ..MatchConfig::default() };
        let refs = gallery(&[("alice", at_distance(0.0))]);
        let probe = at_distance(0.55);
        let outcome = match_face(&probe, &BIG_FACE, IMAGE, &refs, &config).unwrap();
        assert!(outcome.name.is_none());
        assert_eq!(outcome.reason, MatchReason::ConfidenceTooLow);
        assert!((outcome.confidence - 45.0).abs() < 0.1);
    }

    #[test]
    fn test_consistency_rescore_uses_person_average() {
        // Alice has two samples at distances 0.0 and 0.4 from the
        // probe: accepted on the nearest, reported on the mean (0.2).
        let mut far = at_distance(0.0);
        far.values[1] = 0.4;
        let refs = gallery(&[("alice", at_distance(0.0)), ("alice", far)]);
        let probe = at_distance(0.0);
        let outcome =
            match_face(&probe, &BIG_FACE, IMAGE, &refs, &MatchConfig::default()).unwrap();
        assert_eq!(outcome.name.as_deref(), Some("alice"));
        assert!((outcome.confidence - 80.0).abs() < 0.1);
    }

    #[test]
    fn test_rescore_ignores_other_people() {
        // Bob's distant sample must not depress Alice's average.
        let refs = gallery(&[("alice", at_distance(0.0)), ("bob", at_distance(0.9))]);
        let probe = at_distance(0.0);
        let outcome =
            match_face(&probe, &BIG_FACE, IMAGE, &refs, &MatchConfig::default()).unwrap();
        assert_eq!(outcome.name.as_deref(), Some("alice"));
        assert!((outcome.confidence - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_wrong_probe_dimension_is_an_error() {
        let refs = gallery(&[("alice", flat(0.1))]);
        let probe = Embedding::new(vec![0.1; 64]);
        let err = match_face(&probe, &BIG_FACE, IMAGE, &refs, &MatchConfig::default())
            .unwrap_err();
        assert!(matches!(err, MatchError::DimensionMismatch { actual: 64, .. }));
    }

    #[test]
    fn test_corrupt_reference_dimension_is_an_error() {
        let refs = gallery(&[("alice", Embedding::new(vec![0.1; 12]))]);
        let err = match_face(&flat(0.1), &BIG_FACE, IMAGE, &refs, &MatchConfig::default())
            .unwrap_err();
        assert!(matches!(err, MatchError::DimensionMismatch { actual: 12, .. }));
    }

    #[test]
    fn test_zero_area_frame_is_an_error() {
        let refs = gallery(&[("alice", flat(0.1))]);
        let err = match_face(
            &flat(0.1),
            &BIG_FACE,
            ImageSize::new(0, 480),
            &refs,
            &MatchConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MatchError::DegenerateImage));
    }

    #[test]
    fn test_confidence_clamped_for_distant_probe() {
        // Distance > 1 would yield a negative raw confidence.
        let refs = gallery(&[("alice", at_distance(0.0))]);
        let probe = at_distance(3.0);
        let outcome =
            match_face(&probe, &BIG_FACE, IMAGE, &refs, &MatchConfig::default()).unwrap();
        assert!(outcome.name.is_none());
        assert_eq!(outcome.confidence, 0.0);
    }
}
