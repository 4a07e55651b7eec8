use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output dimensionality of the external feature extractor.
///
/// Every stored and probe embedding must have exactly this many
/// components; a vector of any other length is data corruption,
/// not a non-match.
pub const EMBEDDING_DIM: usize = 128;

/// Face embedding vector produced by the external feature extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute Euclidean distance to another embedding.
    ///
    /// Callers are responsible for checking dimensionality first;
    /// mismatched vectors are truncated to the shorter length here.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Face bounding box in image pixel coordinates.
///
/// Field order follows the detector convention (top, right, bottom, left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceRegion {
    /// Pixel area of the box. Degenerate (inverted) boxes have area 0.
    pub fn area(&self) -> u64 {
        let height = self.bottom.saturating_sub(self.top) as u64;
        let width = self.right.saturating_sub(self.left) as u64;
        height * width
    }
}

/// Dimensions of the captured frame a face region belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Role of an enrolled person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// An enrolled person. The name is the unique identity key; encodings
/// reference their owner by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: None,
            email: None,
            role: Role::User,
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// One reference embedding together with its owning person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub person: String,
    pub embedding: Embedding,
}

/// The active in-memory gallery used for matching.
///
/// A single sequence of (person, embedding) pairs: there are no
/// parallel arrays whose lengths could drift apart. The set is
/// immutable once published; a reload builds a fresh set and swaps
/// the `Arc` holding it, so concurrent readers always observe a
/// complete set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceSet {
    pub entries: Vec<ReferenceEntry>,
}

impl ReferenceSet {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct people represented in the set.
    pub fn person_count(&self) -> usize {
        let mut names: Vec<&str> = self.entries.iter().map(|e| e.person.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Embedding::new(vec![1.0, 2.0, 3.0]);
        let b = Embedding::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(a.euclidean_distance(&b), 0.0);
    }

    #[test]
    fn test_euclidean_distance_unit_apart() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_face_region_area() {
        let region = FaceRegion { top: 10, right: 110, bottom: 60, left: 10 };
        assert_eq!(region.area(), 50 * 100);
    }

    #[test]
    fn test_face_region_degenerate_area() {
        // Inverted box: bottom above top
        let region = FaceRegion { top: 60, right: 110, bottom: 10, left: 10 };
        assert_eq!(region.area(), 0);
    }

    #[test]
    fn test_person_count() {
        let set = ReferenceSet::new(vec![
            ReferenceEntry { person: "alice".into(), embedding: Embedding::new(vec![0.0]) },
            ReferenceEntry { person: "bob".into(), embedding: Embedding::new(vec![0.0]) },
            ReferenceEntry { person: "alice".into(), embedding: Embedding::new(vec![0.0]) },
        ]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.person_count(), 2);
    }
}
