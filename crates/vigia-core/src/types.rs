use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Euclidean distance between two embeddings. Lower = more similar.
    ///
    /// Embeddings of different dimension are incomparable and sit at
    /// infinite distance.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A gallery entry: one stored embedding labelled with its owner.
#[derive(Debug, Clone)]
pub struct KnownFace {
    pub label: String,
    pub embedding: Embedding,
}

/// Result of matching a probe embedding against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Distance to the closest gallery entry, `None` for an empty gallery.
    pub distance: Option<f32>,
    /// Index of the matched gallery entry (if any).
    pub index: Option<usize>,
    /// Label of the matched gallery entry (if any).
    pub label: Option<String>,
}

impl MatchResult {
    pub fn no_match(distance: Option<f32>) -> Self {
        Self {
            matched: false,
            distance,
            index: None,
            label: None,
        }
    }
}

/// Strategy for comparing a probe embedding against a gallery of known faces.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[KnownFace], tolerance: f32) -> MatchResult;
}

/// Euclidean nearest-neighbour matcher.
///
/// Visits every gallery entry. A probe matches when its closest entry is
/// within `tolerance`; ties resolve to the earliest entry. Entries whose
/// dimension differs from the probe never match.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[KnownFace], tolerance: f32) -> MatchResult {
        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, known) in gallery.iter().enumerate() {
            let dist = probe.euclidean_distance(&known.embedding);
            if dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_dist <= tolerance => MatchResult {
                matched: true,
                distance: Some(best_dist),
                index: Some(idx),
                label: Some(gallery[idx].label.clone()),
            },
            Some(_) => MatchResult::no_match(Some(best_dist)),
            None => MatchResult::no_match(None),
        }
    }
}
