//! Tracking module
//!
//! Landmark data model and the sources that produce it:
//! - MediaPipe Holistic helper streaming JSON over UDP
//! - Recorded JSON-lines replays
//! - Helper subprocess management

pub mod mediapipe;
pub mod replay;
pub mod subprocess;

use serde::{Deserialize, Serialize};

use crate::error::Fushigi2dError;

/// MediaPipe face mesh landmark indices
pub mod face {
    pub const LIP_TOP: usize = 13;
    pub const LIP_BOTTOM: usize = 14;
    pub const LIP_LEFT_CORNER: usize = 61;
    pub const LIP_RIGHT_CORNER: usize = 291;
    pub const LEFT_EYE_UPPER: usize = 159;
    pub const LEFT_EYE_LOWER: usize = 145;
    pub const RIGHT_EYE_UPPER: usize = 386;
    pub const RIGHT_EYE_LOWER: usize = 374;

    /// Face mesh size without iris refinement
    pub const LEN: usize = 468;
}

/// MediaPipe pose landmark indices
pub mod pose {
    pub const NOSE: usize = 0;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;

    pub const LEN: usize = 33;
}

/// MediaPipe hand landmark indices
pub mod hand {
    pub const WRIST: usize = 0;

    pub const LEN: usize = 21;
}

/// A single tracked point, normalized to [0, 1] of the frame size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PointRepr")]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl LandmarkPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }

    pub const fn with_depth(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z: Some(z) }
    }
}

/// Accepted wire shapes for a point: `[x, y]`, `[x, y, z]` or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum PointRepr {
    Xy([f32; 2]),
    Xyz([f32; 3]),
    Object {
        x: f32,
        y: f32,
        #[serde(default)]
        z: Option<f32>,
    },
}

impl From<PointRepr> for LandmarkPoint {
    fn from(repr: PointRepr) -> Self {
        match repr {
            PointRepr::Xy([x, y]) => Self::new(x, y),
            PointRepr::Xyz([x, y, z]) => Self::with_depth(x, y, z),
            PointRepr::Object { x, y, z } => Self { x, y, z },
        }
    }
}

/// Which kind of landmark set, and therefore which index layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkKind {
    Face,
    Pose,
    Hand,
}

impl LandmarkKind {
    /// Minimum number of points a set of this kind must carry
    pub fn min_len(self) -> usize {
        match self {
            Self::Face => face::LEN,
            Self::Pose => pose::LEN,
            Self::Hand => hand::LEN,
        }
    }
}

impl std::fmt::Display for LandmarkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LandmarkKind::Face => write!(f, "face"),
            LandmarkKind::Pose => write!(f, "pose"),
            LandmarkKind::Hand => write!(f, "hand"),
        }
    }
}

/// An ordered, fixed-layout sequence of landmarks for one tracked body part.
///
/// Construction checks the length against the kind's layout, so indexing with
/// the constants in [`face`], [`pose`] and [`hand`] never goes out of bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    kind: LandmarkKind,
    points: Vec<LandmarkPoint>,
}

impl LandmarkSet {
    /// Wrap `points` as a set of `kind`, or `None` if too short for its layout
    pub fn new(kind: LandmarkKind, points: Vec<LandmarkPoint>) -> Option<Self> {
        if points.len() < kind.min_len() {
            return None;
        }
        Some(Self { kind, points })
    }

    pub fn kind(&self) -> LandmarkKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[LandmarkPoint] {
        &self.points
    }

    /// Point at a layout index. Panics only for indices outside the kind's
    /// layout, which is a programming error.
    pub fn point(&self, index: usize) -> LandmarkPoint {
        self.points[index]
    }
}

/// Left or right hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

impl Default for Hand {
    fn default() -> Self {
        Self::Left
    }
}

impl std::fmt::Display for Hand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hand::Left => write!(f, "left"),
            Hand::Right => write!(f, "right"),
        }
    }
}

/// Everything the tracker found in one video frame. Any set may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameObservation {
    pub face: Option<LandmarkSet>,
    pub pose: Option<LandmarkSet>,
    pub left_hand: Option<LandmarkSet>,
    pub right_hand: Option<LandmarkSet>,
}

impl FrameObservation {
    /// An observation with nothing detected
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn hand(&self, hand: Hand) -> Option<&LandmarkSet> {
        match hand {
            Hand::Left => self.left_hand.as_ref(),
            Hand::Right => self.right_hand.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.face.is_none()
            && self.pose.is_none()
            && self.left_hand.is_none()
            && self.right_hand.is_none()
    }
}

/// A single JSON packet from the tracker helper (also one replay line)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LandmarkPacket {
    #[serde(default)]
    pub face: Option<Vec<LandmarkPoint>>,
    #[serde(default)]
    pub pose: Option<Vec<LandmarkPoint>>,
    #[serde(default)]
    pub left_hand: Option<Vec<LandmarkPoint>>,
    #[serde(default)]
    pub right_hand: Option<Vec<LandmarkPoint>>,
    /// Set by the helper when its capture device produced no more frames
    #[serde(default)]
    pub end_of_stream: bool,
    /// Set by the helper when it cannot capture at all
    #[serde(default)]
    pub error: Option<String>,
}

impl LandmarkPacket {
    /// Convert to an observation. Sets too short for their layout are
    /// dropped and treated as not detected.
    pub fn into_observation(self) -> FrameObservation {
        FrameObservation {
            face: to_set(LandmarkKind::Face, self.face),
            pose: to_set(LandmarkKind::Pose, self.pose),
            left_hand: to_set(LandmarkKind::Hand, self.left_hand),
            right_hand: to_set(LandmarkKind::Hand, self.right_hand),
        }
    }
}

fn to_set(kind: LandmarkKind, points: Option<Vec<LandmarkPoint>>) -> Option<LandmarkSet> {
    let points = points?;
    let len = points.len();
    let set = LandmarkSet::new(kind, points);
    if set.is_none() {
        tracing::warn!(
            "Dropping {} landmarks: got {} points, need at least {}",
            kind,
            len,
            kind.min_len()
        );
    }
    set
}

/// A source of per-frame landmark observations.
///
/// `Ok(None)` means the capture produced no frame (end of stream); the frame
/// loop treats it as a normal termination. Partial or empty observations are
/// valid results.
pub trait Tracker {
    fn process(&mut self) -> Result<Option<FrameObservation>, Fushigi2dError>;
}

impl<T: Tracker + ?Sized> Tracker for Box<T> {
    fn process(&mut self) -> Result<Option<FrameObservation>, Fushigi2dError> {
        (**self).process()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_wire_shapes() {
        let json = r#"[[0.1, 0.2], [0.3, 0.4, -0.5], {"x": 0.6, "y": 0.7}]"#;
        let points: Vec<LandmarkPoint> = serde_json::from_str(json).unwrap();

        assert_eq!(points[0], LandmarkPoint::new(0.1, 0.2));
        assert_eq!(points[1], LandmarkPoint::with_depth(0.3, 0.4, -0.5));
        assert_eq!(points[2], LandmarkPoint::new(0.6, 0.7));
    }

    #[test]
    fn test_short_set_is_absent() {
        let points = vec![LandmarkPoint::new(0.5, 0.5); hand::LEN - 1];
        assert!(LandmarkSet::new(LandmarkKind::Hand, points).is_none());

        let points = vec![LandmarkPoint::new(0.5, 0.5); hand::LEN];
        let set = LandmarkSet::new(LandmarkKind::Hand, points).unwrap();
        assert_eq!(set.len(), hand::LEN);
        assert_eq!(set.kind(), LandmarkKind::Hand);
    }

    #[test]
    fn test_packet_into_observation() {
        let packet = LandmarkPacket {
            pose: Some(vec![LandmarkPoint::new(0.5, 0.5); pose::LEN]),
            left_hand: Some(vec![LandmarkPoint::new(0.5, 0.5); 3]),
            ..Default::default()
        };

        let obs = packet.into_observation();
        assert!(obs.face.is_none());
        assert!(obs.pose.is_some());
        // truncated hand is dropped, not an error
        assert!(obs.hand(Hand::Left).is_none());
        assert!(!obs.is_empty());
    }

    #[test]
    fn test_parse_helper_error_packet() {
        let packet: LandmarkPacket =
            serde_json::from_str(r#"{"error": "camera 9 could not be opened"}"#).unwrap();
        assert_eq!(packet.error.as_deref(), Some("camera 9 could not be opened"));
        assert!(!packet.end_of_stream);
    }

    #[test]
    fn test_parse_legacy_packet_without_hands() {
        let json = r#"{"face": null, "pose": null}"#;
        let packet: LandmarkPacket = serde_json::from_str(json).unwrap();
        assert!(!packet.end_of_stream);
        assert!(packet.error.is_none());
        assert!(packet.into_observation().is_empty());
    }
}
