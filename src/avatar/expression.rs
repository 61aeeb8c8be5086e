//! Eye and mouth classification from face landmarks
//!
//! Both sub-states come from ordered rule tables: the first rule whose
//! predicate holds wins, so priority is the table order.

use serde::{Deserialize, Serialize};

use crate::config::ExpressionThresholds;
use crate::features::{distance, safe_ratio, MIN_DENOMINATOR};
use crate::tracking::{face, LandmarkSet};

/// Eye sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeState {
    Open,
    Blink,
    LeftWink,
    RightWink,
}

impl Default for EyeState {
    fn default() -> Self {
        Self::Open
    }
}

impl std::fmt::Display for EyeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EyeState::Open => write!(f, "open"),
            EyeState::Blink => write!(f, "blink"),
            EyeState::LeftWink => write!(f, "left_wink"),
            EyeState::RightWink => write!(f, "right_wink"),
        }
    }
}

/// Mouth sub-state (viseme)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouthState {
    Idle,
    A,
    I,
    U,
}

impl Default for MouthState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for MouthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MouthState::Idle => write!(f, "idle"),
            MouthState::A => write!(f, "a"),
            MouthState::I => write!(f, "i"),
            MouthState::U => write!(f, "u"),
        }
    }
}

/// Classifier output for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Expression {
    pub eyes: EyeState,
    pub mouth: MouthState,
    /// False when no face was tracked and the states are defaults
    pub face_tracked: bool,
}

impl Expression {
    /// Default expression used when no face is in frame
    pub fn untracked() -> Self {
        Self {
            eyes: EyeState::Open,
            mouth: MouthState::Idle,
            face_tracked: false,
        }
    }

    /// The two sub-states as a pair
    pub fn states(&self) -> (EyeState, MouthState) {
        (self.eyes, self.mouth)
    }
}

/// Lid gaps for both eyes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeFeatures {
    pub left_gap: f32,
    pub right_gap: f32,
}

impl EyeFeatures {
    pub fn from_face(face_set: &LandmarkSet) -> Self {
        Self {
            left_gap: distance(
                face_set.point(face::LEFT_EYE_UPPER),
                face_set.point(face::LEFT_EYE_LOWER),
            ),
            right_gap: distance(
                face_set.point(face::RIGHT_EYE_UPPER),
                face_set.point(face::RIGHT_EYE_LOWER),
            ),
        }
    }
}

/// Lip opening measurements
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouthFeatures {
    pub height: f32,
    pub width: f32,
    /// `height / width`, denominator guarded
    pub ratio: f32,
}

impl MouthFeatures {
    pub fn new(height: f32, width: f32) -> Self {
        Self {
            height,
            width,
            ratio: safe_ratio(height, width),
        }
    }

    pub fn from_face(face_set: &LandmarkSet) -> Self {
        let height = distance(
            face_set.point(face::LIP_TOP),
            face_set.point(face::LIP_BOTTOM),
        );
        let width = distance(
            face_set.point(face::LIP_LEFT_CORNER),
            face_set.point(face::LIP_RIGHT_CORNER),
        );
        Self::new(height, width)
    }
}

type Predicate<F> = fn(&F, &ExpressionThresholds) -> bool;

/// One row of a decision table
struct Rule<F, S> {
    when: Predicate<F>,
    state: S,
    /// Matched only on unusable measurements
    guard: bool,
}

impl<F, S> Rule<F, S> {
    const fn new(when: Predicate<F>, state: S) -> Self {
        Self { when, state, guard: false }
    }

    const fn guard(when: Predicate<F>, state: S) -> Self {
        Self { when, state, guard: true }
    }
}

/// Ordered rules; the first match wins, `otherwise` when none does
struct RuleTable<F: 'static, S: 'static> {
    rules: &'static [Rule<F, S>],
    otherwise: S,
}

impl<F: 'static, S: Copy + 'static> RuleTable<F, S> {
    fn matching(&self, features: &F, thresholds: &ExpressionThresholds) -> Option<&Rule<F, S>> {
        self.rules.iter().find(|rule| (rule.when)(features, thresholds))
    }

    fn evaluate(&self, features: &F, thresholds: &ExpressionThresholds) -> S {
        self.matching(features, thresholds)
            .map_or(self.otherwise, |rule| rule.state)
    }
}

fn both_closed(f: &EyeFeatures, t: &ExpressionThresholds) -> bool {
    f.left_gap < t.eye_close_thresh && f.right_gap < t.eye_close_thresh
}

fn left_closed(f: &EyeFeatures, t: &ExpressionThresholds) -> bool {
    f.left_gap < t.eye_close_thresh
}

fn right_closed(f: &EyeFeatures, t: &ExpressionThresholds) -> bool {
    f.right_gap < t.eye_close_thresh
}

fn mouth_closed(f: &MouthFeatures, t: &ExpressionThresholds) -> bool {
    f.height <= t.height_open_thresh
}

fn mouth_degenerate(f: &MouthFeatures, _: &ExpressionThresholds) -> bool {
    f.width < MIN_DENOMINATOR
}

fn mouth_big(f: &MouthFeatures, t: &ExpressionThresholds) -> bool {
    f.height > t.height_big_thresh
}

fn mouth_narrow(f: &MouthFeatures, t: &ExpressionThresholds) -> bool {
    f.ratio > t.ratio_round_thresh
}

/// Both-closed outranks the single-eye rules.
const EYE_RULES: RuleTable<EyeFeatures, EyeState> = RuleTable {
    rules: &[
        Rule::new(both_closed, EyeState::Blink),
        Rule::new(left_closed, EyeState::LeftWink),
        Rule::new(right_closed, EyeState::RightWink),
    ],
    otherwise: EyeState::Open,
};

/// An open, not-big mouth is "I" when tall relative to its width and "U"
/// otherwise. This mapping is fixed for every rig.
const MOUTH_RULES: RuleTable<MouthFeatures, MouthState> = RuleTable {
    rules: &[
        Rule::new(mouth_closed, MouthState::Idle),
        Rule::guard(mouth_degenerate, MouthState::Idle),
        Rule::new(mouth_big, MouthState::A),
        Rule::new(mouth_narrow, MouthState::I),
    ],
    otherwise: MouthState::U,
};

/// Stateless eye/mouth classifier
#[derive(Debug, Clone, Copy)]
pub struct ExpressionClassifier {
    thresholds: ExpressionThresholds,
}

impl ExpressionClassifier {
    pub fn new(thresholds: ExpressionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ExpressionThresholds {
        &self.thresholds
    }

    pub fn classify_eyes(&self, features: &EyeFeatures) -> EyeState {
        EYE_RULES.evaluate(features, &self.thresholds)
    }

    pub fn classify_mouth(&self, features: &MouthFeatures) -> MouthState {
        match MOUTH_RULES.matching(features, &self.thresholds) {
            Some(rule) if rule.guard => {
                tracing::trace!("Mouth width below guard ({}), using idle", features.width);
                rule.state
            }
            Some(rule) => rule.state,
            None => MOUTH_RULES.otherwise,
        }
    }

    /// Classify one frame's face. No face means the untracked defaults.
    pub fn classify(&self, face_set: Option<&LandmarkSet>) -> Expression {
        let Some(face_set) = face_set else {
            return Expression::untracked();
        };

        Expression {
            eyes: self.classify_eyes(&EyeFeatures::from_face(face_set)),
            mouth: self.classify_mouth(&MouthFeatures::from_face(face_set)),
            face_tracked: true,
        }
    }
}

impl Default for ExpressionClassifier {
    fn default() -> Self {
        Self::new(ExpressionThresholds::default())
    }
}
