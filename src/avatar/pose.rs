//! Body and hand anchor targets from pose/hand landmarks.
//!
//! Everything here is recomputed from scratch each frame. The only input
//! carried over from earlier frames is the smoothed body anchor, used to park
//! undetected hands next to the body.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::avatar::state::Transform2D;
use crate::config::PoseConfig;
use crate::features::{shoulder_roll, to_screen};
use crate::tracking::{hand, pose, FrameObservation, Hand, LandmarkPoint, LandmarkSet};

/// Body-layer pose selected by the waving hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandPose {
    /// Hand not detected
    Lowered,
    /// Hand close to the shoulder
    Near,
    /// Hand raised away from the shoulder
    Far,
}

impl Default for HandPose {
    fn default() -> Self {
        Self::Lowered
    }
}

impl std::fmt::Display for HandPose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandPose::Lowered => write!(f, "lowered"),
            HandPose::Near => write!(f, "near"),
            HandPose::Far => write!(f, "far"),
        }
    }
}

/// Target position of one hand anchor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandTarget {
    pub position: Vec2,
    /// Whether the position came from a tracked wrist
    pub detected: bool,
}

/// Raw per-frame targets for every anchor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseTargets {
    pub body: Transform2D,
    /// Right shoulder in hand space, used for the hand-pose distance
    pub shoulder: Vec2,
    pub left_hand: HandTarget,
    pub right_hand: HandTarget,
    pub hand_pose: HandPose,
}

impl PoseTargets {
    pub fn hand(&self, hand: Hand) -> &HandTarget {
        match hand {
            Hand::Left => &self.left_hand,
            Hand::Right => &self.right_hand,
        }
    }
}

/// Maps pose and hand landmarks to anchor targets in window pixels
#[derive(Debug, Clone)]
pub struct PoseResolver {
    config: PoseConfig,
    window: Vec2,
}

impl PoseResolver {
    pub fn new(config: &PoseConfig, window_size: [u32; 2]) -> Self {
        Self {
            config: config.clone(),
            window: Vec2::new(window_size[0] as f32, window_size[1] as f32),
        }
    }

    fn anchor_offset(&self) -> Vec2 {
        Vec2::from(self.config.anchor_offset)
    }

    fn hand_origin(&self) -> Vec2 {
        Vec2::from(self.config.hand_origin)
    }

    fn project(&self, point: LandmarkPoint, sensitivity: f32) -> Vec2 {
        Vec2::new(
            to_screen(point.x, self.window.x, sensitivity),
            to_screen(point.y, self.window.y, sensitivity),
        )
    }

    /// Body anchor: nose position plus the anchor offset, rolled by the
    /// shoulder line. Without a pose only the offset remains.
    pub fn body_target(&self, pose_set: Option<&LandmarkSet>) -> Transform2D {
        let Some(pose_set) = pose_set else {
            return Transform2D::new(self.anchor_offset(), 0.0);
        };

        let angle = shoulder_roll(
            pose_set.point(pose::LEFT_SHOULDER),
            pose_set.point(pose::RIGHT_SHOULDER),
        );
        let nose = self.project(pose_set.point(pose::NOSE), self.config.movement_sensitivity);

        Transform2D::new(nose + self.anchor_offset(), angle)
    }

    /// Right shoulder in the same space as hand targets
    pub fn shoulder_anchor(&self, pose_set: Option<&LandmarkSet>) -> Vec2 {
        match pose_set {
            Some(pose_set) => {
                self.project(
                    pose_set.point(pose::RIGHT_SHOULDER),
                    self.config.movement_sensitivity,
                ) + self.hand_origin()
            }
            None => self.hand_origin(),
        }
    }

    /// Hand anchor from its wrist, or parked at the rest offset from the
    /// smoothed body when the hand is not tracked.
    pub fn hand_target(
        &self,
        which: Hand,
        hand_set: Option<&LandmarkSet>,
        smoothed_body: &Transform2D,
    ) -> HandTarget {
        match hand_set {
            Some(hand_set) => HandTarget {
                position: self.project(hand_set.point(hand::WRIST), self.config.hand_sensitivity)
                    + self.hand_origin(),
                detected: true,
            },
            None => {
                let rest = match which {
                    Hand::Left => self.config.left_hand_rest_offset,
                    Hand::Right => self.config.right_hand_rest_offset,
                };
                HandTarget {
                    position: smoothed_body.position + Vec2::from(rest),
                    detected: false,
                }
            }
        }
    }

    /// Near/far split on hand-to-shoulder distance.
    ///
    /// Hand and shoulder are projected with different sensitivities, so the
    /// threshold is calibrated against that mixed space.
    pub fn classify_hand(&self, target: &HandTarget, shoulder: Vec2) -> HandPose {
        if !target.detected {
            return HandPose::Lowered;
        }
        if target.position.distance(shoulder) < self.config.distance_thresh {
            HandPose::Near
        } else {
            HandPose::Far
        }
    }

    /// Resolve all anchor targets for one frame
    pub fn resolve(&self, observation: &FrameObservation, smoothed_body: &Transform2D) -> PoseTargets {
        let pose_set = observation.pose.as_ref();
        let body = self.body_target(pose_set);
        let shoulder = self.shoulder_anchor(pose_set);

        let left_hand = self.hand_target(Hand::Left, observation.left_hand.as_ref(), smoothed_body);
        let right_hand = self.hand_target(Hand::Right, observation.right_hand.as_ref(), smoothed_body);

        let waving = match self.config.wave_hand {
            Hand::Left => &left_hand,
            Hand::Right => &right_hand,
        };
        let hand_pose = self.classify_hand(waving, shoulder);

        PoseTargets {
            body,
            shoulder,
            left_hand,
            right_hand,
            hand_pose,
        }
    }
}
