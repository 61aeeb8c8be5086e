//! Per-frame avatar state: transforms and the classified sprite selection

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::assets::SpriteKey;
use super::expression::{Expression, EyeState, MouthState};
use super::pose::HandPose;

/// Position (top-left of the unrotated sprite, pixels) and in-plane rotation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform2D {
    pub position: Vec2,
    /// Degrees in (-180, 180], positive is clockwise on screen
    pub angle_degrees: f32,
}

impl Transform2D {
    pub fn new(position: Vec2, angle_degrees: f32) -> Self {
        Self {
            position,
            angle_degrees,
        }
    }

    /// A position-only transform
    pub fn at(x: f32, y: f32) -> Self {
        Self::new(Vec2::new(x, y), 0.0)
    }

    pub fn x(&self) -> f32 {
        self.position.x
    }

    pub fn y(&self) -> f32 {
        self.position.y
    }
}

/// Per-frame avatar output: sprite choices plus smoothed anchors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AvatarState {
    expression: Expression,
    hand_pose: HandPose,
    /// Smoothed body anchor
    body: Transform2D,
    /// Smoothed hand anchors. Tracked for consumers of the state; the
    /// compositor draws no hand layer, so they never move a sprite.
    left_hand: Vec2,
    right_hand: Vec2,
}

impl AvatarState {
    pub fn new(expression: Expression, hand_pose: HandPose, body: Transform2D) -> Self {
        Self {
            expression,
            hand_pose,
            body,
            left_hand: Vec2::ZERO,
            right_hand: Vec2::ZERO,
        }
    }

    /// Create a new state with smoothed hand anchors
    pub fn with_hands(mut self, left: Vec2, right: Vec2) -> Self {
        self.left_hand = left;
        self.right_hand = right;
        self
    }

    pub fn expression(&self) -> Expression {
        self.expression
    }

    pub fn eyes(&self) -> EyeState {
        self.expression.eyes
    }

    pub fn mouth(&self) -> MouthState {
        self.expression.mouth
    }

    pub fn hand_pose(&self) -> HandPose {
        self.hand_pose
    }

    pub fn body(&self) -> &Transform2D {
        &self.body
    }

    pub fn left_hand(&self) -> Vec2 {
        self.left_hand
    }

    pub fn right_hand(&self) -> Vec2 {
        self.right_hand
    }

    /// Sprite keys for this frame, back to front: eyes, mouth, body
    pub fn layers(&self) -> [SpriteKey; 3] {
        [
            SpriteKey::from(self.eyes()),
            SpriteKey::from(self.mouth()),
            SpriteKey::from(self.hand_pose),
        ]
    }

    /// Whether the visible sprite selection differs from `other`
    pub fn sprites_differ(&self, other: &AvatarState) -> bool {
        self.layers() != other.layers()
    }
}
