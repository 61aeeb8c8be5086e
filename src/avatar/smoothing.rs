//! Exponential smoothing of anchor transforms.
//!
//! The only state in the pipeline that survives from one frame to the next.
//! Positions blend linearly; angles blend along the shortest arc so a target
//! crossing ±180° never spins the sprite the long way round.

use glam::Vec2;

use super::pose::PoseTargets;
use super::state::Transform2D;
use crate::config::SmoothingConfig;
use crate::features::{angle_diff, normalize_angle};

/// Exponential moving average over one anchor's transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorSmoother {
    current: Transform2D,
    alpha_pos: f32,
    alpha_angle: f32,
}

impl AnchorSmoother {
    /// Seed the smoother with `initial`, shown until targets pull it away
    pub fn new(initial: Transform2D, alpha_pos: f32, alpha_angle: f32) -> Self {
        Self {
            current: Transform2D::new(initial.position, normalize_angle(initial.angle_degrees)),
            alpha_pos,
            alpha_angle,
        }
    }

    /// Blend one step towards `target` and return the new smoothed value
    pub fn advance(&mut self, target: Transform2D) -> Transform2D {
        let position = self.current.position
            + (target.position - self.current.position) * self.alpha_pos;

        let diff = angle_diff(target.angle_degrees, self.current.angle_degrees);
        let angle = normalize_angle(self.current.angle_degrees + diff * self.alpha_angle);

        self.current = Transform2D::new(position, angle);
        self.current
    }

    pub fn current(&self) -> Transform2D {
        self.current
    }
}

/// Smoothed anchors after one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedAnchors {
    pub body: Transform2D,
    pub left_hand: Vec2,
    pub right_hand: Vec2,
}

/// Smoothers for the body anchor and both hand anchors
#[derive(Debug, Clone)]
pub struct SmootherState {
    body: AnchorSmoother,
    left_hand: AnchorSmoother,
    right_hand: AnchorSmoother,
}

impl SmootherState {
    pub fn new(config: &SmoothingConfig) -> Self {
        let smoother = |initial: Transform2D| {
            AnchorSmoother::new(initial, config.alpha_pos, config.alpha_angle)
        };

        Self {
            body: smoother(Transform2D::new(
                Vec2::from(config.initial_body),
                config.initial_body_angle,
            )),
            left_hand: smoother(Transform2D::new(Vec2::from(config.initial_left_hand), 0.0)),
            right_hand: smoother(Transform2D::new(Vec2::from(config.initial_right_hand), 0.0)),
        }
    }

    /// Current smoothed body anchor, as of the previous frame
    pub fn body(&self) -> Transform2D {
        self.body.current()
    }

    pub fn left_hand(&self) -> Vec2 {
        self.left_hand.current().position
    }

    pub fn right_hand(&self) -> Vec2 {
        self.right_hand.current().position
    }

    /// Advance every anchor one frame towards its target
    pub fn advance(&mut self, targets: &PoseTargets) -> SmoothedAnchors {
        let body = self.body.advance(targets.body);
        let left_hand = self
            .left_hand
            .advance(Transform2D::new(targets.left_hand.position, 0.0))
            .position;
        let right_hand = self
            .right_hand
            .advance(Transform2D::new(targets.right_hand.position, 0.0))
            .position;

        SmoothedAnchors {
            body,
            left_hand,
            right_hand,
        }
    }
}

impl Default for SmootherState {
    fn default() -> Self {
        Self::new(&SmoothingConfig::default())
    }
}
