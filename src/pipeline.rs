//! Per-frame pipeline and the frame loop
//!
//! One iteration: capture, classify, resolve, smooth, composite, present.
//! Iterations never overlap; the smoothed anchors are the only state that
//! carries from one frame to the next.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::avatar::{
    AvatarState, ExpressionClassifier, PoseResolver, SmootherState, Sprite, SpriteTable,
};
use crate::config::Config;
use crate::error::Fushigi2dError;
use crate::render::{Canvas, Compositor};
use crate::tracking::{FrameObservation, Tracker};

/// Classifier, resolver, smoother and compositor for one rig
#[derive(Debug)]
pub struct Pipeline {
    classifier: ExpressionClassifier,
    resolver: PoseResolver,
    smoother: SmootherState,
    compositor: Compositor,
    last: Option<AvatarState>,
    frames: u64,
}

impl Pipeline {
    pub fn new(config: &Config, sprites: SpriteTable, background: Option<Sprite>) -> Self {
        Self {
            classifier: ExpressionClassifier::new(config.expression),
            resolver: PoseResolver::new(&config.pose, config.window.size),
            smoother: SmootherState::new(&config.smoothing),
            compositor: Compositor::from_config(sprites, background, config),
            last: None,
            frames: 0,
        }
    }

    /// Advance the avatar by one observation.
    ///
    /// Parked hands are placed relative to the smoothed body from the
    /// previous frame, before this frame's smoothing step.
    pub fn step(&mut self, observation: &FrameObservation) -> AvatarState {
        let expression = self.classifier.classify(observation.face.as_ref());

        let previous_body = self.smoother.body();
        let targets = self.resolver.resolve(observation, &previous_body);
        let anchors = self.smoother.advance(&targets);

        let state = AvatarState::new(expression, targets.hand_pose, anchors.body)
            .with_hands(anchors.left_hand, anchors.right_hand);

        if self.last.map_or(true, |last| state.sprites_differ(&last)) {
            debug!(
                "Sprites: eyes={} mouth={} hand={} (face tracked: {})",
                state.eyes(),
                state.mouth(),
                state.hand_pose(),
                expression.face_tracked
            );
        }

        self.last = Some(state);
        self.frames += 1;
        state
    }

    /// Composite `state` and present it
    pub fn render<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        state: &AvatarState,
    ) -> Result<(), Fushigi2dError> {
        self.compositor.draw(canvas, state);
        canvas.present()
    }

    /// [`step`](Self::step) then [`render`](Self::render)
    pub fn frame<C: Canvas + ?Sized>(
        &mut self,
        observation: &FrameObservation,
        canvas: &mut C,
    ) -> Result<AvatarState, Fushigi2dError> {
        let state = self.step(observation);
        self.render(canvas, &state)?;
        Ok(state)
    }

    /// Frames processed so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// State produced by the most recent frame
    pub fn last_state(&self) -> Option<&AvatarState> {
        self.last.as_ref()
    }

    pub fn smoother(&self) -> &SmootherState {
        &self.smoother
    }
}

/// Why the frame loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Tracker produced no frame
    EndOfStream,
    /// Shutdown signal observed
    Shutdown,
    /// Reached the requested frame count
    FrameLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub reason: StopReason,
}

/// Drive the pipeline at `frame_interval` until the tracker ends, `shutdown`
/// resolves, or `max_frames` frames have been processed.
///
/// Shutdown is checked once per iteration, so the frame in progress always
/// completes. Transient tracker errors are logged and the frame proceeds with
/// an empty observation; fatal ones (see [`Fushigi2dError::is_fatal`]) are
/// returned.
pub async fn run<T, C, F>(
    pipeline: &mut Pipeline,
    tracker: &mut T,
    canvas: &mut C,
    frame_interval: Duration,
    max_frames: Option<u64>,
    shutdown: F,
) -> Result<RunSummary, Fushigi2dError>
where
    T: Tracker + ?Sized,
    C: Canvas + ?Sized,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let start = pipeline.frames();
    let reason = loop {
        if max_frames.is_some_and(|max| pipeline.frames() - start >= max) {
            break StopReason::FrameLimit;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => break StopReason::Shutdown,
            _ = ticker.tick() => {}
        }

        let observation = match tracker.process() {
            Ok(Some(observation)) => observation,
            Ok(None) => break StopReason::EndOfStream,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Tracker error, using empty frame: {}", e);
                FrameObservation::empty()
            }
        };

        pipeline.frame(&observation, canvas)?;
    };

    let summary = RunSummary {
        frames: pipeline.frames() - start,
        reason,
    };
    info!("Frame loop stopped after {} frames ({:?})", summary.frames, summary.reason);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::assets::tests::solid_table;
    use crate::avatar::expression::tests::face_with;
    use crate::avatar::pose::tests::{hand_with, pose_with};
    use crate::avatar::{EyeState, HandPose, MouthState, SpriteKey};
    use crate::error::TrackingError;
    use crate::render::RasterCanvas;
    use crate::tracking::replay::ReplayTracker;
    use glam::Vec2;

    fn pipeline() -> Pipeline {
        Pipeline::new(&Config::default(), solid_table(8), None)
    }

    fn face_frame(left_gap: f32, right_gap: f32, mouth_h: f32, mouth_w: f32) -> FrameObservation {
        FrameObservation {
            face: Some(face_with(left_gap, right_gap, mouth_h, mouth_w)),
            ..Default::default()
        }
    }

    #[test]
    fn test_three_frame_expression_sequence() {
        let mut pipeline = pipeline();
        let frames = [
            face_frame(0.02, 0.02, 0.0, 0.1),
            face_frame(0.005, 0.005, 0.0, 0.1),
            face_frame(0.02, 0.02, 0.06, 0.1),
        ];

        let states: Vec<_> = frames
            .iter()
            .map(|frame| pipeline.step(frame).expression().states())
            .collect();

        assert_eq!(
            states,
            vec![
                (EyeState::Open, MouthState::Idle),
                (EyeState::Blink, MouthState::Idle),
                (EyeState::Open, MouthState::A),
            ]
        );
        assert_eq!(pipeline.frames(), 3);
    }

    #[test]
    fn test_absent_face_then_blink_then_open_mouth() {
        let mut pipeline = pipeline();
        let frames = [
            FrameObservation::empty(),
            face_frame(0.005, 0.005, 0.0, 0.1),
            face_frame(0.02, 0.02, 0.06, 0.1),
        ];

        let states: Vec<_> = frames
            .iter()
            .map(|frame| {
                let expression = pipeline.step(frame).expression();
                (expression.eyes, expression.mouth, expression.face_tracked)
            })
            .collect();

        assert_eq!(
            states,
            vec![
                (EyeState::Open, MouthState::Idle, false),
                (EyeState::Blink, MouthState::Idle, true),
                (EyeState::Open, MouthState::A, true),
            ]
        );
    }

    #[test]
    fn test_lost_pose_eases_body_towards_rest() {
        let config = Config::default();
        let mut pipeline = pipeline();
        let tracked = FrameObservation {
            pose: Some(pose_with((0.7, 0.3), (0.3, 0.5), (0.5, 0.5))),
            ..Default::default()
        };
        for _ in 0..200 {
            pipeline.step(&tracked);
        }
        let converged = pipeline.step(&tracked).body().position;
        assert!((pipeline.step(&tracked).body().position - converged).length() < 1e-3);

        let before = pipeline.last_state().unwrap().body().position;
        let after = pipeline.step(&FrameObservation::empty()).body().position;

        let rest = Vec2::from(config.pose.anchor_offset);
        let expected = before + (rest - before) * config.smoothing.alpha_pos;
        assert!((after - expected).length() < 1e-4, "{:?} vs {:?}", after, expected);
        // one step, not a snap
        assert!((after - rest).length() > 1.0);
    }

    #[test]
    fn test_empty_frame_uses_defaults() {
        let mut pipeline = pipeline();
        let state = pipeline.step(&FrameObservation::empty());

        assert!(!state.expression().face_tracked);
        assert_eq!(state.eyes(), EyeState::Open);
        assert_eq!(state.mouth(), MouthState::Idle);
        assert_eq!(state.hand_pose(), HandPose::Lowered);
        // 250 + (-150 - 250) * 0.2
        assert!((state.body().x() - 170.0).abs() < 1e-3);
        assert!((state.body().y() - 170.0).abs() < 1e-3);
    }

    #[test]
    fn test_parked_hands_follow_previous_body() {
        let mut pipeline = pipeline();
        let state = pipeline.step(&FrameObservation::empty());

        // targets come from the seeded body (250, 250), not the new one
        // left: 100 + (200 - 100) * 0.2 = 120, 300 + (450 - 300) * 0.2 = 330
        assert!((state.left_hand() - Vec2::new(120.0, 330.0)).length() < 1e-3);
        // right: 300 + (430 - 300) * 0.2 = 326, 300 + (400 - 300) * 0.2 = 320
        assert!((state.right_hand() - Vec2::new(326.0, 320.0)).length() < 1e-3);
    }

    #[test]
    fn test_waving_hand_near_and_far() {
        let mut pipeline = pipeline();
        let pose = pose_with((0.5, 0.5), (0.3, 0.5), (0.5, 0.5));

        // wrist on the shoulder: distance 0
        let near = FrameObservation {
            pose: Some(pose.clone()),
            left_hand: Some(hand_with((0.5, 0.5))),
            ..Default::default()
        };
        assert_eq!(pipeline.step(&near).hand_pose(), HandPose::Near);

        // (0.9 - 0.5) * 500 * 1.8 = 360 px from the shoulder
        let far = FrameObservation {
            pose: Some(pose),
            left_hand: Some(hand_with((0.9, 0.5))),
            ..Default::default()
        };
        let state = pipeline.step(&far);
        assert_eq!(state.hand_pose(), HandPose::Far);
        assert_eq!(state.layers()[2], SpriteKey::Wave2);
    }

    #[test]
    fn test_render_presents_frame() {
        let mut pipeline = pipeline();
        let mut canvas = RasterCanvas::new(20, 20).unwrap();
        pipeline.frame(&FrameObservation::empty(), &mut canvas).unwrap();

        assert_eq!(canvas.frames_presented(), 1);
        // green screen where no sprite lands
        assert_eq!(canvas.frame().get_pixel(0, 0).0, [0, 255, 0, 255]);
    }

    struct FailingTracker {
        calls: usize,
    }

    impl Tracker for FailingTracker {
        fn process(&mut self) -> Result<Option<FrameObservation>, Fushigi2dError> {
            self.calls += 1;
            match self.calls {
                1 => Err(TrackingError::MpReceiver("boom".to_string()).into()),
                2 => Ok(Some(face_frame(0.005, 0.005, 0.0, 0.1))),
                _ => Ok(None),
            }
        }
    }

    struct CameraLostTracker {
        calls: usize,
    }

    impl Tracker for CameraLostTracker {
        fn process(&mut self) -> Result<Option<FrameObservation>, Fushigi2dError> {
            self.calls += 1;
            match self.calls {
                1 => Ok(Some(FrameObservation::empty())),
                _ => Err(TrackingError::HelperFailed("camera 9 could not be opened".into()).into()),
            }
        }
    }

    #[tokio::test]
    async fn test_run_returns_fatal_tracker_error() {
        let mut pipeline = pipeline();
        let mut tracker = CameraLostTracker { calls: 0 };
        let mut canvas = RasterCanvas::new(16, 16).unwrap();

        let err = run(
            &mut pipeline,
            &mut tracker,
            &mut canvas,
            Duration::from_millis(1),
            None,
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(pipeline.frames(), 1);
        assert_eq!(tracker.calls, 2);
    }

    #[tokio::test]
    async fn test_run_until_end_of_stream() {
        let mut pipeline = pipeline();
        let mut tracker = ReplayTracker::from_frames(vec![
            face_frame(0.02, 0.02, 0.0, 0.1),
            face_frame(0.005, 0.005, 0.0, 0.1),
            face_frame(0.02, 0.02, 0.06, 0.1),
        ]);
        let mut canvas = RasterCanvas::new(16, 16).unwrap();

        let summary = run(
            &mut pipeline,
            &mut tracker,
            &mut canvas,
            Duration::from_millis(1),
            None,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(summary, RunSummary { frames: 3, reason: StopReason::EndOfStream });
        assert_eq!(canvas.frames_presented(), 3);
        assert_eq!(pipeline.last_state().unwrap().mouth(), MouthState::A);
    }

    #[tokio::test]
    async fn test_run_survives_tracker_error() {
        let mut pipeline = pipeline();
        let mut tracker = FailingTracker { calls: 0 };
        let mut canvas = RasterCanvas::new(16, 16).unwrap();

        let summary = run(
            &mut pipeline,
            &mut tracker,
            &mut canvas,
            Duration::from_millis(1),
            None,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(pipeline.last_state().unwrap().eyes(), EyeState::Blink);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_and_limit() {
        let mut pipeline = pipeline();
        let mut canvas = RasterCanvas::new(16, 16).unwrap();

        let mut tracker = ReplayTracker::from_frames(vec![FrameObservation::empty(); 10]);
        let summary = run(
            &mut pipeline,
            &mut tracker,
            &mut canvas,
            Duration::from_millis(1),
            None,
            async {},
        )
        .await
        .unwrap();
        assert_eq!(summary, RunSummary { frames: 0, reason: StopReason::Shutdown });

        let summary = run(
            &mut pipeline,
            &mut tracker,
            &mut canvas,
            Duration::from_millis(1),
            Some(4),
            std::future::pending(),
        )
        .await
        .unwrap();
        assert_eq!(summary, RunSummary { frames: 4, reason: StopReason::FrameLimit });
        assert_eq!(tracker.remaining(), 6);
    }
}
