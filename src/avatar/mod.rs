//! Avatar module
//!
//! Turns landmarks into the rig's sprite selection and anchor transforms:
//! expression classification, pose targets, smoothing, and sprite assets.

pub mod assets;
pub mod expression;
pub mod pose;
pub mod smoothing;
pub mod state;

pub use assets::{AssetManager, Sprite, SpriteKey, SpriteTable};
pub use expression::{Expression, ExpressionClassifier, EyeState, MouthState};
pub use pose::{HandPose, HandTarget, PoseResolver, PoseTargets};
pub use smoothing::{AnchorSmoother, SmoothedAnchors, SmootherState};
pub use state::{AvatarState, Transform2D};
