//! Fushigi2D - Landmark-driven 2D sprite avatar
//!
//! Turns per-frame face, pose and hand landmarks into a layered sprite
//! avatar:
//! - Classifies eye and mouth shapes from face landmarks
//! - Places and rolls the body from pose landmarks, picks a waving-hand pose
//! - Smooths motion between frames
//! - Composites the selected sprites onto a green-screen canvas

pub mod avatar;
pub mod config;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod render;
pub mod tracking;

pub use config::Config;
pub use error::{Fushigi2dError, Result};
pub use pipeline::{Pipeline, RunSummary, StopReason};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
