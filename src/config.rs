//! Configuration parsing and management for Fushigi2D
//!
//! Every tunable of the landmark-to-sprite pipeline lives here. All values are
//! static for the lifetime of a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::avatar::SpriteKey;
use crate::error::{ConfigError, Fushigi2dError};
use crate::tracking::Hand;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub avatar: AvatarConfig,
    pub expression: ExpressionThresholds,
    pub pose: PoseConfig,
    pub smoothing: SmoothingConfig,
    pub render: RenderConfig,
    pub tracker: TrackerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Fushigi2dError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self, Fushigi2dError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, Fushigi2dError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Fushigi2dError> {
        let [w, h] = self.window.size;
        if w == 0 || h == 0 {
            return Err(invalid("window.size", "Window dimensions must be greater than 0"));
        }

        let [aw, ah] = self.avatar.size;
        if aw == 0 || ah == 0 {
            return Err(invalid("avatar.size", "Avatar dimensions must be greater than 0"));
        }

        for name in self.avatar.sprites.keys() {
            if SpriteKey::from_name(name).is_none() {
                return Err(invalid(
                    "avatar.sprites",
                    &format!("Unknown sprite key '{}'", name),
                ));
            }
        }

        let e = &self.expression;
        for (field, value) in [
            ("expression.eye_close_thresh", e.eye_close_thresh),
            ("expression.height_open_thresh", e.height_open_thresh),
            ("expression.height_big_thresh", e.height_big_thresh),
            ("expression.ratio_round_thresh", e.ratio_round_thresh),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, "Threshold must be a finite, non-negative number"));
            }
        }
        if e.height_open_thresh >= e.height_big_thresh {
            return Err(invalid(
                "expression.height_open_thresh",
                "Open threshold must be below the big-mouth threshold",
            ));
        }

        for (field, value) in [
            ("smoothing.alpha_pos", self.smoothing.alpha_pos),
            ("smoothing.alpha_angle", self.smoothing.alpha_angle),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(field, "Smoothing alpha must be in (0.0, 1.0]"));
            }
        }

        for (field, value) in [
            ("pose.movement_sensitivity", self.pose.movement_sensitivity),
            ("pose.hand_sensitivity", self.pose.hand_sensitivity),
            ("pose.distance_thresh", self.pose.distance_thresh),
        ] {
            if !value.is_finite() {
                return Err(invalid(field, "Value must be finite"));
            }
        }

        if !(1..=240).contains(&self.render.target_fps) {
            return Err(invalid("render.target_fps", "Target FPS must be between 1 and 240"));
        }

        if self.tracker.port == 0 {
            return Err(invalid("tracker.port", "Port must be greater than 0"));
        }

        if self.tracker.auto_launch {
            let path = Path::new(&self.tracker.tracker_script);
            if !path.exists() {
                tracing::warn!(
                    "Tracker auto_launch enabled but script not found at: {}",
                    self.tracker.tracker_script
                );
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> Fushigi2dError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Output window / canvas configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Canvas size in pixels (width, height)
    pub size: [u32; 2],
    /// RGBA fill used when no background image is configured (chroma green)
    pub background_color: [u8; 4],
    /// Optional background image, relative to `avatar.assets_dir`
    pub background_image: Option<String>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: [500, 500],
            background_color: [0, 255, 0, 255],
            background_image: None,
        }
    }
}

/// Sprite rig configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Render size every sprite is pre-scaled to (width, height)
    pub size: [u32; 2],
    /// Directory containing the sprite images
    pub assets_dir: PathBuf,
    /// Logical sprite name ("BLINK", "A", "IDLE MOUTH", ...) to file name
    pub sprites: BTreeMap<String, String>,
    /// Fixed rotation added to the body angle when drawing. The default rig
    /// is authored upside-down relative to the shoulder angle.
    pub rotation_offset_degrees: f32,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        let sprites = [
            ("IDLE EYES", "v3/v3_idle.png"),
            ("BLINK", "v3/v3_blink.png"),
            ("LEFT WINK", "v3/v3_wink_left.png"),
            ("RIGHT WINK", "v3/v3_wink_right.png"),
            ("IDLE MOUTH", "v3/v3_mouth_idle.png"),
            ("A", "v3/v3_mouth_a.png"),
            ("I", "v3/v3_mouth_e.png"),
            ("U", "v3/v3_mouth_u.png"),
            ("IDLE BODY", "v3/v3_idle.png"),
            ("WAVE1", "v3/wave1.png"),
            ("WAVE2", "v3/wave2.png"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            size: [900, 900],
            assets_dir: PathBuf::from("./assets"),
            sprites,
            rotation_offset_degrees: 180.0,
        }
    }
}

/// Static thresholds for eye and mouth classification, in normalized
/// landmark units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionThresholds {
    /// Eye lid gap below which an eye counts as closed
    pub eye_close_thresh: f32,
    /// Lip gap at or below which the mouth counts as closed
    pub height_open_thresh: f32,
    /// Lip gap above which the mouth is wide open ("A")
    pub height_big_thresh: f32,
    /// Height/width ratio above which an open mouth is "I", otherwise "U"
    pub ratio_round_thresh: f32,
}

impl Default for ExpressionThresholds {
    fn default() -> Self {
        Self {
            eye_close_thresh: 0.012,
            height_open_thresh: 0.001,
            height_big_thresh: 0.05,
            ratio_round_thresh: 0.15,
        }
    }
}

/// Body and hand anchor derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Pixel offset added to the nose-derived body position
    pub anchor_offset: [f32; 2],
    /// Scale applied to body movement in window space
    pub movement_sensitivity: f32,
    /// Scale applied to wrist movement in window space
    pub hand_sensitivity: f32,
    /// Pixel origin for shoulder and wrist positions
    pub hand_origin: [f32; 2],
    /// Left hand rest position relative to the smoothed body anchor
    pub left_hand_rest_offset: [f32; 2],
    /// Right hand rest position relative to the smoothed body anchor
    pub right_hand_rest_offset: [f32; 2],
    /// Hand-to-shoulder distance (pixels) separating "near" from "far"
    pub distance_thresh: f32,
    /// Which tracked hand selects the body layer sprite
    pub wave_hand: Hand,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            anchor_offset: [-150.0, -150.0],
            movement_sensitivity: 1.0,
            hand_sensitivity: 1.8,
            hand_origin: [100.0, 100.0],
            left_hand_rest_offset: [-50.0, 200.0],
            right_hand_rest_offset: [180.0, 150.0],
            distance_thresh: 300.0,
            wave_hand: Hand::Left,
        }
    }
}

/// Exponential smoothing of the rendered anchors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Blend factor for positions, in (0, 1]
    pub alpha_pos: f32,
    /// Blend factor for the body angle, in (0, 1]
    pub alpha_angle: f32,
    /// Body anchor position before the first detection
    pub initial_body: [f32; 2],
    /// Body angle before the first detection, in degrees
    pub initial_body_angle: f32,
    pub initial_left_hand: [f32; 2],
    pub initial_right_hand: [f32; 2],
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            alpha_pos: 0.2,
            alpha_angle: 0.5,
            initial_body: [250.0, 250.0],
            initial_body_angle: 0.0,
            initial_left_hand: [100.0, 300.0],
            initial_right_hand: [300.0, 300.0],
        }
    }
}

/// Frame loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Frame-rate cap for the main loop
    pub target_fps: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { target_fps: 30 }
    }
}

impl RenderConfig {
    /// Duration of one frame at the target rate
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }
}

/// External landmark tracker (JSON over UDP) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Listen address for UDP socket
    pub listen_address: String,
    /// UDP port to receive landmark packets on
    pub port: u16,
    /// How long one `process` call waits for a packet
    pub read_timeout_ms: u64,
    /// Last packet is reused on timeout while younger than this
    pub stale_after_ms: u64,
    /// Auto-launch the tracker helper subprocess
    pub auto_launch: bool,
    /// Path to the tracker helper script
    pub tracker_script: String,
    /// Camera device index passed to the helper
    pub camera_device: u32,
    /// Flip camera frames horizontally before tracking
    pub mirror: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1".to_string(),
            port: 12346,
            read_timeout_ms: 100,
            stale_after_ms: 250,
            auto_launch: false,
            tracker_script: "scripts/landmark_tracker.py".to_string(),
            camera_device: 0,
            mirror: true,
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("fushigi2d");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/fushigi2d");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/fushigi2d");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("fushigi2d");
        }
    }

    PathBuf::from(".")
}
