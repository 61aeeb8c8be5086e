//! Sprite asset loading and the rig's sprite table

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbaImage;

use super::expression::{EyeState, MouthState};
use super::pose::HandPose;
use crate::config::AvatarConfig;
use crate::error::{AvatarError, Fushigi2dError};

/// A decoded, pre-scaled sprite
pub type Sprite = RgbaImage;

/// Every sprite layer the rig must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpriteKey {
    IdleEyes,
    Blink,
    LeftWink,
    RightWink,
    IdleMouth,
    MouthA,
    MouthI,
    MouthU,
    IdleBody,
    Wave1,
    Wave2,
}

impl SpriteKey {
    pub const ALL: [SpriteKey; 11] = [
        Self::IdleEyes,
        Self::Blink,
        Self::LeftWink,
        Self::RightWink,
        Self::IdleMouth,
        Self::MouthA,
        Self::MouthI,
        Self::MouthU,
        Self::IdleBody,
        Self::Wave1,
        Self::Wave2,
    ];

    /// Name used in the `[avatar.sprites]` table
    pub fn name(&self) -> &'static str {
        match self {
            Self::IdleEyes => "IDLE EYES",
            Self::Blink => "BLINK",
            Self::LeftWink => "LEFT WINK",
            Self::RightWink => "RIGHT WINK",
            Self::IdleMouth => "IDLE MOUTH",
            Self::MouthA => "A",
            Self::MouthI => "I",
            Self::MouthU => "U",
            Self::IdleBody => "IDLE BODY",
            Self::Wave1 => "WAVE1",
            Self::Wave2 => "WAVE2",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for SpriteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<EyeState> for SpriteKey {
    fn from(state: EyeState) -> Self {
        match state {
            EyeState::Open => Self::IdleEyes,
            EyeState::Blink => Self::Blink,
            EyeState::LeftWink => Self::LeftWink,
            EyeState::RightWink => Self::RightWink,
        }
    }
}

impl From<MouthState> for SpriteKey {
    fn from(state: MouthState) -> Self {
        match state {
            MouthState::Idle => Self::IdleMouth,
            MouthState::A => Self::MouthA,
            MouthState::I => Self::MouthI,
            MouthState::U => Self::MouthU,
        }
    }
}

impl From<HandPose> for SpriteKey {
    fn from(pose: HandPose) -> Self {
        match pose {
            HandPose::Lowered => Self::IdleBody,
            HandPose::Near => Self::Wave1,
            HandPose::Far => Self::Wave2,
        }
    }
}

/// Complete mapping from every [`SpriteKey`] to a loaded sprite.
///
/// Only constructible with all keys present, so lookups cannot fail.
#[derive(Debug, Clone)]
pub struct SpriteTable {
    sprites: Vec<Sprite>,
    size: (u32, u32),
}

impl SpriteTable {
    /// Build a table, failing on the first key with no sprite
    pub fn from_map(mut sprites: HashMap<SpriteKey, Sprite>) -> Result<Self, Fushigi2dError> {
        let mut ordered = Vec::with_capacity(SpriteKey::ALL.len());
        for key in SpriteKey::ALL {
            let sprite = sprites
                .remove(&key)
                .ok_or_else(|| AvatarError::UnmappedSprite(key.name().to_string()))?;
            ordered.push(sprite);
        }

        let size = ordered[0].dimensions();
        Ok(Self {
            sprites: ordered,
            size,
        })
    }

    pub fn get(&self, key: SpriteKey) -> &Sprite {
        &self.sprites[key.index()]
    }

    /// Render size of the rig's sprites
    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

/// Resolves and loads the rig's sprite files
#[derive(Debug)]
pub struct AssetManager {
    /// Base directory for assets
    base_dir: PathBuf,
    /// Resolved sprite paths
    paths: BTreeMap<SpriteKey, PathBuf>,
    /// Size every sprite is scaled to
    size: (u32, u32),
}

impl AssetManager {
    /// Resolve every sprite path from configuration. Fails if the assets
    /// directory is missing, a key is unknown or unmapped, or a file does not
    /// exist.
    pub fn new(config: &AvatarConfig) -> Result<Self, Fushigi2dError> {
        let base_dir = if config.assets_dir.is_absolute() {
            config.assets_dir.clone()
        } else {
            std::env::current_dir()?.join(&config.assets_dir)
        };

        if !base_dir.is_dir() {
            return Err(AvatarError::AssetsDirNotFound(base_dir.display().to_string()).into());
        }

        let mut paths = BTreeMap::new();
        for (name, filename) in &config.sprites {
            let key = SpriteKey::from_name(name)
                .ok_or_else(|| AvatarError::UnknownSprite(name.clone()))?;
            let path = base_dir.join(filename);
            if !path.is_file() {
                return Err(AvatarError::AssetNotFound(format!(
                    "{} ({})",
                    name,
                    path.display()
                ))
                .into());
            }
            tracing::debug!("Resolved sprite: {} -> {}", name, filename);
            paths.insert(key, path);
        }

        if let Some(missing) = SpriteKey::ALL.iter().find(|key| !paths.contains_key(*key)) {
            return Err(AvatarError::UnmappedSprite(missing.name().to_string()).into());
        }

        Ok(Self {
            base_dir,
            paths,
            size: (config.size[0], config.size[1]),
        })
    }

    /// Get the path for a sprite
    pub fn get_path(&self, key: SpriteKey) -> Option<&Path> {
        self.paths.get(&key).map(|p| p.as_path())
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Decode and scale every sprite into a [`SpriteTable`]
    pub fn load_sprites(&self) -> Result<SpriteTable, Fushigi2dError> {
        let mut sprites = HashMap::new();
        for (&key, path) in &self.paths {
            sprites.insert(key, load_scaled(path, self.size)?);
        }

        let table = SpriteTable::from_map(sprites)?;
        tracing::info!(
            "Loaded {} sprites at {}x{} from {}",
            SpriteKey::ALL.len(),
            self.size.0,
            self.size.1,
            self.base_dir.display()
        );
        Ok(table)
    }

    /// Load an extra image (e.g. the background) from the assets directory
    pub fn load_image(&self, filename: &str, size: (u32, u32)) -> Result<Sprite, Fushigi2dError> {
        let path = self.base_dir.join(filename);
        if !path.is_file() {
            return Err(AvatarError::AssetNotFound(path.display().to_string()).into());
        }
        load_scaled(&path, size)
    }
}

/// Decode an image file and scale it to exactly `size`
pub fn load_scaled(path: &Path, size: (u32, u32)) -> Result<Sprite, Fushigi2dError> {
    let image = image::open(path)
        .map_err(|e| AvatarError::ImageLoad(format!("{}: {}", path.display(), e)))?
        .to_rgba8();

    if image.dimensions() == size {
        return Ok(image);
    }
    Ok(image::imageops::resize(&image, size.0, size.1, FilterType::Triangle))
}
