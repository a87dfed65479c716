//! # Build Configuration
//!
//! Tuning knobs for a build, loaded once from TOML. Every field has a
//! default, so an empty file (or no file at all) is a valid config.
//!
//! ```toml
//! bsp_leaf_faces = 16
//! corridor_width = 8.0
//! file_extension = "wmo"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DungeonError, DungeonResult};
use delve_shared::DEFAULT_FILE_EXTENSION;

/// Faces a BSP leaf may hold before the builder tries to split it.
pub const DEFAULT_BSP_LEAF_FACES: usize = 16;

/// Recursion cap for BSP construction.
pub const DEFAULT_BSP_MAX_DEPTH: u32 = 24;

/// Settings shared by every stage of one build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Leaf face-count threshold for BSP recursion.
    pub bsp_leaf_faces: usize,
    /// Maximum BSP depth; deeper nodes become leaves.
    pub bsp_max_depth: u32,
    /// Width of synthesized corridors.
    pub corridor_width: f32,
    /// Ceiling height of synthesized corridors (capped by the joined rooms).
    pub corridor_height: f32,
    /// Lower bound for corridor width and length.
    pub min_walkable_width: f32,
    /// World units per texture repeat.
    pub uv_scale: f32,
    /// Spiral ramp inner radius as a fraction of the outer radius.
    pub ramp_inner_ratio: f32,
    /// Spiral ramp headroom as a fraction of the rise per turn.
    pub ramp_headroom_ratio: f32,
    /// Extension of the root and group files, without the dot.
    pub file_extension: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            bsp_leaf_faces: DEFAULT_BSP_LEAF_FACES,
            bsp_max_depth: DEFAULT_BSP_MAX_DEPTH,
            corridor_width: 8.0,
            corridor_height: 8.0,
            min_walkable_width: 4.0,
            uv_scale: 4.0,
            ramp_inner_ratio: 0.4,
            ramp_headroom_ratio: 0.75,
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
        }
    }
}

impl BuildConfig {
    /// Parses and validates a TOML config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidConfig`] for syntax errors,
    /// unknown keys or unusable values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigurationError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigurationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Io`] if the file cannot be read, otherwise
    /// the same errors as [`BuildConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> DungeonResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DungeonError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_toml_str(&text)?)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |msg: &str| Err(ConfigurationError::InvalidConfig(msg.to_string()));

        if self.bsp_leaf_faces == 0 {
            return invalid("bsp_leaf_faces must be at least 1");
        }
        for (name, value) in [
            ("corridor_width", self.corridor_width),
            ("corridor_height", self.corridor_height),
            ("min_walkable_width", self.min_walkable_width),
            ("uv_scale", self.uv_scale),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigurationError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("ramp_inner_ratio", self.ramp_inner_ratio),
            ("ramp_headroom_ratio", self.ramp_headroom_ratio),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigurationError::InvalidConfig(format!(
                    "{name} must lie strictly between 0 and 1, got {value}"
                )));
            }
        }
        if self.file_extension.is_empty()
            || !self.file_extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return invalid("file_extension must be non-empty ASCII alphanumerics");
        }
        Ok(())
    }

    /// Corridor width after applying the walkable minimum.
    #[must_use]
    pub fn effective_corridor_width(&self) -> f32 {
        self.corridor_width.max(self.min_walkable_width)
    }
}
