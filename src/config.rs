//! Deployment configuration.
//!
//! Handles loading, validating and merging `avatar.toml`. Settings are fixed
//! at deployment time: the application loads them once and hands the derived
//! specs to the [`Normalizer`](crate::normalize::Normalizer) and
//! [`ThumbnailDeriver`](crate::thumbnail::ThumbnailDeriver) at construction.
//! Nothing here is process-wide mutable state.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [avatar]
//! size = [500, 500]          # Canonical avatar size (width, height)
//! background = "#ffffff"     # Fill behind transparent pixels
//! quality = 90               # JPEG quality (0-100)
//!
//! [thumbnails]
//! size = [150, 150]          # Derived thumbnail size
//!
//! [storage]
//! upload_dir = "profile_uploads"
//! derived_dir = "derived"
//! cache_dir = "cache"
//!
//! [placeholder]
//! location = "/static/img/no_image_md.png"
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [avatar]
//! background = "#f4f4f4"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{DerivationSpec, NormalizationSpec, Quality, Rgb};
use crate::thumbnail::DeriverConfig;
use crate::types::Location;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up by [`load_config`].
pub const CONFIG_FILENAME: &str = "avatar.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `avatar.toml`.
///
/// All fields have defaults matching a typical profile page: 500x500
/// avatars on white, 150x150 thumbnails, JPEG quality 90.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvatarConfig {
    /// Canonical avatar settings.
    pub avatar: AvatarSection,
    /// Derived thumbnail settings.
    pub thumbnails: ThumbnailsSection,
    /// Storage layout.
    pub storage: StorageSection,
    /// Fallback shown when an avatar cannot be resolved.
    pub placeholder: PlaceholderSection,
}

/// Canonical avatar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvatarSection {
    /// Output size as `[width, height]`.
    pub size: [u32; 2],
    /// Background color (`#rrggbb` or `#rgb`) behind transparent pixels.
    pub background: String,
    /// JPEG encoding quality (0 = worst, 100 = best).
    pub quality: u32,
}

impl Default for AvatarSection {
    fn default() -> Self {
        Self {
            size: [500, 500],
            background: "#ffffff".to_string(),
            quality: 90,
        }
    }
}

/// Derived thumbnail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsSection {
    /// Thumbnail size as `[width, height]`.
    pub size: [u32; 2],
}

impl Default for ThumbnailsSection {
    fn default() -> Self {
        Self { size: [150, 150] }
    }
}

/// Where things live inside the storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    /// Directory for normalized uploads.
    pub upload_dir: String,
    /// Directory for served thumbnail files.
    pub derived_dir: String,
    /// Directory for persisted cache entries.
    pub cache_dir: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            upload_dir: "profile_uploads".to_string(),
            derived_dir: "derived".to_string(),
            cache_dir: "cache".to_string(),
        }
    }
}

/// Placeholder asset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderSection {
    pub location: String,
}

impl Default for PlaceholderSection {
    fn default() -> Self {
        Self {
            location: "/static/img/no_image_md.png".to_string(),
        }
    }
}

impl AvatarConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.avatar.quality > 100 {
            return Err(ConfigError::Validation(
                "avatar.quality must be 0-100".into(),
            ));
        }
        if self.avatar.size.contains(&0) {
            return Err(ConfigError::Validation(
                "avatar.size values must be non-zero".into(),
            ));
        }
        if self.thumbnails.size.contains(&0) {
            return Err(ConfigError::Validation(
                "thumbnails.size values must be non-zero".into(),
            ));
        }
        if Rgb::parse_hex(&self.avatar.background).is_none() {
            return Err(ConfigError::Validation(format!(
                "avatar.background must be #rrggbb or #rgb, got {:?}",
                self.avatar.background
            )));
        }
        if self.placeholder.location.trim().is_empty() {
            return Err(ConfigError::Validation(
                "placeholder.location must not be empty".into(),
            ));
        }
        for (key, dir) in [
            ("storage.upload_dir", &self.storage.upload_dir),
            ("storage.derived_dir", &self.storage.derived_dir),
            ("storage.cache_dir", &self.storage.cache_dir),
        ] {
            if dir.trim_matches('/').is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.avatar.quality)
    }

    pub fn background(&self) -> Result<Rgb, ConfigError> {
        Rgb::parse_hex(&self.avatar.background).ok_or_else(|| {
            ConfigError::Validation(format!(
                "avatar.background is not a color: {:?}",
                self.avatar.background
            ))
        })
    }

    pub fn normalization_spec(&self) -> Result<NormalizationSpec, ConfigError> {
        let [w, h] = self.avatar.size;
        NormalizationSpec::new((w, h), self.background()?, self.quality())
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }

    pub fn thumbnail_spec(&self) -> Result<DerivationSpec, ConfigError> {
        let [w, h] = self.thumbnails.size;
        DerivationSpec::new((w, h)).map_err(|e| ConfigError::Validation(e.to_string()))
    }

    pub fn deriver_config(&self) -> Result<DeriverConfig, ConfigError> {
        Ok(DeriverConfig {
            quality: self.quality(),
            background: self.background()?,
            derived_dir: self.storage.derived_dir.clone(),
        })
    }

    pub fn placeholder(&self) -> Location {
        Location::new(self.placeholder.location.clone())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AvatarConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `avatar.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AvatarConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AvatarConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `avatar.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<AvatarConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `avatar.toml` with all keys and explanations.
pub fn stock_config_toml() -> &'static str {
    r##"# Avatar Pipeline Configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Canonical avatar
# ---------------------------------------------------------------------------
[avatar]
# Output size as [width, height]. Uploads are scaled to cover this box
# and center-cropped.
size = [500, 500]

# Color painted behind transparent pixels (#rrggbb or #rgb).
background = "#ffffff"

# JPEG encoding quality (0 = worst, 100 = best).
quality = 90

# ---------------------------------------------------------------------------
# Thumbnails (derived lazily from the canonical avatar)
# ---------------------------------------------------------------------------
[thumbnails]
size = [150, 150]

# ---------------------------------------------------------------------------
# Storage layout (paths relative to the storage root)
# ---------------------------------------------------------------------------
[storage]
upload_dir = "profile_uploads"
derived_dir = "derived"
cache_dir = "cache"

# ---------------------------------------------------------------------------
# Placeholder shown when an avatar is missing or unreadable
# ---------------------------------------------------------------------------
[placeholder]
location = "/static/img/no_image_md.png"
"##
}
