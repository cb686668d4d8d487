//! Configuration module for thermview
//!
//! Configuration is a TOML file with one table per concern (see [`settings`]).
//! Values given on the command line override the file.
//!
//! # Config Location
//!
//! Without `--config`, the file is looked up in the platform config directory
//! under `thermview/config.toml`:
//!
//! - **Linux**: `~/.config/thermview/config.toml`
//! - **macOS**: `~/Library/Application Support/thermview/config.toml`
//! - **Windows**: `%APPDATA%\thermview\config.toml`
//!
//! A missing default file is not an error; a missing explicit file is.
//!
//! # Example
//!
//! ```toml
//! [camera]
//! camera_type = "LEPTON3"
//!
//! [colormap]
//! default_lut = "VIRIDIS"
//! isotherm_band_start = 0.8
//!
//! [recording]
//! output_dir = "/var/lib/thermview"
//! fps = 20.0
//! ```

pub mod settings;

pub use settings::*;

use crate::colormap::{LutName, MAX_BIT_DEPTH};
use crate::error::ConfigError;
use crate::types::CameraModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application directory name under the platform config dir
pub const APP_ID: &str = "thermview";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default config file path, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub colormap: ColorMapConfig,
    pub recording: RecordingConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Parse a config from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `explicit` if given, else the default file if it exists, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Write the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ConfigError::Read {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        std::fs::write(path, text).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply command-line overrides. Strings are parsed here so that bad
    /// values surface as [`ConfigError`] rather than at runtime.
    pub fn apply_overrides(
        &mut self,
        lut: Option<&str>,
        camera_type: Option<&str>,
        record_dir: Option<&Path>,
    ) -> Result<(), ConfigError> {
        if let Some(lut) = lut {
            self.colormap.default_lut = lut
                .parse::<LutName>()
                .map_err(|e| ConfigError::UnknownLut(e.0))?;
        }
        if let Some(camera_type) = camera_type {
            self.camera.camera_type = camera_type.parse::<CameraModel>()?;
        }
        if let Some(dir) = record_dir {
            self.recording.output_dir = dir.to_path_buf();
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.colormap.isotherm_band().is_valid() {
            return Err(ConfigError::Invalid(format!(
                "isotherm band {}..{} must satisfy 0 <= start < end <= 1",
                self.colormap.isotherm_band_start, self.colormap.isotherm_band_end
            )));
        }
        if self.colormap.bit_depth == 0 || self.colormap.bit_depth > MAX_BIT_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "colormap bit_depth must be 1..={}, got {}",
                MAX_BIT_DEPTH, self.colormap.bit_depth
            )));
        }
        if let Some(fps) = self.recording.fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "recording fps must be positive, got {}",
                    fps
                )));
            }
        }
        if self.recording.queue_frames == 0 {
            return Err(ConfigError::Invalid(
                "recording queue_frames must be at least 1".to_string(),
            ));
        }
        if self.camera.open_retries == 0 {
            return Err(ConfigError::Invalid(
                "camera open_retries must be at least 1".to_string(),
            ));
        }
        if self.camera.watchdog_multiple == 0 {
            return Err(ConfigError::Invalid(
                "camera watchdog_multiple must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [camera]
            camera_type = "LEPTON2"

            [colormap]
            default_lut = "viridis"
            "#,
        )
        .unwrap();

        assert_eq!(config.camera.camera_type, CameraModel::Lepton2);
        assert_eq!(config.colormap.default_lut, LutName::Viridis);
        assert_eq!(config.camera.open_retries, 3);
        assert_eq!(config.recording.queue_frames, 32);
    }

    #[test]
    fn test_invalid_band_rejected() {
        let err = AppConfig::from_toml(
            r#"
            [colormap]
            isotherm_band_start = 0.9
            isotherm_band_end = 0.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_lut_in_file_rejected() {
        let err = AppConfig::from_toml("[colormap]\ndefault_lut = \"SEPIA\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(Some("isotherm_green"), Some("lepton3"), Some(Path::new("/tmp/rec")))
            .unwrap();
        assert_eq!(config.colormap.default_lut, LutName::IsothermGreen);
        assert_eq!(config.camera.camera_type, CameraModel::Lepton3);
        assert_eq!(config.recording.output_dir, PathBuf::from("/tmp/rec"));

        assert!(matches!(
            config.apply_overrides(Some("SEPIA"), None, None),
            Err(ConfigError::UnknownLut(_))
        ));
        assert!(matches!(
            config.apply_overrides(None, Some("FLIR_ONE"), None),
            Err(ConfigError::UnknownCameraType(_))
        ));
    }
}
