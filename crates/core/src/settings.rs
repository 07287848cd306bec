use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::detector_options::{DetectorKind, PerformanceMode};
use crate::shared::constants::{APP_DIR_NAME, SETTINGS_FILE_NAME};
use crate::shared::frame_metadata::CameraFacing;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} must be between 0.0 and 1.0, got {value}")]
    OutOfRange { field: &'static str, value: f32 },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Preferences remembered between runs. Command-line flags override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub facing: CameraFacing,
    pub detector: DetectorKind,
    pub performance_mode: PerformanceMode,
    pub confidence: f32,
    pub min_face_size: f32,
    pub tracking: bool,
    pub realtime: bool,
    pub overlay_bitmap: Option<PathBuf>,
    pub font: Option<PathBuf>,
    pub model_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Back,
            detector: DetectorKind::Landmarks,
            performance_mode: PerformanceMode::Fast,
            confidence: 0.5,
            min_face_size: 0.1,
            tracking: true,
            realtime: true,
            overlay_bitmap: None,
            font: None,
            model_url: None,
        }
    }
}

impl Settings {
    /// `<config dir>/FaceOverlay/settings.json`.
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Loads saved settings, falling back to defaults when none exist or
    /// the file cannot be used.
    pub fn load() -> Self {
        match Self::config_path().and_then(|path| Self::load_from(&path)) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("Ignoring saved settings: {e}");
                Self::default()
            }
        }
    }

    /// Reads settings from `path`; `Ok(None)` when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, SettingsError> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Checks the fractional values, whether they came from flags or the
    /// settings file.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (field, value) in [
            ("confidence", self.confidence),
            ("min_face_size", self.min_face_size),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SettingsError::OutOfRange { field, value });
            }
        }
        Ok(())
    }

    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_preserves_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("settings.json");
        let settings = Settings {
            facing: CameraFacing::Front,
            detector: DetectorKind::Contours,
            confidence: 0.7,
            overlay_bitmap: Some(PathBuf::from("/tmp/nose.png")),
            ..Settings::default()
        };

        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path).unwrap().unwrap();

        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(Settings::load_from(&tmp.path().join("absent.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, r#"{"facing": "front", "tracking": false}"#).unwrap();

        let loaded = Settings::load_from(&path).unwrap().unwrap();

        assert_eq!(loaded.facing, CameraFacing::Front);
        assert!(!loaded.tracking);
        assert_eq!(loaded.detector, DetectorKind::Landmarks);
        assert_eq!(loaded.confidence, 0.5);
    }

    #[test]
    fn test_malformed_file_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[rstest]
    #[case(r#"{"confidence": 1.5}"#, "confidence")]
    #[case(r#"{"confidence": -0.1}"#, "confidence")]
    #[case(r#"{"min_face_size": 2.0}"#, "min_face_size")]
    fn test_out_of_range_file_values_are_rejected(#[case] json: &str, #[case] expected: &str) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, json).unwrap();

        let loaded = Settings::load_from(&path).unwrap().unwrap();

        match loaded.validate() {
            Err(SettingsError::OutOfRange { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected out-of-range error, got {other:?}"),
        }
    }

    #[test]
    fn test_config_path_uses_app_dir() {
        if let Ok(path) = Settings::config_path() {
            assert!(path.ends_with(Path::new(APP_DIR_NAME).join(SETTINGS_FILE_NAME)));
        }
    }
}
