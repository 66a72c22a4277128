use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use facecam_core::camera::domain::camera_frame::PixelFormat;
use facecam_core::detection::domain::detector_options::FaceDetectorOptions;
use facecam_core::shared::constants::DEFAULT_SENSOR_ORIENTATION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    System,
    Dark,
    Light,
}

impl Appearance {
    pub const ALL: &[Appearance] = &[Appearance::System, Appearance::Dark, Appearance::Light];
}

impl std::fmt::Display for Appearance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Appearance::System => write!(f, "System"),
            Appearance::Dark => write!(f, "Dark"),
            Appearance::Light => write!(f, "Light"),
        }
    }
}

/// Sensor mounts offered in the UI.
pub const ORIENTATIONS: &[i32] = &[0, 90, 180, 270];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub camera_index: u32,
    pub pixel_format: PixelFormat,
    /// Degrees the simulated sensor is mounted at.
    pub sensor_orientation: i32,
    pub model_path: Option<PathBuf>,
    /// Percent, 0-100.
    pub confidence: u32,
    /// Percent of the upright frame width, 0-100.
    pub min_face_size: u32,
    pub enable_contours: bool,
    pub enable_tracking: bool,
    pub detection_on_start: bool,
    pub preview_width: u32,
    pub appearance: Appearance,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera_index: 0,
            pixel_format: PixelFormat::Nv21,
            sensor_orientation: DEFAULT_SENSOR_ORIENTATION,
            model_path: None,
            confidence: 50,
            min_face_size: 10,
            enable_contours: true,
            enable_tracking: false,
            detection_on_start: true,
            preview_width: 400,
            appearance: Appearance::System,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("facecam").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Err(e) = self.save_to(&path) {
                log::warn!("Could not save settings to {}: {e}", path.display());
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn detector_options(&self) -> FaceDetectorOptions {
        FaceDetectorOptions {
            confidence: self.confidence.min(100) as f32 / 100.0,
            min_face_size: self.min_face_size.min(100) as f32 / 100.0,
            enable_contours: self.enable_contours,
            enable_tracking: self.enable_tracking,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            camera_index: 2,
            pixel_format: PixelFormat::Yuv420,
            model_path: Some(PathBuf::from("/models/bf.onnx")),
            enable_tracking: true,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Settings::load_from(&dir.path().join("nope.json")),
            Settings::default()
        );
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"confidence": 70, "pixel_format": "bgra8888"}"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.confidence, 70);
        assert_eq!(settings.pixel_format, PixelFormat::Bgra8888);
        assert_eq!(settings.sensor_orientation, DEFAULT_SENSOR_ORIENTATION);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_detector_options_from_percentages() {
        let settings = Settings {
            confidence: 75,
            min_face_size: 20,
            ..Default::default()
        };
        let options = settings.detector_options();
        assert!((options.confidence - 0.75).abs() < 1e-6);
        assert!((options.min_face_size - 0.2).abs() < 1e-6);
        assert!(options.validate().is_ok());
    }
}
