//! Canvas configuration: drawing-area size, export scale, random seed and default font.

use crate::error::{Result, TurtleError};
use crate::turtle::FontSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Recognized configuration options.
///
/// Every field has a default, so a config file only needs the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Drawing-area width in pixels.
    pub width: u32,
    /// Drawing-area height in pixels.
    pub height: u32,
    /// Multiplier used by the high-resolution export.
    pub export_scale: u32,
    /// Seed for `random`. `None` picks one per session.
    pub seed: Option<u64>,
    /// Font used by `write` until a script changes it.
    pub font: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            export_scale: 2,
            seed: None,
            font: FontSpec::default().to_string(),
        }
    }
}

impl CanvasConfig {
    /// Loads a `.toml` or `.json` file and validates it.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| TurtleError::Config(format!("Invalid TOML config: {}", e)))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| TurtleError::Config(format!("Invalid JSON config: {}", e)))?,
            _ => {
                return Err(TurtleError::Config(
                    "Config file must be .json or .toml".to_string(),
                ));
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Writes the config as TOML.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| TurtleError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(TurtleError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.export_scale == 0 {
            return Err(TurtleError::InvalidScale(self.export_scale));
        }
        self.font_spec()?;
        Ok(())
    }

    pub fn font_spec(&self) -> Result<FontSpec> {
        self.font.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = CanvasConfig::default();
        assert_eq!((config.width, config.height), (300, 300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_sized_canvas_is_rejected() {
        let config = CanvasConfig {
            height: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TurtleError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "width = 640\nseed = 7").unwrap();

        let config = CanvasConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 300);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn json_and_save_round_trip() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"height": 120, "font": "bold 14px serif"}}"#).unwrap();
        let config = CanvasConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.height, 120);
        assert!(config.font_spec().unwrap().bold);

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("canvas.toml");
        config.save_to_file(&out).unwrap();
        assert_eq!(CanvasConfig::load_from_file(&out).unwrap(), config);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            CanvasConfig::load_from_file(file.path()),
            Err(TurtleError::Config(_))
        ));
    }
}
