use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bindings::KeyLayout;
use crate::transform::TransformConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seconds of already-played material kept on screen.
    pub behind_sec: f64,
    /// Seconds of upcoming material shown ahead of the now marker.
    pub ahead_sec: f64,
    /// Binding events beyond this press index are drawn in the neutral color.
    pub max_bindings_shown: u32,
    pub transform: TransformConfig,
    pub layout: KeyLayout,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            behind_sec: 1.0,
            ahead_sec: 4.0,
            max_bindings_shown: 8,
            transform: TransformConfig::default(),
            layout: KeyLayout::default(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("clavio").join("config.ron"))
    }

    /// Loads the persisted config, falling back to defaults when the file is
    /// missing or unreadable. Configuration problems are never fatal.
    pub fn load_or_default() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path).map_err(|e| e.to_string()) {
            Ok(text) => match ron::from_str(&text) {
                Ok(config) => config,
                Err(err) => {
                    warn!(path = %path.display(), %err, "corrupt config, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable config, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ron_round_trip() {
        let config = AppConfig {
            behind_sec: 2.0,
            ahead_sec: 6.0,
            ..Default::default()
        };
        let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        let back: AppConfig = ron::from_str(&text).unwrap();
        assert_eq!(back.behind_sec, 2.0);
        assert_eq!(back.ahead_sec, 6.0);
        assert_eq!(back.layout.lane_count(), config.layout.lane_count());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("clavio-config-corrupt-test.ron");
        std::fs::write(&path, "not ron at all {{{").unwrap();
        let config = AppConfig::load_from(&path);
        assert_eq!(config.behind_sec, AppConfig::default().behind_sec);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("clavio-config-missing-test.ron");
        let _ = std::fs::remove_file(&path);
        let config = AppConfig::load_from(&path);
        assert_eq!(config.max_bindings_shown, 8);
    }
}
