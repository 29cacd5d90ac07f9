//! Audio manager configuration.
//!
//! Provides default volumes, transition tuning, preference keys, mixer
//! parameter names and the resource root. Configuration can be loaded from
//! and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use cadence_common::clamp01;

/// Configuration file name.
const CONFIG_FILE: &str = "cadence.toml";

/// Keys used to persist volume and mute state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceKeys {
    /// Music volume key.
    pub music_volume: String,
    /// Sound effect volume key.
    pub sfx_volume: String,
    /// Music on/off key.
    pub music_on: String,
    /// Sound effect on/off key.
    pub sfx_on: String,
}

impl Default for PreferenceKeys {
    fn default() -> Self {
        Self {
            music_volume: "BGMVol".to_string(),
            sfx_volume: "SFXVol".to_string(),
            music_on: "BGMStatus".to_string(),
            sfx_on: "SFXStatus".to_string(),
        }
    }
}

/// Names of the mixer group parameters. `None` disables mirroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerParams {
    /// Music group gain parameter.
    pub music: Option<String>,
    /// Sound effect group gain parameter.
    pub sfx: Option<String>,
}

impl Default for MixerParams {
    fn default() -> Self {
        Self {
            music: Some("BGMVol".to_string()),
            sfx: Some("SFXVol".to_string()),
        }
    }
}

/// Audio manager configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    // === Volumes ===
    /// Music volume used when no preference is stored (0.0 - 1.0)
    pub default_music_volume: f32,
    /// Sound effect volume used when no preference is stored (0.0 - 1.0)
    pub default_sfx_volume: f32,

    // === Transitions ===
    /// Volume change per transition step
    pub fade_step: f32,
    /// Seconds between transition steps
    pub step_interval: f32,

    // === Persistence ===
    /// Preference keys
    pub keys: PreferenceKeys,

    // === Mixer ===
    /// Mixer parameter names
    pub mixer: MixerParams,

    // === Assets ===
    /// Root directory for resource paths
    pub resource_root: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            default_music_volume: 0.12,
            default_sfx_volume: 1.0,

            fade_step: 0.05,
            step_interval: 0.2,

            keys: PreferenceKeys::default(),
            mixer: MixerParams::default(),

            resource_root: PathBuf::from("assets"),
        }
    }
}

impl AudioConfig {
    /// Set the default music volume.
    #[must_use]
    pub fn with_music_volume(mut self, volume: f32) -> Self {
        self.default_music_volume = volume;
        self
    }

    /// Set the default sound effect volume.
    #[must_use]
    pub fn with_sfx_volume(mut self, volume: f32) -> Self {
        self.default_sfx_volume = volume;
        self
    }

    /// Set the transition step size and interval.
    #[must_use]
    pub fn with_transition(mut self, fade_step: f32, step_interval: f32) -> Self {
        self.fade_step = fade_step;
        self.step_interval = step_interval;
        self
    }

    /// Set the mixer parameter names.
    #[must_use]
    pub fn with_mixer_params(mut self, music: Option<&str>, sfx: Option<&str>) -> Self {
        self.mixer = MixerParams {
            music: music.map(str::to_string),
            sfx: sfx.map(str::to_string),
        };
        self
    }

    /// Set the resource root.
    #[must_use]
    pub fn with_resource_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.resource_root = root.into();
        self
    }

    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let mut config: Self = match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        return Self::default();
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                return Self::default();
            },
        };

        config.validate();
        config
    }

    /// Save configuration to the default file location.
    pub fn save(&self) -> io::Result<()> {
        self.save_to(Self::config_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Default configuration file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from(CONFIG_FILE),
            |dir| dir.join("cadence").join(CONFIG_FILE),
        )
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.default_music_volume = clamp01(self.default_music_volume);
        self.default_sfx_volume = clamp01(self.default_sfx_volume);

        // A zero step would never finish a transition.
        if self.fade_step.is_nan() || self.fade_step <= 0.0 {
            self.fade_step = 0.05;
        }
        self.fade_step = self.fade_step.min(1.0);

        if self.step_interval.is_nan() || self.step_interval <= 0.0 {
            self.step_interval = 0.2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();
        assert!((config.default_music_volume - 0.12).abs() < 0.001);
        assert!((config.default_sfx_volume - 1.0).abs() < 0.001);
        assert!((config.fade_step - 0.05).abs() < 0.001);
        assert!((config.step_interval - 0.2).abs() < 0.001);
        assert_eq!(config.keys.music_volume, "BGMVol");
        assert_eq!(config.keys.sfx_on, "SFXStatus");
    }

    #[test]
    fn test_config_validation() {
        let mut config = AudioConfig::default()
            .with_music_volume(2.0)
            .with_transition(0.0, -1.0);

        config.validate();

        assert!((config.default_music_volume - 1.0).abs() < 0.001);
        assert!((config.fade_step - 0.05).abs() < 0.001);
        assert!((config.step_interval - 0.2).abs() < 0.001);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let config = AudioConfig::default()
            .with_sfx_volume(0.4)
            .with_mixer_params(Some("Music"), None)
            .with_resource_root("sounds");

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = AudioConfig::load_from(&config_path);
        assert!((loaded.default_sfx_volume - 0.4).abs() < 0.001);
        assert_eq!(loaded.mixer.music.as_deref(), Some("Music"));
        assert!(loaded.mixer.sfx.is_none());
        assert_eq!(loaded.resource_root, PathBuf::from("sounds"));
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = AudioConfig::load_from("/nonexistent/path/cadence.toml");
        assert!((config.default_music_volume - 0.12).abs() < 0.001);
    }

    #[test]
    fn test_config_partial_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(&config_path, "fade_step = 0.1\n\n[keys]\nmusic_volume = \"Music\"\n")
            .expect("write");

        let loaded = AudioConfig::load_from(&config_path);
        assert!((loaded.fade_step - 0.1).abs() < 0.001);
        assert_eq!(loaded.keys.music_volume, "Music");
        assert_eq!(loaded.keys.sfx_volume, "SFXVol");
    }
}
