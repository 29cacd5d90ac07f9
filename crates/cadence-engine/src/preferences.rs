//! Persistent volume and mute preferences.
//!
//! This module provides:
//! - The [`PreferenceStore`] key-value trait
//! - [`MemoryPreferences`] for tests and hosts without storage
//! - [`TomlPreferences`], a file at `~/.config/cadence/preferences.toml`
//! - [`Preferences`], which maps a [`VolumeState`] onto configured keys

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cadence_common::AudioError;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::PreferenceKeys;
use crate::volume::VolumeState;

/// Default preferences file name.
pub const PREFERENCES_FILE_NAME: &str = "preferences.toml";

/// Default preferences directory (relative to config).
pub const PREFERENCES_DIR_NAME: &str = "cadence";

/// Errors that can occur while persisting preferences.
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// The backing store refused to write.
    #[error("Preference store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for preference operations.
pub type PreferenceResult<T> = Result<T, PreferenceError>;

impl From<PreferenceError> for AudioError {
    fn from(e: PreferenceError) -> Self {
        Self::Preferences(e.to_string())
    }
}

/// A stored preference value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    /// Boolean flag.
    Bool(bool),
    /// Float value.
    Float(f32),
}

/// String-keyed persistent storage for floats and flags.
pub trait PreferenceStore {
    /// Float stored under `key`, if any.
    fn get_float(&self, key: &str) -> Option<f32>;

    /// Stores a float.
    fn set_float(&mut self, key: &str, value: f32);

    /// Flag stored under `key`, if any.
    fn get_bool(&self, key: &str) -> Option<bool>;

    /// Stores a flag.
    fn set_bool(&mut self, key: &str, value: bool);

    /// Whether `key` holds a value.
    fn has_key(&self, key: &str) -> bool;

    /// Removes `key`.
    fn delete_key(&mut self, key: &str);

    /// Flushes pending writes.
    fn save(&mut self) -> PreferenceResult<()>;
}

fn float_of(value: Option<&PreferenceValue>) -> Option<f32> {
    match value? {
        PreferenceValue::Float(v) => Some(*v),
        PreferenceValue::Bool(_) => None,
    }
}

fn bool_of(value: Option<&PreferenceValue>) -> Option<bool> {
    match value? {
        PreferenceValue::Bool(b) => Some(*b),
        PreferenceValue::Float(_) => None,
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: BTreeMap<String, PreferenceValue>,
    saves: usize,
    fail_saves: bool,
}

/// In-memory store. Clones share the same values.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryPreferences {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().values.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn set_fail_saves(&self, fail: bool) {
        self.inner.lock().fail_saves = fail;
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_float(&self, key: &str) -> Option<f32> {
        float_of(self.inner.lock().values.get(key))
    }

    fn set_float(&mut self, key: &str, value: f32) {
        self.inner
            .lock()
            .values
            .insert(key.to_string(), PreferenceValue::Float(value));
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        bool_of(self.inner.lock().values.get(key))
    }

    fn set_bool(&mut self, key: &str, value: bool) {
        self.inner
            .lock()
            .values
            .insert(key.to_string(), PreferenceValue::Bool(value));
    }

    fn has_key(&self, key: &str) -> bool {
        self.inner.lock().values.contains_key(key)
    }

    fn delete_key(&mut self, key: &str) {
        self.inner.lock().values.remove(key);
    }

    fn save(&mut self) -> PreferenceResult<()> {
        let mut inner = self.inner.lock();
        if inner.fail_saves {
            return Err(PreferenceError::Unavailable("memory store locked".to_string()));
        }
        inner.saves += 1;
        Ok(())
    }
}

/// Preferences persisted to a TOML file.
#[derive(Debug)]
pub struct TomlPreferences {
    path: PathBuf,
    values: BTreeMap<String, PreferenceValue>,
    dirty: bool,
}

impl TomlPreferences {
    /// Opens the store at the default path.
    pub fn open_default() -> PreferenceResult<Self> {
        Self::open(Self::default_path())
    }

    /// Opens the store at `path`, loading it if the file exists.
    pub fn open(path: impl AsRef<Path>) -> PreferenceResult<Self> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let values: BTreeMap<String, PreferenceValue> = toml::from_str(&contents)?;
            info!("Preferences loaded from {:?}", path);
            values
        } else {
            info!("Preferences file not found, starting empty");
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    /// Returns the default preferences path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        // Try XDG config first, then fall back to home
        if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir)
                .join(PREFERENCES_DIR_NAME)
                .join(PREFERENCES_FILE_NAME);
        }

        if let Some(config_dir) = dirs::config_dir() {
            return config_dir
                .join(PREFERENCES_DIR_NAME)
                .join(PREFERENCES_FILE_NAME);
        }

        PathBuf::from(PREFERENCES_FILE_NAME)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are unsaved changes.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn insert(&mut self, key: &str, value: PreferenceValue) {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
    }
}

impl PreferenceStore for TomlPreferences {
    fn get_float(&self, key: &str) -> Option<f32> {
        float_of(self.values.get(key))
    }

    fn set_float(&mut self, key: &str, value: f32) {
        self.insert(key, PreferenceValue::Float(value));
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        bool_of(self.values.get(key))
    }

    fn set_bool(&mut self, key: &str, value: bool) {
        self.insert(key, PreferenceValue::Bool(value));
    }

    fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn delete_key(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.dirty = true;
        }
    }

    fn save(&mut self) -> PreferenceResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(&self.values)?;
        fs::write(&self.path, toml)?;
        self.dirty = false;

        debug!("Preferences saved to {:?}", self.path);
        Ok(())
    }
}

/// Maps [`VolumeState`] onto a [`PreferenceStore`].
pub struct Preferences {
    store: Box<dyn PreferenceStore>,
    keys: PreferenceKeys,
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl Preferences {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: Box<dyn PreferenceStore>, keys: PreferenceKeys) -> Self {
        Self { store, keys }
    }

    /// Reads the stored state. Missing volumes come from `defaults`; missing
    /// flags default to on.
    #[must_use]
    pub fn load(&self, defaults: &VolumeState) -> VolumeState {
        let mut state = VolumeState {
            music_volume: self
                .store
                .get_float(&self.keys.music_volume)
                .unwrap_or(defaults.music_volume),
            sfx_volume: self
                .store
                .get_float(&self.keys.sfx_volume)
                .unwrap_or(defaults.sfx_volume),
            music_on: self.store.get_bool(&self.keys.music_on).unwrap_or(true),
            sfx_on: self.store.get_bool(&self.keys.sfx_on).unwrap_or(true),
        };
        state.clamp();
        state
    }

    /// Writes the state and flushes.
    pub fn save(&mut self, state: &VolumeState) -> PreferenceResult<()> {
        self.store.set_float(&self.keys.music_volume, state.music_volume);
        self.store.set_float(&self.keys.sfx_volume, state.sfx_volume);
        self.store.set_bool(&self.keys.music_on, state.music_on);
        self.store.set_bool(&self.keys.sfx_on, state.sfx_on);
        self.store.save()
    }

    /// Removes every managed key and flushes.
    pub fn clear(&mut self) -> PreferenceResult<()> {
        for key in [
            &self.keys.music_volume,
            &self.keys.sfx_volume,
            &self.keys.music_on,
            &self.keys.sfx_on,
        ] {
            self.store.delete_key(key);
        }
        info!("Preferences cleared");
        self.store.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn defaults() -> VolumeState {
        VolumeState::new(0.12, 1.0)
    }

    #[test]
    fn test_load_defaults_when_empty() {
        let prefs = Preferences::new(Box::new(MemoryPreferences::new()), PreferenceKeys::default());
        let state = prefs.load(&defaults());
        assert!((state.music_volume - 0.12).abs() < 0.001);
        assert!((state.sfx_volume - 1.0).abs() < 0.001);
        assert!(state.music_on);
        assert!(state.sfx_on);
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryPreferences::new();
        let mut prefs = Preferences::new(Box::new(store.clone()), PreferenceKeys::default());
        let state = VolumeState {
            music_volume: 0.3,
            sfx_volume: 0.6,
            music_on: false,
            sfx_on: true,
        };
        prefs.save(&state).expect("save");

        assert_eq!(store.get_float("BGMVol"), Some(0.3));
        assert_eq!(store.get_bool("BGMStatus"), Some(false));
        assert_eq!(store.save_count(), 1);
        assert_eq!(prefs.load(&defaults()), state);
    }

    #[test]
    fn test_clear_restores_defaults() {
        let store = MemoryPreferences::new();
        let mut prefs = Preferences::new(Box::new(store.clone()), PreferenceKeys::default());
        prefs.save(&VolumeState::new(0.9, 0.1)).expect("save");
        prefs.clear().expect("clear");

        assert!(store.is_empty());
        assert!(!store.has_key("SFXVol"));
        assert!((prefs.load(&defaults()).music_volume - 0.12).abs() < 0.001);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let mut store = MemoryPreferences::new();
        store.set_float("BGMVol", 4.0);
        store.set_float("SFXVol", -1.0);
        let prefs = Preferences::new(Box::new(store), PreferenceKeys::default());
        let state = prefs.load(&defaults());
        assert!((state.music_volume - 1.0).abs() < f32::EPSILON);
        assert!(state.sfx_volume.abs() < f32::EPSILON);
    }

    #[test]
    fn test_type_mismatch_reads_as_missing() {
        let mut store = MemoryPreferences::new();
        store.set_bool("BGMVol", true);
        assert!(store.get_float("BGMVol").is_none());
        assert!(store.has_key("BGMVol"));
    }

    #[test]
    fn test_toml_store_roundtrip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("prefs.toml");

        let mut store = TomlPreferences::open(&path).expect("open");
        store.set_float("BGMVol", 0.5);
        store.set_bool("SFXStatus", false);
        assert!(store.is_dirty());
        store.save().expect("save");
        assert!(!store.is_dirty());

        let reopened = TomlPreferences::open(&path).expect("reopen");
        assert_eq!(reopened.get_float("BGMVol"), Some(0.5));
        assert_eq!(reopened.get_bool("SFXStatus"), Some(false));
        assert!(!reopened.has_key("SFXVol"));
    }

    #[test]
    fn test_toml_store_rejects_garbage() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("prefs.toml");
        fs::write(&path, "this is = = not toml").expect("write");

        let err = TomlPreferences::open(&path).expect_err("parse");
        assert!(matches!(err, PreferenceError::TomlDeserialize(_)));
    }

    #[test]
    fn test_preference_error_converts() {
        let err: AudioError = PreferenceError::Unavailable("disk full".to_string()).into();
        assert!(err.to_string().contains("disk full"));
    }
}
