//! Named audio asset list.
//!
//! This module provides:
//! - An ordered list of named clips with first-match lookup
//! - Loading single clips or whole directories through a [`ClipLoader`]
//! - A per-path cache so repeated resource loads return the same clip
//!
//! Names are not required to be unique; a later duplicate is never returned
//! by [`AssetLibrary::get`].

use std::collections::HashMap;

use cadence_common::{AudioAsset, AudioClip, AudioError, AudioResult};
use cadence_kernel::ClipLoader;
use tracing::{error, info};

/// Ordered list of named clips.
#[derive(Debug)]
pub struct AssetLibrary {
    assets: Vec<AudioAsset>,
    resources: HashMap<String, AudioClip>,
    loader: ClipLoader,
}

impl AssetLibrary {
    /// Creates an empty library loading from `loader`.
    #[must_use]
    pub fn new(loader: ClipLoader) -> Self {
        Self {
            assets: Vec::new(),
            resources: HashMap::new(),
            loader,
        }
    }

    /// Clip loader.
    #[must_use]
    pub fn loader(&self) -> &ClipLoader {
        &self.loader
    }

    /// Number of assets, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the library is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// All assets in insertion order.
    #[must_use]
    pub fn assets(&self) -> &[AudioAsset] {
        &self.assets
    }

    /// First clip registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AudioClip> {
        let found = self.assets.iter().find(|a| a.name == name).map(|a| &a.clip);
        if found.is_none() {
            error!("Audio asset '{}' not found", name);
        }
        found
    }

    /// First clip registered under `name`, or [`AudioError::AssetNotFound`].
    pub fn require(&self, name: &str) -> AudioResult<AudioClip> {
        self.get(name)
            .cloned()
            .ok_or_else(|| AudioError::AssetNotFound(name.to_string()))
    }

    /// Appends an asset.
    pub fn add(&mut self, asset: AudioAsset) {
        self.assets.push(asset);
    }

    /// Appends a clip under its own name.
    pub fn add_clip(&mut self, clip: AudioClip) {
        self.assets.push(AudioAsset::from_clip(clip));
    }

    /// Loads a clip by resource path, reusing an earlier load of the same path.
    pub fn resource(&mut self, path: &str) -> AudioResult<AudioClip> {
        if let Some(clip) = self.resources.get(path) {
            return Ok(clip.clone());
        }
        let clip = self.loader.load(path).map_err(|e| {
            error!("Failed to load '{}': {}", path, e);
            e
        })?;
        self.resources.insert(path.to_string(), clip.clone());
        Ok(clip)
    }

    /// Loads a clip by resource path and appends it.
    pub fn add_from_resource(&mut self, path: &str) -> AudioResult<AudioClip> {
        let clip = self.resource(path)?;
        self.add_clip(clip.clone());
        Ok(clip)
    }

    /// Replaces the library with every clip found in a resource directory.
    /// Returns the number of clips loaded.
    pub fn load_directory(&mut self, path: &str) -> AudioResult<usize> {
        self.clear();
        let clips = self.loader.load_directory(path).map_err(|e| {
            error!("Failed to load directory '{}': {}", path, e);
            e
        })?;
        let count = clips.len();
        self.assets.extend(clips.into_iter().map(AudioAsset::from_clip));
        info!("Loaded {} audio assets from '{}'", count, path);
        Ok(count)
    }

    /// Removes every asset and forgets cached resources.
    pub fn clear(&mut self) {
        self.assets.clear();
        self.resources.clear();
    }
}
