//! Clip loading from a resource directory.
//!
//! Clips are addressed by path relative to a resource root, without
//! extension (`"Sounds/TickTock"`). The loader tries each known extension in
//! order and decodes the first file found.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use cadence_common::{AudioClip, AudioError, AudioResult};
use rodio::{Decoder, Source};
use tracing::{debug, warn};

/// Extensions tried when resolving a resource name, in order.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "ogg", "mp3", "flac"];

/// Resolves and decodes clips under a resource root.
#[derive(Debug, Clone)]
pub struct ClipLoader {
    root: PathBuf,
}

impl ClipLoader {
    /// Creates a loader rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resource root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Finds the file for a resource name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let base = self.root.join(name);
        if base.extension().is_some() && base.is_file() {
            return Some(base);
        }
        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| base.with_extension(ext))
            .find(|p| p.is_file())
    }

    /// Loads a clip by resource name. The clip is named after the file stem.
    pub fn load(&self, name: &str) -> AudioResult<AudioClip> {
        let path = self.resolve(name).ok_or_else(|| AudioError::ResourceNotFound {
            name: name.to_string(),
            root: self.root.clone(),
        })?;
        Self::load_path(&path)
    }

    /// Decodes a clip file.
    pub fn load_path(path: &Path) -> AudioResult<AudioClip> {
        let file = File::open(path).map_err(|e| AudioError::DecodeFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| AudioError::DecodeFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let sample_rate = decoder.sample_rate();
        let channels = decoder.channels();
        let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

        let name = path
            .file_stem()
            .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
        let clip = AudioClip::from_samples(name, samples, sample_rate, channels);
        debug!("Loaded clip {:?} ({:.2}s)", path, clip.length());
        Ok(clip)
    }

    /// Loads every decodable clip directly under `dir` (relative to the
    /// root), sorted by file name. Files that fail to decode are skipped.
    pub fn load_directory(&self, dir: &str) -> AudioResult<Vec<AudioClip>> {
        let path = self.root.join(dir);
        if !path.is_dir() {
            return Err(AudioError::ResourceNotFound {
                name: dir.to_string(),
                root: self.root.clone(),
            });
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&path)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        files.sort();

        let mut clips = Vec::with_capacity(files.len());
        for file in files {
            match Self::load_path(&file) {
                Ok(clip) => clips.push(clip),
                Err(e) => warn!("Skipping {:?}: {}", file, e),
            }
        }
        Ok(clips)
    }
}
