//! Named mixer parameters.
//!
//! The mixer exposes float parameters (group gains in decibels) that can be
//! changed by other parts of the host, not only by the audio manager.
//! [`MemoryMixer`] is a cloneable shared handle so those writers can hold
//! their own copy.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

/// A set of named float parameters.
pub trait MixerBackend {
    /// Current value of a parameter, if it exists.
    fn get_float(&self, name: &str) -> Option<f32>;

    /// Sets a parameter. Returns false if the mixer rejected it.
    fn set_float(&mut self, name: &str, value: f32) -> bool;
}

/// In-process mixer shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryMixer {
    params: Arc<Mutex<HashMap<String, f32>>>,
}

impl MemoryMixer {
    /// Creates a mixer with no parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mixer with the given parameters already exposed.
    #[must_use]
    pub fn with_params<'a>(params: impl IntoIterator<Item = (&'a str, f32)>) -> Self {
        let mixer = Self::new();
        {
            let mut map = mixer.params.lock();
            for (name, value) in params {
                map.insert(name.to_string(), value);
            }
        }
        mixer
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.lock().len()
    }

    /// Whether no parameter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.lock().is_empty()
    }
}

impl MixerBackend for MemoryMixer {
    fn get_float(&self, name: &str) -> Option<f32> {
        self.params.lock().get(name).copied()
    }

    fn set_float(&mut self, name: &str, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        trace!("Mixer {} = {:.2}", name, value);
        self.params.lock().insert(name.to_string(), value);
        true
    }
}
