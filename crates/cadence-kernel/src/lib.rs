//! # Cadence Kernel
//!
//! Low-level playback layer for the Cadence audio manager.
//!
//! This crate provides:
//! - The [`PlaybackBackend`] trait that owns playback channels
//! - A rodio-backed device backend
//! - A headless backend that simulates playback for servers and tests
//! - Named mixer parameters
//! - Clip loading from a resource directory
//!
//! ## Architecture
//!
//! Everything here is driven from the host's main-loop thread. Backends do
//! no scheduling of their own beyond advancing positions in `update`; fades,
//! timers and pool expiry live one level up in `cadence-engine`.
//!
//! ## Handles
//!
//! Channels are addressed by generational [`HandleId`]s. A destroyed channel's
//! id never aliases a later channel, and every operation on a stale id is a
//! no-op.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod headless;
pub mod loader;
pub mod mixer;
pub mod playback;
pub mod rodio_backend;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::headless::*;
    pub use crate::loader::*;
    pub use crate::mixer::*;
    pub use crate::playback::*;
    pub use crate::rodio_backend::*;
}

pub use cadence_common::HandleId;
pub use prelude::*;

/// Opens the device backend, falling back to [`HeadlessBackend`] when no
/// output device is available.
#[must_use]
pub fn default_backend() -> Box<dyn PlaybackBackend> {
    match RodioBackend::new() {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            tracing::warn!("No audio device available ({}), using headless playback", e);
            Box::new(HeadlessBackend::new())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_always_available() {
        let mut backend = default_backend();
        let h = backend.create_handle().expect("create");
        assert!(backend.is_valid(h));
        assert!(["rodio", "headless"].contains(&backend.name()));
    }
}
