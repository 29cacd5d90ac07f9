//! # Cadence Engine
//!
//! Game audio manager: background music with transitions, sound effects with
//! timed and one-shot playback, and persisted volume settings.
//!
//! This crate provides:
//! - [`AudioManager`], the single owner of all audio state
//! - Swift, fade-out/fade-in and crossfade music transitions
//! - A pool of looping sound effects with countdowns
//! - Volume and mute control mirrored into a named-parameter mixer
//! - Preference persistence through a pluggable [`PreferenceStore`]
//! - A named asset library
//!
//! ## Ticking
//!
//! Nothing runs on its own. The host calls [`AudioManager::update`] once per
//! frame with the elapsed time; fades, timers, expiry and volume
//! reconciliation all happen inside that call, on the caller's thread.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod assets;
pub mod config;
pub mod manager;
pub mod pool;
pub mod preferences;
pub mod timer;
pub mod timing;
pub mod transition;
pub mod volume;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assets::*;
    pub use crate::config::*;
    pub use crate::manager::*;
    pub use crate::pool::*;
    pub use crate::preferences::*;
    pub use crate::timer::*;
    pub use crate::timing::*;
    pub use crate::transition::*;
    pub use crate::volume::*;
}

pub use cadence_common::{AudioClip, AudioError, AudioResult, HandleId};
pub use cadence_kernel::{HeadlessBackend, MemoryMixer, MixerBackend, PlaybackBackend};
pub use prelude::*;
