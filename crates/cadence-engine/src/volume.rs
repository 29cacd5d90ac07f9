//! Music and sound effect volume/mute control.
//!
//! The controller keeps two copies of [`VolumeState`]:
//! - `applied`: what the playback handles and mixer were last set to
//! - `requested`: fields a UI may write directly through
//!   [`VolumeController::controls_mut`]
//!
//! [`VolumeController::reconcile`] runs once per tick and brings the graph
//! back in line. When a mixer is attached and its parameter no longer matches
//! the applied volume, the mixer value wins; otherwise requested fields win.

use cadence_common::{clamp01, decibels_to_volume, levels_match, volume_to_decibels, HandleId};
use cadence_kernel::{MixerBackend, PlaybackBackend};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::MixerParams;

/// Volume and on/off flags for music and sound effects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeState {
    /// Music volume (0.0 - 1.0).
    pub music_volume: f32,
    /// Sound effect volume (0.0 - 1.0).
    pub sfx_volume: f32,
    /// Whether music is audible.
    pub music_on: bool,
    /// Whether sound effects are audible.
    pub sfx_on: bool,
}

impl Default for VolumeState {
    fn default() -> Self {
        Self::new(0.12, 1.0)
    }
}

impl VolumeState {
    /// Creates a state with both groups on. Volumes are clamped.
    #[must_use]
    pub fn new(music_volume: f32, sfx_volume: f32) -> Self {
        Self {
            music_volume: clamp01(music_volume),
            sfx_volume: clamp01(sfx_volume),
            music_on: true,
            sfx_on: true,
        }
    }

    /// Clamps both volumes to `[0, 1]`.
    pub fn clamp(&mut self) {
        self.music_volume = clamp01(self.music_volume);
        self.sfx_volume = clamp01(self.sfx_volume);
    }
}

/// Handles the controller writes to.
#[derive(Debug, Clone, Copy)]
pub struct Channels<'a> {
    /// Primary music handle.
    pub primary: HandleId,
    /// Crossfade handle, while a crossfade is running.
    pub crossfade: Option<HandleId>,
    /// Every live sound effect handle.
    pub sfx: &'a [HandleId],
}

impl<'a> Channels<'a> {
    /// Channels with only the primary music handle.
    #[must_use]
    pub const fn music_only(primary: HandleId) -> Self {
        Self {
            primary,
            crossfade: None,
            sfx: &[],
        }
    }

    fn music(&self) -> impl Iterator<Item = HandleId> + 'a {
        std::iter::once(self.primary).chain(self.crossfade)
    }
}

/// Music and sound effect volume/mute controller.
pub struct VolumeController {
    applied: VolumeState,
    requested: VolumeState,
    mixer: Option<Box<dyn MixerBackend>>,
    params: MixerParams,
}

impl std::fmt::Debug for VolumeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeController")
            .field("applied", &self.applied)
            .field("requested", &self.requested)
            .field("has_mixer", &self.mixer.is_some())
            .finish_non_exhaustive()
    }
}

impl VolumeController {
    /// Creates a controller. Nothing is applied until [`Self::apply_all`].
    #[must_use]
    pub fn new(
        initial: VolumeState,
        mixer: Option<Box<dyn MixerBackend>>,
        params: MixerParams,
    ) -> Self {
        let mut initial = initial;
        initial.clamp();
        Self {
            applied: initial,
            requested: initial,
            mixer,
            params,
        }
    }

    /// Current applied state.
    #[must_use]
    pub const fn state(&self) -> VolumeState {
        self.applied
    }

    /// Requested fields, picked up on the next [`Self::reconcile`].
    pub fn controls_mut(&mut self) -> &mut VolumeState {
        &mut self.requested
    }

    /// Pushes the whole state to the handles and the mixer.
    pub fn apply_all(&mut self, backend: &mut dyn PlaybackBackend, channels: Channels<'_>) {
        self.requested = self.applied;
        self.apply_music_mute(backend, channels);
        self.apply_sfx_mute(backend, channels);
        self.apply_music_volume(backend, channels);
        self.apply_sfx_volume(backend, channels);
    }

    /// Sets the music volume. Returns the stored, clamped value.
    pub fn set_music_volume(
        &mut self,
        volume: f32,
        backend: &mut dyn PlaybackBackend,
        channels: Channels<'_>,
    ) -> f32 {
        let volume = clamp01(volume);
        self.applied.music_volume = volume;
        self.requested.music_volume = volume;
        self.apply_music_volume(backend, channels);
        volume
    }

    /// Sets the sound effect volume. Returns the stored, clamped value.
    pub fn set_sfx_volume(
        &mut self,
        volume: f32,
        backend: &mut dyn PlaybackBackend,
        channels: Channels<'_>,
    ) -> f32 {
        let volume = clamp01(volume);
        self.applied.sfx_volume = volume;
        self.requested.sfx_volume = volume;
        self.apply_sfx_volume(backend, channels);
        volume
    }

    /// Turns music on or off. The stored volume is untouched.
    pub fn set_music_on(
        &mut self,
        on: bool,
        backend: &mut dyn PlaybackBackend,
        channels: Channels<'_>,
    ) {
        self.applied.music_on = on;
        self.requested.music_on = on;
        self.apply_music_mute(backend, channels);
    }

    /// Turns sound effects on or off. The stored volume is untouched.
    pub fn set_sfx_on(&mut self, on: bool, backend: &mut dyn PlaybackBackend, channels: Channels<'_>) {
        self.applied.sfx_on = on;
        self.requested.sfx_on = on;
        self.apply_sfx_mute(backend, channels);
    }

    /// Brings handles and mixer in line with the mixer, then the requested
    /// fields. Returns true when the applied state changed.
    pub fn reconcile(&mut self, backend: &mut dyn PlaybackBackend, channels: Channels<'_>) -> bool {
        let before = self.applied;

        // Music volume
        match self.mixer_volume(self.params.music.as_deref()) {
            Some(mixed) if !levels_match(mixed, self.applied.music_volume) => {
                debug!("Music mixer drifted to {:.3}", mixed);
                self.applied.music_volume = mixed;
                self.requested.music_volume = mixed;
                backend.set_volume(channels.primary, mixed);
            },
            _ => {
                let requested = clamp01(self.requested.music_volume);
                if !levels_match(requested, self.applied.music_volume) {
                    self.set_music_volume(requested, backend, channels);
                } else if !levels_match(backend.volume(channels.primary), self.applied.music_volume)
                    && backend.is_valid(channels.primary)
                {
                    backend.set_volume(channels.primary, self.applied.music_volume);
                }
            },
        }

        // Sound effect volume
        match self.mixer_volume(self.params.sfx.as_deref()) {
            Some(mixed) if !levels_match(mixed, self.applied.sfx_volume) => {
                debug!("Sound effect mixer drifted to {:.3}", mixed);
                self.applied.sfx_volume = mixed;
                self.requested.sfx_volume = mixed;
                for &handle in channels.sfx {
                    backend.set_volume(handle, mixed);
                }
            },
            _ => {
                let requested = clamp01(self.requested.sfx_volume);
                if !levels_match(requested, self.applied.sfx_volume) {
                    self.set_sfx_volume(requested, backend, channels);
                }
            },
        }

        // Mute flags
        if self.requested.music_on != self.applied.music_on {
            self.set_music_on(self.requested.music_on, backend, channels);
        } else if channels
            .music()
            .any(|h| backend.is_valid(h) && backend.is_muted(h) == self.applied.music_on)
        {
            trace!("Re-applying music mute");
            self.apply_music_mute(backend, channels);
        }

        if self.requested.sfx_on != self.applied.sfx_on {
            self.set_sfx_on(self.requested.sfx_on, backend, channels);
        } else if channels
            .sfx
            .iter()
            .any(|&h| backend.is_valid(h) && backend.is_muted(h) == self.applied.sfx_on)
        {
            self.apply_sfx_mute(backend, channels);
        }

        self.applied != before
    }

    fn mixer_volume(&self, param: Option<&str>) -> Option<f32> {
        let mixer = self.mixer.as_ref()?;
        mixer.get_float(param?).map(decibels_to_volume)
    }

    fn push_mixer(&mut self, param: Option<&str>, volume: f32) {
        if let (Some(mixer), Some(param)) = (self.mixer.as_mut(), param) {
            if !mixer.set_float(param, volume_to_decibels(volume)) {
                debug!("Mixer rejected parameter {}", param);
            }
        }
    }

    fn apply_music_volume(&mut self, backend: &mut dyn PlaybackBackend, channels: Channels<'_>) {
        backend.set_volume(channels.primary, self.applied.music_volume);
        let param = self.params.music.clone();
        self.push_mixer(param.as_deref(), self.applied.music_volume);
    }

    fn apply_sfx_volume(&mut self, backend: &mut dyn PlaybackBackend, channels: Channels<'_>) {
        for &handle in channels.sfx {
            backend.set_volume(handle, self.applied.sfx_volume);
        }
        let param = self.params.sfx.clone();
        self.push_mixer(param.as_deref(), self.applied.sfx_volume);
    }

    fn apply_music_mute(&self, backend: &mut dyn PlaybackBackend, channels: Channels<'_>) {
        for handle in channels.music() {
            backend.set_muted(handle, !self.applied.music_on);
        }
    }

    fn apply_sfx_mute(&self, backend: &mut dyn PlaybackBackend, channels: Channels<'_>) {
        for &handle in channels.sfx {
            backend.set_muted(handle, !self.applied.sfx_on);
        }
    }
}
