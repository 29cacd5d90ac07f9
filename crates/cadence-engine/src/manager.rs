//! The audio manager.
//!
//! [`AudioManager`] owns the playback backend and every piece of audio state:
//! background music transitions, the volume controller, the timed sound pool,
//! one-shot timers, preferences and the asset library. The host constructs
//! exactly one through [`AudioManager::builder`] and calls
//! [`AudioManager::update`] once per frame.
//!
//! Each tick runs, in order: backend update, volume reconciliation, due
//! timers and pool expiry, then transition steps.

use cadence_common::{AudioClip, AudioResult, HandleId};
use cadence_kernel::{default_backend, ClipLoader, MixerBackend, PlaybackBackend};
use tracing::{debug, error, info, warn};

use crate::assets::AssetLibrary;
use crate::config::AudioConfig;
use crate::pool::{TimedSound, TimedSoundPool};
use crate::preferences::{MemoryPreferences, PreferenceStore, Preferences, TomlPreferences};
use crate::timer::{SoundCallback, TimerAction, TimerQueue};
use crate::transition::{BackgroundMusicState, MusicTransition, TransitionEngine, TransitionOutcome};
use crate::volume::{Channels, VolumeController, VolumeState};

/// Builder for [`AudioManager`].
pub struct AudioManagerBuilder {
    config: AudioConfig,
    backend: Option<Box<dyn PlaybackBackend>>,
    preferences: Option<Box<dyn PreferenceStore>>,
    mixer: Option<Box<dyn MixerBackend>>,
}

impl std::fmt::Debug for AudioManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioManagerBuilder")
            .field("config", &self.config)
            .field("has_backend", &self.backend.is_some())
            .field("has_preferences", &self.preferences.is_some())
            .field("has_mixer", &self.mixer.is_some())
            .finish()
    }
}

impl AudioManagerBuilder {
    /// Use `backend` for playback. Defaults to the output device, or
    /// headless playback when there is none.
    #[must_use]
    pub fn backend(mut self, backend: impl PlaybackBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Use an already boxed backend.
    #[must_use]
    pub fn boxed_backend(mut self, backend: Box<dyn PlaybackBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use `store` for preferences. Defaults to the TOML file in the
    /// platform config directory.
    #[must_use]
    pub fn preferences(mut self, store: impl PreferenceStore + 'static) -> Self {
        self.preferences = Some(Box::new(store));
        self
    }

    /// Mirror volumes into `mixer`.
    #[must_use]
    pub fn mixer(mut self, mixer: impl MixerBackend + 'static) -> Self {
        self.mixer = Some(Box::new(mixer));
        self
    }

    /// Creates the manager: opens the primary music handle, loads and applies
    /// stored preferences, then saves them back.
    pub fn build(self) -> AudioResult<AudioManager> {
        let mut config = self.config;
        config.validate();

        let mut backend = self.backend.unwrap_or_else(default_backend);
        let primary = backend.create_handle()?;
        backend.set_looping(primary, true);

        let store = self.preferences.unwrap_or_else(|| -> Box<dyn PreferenceStore> {
            match TomlPreferences::open_default() {
                Ok(store) => Box::new(store),
                Err(e) => {
                    warn!("Failed to open preferences ({}), settings will not persist", e);
                    Box::new(MemoryPreferences::new())
                },
            }
        });
        let mut prefs = Preferences::new(store, config.keys.clone());
        let state = prefs.load(&VolumeState::new(
            config.default_music_volume,
            config.default_sfx_volume,
        ));

        let mut volume = VolumeController::new(state, self.mixer, config.mixer.clone());
        volume.apply_all(backend.as_mut(), Channels::music_only(primary));
        if let Err(e) = prefs.save(&state) {
            warn!("Failed to save preferences: {}", e);
        }

        let transitions = TransitionEngine::new(primary, config.fade_step, config.step_interval);
        let assets = AssetLibrary::new(ClipLoader::new(config.resource_root.clone()));

        info!(
            "Audio manager initialized ({} backend, music {:.2}, sfx {:.2})",
            backend.name(),
            state.music_volume,
            state.sfx_volume
        );

        Ok(AudioManager {
            config,
            backend,
            volume,
            prefs,
            transitions,
            pool: TimedSoundPool::new(),
            one_shots: Vec::new(),
            timers: TimerQueue::new(),
            assets,
            clock: 0.0,
            shut_down: false,
        })
    }
}

/// Background music, sound effects and volume for one host.
pub struct AudioManager {
    config: AudioConfig,
    backend: Box<dyn PlaybackBackend>,
    volume: VolumeController,
    prefs: Preferences,
    transitions: TransitionEngine,
    pool: TimedSoundPool,
    /// Live one-shot handles, destroyed by their teardown timer.
    one_shots: Vec<HandleId>,
    timers: TimerQueue,
    assets: AssetLibrary,
    /// Seconds of tick time since construction.
    clock: f64,
    shut_down: bool,
}

impl std::fmt::Debug for AudioManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioManager")
            .field("backend", &self.backend.name())
            .field("volume", &self.volume.state())
            .field("music", &self.transitions.state())
            .field("timed_sounds", &self.pool.len())
            .field("one_shots", &self.one_shots.len())
            .field("pending_timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl AudioManager {
    /// Starts building a manager.
    #[must_use]
    pub fn builder(config: AudioConfig) -> AudioManagerBuilder {
        AudioManagerBuilder {
            config,
            backend: None,
            preferences: None,
            mixer: None,
        }
    }

    // ============================================
    // Accessors
    // ============================================

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Playback backend.
    #[must_use]
    pub fn backend(&self) -> &dyn PlaybackBackend {
        self.backend.as_ref()
    }

    /// Applied volume state.
    #[must_use]
    pub const fn volume_state(&self) -> VolumeState {
        self.volume.state()
    }

    /// Volume fields for direct UI binding, applied on the next tick.
    pub fn controls_mut(&mut self) -> &mut VolumeState {
        self.volume.controls_mut()
    }

    /// Background music state.
    #[must_use]
    pub fn music_state(&self) -> &BackgroundMusicState {
        self.transitions.state()
    }

    /// Whether a fade or crossfade is in flight.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.transitions.is_active()
    }

    /// Primary music handle.
    #[must_use]
    pub const fn music_handle(&self) -> HandleId {
        self.transitions.primary()
    }

    /// Crossfade handle, while a crossfade is running.
    #[must_use]
    pub const fn crossfade_handle(&self) -> Option<HandleId> {
        self.transitions.crossfade()
    }

    /// Asset library.
    #[must_use]
    pub const fn assets(&self) -> &AssetLibrary {
        &self.assets
    }

    /// Mutable asset library.
    pub fn assets_mut(&mut self) -> &mut AssetLibrary {
        &mut self.assets
    }

    /// Timed sound playing under `name`.
    #[must_use]
    pub fn timed_sound(&self, name: &str) -> Option<&TimedSound> {
        self.pool.get(name)
    }

    /// Position of `name` in the timed sound pool.
    #[must_use]
    pub fn timed_sound_index(&self, name: &str) -> Option<usize> {
        self.pool.index_of(name)
    }

    /// Number of timed sounds.
    #[must_use]
    pub fn timed_sound_count(&self) -> usize {
        self.pool.len()
    }

    /// Number of one-shot sounds not yet torn down.
    #[must_use]
    pub fn one_shot_count(&self) -> usize {
        self.one_shots.len()
    }

    /// Number of pending timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Seconds of tick time since construction.
    #[must_use]
    pub const fn clock(&self) -> f64 {
        self.clock
    }

    // ============================================
    // Background music
    // ============================================

    /// Plays `clip` as background music using `mode`.
    pub fn play_background_music(
        &mut self,
        clip: AudioClip,
        mode: MusicTransition,
    ) -> TransitionOutcome {
        self.transitions
            .request(clip, mode, self.backend.as_mut(), &mut self.volume)
    }

    /// Plays the library asset `name` as background music.
    pub fn play_background_music_named(
        &mut self,
        name: &str,
        mode: MusicTransition,
    ) -> TransitionOutcome {
        match self.assets.require(name) {
            Ok(clip) => self.play_background_music(clip, mode),
            Err(_) => TransitionOutcome::AssetMissing,
        }
    }

    /// Plays the clip at resource `path` as background music.
    pub fn play_background_music_from_resource(
        &mut self,
        path: &str,
        mode: MusicTransition,
    ) -> TransitionOutcome {
        match self.assets.resource(path) {
            Ok(clip) => self.play_background_music(clip, mode),
            Err(_) => TransitionOutcome::AssetMissing,
        }
    }

    /// Stops the background music.
    pub fn stop_background_music(&mut self) {
        self.transitions.stop(self.backend.as_mut());
    }

    /// Pauses the background music.
    pub fn pause_background_music(&mut self) {
        self.transitions.pause(self.backend.as_mut());
    }

    /// Resumes paused background music.
    pub fn resume_background_music(&mut self) {
        self.transitions.resume(self.backend.as_mut());
    }

    // ============================================
    // Volume and mute
    // ============================================

    /// Sets and persists the music volume. Returns the stored value.
    pub fn set_music_volume(&mut self, volume: f32) -> f32 {
        let sfx = self.sfx_handles();
        let channels = self.transitions.channels(&sfx);
        let stored = self
            .volume
            .set_music_volume(volume, self.backend.as_mut(), channels);
        let state = self.volume.state();
        self.persist(&state);
        stored
    }

    /// Sets and persists the sound effect volume. Returns the stored value.
    pub fn set_sfx_volume(&mut self, volume: f32) -> f32 {
        let sfx = self.sfx_handles();
        let channels = self.transitions.channels(&sfx);
        let stored = self
            .volume
            .set_sfx_volume(volume, self.backend.as_mut(), channels);
        let state = self.persisted_state();
        self.persist(&state);
        stored
    }

    /// Turns music on or off and persists the flag.
    pub fn set_music_on(&mut self, on: bool) {
        let sfx = self.sfx_handles();
        let channels = self.transitions.channels(&sfx);
        self.volume
            .set_music_on(on, self.backend.as_mut(), channels);
        let state = self.persisted_state();
        self.persist(&state);
    }

    /// Turns sound effects on or off and persists the flag.
    pub fn set_sfx_on(&mut self, on: bool) {
        let sfx = self.sfx_handles();
        let channels = self.transitions.channels(&sfx);
        self.volume.set_sfx_on(on, self.backend.as_mut(), channels);
        let state = self.persisted_state();
        self.persist(&state);
    }

    /// Flips the music flag. Returns whether music is now on.
    pub fn toggle_music_mute(&mut self) -> bool {
        let on = !self.volume.state().music_on;
        self.set_music_on(on);
        on
    }

    /// Flips the sound effect flag. Returns whether sound effects are now on.
    pub fn toggle_sfx_mute(&mut self) -> bool {
        let on = !self.volume.state().sfx_on;
        self.set_sfx_on(on);
        on
    }

    /// Flips both flags.
    pub fn toggle_mute(&mut self) {
        self.toggle_music_mute();
        self.toggle_sfx_mute();
    }

    // ============================================
    // Sound effects
    // ============================================

    /// Plays `clip` once. The handle is torn down after the clip length and
    /// `on_complete` runs on the same tick.
    pub fn play_one_shot(
        &mut self,
        clip: &AudioClip,
        on_complete: Option<SoundCallback>,
    ) -> AudioResult<HandleId> {
        let handle = self.start_sfx(clip, false)?;
        self.one_shots.push(handle);

        let deadline = self.clock + f64::from(clip.length());
        self.timers
            .schedule(deadline, TimerAction::DestroyHandle(handle));
        if let Some(callback) = on_complete {
            self.timers.schedule(deadline, TimerAction::Invoke(callback));
        }

        debug!("One-shot '{}' on {}", clip.name(), handle);
        Ok(handle)
    }

    /// Plays `clip` for `duration` seconds, looping when the duration is
    /// longer than the clip. A sound already playing under the same name has
    /// its countdown restarted instead; the first callback is kept.
    /// A non-finite duration counts as zero.
    pub fn play_timed(
        &mut self,
        clip: &AudioClip,
        duration: f32,
        on_expire: Option<SoundCallback>,
    ) -> AudioResult<HandleId> {
        let duration = if duration.is_finite() {
            duration
        } else {
            warn!("Ignoring non-finite duration for '{}'", clip.name());
            0.0
        };

        if let Some(handle) = self.pool.reset(clip.name(), duration) {
            debug!("Restarted '{}' for {:.2}s", clip.name(), duration);
            return Ok(handle);
        }

        if duration <= clip.length() {
            return self.play_one_shot(clip, on_expire);
        }

        let handle = self.start_sfx(clip, true)?;
        self.pool.insert(clip.name(), handle, duration, on_expire);
        debug!("Looping '{}' for {:.2}s on {}", clip.name(), duration, handle);
        Ok(handle)
    }

    /// Loops `clip` for `duration` seconds.
    pub fn play_looping(&mut self, clip: &AudioClip, duration: f32) -> AudioResult<HandleId> {
        self.play_timed(clip, duration, None)
    }

    /// Plays `clip` back to back `times` times.
    pub fn play_repeating(
        &mut self,
        clip: &AudioClip,
        times: u32,
        on_complete: Option<SoundCallback>,
    ) -> AudioResult<HandleId> {
        self.play_timed(clip, clip.length() * times as f32, on_complete)
    }

    /// Pauses every sound effect.
    pub fn pause_all_sfx(&mut self) {
        for handle in self.sfx_handles() {
            if self.backend.is_playing(handle) {
                self.backend.pause(handle);
            }
        }
    }

    /// Resumes every paused sound effect.
    pub fn resume_all_sfx(&mut self) {
        for handle in self.sfx_handles() {
            if !self.backend.is_playing(handle) {
                self.backend.resume(handle);
            }
        }
    }

    // ============================================
    // Preferences
    // ============================================

    /// Writes the current volume state to the preference store.
    pub fn save_preferences(&mut self) -> AudioResult<()> {
        let state = self.persisted_state();
        self.prefs.save(&state)?;
        Ok(())
    }

    /// Deletes stored preferences and applies the configured defaults.
    pub fn clear_preferences(&mut self) -> AudioResult<()> {
        self.prefs.clear()?;
        let defaults = self.prefs.load(&VolumeState::new(
            self.config.default_music_volume,
            self.config.default_sfx_volume,
        ));

        let sfx = self.sfx_handles();
        let channels = self.transitions.channels(&sfx);
        let backend = self.backend.as_mut();
        self.volume
            .set_music_volume(defaults.music_volume, backend, channels);
        self.volume
            .set_sfx_volume(defaults.sfx_volume, backend, channels);
        self.volume.set_music_on(defaults.music_on, backend, channels);
        self.volume.set_sfx_on(defaults.sfx_on, backend, channels);
        Ok(())
    }

    // ============================================
    // Tick
    // ============================================

    /// Advances the manager by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.clock += f64::from(dt);
        self.backend.update(dt);

        let sfx = self.sfx_handles();
        let channels = self.transitions.channels(&sfx);
        if self.volume.reconcile(self.backend.as_mut(), channels) {
            let state = self.persisted_state();
            self.persist(&state);
        }

        for action in self.timers.drain_due(self.clock) {
            match action {
                TimerAction::DestroyHandle(handle) => {
                    self.backend.destroy_handle(handle);
                    self.one_shots.retain(|&h| h != handle);
                },
                TimerAction::Invoke(callback) => callback(),
            }
        }

        if let Some(expired) = self.pool.tick(dt) {
            debug!("Timed sound '{}' finished", expired.name);
            if let Some(callback) = expired.on_expire {
                callback();
            }
            self.backend.destroy_handle(expired.handle);
        }

        let sfx = self.sfx_handles();
        self.transitions
            .update(dt, self.backend.as_mut(), &mut self.volume, &sfx);
    }

    /// Stops all audio, drops pending timers without running them, releases
    /// every handle and flushes preferences.
    pub fn shutdown(mut self) -> AudioResult<VolumeState> {
        let state = self.teardown();
        self.prefs.save(&state)?;
        info!("Audio manager shut down");
        Ok(state)
    }

    fn sfx_handles(&self) -> Vec<HandleId> {
        self.pool
            .handles()
            .chain(self.one_shots.iter().copied())
            .collect()
    }

    fn start_sfx(&mut self, clip: &AudioClip, looping: bool) -> AudioResult<HandleId> {
        let handle = self.backend.create_handle().map_err(|e| {
            error!("Failed to play '{}': {}", clip.name(), e);
            e
        })?;
        let state = self.volume.state();
        self.backend.set_clip(handle, Some(clip.clone()));
        self.backend.set_looping(handle, looping);
        self.backend.set_volume(handle, state.sfx_volume);
        self.backend.set_muted(handle, !state.sfx_on);
        self.backend.play(handle);
        Ok(handle)
    }

    /// State to persist: mid-transition the ramped music volume is replaced by
    /// the level the transition returns to.
    fn persisted_state(&self) -> VolumeState {
        let mut state = self.volume.state();
        if let Some(cap) = self.transitions.cap() {
            state.music_volume = cap;
        }
        state
    }

    fn persist(&mut self, state: &VolumeState) {
        if let Err(e) = self.prefs.save(state) {
            warn!("Failed to save preferences: {}", e);
        }
    }

    fn teardown(&mut self) -> VolumeState {
        let state = self.persisted_state();
        self.shut_down = true;
        self.timers.clear();

        for handle in self.pool.drain() {
            self.backend.destroy_handle(handle);
        }
        for handle in self.one_shots.drain(..) {
            self.backend.destroy_handle(handle);
        }
        self.transitions.release(self.backend.as_mut());
        state
    }
}

impl Drop for AudioManager {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        let state = self.teardown();
        self.persist(&state);
    }
}
