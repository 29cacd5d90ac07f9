//! Background music transitions.
//!
//! Music plays on a single looping primary handle. A change of track is one
//! of three transitions:
//! - **Swift**: switch immediately
//! - **`FadeOutFadeIn`**: ramp the old track to silence, switch, ramp back up
//! - **`CrossFade`**: start the new track on a second handle and ramp the two
//!   in opposite directions, then move the new track onto the primary handle
//!
//! Ramps run in fixed steps on a [`StepTimer`]. Only one transition may be in
//! flight; requests made meanwhile are ignored.

use cadence_common::{clamp01, AudioClip, HandleId, LEVEL_EPSILON};
use cadence_kernel::PlaybackBackend;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::timing::StepTimer;
use crate::volume::{Channels, VolumeController};

/// How to move from the current track to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MusicTransition {
    /// Switch immediately.
    #[default]
    Swift,
    /// Fade out, switch, fade back in.
    FadeOutFadeIn,
    /// Overlap both tracks with inverse ramps.
    CrossFade,
}

/// Result of a background music request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The new track is playing now.
    Swapped,
    /// A fade or crossfade has started.
    Scheduled,
    /// The track is already current; nothing changed.
    AlreadyPlaying,
    /// Another transition is in flight; the request was ignored.
    Busy,
    /// The track could not be resolved.
    AssetMissing,
}

/// Current and pending background tracks.
#[derive(Debug, Clone, Default)]
pub struct BackgroundMusicState {
    current: Option<AudioClip>,
    next: Option<AudioClip>,
    transition: MusicTransition,
}

impl BackgroundMusicState {
    /// Track that is (or was last) playing.
    #[must_use]
    pub fn current(&self) -> Option<&AudioClip> {
        self.current.as_ref()
    }

    /// Track being transitioned to.
    #[must_use]
    pub fn next(&self) -> Option<&AudioClip> {
        self.next.as_ref()
    }

    /// Mode of the last accepted request.
    #[must_use]
    pub const fn transition(&self) -> MusicTransition {
        self.transition
    }
}

/// Drives background music transitions on the primary handle.
#[derive(Debug)]
pub struct TransitionEngine {
    state: BackgroundMusicState,
    primary: HandleId,
    crossfade: Option<HandleId>,
    /// Music volume when the in-flight transition was requested.
    cap: f32,
    fade_step: f32,
    timer: StepTimer,
}

impl TransitionEngine {
    /// Creates an engine that plays on `primary`.
    #[must_use]
    pub fn new(primary: HandleId, fade_step: f32, step_interval: f32) -> Self {
        Self {
            state: BackgroundMusicState::default(),
            primary,
            crossfade: None,
            cap: 0.0,
            fade_step,
            timer: StepTimer::new(step_interval),
        }
    }

    /// Music state.
    #[must_use]
    pub fn state(&self) -> &BackgroundMusicState {
        &self.state
    }

    /// Primary music handle.
    #[must_use]
    pub const fn primary(&self) -> HandleId {
        self.primary
    }

    /// Crossfade handle, while a crossfade is running.
    #[must_use]
    pub const fn crossfade(&self) -> Option<HandleId> {
        self.crossfade
    }

    /// Whether a transition is in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.next.is_some() || self.crossfade.is_some()
    }

    /// Volume cap of the in-flight transition.
    #[must_use]
    pub fn cap(&self) -> Option<f32> {
        self.is_active().then_some(self.cap)
    }

    /// Channels the volume controller should write to.
    #[must_use]
    pub fn channels<'a>(&self, sfx: &'a [HandleId]) -> Channels<'a> {
        Channels {
            primary: self.primary,
            crossfade: self.crossfade,
            sfx,
        }
    }

    /// Requests a change of background track.
    pub fn request(
        &mut self,
        clip: AudioClip,
        mode: MusicTransition,
        backend: &mut dyn PlaybackBackend,
        volume: &mut VolumeController,
    ) -> TransitionOutcome {
        // Nothing to fade from
        let mode = if self.state.current.is_none() {
            MusicTransition::Swift
        } else {
            mode
        };

        if self.state.current.as_ref() == Some(&clip) {
            return TransitionOutcome::AlreadyPlaying;
        }

        if self.is_active() {
            debug!(
                "Ignoring request for '{}' while a {:?} is in flight",
                clip.name(),
                self.state.transition
            );
            return TransitionOutcome::Busy;
        }

        match mode {
            MusicTransition::Swift => {
                self.swift(clip, backend);
                TransitionOutcome::Swapped
            },
            MusicTransition::FadeOutFadeIn => {
                debug!("Fading to '{}'", clip.name());
                self.cap = volume.state().music_volume;
                self.state.next = Some(clip);
                self.state.transition = mode;
                self.timer.arm();
                TransitionOutcome::Scheduled
            },
            MusicTransition::CrossFade => match backend.create_handle() {
                Ok(handle) => {
                    debug!("Crossfading to '{}'", clip.name());
                    let state = volume.state();
                    self.cap = state.music_volume;
                    backend.set_clip(handle, Some(clip.clone()));
                    backend.set_looping(handle, true);
                    backend.set_volume(handle, clamp01(self.cap - state.music_volume));
                    backend.set_muted(handle, !state.music_on);
                    backend.play(handle);

                    self.crossfade = Some(handle);
                    self.state.next = Some(clip);
                    self.state.transition = mode;
                    self.timer.arm();
                    TransitionOutcome::Scheduled
                },
                Err(e) => {
                    warn!("Crossfade unavailable ({}), switching immediately", e);
                    self.swift(clip, backend);
                    TransitionOutcome::Swapped
                },
            },
        }
    }

    /// Advances the step gate by `dt` and runs any steps that are due.
    /// Returns the number of steps run.
    pub fn update(
        &mut self,
        dt: f32,
        backend: &mut dyn PlaybackBackend,
        volume: &mut VolumeController,
        sfx: &[HandleId],
    ) -> u32 {
        if !self.is_active() {
            self.timer.disarm();
            return 0;
        }

        let due = self.timer.accumulate(dt);
        let mut ran = 0;
        for _ in 0..due {
            if !self.is_active() {
                break;
            }
            self.step(backend, volume, sfx);
            ran += 1;
        }
        ran
    }

    /// Runs one transition step. Does nothing when no transition is in flight.
    pub fn step(
        &mut self,
        backend: &mut dyn PlaybackBackend,
        volume: &mut VolumeController,
        sfx: &[HandleId],
    ) {
        let Some(next) = self.state.next.clone() else {
            if let Some(handle) = self.crossfade.take() {
                backend.destroy_handle(handle);
            }
            self.timer.disarm();
            return;
        };

        let on_next = backend
            .clip(self.primary)
            .is_some_and(|clip| clip.same_name(&next));

        match self.state.transition {
            MusicTransition::CrossFade => {
                if on_next {
                    self.finish_crossfade(backend, volume, sfx);
                    return;
                }

                let level = self.ramp_down(volume.state().music_volume);
                volume.set_music_volume(level, backend, self.channels(sfx));
                if let Some(handle) = self.crossfade {
                    backend.set_volume(handle, clamp01(self.cap - level));
                    backend.set_muted(handle, !volume.state().music_on);
                }

                if level <= 0.0 {
                    let position = self.crossfade.map_or(0.0, |h| backend.position(h));
                    backend.stop(self.primary);
                    backend.set_clip(self.primary, Some(next));
                    backend.set_position(self.primary, position);
                    backend.play(self.primary);
                    self.finish_crossfade(backend, volume, sfx);
                }
            },
            MusicTransition::FadeOutFadeIn => {
                if on_next {
                    let level = (volume.state().music_volume + self.fade_step).min(self.cap);
                    volume.set_music_volume(level, backend, self.channels(sfx));
                    if level >= self.cap - LEVEL_EPSILON {
                        self.promote_next();
                    }
                } else {
                    let level = self.ramp_down(volume.state().music_volume);
                    volume.set_music_volume(level, backend, self.channels(sfx));
                    if level <= 0.0 {
                        backend.stop(self.primary);
                        backend.set_clip(self.primary, Some(next));
                        backend.set_position(self.primary, 0.0);
                        backend.play(self.primary);
                    }
                }
            },
            MusicTransition::Swift => {
                // Swift never leaves a pending track; settle it if one appears.
                self.swift(next, backend);
            },
        }
    }

    /// Stops the music.
    pub fn stop(&mut self, backend: &mut dyn PlaybackBackend) {
        for handle in self.music_handles() {
            if backend.is_playing(handle) {
                backend.stop(handle);
            }
        }
    }

    /// Pauses the music.
    pub fn pause(&mut self, backend: &mut dyn PlaybackBackend) {
        for handle in self.music_handles() {
            if backend.is_playing(handle) {
                backend.pause(handle);
            }
        }
    }

    /// Resumes paused music.
    pub fn resume(&mut self, backend: &mut dyn PlaybackBackend) {
        for handle in self.music_handles() {
            if !backend.is_playing(handle) {
                backend.resume(handle);
            }
        }
    }

    /// Abandons any transition and destroys both music handles.
    pub fn release(&mut self, backend: &mut dyn PlaybackBackend) {
        self.timer.disarm();
        self.state.next = None;
        if let Some(handle) = self.crossfade.take() {
            backend.destroy_handle(handle);
        }
        backend.destroy_handle(self.primary);
    }

    /// One step down; residue below the level tolerance counts as silence.
    fn ramp_down(&self, level: f32) -> f32 {
        let level = level - self.fade_step;
        if level <= LEVEL_EPSILON {
            0.0
        } else {
            level
        }
    }

    fn music_handles(&self) -> impl Iterator<Item = HandleId> {
        std::iter::once(self.primary).chain(self.crossfade)
    }

    fn swift(&mut self, clip: AudioClip, backend: &mut dyn PlaybackBackend) {
        info!("Playing background music '{}'", clip.name());
        backend.stop(self.primary);
        backend.set_clip(self.primary, Some(clip.clone()));
        backend.set_position(self.primary, 0.0);
        backend.play(self.primary);

        if let Some(handle) = self.crossfade.take() {
            backend.destroy_handle(handle);
        }
        self.state.current = Some(clip);
        self.state.next = None;
        self.state.transition = MusicTransition::Swift;
        self.timer.disarm();
    }

    fn finish_crossfade(
        &mut self,
        backend: &mut dyn PlaybackBackend,
        volume: &mut VolumeController,
        sfx: &[HandleId],
    ) {
        if let Some(handle) = self.crossfade.take() {
            backend.destroy_handle(handle);
        }
        volume.set_music_volume(self.cap, backend, self.channels(sfx));
        self.promote_next();
    }

    fn promote_next(&mut self) {
        if let Some(next) = self.state.next.take() {
            info!("Background music now '{}'", next.name());
            self.state.current = Some(next);
        }
        self.timer.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MixerParams;
    use crate::volume::VolumeState;
    use cadence_kernel::HeadlessBackend;

    struct Rig {
        backend: HeadlessBackend,
        volume: VolumeController,
        engine: TransitionEngine,
    }

    impl Rig {
        fn new(music_volume: f32) -> Self {
            let mut backend = HeadlessBackend::new();
            let primary = backend.create_handle().expect("create");
            backend.set_looping(primary, true);
            let mut volume = VolumeController::new(
                VolumeState::new(music_volume, 1.0),
                None,
                MixerParams::default(),
            );
            volume.apply_all(&mut backend, Channels::music_only(primary));
            Self {
                backend,
                volume,
                engine: TransitionEngine::new(primary, 0.05, 0.2),
            }
        }

        fn request(&mut self, clip: &AudioClip, mode: MusicTransition) -> TransitionOutcome {
            self.engine
                .request(clip.clone(), mode, &mut self.backend, &mut self.volume)
        }

        fn tick(&mut self, dt: f32) -> u32 {
            self.backend.update(dt);
            self.engine
                .update(dt, &mut self.backend, &mut self.volume, &[])
        }

        fn run_until_idle(&mut self) -> u32 {
            let mut ticks = 0;
            while self.engine.is_active() && ticks < 1000 {
                self.tick(0.2);
                ticks += 1;
            }
            ticks
        }

        fn primary_clip(&self) -> Option<AudioClip> {
            self.backend.clip(self.engine.primary())
        }
    }

    fn clips() -> (AudioClip, AudioClip) {
        (AudioClip::silent("BGMusic1", 30.0), AudioClip::silent("BGMusic2", 30.0))
    }

    #[test]
    fn test_swift_from_silence() {
        let (a, _) = clips();
        let mut rig = Rig::new(0.12);

        // Mode is ignored when nothing has played yet.
        assert_eq!(rig.request(&a, MusicTransition::CrossFade), TransitionOutcome::Swapped);
        assert_eq!(rig.engine.state().current(), Some(&a));
        assert!(rig.engine.crossfade().is_none());
        assert!(!rig.engine.is_active());
        assert!(rig.backend.is_playing(rig.engine.primary()));
        assert_eq!(rig.backend.handle_count(), 1);
    }

    #[test]
    fn test_same_clip_is_noop() {
        let (a, _) = clips();
        let mut rig = Rig::new(0.12);
        rig.request(&a, MusicTransition::Swift);

        for mode in [
            MusicTransition::Swift,
            MusicTransition::FadeOutFadeIn,
            MusicTransition::CrossFade,
        ] {
            assert_eq!(rig.request(&a, mode), TransitionOutcome::AlreadyPlaying);
            assert!(rig.engine.crossfade().is_none());
            assert!(!rig.engine.is_active());
        }
        assert_eq!(rig.backend.handle_count(), 1);
    }

    #[test]
    fn test_crossfade_scenario() {
        let (a, b) = clips();
        let mut rig = Rig::new(0.12);
        rig.request(&a, MusicTransition::Swift);

        assert_eq!(rig.request(&b, MusicTransition::CrossFade), TransitionOutcome::Scheduled);
        let fade = rig.engine.crossfade().expect("crossfade handle");
        assert_eq!(rig.backend.clip(fade), Some(b.clone()));
        assert!(rig.backend.is_playing(fade));
        // cap - current volume
        assert!(rig.backend.volume(fade).abs() < 0.001);
        assert_eq!(rig.engine.state().next(), Some(&b));

        // First step fires on the next tick.
        assert_eq!(rig.tick(0.016), 1);
        assert!((rig.volume.state().music_volume - 0.07).abs() < 0.001);
        assert!((rig.backend.volume(fade) - 0.05).abs() < 0.001);

        rig.run_until_idle();
        assert_eq!(rig.engine.state().current(), Some(&b));
        assert!(rig.engine.state().next().is_none());
        assert!(rig.engine.crossfade().is_none());
        assert!(!rig.backend.is_valid(fade));
        assert_eq!(rig.primary_clip(), Some(b));
        assert!((rig.volume.state().music_volume - 0.12).abs() < 0.001);
        assert_eq!(rig.backend.handle_count(), 1);
    }

    #[test]
    fn test_crossfade_keeps_position() {
        let (a, b) = clips();
        let mut rig = Rig::new(0.1);
        rig.request(&a, MusicTransition::Swift);
        rig.request(&b, MusicTransition::CrossFade);

        // 0.1 -> 0.05 -> 0.0 takes two steps, 0.2s apart.
        rig.tick(0.0);
        rig.tick(0.2);
        assert!(!rig.engine.is_active());
        let position = rig.backend.position(rig.engine.primary());
        assert!((position - 0.2).abs() < 0.01);
    }

    #[test]
    fn test_crossfade_mirrors_mute() {
        let (a, b) = clips();
        let mut rig = Rig::new(0.5);
        rig.request(&a, MusicTransition::Swift);
        rig.request(&b, MusicTransition::CrossFade);
        let fade = rig.engine.crossfade().expect("crossfade handle");

        let channels = rig.engine.channels(&[]);
        rig.volume.set_music_on(false, &mut rig.backend, channels);
        assert!(rig.backend.is_muted(fade));
        rig.tick(0.0);
        assert!(rig.backend.is_muted(fade));
    }

    #[test]
    fn test_crossfade_converges_when_primary_already_on_next() {
        let (a, b) = clips();
        let mut rig = Rig::new(0.5);
        rig.request(&a, MusicTransition::Swift);
        rig.request(&b, MusicTransition::CrossFade);

        // Someone else already moved the primary onto the next track.
        let primary = rig.engine.primary();
        rig.backend.set_clip(primary, Some(b.clone()));
        rig.tick(0.0);

        assert!(!rig.engine.is_active());
        assert_eq!(rig.engine.state().current(), Some(&b));
        assert!((rig.volume.state().music_volume - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_fade_out_fade_in() {
        let (a, b) = clips();
        let mut rig = Rig::new(0.12);
        rig.request(&a, MusicTransition::Swift);
        assert_eq!(
            rig.request(&b, MusicTransition::FadeOutFadeIn),
            TransitionOutcome::Scheduled
        );
        assert!(rig.engine.crossfade().is_none());

        // Out: 0.07, 0.02, 0.0 (switch)
        rig.tick(0.0);
        rig.tick(0.2);
        assert_eq!(rig.primary_clip(), Some(a.clone()));
        rig.tick(0.2);
        assert_eq!(rig.primary_clip(), Some(b.clone()));
        assert!(rig.volume.state().music_volume.abs() < 0.001);
        assert!(rig.engine.is_active());

        // In: 0.05, 0.10, 0.12 (cap)
        rig.tick(0.2);
        rig.tick(0.2);
        assert!(rig.engine.is_active());
        rig.tick(0.2);
        assert!(!rig.engine.is_active());
        assert_eq!(rig.engine.state().current(), Some(&b));
        assert!((rig.volume.state().music_volume - 0.12).abs() < 0.001);
        assert_eq!(rig.backend.handle_count(), 1);
    }

    #[test]
    fn test_request_while_busy_is_ignored() {
        let (a, b) = clips();
        let c = AudioClip::silent("BGMusic3", 30.0);
        let mut rig = Rig::new(0.12);
        rig.request(&a, MusicTransition::Swift);
        rig.request(&b, MusicTransition::FadeOutFadeIn);

        assert_eq!(rig.request(&c, MusicTransition::Swift), TransitionOutcome::Busy);
        assert_eq!(rig.request(&c, MusicTransition::CrossFade), TransitionOutcome::Busy);
        assert_eq!(rig.engine.state().transition(), MusicTransition::FadeOutFadeIn);
        assert_eq!(rig.engine.state().next(), Some(&b));
        assert!(rig.engine.crossfade().is_none());

        rig.run_until_idle();
        assert_eq!(rig.engine.state().current(), Some(&b));
        assert_eq!(rig.request(&c, MusicTransition::Swift), TransitionOutcome::Swapped);
    }

    #[test]
    fn test_step_when_idle_is_noop() {
        let (a, _) = clips();
        let mut rig = Rig::new(0.3);
        rig.request(&a, MusicTransition::Swift);
        let before = rig.volume.state();

        for _ in 0..5 {
            rig.engine.step(&mut rig.backend, &mut rig.volume, &[]);
        }
        assert_eq!(rig.volume.state(), before);
        assert_eq!(rig.engine.state().current(), Some(&a));
        assert_eq!(rig.tick(10.0), 0);
        assert_eq!(rig.backend.handle_count(), 1);
    }

    #[test]
    fn test_zero_volume_crossfade_finishes_in_one_step() {
        let (a, b) = clips();
        let mut rig = Rig::new(0.0);
        rig.request(&a, MusicTransition::Swift);
        rig.request(&b, MusicTransition::CrossFade);
        assert_eq!(rig.tick(0.0), 1);
        assert!(!rig.engine.is_active());
        assert_eq!(rig.engine.state().current(), Some(&b));
    }

    #[test]
    fn test_pause_resume_stop() {
        let (a, _) = clips();
        let mut rig = Rig::new(0.3);
        rig.request(&a, MusicTransition::Swift);
        let primary = rig.engine.primary();

        rig.engine.pause(&mut rig.backend);
        assert!(!rig.backend.is_playing(primary));
        rig.engine.resume(&mut rig.backend);
        assert!(rig.backend.is_playing(primary));
        rig.engine.stop(&mut rig.backend);
        assert!(!rig.backend.is_playing(primary));
        assert_eq!(rig.engine.state().current(), Some(&a));
    }

    #[test]
    fn test_release_destroys_handles() {
        let (a, b) = clips();
        let mut rig = Rig::new(0.3);
        rig.request(&a, MusicTransition::Swift);
        rig.request(&b, MusicTransition::CrossFade);
        rig.engine.release(&mut rig.backend);
        assert_eq!(rig.backend.handle_count(), 0);
        assert!(!rig.engine.is_active());
    }
}
