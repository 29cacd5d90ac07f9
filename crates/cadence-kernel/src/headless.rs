//! Simulated playback backend.
//!
//! Tracks channel state and advances positions on `update`, without an
//! output device. Used when no device is available and by tests.

use cadence_common::{AudioClip, AudioResult, Arena, HandleId};
use tracing::debug;

use crate::playback::{ChannelState, PlaybackBackend, PlaybackState};

/// Backend that simulates playback in memory.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    channels: Arena<ChannelState>,
}

impl HeadlessBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Full state of a channel, for inspection.
    #[must_use]
    pub fn channel(&self, handle: HandleId) -> Option<&ChannelState> {
        self.channels.get(handle)
    }

    fn with_channel(&mut self, handle: HandleId, f: impl FnOnce(&mut ChannelState)) {
        if let Some(channel) = self.channels.get_mut(handle) {
            f(channel);
        }
    }
}

impl PlaybackBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn create_handle(&mut self) -> AudioResult<HandleId> {
        let handle = self.channels.insert(ChannelState::default());
        debug!("Created headless channel {}", handle);
        Ok(handle)
    }

    fn destroy_handle(&mut self, handle: HandleId) -> bool {
        let removed = self.channels.remove(handle).is_some();
        if removed {
            debug!("Destroyed headless channel {}", handle);
        }
        removed
    }

    fn is_valid(&self, handle: HandleId) -> bool {
        self.channels.contains(handle)
    }

    fn handle_count(&self) -> usize {
        self.channels.len()
    }

    fn set_clip(&mut self, handle: HandleId, clip: Option<AudioClip>) {
        self.with_channel(handle, |c| {
            c.clip = clip;
            c.position = 0.0;
            c.state = PlaybackState::Stopped;
        });
    }

    fn clip(&self, handle: HandleId) -> Option<AudioClip> {
        self.channels.get(handle).and_then(|c| c.clip.clone())
    }

    fn set_volume(&mut self, handle: HandleId, volume: f32) {
        self.with_channel(handle, |c| c.set_volume(volume));
    }

    fn volume(&self, handle: HandleId) -> f32 {
        self.channels.get(handle).map_or(0.0, |c| c.volume)
    }

    fn set_muted(&mut self, handle: HandleId, muted: bool) {
        self.with_channel(handle, |c| c.muted = muted);
    }

    fn is_muted(&self, handle: HandleId) -> bool {
        self.channels.get(handle).is_some_and(|c| c.muted)
    }

    fn set_looping(&mut self, handle: HandleId, looping: bool) {
        self.with_channel(handle, |c| c.looping = looping);
    }

    fn is_looping(&self, handle: HandleId) -> bool {
        self.channels.get(handle).is_some_and(|c| c.looping)
    }

    fn set_position(&mut self, handle: HandleId, seconds: f32) {
        self.with_channel(handle, |c| c.set_position(seconds));
    }

    fn position(&self, handle: HandleId) -> f32 {
        self.channels.get(handle).map_or(0.0, |c| c.position)
    }

    fn play(&mut self, handle: HandleId) {
        self.with_channel(handle, |c| {
            if c.clip.is_some() {
                c.state = PlaybackState::Playing;
            }
        });
    }

    fn pause(&mut self, handle: HandleId) {
        self.with_channel(handle, |c| {
            if c.state.is_playing() {
                c.state = PlaybackState::Paused;
            }
        });
    }

    fn resume(&mut self, handle: HandleId) {
        self.with_channel(handle, |c| {
            if c.state == PlaybackState::Paused {
                c.state = PlaybackState::Playing;
            }
        });
    }

    fn stop(&mut self, handle: HandleId) {
        self.with_channel(handle, |c| {
            c.state = PlaybackState::Stopped;
            c.position = 0.0;
        });
    }

    fn is_playing(&self, handle: HandleId) -> bool {
        self.channels.get(handle).is_some_and(|c| c.state.is_playing())
    }

    fn update(&mut self, dt: f32) {
        for (_, channel) in self.channels.iter_mut() {
            channel.advance(dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_destroy() {
        let mut backend = HeadlessBackend::new();
        let h = backend.create_handle().expect("create");
        assert!(backend.is_valid(h));
        assert_eq!(backend.handle_count(), 1);

        assert!(backend.destroy_handle(h));
        assert!(!backend.destroy_handle(h));
        assert!(!backend.is_valid(h));
        assert_eq!(backend.handle_count(), 0);
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let mut backend = HeadlessBackend::new();
        let h = backend.create_handle().expect("create");
        backend.destroy_handle(h);

        backend.set_volume(h, 0.3);
        backend.play(h);
        assert!(!backend.is_playing(h));
        assert!(backend.volume(h).abs() < f32::EPSILON);
        assert!(backend.clip(h).is_none());
    }

    #[test]
    fn test_play_requires_clip() {
        let mut backend = HeadlessBackend::new();
        let h = backend.create_handle().expect("create");
        backend.play(h);
        assert!(!backend.is_playing(h));

        backend.set_clip(h, Some(AudioClip::silent("a", 1.0)));
        backend.play(h);
        assert!(backend.is_playing(h));
    }

    #[test]
    fn test_pause_resume() {
        let mut backend = HeadlessBackend::new();
        let h = backend.create_handle().expect("create");
        backend.set_clip(h, Some(AudioClip::silent("a", 5.0)));
        backend.play(h);
        backend.update(1.0);
        backend.pause(h);
        backend.update(1.0);
        assert!((backend.position(h) - 1.0).abs() < 0.001);

        backend.resume(h);
        backend.update(1.0);
        assert!((backend.position(h) - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_one_shot_finishes() {
        let mut backend = HeadlessBackend::new();
        let h = backend.create_handle().expect("create");
        backend.set_clip(h, Some(AudioClip::silent("blip", 0.5)));
        backend.play(h);
        backend.update(0.6);
        assert!(!backend.is_playing(h));
        assert!(backend.is_valid(h));
    }
}
