//! Device playback through rodio.
//!
//! Each channel owns one rodio [`Sink`]. Sinks cannot seek a queued source
//! reliably, so `play` rebuilds the sink from the clip samples starting at the
//! tracked position. Position is measured with a wall clock while playing.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                RodioBackend                  │
//! │  ┌─────────────┐      ┌───────────────────┐  │
//! │  │ AudioDevice │──────│ Arena<RodioChannel>│  │
//! │  └─────────────┘      └───────────────────┘  │
//! │     OutputStream         Sink per handle     │
//! └──────────────────────────────────────────────┘
//! ```

use std::time::{Duration, Instant};

use cadence_common::{AudioClip, AudioError, AudioResult, Arena, ClipData, HandleId};
use rodio::buffer::SamplesBuffer;
use rodio::source::Zero;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};

use crate::playback::{ChannelState, PlaybackBackend, PlaybackState};

/// Format used to render silent clips.
const SILENT_CHANNELS: u16 = 2;
const SILENT_SAMPLE_RATE: u32 = 44_100;

type BoxedSource = Box<dyn Source<Item = f32> + Send>;

/// Connection to the default output device.
pub struct AudioDevice {
    /// The output stream (must be kept alive).
    _stream: OutputStream,
    /// Handle for creating sinks.
    handle: OutputStreamHandle,
}

impl std::fmt::Debug for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDevice").finish_non_exhaustive()
    }
}

impl AudioDevice {
    /// Opens the default output device.
    pub fn new() -> AudioResult<Self> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?;

        info!("Audio device initialized");

        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Creates a new sink for audio playback.
    pub fn create_sink(&self) -> AudioResult<Sink> {
        Sink::try_new(&self.handle).map_err(|e| AudioError::HandleCreationFailed(e.to_string()))
    }
}

struct RodioChannel {
    state: ChannelState,
    sink: Sink,
    /// Wall clock instant playback last (re)started, with the position at that instant.
    started: Option<(Instant, f32)>,
}

impl std::fmt::Debug for RodioChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioChannel")
            .field("state", &self.state)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl RodioChannel {
    fn current_position(&self) -> f32 {
        let Some((instant, base)) = self.started else {
            return self.state.position;
        };
        let length = self.state.clip.as_ref().map_or(0.0, AudioClip::length);
        let position = base + instant.elapsed().as_secs_f32();

        if self.state.looping && length > 0.0 {
            position % length
        } else {
            position.min(length)
        }
    }

    /// Freezes the wall clock into the stored position.
    fn latch_position(&mut self) {
        self.state.position = self.current_position();
        self.started = None;
    }

    fn apply_volume(&self) {
        self.sink.set_volume(self.state.output_volume());
    }
}

/// Playback backend driving a real output device.
#[derive(Debug)]
pub struct RodioBackend {
    device: AudioDevice,
    channels: Arena<RodioChannel>,
}

impl RodioBackend {
    /// Opens the default output device.
    pub fn new() -> AudioResult<Self> {
        Ok(Self {
            device: AudioDevice::new()?,
            channels: Arena::new(),
        })
    }

    fn with_channel(&mut self, handle: HandleId, f: impl FnOnce(&mut RodioChannel)) {
        if let Some(channel) = self.channels.get_mut(handle) {
            f(channel);
        }
    }

    fn build_source(state: &ChannelState, clip: &AudioClip) -> BoxedSource {
        let skip = Duration::try_from_secs_f32(state.position).unwrap_or(Duration::ZERO);

        match clip.data() {
            ClipData::Samples {
                samples,
                sample_rate,
                channels,
            } => {
                let buffer = SamplesBuffer::new(*channels, *sample_rate, samples.as_ref().clone());
                if state.looping {
                    Box::new(buffer.repeat_infinite().skip_duration(skip))
                } else {
                    Box::new(buffer.skip_duration(skip))
                }
            },
            ClipData::Silent => {
                let zero = Zero::<f32>::new(SILENT_CHANNELS, SILENT_SAMPLE_RATE);
                if state.looping {
                    Box::new(zero)
                } else {
                    let remaining = (clip.length() - state.position).max(0.0);
                    let remaining = Duration::try_from_secs_f32(remaining).unwrap_or(Duration::ZERO);
                    Box::new(zero.take_duration(remaining))
                }
            },
        }
    }
}

impl PlaybackBackend for RodioBackend {
    fn name(&self) -> &'static str {
        "rodio"
    }

    fn create_handle(&mut self) -> AudioResult<HandleId> {
        let sink = self.device.create_sink()?;
        let handle = self.channels.insert(RodioChannel {
            state: ChannelState::default(),
            sink,
            started: None,
        });
        debug!("Created rodio channel {}", handle);
        Ok(handle)
    }

    fn destroy_handle(&mut self, handle: HandleId) -> bool {
        match self.channels.remove(handle) {
            Some(channel) => {
                channel.sink.stop();
                debug!("Destroyed rodio channel {}", handle);
                true
            },
            None => false,
        }
    }

    fn is_valid(&self, handle: HandleId) -> bool {
        self.channels.contains(handle)
    }

    fn handle_count(&self) -> usize {
        self.channels.len()
    }

    fn set_clip(&mut self, handle: HandleId, clip: Option<AudioClip>) {
        self.with_channel(handle, |c| {
            c.sink.stop();
            c.started = None;
            c.state.clip = clip;
            c.state.position = 0.0;
            c.state.state = PlaybackState::Stopped;
        });
    }

    fn clip(&self, handle: HandleId) -> Option<AudioClip> {
        self.channels.get(handle).and_then(|c| c.state.clip.clone())
    }

    fn set_volume(&mut self, handle: HandleId, volume: f32) {
        self.with_channel(handle, |c| {
            c.state.set_volume(volume);
            c.apply_volume();
        });
    }

    fn volume(&self, handle: HandleId) -> f32 {
        self.channels.get(handle).map_or(0.0, |c| c.state.volume)
    }

    fn set_muted(&mut self, handle: HandleId, muted: bool) {
        self.with_channel(handle, |c| {
            c.state.muted = muted;
            c.apply_volume();
        });
    }

    fn is_muted(&self, handle: HandleId) -> bool {
        self.channels.get(handle).is_some_and(|c| c.state.muted)
    }

    fn set_looping(&mut self, handle: HandleId, looping: bool) {
        self.with_channel(handle, |c| c.state.looping = looping);
    }

    fn is_looping(&self, handle: HandleId) -> bool {
        self.channels.get(handle).is_some_and(|c| c.state.looping)
    }

    fn set_position(&mut self, handle: HandleId, seconds: f32) {
        let restart = self.is_playing(handle);
        self.with_channel(handle, |c| {
            c.started = None;
            c.state.set_position(seconds);
        });
        if restart {
            self.play(handle);
        }
    }

    fn position(&self, handle: HandleId) -> f32 {
        self.channels.get(handle).map_or(0.0, RodioChannel::current_position)
    }

    fn play(&mut self, handle: HandleId) {
        let Some(channel) = self.channels.get_mut(handle) else {
            return;
        };
        let Some(clip) = channel.state.clip.clone() else {
            return;
        };
        channel.latch_position();

        // A fresh sink discards whatever the old one had queued.
        let sink = match self.device.create_sink() {
            Ok(sink) => sink,
            Err(e) => {
                warn!("Failed to restart channel {}: {}", handle, e);
                return;
            },
        };
        sink.append(Self::build_source(&channel.state, &clip));
        channel.sink = sink;
        channel.apply_volume();
        channel.state.state = PlaybackState::Playing;
        channel.started = Some((Instant::now(), channel.state.position));
    }

    fn pause(&mut self, handle: HandleId) {
        self.with_channel(handle, |c| {
            if c.state.state.is_playing() {
                c.latch_position();
                c.sink.pause();
                c.state.state = PlaybackState::Paused;
            }
        });
    }

    fn resume(&mut self, handle: HandleId) {
        self.with_channel(handle, |c| {
            if c.state.state == PlaybackState::Paused {
                c.sink.play();
                c.state.state = PlaybackState::Playing;
                c.started = Some((Instant::now(), c.state.position));
            }
        });
    }

    fn stop(&mut self, handle: HandleId) {
        self.with_channel(handle, |c| {
            c.sink.stop();
            c.started = None;
            c.state.position = 0.0;
            c.state.state = PlaybackState::Stopped;
        });
    }

    fn is_playing(&self, handle: HandleId) -> bool {
        self.channels
            .get(handle)
            .is_some_and(|c| c.state.state.is_playing())
    }

    fn update(&mut self, _dt: f32) {
        for (_, channel) in self.channels.iter_mut() {
            if channel.state.state.is_playing() && !channel.state.looping && channel.sink.empty() {
                channel.started = None;
                channel.state.position = 0.0;
                channel.state.state = PlaybackState::Stopped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // CI machines usually have no output device; only exercise what we can.
    #[test]
    fn test_backend_open_or_report() {
        match RodioBackend::new() {
            Ok(mut backend) => {
                let h = backend.create_handle().expect("create");
                backend.set_clip(h, Some(AudioClip::silent("quiet", 0.2)));
                backend.set_volume(h, 0.5);
                backend.set_muted(h, true);
                backend.play(h);
                assert!(backend.is_playing(h));
                assert!((backend.volume(h) - 0.5).abs() < f32::EPSILON);
                backend.pause(h);
                assert!(!backend.is_playing(h));
                assert!(backend.destroy_handle(h));
                assert!(!backend.is_valid(h));
            },
            Err(e) => assert!(matches!(e, AudioError::DeviceInitFailed(_))),
        }
    }
}
