//! Timed sound effect pool.
//!
//! Looping sound effects that stop after a countdown. Entries are keyed by
//! clip name (at most one per name) and kept sorted by name, so lookups are
//! a binary search and expiry order is deterministic.

use cadence_common::HandleId;

use crate::timer::SoundCallback;

/// An active looping sound effect with a countdown.
pub struct TimedSound {
    name: String,
    handle: HandleId,
    remaining: f32,
    on_expire: Option<SoundCallback>,
}

impl std::fmt::Debug for TimedSound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedSound")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("remaining", &self.remaining)
            .field("has_callback", &self.on_expire.is_some())
            .finish()
    }
}

impl TimedSound {
    /// Clip name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Playback handle.
    #[must_use]
    pub const fn handle(&self) -> HandleId {
        self.handle
    }

    /// Seconds left before expiry.
    #[must_use]
    pub const fn remaining(&self) -> f32 {
        self.remaining
    }
}

/// A sound removed from the pool. The caller tears down the handle and runs
/// the callback.
pub struct ExpiredSound {
    /// Clip name.
    pub name: String,
    /// Handle to destroy.
    pub handle: HandleId,
    /// Completion callback.
    pub on_expire: Option<SoundCallback>,
}

impl std::fmt::Debug for ExpiredSound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiredSound")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Pool of timed sounds, sorted by name.
#[derive(Debug, Default)]
pub struct TimedSoundPool {
    sounds: Vec<TimedSound>,
}

impl TimedSoundPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active sounds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Position of `name` in name order.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.sounds
            .binary_search_by(|s| s.name.as_str().cmp(name))
            .ok()
    }

    /// Sound playing under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TimedSound> {
        self.index_of(name).map(|i| &self.sounds[i])
    }

    /// Restarts the countdown of an existing sound and returns its handle.
    pub fn reset(&mut self, name: &str, duration: f32) -> Option<HandleId> {
        let i = self.index_of(name)?;
        let sound = &mut self.sounds[i];
        sound.remaining = duration;
        Some(sound.handle)
    }

    /// Adds a sound. An existing sound with the same name is replaced and
    /// returned.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        handle: HandleId,
        duration: f32,
        on_expire: Option<SoundCallback>,
    ) -> Option<TimedSound> {
        let sound = TimedSound {
            name: name.into(),
            handle,
            remaining: duration,
            on_expire,
        };
        match self
            .sounds
            .binary_search_by(|s| s.name.as_str().cmp(&sound.name))
        {
            Ok(i) => Some(std::mem::replace(&mut self.sounds[i], sound)),
            Err(i) => {
                self.sounds.insert(i, sound);
                None
            },
        }
    }

    /// Counts every sound down by `dt` and removes the first expired one in
    /// name order. Other expired sounds wait for later ticks.
    pub fn tick(&mut self, dt: f32) -> Option<ExpiredSound> {
        for sound in &mut self.sounds {
            sound.remaining -= dt;
        }

        let i = self.sounds.iter().position(|s| s.remaining <= 0.0)?;
        let sound = self.sounds.remove(i);
        Some(ExpiredSound {
            name: sound.name,
            handle: sound.handle,
            on_expire: sound.on_expire,
        })
    }

    /// Handles of every active sound.
    pub fn handles(&self) -> impl Iterator<Item = HandleId> + '_ {
        self.sounds.iter().map(|s| s.handle)
    }

    /// Removes every sound. Callbacks are dropped without running.
    pub fn drain(&mut self) -> Vec<HandleId> {
        self.sounds.drain(..).map(|s| s.handle).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn h(i: u32) -> HandleId {
        HandleId::new(i, 0)
    }

    #[test]
    fn test_sorted_by_name() {
        let mut pool = TimedSoundPool::new();
        pool.insert("rain", h(0), 5.0, None);
        pool.insert("alarm", h(1), 5.0, None);
        pool.insert("engine", h(2), 5.0, None);

        assert_eq!(pool.index_of("alarm"), Some(0));
        assert_eq!(pool.index_of("engine"), Some(1));
        assert_eq!(pool.index_of("rain"), Some(2));
        assert_eq!(pool.index_of("wind"), None);
    }

    #[test]
    fn test_reset_keeps_single_entry() {
        let mut pool = TimedSoundPool::new();
        pool.insert("TickTock", h(0), 10.0, None);
        assert!(pool.tick(4.0).is_none());
        assert!((pool.get("TickTock").expect("sound").remaining() - 6.0).abs() < 0.001);

        assert_eq!(pool.reset("TickTock", 10.0), Some(h(0)));
        assert_eq!(pool.len(), 1);
        assert!((pool.get("TickTock").expect("sound").remaining() - 10.0).abs() < 0.001);
    }

    #[test]
    fn test_one_expiry_per_tick() {
        let mut pool = TimedSoundPool::new();
        pool.insert("b", h(0), 1.0, None);
        pool.insert("a", h(1), 1.0, None);

        let first = pool.tick(1.5).expect("expired");
        assert_eq!(first.name, "a");
        assert_eq!(pool.len(), 1);

        let second = pool.tick(0.0).expect("expired");
        assert_eq!(second.name, "b");
        assert!(pool.is_empty());
        assert!(pool.tick(1.0).is_none());
    }

    #[test]
    fn test_expired_sound_carries_callback() {
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let mut pool = TimedSoundPool::new();
        pool.insert("loop", h(3), 0.5, Some(Box::new(move || counter.set(counter.get() + 1))));

        let expired = pool.tick(0.5).expect("expired");
        assert_eq!(expired.handle, h(3));
        if let Some(cb) = expired.on_expire {
            cb();
        }
        assert_eq!(fired.get(), 1);
        assert!(pool.tick(10.0).is_none());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_drain_drops_callbacks() {
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let mut pool = TimedSoundPool::new();
        pool.insert("x", h(0), 1.0, Some(Box::new(move || flag.set(true))));
        assert_eq!(pool.drain(), vec![h(0)]);
        assert!(!fired.get());
        assert!(pool.is_empty());
    }
}
