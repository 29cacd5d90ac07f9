//! Volume levels and their mixer decibel mapping.
//!
//! Scalar volumes live in `[0, 1]`. Mixer parameters are linear in decibels
//! over `[-80, +20]`, so `0.0` maps to the -80 dB silence floor and `1.0`
//! maps to +20 dB.

/// Silence floor of the mixer, in decibels.
pub const MIXER_FLOOR_DB: f32 = -80.0;

/// Width of the mixer range, in decibels.
pub const MIXER_RANGE_DB: f32 = 100.0;

/// Tolerance used when comparing volume levels.
pub const LEVEL_EPSILON: f32 = 1e-4;

/// Clamps a level to `[0, 1]`. NaN becomes silence.
#[must_use]
pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Maps a scalar volume to a mixer parameter in decibels.
#[must_use]
pub fn volume_to_decibels(volume: f32) -> f32 {
    MIXER_FLOOR_DB + clamp01(volume) * MIXER_RANGE_DB
}

/// Maps a mixer parameter in decibels back to a scalar volume.
#[must_use]
pub fn decibels_to_volume(decibels: f32) -> f32 {
    clamp01((decibels - MIXER_FLOOR_DB) / MIXER_RANGE_DB)
}

/// Whether two levels are equal within [`LEVEL_EPSILON`].
#[must_use]
pub fn levels_match(a: f32, b: f32) -> bool {
    (a - b).abs() <= LEVEL_EPSILON
}
