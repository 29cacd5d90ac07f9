//! # Cadence Demo
//!
//! Drives an [`AudioManager`] through a short scripted scene: background
//! music switched with each transition type, a one-shot, a repeating sound
//! and a callback chain.
//!
//! Usage: `cadence-demo [RESOURCE_ROOT] [SECONDS]`. Clips missing from the
//! resource root are replaced with silent placeholders so the scene still
//! runs on any machine.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::cell::Cell;
use std::rc::Rc;

use anyhow::Result;
use cadence_engine::{AudioClip, AudioConfig, AudioManager, FrameClock, MusicTransition, TomlPreferences};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Clips the scene uses, with placeholder lengths in seconds.
const SCENE_CLIPS: [(&str, f32); 6] = [
    ("BGMusic1", 30.0),
    ("BGMusic2", 30.0),
    ("OneShot", 0.5),
    ("TickTock", 0.5),
    ("Callback1", 1.5),
    ("Callback2", 1.0),
];

/// Scripted actions, by time in seconds.
#[derive(Debug, Clone, Copy)]
enum Cue {
    Swift,
    Fade,
    CrossFade,
    OneShot,
    Repeat(u32),
    Callback,
    ToggleMute,
    MusicVolume(f32),
}

const SCRIPT: [(f32, Cue); 10] = [
    (1.0, Cue::OneShot),
    (2.0, Cue::CrossFade),
    (3.0, Cue::Repeat(4)),
    (5.0, Cue::Callback),
    (7.0, Cue::Fade),
    (9.0, Cue::MusicVolume(0.3)),
    (10.0, Cue::ToggleMute),
    (11.0, Cue::ToggleMute),
    (12.0, Cue::Swift),
    (13.0, Cue::CrossFade),
];

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("cadence_engine=info".parse()?)
                .add_directive("cadence_kernel=info".parse()?),
        )
        .init();

    info!("Cadence demo starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let mut config = AudioConfig::load();
    if let Some(root) = args.next() {
        config = config.with_resource_root(root);
    }
    let seconds: f32 = match args.next() {
        Some(s) => s.parse()?,
        None => 15.0,
    };

    let preferences = TomlPreferences::open_default()?;
    let mut manager = AudioManager::builder(config).preferences(preferences).build()?;
    load_scene_clips(&mut manager);

    run_scene(&mut manager, seconds)?;

    let state = manager.shutdown()?;
    info!(
        "Cadence demo shutdown complete (music {:.2}, sfx {:.2})",
        state.music_volume, state.sfx_volume
    );
    Ok(())
}

/// Loads the scene clips from `Sounds/`, padding with silent placeholders.
fn load_scene_clips(manager: &mut AudioManager) {
    let assets = manager.assets_mut();
    if let Err(e) = assets.load_directory("Sounds") {
        warn!("No sound directory ({}), using placeholders", e);
    }
    for (name, length) in SCENE_CLIPS {
        if !assets.assets().iter().any(|a| a.name == name) {
            assets.add_clip(AudioClip::silent(name, length));
        }
    }
}

fn clip(manager: &AudioManager, name: &str) -> Result<AudioClip> {
    Ok(manager.assets().require(name)?)
}

/// The other background track.
fn next_track(manager: &AudioManager) -> &'static str {
    match manager.music_state().current() {
        Some(current) if current.name() == "BGMusic1" => "BGMusic2",
        _ => "BGMusic1",
    }
}

fn switch_music(manager: &mut AudioManager, mode: MusicTransition) {
    let name = next_track(manager);
    let outcome = manager.play_background_music_named(name, mode);
    info!("{:?} to '{}': {:?}", mode, name, outcome);
}

fn run_scene(manager: &mut AudioManager, seconds: f32) -> Result<()> {
    manager.play_background_music_named("BGMusic1", MusicTransition::Swift);

    let callback_done = Rc::new(Cell::new(false));
    let mut clock = FrameClock::new(60);
    let mut elapsed = 0.0f32;
    let mut cue = 0;

    while elapsed < seconds {
        let dt = clock.delta_time();
        elapsed += dt;

        while cue < SCRIPT.len() && SCRIPT[cue].0 <= elapsed {
            match SCRIPT[cue].1 {
                Cue::Swift => switch_music(manager, MusicTransition::Swift),
                Cue::Fade => switch_music(manager, MusicTransition::FadeOutFadeIn),
                Cue::CrossFade => switch_music(manager, MusicTransition::CrossFade),
                Cue::OneShot => {
                    let one_shot = clip(manager, "OneShot")?;
                    manager.play_one_shot(&one_shot, None)?;
                },
                Cue::Repeat(times) => {
                    let tick = clip(manager, "TickTock")?;
                    manager.play_repeating(&tick, times, None)?;
                },
                Cue::Callback => {
                    // The chained clip is played from the loop once this fires.
                    let done = Rc::clone(&callback_done);
                    let first = clip(manager, "Callback1")?;
                    manager.play_one_shot(&first, Some(Box::new(move || done.set(true))))?;
                },
                Cue::ToggleMute => manager.toggle_mute(),
                Cue::MusicVolume(v) => {
                    manager.set_music_volume(v);
                },
            }
            cue += 1;
        }

        manager.update(dt);

        if callback_done.replace(false) {
            let second = clip(manager, "Callback2")?;
            manager.play_one_shot(&second, None)?;
        }

        if let Some(sound) = manager.timed_sound("TickTock") {
            debug!("TickTock {:.1}s left", sound.remaining());
        }

        clock.sleep_remainder();
    }
    Ok(())
}
