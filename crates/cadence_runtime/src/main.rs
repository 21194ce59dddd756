//! Cadence runtime
//!
//! Boots the particle demo either in a window or headless for a fixed
//! number of ticks.

mod app;
mod demo;

use anyhow::{Context, Result};
use cadence_asset::{AssetLoader, ResourceCache, ResourceHandle};
use cadence_audio::{Mixer, Sound, DEFAULT_SAMPLE_RATE};
use cadence_core::runloop::SimulationLoop;
use cadence_core::surface::HeadlessSurface;
use cadence_core::time::FixedTimestep;
use cadence_render::WindowConfig;
use cadence_services::{Args, RuntimeConfig};
use clap::Parser;
use demo::ParticleDemo;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const BOUNCE_SOUND: &str = "sounds/bounce.wav";

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .init();

    let config = RuntimeConfig::load(args).context("invalid configuration")?;
    tracing::info!(
        version = cadence_core::VERSION,
        tick_rate = config.tick_rate,
        max_catch_up = config.max_catch_up,
        "Cadence starting"
    );
    for line in config.bindings.describe() {
        tracing::debug!("{line}");
    }

    let sounds: ResourceCache<Sound> = ResourceCache::new();
    let loader = AssetLoader::new(&config.asset_root);
    let bounce = loader
        .load_or_placeholder(&sounds, BOUNCE_SOUND, Sound::decode, || {
            Sound::silence(DEFAULT_SAMPLE_RATE)
        })
        .context("failed to load bounce sound")?;

    let registry = Arc::new(demo::registry());
    let demo = ParticleDemo::new(
        registry,
        config.bindings.clone(),
        demo::DEFAULT_PARTICLES,
        Some(bounce),
    )
    .context("failed to spawn particles")?;
    let sim_loop = SimulationLoop::new(FixedTimestep::new(config.tick_rate, config.max_catch_up));

    match config.headless_ticks {
        Some(ticks) => run_headless(demo, sim_loop, ticks),
        None => {
            let mut mixer = Mixer::new(DEFAULT_SAMPLE_RATE);
            mixer.set_master_volume(config.master_volume);
            let window = WindowConfig {
                title: "Cadence".to_string(),
                width: config.width,
                height: config.height,
                vsync: config.vsync,
            };
            app::App::new(window, demo, sim_loop, mixer).run()
        }
    }
}

/// Feed exactly one timestep per frame until `ticks` updates have run.
fn run_headless(mut demo: ParticleDemo, mut sim_loop: SimulationLoop, ticks: u64) -> Result<()> {
    let mut surface: HeadlessSurface<ResourceHandle<Sound>> = HeadlessSurface::new();
    let dt = sim_loop.timestep().dt();

    sim_loop.start();
    while sim_loop.tick().count() < ticks {
        sim_loop.frame(&mut surface, &mut demo, dt);
    }
    sim_loop.stop();

    let hash = demo.positions_hash().context("failed to hash positions")?;
    tracing::info!(
        ticks = sim_loop.tick().count(),
        frames = surface.frames(),
        bounce_sounds = surface.sounds_played().len(),
        %hash,
        "headless run finished"
    );
    for (phase, avg_ms) in demo.profiler().summary() {
        tracing::info!(phase, avg_ms, "phase timing");
    }
    println!("{hash}");
    Ok(())
}
