//! Command-line configuration
//!
//! Values given on the command line win over the settings file, which wins
//! over built-in defaults.

use crate::input::{BindingError, InputBindings};
use crate::settings::{Settings, SettingsError};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "cadence", version, about = "Fixed-timestep simulation runtime")]
pub struct Args {
    /// Window width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Simulation updates per second
    #[arg(long)]
    pub tick_rate: Option<f64>,

    /// Most catch-up updates run in a single frame
    #[arg(long)]
    pub max_catch_up: Option<u32>,

    /// Directory assets are loaded from
    #[arg(long, default_value = "assets")]
    pub asset_root: PathBuf,

    /// JSON settings file
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Run without a window for a fixed number of ticks
    #[arg(long)]
    pub headless: bool,

    /// Ticks to simulate in headless mode
    #[arg(long, default_value_t = 600)]
    pub ticks: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("resolution must be positive, got {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("tick rate must be a positive finite number giving a non-zero timestep, got {0}")]
    InvalidTickRate(f64),

    #[error("max catch-up must be at least 1, got {0}")]
    InvalidMaxCatchUp(u32),

    #[error("master volume must be within [0, 1], got {0}")]
    InvalidVolume(f32),

    #[error("headless mode needs at least one tick")]
    NoTicks,

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("invalid key bindings")]
    Bindings(#[from] BindingError),
}

/// Validated startup configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub width: u32,
    pub height: u32,
    pub tick_rate: f64,
    pub max_catch_up: u32,
    pub vsync: bool,
    pub master_volume: f32,
    pub asset_root: PathBuf,
    pub verbose: bool,
    pub bindings: InputBindings,
    /// `Some(ticks)` when running headless.
    pub headless_ticks: Option<u64>,
}

impl RuntimeConfig {
    /// Read the settings file named by `args` (if any) and merge.
    pub fn load(args: Args) -> Result<Self, ConfigError> {
        let settings = match &args.settings {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        Self::resolve(args, settings)
    }

    pub fn resolve(args: Args, settings: Settings) -> Result<Self, ConfigError> {
        let width = args.width.unwrap_or(settings.graphics.resolution_width);
        let height = args.height.unwrap_or(settings.graphics.resolution_height);
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidResolution { width, height });
        }

        let tick_rate = args.tick_rate.unwrap_or(settings.simulation.tick_rate);
        if !tick_rate.is_finite() || tick_rate <= 0.0 {
            return Err(ConfigError::InvalidTickRate(tick_rate));
        }
        // Rates that are positive yet too large or too small for a `Duration` step.
        match Duration::try_from_secs_f64(1.0 / tick_rate) {
            Ok(dt) if !dt.is_zero() => {}
            _ => return Err(ConfigError::InvalidTickRate(tick_rate)),
        }

        let max_catch_up = args.max_catch_up.unwrap_or(settings.simulation.max_catch_up);
        if max_catch_up == 0 {
            return Err(ConfigError::InvalidMaxCatchUp(max_catch_up));
        }

        let master_volume = settings.audio.master_volume;
        if !(0.0..=1.0).contains(&master_volume) {
            return Err(ConfigError::InvalidVolume(master_volume));
        }

        if args.headless && args.ticks == 0 {
            return Err(ConfigError::NoTicks);
        }

        let bindings = InputBindings::with_overrides(&settings.bindings)?;

        Ok(Self {
            width,
            height,
            tick_rate,
            max_catch_up,
            vsync: settings.graphics.vsync,
            master_volume,
            asset_root: args.asset_root,
            verbose: args.verbose,
            bindings,
            headless_ticks: args.headless.then_some(args.ticks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Action;
    use cadence_core::surface::Key;
    use cadence_core::time::FixedTimestep;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("cadence").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let config = RuntimeConfig::resolve(parse(&[]), Settings::default()).unwrap();
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.tick_rate, 60.0);
        assert_eq!(config.max_catch_up, 5);
        assert_eq!(config.asset_root, PathBuf::from("assets"));
        assert!(!config.verbose);
        assert_eq!(config.headless_ticks, None);
    }

    #[test]
    fn command_line_overrides_settings() {
        let mut settings = Settings::default();
        settings.graphics.resolution_width = 800;
        settings.simulation.tick_rate = 30.0;

        let config =
            RuntimeConfig::resolve(parse(&["--tick-rate", "120", "--verbose"]), settings).unwrap();
        assert_eq!(config.width, 800);
        assert_eq!(config.tick_rate, 120.0);
        assert!(config.verbose);
    }

    #[test]
    fn rejects_invalid_values() {
        let check = |argv: &[&str]| RuntimeConfig::resolve(parse(argv), Settings::default());
        assert!(matches!(
            check(&["--width", "0"]),
            Err(ConfigError::InvalidResolution { width: 0, .. })
        ));
        assert!(matches!(
            check(&["--tick-rate", "0"]),
            Err(ConfigError::InvalidTickRate(_))
        ));
        assert!(matches!(
            check(&["--tick-rate", "inf"]),
            Err(ConfigError::InvalidTickRate(_))
        ));
        assert!(matches!(
            check(&["--tick-rate", "1e10"]),
            Err(ConfigError::InvalidTickRate(_))
        ));
        assert!(matches!(
            check(&["--tick-rate", "1e-300"]),
            Err(ConfigError::InvalidTickRate(_))
        ));
        assert!(matches!(
            check(&["--max-catch-up", "0"]),
            Err(ConfigError::InvalidMaxCatchUp(0))
        ));
        assert!(matches!(
            check(&["--headless", "--ticks", "0"]),
            Err(ConfigError::NoTicks)
        ));
        assert!(Args::try_parse_from(["cadence", "--width", "-5"]).is_err());
    }

    #[test]
    fn accepted_tick_rates_build_a_timestep() {
        for rate in ["1e6", "0.001", "60"] {
            let config =
                RuntimeConfig::resolve(parse(&["--tick-rate", rate]), Settings::default()).unwrap();
            let timestep = FixedTimestep::new(config.tick_rate, config.max_catch_up);
            assert!(!timestep.dt().is_zero());
        }
    }

    #[test]
    fn settings_bindings_are_applied() {
        let mut settings = Settings::default();
        settings
            .bindings
            .insert("TogglePause".to_string(), vec!["P".to_string()]);
        let config = RuntimeConfig::resolve(parse(&["--headless"]), settings).unwrap();
        assert_eq!(config.bindings.action_for(Key::Char('p')), Some(Action::TogglePause));
        assert_eq!(config.headless_ticks, Some(600));

        let mut settings = Settings::default();
        settings.audio.master_volume = 1.5;
        assert!(matches!(
            RuntimeConfig::resolve(parse(&[]), settings),
            Err(ConfigError::InvalidVolume(_))
        ));
    }
}
