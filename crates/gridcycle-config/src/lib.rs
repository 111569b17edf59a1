//! Static configuration consumed (read-only) by the game engine and the
//! server. The core never parses a config file itself — this crate is the
//! thin loader the binaries use to turn a TOML file into a populated
//! [`Config`].

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

/// Everything the game engine and tick orchestrator need to know before a
/// game can start. Immutable after construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid_width: u32,
    pub grid_height: u32,

    /// Hard cap on concurrent players. Bounded to 255 because player ids
    /// are a single byte on the wire and `0` is reserved for "empty cell".
    pub max_clients: u8,

    /// Deterministic seed for spawn placement and color palette generation.
    pub rng_seed: u64,

    /// Per-tick communication budget, in milliseconds.
    pub comm_budget_ms: u64,

    /// Target frame pacing floor, in milliseconds (30 FPS == 33ms).
    pub tick_floor_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid_width: 100,
            grid_height: 100,
            max_clients: 16,
            rng_seed: 123_456_789,
            comm_budget_ms: 100,
            tick_floor_ms: 33,
        }
    }
}

/// Everything that can go wrong validating a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("grid_width and grid_height must both be positive")]
    NonPositiveDimension,

    #[error("grid_width * grid_height must not exceed 2^31, got {0}")]
    GridTooLarge(u64),

    #[error("max_clients must be at least 1, got {0}")]
    NoClientsAllowed(u8),
}

impl Config {
    /// Loads configuration from a TOML file at `path`, falling back to
    /// [`Config::default`] when the file does not exist.
    #[instrument(skip_all)]
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        info!(?path, "loading configuration file");

        if !path.exists() {
            info!("configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::NonPositiveDimension);
        }

        let area = u64::from(self.grid_width) * u64::from(self.grid_height);
        if area > (1u64 << 31) {
            return Err(ConfigError::GridTooLarge(area));
        }

        if self.max_clients == 0 {
            return Err(ConfigError::NoClientsAllowed(self.max_clients));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_width_is_rejected() {
        let config = Config {
            grid_width: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveDimension)
        ));
    }

    #[test]
    fn zero_height_is_rejected() {
        let config = Config {
            grid_height: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveDimension)
        ));
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let config = Config {
            grid_width: 1 << 20,
            grid_height: 1 << 20,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::GridTooLarge(_))));
    }

    #[test]
    fn zero_max_clients_is_rejected() {
        let config = Config {
            max_clients: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoClientsAllowed(0))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load("/nonexistent/path/gridcycle.toml").unwrap();
        assert_eq!(config.grid_width, Config::default().grid_width);
    }
}
