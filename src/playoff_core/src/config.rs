//! Simulation settings, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::championship::ChampionshipAggregator;
use crate::constants::{
    BRACKET_TTL_SECS, DEFAULT_SEASON_SAMPLES, DEFAULT_SERIES_LENGTH, DEFAULT_SERIES_SAMPLES,
    DEFAULT_SIMULATION_COUNT, GAMES_PER_OPPONENT, MAX_SIMULATIONS, ODDS_TTL_SECS, SEASON_GAMES,
    STANDINGS_TTL_SECS,
};
use crate::error::{validate_sample_count, validate_simulation_count, validate_ttl, Result};
use crate::season::SeasonSimulator;
use crate::series::SeriesSimulator;

/// Cache lifetimes per operation, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub standings_secs: u64,
    pub bracket_secs: u64,
    pub odds_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            standings_secs: STANDINGS_TTL_SECS,
            bracket_secs: BRACKET_TTL_SECS,
            odds_secs: ODDS_TTL_SECS,
        }
    }
}

impl CacheTtls {
    pub fn standings(&self) -> Duration {
        Duration::from_secs(self.standings_secs)
    }

    pub fn bracket(&self) -> Duration {
        Duration::from_secs(self.bracket_secs)
    }

    pub fn odds(&self) -> Duration {
        Duration::from_secs(self.odds_secs)
    }

    pub fn validate(&self) -> Result<()> {
        validate_ttl("standings_secs", self.standings_secs)?;
        validate_ttl("bracket_secs", self.bracket_secs)?;
        validate_ttl("odds_secs", self.odds_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seasons behind a standings projection
    pub season_samples: usize,
    /// Draws behind a predicted series
    pub series_samples: usize,
    pub series_length: u32,
    /// Default bracket count for championship odds
    pub simulation_count: usize,
    /// Ceiling for caller-supplied simulation counts
    pub max_simulations: usize,
    pub games_per_opponent: u32,
    pub season_games: u32,
    /// Fixed seed for reproducible runs; entropy when absent
    pub seed: Option<u64>,
    pub cache: CacheTtls,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            season_samples: DEFAULT_SEASON_SAMPLES,
            series_samples: DEFAULT_SERIES_SAMPLES,
            series_length: DEFAULT_SERIES_LENGTH,
            simulation_count: DEFAULT_SIMULATION_COUNT,
            max_simulations: MAX_SIMULATIONS,
            games_per_opponent: GAMES_PER_OPPONENT,
            season_games: SEASON_GAMES,
            seed: None,
            cache: CacheTtls::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        validate_sample_count("season_samples", self.season_samples)?;
        validate_sample_count("max_simulations", self.max_simulations)?;
        validate_simulation_count(self.simulation_count, self.max_simulations)?;
        self.series_simulator()?;
        self.season_simulator()?;
        self.cache.validate()
    }

    pub fn series_simulator(&self) -> Result<SeriesSimulator> {
        SeriesSimulator::new(self.series_length, self.series_samples)
    }

    pub fn season_simulator(&self) -> Result<SeasonSimulator> {
        SeasonSimulator::new(self.games_per_opponent, self.season_games)
    }

    pub fn aggregator(&self) -> Result<ChampionshipAggregator> {
        Ok(ChampionshipAggregator::new(
            self.series_simulator()?,
            self.season_simulator()?,
            self.max_simulations,
        ))
    }
}
