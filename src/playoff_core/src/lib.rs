//! Playoff Core - NBA postseason simulation and championship odds.
//!
//! This library provides:
//! - Elo win probabilities and best-of-N series simulation
//! - Regular-season standings projection
//! - Play-in tournament and full playoff bracket simulation
//! - Monte Carlo championship odds, parallelized with rayon
//! - A cache-wrapped service for the host application
//!
//! Python bindings via PyO3 are available behind the `python` feature. Their
//! tests only build with it enabled: `cargo test --features python` (needs a
//! Python install to link against). Wheels are built with `extension-module`.

pub mod bracket;
pub mod cache;
pub mod championship;
pub mod config;
pub mod constants;
pub mod error;
pub mod play_in;
pub mod season;
pub mod series;
pub mod service;
pub mod team;
pub mod win_prob;

#[cfg(test)]
mod fixtures;

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub use bracket::{AdvancementRule, Bracket, BracketBuilder, ConferenceBracket, Matchup, Round};
pub use cache::{CacheKey, MemoryCache, NoCache, ResultCache};
pub use championship::{ChampionshipAggregator, ChampionshipOdds, SeedingSource, TeamOdds, TeamRoundTally};
pub use config::SimulationConfig;
pub use error::{CacheError, PlayoffError, Result};
pub use play_in::{resolve_play_in, PlayInOutcome};
pub use season::{LeagueStandings, SeasonSimulator, SeedEntry};
pub use series::{series_win_probability, SeriesOutcome, SeriesSimulator};
pub use service::PlayoffService;
pub use team::{Conference, SeededTeam, Team, TeamId};
pub use win_prob::{calculate_win_prob, RatingOracle, RatingProvider, RatingSnapshot};

#[cfg(feature = "python")]
fn py_service(teams: Vec<Team>, config: SimulationConfig) -> PyResult<PlayoffService<RatingSnapshot, NoCache>> {
    let ratings = RatingSnapshot::from_teams(&teams);
    Ok(PlayoffService::new(teams, ratings, NoCache, config)?)
}

#[cfg(feature = "python")]
fn to_json<T: serde::Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))
}

#[cfg(feature = "python")]
fn standings_from_json(standings: Option<String>) -> PyResult<Option<LeagueStandings>> {
    standings
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| pyo3::exceptions::PyValueError::new_err(format!("bad standings: {}", e)))
}

/// Probability that a team rated `rating_a` beats one rated `rating_b`.
#[cfg(feature = "python")]
#[pyfunction]
fn py_calculate_win_prob(rating_a: f64, rating_b: f64) -> f64 {
    calculate_win_prob(rating_a, rating_b)
}

/// Projected standings for both conferences, as JSON.
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(signature = (teams, sample_count = constants::DEFAULT_SEASON_SAMPLES, seed = None))]
fn py_simulate_standings(teams: Vec<Team>, sample_count: usize, seed: Option<u64>) -> PyResult<String> {
    let config = SimulationConfig {
        season_samples: sample_count,
        seed,
        ..SimulationConfig::default()
    };
    let standings = py_service(teams, config)?.simulate_standings(None)?;
    to_json(&standings)
}

/// Predicted bracket as JSON. `standings` is the JSON returned by
/// `simulate_standings`; without it standings are projected first.
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(signature = (teams, standings = None, seed = None))]
fn py_build_bracket(teams: Vec<Team>, standings: Option<String>, seed: Option<u64>) -> PyResult<String> {
    let standings = standings_from_json(standings)?;
    let config = SimulationConfig {
        seed,
        ..SimulationConfig::default()
    };
    let bracket = py_service(teams, config)?.build_bracket(standings.as_ref())?;
    to_json(&bracket)
}

/// Championship odds as JSON.
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(signature = (teams, standings = None, simulation_count = constants::DEFAULT_SIMULATION_COUNT, seed = None))]
fn py_calculate_odds(
    teams: Vec<Team>,
    standings: Option<String>,
    simulation_count: usize,
    seed: Option<u64>,
) -> PyResult<String> {
    let standings = standings_from_json(standings)?;
    let config = SimulationConfig {
        seed,
        ..SimulationConfig::default()
    };
    let odds = py_service(teams, config)?.calculate_odds(standings.as_ref(), Some(simulation_count))?;
    to_json(&odds)
}

/// Python module definition
#[cfg(feature = "python")]
#[pymodule]
fn playoff_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Classes
    m.add_class::<Team>()?;
    m.add_class::<Conference>()?;

    // Operations
    m.add_function(wrap_pyfunction!(py_calculate_win_prob, m)?)?;
    m.add_function(wrap_pyfunction!(py_simulate_standings, m)?)?;
    m.add_function(wrap_pyfunction!(py_build_bracket, m)?)?;
    m.add_function(wrap_pyfunction!(py_calculate_odds, m)?)?;

    // Constants
    m.add("DEFAULT_RATING", constants::DEFAULT_RATING)?;
    m.add("MAX_SIMULATIONS", constants::MAX_SIMULATIONS)?;

    Ok(())
}
