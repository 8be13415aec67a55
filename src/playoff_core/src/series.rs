use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::function::factorial::binomial;

use crate::constants::{wins_needed, DEFAULT_SERIES_LENGTH, DEFAULT_SERIES_SAMPLES};
use crate::error::{validate_sample_count, validate_series_length, Result};
use crate::team::TeamId;
use crate::win_prob::RatingOracle;

/// Result of one simulated game.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub team_a: TeamId,
    pub team_b: TeamId,

    /// Probability `team_a` had of winning
    pub team_a_probability: f64,

    pub winner: TeamId,
}

impl GameResult {
    pub fn loser(&self) -> TeamId {
        if self.winner == self.team_a {
            self.team_b
        } else {
            self.team_a
        }
    }
}

/// Play a single game.
pub fn play_game<O, R>(oracle: &O, team_a: TeamId, team_b: TeamId, rng: &mut R) -> GameResult
where
    O: RatingOracle + ?Sized,
    R: Rng,
{
    let prob = oracle.win_probability(team_a, team_b);
    let winner = if rng.gen::<f64>() < prob { team_a } else { team_b };

    GameResult {
        team_a,
        team_b,
        team_a_probability: prob,
        winner,
    }
}

/// Play games at a fixed per-game probability until one side has `needed` wins.
///
/// Returns (team_a wins, team_b wins).
pub fn play_series_games<R: Rng>(game_prob: f64, needed: u32, rng: &mut R) -> (u32, u32) {
    let mut a_wins = 0;
    let mut b_wins = 0;

    while a_wins < needed && b_wins < needed {
        if rng.gen::<f64>() < game_prob {
            a_wins += 1;
        } else {
            b_wins += 1;
        }
    }

    (a_wins, b_wins)
}

/// Closed-form probability of winning a best-of-`series_length` series.
///
/// Sums over the number of games `k` the opponent takes before the
/// clinching win: C(w-1+k, k) * p^w * q^k.
pub fn series_win_probability(game_prob: f64, series_length: u32) -> f64 {
    let needed = wins_needed(series_length);
    let q = 1.0 - game_prob;
    let clinch = game_prob.powi(needed as i32);

    (0..needed)
        .map(|k| binomial((needed - 1 + k) as u64, k as u64) * clinch * q.powi(k as i32))
        .sum()
}

/// Heuristic series length from the favourite's single-game probability.
///
/// Heavy favourites close faster. For a best-of-7: >=0.7 gives 4 or 5,
/// >=0.6 gives 5 or 6, anything closer gives 6 or 7.
pub fn predict_series_length<R: Rng>(
    favorite_prob: f64,
    series_length: u32,
    rng: &mut R,
) -> u32 {
    let needed = wins_needed(series_length);
    let (low, high) = if favorite_prob >= 0.7 {
        (needed, needed + 1)
    } else if favorite_prob >= 0.6 {
        (needed + 1, needed + 2)
    } else {
        (series_length.saturating_sub(1), series_length)
    };

    let low = low.clamp(needed, series_length);
    let high = high.clamp(needed, series_length);
    if rng.gen::<bool>() {
        low
    } else {
        high
    }
}

/// Outcome of a playoff series between `team_a` (the higher seed) and `team_b`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesOutcome {
    pub team_a: TeamId,
    pub team_b: TeamId,

    /// Single-game probability for `team_a`
    pub game_win_probability: f64,

    pub team_a_probability: f64,
    pub team_b_probability: f64,
    pub winner: TeamId,

    /// Probability of the more likely side
    pub confidence: f64,

    pub predicted_games: u32,

    /// Final (team_a, team_b) game count when the series was actually played
    pub score: Option<(u32, u32)>,
}

impl SeriesOutcome {
    pub fn loser(&self) -> TeamId {
        if self.winner == self.team_a {
            self.team_b
        } else {
            self.team_a
        }
    }

    pub fn probability_of(&self, team: TeamId) -> Option<f64> {
        if team == self.team_a {
            Some(self.team_a_probability)
        } else if team == self.team_b {
            Some(self.team_b_probability)
        } else {
            None
        }
    }
}

/// Best-of-N series simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeriesSimulator {
    series_length: u32,
    sample_count: usize,
}

impl Default for SeriesSimulator {
    fn default() -> Self {
        SeriesSimulator {
            series_length: DEFAULT_SERIES_LENGTH,
            sample_count: DEFAULT_SERIES_SAMPLES,
        }
    }
}

impl SeriesSimulator {
    pub fn new(series_length: u32, sample_count: usize) -> Result<Self> {
        validate_series_length(series_length)?;
        validate_sample_count("series_samples", sample_count)?;
        Ok(SeriesSimulator {
            series_length,
            sample_count,
        })
    }

    pub fn series_length(&self) -> u32 {
        self.series_length
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Estimate the series from `sample_count` independent draws.
    ///
    /// The winner is the side with the higher estimated probability; an
    /// exact 0.5 goes to `team_a`.
    pub fn simulate<O, R>(&self, oracle: &O, team_a: TeamId, team_b: TeamId, rng: &mut R) -> SeriesOutcome
    where
        O: RatingOracle + ?Sized,
        R: Rng,
    {
        let game_prob = oracle.win_probability(team_a, team_b);
        let needed = wins_needed(self.series_length);

        let mut a_series_wins = 0usize;
        for _ in 0..self.sample_count {
            let (a_wins, b_wins) = play_series_games(game_prob, needed, rng);
            if a_wins > b_wins {
                a_series_wins += 1;
            }
        }

        let a_prob = a_series_wins as f64 / self.sample_count as f64;
        let winner = if a_prob < 0.5 { team_b } else { team_a };
        let favorite_prob = game_prob.max(1.0 - game_prob);

        SeriesOutcome {
            team_a,
            team_b,
            game_win_probability: game_prob,
            team_a_probability: a_prob,
            team_b_probability: 1.0 - a_prob,
            winner,
            confidence: a_prob.max(1.0 - a_prob),
            predicted_games: predict_series_length(favorite_prob, self.series_length, rng),
            score: None,
        }
    }

    /// Play the series once; the sampled winner advances.
    ///
    /// Probabilities are the closed-form series odds, `predicted_games` is
    /// the number of games actually played.
    pub fn play<O, R>(&self, oracle: &O, team_a: TeamId, team_b: TeamId, rng: &mut R) -> SeriesOutcome
    where
        O: RatingOracle + ?Sized,
        R: Rng,
    {
        let game_prob = oracle.win_probability(team_a, team_b);
        let (a_wins, b_wins) = play_series_games(game_prob, wins_needed(self.series_length), rng);
        let a_prob = series_win_probability(game_prob, self.series_length);

        SeriesOutcome {
            team_a,
            team_b,
            game_win_probability: game_prob,
            team_a_probability: a_prob,
            team_b_probability: 1.0 - a_prob,
            winner: if a_wins > b_wins { team_a } else { team_b },
            confidence: a_prob.max(1.0 - a_prob),
            predicted_games: a_wins + b_wins,
            score: Some((a_wins, b_wins)),
        }
    }
}
