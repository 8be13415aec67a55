use std::collections::HashMap;

use tracing::debug;

use crate::constants::{DEFAULT_RATING, ELO_SCALE};
use crate::error::Result;
use crate::team::{Team, TeamId};

/// Calculate the probability of a team rated `rating_a` beating one rated `rating_b`.
///
/// Standard Elo logistic: a 400 point edge is worth 10:1 odds.
pub fn calculate_win_prob(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / ELO_SCALE))
}

/// Pairwise win probabilities from team ratings.
///
/// Implementations must return the same answer for the same pair for the
/// whole lifetime of a simulation run.
pub trait RatingOracle {
    /// Rating for a team, `None` when it is unknown
    fn rating(&self, team: TeamId) -> Option<f64>;

    /// Rating with the neutral default substituted for unknown teams
    fn rating_or_default(&self, team: TeamId) -> f64 {
        self.rating(team).unwrap_or_else(|| {
            debug!(team, "no rating on file, using neutral default");
            DEFAULT_RATING
        })
    }

    /// Probability that `team_a` beats `team_b` in a single game
    fn win_probability(&self, team_a: TeamId, team_b: TeamId) -> f64 {
        if team_a == team_b {
            return 0.5;
        }
        calculate_win_prob(self.rating_or_default(team_a), self.rating_or_default(team_b))
    }
}

/// Frozen copy of the rating table, shared by every draw of one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RatingSnapshot {
    ratings: HashMap<TeamId, f64>,
}

impl RatingSnapshot {
    pub fn new() -> Self {
        RatingSnapshot {
            ratings: HashMap::new(),
        }
    }

    pub fn from_teams(teams: &[Team]) -> Self {
        teams.iter().map(|t| (t.id, t.rating)).collect()
    }

    pub fn insert(&mut self, team: TeamId, rating: f64) {
        self.ratings.insert(team, rating);
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

impl FromIterator<(TeamId, f64)> for RatingSnapshot {
    fn from_iter<I: IntoIterator<Item = (TeamId, f64)>>(iter: I) -> Self {
        RatingSnapshot {
            ratings: iter.into_iter().collect(),
        }
    }
}

impl RatingOracle for RatingSnapshot {
    fn rating(&self, team: TeamId) -> Option<f64> {
        self.ratings.get(&team).copied()
    }
}

/// Upstream source of ratings (model service, database).
///
/// A failure here aborts the operation with `UpstreamUnavailable`; there is
/// no sensible default for a whole league's ratings.
pub trait RatingProvider {
    fn snapshot(&self) -> Result<RatingSnapshot>;
}

impl RatingProvider for RatingSnapshot {
    fn snapshot(&self) -> Result<RatingSnapshot> {
        Ok(self.clone())
    }
}
