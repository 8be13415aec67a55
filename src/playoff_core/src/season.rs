//! Regular-season projection.
//!
//! Each simulated season is a conference round robin: every pair of teams
//! plays `games_per_opponent` games. This stands in for the real 82-game
//! schedule; win percentages are scaled to a full season afterwards and
//! inter-conference games are not modelled.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::constants::{
    CHAMPIONSHIP_ODDS_MAX, CHAMPIONSHIP_ODDS_MIN, CHAMPIONSHIP_RATING_FLOOR,
    CHAMPIONSHIP_RATING_SPAN, GAMES_PER_OPPONENT, MAX_GAMES_PER_OPPONENT, MAX_SEASON_GAMES,
    PLAYOFF_PROBABILITY_BUCKETS, PLAYOFF_PROBABILITY_FLOOR, SEASON_GAMES,
};
use crate::error::{validate_sample_count, PlayoffError, Result};
use crate::team::{conference_teams, Conference, PerConference, SeededTeam, Team, TeamId};
use crate::win_prob::RatingOracle;

/// Projected standing of one team.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeedEntry {
    /// 1-based rank within the conference
    pub rank: u32,
    pub team: Team,
    pub projected_wins: f64,
    pub projected_losses: f64,
    pub win_percentage: f64,
    pub playoff_probability: f64,
    pub championship_odds: f64,
}

impl SeedEntry {
    pub fn team_id(&self) -> TeamId {
        self.team.id
    }

    pub fn seeded(&self) -> SeededTeam {
        SeededTeam::new(self.team.id, self.rank)
    }
}

/// Projected standings for both conferences, best record first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LeagueStandings {
    pub eastern: Vec<SeedEntry>,
    pub western: Vec<SeedEntry>,
}

impl LeagueStandings {
    pub fn new(eastern: Vec<SeedEntry>, western: Vec<SeedEntry>) -> Self {
        LeagueStandings { eastern, western }
    }

    pub fn conference(&self, conference: Conference) -> &[SeedEntry] {
        match conference {
            Conference::Eastern => &self.eastern,
            Conference::Western => &self.western,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &SeedEntry> {
        self.eastern.iter().chain(self.western.iter())
    }

    pub fn get(&self, team: TeamId) -> Option<&SeedEntry> {
        self.entries().find(|e| e.team.id == team)
    }

    pub fn len(&self) -> usize {
        self.eastern.len() + self.western.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eastern.is_empty() && self.western.is_empty()
    }
}

impl From<PerConference<Vec<SeedEntry>>> for LeagueStandings {
    fn from(per: PerConference<Vec<SeedEntry>>) -> Self {
        LeagueStandings::new(per.eastern, per.western)
    }
}

/// Bucketed playoff probability for a projected win percentage.
pub fn playoff_probability(win_percentage: f64) -> f64 {
    PLAYOFF_PROBABILITY_BUCKETS
        .iter()
        .find(|(threshold, _)| win_percentage >= *threshold)
        .map(|&(_, prob)| prob)
        .unwrap_or(PLAYOFF_PROBABILITY_FLOOR)
}

/// Rating-only championship odds, linear in rating between 1400 and 1700.
pub fn championship_odds(rating: f64) -> f64 {
    let normalized = ((rating - CHAMPIONSHIP_RATING_FLOOR) / CHAMPIONSHIP_RATING_SPAN).clamp(0.0, 1.0);
    CHAMPIONSHIP_ODDS_MIN + normalized * (CHAMPIONSHIP_ODDS_MAX - CHAMPIONSHIP_ODDS_MIN)
}

/// Monte Carlo regular-season simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeasonSimulator {
    games_per_opponent: u32,
    season_games: u32,
}

impl Default for SeasonSimulator {
    fn default() -> Self {
        SeasonSimulator {
            games_per_opponent: GAMES_PER_OPPONENT,
            season_games: SEASON_GAMES,
        }
    }
}

impl SeasonSimulator {
    pub fn new(games_per_opponent: u32, season_games: u32) -> Result<Self> {
        if games_per_opponent == 0 {
            return Err(PlayoffError::invalid("games_per_opponent", "must be at least 1"));
        }
        if games_per_opponent > MAX_GAMES_PER_OPPONENT {
            return Err(PlayoffError::invalid(
                "games_per_opponent",
                format!("{} exceeds the limit of {}", games_per_opponent, MAX_GAMES_PER_OPPONENT),
            ));
        }
        if season_games == 0 {
            return Err(PlayoffError::invalid("season_games", "must be at least 1"));
        }
        if season_games > MAX_SEASON_GAMES {
            return Err(PlayoffError::invalid(
                "season_games",
                format!("{} exceeds the limit of {}", season_games, MAX_SEASON_GAMES),
            ));
        }
        Ok(SeasonSimulator {
            games_per_opponent,
            season_games,
        })
    }

    /// Games each team plays in one simulated round robin
    pub fn games_per_team(&self, conference_size: usize) -> u64 {
        (conference_size.saturating_sub(1) as u64).saturating_mul(u64::from(self.games_per_opponent))
    }

    /// Play one round robin; returns wins per team, indexed like `teams`.
    pub fn play_round_robin<O, R>(&self, oracle: &O, teams: &[Team], rng: &mut R) -> Vec<u64>
    where
        O: RatingOracle + ?Sized,
        R: Rng,
    {
        let mut wins = vec![0u64; teams.len()];

        for i in 0..teams.len() {
            for j in (i + 1)..teams.len() {
                let prob = oracle.win_probability(teams[i].id, teams[j].id);
                for _ in 0..self.games_per_opponent {
                    if rng.gen::<f64>() < prob {
                        wins[i] += 1;
                    } else {
                        wins[j] += 1;
                    }
                }
            }
        }

        wins
    }

    /// Project standings for one conference from `sample_count` seasons.
    ///
    /// Seasons run in parallel; each gets its own generator seeded from
    /// `rng`, so the result depends only on the seed.
    pub fn simulate_standings<O, R>(
        &self,
        oracle: &O,
        teams: &[Team],
        sample_count: usize,
        rng: &mut R,
    ) -> Result<Vec<SeedEntry>>
    where
        O: RatingOracle + Sync + ?Sized,
        R: Rng,
    {
        validate_sample_count("sample_count", sample_count)?;
        if teams.is_empty() {
            return Ok(Vec::new());
        }

        let seeds: Vec<u64> = (0..sample_count).map(|_| rng.gen()).collect();
        let totals = seeds
            .par_iter()
            .map(|&seed| {
                let mut season_rng = ChaCha8Rng::seed_from_u64(seed);
                self.play_round_robin(oracle, teams, &mut season_rng)
            })
            .fold(
                || vec![0u64; teams.len()],
                |mut acc, wins| {
                    for (total, w) in acc.iter_mut().zip(wins) {
                        *total += w;
                    }
                    acc
                },
            )
            .reduce(
                || vec![0u64; teams.len()],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b) {
                        *x += y;
                    }
                    a
                },
            );

        let games = self.games_per_team(teams.len()).saturating_mul(sample_count as u64);
        Ok(self.project(oracle, teams, &totals, games, rng))
    }

    /// Standings from a single simulated season.
    pub fn sample_standings<O, R>(&self, oracle: &O, teams: &[Team], rng: &mut R) -> Vec<SeedEntry>
    where
        O: RatingOracle + ?Sized,
        R: Rng,
    {
        let totals = self.play_round_robin(oracle, teams, rng);
        let games = self.games_per_team(teams.len());
        self.project(oracle, teams, &totals, games, rng)
    }

    /// Project both conferences.
    pub fn simulate_league<O, R>(
        &self,
        oracle: &O,
        teams: &[Team],
        sample_count: usize,
        rng: &mut R,
    ) -> Result<LeagueStandings>
    where
        O: RatingOracle + Sync + ?Sized,
        R: Rng,
    {
        let eastern = self.simulate_standings(
            oracle,
            &conference_teams(teams, Conference::Eastern),
            sample_count,
            rng,
        )?;
        let western = self.simulate_standings(
            oracle,
            &conference_teams(teams, Conference::Western),
            sample_count,
            rng,
        )?;
        Ok(LeagueStandings::new(eastern, western))
    }

    /// One simulated season for both conferences.
    pub fn sample_league<O, R>(&self, oracle: &O, teams: &[Team], rng: &mut R) -> LeagueStandings
    where
        O: RatingOracle + ?Sized,
        R: Rng,
    {
        PerConference::from_fn(|c| self.sample_standings(oracle, &conference_teams(teams, c), rng)).into()
    }

    /// Turn win totals into ranked seed entries.
    ///
    /// Equal projections are separated by a random draw, the same way the
    /// league settles ties it cannot break on record.
    fn project<O, R>(&self, oracle: &O, teams: &[Team], wins: &[u64], games: u64, rng: &mut R) -> Vec<SeedEntry>
    where
        O: RatingOracle + ?Sized,
        R: Rng,
    {
        let season = self.season_games as f64;
        let mut rows: Vec<(u64, SeedEntry)> = teams
            .iter()
            .zip(wins)
            .map(|(team, &w)| {
                // A one-team conference plays nobody
                let win_pct = if games == 0 { 0.5 } else { w as f64 / games as f64 };
                let projected_wins = win_pct * season;
                let entry = SeedEntry {
                    rank: 0,
                    team: team.clone(),
                    projected_wins,
                    projected_losses: season - projected_wins,
                    win_percentage: win_pct,
                    playoff_probability: playoff_probability(win_pct),
                    championship_odds: championship_odds(oracle.rating_or_default(team.id)),
                };
                (rng.gen::<u64>(), entry)
            })
            .collect();

        rows.sort_by(|(lot_a, a), (lot_b, b)| {
            b.projected_wins
                .partial_cmp(&a.projected_wins)
                .unwrap_or(Ordering::Equal)
                .then(lot_a.cmp(lot_b))
        });

        rows.into_iter()
            .enumerate()
            .map(|(i, (_, mut entry))| {
                entry.rank = i as u32 + 1;
                entry
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::win_prob::RatingSnapshot;

    fn conference(size: u32, conference: Conference) -> Vec<Team> {
        (0..size)
            .map(|i| {
                let id = i + if conference == Conference::Eastern { 1 } else { 101 };
                Team::new(id, format!("Team{}", id), format!("T{}", id), conference, 1350.0 + 25.0 * i as f64)
            })
            .collect()
    }

    #[test]
    fn test_playoff_probability_buckets() {
        assert_eq!(playoff_probability(0.70), 0.95);
        assert_eq!(playoff_probability(0.60), 0.95);
        assert_eq!(playoff_probability(0.57), 0.80);
        assert_eq!(playoff_probability(0.50), 0.60);
        assert_eq!(playoff_probability(0.46), 0.30);
        assert_eq!(playoff_probability(0.41), 0.10);
        assert_eq!(playoff_probability(0.20), 0.05);
    }

    #[test]
    fn test_championship_odds_range() {
        assert!((championship_odds(1200.0) - 0.001).abs() < 1e-12);
        assert!((championship_odds(1400.0) - 0.001).abs() < 1e-12);
        assert!((championship_odds(1550.0) - 0.1255).abs() < 1e-12);
        assert!((championship_odds(1700.0) - 0.25).abs() < 1e-12);
        assert!((championship_odds(1900.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_round_robin_game_count() {
        let teams = conference(15, Conference::Eastern);
        let oracle = RatingSnapshot::from_teams(&teams);
        let sim = SeasonSimulator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let wins = sim.play_round_robin(&oracle, &teams, &mut rng);
        // 105 pairs, 3 games each
        assert_eq!(wins.iter().sum::<u64>(), 315);
        assert!(wins.iter().all(|&w| w <= sim.games_per_team(15)));
    }

    #[test]
    fn test_standings_are_ranked_permutation() {
        let teams = conference(15, Conference::Eastern);
        let oracle = RatingSnapshot::from_teams(&teams);
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let standings = SeasonSimulator::default()
            .simulate_standings(&oracle, &teams, 1000, &mut rng)
            .unwrap();

        assert_eq!(standings.len(), 15);
        let mut ids: Vec<TeamId> = standings.iter().map(|e| e.team.id).collect();
        ids.sort();
        assert_eq!(ids, (1..=15).collect::<Vec<_>>());

        for (i, entry) in standings.iter().enumerate() {
            assert_eq!(entry.rank, i as u32 + 1);
            assert!((entry.projected_wins + entry.projected_losses - 82.0).abs() < 1e-9);
            assert!(entry.projected_wins >= 0.0 && entry.projected_losses >= 0.0);
            assert!((0.0..=1.0).contains(&entry.playoff_probability));
        }
        for pair in standings.windows(2) {
            assert!(pair[0].projected_wins >= pair[1].projected_wins);
        }

        // Highest rated team should top a 1000-season projection
        assert_eq!(standings[0].team.id, 15);
        assert_eq!(standings[14].team.id, 1);
    }

    #[test]
    fn test_standings_deterministic_with_seed() {
        let teams = conference(15, Conference::Western);
        let oracle = RatingSnapshot::from_teams(&teams);
        let sim = SeasonSimulator::default();

        let a = sim
            .simulate_standings(&oracle, &teams, 100, &mut ChaCha8Rng::seed_from_u64(9))
            .unwrap();
        let b = sim
            .simulate_standings(&oracle, &teams, 100, &mut ChaCha8Rng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_conference() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let standings = SeasonSimulator::default()
            .simulate_standings(&RatingSnapshot::new(), &[], 100, &mut rng)
            .unwrap();
        assert!(standings.is_empty());
    }

    #[test]
    fn test_single_team_conference() {
        let teams = conference(1, Conference::Eastern);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let standings = SeasonSimulator::default()
            .simulate_standings(&RatingSnapshot::from_teams(&teams), &teams, 10, &mut rng)
            .unwrap();
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].projected_wins, 41.0);
        assert_eq!(standings[0].rank, 1);
    }

    #[test]
    fn test_zero_samples_rejected() {
        let teams = conference(3, Conference::Eastern);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let err = SeasonSimulator::default()
            .simulate_standings(&RatingSnapshot::from_teams(&teams), &teams, 0, &mut rng)
            .unwrap_err();
        assert!(err.is_invalid_parameter());
        assert!(SeasonSimulator::new(0, 82).is_err());
    }

    #[test]
    fn test_season_shape_bounds() {
        assert!(SeasonSimulator::new(MAX_GAMES_PER_OPPONENT, MAX_SEASON_GAMES).is_ok());
        assert!(SeasonSimulator::new(400_000_000, 82).unwrap_err().is_invalid_parameter());
        assert!(SeasonSimulator::new(3, MAX_SEASON_GAMES + 1).unwrap_err().is_invalid_parameter());

        // Wide conferences count games in 64 bits
        let sim = SeasonSimulator::new(MAX_GAMES_PER_OPPONENT, 82).unwrap();
        assert_eq!(sim.games_per_team(15), 14 * 16);
        assert_eq!(sim.games_per_team(usize::MAX), u64::MAX);
    }

    #[test]
    fn test_league_split_by_conference() {
        let mut teams = conference(15, Conference::Eastern);
        teams.extend(conference(15, Conference::Western));
        let oracle = RatingSnapshot::from_teams(&teams);
        let mut rng = ChaCha8Rng::seed_from_u64(6);

        let league = SeasonSimulator::default()
            .simulate_league(&oracle, &teams, 50, &mut rng)
            .unwrap();
        assert_eq!(league.len(), 30);
        assert!(league.eastern.iter().all(|e| e.team.conference == Conference::Eastern));
        assert!(league.western.iter().all(|e| e.team.conference == Conference::Western));
        assert_eq!(league.get(101).map(|e| e.team.conference), Some(Conference::Western));

        let sampled = SeasonSimulator::default().sample_league(&oracle, &teams, &mut rng);
        assert_eq!(sampled.conference(Conference::Eastern).len(), 15);
        assert_eq!(sampled.conference(Conference::Western).len(), 15);
    }
}
