use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info};

use crate::bracket::{AdvancementRule, Bracket, BracketBuilder, Round};
use crate::constants::MAX_SIMULATIONS;
use crate::error::{validate_simulation_count, Result};
use crate::season::{LeagueStandings, SeasonSimulator};
use crate::series::SeriesSimulator;
use crate::team::{Conference, PerConference, Team, TeamId};
use crate::win_prob::RatingOracle;

/// How often a team reached each stage over a batch of simulations.
///
/// Every count includes the deeper stages, so the fields never increase
/// from `postseason` down to `championships`. `play_in` is counted on its
/// own: a top-six seed never plays in it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoundTally {
    pub play_in: u64,
    pub postseason: u64,
    pub first_round: u64,
    pub conference_semifinals: u64,
    pub conference_finals: u64,
    pub finals: u64,
    pub championships: u64,
}

impl TeamRoundTally {
    /// Count one bracket in which the team got as far as `furthest`.
    pub fn record(&mut self, furthest: Round, played_in: bool) {
        self.postseason += 1;
        if played_in {
            self.play_in += 1;
        }
        if furthest >= Round::FirstRound {
            self.first_round += 1;
        }
        if furthest >= Round::ConferenceSemifinals {
            self.conference_semifinals += 1;
        }
        if furthest >= Round::ConferenceFinals {
            self.conference_finals += 1;
        }
        if furthest >= Round::Finals {
            self.finals += 1;
        }
        if furthest >= Round::Championship {
            self.championships += 1;
        }
    }

    pub fn merge(&mut self, other: &TeamRoundTally) {
        self.play_in += other.play_in;
        self.postseason += other.postseason;
        self.first_round += other.first_round;
        self.conference_semifinals += other.conference_semifinals;
        self.conference_finals += other.conference_finals;
        self.finals += other.finals;
        self.championships += other.championships;
    }

    pub fn probabilities(&self, simulations: u64) -> RoundProbabilities {
        if simulations == 0 {
            return RoundProbabilities::default();
        }
        let n = simulations as f64;
        RoundProbabilities {
            play_in: self.play_in as f64 / n,
            postseason: self.postseason as f64 / n,
            make_playoffs: self.first_round as f64 / n,
            conference_semifinals: self.conference_semifinals as f64 / n,
            conference_finals: self.conference_finals as f64 / n,
            finals: self.finals as f64 / n,
            championship: self.championships as f64 / n,
        }
    }
}

/// Share of simulations in which a team reached each stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundProbabilities {
    pub play_in: f64,

    /// Reached the play-in or the first round
    pub postseason: f64,

    /// Reached the first round (top eight after the play-in)
    pub make_playoffs: f64,

    pub conference_semifinals: f64,
    pub conference_finals: f64,
    pub finals: f64,
    pub championship: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamOdds {
    pub team_id: TeamId,
    pub name: String,
    pub abbreviation: String,
    pub conference: Conference,

    /// Seed in the supplied standings; `None` when seeding was simulated
    pub rank: Option<u32>,

    pub probabilities: RoundProbabilities,
    pub tally: TeamRoundTally,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConferenceOdds {
    pub team_id: TeamId,
    pub name: String,
    pub abbreviation: String,
    pub rank: Option<u32>,
    pub conference_championship_probability: f64,
    pub playoff_probability: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChampionPick {
    pub team_id: TeamId,
    pub name: String,
    pub probability: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalsPick {
    pub eastern: TeamId,
    pub western: TeamId,
    pub probability: f64,
}

/// Aggregated postseason odds for the whole league.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChampionshipOdds {
    pub simulations_run: u64,

    /// Every team, most likely champion first
    pub championship_odds: Vec<TeamOdds>,

    pub conference_odds: PerConference<Vec<ConferenceOdds>>,
    pub most_likely_champion: Option<ChampionPick>,
    pub most_likely_finals: Option<FinalsPick>,

    /// Championship probability held by each conference
    pub conference_share: PerConference<f64>,
}

impl ChampionshipOdds {
    /// Placeholder result when nothing was simulated.
    pub fn empty() -> Self {
        ChampionshipOdds {
            simulations_run: 0,
            championship_odds: Vec::new(),
            conference_odds: PerConference::default(),
            most_likely_champion: None,
            most_likely_finals: None,
            conference_share: PerConference::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.simulations_run == 0
    }

    pub fn team(&self, team: TeamId) -> Option<&TeamOdds> {
        self.championship_odds.iter().find(|t| t.team_id == team)
    }
}

/// Where each simulated bracket gets its seeds from.
#[derive(Clone, Copy, Debug)]
pub enum SeedingSource<'a> {
    /// Every bracket uses the same standings
    Fixed(&'a LeagueStandings),

    /// Every bracket follows a freshly simulated regular season
    Simulated(&'a [Team]),
}

impl SeedingSource<'_> {
    /// (team, seed in the supplied standings)
    fn teams(&self) -> Vec<(Team, Option<u32>)> {
        match self {
            SeedingSource::Fixed(standings) => standings
                .entries()
                .map(|e| (e.team.clone(), Some(e.rank)))
                .collect(),
            SeedingSource::Simulated(teams) => teams.iter().map(|t| (t.clone(), None)).collect(),
        }
    }
}

/// Running totals for one worker.
#[derive(Debug, Default)]
struct Totals {
    teams: HashMap<TeamId, TeamRoundTally>,
    finals: HashMap<(TeamId, TeamId), u64>,
}

impl Totals {
    fn add(mut self, bracket: &Bracket) -> Self {
        let played_in: BTreeSet<TeamId> = bracket.play_in_participants().collect();
        for (&team, &round) in &bracket.furthest_round {
            self.teams
                .entry(team)
                .or_default()
                .record(round, played_in.contains(&team));
        }
        if let Some(pair) = bracket.finalists() {
            *self.finals.entry(pair).or_default() += 1;
        }
        self
    }

    fn merge(mut self, other: Totals) -> Self {
        for (team, tally) in other.teams {
            self.teams.entry(team).or_default().merge(&tally);
        }
        for (pair, count) in other.finals {
            *self.finals.entry(pair).or_default() += count;
        }
        self
    }
}

/// Monte Carlo championship odds over many full postseasons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChampionshipAggregator {
    builder: BracketBuilder,
    season: SeasonSimulator,
    max_simulations: usize,
}

impl Default for ChampionshipAggregator {
    fn default() -> Self {
        ChampionshipAggregator::new(SeriesSimulator::default(), SeasonSimulator::default(), MAX_SIMULATIONS)
    }
}

impl ChampionshipAggregator {
    /// Series are played out once per bracket, so upsets happen at their
    /// real rate.
    pub fn new(series: SeriesSimulator, season: SeasonSimulator, max_simulations: usize) -> Self {
        ChampionshipAggregator {
            builder: BracketBuilder::new(series, AdvancementRule::Sampled),
            season,
            max_simulations,
        }
    }

    pub fn max_simulations(&self) -> usize {
        self.max_simulations
    }

    pub fn calculate_odds_seeded<O>(
        &self,
        oracle: &O,
        source: SeedingSource<'_>,
        simulation_count: usize,
        seed: Option<u64>,
    ) -> Result<ChampionshipOdds>
    where
        O: RatingOracle + Sync + ?Sized,
    {
        let mut rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        self.calculate_odds(oracle, source, simulation_count, &mut rng)
    }

    /// Simulate `simulation_count` postseasons and tally how far each team got.
    pub fn calculate_odds<O, R>(
        &self,
        oracle: &O,
        source: SeedingSource<'_>,
        simulation_count: usize,
        rng: &mut R,
    ) -> Result<ChampionshipOdds>
    where
        O: RatingOracle + Sync + ?Sized,
        R: Rng,
    {
        validate_simulation_count(simulation_count, self.max_simulations)?;

        let teams = source.teams();
        if teams.is_empty() {
            debug!("no teams to simulate");
            return Ok(ChampionshipOdds::empty());
        }

        let start = Instant::now();
        let seeds: Vec<u64> = (0..simulation_count).map(|_| rng.gen()).collect();
        let totals = seeds
            .par_iter()
            .fold(Totals::default, |acc, &seed| {
                let mut sim_rng = ChaCha8Rng::seed_from_u64(seed);
                let bracket = match source {
                    SeedingSource::Fixed(standings) => self.builder.build(oracle, standings, &mut sim_rng),
                    SeedingSource::Simulated(league) => {
                        let standings = self.season.sample_league(oracle, league, &mut sim_rng);
                        self.builder.build(oracle, &standings, &mut sim_rng)
                    }
                };
                acc.add(&bracket)
            })
            .reduce(Totals::default, Totals::merge);

        let odds = summarize(teams, totals, simulation_count as u64);
        info!(
            simulations = simulation_count,
            teams = odds.championship_odds.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "championship odds calculated"
        );
        Ok(odds)
    }
}

fn summarize(teams: Vec<(Team, Option<u32>)>, totals: Totals, simulations: u64) -> ChampionshipOdds {
    let mut championship_odds: Vec<TeamOdds> = teams
        .into_iter()
        .map(|(team, rank)| {
            let tally = totals.teams.get(&team.id).copied().unwrap_or_default();
            TeamOdds {
                team_id: team.id,
                name: team.name,
                abbreviation: team.abbreviation,
                conference: team.conference,
                rank,
                probabilities: tally.probabilities(simulations),
                tally,
            }
        })
        .collect();
    championship_odds.sort_by(|a, b| {
        b.tally
            .championships
            .cmp(&a.tally.championships)
            .then(a.team_id.cmp(&b.team_id))
    });

    let conference_odds = PerConference::from_fn(|conference| {
        let mut odds: Vec<ConferenceOdds> = championship_odds
            .iter()
            .filter(|t| t.conference == conference)
            .map(|t| ConferenceOdds {
                team_id: t.team_id,
                name: t.name.clone(),
                abbreviation: t.abbreviation.clone(),
                rank: t.rank,
                // Conference champions are exactly the teams that reach the finals
                conference_championship_probability: t.probabilities.finals,
                playoff_probability: t.probabilities.make_playoffs,
            })
            .collect();
        odds.sort_by(|a, b| {
            b.conference_championship_probability
                .total_cmp(&a.conference_championship_probability)
                .then(a.team_id.cmp(&b.team_id))
        });
        odds
    });

    let conference_share: PerConference<f64> = PerConference::from_fn(|conference| {
        championship_odds
            .iter()
            .filter(|t| t.conference == conference)
            .map(|t| t.probabilities.championship)
            .sum()
    });

    let most_likely_champion = championship_odds
        .first()
        .filter(|t| t.tally.championships > 0)
        .map(|t| ChampionPick {
            team_id: t.team_id,
            name: t.name.clone(),
            probability: t.probabilities.championship,
        });

    let most_likely_finals = totals
        .finals
        .iter()
        .max_by(|(pa, ca), (pb, cb)| ca.cmp(cb).then(pb.cmp(pa)))
        .map(|(&(eastern, western), &count)| FinalsPick {
            eastern,
            western,
            probability: count as f64 / simulations as f64,
        });

    ChampionshipOdds {
        simulations_run: simulations,
        championship_odds,
        conference_odds,
        most_likely_champion,
        most_likely_finals,
        conference_share,
    }
}
