use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::constants::{AUTO_QUALIFIERS, PLAYOFF_FIELD, PLAY_IN_TEAMS};
use crate::play_in::{resolve_play_in, PlayInOutcome};
use crate::season::{LeagueStandings, SeedEntry};
use crate::series::{SeriesOutcome, SeriesSimulator};
use crate::team::{Conference, SeededTeam, TeamId};
use crate::win_prob::RatingOracle;

/// Postseason stages in the order a team passes through them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Round {
    PlayIn,
    FirstRound,
    ConferenceSemifinals,
    ConferenceFinals,
    Finals,
    Championship,
}

impl Round {
    pub const ALL: [Round; 6] = [
        Round::PlayIn,
        Round::FirstRound,
        Round::ConferenceSemifinals,
        Round::ConferenceFinals,
        Round::Finals,
        Round::Championship,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Round::PlayIn => "play_in",
            Round::FirstRound => "first_round",
            Round::ConferenceSemifinals => "conference_semifinals",
            Round::ConferenceFinals => "conference_finals",
            Round::Finals => "finals",
            Round::Championship => "championship",
        }
    }
}

/// How a series winner is chosen when building a bracket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvancementRule {
    /// Estimate each series and advance the predicted winner
    #[default]
    Favorite,

    /// Play each series once and advance whoever won it
    Sampled,
}

/// One playoff series, higher seed first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub round: Round,
    pub higher_seed: SeededTeam,
    pub lower_seed: SeededTeam,
    pub outcome: SeriesOutcome,
}

impl Matchup {
    pub fn winner(&self) -> SeededTeam {
        if self.outcome.winner == self.higher_seed.team {
            self.higher_seed
        } else {
            self.lower_seed
        }
    }

    pub fn is_upset(&self) -> bool {
        self.outcome.winner == self.lower_seed.team && self.lower_seed.seed > self.higher_seed.seed
    }
}

/// Postseason of one conference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConferenceBracket {
    pub conference: Conference,
    pub play_in: Option<PlayInOutcome>,

    /// First-round field after the play-in, in seed order
    pub field: Vec<SeededTeam>,

    pub first_round: Vec<Matchup>,
    pub semifinals: Vec<Matchup>,
    pub finals: Option<Matchup>,
    pub champion: Option<SeededTeam>,
}

impl ConferenceBracket {
    fn empty(conference: Conference) -> Self {
        ConferenceBracket {
            conference,
            play_in: None,
            field: Vec::new(),
            first_round: Vec::new(),
            semifinals: Vec::new(),
            finals: None,
            champion: None,
        }
    }

    pub fn matchups(&self) -> impl Iterator<Item = &Matchup> {
        self.first_round
            .iter()
            .chain(self.semifinals.iter())
            .chain(self.finals.iter())
    }
}

/// A full simulated postseason.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub eastern: ConferenceBracket,
    pub western: ConferenceBracket,
    pub finals: Option<Matchup>,
    pub champion: Option<TeamId>,

    /// Deepest stage reached by every postseason team
    pub furthest_round: BTreeMap<TeamId, Round>,
}

impl Bracket {
    pub fn conference(&self, conference: Conference) -> &ConferenceBracket {
        match conference {
            Conference::Eastern => &self.eastern,
            Conference::Western => &self.western,
        }
    }

    pub fn furthest_round(&self, team: TeamId) -> Option<Round> {
        self.furthest_round.get(&team).copied()
    }

    /// Teams that played in either play-in
    pub fn play_in_participants(&self) -> impl Iterator<Item = TeamId> + '_ {
        [&self.eastern, &self.western]
            .into_iter()
            .filter_map(|c| c.play_in.as_ref())
            .flat_map(|p| p.participants.iter().map(|s| s.team))
    }

    /// (eastern, western) champions when a final was played
    pub fn finalists(&self) -> Option<(TeamId, TeamId)> {
        self.finals.as_ref()?;
        Some((self.eastern.champion?.team, self.western.champion?.team))
    }

    pub fn matchups(&self) -> impl Iterator<Item = &Matchup> {
        self.eastern
            .matchups()
            .chain(self.western.matchups())
            .chain(self.finals.iter())
    }
}

fn reach(furthest: &mut BTreeMap<TeamId, Round>, team: TeamId, round: Round) {
    let entry = furthest.entry(team).or_insert(round);
    if round > *entry {
        *entry = round;
    }
}

/// Builds a bracket from standings, round by round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BracketBuilder {
    series: SeriesSimulator,
    rule: AdvancementRule,
}

impl BracketBuilder {
    pub fn new(series: SeriesSimulator, rule: AdvancementRule) -> Self {
        BracketBuilder { series, rule }
    }

    pub fn rule(&self) -> AdvancementRule {
        self.rule
    }

    pub fn series(&self) -> &SeriesSimulator {
        &self.series
    }

    /// Build one bracket with a fresh generator.
    pub fn build_seeded<O>(&self, oracle: &O, standings: &LeagueStandings, seed: Option<u64>) -> Bracket
    where
        O: RatingOracle + ?Sized,
    {
        let mut rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        self.build(oracle, standings, &mut rng)
    }

    /// Play out both conferences and the finals.
    ///
    /// Rounds are strictly sequential. A round without enough entrants is
    /// skipped and the best remaining seeds move up; a conference with no
    /// teams sends nobody to the finals.
    pub fn build<O, R>(&self, oracle: &O, standings: &LeagueStandings, rng: &mut R) -> Bracket
    where
        O: RatingOracle + ?Sized,
        R: Rng,
    {
        let mut furthest = BTreeMap::new();
        let eastern = self.build_conference(
            oracle,
            Conference::Eastern,
            standings.conference(Conference::Eastern),
            &mut furthest,
            rng,
        );
        let western = self.build_conference(
            oracle,
            Conference::Western,
            standings.conference(Conference::Western),
            &mut furthest,
            rng,
        );

        let (finals, champion) = match (eastern.champion, western.champion) {
            (Some(east), Some(west)) => {
                reach(&mut furthest, east.team, Round::Finals);
                reach(&mut furthest, west.team, Round::Finals);
                let matchup = self.resolve(oracle, Round::Finals, east, west, rng);
                let champion = matchup.winner().team;
                (Some(matchup), Some(champion))
            }
            (Some(only), None) | (None, Some(only)) => {
                debug!(team = only.team, "one conference is empty, finals not played");
                (None, Some(only.team))
            }
            (None, None) => (None, None),
        };

        if let Some(team) = champion {
            reach(&mut furthest, team, Round::Championship);
        }

        Bracket {
            eastern,
            western,
            finals,
            champion,
            furthest_round: furthest,
        }
    }

    fn build_conference<O, R>(
        &self,
        oracle: &O,
        conference: Conference,
        entries: &[SeedEntry],
        furthest: &mut BTreeMap<TeamId, Round>,
        rng: &mut R,
    ) -> ConferenceBracket
    where
        O: RatingOracle + ?Sized,
        R: Rng,
    {
        let seeded: Vec<SeededTeam> = entries.iter().map(SeedEntry::seeded).collect();
        let mut bracket = ConferenceBracket::empty(conference);

        let field = if seeded.len() >= AUTO_QUALIFIERS + PLAY_IN_TEAMS {
            let play_in = resolve_play_in(
                oracle,
                &seeded[AUTO_QUALIFIERS..AUTO_QUALIFIERS + PLAY_IN_TEAMS],
                rng,
            );
            for p in &play_in.participants {
                reach(furthest, p.team, Round::PlayIn);
            }
            let mut field = seeded[..AUTO_QUALIFIERS].to_vec();
            field.extend(play_in.qualifiers());
            bracket.play_in = Some(play_in);
            field
        } else {
            debug!(%conference, teams = seeded.len(), "no play-in, seeding straight from standings");
            seeded.iter().take(PLAYOFF_FIELD).copied().collect()
        };
        for t in &field {
            reach(furthest, t.team, Round::FirstRound);
        }

        // 1v8, 2v7, 3v6, 4v5; winners keep their slot
        let mut alive: Vec<SeededTeam> = if field.len() >= PLAYOFF_FIELD {
            bracket.first_round = (0..PLAYOFF_FIELD / 2)
                .map(|i| self.resolve(oracle, Round::FirstRound, field[i], field[PLAYOFF_FIELD - 1 - i], rng))
                .collect();
            bracket.first_round.iter().map(Matchup::winner).collect()
        } else {
            debug!(%conference, teams = field.len(), "first round skipped");
            field.iter().take(PLAYOFF_FIELD / 2).copied().collect()
        };
        bracket.field = field;
        for t in &alive {
            reach(furthest, t.team, Round::ConferenceSemifinals);
        }

        // Slot 1v8 meets slot 4v5, slot 2v7 meets slot 3v6
        let alive: Vec<SeededTeam> = if alive.len() >= 4 {
            bracket.semifinals = [(0, 3), (1, 2)]
                .iter()
                .map(|&(i, j)| self.resolve(oracle, Round::ConferenceSemifinals, alive[i], alive[j], rng))
                .collect();
            bracket.semifinals.iter().map(Matchup::winner).collect()
        } else {
            debug!(%conference, teams = alive.len(), "conference semifinals skipped");
            alive.truncate(2);
            alive
        };
        for t in &alive {
            reach(furthest, t.team, Round::ConferenceFinals);
        }

        bracket.champion = if alive.len() >= 2 {
            let matchup = self.resolve(oracle, Round::ConferenceFinals, alive[0], alive[1], rng);
            let winner = matchup.winner();
            bracket.finals = Some(matchup);
            Some(winner)
        } else {
            alive.first().copied()
        };

        bracket
    }

    fn resolve<O, R>(&self, oracle: &O, round: Round, a: SeededTeam, b: SeededTeam, rng: &mut R) -> Matchup
    where
        O: RatingOracle + ?Sized,
        R: Rng,
    {
        // Ties on seed (the finals) keep the eastern team first
        let (higher, lower) = if b.seed < a.seed { (b, a) } else { (a, b) };
        let outcome = match self.rule {
            AdvancementRule::Favorite => self.series.simulate(oracle, higher.team, lower.team, rng),
            AdvancementRule::Sampled => self.series.play(oracle, higher.team, lower.team, rng),
        };

        Matchup {
            round,
            higher_seed: higher,
            lower_seed: lower,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{equal_league, graded_league, league, standings_in_order};
    use crate::win_prob::RatingSnapshot;

    fn favorite_builder() -> BracketBuilder {
        BracketBuilder::new(SeriesSimulator::new(7, 2000).unwrap(), AdvancementRule::Favorite)
    }

    fn sampled_builder() -> BracketBuilder {
        BracketBuilder::new(SeriesSimulator::default(), AdvancementRule::Sampled)
    }

    #[test]
    fn test_full_bracket_shape() {
        let teams = equal_league(15);
        let oracle = RatingSnapshot::from_teams(&teams);
        let standings = standings_in_order(&teams);

        let bracket = sampled_builder().build_seeded(&oracle, &standings, Some(1));

        for conference in Conference::ALL {
            let side = bracket.conference(conference);
            assert_eq!(side.play_in.as_ref().unwrap().participants.len(), 4);
            assert_eq!(side.field.len(), 8);
            assert_eq!(side.first_round.len(), 4);
            assert_eq!(side.semifinals.len(), 2);
            assert!(side.finals.is_some());
            assert!(side.champion.is_some());

            let seeds: Vec<(u32, u32)> = side
                .first_round
                .iter()
                .map(|m| (m.higher_seed.seed, m.lower_seed.seed))
                .collect();
            assert_eq!(seeds, vec![(1, 8), (2, 7), (3, 6), (4, 5)]);
        }

        assert!(bracket.finals.is_some());
        let champion = bracket.champion.unwrap();
        assert_eq!(bracket.furthest_round(champion), Some(Round::Championship));
        // 10 postseason teams per conference
        assert_eq!(bracket.furthest_round.len(), 20);
        assert_eq!(bracket.play_in_participants().count(), 8);
        assert_eq!(bracket.matchups().count(), 15);
    }

    #[test]
    fn test_rounds_follow_winners() {
        let teams = equal_league(15);
        let oracle = RatingSnapshot::from_teams(&teams);
        let bracket = sampled_builder().build_seeded(&oracle, &standings_in_order(&teams), Some(5));

        for side in [&bracket.eastern, &bracket.western] {
            let winners: Vec<SeededTeam> = side.first_round.iter().map(Matchup::winner).collect();
            let semis = &side.semifinals;
            assert_eq!(semis[0].higher_seed.seed, winners[0].seed.min(winners[3].seed));
            let semi_teams: Vec<TeamId> = semis
                .iter()
                .flat_map(|m| [m.higher_seed.team, m.lower_seed.team])
                .collect();
            for w in &winners {
                assert!(semi_teams.contains(&w.team));
            }
            let finals = side.finals.as_ref().unwrap();
            assert!(semis.iter().any(|m| m.winner().team == finals.higher_seed.team));
            assert!(semis.iter().any(|m| m.winner().team == finals.lower_seed.team));
            assert_eq!(side.champion.unwrap(), finals.winner());
        }

        let (east, west) = bracket.finalists().unwrap();
        assert_eq!(east, bracket.eastern.champion.unwrap().team);
        assert_eq!(west, bracket.western.champion.unwrap().team);
    }

    #[test]
    fn test_deterministic_with_seed() {
        let teams = equal_league(15);
        let oracle = RatingSnapshot::from_teams(&teams);
        let standings = standings_in_order(&teams);

        for builder in [favorite_builder(), sampled_builder()] {
            let a = builder.build_seeded(&oracle, &standings, Some(42));
            let b = builder.build_seeded(&oracle, &standings, Some(42));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_favorites_advance() {
        let teams = graded_league(15);
        let oracle = RatingSnapshot::from_teams(&teams);
        let bracket = favorite_builder().build_seeded(&oracle, &standings_in_order(&teams), Some(7));

        // 40 points a seed: every predicted series goes to the better seed
        for side in [&bracket.eastern, &bracket.western] {
            for m in side.matchups() {
                assert!(!m.is_upset(), "{:?}", m);
            }
            assert_eq!(side.champion.unwrap().seed, 1);
        }
        assert_eq!(bracket.champion, Some(1));
    }

    #[test]
    fn test_round_monotone() {
        let teams = equal_league(15);
        let oracle = RatingSnapshot::from_teams(&teams);
        let standings = standings_in_order(&teams);
        let builder = sampled_builder();

        for seed in 0..20 {
            let bracket = builder.build_seeded(&oracle, &standings, Some(seed));
            let count = |round: Round| bracket.furthest_round.values().filter(|&&r| r >= round).count();
            assert_eq!(count(Round::PlayIn), 20);
            assert_eq!(count(Round::FirstRound), 16);
            assert_eq!(count(Round::ConferenceSemifinals), 8);
            assert_eq!(count(Round::ConferenceFinals), 4);
            assert_eq!(count(Round::Finals), 2);
            assert_eq!(count(Round::Championship), 1);
        }
    }

    #[test]
    fn test_short_conference_skips_rounds() {
        // Five teams: no play-in, no first round, seeds 1-4 go to the semifinals
        let teams = league(5, |_, i| 1500.0 - i as f64);
        let oracle = RatingSnapshot::from_teams(&teams);
        let bracket = sampled_builder().build_seeded(&oracle, &standings_in_order(&teams), Some(3));

        let east = &bracket.eastern;
        assert!(east.play_in.is_none());
        assert_eq!(east.field.len(), 5);
        assert!(east.first_round.is_empty());
        let pairs: Vec<(u32, u32)> = east
            .semifinals
            .iter()
            .map(|m| (m.higher_seed.seed, m.lower_seed.seed))
            .collect();
        assert_eq!(pairs, vec![(1, 4), (2, 3)]);
        assert!(bracket.champion.is_some());
        assert_eq!(bracket.furthest_round(5), Some(Round::FirstRound));
    }

    #[test]
    fn test_nine_teams_use_standings_for_last_seeds() {
        let teams = league(9, |_, _| 1500.0);
        let oracle = RatingSnapshot::from_teams(&teams);
        let bracket = sampled_builder().build_seeded(&oracle, &standings_in_order(&teams), Some(4));

        let east = &bracket.eastern;
        assert!(east.play_in.is_none());
        let seeds: Vec<u32> = east.field.iter().map(|s| s.seed).collect();
        assert_eq!(seeds, (1..=8).collect::<Vec<_>>());
        assert_eq!(east.first_round.len(), 4);
        assert_eq!(bracket.furthest_round(9), None);
    }

    #[test]
    fn test_empty_conference_sends_lone_champion() {
        let teams: Vec<_> = equal_league(15)
            .into_iter()
            .filter(|t| t.conference == Conference::Eastern)
            .collect();
        let oracle = RatingSnapshot::from_teams(&teams);
        let bracket = sampled_builder().build_seeded(&oracle, &standings_in_order(&teams), Some(8));

        assert!(bracket.western.champion.is_none());
        assert!(bracket.finals.is_none());
        assert!(bracket.finalists().is_none());
        assert_eq!(bracket.champion, bracket.eastern.champion.map(|s| s.team));
    }

    #[test]
    fn test_single_team_and_empty_league() {
        let teams = league(1, |_, _| 1500.0);
        let oracle = RatingSnapshot::from_teams(&teams);
        let bracket = sampled_builder().build_seeded(&oracle, &standings_in_order(&teams), Some(2));
        assert_eq!(bracket.eastern.champion.map(|s| s.team), Some(1));
        assert_eq!(bracket.western.champion.map(|s| s.team), Some(101));
        assert!(bracket.finals.is_some());

        let empty = sampled_builder().build_seeded(&oracle, &LeagueStandings::default(), Some(2));
        assert!(empty.champion.is_none());
        assert!(empty.furthest_round.is_empty());
    }
}
