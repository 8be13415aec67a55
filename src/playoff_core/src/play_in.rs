use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::PLAY_IN_TEAMS;
use crate::series::{play_game, GameResult};
use crate::team::SeededTeam;
use crate::win_prob::RatingOracle;

/// Seed awarded to the winner of the 7 v 8 game
pub const SEVENTH_SEED: u32 = 7;

/// Seed awarded to the winner of the final play-in game
pub const EIGHTH_SEED: u32 = 8;

/// Result of a conference play-in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayInOutcome {
    /// Teams entering the play-in, in seed order
    pub participants: Vec<SeededTeam>,

    /// 7 v 8, winner takes the 7th seed
    pub seven_eight: Option<GameResult>,

    /// 9 v 10, loser is eliminated
    pub nine_ten: Option<GameResult>,

    /// Loser of 7 v 8 against winner of 9 v 10, winner takes the 8th seed
    pub final_game: Option<GameResult>,

    pub seventh: Option<SeededTeam>,
    pub eighth: Option<SeededTeam>,
}

impl PlayInOutcome {
    /// Teams advancing to the first round, reseeded 7 and 8
    pub fn qualifiers(&self) -> Vec<SeededTeam> {
        self.seventh.into_iter().chain(self.eighth).collect()
    }

    /// Whether any game was played
    pub fn was_played(&self) -> bool {
        self.seven_eight.is_some()
    }
}

/// Resolve the play-in among seeds 7-10.
///
/// Every game is a single game, not a series. With fewer than four entrants
/// no games are played and the top two move on unchanged.
pub fn resolve_play_in<O, R>(oracle: &O, seeds: &[SeededTeam], rng: &mut R) -> PlayInOutcome
where
    O: RatingOracle + ?Sized,
    R: Rng,
{
    if seeds.len() < PLAY_IN_TEAMS {
        return PlayInOutcome {
            participants: seeds.to_vec(),
            seven_eight: None,
            nine_ten: None,
            final_game: None,
            seventh: seeds.first().map(|s| SeededTeam::new(s.team, SEVENTH_SEED)),
            eighth: seeds.get(1).map(|s| SeededTeam::new(s.team, EIGHTH_SEED)),
        };
    }

    let seeds = &seeds[..PLAY_IN_TEAMS];
    let seven_eight = play_game(oracle, seeds[0].team, seeds[1].team, rng);
    let nine_ten = play_game(oracle, seeds[2].team, seeds[3].team, rng);
    let final_game = play_game(oracle, seven_eight.loser(), nine_ten.winner, rng);

    PlayInOutcome {
        participants: seeds.to_vec(),
        seventh: Some(SeededTeam::new(seven_eight.winner, SEVENTH_SEED)),
        eighth: Some(SeededTeam::new(final_game.winner, EIGHTH_SEED)),
        seven_eight: Some(seven_eight),
        nine_ten: Some(nine_ten),
        final_game: Some(final_game),
    }
}
