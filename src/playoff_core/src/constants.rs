/// Rating used for any team the oracle has no entry for
pub const DEFAULT_RATING: f64 = 1500.0;

/// Elo scale: a gap of this many rating points means 10:1 odds
pub const ELO_SCALE: f64 = 400.0;

/// Regular season length
pub const SEASON_GAMES: u32 = 82;

/// Games against each conference opponent in a simulated season
pub const GAMES_PER_OPPONENT: u32 = 3;

/// Playoff series length (best of seven)
pub const DEFAULT_SERIES_LENGTH: u32 = 7;

/// Longest series a caller may ask for
pub const MAX_SERIES_LENGTH: u32 = 15;

/// Upper bounds on the regular-season shape
pub const MAX_GAMES_PER_OPPONENT: u32 = 16;
pub const MAX_SEASON_GAMES: u32 = 200;

/// Monte Carlo samples behind a single series prediction
pub const DEFAULT_SERIES_SAMPLES: usize = 1000;

/// Season samples behind a standings projection
pub const DEFAULT_SEASON_SAMPLES: usize = 1000;

/// Full-bracket simulations behind championship odds
pub const DEFAULT_SIMULATION_COUNT: usize = 5000;

/// Upper bound on any caller-supplied simulation count
pub const MAX_SIMULATIONS: usize = 100_000;

/// Seeds 1-6 qualify directly
pub const AUTO_QUALIFIERS: usize = 6;

/// Seeds 7-10 play in
pub const PLAY_IN_TEAMS: usize = 4;

/// Teams per conference in the first round
pub const PLAYOFF_FIELD: usize = 8;

/// (minimum win percentage, playoff probability), checked in order
pub const PLAYOFF_PROBABILITY_BUCKETS: [(f64, f64); 5] = [
    (0.600, 0.95),
    (0.550, 0.80),
    (0.500, 0.60),
    (0.450, 0.30),
    (0.400, 0.10),
];

/// Playoff probability below the lowest bucket
pub const PLAYOFF_PROBABILITY_FLOOR: f64 = 0.05;

/// Ratings at or below this map to the minimum championship odds
pub const CHAMPIONSHIP_RATING_FLOOR: f64 = 1400.0;

/// Rating span mapped onto the championship odds range
pub const CHAMPIONSHIP_RATING_SPAN: f64 = 300.0;

pub const CHAMPIONSHIP_ODDS_MIN: f64 = 0.001;
pub const CHAMPIONSHIP_ODDS_MAX: f64 = 0.25;

/// Cache lifetimes in seconds
pub const STANDINGS_TTL_SECS: u64 = 60 * 60;
pub const BRACKET_TTL_SECS: u64 = 2 * 60 * 60;
pub const ODDS_TTL_SECS: u64 = 6 * 60 * 60;

/// No cached result lives longer than a week
pub const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Number of games needed to take a best-of-`series_length` series
pub fn wins_needed(series_length: u32) -> u32 {
    series_length / 2 + 1
}
