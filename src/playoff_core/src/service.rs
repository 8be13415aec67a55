//! Host-facing operations with result caching.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::bracket::{AdvancementRule, Bracket, BracketBuilder};
use crate::cache::{CacheKey, ResultCache, CHAMPIONSHIP_ODDS, CONFERENCE_STANDINGS, PLAYOFF_BRACKET};
use crate::championship::{ChampionshipOdds, SeedingSource};
use crate::config::SimulationConfig;
use crate::error::{validate_sample_count, validate_simulation_count, CacheError, Result};
use crate::season::LeagueStandings;
use crate::team::{PerConference, Team, TeamId};
use crate::win_prob::{RatingProvider, RatingSnapshot};

/// Standings, bracket and odds for one league.
///
/// Ratings are pulled from the provider once per computed operation and
/// frozen for its duration.
pub struct PlayoffService<P, C> {
    teams: Vec<Team>,
    provider: P,
    cache: C,
    config: SimulationConfig,
}

impl<P: RatingProvider, C: ResultCache> PlayoffService<P, C> {
    pub fn new(teams: Vec<Team>, provider: P, cache: C, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(PlayoffService {
            teams,
            provider,
            cache,
            config,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    /// Projected standings for both conferences.
    pub fn simulate_standings(&self, sample_count: Option<usize>) -> Result<LeagueStandings> {
        let samples = sample_count.unwrap_or(self.config.season_samples);
        validate_sample_count("sample_count", samples)?;
        let params = json!({ "samples": samples, "seed": self.config.seed });

        self.cached(CONFERENCE_STANDINGS, &params, self.config.cache.standings(), || {
            let oracle = self.ratings()?;
            let season = self.config.season_simulator()?;
            season.simulate_league(&oracle, &self.teams, samples, &mut self.rng())
        })
    }

    /// The predicted bracket: every series goes to the projected winner.
    ///
    /// Without standings the default projection is simulated (or served
    /// from cache) first.
    pub fn build_bracket(&self, standings: Option<&LeagueStandings>) -> Result<Bracket> {
        let projected;
        let standings = match standings {
            Some(s) => s,
            None => {
                projected = self.simulate_standings(None)?;
                &projected
            }
        };
        let params = json!({ "seeding": seeding(standings), "seed": self.config.seed });

        self.cached(PLAYOFF_BRACKET, &params, self.config.cache.bracket(), || {
            let oracle = self.ratings()?;
            let builder = BracketBuilder::new(self.config.series_simulator()?, AdvancementRule::Favorite);
            Ok(builder.build(&oracle, standings, &mut self.rng()))
        })
    }

    /// Championship odds over `simulation_count` postseasons.
    ///
    /// With standings every postseason is seeded from them; without, each
    /// one follows its own simulated regular season.
    pub fn calculate_odds(
        &self,
        standings: Option<&LeagueStandings>,
        simulation_count: Option<usize>,
    ) -> Result<ChampionshipOdds> {
        let count = simulation_count.unwrap_or(self.config.simulation_count);
        validate_simulation_count(count, self.config.max_simulations)?;
        let params = json!({
            "simulations": count,
            "seeding": standings.map(seeding),
            "seed": self.config.seed,
        });

        self.cached(CHAMPIONSHIP_ODDS, &params, self.config.cache.odds(), || {
            let oracle = self.ratings()?;
            let source = match standings {
                Some(s) => SeedingSource::Fixed(s),
                None => SeedingSource::Simulated(&self.teams),
            };
            self.config
                .aggregator()?
                .calculate_odds(&oracle, source, count, &mut self.rng())
        })
    }

    /// Drop cached results of one operation, or all of them.
    pub fn invalidate(&self, operation: Option<&str>) -> usize {
        match self.cache.invalidate(operation) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "cache invalidation failed");
                0
            }
        }
    }

    fn ratings(&self) -> Result<RatingSnapshot> {
        let snapshot = self.provider.snapshot()?;
        debug!(ratings = snapshot.len(), teams = self.teams.len(), "rating snapshot taken");
        Ok(snapshot)
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.config.seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Serve from cache when possible, otherwise compute and store.
    /// Cache trouble is logged and otherwise ignored.
    fn cached<T, F>(&self, operation: &'static str, params: &serde_json::Value, ttl: Duration, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let key = match CacheKey::new(operation, params) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(operation, error = %e, "could not build cache key");
                None
            }
        };

        if let Some(key) = &key {
            match self.cache.fetch(key) {
                Ok(Some(value)) => match serde_json::from_value::<T>(value) {
                    Ok(hit) => {
                        debug!(operation, "serving cached result");
                        return Ok(hit);
                    }
                    Err(e) => warn!(operation, error = %e, "discarding unreadable cache entry"),
                },
                Ok(None) => {}
                Err(e) => warn!(operation, error = %e, "cache fetch failed, computing without cache"),
            }
        }

        let start = Instant::now();
        let result = compute()?;
        info!(
            operation,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "computed"
        );

        if let Some(key) = &key {
            let stored = serde_json::to_value(&result)
                .map_err(CacheError::from)
                .and_then(|value| self.cache.store(key, value, ttl));
            if let Err(e) = stored {
                warn!(operation, error = %e, "could not cache result");
            }
        }

        Ok(result)
    }
}

/// Team order per conference, which is all a bracket depends on
fn seeding(standings: &LeagueStandings) -> PerConference<Vec<TeamId>> {
    PerConference::from_fn(|c| standings.conference(c).iter().map(|e| e.team_id()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, NoCache};
    use crate::error::PlayoffError;
    use crate::fixtures::{graded_league, standings_in_order};
    use crate::team::Conference;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often ratings were requested
    struct CountingProvider {
        snapshot: RatingSnapshot,
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new(teams: &[Team]) -> Self {
            CountingProvider {
                snapshot: RatingSnapshot::from_teams(teams),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RatingProvider for &CountingProvider {
        fn snapshot(&self) -> Result<RatingSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.snapshot.clone())
        }
    }

    struct OfflineProvider;

    impl RatingProvider for OfflineProvider {
        fn snapshot(&self) -> Result<RatingSnapshot> {
            Err(PlayoffError::UpstreamUnavailable("model service timed out".to_string()))
        }
    }

    struct BrokenCache;

    impl ResultCache for BrokenCache {
        fn fetch(&self, _key: &CacheKey) -> std::result::Result<Option<Value>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        fn store(&self, _key: &CacheKey, _value: Value, _ttl: Duration) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        fn invalidate(&self, _operation: Option<&str>) -> std::result::Result<usize, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            season_samples: 100,
            series_samples: 200,
            simulation_count: 200,
            seed: Some(42),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_standings_cached() {
        let teams = graded_league(15);
        let provider = CountingProvider::new(&teams);
        let service = PlayoffService::new(teams, &provider, MemoryCache::new(), config()).unwrap();

        let first = service.simulate_standings(None).unwrap();
        let second = service.simulate_standings(None).unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
        assert_eq!(first.conference(Conference::Eastern).len(), 15);
        assert_eq!(first.conference(Conference::Eastern)[0].team_id(), 1);

        // A different sample count is a different entry
        service.simulate_standings(Some(50)).unwrap();
        assert_eq!(provider.calls(), 2);

        assert_eq!(service.invalidate(Some(CONFERENCE_STANDINGS)), 2);
        service.simulate_standings(None).unwrap();
        assert_eq!(provider.calls(), 3);
    }

    #[test]
    fn test_bracket_and_odds_roundtrip_through_cache() {
        let teams = graded_league(15);
        let standings = standings_in_order(&teams);
        let provider = CountingProvider::new(&teams);
        let service = PlayoffService::new(teams, &provider, MemoryCache::new(), config()).unwrap();

        let bracket = service.build_bracket(Some(&standings)).unwrap();
        assert_eq!(service.build_bracket(Some(&standings)).unwrap(), bracket);
        assert!(bracket.champion.is_some());

        let odds = service.calculate_odds(Some(&standings), None).unwrap();
        assert_eq!(service.calculate_odds(Some(&standings), None).unwrap(), odds);
        assert_eq!(odds.simulations_run, 200);
        assert_eq!(provider.calls(), 2);

        let stats = service.cache().stats();
        assert_eq!(stats.operations[PLAYOFF_BRACKET].count, 1);
        assert_eq!(stats.operations[CHAMPIONSHIP_ODDS].count, 1);
    }

    #[test]
    fn test_bracket_without_standings_projects_first() {
        let teams = graded_league(15);
        let provider = CountingProvider::new(&teams);
        let service = PlayoffService::new(teams, &provider, MemoryCache::new(), config()).unwrap();

        let bracket = service.build_bracket(None).unwrap();
        assert!(bracket.champion.is_some());
        assert_eq!(service.cache().stats().operations[CONFERENCE_STANDINGS].count, 1);
    }

    #[test]
    fn test_odds_without_standings() {
        let teams = graded_league(15);
        let service = PlayoffService::new(teams, RatingSnapshot::new(), NoCache, config()).unwrap();

        // No ratings on file: everyone is league average
        let odds = service.calculate_odds(None, Some(300)).unwrap();
        assert_eq!(odds.simulations_run, 300);
        assert_eq!(odds.championship_odds.len(), 30);
        assert!(odds.championship_odds.iter().all(|t| t.rank.is_none()));
    }

    #[test]
    fn test_invalid_parameters_rejected_before_work() {
        let teams = graded_league(15);
        let service = PlayoffService::new(teams, OfflineProvider, NoCache, config()).unwrap();

        assert!(service.simulate_standings(Some(0)).unwrap_err().is_invalid_parameter());
        assert!(service.calculate_odds(None, Some(0)).unwrap_err().is_invalid_parameter());
        assert!(service
            .calculate_odds(None, Some(100_001))
            .unwrap_err()
            .is_invalid_parameter());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = SimulationConfig {
            series_length: 6,
            ..SimulationConfig::default()
        };
        assert!(PlayoffService::new(Vec::new(), RatingSnapshot::new(), NoCache, bad).is_err());
    }

    #[test]
    fn test_oversized_ttl() {
        let mut huge = config();
        huge.cache.standings_secs = u64::MAX;
        let err = PlayoffService::new(graded_league(15), RatingSnapshot::new(), MemoryCache::new(), huge.clone())
            .err()
            .unwrap();
        assert!(err.is_invalid_parameter());

        // Even if such a config gets through, the cache refuses the entry and
        // the result is still returned
        let teams = graded_league(15);
        let service = PlayoffService {
            provider: RatingSnapshot::from_teams(&teams),
            teams,
            cache: MemoryCache::new(),
            config: huge,
        };
        let standings = service.simulate_standings(None).unwrap();
        assert_eq!(standings.len(), 30);
        assert!(service.cache().is_empty());
    }

    #[test]
    fn test_upstream_failure_is_fatal() {
        let teams = graded_league(15);
        let service = PlayoffService::new(teams, OfflineProvider, NoCache, config()).unwrap();

        let err = service.simulate_standings(None).unwrap_err();
        assert!(matches!(err, PlayoffError::UpstreamUnavailable(_)));
        assert!(service.calculate_odds(None, None).is_err());
    }

    #[test]
    fn test_broken_cache_degrades_to_compute() {
        let teams = graded_league(15);
        let standings = standings_in_order(&teams);
        let provider = CountingProvider::new(&teams);
        let service = PlayoffService::new(teams, &provider, BrokenCache, config()).unwrap();

        let first = service.build_bracket(Some(&standings)).unwrap();
        let second = service.build_bracket(Some(&standings)).unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls(), 2);
        assert_eq!(service.invalidate(None), 0);
    }

    #[test]
    fn test_empty_league() {
        let service = PlayoffService::new(Vec::new(), RatingSnapshot::new(), NoCache, config()).unwrap();
        assert!(service.simulate_standings(None).unwrap().is_empty());
        assert!(service.calculate_odds(None, None).unwrap().is_empty());
        assert!(service.build_bracket(None).unwrap().champion.is_none());
    }
}
