//! Shared test leagues.

use crate::season::{championship_odds, playoff_probability, LeagueStandings, SeedEntry};
use crate::team::{conference_teams, Conference, PerConference, Team, TeamId};

/// First team id in each conference
pub fn base_id(conference: Conference) -> TeamId {
    match conference {
        Conference::Eastern => 1,
        Conference::Western => 101,
    }
}

/// `per_conference` teams in each conference; `rating` gets the 0-based
/// position within the conference.
pub fn league(per_conference: u32, rating: impl Fn(Conference, u32) -> f64) -> Vec<Team> {
    Conference::ALL
        .iter()
        .flat_map(|&conference| {
            let rating = &rating;
            (0..per_conference).map(move |i| {
                let id = base_id(conference) + i;
                Team::new(
                    id,
                    format!("Team {}", id),
                    format!("T{}", id),
                    conference,
                    rating(conference, i),
                )
            })
        })
        .collect()
}

pub fn equal_league(per_conference: u32) -> Vec<Team> {
    league(per_conference, |_, _| 1500.0)
}

/// Best team first, 40 rating points between neighbours.
pub fn graded_league(per_conference: u32) -> Vec<Team> {
    league(per_conference, |conference, i| {
        let top = if conference == Conference::Eastern { 1800.0 } else { 1780.0 };
        top - 40.0 * i as f64
    })
}

/// Standings that keep each conference in input order.
pub fn standings_in_order(teams: &[Team]) -> LeagueStandings {
    PerConference::from_fn(|conference| {
        conference_teams(teams, conference)
            .into_iter()
            .enumerate()
            .map(|(i, team)| {
                let wins = 65.0 - 3.0 * i as f64;
                SeedEntry {
                    rank: i as u32 + 1,
                    projected_wins: wins,
                    projected_losses: 82.0 - wins,
                    win_percentage: wins / 82.0,
                    playoff_probability: playoff_probability(wins / 82.0),
                    championship_odds: championship_odds(team.rating),
                    team,
                }
            })
            .collect()
    })
    .into()
}
