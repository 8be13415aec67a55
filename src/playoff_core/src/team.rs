#[cfg(feature = "python")]
use pyo3::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

use crate::constants::DEFAULT_RATING;

/// Stable team key (NBA API ids fit in 32 bits)
pub type TeamId = u32;

#[cfg_attr(feature = "python", pyclass(eq, eq_int))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Conference {
    Eastern,
    Western,
}

impl Conference {
    pub const ALL: [Conference; 2] = [Conference::Eastern, Conference::Western];

    pub fn name(&self) -> &'static str {
        match self {
            Conference::Eastern => "Eastern",
            Conference::Western => "Western",
        }
    }

    pub fn other(&self) -> Conference {
        match self {
            Conference::Eastern => Conference::Western,
            Conference::Western => Conference::Eastern,
        }
    }
}

impl fmt::Display for Conference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A team as handed to the core by the host service.
///
/// The rating is an input snapshot; the core never writes it back.
#[cfg_attr(feature = "python", pyclass(get_all, set_all))]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub abbreviation: String,
    pub conference: Conference,

    /// Elo-style strength, 1500 is league average
    pub rating: f64,
}

impl Team {
    pub fn new(
        id: TeamId,
        name: impl Into<String>,
        abbreviation: impl Into<String>,
        conference: Conference,
        rating: f64,
    ) -> Self {
        Team {
            id,
            name: name.into(),
            abbreviation: abbreviation.into(),
            conference,
            rating,
        }
    }

    /// Team with the neutral rating
    pub fn unrated(
        id: TeamId,
        name: impl Into<String>,
        abbreviation: impl Into<String>,
        conference: Conference,
    ) -> Self {
        Team::new(id, name, abbreviation, conference, DEFAULT_RATING)
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl Team {
    #[new]
    #[pyo3(signature = (id, name, abbreviation, conference, rating = DEFAULT_RATING))]
    fn py_new(id: TeamId, name: String, abbreviation: String, conference: Conference, rating: f64) -> Self {
        Team::new(id, name, abbreviation, conference, rating)
    }

    fn __repr__(&self) -> String {
        format!(
            "Team({}, {}, {}, rating={:.1})",
            self.id, self.abbreviation, self.conference, self.rating
        )
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {:.0})", self.abbreviation, self.conference, self.rating)
    }
}

/// A team holding a playoff seed within its conference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeededTeam {
    pub team: TeamId,
    pub seed: u32,
}

impl SeededTeam {
    pub fn new(team: TeamId, seed: u32) -> Self {
        SeededTeam { team, seed }
    }
}

/// Teams of one conference, in input order
pub fn conference_teams(teams: &[Team], conference: Conference) -> Vec<Team> {
    teams
        .iter()
        .filter(|t| t.conference == conference)
        .cloned()
        .collect()
}

/// One value per conference.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerConference<T> {
    pub eastern: T,
    pub western: T,
}

impl<T> PerConference<T> {
    pub fn new(eastern: T, western: T) -> Self {
        PerConference { eastern, western }
    }

    /// Build both sides from the same constructor
    pub fn from_fn(mut f: impl FnMut(Conference) -> T) -> Self {
        PerConference {
            eastern: f(Conference::Eastern),
            western: f(Conference::Western),
        }
    }

    pub fn get(&self, conference: Conference) -> &T {
        match conference {
            Conference::Eastern => &self.eastern,
            Conference::Western => &self.western,
        }
    }

    pub fn get_mut(&mut self, conference: Conference) -> &mut T {
        match conference {
            Conference::Eastern => &mut self.eastern,
            Conference::Western => &mut self.western,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Conference, &T)> {
        [(Conference::Eastern, &self.eastern), (Conference::Western, &self.western)].into_iter()
    }
}

impl<T> Index<Conference> for PerConference<T> {
    type Output = T;

    fn index(&self, conference: Conference) -> &T {
        self.get(conference)
    }
}

impl<T> IndexMut<Conference> for PerConference<T> {
    fn index_mut(&mut self, conference: Conference) -> &mut T {
        self.get_mut(conference)
    }
}
