//! Beam Planner
//!
//! Assigns user beams across a satellite fleet so that no assignment breaks
//! the interference and visibility rules, while covering as many users as a
//! single greedy pass (or a handful of shuffled passes) can reach.
//!
//! # Constraint Model
//!
//! | Check              | Vertex    | Rays                      | Rejects when              |
//! |--------------------|-----------|---------------------------|---------------------------|
//! | User coverage      | -         | -                         | a user is served twice    |
//! | User visibility    | user      | planet centre, satellite  | angle <= 180 - max_visible|
//! | Self-interference  | satellite | two same-color users      | angle < 10°               |
//! | Interferer         | user      | satellite, interferer     | angle < 20°               |
//!
//! Positions are Earth-centred, in kilometres.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;

pub mod constraints;
pub mod geometry;
pub mod io;
pub mod optimizer;
pub mod planner;
pub mod report;

pub use constraints::{is_feasible, Limits, Violation};
pub use io::LoadError;
pub use optimizer::PlanningOptimizer;
pub use planner::{plan_beams, Plan};

/// Beams each satellite can form
pub const BEAMS_PER_SATELLITE: u32 = 32;

/// Frequency/polarization reuse labels per satellite
pub const COLORS_PER_SATELLITE: u8 = 4;

/// Upper bound on the color alphabet ('A'..='Z')
pub const MAX_COLORS: u8 = 26;

#[derive(Error, Debug)]
pub enum PlanningError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PlanningError>;

/// Frequency reuse label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Color(pub char);

impl Color {
    /// Color at `index` of the alphabet ('A' + index)
    pub fn from_index(index: u8) -> Self {
        Color((b'A' + index) as char)
    }

    /// Position in the alphabet, if this is an uppercase ASCII letter
    pub fn index(&self) -> Option<u8> {
        self.0.is_ascii_uppercase().then(|| self.0 as u8 - b'A')
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static problem instance. Never mutated after loading.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    pub satellites: BTreeMap<String, Point3<f64>>,
    pub users: BTreeMap<String, Point3<f64>>,
    pub interferers: BTreeMap<String, Point3<f64>>,
}

impl Scenario {
    pub fn satellite(&self, id: &str) -> Option<&Point3<f64>> {
        self.satellites.get(id)
    }

    pub fn user(&self, id: &str) -> Option<&Point3<f64>> {
        self.users.get(id)
    }

    pub fn satellite_ids(&self) -> Vec<String> {
        self.satellites.keys().cloned().collect()
    }

    pub fn user_ids(&self) -> Vec<String> {
        self.users.keys().cloned().collect()
    }
}

/// One beam: the user it serves and the color it uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamAssignment {
    pub user: String,
    pub color: Color,
}

impl BeamAssignment {
    pub fn new(user: impl Into<String>, color: Color) -> Self {
        Self {
            user: user.into(),
            color,
        }
    }
}

/// Satellite id -> beam id -> assignment.
///
/// User uniqueness is a constraint checked by [`constraints`], not something
/// this structure enforces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    beams: BTreeMap<String, BTreeMap<u32, BeamAssignment>>,
}

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a beam, returning the previous assignment
    pub fn assign(
        &mut self,
        satellite: impl Into<String>,
        beam: u32,
        assignment: BeamAssignment,
    ) -> Option<BeamAssignment> {
        self.beams
            .entry(satellite.into())
            .or_default()
            .insert(beam, assignment)
    }

    /// Remove a beam. A satellite left with no beams is dropped.
    pub fn remove(&mut self, satellite: &str, beam: u32) -> Option<BeamAssignment> {
        let sat_beams = self.beams.get_mut(satellite)?;
        let removed = sat_beams.remove(&beam);
        if sat_beams.is_empty() {
            self.beams.remove(satellite);
        }
        removed
    }

    pub fn get(&self, satellite: &str, beam: u32) -> Option<&BeamAssignment> {
        self.beams.get(satellite)?.get(&beam)
    }

    /// Beams of one satellite, ordered by beam id
    pub fn satellite_beams(&self, satellite: &str) -> impl Iterator<Item = (u32, &BeamAssignment)> {
        self.beams
            .get(satellite)
            .into_iter()
            .flat_map(|beams| beams.iter().map(|(id, a)| (*id, a)))
    }

    /// Satellites that carry at least one beam
    pub fn satellites(&self) -> impl Iterator<Item = &str> {
        self.beams.keys().map(String::as_str)
    }

    /// Every beam as `(satellite, beam, assignment)`
    pub fn beams(&self) -> impl Iterator<Item = (&str, u32, &BeamAssignment)> {
        self.beams.iter().flat_map(|(sat, beams)| {
            beams
                .iter()
                .map(move |(id, assignment)| (sat.as_str(), *id, assignment))
        })
    }

    pub fn beam_count(&self) -> usize {
        self.beams.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    /// Distinct users with at least one beam
    pub fn covered_users(&self) -> BTreeSet<&str> {
        self.beams().map(|(_, _, a)| a.user.as_str()).collect()
    }

    /// Covered users / scenario users (0.0 for an empty scenario)
    pub fn coverage_rate(&self, scenario: &Scenario) -> f64 {
        if scenario.users.is_empty() {
            return 0.0;
        }
        self.covered_users().len() as f64 / scenario.users.len() as f64
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (sat, beam, assignment) in self.beams() {
            writeln!(
                f,
                "sat {} beam {} user {} color {}",
                sat, beam, assignment.user, assignment.color
            )?;
        }
        Ok(())
    }
}

/// Planner and evaluator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Beam ids run 1..=beams_per_satellite
    pub beams_per_satellite: u32,
    /// Color alphabet is 'A'..'A'+colors_per_satellite
    pub colors_per_satellite: u8,
    /// Angular thresholds
    pub limits: Limits,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            beams_per_satellite: BEAMS_PER_SATELLITE,
            colors_per_satellite: COLORS_PER_SATELLITE,
            limits: Limits::default(),
        }
    }
}

impl PlannerConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.beams_per_satellite == 0 {
            return Err(PlanningError::InvalidConfig(
                "beams_per_satellite must be at least 1".to_string(),
            ));
        }
        if self.colors_per_satellite == 0 || self.colors_per_satellite > MAX_COLORS {
            return Err(PlanningError::InvalidConfig(format!(
                "colors_per_satellite must be in 1..={}, got {}",
                MAX_COLORS, self.colors_per_satellite
            )));
        }
        Ok(())
    }

    /// The color alphabet, 'A' first
    pub fn colors(&self) -> Vec<Color> {
        (0..self.colors_per_satellite).map(Color::from_index).collect()
    }

    /// Color used for a beam: alphabet[beam mod colors]
    pub fn color_for_beam(&self, beam: u32) -> Color {
        let index = beam % u32::from(self.colors_per_satellite.max(1));
        Color::from_index(index as u8)
    }

    pub fn is_valid_beam(&self, beam: u32) -> bool {
        (1..=self.beams_per_satellite).contains(&beam)
    }

    pub fn is_valid_color(&self, color: Color) -> bool {
        color
            .index()
            .map_or(false, |i| i < self.colors_per_satellite)
    }
}
