//! Feasibility checks
//!
//! Four independent checks over a scenario and a (possibly partial) solution.
//! Each returns the first [`Violation`] it finds. [`evaluate`] runs them in a
//! fixed order, cheapest first:
//!
//! 1. user coverage (no user served twice)
//! 2. user visibility
//! 3. self-interference between same-color beams of one satellite
//! 4. interference with third-party satellites
//!
//! Angle comparisons are strict: an angle equal to its limit passes. A NaN
//! angle, which only degenerate geometry produces, never passes.

use crate::geometry::{angle_degrees, origin};
use crate::{BeamAssignment, Scenario, Solution};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Minimum same-color beam separation seen from the satellite (degrees)
pub const SELF_INTERFERENCE_MAX: f64 = 10.0;

/// Minimum satellite/interferer separation seen from the user (degrees)
pub const INTERFERER_INTERFERENCE_MAX: f64 = 20.0;

/// Maximum beam angle off the user's vertical (degrees)
pub const MAX_USER_VISIBLE_ANGLE: f64 = 45.0;

/// Angular thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub self_interference_max: f64,
    pub interferer_interference_max: f64,
    pub max_user_visible_angle: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            self_interference_max: SELF_INTERFERENCE_MAX,
            interferer_interference_max: INTERFERER_INTERFERENCE_MAX,
            max_user_visible_angle: MAX_USER_VISIBLE_ANGLE,
        }
    }
}

impl Limits {
    /// Smallest centre-user-satellite angle that still counts as visible
    pub fn visibility_floor(&self) -> f64 {
        180.0 - self.max_user_visible_angle
    }

    /// Minimum elevation above the local horizon
    pub fn min_elevation(&self) -> f64 {
        90.0 - self.max_user_visible_angle
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("sat {satellite} is not part of the scenario")]
    UnknownSatellite { satellite: String },
    #[error("sat {satellite} beam {beam} serves user {user}, who is not part of the scenario")]
    UnknownUser {
        satellite: String,
        beam: u32,
        user: String,
    },
    #[error("user {user} is covered by sat {first_satellite} beam {first_beam} and again by sat {satellite} beam {beam}")]
    DuplicateUser {
        user: String,
        first_satellite: String,
        first_beam: u32,
        satellite: String,
        beam: u32,
    },
    #[error("sat {satellite} beam {beam} is outside user {user}'s field of view ({elevation_deg:.3} degrees elevation, min {min_elevation_deg:.3})")]
    NotVisible {
        satellite: String,
        beam: u32,
        user: String,
        elevation_deg: f64,
        min_elevation_deg: f64,
    },
    #[error("sat {satellite} beams {beam_a} and {beam_b} interfere (color {color}, {angle_deg:.3} degrees < {limit_deg})")]
    SelfInterference {
        satellite: String,
        beam_a: u32,
        beam_b: u32,
        color: char,
        angle_deg: f64,
        limit_deg: f64,
    },
    #[error("sat {satellite} beam {beam} (user {user}) interferes with non-Starlink sat {interferer} ({angle_deg:.3} degrees < {limit_deg})")]
    InterfererInterference {
        satellite: String,
        beam: u32,
        user: String,
        interferer: String,
        angle_deg: f64,
        limit_deg: f64,
    },
}

pub type CheckResult = std::result::Result<(), Violation>;

/// True unless `angle` is at least `limit`. NaN counts as below.
fn below(angle: f64, limit: f64) -> bool {
    !(angle >= limit)
}

fn satellite_position<'a>(scenario: &'a Scenario, satellite: &str) -> Result<&'a Point3<f64>, Violation> {
    scenario
        .satellite(satellite)
        .ok_or_else(|| Violation::UnknownSatellite {
            satellite: satellite.to_string(),
        })
}

fn user_position<'a>(
    scenario: &'a Scenario,
    satellite: &str,
    beam: u32,
    user: &str,
) -> Result<&'a Point3<f64>, Violation> {
    scenario.user(user).ok_or_else(|| Violation::UnknownUser {
        satellite: satellite.to_string(),
        beam,
        user: user.to_string(),
    })
}

/// Every user is served by at most one beam across the solution
pub fn check_user_coverage(_scenario: &Scenario, solution: &Solution) -> CheckResult {
    let mut covered: HashMap<&str, (&str, u32)> = HashMap::new();

    for (satellite, beam, assignment) in solution.beams() {
        if let Some(&(first_satellite, first_beam)) = covered.get(assignment.user.as_str()) {
            return Err(Violation::DuplicateUser {
                user: assignment.user.clone(),
                first_satellite: first_satellite.to_string(),
                first_beam,
                satellite: satellite.to_string(),
                beam,
            });
        }
        covered.insert(&assignment.user, (satellite, beam));
    }

    Ok(())
}

/// One beam's satellite sits within the user's cone of view
pub fn check_beam_visibility(
    scenario: &Scenario,
    satellite: &str,
    beam: u32,
    assignment: &BeamAssignment,
    limits: &Limits,
) -> CheckResult {
    let sat_pos = satellite_position(scenario, satellite)?;
    let user_pos = user_position(scenario, satellite, beam, &assignment.user)?;

    // Angle at the user between the planet centre and the satellite
    let angle = angle_degrees(user_pos, &origin(), sat_pos);
    if !(angle > limits.visibility_floor()) {
        return Err(Violation::NotVisible {
            satellite: satellite.to_string(),
            beam,
            user: assignment.user.clone(),
            elevation_deg: angle - 90.0,
            min_elevation_deg: limits.min_elevation(),
        });
    }

    Ok(())
}

/// Every user can see the satellite serving them
pub fn check_user_visibility(scenario: &Scenario, solution: &Solution, limits: &Limits) -> CheckResult {
    solution
        .beams()
        .try_for_each(|(sat, beam, assignment)| {
            check_beam_visibility(scenario, sat, beam, assignment, limits)
        })
}

/// Two beams of the same satellite; only same-color pairs are compared
fn check_beam_pair(
    scenario: &Scenario,
    satellite: &str,
    (beam_a, a): (u32, &BeamAssignment),
    (beam_b, b): (u32, &BeamAssignment),
    limits: &Limits,
) -> CheckResult {
    if a.color != b.color {
        return Ok(());
    }

    let sat_pos = satellite_position(scenario, satellite)?;
    let pos_a = user_position(scenario, satellite, beam_a, &a.user)?;
    let pos_b = user_position(scenario, satellite, beam_b, &b.user)?;

    let angle = angle_degrees(sat_pos, pos_a, pos_b);
    if below(angle, limits.self_interference_max) {
        return Err(Violation::SelfInterference {
            satellite: satellite.to_string(),
            beam_a,
            beam_b,
            color: a.color.0,
            angle_deg: angle,
            limit_deg: limits.self_interference_max,
        });
    }

    Ok(())
}

/// No satellite has two same-color beams closer than the self-interference limit
pub fn check_self_interference(scenario: &Scenario, solution: &Solution, limits: &Limits) -> CheckResult {
    for satellite in solution.satellites() {
        let beams: Vec<_> = solution.satellite_beams(satellite).collect();
        for (i, &first) in beams.iter().enumerate() {
            for &second in &beams[i + 1..] {
                check_beam_pair(scenario, satellite, first, second, limits)?;
            }
        }
    }

    Ok(())
}

/// One beam keeps clear of every interferer as seen from its user
pub fn check_beam_interferers(
    scenario: &Scenario,
    satellite: &str,
    beam: u32,
    assignment: &BeamAssignment,
    limits: &Limits,
) -> CheckResult {
    let sat_pos = satellite_position(scenario, satellite)?;
    let user_pos = user_position(scenario, satellite, beam, &assignment.user)?;

    for (interferer, interferer_pos) in &scenario.interferers {
        let angle = angle_degrees(user_pos, sat_pos, interferer_pos);
        if below(angle, limits.interferer_interference_max) {
            return Err(Violation::InterfererInterference {
                satellite: satellite.to_string(),
                beam,
                user: assignment.user.clone(),
                interferer: interferer.clone(),
                angle_deg: angle,
                limit_deg: limits.interferer_interference_max,
            });
        }
    }

    Ok(())
}

/// No beam points its user within the interference cone of a third-party satellite
pub fn check_interferer_interference(
    scenario: &Scenario,
    solution: &Solution,
    limits: &Limits,
) -> CheckResult {
    solution
        .beams()
        .try_for_each(|(sat, beam, assignment)| {
            check_beam_interferers(scenario, sat, beam, assignment, limits)
        })
}

/// All checks in order, stopping at the first violation
pub fn evaluate(scenario: &Scenario, solution: &Solution, limits: &Limits) -> CheckResult {
    check_user_coverage(scenario, solution)?;
    check_user_visibility(scenario, solution, limits)?;
    check_self_interference(scenario, solution, limits)?;
    check_interferer_interference(scenario, solution, limits)
}

pub fn is_feasible(scenario: &Scenario, solution: &Solution, limits: &Limits) -> bool {
    evaluate(scenario, solution, limits).is_ok()
}

/// Checks only the relations a new beam adds to an already-feasible solution.
///
/// For a feasible `solution` without `(satellite, beam)`, this agrees with
/// [`evaluate`] on the solution with the beam inserted.
pub fn check_candidate(
    scenario: &Scenario,
    solution: &Solution,
    satellite: &str,
    beam: u32,
    assignment: &BeamAssignment,
    limits: &Limits,
) -> CheckResult {
    if let Some((first_satellite, first_beam, _)) = solution
        .beams()
        .find(|(_, _, existing)| existing.user == assignment.user)
    {
        return Err(Violation::DuplicateUser {
            user: assignment.user.clone(),
            first_satellite: first_satellite.to_string(),
            first_beam,
            satellite: satellite.to_string(),
            beam,
        });
    }

    check_beam_visibility(scenario, satellite, beam, assignment, limits)?;

    for existing in solution.satellite_beams(satellite) {
        check_beam_pair(scenario, satellite, existing, (beam, assignment), limits)?;
    }

    check_beam_interferers(scenario, satellite, beam, assignment, limits)
}

/// Whether adding the beam keeps a feasible solution feasible
pub fn admits(
    scenario: &Scenario,
    solution: &Solution,
    satellite: &str,
    beam: u32,
    assignment: &BeamAssignment,
    limits: &Limits,
) -> bool {
    check_candidate(scenario, solution, satellite, beam, assignment, limits).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    const SURFACE: f64 = 6371.0;

    /// Satellite straight above the north pole, users spread along +x
    fn polar_scenario() -> Scenario {
        let mut scenario = Scenario::default();
        scenario
            .satellites
            .insert("s1".to_string(), Point3::new(0.0, 0.0, 7000.0));
        scenario
            .users
            .insert("u1".to_string(), Point3::new(0.0, 0.0, SURFACE));
        // 5 degrees off u1 as seen from s1
        scenario.users.insert(
            "u2".to_string(),
            Point3::new(629.0 * 5.0f64.to_radians().tan(), 0.0, SURFACE),
        );
        // 30 degrees off u1 as seen from s1
        scenario.users.insert(
            "u3".to_string(),
            Point3::new(629.0 * 30.0f64.to_radians().tan(), 0.0, SURFACE),
        );
        // Far over the horizon
        scenario
            .users
            .insert("u4".to_string(), Point3::new(SURFACE, 0.0, 0.0));
        scenario
    }

    fn beam(user: &str, color: char) -> BeamAssignment {
        BeamAssignment::new(user, Color(color))
    }

    #[test]
    fn test_empty_solution_is_feasible() {
        assert!(is_feasible(&polar_scenario(), &Solution::new(), &Limits::default()));
    }

    #[test]
    fn test_duplicate_user_rejected() {
        let scenario = polar_scenario();
        let mut solution = Solution::new();
        solution.assign("s1", 1, beam("u1", 'A'));
        solution.assign("s1", 2, beam("u1", 'B'));

        let err = check_user_coverage(&scenario, &solution).unwrap_err();
        assert!(matches!(err, Violation::DuplicateUser { ref user, .. } if user == "u1"));
    }

    #[test]
    fn test_unserved_users_are_allowed() {
        let scenario = polar_scenario();
        let mut solution = Solution::new();
        solution.assign("s1", 1, beam("u1", 'A'));
        assert!(check_user_coverage(&scenario, &solution).is_ok());
    }

    #[test]
    fn test_visibility() {
        let scenario = polar_scenario();
        let limits = Limits::default();

        let mut solution = Solution::new();
        solution.assign("s1", 1, beam("u1", 'A'));
        assert!(check_user_visibility(&scenario, &solution, &limits).is_ok());

        solution.assign("s1", 2, beam("u4", 'B'));
        let err = check_user_visibility(&scenario, &solution, &limits).unwrap_err();
        match err {
            Violation::NotVisible { user, min_elevation_deg, .. } => {
                assert_eq!(user, "u4");
                assert_eq!(min_elevation_deg, 45.0);
            }
            other => panic!("unexpected violation: {other}"),
        }
    }

    #[test]
    fn test_self_interference_same_color_only() {
        let scenario = polar_scenario();
        let limits = Limits::default();

        let mut solution = Solution::new();
        solution.assign("s1", 1, beam("u1", 'A'));
        solution.assign("s1", 2, beam("u2", 'B'));
        assert!(check_self_interference(&scenario, &solution, &limits).is_ok());

        solution.assign("s1", 2, beam("u2", 'A'));
        let err = check_self_interference(&scenario, &solution, &limits).unwrap_err();
        match err {
            Violation::SelfInterference { beam_a, beam_b, angle_deg, .. } => {
                assert_eq!((beam_a, beam_b), (1, 2));
                assert!((angle_deg - 5.0).abs() < 1e-6);
            }
            other => panic!("unexpected violation: {other}"),
        }
    }

    #[test]
    fn test_self_interference_well_separated() {
        let scenario = polar_scenario();
        let mut solution = Solution::new();
        solution.assign("s1", 1, beam("u1", 'A'));
        solution.assign("s1", 2, beam("u3", 'A'));
        assert!(check_self_interference(&scenario, &solution, &Limits::default()).is_ok());
    }

    #[test]
    fn test_threshold_is_compliant() {
        let scenario = polar_scenario();
        let separation = angle_degrees(
            &scenario.satellites["s1"],
            &scenario.users["u1"],
            &scenario.users["u2"],
        );
        let limits = Limits {
            self_interference_max: separation,
            ..Limits::default()
        };
        let mut solution = Solution::new();
        solution.assign("s1", 1, beam("u1", 'C'));
        solution.assign("s1", 2, beam("u2", 'C'));
        assert!(check_self_interference(&scenario, &solution, &limits).is_ok());
    }

    #[test]
    fn test_interferer_interference() {
        let mut scenario = polar_scenario();
        let limits = Limits::default();
        let mut solution = Solution::new();
        solution.assign("s1", 1, beam("u1", 'A'));

        // Interferer 10 degrees off the satellite as seen from u1
        scenario.interferers.insert(
            "x1".to_string(),
            Point3::new(2000.0 * 10.0f64.to_radians().tan(), 0.0, SURFACE + 2000.0),
        );
        let err = check_interferer_interference(&scenario, &solution, &limits).unwrap_err();
        assert!(matches!(err, Violation::InterfererInterference { ref interferer, .. } if interferer == "x1"));

        // Move it 40 degrees off
        scenario.interferers.insert(
            "x1".to_string(),
            Point3::new(2000.0 * 40.0f64.to_radians().tan(), 0.0, SURFACE + 2000.0),
        );
        assert!(check_interferer_interference(&scenario, &solution, &limits).is_ok());
    }

    #[test]
    fn test_evaluate_reports_coverage_first() {
        let scenario = polar_scenario();
        let mut solution = Solution::new();
        // Both a duplicate and an invisible user
        solution.assign("s1", 1, beam("u4", 'A'));
        solution.assign("s1", 2, beam("u4", 'B'));
        let err = evaluate(&scenario, &solution, &Limits::default()).unwrap_err();
        assert!(matches!(err, Violation::DuplicateUser { .. }));
    }

    #[test]
    fn test_unknown_ids_are_violations() {
        let scenario = polar_scenario();
        let limits = Limits::default();

        let mut solution = Solution::new();
        solution.assign("ghost", 1, beam("u1", 'A'));
        assert!(matches!(
            evaluate(&scenario, &solution, &limits),
            Err(Violation::UnknownSatellite { .. })
        ));

        let mut solution = Solution::new();
        solution.assign("s1", 1, beam("nobody", 'A'));
        assert!(matches!(
            evaluate(&scenario, &solution, &limits),
            Err(Violation::UnknownUser { .. })
        ));
    }

    #[test]
    fn test_candidate_matches_full_evaluation() {
        let scenario = polar_scenario();
        let limits = Limits::default();
        let mut committed = Solution::new();
        committed.assign("s1", 1, beam("u1", 'A'));
        assert!(is_feasible(&scenario, &committed, &limits));

        for (user, color) in [("u1", 'B'), ("u2", 'A'), ("u2", 'B'), ("u3", 'A'), ("u4", 'C')] {
            let candidate = beam(user, color);
            let mut trial = committed.clone();
            trial.assign("s1", 2, candidate.clone());
            assert_eq!(
                admits(&scenario, &committed, "s1", 2, &candidate, &limits),
                is_feasible(&scenario, &trial, &limits),
                "user {user} color {color}"
            );
        }
    }

    #[test]
    fn test_violation_messages() {
        let v = Violation::SelfInterference {
            satellite: "s1".to_string(),
            beam_a: 1,
            beam_b: 2,
            color: 'A',
            angle_deg: 5.0,
            limit_deg: 10.0,
        };
        assert_eq!(
            v.to_string(),
            "sat s1 beams 1 and 2 interfere (color A, 5.000 degrees < 10)"
        );
    }
}
