//! Greedy beam construction
//!
//! Walks satellites in the given order and, for each, offers the users that
//! are still unserved in the given order. A user is accepted when adding its
//! beam keeps the whole solution feasible; otherwise the next user is tried
//! with the same beam id. Decisions are never revisited, so an unlucky early
//! assignment can strand users.

use crate::constraints::check_candidate;
use crate::{BeamAssignment, PlannerConfig, Scenario, Solution};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A constructed solution and the share of users it serves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub solution: Solution,
    pub coverage_rate: f64,
}

/// Build one solution for the given satellite and user orderings
pub fn plan_beams(
    scenario: &Scenario,
    users: &[String],
    satellites: &[String],
    config: &PlannerConfig,
) -> Plan {
    let mut solution = Solution::new();
    let mut remaining: Vec<&str> = users.iter().map(String::as_str).collect();

    for satellite in satellites {
        if remaining.is_empty() {
            break;
        }

        let mut beam = 1u32;
        let mut i = 0;
        while i < remaining.len() && beam <= config.beams_per_satellite {
            let assignment = BeamAssignment::new(remaining[i], config.color_for_beam(beam));

            match check_candidate(scenario, &solution, satellite, beam, &assignment, &config.limits) {
                Ok(()) => {
                    debug!(
                        "sat {} beam {} -> user {} color {}",
                        satellite, beam, assignment.user, assignment.color
                    );
                    solution.assign(satellite.as_str(), beam, assignment);
                    remaining.remove(i);
                    beam += 1;
                }
                Err(violation) => {
                    debug!("rejected: {}", violation);
                    i += 1;
                }
            }
        }
    }

    let coverage_rate = solution.coverage_rate(scenario);
    info!(
        "Planned {} beams, {:.1}% of {} users covered",
        solution.beam_count(),
        coverage_rate * 100.0,
        scenario.users.len()
    );

    Plan {
        solution,
        coverage_rate,
    }
}
