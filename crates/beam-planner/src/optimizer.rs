//! Randomized restarts around the greedy planner
//!
//! Each trial shuffles the satellite and user orders with its own RNG, runs
//! [`plan_beams`], and the best coverage wins. Trials share no state, so with
//! the `parallel` feature they run on the rayon pool; the winner is still
//! picked in trial order, so a seeded run gives the same answer either way.

use crate::planner::{plan_beams, Plan};
use crate::{PlannerConfig, Scenario};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Default number of shuffled trials
pub const DEFAULT_TRIALS: usize = 1;

/// Outcome of an optimizer run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Optimization {
    /// Best plan seen; empty when no trial ran
    pub best: Plan,
    /// Index of the trial that produced `best`
    pub best_trial: Option<usize>,
    /// Coverage rate of every trial, in trial order
    pub trial_coverage: Vec<f64>,
    /// Master seed the trial seeds were drawn from
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct PlanningOptimizer {
    pub trials: usize,
    pub seed: Option<u64>,
    pub config: PlannerConfig,
}

impl Default for PlanningOptimizer {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

impl PlanningOptimizer {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            seed: None,
            config,
        }
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Run every trial and keep the strictly best coverage (ties keep the earlier trial)
    pub fn run(&self, scenario: &Scenario) -> Optimization {
        let seed = self.seed.unwrap_or_else(|| StdRng::from_entropy().gen());
        let mut master = StdRng::seed_from_u64(seed);
        let trial_seeds: Vec<u64> = (0..self.trials).map(|_| master.gen()).collect();

        info!(
            "Running {} planning trial(s) over {} satellites and {} users (seed {})",
            self.trials,
            scenario.satellites.len(),
            scenario.users.len(),
            seed
        );

        #[cfg(feature = "parallel")]
        let plans: Vec<Plan> = trial_seeds
            .par_iter()
            .map(|&s| self.run_trial(scenario, s))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let plans: Vec<Plan> = trial_seeds
            .iter()
            .map(|&s| self.run_trial(scenario, s))
            .collect();

        let trial_coverage: Vec<f64> = plans.iter().map(|p| p.coverage_rate).collect();

        let mut best: Option<(usize, Plan)> = None;
        for (index, plan) in plans.into_iter().enumerate() {
            debug!("trial {}: {:.4} coverage", index, plan.coverage_rate);
            let improves = best
                .as_ref()
                .map_or(true, |(_, current)| plan.coverage_rate > current.coverage_rate);
            if improves {
                best = Some((index, plan));
            }
        }

        let (best_trial, best) = match best {
            Some((index, plan)) => (Some(index), plan),
            None => (None, Plan::default()),
        };

        info!(
            "Best coverage {:.1}% from trial {:?}",
            best.coverage_rate * 100.0,
            best_trial
        );

        Optimization {
            best,
            best_trial,
            trial_coverage,
            seed,
        }
    }

    fn run_trial(&self, scenario: &Scenario, seed: u64) -> Plan {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut satellites = scenario.satellite_ids();
        let mut users = scenario.user_ids();
        satellites.shuffle(&mut rng);
        users.shuffle(&mut rng);

        plan_beams(scenario, &users, &satellites, &self.config)
    }
}
