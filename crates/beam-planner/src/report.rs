//! JSON summary of a planning run

use crate::optimizer::Optimization;
use crate::{PlannerConfig, Result, Scenario};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanReport {
    pub coverage_rate: f64,
    pub covered_users: usize,
    pub total_users: usize,
    pub total_beams: usize,
    pub total_satellites: usize,
    pub total_interferers: usize,
    /// Beams per satellite that carries any
    pub beams_by_satellite: BTreeMap<String, usize>,
    pub metadata: ReportMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub trials: usize,
    pub seed: u64,
    pub best_trial: Option<usize>,
    pub trial_coverage: Vec<f64>,
    pub config: PlannerConfig,
    pub generated_at: String,
}

impl PlanReport {
    pub fn new(scenario: &Scenario, result: &Optimization, config: &PlannerConfig) -> Self {
        let solution = &result.best.solution;
        let beams_by_satellite = solution
            .satellites()
            .map(|sat| (sat.to_string(), solution.satellite_beams(sat).count()))
            .collect();

        Self {
            coverage_rate: result.best.coverage_rate,
            covered_users: solution.covered_users().len(),
            total_users: scenario.users.len(),
            total_beams: solution.beam_count(),
            total_satellites: scenario.satellites.len(),
            total_interferers: scenario.interferers.len(),
            beams_by_satellite,
            metadata: ReportMetadata {
                trials: result.trial_coverage.len(),
                seed: result.seed,
                best_trial: result.best_trial,
                trial_coverage: result.trial_coverage.clone(),
                config: config.clone(),
                generated_at: chrono::Utc::now().to_rfc3339(),
            },
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Writing report to {:?}", path);
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::PlanningOptimizer;
    use nalgebra::Point3;
    use tempfile::NamedTempFile;

    #[test]
    fn test_report_round_trips_through_json() {
        let mut scenario = Scenario::default();
        scenario
            .satellites
            .insert("s1".to_string(), Point3::new(0.0, 0.0, 7000.0));
        scenario
            .users
            .insert("u1".to_string(), Point3::new(0.0, 0.0, 6371.0));
        scenario
            .users
            .insert("u2".to_string(), Point3::new(6371.0, 0.0, 0.0));

        let config = PlannerConfig::default();
        let result = PlanningOptimizer::new(config.clone())
            .with_trials(3)
            .with_seed(1)
            .run(&scenario);
        let report = PlanReport::new(&scenario, &result, &config);

        assert_eq!(report.covered_users, 1);
        assert_eq!(report.total_users, 2);
        assert_eq!(report.beams_by_satellite.get("s1"), Some(&1));
        assert_eq!(report.metadata.trials, 3);

        let file = NamedTempFile::new().unwrap();
        report.write_json(file.path()).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        let parsed: PlanReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.coverage_rate, 0.5);
        assert_eq!(parsed.metadata.seed, 1);
    }
}
