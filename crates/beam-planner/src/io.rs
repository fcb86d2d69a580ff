//! Scenario and solution text formats
//!
//! Scenario lines: `<sat|user|interferer> <id> <x> <y> <z>`
//!
//! Solution lines: `sat <sat_id> beam <beam_id> user <user_id> color <color_id>`
//!
//! In both formats a line containing `#` anywhere is a comment, and blank
//! lines are skipped. The first malformed line aborts the load.

use crate::{BeamAssignment, Color, PlannerConfig, Result, Scenario, Solution};
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Invalid line {line_no}: {line}")]
    InvalidLine { line_no: usize, line: String },
    #[error("Can't parse location on line {line_no}: {line}")]
    InvalidCoordinate { line_no: usize, line: String },
    #[error("Referenced an invalid sat id on line {line_no}: {line}")]
    UnknownSatellite { line_no: usize, line: String },
    #[error("Referenced an invalid user id on line {line_no}: {line}")]
    UnknownUser { line_no: usize, line: String },
    #[error("Referenced an invalid beam id on line {line_no}: {line}")]
    InvalidBeam { line_no: usize, line: String },
    #[error("Referenced an invalid color on line {line_no}: {line}")]
    InvalidColor { line_no: usize, line: String },
    #[error("Beam is allocated multiple times on line {line_no}: {line}")]
    DuplicateBeam { line_no: usize, line: String },
}

/// Numbered lines that carry data (comments and blanks removed)
fn records(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.contains('#') && !line.trim().is_empty())
}

fn parse_coordinate(token: &str, line_no: usize, line: &str) -> std::result::Result<f64, LoadError> {
    token
        .parse::<f64>()
        .map_err(|_| LoadError::InvalidCoordinate {
            line_no,
            line: line.to_string(),
        })
}

/// Parse scenario text
pub fn parse_scenario(text: &str) -> std::result::Result<Scenario, LoadError> {
    let mut scenario = Scenario::default();

    for (line_no, line) in records(text) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let invalid = || LoadError::InvalidLine {
            line_no,
            line: line.to_string(),
        };

        let dest = match parts[0] {
            "sat" => &mut scenario.satellites,
            "user" => &mut scenario.users,
            "interferer" => &mut scenario.interferers,
            _ => return Err(invalid()),
        };
        if parts.len() != 5 {
            return Err(invalid());
        }

        let x = parse_coordinate(parts[2], line_no, line)?;
        let y = parse_coordinate(parts[3], line_no, line)?;
        let z = parse_coordinate(parts[4], line_no, line)?;
        dest.insert(parts[1].to_string(), Point3::new(x, y, z));
    }

    Ok(scenario)
}

/// Load a scenario file
pub fn load_scenario(path: impl AsRef<Path>) -> Result<Scenario> {
    let path = path.as_ref();
    info!("Reading scenario file {:?}", path);

    let text = std::fs::read_to_string(path)?;
    let scenario = parse_scenario(&text)?;

    info!(
        "Loaded {} satellites, {} users, {} interferers",
        scenario.satellites.len(),
        scenario.users.len(),
        scenario.interferers.len()
    );

    Ok(scenario)
}

/// Parse solution text against a scenario
pub fn parse_solution(
    text: &str,
    scenario: &Scenario,
    config: &PlannerConfig,
) -> std::result::Result<Solution, LoadError> {
    let mut solution = Solution::new();

    for (line_no, line) in records(text) {
        let owned = || line.to_string();
        let parts: Vec<&str> = line.split_whitespace().collect();

        let &[sat_kw, sat, beam_kw, beam, user_kw, user, color_kw, color] = parts.as_slice() else {
            return Err(LoadError::InvalidLine { line_no, line: owned() });
        };
        if sat_kw != "sat" || beam_kw != "beam" || user_kw != "user" || color_kw != "color" {
            return Err(LoadError::InvalidLine { line_no, line: owned() });
        }

        if scenario.satellite(sat).is_none() {
            return Err(LoadError::UnknownSatellite { line_no, line: owned() });
        }
        if scenario.user(user).is_none() {
            return Err(LoadError::UnknownUser { line_no, line: owned() });
        }

        let beam = match beam.parse::<u32>() {
            Ok(b) if config.is_valid_beam(b) => b,
            _ => return Err(LoadError::InvalidBeam { line_no, line: owned() }),
        };

        let mut chars = color.chars();
        let color = match (chars.next(), chars.next()) {
            (Some(c), None) if config.is_valid_color(Color(c)) => Color(c),
            _ => return Err(LoadError::InvalidColor { line_no, line: owned() }),
        };

        if solution.get(sat, beam).is_some() {
            return Err(LoadError::DuplicateBeam { line_no, line: owned() });
        }
        solution.assign(sat, beam, BeamAssignment::new(user, color));
    }

    Ok(solution)
}

/// Read a solution from any reader (a file or stdin)
pub fn read_solution(
    mut reader: impl Read,
    scenario: &Scenario,
    config: &PlannerConfig,
) -> Result<Solution> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let solution = parse_solution(&text, scenario, config)?;
    info!("Read {} beams", solution.beam_count());
    Ok(solution)
}

/// Load a solution file
pub fn load_solution(
    path: impl AsRef<Path>,
    scenario: &Scenario,
    config: &PlannerConfig,
) -> Result<Solution> {
    let path = path.as_ref();
    info!("Reading solution file {:?}", path);
    read_solution(BufReader::new(File::open(path)?), scenario, config)
}

/// Write one `sat .. beam .. user .. color ..` line per beam
pub fn write_solution(mut writer: impl Write, solution: &Solution) -> Result<()> {
    write!(writer, "{}", solution)?;
    writer.flush()?;
    Ok(())
}
