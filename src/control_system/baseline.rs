use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::config::TimingConfig;
use crate::control_system::phase_program::{PhaseSpec, Program};
use crate::error::{ConfigError, ProgramError};
use crate::global_variables::{BASELINE_GREEN, FAIR_GREEN, FAIR_YELLOW};
use crate::simulation_engine::scenario::Scenario;

/// Yellow time for an intersection with `lanes` controlled lanes.
pub fn yellow_time(lanes: usize) -> f64 {
    if lanes <= 3 {
        4.0
    } else {
        (4 + (lanes - 2) / 2).min(10) as f64
    }
}

/// The fixed program for an intersection with `lanes` controlled lanes.
/// The first half of the lanes (rounded up) moves first, then the rest.
pub fn lane_count_program(lanes: usize) -> Result<Program, ProgramError> {
    if lanes == 0 {
        return Err(ProgramError::Empty);
    }
    let yellow = yellow_time(lanes);
    if lanes == 1 {
        return Program::from_pairs(
            "baseline",
            [(BASELINE_GREEN, "G"), (yellow, "y"), (BASELINE_GREEN, "r"), (yellow, "r")],
        );
    }
    let first = lanes.div_ceil(2);
    let second = lanes - first;
    let state = |a: char, b: char| -> String {
        std::iter::repeat(a)
            .take(first)
            .chain(std::iter::repeat(b).take(second))
            .collect()
    };
    Program::from_pairs(
        "baseline",
        [
            (BASELINE_GREEN, state('G', 'r')),
            (yellow, state('y', 'r')),
            (BASELINE_GREEN, state('r', 'G')),
            (yellow, state('r', 'y')),
        ],
    )
}

/// Yellow phases get a short fixed time and every other phase the same
/// green time, so no approach starts out favoured.
pub fn fair_program(program: &Program) -> Program {
    program.retimed(program.name(), |_, phase| {
        if phase.has_yellow() {
            FAIR_YELLOW
        } else {
            FAIR_GREEN
        }
    })
}

/// Clamps green phase durations into the configured bounds.
pub fn clamp_greens(tls_id: &str, program: &Program, timing: &TimingConfig) -> Program {
    program.retimed(program.name(), |index, phase| {
        let duration = phase.duration();
        if phase.has_yellow() || !phase.has_green() {
            return duration;
        }
        let clamped = duration.clamp(timing.min_green, timing.max_green);
        if clamped != duration {
            log::warn!(
                "[{}] baseline phase {} duration {}s clamped to {}s",
                tls_id,
                index,
                duration,
                clamped
            );
        }
        clamped
    })
}

pub type PhaseTable = HashMap<String, Vec<PhaseSpec>>;

pub fn load_phase_table(path: &Path) -> Result<PhaseTable, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn save_phase_table(path: &Path, table: &PhaseTable) -> Result<(), ConfigError> {
    let text = serde_json::to_string_pretty(table).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Fair baselines for every traffic light of a scenario, built from the
/// phase layout the scenario ships with.
pub fn fair_phase_table(scenario: &Scenario) -> Result<PhaseTable, ProgramError> {
    let mut table = PhaseTable::new();
    for light in &scenario.traffic_lights {
        let program = Program::from_specs(&light.id, &light.program)?;
        program.validate_for(light.controlled_lanes.len())?;
        table.insert(light.id.clone(), fair_program(&program).to_specs());
    }
    Ok(table)
}

/// Where baseline programs come from.
#[derive(Debug, Clone)]
pub enum Baselines {
    /// Per-intersection programs read from a file.
    Table(PhaseTable),
    /// The lane-count lookup.
    LaneCount,
}

impl Baselines {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Ok(Baselines::Table(load_phase_table(path)?)),
            None => Ok(Baselines::LaneCount),
        }
    }

    /// The baseline for one intersection, or `None` when the table has no
    /// entry for it.
    pub fn program_for(&self, tls_id: &str, lanes: usize) -> Option<Result<Program, ProgramError>> {
        match self {
            Baselines::Table(table) => table
                .get(tls_id)
                .map(|specs| Program::from_specs(&format!("{}_baseline", tls_id), specs)),
            Baselines::LaneCount => Some(lane_count_program(lanes)),
        }
    }
}
