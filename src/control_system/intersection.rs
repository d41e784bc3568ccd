use crate::control_system::phase_program::Program;
use crate::flow_analyzer::telemetry::{aggregate, QueueSnapshot};
use crate::simulation_engine::Simulator;

/// Whether an intersection runs its baseline or a retimed program.
///
/// Under the nudge policy the program is never replaced, so the mode
/// describes the live phase instead: `Adaptive` once the current activation
/// has been extended or shrunk, back to `Fixed` when the next phase starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Fixed,
    Adaptive,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::Fixed => "fixed",
            ControlMode::Adaptive => "adaptive",
        }
    }
}

/// One signalised junction as the controller sees it.
#[derive(Debug, Clone)]
pub struct Intersection {
    id: String,
    controlled_lanes: Vec<String>,
    baseline: Program,
    /// Last program the simulator accepted.
    active: Option<Program>,
    mode: ControlMode,
    current_phase: Option<usize>,
    last_adjusted_phase: Option<usize>,
}

impl Intersection {
    pub fn new(id: &str, controlled_lanes: Vec<String>, baseline: Program) -> Self {
        Self {
            id: id.to_string(),
            controlled_lanes,
            baseline,
            active: None,
            mode: ControlMode::Fixed,
            current_phase: None,
            last_adjusted_phase: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn controlled_lanes(&self) -> &[String] {
        &self.controlled_lanes
    }

    pub fn baseline(&self) -> &Program {
        &self.baseline
    }

    pub fn active_program(&self) -> Option<&Program> {
        self.active.as_ref()
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn last_adjusted_phase(&self) -> Option<usize> {
        self.last_adjusted_phase
    }

    pub fn snapshot<S: Simulator + ?Sized>(&self, sim: &S) -> QueueSnapshot {
        aggregate(sim, &self.id, &self.controlled_lanes)
    }

    /// Records the program the simulator now runs.
    pub fn install(&mut self, program: Program) {
        self.active = Some(program);
    }

    pub fn set_mode(&mut self, mode: ControlMode) {
        self.mode = mode;
    }

    /// Tracks the live phase. Returns true when a new phase has started,
    /// which clears the adjustment made during the previous one and the
    /// nudge-driven `Adaptive` mode with it.
    pub fn observe_phase(&mut self, phase: usize) -> bool {
        if self.current_phase == Some(phase) {
            return false;
        }
        self.current_phase = Some(phase);
        self.last_adjusted_phase = None;
        self.mode = ControlMode::Fixed;
        true
    }

    pub fn already_adjusted(&self, phase: usize) -> bool {
        self.last_adjusted_phase == Some(phase)
    }

    pub fn mark_adjusted(&mut self, phase: usize) {
        self.last_adjusted_phase = Some(phase);
        self.mode = ControlMode::Adaptive;
    }
}
