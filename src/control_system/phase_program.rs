use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProgramError;

/// One signal symbol of a phase state string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// `G`: priority green.
    Green,
    /// `g`: green without priority.
    GreenMinor,
    /// `y`
    Yellow,
    /// `r`
    Red,
}

impl Signal {
    pub fn from_char(symbol: char) -> Option<Self> {
        match symbol {
            'G' => Some(Signal::Green),
            'g' => Some(Signal::GreenMinor),
            'y' => Some(Signal::Yellow),
            'r' => Some(Signal::Red),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Signal::Green => 'G',
            Signal::GreenMinor => 'g',
            Signal::Yellow => 'y',
            Signal::Red => 'r',
        }
    }

    pub fn is_green(self) -> bool {
        matches!(self, Signal::Green | Signal::GreenMinor)
    }
}

/// One interval of a signal cycle. Index `i` of the state refers to
/// controlled lane `i` of the owning intersection.
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    duration: f64,
    state: Vec<Signal>,
}

impl Phase {
    pub fn new(duration: f64, state: &str) -> Result<Self, ProgramError> {
        Self::parse(0, duration, state)
    }

    fn parse(index: usize, duration: f64, state: &str) -> Result<Self, ProgramError> {
        if !(duration > 0.0) || !duration.is_finite() {
            return Err(ProgramError::BadDuration { index, duration });
        }
        let state = state
            .chars()
            .map(|symbol| Signal::from_char(symbol).ok_or(ProgramError::UnknownSymbol { index, symbol }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { duration, state })
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn state(&self) -> &[Signal] {
        &self.state
    }

    pub fn state_string(&self) -> String {
        self.state.iter().map(|signal| signal.as_char()).collect()
    }

    /// Whether controlled lane `lane_index` may proceed in this phase.
    /// Lanes past the end of the state are treated as red.
    pub fn is_green(&self, lane_index: usize) -> bool {
        self.state
            .get(lane_index)
            .map(|signal| signal.is_green())
            .unwrap_or(false)
    }

    pub fn has_yellow(&self) -> bool {
        self.state.contains(&Signal::Yellow)
    }

    pub fn has_green(&self) -> bool {
        self.state.iter().any(|signal| signal.is_green())
    }

    /// A copy of this phase with another duration.
    pub fn with_duration(&self, duration: f64) -> Self {
        Self {
            duration,
            state: self.state.clone(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}s {}", self.duration, self.state_string())
    }
}

/// Serialized form of a phase, as stored in baseline phase files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub duration: f64,
    pub state: String,
}

/// A named, cyclic sequence of phases. Programs are never edited in place:
/// retiming always produces a new `Program`.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    name: String,
    phases: Vec<Phase>,
    offset: f64,
    start_index: usize,
}

impl Program {
    /// Builds a program from `(duration, state)` pairs. Every state must have
    /// the same length.
    pub fn from_pairs<I, S>(name: &str, pairs: I) -> Result<Self, ProgramError>
    where
        I: IntoIterator<Item = (f64, S)>,
        S: AsRef<str>,
    {
        let phases = pairs
            .into_iter()
            .enumerate()
            .map(|(index, (duration, state))| Phase::parse(index, duration, state.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(name, phases)
    }

    pub fn from_specs(name: &str, specs: &[PhaseSpec]) -> Result<Self, ProgramError> {
        Self::from_pairs(name, specs.iter().map(|spec| (spec.duration, spec.state.as_str())))
    }

    pub fn new(name: &str, phases: Vec<Phase>) -> Result<Self, ProgramError> {
        let first = phases.first().ok_or(ProgramError::Empty)?;
        let expected = first.state.len();
        if let Some((index, phase)) = phases
            .iter()
            .enumerate()
            .find(|(_, phase)| phase.state.len() != expected)
        {
            return Err(ProgramError::StateLength {
                index,
                expected,
                found: phase.state.len(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            phases,
            offset: 0.0,
            start_index: 0,
        })
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_start_index(mut self, start_index: usize) -> Result<Self, ProgramError> {
        if start_index >= self.phases.len() {
            return Err(ProgramError::PhaseOutOfRange(start_index));
        }
        self.start_index = start_index;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn phase_at(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    /// Sum of all phase durations.
    pub fn cycle_length(&self) -> f64 {
        self.phases.iter().map(Phase::duration).sum()
    }

    pub fn is_green(&self, phase_index: usize, lane_index: usize) -> bool {
        self.phase_at(phase_index)
            .map(|phase| phase.is_green(lane_index))
            .unwrap_or(false)
    }

    /// Number of signals in each state string.
    pub fn signal_count(&self) -> usize {
        self.phases[0].state.len()
    }

    /// Checks the program against an intersection's controlled-lane count.
    pub fn validate_for(&self, lane_count: usize) -> Result<(), ProgramError> {
        if self.signal_count() != lane_count {
            return Err(ProgramError::StateLength {
                index: 0,
                expected: lane_count,
                found: self.signal_count(),
            });
        }
        Ok(())
    }

    /// Builds a new program with the same phase states and recomputed
    /// durations.
    pub fn retimed<F>(&self, name: &str, mut duration_of: F) -> Self
    where
        F: FnMut(usize, &Phase) -> f64,
    {
        let phases = self
            .phases
            .iter()
            .enumerate()
            .map(|(index, phase)| phase.with_duration(duration_of(index, phase)))
            .collect();
        Self {
            name: name.to_string(),
            phases,
            offset: self.offset,
            start_index: self.start_index,
        }
    }

    pub fn to_specs(&self) -> Vec<PhaseSpec> {
        self.phases
            .iter()
            .map(|phase| PhaseSpec {
                duration: phase.duration,
                state: phase.state_string(),
            })
            .collect()
    }

    /// True when both programs have the same phase durations and states.
    pub fn same_timing(&self, other: &Program) -> bool {
        self.phases == other.phases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_is_lossless() {
        let pairs = vec![(20.0, "GGr"), (3.0, "yyr"), (25.5, "rrG"), (3.0, "rry")];
        let program = Program::from_pairs("p", pairs.clone()).unwrap();
        assert_eq!(program.len(), pairs.len());
        for (i, (duration, state)) in pairs.iter().enumerate() {
            let phase = program.phase_at(i).unwrap();
            assert_eq!(phase.duration(), *duration);
            assert_eq!(phase.state_string(), *state);
        }
        assert!(program.phase_at(pairs.len()).is_none());
    }

    #[test]
    fn cycle_length_sums_durations() {
        let program = Program::from_pairs("p", [(20.0, "Gr"), (4.0, "yr"), (20.0, "rG")]).unwrap();
        assert_eq!(program.cycle_length(), 44.0);
    }

    #[test]
    fn green_symbols() {
        let program = Program::from_pairs("p", [(10.0, "Ggyr")]).unwrap();
        assert!(program.is_green(0, 0));
        assert!(program.is_green(0, 1));
        assert!(!program.is_green(0, 2));
        assert!(!program.is_green(0, 3));
        assert!(!program.is_green(0, 4));
        assert!(!program.is_green(1, 0));
    }

    #[test]
    fn rejects_bad_phases() {
        assert_eq!(
            Program::from_pairs::<_, &str>("p", []).unwrap_err(),
            ProgramError::Empty
        );
        assert_eq!(
            Program::from_pairs("p", [(10.0, "Gr"), (0.0, "yr")]).unwrap_err(),
            ProgramError::BadDuration { index: 1, duration: 0.0 }
        );
        assert_eq!(
            Program::from_pairs("p", [(10.0, "Gx")]).unwrap_err(),
            ProgramError::UnknownSymbol { index: 0, symbol: 'x' }
        );
        assert_eq!(
            Program::from_pairs("p", [(10.0, "Gr"), (3.0, "y")]).unwrap_err(),
            ProgramError::StateLength { index: 1, expected: 2, found: 1 }
        );
    }

    #[test]
    fn retimed_keeps_states_and_original() {
        let program = Program::from_pairs("base", [(20.0, "Gr"), (4.0, "yr")]).unwrap();
        let longer = program.retimed("adaptive", |_, phase| phase.duration() * 2.0);
        assert_eq!(longer.name(), "adaptive");
        assert_eq!(longer.phase_at(0).unwrap().duration(), 40.0);
        assert_eq!(longer.phase_at(1).unwrap().state_string(), "yr");
        assert_eq!(program.phase_at(0).unwrap().duration(), 20.0);
        assert!(!program.same_timing(&longer));
    }

    #[test]
    fn validate_against_lane_count() {
        let program = Program::from_pairs("p", [(10.0, "GGr")]).unwrap();
        assert!(program.validate_for(3).is_ok());
        assert!(program.validate_for(2).is_err());
    }
}
