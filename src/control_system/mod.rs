pub mod baseline;
pub mod duration_policy;
pub mod intersection;
pub mod phase_program;
pub mod traffic_light_controller;

pub use duration_policy::DurationPolicy;
pub use intersection::{ControlMode, Intersection};
pub use phase_program::{Phase, PhaseSpec, Program, Signal};
pub use traffic_light_controller::{StepReport, TrafficLightController};
