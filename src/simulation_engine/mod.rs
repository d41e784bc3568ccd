// simulation_engine/mod.rs
pub mod incident_injector;
pub mod route_generation;
pub mod scenario;
pub mod simulator;
pub mod world;

pub use simulator::Simulator;
pub use world::GridWorld;
