//! Concurrent coordination engine for a fleet of rescue drones.
//!
//! This crate is the library half of `rescue-coord-server`: everything the
//! `rescue-coordd` binary wires together, plus the small public surface
//! external collaborators (a grid renderer, a survivor generator, a
//! metrics logger, a CLI) build against instead of reaching into module
//! internals.

pub mod config;
pub mod listener;
pub mod matcher;
pub mod metrics;
pub mod reaper;
pub mod registry;
pub mod session;
pub mod supervisor;
pub mod world;

pub use config::ServerConfig;
pub use metrics::{Counters, CountersSnapshot};
pub use registry::{DroneCell, DroneId, DroneState, Registry, RegistryError};
pub use supervisor::{Supervisor, SupervisorHandles};
pub use world::{Survivor, SurvivorCounts, SurvivorSet, World, WorldError};
