//! Scenaria Entity Simulation Kernel
//!
//! A synchronous facade over an entity manager, a lanelet map, and a
//! blocking RPC bridge, plus an in-process harness that runs whole
//! scenario executions without an external backend.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                        │
//! │  (ground-truth kinematics, one update_frame per frame)    │
//! │        │                                                  │
//! │  ┌─────▼─────────────────────────────────────────┐        │
//! │  │                 EntityApi                     │        │
//! │  │  spawn / query / command / behavior ticks     │        │
//! │  └───┬─────────────────┬─────────────────┬───────┘        │
//! │      │                 │                 │                │
//! │  ┌───▼──────────┐ ┌────▼────────┐ ┌──────▼─────────┐      │
//! │  │EntityManager │ │ LaneletMap  │ │SimulationContext│     │
//! │  │ (registry +  │ │ (geometry)  │ │ (RPC channel)   │     │
//! │  │  queries)    │ │             │ │                 │     │
//! │  └──────────────┘ └─────────────┘ └────────────────┘      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use scenaria_sim::{RunConfig, ScenarioRunner};
//!
//! let mut runner = ScenarioRunner::new(RunConfig::default());
//! let result = runner.run()?;
//! assert!(result.ego_stopped);
//! ```

mod api;
mod backend;
mod behavior;
mod catalog;
mod context;
mod manager;
mod map;
pub mod marshal;
mod runner;

pub use api::EntityApi;
pub use backend::SimBackend;
pub use behavior::{
    BehaviorInput, NodeStatus, Obstacle, ObstacleKind, StopAtCrossingEntity, TickOutput, Waypoint,
};
pub use catalog::{
    classify_description, sample_pedestrian, sample_vehicle, BoundingBox, PedestrianParameters,
    Performance, VehicleParameters,
};
pub use context::SimulationContext;
pub use manager::SimEntityManager;
pub use map::SimLaneletMap;
pub use runner::{demo_map, RunConfig, RunResult, ScenarioRunner};
