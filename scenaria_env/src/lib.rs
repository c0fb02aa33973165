//! Scenaria Environment Abstraction Layer
//!
//! This crate defines the seams between the scenario execution core and
//! its external collaborators:
//! - **Entity manager** (`EntityManager`): spatial indexing and
//!   positional queries over the entity set
//! - **Map** (`LaneletMap`): lanelet geometry as an opaque capability
//! - **Backend** (`BackendChannel`): the physics/rendering process
//!   reached over a blocking, strictly serialized RPC connection
//!
//! plus the value types they exchange (`EntityStatus` and friends) and
//! the error taxonomy (`SimError`).
//!
//! The kernel consumes these traits; the simulation harness provides
//! in-memory implementations, and production deployments wire in the
//! real collaborators.

mod channel;
mod error;
mod manager;
mod map;
mod status;

pub use channel::BackendChannel;
pub use error::SimError;
pub use manager::{Direction, EntityKind, EntityManager, LaneChangeTarget, SpawnRequest};
pub use map::{CrossingConflict, LaneletMap};
pub use status::{Accel, CoordinateFrame, EntityStatus, FramePose, LaneletId, Pose, Twist};
