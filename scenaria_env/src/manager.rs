//! Entity manager collaborator interface.
//!
//! The manager owns the entity set and answers spatial queries; the
//! simulation facade coordinates it with the backend RPC bridge but
//! implements none of this itself.

use crate::status::{CoordinateFrame, EntityStatus, LaneletId, Pose};

/// Lateral lane-change direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Target of a lane-change request: an explicit lanelet or a direction
/// relative to the entity's current lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneChangeTarget {
    Lanelet(LaneletId),
    Direction(Direction),
}

/// Spawn-time classification of a simulated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// The controlled ego vehicle
    Ego,

    /// A non-ego vehicle
    Vehicle,

    /// A pedestrian
    Pedestrian,
}

/// A request to register a new entity with the manager.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// Entity name, unique within a simulation run
    pub name: String,

    /// Actor classification
    pub kind: EntityKind,

    /// Optional initial status
    pub status: Option<EntityStatus>,
}

/// Abstraction over the entity registry and its spatial queries.
///
/// Commands (`request_*`, `set_target_speed`) are fire-and-forget; errors
/// surface only on the next status query. Queries return `None`/`false`
/// for unknown entities or undefined quantities (normal negative results,
/// not errors).
pub trait EntityManager {
    /// Registers a new entity. Returns `false` if the name is taken or the
    /// request is otherwise rejected.
    fn spawn_entity(&mut self, request: SpawnRequest) -> bool;

    /// True once a status has been set for the named entity.
    fn has_entity_status(&self, name: &str) -> bool;

    /// Current status expressed in the requested frame, or `None` when no
    /// status exists or the conversion is undefined.
    fn get_entity_status(&self, name: &str, frame: CoordinateFrame) -> Option<EntityStatus>;

    /// Replaces the entity's status wholesale. Returns `false` for an
    /// unknown entity.
    fn set_entity_status(&mut self, name: &str, status: EntityStatus) -> bool;

    /// Pose of `to` expressed in `from`'s body frame.
    fn get_relative_pose(&self, from: &str, to: &str) -> Option<Pose>;

    /// Forward distance along the lane network from `from` to `to`;
    /// `None` when undefined (unrelated lanes, `to` behind `from`).
    fn get_longitudinal_distance(&self, from: &str, to: &str) -> Option<f64>;

    /// Routes the entity toward a lane position.
    fn request_acquire_position(&mut self, name: &str, lanelet_id: LaneletId, s: f64, offset: f64);

    /// Starts a lane change toward the given target.
    fn request_lane_change(&mut self, name: &str, target: LaneChangeTarget);

    /// Tolerance-based reach test against a world pose.
    fn reach_position(&self, name: &str, target: &Pose, tolerance: f64) -> bool;

    /// Tolerance-based reach test against a lane position.
    fn reach_lane_position(
        &self,
        name: &str,
        lanelet_id: LaneletId,
        s: f64,
        offset: f64,
        tolerance: f64,
    ) -> bool;

    /// Seconds the entity has been standing still, `None` if unknown or
    /// currently moving.
    fn get_stand_still_duration(&self, name: &str) -> Option<f64>;

    /// Sets the speed the entity's controller should track. With
    /// `continuous` the target is held after being reached.
    fn set_target_speed(&mut self, name: &str, target_speed: f64, continuous: bool);

    /// Toggles verbose diagnostics.
    fn set_verbose(&mut self, verbose: bool);

    /// Names of all registered entities, in a stable order.
    fn entity_names(&self) -> Vec<String>;
}
