//! Lanelet map collaborator interface.
//!
//! Map topology is consumed as an opaque capability: given a lane id, an
//! arc length, and an offset, produce a pose; given a lane sequence, yield
//! its crossing hazards.

use nalgebra::Point3;

use crate::error::SimError;
use crate::status::{LaneletId, Pose};

/// A crossing hazard on a route, as reported by the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossingConflict {
    /// The lanelet crossing the route
    pub crossing_lanelet: LaneletId,

    /// Distance along the route from the query position to the conflict
    /// point, in meters
    pub distance: f64,
}

/// Abstraction over lanelet/map geometry queries.
pub trait LaneletMap {
    /// Total centerline arc length of a lanelet, `None` for unknown ids.
    fn lanelet_length(&self, lanelet_id: LaneletId) -> Option<f64>;

    /// Lanelets reachable ahead within `horizon` meters, in travel order,
    /// starting with `lanelet_id` itself. Unknown ids yield an empty
    /// sequence.
    fn following_lanelets(&self, lanelet_id: LaneletId, horizon: f64) -> Vec<LaneletId>;

    /// World pose at arc length `s` and lateral `offset` along a lanelet.
    fn lanelet_pose(&self, lanelet_id: LaneletId, s: f64, offset: f64) -> Result<Pose, SimError>;

    /// Centerline sample points of a lanelet.
    fn center_points(&self, lanelet_id: LaneletId) -> Vec<Point3<f64>>;

    /// Crossing/intersection hazards on a lane sequence, with distances
    /// measured along the route from arc length `from_s` on its first
    /// lanelet. Conflict points already passed are omitted.
    fn crossing_conflicts(&self, route: &[LaneletId], from_s: f64) -> Vec<CrossingConflict>;
}
