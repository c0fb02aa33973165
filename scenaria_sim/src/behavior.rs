//! Behavior evaluation nodes.
//!
//! A node is a tick-driven decision unit, one instance per controllable
//! entity per behavior. Each tick is a pure function of the current
//! map + entity state; the only state carried across ticks is the
//! remembered stop-target distance, discarded with the node.

use tracing::debug;

use scenaria_env::{EntityStatus, LaneletId, LaneletMap, Pose, SimError};

/// Result of one behavior tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Still approaching or monitoring a hazard
    Running,

    /// Clear of the governed hazard
    Success,

    /// Unrecoverable geometry lookup failure
    Failure,
}

/// One forward path sample point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub pose: Pose,
}

/// Kind of a path obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleKind {
    /// A crossing entity conflicts with the path
    Entity,
}

/// Descriptor of the nearest hazard intersecting the computed path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub kind: ObstacleKind,

    /// Arc length along the waypoint path to the hazard
    pub s: f64,

    /// Pose of the conflict point
    pub pose: Pose,
}

/// Everything a behavior node needs for one tick, assembled by the
/// facade from the entity manager and the map.
pub struct BehaviorInput<'a, L: LaneletMap> {
    /// Current lane-frame status of the controlled entity
    pub status: EntityStatus,

    /// Lane sequence ahead of the entity, in travel order
    pub following_lanelets: Vec<LaneletId>,

    /// Lane-frame statuses of all other entities
    pub others: Vec<(String, EntityStatus)>,

    /// Map geometry
    pub map: &'a L,
}

/// Output of one behavior tick.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub status: NodeStatus,

    /// Reduced target speed while a hazard governs; `None` hands speed
    /// control back to the default cruising logic
    pub target_speed: Option<f64>,

    /// Forward path sample points for visualization/control
    pub waypoints: Vec<Waypoint>,

    /// Nearest hazard on the path, if any
    pub obstacle: Option<Obstacle>,
}

impl TickOutput {
    fn failure() -> Self {
        Self {
            status: NodeStatus::Failure,
            target_speed: None,
            waypoints: Vec::new(),
            obstacle: None,
        }
    }
}

/// Stops the controlled vehicle ahead of an entity crossing its lane
/// sequence.
pub struct StopAtCrossingEntity {
    /// Braking-relevant lookahead in meters
    horizon: f64,

    /// Distance kept between the stop point and the conflict point
    stop_margin: f64,

    /// Deceleration used for the braking profile, m/s^2
    max_deceleration: f64,

    /// Waypoint sampling interval in meters
    waypoint_interval: f64,

    /// Remembered distance to the governing stop target, carried across
    /// ticks of this node instance
    distance_to_stop_target: Option<f64>,
}

impl Default for StopAtCrossingEntity {
    fn default() -> Self {
        Self::new()
    }
}

impl StopAtCrossingEntity {
    /// Creates a node with default braking parameters.
    pub fn new() -> Self {
        Self {
            horizon: 50.0,
            stop_margin: 5.0,
            max_deceleration: 7.0,
            waypoint_interval: 1.0,
            distance_to_stop_target: None,
        }
    }

    /// Sets the braking-relevant lookahead.
    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = horizon;
        self
    }

    /// Sets the deceleration used for the braking profile.
    pub fn with_deceleration(mut self, max_deceleration: f64) -> Self {
        self.max_deceleration = max_deceleration;
        self
    }

    /// Sets the stop margin ahead of the conflict point.
    pub fn with_stop_margin(mut self, stop_margin: f64) -> Self {
        self.stop_margin = stop_margin;
        self
    }

    /// Remembered stop-target distance, if a hazard currently governs.
    pub fn distance_to_stop_target(&self) -> Option<f64> {
        self.distance_to_stop_target
    }

    /// Inspects the lane sequence ahead for a crossing-entity hazard.
    ///
    /// Returns a decelerating target speed derived from the remaining
    /// distance while a hazard is within braking-relevant range, `None`
    /// when no hazard governs speed.
    pub fn calculate_target_speed<L: LaneletMap>(
        &mut self,
        input: &BehaviorInput<'_, L>,
        current_velocity: f64,
    ) -> Option<f64> {
        let (_, s, _) = input.status.lane_position().ok()?;

        let conflicts = input.map.crossing_conflicts(&input.following_lanelets, s);
        let hazard = conflicts
            .iter()
            .filter(|conflict| {
                input.others.iter().any(|(_, other)| {
                    other
                        .lane_position()
                        .map(|(id, _, _)| id == conflict.crossing_lanelet)
                        .unwrap_or(false)
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance));

        let hazard = match hazard {
            Some(hazard) if hazard.distance <= self.horizon => hazard,
            _ => {
                self.distance_to_stop_target = None;
                return None;
            }
        };

        let stop_distance = (hazard.distance - self.stop_margin).max(0.0);
        self.distance_to_stop_target = Some(stop_distance);

        // v = sqrt(2 a d): the speed from which the remaining distance
        // suffices to stop at max_deceleration.
        let braking_speed = (2.0 * self.max_deceleration * stop_distance).sqrt();
        debug!(
            distance = stop_distance,
            braking_speed, current_velocity, "crossing hazard governs target speed"
        );
        Some(braking_speed)
    }

    /// Produces the forward path sample points from the current lane
    /// sequence.
    pub fn calculate_waypoints<L: LaneletMap>(
        &self,
        input: &BehaviorInput<'_, L>,
    ) -> Result<Vec<Waypoint>, SimError> {
        let (lanelet_id, s, offset) = input.status.lane_position()?;

        let mut waypoints = Vec::new();
        let mut distance = 0.0;
        while distance <= self.horizon {
            if let Some(pose) = pose_along_route(
                input.map,
                &input.following_lanelets,
                lanelet_id,
                s + distance,
                offset,
            )? {
                waypoints.push(Waypoint { pose });
            } else {
                break;
            }
            distance += self.waypoint_interval;
        }
        Ok(waypoints)
    }

    /// Returns the nearest hazard intersecting the computed path, sized
    /// from the remembered stop-target distance; `None` when nothing
    /// conflicts.
    pub fn calculate_obstacle(&self, waypoints: &[Waypoint]) -> Option<Obstacle> {
        let distance = self.distance_to_stop_target?;
        if waypoints.is_empty() {
            return None;
        }
        let index = ((distance / self.waypoint_interval).round() as usize).min(waypoints.len() - 1);
        Some(Obstacle {
            kind: ObstacleKind::Entity,
            s: distance,
            pose: waypoints[index].pose,
        })
    }

    /// Evaluates one tick against the current map + entity state.
    pub fn tick<L: LaneletMap>(&mut self, input: &BehaviorInput<'_, L>) -> TickOutput {
        if input.status.lane_position().is_err() {
            return TickOutput::failure();
        }

        let waypoints = match self.calculate_waypoints(input) {
            Ok(waypoints) => waypoints,
            Err(_) => return TickOutput::failure(),
        };

        let current_velocity = input.status.twist.linear.x;
        let target_speed = self.calculate_target_speed(input, current_velocity);
        let obstacle = self.calculate_obstacle(&waypoints);

        let status = if target_speed.is_some() {
            NodeStatus::Running
        } else {
            NodeStatus::Success
        };

        TickOutput {
            status,
            target_speed,
            waypoints,
            obstacle,
        }
    }
}

/// Resolves an arc position measured along a lane sequence into a world
/// pose. Returns `Ok(None)` past the end of the sequence.
fn pose_along_route<L: LaneletMap>(
    map: &L,
    route: &[LaneletId],
    start_lanelet: LaneletId,
    mut s: f64,
    offset: f64,
) -> Result<Option<Pose>, SimError> {
    let route = if route.is_empty() {
        std::slice::from_ref(&start_lanelet)
    } else {
        route
    };

    for lanelet_id in route {
        let length = map.lanelet_length(*lanelet_id).ok_or_else(|| {
            SimError::configuration(format!("unknown lanelet in route: {}", lanelet_id))
        })?;
        if s <= length {
            return map.lanelet_pose(*lanelet_id, s, offset).map(Some);
        }
        s -= length;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::SimLaneletMap;
    use nalgebra::Vector3;
    use scenaria_env::{Accel, Twist};

    fn lane_status(lanelet_id: LaneletId, s: f64, speed: f64) -> EntityStatus {
        EntityStatus::new_lane(
            0.0,
            lanelet_id,
            s,
            0.0,
            Vector3::zeros(),
            Twist {
                linear: Vector3::new(speed, 0.0, 0.0),
                angular: Vector3::zeros(),
            },
            Accel::zero(),
        )
    }

    /// Straight lane 1 (100 m) with lane 100 crossing it at s = 40.
    fn crossing_map() -> SimLaneletMap {
        let mut map = SimLaneletMap::new();
        map.add_lanelet(1, nalgebra::Point3::origin(), 0.0, 100.0);
        map.add_lanelet(
            100,
            nalgebra::Point3::new(40.0, -10.0, 0.0),
            std::f64::consts::FRAC_PI_2,
            20.0,
        );
        map.add_crossing(1, 40.0, 100);
        map
    }

    #[test]
    fn test_no_hazard_without_crossing_entity() {
        let map = crossing_map();
        let mut node = StopAtCrossingEntity::new();
        let input = BehaviorInput {
            status: lane_status(1, 0.0, 8.0),
            following_lanelets: vec![1],
            others: vec![],
            map: &map,
        };

        let output = node.tick(&input);
        assert_eq!(output.status, NodeStatus::Success);
        assert_eq!(output.target_speed, None);
        assert_eq!(output.obstacle, None);
        assert!(!output.waypoints.is_empty());
    }

    #[test]
    fn test_crossing_entity_reduces_target_speed() {
        let map = crossing_map();
        let mut node = StopAtCrossingEntity::new();
        let input = BehaviorInput {
            status: lane_status(1, 10.0, 8.0),
            following_lanelets: vec![1],
            others: vec![("pedestrian".to_owned(), lane_status(100, 10.0, 1.0))],
            map: &map,
        };

        let output = node.tick(&input);
        assert_eq!(output.status, NodeStatus::Running);

        // Conflict at s=40, entity at s=10: 30 m ahead, 25 m stop
        // distance after the 5 m margin.
        let target = output.target_speed.unwrap();
        let expected = (2.0f64 * 7.0 * 25.0).sqrt();
        assert!((target - expected).abs() < 1e-9);
        assert_eq!(node.distance_to_stop_target(), Some(25.0));

        let obstacle = output.obstacle.unwrap();
        assert_eq!(obstacle.kind, ObstacleKind::Entity);
        assert!((obstacle.s - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_hazard_beyond_horizon_does_not_govern() {
        let map = crossing_map();
        let mut node = StopAtCrossingEntity::new().with_horizon(20.0);
        let input = BehaviorInput {
            status: lane_status(1, 0.0, 8.0),
            following_lanelets: vec![1],
            others: vec![("pedestrian".to_owned(), lane_status(100, 10.0, 1.0))],
            map: &map,
        };

        // Conflict 40 m ahead, horizon 20 m.
        let output = node.tick(&input);
        assert_eq!(output.status, NodeStatus::Success);
        assert_eq!(output.target_speed, None);
    }

    #[test]
    fn test_stop_target_clears_after_passing_conflict() {
        let map = crossing_map();
        let mut node = StopAtCrossingEntity::new();

        let approaching = BehaviorInput {
            status: lane_status(1, 20.0, 5.0),
            following_lanelets: vec![1],
            others: vec![("pedestrian".to_owned(), lane_status(100, 10.0, 1.0))],
            map: &map,
        };
        assert_eq!(node.tick(&approaching).status, NodeStatus::Running);

        // Pedestrian left the crossing lane.
        let cleared = BehaviorInput {
            status: lane_status(1, 20.0, 5.0),
            following_lanelets: vec![1],
            others: vec![],
            map: &map,
        };
        let output = node.tick(&cleared);
        assert_eq!(output.status, NodeStatus::Success);
        assert_eq!(node.distance_to_stop_target(), None);
    }

    #[test]
    fn test_world_frame_status_fails_tick() {
        let map = crossing_map();
        let mut node = StopAtCrossingEntity::new();
        let input = BehaviorInput {
            status: EntityStatus::new_world(0.0, Pose::identity(), Twist::zero(), Accel::zero()),
            following_lanelets: vec![1],
            others: vec![],
            map: &map,
        };
        assert_eq!(node.tick(&input).status, NodeStatus::Failure);
    }

    #[test]
    fn test_unknown_route_lanelet_fails_tick() {
        let map = crossing_map();
        let mut node = StopAtCrossingEntity::new();
        let input = BehaviorInput {
            status: lane_status(999, 0.0, 5.0),
            following_lanelets: vec![999],
            others: vec![],
            map: &map,
        };
        assert_eq!(node.tick(&input).status, NodeStatus::Failure);
    }

    #[test]
    fn test_waypoints_follow_lane_sequence() {
        let mut map = SimLaneletMap::new();
        map.add_lanelet(1, nalgebra::Point3::origin(), 0.0, 10.0);
        map.add_lanelet(2, nalgebra::Point3::new(10.0, 0.0, 0.0), 0.0, 100.0);
        map.connect(1, 2);

        let node = StopAtCrossingEntity::new().with_horizon(15.0);
        let input = BehaviorInput {
            status: lane_status(1, 5.0, 5.0),
            following_lanelets: vec![1, 2],
            others: vec![],
            map: &map,
        };

        let waypoints = node.calculate_waypoints(&input).unwrap();
        // Horizon 15 m sampled at 1 m: 16 points, crossing onto lane 2.
        assert_eq!(waypoints.len(), 16);
        assert!((waypoints[0].pose.position.x - 5.0).abs() < 1e-9);
        assert!((waypoints[15].pose.position.x - 20.0).abs() < 1e-9);
    }
}
