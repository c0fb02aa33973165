//! In-process entity manager for harness runs.
//!
//! Keeps the authoritative entity registry in a deterministic map and
//! answers every spatial query through the straight-segment lanelet
//! map, so a full run needs no external process.

use std::collections::BTreeMap;
use std::sync::Arc;

use nalgebra::UnitQuaternion;
use tracing::debug;

use scenaria_env::{
    CoordinateFrame, EntityKind, EntityManager, EntityStatus, LaneChangeTarget, LaneletId,
    LaneletMap, Pose, SpawnRequest,
};

use crate::map::SimLaneletMap;

/// Speed below which an entity counts as standing still, m/s.
const STAND_STILL_SPEED: f64 = 1e-3;

/// Lookahead used for longitudinal distance queries, meters.
const DISTANCE_HORIZON: f64 = 300.0;

#[derive(Debug, Clone)]
struct EntityRecord {
    kind: EntityKind,
    status: Option<EntityStatus>,

    /// Simulation time at which the entity last came to rest
    stand_still_since: Option<f64>,

    target_speed: Option<(f64, bool)>,
    acquire_target: Option<(LaneletId, f64, f64)>,
    lane_change: Option<LaneChangeTarget>,
}

/// Entity registry backed by a [`SimLaneletMap`].
pub struct SimEntityManager {
    map: Arc<SimLaneletMap>,
    entities: BTreeMap<String, EntityRecord>,
    verbose: bool,
}

impl SimEntityManager {
    pub fn new(map: Arc<SimLaneletMap>) -> Self {
        Self {
            map,
            entities: BTreeMap::new(),
            verbose: false,
        }
    }

    /// The map this manager resolves lane geometry against.
    pub fn map(&self) -> &Arc<SimLaneletMap> {
        &self.map
    }

    /// Classification recorded at spawn time.
    pub fn entity_kind(&self, name: &str) -> Option<EntityKind> {
        self.entities.get(name).map(|record| record.kind)
    }

    /// Speed target last requested for the entity.
    pub fn target_speed(&self, name: &str) -> Option<(f64, bool)> {
        self.entities.get(name).and_then(|record| record.target_speed)
    }

    /// Acquire-position route last requested for the entity.
    pub fn acquire_target(&self, name: &str) -> Option<(LaneletId, f64, f64)> {
        self.entities.get(name).and_then(|record| record.acquire_target)
    }

    fn status_in_frame(&self, status: &EntityStatus, frame: CoordinateFrame) -> Option<EntityStatus> {
        if status.coordinate() == frame {
            return Some(status.clone());
        }
        match frame {
            CoordinateFrame::World => {
                let (lanelet_id, s, offset) = status.lane_position().ok()?;
                let rpy = status.lane_rpy().ok()?;
                let lane_pose = self.map.lanelet_pose(lanelet_id, s, offset).ok()?;
                let orientation =
                    lane_pose.orientation * UnitQuaternion::from_euler_angles(rpy.x, rpy.y, rpy.z);
                Some(EntityStatus::new_world(
                    status.time,
                    Pose::new(lane_pose.position, orientation),
                    status.twist,
                    status.accel,
                ))
            }
            CoordinateFrame::Lane => {
                let pose = status.world_pose().ok()?;
                let (lanelet_id, s, offset) = self.map.closest_lane_position(&pose.position)?;
                let lane_pose = self.map.lanelet_pose(lanelet_id, s, offset).ok()?;
                let relative = lane_pose.orientation.inverse() * pose.orientation;
                let (roll, pitch, yaw) = relative.euler_angles();
                Some(EntityStatus::new_lane(
                    status.time,
                    lanelet_id,
                    s,
                    offset,
                    nalgebra::Vector3::new(roll, pitch, yaw),
                    status.twist,
                    status.accel,
                ))
            }
        }
    }
}

impl EntityManager for SimEntityManager {
    fn spawn_entity(&mut self, request: SpawnRequest) -> bool {
        if self.entities.contains_key(&request.name) {
            debug!(name = %request.name, "spawn rejected, name taken");
            return false;
        }
        let stand_still_since = request.status.as_ref().and_then(|status| {
            (status.twist.linear.norm() < STAND_STILL_SPEED).then_some(status.time)
        });
        self.entities.insert(
            request.name.clone(),
            EntityRecord {
                kind: request.kind,
                status: request.status,
                stand_still_since,
                target_speed: None,
                acquire_target: None,
                lane_change: None,
            },
        );
        debug!(name = %request.name, kind = ?request.kind, "entity spawned");
        true
    }

    fn has_entity_status(&self, name: &str) -> bool {
        self.entities
            .get(name)
            .map(|record| record.status.is_some())
            .unwrap_or(false)
    }

    fn get_entity_status(&self, name: &str, frame: CoordinateFrame) -> Option<EntityStatus> {
        let status = self.entities.get(name)?.status.as_ref()?;
        self.status_in_frame(status, frame)
    }

    fn set_entity_status(&mut self, name: &str, status: EntityStatus) -> bool {
        let Some(record) = self.entities.get_mut(name) else {
            return false;
        };
        let moving = status.twist.linear.norm() >= STAND_STILL_SPEED;
        record.stand_still_since = if moving {
            None
        } else {
            record.stand_still_since.or(Some(status.time))
        };
        record.status = Some(status);
        true
    }

    fn get_relative_pose(&self, from: &str, to: &str) -> Option<Pose> {
        let from_status = self.get_entity_status(from, CoordinateFrame::World)?;
        let from_pose = from_status.world_pose().ok()?;
        let to_status = self.get_entity_status(to, CoordinateFrame::World)?;
        let to_pose = to_status.world_pose().ok()?;
        let rotation = from_pose.orientation.inverse();
        let position = rotation * (to_pose.position - from_pose.position);
        Some(Pose::new(
            nalgebra::Point3::from(position),
            rotation * to_pose.orientation,
        ))
    }

    fn get_longitudinal_distance(&self, from: &str, to: &str) -> Option<f64> {
        let (from_lanelet, from_s, _) = self
            .get_entity_status(from, CoordinateFrame::Lane)?
            .lane_position()
            .ok()?;
        let (to_lanelet, to_s, _) = self
            .get_entity_status(to, CoordinateFrame::Lane)?
            .lane_position()
            .ok()?;

        let route = self.map.following_lanelets(from_lanelet, DISTANCE_HORIZON);
        let mut covered = -from_s;
        for lanelet_id in route {
            if lanelet_id == to_lanelet {
                let distance = covered + to_s;
                return (distance >= 0.0).then_some(distance);
            }
            covered += self.map.lanelet_length(lanelet_id)?;
        }
        None
    }

    fn request_acquire_position(&mut self, name: &str, lanelet_id: LaneletId, s: f64, offset: f64) {
        if let Some(record) = self.entities.get_mut(name) {
            record.acquire_target = Some((lanelet_id, s, offset));
            debug!(name, lanelet_id, s, "acquire position requested");
        }
    }

    fn request_lane_change(&mut self, name: &str, target: LaneChangeTarget) {
        if let Some(record) = self.entities.get_mut(name) {
            record.lane_change = Some(target);
            debug!(name, ?target, "lane change requested");
        }
    }

    fn reach_position(&self, name: &str, target: &Pose, tolerance: f64) -> bool {
        self.get_entity_status(name, CoordinateFrame::World)
            .and_then(|status| status.world_pose().ok().copied())
            .map(|pose| pose.distance_to(target) <= tolerance)
            .unwrap_or(false)
    }

    fn reach_lane_position(
        &self,
        name: &str,
        lanelet_id: LaneletId,
        s: f64,
        offset: f64,
        tolerance: f64,
    ) -> bool {
        match self.map.lanelet_pose(lanelet_id, s, offset) {
            Ok(target) => self.reach_position(name, &target, tolerance),
            Err(_) => false,
        }
    }

    fn get_stand_still_duration(&self, name: &str) -> Option<f64> {
        let record = self.entities.get(name)?;
        let status = record.status.as_ref()?;
        let since = record.stand_still_since?;
        Some(status.time - since)
    }

    fn set_target_speed(&mut self, name: &str, target_speed: f64, continuous: bool) {
        if let Some(record) = self.entities.get_mut(name) {
            record.target_speed = Some((target_speed, continuous));
            debug!(name, target_speed, continuous, "target speed set");
        }
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn entity_names(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }
}
