//! Entity simulation facade.
//!
//! The single entry point scenario logic calls to spawn, query, and
//! command entities. The facade owns no entity state itself: it
//! coordinates the entity manager collaborator with the blocking RPC
//! bridge, and drives the per-entity behavior nodes once per frame.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::{debug, info, warn};

use scenaria_env::{
    CoordinateFrame, EntityManager, EntityStatus, LaneChangeTarget, LaneletId, LaneletMap, Pose,
    SimError, SpawnRequest,
};

use crate::behavior::{BehaviorInput, StopAtCrossingEntity, TickOutput};
use crate::catalog::{classify_description, PedestrianParameters, VehicleParameters};
use crate::context::SimulationContext;
use crate::marshal;

/// Route lookahead used when assembling behavior inputs, meters.
const ROUTE_HORIZON: f64 = 100.0;

/// Facade over the entity manager, the map, and the RPC bridge.
///
/// The manager lock is held for the whole of each per-frame update, so
/// callers never observe a partially updated entity set.
pub struct EntityApi<M: EntityManager, L: LaneletMap> {
    context: Arc<SimulationContext>,
    manager: Arc<Mutex<M>>,
    map: Arc<L>,
    behaviors: Vec<(String, StopAtCrossingEntity)>,
}

impl<M: EntityManager, L: LaneletMap> EntityApi<M, L> {
    pub fn new(context: Arc<SimulationContext>, manager: Arc<Mutex<M>>, map: Arc<L>) -> Self {
        Self {
            context,
            manager,
            map,
            behaviors: Vec::new(),
        }
    }

    /// Spawns an entity from a raw actor description.
    ///
    /// Classifies the description by its top-level section, registers
    /// the entity locally when a class is recognized, and issues the
    /// backend spawn call either way; an unrecognized description leaves
    /// validation to the backend. Returns `false` when local
    /// registration or the backend's reported `success` is false. A
    /// protocol fault on the channel is an error, distinct from a
    /// reported `success=false`.
    pub fn spawn_raw(
        &self,
        is_ego: bool,
        name: &str,
        description: &str,
        status: Option<EntityStatus>,
    ) -> Result<bool, SimError> {
        let kind = classify_description(description, is_ego);
        let local = match kind {
            Some(kind) => {
                let registered = self.manager.lock().unwrap().spawn_entity(SpawnRequest {
                    name: name.to_owned(),
                    kind,
                    status: status.clone(),
                });
                if !registered {
                    warn!(name, "local entity registration rejected");
                }
                registered
            }
            None => {
                debug!(name, "unclassified description, deferring to backend");
                true
            }
        };

        let mut params = match &status {
            Some(status) => marshal::to_value(name, status),
            None => json!({ "entity/name": name }),
        };
        if let Some(object) = params.as_object_mut() {
            object.insert("entity/is_ego".to_owned(), json!(is_ego));
            object.insert("description".to_owned(), json!(description));
        }

        let request = marshal::multicall("spawn_entity", params);
        let response = self.context.execute(&request)?;
        let backend = marshal::multicall_success(&response)?;
        info!(name, is_ego, local, backend, "spawn");
        Ok(local && backend)
    }

    /// Spawns a vehicle from catalog parameters.
    pub fn spawn_vehicle(
        &self,
        is_ego: bool,
        name: &str,
        parameters: &VehicleParameters,
        status: Option<EntityStatus>,
    ) -> Result<bool, SimError> {
        self.spawn_raw(is_ego, name, &parameters.to_description(), status)
    }

    /// Spawns a pedestrian from catalog parameters.
    pub fn spawn_pedestrian(
        &self,
        name: &str,
        parameters: &PedestrianParameters,
        status: Option<EntityStatus>,
    ) -> Result<bool, SimError> {
        self.spawn_raw(false, name, &parameters.to_description(), status)
    }

    /// Current status in the requested frame.
    ///
    /// An entity without a status yet is an error carrying the entity
    /// name, never a default-constructed status.
    pub fn get_entity_status(
        &self,
        name: &str,
        frame: CoordinateFrame,
    ) -> Result<EntityStatus, SimError> {
        self.manager
            .lock()
            .unwrap()
            .get_entity_status(name, frame)
            .ok_or_else(|| SimError::lookup(name))
    }

    /// Replaces an entity's status wholesale.
    pub fn set_entity_status(&self, name: &str, status: EntityStatus) -> bool {
        self.manager.lock().unwrap().set_entity_status(name, status)
    }

    /// Forward distance along the lane network, `None` when undefined.
    pub fn get_longitudinal_distance(&self, from: &str, to: &str) -> Option<f64> {
        self.manager.lock().unwrap().get_longitudinal_distance(from, to)
    }

    /// Pose of `to` expressed in `from`'s body frame.
    pub fn get_relative_pose(&self, from: &str, to: &str) -> Option<Pose> {
        self.manager.lock().unwrap().get_relative_pose(from, to)
    }

    /// Time gap until `from` reaches `to`'s current position.
    ///
    /// `None` unless both statuses are known and `to` is strictly ahead
    /// (`from` at negative x in `to`'s body frame). A zero forward speed
    /// yields positive infinity, not an error.
    pub fn get_time_headway(&self, from: &str, to: &str) -> Option<f64> {
        let manager = self.manager.lock().unwrap();
        let relative = manager.get_relative_pose(to, from)?;
        if relative.position.x >= 0.0 {
            return None;
        }
        let speed = manager
            .get_entity_status(to, CoordinateFrame::Lane)
            .or_else(|| manager.get_entity_status(to, CoordinateFrame::World))?
            .twist
            .forward_speed();
        let headway = -relative.position.x / speed;
        if headway.is_nan() {
            Some(f64::INFINITY)
        } else {
            Some(headway)
        }
    }

    /// Routes the entity toward a lane position. Fire-and-forget.
    pub fn request_acquire_position(&self, name: &str, lanelet_id: LaneletId, s: f64, offset: f64) {
        self.manager
            .lock()
            .unwrap()
            .request_acquire_position(name, lanelet_id, s, offset);
    }

    /// Starts a lane change toward the given target. Fire-and-forget.
    pub fn request_lane_change(&self, name: &str, target: LaneChangeTarget) {
        self.manager.lock().unwrap().request_lane_change(name, target);
    }

    /// Advisory containment check; swallows status errors and answers
    /// `false` rather than failing.
    pub fn is_in_lanelet(&self, name: &str, lanelet_id: LaneletId) -> bool {
        self.manager
            .lock()
            .unwrap()
            .get_entity_status(name, CoordinateFrame::Lane)
            .and_then(|status| status.lane_position().ok())
            .map(|(id, _, _)| id == lanelet_id)
            .unwrap_or(false)
    }

    /// Tolerance-based reach test; `false` whenever status is unknown.
    pub fn reach_position(&self, name: &str, target: &Pose, tolerance: f64) -> bool {
        self.manager.lock().unwrap().reach_position(name, target, tolerance)
    }

    /// Tolerance-based reach test against a lane position.
    pub fn reach_lane_position(
        &self,
        name: &str,
        lanelet_id: LaneletId,
        s: f64,
        offset: f64,
        tolerance: f64,
    ) -> bool {
        self.manager
            .lock()
            .unwrap()
            .reach_lane_position(name, lanelet_id, s, offset, tolerance)
    }

    /// Seconds the entity has been standing still.
    pub fn get_stand_still_duration(&self, name: &str) -> Option<f64> {
        self.manager.lock().unwrap().get_stand_still_duration(name)
    }

    /// Sets the speed the entity's controller should track.
    pub fn set_target_speed(&self, name: &str, target_speed: f64, continuous: bool) {
        self.manager
            .lock()
            .unwrap()
            .set_target_speed(name, target_speed, continuous);
    }

    /// Toggles verbose diagnostics on the manager.
    pub fn set_verbose(&self, verbose: bool) {
        self.manager.lock().unwrap().set_verbose(verbose);
    }

    /// Attaches a behavior node to the named entity. Nodes tick in
    /// attachment order.
    pub fn attach_behavior(&mut self, name: &str, node: StopAtCrossingEntity) {
        self.behaviors.push((name.to_owned(), node));
    }

    /// Advances one simulation frame.
    ///
    /// Applies all status updates, then ticks each attached behavior
    /// node, in a fixed order under one manager lock held for the whole
    /// update. Behavior target speeds are forwarded to the manager.
    pub fn update_frame(
        &mut self,
        updates: Vec<(String, EntityStatus)>,
    ) -> Result<Vec<(String, TickOutput)>, SimError> {
        let mut manager = self.manager.lock().unwrap();

        for (name, status) in updates {
            if !manager.set_entity_status(&name, status) {
                return Err(SimError::lookup(&name));
            }
        }

        let mut outputs = Vec::with_capacity(self.behaviors.len());
        for (name, node) in &mut self.behaviors {
            let Some(status) = manager.get_entity_status(name, CoordinateFrame::Lane) else {
                continue;
            };
            let Ok((lanelet_id, _, _)) = status.lane_position() else {
                continue;
            };
            let others = manager
                .entity_names()
                .into_iter()
                .filter(|other| other != name)
                .filter_map(|other| {
                    manager
                        .get_entity_status(&other, CoordinateFrame::Lane)
                        .map(|status| (other, status))
                })
                .collect();

            let input = BehaviorInput {
                status,
                following_lanelets: self.map.following_lanelets(lanelet_id, ROUTE_HORIZON),
                others,
                map: self.map.as_ref(),
            };
            let output = node.tick(&input);
            if let Some(target_speed) = output.target_speed {
                manager.set_target_speed(name, target_speed, false);
            }
            outputs.push((name.clone(), output));
        }
        Ok(outputs)
    }

    /// Names of all registered entities, in a stable order.
    pub fn entity_names(&self) -> Vec<String> {
        self.manager.lock().unwrap().entity_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use scenaria_env::{Accel, Twist};

    use crate::backend::SimBackend;
    use crate::behavior::NodeStatus;
    use crate::catalog::{sample_pedestrian, sample_vehicle};
    use crate::manager::SimEntityManager;
    use crate::map::SimLaneletMap;

    fn test_map() -> Arc<SimLaneletMap> {
        let mut map = SimLaneletMap::new();
        map.add_lanelet(1, Point3::origin(), 0.0, 200.0);
        map.add_lanelet(100, Point3::new(60.0, -10.0, 0.0), std::f64::consts::FRAC_PI_2, 20.0);
        map.add_crossing(1, 60.0, 100);
        Arc::new(map)
    }

    fn harness() -> (EntityApi<SimEntityManager, SimLaneletMap>, SimBackend) {
        let backend = SimBackend::new();
        let map = test_map();
        let manager = Arc::new(Mutex::new(SimEntityManager::new(Arc::clone(&map))));
        let context = SimulationContext::shared(Box::new(backend.clone()));
        (EntityApi::new(context, manager, map), backend)
    }

    fn lane_status(time: f64, lanelet_id: LaneletId, s: f64, speed: f64) -> EntityStatus {
        EntityStatus::new_lane(
            time,
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

    #[test]
    fn test_spawn_registers_locally_and_calls_backend() {
        let (api, backend) = harness();
        let spawned = api
            .spawn_vehicle(true, "ego", &sample_vehicle(), Some(lane_status(0.0, 1, 0.0, 5.0)))
            .unwrap();
        assert!(spawned);
        assert_eq!(backend.method_names(), vec!["spawn_entity"]);
        assert_eq!(api.entity_names(), vec!["ego"]);

        let request = &backend.requests()[0];
        let params = &request[0][0]["params"];
        assert_eq!(params["entity/name"], "ego");
        assert_eq!(params["entity/is_ego"], true);
        assert_eq!(params["coordinate"], "lane");
    }

    #[test]
    fn test_unclassified_description_still_issues_rpc() {
        let (api, backend) = harness();
        let spawned = api
            .spawn_raw(false, "mystery", r#"{"bicycle": {}}"#, None)
            .unwrap();

        // Nothing registered locally; the backend accepted it.
        assert!(spawned);
        assert!(api.entity_names().is_empty());
        assert_eq!(backend.method_names(), vec!["spawn_entity"]);
    }

    #[test]
    fn test_backend_rejection_is_a_negative_result() {
        let (api, backend) = harness();
        backend.reject_next();
        let spawned = api
            .spawn_vehicle(false, "npc", &sample_vehicle(), None)
            .unwrap();
        assert!(!spawned);
    }

    #[test]
    fn test_channel_fault_is_an_error() {
        let (api, backend) = harness();
        backend.fail_next();
        let result = api.spawn_vehicle(false, "npc", &sample_vehicle(), None);
        assert!(matches!(
            result,
            Err(SimError::BackendCommunication { .. })
        ));
    }

    #[test]
    fn test_missing_status_is_a_lookup_error() {
        let (api, _) = harness();
        api.spawn_vehicle(false, "npc", &sample_vehicle(), None)
            .unwrap();
        let error = api
            .get_entity_status("npc", CoordinateFrame::Lane)
            .unwrap_err();
        assert!(error.is_lookup());
        assert!(error.to_string().contains("npc"));
    }

    #[test]
    fn test_time_headway_finite_case() {
        let (api, _) = harness();
        api.spawn_vehicle(true, "ego", &sample_vehicle(), Some(lane_status(0.0, 1, 0.0, 10.0)))
            .unwrap();
        api.spawn_vehicle(false, "npc", &sample_vehicle(), Some(lane_status(0.0, 1, 50.0, 10.0)))
            .unwrap();

        // npc 50 m ahead at 10 m/s.
        assert_relative_eq!(api.get_time_headway("ego", "npc").unwrap(), 5.0);

        // ego is behind npc, so the reverse query is undefined.
        assert_eq!(api.get_time_headway("npc", "ego"), None);
    }

    #[test]
    fn test_time_headway_zero_speed_is_infinite() {
        let (api, _) = harness();
        api.spawn_vehicle(true, "ego", &sample_vehicle(), Some(lane_status(0.0, 1, 0.0, 10.0)))
            .unwrap();
        api.spawn_vehicle(false, "npc", &sample_vehicle(), Some(lane_status(0.0, 1, 50.0, 0.0)))
            .unwrap();
        assert_eq!(api.get_time_headway("ego", "npc"), Some(f64::INFINITY));
    }

    #[test]
    fn test_time_headway_requires_both_statuses() {
        let (api, _) = harness();
        api.spawn_vehicle(true, "ego", &sample_vehicle(), Some(lane_status(0.0, 1, 0.0, 10.0)))
            .unwrap();
        api.spawn_vehicle(false, "npc", &sample_vehicle(), None)
            .unwrap();
        assert_eq!(api.get_time_headway("ego", "npc"), None);
    }

    #[test]
    fn test_is_in_lanelet_never_fails() {
        let (api, _) = harness();
        assert!(!api.is_in_lanelet("ghost", 1));

        api.spawn_vehicle(false, "npc", &sample_vehicle(), None)
            .unwrap();
        assert!(!api.is_in_lanelet("npc", 1));

        assert!(api.set_entity_status("npc", lane_status(0.0, 1, 5.0, 0.0)));
        assert!(api.is_in_lanelet("npc", 1));
        assert!(!api.is_in_lanelet("npc", 100));
    }

    #[test]
    fn test_update_frame_applies_setters_then_ticks() {
        let (mut api, _) = harness();
        api.spawn_vehicle(true, "ego", &sample_vehicle(), Some(lane_status(0.0, 1, 0.0, 8.0)))
            .unwrap();
        api.spawn_pedestrian("walker", &sample_pedestrian(), Some(lane_status(0.0, 100, 5.0, 1.0)))
            .unwrap();
        api.attach_behavior("ego", StopAtCrossingEntity::new());

        let outputs = api
            .update_frame(vec![("ego".to_owned(), lane_status(0.1, 1, 20.0, 8.0))])
            .unwrap();
        assert_eq!(outputs.len(), 1);
        let (name, output) = &outputs[0];
        assert_eq!(name, "ego");
        assert_eq!(output.status, NodeStatus::Running);

        // Conflict at s=60, ego at s=20: 35 m of stop distance after the
        // margin, capped by the braking profile.
        let expected = (2.0f64 * 7.0 * 35.0).sqrt();
        let target = output.target_speed.unwrap();
        assert_relative_eq!(target, expected);

        // Behavior target speed lands in the manager.
        let manager = api.manager.lock().unwrap();
        let (speed, continuous) = manager.target_speed("ego").unwrap();
        assert_relative_eq!(speed, expected);
        assert!(!continuous);
    }

    #[test]
    fn test_update_frame_rejects_unknown_entity() {
        let (mut api, _) = harness();
        let error = api
            .update_frame(vec![("ghost".to_owned(), lane_status(0.0, 1, 0.0, 0.0))])
            .unwrap_err();
        assert!(error.is_lookup());
    }
}
