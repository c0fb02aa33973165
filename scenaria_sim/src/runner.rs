//! Scenario runner: ground-truth kinematics around the facade.
//!
//! The runner is the external driver of the simulation: it owns the
//! true kinematic state of every entity, advances it one step per
//! frame, and pushes the resulting statuses through the facade so
//! behavior nodes see exactly what a live backend would report.

use std::sync::{Arc, Mutex};

use nalgebra::Point3;
use tracing::{debug, info};

use scenaria_core::{ParameterValue, Scope};
use scenaria_env::{CoordinateFrame, EntityStatus, LaneletMap, SimError};

use crate::api::EntityApi;
use crate::backend::SimBackend;
use crate::behavior::StopAtCrossingEntity;
use crate::catalog::{sample_pedestrian, sample_vehicle};
use crate::context::SimulationContext;
use crate::manager::SimEntityManager;
use crate::map::SimLaneletMap;

/// Speed below which the ego counts as stopped, m/s.
const STOPPED_SPEED: f64 = 0.1;

/// Parameters of one scenario execution.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Frame step in seconds
    pub step_time: f64,

    /// Total simulated duration in seconds
    pub duration: f64,

    /// Ego cruising speed, m/s
    pub ego_speed: f64,

    /// Non-ego vehicle cruising speed, m/s
    pub npc_speed: f64,

    /// Pedestrian walking speed along the crossing lane, m/s
    pub pedestrian_speed: f64,

    /// Whether the crossing pedestrian is present
    pub with_pedestrian: bool,

    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            step_time: 0.1,
            duration: 20.0,
            ego_speed: 10.0,
            npc_speed: 8.0,
            pedestrian_speed: 1.0,
            with_pedestrian: true,
            verbose: false,
        }
    }
}

impl RunConfig {
    /// Overrides config fields from sampled scenario parameters.
    pub fn apply_scope(mut self, scope: &Scope) -> Self {
        if let Some(ParameterValue::Double(v)) = scope.lookup("ego_speed") {
            self.ego_speed = *v;
        }
        if let Some(ParameterValue::Double(v)) = scope.lookup("npc_speed") {
            self.npc_speed = *v;
        }
        if let Some(ParameterValue::Double(v)) = scope.lookup("pedestrian_speed") {
            self.pedestrian_speed = *v;
        }
        if let Some(ParameterValue::Boolean(v)) = scope.lookup("with_pedestrian") {
            self.with_pedestrian = *v;
        }
        self
    }
}

/// Outcome of one scenario execution.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub frames: u32,
    pub final_time: f64,

    /// Slowest ego speed observed over the run
    pub min_ego_speed: f64,

    /// Whether the ego came to a stop at any point
    pub ego_stopped: bool,

    /// Ego arc length on its final lanelet
    pub final_ego_s: f64,
}

/// The built-in crossing scenario: a through road of two lanelets with
/// a pedestrian crossing cutting the first one at s = 60.
pub fn demo_map() -> SimLaneletMap {
    let mut map = SimLaneletMap::new();
    map.add_lanelet(1, Point3::origin(), 0.0, 120.0);
    map.add_lanelet(2, Point3::new(120.0, 0.0, 0.0), 0.0, 80.0);
    map.connect(1, 2);
    map.add_lanelet(
        100,
        Point3::new(60.0, -10.0, 0.0),
        std::f64::consts::FRAC_PI_2,
        30.0,
    );
    map.add_crossing(1, 60.0, 100);
    map
}

/// Drives the built-in crossing scenario through the facade.
pub struct ScenarioRunner {
    api: EntityApi<SimEntityManager, SimLaneletMap>,
    manager: Arc<Mutex<SimEntityManager>>,
    map: Arc<SimLaneletMap>,
    backend: SimBackend,
    config: RunConfig,
}

impl ScenarioRunner {
    pub fn new(config: RunConfig) -> Self {
        let backend = SimBackend::new();
        let map = Arc::new(demo_map());
        let manager = Arc::new(Mutex::new(SimEntityManager::new(Arc::clone(&map))));
        let context = SimulationContext::shared(Box::new(backend.clone()));
        let api = EntityApi::new(context, Arc::clone(&manager), Arc::clone(&map));
        Self {
            api,
            manager,
            map,
            backend,
            config,
        }
    }

    /// The backend handle, for inspecting the recorded RPC stream.
    pub fn backend(&self) -> &SimBackend {
        &self.backend
    }

    fn lane_status(lanelet_id: i64, s: f64, speed: f64, time: f64) -> EntityStatus {
        EntityStatus::new_lane(
            time,
            lanelet_id,
            s,
            0.0,
            nalgebra::Vector3::zeros(),
            scenaria_env::Twist {
                linear: nalgebra::Vector3::new(speed, 0.0, 0.0),
                angular: nalgebra::Vector3::zeros(),
            },
            scenaria_env::Accel::zero(),
        )
    }

    /// Spawns the scenario's actors and attaches the ego behavior.
    fn setup(&mut self) -> Result<(), SimError> {
        self.api.set_verbose(self.config.verbose);

        let vehicle = sample_vehicle();
        if !self.api.spawn_vehicle(
            true,
            "ego",
            &vehicle,
            Some(Self::lane_status(1, 0.0, self.config.ego_speed, 0.0)),
        )? {
            return Err(SimError::configuration("ego spawn rejected"));
        }
        if !self.api.spawn_vehicle(
            false,
            "npc",
            &vehicle,
            Some(Self::lane_status(2, 40.0, self.config.npc_speed, 0.0)),
        )? {
            return Err(SimError::configuration("npc spawn rejected"));
        }
        if self.config.with_pedestrian
            && !self.api.spawn_pedestrian(
                "walker",
                &sample_pedestrian(),
                Some(Self::lane_status(100, 5.0, self.config.pedestrian_speed, 0.0)),
            )?
        {
            return Err(SimError::configuration("pedestrian spawn rejected"));
        }

        self.api.attach_behavior("ego", StopAtCrossingEntity::new());
        self.api.request_acquire_position("ego", 2, 70.0, 0.0);
        Ok(())
    }

    /// New speed after one step of tracking `desired` within the
    /// vehicle's acceleration limits.
    fn approach(current: f64, desired: f64, dt: f64) -> f64 {
        let performance = sample_vehicle().performance;
        if desired > current {
            (current + performance.max_acceleration * dt).min(desired)
        } else {
            (current - performance.max_deceleration * dt).max(desired.max(0.0))
        }
    }

    /// Advances arc length, rolling over onto the successor lanelet.
    fn advance(&self, lanelet_id: i64, s: f64) -> (i64, f64) {
        match self.map.lanelet_length(lanelet_id) {
            Some(length) if s > length => {
                let route = self.map.following_lanelets(lanelet_id, length + 1.0);
                match route.get(1) {
                    Some(next) => (*next, s - length),
                    None => (lanelet_id, length),
                }
            }
            _ => (lanelet_id, s),
        }
    }

    /// Cruise speed an entity falls back to when no behavior governs.
    fn cruise_speed(&self, name: &str) -> f64 {
        match name {
            "ego" => self.config.ego_speed,
            "npc" => self.config.npc_speed,
            _ => self.config.pedestrian_speed,
        }
    }

    /// Executes the scenario to completion.
    pub fn run(&mut self) -> Result<RunResult, SimError> {
        self.setup()?;

        let dt = self.config.step_time;
        let steps = (self.config.duration / dt).ceil() as u32;
        let mut min_ego_speed = self.config.ego_speed;
        let mut ego_stopped = false;
        let mut final_ego_s = 0.0;

        for frame in 0..steps {
            let time = (frame + 1) as f64 * dt;
            let mut updates = Vec::new();
            for name in self.api.entity_names() {
                let status = self.api.get_entity_status(&name, CoordinateFrame::Lane)?;
                let (lanelet_id, s, _) = status.lane_position()?;

                // The behavior's braking profile only ever lowers the
                // cruise speed; far hazards must not raise it.
                let cruise = self.cruise_speed(&name);
                let desired = {
                    let manager = self.manager.lock().unwrap();
                    manager
                        .target_speed(&name)
                        .map(|(speed, _)| speed.min(cruise))
                        .unwrap_or(cruise)
                };
                let speed = Self::approach(status.twist.forward_speed(), desired, dt);
                let (lanelet_id, s) = self.advance(lanelet_id, s + speed * dt);

                if name == "ego" {
                    min_ego_speed = min_ego_speed.min(speed);
                    ego_stopped |= speed < STOPPED_SPEED;
                    final_ego_s = s;
                }
                updates.push((name, Self::lane_status(lanelet_id, s, speed, time)));
            }

            let outputs = self.api.update_frame(updates)?;
            for (name, output) in &outputs {
                debug!(frame, name = %name, status = ?output.status, "behavior tick");
            }
        }

        let result = RunResult {
            frames: steps,
            final_time: steps as f64 * dt,
            min_ego_speed,
            ego_stopped,
            final_ego_s,
        };
        info!(
            frames = result.frames,
            min_ego_speed = result.min_ego_speed,
            ego_stopped = result.ego_stopped,
            "scenario run complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_spawns_all_actors_over_rpc() {
        let mut runner = ScenarioRunner::new(RunConfig {
            duration: 1.0,
            ..RunConfig::default()
        });
        let result = runner.run().unwrap();
        assert_eq!(result.frames, 10);
        assert_eq!(
            runner.backend().method_names(),
            vec!["spawn_entity", "spawn_entity", "spawn_entity"]
        );
    }

    #[test]
    fn test_ego_slows_for_crossing_pedestrian() {
        let mut runner = ScenarioRunner::new(RunConfig::default());
        let result = runner.run().unwrap();
        assert!(result.min_ego_speed < runner.config.ego_speed);
    }

    #[test]
    fn test_ego_cruises_without_pedestrian() {
        let mut runner = ScenarioRunner::new(RunConfig {
            with_pedestrian: false,
            ..RunConfig::default()
        });
        let result = runner.run().unwrap();
        assert!((result.min_ego_speed - runner.config.ego_speed).abs() < 1e-9);
        assert!(!result.ego_stopped);
    }

    #[test]
    fn test_config_from_scope() {
        let mut scope = Scope::new();
        scope.insert("npc_speed", ParameterValue::Double(12.5));
        scope.insert("with_pedestrian", ParameterValue::Boolean(false));

        let config = RunConfig::default().apply_scope(&scope);
        assert_eq!(config.npc_speed, 12.5);
        assert!(!config.with_pedestrian);
        assert_eq!(config.ego_speed, RunConfig::default().ego_speed);
    }
}
