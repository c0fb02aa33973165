//! Entity kinematic state, valid in exactly one of two coordinate frames.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Lanelet identifier within the loaded map.
pub type LaneletId = i64;

/// A free 6-DOF pose in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in meters
    pub position: Point3<f64>,

    /// Orientation as a unit quaternion
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    /// Creates a pose from position and orientation.
    pub fn new(position: Point3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// The identity pose (origin, no rotation).
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Euclidean distance between two pose positions.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (other.position - self.position).norm()
    }
}

/// Linear and angular velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

impl Twist {
    /// A twist with all components zero.
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }

    /// Forward (longitudinal) speed component.
    pub fn forward_speed(&self) -> f64 {
        self.linear.x
    }
}

/// Linear and angular acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accel {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

impl Accel {
    /// An acceleration with all components zero.
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }
}

/// Which position representation of an [`EntityStatus`] is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateFrame {
    /// Absolute 6-DOF pose
    World,

    /// Lane-relative arc-length/offset position
    Lane,
}

/// Frame-specific position fields.
///
/// The variant tag is the single source of truth for which representation
/// is valid; reading the other group is rejected, never zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FramePose {
    /// Free pose in the world frame
    World { pose: Pose },

    /// Lane-relative position: lanelet id, arc length `s`, lateral
    /// `offset`, orientation as roll/pitch/yaw
    Lane {
        lanelet_id: LaneletId,
        s: f64,
        offset: f64,
        rpy: Vector3<f64>,
    },
}

/// One actor's kinematic state at a point in simulation time.
///
/// Replaced wholesale on every update; callers never observe partial
/// field mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStatus {
    /// Simulation time in seconds, monotonic within one run
    pub time: f64,

    /// Frame-tagged position fields
    pub frame_pose: FramePose,

    /// Linear and angular velocity (valid in both frames)
    pub twist: Twist,

    /// Linear and angular acceleration (valid in both frames)
    pub accel: Accel,
}

impl EntityStatus {
    /// Creates a world-frame status.
    pub fn new_world(time: f64, pose: Pose, twist: Twist, accel: Accel) -> Self {
        Self {
            time,
            frame_pose: FramePose::World { pose },
            twist,
            accel,
        }
    }

    /// Creates a lane-frame status.
    pub fn new_lane(
        time: f64,
        lanelet_id: LaneletId,
        s: f64,
        offset: f64,
        rpy: Vector3<f64>,
        twist: Twist,
        accel: Accel,
    ) -> Self {
        Self {
            time,
            frame_pose: FramePose::Lane {
                lanelet_id,
                s,
                offset,
                rpy,
            },
            twist,
            accel,
        }
    }

    /// The coordinate frame this status is expressed in.
    pub fn coordinate(&self) -> CoordinateFrame {
        match self.frame_pose {
            FramePose::World { .. } => CoordinateFrame::World,
            FramePose::Lane { .. } => CoordinateFrame::Lane,
        }
    }

    /// World pose. Cross-frame reads are a configuration error.
    pub fn world_pose(&self) -> Result<&Pose, SimError> {
        match &self.frame_pose {
            FramePose::World { pose } => Ok(pose),
            FramePose::Lane { .. } => Err(SimError::configuration(
                "world pose requested from a lane-frame status",
            )),
        }
    }

    /// Lane position as (lanelet id, s, offset). Cross-frame reads are a
    /// configuration error.
    pub fn lane_position(&self) -> Result<(LaneletId, f64, f64), SimError> {
        match &self.frame_pose {
            FramePose::Lane {
                lanelet_id,
                s,
                offset,
                ..
            } => Ok((*lanelet_id, *s, *offset)),
            FramePose::World { .. } => Err(SimError::configuration(
                "lane position requested from a world-frame status",
            )),
        }
    }

    /// Lane-frame roll/pitch/yaw. Cross-frame reads are a configuration
    /// error.
    pub fn lane_rpy(&self) -> Result<&Vector3<f64>, SimError> {
        match &self.frame_pose {
            FramePose::Lane { rpy, .. } => Ok(rpy),
            FramePose::World { .. } => Err(SimError::configuration(
                "lane orientation requested from a world-frame status",
            )),
        }
    }
}
