//! Actor catalog descriptions.
//!
//! A catalog entry is a JSON document whose top-level section names the
//! actor class: a `vehicle` or `pedestrian` object carrying the static
//! parameters (dimensions, performance limits) supplied at spawn time.
//! Classification inspects which section is present; a description with
//! neither is forwarded to the backend unclassified so the backend can
//! apply its own validation.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use scenaria_env::EntityKind;

/// Bounding-box dimensions in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// Performance limits of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// Maximum speed in m/s
    pub max_speed: f64,

    /// Maximum acceleration in m/s^2
    pub max_acceleration: f64,

    /// Maximum deceleration in m/s^2
    pub max_deceleration: f64,
}

/// Static vehicle parameters from a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleParameters {
    /// Catalog model name (e.g., "sample_vehicle")
    pub name: String,

    pub bounding_box: BoundingBox,
    pub performance: Performance,
}

impl VehicleParameters {
    /// Renders this catalog entry as a raw description document.
    pub fn to_description(&self) -> String {
        json!({ "vehicle": self }).to_string()
    }
}

/// Static pedestrian parameters from a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedestrianParameters {
    /// Catalog model name (e.g., "sample_pedestrian")
    pub name: String,

    pub bounding_box: BoundingBox,
}

impl PedestrianParameters {
    /// Renders this catalog entry as a raw description document.
    pub fn to_description(&self) -> String {
        json!({ "pedestrian": self }).to_string()
    }
}

/// Classifies a raw description by its top-level section.
///
/// Returns `None` for an unparseable document or one with neither
/// recognized section; callers still attempt the backend spawn call in
/// that case, registering nothing locally.
pub fn classify_description(description: &str, is_ego: bool) -> Option<EntityKind> {
    let doc: Value = serde_json::from_str(description).ok()?;
    if doc.get("vehicle").is_some() {
        Some(if is_ego {
            EntityKind::Ego
        } else {
            EntityKind::Vehicle
        })
    } else if doc.get("pedestrian").is_some() {
        Some(EntityKind::Pedestrian)
    } else {
        None
    }
}

/// A reasonable default vehicle for harness scenarios.
pub fn sample_vehicle() -> VehicleParameters {
    VehicleParameters {
        name: "sample_vehicle".to_owned(),
        bounding_box: BoundingBox {
            length: 4.5,
            width: 1.8,
            height: 1.5,
        },
        performance: Performance {
            max_speed: 30.0,
            max_acceleration: 3.0,
            max_deceleration: 7.0,
        },
    }
}

/// A reasonable default pedestrian for harness scenarios.
pub fn sample_pedestrian() -> PedestrianParameters {
    PedestrianParameters {
        name: "sample_pedestrian".to_owned(),
        bounding_box: BoundingBox {
            length: 0.5,
            width: 0.5,
            height: 1.7,
        },
    }
}
