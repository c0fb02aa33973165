//! Wire marshaling between [`EntityStatus`] and the backend value tree.
//!
//! The backend exchanges a flat, weakly-typed tree keyed by dotted field
//! paths. Those paths are part of the wire contract and must match an
//! unmodified backend exactly. The dynamic representation never leaves
//! this module: internal logic only sees the strongly-typed status.

use nalgebra::{Point3, Quaternion, UnitQuaternion, Vector3};
use serde_json::{json, Map, Value};

use scenaria_env::{Accel, EntityStatus, FramePose, Pose, SimError, Twist};

/// Coordinate discriminator value for world-frame statuses.
const COORDINATE_WORLD: &str = "world";

/// Coordinate discriminator value for lane-frame statuses.
const COORDINATE_LANE: &str = "lane";

fn insert_f64(param: &mut Map<String, Value>, key: &str, value: f64) {
    param.insert(key.to_owned(), json!(value));
}

fn insert_twist_accel(param: &mut Map<String, Value>, twist: &Twist, accel: &Accel) {
    insert_f64(param, "twist/linear/x", twist.linear.x);
    insert_f64(param, "twist/linear/y", twist.linear.y);
    insert_f64(param, "twist/linear/z", twist.linear.z);
    insert_f64(param, "twist/angular/x", twist.angular.x);
    insert_f64(param, "twist/angular/y", twist.angular.y);
    insert_f64(param, "twist/angular/z", twist.angular.z);
    insert_f64(param, "accel/linear/x", accel.linear.x);
    insert_f64(param, "accel/linear/y", accel.linear.y);
    insert_f64(param, "accel/linear/z", accel.linear.z);
    insert_f64(param, "accel/angular/x", accel.angular.x);
    insert_f64(param, "accel/angular/y", accel.angular.y);
    insert_f64(param, "accel/angular/z", accel.angular.z);
}

/// Converts an entity status into the backend's flat parameter tree.
pub fn to_value(name: &str, status: &EntityStatus) -> Value {
    let mut param = Map::new();
    param.insert("entity/name".to_owned(), json!(name));

    match &status.frame_pose {
        FramePose::World { pose } => {
            param.insert("coordinate".to_owned(), json!(COORDINATE_WORLD));
            insert_f64(&mut param, "pose/position/x", pose.position.x);
            insert_f64(&mut param, "pose/position/y", pose.position.y);
            insert_f64(&mut param, "pose/position/z", pose.position.z);
            insert_f64(&mut param, "pose/orientation/x", pose.orientation.i);
            insert_f64(&mut param, "pose/orientation/y", pose.orientation.j);
            insert_f64(&mut param, "pose/orientation/z", pose.orientation.k);
            insert_f64(&mut param, "pose/orientation/w", pose.orientation.w);
        }
        FramePose::Lane {
            lanelet_id,
            s,
            offset,
            rpy,
        } => {
            param.insert("coordinate".to_owned(), json!(COORDINATE_LANE));
            // Lanelet ids travel as strings; 64-bit integers are not
            // representable in every peer's value type.
            param.insert("lanelet_id".to_owned(), json!(lanelet_id.to_string()));
            insert_f64(&mut param, "s", *s);
            insert_f64(&mut param, "offset", *offset);
            insert_f64(&mut param, "roll", rpy.x);
            insert_f64(&mut param, "pitch", rpy.y);
            insert_f64(&mut param, "yaw", rpy.z);
        }
    }

    insert_twist_accel(&mut param, &status.twist, &status.accel);
    insert_f64(&mut param, "time", status.time);
    Value::Object(param)
}

fn get_f64(param: &Value, key: &str) -> Result<f64, SimError> {
    param
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| SimError::configuration(format!("missing or non-numeric field: {}", key)))
}

fn get_str<'a>(param: &'a Value, key: &str) -> Result<&'a str, SimError> {
    param
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| SimError::configuration(format!("missing or non-string field: {}", key)))
}

fn get_twist_accel(param: &Value) -> Result<(Twist, Accel), SimError> {
    let twist = Twist {
        linear: Vector3::new(
            get_f64(param, "twist/linear/x")?,
            get_f64(param, "twist/linear/y")?,
            get_f64(param, "twist/linear/z")?,
        ),
        angular: Vector3::new(
            get_f64(param, "twist/angular/x")?,
            get_f64(param, "twist/angular/y")?,
            get_f64(param, "twist/angular/z")?,
        ),
    };
    let accel = Accel {
        linear: Vector3::new(
            get_f64(param, "accel/linear/x")?,
            get_f64(param, "accel/linear/y")?,
            get_f64(param, "accel/linear/z")?,
        ),
        angular: Vector3::new(
            get_f64(param, "accel/angular/x")?,
            get_f64(param, "accel/angular/y")?,
            get_f64(param, "accel/angular/z")?,
        ),
    };
    Ok((twist, accel))
}

/// Converts a backend parameter tree back into an entity status.
///
/// An unrecognized coordinate tag is a fatal configuration error, never
/// a silent default. World-frame trees may omit the orientation keys
/// entirely, which decodes as the identity quaternion; a partial
/// orientation key set is rejected.
pub fn to_status(param: &Value) -> Result<EntityStatus, SimError> {
    let coordinate = get_str(param, "coordinate")?;
    match coordinate {
        COORDINATE_LANE => {
            let lanelet_id = get_str(param, "lanelet_id")?.parse::<i64>().map_err(|e| {
                SimError::configuration(format!("lanelet_id is not a 64-bit integer: {}", e))
            })?;
            let s = get_f64(param, "s")?;
            let offset = get_f64(param, "offset")?;
            let rpy = Vector3::new(
                get_f64(param, "roll")?,
                get_f64(param, "pitch")?,
                get_f64(param, "yaw")?,
            );
            let (twist, accel) = get_twist_accel(param)?;
            let time = get_f64(param, "time")?;
            Ok(EntityStatus::new_lane(
                time, lanelet_id, s, offset, rpy, twist, accel,
            ))
        }
        COORDINATE_WORLD => {
            let position = Point3::new(
                get_f64(param, "pose/position/x")?,
                get_f64(param, "pose/position/y")?,
                get_f64(param, "pose/position/z")?,
            );
            let present = ["x", "y", "z", "w"]
                .iter()
                .filter(|axis| param.get(format!("pose/orientation/{}", axis)).is_some())
                .count();
            let orientation = match present {
                4 => {
                    // Wire values are already normalized; reconstruct exactly.
                    UnitQuaternion::new_unchecked(Quaternion::new(
                        get_f64(param, "pose/orientation/w")?,
                        get_f64(param, "pose/orientation/x")?,
                        get_f64(param, "pose/orientation/y")?,
                        get_f64(param, "pose/orientation/z")?,
                    ))
                }
                // A tree that omits orientation entirely means "unrotated";
                // a partial component set means a corrupted tree.
                0 => UnitQuaternion::identity(),
                _ => {
                    return Err(SimError::configuration(
                        "world-frame status carries a partial pose/orientation key set",
                    ))
                }
            };
            let (twist, accel) = get_twist_accel(param)?;
            let time = get_f64(param, "time")?;
            Ok(EntityStatus::new_world(
                time,
                Pose::new(position, orientation),
                twist,
                accel,
            ))
        }
        other => Err(SimError::configuration(format!(
            "coordinate does not match, coordinate: {}",
            other
        ))),
    }
}

/// Wraps a single logical call in the backend's batched multicall
/// envelope.
pub fn multicall(method: &str, params: Value) -> Value {
    json!([[{ "methodName": method, "params": params }]])
}

/// Extracts the boolean `success` field from a multicall response.
///
/// A response without that field at its fixed path is a protocol fault.
pub fn multicall_success(result: &Value) -> Result<bool, SimError> {
    result[0][0]["success"]
        .as_bool()
        .ok_or_else(|| SimError::backend("multicall response is missing the success field", -1))
}
