//! Deterministic in-process lanelet map for harness runs.
//!
//! Lanelets are straight centerline segments in the xy-plane, declared
//! with an origin, a heading, and a length, chained through explicit
//! successor links. That is enough geometry to exercise lane-frame
//! conversions, route following, and crossing hazards without a real
//! map stack behind the trait.

use std::collections::BTreeMap;

use nalgebra::{Point3, UnitQuaternion, Vector3};

use scenaria_env::{CrossingConflict, LaneletId, LaneletMap, Pose, SimError};

/// Centerline sampling interval in meters.
const CENTER_POINT_INTERVAL: f64 = 1.0;

#[derive(Debug, Clone)]
struct Lanelet {
    origin: Point3<f64>,

    /// Heading of the centerline in the xy-plane, radians
    heading: f64,

    length: f64,

    /// Successor lanelets in travel order
    next: Vec<LaneletId>,

    /// Crossing lanelets as (arc length of the conflict point, id)
    crossings: Vec<(f64, LaneletId)>,
}

impl Lanelet {
    fn direction(&self) -> Vector3<f64> {
        Vector3::new(self.heading.cos(), self.heading.sin(), 0.0)
    }

    /// Left-pointing lateral unit vector; positive offsets go left.
    fn left_normal(&self) -> Vector3<f64> {
        Vector3::new(-self.heading.sin(), self.heading.cos(), 0.0)
    }
}

/// Straight-segment lanelet map, keyed by lanelet id.
#[derive(Debug, Clone, Default)]
pub struct SimLaneletMap {
    lanelets: BTreeMap<LaneletId, Lanelet>,
}

impl SimLaneletMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a straight lanelet segment.
    pub fn add_lanelet(&mut self, id: LaneletId, origin: Point3<f64>, heading: f64, length: f64) {
        self.lanelets.insert(
            id,
            Lanelet {
                origin,
                heading,
                length,
                next: Vec::new(),
                crossings: Vec::new(),
            },
        );
    }

    /// Links `from`'s end to `to`'s start.
    pub fn connect(&mut self, from: LaneletId, to: LaneletId) {
        if let Some(lanelet) = self.lanelets.get_mut(&from) {
            lanelet.next.push(to);
        }
    }

    /// Declares that `crossing` crosses `lanelet` at arc length `s`.
    pub fn add_crossing(&mut self, lanelet: LaneletId, s: f64, crossing: LaneletId) {
        if let Some(entry) = self.lanelets.get_mut(&lanelet) {
            entry.crossings.push((s, crossing));
        }
    }

    /// Projects a world position onto the nearest lanelet centerline.
    ///
    /// Returns the lanelet id, arc length, and lateral offset, or `None`
    /// when the map is empty. Only positions whose projection falls
    /// within a segment's arc range are candidates.
    pub fn closest_lane_position(&self, position: &Point3<f64>) -> Option<(LaneletId, f64, f64)> {
        let mut best: Option<(f64, (LaneletId, f64, f64))> = None;
        for (id, lanelet) in &self.lanelets {
            let to_point = position - lanelet.origin;
            let s = to_point.dot(&lanelet.direction());
            if s < 0.0 || s > lanelet.length {
                continue;
            }
            let offset = to_point.dot(&lanelet.left_normal());
            if best
                .as_ref()
                .map(|(d, _)| offset.abs() < *d)
                .unwrap_or(true)
            {
                best = Some((offset.abs(), (*id, s, offset)));
            }
        }
        best.map(|(_, found)| found)
    }
}

impl LaneletMap for SimLaneletMap {
    fn lanelet_length(&self, lanelet_id: LaneletId) -> Option<f64> {
        self.lanelets.get(&lanelet_id).map(|lanelet| lanelet.length)
    }

    fn following_lanelets(&self, lanelet_id: LaneletId, horizon: f64) -> Vec<LaneletId> {
        let mut route = Vec::new();
        let mut current = lanelet_id;
        let mut covered = 0.0;
        while let Some(lanelet) = self.lanelets.get(&current) {
            route.push(current);
            covered += lanelet.length;
            if covered >= horizon {
                break;
            }
            // Harness maps are linear; at a fork the first declared
            // successor is the route.
            match lanelet.next.first() {
                Some(next) => current = *next,
                None => break,
            }
        }
        route
    }

    fn lanelet_pose(&self, lanelet_id: LaneletId, s: f64, offset: f64) -> Result<Pose, SimError> {
        let lanelet = self
            .lanelets
            .get(&lanelet_id)
            .ok_or_else(|| SimError::configuration(format!("unknown lanelet: {}", lanelet_id)))?;
        let position = lanelet.origin + lanelet.direction() * s + lanelet.left_normal() * offset;
        let orientation = UnitQuaternion::from_euler_angles(0.0, 0.0, lanelet.heading);
        Ok(Pose::new(position, orientation))
    }

    fn center_points(&self, lanelet_id: LaneletId) -> Vec<Point3<f64>> {
        let Some(lanelet) = self.lanelets.get(&lanelet_id) else {
            return Vec::new();
        };
        let mut points = Vec::new();
        let mut s = 0.0;
        while s < lanelet.length {
            points.push(lanelet.origin + lanelet.direction() * s);
            s += CENTER_POINT_INTERVAL;
        }
        points.push(lanelet.origin + lanelet.direction() * lanelet.length);
        points
    }

    fn crossing_conflicts(&self, route: &[LaneletId], from_s: f64) -> Vec<CrossingConflict> {
        let mut conflicts = Vec::new();
        let mut offset = -from_s;
        for (index, lanelet_id) in route.iter().enumerate() {
            let Some(lanelet) = self.lanelets.get(lanelet_id) else {
                break;
            };
            for (s, crossing) in &lanelet.crossings {
                let distance = offset + s;
                // On the first lanelet, conflict points behind the query
                // position are already passed.
                if index == 0 && *s < from_s {
                    continue;
                }
                conflicts.push(CrossingConflict {
                    crossing_lanelet: *crossing,
                    distance,
                });
            }
            offset += lanelet.length;
        }
        conflicts.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_lane_map() -> SimLaneletMap {
        let mut map = SimLaneletMap::new();
        map.add_lanelet(1, Point3::origin(), 0.0, 10.0);
        map.add_lanelet(2, Point3::new(10.0, 0.0, 0.0), 0.0, 50.0);
        map.connect(1, 2);
        map
    }

    #[test]
    fn test_lanelet_pose_applies_offset_left() {
        let map = two_lane_map();
        let pose = map.lanelet_pose(1, 4.0, 1.5).unwrap();
        assert_relative_eq!(pose.position.x, 4.0);
        assert_relative_eq!(pose.position.y, 1.5);
    }

    #[test]
    fn test_lanelet_pose_unknown_id_is_error() {
        let map = two_lane_map();
        assert!(map.lanelet_pose(42, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_following_lanelets_respects_horizon() {
        let map = two_lane_map();
        assert_eq!(map.following_lanelets(1, 5.0), vec![1]);
        assert_eq!(map.following_lanelets(1, 30.0), vec![1, 2]);
        assert_eq!(map.following_lanelets(42, 30.0), Vec::<LaneletId>::new());
    }

    #[test]
    fn test_center_points_span_the_lanelet() {
        let map = two_lane_map();
        let points = map.center_points(1);
        assert_eq!(points.len(), 11);
        assert_relative_eq!(points[10].x, 10.0);
    }

    #[test]
    fn test_crossing_conflicts_measure_along_route() {
        let mut map = two_lane_map();
        map.add_lanelet(100, Point3::new(18.0, -5.0, 0.0), 1.0, 10.0);
        map.add_crossing(2, 8.0, 100);

        // Query from s=4 on lanelet 1: 6 m remain on lanelet 1, plus
        // 8 m into lanelet 2.
        let conflicts = map.crossing_conflicts(&[1, 2], 4.0);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].crossing_lanelet, 100);
        assert_relative_eq!(conflicts[0].distance, 14.0);
    }

    #[test]
    fn test_passed_conflicts_are_omitted() {
        let mut map = two_lane_map();
        map.add_lanelet(100, Point3::new(3.0, -5.0, 0.0), 1.0, 10.0);
        map.add_crossing(1, 3.0, 100);

        assert_eq!(map.crossing_conflicts(&[1], 5.0), Vec::new());
        assert_eq!(map.crossing_conflicts(&[1], 1.0).len(), 1);
    }

    #[test]
    fn test_closest_lane_position_projects_onto_centerline() {
        let map = two_lane_map();
        let (id, s, offset) = map
            .closest_lane_position(&Point3::new(13.0, -0.5, 0.0))
            .unwrap();
        assert_eq!(id, 2);
        assert_relative_eq!(s, 3.0);
        assert_relative_eq!(offset, -0.5);
    }
}
