use std::f64::consts::TAU;

use glam::DVec2;

use crate::flows::partition_by_route;
use crate::map::projection::project;
use crate::model::{Endpoint, TransferEvent};

/// Chords shorter than this (plane units) are drawn as loops
const SELF_LOOP_DISTANCE: f64 = 1.2;
const LOOP_BASE_RADIUS: f64 = 1.8;
const LOOP_RADIUS_PER_LANE: f64 = 0.75;
const LANE_SPREAD: f64 = 2.2;
const MAX_LANE_SPREAD: f64 = 8.0;
const ARC_RISE_RATIO: f64 = 0.3;
const MIN_ARC_RISE: f64 = 4.0;
const MAX_ARC_RISE: f64 = 18.0;

/// Position of an event within its route group
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaneSlot {
    pub index: usize,
    pub total: usize,
}

impl LaneSlot {
    pub const SOLO: LaneSlot = LaneSlot { index: 0, total: 1 };

    /// Signed lane offset, centered on zero
    pub fn offset(&self) -> f64 {
        self.index as f64 - (self.total.max(1) as f64 - 1.0) / 2.0
    }
}

/// Curve for one flow, in plane units
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ArcPath {
    /// Source and target (almost) coincide
    Loop { center: DVec2, radius: f64 },
    Quadratic { from: DVec2, control: DVec2, to: DVec2 },
}

impl ArcPath {
    /// Polyline approximation with `steps` segments
    pub fn sample(&self, steps: usize) -> Vec<DVec2> {
        let steps = steps.max(2);
        (0..=steps)
            .map(|i| {
                let t = i as f64 / steps as f64;
                match *self {
                    ArcPath::Loop { center, radius } => {
                        let angle = t * TAU;
                        // Loop starts at the leftmost point, like an SVG arc pair
                        center + DVec2::new(-angle.cos(), angle.sin()) * radius
                    }
                    ArcPath::Quadratic { from, control, to } => {
                        let u = 1.0 - t;
                        from * (u * u) + control * (2.0 * u * t) + to * (t * t)
                    }
                }
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArcGeometry {
    pub source: DVec2,
    pub target: DVec2,
    pub chord: f64,
    pub path: ArcPath,
}

/// A selected event with its lane and curve
#[derive(Clone, Copy, Debug)]
pub struct PlacedArc<'a> {
    pub event: &'a TransferEvent,
    pub lane: LaneSlot,
    pub geometry: ArcGeometry,
}

/// Lane slot for every event, parallel to `events`
pub fn assign_lanes(events: &[&TransferEvent]) -> Vec<LaneSlot> {
    let mut lanes = vec![LaneSlot::SOLO; events.len()];
    for (_, members) in partition_by_route(events.iter().copied()) {
        let total = members.len();
        for (index, pos) in members.into_iter().enumerate() {
            lanes[pos] = LaneSlot { index, total };
        }
    }
    lanes
}

/// Curve between two endpoints, fanned out by lane
pub fn arc_geometry(source: &Endpoint, target: &Endpoint, lane: LaneSlot) -> ArcGeometry {
    let s = project(source.geo());
    let t = project(target.geo());
    let chord_vec = t - s;
    let chord = chord_vec.length();
    let offset = lane.offset();

    let path = if chord < SELF_LOOP_DISTANCE {
        ArcPath::Loop {
            center: s,
            radius: LOOP_BASE_RADIUS + offset.abs() * LOOP_RADIUS_PER_LANE,
        }
    } else {
        let mid = (s + t) / 2.0;
        let normal = DVec2::new(-chord_vec.y, chord_vec.x) / chord;
        let spread = (offset * LANE_SPREAD).clamp(-MAX_LANE_SPREAD, MAX_LANE_SPREAD);
        let rise = (chord * ARC_RISE_RATIO).clamp(MIN_ARC_RISE, MAX_ARC_RISE);
        ArcPath::Quadratic {
            from: s,
            control: mid + normal * spread - DVec2::new(0.0, rise),
            to: t,
        }
    };

    ArcGeometry {
        source: s,
        target: t,
        chord,
        path,
    }
}

/// Lanes and geometry for a selector output
pub fn layout_arcs<'a>(events: &[&'a TransferEvent]) -> Vec<PlacedArc<'a>> {
    assign_lanes(events)
        .into_iter()
        .zip(events.iter().copied())
        .map(|(lane, event)| PlacedArc {
            event,
            lane,
            geometry: arc_geometry(&event.source, &event.target, lane),
        })
        .collect()
}

/// Stroke weight from the event score
pub fn stroke_width(score: f64) -> f64 {
    if !score.is_finite() {
        return 0.35;
    }
    (0.35 + (score.max(0.0) + 10.0).log10() * 0.2).clamp(0.35, 1.55)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::fixtures::flow;
    use crate::model::GeoSource;

    #[test]
    fn test_lane_offsets_center_on_zero() {
        let offsets: Vec<f64> = (0..4)
            .map(|index| LaneSlot { index, total: 4 }.offset())
            .collect();
        assert_eq!(offsets, vec![-1.5, -0.5, 0.5, 1.5]);
        assert_eq!(LaneSlot::SOLO.offset(), 0.0);
    }

    #[test]
    fn test_assign_lanes_per_route() {
        let a1 = flow("a1", "0xa", "0xb", "swap", GeoSource::Geo);
        let c1 = flow("c1", "0xc", "0xd", "swap", GeoSource::Geo);
        let a2 = flow("a2", "0xa", "0xb", "swap", GeoSource::Geo);
        let lanes = assign_lanes(&[&a1, &c1, &a2]);
        assert_eq!(lanes[0], LaneSlot { index: 0, total: 2 });
        assert_eq!(lanes[1], LaneSlot { index: 0, total: 1 });
        assert_eq!(lanes[2], LaneSlot { index: 1, total: 2 });
    }

    #[test]
    fn test_parallel_lanes_fan_out() {
        let e = flow("x", "0xa", "0xb", "swap", GeoSource::Geo);
        let left = arc_geometry(&e.source, &e.target, LaneSlot { index: 0, total: 2 });
        let right = arc_geometry(&e.source, &e.target, LaneSlot { index: 1, total: 2 });
        let control = |g: ArcGeometry| match g.path {
            ArcPath::Quadratic { control, .. } => control,
            ArcPath::Loop { .. } => panic!("expected a curve"),
        };
        let gap = control(left).distance(control(right));
        assert!((gap - 2.2).abs() < 1e-9);
    }

    #[test]
    fn test_rise_is_clamped() {
        let mut e = flow("x", "0xa", "0xb", "swap", GeoSource::Geo);
        e.source.lon = -170.0;
        e.source.lat = 0.0;
        e.target.lon = 170.0;
        e.target.lat = 0.0;
        let g = arc_geometry(&e.source, &e.target, LaneSlot::SOLO);
        match g.path {
            ArcPath::Quadratic { control, from, to } => {
                let mid_y = (from.y + to.y) / 2.0;
                assert!((mid_y - control.y - 18.0).abs() < 1e-9);
            }
            ArcPath::Loop { .. } => panic!("expected a curve"),
        }
    }

    #[test]
    fn test_close_endpoints_make_a_loop() {
        let mut e = flow("x", "0xa", "0xb", "swap", GeoSource::Geo);
        e.target.lon = e.source.lon + 0.1;
        e.target.lat = e.source.lat;
        let g = arc_geometry(&e.source, &e.target, LaneSlot { index: 2, total: 3 });
        match g.path {
            ArcPath::Loop { radius, .. } => assert!((radius - 2.55).abs() < 1e-9),
            ArcPath::Quadratic { .. } => panic!("expected a loop"),
        }
    }

    #[test]
    fn test_sample_hits_endpoints() {
        let e = flow("x", "0xa", "0xb", "swap", GeoSource::Geo);
        let g = arc_geometry(&e.source, &e.target, LaneSlot::SOLO);
        let pts = g.path.sample(16);
        assert_eq!(pts.len(), 17);
        assert!((pts[0] - g.source).length() < 1e-9);
        assert!((pts[16] - g.target).length() < 1e-9);
    }

    #[test]
    fn test_stroke_width_bounds() {
        assert!((stroke_width(0.0) - 0.55).abs() < 1e-9);
        assert!(stroke_width(100.0) <= 1.55);
        assert_eq!(stroke_width(f64::NAN), 0.35);
    }
}
