use std::f64::consts::{FRAC_PI_2, TAU};

use glam::DVec2;

use crate::map::projection::{clamp_to_marker_area, marker_point};
use crate::model::Entity;

/// Plane-unit join distance between an entity and a cluster centroid
pub const CLUSTER_THRESHOLD: f64 = 3.9;

/// Stable cluster identity: sorted member addresses joined by `|`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClusterId(String);

impl ClusterId {
    pub fn from_members(members: &[&Entity]) -> Self {
        let mut addresses: Vec<&str> = members
            .iter()
            .map(|e| e.address.as_str())
            .filter(|a| !a.is_empty())
            .collect();
        addresses.sort_unstable();
        Self(addresses.join("|"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Entities whose projected points fell within the threshold of a running centroid
#[derive(Clone, Debug)]
pub struct Cluster<'a> {
    pub id: ClusterId,
    pub centroid: DVec2,
    /// Strongest first
    pub members: Vec<&'a Entity>,
}

impl Cluster<'_> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_group(&self) -> bool {
        self.members.len() > 1
    }

    /// Collapsed marker size, grows with the log of the member count
    pub fn marker_size(&self) -> f64 {
        (34.0 + ((self.len() + 1) as f64).log2() * 9.0).clamp(36.0, 72.0)
    }

    /// Radial positions for the expanded view, strongest member at 12 o'clock
    pub fn fan_out(&self) -> Vec<(&Entity, DVec2)> {
        let count = self.members.len();
        if count == 0 {
            return Vec::new();
        }
        let radius = (2.2 + count as f64 * 0.2).clamp(2.6, 5.8);
        // Members are already strongest-first; sort again in case a caller
        // built the cluster by hand.
        let mut ordered = self.members.clone();
        ordered.sort_by(|a, b| b.strength().total_cmp(&a.strength()));
        ordered
            .into_iter()
            .enumerate()
            .map(|(index, entity)| {
                let angle = TAU / count as f64 * index as f64 - FRAC_PI_2;
                let offset = DVec2::new(angle.cos(), angle.sin()) * radius;
                (entity, clamp_to_marker_area(self.centroid + offset))
            })
            .collect()
    }
}

/// Greedy first-fit clustering.
///
/// Entities are visited strongest first; each joins the first existing
/// cluster (creation order) whose centroid is within `threshold`, else starts
/// a new one. First-fit can chain entities further apart than `threshold`.
pub fn cluster_entities(entities: &[Entity], threshold: f64) -> Vec<Cluster<'_>> {
    let mut ordered: Vec<&Entity> = entities.iter().collect();
    ordered.sort_by(|a, b| b.strength().total_cmp(&a.strength()));

    let mut building: Vec<(DVec2, Vec<&Entity>)> = Vec::new();
    for entity in ordered {
        let point = marker_point(entity.geo());
        let hit = building
            .iter_mut()
            .find(|(centroid, _)| centroid.distance(point) <= threshold);
        match hit {
            Some((centroid, members)) => {
                members.push(entity);
                let n = members.len() as f64;
                *centroid = (*centroid * (n - 1.0) + point) / n;
            }
            None => building.push((point, vec![entity])),
        }
    }

    building
        .into_iter()
        .map(|(centroid, members)| Cluster {
            id: ClusterId::from_members(&members),
            centroid,
            members,
        })
        .collect()
}

/// Which cluster (if any) is fanned out
#[derive(Clone, Debug, Default)]
pub struct ClusterExpansion {
    expanded: Option<ClusterId>,
}

impl ClusterExpansion {
    pub fn expanded(&self) -> Option<&ClusterId> {
        self.expanded.as_ref()
    }

    pub fn is_expanded(&self, id: &ClusterId) -> bool {
        self.expanded.as_ref() == Some(id)
    }

    pub fn toggle(&mut self, id: &ClusterId) {
        if self.is_expanded(id) {
            self.expanded = None;
        } else {
            self.expanded = Some(id.clone());
        }
    }

    pub fn collapse(&mut self) {
        self.expanded = None;
    }

    /// Forget the expansion if that cluster no longer exists
    pub fn retain_existing(&mut self, clusters: &[Cluster<'_>]) {
        if let Some(id) = &self.expanded {
            if !clusters.iter().any(|c| &c.id == id) {
                self.expanded = None;
            }
        }
    }
}

/// Marker size for a single entity from its strength
pub fn entity_marker_size(strength_usd: f64) -> f64 {
    if strength_usd <= 0.0 || !strength_usd.is_finite() {
        return 26.0;
    }
    (20.0 + (strength_usd + 1.0).log10() * 7.0).clamp(24.0, 64.0)
}
