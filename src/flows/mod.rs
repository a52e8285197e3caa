//! Which transfer events get drawn, and where their arcs go.

pub mod layout;
pub mod selector;

use std::collections::HashMap;

use crate::model::{RouteKey, TransferEvent};

pub use layout::{arc_geometry, assign_lanes, layout_arcs, ArcGeometry, ArcPath, LaneSlot, PlacedArc};
pub use selector::RouteSelector;

/// Group event positions by [`RouteKey`], groups in first-seen order.
///
/// Both the selector's per-route caps and the lane layout count through this
/// key, so the partitions always agree.
pub fn partition_by_route<'a, I>(events: I) -> Vec<(RouteKey, Vec<usize>)>
where
    I: IntoIterator<Item = &'a TransferEvent>,
{
    let mut slot_of: HashMap<RouteKey, usize> = HashMap::new();
    let mut groups: Vec<(RouteKey, Vec<usize>)> = Vec::new();
    for (pos, event) in events.into_iter().enumerate() {
        let key = event.route_key();
        match slot_of.get(&key) {
            Some(&slot) => groups[slot].1.push(pos),
            None => {
                slot_of.insert(key.clone(), groups.len());
                groups.push((key, vec![pos]));
            }
        }
    }
    groups
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::{Endpoint, GeoSource, TransferEvent};

    pub fn flow(id: &str, from: &str, to: &str, kind: &str, geo: GeoSource) -> TransferEvent {
        TransferEvent {
            event_id: id.to_string(),
            tx_id: format!("tx-{id}"),
            source: Endpoint {
                address: from.to_string(),
                lon: -74.0,
                lat: 40.7,
                geo_source: geo,
            },
            target: Endpoint {
                address: to.to_string(),
                lon: 2.3,
                lat: 48.9,
                geo_source: geo,
            },
            event_type: kind.to_string(),
            usd_value: 1_000_000.0,
            score: 50.0,
            timestamp: 0,
            chain: "ethereum".to_string(),
            watch_address: String::new(),
        }
    }
}
