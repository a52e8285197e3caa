use std::collections::HashMap;

use crate::model::{RouteFilters, RouteKey, TransferEvent};

/// Caps that keep the arc layer readable
#[derive(Clone, Debug)]
pub struct RouteSelector {
    /// Events per route when nothing is focused
    pub per_route_max: usize,
    /// Total events when nothing is focused
    pub max_total: usize,
    /// Events kept on the focused route
    pub focus_route_max: usize,
    /// Context events from other routes while focused
    pub context_max: usize,
    /// Per-route cap for context events
    pub context_per_route: usize,
}

impl Default for RouteSelector {
    fn default() -> Self {
        Self {
            per_route_max: 2,
            max_total: 84,
            focus_route_max: 16,
            context_max: 48,
            context_per_route: 1,
        }
    }
}

impl RouteSelector {
    /// Ordered list of events to draw.
    ///
    /// Hidden route classes are dropped except for the focused event. With a
    /// focus, its whole route (up to `focus_route_max`) is kept plus a thin
    /// one-per-route context; without one, every route is capped.
    pub fn select<'a>(
        &self,
        events: &'a [TransferEvent],
        routes: &RouteFilters,
        focus: Option<&str>,
    ) -> Vec<&'a TransferEvent> {
        let focus = focus.filter(|id| !id.is_empty());
        let visible: Vec<&TransferEvent> = events
            .iter()
            .filter(|e| routes.allows(e) || focus == Some(e.event_id.as_str()))
            .collect();

        let Some(focused) = focus.and_then(|id| visible.iter().copied().find(|e| e.event_id == id))
        else {
            return cap_per_route(&visible, self.max_total, self.per_route_max);
        };

        let focus_key = focused.route_key();
        let (same_route, others): (Vec<&TransferEvent>, Vec<&TransferEvent>) = visible
            .iter()
            .copied()
            .partition(|e| e.route_key() == focus_key);

        let mut out: Vec<&TransferEvent> = same_route
            .into_iter()
            .take(self.focus_route_max)
            .collect();
        out.extend(cap_per_route(&others, self.context_max, self.context_per_route));
        if out.is_empty() {
            out.push(focused);
        }
        out
    }
}

/// First `per_route` events of each route in input order, stopping at `max_total`
fn cap_per_route<'a>(
    events: &[&'a TransferEvent],
    max_total: usize,
    per_route: usize,
) -> Vec<&'a TransferEvent> {
    let mut counts: HashMap<RouteKey, usize> = HashMap::new();
    let mut picked = Vec::new();
    if max_total == 0 {
        return picked;
    }
    for &event in events {
        let count = counts.entry(event.route_key()).or_insert(0);
        if *count >= per_route {
            continue;
        }
        *count += 1;
        picked.push(event);
        if picked.len() >= max_total {
            break;
        }
    }
    picked
}
