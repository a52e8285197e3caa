//! Drawing contract between the dashboard and whatever shows it.
//!
//! Points and paths are in map-plane units (`0..100`); surfaces apply the
//! viewport transform themselves.

use glam::DVec2;

use crate::flows::ArcPath;
use crate::map::cluster::ClusterId;
use crate::model::RouteClass;
use crate::replay::{DrawKind, TransientDraw};

/// What activating a marker asks the dashboard to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkerAction {
    /// Focus the newest flow touching this address
    FocusEntity(String),
    ToggleCluster(ClusterId),
    CollapseCluster,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    Entity,
    /// Collapsed group
    Cluster { count: usize },
    /// Member of the expanded group
    Member,
    /// Centre of the expanded group
    CollapseCore,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarkerStyle {
    pub kind: MarkerKind,
    pub label: String,
    pub hot: bool,
    /// Touches the focused flow
    pub focused: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emphasis {
    Normal,
    Focused,
    Muted,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArcStyle {
    pub class: RouteClass,
    pub width: f64,
    pub emphasis: Emphasis,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransientStyle {
    pub kind: DrawKind,
    pub class: RouteClass,
}

pub trait RenderSurface {
    fn place_marker(&mut self, point: DVec2, size: f64, style: MarkerStyle, on_activate: MarkerAction);
    fn place_arc(&mut self, path: &ArcPath, style: ArcStyle);
    fn place_transient_marker(&mut self, point: DVec2, style: TransientStyle, ttl_ms: u64);
}

/// Live transient draws and when each disappears
#[derive(Debug, Default)]
pub struct TransientLayer {
    live: Vec<(TransientDraw, u64)>,
}

impl TransientLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, draw: TransientDraw, now_ms: u64) {
        let expires_at = now_ms + draw.kind.ttl_ms();
        self.live.push((draw, expires_at));
    }

    /// Drop expired draws
    pub fn prune(&mut self, now_ms: u64) {
        self.live.retain(|(_, expires_at)| *expires_at > now_ms);
    }

    /// Unexpired draws with their remaining lifetime
    pub fn active(&self, now_ms: u64) -> impl Iterator<Item = (&TransientDraw, u64)> + '_ {
        self.live
            .iter()
            .filter(move |(_, expires_at)| *expires_at > now_ms)
            .map(move |(draw, expires_at)| (draw, expires_at - now_ms))
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    /// Surface that just remembers what was placed
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        pub markers: Vec<(DVec2, f64, MarkerStyle, MarkerAction)>,
        pub arcs: Vec<(ArcPath, ArcStyle)>,
        pub transients: Vec<(DVec2, TransientStyle, u64)>,
    }

    impl RenderSurface for RecordingSurface {
        fn place_marker(&mut self, point: DVec2, size: f64, style: MarkerStyle, on_activate: MarkerAction) {
            self.markers.push((point, size, style, on_activate));
        }

        fn place_arc(&mut self, path: &ArcPath, style: ArcStyle) {
            self.arcs.push((*path, style));
        }

        fn place_transient_marker(&mut self, point: DVec2, style: TransientStyle, ttl_ms: u64) {
            self.transients.push((point, style, ttl_ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::fixtures::flow;
    use crate::flows::LaneSlot;
    use crate::model::GeoSource;

    fn draw(kind: DrawKind) -> TransientDraw {
        TransientDraw {
            event: flow("e", "0xa", "0xb", "swap", GeoSource::Geo),
            lane: LaneSlot::SOLO,
            kind,
        }
    }

    #[test]
    fn test_transients_expire_by_kind() {
        let mut layer = TransientLayer::new();
        layer.push(draw(DrawKind::Replay), 1_000);
        layer.push(draw(DrawKind::Fresh), 1_000);
        let remaining: Vec<u64> = layer.active(2_000).map(|(_, ttl)| ttl).collect();
        assert_eq!(remaining, vec![1_100, 2_200]);

        layer.prune(3_100);
        assert_eq!(layer.len(), 1);
        layer.prune(4_200);
        assert!(layer.is_empty());
    }
}
