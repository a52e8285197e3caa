//! Strict internal schema for snapshot data.
//!
//! Everything here is built by [`crate::snapshot`] from the loosely-typed
//! backend document; downstream components never see missing fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::map::projection::GeoPoint;

/// Default lookback window in seconds
pub const DEFAULT_WINDOW_SECONDS: u32 = 3600;
const MIN_WINDOW_SECONDS: u32 = 60;
const MAX_WINDOW_SECONDS: u32 = 24 * 60 * 60;
const MAX_REPLAY_OFFSET_SECONDS: u32 = 24 * 60 * 60;

/// A tracked address ("whale")
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entity {
    pub address: String,
    pub lon: f64,
    pub lat: f64,
    pub label: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub last_flow_usd: Option<f64>,
    pub portfolio_usd: Option<f64>,
    pub token_count: u32,
    pub alerts_24h: u32,
    pub alert_count_total: u32,
}

impl Entity {
    pub fn geo(&self) -> GeoPoint {
        GeoPoint::new(self.lon, self.lat)
    }

    /// max(last flow, portfolio), missing values count as 0
    pub fn strength(&self) -> f64 {
        let last = self.last_flow_usd.unwrap_or(0.0);
        let portfolio = self.portfolio_usd.unwrap_or(0.0);
        last.max(portfolio)
    }

    /// Big recent flow or a very large book
    pub fn is_hot(&self) -> bool {
        self.last_flow_usd.unwrap_or(0.0) >= 1_000_000.0
            || self.portfolio_usd.unwrap_or(0.0) >= 100_000_000.0
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.address
        } else {
            &self.label
        }
    }
}

/// Location confidence of one side of a transfer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GeoSource {
    Geo,
    Anchored,
    Pseudo,
    #[default]
    Unknown,
}

impl GeoSource {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "geo" => GeoSource::Geo,
            "anchored" => GeoSource::Anchored,
            "pseudo" => GeoSource::Pseudo,
            _ => GeoSource::Unknown,
        }
    }
}

/// Route confidence class, gated by the four route-visibility toggles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Exact,
    Anchored,
    Pseudo,
    Unknown,
}

impl RouteClass {
    pub const ALL: [RouteClass; 4] = [
        RouteClass::Exact,
        RouteClass::Anchored,
        RouteClass::Pseudo,
        RouteClass::Unknown,
    ];

    /// Query-string token
    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::Exact => "exact",
            RouteClass::Anchored => "anchored",
            RouteClass::Pseudo => "pseudo",
            RouteClass::Unknown => "unknown",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RouteClass::Exact => "Geo",
            RouteClass::Anchored => "Anchored",
            RouteClass::Pseudo => "Pseudo",
            RouteClass::Unknown => "Unknown",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        RouteClass::ALL
            .into_iter()
            .find(|class| class.as_str() == raw)
    }

    /// Weakest-link classification of a source/target pair
    pub fn classify(source: GeoSource, target: GeoSource) -> Self {
        if source == GeoSource::Geo && target == GeoSource::Geo {
            RouteClass::Exact
        } else if source == GeoSource::Anchored || target == GeoSource::Anchored {
            RouteClass::Anchored
        } else if source == GeoSource::Pseudo || target == GeoSource::Pseudo {
            RouteClass::Pseudo
        } else {
            RouteClass::Unknown
        }
    }
}

/// One side of a transfer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Endpoint {
    pub address: String,
    pub lon: f64,
    pub lat: f64,
    pub geo_source: GeoSource,
}

impl Endpoint {
    pub fn geo(&self) -> GeoPoint {
        GeoPoint::new(self.lon, self.lat)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransferEvent {
    pub event_id: String,
    pub tx_id: String,
    pub source: Endpoint,
    pub target: Endpoint,
    pub event_type: String,
    pub usd_value: f64,
    pub score: f64,
    pub timestamp: i64,
    pub chain: String,
    /// Tracked address that raised the alert, when it is neither endpoint
    pub watch_address: String,
}

impl TransferEvent {
    pub fn route_key(&self) -> RouteKey {
        RouteKey::of(self)
    }

    pub fn route_class(&self) -> RouteClass {
        RouteClass::classify(self.source.geo_source, self.target.geo_source)
    }

    /// Score clamped to the 0..=100 display range
    pub fn display_score(&self) -> f64 {
        if self.score.is_finite() {
            self.score.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// True when either side or the watched party is `address` (case-insensitive)
    pub fn touches(&self, address: &str) -> bool {
        if address.is_empty() {
            return false;
        }
        self.source.address.eq_ignore_ascii_case(address)
            || self.target.address.eq_ignore_ascii_case(address)
            || self.watch_address.eq_ignore_ascii_case(address)
    }
}

/// Identity of a flow lane: (source, target, event type)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub source: String,
    pub target: String,
    pub event_type: String,
}

impl RouteKey {
    pub fn of(event: &TransferEvent) -> Self {
        Self {
            source: or_placeholder(&event.source.address, "unknown_source"),
            target: or_placeholder(&event.target.address, "unknown_target"),
            event_type: or_placeholder(&event.event_type, "unknown_event"),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.source, self.target, self.event_type)
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

/// Backend-side filter set, also the saved-view filter snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    pub types: Vec<String>,
    pub chains: Vec<String>,
    pub min_usd: f64,
    pub window_seconds: u32,
    pub replay_offset_seconds: u32,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            chains: Vec::new(),
            min_usd: 0.0,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            replay_offset_seconds: 0,
        }
    }
}

impl FilterSet {
    /// Bring values into the ranges the backend accepts
    pub fn normalized(mut self) -> Self {
        self.types = normalize_tokens(self.types);
        self.chains = normalize_tokens(self.chains);
        self.min_usd = if self.min_usd.is_finite() {
            self.min_usd.max(0.0)
        } else {
            0.0
        };
        self.window_seconds = self
            .window_seconds
            .clamp(MIN_WINDOW_SECONDS, MAX_WINDOW_SECONDS);
        self.replay_offset_seconds = self.replay_offset_seconds.min(MAX_REPLAY_OFFSET_SECONDS);
        self
    }
}

/// Trim, lowercase, drop empties, sort and dedup
pub fn normalize_tokens(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = values
        .into_iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Visibility of the four route classes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteFilters {
    pub exact: bool,
    pub anchored: bool,
    pub pseudo: bool,
    pub unknown: bool,
}

impl Default for RouteFilters {
    /// Baseline: confident routes only
    fn default() -> Self {
        Self {
            exact: true,
            anchored: true,
            pseudo: false,
            unknown: false,
        }
    }
}

impl RouteFilters {
    pub const ALL_ENABLED: RouteFilters = RouteFilters {
        exact: true,
        anchored: true,
        pseudo: true,
        unknown: true,
    };

    pub fn none() -> Self {
        Self {
            exact: false,
            anchored: false,
            pseudo: false,
            unknown: false,
        }
    }

    pub fn enabled(&self, class: RouteClass) -> bool {
        match class {
            RouteClass::Exact => self.exact,
            RouteClass::Anchored => self.anchored,
            RouteClass::Pseudo => self.pseudo,
            RouteClass::Unknown => self.unknown,
        }
    }

    pub fn set(&mut self, class: RouteClass, on: bool) {
        match class {
            RouteClass::Exact => self.exact = on,
            RouteClass::Anchored => self.anchored = on,
            RouteClass::Pseudo => self.pseudo = on,
            RouteClass::Unknown => self.unknown = on,
        }
    }

    pub fn enabled_classes(&self) -> impl Iterator<Item = RouteClass> + '_ {
        RouteClass::ALL.into_iter().filter(|c| self.enabled(*c))
    }

    pub fn allows(&self, event: &TransferEvent) -> bool {
        self.enabled(event.route_class())
    }

    /// An all-off set would hide every route; fall back to the baseline
    pub fn normalized(self) -> Self {
        if RouteClass::ALL.iter().any(|c| self.enabled(*c)) {
            self
        } else {
            Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FiltersMeta {
    pub available_event_types: Vec<String>,
    pub available_chains: Vec<String>,
    pub max_replay_offset_seconds: u32,
}

impl Default for FiltersMeta {
    fn default() -> Self {
        Self {
            available_event_types: Vec::new(),
            available_chains: Vec::new(),
            max_replay_offset_seconds: 300,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeaState {
    pub tier: String,
    pub score_15m: f64,
}

/// One full backend state document after validation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub whales: Vec<Entity>,
    pub alerts: Vec<TransferEvent>,
    pub events: Vec<TransferEvent>,
    pub filters: FilterSet,
    pub filters_meta: FiltersMeta,
    pub sea_state: SeaState,
    pub generated_at: i64,
}

impl Snapshot {
    pub fn event_by_id(&self, event_id: &str) -> Option<&TransferEvent> {
        if event_id.is_empty() {
            return None;
        }
        self.events.iter().find(|e| e.event_id == event_id)
    }

    pub fn event_by_tx(&self, tx_id: &str) -> Option<&TransferEvent> {
        if tx_id.is_empty() {
            return None;
        }
        self.events.iter().find(|e| e.tx_id == tx_id)
    }

    /// Newest event touching an entity (events arrive newest first)
    pub fn latest_event_for(&self, address: &str) -> Option<&TransferEvent> {
        if address.is_empty() {
            return None;
        }
        self.events.iter().find(|e| e.touches(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(address: &str, geo_source: GeoSource) -> Endpoint {
        Endpoint {
            address: address.to_string(),
            geo_source,
            ..Endpoint::default()
        }
    }

    #[test]
    fn test_route_class_weakest_link() {
        use GeoSource::*;
        assert_eq!(RouteClass::classify(Geo, Geo), RouteClass::Exact);
        assert_eq!(RouteClass::classify(Geo, Anchored), RouteClass::Anchored);
        assert_eq!(RouteClass::classify(Pseudo, Anchored), RouteClass::Anchored);
        assert_eq!(RouteClass::classify(Geo, Pseudo), RouteClass::Pseudo);
        assert_eq!(RouteClass::classify(Geo, Unknown), RouteClass::Unknown);
    }

    #[test]
    fn test_route_key_placeholders() {
        let event = TransferEvent {
            source: endpoint("", GeoSource::Geo),
            target: endpoint("0xb", GeoSource::Geo),
            ..TransferEvent::default()
        };
        assert_eq!(event.route_key().to_string(), "unknown_source|0xb|unknown_event");
    }

    #[test]
    fn test_strength_prefers_larger_value() {
        let e = Entity {
            last_flow_usd: Some(2_000_000.0),
            portfolio_usd: Some(500.0),
            ..Entity::default()
        };
        assert_eq!(e.strength(), 2_000_000.0);
        assert!(e.is_hot());
        assert_eq!(Entity::default().strength(), 0.0);
    }

    #[test]
    fn test_filter_set_normalization() {
        let f = FilterSet {
            types: vec![" Swap ".into(), "swap".into(), "".into(), "bridge".into()],
            chains: vec![],
            min_usd: -5.0,
            window_seconds: 5,
            replay_offset_seconds: 999_999,
        }
        .normalized();
        assert_eq!(f.types, vec!["bridge".to_string(), "swap".to_string()]);
        assert_eq!(f.min_usd, 0.0);
        assert_eq!(f.window_seconds, 60);
        assert_eq!(f.replay_offset_seconds, 86_400);
    }

    #[test]
    fn test_all_off_routes_fall_back_to_baseline() {
        assert_eq!(RouteFilters::none().normalized(), RouteFilters::default());
        let mut only_pseudo = RouteFilters::none();
        only_pseudo.set(RouteClass::Pseudo, true);
        assert_eq!(only_pseudo.normalized(), only_pseudo);
    }

    #[test]
    fn test_latest_event_matches_either_side() {
        let snap = Snapshot {
            events: vec![
                TransferEvent {
                    event_id: "new".into(),
                    source: endpoint("0xA", GeoSource::Geo),
                    target: endpoint("0xb", GeoSource::Geo),
                    ..TransferEvent::default()
                },
                TransferEvent {
                    event_id: "old".into(),
                    source: endpoint("0xc", GeoSource::Geo),
                    target: endpoint("0xa", GeoSource::Geo),
                    ..TransferEvent::default()
                },
            ],
            ..Snapshot::default()
        };
        assert_eq!(snap.latest_event_for("0xa").map(|e| e.event_id.as_str()), Some("new"));
        assert!(snap.latest_event_for("").is_none());
    }

    #[test]
    fn test_latest_event_matches_watched_party() {
        let snap = Snapshot {
            events: vec![TransferEvent {
                event_id: "watched".into(),
                source: endpoint("0xc", GeoSource::Geo),
                target: endpoint("0xd", GeoSource::Geo),
                watch_address: "0xW".into(),
                ..TransferEvent::default()
            }],
            ..Snapshot::default()
        };
        assert_eq!(snap.latest_event_for("0xw").map(|e| e.event_id.as_str()), Some("watched"));
        assert!(snap.latest_event_for("0xe").is_none());
    }
}
