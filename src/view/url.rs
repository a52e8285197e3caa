//! Shareable link encoding.
//!
//! Fields at their default are left out so links stay short. Decoding is the
//! inverse for every emitted field; a missing or empty `routes` means the
//! baseline (exact + anchored), not all four classes.

use reqwest::Url;

use crate::model::{FilterSet, RouteClass, RouteFilters, DEFAULT_WINDOW_SECONDS};
use crate::view::ViewState;

/// Ordered `(key, value)` pairs for a state, defaults omitted
pub fn encode_query(state: &ViewState) -> Vec<(&'static str, String)> {
    let f = &state.filters;
    let mut pairs = Vec::new();
    if !f.types.is_empty() {
        pairs.push(("types", csv(&f.types)));
    }
    if !f.chains.is_empty() {
        pairs.push(("chains", csv(&f.chains)));
    }
    if f.min_usd > 0.0 {
        pairs.push(("min_usd", f.min_usd.to_string()));
    }
    if f.window_seconds != DEFAULT_WINDOW_SECONDS {
        pairs.push(("window_seconds", f.window_seconds.to_string()));
    }
    if f.replay_offset_seconds > 0 {
        pairs.push(("replay_offset_seconds", f.replay_offset_seconds.to_string()));
    }
    if state.routes != RouteFilters::ALL_ENABLED {
        let enabled: Vec<&str> = state.routes.enabled_classes().map(RouteClass::as_str).collect();
        pairs.push(("routes", enabled.join(",")));
    }
    if let Some(event) = state.focus.as_deref().filter(|id| !id.is_empty()) {
        pairs.push(("event", event.to_string()));
    }
    pairs
}

/// `base` with its query replaced by the encoded state
pub fn share_url(base: &Url, state: &ViewState) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    let pairs = encode_query(state);
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    url
}

/// Everything a link may ask for, unset fields left as `None`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkSpec {
    pub event: Option<String>,
    pub tx: Option<String>,
    /// Saved view name
    pub view: Option<String>,
    pub types: Vec<String>,
    pub chains: Vec<String>,
    pub min_usd: Option<f64>,
    pub window_seconds: Option<u32>,
    pub replay_offset_seconds: Option<u32>,
    /// `None` when `routes` was absent or empty
    pub routes: Option<RouteFilters>,
}

impl LinkSpec {
    /// True when the link names any filter value
    pub fn has_filters(&self) -> bool {
        !self.types.is_empty()
            || !self.chains.is_empty()
            || self.min_usd.is_some()
            || self.window_seconds.is_some()
            || self.replay_offset_seconds.is_some()
    }

    /// Overlay the link's filter values on `base`
    pub fn apply_filters(&self, base: &FilterSet) -> FilterSet {
        if !self.has_filters() {
            return base.clone();
        }
        FilterSet {
            types: self.types.clone(),
            chains: self.chains.clone(),
            min_usd: self.min_usd.unwrap_or(base.min_usd),
            window_seconds: self.window_seconds.unwrap_or(base.window_seconds),
            replay_offset_seconds: self
                .replay_offset_seconds
                .unwrap_or(base.replay_offset_seconds),
        }
        .normalized()
    }
}

pub fn decode_link(url: &Url) -> LinkSpec {
    let mut wanted = LinkSpec::default();
    for (key, value) in url.query_pairs() {
        let value = value.trim();
        match key.as_ref() {
            "event" => wanted.event = non_empty(value),
            "tx" => wanted.tx = non_empty(value),
            "view" => wanted.view = non_empty(value),
            "types" => wanted.types = list_from_csv(value),
            "chains" => wanted.chains = list_from_csv(value),
            "min_usd" => {
                if let Some(n) = parse_number(value) {
                    wanted.min_usd = Some(n.max(0.0));
                }
            }
            "window_seconds" => {
                if let Some(n) = parse_number(value) {
                    wanted.window_seconds = Some(n.max(0.0) as u32);
                }
            }
            "replay_offset_seconds" => {
                if let Some(n) = parse_number(value) {
                    wanted.replay_offset_seconds = Some(n.max(0.0) as u32);
                }
            }
            "routes" => wanted.routes = routes_from_csv(value),
            _ => {}
        }
    }
    wanted
}

/// Decode straight into a [`ViewState`], starting from defaults
pub fn decode_state(url: &Url) -> ViewState {
    let wanted = decode_link(url);
    ViewState {
        filters: wanted.apply_filters(&FilterSet::default()),
        routes: wanted.routes.unwrap_or_default(),
        focus: wanted.event,
    }
}

fn csv(values: &[String]) -> String {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn list_from_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

fn routes_from_csv(value: &str) -> Option<RouteFilters> {
    let classes = list_from_csv(value);
    if classes.is_empty() {
        return None;
    }
    let mut routes = RouteFilters::none();
    for class in classes.iter().filter_map(|c| RouteClass::parse(c)) {
        routes.set(class, true);
    }
    Some(routes.normalized())
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://127.0.0.1:8000/").unwrap()
    }

    fn round_trip(state: &ViewState) -> ViewState {
        decode_state(&share_url(&base(), state))
    }

    #[test]
    fn test_default_state_round_trips() {
        let state = ViewState::default();
        let url = share_url(&base(), &state);
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/?routes=exact%2Canchored");
        assert_eq!(round_trip(&state), state);
    }

    #[test]
    fn test_all_enabled_emits_nothing() {
        let state = ViewState {
            routes: RouteFilters::ALL_ENABLED,
            ..ViewState::default()
        };
        assert_eq!(share_url(&base(), &state).as_str(), "http://127.0.0.1:8000/");
    }

    #[test]
    fn test_partial_override_round_trips() {
        let state = ViewState {
            filters: FilterSet {
                types: vec!["swap".into(), "transfer_large".into()],
                chains: vec!["ethereum".into()],
                min_usd: 250_000.0,
                window_seconds: 7200,
                replay_offset_seconds: 90,
            },
            routes: RouteFilters {
                exact: true,
                anchored: false,
                pseudo: true,
                unknown: false,
            },
            focus: Some("evt 1&2".into()),
        };
        let url = share_url(&base(), &state);
        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(
            keys,
            vec![
                "types",
                "chains",
                "min_usd",
                "window_seconds",
                "replay_offset_seconds",
                "routes",
                "event"
            ]
        );
        assert_eq!(round_trip(&state), state);
    }

    #[test]
    fn test_all_routes_hidden_decodes_to_baseline() {
        let state = ViewState {
            routes: RouteFilters::none(),
            ..ViewState::default()
        };
        let url = share_url(&base(), &state);
        assert!(url.as_str().ends_with("?routes="));
        assert_eq!(decode_state(&url).routes, RouteFilters::default());
    }

    #[test]
    fn test_bad_numbers_are_ignored() {
        let url = Url::parse("http://h/?min_usd=lots&window_seconds=NaN&replay_offset_seconds=30").unwrap();
        let state = decode_state(&url);
        assert_eq!(state.filters.min_usd, 0.0);
        assert_eq!(state.filters.window_seconds, 3600);
        assert_eq!(state.filters.replay_offset_seconds, 30);
    }

    #[test]
    fn test_link_extras_are_decoded() {
        let url = Url::parse("http://h/?view=Night+Watch&tx=0xabc&routes=pseudo,bogus").unwrap();
        let wanted = decode_link(&url);
        assert_eq!(wanted.view.as_deref(), Some("Night Watch"));
        assert_eq!(wanted.tx.as_deref(), Some("0xabc"));
        assert!(!wanted.has_filters());
        let routes = wanted.routes.unwrap();
        assert!(routes.pseudo && !routes.exact);
    }

    #[test]
    fn test_existing_query_is_replaced() {
        let stale = Url::parse("http://h/?event=old#frag").unwrap();
        let url = share_url(&stale, &ViewState { routes: RouteFilters::ALL_ENABLED, ..ViewState::default() });
        assert_eq!(url.as_str(), "http://h/");
    }
}
