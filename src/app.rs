use std::collections::HashSet;

use glam::DVec2;
use reqwest::Url;

use crate::client::{ApiJob, ApiRequest, ApiResponse, BackendAction};
use crate::flows::layout::stroke_width;
use crate::flows::{arc_geometry, layout_arcs, LaneSlot, RouteSelector};
use crate::map::cluster::{cluster_entities, entity_marker_size, Cluster, ClusterExpansion, CLUSTER_THRESHOLD};
use crate::map::projection::{marker_point, project, unproject, GeoPoint, PLANE_EXTENT};
use crate::map::viewport::{PointerIntent, ViewportController, ViewportResponse};
use crate::model::{normalize_tokens, FilterSet, RouteClass, RouteFilters, Snapshot, TransferEvent};
use crate::render::{
    ArcStyle, Emphasis, MarkerAction, MarkerKind, MarkerStyle, RenderSurface, TransientLayer,
    TransientStyle,
};
use crate::replay::{DrawKind, ReplayEngine, ReplayPhase, TransientDraw};
use crate::snapshot::RefreshFence;
use crate::view::{decode_link, LocationBar, PresetBook, PresetStore, ViewPreset, ViewState, ViewSync};

/// Min-USD steps offered by the keyboard
const MIN_USD_LADDER: [f64; 8] = [
    0.0, 100_000.0, 250_000.0, 500_000.0, 1_000_000.0, 2_500_000.0, 5_000_000.0, 10_000_000.0,
];
/// Window steps in seconds
const WINDOW_LADDER: [u32; 8] = [300, 900, 1800, 3600, 7200, 21_600, 43_200, 86_400];
const REPLAY_OFFSET_STEP: u32 = 30;
/// Fresh flows flashed per refresh
const MAX_FRESH_FLASHES: usize = 12;
const COLLAPSE_CORE_SIZE: f64 = 18.0;

/// Dashboard state and the operations the operator can perform on it.
///
/// Everything mutable lives here and is only touched from the UI thread.
/// Network work is queued as [`ApiRequest`]s for the refresh worker.
pub struct Dashboard {
    pub snapshot: Snapshot,
    pub viewport: ViewportController,
    pub should_quit: bool,
    expansion: ClusterExpansion,
    focus: Option<String>,
    /// Link asked for a transaction that was not loaded yet
    pending_tx: Option<String>,
    /// Replay the focus once its event shows up
    replay_on_load: bool,
    routes: RouteFilters,
    filters: FilterSet,
    paused: bool,
    selector: RouteSelector,
    replay: ReplayEngine,
    transients: TransientLayer,
    presets: PresetBook,
    store: Box<dyn PresetStore>,
    selected_view: Option<String>,
    location: ViewSync<LocationBar>,
    fence: RefreshFence,
    outbox: Vec<ApiRequest>,
    seen_events: HashSet<String>,
    loaded: bool,
    poll_interval_ms: u64,
    next_poll_at: u64,
    status: String,
}

impl Dashboard {
    pub fn new(width: f64, height: f64, base: Url, store: Box<dyn PresetStore>) -> Self {
        let presets = PresetBook::load(store.as_ref());
        let location = ViewSync::new(base.clone(), LocationBar::new(base));
        Self {
            snapshot: Snapshot::default(),
            viewport: ViewportController::new(width, height),
            should_quit: false,
            expansion: ClusterExpansion::default(),
            focus: None,
            pending_tx: None,
            replay_on_load: false,
            routes: RouteFilters::default(),
            filters: FilterSet::default(),
            paused: false,
            selector: RouteSelector::default(),
            replay: ReplayEngine::new(),
            transients: TransientLayer::new(),
            presets,
            store,
            selected_view: None,
            location,
            fence: RefreshFence::new(),
            outbox: Vec::new(),
            seen_events: HashSet::new(),
            loaded: false,
            poll_interval_ms: 12_000,
            next_poll_at: 0,
            status: String::from("waiting for first snapshot"),
        }
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms.max(1_000);
        self
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn focused_event(&self) -> Option<&TransferEvent> {
        self.focus.as_deref().and_then(|id| self.snapshot.event_by_id(id))
    }

    pub fn routes(&self) -> RouteFilters {
        self.routes
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn presets(&self) -> &PresetBook {
        &self.presets
    }

    pub fn selected_view(&self) -> Option<&str> {
        self.selected_view.as_deref()
    }

    pub fn location(&self) -> &Url {
        self.location.sink().current()
    }

    pub fn replay_phase(&self) -> ReplayPhase {
        self.replay.phase()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    pub fn view_state(&self) -> ViewState {
        ViewState {
            filters: self.filters.clone(),
            routes: self.routes,
            focus: self.focus.clone(),
        }
    }

    pub fn share_link(&self) -> String {
        self.location.share_link(&self.view_state())
    }

    fn sync_location(&mut self) {
        let state = self.view_state();
        self.location.sync(&state);
    }

    // Backend traffic

    fn request(&mut self, job: ApiJob) {
        let epoch = self.fence.issue();
        self.outbox.push(ApiRequest { epoch, job });
    }

    /// Requests queued since the last call, oldest first
    pub fn take_requests(&mut self) -> Vec<ApiRequest> {
        std::mem::take(&mut self.outbox)
    }

    pub fn refresh(&mut self) {
        self.request(ApiJob::Refresh);
    }

    pub fn trigger(&mut self, action: BackendAction) {
        self.status = format!("{}…", action.label());
        self.request(ApiJob::Action(action));
    }

    pub fn apply_response(&mut self, response: ApiResponse, now_ms: u64) {
        match response.snapshot {
            Ok(snapshot) => {
                if self.fence.accept(response.epoch) {
                    self.apply_snapshot(snapshot, now_ms);
                } else {
                    tracing::debug!(epoch = response.epoch, "discarded superseded snapshot");
                }
            }
            Err(e) => {
                tracing::warn!(epoch = response.epoch, error = %format!("{e:#}"), "refresh failed, keeping last snapshot");
                self.status = format!("refresh failed: {e}");
            }
        }
    }

    /// Replace the snapshot wholesale
    pub fn apply_snapshot(&mut self, snapshot: Snapshot, now_ms: u64) {
        let fresh: Vec<TransferEvent> = if self.loaded {
            snapshot
                .events
                .iter()
                .filter(|e| !self.seen_events.contains(&e.event_id) && self.routes.allows(e))
                .take(MAX_FRESH_FLASHES)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        self.seen_events = snapshot.events.iter().map(|e| e.event_id.clone()).collect();
        let previous_filters = std::mem::replace(&mut self.filters, snapshot.filters.clone());
        self.snapshot = snapshot;
        self.loaded = true;

        for event in fresh {
            self.transients.push(
                TransientDraw {
                    event,
                    lane: LaneSlot::SOLO,
                    kind: DrawKind::Fresh,
                },
                now_ms,
            );
        }

        let clusters = cluster_entities(&self.snapshot.whales, CLUSTER_THRESHOLD);
        self.expansion.retain_existing(&clusters);
        self.resolve_pending_focus(now_ms);
        let focus_lost = self.drop_aged_out_focus();
        if focus_lost || self.filters != previous_filters {
            self.sync_location();
        }

        tracing::info!(
            whales = self.snapshot.whales.len(),
            events = self.snapshot.events.len(),
            generated_at = self.snapshot.generated_at,
            "snapshot applied"
        );
        self.status = format!(
            "{} whales · {} flows · sea {}",
            self.snapshot.whales.len(),
            self.snapshot.events.len(),
            if self.snapshot.sea_state.tier.is_empty() {
                "calm"
            } else {
                self.snapshot.sea_state.tier.as_str()
            }
        );
    }

    fn resolve_pending_focus(&mut self, now_ms: u64) {
        if let Some(tx) = self.pending_tx.clone() {
            if let Some(id) = self.snapshot.event_by_tx(&tx).map(|e| e.event_id.clone()) {
                self.pending_tx = None;
                self.focus = Some(id);
                self.replay_on_load = true;
                self.sync_location();
            }
        }
        if self.replay_on_load {
            if let Some(event) = self.focused_event().cloned() {
                self.replay_on_load = false;
                self.replay.replay(&event, &self.snapshot.events, now_ms);
            }
        }
    }

    /// Forget a focus whose event left the snapshot. A link focus still
    /// waiting to resolve is kept.
    fn drop_aged_out_focus(&mut self) -> bool {
        if self.replay_on_load || self.pending_tx.is_some() {
            return false;
        }
        let Some(id) = self.focus.as_deref() else {
            return false;
        };
        if self.snapshot.event_by_id(id).is_some() {
            return false;
        }
        tracing::debug!(event = id, "focused event aged out");
        self.focus = None;
        self.replay.cancel();
        true
    }

    // Focus

    /// Focus an event and replay its route. An id that is not in the
    /// snapshot is still kept as the focus.
    pub fn focus_event(&mut self, event_id: &str, now_ms: u64) {
        if event_id.is_empty() {
            return;
        }
        self.focus = Some(event_id.to_string());
        match self.snapshot.event_by_id(event_id).cloned() {
            Some(event) => {
                self.replay.replay(&event, &self.snapshot.events, now_ms);
                self.replay_on_load = false;
            }
            None => self.replay_on_load = true,
        }
        self.sync_location();
    }

    /// Focus the newest flow touching an entity
    pub fn focus_entity(&mut self, address: &str, now_ms: u64) {
        match self.snapshot.latest_event_for(address).map(|e| e.event_id.clone()) {
            Some(id) => self.focus_event(&id, now_ms),
            None => self.status = format!("no recent flows for {address}"),
        }
    }

    pub fn clear_focus(&mut self) {
        if self.focus.take().is_none() {
            return;
        }
        self.replay.cancel();
        self.replay_on_load = false;
        self.sync_location();
    }

    /// Step focus through the drawn flows
    pub fn cycle_focus(&mut self, forward: bool, now_ms: u64) {
        let ids: Vec<String> = self
            .selected_events()
            .iter()
            .map(|e| e.event_id.clone())
            .collect();
        if ids.is_empty() {
            return;
        }
        let current = self
            .focus
            .as_ref()
            .and_then(|f| ids.iter().position(|id| id == f));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => ids.len() - 1,
            (Some(i), true) => (i + 1) % ids.len(),
            (Some(i), false) => (i + ids.len() - 1) % ids.len(),
        };
        self.focus_event(&ids[next], now_ms);
    }

    // Filters

    pub fn toggle_route_class(&mut self, class: RouteClass) {
        let on = !self.routes.enabled(class);
        self.routes.set(class, on);
        self.sync_location();
    }

    pub fn toggle_type(&mut self, event_type: &str) {
        toggle_token(&mut self.filters.types, event_type);
        self.apply_filters();
    }

    pub fn toggle_chain(&mut self, chain: &str) {
        toggle_token(&mut self.filters.chains, chain);
        self.apply_filters();
    }

    /// Step the type filter through "all", then each available type alone
    pub fn cycle_type(&mut self) {
        self.filters.types = next_solo(
            &self.filters.types,
            &self.snapshot.filters_meta.available_event_types,
        );
        self.apply_filters();
    }

    pub fn cycle_chain(&mut self) {
        self.filters.chains =
            next_solo(&self.filters.chains, &self.snapshot.filters_meta.available_chains);
        self.apply_filters();
    }

    pub fn step_min_usd(&mut self, up: bool) {
        let current = self.filters.min_usd;
        let next = if up {
            MIN_USD_LADDER.iter().copied().find(|v| *v > current)
        } else {
            MIN_USD_LADDER.iter().rev().copied().find(|v| *v < current)
        };
        if let Some(value) = next {
            self.filters.min_usd = value;
            self.apply_filters();
        }
    }

    pub fn step_window(&mut self, up: bool) {
        let current = self.filters.window_seconds;
        let next = if up {
            WINDOW_LADDER.iter().copied().find(|v| *v > current)
        } else {
            WINDOW_LADDER.iter().rev().copied().find(|v| *v < current)
        };
        if let Some(value) = next {
            self.filters.window_seconds = value;
            self.apply_filters();
        }
    }

    /// Move the replay offset; any positive offset pauses live updates
    pub fn step_replay_offset(&mut self, up: bool) {
        let max = self.snapshot.filters_meta.max_replay_offset_seconds;
        let current = self.filters.replay_offset_seconds;
        let next = if up {
            (current + REPLAY_OFFSET_STEP).min(max)
        } else {
            current.saturating_sub(REPLAY_OFFSET_STEP)
        };
        if next == current {
            return;
        }
        self.filters.replay_offset_seconds = next;
        self.paused = true;
        self.apply_filters();
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        if !self.paused {
            self.filters.replay_offset_seconds = 0;
        }
        self.apply_filters();
    }

    /// Post the filter set and refresh. Live mode always posts offset 0.
    fn apply_filters(&mut self) {
        self.filters = std::mem::take(&mut self.filters).normalized();
        let mut posted = self.filters.clone();
        if !self.paused {
            posted.replay_offset_seconds = 0;
        }
        self.request(ApiJob::PostFilters(posted));
        self.sync_location();
    }

    // Saved views

    pub fn save_view(&mut self, name: &str, saved_at: i64) -> bool {
        let preset = ViewPreset {
            name: name.to_string(),
            saved_at,
            filters: self.filters.clone(),
            route_filters: self.routes,
        };
        if !self.presets.save(preset) {
            return false;
        }
        if let Err(e) = self.presets.persist(self.store.as_ref()) {
            tracing::warn!(error = %e, "could not persist saved views");
            self.status = format!("view kept for this session only: {e}");
        }
        self.selected_view = Some(name.trim().to_string());
        self.sync_location();
        self.refresh();
        true
    }

    pub fn delete_view(&mut self, name: &str) -> bool {
        if !self.presets.delete(name) {
            return false;
        }
        if let Err(e) = self.presets.persist(self.store.as_ref()) {
            tracing::warn!(error = %e, "could not persist saved views");
        }
        if self.selected_view.as_deref() == Some(name) {
            self.selected_view = None;
        }
        self.sync_location();
        true
    }

    pub fn apply_view(&mut self, name: &str) -> bool {
        let Some(preset) = self.presets.find(name).cloned() else {
            return false;
        };
        self.filters = preset.filters.normalized();
        self.paused = self.filters.replay_offset_seconds > 0;
        self.routes = preset.route_filters.normalized();
        self.selected_view = Some(preset.name);
        self.apply_filters();
        true
    }

    /// Apply the next saved view in display order
    pub fn cycle_view(&mut self) -> bool {
        let names: Vec<String> = self.presets.sorted().iter().map(|v| v.name.clone()).collect();
        if names.is_empty() {
            return false;
        }
        let next = self
            .selected_view
            .as_ref()
            .and_then(|s| names.iter().position(|n| n == s))
            .map_or(0, |i| (i + 1) % names.len());
        self.apply_view(&names[next])
    }

    /// Restore a shared link: saved view, then filters, then routes, then
    /// focus (`event` before `tx`), then resync the location.
    pub fn restore_link(&mut self, url: &Url, now_ms: u64) {
        let wanted = decode_link(url);
        if let Some(name) = wanted.view.as_deref() {
            if !self.apply_view(name) {
                tracing::info!(view = name, "linked view not found");
            }
        }
        if wanted.has_filters() {
            self.filters = wanted.apply_filters(&self.filters);
            if wanted.replay_offset_seconds.is_some() {
                self.paused = self.filters.replay_offset_seconds > 0;
            }
            self.apply_filters();
        }
        if let Some(routes) = wanted.routes {
            self.routes = routes;
        }
        let by_tx = wanted
            .tx
            .as_deref()
            .and_then(|tx| self.snapshot.event_by_tx(tx))
            .map(|e| e.event_id.clone());
        let event_resolves = wanted
            .event
            .as_deref()
            .is_some_and(|id| self.snapshot.event_by_id(id).is_some());
        match (wanted.event, by_tx) {
            (Some(id), _) if event_resolves => self.focus_event(&id, now_ms),
            (_, Some(id)) => self.focus_event(&id, now_ms),
            (Some(id), None) => {
                self.pending_tx = wanted.tx;
                self.focus_event(&id, now_ms);
            }
            (None, None) => self.pending_tx = wanted.tx,
        }
        self.sync_location();
    }

    // Pointer and markers

    /// Run a pointer intent through the viewport; a deliberate background
    /// click drops the focus.
    pub fn handle_pointer(&mut self, intent: PointerIntent, now_ms: u64) -> ViewportResponse {
        let response = self.viewport.handle(intent, now_ms);
        if response == ViewportResponse::BackgroundClick && self.focus.is_some() {
            self.clear_focus();
        }
        response
    }

    pub fn activate(&mut self, action: &MarkerAction, now_ms: u64) {
        match action {
            MarkerAction::FocusEntity(address) => self.focus_entity(address, now_ms),
            MarkerAction::ToggleCluster(id) => self.expansion.toggle(id),
            MarkerAction::CollapseCluster => self.expansion.collapse(),
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.resize(width, height);
    }

    // Time

    /// Fire due replay cues, expire transients, and queue the periodic
    /// refresh unless paused.
    pub fn tick(&mut self, now_ms: u64) {
        for draw in self.replay.tick(now_ms) {
            self.transients.push(draw, now_ms);
        }
        self.transients.prune(now_ms);
        if now_ms >= self.next_poll_at {
            self.next_poll_at = now_ms + self.poll_interval_ms;
            if !self.paused {
                self.refresh();
            }
        }
    }

    // Drawing

    pub fn clusters(&self) -> Vec<Cluster<'_>> {
        cluster_entities(&self.snapshot.whales, CLUSTER_THRESHOLD)
    }

    pub fn selected_events(&self) -> Vec<&TransferEvent> {
        self.selector
            .select(&self.snapshot.events, &self.routes, self.focus.as_deref())
    }

    pub fn draw(&self, surface: &mut dyn RenderSurface, now_ms: u64) {
        let focused = self.focused_event();
        let focus_key = focused.map(|e| e.route_key());

        for placed in layout_arcs(&self.selected_events()) {
            let emphasis = match &focus_key {
                None => Emphasis::Normal,
                Some(key) if *key == placed.event.route_key() => Emphasis::Focused,
                Some(_) => Emphasis::Muted,
            };
            surface.place_arc(
                &placed.geometry.path,
                ArcStyle {
                    class: placed.event.route_class(),
                    width: stroke_width(placed.event.display_score()),
                    emphasis,
                },
            );
        }

        for (draw, ttl) in self.transients.active(now_ms) {
            let geometry = arc_geometry(&draw.event.source, &draw.event.target, draw.lane);
            let class = draw.event.route_class();
            surface.place_arc(
                &geometry.path,
                ArcStyle {
                    class,
                    width: stroke_width(draw.event.display_score()),
                    emphasis: Emphasis::Focused,
                },
            );
            surface.place_transient_marker(
                project(draw.event.target.geo()),
                TransientStyle {
                    kind: draw.kind,
                    class,
                },
                ttl,
            );
        }

        let touches_focus = |address: &str| focused.is_some_and(|e| e.touches(address));
        for cluster in self.clusters() {
            if !cluster.is_group() {
                if let Some(entity) = cluster.members.first() {
                    surface.place_marker(
                        marker_point(entity.geo()),
                        entity_marker_size(entity.strength()),
                        MarkerStyle {
                            kind: MarkerKind::Entity,
                            label: entity.display_label().to_string(),
                            hot: entity.is_hot(),
                            focused: touches_focus(&entity.address),
                        },
                        MarkerAction::FocusEntity(entity.address.clone()),
                    );
                }
                continue;
            }

            if self.expansion.is_expanded(&cluster.id) {
                for (entity, point) in cluster.fan_out() {
                    surface.place_marker(
                        point,
                        entity_marker_size(entity.strength()),
                        MarkerStyle {
                            kind: MarkerKind::Member,
                            label: entity.display_label().to_string(),
                            hot: entity.is_hot(),
                            focused: touches_focus(&entity.address),
                        },
                        MarkerAction::FocusEntity(entity.address.clone()),
                    );
                }
                surface.place_marker(
                    cluster.centroid,
                    COLLAPSE_CORE_SIZE,
                    MarkerStyle {
                        kind: MarkerKind::CollapseCore,
                        label: String::from("collapse"),
                        hot: false,
                        focused: false,
                    },
                    MarkerAction::CollapseCluster,
                );
            } else {
                let lead = cluster.members.first().map(|e| e.display_label()).unwrap_or_default();
                surface.place_marker(
                    cluster.centroid,
                    cluster.marker_size(),
                    MarkerStyle {
                        kind: MarkerKind::Cluster {
                            count: cluster.len(),
                        },
                        label: format!("{lead} +{}", cluster.len() - 1),
                        hot: cluster.members.iter().any(|e| e.is_hot()),
                        focused: cluster.members.iter().any(|e| touches_focus(&e.address)),
                    },
                    MarkerAction::ToggleCluster(cluster.id.clone()),
                );
            }
        }
    }

    /// Plane coordinate under a viewport pixel
    pub fn plane_at(&self, screen: DVec2) -> DVec2 {
        self.viewport.to_plane(screen)
    }

    /// Longitude and latitude under a viewport pixel, `None` off the map
    pub fn cursor_geo(&self, screen: DVec2) -> Option<GeoPoint> {
        let plane = self.plane_at(screen);
        let on_map = (0.0..=PLANE_EXTENT).contains(&plane.x) && (0.0..=PLANE_EXTENT).contains(&plane.y);
        on_map.then(|| unproject(plane))
    }
}

fn next_solo(current: &[String], available: &[String]) -> Vec<String> {
    let available = normalize_tokens(available.to_vec());
    let index = match current {
        [] => 0,
        [only] => available
            .iter()
            .position(|a| a == only)
            .map_or(available.len(), |i| i + 1),
        _ => available.len(),
    };
    available.get(index).cloned().into_iter().collect()
}

fn toggle_token(values: &mut Vec<String>, token: &str) {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
        return;
    }
    if let Some(pos) = values.iter().position(|v| *v == token) {
        values.remove(pos);
    } else {
        values.push(token);
    }
    *values = normalize_tokens(std::mem::take(values));
}
