use std::io::Write;

use base64::Engine;
use glam::DVec2;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
    Frame,
};

use crate::app::Dashboard;
use crate::braille::BrailleCanvas;
use crate::flows::ArcPath;
use crate::map::geometry::{draw_disc, draw_polyline, draw_ring, draw_thick_polyline};
use crate::map::viewport::{HitTarget, ViewportController};
use crate::map::{Backdrop, GeoPoint};
use crate::model::RouteClass;
use crate::render::{
    ArcStyle, Emphasis, MarkerAction, MarkerKind, MarkerStyle, RenderSurface, TransientStyle,
};
use crate::replay::DrawKind;

/// Samples per arc; enough for smooth curves at full zoom
const ARC_STEPS: usize = 48;
/// Marker size units per cell of hit-box half-width
const MARKER_UNITS_PER_CELL: f64 = 24.0;
const MAX_LABEL: usize = 18;

/// Key reference shown by the help overlay
const HELP_KEYS: [(&str, &str); 14] = [
    ("1-4", "toggle exact/inferred/ambiguous/pseudo routes"),
    ("t c", "cycle event type / chain filter"),
    ("m M", "raise / lower minimum USD"),
    ("w W", "widen / narrow time window"),
    ("o O p", "replay offset back / forward, pause"),
    ("s", "save current view"),
    ("v d", "next saved view, delete selected"),
    ("y", "copy share link"),
    ("n g b", "poll now, refresh geo, refresh balances"),
    ("Tab S-Tab", "focus next / previous flow"),
    ("Esc", "clear focus"),
    ("+ - 0", "zoom in, zoom out, reset"),
    ("hjkl", "pan"),
    ("? q", "this help, quit"),
];

/// Screen regions of one frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameLayout {
    pub map: Rect,
    /// Map interior, the braille drawing area
    pub inner: Rect,
    pub location: Rect,
    pub status: Rect,
    pub readout: Rect,
}

impl FrameLayout {
    pub fn split(area: Rect) -> Self {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);
        let map = chunks[0];
        let inner = Block::default().borders(Borders::ALL).inner(map);
        let status = chunks[2];
        let readout = Rect {
            x: status.x,
            y: status.y,
            width: status.width.min(9),
            height: status.height,
        };
        Self {
            map,
            inner,
            location: chunks[1],
            status,
            readout,
        }
    }

    /// Viewport pixel size for the map interior (braille dots)
    pub fn viewport_size(&self) -> (f64, f64) {
        (self.inner.width as f64 * 2.0, self.inner.height as f64 * 4.0)
    }

    /// Viewport pixel at the centre of a terminal cell
    pub fn cell_to_viewport(&self, col: u16, row: u16) -> Option<DVec2> {
        if !contains(self.inner, col, row) {
            return None;
        }
        Some(DVec2::new(
            ((col - self.inner.x) as f64) * 2.0 + 1.0,
            ((row - self.inner.y) as f64) * 4.0 + 2.0,
        ))
    }
}

fn contains(rect: Rect, col: u16, row: u16) -> bool {
    col >= rect.x && col < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

#[derive(Clone, Debug)]
struct Glyph {
    col: i32,
    row: i32,
    ch: char,
    label: Option<String>,
    style: Style,
}

#[derive(Clone, Debug)]
struct HitBox {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    action: MarkerAction,
}

/// Terminal rendition of the drawing contract.
///
/// Arcs and pulses go onto colour-keyed braille layers, markers become glyph
/// cells with labels, and every marker leaves a hit box so pointer input can
/// be resolved back to its [`MarkerAction`].
pub struct TuiSurface {
    viewport: ViewportController,
    cols: usize,
    rows: usize,
    layers: Vec<(Color, BrailleCanvas)>,
    glyphs: Vec<Glyph>,
    hits: Vec<HitBox>,
}

impl TuiSurface {
    pub fn new(viewport: &ViewportController, cols: u16, rows: u16) -> Self {
        Self {
            viewport: viewport.clone(),
            cols: cols as usize,
            rows: rows as usize,
            layers: Vec::new(),
            glyphs: Vec::new(),
            hits: Vec::new(),
        }
    }

    fn layer(&mut self, color: Color) -> &mut BrailleCanvas {
        let index = match self.layers.iter().position(|(c, _)| *c == color) {
            Some(i) => i,
            None => {
                self.layers
                    .push((color, BrailleCanvas::new(self.cols, self.rows)));
                self.layers.len() - 1
            }
        };
        &mut self.layers[index].1
    }

    /// Draw the backdrop beneath everything placed so far
    pub fn draw_backdrop(&mut self, backdrop: &Backdrop) {
        let mut canvas = BrailleCanvas::new(self.cols, self.rows);
        backdrop.render(&mut canvas, &self.viewport);
        self.layers.insert(0, (Color::DarkGray, canvas));
    }

    fn screen(&self, plane: DVec2) -> DVec2 {
        self.viewport.to_screen(plane)
    }

    fn cell_of(screen: DVec2) -> (i32, i32) {
        ((screen.x / 2.0).floor() as i32, (screen.y / 4.0).floor() as i32)
    }

    /// Topmost marker under a map-interior cell
    pub fn hit_test(&self, col: u16, row: u16) -> Option<&MarkerAction> {
        let (col, row) = (col as i32, row as i32);
        self.hits
            .iter()
            .rev()
            .find(|h| col >= h.left && col <= h.right && row >= h.top && row <= h.bottom)
            .map(|h| &h.action)
    }
}

fn class_color(class: RouteClass) -> Color {
    match class {
        RouteClass::Exact => Color::Cyan,
        RouteClass::Anchored => Color::LightBlue,
        RouteClass::Pseudo => Color::Magenta,
        RouteClass::Unknown => Color::Gray,
    }
}

impl RenderSurface for TuiSurface {
    fn place_marker(&mut self, point: DVec2, size: f64, style: MarkerStyle, on_activate: MarkerAction) {
        let (col, row) = Self::cell_of(self.screen(point));
        let reach = ((size / MARKER_UNITS_PER_CELL).floor() as i32 - 1).max(0);

        let (ch, color) = match style.kind {
            MarkerKind::Entity | MarkerKind::Member if style.hot => ('◆', Color::LightRed),
            MarkerKind::Entity => ('●', Color::White),
            MarkerKind::Member => ('○', Color::White),
            MarkerKind::Cluster { count } if count < 10 => {
                (char::from_digit(count as u32, 10).unwrap_or('#'), Color::Yellow)
            }
            MarkerKind::Cluster { .. } => ('#', Color::Yellow),
            MarkerKind::CollapseCore => ('×', Color::DarkGray),
        };
        let mut glyph_style = Style::default().fg(color);
        if style.focused {
            glyph_style = glyph_style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
        }

        let label = (!style.label.is_empty() && style.kind != MarkerKind::CollapseCore)
            .then(|| style.label.chars().take(MAX_LABEL).collect::<String>());
        let label_len = label.as_ref().map_or(0, |l| l.chars().count() as i32 + 1);

        self.glyphs.push(Glyph {
            col,
            row,
            ch,
            label,
            style: glyph_style,
        });
        self.hits.push(HitBox {
            left: col - reach,
            top: row - reach.min(1),
            right: col + reach.max(label_len),
            bottom: row + reach.min(1),
            action: on_activate,
        });
    }

    fn place_arc(&mut self, path: &ArcPath, style: ArcStyle) {
        let color = match style.emphasis {
            Emphasis::Muted => Color::DarkGray,
            Emphasis::Focused => Color::LightYellow,
            Emphasis::Normal => class_color(style.class),
        };
        let points: Vec<DVec2> = path
            .sample(ARC_STEPS)
            .into_iter()
            .map(|p| self.viewport.to_screen(p))
            .collect();
        let canvas = self.layer(color);
        if style.width >= 1.0 {
            draw_thick_polyline(canvas, &points, f64::INFINITY);
        } else {
            draw_polyline(canvas, &points, f64::INFINITY);
        }
    }

    fn place_transient_marker(&mut self, point: DVec2, style: TransientStyle, ttl_ms: u64) {
        let center = self.screen(point);
        let life = ttl_ms as f64 / style.kind.ttl_ms().max(1) as f64;
        let color = match style.kind {
            DrawKind::Replay => Color::LightYellow,
            DrawKind::Fresh => class_color(style.class),
        };
        let canvas = self.layer(color);
        // Pulse grows as it fades
        draw_ring(canvas, center, 2.0 + (1.0 - life) * 6.0);
        if life > 0.5 {
            draw_disc(canvas, center, 1.0);
        }
    }
}

impl Widget for &TuiSurface {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for (color, canvas) in &self.layers {
            for (col, row, ch) in canvas.lit() {
                if col >= area.width as usize || row >= area.height as usize {
                    continue;
                }
                let (x, y) = (area.x + col as u16, area.y + row as u16);
                buf[(x, y)].set_char(ch).set_fg(*color);
            }
        }

        let in_area = |col: i32, row: i32| {
            col >= 0 && row >= 0 && col < area.width as i32 && row < area.height as i32
        };
        for glyph in &self.glyphs {
            if !in_area(glyph.col, glyph.row) {
                continue;
            }
            let (x, y) = (area.x + glyph.col as u16, area.y + glyph.row as u16);
            buf[(x, y)].set_char(glyph.ch).set_style(glyph.style);

            let Some(label) = &glyph.label else { continue };
            for (i, ch) in label.chars().enumerate() {
                let col = glyph.col + 2 + i as i32;
                if !in_area(col, glyph.row) {
                    break;
                }
                buf[(area.x + col as u16, y)]
                    .set_char(ch)
                    .set_fg(Color::Gray);
            }
        }
    }
}

/// Text typed for a saved-view name, shown in the location row
#[derive(Clone, Debug, Default)]
pub struct Prompt {
    pub active: bool,
    pub text: String,
}

/// Terminal-only state layered over the dashboard
#[derive(Clone, Debug, Default)]
pub struct UiState {
    pub prompt: Prompt,
    /// Last pointer position over the map, in viewport pixels
    pub hover: Option<DVec2>,
    pub show_help: bool,
}

/// Draw one frame. The returned surface resolves pointer hits for that frame.
pub fn render(
    frame: &mut Frame,
    dashboard: &Dashboard,
    backdrop: &Backdrop,
    ui: &UiState,
    now_ms: u64,
) -> TuiSurface {
    let layout = FrameLayout::split(frame.area());

    let title = match dashboard.focused_event() {
        Some(event) => format!(
            " wake-map · {} → {} · {} ",
            short(&event.source.address),
            short(&event.target.address),
            event.event_type
        ),
        None => String::from(" wake-map "),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    frame.render_widget(block, layout.map);

    let mut surface = TuiSurface::new(&dashboard.viewport, layout.inner.width, layout.inner.height);
    surface.draw_backdrop(backdrop);
    dashboard.draw(&mut surface, now_ms);
    frame.render_widget(&surface, layout.inner);

    frame.render_widget(location_line(dashboard, &ui.prompt), layout.location);
    let cursor = ui.hover.and_then(|pos| dashboard.cursor_geo(pos));
    frame.render_widget(status_line(dashboard, cursor), layout.status);
    if ui.show_help {
        let area = help_area(layout.inner);
        frame.render_widget(Clear, area);
        frame.render_widget(help_panel(), area);
    }
    surface
}

/// Centered box sized to the key list, clipped to `within`
fn help_area(within: Rect) -> Rect {
    let width = 58.min(within.width);
    let height = (HELP_KEYS.len() as u16 + 2).min(within.height);
    Rect::new(
        within.x + (within.width - width) / 2,
        within.y + (within.height - height) / 2,
        width,
        height,
    )
}

fn help_panel() -> Paragraph<'static> {
    let lines: Vec<Line> = HELP_KEYS
        .iter()
        .map(|(keys, what)| {
            Line::from(vec![
                Span::styled(format!(" {keys:<10}"), Style::default().fg(Color::Yellow)),
                Span::raw(*what),
            ])
        })
        .collect();
    Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" keys · ? or Esc to close "),
    )
}

/// Which part of the frame a cell belongs to, for pointer routing
pub fn hit_target(layout: &FrameLayout, surface: &TuiSurface, col: u16, row: u16) -> Option<HitTarget> {
    if contains(layout.readout, col, row) {
        return Some(HitTarget::ScaleReadout);
    }
    if !contains(layout.inner, col, row) {
        return None;
    }
    let target = match surface.hit_test(col - layout.inner.x, row - layout.inner.y) {
        Some(_) => HitTarget::Marker,
        None => HitTarget::Background,
    };
    Some(target)
}

fn location_line(dashboard: &Dashboard, prompt: &Prompt) -> Paragraph<'static> {
    let line = if prompt.active {
        Line::from(vec![
            Span::styled(" save view as: ", Style::default().fg(Color::Yellow)),
            Span::raw(prompt.text.clone()),
            Span::styled("▏", Style::default().fg(Color::Yellow)),
        ])
    } else {
        Line::from(vec![
            Span::styled(" ⌂ ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                dashboard.location().to_string(),
                Style::default().fg(Color::Blue),
            ),
        ])
    };
    Paragraph::new(line)
}

fn status_line(dashboard: &Dashboard, cursor: Option<GeoPoint>) -> Paragraph<'static> {
    let dim = Style::default().fg(Color::DarkGray);
    let filters = dashboard.filters();
    let routes = dashboard.routes();

    let mut spans = vec![
        Span::styled(
            format!(" ×{:.2} ", dashboard.viewport.scale()),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled("│ ", dim),
    ];
    for (i, class) in RouteClass::ALL.into_iter().enumerate() {
        let on = routes.enabled(class);
        spans.push(Span::styled(
            format!("{}:{} ", i + 1, class.label()),
            if on {
                Style::default().fg(class_color(class))
            } else {
                dim
            },
        ));
    }
    spans.push(Span::styled("│ ", dim));
    spans.push(Span::raw(format!(
        "≥${} {}m ",
        compact_usd(filters.min_usd),
        filters.window_seconds / 60
    )));
    if !filters.types.is_empty() {
        spans.push(Span::styled(format!("[{}] ", filters.types.join(",")), Style::default().fg(Color::Green)));
    }
    if !filters.chains.is_empty() {
        spans.push(Span::styled(format!("<{}> ", filters.chains.join(",")), Style::default().fg(Color::Green)));
    }
    if dashboard.paused() {
        spans.push(Span::styled(
            format!("⏸ -{}s ", filters.replay_offset_seconds),
            Style::default().fg(Color::LightRed),
        ));
    }
    if let Some(view) = dashboard.selected_view() {
        spans.push(Span::styled(format!("★{view} "), Style::default().fg(Color::Magenta)));
    }
    if let Some(point) = cursor {
        spans.push(Span::styled("│ ", dim));
        spans.push(Span::styled(format!("{} ", format_geo(point)), Style::default().fg(Color::White)));
    }
    spans.push(Span::styled("│ ", dim));
    spans.push(Span::styled(dashboard.status().to_string(), Style::default().fg(Color::Gray)));
    spans.push(Span::styled(" │ ?:keys q:quit", dim));

    Paragraph::new(Line::from(spans))
}

fn short(address: &str) -> String {
    if address.chars().count() <= 12 {
        return address.to_string();
    }
    let head: String = address.chars().take(6).collect();
    let tail: String = address
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{head}…{tail}")
}

fn format_geo(point: GeoPoint) -> String {
    let ns = if point.lat < 0.0 { 'S' } else { 'N' };
    let ew = if point.lon < 0.0 { 'W' } else { 'E' };
    format!("{:.1}°{ns} {:.1}°{ew}", point.lat.abs(), point.lon.abs())
}

fn compact_usd(usd: f64) -> String {
    if usd >= 1_000_000.0 {
        format!("{:.1}M", usd / 1_000_000.0)
    } else if usd >= 1_000.0 {
        format!("{:.0}k", usd / 1_000.0)
    } else {
        format!("{usd:.0}")
    }
}

/// Put text on the system clipboard with the OSC 52 terminal escape
pub fn copy_to_clipboard(text: &str) -> bool {
    let payload = base64::engine::general_purpose::STANDARD.encode(text);
    let mut out = std::io::stdout();
    match write!(out, "\x1b]52;c;{payload}\x07").and_then(|_| out.flush()) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "clipboard write failed");
            false
        }
    }
}
