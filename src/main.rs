use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use glam::DVec2;
use ratatui::DefaultTerminal;
use tracing_subscriber::EnvFilter;

use wake_map::app::Dashboard;
use wake_map::client::{BackendAction, HttpApi, RefreshWorker};
use wake_map::config::Config;
use wake_map::data;
use wake_map::map::{Backdrop, HitTarget, PointerId, PointerIntent};
use wake_map::model::RouteClass;
use wake_map::render::MarkerAction;
use wake_map::timeline::{Clock, SystemClock};
use wake_map::ui::{self, FrameLayout, Prompt, TuiSurface, UiState};
use wake_map::view::FilePresetStore;

/// Two clicks on the same cell within this window are a double-click
const DOUBLE_CLICK_MS: u64 = 350;
/// Wheel notch in the browser's deltaY units
const WHEEL_NOTCH: f64 = 120.0;
/// Keyboard pan step in viewport pixels
const NUDGE: f64 = 12.0;
const MOUSE: PointerId = PointerId(0);

fn main() -> Result<()> {
    let config = Config::parse();
    init_logging(&config)?;

    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture, EnableFocusChange)?;

    let result = run(&mut terminal, &config);

    let _ = execute!(std::io::stdout(), DisableMouseCapture, DisableFocusChange);
    ratatui::restore();

    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "exiting on error");
    }
    result
}

fn init_logging(config: &Config) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("opening log file {}", config.log_file.display()))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wake_map=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A left press waiting for its release
struct Press {
    target: HitTarget,
    action: Option<MarkerAction>,
}

struct Session {
    dashboard: Dashboard,
    worker: RefreshWorker,
    backdrop: Backdrop,
    clock: SystemClock,
    layout: FrameLayout,
    surface: Option<TuiSurface>,
    ui: UiState,
    press: Option<Press>,
    last_click: Option<(u64, u16, u16)>,
}

impl Session {
    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Exchange requests and responses with the refresh worker
    fn pump(&mut self) {
        let now = self.now();
        for response in self.worker.drain() {
            self.dashboard.apply_response(response, now);
        }
        self.dashboard.tick(now);
        for request in self.dashboard.take_requests() {
            if !self.worker.submit(request) {
                tracing::warn!("refresh worker is gone");
                self.dashboard.set_status("refresh worker stopped");
            }
        }
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.layout = FrameLayout::split(ratatui::layout::Rect::new(0, 0, width, height));
        let (w, h) = self.layout.viewport_size();
        self.dashboard.resize(w, h);
        self.surface = None;
    }

    fn marker_at(&self, col: u16, row: u16) -> Option<MarkerAction> {
        let inner = self.layout.inner;
        let surface = self.surface.as_ref()?;
        if col < inner.x || row < inner.y {
            return None;
        }
        surface.hit_test(col - inner.x, row - inner.y).cloned()
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let now = self.now();
        let (col, row) = (mouse.column, mouse.row);
        let pos = self.layout.cell_to_viewport(col, row);
        self.ui.hover = pos;

        match mouse.kind {
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                let Some(pos) = pos else { return };
                let delta_y = if mouse.kind == MouseEventKind::ScrollUp {
                    -WHEEL_NOTCH
                } else {
                    WHEEL_NOTCH
                };
                self.dashboard
                    .handle_pointer(PointerIntent::Wheel { delta_y, pos }, now);
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(surface) = self.surface.as_ref() else { return };
                let Some(target) = ui::hit_target(&self.layout, surface, col, row) else {
                    return;
                };
                self.press = Some(Press {
                    target,
                    action: self.marker_at(col, row),
                });
                self.dashboard.handle_pointer(
                    PointerIntent::Down {
                        pointer: MOUSE,
                        pos: pos.unwrap_or(DVec2::ZERO),
                        target,
                    },
                    now,
                );
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(pos) = pos {
                    self.dashboard
                        .handle_pointer(PointerIntent::Move { pointer: MOUSE, pos }, now);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.dashboard
                    .handle_pointer(PointerIntent::Up { pointer: Some(MOUSE) }, now);
                if let Some(press) = self.press.take() {
                    self.click(press, col, row, now);
                }
            }
            _ => {}
        }
    }

    fn click(&mut self, press: Press, col: u16, row: u16, now: u64) {
        match press.target {
            HitTarget::Marker => {
                if let Some(action) = press.action {
                    self.dashboard.activate(&action, now);
                }
            }
            HitTarget::ScaleReadout => self.dashboard.viewport.reset(),
            HitTarget::Background => {
                let double = self.last_click.is_some_and(|(at, c, r)| {
                    c == col && r == row && now.saturating_sub(at) <= DOUBLE_CLICK_MS
                });
                let intent = if double {
                    self.last_click = None;
                    PointerIntent::DoubleClick { target: press.target }
                } else {
                    self.last_click = Some((now, col, row));
                    PointerIntent::Click { target: press.target }
                };
                self.dashboard.handle_pointer(intent, now);
            }
        }
    }

    /// Keys while typing a saved-view name
    fn handle_prompt_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.ui.prompt = Prompt::default(),
            KeyCode::Enter => {
                let name = std::mem::take(&mut self.ui.prompt.text);
                self.ui.prompt.active = false;
                if self.dashboard.save_view(&name, unix_seconds()) {
                    self.dashboard.set_status(format!("saved view {:?}", name.trim()));
                } else {
                    self.dashboard.set_status("view name cannot be empty");
                }
            }
            KeyCode::Backspace => {
                self.ui.prompt.text.pop();
            }
            KeyCode::Char(c) => self.ui.prompt.text.push(c),
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.ui.prompt.active {
            self.handle_prompt_key(key);
            return;
        }
        if self.ui.show_help {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                self.ui.show_help = false;
            }
            return;
        }
        let now = self.now();
        let d = &mut self.dashboard;
        match key.code {
            KeyCode::Char('q') => d.should_quit = true,
            KeyCode::Char('?') => self.ui.show_help = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                d.should_quit = true
            }

            // Route visibility
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                d.toggle_route_class(RouteClass::ALL[index]);
            }

            // Backend filters
            KeyCode::Char('t') => d.cycle_type(),
            KeyCode::Char('c') => d.cycle_chain(),
            KeyCode::Char('m') => d.step_min_usd(true),
            KeyCode::Char('M') => d.step_min_usd(false),
            KeyCode::Char('w') => d.step_window(true),
            KeyCode::Char('W') => d.step_window(false),
            KeyCode::Char('o') => d.step_replay_offset(true),
            KeyCode::Char('O') => d.step_replay_offset(false),
            KeyCode::Char('p') => d.toggle_pause(),

            // Saved views
            KeyCode::Char('s') => self.ui.prompt.active = true,
            KeyCode::Char('v') => {
                if !d.cycle_view() {
                    d.set_status("no saved views");
                }
            }
            KeyCode::Char('d') => {
                if let Some(name) = d.selected_view().map(str::to_string) {
                    d.delete_view(&name);
                    d.set_status(format!("deleted view {name:?}"));
                }
            }
            KeyCode::Char('y') => {
                let link = d.share_link();
                if ui::copy_to_clipboard(&link) {
                    d.set_status("link copied");
                } else {
                    d.set_status("copy failed");
                }
            }

            // Backend actions
            KeyCode::Char('n') => d.trigger(BackendAction::PollNow),
            KeyCode::Char('g') => d.trigger(BackendAction::RefreshGeo),
            KeyCode::Char('b') => d.trigger(BackendAction::RefreshBalances),

            // Focus
            KeyCode::Tab => d.cycle_focus(true, now),
            KeyCode::BackTab => d.cycle_focus(false, now),
            KeyCode::Esc => d.clear_focus(),

            // Viewport
            KeyCode::Char('+') | KeyCode::Char('=') => d.viewport.zoom_in(),
            KeyCode::Char('-') | KeyCode::Char('_') => d.viewport.zoom_out(),
            KeyCode::Left | KeyCode::Char('h') => d.viewport.nudge(DVec2::new(NUDGE, 0.0)),
            KeyCode::Right | KeyCode::Char('l') => d.viewport.nudge(DVec2::new(-NUDGE, 0.0)),
            KeyCode::Up | KeyCode::Char('k') => d.viewport.nudge(DVec2::new(0.0, NUDGE)),
            KeyCode::Down | KeyCode::Char('j') => d.viewport.nudge(DVec2::new(0.0, -NUDGE)),
            KeyCode::Char('r') | KeyCode::Char('0') => d.viewport.reset(),
            _ => {}
        }
    }
}

fn run(terminal: &mut DefaultTerminal, config: &Config) -> Result<()> {
    let base = config.api_url()?;
    let api = HttpApi::new(base.clone())?;
    let worker = RefreshWorker::spawn(api)?;

    let mut backdrop = Backdrop::new();
    if data::load_coastlines(&mut backdrop, &config.data_dir) == 0 {
        tracing::info!(dir = %config.data_dir.display(), "no coastline data, using built-in outline");
        data::fallback_outline(&mut backdrop);
    }

    let store = FilePresetStore::in_dir(&config.views_dir);
    tracing::info!(path = %store.path().display(), "saved views");
    let dashboard = Dashboard::new(0.0, 0.0, base, Box::new(store))
        .with_poll_interval(config.poll_interval_ms());

    let mut session = Session {
        dashboard,
        worker,
        backdrop,
        clock: SystemClock::new(),
        layout: FrameLayout::default(),
        surface: None,
        ui: UiState::default(),
        press: None,
        last_click: None,
    };
    let size = terminal.size()?;
    session.resize(size.width, size.height);

    if let Some(link) = config.open_url()? {
        let now = session.now();
        session.dashboard.restore_link(&link, now);
    }

    loop {
        session.pump();

        let now = session.now();
        let mut drawn = None;
        terminal.draw(|frame| {
            drawn = Some(ui::render(
                frame,
                &session.dashboard,
                &session.backdrop,
                &session.ui,
                now,
            ));
        })?;
        session.surface = drawn;

        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => session.handle_key(key),
                Event::Mouse(mouse) => session.handle_mouse(mouse),
                Event::Resize(width, height) => session.resize(width, height),
                Event::FocusLost => {
                    let now = session.now();
                    session
                        .dashboard
                        .handle_pointer(PointerIntent::Up { pointer: None }, now);
                    session.press = None;
                    session.ui.hover = None;
                }
                _ => {}
            }
        }

        if session.dashboard.should_quit {
            break;
        }
    }

    Ok(())
}
