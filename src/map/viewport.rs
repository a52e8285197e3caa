use glam::DVec2;

use crate::map::projection::PLANE_EXTENT;

pub const MIN_SCALE: f64 = 1.0;
pub const MAX_SCALE: f64 = 4.5;
/// A click this soon after a drag movement is drag residue
pub const DRAG_CLICK_GUARD_MS: u64 = 220;
/// Wheel delta to exponential zoom factor
pub const WHEEL_ZOOM_STEP: f64 = 0.0018;
/// Pointer travel (pixels) before a drag counts as movement
const DRAG_SLOP: f64 = 3.0;
/// Scales at or below this are treated as unzoomed
const UNZOOMED_EPSILON: f64 = 1.0001;
/// Keyboard zoom factor
const KEY_ZOOM_FACTOR: f64 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PointerId(pub u32);

/// What the pointer is over when an intent starts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitTarget {
    Background,
    Marker,
    ScaleReadout,
}

/// Raw pointer input, already translated to viewport pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerIntent {
    Down {
        pointer: PointerId,
        pos: DVec2,
        target: HitTarget,
    },
    Move {
        pointer: PointerId,
        pos: DVec2,
    },
    /// Pointer up, cancel or lost capture. `None` ends any drag.
    Up { pointer: Option<PointerId> },
    Wheel { delta_y: f64, pos: DVec2 },
    Click { target: HitTarget },
    DoubleClick { target: HitTarget },
}

/// What the controller did with an intent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewportResponse {
    Ignored,
    /// Scale or pan changed (or a drag was armed/ended)
    Changed,
    /// An intentional click on the empty map
    BackgroundClick,
    /// A click swallowed because a drag just happened
    DragResidue,
}

/// Pointer position and pan captured when a drag is armed
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragStart {
    pub pointer_pos: DVec2,
    pub pan: DVec2,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
    pub scale: f64,
    pub pan: DVec2,
    pub dragging: bool,
    pub pointer: Option<PointerId>,
    pub drag_start: Option<DragStart>,
    pub last_drag_at_ms: Option<u64>,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scale: MIN_SCALE,
            pan: DVec2::ZERO,
            dragging: false,
            pointer: None,
            drag_start: None,
            last_drag_at_ms: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanBounds {
    pub min: DVec2,
    pub max: DVec2,
}

/// Zoom/pan presentation transform over the map plane.
///
/// The plane (`0..100` on both axes) is stretched over `width × height`
/// viewport pixels at scale 1; zooming scales that content and the pan offset
/// translates it, so `screen = pan + plane_px * scale`.
#[derive(Clone, Debug)]
pub struct ViewportController {
    state: ViewportState,
    width: f64,
    height: f64,
}

impl ViewportController {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            state: ViewportState::default(),
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn scale(&self) -> f64 {
        self.state.scale
    }

    pub fn pan(&self) -> DVec2 {
        self.state.pan
    }

    pub fn size(&self) -> DVec2 {
        DVec2::new(self.width, self.height)
    }

    pub fn is_zoomed(&self) -> bool {
        self.state.scale > UNZOOMED_EPSILON
    }

    /// Update viewport size and re-clamp the pan for the new extent
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
        self.state.pan = self.clamp_pan(self.state.pan, self.state.scale);
    }

    /// Pan range that keeps scaled content covering the viewport
    pub fn pan_bounds(&self, scale: f64) -> PanBounds {
        if self.width <= 0.0 || self.height <= 0.0 || scale <= UNZOOMED_EPSILON {
            return PanBounds {
                min: DVec2::ZERO,
                max: DVec2::ZERO,
            };
        }
        PanBounds {
            min: DVec2::new(self.width - self.width * scale, self.height - self.height * scale),
            max: DVec2::ZERO,
        }
    }

    pub fn clamp_pan(&self, pan: DVec2, scale: f64) -> DVec2 {
        let bounds = self.pan_bounds(scale);
        pan.clamp(bounds.min, bounds.max)
    }

    /// Zoom so the plane point under `anchor` stays under `anchor`
    pub fn zoom_at(&mut self, target_scale: f64, anchor: DVec2) {
        if self.width <= 0.0 || self.height <= 0.0 {
            return;
        }
        let scale = clamp_scale(target_scale);
        let anchor = anchor.clamp(DVec2::ZERO, self.size());
        let world = (anchor - self.state.pan) / self.state.scale;
        let pan = self.clamp_pan(anchor - world * scale, scale);
        self.state.scale = scale;
        self.state.pan = pan;
    }

    pub fn zoom_in(&mut self) {
        self.zoom_at(self.state.scale * KEY_ZOOM_FACTOR, self.size() * 0.5);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_at(self.state.scale / KEY_ZOOM_FACTOR, self.size() * 0.5);
    }

    /// Shift the view by a pixel delta (keyboard panning)
    pub fn nudge(&mut self, delta: DVec2) {
        self.state.pan = self.clamp_pan(self.state.pan + delta, self.state.scale);
    }

    pub fn reset(&mut self) {
        self.state.scale = MIN_SCALE;
        self.state.pan = DVec2::ZERO;
    }

    /// Feed one pointer intent through the drag/zoom state machine
    pub fn handle(&mut self, intent: PointerIntent, now_ms: u64) -> ViewportResponse {
        match intent {
            PointerIntent::Down {
                pointer,
                pos,
                target,
            } => {
                if target != HitTarget::Background || !self.is_zoomed() {
                    return ViewportResponse::Ignored;
                }
                self.state.dragging = true;
                self.state.pointer = Some(pointer);
                self.state.drag_start = Some(DragStart {
                    pointer_pos: pos,
                    pan: self.state.pan,
                });
                ViewportResponse::Changed
            }
            PointerIntent::Move { pointer, pos } => {
                if !self.state.dragging || self.state.pointer != Some(pointer) {
                    return ViewportResponse::Ignored;
                }
                let Some(start) = self.state.drag_start else {
                    return ViewportResponse::Ignored;
                };
                let delta = pos - start.pointer_pos;
                self.state.pan = self.clamp_pan(start.pan + delta, self.state.scale);
                if delta.x.abs() > DRAG_SLOP || delta.y.abs() > DRAG_SLOP {
                    self.state.last_drag_at_ms = Some(now_ms);
                }
                ViewportResponse::Changed
            }
            PointerIntent::Up { pointer } => {
                if !self.state.dragging {
                    return ViewportResponse::Ignored;
                }
                if let (Some(ended), Some(active)) = (pointer, self.state.pointer) {
                    if ended != active {
                        return ViewportResponse::Ignored;
                    }
                }
                self.state.dragging = false;
                self.state.pointer = None;
                self.state.drag_start = None;
                ViewportResponse::Changed
            }
            PointerIntent::Wheel { delta_y, pos } => {
                let factor = (-delta_y * WHEEL_ZOOM_STEP).exp();
                self.zoom_at(self.state.scale * factor, pos);
                ViewportResponse::Changed
            }
            PointerIntent::Click { target } => {
                if target != HitTarget::Background {
                    return ViewportResponse::Ignored;
                }
                if self.is_drag_residue(now_ms) {
                    return ViewportResponse::DragResidue;
                }
                ViewportResponse::BackgroundClick
            }
            PointerIntent::DoubleClick { target } => {
                if target != HitTarget::Background {
                    return ViewportResponse::Ignored;
                }
                self.reset();
                ViewportResponse::Changed
            }
        }
    }

    fn is_drag_residue(&self, now_ms: u64) -> bool {
        self.state
            .last_drag_at_ms
            .is_some_and(|at| now_ms.saturating_sub(at) < DRAG_CLICK_GUARD_MS)
    }

    /// Map a plane point (0..100) to viewport pixels
    pub fn to_screen(&self, plane: DVec2) -> DVec2 {
        self.state.pan + plane / PLANE_EXTENT * self.size() * self.state.scale
    }

    /// Map viewport pixels back to a plane point
    pub fn to_plane(&self, screen: DVec2) -> DVec2 {
        let size = self.size().max(DVec2::ONE);
        (screen - self.state.pan) / self.state.scale / size * PLANE_EXTENT
    }
}

#[inline]
fn clamp_scale(scale: f64) -> f64 {
    if scale.is_finite() {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    } else {
        MIN_SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: PointerId = PointerId(1);

    fn assert_invariants(vp: &ViewportController) {
        let s = vp.state();
        assert!((MIN_SCALE..=MAX_SCALE).contains(&s.scale));
        if s.scale == MIN_SCALE {
            assert_eq!(s.pan, DVec2::ZERO);
        }
        let b = vp.pan_bounds(s.scale);
        assert!(s.pan.x >= b.min.x - 1e-9 && s.pan.x <= b.max.x + 1e-9);
        assert!(s.pan.y >= b.min.y - 1e-9 && s.pan.y <= b.max.y + 1e-9);
    }

    #[test]
    fn test_zoom_keeps_anchor_world_point() {
        let mut vp = ViewportController::new(200.0, 100.0);
        vp.zoom_at(2.0, DVec2::new(50.0, 40.0));
        let anchor = DVec2::new(120.0, 30.0);
        let before = (anchor - vp.pan()) / vp.scale();
        vp.zoom_at(3.1, anchor);
        let after = (anchor - vp.pan()) / vp.scale();
        assert!((before - after).length() < 1e-9);
        assert_invariants(&vp);
    }

    #[test]
    fn test_zoom_scale_is_clamped() {
        let mut vp = ViewportController::new(200.0, 100.0);
        vp.zoom_at(99.0, DVec2::new(10.0, 10.0));
        assert_eq!(vp.scale(), MAX_SCALE);
        vp.zoom_at(0.1, DVec2::new(10.0, 10.0));
        assert_eq!(vp.scale(), MIN_SCALE);
        assert_eq!(vp.pan(), DVec2::ZERO);
    }

    #[test]
    fn test_pan_bounds_collapse_when_unzoomed() {
        let vp = ViewportController::new(200.0, 100.0);
        let b = vp.pan_bounds(1.0);
        assert_eq!(b.min, DVec2::ZERO);
        assert_eq!(b.max, DVec2::ZERO);
        let b = vp.pan_bounds(2.0);
        assert_eq!(b.min, DVec2::new(-200.0, -100.0));
    }

    #[test]
    fn test_random_walk_keeps_invariants() {
        let mut vp = ViewportController::new(160.0, 96.0);
        let mut now = 0;
        for step in 0..400u32 {
            let f = step as f64;
            let pos = DVec2::new((f * 37.0) % 190.0 - 10.0, (f * 53.0) % 120.0 - 10.0);
            let intent = match step % 6 {
                0 => PointerIntent::Wheel {
                    delta_y: if step % 4 == 0 { -240.0 } else { 180.0 },
                    pos,
                },
                1 => PointerIntent::Down {
                    pointer: P,
                    pos,
                    target: HitTarget::Background,
                },
                2 | 3 => PointerIntent::Move { pointer: P, pos },
                4 => PointerIntent::Up { pointer: Some(P) },
                _ => PointerIntent::Click {
                    target: HitTarget::Background,
                },
            };
            now += 16;
            vp.handle(intent, now);
            assert_invariants(&vp);
        }
    }

    #[test]
    fn test_drag_requires_zoom_and_background() {
        let mut vp = ViewportController::new(200.0, 100.0);
        let down = PointerIntent::Down {
            pointer: P,
            pos: DVec2::new(10.0, 10.0),
            target: HitTarget::Background,
        };
        assert_eq!(vp.handle(down, 0), ViewportResponse::Ignored);

        vp.zoom_at(2.0, DVec2::new(100.0, 50.0));
        let on_marker = PointerIntent::Down {
            pointer: P,
            pos: DVec2::new(10.0, 10.0),
            target: HitTarget::Marker,
        };
        assert_eq!(vp.handle(on_marker, 0), ViewportResponse::Ignored);
        let on_readout = PointerIntent::Down {
            pointer: P,
            pos: DVec2::new(10.0, 10.0),
            target: HitTarget::ScaleReadout,
        };
        assert_eq!(vp.handle(on_readout, 0), ViewportResponse::Ignored);
        assert_eq!(vp.handle(down, 0), ViewportResponse::Changed);
        assert!(vp.state().dragging);
    }

    #[test]
    fn test_drag_moves_pan_from_start_snapshot() {
        let mut vp = ViewportController::new(200.0, 100.0);
        vp.zoom_at(2.0, DVec2::new(100.0, 50.0));
        let start_pan = vp.pan();
        vp.handle(
            PointerIntent::Down {
                pointer: P,
                pos: DVec2::new(100.0, 50.0),
                target: HitTarget::Background,
            },
            0,
        );
        vp.handle(
            PointerIntent::Move {
                pointer: P,
                pos: DVec2::new(110.0, 45.0),
            },
            10,
        );
        vp.handle(
            PointerIntent::Move {
                pointer: P,
                pos: DVec2::new(120.0, 50.0),
            },
            20,
        );
        assert_eq!(vp.pan(), vp.clamp_pan(start_pan + DVec2::new(20.0, 0.0), 2.0));
        assert_eq!(vp.state().last_drag_at_ms, Some(20));
    }

    #[test]
    fn test_move_from_other_pointer_is_ignored() {
        let mut vp = ViewportController::new(200.0, 100.0);
        vp.zoom_at(2.0, DVec2::new(100.0, 50.0));
        vp.handle(
            PointerIntent::Down {
                pointer: P,
                pos: DVec2::new(100.0, 50.0),
                target: HitTarget::Background,
            },
            0,
        );
        let other = PointerId(7);
        let resp = vp.handle(
            PointerIntent::Move {
                pointer: other,
                pos: DVec2::new(150.0, 80.0),
            },
            5,
        );
        assert_eq!(resp, ViewportResponse::Ignored);
        assert_eq!(
            vp.handle(PointerIntent::Up { pointer: Some(other) }, 6),
            ViewportResponse::Ignored
        );
        assert!(vp.state().dragging);
        assert_eq!(
            vp.handle(PointerIntent::Up { pointer: None }, 7),
            ViewportResponse::Changed
        );
        assert!(!vp.state().dragging);
    }

    #[test]
    fn test_click_after_drag_is_residue() {
        let mut vp = ViewportController::new(200.0, 100.0);
        vp.zoom_at(3.0, DVec2::new(100.0, 50.0));
        vp.handle(
            PointerIntent::Down {
                pointer: P,
                pos: DVec2::new(50.0, 50.0),
                target: HitTarget::Background,
            },
            1_000,
        );
        vp.handle(
            PointerIntent::Move {
                pointer: P,
                pos: DVec2::new(70.0, 50.0),
            },
            1_050,
        );
        vp.handle(PointerIntent::Up { pointer: Some(P) }, 1_060);
        let click = PointerIntent::Click {
            target: HitTarget::Background,
        };
        assert_eq!(vp.handle(click, 1_100), ViewportResponse::DragResidue);
        assert_eq!(vp.handle(click, 1_300), ViewportResponse::BackgroundClick);
    }

    #[test]
    fn test_small_jitter_does_not_stamp_drag() {
        let mut vp = ViewportController::new(200.0, 100.0);
        vp.zoom_at(2.0, DVec2::new(100.0, 50.0));
        vp.handle(
            PointerIntent::Down {
                pointer: P,
                pos: DVec2::new(50.0, 50.0),
                target: HitTarget::Background,
            },
            0,
        );
        vp.handle(
            PointerIntent::Move {
                pointer: P,
                pos: DVec2::new(52.0, 51.0),
            },
            5,
        );
        assert_eq!(vp.state().last_drag_at_ms, None);
    }

    #[test]
    fn test_double_click_resets() {
        let mut vp = ViewportController::new(200.0, 100.0);
        vp.zoom_at(4.0, DVec2::new(10.0, 90.0));
        vp.handle(
            PointerIntent::DoubleClick {
                target: HitTarget::Background,
            },
            0,
        );
        assert_eq!(vp.scale(), 1.0);
        assert_eq!(vp.pan(), DVec2::ZERO);
    }

    #[test]
    fn test_screen_plane_round_trip() {
        let mut vp = ViewportController::new(200.0, 100.0);
        vp.zoom_at(2.5, DVec2::new(60.0, 30.0));
        let plane = DVec2::new(33.0, 71.0);
        let back = vp.to_plane(vp.to_screen(plane));
        assert!((back - plane).length() < 1e-9);
    }

    #[test]
    fn test_resize_reclamps_pan() {
        let mut vp = ViewportController::new(200.0, 100.0);
        vp.zoom_at(2.0, DVec2::new(200.0, 100.0));
        vp.resize(100.0, 50.0);
        assert_invariants(&vp);
    }
}
