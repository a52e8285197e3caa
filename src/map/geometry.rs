//! Dot rasterization onto a [`BrailleCanvas`].

use glam::DVec2;

use crate::braille::BrailleCanvas;

/// Bresenham segment between two dot positions
pub fn draw_line(canvas: &mut BrailleCanvas, from: (i32, i32), to: (i32, i32)) {
    let (mut x, mut y) = from;
    let (x1, y1) = to;
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let step_x = if x < x1 { 1 } else { -1 };
    let step_y = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        canvas.set(x, y);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += step_x;
        }
        if e2 <= dx {
            err += dx;
            y += step_y;
        }
    }
}

/// Connect consecutive points. Segments longer than `max_jump` dots are
/// skipped (antimeridian wraps, off-screen runs).
pub fn draw_polyline(canvas: &mut BrailleCanvas, points: &[DVec2], max_jump: f64) {
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if !a.is_finite() || !b.is_finite() || a.distance(b) > max_jump {
            continue;
        }
        if !segment_near(canvas, a, b) {
            continue;
        }
        draw_line(canvas, to_dot(a), to_dot(b));
    }
}

/// Thicker polyline: the line plus a one-dot offset copy
pub fn draw_thick_polyline(canvas: &mut BrailleCanvas, points: &[DVec2], max_jump: f64) {
    draw_polyline(canvas, points, max_jump);
    let shifted: Vec<DVec2> = points.iter().map(|p| *p + DVec2::new(1.0, 0.0)).collect();
    draw_polyline(canvas, &shifted, max_jump);
}

/// Circle outline
pub fn draw_ring(canvas: &mut BrailleCanvas, center: DVec2, radius: f64) {
    let steps = ((radius * 8.0).ceil() as usize).clamp(8, 96);
    let points: Vec<DVec2> = (0..=steps)
        .map(|i| {
            let angle = i as f64 / steps as f64 * std::f64::consts::TAU;
            center + DVec2::new(angle.cos(), angle.sin()) * radius
        })
        .collect();
    draw_polyline(canvas, &points, f64::INFINITY);
}

/// Filled disc
pub fn draw_disc(canvas: &mut BrailleCanvas, center: DVec2, radius: f64) {
    let (cx, cy) = to_dot(center);
    let r = radius.round().max(0.0) as i32;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                canvas.set(cx + dx, cy + dy);
            }
        }
    }
}

fn to_dot(p: DVec2) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

/// Cheap bounding-box cull against the canvas
fn segment_near(canvas: &BrailleCanvas, a: DVec2, b: DVec2) -> bool {
    let (w, h) = canvas.dot_size();
    let min = a.min(b);
    let max = a.max(b);
    max.x >= 0.0 && max.y >= 0.0 && min.x < w as f64 && min.y < h as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line_fills_row() {
        let mut canvas = BrailleCanvas::new(3, 1);
        draw_line(&mut canvas, (0, 0), (5, 0));
        assert_eq!(canvas.render_text(), "⠉⠉⠉");
    }

    #[test]
    fn test_long_jumps_are_skipped() {
        let mut canvas = BrailleCanvas::new(20, 2);
        let pts = [DVec2::new(0.0, 0.0), DVec2::new(39.0, 0.0)];
        draw_polyline(&mut canvas, &pts, 10.0);
        assert_eq!(canvas.lit().count(), 0);
        draw_polyline(&mut canvas, &pts, 100.0);
        assert_eq!(canvas.lit().count(), 20);
    }

    #[test]
    fn test_offscreen_segment_culled() {
        let mut canvas = BrailleCanvas::new(4, 4);
        draw_polyline(
            &mut canvas,
            &[DVec2::new(-50.0, -50.0), DVec2::new(-10.0, -5.0)],
            f64::INFINITY,
        );
        assert_eq!(canvas.lit().count(), 0);
    }

    #[test]
    fn test_disc_covers_expected_cells() {
        let mut canvas = BrailleCanvas::new(4, 2);
        draw_disc(&mut canvas, DVec2::new(3.0, 3.0), 2.0);
        assert_eq!(canvas.lit().count(), 5);
    }
}
