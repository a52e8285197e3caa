use glam::DVec2;

use crate::braille::BrailleCanvas;
use crate::map::geometry::draw_polyline;
use crate::map::projection::{project, GeoPoint};
use crate::map::viewport::ViewportController;

/// Coastline resolution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lod {
    /// 110m, whole-world view
    Low,
    /// 50m
    Medium,
    /// 10m, close zoom
    High,
}

impl Lod {
    pub fn for_scale(scale: f64) -> Self {
        if scale < 2.0 {
            Lod::Low
        } else if scale < 3.5 {
            Lod::Medium
        } else {
            Lod::High
        }
    }
}

/// World backdrop: coastlines at up to three resolutions, pre-projected to
/// the map plane.
#[derive(Debug, Default)]
pub struct Backdrop {
    low: Vec<Vec<DVec2>>,
    medium: Vec<Vec<DVec2>>,
    high: Vec<Vec<DVec2>>,
}

impl Backdrop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_coastline(&mut self, line: &[(f64, f64)], lod: Lod) {
        if line.len() < 2 {
            return;
        }
        let projected: Vec<DVec2> = line
            .iter()
            .map(|&(lon, lat)| project(GeoPoint::new(lon, lat)))
            .collect();
        match lod {
            Lod::Low => self.low.push(projected),
            Lod::Medium => self.medium.push(projected),
            Lod::High => self.high.push(projected),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.low.is_empty() || !self.medium.is_empty() || !self.high.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.low.len() + self.medium.len() + self.high.len()
    }

    /// Finest loaded set at or below `lod`, else whatever exists
    fn lines(&self, lod: Lod) -> &[Vec<DVec2>] {
        let order: [&Vec<Vec<DVec2>>; 3] = match lod {
            Lod::High => [&self.high, &self.medium, &self.low],
            Lod::Medium => [&self.medium, &self.low, &self.high],
            Lod::Low => [&self.low, &self.medium, &self.high],
        };
        order
            .into_iter()
            .find(|set| !set.is_empty())
            .map(|set| set.as_slice())
            .unwrap_or(&[])
    }

    pub fn render(&self, canvas: &mut BrailleCanvas, viewport: &ViewportController) {
        let lod = Lod::for_scale(viewport.scale());
        // A segment spanning half the screen is a wrap, not a coastline
        let max_jump = viewport.size().x * viewport.scale() * 0.5;
        for line in self.lines(lod) {
            let screen: Vec<DVec2> = line.iter().map(|p| viewport.to_screen(*p)).collect();
            draw_polyline(canvas, &screen, max_jump);
        }
    }
}
