use crate::map::{Backdrop, Lod};
use anyhow::{Context, Result};
use geojson::{GeoJson, Geometry, Value};
use std::fs;
use std::path::Path;

/// Natural Earth coastline files, coarsest first
const COASTLINE_FILES: [(&str, Lod); 3] = [
    ("ne_110m_coastline.json", Lod::Low),
    ("ne_50m_coastline.json", Lod::Medium),
    ("ne_10m_coastline.json", Lod::High),
];

/// Load whatever coastline files exist under `data_dir`. Returns the number
/// of files read; unreadable files are logged and skipped.
pub fn load_coastlines(backdrop: &mut Backdrop, data_dir: &Path) -> usize {
    let mut loaded = 0;
    for (filename, lod) in COASTLINE_FILES {
        let path = data_dir.join(filename);
        if !path.exists() {
            continue;
        }
        match load_file(backdrop, &path, lod) {
            Ok(lines) => {
                tracing::info!(file = filename, lines, "loaded coastline");
                loaded += 1;
            }
            Err(err) => tracing::warn!(file = filename, error = %err, "skipping coastline"),
        }
    }
    loaded
}

fn load_file(backdrop: &mut Backdrop, path: &Path, lod: Lod) -> Result<usize> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    load_str(backdrop, &content, lod)
}

/// Parse a GeoJSON document and add its line work to the backdrop
pub fn load_str(backdrop: &mut Backdrop, content: &str, lod: Lod) -> Result<usize> {
    let geojson: GeoJson = content.parse()?;
    let mut count = 0;
    for_each_line(&geojson, |line| {
        backdrop.add_coastline(&line, lod);
        count += 1;
    });
    Ok(count)
}

fn for_each_line<F>(geojson: &GeoJson, mut add_line: F)
where
    F: FnMut(Vec<(f64, f64)>),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for geometry in fc.features.iter().filter_map(|f| f.geometry.as_ref()) {
                geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Feature(f) => {
            if let Some(geometry) = &f.geometry {
                geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Geometry(geometry) => geometry_lines(geometry, &mut add_line),
    }
}

fn geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(Vec<(f64, f64)>),
{
    let to_line = |coords: &Vec<Vec<f64>>| -> Vec<(f64, f64)> {
        coords
            .iter()
            .filter(|c| c.len() >= 2)
            .map(|c| (c[0], c[1]))
            .collect()
    };
    match &geometry.value {
        Value::LineString(coords) => add_line(to_line(coords)),
        Value::MultiLineString(lines) => lines.iter().for_each(|l| add_line(to_line(l))),
        // Outer rings only
        Value::Polygon(rings) => {
            if let Some(outer) = rings.first() {
                add_line(to_line(outer));
            }
        }
        Value::MultiPolygon(polygons) => {
            for outer in polygons.iter().filter_map(|rings| rings.first()) {
                add_line(to_line(outer));
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                geometry_lines(g, add_line);
            }
        }
        _ => {}
    }
}

/// Rough continent outlines for when no data files are present
pub fn fallback_outline(backdrop: &mut Backdrop) {
    const OUTLINES: [&[(f64, f64)]; 6] = [
        // North America
        &[
            (-160.0, 70.0), (-150.0, 58.0), (-128.0, 50.0), (-122.0, 36.0),
            (-108.0, 22.0), (-92.0, 17.0), (-84.0, 10.0), (-80.0, 8.0),
            (-88.0, 21.0), (-95.0, 28.0), (-84.0, 29.5), (-80.5, 26.0),
            (-78.0, 34.0), (-71.0, 42.0), (-60.0, 46.0), (-62.0, 58.0),
            (-78.0, 60.0), (-92.0, 68.0), (-120.0, 71.0), (-160.0, 70.0),
        ],
        // South America
        &[
            (-78.0, 8.0), (-62.0, 10.0), (-50.0, 2.0), (-36.0, -6.0),
            (-40.0, -20.0), (-52.0, -32.0), (-62.0, -40.0), (-68.0, -54.0),
            (-74.0, -48.0), (-72.0, -18.0), (-81.0, -4.0), (-78.0, 8.0),
        ],
        // Europe
        &[
            (-9.0, 38.0), (-2.0, 43.5), (-4.5, 48.5), (4.0, 52.0),
            (8.0, 57.0), (5.0, 61.0), (16.0, 69.0), (30.0, 70.0),
            (42.0, 66.0), (40.0, 46.0), (28.0, 41.0), (22.0, 37.0),
            (13.0, 45.0), (3.0, 42.0), (-9.0, 38.0),
        ],
        // Africa
        &[
            (-16.0, 22.0), (-9.0, 33.0), (10.0, 37.0), (32.0, 31.0),
            (43.0, 12.0), (51.0, 11.0), (40.0, -4.0), (40.0, -15.0),
            (32.0, -29.0), (19.0, -34.5), (12.0, -18.0), (9.0, 4.0),
            (-8.0, 4.5), (-17.0, 14.0), (-16.0, 22.0),
        ],
        // Asia
        &[
            (42.0, 66.0), (70.0, 73.0), (110.0, 76.0), (140.0, 72.0),
            (170.0, 66.0), (160.0, 60.0), (140.0, 54.0), (128.0, 40.0),
            (121.0, 31.0), (108.0, 21.0), (104.0, 1.5), (98.0, 16.0),
            (90.0, 22.0), (80.0, 9.0), (72.0, 21.0), (57.0, 25.0),
            (48.0, 29.0), (36.0, 36.0), (40.0, 46.0), (42.0, 66.0),
        ],
        // Australia
        &[
            (114.0, -22.0), (122.0, -17.0), (131.0, -11.5), (137.0, -12.0),
            (142.0, -10.5), (146.0, -19.0), (153.5, -28.0), (150.0, -37.0),
            (141.0, -38.5), (131.0, -31.5), (116.0, -35.0), (114.0, -22.0),
        ],
    ];
    for outline in OUTLINES {
        backdrop.add_coastline(outline, Lod::Low);
    }
}
