use glam::DVec2;

/// Side length of the normalized map plane (both axes span `0..PLANE_EXTENT`)
pub const PLANE_EXTENT: f64 = 100.0;

/// Longitudes past this are pinned so antimeridian points stay on the plane
const LON_LIMIT: f64 = 179.5;
/// Polar latitudes are pinned; the stylized map has no content beyond this
const LAT_LIMIT: f64 = 84.0;

/// Entity markers keep this margin from the plane edges
const MARKER_MARGIN: f64 = 1.5;

/// A geographic coordinate in degrees
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Clamp into the drawable band; non-finite components become 0
    #[inline]
    pub fn sanitized(self) -> Self {
        Self {
            lon: sanitize_lon(self.lon),
            lat: sanitize_lat(self.lat),
        }
    }
}

#[inline(always)]
pub fn sanitize_lon(lon: f64) -> f64 {
    if lon.is_finite() {
        lon.clamp(-LON_LIMIT, LON_LIMIT)
    } else {
        0.0
    }
}

#[inline(always)]
pub fn sanitize_lat(lat: f64) -> f64 {
    if lat.is_finite() {
        lat.clamp(-LAT_LIMIT, LAT_LIMIT)
    } else {
        0.0
    }
}

/// Equirectangular x in plane units
#[inline(always)]
pub fn lon_to_x(lon: f64) -> f64 {
    (lon + 180.0) / 360.0 * PLANE_EXTENT
}

/// Equirectangular y in plane units (north is up, so y grows southwards)
#[inline(always)]
pub fn lat_to_y(lat: f64) -> f64 {
    (90.0 - lat) / 180.0 * PLANE_EXTENT
}

/// Sanitize then project onto the plane
#[inline]
pub fn project(point: GeoPoint) -> DVec2 {
    let p = point.sanitized();
    DVec2::new(lon_to_x(p.lon), lat_to_y(p.lat))
}

/// Projected position for an entity marker, kept off the frame edge
pub fn marker_point(point: GeoPoint) -> DVec2 {
    clamp_to_marker_area(project(point))
}

/// Pull a plane point inside the marker margin
#[inline]
pub fn clamp_to_marker_area(p: DVec2) -> DVec2 {
    p.clamp(
        DVec2::splat(MARKER_MARGIN),
        DVec2::splat(PLANE_EXTENT - MARKER_MARGIN),
    )
}

/// Invert the plane mapping back to degrees (no sanitization)
pub fn unproject(p: DVec2) -> GeoPoint {
    GeoPoint {
        lon: p.x / PLANE_EXTENT * 360.0 - 180.0,
        lat: 90.0 - p.y / PLANE_EXTENT * 180.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_plane_center() {
        let p = project(GeoPoint::new(0.0, 0.0));
        assert_eq!(p, DVec2::new(50.0, 50.0));
    }

    #[test]
    fn test_full_range_stays_on_plane() {
        let mut lon = -180.0;
        while lon <= 180.0 {
            let mut lat = -90.0;
            while lat <= 90.0 {
                let p = project(GeoPoint::new(lon, lat));
                assert!((0.0..=100.0).contains(&p.x), "x out of range for {lon}");
                assert!((0.0..=100.0).contains(&p.y), "y out of range for {lat}");
                lat += 7.5;
            }
            lon += 7.5;
        }
    }

    #[test]
    fn test_non_finite_defaults_to_zero() {
        let p = project(GeoPoint::new(f64::NAN, f64::INFINITY));
        assert_eq!(p, DVec2::new(50.0, 50.0));
    }

    #[test]
    fn test_poles_and_antimeridian_are_pinned() {
        let p = project(GeoPoint::new(180.0, 90.0));
        assert!((p.x - lon_to_x(179.5)).abs() < 1e-12);
        assert!((p.y - lat_to_y(84.0)).abs() < 1e-12);
    }

    #[test]
    fn test_marker_point_keeps_margin() {
        let p = marker_point(GeoPoint::new(-179.5, 84.0));
        assert!(p.x >= 1.5 && p.y >= 1.5);
    }

    #[test]
    fn test_unproject_inverts_project() {
        let geo = GeoPoint::new(-73.9, 40.7);
        let back = unproject(project(geo));
        assert!((back.lon - geo.lon).abs() < 1e-9);
        assert!((back.lat - geo.lat).abs() < 1e-9);
    }
}
