pub mod cluster;
pub mod geometry;
pub mod projection;
pub mod renderer;
pub mod viewport;

pub use projection::{project, GeoPoint, PLANE_EXTENT};
pub use renderer::{Backdrop, Lod};
pub use viewport::{HitTarget, PointerId, PointerIntent, ViewportController, ViewportResponse};
