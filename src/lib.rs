//! Whale transfer flows on a braille world map.
//!
//! The library holds the dashboard model and the algorithms behind it
//! (projection, clustering, route selection, arc layout, replay, view-state
//! sync); the `wake-map` binary drives it from a terminal.

pub mod app;
pub mod braille;
pub mod client;
pub mod config;
pub mod data;
pub mod flows;
pub mod map;
pub mod model;
pub mod render;
pub mod replay;
pub mod snapshot;
pub mod timeline;
pub mod ui;
pub mod view;
