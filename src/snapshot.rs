//! Snapshot ingestion: backend JSON → strict [`Snapshot`].
//!
//! The backend document is loosely typed. Every field is pulled out with a
//! default so a partially broken payload still renders; only a document that
//! is not a JSON object at all is rejected.

use anyhow::{bail, Context, Result};
use simd_json::prelude::*;
use simd_json::OwnedValue;

use crate::model::{
    Endpoint, Entity, FilterSet, FiltersMeta, GeoSource, SeaState, Snapshot, TransferEvent,
    DEFAULT_WINDOW_SECONDS,
};

/// Parse a raw `/api/state` body. The buffer is used as simd-json scratch.
pub fn parse_snapshot(body: &mut [u8]) -> Result<Snapshot> {
    let doc = simd_json::to_owned_value(body).context("snapshot is not valid JSON")?;
    if doc.as_object().is_none() {
        bail!("snapshot root is not an object");
    }
    Ok(snapshot_from_value(&doc))
}

fn snapshot_from_value(doc: &OwnedValue) -> Snapshot {
    let whales = array(doc, "whales").iter().map(entity_from).collect();
    let alerts = events_from(array(doc, "alerts"));
    let events = events_from(array(doc, "events"));

    let filters = doc.get("filters").map(filters_from).unwrap_or_default();
    let filters_meta = doc.get("filters_meta").map(filters_meta_from).unwrap_or_default();
    let sea_state = doc
        .get("sea_state")
        .map(|s| SeaState {
            tier: string(s, "tier"),
            score_15m: number(s, "score_15m").unwrap_or(0.0),
        })
        .unwrap_or_default();

    Snapshot {
        whales,
        alerts,
        events,
        filters,
        filters_meta,
        sea_state,
        generated_at: number(doc, "generated_at").unwrap_or(0.0) as i64,
    }
}

fn entity_from(row: &OwnedValue) -> Entity {
    let address = string(row, "address");
    let label = ["display_name", "label"]
        .iter()
        .map(|key| string(row, key))
        .find(|s| !s.trim().is_empty())
        .unwrap_or_default();
    Entity {
        address,
        lon: number(row, "lon").unwrap_or(0.0),
        lat: number(row, "lat").unwrap_or(0.0),
        label: label.trim().to_string(),
        country: optional_string(row, "primary_country"),
        region: optional_string(row, "primary_region"),
        last_flow_usd: number(row, "last_alert_usd"),
        portfolio_usd: number(row, "holdings_total_usd"),
        token_count: count(row, "holdings_token_count"),
        alerts_24h: count(row, "alerts_24h"),
        alert_count_total: count(row, "alert_count_total"),
    }
}

fn events_from(rows: &[OwnedValue]) -> Vec<TransferEvent> {
    let mut out = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;
    for row in rows {
        match event_from(row) {
            Some(event) => out.push(event),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "skipped events without source/target");
    }
    out
}

fn event_from(row: &OwnedValue) -> Option<TransferEvent> {
    let source = endpoint_from(row.get("source")?)?;
    let target = endpoint_from(row.get("target")?)?;
    let tx_id = string(row, "tx_id");
    let event_id = ["event_id", "dedupe_key"]
        .iter()
        .map(|key| string(row, key))
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| tx_id.clone());
    Some(TransferEvent {
        event_id,
        tx_id,
        source,
        target,
        event_type: string(row, "event_type"),
        usd_value: number(row, "usd_value").unwrap_or(0.0),
        score: number(row, "score").unwrap_or(0.0),
        timestamp: number(row, "timestamp").unwrap_or(0.0) as i64,
        chain: string(row, "chain").to_lowercase(),
        watch_address: string(row, "watch_address"),
    })
}

fn endpoint_from(side: &OwnedValue) -> Option<Endpoint> {
    side.as_object()?;
    Some(Endpoint {
        address: string(side, "address"),
        lon: number(side, "lon").unwrap_or(0.0),
        lat: number(side, "lat").unwrap_or(0.0),
        geo_source: GeoSource::parse(&string(side, "geo_source")),
    })
}

fn filters_from(v: &OwnedValue) -> FilterSet {
    FilterSet {
        types: strings(v, "types"),
        chains: strings(v, "chains"),
        min_usd: number(v, "min_usd").unwrap_or(0.0),
        window_seconds: number(v, "window_seconds")
            .map(|n| n as u32)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_WINDOW_SECONDS),
        replay_offset_seconds: count(v, "replay_offset_seconds"),
    }
    .normalized()
}

fn filters_meta_from(v: &OwnedValue) -> FiltersMeta {
    let defaults = FiltersMeta::default();
    FiltersMeta {
        available_event_types: strings(v, "available_event_types"),
        available_chains: strings(v, "available_chains"),
        max_replay_offset_seconds: number(v, "max_replay_offset_seconds")
            .map(|n| n as u32)
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_replay_offset_seconds),
    }
}

fn array<'a>(v: &'a OwnedValue, key: &str) -> &'a [OwnedValue] {
    v.get(key)
        .and_then(|a| a.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

fn string(v: &OwnedValue, key: &str) -> String {
    v.get(key)
        .and_then(|s| s.as_str())
        .unwrap_or_default()
        .to_string()
}

fn optional_string(v: &OwnedValue, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|s| s.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn strings(v: &OwnedValue, key: &str) -> Vec<String> {
    array(v, key)
        .iter()
        .filter_map(|item| item.as_str())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Finite number (ints are widened), `None` for anything else
fn number(v: &OwnedValue, key: &str) -> Option<f64> {
    v.get(key)
        .and_then(|n| n.cast_f64())
        .filter(|n| n.is_finite())
}

fn count(v: &OwnedValue, key: &str) -> u32 {
    number(v, key).map(|n| n.max(0.0) as u32).unwrap_or(0)
}

/// Monotonic request epochs so a slow, superseded refresh cannot overwrite
/// newer state.
#[derive(Debug, Default)]
pub struct RefreshFence {
    issued: u64,
    applied: u64,
}

impl RefreshFence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a new outgoing refresh
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Accept a response unless something newer already landed
    pub fn accept(&mut self, epoch: u64) -> bool {
        if epoch <= self.applied {
            return false;
        }
        self.applied = epoch;
        true
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }
}
