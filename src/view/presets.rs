//! Named saved views and where they live on disk.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::{FilterSet, RouteFilters};

/// Storage key, also the file stem on disk
pub const SAVED_VIEWS_KEY: &str = "wakemap.savedViews.v1";
pub const MAX_SAVED_VIEWS: usize = 24;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewPreset {
    pub name: String,
    /// Unix seconds
    #[serde(default)]
    pub saved_at: i64,
    #[serde(default)]
    pub filters: FilterSet,
    #[serde(default)]
    pub route_filters: RouteFilters,
}

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Encode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "saved view storage error: {e}"),
            StoreError::Encode(msg) => write!(f, "saved views could not be encoded: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Raw key/value persistence for the saved view list
pub trait PresetStore {
    /// `None` when nothing was ever written
    fn read(&self) -> Result<Option<String>, StoreError>;
    fn write(&self, json: &str) -> Result<(), StoreError>;
}

/// `<dir>/wakemap.savedViews.v1.json`
#[derive(Clone, Debug)]
pub struct FilePresetStore {
    path: PathBuf,
}

impl FilePresetStore {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{SAVED_VIEWS_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PresetStore for FilePresetStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, json: &str) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPresetStore {
    value: RefCell<Option<String>>,
}

impl MemoryPresetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: &str) -> Self {
        Self {
            value: RefCell::new(Some(raw.to_string())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.value.borrow().clone()
    }
}

impl PresetStore for MemoryPresetStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.value.borrow().clone())
    }

    fn write(&self, json: &str) -> Result<(), StoreError> {
        *self.value.borrow_mut() = Some(json.to_string());
        Ok(())
    }
}

/// Saved views, most recently saved first
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PresetBook {
    views: Vec<ViewPreset>,
}

impl PresetBook {
    /// Parse a persisted list; anything unreadable yields an empty book
    pub fn from_json(raw: &str) -> Self {
        let mut bytes = raw.as_bytes().to_vec();
        match simd_json::serde::from_slice::<Vec<ViewPreset>>(&mut bytes) {
            Ok(views) => {
                let mut views: Vec<ViewPreset> = views
                    .into_iter()
                    .map(|mut v| {
                        v.name = v.name.trim().to_string();
                        v
                    })
                    .filter(|v| !v.name.is_empty())
                    .collect();
                views.truncate(MAX_SAVED_VIEWS);
                Self { views }
            }
            Err(e) => {
                tracing::warn!(error = %e, "saved views are corrupt, starting empty");
                Self::default()
            }
        }
    }

    pub fn load(store: &dyn PresetStore) -> Self {
        match store.read() {
            Ok(Some(raw)) => Self::from_json(&raw),
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!(error = %e, "saved views unavailable");
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        simd_json::serde::to_string(&self.views).map_err(|e| StoreError::Encode(e.to_string()))
    }

    pub fn persist(&self, store: &dyn PresetStore) -> Result<(), StoreError> {
        store.write(&self.to_json()?)?;
        tracing::debug!(count = self.views.len(), "saved views persisted");
        Ok(())
    }

    /// Insert or replace (case-insensitive name match); the view moves to the
    /// front and the oldest entries fall off past the cap. Blank names are
    /// rejected.
    pub fn save(&mut self, mut preset: ViewPreset) -> bool {
        preset.name = preset.name.trim().to_string();
        if preset.name.is_empty() {
            return false;
        }
        let key = preset.name.to_lowercase();
        self.views.retain(|v| v.name.to_lowercase() != key);
        self.views.insert(0, preset);
        self.views.truncate(MAX_SAVED_VIEWS);
        true
    }

    /// Remove by exact name
    pub fn delete(&mut self, name: &str) -> bool {
        let before = self.views.len();
        self.views.retain(|v| v.name != name);
        self.views.len() != before
    }

    /// Exact name lookup
    pub fn find(&self, name: &str) -> Option<&ViewPreset> {
        self.views.iter().find(|v| v.name == name)
    }

    /// Display order: newest `saved_at` first, ties keep list order
    pub fn sorted(&self) -> Vec<&ViewPreset> {
        let mut out: Vec<&ViewPreset> = self.views.iter().collect();
        out.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        out
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(name: &str, saved_at: i64, min_usd: f64) -> ViewPreset {
        ViewPreset {
            name: name.to_string(),
            saved_at,
            filters: FilterSet {
                min_usd,
                ..FilterSet::default()
            },
            route_filters: RouteFilters::default(),
        }
    }

    #[test]
    fn test_save_replaces_case_insensitively() {
        let mut book = PresetBook::default();
        assert!(book.save(preset("Whales", 1, 10.0)));
        assert!(book.save(preset("Bridges", 2, 20.0)));
        assert!(book.save(preset("WHALES", 3, 30.0)));
        assert_eq!(book.len(), 2);
        let names: Vec<&str> = book.sorted().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["WHALES", "Bridges"]);
        assert_eq!(book.find("WHALES").map(|v| v.filters.min_usd), Some(30.0));
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut book = PresetBook::default();
        assert!(!book.save(preset("   ", 1, 0.0)));
        assert!(book.is_empty());
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut book = PresetBook::default();
        for i in 0..30 {
            book.save(preset(&format!("v{i}"), i, 0.0));
        }
        assert_eq!(book.len(), MAX_SAVED_VIEWS);
        assert!(book.find("v29").is_some());
        assert!(book.find("v5").is_none());
        assert!(book.find("v6").is_some());
    }

    #[test]
    fn test_delete_is_exact() {
        let mut book = PresetBook::default();
        book.save(preset("Night", 1, 0.0));
        assert!(!book.delete("night"));
        assert!(book.delete("Night"));
        assert!(book.is_empty());
    }

    #[test]
    fn test_corrupt_store_loads_empty() {
        let store = MemoryPresetStore::with_raw("{not json");
        assert!(PresetBook::load(&store).is_empty());
        let store = MemoryPresetStore::with_raw(r#"{"name":"x"}"#);
        assert!(PresetBook::load(&store).is_empty());
    }

    #[test]
    fn test_persist_and_reload() {
        let store = MemoryPresetStore::new();
        let mut book = PresetBook::default();
        book.save(preset("Whales", 7, 1_000_000.0));
        book.persist(&store).unwrap();
        let reloaded = PresetBook::load(&store);
        assert_eq!(reloaded, book);
    }

    #[test]
    fn test_partial_records_get_defaults() {
        let store = MemoryPresetStore::with_raw(r#"[{"name":" Quiet "},{"name":""}]"#);
        let book = PresetBook::load(&store);
        assert_eq!(book.len(), 1);
        let view = book.find("Quiet").unwrap();
        assert_eq!(view.filters.window_seconds, 3600);
        assert_eq!(view.route_filters, RouteFilters::default());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("wake-map-presets-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let store = FilePresetStore::in_dir(&dir);
        assert!(store.read().unwrap().is_none());
        store.write("[]").unwrap();
        assert_eq!(store.read().unwrap().as_deref(), Some("[]"));
        assert!(store.path().ends_with("wakemap.savedViews.v1.json"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_store_write_leaves_no_temp_file() {
        let dir = std::env::temp_dir().join(format!("wake-map-atomic-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let store = FilePresetStore::in_dir(&dir);
        store.write("[1]").unwrap();
        store.write("[2]").unwrap();
        assert_eq!(store.read().unwrap().as_deref(), Some("[2]"));
        assert!(!store.path().with_extension("json.tmp").exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
