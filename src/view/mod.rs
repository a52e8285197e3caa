//! Filter/focus state, its shareable link form, and saved named views.

pub mod presets;
pub mod sync;
pub mod url;

use crate::model::{FilterSet, RouteFilters};

pub use presets::{
    FilePresetStore, MemoryPresetStore, PresetBook, PresetStore, StoreError, ViewPreset,
    MAX_SAVED_VIEWS, SAVED_VIEWS_KEY,
};
pub use sync::{LocationBar, LocationSink, ViewSync};
pub use url::{decode_link, decode_state, encode_query, share_url, LinkSpec};

/// Everything a shared link can carry
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewState {
    pub filters: FilterSet,
    pub routes: RouteFilters,
    /// Focused event id
    pub focus: Option<String>,
}
