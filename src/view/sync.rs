use reqwest::Url;

use crate::view::url::share_url;
use crate::view::ViewState;

/// Where the live link is shown. Updates overwrite; there is no history.
pub trait LocationSink {
    fn replace(&mut self, url: &Url);
}

/// In-app location bar holding the one current link
#[derive(Clone, Debug)]
pub struct LocationBar {
    current: Url,
    replacements: u64,
}

impl LocationBar {
    pub fn new(initial: Url) -> Self {
        Self {
            current: initial,
            replacements: 0,
        }
    }

    pub fn current(&self) -> &Url {
        &self.current
    }

    pub fn replacements(&self) -> u64 {
        self.replacements
    }
}

impl LocationSink for LocationBar {
    fn replace(&mut self, url: &Url) {
        self.current = url.clone();
        self.replacements += 1;
    }
}

/// Keeps a [`LocationSink`] in step with the view state
#[derive(Debug)]
pub struct ViewSync<S> {
    base: Url,
    sink: S,
}

impl<S: LocationSink> ViewSync<S> {
    pub fn new(base: Url, sink: S) -> Self {
        Self { base, sink }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Re-encode `state` and replace the current location with it
    pub fn sync(&mut self, state: &ViewState) -> Url {
        let url = share_url(&self.base, state);
        self.sink.replace(&url);
        url
    }

    /// Link text for copying, without touching the location
    pub fn share_link(&self, state: &ViewState) -> String {
        share_url(&self.base, state).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RouteFilters;

    #[test]
    fn test_sync_replaces_in_place() {
        let base = Url::parse("http://127.0.0.1:8000/").unwrap();
        let mut sync = ViewSync::new(base.clone(), LocationBar::new(base));
        let mut state = ViewState {
            routes: RouteFilters::ALL_ENABLED,
            ..ViewState::default()
        };
        sync.sync(&state);
        state.focus = Some("e1".into());
        let url = sync.sync(&state);
        assert_eq!(sync.sink().current(), &url);
        assert_eq!(sync.sink().replacements(), 2);
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/?event=e1");
        assert_eq!(sync.share_link(&state), url.to_string());
    }
}
