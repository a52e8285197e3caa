use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Url;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Whale transfer flows on a terminal world map")]
pub struct Config {
    /// Dashboard backend base URL
    #[arg(long, env = "WAKEMAP_API", default_value = "http://127.0.0.1:8000/")]
    pub api: String,

    /// Directory holding Natural Earth coastline GeoJSON
    #[arg(long, env = "WAKEMAP_DATA", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for the saved-views file
    #[arg(long, env = "WAKEMAP_VIEWS", default_value = ".")]
    pub views_dir: PathBuf,

    /// Log destination (the terminal is taken by the UI)
    #[arg(long, default_value = "wake-map.log")]
    pub log_file: PathBuf,

    /// Seconds between background refreshes
    #[arg(long, default_value_t = 12)]
    pub poll_secs: u64,

    /// Shared link to restore on start-up
    #[arg(long)]
    pub open: Option<String>,
}

impl Config {
    /// Backend base URL, always ending in `/` so endpoint joins nest under it
    pub fn api_url(&self) -> Result<Url> {
        let mut raw = self.api.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).with_context(|| format!("invalid --api url {:?}", self.api))
    }

    /// The `--open` link, resolved against the API base when relative
    pub fn open_url(&self) -> Result<Option<Url>> {
        let Some(link) = self.open.as_deref() else {
            return Ok(None);
        };
        let base = self.api_url()?;
        let url = base
            .join(link)
            .with_context(|| format!("invalid --open link {link:?}"))?;
        Ok(Some(url))
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_secs.max(1) * 1_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["wake-map"]).unwrap();
        assert_eq!(config.poll_interval_ms(), 12_000);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(config.open_url().unwrap().is_none());
    }

    #[test]
    fn test_api_gets_trailing_slash() {
        let config =
            Config::try_parse_from(["wake-map", "--api", "http://whales.local:9000/dash"]).unwrap();
        let url = config.api_url().unwrap();
        assert_eq!(url.as_str(), "http://whales.local:9000/dash/");
        assert_eq!(url.join("api/state").unwrap().path(), "/dash/api/state");
    }

    #[test]
    fn test_relative_open_link() {
        let config = Config::try_parse_from(["wake-map", "--open", "?event=ev-1&routes=exact"]).unwrap();
        let url = config.open_url().unwrap().unwrap();
        assert_eq!(url.query(), Some("event=ev-1&routes=exact"));
    }
}
