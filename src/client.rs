//! Backend HTTP contract and the worker thread that talks to it.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;

use crate::model::{FilterSet, Snapshot};
use crate::snapshot::parse_snapshot;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One-shot backend jobs, each followed by a snapshot refresh
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendAction {
    PollNow,
    RefreshGeo,
    RefreshBalances,
}

impl BackendAction {
    pub fn path(self) -> &'static str {
        match self {
            BackendAction::PollNow => "api/poll-now",
            BackendAction::RefreshGeo => "api/refresh-geo",
            BackendAction::RefreshBalances => "api/refresh-balances",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BackendAction::PollNow => "poll now",
            BackendAction::RefreshGeo => "refresh geo",
            BackendAction::RefreshBalances => "refresh balances",
        }
    }
}

pub trait DashboardApi: Send {
    /// Raw `/api/state` body
    fn fetch_state(&self) -> Result<Vec<u8>>;
    fn post_filters(&self, filters: &FilterSet) -> Result<()>;
    fn trigger(&self, action: BackendAction) -> Result<()>;
}

/// Blocking reqwest client rooted at the dashboard base URL
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    pub fn new(base: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building http client")?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("bad endpoint {path}"))
    }
}

impl DashboardApi for HttpApi {
    fn fetch_state(&self) -> Result<Vec<u8>> {
        let url = self.endpoint("api/state")?;
        let resp = self
            .client
            .get(url)
            .header("cache-control", "no-store")
            .send()
            .context("state request failed")?
            .error_for_status()
            .context("state request rejected")?;
        Ok(resp.bytes().context("reading state body")?.to_vec())
    }

    fn post_filters(&self, filters: &FilterSet) -> Result<()> {
        let url = self.endpoint("api/state/filters")?;
        let body = simd_json::serde::to_vec(filters).context("encoding filters")?;
        self.client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .context("filter update failed")?
            .error_for_status()
            .context("filter update rejected")?;
        Ok(())
    }

    fn trigger(&self, action: BackendAction) -> Result<()> {
        let url = self.endpoint(action.path())?;
        self.client
            .post(url)
            .send()
            .with_context(|| format!("{} failed", action.label()))?
            .error_for_status()
            .with_context(|| format!("{} rejected", action.label()))?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ApiJob {
    Refresh,
    PostFilters(FilterSet),
    Action(BackendAction),
}

/// A job stamped with its refresh epoch
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub epoch: u64,
    pub job: ApiJob,
}

#[derive(Debug)]
pub struct ApiResponse {
    pub epoch: u64,
    pub snapshot: Result<Snapshot>,
}

/// Run a job and fetch the snapshot that follows it
pub fn run_job(api: &dyn DashboardApi, job: &ApiJob) -> Result<Snapshot> {
    match job {
        ApiJob::Refresh => {}
        ApiJob::PostFilters(filters) => api.post_filters(filters)?,
        ApiJob::Action(action) => api.trigger(*action)?,
    }
    let mut body = api.fetch_state()?;
    parse_snapshot(&mut body)
}

/// Background thread owning the API; jobs in, snapshots out
pub struct RefreshWorker {
    requests: Option<Sender<ApiRequest>>,
    responses: Receiver<ApiResponse>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshWorker {
    pub fn spawn<A: DashboardApi + 'static>(api: A) -> Result<Self> {
        let (req_tx, req_rx) = mpsc::channel::<ApiRequest>();
        let (resp_tx, resp_rx) = mpsc::channel::<ApiResponse>();
        let handle = thread::Builder::new()
            .name("refresh".into())
            .spawn(move || {
                for request in req_rx {
                    let snapshot = run_job(&api, &request.job);
                    let response = ApiResponse {
                        epoch: request.epoch,
                        snapshot,
                    };
                    if resp_tx.send(response).is_err() {
                        break;
                    }
                }
            })
            .context("spawning refresh worker")?;
        Ok(Self {
            requests: Some(req_tx),
            responses: resp_rx,
            handle: Some(handle),
        })
    }

    /// Queue a job; false if the worker is gone
    pub fn submit(&self, request: ApiRequest) -> bool {
        self.requests
            .as_ref()
            .is_some_and(|tx| tx.send(request).is_ok())
    }

    /// Everything that finished since the last call
    pub fn drain(&self) -> Vec<ApiResponse> {
        self.responses.try_iter().collect()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ApiResponse> {
        self.responses.recv_timeout(timeout).ok()
    }
}

impl Drop for RefreshWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeApi {
        calls: Arc<Mutex<Vec<String>>>,
        fail_state: bool,
    }

    impl DashboardApi for FakeApi {
        fn fetch_state(&self) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push("state".into());
            if self.fail_state {
                anyhow::bail!("connection refused");
            }
            Ok(br#"{"generated_at": 42, "whales": [{"address": "0xw"}]}"#.to_vec())
        }

        fn post_filters(&self, filters: &FilterSet) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("filters:{}", filters.window_seconds));
            Ok(())
        }

        fn trigger(&self, action: BackendAction) -> Result<()> {
            self.calls.lock().unwrap().push(action.path().into());
            Ok(())
        }
    }

    #[test]
    fn test_job_then_refresh() {
        let api = FakeApi::default();
        let snap = run_job(&api, &ApiJob::Action(BackendAction::RefreshGeo)).unwrap();
        assert_eq!(snap.generated_at, 42);
        assert_eq!(*api.calls.lock().unwrap(), vec!["api/refresh-geo", "state"]);
    }

    #[test]
    fn test_worker_round_trip() {
        let api = FakeApi::default();
        let calls = api.calls.clone();
        let worker = RefreshWorker::spawn(api).unwrap();
        assert!(worker.submit(ApiRequest {
            epoch: 3,
            job: ApiJob::PostFilters(FilterSet::default()),
        }));
        let resp = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(resp.epoch, 3);
        assert_eq!(resp.snapshot.unwrap().whales.len(), 1);
        assert_eq!(calls.lock().unwrap()[0], "filters:3600");
    }

    #[test]
    fn test_failure_is_reported_not_fatal() {
        let api = FakeApi {
            fail_state: true,
            ..FakeApi::default()
        };
        let worker = RefreshWorker::spawn(api).unwrap();
        worker.submit(ApiRequest {
            epoch: 1,
            job: ApiJob::Refresh,
        });
        let resp = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(resp.snapshot.is_err());
        assert!(worker.submit(ApiRequest {
            epoch: 2,
            job: ApiJob::Refresh,
        }));
    }

    #[test]
    fn test_endpoints_join_under_base() {
        let api = HttpApi::new(Url::parse("http://127.0.0.1:8000/dash/").unwrap()).unwrap();
        assert_eq!(
            api.endpoint("api/state").unwrap().as_str(),
            "http://127.0.0.1:8000/dash/api/state"
        );
    }
}
