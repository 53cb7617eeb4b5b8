//! Shared fakes for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use managed_datafile::client::{ClientConfig, EvaluationClient, EventTags, UserAttributes};
use managed_datafile::core::{Datafile, ManagerConfig, PollingDatafileManager};
use managed_datafile::error::{DatafileError, Result};
use managed_datafile::sources::{DatafileSource, Transport, TransportResponse, UrlBuilder};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

pub const INTERVAL: Duration = Duration::from_millis(5000);
pub const SDK_KEY: &str = "test-sdk-key";

/// Body of a minimal datafile with the given revision.
pub fn datafile_body(revision: &str) -> String {
    json!({ "revision": revision, "enabledFeatures": ["checkout"] }).to_string()
}

pub fn datafile(revision: &str) -> Datafile {
    Datafile::from_json(&datafile_body(revision)).unwrap()
}

/// A datafile that [`FakeClient`] refuses to build a valid instance from.
pub fn invalid_datafile_body(revision: &str) -> String {
    json!({ "revision": revision, "invalid": true }).to_string()
}

enum Step {
    Respond(Result<TransportResponse>),
    Gated(oneshot::Receiver<Result<TransportResponse>>),
}

/// Holds one fetch in flight until released.
pub struct Gate(oneshot::Sender<Result<TransportResponse>>);

impl Gate {
    pub fn release_datafile(self, revision: &str) {
        let _ = self.0.send(Ok(TransportResponse::new(200, datafile_body(revision))));
    }

    pub fn release_status(self, status: u16) {
        let _ = self.0.send(Ok(TransportResponse::new(status, "")));
    }
}

/// Transport replaying a script of responses, one per request.
///
/// Once the script runs out, every request gets a 500.
#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<Step>>,
    urls: Mutex<Vec<String>>,
    requests: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_datafile(&self, revision: &str) {
        self.push_body(200, datafile_body(revision));
    }

    pub fn push_invalid_datafile(&self, revision: &str) {
        self.push_body(200, invalid_datafile_body(revision));
    }

    pub fn push_body(&self, status: u16, body: impl Into<String>) {
        self.script
            .lock()
            .push_back(Step::Respond(Ok(TransportResponse::new(status, body))));
    }

    pub fn push_status(&self, status: u16) {
        self.push_body(status, "");
    }

    pub fn push_failure(&self) {
        self.script
            .lock()
            .push_back(Step::Respond(Err(DatafileError::TransportError {
                url: String::new(),
                reason: "connection refused".to_string(),
            })));
    }

    pub fn push_gated(&self) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.script.lock().push_back(Step::Gated(rx));
        Gate(tx)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());

        let step = self.script.lock().pop_front();
        match step {
            Some(Step::Respond(outcome)) => outcome,
            Some(Step::Gated(rx)) => rx.await.unwrap_or_else(|_| {
                Err(DatafileError::TransportError {
                    url: url.to_string(),
                    reason: "gate dropped".to_string(),
                })
            }),
            None => Ok(TransportResponse::new(500, "")),
        }
    }
}

pub fn source(transport: Arc<FakeTransport>) -> DatafileSource {
    DatafileSource::new(transport, UrlBuilder::default())
}

pub fn polling_manager(
    transport: Arc<FakeTransport>,
    config: ManagerConfig,
) -> PollingDatafileManager {
    PollingDatafileManager::with_source(config, source(transport), INTERVAL)
}

/// Let spawned tasks run to quiescence without crossing a poll tick.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Sleep across exactly one more poll tick.
pub async fn next_tick() {
    tokio::time::sleep(INTERVAL).await;
}

/// Evaluation client whose answers are derived from its datafile.
pub struct FakeClient {
    pub revision: Option<String>,
    pub settings: serde_json::Map<String, Value>,
    valid: bool,
    enabled_features: Vec<String>,
    forced: Mutex<HashMap<(String, String), String>>,
    tracked: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakeClient {
    pub fn from_config(config: ClientConfig) -> Self {
        let datafile = config.datafile;
        let valid = datafile
            .as_ref()
            .is_some_and(|d| d.get("invalid") != Some(&Value::Bool(true)));
        let enabled_features = datafile
            .as_ref()
            .and_then(|d| d.get("enabledFeatures"))
            .and_then(Value::as_array)
            .map(|features| {
                features
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            revision: datafile.and_then(|d| d.revision().map(str::to_string)),
            settings: config.settings,
            valid,
            enabled_features,
            forced: Mutex::new(HashMap::new()),
            tracked: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn tracked(&self) -> Vec<String> {
        self.tracked.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn variation(&self, experiment_key: &str, user_id: &str) -> Option<String> {
        if !self.valid {
            return None;
        }
        let forced = self
            .forced
            .lock()
            .get(&(experiment_key.to_string(), user_id.to_string()))
            .cloned();
        forced.or_else(|| {
            self.revision
                .as_ref()
                .map(|revision| format!("{experiment_key}@{revision}"))
        })
    }
}

impl EvaluationClient for FakeClient {
    type NotificationCenter = String;

    fn invalid() -> Self {
        Self::from_config(ClientConfig::new())
    }

    fn is_valid_instance(&self) -> bool {
        self.valid
    }

    fn activate(
        &self,
        experiment_key: &str,
        user_id: &str,
        _attributes: Option<&UserAttributes>,
    ) -> Option<String> {
        self.variation(experiment_key, user_id)
    }

    fn get_variation(
        &self,
        experiment_key: &str,
        user_id: &str,
        _attributes: Option<&UserAttributes>,
    ) -> Option<String> {
        self.variation(experiment_key, user_id)
    }

    fn track(
        &self,
        event_key: &str,
        user_id: &str,
        _attributes: Option<&UserAttributes>,
        _event_tags: Option<&EventTags>,
    ) {
        if self.valid {
            self.tracked.lock().push(format!("{event_key}:{user_id}"));
        }
    }

    fn is_feature_enabled(
        &self,
        feature_key: &str,
        _user_id: &str,
        _attributes: Option<&UserAttributes>,
    ) -> bool {
        self.enabled_features.iter().any(|f| f == feature_key)
    }

    fn get_enabled_features(
        &self,
        _user_id: &str,
        _attributes: Option<&UserAttributes>,
    ) -> Vec<String> {
        self.enabled_features.clone()
    }

    fn get_feature_variable_string(
        &self,
        feature_key: &str,
        variable_key: &str,
        _user_id: &str,
        _attributes: Option<&UserAttributes>,
    ) -> Option<String> {
        self.valid
            .then(|| format!("{feature_key}.{variable_key}"))
    }

    fn get_feature_variable_boolean(
        &self,
        feature_key: &str,
        _variable_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<bool> {
        self.valid
            .then(|| self.is_feature_enabled(feature_key, user_id, attributes))
    }

    fn get_feature_variable_integer(
        &self,
        _feature_key: &str,
        _variable_key: &str,
        _user_id: &str,
        _attributes: Option<&UserAttributes>,
    ) -> Option<i64> {
        self.valid.then_some(42)
    }

    fn get_feature_variable_double(
        &self,
        _feature_key: &str,
        _variable_key: &str,
        _user_id: &str,
        _attributes: Option<&UserAttributes>,
    ) -> Option<f64> {
        self.valid.then_some(0.5)
    }

    fn get_forced_variation(&self, experiment_key: &str, user_id: &str) -> Option<String> {
        self.forced
            .lock()
            .get(&(experiment_key.to_string(), user_id.to_string()))
            .cloned()
    }

    fn set_forced_variation(
        &self,
        experiment_key: &str,
        user_id: &str,
        variation_key: Option<&str>,
    ) -> bool {
        if !self.valid {
            return false;
        }
        let key = (experiment_key.to_string(), user_id.to_string());
        let mut forced = self.forced.lock();
        match variation_key {
            Some(variation) => {
                forced.insert(key, variation.to_string());
            }
            None => {
                forced.remove(&key);
            }
        }
        true
    }

    fn notification_center(&self) -> Option<String> {
        self.revision
            .as_ref()
            .filter(|_| self.valid)
            .map(|revision| format!("notifications@{revision}"))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
