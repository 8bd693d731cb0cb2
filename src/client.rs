use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::error::{Result, SweepError};
use crate::job::{Job, StepKind};
use crate::ParamDescriptor;

/// The remote ASR execution service as seen by the sweep.
///
/// Implementations must report "result not ready" as a transient error
/// (`SweepError::Transient`) so the poller can tell it apart from hard failures.
#[async_trait]
pub trait RemoteJobClient: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<()>;

    async fn fetch_params(&self, asr_key: &str) -> Result<Vec<ParamDescriptor>>;

    async fn fetch_metrics(&self) -> Result<Vec<MetricInfo>>;

    async fn submit_job(&self, job: &Job) -> Result<JobHandle>;

    async fn fetch_result(&self, step_id: &str, kind: StepKind) -> Result<JobResult>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricInfo {
    pub key: String,
    #[serde(default)]
    pub title: String,
}

/// Ids handed back by the service for a submitted job, one per step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobHandle {
    pub id: String,
    #[serde(deserialize_with = "step_ids")]
    pub steps: Vec<String>,
}

impl JobHandle {
    pub fn step_id(&self, index: usize) -> Result<&str> {
        self.steps.get(index).map(String::as_str).ok_or_else(|| {
            SweepError::MalformedResponse(format!(
                "job {} returned {} step ids, expected at least {}",
                self.id,
                self.steps.len(),
                index + 1
            ))
        })
    }
}

/// Metric key to its textual value, as reported by a finished step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobResult {
    pub metrics: BTreeMap<String, String>,
}

impl JobResult {
    pub fn new(metrics: BTreeMap<String, String>) -> Self {
        Self { metrics }
    }

    /// Test steps report `{"result": {metric: value}}`. Any other shape
    /// (per-sample transcripts, a status string) is a finished step with no
    /// metrics: the successful fetch is what marks completion.
    pub fn from_test_payload(payload: &Value) -> Result<Self> {
        let record = match payload.get("result") {
            Some(result) => result,
            None => payload,
        };
        Ok(record
            .as_object()
            .map(|object| Self::new(scalar_entries(object)))
            .unwrap_or_default())
    }

    /// Measure steps nest their numbers under `result.overall[0].result`.
    pub fn from_measure_payload(payload: &Value) -> Result<Self> {
        let record = payload
            .get("result")
            .and_then(|result| result.get("overall"))
            .and_then(Value::as_array)
            .and_then(|overall| overall.first())
            .and_then(|first| first.get("result"))
            .and_then(Value::as_object)
            .ok_or_else(|| {
                SweepError::MalformedResponse(
                    "measure step result has no overall metrics record".to_string(),
                )
            })?;
        Ok(Self::new(scalar_entries(record)))
    }
}

fn scalar_entries(object: &serde_json::Map<String, Value>) -> BTreeMap<String, String> {
    object
        .iter()
        .filter_map(|(key, value)| match value {
            Value::String(text) => Some((key.clone(), text.clone())),
            Value::Number(number) => Some((key.clone(), number.to_string())),
            _ => None,
        })
        .collect()
}

fn step_ids<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct StepRef {
        id: Value,
    }

    let steps = Vec::<StepRef>::deserialize(deserializer)?;
    Ok(steps
        .into_iter()
        .map(|step| match step.id {
            Value::String(id) => id,
            other => other.to_string(),
        })
        .collect())
}

#[derive(Clone)]
pub struct HttpJobClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TestParams {
    test: Vec<ParamDescriptor>,
}

impl HttpJobClient {
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        HttpJobClient::new(&config.host, timeout)
    }

    pub fn new(host: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|err| SweepError::Request(format!("failed to build http client: {}", err)))?;
        Ok(Self {
            base_url: base_url(host),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|err| SweepError::Request(format!("GET {} failed: {}", path, err)))?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| SweepError::Parse(format!("GET {}: {}", path, err)))
    }
}

#[async_trait]
impl RemoteJobClient for HttpJobClient {
    async fn login(&self, username: &str, password: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/login/"))
            .json(&Credentials { username, password })
            .send()
            .await
            .map_err(|err| SweepError::Request(format!("login failed: {}", err)))?;
        check_status(response).await?;
        Ok(())
    }

    async fn fetch_params(&self, asr_key: &str) -> Result<Vec<ParamDescriptor>> {
        let params: TestParams = self
            .get_json(&format!("/api/asr/executors/{}/params/", asr_key))
            .await?;
        Ok(params.test)
    }

    async fn fetch_metrics(&self) -> Result<Vec<MetricInfo>> {
        self.get_json("/api/asr/metrics/").await
    }

    async fn submit_job(&self, job: &Job) -> Result<JobHandle> {
        let response = self
            .client
            .post(self.url("/api/asr/jobs/"))
            .json(job)
            .send()
            .await
            .map_err(|err| SweepError::Request(format!("job submission failed: {}", err)))?;
        let response = check_status(response).await?;
        response
            .json::<JobHandle>()
            .await
            .map_err(|err| SweepError::Parse(format!("job submission response: {}", err)))
    }

    async fn fetch_result(&self, step_id: &str, kind: StepKind) -> Result<JobResult> {
        let payload: Value = self
            .get_json(&format!("/api/asr/jobs/result/{}/", step_id))
            .await?;
        match kind {
            StepKind::Test => JobResult::from_test_payload(&payload),
            StepKind::Measure => JobResult::from_measure_payload(&payload),
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SweepError::from_status(status.as_u16(), body.trim()))
}

fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}
