#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use asr_sweep::{
    Job, JobHandle, JobResult, MetricInfo, ParamDescriptor, RemoteJobClient, StepKind, SweepError,
};

type Responder = Box<dyn Fn(&Job, StepKind, u32) -> Result<JobResult, SweepError> + Send + Sync>;
type SubmitFilter = Box<dyn Fn(&Job) -> bool + Send + Sync>;

/// In-memory stand-in for the ASR service. Results are produced by a
/// responder that sees the submitted job, the step kind and the 1-based
/// poll attempt for that step.
pub struct ScriptedClient {
    params: Vec<ParamDescriptor>,
    metrics: Vec<MetricInfo>,
    login_fails: bool,
    responder: Responder,
    rejects: SubmitFilter,
    state: Mutex<ClientState>,
}

#[derive(Default)]
struct ClientState {
    logins: usize,
    last_username: Option<String>,
    metric_fetches: usize,
    submitted: Vec<Job>,
    steps: BTreeMap<String, (usize, StepKind)>,
    polls: BTreeMap<String, u32>,
}

impl ScriptedClient {
    pub fn new(params: Vec<ParamDescriptor>) -> Self {
        Self {
            params,
            metrics: Vec::new(),
            login_fails: false,
            responder: Box::new(|_, _, _| Ok(JobResult::default())),
            rejects: Box::new(|_| false),
            state: Mutex::new(ClientState::default()),
        }
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&Job, StepKind, u32) -> Result<JobResult, SweepError> + Send + Sync + 'static,
    {
        self.responder = Box::new(responder);
        self
    }

    pub fn rejecting<F>(mut self, rejects: F) -> Self
    where
        F: Fn(&Job) -> bool + Send + Sync + 'static,
    {
        self.rejects = Box::new(rejects);
        self
    }

    pub fn with_metrics(mut self, keys: &[&str]) -> Self {
        self.metrics = keys
            .iter()
            .map(|key| MetricInfo {
                key: key.to_string(),
                title: key.to_uppercase(),
            })
            .collect();
        self
    }

    pub fn failing_login(mut self) -> Self {
        self.login_fails = true;
        self
    }

    pub fn submitted(&self) -> Vec<Job> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn logins(&self) -> usize {
        self.state.lock().unwrap().logins
    }

    pub fn last_username(&self) -> Option<String> {
        self.state.lock().unwrap().last_username.clone()
    }

    pub fn metric_fetches(&self) -> usize {
        self.state.lock().unwrap().metric_fetches
    }

    pub fn total_polls(&self) -> u32 {
        self.state.lock().unwrap().polls.values().sum()
    }

    /// Registers a job directly, for poller tests that skip submission.
    pub fn register(&self, job: Job) -> JobHandle {
        let mut state = self.state.lock().unwrap();
        register_job(&mut state, job)
    }
}

fn register_job(state: &mut ClientState, job: Job) -> JobHandle {
    let job_index = state.submitted.len();
    let mut steps = Vec::new();
    for step in &job.steps {
        let id = format!("job-{}-step-{}", job_index, step.index);
        state.steps.insert(id.clone(), (job_index, step.kind));
        steps.push(id);
    }
    state.submitted.push(job);
    JobHandle {
        id: format!("job-{}", job_index),
        steps,
    }
}

#[async_trait]
impl RemoteJobClient for ScriptedClient {
    async fn login(&self, username: &str, _password: &str) -> Result<(), SweepError> {
        let mut state = self.state.lock().unwrap();
        state.logins += 1;
        state.last_username = Some(username.to_string());
        drop(state);
        if self.login_fails {
            return Err(SweepError::Transient {
                status: 403,
                detail: "bad credentials".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_params(&self, _asr_key: &str) -> Result<Vec<ParamDescriptor>, SweepError> {
        Ok(self.params.clone())
    }

    async fn fetch_metrics(&self) -> Result<Vec<MetricInfo>, SweepError> {
        self.state.lock().unwrap().metric_fetches += 1;
        Ok(self.metrics.clone())
    }

    async fn submit_job(&self, job: &Job) -> Result<JobHandle, SweepError> {
        if (self.rejects)(job) {
            return Err(SweepError::Status {
                status: 500,
                detail: "job rejected".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        Ok(register_job(&mut state, job.clone()))
    }

    async fn fetch_result(&self, step_id: &str, kind: StepKind) -> Result<JobResult, SweepError> {
        let (job, attempt) = {
            let mut state = self.state.lock().unwrap();
            let (job_index, _) = *state
                .steps
                .get(step_id)
                .ok_or_else(|| SweepError::from_status(404, "unknown step"))?;
            let counter = state.polls.entry(step_id.to_string()).or_insert(0);
            *counter += 1;
            let attempt = *counter;
            (state.submitted[job_index].clone(), attempt)
        };
        (self.responder)(&job, kind, attempt)
    }
}

pub fn not_ready() -> SweepError {
    SweepError::from_status(404, "result not ready")
}

pub fn metrics(entries: &[(&str, &str)]) -> JobResult {
    JobResult::new(
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    )
}

/// The value the job's test step assigns to `key`.
pub fn configured(job: &Job, key: &str) -> String {
    job.steps[0].config.get(key).cloned().unwrap_or_default()
}
