use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::aggregate::TrialAggregator;
use crate::client::RemoteJobClient;
use crate::error::Result;
use crate::job::JobBuilder;
use crate::poll::{PollOutcome, PollScheduler};
use crate::range::ParamRangeGenerator;
use crate::report::ReportWriter;
use crate::{CandidateValue, ParamDescriptor, ParamType};

/// Everything a sweep needs besides the remote client.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub asr_key: String,
    pub experiment_count: u32,
    /// Extra runs per candidate value; each value is tried `repeat_count + 1` times.
    pub repeat_count: u32,
    pub samples: Vec<String>,
    pub excluded: HashSet<String>,
    pub predefined: BTreeMap<String, String>,
    pub results_dir: PathBuf,
    pub measurement_step_supported: bool,
    pub metrics: Vec<String>,
    pub credentials: Option<(String, String)>,
}

impl SweepPlan {
    pub fn new(asr_key: &str, experiment_count: u32, results_dir: PathBuf) -> Self {
        Self {
            asr_key: asr_key.to_string(),
            experiment_count,
            repeat_count: 1,
            samples: Vec::new(),
            excluded: HashSet::new(),
            predefined: BTreeMap::new(),
            results_dir,
            measurement_step_supported: false,
            metrics: Vec::new(),
            credentials: None,
        }
    }

    pub fn trials_per_value(&self) -> u32 {
        self.repeat_count.saturating_add(1)
    }
}

/// Candidate values of one eligible parameter, without running anything.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterPlan {
    pub key: String,
    pub param_type: ParamType,
    pub values: Vec<CandidateValue>,
}

#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    pub reports: Vec<PathBuf>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

pub struct ExperimentOrchestrator<C> {
    client: C,
    plan: SweepPlan,
    poller: PollScheduler,
}

impl<C: RemoteJobClient> ExperimentOrchestrator<C> {
    pub fn new(client: C, plan: SweepPlan, poller: PollScheduler) -> Self {
        Self {
            client,
            plan,
            poller,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    pub fn into_client(self) -> C {
        self.client
    }

    /// Runs the whole sweep: every eligible parameter, every candidate value,
    /// `repeat_count + 1` trials per value, one report per parameter.
    pub async fn run(&self) -> Result<SweepSummary> {
        self.login().await;

        let descriptors = self.client.fetch_params(&self.plan.asr_key).await?;
        info!(
            asr = %self.plan.asr_key,
            params = descriptors.len(),
            "fetched executor parameters"
        );

        let metrics = self.resolve_metrics().await?;
        let builder = JobBuilder::new(
            self.plan.asr_key.clone(),
            descriptors.clone(),
            self.plan.predefined.clone(),
            self.plan.samples.clone(),
            metrics,
        );
        let generator = ParamRangeGenerator::new(self.plan.experiment_count);

        let mut summary = SweepSummary::default();
        for descriptor in &descriptors {
            if !self.is_eligible(descriptor) {
                summary.skipped.push(descriptor.key.clone());
                continue;
            }

            match self.sweep_parameter(&builder, &generator, descriptor).await {
                Ok(path) => {
                    info!(param = %descriptor.key, path = %path.display(), "report written");
                    summary.reports.push(path);
                }
                Err(err) => {
                    warn!(param = %descriptor.key, error = %err, "parameter sweep failed");
                    summary.failed.push(descriptor.key.clone());
                }
            }
        }

        info!(
            reports = summary.reports.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "sweep finished"
        );
        Ok(summary)
    }

    /// Lists what `run` would test, without submitting any job.
    pub async fn plan_candidates(&self) -> Result<Vec<ParameterPlan>> {
        let descriptors = self.client.fetch_params(&self.plan.asr_key).await?;
        let generator = ParamRangeGenerator::new(self.plan.experiment_count);

        let mut plans = Vec::new();
        for descriptor in descriptors.iter().filter(|d| self.is_eligible(d)) {
            match generator.generate(descriptor) {
                Ok(values) => plans.push(ParameterPlan {
                    key: descriptor.key.clone(),
                    param_type: descriptor.param_type.clone(),
                    values,
                }),
                Err(err) => warn!(param = %descriptor.key, error = %err, "cannot build candidates"),
            }
        }
        Ok(plans)
    }

    pub fn is_eligible(&self, descriptor: &ParamDescriptor) -> bool {
        if !descriptor.is_sweepable() {
            debug!(param = %descriptor.key, "not sweepable");
            return false;
        }
        if let ParamType::Other(kind) = &descriptor.param_type {
            debug!(param = %descriptor.key, kind = %kind, "unsupported parameter type");
            return false;
        }
        if self.plan.excluded.contains(&descriptor.key) {
            info!(param = %descriptor.key, "parameter is excluded");
            return false;
        }
        true
    }

    /// Best effort: without configured credentials the attempt is made with
    /// empty ones and a rejection only costs a warning.
    async fn login(&self) {
        let (username, password) = self
            .plan
            .credentials
            .as_ref()
            .map(|(username, password)| (username.as_str(), password.as_str()))
            .unwrap_or(("", ""));
        match self.client.login(username, password).await {
            Ok(()) => info!(username = %username, "logged in"),
            Err(err) => warn!(error = %err, "login failed, continuing unauthenticated"),
        }
    }

    async fn resolve_metrics(&self) -> Result<Vec<String>> {
        if !self.plan.measurement_step_supported {
            return Ok(Vec::new());
        }
        if !self.plan.metrics.is_empty() {
            return Ok(self.plan.metrics.clone());
        }
        let metrics = self.client.fetch_metrics().await?;
        Ok(metrics.into_iter().map(|metric| metric.key).collect())
    }

    async fn sweep_parameter(
        &self,
        builder: &JobBuilder,
        generator: &ParamRangeGenerator,
        descriptor: &ParamDescriptor,
    ) -> Result<PathBuf> {
        let values = generator.generate(descriptor)?;
        info!(
            param = %descriptor.key,
            kind = descriptor.param_type.label(),
            candidates = values.len(),
            "testing parameter"
        );

        let mut report = ReportWriter::new(
            &self.plan.results_dir,
            &self.plan.asr_key,
            &descriptor.key,
        );
        for value in values {
            info!(param = %descriptor.key, value = %value, "testing value");
            let mut aggregator = TrialAggregator::new(value.clone());
            if let Err(err) = self
                .run_trials(builder, descriptor, &value, &mut aggregator)
                .await
            {
                warn!(
                    param = %descriptor.key,
                    value = %value,
                    error = %err,
                    "trial failed, moving to next value"
                );
            }
            report.append(aggregator.reduce());
        }

        report.flush().await
    }

    async fn run_trials(
        &self,
        builder: &JobBuilder,
        descriptor: &ParamDescriptor,
        value: &CandidateValue,
        aggregator: &mut TrialAggregator,
    ) -> Result<()> {
        let measured = self.plan.measurement_step_supported;
        for repeat in 0..self.plan.trials_per_value() {
            let job = builder.build(descriptor, value, measured);
            let handle = self.client.submit_job(&job).await?;
            debug!(job_id = %handle.id, repeat, "job submitted");

            match self.poller.await_job(&self.client, &handle, measured).await? {
                PollOutcome::Completed(result) => aggregator.record_result(&result),
                PollOutcome::Exhausted { attempts } => warn!(
                    param = %descriptor.key,
                    value = %value,
                    repeat,
                    attempts,
                    "gave up waiting for job result"
                ),
            }
        }
        Ok(())
    }
}
