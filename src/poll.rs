use std::time::Duration;
use tracing::debug;

use crate::client::{JobHandle, JobResult, RemoteJobClient};
use crate::config::PollingConfig;
use crate::error::Result;
use crate::job::StepKind;

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(JobResult),
    /// The retry budget ran out before the service had a result.
    Exhausted { attempts: u32 },
}

impl PollOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PollOutcome::Completed(_))
    }
}

#[derive(Debug)]
enum PollState {
    Waiting,
    Polling,
    RetryWait,
    Completed(JobResult),
    Exhausted,
}

/// Turns a submitted job into a result by waiting and polling with a bounded
/// number of retries.
#[derive(Debug, Clone, Copy)]
pub struct PollScheduler {
    timeout: Duration,
    retry_delay: Duration,
    measure_delay: Duration,
}

impl PollScheduler {
    pub fn new(timeout: Duration, retry_delay: Duration, measure_delay: Duration) -> Self {
        Self {
            timeout,
            retry_delay,
            measure_delay,
        }
    }

    pub fn from_config(timeout: Duration, config: &PollingConfig) -> Self {
        Self::new(
            timeout,
            Duration::from_millis(config.retry_timeout_ms),
            Duration::from_millis(config.measure_delay_ms),
        )
    }

    /// Failed polls tolerated before giving up: `ceil(timeout / retry_delay)`.
    pub fn retry_budget(&self) -> u32 {
        let timeout = self.timeout.as_millis();
        let retry = self.retry_delay.as_millis().max(1);
        u32::try_from(timeout.div_ceil(retry)).unwrap_or(u32::MAX)
    }

    /// Waits for a submitted job. For measured jobs the test step is awaited
    /// first and only the measure step's metrics are returned.
    pub async fn await_job<C>(&self, client: &C, handle: &JobHandle, measured: bool) -> Result<PollOutcome>
    where
        C: RemoteJobClient + ?Sized,
    {
        let test_step = handle.step_id(0)?;
        let test_outcome = self
            .await_step(client, test_step, StepKind::Test, self.retry_delay)
            .await?;
        if !measured || !test_outcome.is_completed() {
            return Ok(test_outcome);
        }
        let measure_step = handle.step_id(1)?;
        self.await_step(client, measure_step, StepKind::Measure, self.measure_delay)
            .await
    }

    pub async fn await_step<C>(
        &self,
        client: &C,
        step_id: &str,
        kind: StepKind,
        delay: Duration,
    ) -> Result<PollOutcome>
    where
        C: RemoteJobClient + ?Sized,
    {
        let budget = self.retry_budget();
        let mut retries = 0u32;
        let mut attempts = 0u32;
        let mut state = PollState::Waiting;

        loop {
            state = match state {
                PollState::Waiting => {
                    tokio::time::sleep(delay).await;
                    PollState::Polling
                }
                PollState::Polling => {
                    attempts += 1;
                    match client.fetch_result(step_id, kind).await {
                        Ok(result) => PollState::Completed(result),
                        Err(err) if err.is_transient() => {
                            debug!(step_id, attempt = attempts, error = %err, "result not ready");
                            retries += 1;
                            PollState::RetryWait
                        }
                        Err(err) => return Err(err),
                    }
                }
                PollState::RetryWait => {
                    if retries > budget {
                        PollState::Exhausted
                    } else {
                        PollState::Waiting
                    }
                }
                PollState::Completed(result) => {
                    debug!(step_id, attempts, metrics = result.metrics.len(), "step completed");
                    return Ok(PollOutcome::Completed(result));
                }
                PollState::Exhausted => return Ok(PollOutcome::Exhausted { attempts }),
            };
        }
    }
}
