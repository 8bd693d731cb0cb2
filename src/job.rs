use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CandidateValue, ParamDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Test,
    Measure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub index: usize,
    #[serde(rename = "stepType")]
    pub kind: StepKind,
    pub config: BTreeMap<String, String>,
    pub model_type: String,
    /// Upstream step reference. Left empty on submission; the service links a
    /// measure step to the step before it by index.
    #[serde(rename = "jobForModel")]
    pub upstream_step: Option<String>,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub asr_key: String,
    pub steps: Vec<Step>,
}

impl Job {
    pub fn has_measure_step(&self) -> bool {
        self.steps.iter().any(|step| step.kind == StepKind::Measure)
    }
}

/// Builds job payloads for one ASR executor. Everything except the tested
/// parameter and its value is fixed for the whole run.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    asr_key: String,
    descriptors: Vec<ParamDescriptor>,
    predefined: BTreeMap<String, String>,
    samples: Vec<String>,
    metrics: Vec<String>,
}

impl JobBuilder {
    pub fn new(
        asr_key: String,
        descriptors: Vec<ParamDescriptor>,
        predefined: BTreeMap<String, String>,
        samples: Vec<String>,
        metrics: Vec<String>,
    ) -> Self {
        Self {
            asr_key,
            descriptors,
            predefined,
            samples,
            metrics,
        }
    }

    pub fn descriptors(&self) -> &[ParamDescriptor] {
        &self.descriptors
    }

    pub fn build(
        &self,
        tested: &ParamDescriptor,
        value: &CandidateValue,
        measurement_required: bool,
    ) -> Job {
        let mut steps = vec![Step {
            index: 0,
            kind: StepKind::Test,
            config: self.step_config(tested, value),
            model_type: "default".to_string(),
            upstream_step: None,
            samples: self.samples.clone(),
        }];

        if measurement_required {
            steps.push(Step {
                index: 1,
                kind: StepKind::Measure,
                config: self.metrics_config(),
                model_type: "default".to_string(),
                upstream_step: None,
                samples: Vec::new(),
            });
        }

        Job {
            asr_key: self.asr_key.clone(),
            steps,
        }
    }

    pub fn step_config(
        &self,
        tested: &ParamDescriptor,
        value: &CandidateValue,
    ) -> BTreeMap<String, String> {
        self.descriptors
            .iter()
            .map(|descriptor| {
                let configured = if descriptor.key == tested.key {
                    value.to_string()
                } else {
                    self.predefined
                        .get(&descriptor.key)
                        .cloned()
                        .unwrap_or_else(|| descriptor.default_value.clone())
                };
                (descriptor.key.clone(), configured)
            })
            .collect()
    }

    fn metrics_config(&self) -> BTreeMap<String, String> {
        self.metrics
            .iter()
            .map(|metric| (metric.clone(), "true".to_string()))
            .collect()
    }
}
