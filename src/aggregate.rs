use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

use crate::client::JobResult;
use crate::CandidateValue;

/// Collects metric samples across the repeats of one candidate value.
#[derive(Debug, Clone)]
pub struct TrialAggregator {
    value: CandidateValue,
    samples: BTreeMap<String, Vec<f64>>,
    trials: usize,
}

impl TrialAggregator {
    pub fn new(value: CandidateValue) -> Self {
        Self {
            value,
            samples: BTreeMap::new(),
            trials: 0,
        }
    }

    pub fn value(&self) -> &CandidateValue {
        &self.value
    }

    /// Number of completed trials fed in through `record_result`.
    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Returns false when the sample is not a finite number and was dropped.
    pub fn record(&mut self, metric: &str, sample: &str) -> bool {
        match sample.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => {
                self.samples
                    .entry(metric.to_string())
                    .or_default()
                    .push(value);
                true
            }
            _ => false,
        }
    }

    pub fn record_result(&mut self, result: &JobResult) {
        self.trials += 1;
        for (metric, sample) in &result.metrics {
            self.record(metric, sample);
        }
    }

    pub fn samples(&self, metric: &str) -> &[f64] {
        self.samples.get(metric).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn reduce(self) -> AggregatedRecord {
        let metric_averages = self
            .samples
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(metric, values)| (metric, mean(&values)))
            .collect();
        AggregatedRecord {
            tested_value: self.value.to_string(),
            metric_averages,
        }
    }
}

/// Averaged metrics for one candidate value; one report row.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub tested_value: String,
    pub metric_averages: BTreeMap<String, f64>,
}

impl AggregatedRecord {
    pub fn average(&self, metric: &str) -> Option<f64> {
        self.metric_averages.get(metric).copied()
    }
}

// Flat row: `testedValue` first, then metrics in key order.
impl Serialize for AggregatedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.metric_averages.len() + 1))?;
        map.serialize_entry("testedValue", &self.tested_value)?;
        for (metric, average) in &self.metric_averages {
            if metric != "testedValue" {
                map.serialize_entry(metric, average)?;
            }
        }
        map.end()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
