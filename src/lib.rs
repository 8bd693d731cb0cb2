pub mod aggregate;
pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod overrides;
pub mod poll;
pub mod range;
pub mod report;

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub use aggregate::{AggregatedRecord, TrialAggregator};
pub use client::{HttpJobClient, JobHandle, JobResult, MetricInfo, RemoteJobClient};
pub use error::{Result, SweepError};
pub use job::{Job, JobBuilder, Step, StepKind};
pub use orchestrator::{ExperimentOrchestrator, ParameterPlan, SweepPlan, SweepSummary};
pub use poll::{PollOutcome, PollScheduler};
pub use report::ReportWriter;

/// The model selector is a parameter of every executor but never worth sweeping.
pub const MODEL_NAME_KEY: &str = "modelName";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParamType {
    Int,
    Double,
    Select,
    Boolean,
    String,
    Other(String),
}

impl ParamType {
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "int" => ParamType::Int,
            "double" | "float" => ParamType::Double,
            "select" => ParamType::Select,
            "boolean" | "bool" => ParamType::Boolean,
            "string" => ParamType::String,
            _ => ParamType::Other(value.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ParamType::Int => "int",
            ParamType::Double => "double",
            ParamType::Select => "select",
            ParamType::Boolean => "boolean",
            ParamType::String => "string",
            ParamType::Other(raw) => raw,
        }
    }
}

impl From<String> for ParamType {
    fn from(value: String) -> Self {
        ParamType::from_str(&value)
    }
}

impl From<ParamType> for String {
    fn from(value: ParamType) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamOption {
    pub title: String,
    pub key: String,
}

/// One tunable parameter of an ASR executor, as advertised by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub key: String,
    #[serde(rename = "paramType", alias = "type")]
    pub param_type: ParamType,
    #[serde(rename = "defaultValue", default, deserialize_with = "scalar_string")]
    pub default_value: String,
    #[serde(default)]
    pub options: Option<Vec<ParamOption>>,
}

impl ParamDescriptor {
    pub fn new(key: &str, param_type: ParamType, default_value: &str) -> Self {
        Self {
            key: key.to_string(),
            param_type,
            default_value: default_value.to_string(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: Vec<ParamOption>) -> Self {
        self.options = Some(options);
        self
    }

    /// Free-form strings and the model selector are left at their defaults.
    pub fn is_sweepable(&self) -> bool {
        self.param_type != ParamType::String && self.key != MODEL_NAME_KEY
    }
}

/// A single point of a parameter sweep. The variant always matches the
/// owning descriptor's type.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateValue {
    Int(i64),
    Real(f64),
    Select(String),
    Bool(bool),
}

impl fmt::Display for CandidateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateValue::Int(value) => write!(f, "{}", value),
            CandidateValue::Real(value) => {
                if value.is_finite() && value.fract() == 0.0 {
                    write!(f, "{:.1}", value)
                } else {
                    write!(f, "{}", value)
                }
            }
            CandidateValue::Select(value) => f.write_str(value),
            CandidateValue::Bool(value) => write!(f, "{}", value),
        }
    }
}

/// Accepts strings, numbers and booleans and keeps their textual form.
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(text) => Ok(text),
        serde_json::Value::Number(number) => Ok(number.to_string()),
        serde_json::Value::Bool(flag) => Ok(flag.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar default value, got {}",
            other
        ))),
    }
}
