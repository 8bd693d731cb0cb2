use std::collections::BTreeMap;

use asr_sweep::{
    CandidateValue, JobBuilder, JobHandle, JobResult, ParamDescriptor, ParamType, StepKind,
    SweepError,
};

fn descriptors() -> Vec<ParamDescriptor> {
    vec![
        ParamDescriptor::new("beamWidth", ParamType::Int, "10"),
        ParamDescriptor::new("lmWeight", ParamType::Double, "0.5"),
        ParamDescriptor::new("modelName", ParamType::String, "en-us"),
    ]
}

fn builder(metrics: &[&str]) -> JobBuilder {
    let mut predefined = BTreeMap::new();
    predefined.insert("lmWeight".to_string(), "0.8".to_string());
    predefined.insert("beamWidth".to_string(), "999".to_string());
    JobBuilder::new(
        "kaldi".to_string(),
        descriptors(),
        predefined,
        vec!["ds/a".to_string(), "ds/b".to_string()],
        metrics.iter().map(|metric| metric.to_string()).collect(),
    )
}

#[test]
fn tested_parameter_takes_candidate_and_others_take_overrides_or_defaults() {
    let descriptors = descriptors();
    let job = builder(&[]).build(&descriptors[0], &CandidateValue::Int(34), false);

    assert_eq!(job.asr_key, "kaldi");
    assert_eq!(job.steps.len(), 1);
    let config = &job.steps[0].config;
    assert_eq!(config["beamWidth"], "34");
    assert_eq!(config["lmWeight"], "0.8");
    assert_eq!(config["modelName"], "en-us");
    assert_eq!(job.steps[0].samples, vec!["ds/a", "ds/b"]);
    assert!(!job.has_measure_step());
}

#[test]
fn measured_job_appends_metrics_step() {
    let descriptors = descriptors();
    let job = builder(&["wer", "cer"]).build(&descriptors[1], &CandidateValue::Real(1.0), true);

    assert_eq!(job.steps.len(), 2);
    assert_eq!(job.steps[0].config["lmWeight"], "1.0");
    let measure = &job.steps[1];
    assert_eq!(measure.index, 1);
    assert_eq!(measure.kind, StepKind::Measure);
    assert!(measure.samples.is_empty());
    assert_eq!(measure.upstream_step, None);
    assert_eq!(
        measure.config.keys().cloned().collect::<Vec<_>>(),
        vec!["cer".to_string(), "wer".to_string()]
    );
}

#[test]
fn job_serializes_with_service_field_names() {
    let descriptors = descriptors();
    let job = builder(&["wer"]).build(&descriptors[0], &CandidateValue::Int(1), true);
    let json = serde_json::to_value(&job).unwrap();

    assert_eq!(json["asrKey"], "kaldi");
    assert_eq!(json["steps"][0]["stepType"], "test");
    assert_eq!(json["steps"][0]["modelType"], "default");
    assert_eq!(json["steps"][0]["config"]["beamWidth"], "1");
    assert_eq!(json["steps"][1]["stepType"], "measure");
    assert!(json["steps"][1]["jobForModel"].is_null());
    assert_eq!(json["steps"][1]["samples"], serde_json::json!([]));
}

#[test]
fn job_handle_reads_step_ids() {
    let handle: JobHandle = serde_json::from_value(serde_json::json!({
        "id": "j1",
        "steps": [{"id": "s1"}, {"id": 42}]
    }))
    .unwrap();

    assert_eq!(handle.step_id(0).unwrap(), "s1");
    assert_eq!(handle.step_id(1).unwrap(), "42");
    assert!(matches!(
        handle.step_id(2),
        Err(SweepError::MalformedResponse(_))
    ));
}

#[test]
fn test_payload_is_flat_metric_mapping() {
    let result = JobResult::from_test_payload(&serde_json::json!({
        "result": {"wer": "0.21", "cer": 0.08, "details": {"x": 1}}
    }))
    .unwrap();

    assert_eq!(result.metrics.get("wer").map(String::as_str), Some("0.21"));
    assert_eq!(result.metrics.get("cer").map(String::as_str), Some("0.08"));
    assert!(!result.metrics.contains_key("details"));
}

#[test]
fn non_object_test_payload_is_completion_without_metrics() {
    let transcripts = JobResult::from_test_payload(&serde_json::json!({
        "result": [{"sample": "ds/a", "text": "hello"}]
    }))
    .unwrap();
    let status = JobResult::from_test_payload(&serde_json::json!({"result": "done"})).unwrap();

    assert!(transcripts.metrics.is_empty());
    assert!(status.metrics.is_empty());
}

#[test]
fn measure_payload_uses_first_overall_record() {
    let result = JobResult::from_measure_payload(&serde_json::json!({
        "result": {"overall": [
            {"result": {"wer": "0.3"}},
            {"result": {"wer": "0.9"}}
        ]}
    }))
    .unwrap();

    assert_eq!(result.metrics.get("wer").map(String::as_str), Some("0.3"));

    let missing = JobResult::from_measure_payload(&serde_json::json!({"result": {"wer": "0.3"}}));
    assert!(matches!(missing, Err(SweepError::MalformedResponse(_))));
}

#[test]
fn client_errors_are_transient_and_server_errors_are_not() {
    assert!(SweepError::from_status(404, "pending").is_transient());
    assert!(SweepError::from_status(400, "pending").is_transient());
    assert!(!SweepError::from_status(500, "boom").is_transient());
    assert!(!SweepError::Request("connection refused".to_string()).is_transient());
}
