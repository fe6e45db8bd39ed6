//! Tracking a built pipeline end to end.
//!
//! The run is strictly sequential: ensure the experiment, open a run, log
//! params, the model and the dictionaries, close the run, then register the
//! model and check it with an inference pass. Registration and inference
//! failures are logged and collected so the experiment is still described.

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::config::{MedpipeConfig, RulerConfig, TrackingConfig};
use crate::pipeline::{Entity, FactoryRegistry, Pipeline};
use crate::tracking::{
    Experiment, ModelUri, ModelVersion, NewExperiment, RunInfo, RunStatus, Tracker,
};
use crate::Result;

/// What a workflow run produced
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub experiment_id: String,
    pub run_id: String,
    pub model_uri: ModelUri,
    /// Registered version, unless registration failed
    pub registered: Option<ModelVersion>,
    /// Entities from the inference pass, unless skipped or failed
    pub predictions: Option<Vec<Entity>>,
    /// Experiment as described after the run, unless the lookup failed
    pub experiment: Option<Experiment>,
    /// Non-fatal failures, in the order they happened
    pub errors: Vec<String>,
}

/// Create the configured experiment, or fetch it if it already exists
#[instrument(skip(tracker, config), fields(experiment = %config.experiment_name))]
pub async fn ensure_experiment(tracker: &dyn Tracker, config: &TrackingConfig) -> Result<String> {
    let mut request =
        NewExperiment::new(&config.experiment_name).with_tags(config.experiment_tags.clone());
    if let Some(location) = &config.artifact_location {
        request = request.with_artifact_location(location);
    }

    match tracker.create_experiment(&request).await {
        Ok(id) => {
            info!(experiment_id = %id, "Created experiment");
            Ok(id)
        }
        Err(e) if e.is_already_exists() => {
            let existing = tracker
                .get_experiment_by_name(&config.experiment_name)
                .await?
                .ok_or(e)?;
            info!(
                experiment_id = %existing.experiment_id,
                "Experiment already exists, reusing it"
            );
            Ok(existing.experiment_id)
        }
        Err(e) => Err(e.into()),
    }
}

/// Log params, model and dictionaries into an open run.
async fn log_into_run(
    tracker: &dyn Tracker,
    run: &RunInfo,
    pipeline: &Pipeline,
    config: &TrackingConfig,
    rulers: &[RulerConfig],
) -> Result<ModelUri> {
    for (key, value) in &config.params {
        tracker.log_param(&run.run_id, key, value).await?;
    }

    let model_uri = tracker
        .log_model(run, pipeline, &config.artifact_path)
        .await?;
    info!(model_uri = %model_uri, "Logged model");

    if config.log_dictionaries {
        for ruler in rulers {
            if ruler.patterns_path.is_file() {
                tracker.log_artifact(run, &ruler.patterns_path).await?;
            } else {
                warn!(
                    ruler = %ruler.name,
                    path = %ruler.patterns_path.display(),
                    "Dictionary not found, not logging it"
                );
            }
        }
    }

    Ok(model_uri)
}

/// Open a run, log everything into it and close it.
///
/// The run is closed as `FAILED` if any logging step fails.
pub async fn log_run(
    tracker: &dyn Tracker,
    experiment_id: &str,
    pipeline: &Pipeline,
    config: &TrackingConfig,
    rulers: &[RulerConfig],
) -> Result<(RunInfo, ModelUri)> {
    let run = tracker.create_run(experiment_id).await?;
    info!(run_id = %run.run_id, experiment_id, "Started run");

    match log_into_run(tracker, &run, pipeline, config, rulers).await {
        Ok(model_uri) => {
            tracker.finish_run(&run.run_id, RunStatus::Finished).await?;
            Ok((run, model_uri))
        }
        Err(e) => {
            if let Err(finish) = tracker.finish_run(&run.run_id, RunStatus::Failed).await {
                warn!(run_id = %run.run_id, error = %finish, "Could not mark run as failed");
            }
            Err(e)
        }
    }
}

/// Load a registered model and run it over `text`
pub async fn predict(
    tracker: &dyn Tracker,
    model_uri: &ModelUri,
    registry: &FactoryRegistry,
    text: &str,
) -> Result<Vec<Entity>> {
    let pipeline = tracker.load_model(model_uri, registry).await?;
    let doc = pipeline.process(text)?;
    info!(
        model_uri = %model_uri,
        entities = doc.ents().len(),
        "Ran inference"
    );
    Ok(doc.ents().to_vec())
}

/// Model URI for the inference pass: the pinned version, else the one just registered
fn inference_uri(config: &MedpipeConfig, registered: &ModelVersion) -> Option<ModelUri> {
    let name = &config.tracking.registered_model_name;
    match config.inference.model_version {
        Some(version) => Some(ModelUri::registered(name, version)),
        None => registered
            .version_number()
            .map(|version| ModelUri::registered(name, version)),
    }
}

/// Track, register and check `pipeline` as configured
pub async fn run_workflow(
    tracker: &dyn Tracker,
    pipeline: &Pipeline,
    config: &MedpipeConfig,
    registry: &FactoryRegistry,
) -> Result<WorkflowOutcome> {
    let tracking = &config.tracking;
    let experiment_id = ensure_experiment(tracker, tracking).await?;
    let (run, model_uri) =
        log_run(tracker, &experiment_id, pipeline, tracking, &config.rulers.0).await?;

    let mut errors = Vec::new();

    let registered = match tracker
        .register_model(&model_uri, &tracking.registered_model_name)
        .await
    {
        Ok(version) => {
            info!(
                model = %version.name,
                version = %version.version,
                "Registered model"
            );
            Some(version)
        }
        Err(e) => {
            error!(error = %e, model_uri = %model_uri, "Model registration failed");
            errors.push(format!("registration: {}", e));
            None
        }
    };

    let mut predictions = None;
    if config.inference.enabled
        && let Some(version) = &registered
    {
        match inference_uri(config, version) {
            Some(uri) => {
                match predict(tracker, &uri, registry, &config.inference.text).await {
                    Ok(entities) => predictions = Some(entities),
                    Err(e) => {
                        error!(error = %e, model_uri = %uri, "Inference failed");
                        errors.push(format!("inference: {}", e));
                    }
                }
            }
            None => {
                error!(version = %version.version, "Registered version is not numeric");
                errors.push(format!(
                    "inference: cannot address version '{}'",
                    version.version
                ));
            }
        }
    }

    let experiment = match tracker.get_experiment(&experiment_id).await {
        Ok(experiment) => {
            info!(
                experiment_id = %experiment.experiment_id,
                name = %experiment.name,
                artifact_location = experiment.artifact_location.as_deref().unwrap_or("-"),
                lifecycle_stage = experiment.lifecycle_stage.as_deref().unwrap_or("-"),
                "Experiment"
            );
            Some(experiment)
        }
        Err(e) => {
            error!(error = %e, experiment_id = %experiment_id, "Could not describe experiment");
            errors.push(format!("experiment: {}", e));
            None
        }
    };

    Ok(WorkflowOutcome {
        experiment_id,
        run_id: run.run_id,
        model_uri,
        registered,
        predictions,
        experiment,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::tracking::{MockTracker, RESOURCE_ALREADY_EXISTS, TrackingError};
    use mockall::Sequence;
    use mockall::predicate::eq;

    fn run_info() -> RunInfo {
        RunInfo {
            run_id: "run-1".to_string(),
            experiment_id: "7".to_string(),
            run_name: None,
            status: RunStatus::Running,
            start_time: Some(1_700_000_000_000),
            end_time: None,
            artifact_uri: "mlflow-artifacts:/7/run-1/artifacts".to_string(),
            lifecycle_stage: Some("active".to_string()),
        }
    }

    fn experiment(id: &str, name: &str) -> Experiment {
        Experiment {
            experiment_id: id.to_string(),
            name: name.to_string(),
            artifact_location: Some("./mlruns".to_string()),
            lifecycle_stage: Some("active".to_string()),
            creation_time: None,
            last_update_time: None,
            tags: Default::default(),
        }
    }

    fn version(number: &str) -> ModelVersion {
        ModelVersion {
            name: "combined".to_string(),
            version: number.to_string(),
            source: None,
            run_id: Some("run-1".to_string()),
            status: Some("READY".to_string()),
            current_stage: None,
            creation_timestamp: None,
        }
    }

    fn already_exists() -> TrackingError {
        TrackingError::Api {
            status: 400,
            code: RESOURCE_ALREADY_EXISTS.to_string(),
            message: "Experiment already exists".to_string(),
        }
    }

    fn config() -> MedpipeConfig {
        ConfigBuilder::new()
            .with_rulers(vec![])
            .with_experiment_name("exp")
            .with_registered_model_name("combined")
            .build()
            .unwrap()
    }

    fn tracker_for_happy_path(registered: &'static str) -> MockTracker {
        let mut tracker = MockTracker::new();
        tracker
            .expect_create_experiment()
            .returning(|_| Ok("7".to_string()));
        tracker
            .expect_create_run()
            .with(eq("7"))
            .returning(|_| Ok(run_info()));
        tracker
            .expect_log_param()
            .with(eq("run-1"), eq("iterations"), eq("10"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        tracker
            .expect_log_model()
            .returning(|run, _, path| Ok(ModelUri::run(&run.run_id, path)));
        tracker
            .expect_finish_run()
            .with(eq("run-1"), eq(RunStatus::Finished))
            .times(1)
            .returning(|_, _| Ok(()));
        tracker
            .expect_register_model()
            .returning(move |_, _| Ok(version(registered)));
        tracker
            .expect_get_experiment()
            .with(eq("7"))
            .returning(|id| Ok(experiment(id, "exp")));
        tracker
    }

    #[tokio::test]
    async fn test_existing_experiment_is_reused() {
        let mut tracker = MockTracker::new();
        tracker
            .expect_create_experiment()
            .times(1)
            .returning(|_| Err(already_exists()));
        tracker
            .expect_get_experiment_by_name()
            .with(eq("exp"))
            .times(1)
            .returning(|name| Ok(Some(experiment("42", name))));

        let id = ensure_experiment(&tracker, &config().tracking).await.unwrap();
        assert_eq!(id, "42");
    }

    #[tokio::test]
    async fn test_other_create_errors_propagate() {
        let mut tracker = MockTracker::new();
        tracker.expect_create_experiment().returning(|_| {
            Err(TrackingError::Http {
                status: 503,
                body: "unavailable".to_string(),
            })
        });
        tracker.expect_get_experiment_by_name().never();

        assert!(ensure_experiment(&tracker, &config().tracking).await.is_err());
    }

    #[tokio::test]
    async fn test_workflow_registers_and_predicts() {
        let mut tracker = tracker_for_happy_path("3");
        tracker
            .expect_load_model()
            .withf(|uri, _| *uri == ModelUri::registered("combined", 3))
            .times(1)
            .returning(|_, _| {
                let mut nlp = Pipeline::blank("en");
                let ner = crate::components::PatternRecognizer::new(
                    crate::pipeline::ComponentConfig::from_value(serde_json::json!({
                        "patterns": [{"label": "CHEMICAL", "regex": r"\blidocaine\b"}]
                    })),
                )
                .unwrap();
                nlp.add_pipe("ner", Box::new(ner), crate::pipeline::PipePosition::Last)
                    .unwrap();
                Ok(nlp)
            });

        let registry = FactoryRegistry::with_builtins();
        let outcome = run_workflow(&tracker, &Pipeline::blank("en"), &config(), &registry)
            .await
            .unwrap();

        assert_eq!(outcome.run_id, "run-1");
        assert_eq!(
            outcome.model_uri,
            ModelUri::run("run-1", "spacy_combined_model_experiment_11")
        );
        assert_eq!(outcome.registered.unwrap().version, "3");
        let predictions = outcome.predictions.unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].label, "CHEMICAL");
        assert!(outcome.experiment.is_some());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_pinned_inference_version() {
        let mut tracker = tracker_for_happy_path("3");
        tracker
            .expect_load_model()
            .withf(|uri, _| *uri == ModelUri::registered("combined", 1))
            .times(1)
            .returning(|_, _| Ok(Pipeline::blank("en")));

        let config = ConfigBuilder::from_config(config())
            .with_model_version(1)
            .build()
            .unwrap();
        let outcome = run_workflow(
            &tracker,
            &Pipeline::blank("en"),
            &config,
            &FactoryRegistry::with_builtins(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.predictions, Some(vec![]));
    }

    #[tokio::test]
    async fn test_registration_failure_is_not_fatal() {
        let mut tracker = MockTracker::new();
        tracker
            .expect_create_experiment()
            .returning(|_| Ok("7".to_string()));
        tracker.expect_create_run().returning(|_| Ok(run_info()));
        tracker.expect_log_param().returning(|_, _, _| Ok(()));
        tracker
            .expect_log_model()
            .returning(|run, _, path| Ok(ModelUri::run(&run.run_id, path)));
        tracker.expect_finish_run().returning(|_, _| Ok(()));
        tracker.expect_register_model().returning(|_, _| {
            Err(TrackingError::Http {
                status: 500,
                body: "boom".to_string(),
            })
        });
        tracker.expect_load_model().never();
        tracker
            .expect_get_experiment()
            .returning(|id| Ok(experiment(id, "exp")));

        let outcome = run_workflow(
            &tracker,
            &Pipeline::blank("en"),
            &config(),
            &FactoryRegistry::with_builtins(),
        )
        .await
        .unwrap();
        assert!(outcome.registered.is_none());
        assert!(outcome.predictions.is_none());
        assert!(outcome.experiment.is_some());
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("registration"));
    }

    #[tokio::test]
    async fn test_failed_logging_marks_run_failed() {
        let mut tracker = MockTracker::new();
        let mut seq = Sequence::new();
        tracker
            .expect_create_run()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(run_info()));
        tracker
            .expect_log_param()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        tracker
            .expect_log_model()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(TrackingError::Response("bad upload".to_string())));
        tracker
            .expect_finish_run()
            .with(eq("run-1"), eq(RunStatus::Failed))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let config = config();
        let result = log_run(
            &tracker,
            "7",
            &Pipeline::blank("en"),
            &config.tracking,
            &[],
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dictionaries_logged_as_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let icd = dir.path().join("icd.jsonl");
        std::fs::write(&icd, r#"{"label": "ICD", "pattern": "flu"}"#).unwrap();
        let rulers = vec![
            RulerConfig::new("icd_ruler", &icd),
            RulerConfig::new("medra_ruler", dir.path().join("missing.jsonl")),
        ];

        let mut tracker = MockTracker::new();
        tracker.expect_create_run().returning(|_| Ok(run_info()));
        tracker.expect_log_param().returning(|_, _, _| Ok(()));
        tracker
            .expect_log_model()
            .returning(|run, _, path| Ok(ModelUri::run(&run.run_id, path)));
        let expected = icd.clone();
        tracker
            .expect_log_artifact()
            .withf(move |_, path| path == expected.as_path())
            .times(1)
            .returning(|_, _| Ok(()));
        tracker.expect_finish_run().returning(|_, _| Ok(()));

        let config = config();
        let (run, _) = log_run(
            &tracker,
            "7",
            &Pipeline::blank("en"),
            &config.tracking,
            &rulers,
        )
        .await
        .unwrap();
        assert_eq!(run.run_id, "run-1");
    }
}
