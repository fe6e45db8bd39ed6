//! MLflow client tests against a mock tracking server
//!
//! Tests cover:
//! - Experiment creation falling back to get-by-name
//! - Run logging, model logging and registration request shapes
//! - Artifact uploads through the mlflow-artifacts proxy
//! - Loading a registered model back and running it
//! - Loading a registered model through the artifact proxy
//! - Bearer and basic authentication headers
//! - Retries and search pagination

use medpipe::config::{ConfigBuilder, MedpipeConfig, RulerConfig, SAMPLE_TEXT};
use medpipe::pipeline::{ComponentConfig, FactoryRegistry, PipePosition, Pipeline};
use medpipe::components::PatternRecognizer;
use medpipe::tracking::{
    MLMODEL_FILE, MlflowClient, ModelUri, RetryPolicy, RunInfo, RunStatus, Tracker,
};
use medpipe::workflow::{build_combined_pipeline, ensure_experiment, run_workflow};
use serde_json::{Value, json};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(endpoint: &str) -> String {
    format!("/api/2.0/mlflow/{}", endpoint)
}

fn config(server: &MockServer, rulers: Vec<RulerConfig>) -> MedpipeConfig {
    let mut config = ConfigBuilder::new()
        .with_tracking_uri(server.uri())
        .with_rulers(rulers)
        .with_experiment_name("exp")
        .with_registered_model_name("combined")
        .with_artifact_path("model_path")
        .build()
        .unwrap();
    config.tracking.retry = RetryPolicy::none();
    config
}

fn client(config: &MedpipeConfig) -> MlflowClient {
    MlflowClient::new(&config.tracking).unwrap()
}

fn run_json(artifact_uri: &str) -> Value {
    json!({
        "run": {
            "info": {
                "run_id": "abc",
                "experiment_id": "7",
                "status": "RUNNING",
                "start_time": 1718000000000i64,
                "artifact_uri": artifact_uri,
                "lifecycle_stage": "active"
            },
            "data": {"params": [], "tags": []}
        }
    })
}

fn experiment_json(id: &str) -> Value {
    json!({
        "experiment": {
            "experiment_id": id,
            "name": "exp",
            "artifact_location": "./mlruns",
            "lifecycle_stage": "active",
            "creation_time": 1718000000000i64,
            "tags": [{"key": "env", "value": "dev"}]
        }
    })
}

fn ok_empty() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({}))
}

fn recognizer_pipeline() -> Pipeline {
    let mut nlp = Pipeline::blank("en").with_name("lg");
    let ner = PatternRecognizer::new(ComponentConfig::from_value(json!({
        "patterns": [{"label": "CHEMICAL", "regex": r"\b(lidocaine|bupivacaine)\b"}]
    })))
    .unwrap();
    nlp.add_pipe("ner", Box::new(ner), PipePosition::Last)
        .unwrap();
    nlp
}

fn dictionary(dir: &Path) -> RulerConfig {
    let path = dir.join("icd.jsonl");
    std::fs::write(
        &path,
        json!({"label": "ICD", "pattern": "methemoglobinemia"}).to_string(),
    )
    .unwrap();
    RulerConfig::new("icd_ruler", path)
}

#[tokio::test]
async fn test_existing_experiment_falls_back_to_lookup() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(api("experiments/create")))
        .and(body_partial_json(json!({
            "name": "exp",
            "artifact_location": "./mlruns",
        })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_code": "RESOURCE_ALREADY_EXISTS",
            "message": "Experiment 'exp' already exists."
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(api("experiments/get-by-name")))
        .and(query_param("experiment_name", "exp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(experiment_json("5")))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server, vec![]);
    let id = ensure_experiment(&client(&config), &config.tracking)
        .await
        .unwrap();
    assert_eq!(id, "5");
}

#[tokio::test]
async fn test_unknown_experiment_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("experiments/get-by-name")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error_code": "RESOURCE_DOES_NOT_EXIST",
            "message": "Could not find experiment with name 'missing'"
        })))
        .mount(&server)
        .await;

    let config = config(&server, vec![]);
    let found = client(&config)
        .get_experiment_by_name("missing")
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_workflow_logs_registers_and_predicts() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let artifact_root = temp.path().join("mlruns").join("7").join("abc").join("artifacts");
    let artifact_uri = artifact_root.display().to_string();
    let source = format!("{}/model_path", artifact_uri);

    Mock::given(method("POST"))
        .and(path(api("experiments/create")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"experiment_id": "7"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("runs/create")))
        .and(body_partial_json(json!({"experiment_id": "7"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json(&artifact_uri)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("runs/log-parameter")))
        .and(body_partial_json(json!({"run_id": "abc", "key": "iterations", "value": "10"})))
        .respond_with(ok_empty())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("runs/set-tag")))
        .and(body_partial_json(json!({"key": "mlflow.log-model.history"})))
        .respond_with(ok_empty())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("runs/update")))
        .and(body_partial_json(json!({"run_id": "abc", "status": "FINISHED"})))
        .respond_with(ok_empty())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("registered-models/create")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_code": "RESOURCE_ALREADY_EXISTS",
            "message": "Registered Model (name=combined) already exists."
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("runs/get")))
        .and(query_param("run_id", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json(&artifact_uri)))
        .mount(&server)
        .await;

    let version = json!({
        "model_version": {
            "name": "combined",
            "version": "1",
            "source": source,
            "run_id": "abc",
            "status": "READY",
            "current_stage": "None",
            "creation_timestamp": 1718000000000i64
        }
    });
    Mock::given(method("POST"))
        .and(path(api("model-versions/create")))
        .and(body_partial_json(json!({"name": "combined", "source": source, "run_id": "abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(version.clone()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("model-versions/get")))
        .and(query_param("name", "combined"))
        .and(query_param("version", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(version))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("experiments/get")))
        .and(query_param("experiment_id", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(experiment_json("7")))
        .expect(1)
        .mount(&server)
        .await;

    let ruler = dictionary(temp.path());
    let config = config(&server, vec![ruler.clone()]);
    let registry = FactoryRegistry::with_builtins();
    let report = build_combined_pipeline(
        vec![recognizer_pipeline()],
        &config.pipeline,
        &config.rulers.0,
        &registry,
    )
    .unwrap();

    let tracker = client(&config);
    let outcome = run_workflow(&tracker, &report.pipeline, &config, &registry)
        .await
        .unwrap();

    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(outcome.model_uri, ModelUri::run("abc", "model_path"));
    assert_eq!(outcome.registered.as_ref().unwrap().version, "1");
    assert_eq!(outcome.experiment.as_ref().unwrap().name, "exp");

    // Model and dictionary landed in the run's artifact root
    assert!(artifact_root.join("model_path").join(MLMODEL_FILE).is_file());
    assert!(
        artifact_root
            .join("model_path")
            .join("model")
            .join("pipeline.json")
            .is_file()
    );
    assert!(artifact_root.join("icd.jsonl").is_file());

    let predictions = outcome.predictions.unwrap();
    let labelled: Vec<(&str, &str)> = predictions
        .iter()
        .map(|e| (e.text.as_str(), e.label.as_str()))
        .collect();
    assert!(labelled.contains(&("methemoglobinemia", "ICD")));
    assert!(labelled.contains(&("lidocaine", "CHEMICAL")));
    assert!(labelled.len() >= 4, "{:?}", labelled);
    assert!(SAMPLE_TEXT.contains("methemoglobinemia"));
}

#[tokio::test]
async fn test_log_model_uploads_through_artifact_proxy() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(
            r"^/api/2\.0/mlflow-artifacts/artifacts/7/abc/artifacts/model_path/.+$",
        ))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("runs/set-tag")))
        .respond_with(ok_empty())
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server, vec![]);
    let run: RunInfo = serde_json::from_value(
        run_json("mlflow-artifacts:/7/abc/artifacts")["run"]["info"].clone(),
    )
    .unwrap();

    let uri = client(&config)
        .log_model(&run, &recognizer_pipeline(), "model_path")
        .await
        .unwrap();
    assert_eq!(uri.to_string(), "runs:/abc/model_path");

    let uploaded: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| r.url.path().to_string())
        .collect();
    let prefix = "/api/2.0/mlflow-artifacts/artifacts/7/abc/artifacts/model_path";
    assert!(uploaded.contains(&format!("{}/MLmodel", prefix)));
    assert!(uploaded.contains(&format!("{}/model/pipeline.json", prefix)));
}

#[tokio::test]
async fn test_register_requires_run_uri() {
    let server = MockServer::start().await;
    let config = config(&server, vec![]);

    let err = client(&config)
        .register_model(&ModelUri::registered("combined", 1), "combined")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("runs:/"), "{}", err);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api("experiments/get")))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("experiments/get")))
        .respond_with(ResponseTemplate::new(200).set_body_json(experiment_json("7")))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server, vec![]);
    config.tracking.retry = RetryPolicy {
        max_retries: 2,
        initial_backoff_ms: 1,
        backoff_multiplier: 1.0,
        max_backoff_ms: 1,
    };

    let experiment = client(&config).get_experiment("7").await.unwrap();
    assert_eq!(experiment.experiment_id, "7");
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api("runs/update")))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server, vec![]);
    config.tracking.retry = RetryPolicy::default();

    let err = client(&config)
        .finish_run("abc", RunStatus::Killed)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("403"), "{}", err);
}

#[tokio::test]
async fn test_search_runs_follows_page_tokens() {
    let server = MockServer::start().await;

    let page = |ids: &[&str], token: Option<&str>| {
        let runs: Vec<Value> = ids
            .iter()
            .map(|id| {
                let mut run = run_json("mlflow-artifacts:/7")["run"].clone();
                run["info"]["run_id"] = json!(id);
                run
            })
            .collect();
        let mut body = json!({"runs": runs});
        if let Some(token) = token {
            body["next_page_token"] = json!(token);
        }
        ResponseTemplate::new(200).set_body_json(body)
    };

    Mock::given(method("POST"))
        .and(path(api("runs/search")))
        .and(body_partial_json(json!({"page_token": "t1"})))
        .respond_with(page(&["r3"], None))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("runs/search")))
        .and(body_partial_json(json!({"experiment_ids": ["7"]})))
        .respond_with(page(&["r1", "r2"], Some("t1")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server, vec![]);
    let runs = client(&config)
        .search_runs(&["7".to_string()], 10)
        .await
        .unwrap();
    let ids: Vec<&str> = runs.iter().map(|r| r.info.run_id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r2", "r3"]);
}

fn artifacts_url(path: &str) -> String {
    if path.is_empty() {
        "/api/2.0/mlflow-artifacts/artifacts".to_string()
    } else {
        format!("/api/2.0/mlflow-artifacts/artifacts/{}", path)
    }
}

async fn mount_listing(server: &MockServer, listed: &str, files: Value) {
    Mock::given(method("GET"))
        .and(path(artifacts_url("")))
        .and(query_param("path", listed))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, remote: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(artifacts_url(remote)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_load_registered_model_through_artifact_proxy() {
    let server = MockServer::start().await;
    let base = "7/abc/artifacts/model_path";

    Mock::given(method("GET"))
        .and(path(api("model-versions/get")))
        .and(query_param("name", "combined"))
        .and(query_param("version", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model_version": {
                "name": "combined",
                "version": "2",
                "source": format!("mlflow-artifacts:/{}", base),
                "run_id": "abc",
                "status": "READY"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    mount_listing(
        &server,
        base,
        json!([
            {"path": "model_path/MLmodel", "is_dir": false, "file_size": 120},
            {"path": "model_path/model", "is_dir": true}
        ]),
    )
    .await;
    mount_listing(
        &server,
        &format!("{}/model", base),
        json!([
            {"path": "model_path/model/pipeline.json", "is_dir": false, "file_size": 300},
            {"path": "model_path/model/tok2vec", "is_dir": true}
        ]),
    )
    .await;
    mount_listing(
        &server,
        &format!("{}/model/tok2vec", base),
        json!([
            {"path": "model_path/model/tok2vec/vectors.json", "is_dir": false, "file_size": 20}
        ]),
    )
    .await;

    let manifest = json!({
        "lang": "en",
        "name": "combined",
        "components": [
            {"name": "tok2vec", "factory": "tok2vec", "config": {"width": 4}},
            {"name": "ner", "factory": "ner", "config": {"patterns": [
                {"label": "CHEMICAL", "regex": r"\blidocaine\b"}
            ]}}
        ]
    });
    mount_file(&server, &format!("{}/MLmodel", base), json!({"flavors": {}}).to_string()).await;
    mount_file(&server, &format!("{}/model/pipeline.json", base), manifest.to_string()).await;
    mount_file(
        &server,
        &format!("{}/model/tok2vec/vectors.json", base),
        json!({"flu": [1.0, 1.0, 1.0, 1.0]}).to_string(),
    )
    .await;

    let config = config(&server, vec![]);
    let registry = FactoryRegistry::with_builtins();
    let pipeline = client(&config)
        .load_model(&ModelUri::registered("combined", 2), &registry)
        .await
        .unwrap();

    assert_eq!(pipeline.pipe_names(), vec!["tok2vec", "ner"]);
    let doc = pipeline.process("lidocaine").unwrap();
    assert_eq!(doc.ents()[0].label, "CHEMICAL");
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("experiments/get")))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(experiment_json("7")))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server, vec![]);
    config.tracking.token = Some("s3cret".to_string());

    let experiment = client(&config).get_experiment("7").await.unwrap();
    assert_eq!(experiment.experiment_id, "7");
}

#[tokio::test]
async fn test_basic_credentials_are_sent() {
    let server = MockServer::start().await;
    // base64("owner:s3cret")
    Mock::given(method("POST"))
        .and(path(api("runs/update")))
        .and(header("authorization", "Basic b3duZXI6czNjcmV0"))
        .respond_with(ok_empty())
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server, vec![]);
    config.tracking.username = Some("owner".to_string());
    config.tracking.password = Some("s3cret".to_string());

    client(&config)
        .finish_run("abc", RunStatus::Finished)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_record_creation_is_not_retried_after_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api("runs/create")))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("registered-models/create")))
        .respond_with(ok_empty())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("runs/get")))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("mlflow-artifacts:/7/abc/artifacts")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("model-versions/create")))
        .respond_with(ResponseTemplate::new(504).set_body_string("gateway timeout"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server, vec![]);
    config.tracking.retry = RetryPolicy {
        max_retries: 3,
        initial_backoff_ms: 1,
        backoff_multiplier: 1.0,
        max_backoff_ms: 1,
    };
    let tracker = client(&config);

    let err = tracker.create_run("7").await.unwrap_err();
    assert!(err.to_string().contains("503"), "{}", err);

    let err = tracker
        .register_model(&ModelUri::run("abc", "model_path"), "combined")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("504"), "{}", err);
}
