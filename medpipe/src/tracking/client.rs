//! REST client for an MLflow tracking server.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::artifacts::{self, ArtifactLocation};
use super::error::{Result, TrackingError};
use super::retry::RetryPolicy;
use super::types::*;
use super::uri::{ModelUri, VersionSelector};
use super::Tracker;
use crate::config::TrackingConfig;
use crate::pipeline::package::MANIFEST_FILE;
use crate::pipeline::{FactoryRegistry, Pipeline, load_package};

/// File describing a logged model, written next to the pipeline package
pub const MLMODEL_FILE: &str = "MLmodel";

/// Directory holding the pipeline package inside a logged model
pub const MODEL_DATA_DIR: &str = "model";

/// Flavor name recorded in the `MLmodel` descriptor
pub const FLAVOR: &str = "medpipe";

const READY_POLL_ATTEMPTS: u32 = 10;
const SEARCH_PAGE_SIZE: usize = 1000;

/// Descriptor written as `MLmodel`.
///
/// Serialized as JSON, which YAML readers accept as well.
#[derive(Debug, Clone, Serialize)]
struct ModelDescriptor {
    artifact_path: String,
    run_id: String,
    utc_time_created: String,
    flavors: Value,
}

#[derive(Debug, Clone)]
enum Auth {
    None,
    Bearer(String),
    Basic {
        username: String,
        password: Option<String>,
    },
}

/// Client for the MLflow REST API 2.0
#[derive(Debug, Clone)]
pub struct MlflowClient {
    http: reqwest::Client,
    base_url: String,
    auth: Auth,
    retry: RetryPolicy,
}

impl MlflowClient {
    /// Create a client from tracking configuration
    pub fn new(config: &TrackingConfig) -> Result<Self> {
        let base_url = config
            .tracking_uri()
            .ok_or_else(|| TrackingError::invalid_uri("", "no tracking URI configured"))?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TrackingError::invalid_uri(
                base_url,
                "tracking URI must be an http(s) URL",
            ));
        }

        let auth = match (&config.token, &config.username) {
            (Some(token), _) => Auth::Bearer(token.clone()),
            (None, Some(username)) => Auth::Basic {
                username: username.clone(),
                password: config.password.clone(),
            },
            (None, None) => Auth::None,
        };

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("medpipe/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url, endpoint)
    }

    fn artifact_url(&self, path: &str) -> String {
        if path.is_empty() {
            format!("{}/api/2.0/mlflow-artifacts/artifacts", self.base_url)
        } else {
            format!("{}/api/2.0/mlflow-artifacts/artifacts/{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.auth {
            Auth::None => builder,
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::Basic { username, password } => builder.basic_auth(username, password.as_ref()),
        }
    }

    /// Send a request, retrying transport failures and 5xx answers.
    ///
    /// Requests that create server-side records (`idempotent == false`) are
    /// only retried when the connection was never established.
    async fn send<F>(&self, operation: &str, idempotent: bool, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let result = match build().send().await {
                Ok(response) => Self::check_status(response).await,
                Err(e) => Err(TrackingError::Transport(e)),
            };

            match result {
                Ok(response) => {
                    debug!(operation, attempts = attempt + 1, "Tracking request succeeded");
                    return Ok(response);
                }
                Err(e) if attempt < self.retry.max_retries && Self::may_retry(&e, idempotent) => {
                    let backoff = self.retry.backoff_duration(attempt);
                    warn!(
                        "Tracking request failed ({}, attempt {}/{}), retrying in {:?}: {}",
                        operation,
                        attempt + 1,
                        self.retry.max_retries + 1,
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn may_retry(error: &TrackingError, idempotent: bool) -> bool {
        if idempotent {
            error.is_retryable()
        } else {
            error.is_connect_failure()
        }
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(api) => TrackingError::Api {
                status: status.as_u16(),
                code: api.error_code,
                message: api.message,
            },
            Err(_) => TrackingError::Http {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.text().await?;
        let body = if body.trim().is_empty() { "{}" } else { &body };
        Ok(serde_json::from_str(body)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.api_url(endpoint);
        let response = self
            .send(endpoint, true, || self.request(Method::GET, &url).query(query))
            .await?;
        Self::read_json(response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> Result<T> {
        self.post(endpoint, body, true).await
    }

    /// POST to an endpoint that creates a new record on every call
    async fn post_json_once<T: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> Result<T> {
        self.post(endpoint, body, false).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
        idempotent: bool,
    ) -> Result<T> {
        let url = self.api_url(endpoint);
        let response = self
            .send(endpoint, idempotent, || {
                self.request(Method::POST, &url).json(body)
            })
            .await?;
        Self::read_json(response).await
    }

    /// Look up a run
    pub async fn get_run(&self, run_id: &str) -> Result<Run> {
        let response: RunResponse = self.get_json("runs/get", &[("run_id", run_id)]).await?;
        Ok(response.run)
    }

    /// Set a tag on a run
    pub async fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let _: Value = self
            .post_json(
                "runs/set-tag",
                &json!({"run_id": run_id, "key": key, "value": value}),
            )
            .await?;
        Ok(())
    }

    /// Create a registered model; an existing model with this name is fine
    pub async fn create_registered_model(&self, name: &str) -> Result<()> {
        match self
            .post_json::<Value>("registered-models/create", &json!({"name": name}))
            .await
        {
            Ok(_) => {
                info!(model = name, "Created registered model");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(model = name, "Registered model already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_model_version(&self, name: &str, version: &str) -> Result<ModelVersion> {
        let response: ModelVersionResponse = self
            .get_json("model-versions/get", &[("name", name), ("version", version)])
            .await?;
        Ok(response.model_version)
    }

    /// Highest registered version of a model
    pub async fn get_latest_version(&self, name: &str) -> Result<ModelVersion> {
        let response: LatestVersionsResponse = self
            .post_json("registered-models/get-latest-versions", &json!({"name": name}))
            .await?;
        response
            .model_versions
            .into_iter()
            .max_by_key(|v| v.version_number().unwrap_or(0))
            .ok_or_else(|| TrackingError::response(format!("model '{}' has no versions", name)))
    }

    async fn wait_until_ready(&self, version: ModelVersion) -> Result<ModelVersion> {
        let mut current = version;
        for attempt in 0..READY_POLL_ATTEMPTS {
            if current.status.as_deref() == Some("FAILED_REGISTRATION") {
                return Err(TrackingError::response(format!(
                    "registration of {} version {} failed",
                    current.name, current.version
                )));
            }
            if current.is_ready() {
                return Ok(current);
            }
            tokio::time::sleep(self.retry.backoff_duration(attempt)).await;
            current = self.get_model_version(&current.name, &current.version).await?;
        }
        warn!(
            model = %current.name,
            version = %current.version,
            status = ?current.status,
            "Model version not ready yet, continuing"
        );
        Ok(current)
    }

    async fn run_artifact_location(&self, run_id: &str, path: &str) -> Result<ArtifactLocation> {
        let run = self.get_run(run_id).await?;
        Ok(ArtifactLocation::parse(&run.info.artifact_uri)?.join(path))
    }

    /// Artifact location a model URI points at
    pub async fn resolve_model_location(&self, uri: &ModelUri) -> Result<ArtifactLocation> {
        let source = match uri {
            ModelUri::Run { run_id, path } => {
                return self.run_artifact_location(run_id, path).await;
            }
            ModelUri::Registered { name, version } => {
                let version = match version {
                    VersionSelector::Number(n) => {
                        self.get_model_version(name, &n.to_string()).await?
                    }
                    VersionSelector::Latest => self.get_latest_version(name).await?,
                };
                version.source.ok_or_else(|| {
                    TrackingError::response(format!(
                        "model version {}/{} has no source",
                        version.name, version.version
                    ))
                })?
            }
        };

        match source.parse::<ModelUri>() {
            Ok(ModelUri::Run { run_id, path }) => self.run_artifact_location(&run_id, &path).await,
            Ok(ModelUri::Registered { .. }) => Err(TrackingError::invalid_uri(
                source,
                "model version source points at another registered model",
            )),
            Err(_) => ArtifactLocation::parse(&source),
        }
    }

    /// Upload a single file to an artifact location
    pub async fn upload_file(&self, location: &ArtifactLocation, local: &Path) -> Result<()> {
        match location {
            ArtifactLocation::Local(dir) => {
                fs::create_dir_all(dir)?;
                artifacts::copy_local(local, dir)?;
            }
            ArtifactLocation::Proxied(base) => {
                let name = local
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        TrackingError::response(format!("no file name in {}", local.display()))
                    })?;
                let target = ArtifactLocation::Proxied(base.clone()).join(&name);
                self.put_artifact(&target, fs::read(local)?).await?;
            }
        }
        Ok(())
    }

    /// Upload every file below `local_dir`, keeping relative paths
    pub async fn upload_dir(&self, location: &ArtifactLocation, local_dir: &Path) -> Result<()> {
        if let ArtifactLocation::Local(dir) = location {
            artifacts::copy_tree(local_dir, dir)?;
            return Ok(());
        }
        for (path, relative) in artifacts::walk_files(local_dir)? {
            self.put_artifact(&location.join(&relative), fs::read(&path)?)
                .await?;
        }
        Ok(())
    }

    async fn put_artifact(&self, location: &ArtifactLocation, bytes: Vec<u8>) -> Result<()> {
        let ArtifactLocation::Proxied(path) = location else {
            return Err(TrackingError::response("put_artifact needs a proxied location"));
        };
        let url = self.artifact_url(path);
        debug!(artifact = %path, size = bytes.len(), "Uploading artifact");
        self.send("artifacts/put", true, || {
            self.request(Method::PUT, &url).body(bytes.clone())
        })
        .await?;
        Ok(())
    }

    /// List the direct children of a proxied artifact path
    pub async fn list_artifacts(&self, path: &str) -> Result<Vec<FileInfo>> {
        let url = self.artifact_url("");
        let response = self
            .send("artifacts/list", true, || {
                self.request(Method::GET, &url).query(&[("path", path)])
            })
            .await?;
        let listing: ListArtifactsResponse = Self::read_json(response).await?;
        Ok(listing.files)
    }

    /// Download an artifact tree into `dest`, returning the local root
    pub async fn download(&self, location: &ArtifactLocation, dest: &Path) -> Result<PathBuf> {
        let root = dest.join("artifacts");
        match location {
            ArtifactLocation::Local(dir) => {
                if !dir.exists() {
                    return Err(TrackingError::response(format!(
                        "artifact path {} does not exist",
                        dir.display()
                    )));
                }
                artifacts::copy_tree(dir, &root)?;
            }
            ArtifactLocation::Proxied(base) => {
                fs::create_dir_all(&root)?;
                let mut pending = vec![(base.clone(), root.clone())];
                let mut downloaded = 0usize;
                while let Some((remote, local)) = pending.pop() {
                    for entry in self.list_artifacts(&remote).await? {
                        let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
                        let child_remote = format!("{}/{}", remote, name);
                        let child_local = local.join(name);
                        if entry.is_dir {
                            fs::create_dir_all(&child_local)?;
                            pending.push((child_remote, child_local));
                        } else {
                            let url = self.artifact_url(&child_remote);
                            let response = self
                                .send("artifacts/get", true, || self.request(Method::GET, &url))
                                .await?;
                            fs::write(&child_local, response.bytes().await?)?;
                            downloaded += 1;
                        }
                    }
                }
                if downloaded == 0 {
                    return Err(TrackingError::response(format!(
                        "no artifacts found at {}",
                        base
                    )));
                }
                debug!(artifact = %base, files = downloaded, "Downloaded artifacts");
            }
        }
        Ok(root)
    }

    fn stage_model(pipeline: &Pipeline, run_id: &str, artifact_path: &str, dir: &Path) -> Result<()> {
        pipeline.to_disk(&dir.join(MODEL_DATA_DIR))?;
        let descriptor = ModelDescriptor {
            artifact_path: artifact_path.to_string(),
            run_id: run_id.to_string(),
            utc_time_created: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            flavors: json!({
                FLAVOR: {
                    "medpipe_version": crate::VERSION,
                    "data": MODEL_DATA_DIR,
                    "lang": pipeline.lang(),
                    "components": pipeline.pipe_names(),
                }
            }),
        };
        fs::write(
            dir.join(MLMODEL_FILE),
            serde_json::to_string_pretty(&descriptor)?,
        )?;
        Ok(())
    }
}

#[async_trait]
impl Tracker for MlflowClient {
    async fn create_experiment(&self, experiment: &NewExperiment) -> Result<String> {
        let mut body = json!({
            "name": experiment.name,
            "tags": to_key_values(&experiment.tags),
        });
        if let Some(location) = &experiment.artifact_location {
            body["artifact_location"] = json!(location);
        }
        let response: CreateExperimentResponse =
            self.post_json("experiments/create", &body).await?;
        info!(
            experiment = %experiment.name,
            experiment_id = %response.experiment_id,
            "Created experiment"
        );
        Ok(response.experiment_id)
    }

    async fn get_experiment(&self, experiment_id: &str) -> Result<Experiment> {
        let response: ExperimentResponse = self
            .get_json("experiments/get", &[("experiment_id", experiment_id)])
            .await?;
        Ok(response.experiment)
    }

    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        match self
            .get_json::<ExperimentResponse>("experiments/get-by-name", &[("experiment_name", name)])
            .await
        {
            Ok(response) => Ok(Some(response.experiment)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_run(&self, experiment_id: &str) -> Result<RunInfo> {
        let body = json!({
            "experiment_id": experiment_id,
            "start_time": chrono::Utc::now().timestamp_millis(),
            "tags": [{"key": "mlflow.source.name", "value": "medpipe"}],
        });
        let response: RunResponse = self.post_json_once("runs/create", &body).await?;
        info!(run_id = %response.run.info.run_id, experiment_id, "Started run");
        Ok(response.run.info)
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let _: Value = self
            .post_json(
                "runs/log-parameter",
                &json!({"run_id": run_id, "key": key, "value": value}),
            )
            .await?;
        debug!(run_id, key, value, "Logged parameter");
        Ok(())
    }

    async fn log_model(
        &self,
        run: &RunInfo,
        pipeline: &Pipeline,
        artifact_path: &str,
    ) -> Result<ModelUri> {
        let staging = tempfile::tempdir()?;
        Self::stage_model(pipeline, &run.run_id, artifact_path, staging.path())?;

        let location = ArtifactLocation::parse(&run.artifact_uri)?.join(artifact_path);
        self.upload_dir(&location, staging.path()).await?;

        let history = fs::read_to_string(staging.path().join(MLMODEL_FILE))?;
        let history: Value = serde_json::from_str(&history)?;
        self.set_tag(
            &run.run_id,
            "mlflow.log-model.history",
            &Value::Array(vec![history]).to_string(),
        )
        .await?;

        let uri = ModelUri::run(&run.run_id, artifact_path);
        info!(model_uri = %uri, components = ?pipeline.pipe_names(), "Logged model");
        Ok(uri)
    }

    async fn log_artifact(&self, run: &RunInfo, local_path: &Path) -> Result<()> {
        let location = ArtifactLocation::parse(&run.artifact_uri)?;
        if local_path.is_dir() {
            let name = local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.upload_dir(&location.join(&name), local_path).await?;
        } else {
            self.upload_file(&location, local_path).await?;
        }
        info!(run_id = %run.run_id, artifact = %local_path.display(), "Logged artifact");
        Ok(())
    }

    async fn finish_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        let _: Value = self
            .post_json(
                "runs/update",
                &json!({
                    "run_id": run_id,
                    "status": status,
                    "end_time": chrono::Utc::now().timestamp_millis(),
                }),
            )
            .await?;
        info!(run_id, status = %status, "Finished run");
        Ok(())
    }

    async fn register_model(&self, model_uri: &ModelUri, name: &str) -> Result<ModelVersion> {
        let ModelUri::Run { run_id, path } = model_uri else {
            return Err(TrackingError::invalid_uri(
                model_uri.to_string(),
                "only runs:/ URIs can be registered",
            ));
        };

        self.create_registered_model(name).await?;
        let run = self.get_run(run_id).await?;
        let source = format!("{}/{}", run.info.artifact_uri.trim_end_matches('/'), path);

        let response: ModelVersionResponse = self
            .post_json_once(
                "model-versions/create",
                &json!({"name": name, "source": source, "run_id": run_id}),
            )
            .await?;
        let version = self.wait_until_ready(response.model_version).await?;
        info!(model = %version.name, version = %version.version, "Registered model version");
        Ok(version)
    }

    async fn load_model(&self, model_uri: &ModelUri, registry: &FactoryRegistry) -> Result<Pipeline> {
        let location = self.resolve_model_location(model_uri).await?;
        let staging = tempfile::tempdir()?;
        let root = self.download(&location, staging.path()).await?;

        let package_dir = if root.join(MODEL_DATA_DIR).join(MANIFEST_FILE).is_file() {
            root.join(MODEL_DATA_DIR)
        } else {
            root
        };
        let pipeline = load_package(&package_dir, registry)?;
        info!(model_uri = %model_uri, components = ?pipeline.pipe_names(), "Loaded model");
        Ok(pipeline)
    }

    async fn search_runs(&self, experiment_ids: &[String], max_results: usize) -> Result<Vec<Run>> {
        let mut runs = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let remaining = max_results.saturating_sub(runs.len());
            if remaining == 0 {
                break;
            }
            let mut body = json!({
                "experiment_ids": experiment_ids,
                "max_results": remaining.min(SEARCH_PAGE_SIZE),
                "order_by": ["attributes.start_time DESC"],
            });
            if let Some(token) = &page_token {
                body["page_token"] = json!(token);
            }
            let response: SearchRunsResponse = self.post_json("runs/search", &body).await?;
            runs.extend(response.runs);
            match response.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        runs.truncate(max_results);
        Ok(runs)
    }
}

