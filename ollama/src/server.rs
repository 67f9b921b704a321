//! Lifecycle of the local model server.
//!
//! The manager owns at most one server process. [`ModelServerManager::ensure_running`]
//! is idempotent: once the server is ready for a model, later calls return
//! the same handle without relaunching anything.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{DEFAULT_BASE_URL, OllamaApi, model_matches};
use crate::error::{OllamaError, Result};
use crate::process::{OllamaLauncher, ServerLauncher, ServerProcess};

/// Model used for generation unless configured otherwise.
pub const DEFAULT_MODEL: &str = "llama3.2:1b";

/// Configuration for the model server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the server API.
    pub base_url: String,

    /// Executable started with `serve`.
    pub executable: String,

    /// Generation model that must be present.
    pub model: String,

    /// Whether this process kills and launches the server. When false the
    /// server is managed externally and only polled.
    pub manage_process: bool,

    /// Delay between readiness probes.
    pub poll_interval_ms: u64,

    /// Number of readiness probes before giving up.
    pub max_attempts: u32,

    /// Timeout of a single readiness probe.
    pub probe_timeout_ms: u64,

    /// Timeout of the one-time model pull.
    pub pull_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            executable: "ollama".to_string(),
            model: DEFAULT_MODEL.to_string(),
            manage_process: true,
            poll_interval_ms: 2000,
            max_attempts: 15,
            probe_timeout_ms: 3000,
            pull_timeout_secs: 600,
        }
    }
}

impl ServerConfig {
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }
}

/// Readiness of the managed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    NotStarted,
    Starting,
    Ready,
    Failed,
}

/// Snapshot of the managed server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandle {
    /// OS process id, when this manager launched the server.
    pub pid: Option<u32>,

    /// Readiness at the time the handle was taken.
    pub readiness: Readiness,

    /// Model the server was readied for.
    pub model_name: String,
}

struct ManagerState {
    readiness: Readiness,
    model: Option<String>,
    process: Option<Box<dyn ServerProcess>>,
}

impl ManagerState {
    fn handle(&self) -> ServerHandle {
        ServerHandle {
            pid: self.process.as_ref().and_then(|p| p.id()),
            readiness: self.readiness,
            model_name: self.model.clone().unwrap_or_default(),
        }
    }

    async fn stop_process(&mut self) {
        if let Some(mut process) = self.process.take() {
            let pid = process.id();
            match process.terminate().await {
                Ok(()) => info!("Stopped model server (pid {pid:?})"),
                Err(err) => warn!("Failed to stop model server (pid {pid:?}): {err}"),
            }
        }
    }
}

/// Starts, health-checks and stops the local model server.
pub struct ModelServerManager {
    config: ServerConfig,
    api: OllamaApi,
    launcher: Box<dyn ServerLauncher>,
    state: Mutex<ManagerState>,
}

impl ModelServerManager {
    /// Create a manager that launches the configured executable.
    pub fn new(config: ServerConfig) -> Self {
        let launcher = OllamaLauncher::new(config.executable.clone());
        Self::with_launcher(config, launcher)
    }

    /// Create a manager with a custom process launcher.
    pub fn with_launcher(config: ServerConfig, launcher: impl ServerLauncher + 'static) -> Self {
        Self {
            api: OllamaApi::new(config.base_url.clone()),
            config,
            launcher: Box::new(launcher),
            state: Mutex::new(ManagerState {
                readiness: Readiness::NotStarted,
                model: None,
                process: None,
            }),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// API client for the managed server.
    pub fn api(&self) -> &OllamaApi {
        &self.api
    }

    /// Current readiness.
    pub async fn readiness(&self) -> Readiness {
        self.state.lock().await.readiness
    }

    /// Current handle.
    pub async fn handle(&self) -> ServerHandle {
        self.state.lock().await.handle()
    }

    /// Make sure a server is running and has `model` available.
    ///
    /// Returns only once the server is ready or the polling budget is
    /// spent. On failure the launched process is terminated and the state
    /// becomes [`Readiness::Failed`].
    pub async fn ensure_running(&self, model: &str) -> Result<ServerHandle> {
        let mut state = self.state.lock().await;

        if state.readiness == Readiness::Ready && state.model.as_deref() == Some(model) {
            debug!("Model server already ready for {model}");
            return Ok(state.handle());
        }

        info!("Starting model server for {model}");
        state.readiness = Readiness::Starting;
        state.model = Some(model.to_string());
        state.stop_process().await;

        if self.config.manage_process {
            self.launcher.terminate_existing().await;
            match self.launcher.launch().await {
                Ok(process) => state.process = Some(process),
                Err(err) => {
                    state.readiness = Readiness::Failed;
                    return Err(err);
                }
            }
        }

        let attempts = self.config.max_attempts;
        let mut pulled = false;
        for attempt in 1..=attempts {
            match self.api.list_models(self.config.probe_timeout()).await {
                Ok(models) if models.iter().any(|m| model_matches(m, model)) => {
                    state.readiness = Readiness::Ready;
                    info!("Model server ready: {model} (attempt {attempt}/{attempts})");
                    return Ok(state.handle());
                }
                Ok(_) if !pulled => {
                    pulled = true;
                    info!("Model {model} not present on the server, pulling it");
                    if let Err(err) = self.api.pull_model(model, self.config.pull_timeout()).await {
                        warn!("Pulling {model} failed: {err}");
                    }
                    continue;
                }
                Ok(_) => debug!("Model {model} still missing (attempt {attempt}/{attempts})"),
                Err(err) => debug!("Model server not ready (attempt {attempt}/{attempts}): {err}"),
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.poll_interval()).await;
            }
        }

        warn!("Model server did not become ready after {attempts} attempts");
        state.stop_process().await;
        state.readiness = Readiness::Failed;
        Err(OllamaError::ServerStartupTimeout { attempts })
    }

    /// Make sure a running server has `model`, pulling it when absent.
    ///
    /// Unlike [`ensure_running`](Self::ensure_running) this never launches
    /// or restarts anything.
    pub async fn ensure_model(&self, model: &str) -> Result<()> {
        let models = self.api.list_models(self.config.probe_timeout()).await?;
        if models.iter().any(|m| model_matches(m, model)) {
            debug!("Model {model} already present");
            return Ok(());
        }

        info!("Model {model} not present on the server, pulling it");
        self.api.pull_model(model, self.config.pull_timeout()).await
    }

    /// Stop the owned server process, if any. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.stop_process().await;
        state.readiness = Readiness::NotStarted;
        state.model = None;
    }
}
