//! Launching and terminating the model server process.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::{OllamaError, Result};

/// A running server process owned by the manager.
#[async_trait]
pub trait ServerProcess: Send {
    /// OS process id, when known.
    fn id(&self) -> Option<u32>;

    /// Stop the process and wait for it to exit.
    async fn terminate(&mut self) -> Result<()>;
}

/// Starts server processes.
#[async_trait]
pub trait ServerLauncher: Send + Sync {
    /// Best-effort termination of server processes this manager did not
    /// start. Failures are logged, never returned.
    async fn terminate_existing(&self);

    /// Launch a fresh server.
    async fn launch(&self) -> Result<Box<dyn ServerProcess>>;
}

/// Launches `<executable> serve` as a child process.
#[derive(Debug, Clone)]
pub struct OllamaLauncher {
    executable: String,
}

impl OllamaLauncher {
    /// Create a launcher for the given executable name or path.
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Process image name used to find stray servers.
    fn image_name(&self) -> String {
        let name = std::path::Path::new(&self.executable)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.executable.clone());

        if cfg!(windows) && !name.to_lowercase().ends_with(".exe") {
            format!("{name}.exe")
        } else {
            name
        }
    }
}

impl Default for OllamaLauncher {
    fn default() -> Self {
        Self::new("ollama")
    }
}

#[async_trait]
impl ServerLauncher for OllamaLauncher {
    async fn terminate_existing(&self) {
        let image = self.image_name();
        let mut command = if cfg!(windows) {
            let mut command = Command::new("taskkill");
            command.args(["/F", "/IM", image.as_str()]);
            command
        } else {
            let mut command = Command::new("pkill");
            command.args(["-x", image.as_str()]);
            command
        };

        match command
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) => debug!("Terminating existing {image} processes exited with {status}"),
            Err(err) => warn!("Could not terminate existing {image} processes: {err}"),
        }
    }

    async fn launch(&self) -> Result<Box<dyn ServerProcess>> {
        let child = Command::new(&self.executable)
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OllamaError::Spawn {
                executable: self.executable.clone(),
                source,
            })?;

        info!("Launched {} serve (pid {:?})", self.executable, child.id());
        Ok(Box::new(ChildProcess {
            executable: self.executable.clone(),
            child,
        }))
    }
}

struct ChildProcess {
    executable: String,
    child: Child,
}

#[async_trait]
impl ServerProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn terminate(&mut self) -> Result<()> {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("Server process already exited with {status}");
                Ok(())
            }
            _ => self.child.kill().await.map_err(|source| OllamaError::Spawn {
                executable: self.executable.clone(),
                source,
            }),
        }
    }
}
