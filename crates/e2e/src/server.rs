//! Server management - building, spawning and tearing down the backend

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::error::{E2eError, E2eResult};
use crate::probe::Prober;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to the backend under test.
///
/// Owns the child process when the harness spawned it. Dropping the handle
/// stops the process, so teardown runs on every exit path including
/// unwinding panics and early `?` returns during startup.
pub struct ServiceHandle {
    child: Option<Child>,
    base_url: String,
    grace_period: Duration,
}

impl ServiceHandle {
    /// Bind to an external backend or build, spawn and probe a local one
    pub async fn acquire(config: &HarnessConfig) -> E2eResult<Self> {
        config.validate()?;

        if let Some(url) = config.external_base_url() {
            info!("Using existing backend: {}", url);
            return Ok(Self::external(url));
        }

        let service = &config.service;
        run_build(config).await?;

        let base_url = config.local_base_url();
        info!("Spawning local backend on port {}", config.port);

        let (program, args) = service
            .start_command
            .split_first()
            .ok_or_else(|| E2eError::Config("service.start_command is empty".into()))?;

        let child = Command::new(program)
            .args(args)
            .current_dir(&service.working_dir)
            .env(&service.port_env, config.port.to_string())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| {
                E2eError::SpawnFailed(format!("Failed to spawn `{}`: {}", program, e))
            })?;

        // Constructed before probing so a readiness failure still tears down
        let handle = Self {
            child: Some(child),
            base_url,
            grace_period: service.grace_period(),
        };

        Prober::new(service.excluded_signatures.clone())?
            .wait_until_ready(&handle.base_url, service.readiness_timeout())
            .await?;

        info!("Server ready at {}", handle.base_url);
        Ok(handle)
    }

    /// Handle for a backend the harness does not own; teardown is a no-op
    pub fn external(base_url: &str) -> Self {
        Self {
            child: None,
            base_url: base_url.trim_end_matches('/').to_string(),
            grace_period: Duration::ZERO,
        }
    }

    /// Take ownership of an already-spawned process
    pub fn from_child(child: Child, base_url: &str, grace_period: Duration) -> Self {
        Self {
            child: Some(child),
            base_url: base_url.trim_end_matches('/').to_string(),
            grace_period,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Process id of the owned child, if any
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Stop the owned process: graceful signal, bounded wait, then kill.
    ///
    /// Returns `true` if this call terminated a process. Later calls, and
    /// calls on external handles, return `false`.
    pub fn stop(&mut self) -> E2eResult<bool> {
        let Some(mut child) = self.child.take() else {
            return Ok(false);
        };

        info!("Stopping server (pid: {})", child.id());

        if child.try_wait()?.is_some() {
            warn!("Server had already exited");
            return Ok(true);
        }

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                let deadline = Instant::now() + self.grace_period;
                while Instant::now() < deadline {
                    if child.try_wait()?.is_some() {
                        return Ok(true);
                    }
                    std::thread::sleep(EXIT_POLL_INTERVAL);
                }
                warn!(
                    "Server did not exit within {:?}; killing",
                    self.grace_period
                );
            }
        }

        // Force kill if still running
        if let Err(e) = child.kill() {
            warn!("Failed to kill server: {}", e);
        }
        child.wait()?;

        Ok(true)
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Server teardown failed: {}", e);
        }
    }
}

/// Run the opaque build step once, surfacing its output verbatim on failure
async fn run_build(config: &HarnessConfig) -> E2eResult<()> {
    let service = &config.service;
    let Some((program, args)) = service.build_command.split_first() else {
        return Ok(());
    };
    let command = service.build_command.join(" ");

    info!("Building backend: {}", command);

    let output = tokio::process::Command::new(program)
        .args(args)
        .current_dir(&service.working_dir)
        .env(&service.port_env, config.port.to_string())
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| E2eError::BuildFailed {
            command: command.clone(),
            status: "launch error".to_string(),
            output: e.to_string(),
        })?;

    if !output.status.success() {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(E2eError::BuildFailed {
            command,
            status: output.status.to_string(),
            output: combined,
        });
    }

    Ok(())
}
