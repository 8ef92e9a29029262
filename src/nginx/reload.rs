//! Nginx syntax check and reload
//!
//! The live proxy is mutated only through write-then-reload; a failed `-t`
//! check or reload is the signal for callers to roll the config file back.

use crate::config::NginxConfig;
use crate::docker::DockerClient;
use crate::error::{Error, Result};

/// Validate the proxy configuration (`nginx -t`)
pub async fn check(config: &NginxConfig, docker: Option<&DockerClient>) -> Result<()> {
    if let Some(check_cmd) = &config.check_command {
        return run_command(check_cmd)
            .await
            .map_err(|e| Error::NginxCheck(e.to_string()));
    }

    if let Some(container) = &config.container {
        let docker = docker.ok_or_else(|| {
            Error::Config("nginx.container is set but no docker client is available".to_string())
        })?;
        return docker
            .exec_checked(container, vec!["nginx", "-t"])
            .await
            .map(|_| ())
            .map_err(|e| Error::NginxCheck(e.to_string()));
    }

    tracing::warn!("No nginx check command or container configured, skipping syntax check");
    Ok(())
}

/// Reload the proxy configuration
pub async fn reload(config: &NginxConfig, docker: Option<&DockerClient>) -> Result<()> {
    if let Some(reload_cmd) = &config.reload_command {
        return run_command(reload_cmd)
            .await
            .map_err(|e| Error::NginxReload(e.to_string()));
    }

    if let Some(container) = &config.container {
        let docker = docker.ok_or_else(|| {
            Error::Config("nginx.container is set but no docker client is available".to_string())
        })?;
        match docker.exec_checked(container, vec!["nginx", "-s", "reload"]).await {
            Ok(_) => {
                tracing::info!("Nginx reloaded in container: {}", container);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Failed to reload nginx in {}: {}", container, e);
                // fall back to signalling the container's init process
                docker
                    .exec_checked(container, vec!["kill", "-HUP", "1"])
                    .await
                    .map_err(|e| Error::NginxReload(e.to_string()))?;
                return Ok(());
            }
        }
    }

    tracing::warn!("No nginx reload command or container configured, skipping reload");
    Ok(())
}

/// Syntax-check the configuration, then reload the proxy
pub async fn check_and_reload(config: &NginxConfig, docker: Option<&DockerClient>) -> Result<()> {
    check(config, docker).await?;
    reload(config, docker).await
}

/// Execute a shell command, surfacing stderr on failure
async fn run_command(command: &str) -> Result<()> {
    use tokio::process::Command;

    let output = Command::new("sh").args(["-c", command]).output().await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Other(format!(
            "command '{}' failed: {}",
            command,
            stderr.trim()
        )));
    }

    tracing::debug!("Ran nginx command: {}", command);
    Ok(())
}
