//! Command execution inside running containers

use futures_util::StreamExt;

use super::DockerClient;
use crate::error::{Error, Result};

impl DockerClient {
    /// Execute a command in a running container, returning combined output
    pub async fn exec_command(&self, container_id: &str, cmd: Vec<&str>) -> Result<(String, i64)> {
        use bollard::exec::{CreateExecOptions, StartExecResults};

        let exec = self
            .inner()
            .create_exec(
                container_id,
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    cmd: Some(cmd),
                    ..Default::default()
                },
            )
            .await?;

        let output = self.inner().start_exec(&exec.id, None).await?;

        let mut result = String::new();
        if let StartExecResults::Attached { mut output, .. } = output {
            while let Some(Ok(msg)) = output.next().await {
                result.push_str(&msg.to_string());
            }
        }

        let inspect = self.inner().inspect_exec(&exec.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(0);

        Ok((result, exit_code))
    }

    /// Like [`exec_command`] but fails on a non-zero exit code, surfacing
    /// the command output as the error message
    pub async fn exec_checked(&self, container_id: &str, cmd: Vec<&str>) -> Result<String> {
        let description = cmd.join(" ");
        let (output, exit_code) = self.exec_command(container_id, cmd).await?;
        if exit_code != 0 {
            return Err(Error::Other(format!(
                "'{}' in {} exited with {}: {}",
                description,
                container_id,
                exit_code,
                output.trim()
            )));
        }
        Ok(output)
    }
}
