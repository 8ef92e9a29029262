//! Docker client wrapper using bollard

use bollard::Docker;

use crate::config::DockerConfig;
use crate::error::Result;

/// Wrapper around the bollard Docker client
#[derive(Clone)]
pub struct DockerClient {
    inner: Docker,
}

impl DockerClient {
    /// Create a new Docker client
    pub fn new(config: &DockerConfig) -> Result<Self> {
        let inner = if config.socket.starts_with("tcp://") {
            Docker::connect_with_http(&config.socket, 120, bollard::API_DEFAULT_VERSION)?
        } else {
            Docker::connect_with_unix(&config.socket, 120, bollard::API_DEFAULT_VERSION)?
        };

        Ok(Self { inner })
    }

    /// Get the underlying bollard Docker client
    pub fn inner(&self) -> &Docker {
        &self.inner
    }

    /// Test the Docker connection
    pub async fn ping(&self) -> Result<()> {
        self.inner.ping().await?;
        Ok(())
    }
}
