//! Docker client used to drive the proxy container

mod client;
mod exec;

pub use client::DockerClient;
