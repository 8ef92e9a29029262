//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub docker: DockerConfig,

    #[serde(default)]
    pub nginx: NginxConfig,
}

/// Server configuration for the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3457
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Docker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_socket")]
    pub socket: String,
}

fn default_socket() -> String {
    "/var/run/docker.sock".to_string()
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: default_socket(),
        }
    }
}

/// Nginx / proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NginxConfig {
    /// Root directory holding one subdirectory per website alias
    #[serde(default = "default_sites_dir")]
    pub sites_dir: PathBuf,

    /// Path prefix used inside generated configs (what the nginx process
    /// itself sees, which may differ from `sites_dir` when nginx runs in a
    /// container with a volume mount)
    #[serde(default = "default_sites_prefix")]
    pub sites_prefix: String,

    /// Container name running the proxy (used for `nginx -t` and reload)
    #[serde(default)]
    pub container: Option<String>,

    /// Custom syntax-check command; overrides the container exec
    #[serde(default)]
    pub check_command: Option<String>,

    /// Custom reload command; overrides the container exec
    #[serde(default)]
    pub reload_command: Option<String>,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_https_port")]
    pub https_port: u16,

    /// Directory of the optional WAF collaborator; when present,
    /// `<waf_dir>/conf/sites.json` is kept in sync with website domains
    #[serde(default)]
    pub waf_dir: Option<PathBuf>,

    /// Panel-level directory for custom rewrite templates
    #[serde(default = "default_rewrite_dir")]
    pub rewrite_dir: PathBuf,

    /// Open firewall ports for newly listened-on domains
    #[serde(default)]
    pub manage_firewall: bool,
}

fn default_sites_dir() -> PathBuf {
    PathBuf::from("./sites")
}

fn default_sites_prefix() -> String {
    "/www/sites".to_string()
}

fn default_http_port() -> u16 {
    80
}

fn default_https_port() -> u16 {
    443
}

fn default_rewrite_dir() -> PathBuf {
    PathBuf::from("./rewrite")
}

impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            sites_dir: default_sites_dir(),
            sites_prefix: default_sites_prefix(),
            container: None,
            check_command: None,
            reload_command: None,
            http_port: default_http_port(),
            https_port: default_https_port(),
            waf_dir: None,
            rewrite_dir: default_rewrite_dir(),
            manage_firewall: false,
        }
    }
}

impl NginxConfig {
    /// Directory on disk for one website alias
    pub fn site_dir(&self, alias: &str) -> PathBuf {
        self.sites_dir.join(alias)
    }

    /// Path prefix for one website alias as seen by the nginx process
    pub fn site_prefix(&self, alias: &str) -> String {
        format!("{}/{}", self.sites_prefix.trim_end_matches('/'), alias)
    }
}
