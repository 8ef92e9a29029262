//! Website models, per-site filesystem layout and metadata store

pub mod auth;
pub mod domain;
pub mod lb;
pub mod proxy;
pub mod redirect;
pub mod rewrite;
pub mod service;
pub mod waf;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One managed virtual host or stream listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Website {
    /// Filesystem- and nginx-safe identifier; primary key
    pub alias: String,

    pub primary_domain: String,

    #[serde(default)]
    pub website_type: WebsiteType,

    #[serde(default)]
    pub protocol: Protocol,

    /// Upstream target for deployment/runtime sites
    #[serde(default)]
    pub proxy: String,

    /// SSL certificate reference
    #[serde(default)]
    pub ssl: Option<String>,

    #[serde(default)]
    pub default_server: bool,

    #[serde(default = "default_true")]
    pub access_log: bool,

    #[serde(default = "default_true")]
    pub error_log: bool,

    /// Parent website alias for subsites
    #[serde(default)]
    pub parent: Option<String>,

    /// Rewrite template currently applied
    #[serde(default)]
    pub rewrite: String,

    pub domains: Vec<WebsiteDomain>,

    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// One (domain, port, ssl) binding; a website always keeps at least one
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebsiteDomain {
    pub domain: String,
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebsiteType {
    Deployment,
    #[default]
    Static,
    Runtime,
    Subsite,
    Stream,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Protocol {
    #[serde(rename = "HTTP")]
    #[default]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
    #[serde(rename = "TCP/UDP")]
    Stream,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Http => write!(f, "HTTP"),
            Protocol::Https => write!(f, "HTTPS"),
            Protocol::Stream => write!(f, "TCP/UDP"),
        }
    }
}

impl Website {
    pub fn is_stream(&self) -> bool {
        self.website_type == WebsiteType::Stream
    }
}

const METADATA_FILENAME: &str = "website.toml";

/// Metadata store: one `website.toml` per site directory
#[derive(Debug, Clone)]
pub struct WebsiteStore {
    sites_dir: PathBuf,
}

impl WebsiteStore {
    pub fn new(sites_dir: impl Into<PathBuf>) -> Self {
        Self {
            sites_dir: sites_dir.into(),
        }
    }

    pub fn sites_dir(&self) -> &Path {
        &self.sites_dir
    }

    pub fn site_dir(&self, alias: &str) -> PathBuf {
        self.sites_dir.join(alias)
    }

    /// Main server-block file of a site
    pub fn conf_path(&self, alias: &str) -> PathBuf {
        self.site_dir(alias).join("conf")
    }

    pub fn proxy_dir(&self, alias: &str) -> PathBuf {
        self.site_dir(alias).join("proxy")
    }

    pub fn upstream_dir(&self, alias: &str) -> PathBuf {
        self.site_dir(alias).join("upstream")
    }

    pub fn redirect_dir(&self, alias: &str) -> PathBuf {
        self.site_dir(alias).join("redirect")
    }

    pub fn rewrite_path(&self, alias: &str) -> PathBuf {
        self.site_dir(alias).join("rewrite").join(format!("{}.conf", alias))
    }

    pub fn auth_pass_path(&self, alias: &str) -> PathBuf {
        self.site_dir(alias).join("auth_basic").join("auth.pass")
    }

    pub fn path_auth_dir(&self, alias: &str) -> PathBuf {
        self.site_dir(alias).join("path_auth")
    }

    pub fn path_auth_pass_dir(&self, alias: &str) -> PathBuf {
        self.path_auth_dir(alias).join("pass")
    }

    pub fn cache_dir(&self, alias: &str) -> PathBuf {
        self.site_dir(alias).join("cache")
    }

    pub fn log_dir(&self, alias: &str) -> PathBuf {
        self.site_dir(alias).join("log")
    }

    fn metadata_path(&self, alias: &str) -> PathBuf {
        self.site_dir(alias).join(METADATA_FILENAME)
    }

    pub fn exists(&self, alias: &str) -> bool {
        self.metadata_path(alias).exists()
    }

    pub fn get(&self, alias: &str) -> Result<Website> {
        let path = self.metadata_path(alias);
        let content =
            fs::read_to_string(&path).map_err(|_| Error::WebsiteNotFound(alias.to_string()))?;
        let website: Website = toml::from_str(&content)?;
        Ok(website)
    }

    /// Persist website metadata; called only after file-level changes have
    /// succeeded so the metadata never gets ahead of the live config
    pub fn save(&self, website: &Website) -> Result<()> {
        let dir = self.site_dir(&website.alias);
        fs::create_dir_all(&dir)?;
        let content =
            toml::to_string_pretty(website).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(self.metadata_path(&website.alias), content)?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<Website>> {
        if !self.sites_dir.exists() {
            return Ok(Vec::new());
        }

        let mut websites = Vec::new();
        for entry in fs::read_dir(&self.sites_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let alias = entry.file_name().to_string_lossy().to_string();
            if self.exists(&alias) {
                websites.push(self.get(&alias)?);
            }
        }

        websites.sort_by(|a, b| a.alias.cmp(&b.alias));
        Ok(websites)
    }
}
