//! WAF site registry collaborator
//!
//! An optional external WAF keeps its own `conf/sites.json` mapping website
//! alias to the current domain/host set; it is reconciled whenever domains
//! change. Absence of the WAF directory disables all of this silently.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::NginxConfig;
use crate::error::Result;

use super::WebsiteDomain;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WafSite {
    pub key: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub host: Vec<String>,
}

fn sites_path(config: &NginxConfig) -> Option<PathBuf> {
    let waf_dir = config.waf_dir.as_ref()?;
    if !waf_dir.exists() {
        return None;
    }
    Some(waf_dir.join("conf").join("sites.json"))
}

fn load(path: &PathBuf) -> Result<Vec<WafSite>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

fn save(path: &PathBuf, sites: &[WafSite]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string(sites)?)?;
    Ok(())
}

/// Append the given domains to the alias's registry entry
pub fn add_domains(config: &NginxConfig, alias: &str, domains: &[WebsiteDomain]) -> Result<()> {
    let Some(path) = sites_path(config) else {
        return Ok(());
    };
    let mut sites = load(&path)?;

    match sites.iter_mut().find(|s| s.key == alias) {
        Some(site) => {
            for domain in domains {
                if !site.domains.contains(&domain.domain) {
                    site.domains.push(domain.domain.clone());
                }
                let host = format!("{}:{}", domain.domain, domain.port);
                if !site.host.contains(&host) {
                    site.host.push(host);
                }
            }
        }
        None => {
            sites.push(WafSite {
                key: alias.to_string(),
                domains: domains.iter().map(|d| d.domain.clone()).collect(),
                host: domains
                    .iter()
                    .map(|d| format!("{}:{}", d.domain, d.port))
                    .collect(),
            });
        }
    }

    save(&path, &sites)
}

/// Drop one (domain, port) binding from the alias's registry entry. The
/// domain name itself is kept when another binding still uses it.
pub fn remove_binding(
    config: &NginxConfig,
    alias: &str,
    domain: &WebsiteDomain,
    drop_domain_name: bool,
) -> Result<()> {
    let Some(path) = sites_path(config) else {
        return Ok(());
    };
    let mut sites = load(&path)?;

    if let Some(site) = sites.iter_mut().find(|s| s.key == alias) {
        if drop_domain_name {
            site.domains.retain(|d| d != &domain.domain);
        }
        let host = format!("{}:{}", domain.domain, domain.port);
        site.host.retain(|h| h != &host);
    }

    save(&path, &sites)
}

/// Remove the alias's registry entry entirely
pub fn remove_site(config: &NginxConfig, alias: &str) -> Result<()> {
    let Some(path) = sites_path(config) else {
        return Ok(());
    };
    let mut sites = load(&path)?;
    sites.retain(|s| s.key != alias);
    save(&path, &sites)
}
