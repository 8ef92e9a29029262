//! CLI command implementations

use anyhow::Result;
use std::fs;

use crate::api;
use crate::cli::{
    confirm, error, info, print_website_table, success, warn, NginxAction, OutputFormat,
};
use crate::config::{self, Config};
use crate::docker::DockerClient;
use crate::nginx;
use crate::task::TaskRegistry;
use crate::website::service::{CreateWebsiteRequest, WebsiteService};
use crate::website::WebsiteType;

/// Initialize a new sitectl.toml configuration file
pub async fn init() -> Result<()> {
    let config_path = std::path::Path::new("sitectl.toml");

    if config_path.exists() {
        warn("sitectl.toml already exists");
        return Ok(());
    }

    let content = config::loader::default_config_content();
    fs::write(config_path, content)?;

    success("Created sitectl.toml");
    info("Edit the configuration file and run 'sitectl create --domain <domain>' to add your first website");

    Ok(())
}

/// Create a new website
pub async fn create(
    domain: &str,
    alias: Option<String>,
    website_type: &str,
    proxy: String,
    extra_domains: Vec<String>,
    default_server: bool,
    parent: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    let service = build_service(config);

    let req = CreateWebsiteRequest {
        primary_domain: domain.to_string(),
        alias,
        website_type: parse_website_type(website_type)?,
        proxy,
        domains: extra_domains,
        default_server,
        parent,
    };

    info(&format!("Creating website for {}", domain));
    match service.create_website(req).await {
        Ok(website) => {
            success(&format!("Created website: {}", website.alias));
            Ok(())
        }
        Err(e) => {
            error(&format!("Failed to create website: {}", e));
            Err(e.into())
        }
    }
}

/// List all websites
pub async fn list(format: OutputFormat) -> Result<()> {
    let config = load_config()?;
    let service = build_service(config);

    let websites = service.store().list()?;

    match format {
        OutputFormat::Table => {
            print_website_table(&websites);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&websites)?;
            println!("{}", json);
        }
    }

    Ok(())
}

/// Delete a website
pub async fn delete(alias: &str, force: bool) -> Result<()> {
    let config = load_config()?;
    let service = build_service(config);

    if !force && !confirm(&format!("Delete website '{}' and its files?", alias)) {
        info("Aborted");
        return Ok(());
    }

    match service.delete_website(alias).await {
        Ok(()) => {
            success(&format!("Deleted website: {}", alias));
            Ok(())
        }
        Err(e) => {
            error(&format!("Failed to delete website: {}", e));
            Err(e.into())
        }
    }
}

/// Print a website's nginx config
pub async fn show_config(alias: &str) -> Result<()> {
    let config = load_config()?;
    let service = build_service(config);

    let content = service.get_website_config(alias)?;
    print!("{}", content);
    Ok(())
}

/// Start the HTTP API server
pub async fn serve(host: &str, port: u16) -> Result<()> {
    let config = load_config()?;
    api::run_server(config, host, port).await?;
    Ok(())
}

/// Manage the nginx process
pub async fn nginx(action: NginxAction) -> Result<()> {
    let config = load_config()?;
    let docker = docker_client(&config);

    match action {
        NginxAction::Check => {
            nginx::reload::check(&config.nginx, docker.as_ref()).await?;
            success("nginx configuration is valid");
        }
        NginxAction::Reload => {
            nginx::reload::check_and_reload(&config.nginx, docker.as_ref()).await?;
            success("nginx reloaded");
        }
    }
    Ok(())
}

fn load_config() -> Result<Config> {
    Ok(config::loader::load_config()?)
}

fn build_service(config: Config) -> WebsiteService {
    let docker = docker_client(&config);
    WebsiteService::new(config, docker, TaskRegistry::new())
}

fn docker_client(config: &Config) -> Option<DockerClient> {
    match DockerClient::new(&config.docker) {
        Ok(client) => Some(client),
        Err(e) => {
            warn(&format!("Docker unavailable: {}", e));
            None
        }
    }
}

fn parse_website_type(value: &str) -> Result<WebsiteType> {
    match value {
        "deployment" => Ok(WebsiteType::Deployment),
        "static" => Ok(WebsiteType::Static),
        "runtime" => Ok(WebsiteType::Runtime),
        "subsite" => Ok(WebsiteType::Subsite),
        "stream" => Ok(WebsiteType::Stream),
        other => anyhow::bail!("unknown website type: {}", other),
    }
}
