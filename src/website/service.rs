//! Website service: lifecycle plus the scoped config update/delete
//! primitives every rule builder goes through
//!
//! Every mutation follows the same shape: snapshot the current file, parse,
//! locate the scope, apply the changes, write, syntax-check and reload the
//! proxy. If the check or reload fails the snapshot is written back so the
//! file on disk never disagrees with the running process.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::docker::DockerClient;
use crate::error::{Error, Result};
use crate::nginx::location::{cors_preflight_block, CORS_OPTIONS_PARAMS};
use crate::nginx::{self, Block, Directive, NginxParam};
use crate::task::TaskRegistry;

use super::{waf, Protocol, Website, WebsiteDomain, WebsiteStore, WebsiteType};

/// The target block a config operation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NginxScope {
    /// The site's `server` block
    Server,
    /// The file root, included at nginx http level
    Http,
}

/// Initial server block for HTTP websites
const SITE_TEMPLATE: &str = r#"server {
{%- for listen in listens %}
    listen {{ listen }};
{%- endfor %}
    server_name {{ server_name }};
    index index.html index.htm;
{%- if root %}
    root {{ root }};
{%- endif %}
{%- if proxy_pass %}
    location / {
        proxy_pass {{ proxy_pass }};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }
{%- endif %}
    access_log {{ access_log }};
    error_log {{ error_log }};
}
"#;

/// Initial config for TCP/UDP stream listeners
const STREAM_TEMPLATE: &str = r#"server {
{%- for listen in listens %}
    listen {{ listen }};
{%- endfor %}
    proxy_pass {{ proxy_pass }};
}
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWebsiteRequest {
    pub primary_domain: String,

    #[serde(default)]
    pub alias: Option<String>,

    #[serde(default)]
    pub website_type: WebsiteType,

    /// Upstream target for deployment/runtime/stream sites
    #[serde(default)]
    pub proxy: String,

    /// Additional `domain[:port]` bindings
    #[serde(default)]
    pub domains: Vec<String>,

    #[serde(default)]
    pub default_server: bool,

    /// Alias of the parent website; required for subsites, whose document
    /// root lives under the parent's site directory
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateWebsiteRequest {
    /// Filled from the URL path by the API layer
    #[serde(default)]
    pub alias: String,
    pub access_log: bool,
    pub error_log: bool,
    pub default_server: bool,
}

/// Headers nginx's realip module knows natively; anything else is carried
/// through `ip_other`
const REAL_IP_HEADERS: &[&str] = &["X-Forwarded-For", "X-Real-IP", "proxy_protocol"];

/// Client-IP restoration settings for one website
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebsiteRealIp {
    pub open: bool,

    /// Trusted proxy addresses, one IP or CIDR range each
    #[serde(default)]
    pub ip_from: Vec<String>,

    #[serde(default)]
    pub ip_header: String,

    /// Custom header name when `ip_header` is "other"
    #[serde(default)]
    pub ip_other: String,
}

/// Server-wide CORS headers, distinct from the per-proxy-rule settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    pub cors: bool,

    #[serde(default)]
    pub allow_origins: String,

    #[serde(default)]
    pub allow_methods: String,

    #[serde(default)]
    pub allow_headers: String,

    #[serde(default)]
    pub allow_credentials: bool,

    #[serde(default)]
    pub preflight: bool,
}

pub struct WebsiteService {
    config: Config,
    store: WebsiteStore,
    docker: Option<DockerClient>,
    tasks: TaskRegistry,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WebsiteService {
    pub fn new(config: Config, docker: Option<DockerClient>, tasks: TaskRegistry) -> Self {
        let store = WebsiteStore::new(config.nginx.sites_dir.clone());
        Self {
            config,
            store,
            docker,
            tasks,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &WebsiteStore {
        &self.store
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// Serialize config mutations per website alias. Everything between
    /// read and reload must happen under this lock.
    pub(crate) async fn alias_lock(&self, alias: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(alias.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(crate) async fn check_and_reload(&self) -> Result<()> {
        nginx::reload::check_and_reload(&self.config.nginx, self.docker.as_ref()).await
    }

    /// Apply a batch of directive updates to one scope of a website's
    /// config, then syntax-check and reload; rolls the file back on failure.
    ///
    /// An empty batch still performs the write-check-reload cycle, which the
    /// rule builders use to re-validate include globs after file renames.
    pub async fn update_nginx_config(
        &self,
        scope: NginxScope,
        params: &[NginxParam],
        website: &Website,
    ) -> Result<()> {
        let lock = self.alias_lock(&website.alias).await;
        let _guard = lock.lock().await;
        self.update_nginx_config_unlocked(scope, params, website)
            .await
    }

    pub(crate) async fn update_nginx_config_unlocked(
        &self,
        scope: NginxScope,
        params: &[NginxParam],
        website: &Website,
    ) -> Result<()> {
        self.apply_scoped(scope, website, |block| {
            for param in params {
                block.update_directive(&param.name, param.params.clone());
            }
            Ok(())
        })
        .await
    }

    /// Remove a batch of directives from one scope; empty `params` on an
    /// entry removes every directive with that name.
    pub async fn delete_nginx_config(
        &self,
        scope: NginxScope,
        params: &[NginxParam],
        website: &Website,
    ) -> Result<()> {
        let lock = self.alias_lock(&website.alias).await;
        let _guard = lock.lock().await;
        self.delete_nginx_config_unlocked(scope, params, website)
            .await
    }

    pub(crate) async fn delete_nginx_config_unlocked(
        &self,
        scope: NginxScope,
        params: &[NginxParam],
        website: &Website,
    ) -> Result<()> {
        self.apply_scoped(scope, website, |block| {
            for param in params {
                block.remove_directive(&param.name, &param.params);
            }
            Ok(())
        })
        .await
    }

    /// Read directives back from one scope, one entry per matching
    /// directive; a missing key yields a single entry with empty params
    pub fn get_nginx_params_by_keys(
        &self,
        scope: NginxScope,
        keys: &[&str],
        website: &Website,
    ) -> Result<Vec<NginxParam>> {
        let content = fs::read_to_string(self.store.conf_path(&website.alias))?;
        let mut root = nginx::parse(&content)?;
        let block = scope_block(&mut root, scope)?;

        let mut found = Vec::new();
        for key in keys {
            let matches = block.find_directives(key);
            if matches.is_empty() {
                found.push(NginxParam {
                    name: key.to_string(),
                    params: Vec::new(),
                });
                continue;
            }
            for directive in matches {
                found.push(NginxParam {
                    name: key.to_string(),
                    params: directive.params.clone(),
                });
            }
        }
        Ok(found)
    }

    /// The snapshot-mutate-write-reload-rollback core.
    pub(crate) async fn apply_scoped<F>(
        &self,
        scope: NginxScope,
        website: &Website,
        mutate: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Block) -> Result<()>,
    {
        let conf_path = self.store.conf_path(&website.alias);
        let old_content = fs::read_to_string(&conf_path)?;

        let mut root = nginx::parse(&old_content)?;
        mutate(scope_block(&mut root, scope)?)?;
        let new_content = nginx::write(&root);

        fs::write(&conf_path, &new_content)?;

        if let Err(err) = self.check_and_reload().await {
            tracing::error!(
                "Apply failed for '{}', restoring previous config: {}",
                website.alias,
                err
            );
            fs::write(&conf_path, &old_content)?;
            return Err(err);
        }

        Ok(())
    }

    /// Like [`Self::apply_scoped`] but hands the mutation a typed [`Server`]
    /// view over the site's server directive
    pub(crate) async fn apply_server<F>(&self, website: &Website, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut crate::nginx::Server<'_>) -> Result<()>,
    {
        let conf_path = self.store.conf_path(&website.alias);
        let old_content = fs::read_to_string(&conf_path)?;

        let mut root = nginx::parse(&old_content)?;
        {
            let directive = root
                .first_server_mut()
                .ok_or_else(|| Error::NginxParse("no server block found".to_string()))?;
            let mut server = crate::nginx::Server::new(directive)
                .ok_or_else(|| Error::NginxParse("no server block found".to_string()))?;
            mutate(&mut server)?;
        }
        let new_content = nginx::write(&root);

        fs::write(&conf_path, &new_content)?;

        if let Err(err) = self.check_and_reload().await {
            tracing::error!(
                "Apply failed for '{}', restoring previous config: {}",
                website.alias,
                err
            );
            fs::write(&conf_path, &old_content)?;
            return Err(err);
        }

        Ok(())
    }

    /// Write raw config content with snapshot rollback; the content is
    /// parsed first so malformed input never reaches the write.
    pub(crate) async fn write_with_rollback(
        &self,
        path: &std::path::Path,
        content: &str,
    ) -> Result<()> {
        nginx::parse(content)?;
        let old_content = fs::read_to_string(path).unwrap_or_default();
        fs::write(path, content)?;
        if let Err(err) = self.check_and_reload().await {
            fs::write(path, &old_content)?;
            return Err(err);
        }
        Ok(())
    }

    // Website lifecycle

    pub async fn create_website(&self, req: CreateWebsiteRequest) -> Result<Website> {
        let (primary, mut domains) = self.parse_domains(&req)?;

        let alias = match &req.alias {
            Some(alias) => alias.clone(),
            None => sanitize_alias(&primary.domain),
        };
        validate_alias(&alias)?;

        let parent = match req.website_type {
            WebsiteType::Subsite => {
                let parent_alias = req
                    .parent
                    .as_deref()
                    .ok_or_else(|| Error::NotFound("parent website".to_string()))?;
                Some(self.store.get(parent_alias)?.alias)
            }
            _ => None,
        };

        let lock = self.alias_lock(&alias).await;
        let _guard = lock.lock().await;

        if self.store.exists(&alias) || self.store.site_dir(&alias).exists() {
            return Err(Error::WebsiteExists(alias));
        }

        let protocol = if req.website_type == WebsiteType::Stream {
            Protocol::Stream
        } else {
            Protocol::Http
        };

        domains.insert(0, primary.clone());

        let website = Website {
            alias: alias.clone(),
            primary_domain: primary.domain.clone(),
            website_type: req.website_type,
            protocol,
            proxy: req.proxy.clone(),
            ssl: None,
            default_server: req.default_server,
            access_log: true,
            error_log: true,
            parent,
            rewrite: String::new(),
            domains,
            created_at: chrono::Utc::now(),
        };

        tracing::info!("Creating website '{}'", alias);
        self.create_site_dirs(&alias)?;

        let content = self.render_site_conf(&website)?;
        fs::write(self.store.conf_path(&alias), &content)?;

        if let Err(err) = self.check_and_reload().await {
            tracing::error!("Website '{}' failed validation, removing: {}", alias, err);
            let _ = fs::remove_dir_all(self.store.site_dir(&alias));
            return Err(err);
        }

        self.store.save(&website)?;
        tracing::info!("Successfully created website '{}'", alias);
        Ok(website)
    }

    fn parse_domains(
        &self,
        req: &CreateWebsiteRequest,
    ) -> Result<(WebsiteDomain, Vec<WebsiteDomain>)> {
        let nginx = &self.config.nginx;
        let primary = super::domain::parse_domain(&req.primary_domain, nginx)?;
        let mut rest = Vec::new();
        for input in &req.domains {
            let domain = super::domain::parse_domain(input, nginx)?;
            if domain == primary || rest.contains(&domain) {
                return Err(Error::DomainExists(domain.domain));
            }
            rest.push(domain);
        }
        Ok((primary, rest))
    }

    fn create_site_dirs(&self, alias: &str) -> Result<()> {
        fs::create_dir_all(self.store.site_dir(alias))?;
        fs::create_dir_all(self.store.proxy_dir(alias))?;
        fs::create_dir_all(self.store.upstream_dir(alias))?;
        fs::create_dir_all(self.store.redirect_dir(alias))?;
        fs::create_dir_all(self.store.site_dir(alias).join("rewrite"))?;
        fs::create_dir_all(self.store.site_dir(alias).join("auth_basic"))?;
        fs::create_dir_all(self.store.path_auth_pass_dir(alias))?;
        fs::create_dir_all(self.store.cache_dir(alias))?;
        fs::create_dir_all(self.store.log_dir(alias))?;
        fs::write(self.store.log_dir(alias).join("access.log"), "")?;
        fs::write(self.store.log_dir(alias).join("error.log"), "")?;
        Ok(())
    }

    fn render_site_conf(&self, website: &Website) -> Result<String> {
        let prefix = self.config.nginx.site_prefix(&website.alias);

        let listens: Vec<String> = website
            .domains
            .iter()
            .map(|d| listen_value(d, website.default_server))
            .collect();

        let mut env = Environment::new();
        let rendered = if website.is_stream() {
            env.add_template("stream", STREAM_TEMPLATE)?;
            env.get_template("stream")?.render(context! {
                listens => listens,
                proxy_pass => website.proxy,
            })?
        } else {
            let server_name = website
                .domains
                .iter()
                .map(|d| d.domain.clone())
                .collect::<Vec<_>>()
                .join(" ");
            let root = match website.website_type {
                WebsiteType::Static | WebsiteType::Runtime => {
                    Some(format!("{}/index", prefix))
                }
                // subsites serve out of the parent's document root
                WebsiteType::Subsite => website.parent.as_ref().map(|parent| {
                    format!(
                        "{}/index/{}",
                        self.config.nginx.site_prefix(parent),
                        website.alias
                    )
                }),
                _ => None,
            };
            let proxy_pass = if website.proxy.is_empty() {
                None
            } else {
                Some(website.proxy.clone())
            };
            env.add_template("site", SITE_TEMPLATE)?;
            env.get_template("site")?.render(context! {
                listens => listens,
                server_name => server_name,
                root => root,
                proxy_pass => proxy_pass,
                access_log => format!("{}/log/access.log", prefix),
                error_log => format!("{}/log/error.log", prefix),
            })?
        };

        Ok(rendered)
    }

    pub async fn delete_website(&self, alias: &str) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store.get(alias)?;

        let children: Vec<String> = self
            .store
            .list()?
            .into_iter()
            .filter(|w| w.parent.as_deref() == Some(alias))
            .map(|w| w.alias)
            .collect();
        if !children.is_empty() {
            return Err(Error::Other(format!(
                "website '{}' still has subsites: {}",
                alias,
                children.join(", ")
            )));
        }

        tracing::info!("Deleting website '{}'", alias);

        // config removal must precede metadata deletion so the alias is
        // never orphaned in the live proxy
        fs::remove_file(self.store.conf_path(alias))?;
        if let Err(err) = self.check_and_reload().await {
            tracing::warn!("Reload after removing '{}' failed: {}", alias, err);
        }

        waf::remove_site(&self.config.nginx, &website.alias)?;

        fs::remove_dir_all(self.store.site_dir(alias))?;
        tracing::info!("Successfully deleted website '{}'", alias);
        Ok(())
    }

    /// Toggle log directives and the default-server flag on the site's
    /// server block
    pub async fn update_website(&self, req: UpdateWebsiteRequest) -> Result<Website> {
        let lock = self.alias_lock(&req.alias).await;
        let _guard = lock.lock().await;

        let mut website = self.store.get(&req.alias)?;
        let prefix = self.config.nginx.site_prefix(&website.alias);
        let domains = website.domains.clone();

        // only one server per port may carry default_server; strip it from
        // the previous holder before claiming it here
        if req.default_server {
            for other in self.store.list()? {
                if other.alias == req.alias || !other.default_server {
                    continue;
                }
                let other_lock = self.alias_lock(&other.alias).await;
                let _other_guard = other_lock.lock().await;
                self.apply_scoped(NginxScope::Server, &other, |block| {
                    for directive in
                        block.directives.iter_mut().filter(|d| d.name == "listen")
                    {
                        directive.params.retain(|p| p != "default_server");
                    }
                    Ok(())
                })
                .await?;
                let mut cleared = other;
                cleared.default_server = false;
                self.store.save(&cleared)?;
            }
        }

        self.apply_scoped(NginxScope::Server, &website, |block| {
            let access_log = if req.access_log {
                format!("{}/log/access.log", prefix)
            } else {
                "off".to_string()
            };
            block.update_directive("access_log", vec![access_log]);
            if req.error_log {
                block.update_directive(
                    "error_log",
                    vec![format!("{}/log/error.log", prefix)],
                );
            } else {
                block.remove_directive("error_log", &[]);
            }

            for domain in &domains {
                let bind = domain.port.to_string();
                if let Some(existing) = block
                    .directives
                    .iter_mut()
                    .find(|d| d.name == "listen" && d.params.first() == Some(&bind))
                {
                    existing.params.retain(|p| p != "default_server");
                    if req.default_server {
                        existing.params.push("default_server".to_string());
                    }
                }
            }
            Ok(())
        })
        .await?;

        website.access_log = req.access_log;
        website.error_log = req.error_log;
        website.default_server = req.default_server;
        self.store.save(&website)?;
        Ok(website)
    }

    /// Raw config read for one website
    pub fn get_website_config(&self, alias: &str) -> Result<String> {
        let website = self.store.get(alias)?;
        Ok(fs::read_to_string(self.store.conf_path(&website.alias))?)
    }

    /// Raw config write with parse validation and rollback
    pub async fn update_website_config(&self, alias: &str, content: &str) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store.get(alias)?;
        self.write_with_rollback(&self.store.conf_path(&website.alias), content)
            .await
    }

    /// Configure client-IP restoration (`set_real_ip_from` /
    /// `real_ip_header`) on the site's server block
    pub async fn set_real_ip_config(&self, alias: &str, req: WebsiteRealIp) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store.get(alias)?;
        let clear = [
            NginxParam {
                name: "real_ip_recursive".to_string(),
                params: vec![],
            },
            NginxParam {
                name: "set_real_ip_from".to_string(),
                params: vec![],
            },
            NginxParam {
                name: "real_ip_header".to_string(),
                params: vec![],
            },
        ];

        if !req.open {
            return self
                .delete_nginx_config_unlocked(NginxScope::Server, &clear, &website)
                .await;
        }

        let mut params = vec![NginxParam {
            name: "real_ip_recursive".to_string(),
            params: vec!["on".to_string()],
        }];
        for ip in &req.ip_from {
            let ip = ip.trim();
            if ip.is_empty() {
                continue;
            }
            validate_ip_or_cidr(ip)?;
            params.push(NginxParam {
                name: "set_real_ip_from".to_string(),
                params: vec![ip.to_string()],
            });
        }
        let header = if req.ip_header == "other" {
            req.ip_other.clone()
        } else {
            req.ip_header.clone()
        };
        params.push(NginxParam {
            name: "real_ip_header".to_string(),
            params: vec![header],
        });

        self.delete_nginx_config_unlocked(NginxScope::Server, &clear, &website)
            .await?;
        self.update_nginx_config_unlocked(NginxScope::Server, &params, &website)
            .await
    }

    pub fn get_real_ip_config(&self, alias: &str) -> Result<WebsiteRealIp> {
        let website = self.store.get(alias)?;

        let found =
            self.get_nginx_params_by_keys(NginxScope::Server, &["real_ip_recursive"], &website)?;
        if found.first().map_or(true, |p| p.params.is_empty()) {
            return Ok(WebsiteRealIp::default());
        }

        let mut info = WebsiteRealIp {
            open: true,
            ..Default::default()
        };
        let params = self.get_nginx_params_by_keys(
            NginxScope::Server,
            &["set_real_ip_from", "real_ip_header"],
            &website,
        )?;
        for param in params {
            match param.name.as_str() {
                "set_real_ip_from" if !param.params.is_empty() => {
                    info.ip_from.push(param.params[0].clone());
                }
                "real_ip_header" if !param.params.is_empty() => {
                    if REAL_IP_HEADERS.contains(&param.params[0].as_str()) {
                        info.ip_header = param.params[0].clone();
                    } else {
                        info.ip_header = "other".to_string();
                        info.ip_other = param.params[0].clone();
                    }
                }
                _ => {}
            }
        }
        Ok(info)
    }

    /// Replace the server-wide CORS headers and preflight block; distinct
    /// from the per-proxy-rule CORS settings
    pub async fn update_cors(&self, alias: &str, req: CorsConfig) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store.get(alias)?;
        self.apply_scoped(NginxScope::Server, &website, |block| {
            for header in [
                "Access-Control-Allow-Origin",
                "Access-Control-Allow-Methods",
                "Access-Control-Allow-Headers",
                "Access-Control-Allow-Credentials",
            ] {
                block.remove_directive("add_header", &[header.to_string()]);
            }
            let options: Vec<String> =
                CORS_OPTIONS_PARAMS.iter().map(|s| s.to_string()).collect();
            block.remove_directive_exact("if", &options);

            if req.cors {
                block.update_directive(
                    "add_header",
                    vec![
                        "Access-Control-Allow-Origin".to_string(),
                        req.allow_origins.clone(),
                        "always".to_string(),
                    ],
                );
                if !req.allow_methods.is_empty() {
                    block.update_directive(
                        "add_header",
                        vec![
                            "Access-Control-Allow-Methods".to_string(),
                            req.allow_methods.clone(),
                            "always".to_string(),
                        ],
                    );
                }
                if !req.allow_headers.is_empty() {
                    block.update_directive(
                        "add_header",
                        vec![
                            "Access-Control-Allow-Headers".to_string(),
                            req.allow_headers.clone(),
                            "always".to_string(),
                        ],
                    );
                }
                if req.allow_credentials {
                    block.update_directive(
                        "add_header",
                        vec![
                            "Access-Control-Allow-Credentials".to_string(),
                            "true".to_string(),
                            "always".to_string(),
                        ],
                    );
                }
                if req.preflight {
                    block.upsert(Directive::block(
                        "if",
                        CORS_OPTIONS_PARAMS,
                        cors_preflight_block(
                            &req.allow_origins,
                            &req.allow_methods,
                            &req.allow_headers,
                            req.allow_credentials,
                        ),
                    ));
                }
            }
            Ok(())
        })
        .await
    }

    pub fn get_cors(&self, alias: &str) -> Result<CorsConfig> {
        let website = self.store.get(alias)?;
        let content = fs::read_to_string(self.store.conf_path(&website.alias))?;
        let mut root = nginx::parse(&content)?;
        let block = scope_block(&mut root, NginxScope::Server)?;

        let mut cors = CorsConfig::default();
        for directive in block.find_directives("add_header") {
            match directive.params.first().map(String::as_str) {
                Some("Access-Control-Allow-Origin") => {
                    cors.cors = true;
                    cors.allow_origins = directive.params.get(1).cloned().unwrap_or_default();
                }
                Some("Access-Control-Allow-Methods") => {
                    cors.allow_methods = directive.params.get(1).cloned().unwrap_or_default();
                }
                Some("Access-Control-Allow-Headers") => {
                    cors.allow_headers = directive.params.get(1).cloned().unwrap_or_default();
                }
                Some("Access-Control-Allow-Credentials") => {
                    cors.allow_credentials = true;
                }
                _ => {}
            }
        }
        cors.preflight = block
            .directives
            .iter()
            .any(|d| d.name == "if" && d.params == CORS_OPTIONS_PARAMS && d.block.is_some());
        Ok(cors)
    }
}

/// Locate the block a scope addresses within a parsed site config
pub(crate) fn scope_block(root: &mut Block, scope: NginxScope) -> Result<&mut Block> {
    match scope {
        NginxScope::Http => Ok(root),
        NginxScope::Server => root
            .first_server_mut()
            .and_then(|d| d.block.as_mut())
            .ok_or_else(|| Error::NginxParse("no server block found".to_string())),
    }
}

fn listen_value(domain: &WebsiteDomain, default_server: bool) -> String {
    let mut value = domain.port.to_string();
    if domain.ssl {
        value.push_str(" ssl");
    }
    if default_server {
        value.push_str(" default_server");
    }
    value
}

/// Accept a plain IP address or a CIDR range
fn validate_ip_or_cidr(value: &str) -> Result<()> {
    if value.parse::<std::net::IpAddr>().is_ok() {
        return Ok(());
    }
    if let Some((addr, prefix)) = value.split_once('/') {
        let max = match addr.parse::<std::net::IpAddr>() {
            Ok(std::net::IpAddr::V4(_)) => 32u8,
            Ok(std::net::IpAddr::V6(_)) => 128u8,
            Err(_) => return Err(Error::InvalidIp(value.to_string())),
        };
        if matches!(prefix.parse::<u8>(), Ok(bits) if bits <= max) {
            return Ok(());
        }
    }
    Err(Error::InvalidIp(value.to_string()))
}

fn sanitize_alias(domain: &str) -> String {
    domain
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

pub(crate) fn validate_alias(alias: &str) -> Result<()> {
    let valid = !alias.is_empty()
        && alias
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "-_.".contains(c))
        && !alias.starts_with('.')
        && alias != "*";
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidAlias(alias.to_string()))
    }
}
