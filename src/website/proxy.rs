//! Reverse-proxy rule builder
//!
//! One named rule file per website under `proxy/`: enabled rules end in
//! `.conf`, disabled ones in `.bak` (the server block only includes
//! `proxy/*.conf`, so renaming excludes a rule without losing it). Every
//! rule file holds exactly one location block.

use std::fs;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::nginx::{self, Location, LocationInfo, NginxParam, SubFilter};

use super::service::{NginxScope, WebsiteService};
use super::Website;

/// Initial location block for a new proxy rule
const PROXY_TEMPLATE: &str = r#"location / {
    proxy_pass http://127.0.0.1;
    proxy_set_header Host $host;
    proxy_set_header X-Real-IP $remote_addr;
    proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
    proxy_set_header X-Forwarded-Proto $scheme;
    proxy_http_version 1.1;
    proxy_set_header Upgrade $http_upgrade;
    proxy_set_header Connection $http_connection;
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operate {
    Create,
    Edit,
    Delete,
    Disable,
    Enable,
}

/// Proxy rule settings; doubles as the read-back shape of [`get_proxies`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteProxyConfig {
    pub operate: Operate,
    pub name: String,

    #[serde(default)]
    pub modifier: String,

    #[serde(rename = "match", default)]
    pub match_path: String,

    #[serde(default)]
    pub proxy_pass: String,

    #[serde(default)]
    pub proxy_host: String,

    #[serde(default)]
    pub cache: bool,

    #[serde(default)]
    pub server_cache_time: i64,

    #[serde(default)]
    pub server_cache_unit: String,

    /// Browser cache tri-state: positive sets `expires`, zero clears the
    /// self-set cache header, negative forces no-cache
    #[serde(default)]
    pub cache_time: i64,

    #[serde(default)]
    pub cache_unit: String,

    #[serde(default)]
    pub replaces: Vec<SubFilter>,

    #[serde(default)]
    pub sni: bool,

    #[serde(default)]
    pub proxy_ssl_name: String,

    #[serde(default)]
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

    // read-back only
    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyCacheUpdate {
    pub open: bool,

    #[serde(default)]
    pub share_cache: i64,
    #[serde(default)]
    pub share_cache_unit: String,

    #[serde(default)]
    pub cache_limit: f64,
    #[serde(default)]
    pub cache_limit_unit: String,

    #[serde(default)]
    pub cache_expire: i64,
    #[serde(default)]
    pub cache_expire_unit: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProxyCacheInfo {
    pub open: bool,
    pub share_cache: i64,
    pub share_cache_unit: String,
    pub cache_limit: f64,
    pub cache_limit_unit: String,
    pub cache_expire: i64,
    pub cache_expire_unit: String,
}

fn cache_zone(alias: &str) -> String {
    format!("proxy_cache_zone_of_{}", alias.replace(['.', '-'], "_"))
}

impl WebsiteService {
    pub async fn operate_proxy(&self, alias: &str, req: WebsiteProxyConfig) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store().get(alias)?;
        let include_dir = self.store().proxy_dir(alias);
        fs::create_dir_all(&include_dir)?;

        let conf_path = include_dir.join(format!("{}.conf", req.name));
        let bak_path = include_dir.join(format!("{}.bak", req.name));

        if req.operate == Operate::Create && (conf_path.exists() || bak_path.exists()) {
            return Err(Error::NameExists(req.name));
        }

        match req.operate {
            Operate::Delete => {
                let _ = fs::remove_file(&conf_path);
                let _ = fs::remove_file(&bak_path);
                return self
                    .update_nginx_config_unlocked(NginxScope::Server, &[], &website)
                    .await;
            }
            Operate::Disable => {
                if !conf_path.exists() {
                    return Err(Error::NotFound(req.name));
                }
                fs::rename(&conf_path, &bak_path)?;
                return self
                    .update_nginx_config_unlocked(NginxScope::Server, &[], &website)
                    .await;
            }
            Operate::Enable => {
                if !bak_path.exists() {
                    return Err(Error::NotFound(req.name));
                }
                fs::rename(&bak_path, &conf_path)?;
                return self
                    .update_nginx_config_unlocked(NginxScope::Server, &[], &website)
                    .await;
            }
            Operate::Create | Operate::Edit => {}
        }

        let old_content = if req.operate == Operate::Edit {
            Some(fs::read_to_string(&conf_path)?)
        } else {
            None
        };

        let mut root = match &old_content {
            Some(content) => nginx::parse(content)?,
            None => nginx::parse(PROXY_TEMPLATE)?,
        };

        self.build_proxy_location(&mut root, &req, &website).await?;

        fs::write(&conf_path, nginx::write(&root))?;

        let include = NginxParam {
            name: "include".to_string(),
            params: vec![format!(
                "{}/proxy/*.conf",
                self.config().nginx.site_prefix(alias)
            )],
        };
        if let Err(err) = self
            .update_nginx_config_unlocked(NginxScope::Server, &[include], &website)
            .await
        {
            // leave no half-applied rule behind
            match old_content {
                Some(content) => fs::write(&conf_path, content)?,
                None => {
                    let _ = fs::remove_file(&conf_path);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    async fn build_proxy_location(
        &self,
        root: &mut nginx::Block,
        req: &WebsiteProxyConfig,
        website: &Website,
    ) -> Result<()> {
        let zone = cache_zone(&website.alias);
        if req.cache {
            self.open_proxy_cache(website).await?;
        }

        let directive = root
            .directives
            .iter_mut()
            .find(|d| d.name == "location")
            .ok_or_else(|| Error::NginxParse("invalid proxy config, no location found".into()))?;
        let mut location = Location::new(directive)
            .ok_or_else(|| Error::NginxParse("invalid proxy config, no location found".into()))?;

        location.update_directive("proxy_pass", vec![req.proxy_pass.clone()]);
        location.update_directive(
            "proxy_set_header",
            vec!["Host".into(), req.proxy_host.clone()],
        );
        location.change_path(&req.modifier, &req.match_path);

        if req.cache {
            location.add_server_cache(&zone, req.server_cache_time, &req.server_cache_unit);
        } else {
            location.remove_server_cache();
        }

        if req.cache_time > 0 {
            location.add_browser_cache(req.cache_time, &req.cache_unit);
        } else if req.cache_time < 0 {
            location.add_browser_no_cache();
        } else {
            location.remove_browser_cache();
        }

        if req.replaces.is_empty() {
            location.clear_sub_filters();
        } else {
            location.set_sub_filters(&req.replaces);
        }

        if req.sni {
            location.update_directive("proxy_ssl_server_name", vec!["on".into()]);
            if !req.proxy_ssl_name.is_empty() {
                location.update_directive("proxy_ssl_name", vec![req.proxy_ssl_name.clone()]);
            }
        } else {
            location.update_directive("proxy_ssl_server_name", vec!["off".into()]);
        }

        if req.cors {
            location.update_directive(
                "add_header",
                vec![
                    "Access-Control-Allow-Origin".into(),
                    req.allow_origins.clone(),
                    "always".into(),
                ],
            );
            if req.allow_methods.is_empty() {
                location.remove_directive("add_header", &["Access-Control-Allow-Methods".into()]);
            } else {
                location.update_directive(
                    "add_header",
                    vec![
                        "Access-Control-Allow-Methods".into(),
                        req.allow_methods.clone(),
                        "always".into(),
                    ],
                );
            }
            if req.allow_headers.is_empty() {
                location.remove_directive("add_header", &["Access-Control-Allow-Headers".into()]);
            } else {
                location.update_directive(
                    "add_header",
                    vec![
                        "Access-Control-Allow-Headers".into(),
                        req.allow_headers.clone(),
                        "always".into(),
                    ],
                );
            }
            if req.allow_credentials {
                location.update_directive(
                    "add_header",
                    vec![
                        "Access-Control-Allow-Credentials".into(),
                        "true".into(),
                        "always".into(),
                    ],
                );
            } else {
                location
                    .remove_directive("add_header", &["Access-Control-Allow-Credentials".into()]);
            }
            if req.preflight {
                location.add_cors_option(
                    &req.allow_origins,
                    &req.allow_methods,
                    &req.allow_headers,
                    req.allow_credentials,
                );
            } else {
                location.remove_cors_option();
            }
        } else {
            location.remove_directive("add_header", &["Access-Control-Allow-Origin".into()]);
            location.remove_directive("add_header", &["Access-Control-Allow-Methods".into()]);
            location.remove_directive("add_header", &["Access-Control-Allow-Headers".into()]);
            location.remove_directive("add_header", &["Access-Control-Allow-Credentials".into()]);
            location.remove_cors_option();
        }

        Ok(())
    }

    /// All proxy rules of a website, reconstructed from the rule files
    pub fn get_proxies(&self, alias: &str) -> Result<Vec<WebsiteProxyConfig>> {
        let website = self.store().get(alias)?;
        let include_dir = self.store().proxy_dir(&website.alias);
        if !include_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(&include_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("conf") | Some("bak")
                )
            })
            .collect();
        entries.sort();

        let mut res = Vec::new();
        for path in entries {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let enable = path.extension().and_then(|e| e.to_str()) == Some("conf");
            let content = fs::read_to_string(&path)?;
            let root = nginx::parse(&content)?;
            let directive = root
                .directives
                .iter()
                .find(|d| d.name == "location")
                .ok_or_else(|| {
                    Error::NginxParse("invalid proxy config, no location found".into())
                })?;
            let info = LocationInfo::from_directive(directive).ok_or_else(|| {
                Error::NginxParse("invalid proxy config, no location found".into())
            })?;

            res.push(proxy_config_from_info(name, enable, content, info));
        }
        Ok(res)
    }

    /// Raw edit of one proxy rule file, with rollback on failed reload
    pub async fn update_proxy_file(&self, alias: &str, name: &str, content: &str) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store().get(alias)?;
        let path = self
            .store()
            .proxy_dir(&website.alias)
            .join(format!("{}.conf", name));
        if !path.exists() {
            return Err(Error::NotFound(name.to_string()));
        }
        self.write_with_rollback(&path, content).await
    }

    /// Ensure the per-site cache directory and the http-scope
    /// `proxy_cache_path` exist
    async fn open_proxy_cache(&self, website: &Website) -> Result<()> {
        fs::create_dir_all(self.store().cache_dir(&website.alias))?;

        let existing = self.get_nginx_params_by_keys(
            NginxScope::Http,
            &["proxy_cache_path"],
            website,
        )?;
        if !existing[0].params.is_empty() {
            return Ok(());
        }
        let params = default_cache_path_params(
            &self.config().nginx.site_prefix(&website.alias),
            &cache_zone(&website.alias),
        );
        self.update_nginx_config_unlocked(
            NginxScope::Http,
            &[NginxParam {
                name: "proxy_cache_path".into(),
                params,
            }],
            website,
        )
        .await
    }

    pub async fn update_proxy_cache(&self, alias: &str, req: ProxyCacheUpdate) -> Result<()> {
        let website = self.store().get(alias)?;
        fs::create_dir_all(self.store().cache_dir(&website.alias))?;

        if req.open {
            let params = vec![
                format!("{}/cache", self.config().nginx.site_prefix(alias)),
                "levels=1:2".to_string(),
                format!(
                    "keys_zone={}:{}{}",
                    cache_zone(alias),
                    req.share_cache,
                    req.share_cache_unit
                ),
                format!("max_size={}{}", req.cache_limit, req.cache_limit_unit),
                format!("inactive={}{}", req.cache_expire, req.cache_expire_unit),
            ];
            self.update_nginx_config(
                NginxScope::Http,
                &[NginxParam {
                    name: "proxy_cache_path".into(),
                    params,
                }],
                &website,
            )
            .await
        } else {
            self.delete_nginx_config(
                NginxScope::Http,
                &[NginxParam {
                    name: "proxy_cache_path".into(),
                    params: vec![],
                }],
                &website,
            )
            .await
        }
    }

    pub fn get_proxy_cache(&self, alias: &str) -> Result<ProxyCacheInfo> {
        let website = self.store().get(alias)?;
        let found =
            self.get_nginx_params_by_keys(NginxScope::Http, &["proxy_cache_path"], &website)?;
        let params = &found[0].params;

        let mut info = ProxyCacheInfo::default();
        if params.is_empty() {
            return Ok(info);
        }

        let zone_re = Regex::new(r"^keys_zone=[^:]+:(\d+)([a-z])$").expect("static regex");
        let size_re = Regex::new(r"^max_size=([\d.]+)([a-z])$").expect("static regex");
        let inactive_re = Regex::new(r"^inactive=(\d+)([a-z])$").expect("static regex");

        for param in params {
            if let Some(caps) = zone_re.captures(param) {
                info.share_cache = caps[1].parse().unwrap_or(0);
                info.share_cache_unit = caps[2].to_string();
            } else if let Some(caps) = size_re.captures(param) {
                info.cache_limit = caps[1].parse().unwrap_or(0.0);
                info.cache_limit_unit = caps[2].to_string();
            } else if let Some(caps) = inactive_re.captures(param) {
                info.cache_expire = caps[1].parse().unwrap_or(0);
                info.cache_expire_unit = caps[2].to_string();
            }
        }
        info.open = true;
        Ok(info)
    }

    /// Empty the proxy cache data directory and reload
    pub async fn clear_proxy_cache(&self, alias: &str) -> Result<()> {
        let website = self.store().get(alias)?;
        let cache_dir = self.store().cache_dir(&website.alias);
        if cache_dir.exists() {
            for entry in fs::read_dir(&cache_dir)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    fs::remove_dir_all(entry.path())?;
                } else {
                    fs::remove_file(entry.path())?;
                }
            }
        }
        self.check_and_reload().await
    }
}

fn default_cache_path_params(prefix: &str, zone: &str) -> Vec<String> {
    vec![
        format!("{}/cache", prefix),
        "levels=1:2".to_string(),
        format!("keys_zone={}:10m", zone),
        "max_size=1g".to_string(),
        "inactive=1d".to_string(),
    ]
}

fn proxy_config_from_info(
    name: String,
    enable: bool,
    content: String,
    info: LocationInfo,
) -> WebsiteProxyConfig {
    WebsiteProxyConfig {
        operate: Operate::Edit,
        name,
        modifier: info.modifier,
        match_path: info.path,
        proxy_pass: info.proxy_pass,
        proxy_host: info.host,
        cache: info.cache,
        server_cache_time: info.server_cache_time,
        server_cache_unit: info.server_cache_unit,
        cache_time: info.cache_time,
        cache_unit: info.cache_unit,
        replaces: info.replaces,
        sni: info.sni,
        proxy_ssl_name: info.proxy_ssl_name,
        cors: info.cors,
        allow_origins: info.allow_origins,
        allow_methods: info.allow_methods,
        allow_headers: info.allow_headers,
        allow_credentials: info.allow_credentials,
        preflight: info.preflight,
        enable,
        content,
    }
}
