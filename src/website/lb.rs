//! Load-balancer upstream management
//!
//! Each upstream lives in its own file under `upstream/` holding exactly one
//! `upstream` block, pulled into the http scope with an include glob. Stream
//! websites carry their upstream blocks directly in the site config instead,
//! since nginx stream includes live elsewhere.

use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::nginx::{self, upstream, NginxParam, UpstreamServer};

use super::service::{NginxScope, WebsiteService};
use super::Website;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteUpstream {
    pub name: String,

    /// Empty means nginx's default round-robin
    #[serde(default)]
    pub algorithm: String,

    pub servers: Vec<UpstreamServer>,

    /// Raw file content, read-back only
    #[serde(default)]
    pub content: String,
}

impl WebsiteService {
    pub async fn create_upstream(&self, alias: &str, req: WebsiteUpstream) -> Result<()> {
        validate_upstream(&req)?;
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store().get(alias)?;
        if website.is_stream() {
            return self.create_stream_upstream(&website, &req).await;
        }

        let dir = self.store().upstream_dir(alias);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.conf", req.name));
        if path.exists() {
            return Err(Error::NameExists(req.name));
        }

        let directive = upstream::build_upstream(&req.name, &req.algorithm, &req.servers);
        let mut root = nginx::Block::default();
        root.add_directive(directive);
        fs::write(&path, nginx::write(&root))?;

        let include = NginxParam {
            name: "include".to_string(),
            params: vec![format!(
                "{}/upstream/*.conf",
                self.config().nginx.site_prefix(alias)
            )],
        };
        if let Err(err) = self
            .update_nginx_config_unlocked(NginxScope::Http, &[include], &website)
            .await
        {
            let _ = fs::remove_file(&path);
            return Err(err);
        }
        Ok(())
    }

    pub async fn update_upstream(&self, alias: &str, req: WebsiteUpstream) -> Result<()> {
        validate_upstream(&req)?;
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store().get(alias)?;
        if website.is_stream() {
            return self.update_stream_upstream(&website, &req).await;
        }

        let path = self
            .store()
            .upstream_dir(alias)
            .join(format!("{}.conf", req.name));
        if !path.exists() {
            return Err(Error::NotFound(req.name));
        }

        let old_content = fs::read_to_string(&path)?;
        let mut root = nginx::parse(&old_content)?;
        let directive = root
            .directives
            .iter_mut()
            .find(|d| d.name == "upstream")
            .ok_or_else(|| Error::NginxParse("invalid upstream config, no block found".into()))?;
        upstream::set_algorithm(directive, &req.algorithm);
        upstream::set_servers(directive, &req.servers);
        fs::write(&path, nginx::write(&root))?;

        if let Err(err) = self
            .update_nginx_config_unlocked(NginxScope::Http, &[], &website)
            .await
        {
            fs::write(&path, old_content)?;
            return Err(err);
        }
        Ok(())
    }

    pub async fn delete_upstream(&self, alias: &str, name: &str) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store().get(alias)?;
        if website.is_stream() {
            return self.delete_stream_upstream(&website, name).await;
        }

        // a proxy rule still pointing at the upstream would leave nginx
        // unable to resolve it after the delete
        for proxy in self.get_proxies(alias)? {
            let target = proxy
                .proxy_pass
                .trim_start_matches("http://")
                .trim_start_matches("https://");
            if target == name {
                return Err(Error::UpstreamInUse(name.to_string()));
            }
        }

        let path = self
            .store()
            .upstream_dir(alias)
            .join(format!("{}.conf", name));
        let _ = fs::remove_file(&path);
        self.update_nginx_config_unlocked(NginxScope::Http, &[], &website)
            .await
    }

    pub fn get_upstreams(&self, alias: &str) -> Result<Vec<WebsiteUpstream>> {
        let website = self.store().get(alias)?;
        if website.is_stream() {
            return self.get_stream_upstreams(&website);
        }

        let dir = self.store().upstream_dir(alias);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<_> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("conf"))
            .collect();
        paths.sort();

        let mut res = Vec::new();
        for path in paths {
            let content = fs::read_to_string(&path)?;
            let root = nginx::parse(&content)?;
            for directive in root.find_upstreams() {
                if let Some((name, algorithm, servers)) = upstream::read_upstream(directive) {
                    res.push(WebsiteUpstream {
                        name,
                        algorithm,
                        servers,
                        content: content.clone(),
                    });
                }
            }
        }
        Ok(res)
    }

    async fn create_stream_upstream(&self, website: &Website, req: &WebsiteUpstream) -> Result<()> {
        let content = fs::read_to_string(self.store().conf_path(&website.alias))?;
        let root = nginx::parse(&content)?;
        if root
            .find_upstreams()
            .iter()
            .any(|d| d.params.first().map(String::as_str) == Some(req.name.as_str()))
        {
            return Err(Error::NameExists(req.name.clone()));
        }

        let directive = upstream::build_upstream(&req.name, &req.algorithm, &req.servers);
        self.apply_scoped(NginxScope::Http, website, move |block| {
            block.add_directive(directive);
            Ok(())
        })
        .await
    }

    async fn update_stream_upstream(&self, website: &Website, req: &WebsiteUpstream) -> Result<()> {
        let name = req.name.clone();
        let algorithm = req.algorithm.clone();
        let servers = req.servers.clone();
        self.apply_scoped(NginxScope::Http, website, move |block| {
            let directive = block
                .directives
                .iter_mut()
                .find(|d| {
                    d.name == "upstream"
                        && d.params.first().map(String::as_str) == Some(name.as_str())
                })
                .ok_or(Error::NotFound(name))?;
            upstream::set_algorithm(directive, &algorithm);
            upstream::set_servers(directive, &servers);
            Ok(())
        })
        .await
    }

    async fn delete_stream_upstream(&self, website: &Website, name: &str) -> Result<()> {
        let name = name.to_string();
        self.apply_scoped(NginxScope::Http, website, move |block| {
            block
                .directives
                .retain(|d| !(d.name == "upstream" && d.params.first() == Some(&name)));
            Ok(())
        })
        .await
    }

    fn get_stream_upstreams(&self, website: &Website) -> Result<Vec<WebsiteUpstream>> {
        let content = fs::read_to_string(self.store().conf_path(&website.alias))?;
        let root = nginx::parse(&content)?;
        let mut res = Vec::new();
        for directive in root.find_upstreams() {
            if let Some((name, algorithm, servers)) = upstream::read_upstream(directive) {
                let mut single = nginx::Block::default();
                single.add_directive(directive.clone());
                res.push(WebsiteUpstream {
                    name,
                    algorithm,
                    servers,
                    content: nginx::write(&single),
                });
            }
        }
        Ok(res)
    }
}

fn validate_upstream(req: &WebsiteUpstream) -> Result<()> {
    if req.servers.is_empty() {
        return Err(Error::NginxParse("upstream requires at least one server".into()));
    }
    if !req.algorithm.is_empty()
        && req.algorithm != "default"
        && !upstream::ALGORITHMS.contains(&req.algorithm.as_str())
    {
        return Err(Error::NginxParse(format!(
            "unsupported load-balancing algorithm: {}",
            req.algorithm
        )));
    }
    Ok(())
}
