//! HTTP redirect rules
//!
//! One rule file per redirect under `redirect/`, with the same
//! `.conf`/`.bak` enable toggle the proxy rules use. The rule kind is not
//! stored anywhere; `get_redirects` recovers it from the shape of the first
//! directive in the file (`rewrite` is a path rule, `if` a domain rule,
//! `error_page` a 404 rule).

use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::nginx::{self, Block, Directive, NginxParam};

use super::proxy::Operate;
use super::service::{NginxScope, WebsiteService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectType {
    Path,
    Domain,
    #[serde(rename = "404")]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteRedirect {
    pub operate: Operate,
    pub name: String,

    #[serde(rename = "type")]
    pub redirect_type: RedirectType,

    /// Source domains, domain rules only
    #[serde(default)]
    pub domains: Vec<String>,

    /// Source path, path rules only
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub target: String,

    /// Append the original path/query to the target
    #[serde(default)]
    pub keep_path: bool,

    /// HTTP status, "301" or "302"
    #[serde(default)]
    pub redirect: String,

    /// 404 rules only: send to the site root instead of `target`
    #[serde(default)]
    pub redirect_root: bool,

    // read-back only
    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub content: String,
}

impl WebsiteService {
    pub async fn operate_redirect(&self, alias: &str, req: WebsiteRedirect) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store().get(alias)?;
        let include_dir = self.store().redirect_dir(alias);
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

        fs::write(&conf_path, nginx::write(&build_redirect_block(&req)))?;

        let include = NginxParam {
            name: "include".to_string(),
            params: vec![format!(
                "{}/redirect/*.conf",
                self.config().nginx.site_prefix(alias)
            )],
        };
        if let Err(err) = self
            .update_nginx_config_unlocked(NginxScope::Server, &[include], &website)
            .await
        {
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

    pub fn get_redirects(&self, alias: &str) -> Result<Vec<WebsiteRedirect>> {
        let website = self.store().get(alias)?;
        let include_dir = self.store().redirect_dir(&website.alias);
        if !include_dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<_> = fs::read_dir(&include_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("conf") | Some("bak")
                )
            })
            .collect();
        paths.sort();

        let mut res = Vec::new();
        for path in paths {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let enable = path.extension().and_then(|e| e.to_str()) == Some("conf");
            let content = fs::read_to_string(&path)?;
            let root = nginx::parse(&content)?;
            if let Some(mut config) = read_redirect(&root) {
                config.name = name;
                config.enable = enable;
                config.content = content;
                res.push(config);
            }
        }
        Ok(res)
    }

    /// Raw edit of one redirect rule file, with rollback on failed reload
    pub async fn update_redirect_file(&self, alias: &str, name: &str, content: &str) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store().get(alias)?;
        let path = self
            .store()
            .redirect_dir(&website.alias)
            .join(format!("{}.conf", name));
        if !path.exists() {
            return Err(Error::NotFound(name.to_string()));
        }
        self.write_with_rollback(&path, content).await
    }
}

fn build_redirect_block(req: &WebsiteRedirect) -> Block {
    let mut block = Block::default();
    match req.redirect_type {
        RedirectType::Path => {
            let target = if req.keep_path {
                format!("{}$1", req.target)
            } else {
                format!("{}?", req.target)
            };
            let flag = if req.redirect == "302" {
                "redirect"
            } else {
                "permanent"
            };
            let pattern = format!("^{}(.*)", req.path);
            block.add_directive(Directive::simple("rewrite", &[&pattern, &target, flag]));
        }
        RedirectType::Domain => {
            let target = if req.keep_path {
                format!("{}$request_uri", req.target)
            } else {
                req.target.clone()
            };
            for domain in &req.domains {
                let mut inner = Block::default();
                inner.add_directive(Directive::simple("return", &[&req.redirect, &target]));
                let cond = format!("'^{}')", domain);
                block.add_directive(Directive::block("if", &["($host", "~", &cond], inner));
            }
        }
        RedirectType::NotFound => {
            let target = if req.redirect_root {
                "/".to_string()
            } else {
                req.target.clone()
            };
            block.add_directive(Directive::simple(
                "error_page",
                &["404", "=", "@notfound"],
            ));
            let mut inner = Block::default();
            inner.add_directive(Directive::simple("return", &[&req.redirect, &target]));
            block.add_directive(Directive::block("location", &["@notfound"], inner));
        }
    }
    block
}

fn read_redirect(root: &Block) -> Option<WebsiteRedirect> {
    let first = root.directives.iter().find(|d| !d.is_comment())?;

    let mut config = WebsiteRedirect {
        operate: Operate::Edit,
        name: String::new(),
        redirect_type: RedirectType::Path,
        domains: Vec::new(),
        path: String::new(),
        target: String::new(),
        keep_path: false,
        redirect: String::new(),
        redirect_root: false,
        enable: false,
        content: String::new(),
    };

    match first.name.as_str() {
        "if" => {
            config.redirect_type = RedirectType::Domain;
            for directive in root.directives.iter().filter(|d| d.name == "if") {
                if directive.params.len() > 2 && directive.params[0] == "($host" {
                    let domain = directive.params[2]
                        .trim_matches('\'')
                        .trim_start_matches('^')
                        .trim_end_matches(')')
                        .trim_end_matches('\'')
                        .to_string();
                    config.domains.push(domain);
                }
                let block = directive.block.as_ref()?;
                for ret in block.directives.iter().filter(|d| d.name == "return") {
                    if ret.params.len() > 1 {
                        config.redirect = ret.params[0].clone();
                        if let Some(stripped) = ret.params[1].strip_suffix("$request_uri") {
                            config.keep_path = true;
                            config.target = stripped.to_string();
                        } else {
                            config.target = ret.params[1].clone();
                        }
                    }
                }
            }
        }
        "rewrite" => {
            config.redirect_type = RedirectType::Path;
            if first.params.len() > 2 {
                config.path = first.params[0]
                    .trim_start_matches('^')
                    .trim_end_matches("(.*)")
                    .to_string();
                if let Some(stripped) = first.params[1].strip_suffix("$1") {
                    config.keep_path = true;
                    config.target = stripped.to_string();
                } else {
                    config.target = first.params[1].trim_end_matches('?').to_string();
                }
                config.redirect = if first.params[2] == "permanent" {
                    "301".to_string()
                } else {
                    "302".to_string()
                };
            }
        }
        "error_page" => {
            config.redirect_type = RedirectType::NotFound;
            for location in root.directives.iter().filter(|d| d.name == "location") {
                let block = location.block.as_ref()?;
                for ret in block.directives.iter().filter(|d| d.name == "return") {
                    if ret.params.len() > 1 {
                        config.redirect = ret.params[0].clone();
                        if let Some(stripped) = ret.params[1].strip_suffix("$request_uri") {
                            config.keep_path = true;
                            config.target = stripped.to_string();
                        } else {
                            config.target = ret.params[1].clone();
                            config.redirect_root = config.target == "/";
                        }
                    }
                }
            }
        }
        _ => return None,
    }
    Some(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(redirect_type: RedirectType) -> WebsiteRedirect {
        WebsiteRedirect {
            operate: Operate::Create,
            name: "r1".into(),
            redirect_type,
            domains: vec![],
            path: String::new(),
            target: "https://new.example.com".into(),
            keep_path: true,
            redirect: "301".into(),
            redirect_root: false,
            enable: false,
            content: String::new(),
        }
    }

    #[test]
    fn path_redirect_round_trips_through_its_shape() {
        let mut req = base(RedirectType::Path);
        req.path = "/old".into();
        let block = build_redirect_block(&req);
        let parsed = nginx::parse(&nginx::write(&block)).unwrap();
        let read = read_redirect(&parsed).unwrap();
        assert_eq!(read.redirect_type, RedirectType::Path);
        assert_eq!(read.path, "/old");
        assert_eq!(read.target, "https://new.example.com");
        assert!(read.keep_path);
        assert_eq!(read.redirect, "301");
    }

    #[test]
    fn domain_redirect_collects_all_domains() {
        let mut req = base(RedirectType::Domain);
        req.domains = vec!["a.example.com".into(), "b.example.com".into()];
        let block = build_redirect_block(&req);
        let parsed = nginx::parse(&nginx::write(&block)).unwrap();
        let read = read_redirect(&parsed).unwrap();
        assert_eq!(read.redirect_type, RedirectType::Domain);
        assert_eq!(read.domains, vec!["a.example.com", "b.example.com"]);
        assert!(read.keep_path);
    }

    #[test]
    fn not_found_redirect_root_detected() {
        let mut req = base(RedirectType::NotFound);
        req.keep_path = false;
        req.redirect_root = true;
        let block = build_redirect_block(&req);
        let parsed = nginx::parse(&nginx::write(&block)).unwrap();
        let read = read_redirect(&parsed).unwrap();
        assert_eq!(read.redirect_type, RedirectType::NotFound);
        assert!(read.redirect_root);
        assert_eq!(read.target, "/");
    }
}
