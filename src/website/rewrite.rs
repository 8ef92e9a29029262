//! URL rewrite configuration
//!
//! Each website owns a single `rewrite/<alias>.conf` pulled in at server
//! scope. Builtin presets ship with the binary; custom presets live as plain
//! files under the panel-level rewrite directory.

use std::fs;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::nginx::NginxParam;

use super::service::{NginxScope, WebsiteService};

const REWRITE_WORDPRESS: &str = r#"location / {
    try_files $uri $uri/ /index.php?$args;
}

rewrite /wp-admin$ $scheme://$host$uri/ permanent;
"#;

const REWRITE_LARAVEL: &str = r#"location / {
    try_files $uri $uri/ /index.php?$query_string;
}
"#;

const REWRITE_TYPECHO: &str = r#"if (!-e $request_filename) {
    rewrite ^(.*)$ /index.php$1 last;
}
"#;

const REWRITE_THINKPHP: &str = r#"location / {
    if (!-e $request_filename) {
        rewrite ^(.*)$ /index.php?s=$1 last;
        break;
    }
}
"#;

const BUILTIN_REWRITES: &[(&str, &str)] = &[
    ("wordpress", REWRITE_WORDPRESS),
    ("laravel", REWRITE_LARAVEL),
    ("typecho", REWRITE_TYPECHO),
    ("thinkphp", REWRITE_THINKPHP),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteOperate {
    Create,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomRewrite {
    pub operate: RewriteOperate,
    pub name: String,

    #[serde(default)]
    pub content: String,
}

impl WebsiteService {
    /// Replace the website's rewrite rules and remember the preset name
    pub async fn update_rewrite_config(
        &self,
        alias: &str,
        name: &str,
        content: &str,
    ) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let mut website = self.store().get(alias)?;
        let rewrite_path = self.store().rewrite_path(alias);
        if let Some(parent) = rewrite_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let old_content = if rewrite_path.exists() {
            fs::read_to_string(&rewrite_path)?
        } else {
            String::new()
        };
        fs::write(&rewrite_path, content)?;

        let include = NginxParam {
            name: "include".to_string(),
            params: vec![format!(
                "{}/rewrite/{}.conf",
                self.config().nginx.site_prefix(alias),
                alias
            )],
        };
        if let Err(err) = self
            .update_nginx_config_unlocked(NginxScope::Server, &[include], &website)
            .await
        {
            fs::write(&rewrite_path, old_content)?;
            return Err(err);
        }

        website.rewrite = name.to_string();
        self.store().save(&website)?;
        Ok(())
    }

    /// Current rules with `name == "current"`, otherwise a builtin or custom
    /// preset by name
    pub fn get_rewrite_config(&self, alias: &str, name: &str) -> Result<String> {
        let website = self.store().get(alias)?;
        if name == "current" {
            let rewrite_path = self.store().rewrite_path(&website.alias);
            if rewrite_path.exists() {
                return Ok(fs::read_to_string(&rewrite_path)?);
            }
            return Ok(String::new());
        }

        let lower = name.to_lowercase();
        if let Some((_, content)) = BUILTIN_REWRITES.iter().find(|(n, _)| *n == lower) {
            return Ok((*content).to_string());
        }
        let custom = self
            .config()
            .nginx
            .rewrite_dir
            .join(format!("{}.conf", lower));
        if custom.exists() {
            return Ok(fs::read_to_string(&custom)?);
        }
        Err(Error::NotFound(name.to_string()))
    }

    pub fn operate_custom_rewrite(&self, req: CustomRewrite) -> Result<()> {
        let rewrite_dir = &self.config().nginx.rewrite_dir;
        fs::create_dir_all(rewrite_dir)?;
        let path = rewrite_dir.join(format!("{}.conf", req.name));
        match req.operate {
            RewriteOperate::Create => {
                if path.exists() {
                    return Err(Error::NameExists(req.name));
                }
                fs::write(&path, req.content)?;
            }
            RewriteOperate::Delete => {
                let _ = fs::remove_file(&path);
            }
        }
        Ok(())
    }

    /// Preset names, builtins first then custom ones
    pub fn list_rewrites(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = BUILTIN_REWRITES
            .iter()
            .map(|(name, _)| (*name).to_string())
            .collect();
        let rewrite_dir = &self.config().nginx.rewrite_dir;
        if rewrite_dir.exists() {
            let mut custom: Vec<String> = fs::read_dir(rewrite_dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("conf"))
                .filter_map(|p| {
                    p.file_stem()
                        .and_then(|s| s.to_str())
                        .map(|s| s.to_string())
                })
                .collect();
            custom.sort();
            names.extend(custom);
        }
        Ok(names)
    }
}
