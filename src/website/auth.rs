//! Basic authentication
//!
//! Server-wide auth keeps its credentials in `auth_basic/auth.pass`, one
//! `user:hash[:remark]` line per user; enabling or disabling only touches the
//! `auth_basic` directives in the server block, never the pass file.
//! Path-scoped auth gets one location file under `path_auth/` plus its own
//! pass file under `path_auth/pass/`.

use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::nginx::{self, Location, NginxParam};

use super::service::{NginxScope, WebsiteService};

const PATH_AUTH_TEMPLATE: &str = r#"location / {
    auth_basic "Authentication";
    auth_basic_user_file /dev/null;
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthOperate {
    Create,
    Edit,
    Delete,
    Disable,
    Enable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthBasicUpdate {
    pub operate: AuthOperate,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub username: String,
    pub remark: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthBasicInfo {
    pub enable: bool,
    pub items: Vec<AuthUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathAuthUpdate {
    pub operate: AuthOperate,
    pub name: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathAuthInfo {
    pub name: String,
    pub path: String,
    pub username: String,
    pub remark: String,
}

/// Pass-file lines as (username, hash, remark) triples
fn parse_pass(content: &str) -> Vec<(String, String, String)> {
    content
        .lines()
        .filter(|l| !l.is_empty())
        .map(|line| {
            let mut parts = line.splitn(3, ':');
            let user = parts.next().unwrap_or_default().to_string();
            let hash = parts.next().unwrap_or_default().to_string();
            let remark = parts.next().unwrap_or_default().to_string();
            (user, hash, remark)
        })
        .collect()
}

fn render_pass(entries: &[(String, String, String)]) -> String {
    let mut out = String::new();
    for (user, hash, remark) in entries {
        if remark.is_empty() {
            out.push_str(&format!("{}:{}\n", user, hash));
        } else {
            out.push_str(&format!("{}:{}:{}\n", user, hash, remark));
        }
    }
    out
}

impl WebsiteService {
    fn auth_params(&self, alias: &str) -> Vec<NginxParam> {
        vec![
            NginxParam {
                name: "auth_basic".to_string(),
                params: vec!["\"Authentication\"".to_string()],
            },
            NginxParam {
                name: "auth_basic_user_file".to_string(),
                params: vec![format!(
                    "{}/auth_basic/auth.pass",
                    self.config().nginx.site_prefix(alias)
                )],
            },
        ]
    }

    pub async fn update_auth_basic(&self, alias: &str, req: AuthBasicUpdate) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store().get(alias)?;
        let pass_path = self.store().auth_pass_path(alias);
        if let Some(parent) = pass_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !pass_path.exists() {
            fs::write(&pass_path, "")?;
        }

        let params = self.auth_params(alias);
        match req.operate {
            AuthOperate::Disable => {
                return self
                    .delete_nginx_config_unlocked(NginxScope::Server, &params, &website)
                    .await;
            }
            AuthOperate::Enable => {
                return self
                    .update_nginx_config_unlocked(NginxScope::Server, &params, &website)
                    .await;
            }
            _ => {}
        }

        let mut entries = parse_pass(&fs::read_to_string(&pass_path)?);
        match req.operate {
            AuthOperate::Create => {
                if entries.iter().any(|(user, _, _)| *user == req.username) {
                    return Err(Error::UsernameExists(req.username));
                }
                let hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)?;
                entries.push((req.username, hash, req.remark));
            }
            AuthOperate::Edit => {
                let entry = entries
                    .iter_mut()
                    .find(|(user, _, _)| *user == req.username)
                    .ok_or_else(|| Error::UsernameNotFound(req.username.clone()))?;
                entry.1 = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)?;
                entry.2 = req.remark;
            }
            AuthOperate::Delete => {
                let before = entries.len();
                entries.retain(|(user, _, _)| *user != req.username);
                if entries.len() == before {
                    return Err(Error::UsernameNotFound(req.username));
                }
            }
            AuthOperate::Disable | AuthOperate::Enable => unreachable!(),
        }

        fs::write(&pass_path, render_pass(&entries))?;
        if entries.is_empty() {
            self.delete_nginx_config_unlocked(NginxScope::Server, &params, &website)
                .await?;
        }
        Ok(())
    }

    pub fn get_auth_basics(&self, alias: &str) -> Result<AuthBasicInfo> {
        let website = self.store().get(alias)?;
        let pass_path = self.store().auth_pass_path(&website.alias);
        let mut info = AuthBasicInfo::default();
        if !pass_path.exists() {
            return Ok(info);
        }

        let found =
            self.get_nginx_params_by_keys(NginxScope::Server, &["auth_basic"], &website)?;
        info.enable = !found[0].params.is_empty();
        info.items = parse_pass(&fs::read_to_string(&pass_path)?)
            .into_iter()
            .map(|(username, _, remark)| AuthUser { username, remark })
            .collect();
        Ok(info)
    }

    pub async fn update_path_auth(&self, alias: &str, req: PathAuthUpdate) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let website = self.store().get(alias)?;
        let auth_dir = self.store().path_auth_dir(alias);
        let pass_dir = self.store().path_auth_pass_dir(alias);
        fs::create_dir_all(&pass_dir)?;

        let conf_path = auth_dir.join(format!("{}.conf", req.name));
        let pass_path = pass_dir.join(format!("{}.pass", req.name));

        let mut root = match req.operate {
            AuthOperate::Delete => {
                let _ = fs::remove_file(&conf_path);
                let _ = fs::remove_file(&pass_path);
                return self
                    .update_nginx_config_unlocked(NginxScope::Server, &[], &website)
                    .await;
            }
            AuthOperate::Create => {
                if conf_path.exists() || pass_path.exists() {
                    return Err(Error::NameExists(req.name));
                }
                nginx::parse(PATH_AUTH_TEMPLATE)?
            }
            AuthOperate::Edit => nginx::parse(&fs::read_to_string(&conf_path)?)?,
            AuthOperate::Disable | AuthOperate::Enable => {
                return Err(Error::NginxParse(
                    "path auth supports create, edit and delete".into(),
                ));
            }
        };

        {
            let directive = root
                .directives
                .iter_mut()
                .find(|d| d.name == "location")
                .ok_or_else(|| {
                    Error::NginxParse("invalid path auth config, no location found".into())
                })?;
            let mut location = Location::new(directive).ok_or_else(|| {
                Error::NginxParse("invalid path auth config, no location found".into())
            })?;
            location.update_directive(
                "auth_basic_user_file",
                vec![format!(
                    "{}/path_auth/pass/{}.pass",
                    self.config().nginx.site_prefix(alias),
                    req.name
                )],
            );
            location.change_path("~*", &format!("^{}", req.path));
        }

        let hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)?;
        fs::write(
            &pass_path,
            render_pass(&[(req.username.clone(), hash, req.remark.clone())]),
        )?;
        fs::write(&conf_path, nginx::write(&root))?;

        let include = NginxParam {
            name: "include".to_string(),
            params: vec![format!(
                "{}/path_auth/*.conf",
                self.config().nginx.site_prefix(alias)
            )],
        };
        if let Err(err) = self
            .update_nginx_config_unlocked(NginxScope::Server, &[include], &website)
            .await
        {
            if req.operate == AuthOperate::Create {
                let _ = fs::remove_file(&conf_path);
                let _ = fs::remove_file(&pass_path);
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn get_path_auth_basics(&self, alias: &str) -> Result<Vec<PathAuthInfo>> {
        let website = self.store().get(alias)?;
        let auth_dir = self.store().path_auth_dir(&website.alias);
        let pass_dir = self.store().path_auth_pass_dir(&website.alias);
        if !auth_dir.exists() || !pass_dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<_> = fs::read_dir(&auth_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("conf"))
            .collect();
        paths.sort();

        let mut res = Vec::new();
        for conf_path in paths {
            let name = conf_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let root = nginx::parse(&fs::read_to_string(&conf_path)?)?;
            let location = root
                .directives
                .iter()
                .find(|d| d.name == "location")
                .ok_or_else(|| {
                    Error::NginxParse("invalid path auth config, no location found".into())
                })?;
            // params are [modifier, match]; the match carries a ^ anchor
            let path = location
                .params
                .get(1)
                .map(|p| p.trim_start_matches('^').to_string())
                .unwrap_or_default();

            let pass_path = pass_dir.join(format!("{}.pass", name));
            let mut username = String::new();
            let mut remark = String::new();
            if pass_path.exists() {
                if let Some((user, _, rem)) =
                    parse_pass(&fs::read_to_string(&pass_path)?).into_iter().next_back()
                {
                    username = user;
                    remark = rem;
                }
            }
            res.push(PathAuthInfo {
                name,
                path,
                username,
                remark,
            });
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_file_round_trip_keeps_remarks() {
        let entries = vec![
            ("alice".to_string(), "$2y$abc".to_string(), "ops".to_string()),
            ("bob".to_string(), "$2y$def".to_string(), String::new()),
        ];
        let rendered = render_pass(&entries);
        assert_eq!(parse_pass(&rendered), entries);
    }

    #[test]
    fn parse_pass_skips_blank_lines() {
        let parsed = parse_pass("alice:h1\n\nbob:h2:note\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].2, "note");
    }
}
