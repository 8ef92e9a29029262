//! Typed view over an `upstream { ... }` directive

use serde::{Deserialize, Serialize};

use super::model::{Block, Directive};

/// Load-balancing algorithms nginx allows at most one of per upstream
pub const ALGORITHMS: &[&str] = &["least_conn", "ip_hash", "hash"];

/// One backend server line of an upstream block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamServer {
    pub server: String,

    #[serde(default)]
    pub weight: Option<u32>,

    #[serde(default)]
    pub max_fails: Option<u32>,

    #[serde(default)]
    pub fail_timeout: Option<String>,

    #[serde(default)]
    pub backup: bool,
}

impl UpstreamServer {
    pub fn new(server: &str) -> Self {
        Self {
            server: server.to_string(),
            weight: None,
            max_fails: None,
            fail_timeout: None,
            backup: false,
        }
    }

    fn to_params(&self) -> Vec<String> {
        let mut params = vec![self.server.clone()];
        if let Some(weight) = self.weight {
            params.push(format!("weight={}", weight));
        }
        if let Some(max_fails) = self.max_fails {
            params.push(format!("max_fails={}", max_fails));
        }
        if let Some(fail_timeout) = &self.fail_timeout {
            params.push(format!("fail_timeout={}", fail_timeout));
        }
        if self.backup {
            params.push("backup".to_string());
        }
        params
    }

    fn from_params(params: &[String]) -> Option<Self> {
        let mut server = Self::new(params.first()?);
        for param in &params[1..] {
            if let Some(weight) = param.strip_prefix("weight=") {
                server.weight = weight.parse().ok();
            } else if let Some(max_fails) = param.strip_prefix("max_fails=") {
                server.max_fails = max_fails.parse().ok();
            } else if let Some(fail_timeout) = param.strip_prefix("fail_timeout=") {
                server.fail_timeout = Some(fail_timeout.to_string());
            } else if param == "backup" {
                server.backup = true;
            }
        }
        Some(server)
    }
}

/// Build a fresh `upstream <name> { ... }` directive
pub fn build_upstream(name: &str, algorithm: &str, servers: &[UpstreamServer]) -> Directive {
    let mut directive = Directive::block("upstream", &[name], Block::default());
    set_algorithm(&mut directive, algorithm);
    set_servers(&mut directive, servers);
    directive
}

/// Replace the load-balancing algorithm; only one may be active so any
/// previously set algorithm directive is removed first
pub fn set_algorithm(directive: &mut Directive, algorithm: &str) {
    let Some(block) = &mut directive.block else {
        return;
    };
    for known in ALGORITHMS {
        block.remove_directive(known, &[]);
    }
    match algorithm {
        "" | "default" => {}
        "hash" => {
            // consistent request-uri hashing
            block.directives.insert(
                0,
                Directive::simple("hash", &["$request_uri", "consistent"]),
            );
        }
        other => {
            block.directives.insert(0, Directive::simple(other, &[]));
        }
    }
}

/// Replace the full backend server list
pub fn set_servers(directive: &mut Directive, servers: &[UpstreamServer]) {
    let Some(block) = &mut directive.block else {
        return;
    };
    block.remove_directive("server", &[]);
    for server in servers {
        block.add_directive(Directive {
            name: "server".into(),
            params: server.to_params(),
            block: None,
        });
    }
}

/// Read an upstream directive back into (name, algorithm, servers)
pub fn read_upstream(directive: &Directive) -> Option<(String, String, Vec<UpstreamServer>)> {
    if directive.name != "upstream" {
        return None;
    }
    let name = directive.params.first()?.clone();
    let block = directive.block.as_ref()?;

    let algorithm = block
        .directives
        .iter()
        .find(|d| ALGORITHMS.contains(&d.name.as_str()))
        .map(|d| d.name.clone())
        .unwrap_or_else(|| "default".to_string());

    let servers = block
        .find_directives("server")
        .iter()
        .filter_map(|d| UpstreamServer::from_params(&d.params))
        .collect();

    Some((name, algorithm, servers))
}
