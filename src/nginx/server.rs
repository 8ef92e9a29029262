//! Typed view over a `server { ... }` directive

use super::model::{Block, Directive};

/// Mutable view over a server block
pub struct Server<'a> {
    directive: &'a mut Directive,
}

impl<'a> Server<'a> {
    pub fn new(directive: &'a mut Directive) -> Option<Self> {
        if directive.name == "server" && directive.block.is_some() {
            Some(Self { directive })
        } else {
            None
        }
    }

    fn block(&mut self) -> &mut Block {
        // invariant checked in new()
        self.directive.block.as_mut().unwrap()
    }

    pub fn update_directive(&mut self, name: &str, params: Vec<String>) {
        self.block().update_directive(name, params);
    }

    pub fn remove_directive(&mut self, name: &str, prefix: &[String]) {
        self.block().remove_directive(name, prefix);
    }

    /// Ports currently listened on (first parameter of each `listen`)
    pub fn listen_ports(&self) -> Vec<String> {
        listen_ports(self.directive)
    }

    /// Add or update one `listen` directive keyed by its bind value
    pub fn update_listen(&mut self, bind: &str, default_server: bool, ssl: bool) {
        let mut params = vec![bind.to_string()];
        if ssl {
            params.push("ssl".to_string());
        }
        if default_server {
            params.push("default_server".to_string());
        }

        let block = self.block();
        if let Some(existing) = block
            .directives
            .iter_mut()
            .find(|d| d.name == "listen" && d.params.first().map(String::as_str) == Some(bind))
        {
            existing.params = params;
        } else {
            // listens stay grouped at the top of the block
            let pos = block
                .directives
                .iter()
                .rposition(|d| d.name == "listen")
                .map(|i| i + 1)
                .unwrap_or(0);
            block.directives.insert(
                pos,
                Directive {
                    name: "listen".into(),
                    params,
                    block: None,
                },
            );
        }
    }

    pub fn remove_listen(&mut self, bind: &str) {
        self.block().remove_directive("listen", &[bind.to_string()]);
    }

    pub fn server_names(&self) -> Vec<String> {
        server_names(self.directive)
    }

    pub fn add_server_name(&mut self, domain: &str) {
        let mut names = self.server_names();
        if names.iter().any(|n| n == domain) {
            return;
        }
        names.push(domain.to_string());
        self.block().update_directive("server_name", names);
    }

    pub fn remove_server_name(&mut self, domain: &str) {
        let names: Vec<String> = self
            .server_names()
            .into_iter()
            .filter(|n| n != domain)
            .collect();
        self.block().update_directive("server_name", names);
    }
}

/// Ports listened on by a parsed server directive
pub fn listen_ports(directive: &Directive) -> Vec<String> {
    let Some(block) = &directive.block else {
        return Vec::new();
    };
    block
        .find_directives("listen")
        .iter()
        .filter_map(|d| d.params.first().cloned())
        .collect()
}

/// Names served by a parsed server directive
pub fn server_names(directive: &Directive) -> Vec<String> {
    let Some(block) = &directive.block else {
        return Vec::new();
    };
    block
        .find_directive("server_name")
        .map(|d| d.params.clone())
        .unwrap_or_default()
}
