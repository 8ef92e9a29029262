//! In-memory nginx configuration tree
//!
//! A config is an ordered list of directives. A directive is either a simple
//! `name params;` statement or a compound `name params { ... }` block.
//! Insertion order is significant: nginx matching depends on it for
//! `location` precedence and `if` placement relative to `include` lines.

use serde::{Deserialize, Serialize};

/// One directive addition/removal requested against a config scope.
///
/// Empty `params` on removal acts as a wildcard: every directive with the
/// given name is removed regardless of its parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NginxParam {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl NginxParam {
    pub fn new(name: &str, params: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            params: params.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One nginx configuration statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub params: Vec<String>,
    pub block: Option<Block>,
}

impl Directive {
    pub fn simple(name: &str, params: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            params: params.iter().map(|s| s.to_string()).collect(),
            block: None,
        }
    }

    pub fn block(name: &str, params: &[&str], block: Block) -> Self {
        Self {
            name: name.to_string(),
            params: params.iter().map(|s| s.to_string()).collect(),
            block: Some(block),
        }
    }

    /// Comments survive parsing as `#` directives so rewrites keep them
    pub fn comment(text: &str) -> Self {
        Self {
            name: "#".to_string(),
            params: vec![text.to_string()],
            block: None,
        }
    }

    pub fn is_comment(&self) -> bool {
        self.name == "#"
    }
}

/// An ordered `{ ... }` grouping of directives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub directives: Vec<Directive>,
}

/// Directives that legitimately repeat within one scope; updates to these
/// match on (name, first parameter) instead of name alone, so setting one
/// `add_header` never clobbers its siblings.
const REPEATABLE: &[&str] = &[
    "add_header",
    "proxy_set_header",
    "include",
    "sub_filter",
    "set",
    "set_real_ip_from",
    "if",
    "error_page",
    "location",
    "rewrite",
];

fn is_repeatable(name: &str) -> bool {
    REPEATABLE.contains(&name)
}

impl Block {
    pub fn new(directives: Vec<Directive>) -> Self {
        Self { directives }
    }

    /// All direct-child directives with the given name, in order
    pub fn find_directives(&self, name: &str) -> Vec<&Directive> {
        self.directives.iter().filter(|d| d.name == name).collect()
    }

    /// First direct-child directive with the given name
    pub fn find_directive(&self, name: &str) -> Option<&Directive> {
        self.directives.iter().find(|d| d.name == name)
    }

    pub fn find_directive_mut(&mut self, name: &str) -> Option<&mut Directive> {
        self.directives.iter_mut().find(|d| d.name == name)
    }

    /// Recursive search for `server` blocks anywhere in the tree
    pub fn find_servers(&self) -> Vec<&Directive> {
        self.find_blocks_named("server")
    }

    /// Recursive search for `upstream` blocks anywhere in the tree
    pub fn find_upstreams(&self) -> Vec<&Directive> {
        self.find_blocks_named("upstream")
    }

    fn find_blocks_named(&self, name: &str) -> Vec<&Directive> {
        let mut found = Vec::new();
        for d in &self.directives {
            if d.name == name && d.block.is_some() {
                found.push(d);
            } else if let Some(block) = &d.block {
                found.extend(block.find_blocks_named(name));
            }
        }
        found
    }

    /// First `server` block anywhere in the tree, mutable
    pub fn first_server_mut(&mut self) -> Option<&mut Directive> {
        Self::first_block_named_mut(&mut self.directives, "server")
    }

    fn first_block_named_mut<'a>(
        directives: &'a mut Vec<Directive>,
        name: &str,
    ) -> Option<&'a mut Directive> {
        for d in directives.iter_mut() {
            if d.name == name && d.block.is_some() {
                return Some(d);
            }
            if let Some(block) = &mut d.block {
                if let Some(found) = Self::first_block_named_mut(&mut block.directives, name) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Replace the parameters of a matching directive, or append a new one.
    ///
    /// Matching is by name; for repeatable directives the first parameter
    /// must also match. New compound directives (`if`, `location`) are
    /// inserted before the first `include` so nginx evaluates them ahead of
    /// included location globs.
    pub fn update_directive(&mut self, name: &str, params: Vec<String>) {
        self.upsert(Directive {
            name: name.to_string(),
            params,
            block: None,
        });
    }

    /// Same matching rules as [`update_directive`], for compound directives
    pub fn upsert(&mut self, directive: Directive) {
        let matches = |d: &Directive| {
            d.name == directive.name
                && (!is_repeatable(&directive.name)
                    || directive.params.is_empty()
                    || d.params.first() == directive.params.first())
        };

        if let Some(existing) = self.directives.iter_mut().find(|d| matches(d)) {
            existing.params = directive.params;
            if directive.block.is_some() {
                existing.block = directive.block;
            }
            return;
        }

        if directive.block.is_some() {
            if let Some(pos) = self.directives.iter().position(|d| d.name == "include") {
                self.directives.insert(pos, directive);
                return;
            }
        }
        self.directives.push(directive);
    }

    pub fn add_directive(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    /// Remove directives by name and parameter prefix.
    ///
    /// An empty prefix removes every directive with the name; a non-empty
    /// prefix removes only directives whose parameter list starts with it.
    pub fn remove_directive(&mut self, name: &str, prefix: &[String]) {
        self.directives
            .retain(|d| d.name != name || (!prefix.is_empty() && !d.params.starts_with(prefix)));
    }

    /// Remove directives whose parameter list matches exactly
    pub fn remove_directive_exact(&mut self, name: &str, params: &[String]) {
        self.directives
            .retain(|d| d.name != name || d.params != params);
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}
