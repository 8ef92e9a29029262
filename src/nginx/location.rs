//! Typed view over a `location { ... }` directive
//!
//! The proxy rule builder edits exactly one location block per rule file;
//! this module holds the mutation helpers and the shape-based read-back it
//! relies on. Read-back reconstructs the rule settings purely from the
//! directive shapes written here, so both sides must stay in sync.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::model::{Block, Directive};

/// Parameters of the CORS preflight `if` block, as tokenized
pub(crate) const CORS_OPTIONS_PARAMS: &[&str] = &["($request_method", "=", "'OPTIONS')"];

/// One response-body substitution rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubFilter {
    pub find: String,
    pub replace: String,
}

/// Mutable view over a location directive
pub struct Location<'a> {
    directive: &'a mut Directive,
}

impl<'a> Location<'a> {
    pub fn new(directive: &'a mut Directive) -> Option<Self> {
        if directive.name == "location" && directive.block.is_some() {
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

    /// Rewrite the match modifier (`=`, `~`, `~*`, `^~` or empty) and match
    /// string in place, preserving the block contents
    pub fn change_path(&mut self, modifier: &str, path: &str) {
        self.directive.params = if modifier.is_empty() {
            vec![path.to_string()]
        } else {
            vec![modifier.to_string(), path.to_string()]
        };
    }

    pub fn add_server_cache(&mut self, zone: &str, time: i64, unit: &str) {
        let block = self.block();
        block.update_directive("proxy_cache", vec![zone.to_string()]);
        block.update_directive(
            "proxy_cache_valid",
            vec![
                "200".into(),
                "304".into(),
                "301".into(),
                "302".into(),
                format!("{}{}", time, unit),
            ],
        );
        block.update_directive("proxy_cache_key", vec!["$host$uri$is_args$args".into()]);
        block.update_directive(
            "add_header",
            vec!["X-Cache-Status".into(), "$upstream_cache_status".into()],
        );
    }

    pub fn remove_server_cache(&mut self) {
        let block = self.block();
        block.remove_directive("proxy_cache", &[]);
        block.remove_directive("proxy_cache_valid", &[]);
        block.remove_directive("proxy_cache_key", &[]);
        block.remove_directive("add_header", &["X-Cache-Status".to_string()]);
    }

    pub fn add_browser_cache(&mut self, time: i64, unit: &str) {
        let block = self.block();
        block.remove_directive("add_header", &["Cache-Control".to_string()]);
        block.update_directive("expires", vec![format!("{}{}", time, unit)]);
    }

    pub fn add_browser_no_cache(&mut self) {
        let block = self.block();
        block.update_directive("expires", vec!["-1".into()]);
        block.update_directive("add_header", vec!["Cache-Control".into(), "no-cache".into()]);
    }

    pub fn remove_browser_cache(&mut self) {
        let block = self.block();
        block.remove_directive("expires", &[]);
        block.remove_directive("add_header", &["Cache-Control".to_string()]);
    }

    pub fn set_sub_filters(&mut self, replaces: &[SubFilter]) {
        let block = self.block();
        block.remove_directive("sub_filter", &[]);
        for replace in replaces {
            block.add_directive(Directive {
                name: "sub_filter".into(),
                params: vec![quote(&replace.find), quote(&replace.replace)],
                block: None,
            });
        }
        block.update_directive("sub_filter_once", vec!["off".into()]);
    }

    pub fn clear_sub_filters(&mut self) {
        let block = self.block();
        block.remove_directive("sub_filter", &[]);
        block.remove_directive("sub_filter_once", &[]);
    }

    /// Append the preflight OPTIONS short-circuit block mirroring the
    /// location's own CORS headers
    pub fn add_cors_option(
        &mut self,
        allow_origins: &str,
        allow_methods: &str,
        allow_headers: &str,
        allow_credentials: bool,
    ) {
        let inner =
            cors_preflight_block(allow_origins, allow_methods, allow_headers, allow_credentials);
        self.block().upsert(Directive::block(
            "if",
            CORS_OPTIONS_PARAMS,
            inner,
        ));
    }

    pub fn remove_cors_option(&mut self) {
        let params: Vec<String> = CORS_OPTIONS_PARAMS.iter().map(|s| s.to_string()).collect();
        self.block().remove_directive_exact("if", &params);
    }
}

/// Body of the preflight OPTIONS short-circuit, shared by the per-rule and
/// per-server CORS writers
pub(crate) fn cors_preflight_block(
    allow_origins: &str,
    allow_methods: &str,
    allow_headers: &str,
    allow_credentials: bool,
) -> Block {
    let mut inner = Block::default();
    inner.add_directive(Directive::simple(
        "add_header",
        &["Access-Control-Allow-Origin", allow_origins, "always"],
    ));
    if !allow_methods.is_empty() {
        inner.add_directive(Directive::simple(
            "add_header",
            &["Access-Control-Allow-Methods", allow_methods, "always"],
        ));
    }
    if !allow_headers.is_empty() {
        inner.add_directive(Directive::simple(
            "add_header",
            &["Access-Control-Allow-Headers", allow_headers, "always"],
        ));
    }
    if allow_credentials {
        inner.add_directive(Directive::simple(
            "add_header",
            &["Access-Control-Allow-Credentials", "true", "always"],
        ));
    }
    inner.add_directive(Directive::simple(
        "add_header",
        &["Access-Control-Max-Age", "1728000"],
    ));
    inner.add_directive(Directive::simple(
        "add_header",
        &["Content-Type", "'text/plain; charset=utf-8'"],
    ));
    inner.add_directive(Directive::simple("add_header", &["Content-Length", "0"]));
    inner.add_directive(Directive::simple("return", &["204"]));
    inner
}

fn quote(value: &str) -> String {
    if value.starts_with('\'') && value.ends_with('\'') {
        value.to_string()
    } else {
        format!("'{}'", value)
    }
}

fn unquote(value: &str) -> String {
    value
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string()
}

/// Settings reconstructed from a parsed location block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationInfo {
    pub modifier: String,
    pub path: String,
    pub proxy_pass: String,
    pub host: String,
    pub cache: bool,
    pub server_cache_time: i64,
    pub server_cache_unit: String,
    pub cache_time: i64,
    pub cache_unit: String,
    pub replaces: Vec<SubFilter>,
    pub sni: bool,
    pub proxy_ssl_name: String,
    pub cors: bool,
    pub allow_origins: String,
    pub allow_methods: String,
    pub allow_headers: String,
    pub allow_credentials: bool,
    pub preflight: bool,
}

impl LocationInfo {
    /// Read a location directive back into its settings. Returns None when
    /// the directive is not a location block.
    pub fn from_directive(directive: &Directive) -> Option<Self> {
        if directive.name != "location" {
            return None;
        }
        let block = directive.block.as_ref()?;

        let mut info = LocationInfo::default();
        match directive.params.len() {
            2 => {
                info.modifier = directive.params[0].clone();
                info.path = directive.params[1].clone();
            }
            1 => info.path = directive.params[0].clone(),
            _ => {}
        }

        let time_re = Regex::new(r"^(\d+)([smhd])$").expect("static regex");

        for d in &block.directives {
            match d.name.as_str() {
                "proxy_pass" => {
                    info.proxy_pass = d.params.first().cloned().unwrap_or_default();
                }
                "proxy_set_header" => {
                    if d.params.first().map(String::as_str) == Some("Host") {
                        info.host = d.params.get(1).cloned().unwrap_or_default();
                    }
                }
                "proxy_cache" => info.cache = true,
                "proxy_cache_valid" => {
                    if let Some(last) = d.params.last() {
                        if let Some(caps) = time_re.captures(last) {
                            info.server_cache_time = caps[1].parse().unwrap_or(0);
                            info.server_cache_unit = caps[2].to_string();
                        }
                    }
                }
                "expires" => {
                    if let Some(value) = d.params.first() {
                        if value == "-1" {
                            info.cache_time = -1;
                        } else if let Some(caps) = time_re.captures(value) {
                            info.cache_time = caps[1].parse().unwrap_or(0);
                            info.cache_unit = caps[2].to_string();
                        }
                    }
                }
                "sub_filter" => {
                    if d.params.len() == 2 {
                        info.replaces.push(SubFilter {
                            find: unquote(&d.params[0]),
                            replace: unquote(&d.params[1]),
                        });
                    }
                }
                "proxy_ssl_server_name" => {
                    info.sni = d.params.first().map(String::as_str) == Some("on");
                }
                "proxy_ssl_name" => {
                    info.proxy_ssl_name = d.params.first().cloned().unwrap_or_default();
                }
                "add_header" => match d.params.first().map(String::as_str) {
                    Some("Access-Control-Allow-Origin") => {
                        info.cors = true;
                        info.allow_origins = d.params.get(1).cloned().unwrap_or_default();
                    }
                    Some("Access-Control-Allow-Methods") => {
                        info.allow_methods = d.params.get(1).cloned().unwrap_or_default();
                    }
                    Some("Access-Control-Allow-Headers") => {
                        info.allow_headers = d.params.get(1).cloned().unwrap_or_default();
                    }
                    Some("Access-Control-Allow-Credentials") => {
                        info.allow_credentials =
                            d.params.get(1).map(String::as_str) == Some("true");
                    }
                    _ => {}
                },
                "if" => {
                    if d.params == CORS_OPTIONS_PARAMS {
                        info.preflight = true;
                    }
                }
                _ => {}
            }
        }

        Some(info)
    }
}
