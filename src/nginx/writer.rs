//! Canonical nginx configuration serialization
//!
//! The writer always emits the same indented style, so
//! `write(parse(write(parse(t))))` equals `write(parse(t))`. The engine
//! relies on this fixed point to compare old and new content after a
//! read-mutate-write cycle.

use super::model::{Block, Directive};

const INDENT: &str = "    ";

/// Serialize a directive tree to nginx configuration text
pub fn write(block: &Block) -> String {
    let mut out = String::new();
    write_block(&mut out, block, 0);
    out
}

fn write_block(out: &mut String, block: &Block, depth: usize) {
    for directive in &block.directives {
        write_directive(out, directive, depth);
    }
}

fn write_directive(out: &mut String, directive: &Directive, depth: usize) {
    let indent = INDENT.repeat(depth);

    if directive.is_comment() {
        out.push_str(&indent);
        out.push('#');
        if let Some(text) = directive.params.first() {
            if !text.is_empty() {
                out.push(' ');
                out.push_str(text);
            }
        }
        out.push('\n');
        return;
    }

    out.push_str(&indent);
    out.push_str(&directive.name);
    for param in &directive.params {
        out.push(' ');
        out.push_str(param);
    }

    match &directive.block {
        Some(block) => {
            out.push_str(" {\n");
            write_block(out, block, depth + 1);
            out.push_str(&indent);
            out.push_str("}\n");
        }
        None => out.push_str(";\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nginx::parser::parse;

    #[test]
    fn serialization_is_a_fixed_point() {
        let input = r#"
            # site config
            server {
                listen 80 default_server;
                server_name example.com www.example.com;
                location ~* '^/api(;|{)' {
                    proxy_pass http://backend;
                }
            }
        "#;
        let once = write(&parse(input).unwrap());
        let twice = write(&parse(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn writes_empty_blocks_verbatim() {
        let out = write(&parse("location / { }").unwrap());
        assert_eq!(out, "location / {\n}\n");
    }
}
