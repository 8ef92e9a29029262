//! Nginx configuration text parsing

use crate::error::{Error, Result};

use super::model::{Block, Directive};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    OpenBrace,
    CloseBrace,
    Semicolon,
    Comment(String),
}

/// Tokenize nginx syntax. Quoted parameters may contain braces, semicolons
/// and whitespace; quotes are kept as part of the word so the writer can
/// reproduce them verbatim.
fn tokenize(content: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = content.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '#' => {
                chars.next();
                let mut text = String::new();
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        break;
                    }
                    text.push(ch);
                }
                tokens.push(Token::Comment(text.trim().to_string()));
            }
            '{' => {
                chars.next();
                tokens.push(Token::OpenBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::CloseBrace);
            }
            ';' => {
                chars.next();
                tokens.push(Token::Semicolon);
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut word = String::new();
                let mut quote: Option<char> = None;
                while let Some(&ch) = chars.peek() {
                    match quote {
                        Some(q) => {
                            word.push(ch);
                            chars.next();
                            if ch == q {
                                quote = None;
                            }
                        }
                        None => {
                            if ch == '\'' || ch == '"' {
                                quote = Some(ch);
                                word.push(ch);
                                chars.next();
                            } else if ch.is_whitespace()
                                || ch == ';'
                                || ch == '{'
                                || ch == '}'
                                || ch == '#'
                            {
                                break;
                            } else {
                                word.push(ch);
                                chars.next();
                            }
                        }
                    }
                }
                if quote.is_some() {
                    return Err(Error::NginxParse("unterminated quoted string".to_string()));
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

/// Parse nginx configuration text into a directive tree.
///
/// Fails with no partial tree on unbalanced braces, a missing `;`, or a
/// stray `}`.
pub fn parse(content: &str) -> Result<Block> {
    let tokens = tokenize(content)?;
    let mut pos = 0;
    let block = parse_block(&tokens, &mut pos, false)?;
    if pos < tokens.len() {
        return Err(Error::NginxParse("unexpected '}'".to_string()));
    }
    Ok(block)
}

fn parse_block(tokens: &[Token], pos: &mut usize, nested: bool) -> Result<Block> {
    let mut directives = Vec::new();

    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Comment(text) => {
                directives.push(Directive::comment(text));
                *pos += 1;
            }
            Token::CloseBrace => {
                if nested {
                    *pos += 1;
                    return Ok(Block::new(directives));
                }
                // the caller reports a stray brace at the top level
                return Ok(Block::new(directives));
            }
            Token::Word(name) => {
                let name = name.clone();
                *pos += 1;
                directives.push(parse_directive(name, tokens, pos)?);
            }
            Token::OpenBrace => {
                return Err(Error::NginxParse("block without a directive name".to_string()));
            }
            Token::Semicolon => {
                return Err(Error::NginxParse("empty statement".to_string()));
            }
        }
    }

    if nested {
        return Err(Error::NginxParse("unbalanced braces".to_string()));
    }
    Ok(Block::new(directives))
}

fn parse_directive(name: String, tokens: &[Token], pos: &mut usize) -> Result<Directive> {
    let mut params = Vec::new();

    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Word(word) => {
                params.push(word.clone());
                *pos += 1;
            }
            Token::Semicolon => {
                *pos += 1;
                return Ok(Directive {
                    name,
                    params,
                    block: None,
                });
            }
            Token::OpenBrace => {
                *pos += 1;
                let block = parse_block(tokens, pos, true)?;
                return Ok(Directive {
                    name,
                    params,
                    block: Some(block),
                });
            }
            Token::CloseBrace => {
                return Err(Error::NginxParse(format!(
                    "directive '{}' is missing ';'",
                    name
                )));
            }
            Token::Comment(_) => {
                // comments inside a statement are dropped; statement-level
                // comments are preserved by parse_block
                *pos += 1;
            }
        }
    }

    Err(Error::NginxParse(format!(
        "directive '{}' is missing ';'",
        name
    )))
}
