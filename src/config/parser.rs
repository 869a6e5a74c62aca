//! Statement parser for the rule DSL.
//!
//! Grammar, one statement per `;`:
//!
//! ```text
//! REPLACE(FROM "..", TO "..");
//! DEL(FROM "..");
//! CLEAR();
//! PROTECT(START_MARKER "..", END_MARKER "..");
//! PROTECT_CONTENT(CONTENT "..");
//! ```
//!
//! Keywords and argument keys are case-insensitive. Malformed statements are
//! reported as diagnostics and recovered from by skipping to the next `;`,
//! so one bad line never poisons the rest of the file.

use super::lexer::{Lexer, Token, TokenKind};
use super::RuleSet;
use crate::types::ProtectedRegionSpec;
use std::fmt;

/// Severity of one parser diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A position-tagged message produced while parsing a rule file.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

pub struct Parser<'a> {
    lexer: Lexer,
    current: Token,
    peeked: Token,
    rules: &'a mut RuleSet,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &str, rules: &'a mut RuleSet) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        let peeked = lexer.next_token();
        Self {
            lexer,
            current,
            peeked,
            rules,
            diagnostics: Vec::new(),
        }
    }

    /// Parse the whole input into the rule set, returning the diagnostics.
    pub fn parse(mut self) -> Vec<Diagnostic> {
        while self.current.kind != TokenKind::Eof {
            self.parse_statement();
        }
        self.diagnostics
    }

    fn advance(&mut self) {
        self.current = std::mem::replace(&mut self.peeked, self.lexer.next_token());
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.current.kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_at(&mut self, token_line: u32, token_column: u32, message: String) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            line: token_line,
            column: token_column,
            message,
        });
    }

    fn warn_at(&mut self, token_line: u32, token_column: u32, message: String) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            line: token_line,
            column: token_column,
            message,
        });
    }

    /// Skip ahead to just past the next `;` (or to EOF).
    fn recover(&mut self) {
        while self.current.kind != TokenKind::Semicolon && self.current.kind != TokenKind::Eof {
            self.advance();
        }
        if self.current.kind == TokenKind::Semicolon {
            self.advance();
        }
    }

    fn parse_statement(&mut self) {
        if self.current.kind != TokenKind::Ident {
            let (l, c) = (self.current.line, self.current.column);
            self.error_at(l, c, "expected statement keyword".to_string());
            self.recover();
            return;
        }

        let keyword = self.current.text.to_uppercase();
        let (kw_line, kw_column) = (self.current.line, self.current.column);

        if self.peeked.kind != TokenKind::LParen {
            let (l, c) = (self.peeked.line, self.peeked.column);
            self.error_at(l, c, format!("expected '(' after {keyword}"));
            self.recover();
            return;
        }
        self.advance(); // onto '('
        self.advance(); // past '('

        let ok = match keyword.as_str() {
            "REPLACE" => self.parse_replace(kw_line),
            "DEL" => self.parse_del(kw_line),
            "CLEAR" => self.parse_clear(),
            "PROTECT" => self.parse_protect(kw_line),
            "PROTECT_CONTENT" => self.parse_protect_content(kw_line),
            _ => {
                self.error_at(kw_line, kw_column, format!("unknown command '{keyword}'"));
                false
            }
        };

        if !ok {
            self.recover();
        }
    }

    /// Parse `KEY "value"` pairs up to the closing `)`. Unknown keys are
    /// reported and dropped; duplicate keys keep the first value.
    fn parse_args(&mut self, known_keys: &[&str]) -> Option<Vec<(String, String)>> {
        let mut kwargs: Vec<(String, String)> = Vec::new();
        let mut first = true;

        while self.current.kind != TokenKind::RParen && self.current.kind != TokenKind::Eof {
            if self.current.kind == TokenKind::Semicolon {
                let (l, c) = (self.current.line, self.current.column);
                self.error_at(l, c, "unexpected ';', expected ')'".to_string());
                return None;
            }

            if !first {
                if self.current.kind == TokenKind::Comma {
                    self.advance();
                    if self.current.kind == TokenKind::RParen {
                        let (l, c) = (self.current.line, self.current.column);
                        self.error_at(l, c, "trailing comma is not allowed".to_string());
                        return None;
                    }
                } else {
                    let (l, c) = (self.current.line, self.current.column);
                    self.error_at(l, c, "expected ',' between arguments".to_string());
                    return None;
                }
            }

            if self.current.kind != TokenKind::Ident {
                let (l, c) = (self.current.line, self.current.column);
                let got = self.current.text.clone();
                self.error_at(l, c, format!("expected argument key, got '{got}'"));
                return None;
            }
            let key = self.current.text.to_uppercase();
            let (key_line, key_column) = (self.current.line, self.current.column);
            self.advance();

            if self.current.kind != TokenKind::Str {
                let (l, c) = (self.current.line, self.current.column);
                self.error_at(l, c, format!("expected string value for key '{key}'"));
                return None;
            }
            let value = self.current.text.clone();
            self.advance();

            if !known_keys.contains(&key.as_str()) {
                self.error_at(key_line, key_column, format!("unknown argument key '{key}'"));
            } else if kwargs.iter().any(|(k, _)| *k == key) {
                self.warn_at(key_line, key_column, format!("duplicate key '{key}' ignored"));
            } else {
                kwargs.push((key, value));
            }

            first = false;
        }

        if self.current.kind == TokenKind::Eof {
            let (l, c) = (self.current.line, self.current.column);
            self.error_at(l, c, "unexpected end of file, expected ')'".to_string());
            return None;
        }

        Some(kwargs)
    }

    fn close_statement(&mut self, keyword: &str) -> bool {
        if !self.expect(TokenKind::RParen) {
            let (l, c) = (self.current.line, self.current.column);
            self.error_at(l, c, format!("expected ')' after {keyword} arguments"));
            return false;
        }
        if !self.expect(TokenKind::Semicolon) {
            let (l, c) = (self.current.line, self.current.column);
            self.error_at(l, c, format!("expected ';' after {keyword} statement"));
            return false;
        }
        true
    }

    fn require<'k>(
        &mut self,
        kwargs: &'k [(String, String)],
        key: &str,
        keyword: &str,
        line: u32,
    ) -> Option<&'k str> {
        match kwargs.iter().find(|(k, _)| k == key) {
            Some((_, v)) => Some(v.as_str()),
            None => {
                self.error_at(line, 1, format!("missing argument '{key}' in {keyword}"));
                None
            }
        }
    }

    fn parse_replace(&mut self, line: u32) -> bool {
        let Some(kwargs) = self.parse_args(&["FROM", "TO"]) else {
            return false;
        };
        let Some(from) = self.require(&kwargs, "FROM", "REPLACE", line).map(str::to_string) else {
            return false;
        };
        let Some(to) = self.require(&kwargs, "TO", "REPLACE", line).map(str::to_string) else {
            return false;
        };
        if !self.close_statement("REPLACE") {
            return false;
        }
        if from.is_empty() {
            self.warn_at(line, 1, "empty FROM pattern ignored".to_string());
            return true;
        }
        self.rules.replacements.insert(from, to);
        true
    }

    fn parse_del(&mut self, line: u32) -> bool {
        let Some(kwargs) = self.parse_args(&["FROM"]) else {
            return false;
        };
        let Some(from) = self.require(&kwargs, "FROM", "DEL", line).map(str::to_string) else {
            return false;
        };
        if !self.close_statement("DEL") {
            return false;
        }
        if self.rules.replacements.remove(&from).is_none() {
            self.warn_at(line, 1, format!("no rule found to erase for '{from}'"));
        }
        true
    }

    fn parse_clear(&mut self) -> bool {
        if !self.close_statement("CLEAR") {
            return false;
        }
        self.rules.replacements.clear();
        true
    }

    fn parse_protect(&mut self, line: u32) -> bool {
        let Some(kwargs) = self.parse_args(&["START_MARKER", "END_MARKER"]) else {
            return false;
        };
        let Some(start) = self
            .require(&kwargs, "START_MARKER", "PROTECT", line)
            .map(str::to_string)
        else {
            return false;
        };
        let Some(end) = self
            .require(&kwargs, "END_MARKER", "PROTECT", line)
            .map(str::to_string)
        else {
            return false;
        };
        if !self.close_statement("PROTECT") {
            return false;
        }
        if start.is_empty() {
            self.error_at(line, 1, "PROTECT requires a non-empty START_MARKER".to_string());
            return true;
        }
        self.rules
            .protected_regions
            .push(ProtectedRegionSpec::new(&start, &end));
        true
    }

    fn parse_protect_content(&mut self, line: u32) -> bool {
        let Some(kwargs) = self.parse_args(&["CONTENT"]) else {
            return false;
        };
        let Some(content) = self
            .require(&kwargs, "CONTENT", "PROTECT_CONTENT", line)
            .map(str::to_string)
        else {
            return false;
        };
        if !self.close_statement("PROTECT_CONTENT") {
            return false;
        }
        if content.is_empty() {
            self.error_at(line, 1, "PROTECT_CONTENT requires non-empty CONTENT".to_string());
            return true;
        }
        self.rules
            .protected_regions
            .push(ProtectedRegionSpec::new(&content, ""));
        true
    }
}
