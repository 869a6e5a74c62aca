//! Tokenizer for the rule DSL.
//!
//! Tokens: identifiers, double-quoted strings, `(`, `)`, `,`, `;`. Both
//! `//` line comments and `/* ... */` block comments are skipped. Line and
//! column positions count scalar values, not bytes, so diagnostics point at
//! characters in mixed-script rule files.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Str,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Eof,
    Unknown,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let (line, column) = (self.line, self.column);
        let Some(c) = self.peek() else {
            return self.token(TokenKind::Eof, String::new(), line, column);
        };

        if c.is_alphabetic() || c == '_' {
            return self.scan_identifier();
        }
        if c == '"' {
            return self.scan_string();
        }

        self.advance();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            _ => TokenKind::Unknown,
        };
        self.token(kind, c.to_string(), line, column)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    // Unterminated block comments simply run to EOF.
                    while let Some(c) = self.peek() {
                        if c == '*' && self.peek_at(1) == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_identifier(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        self.token(TokenKind::Ident, text, line, column)
    }

    /// Scan a double-quoted string literal. Content is taken verbatim up to
    /// the closing quote; there are no escape sequences. An unterminated
    /// string becomes an `Unknown` token spanning the rest of the input.
    fn scan_string(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    return self.token(TokenKind::Str, text, line, column);
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
                None => return self.token(TokenKind::Unknown, text, line, column),
            }
        }
    }

    fn token(&self, kind: TokenKind, text: String, line: u32, column: u32) -> Token {
        Token {
            kind,
            text,
            line,
            column,
        }
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(&c) = self.input.get(self.pos) {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}
