//
// syntax/lexer.rs
//
// Layout-aware tokenizer. Comments and whitespace are dropped; every token
// remembers its column and whether it opens a line so the parser can apply
// the offside rule.
//

use super::kind::{keyword, SyntaxKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: SyntaxKind,
    pub start: u32,
    pub end: u32,
    /// Column in characters from the start of the line
    pub col: u32,
    /// First token on its line
    pub line_start: bool,
    /// Whitespace or a comment separates this token from the previous one
    pub spaced_before: bool,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start as usize..self.end as usize]
    }
}

const OPERATOR_CHARS: &[char] = &[
    '+', '-', '*', '/', '=', '<', '>', '!', '&', '|', '^', '%', ':', '.', '?', '~', '#', '$', '@',
];

struct Lexer<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    col: u32,
    line_start: bool,
    spaced: bool,
}

/// Tokenize a whole source text.
///
/// Never fails: characters that cannot start a token become single-char
/// `ErrorToken`s, and an unterminated string or char literal becomes an
/// `ErrorToken` spanning the rest of its line.
pub fn lex(text: &str) -> Vec<Token> {
    lex_from(text, 0).collect()
}

/// Tokenize lazily from byte offset `start`, which must open a line and lie
/// outside any comment or literal. Offsets stay absolute.
pub(crate) fn lex_from(text: &str, start: usize) -> impl Iterator<Item = Token> + '_ {
    Lexer {
        text,
        bytes: text.as_bytes(),
        pos: start,
        col: 0,
        line_start: true,
        spaced: true,
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        while self.skip_trivia() {}
        if self.pos >= self.bytes.len() {
            return None;
        }
        let start = self.pos;
        let col = self.col;
        let line_start = self.line_start;
        let spaced = self.spaced;
        let kind = self.scan_token(start);
        self.line_start = false;
        self.spaced = false;
        Some(Token {
            kind,
            start: start as u32,
            end: self.pos as u32,
            col,
            line_start,
            spaced_before: spaced,
        })
    }
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.col = 0;
            self.line_start = true;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.text[self.pos..].starts_with(s)
    }

    /// Skip whitespace and comments. Returns true if anything was skipped.
    fn skip_trivia(&mut self) -> bool {
        let Some(ch) = self.peek() else {
            return false;
        };
        if ch.is_whitespace() {
            self.advance();
            self.spaced = true;
            return true;
        }
        if self.starts_with("--") {
            while let Some(ch) = self.peek() {
                if ch == '\n' {
                    break;
                }
                self.advance();
            }
            self.spaced = true;
            return true;
        }
        if self.starts_with("{-") {
            let mut depth = 0usize;
            while self.pos < self.bytes.len() {
                if self.starts_with("{-") {
                    depth += 1;
                    self.advance();
                    self.advance();
                } else if self.starts_with("-}") {
                    depth -= 1;
                    self.advance();
                    self.advance();
                    if depth == 0 {
                        break;
                    }
                } else {
                    self.advance();
                }
            }
            self.spaced = true;
            return true;
        }
        false
    }

    fn scan_token(&mut self, start: usize) -> SyntaxKind {
        let Some(ch) = self.advance() else {
            return SyntaxKind::ErrorToken;
        };
        match ch {
            '(' => SyntaxKind::LParen,
            ')' => SyntaxKind::RParen,
            '[' => SyntaxKind::LBracket,
            ']' => SyntaxKind::RBracket,
            '{' => SyntaxKind::LBrace,
            '}' => SyntaxKind::RBrace,
            ',' => SyntaxKind::Comma,
            '\\' => SyntaxKind::Backslash,
            '"' => self.scan_string(),
            '\'' => self.scan_char(),
            c if c.is_ascii_digit() => self.scan_number(c),
            c if c.is_lowercase() || c == '_' => {
                self.eat_ident_rest();
                let text = &self.text[start..self.pos];
                if text == "_" {
                    SyntaxKind::Underscore
                } else {
                    keyword(text).unwrap_or(SyntaxKind::LowerIdent)
                }
            }
            c if c.is_uppercase() => {
                self.eat_ident_rest();
                SyntaxKind::UpperIdent
            }
            c if OPERATOR_CHARS.contains(&c) => self.scan_operator(start, c),
            _ => SyntaxKind::ErrorToken,
        }
    }

    fn eat_ident_rest(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_number(&mut self, first: char) -> SyntaxKind {
        if first == '0' && matches!(self.peek(), Some('x') | Some('X')) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            return SyntaxKind::Number;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let signed = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }
        SyntaxKind::Number
    }

    fn scan_string(&mut self) -> SyntaxKind {
        if self.starts_with("\"\"") {
            self.advance();
            self.advance();
            while self.pos < self.bytes.len() {
                if self.starts_with("\\") {
                    self.advance();
                    self.advance();
                } else if self.starts_with("\"\"\"") {
                    self.advance();
                    self.advance();
                    self.advance();
                    return SyntaxKind::StringLit;
                } else {
                    self.advance();
                }
            }
            return SyntaxKind::ErrorToken;
        }
        self.scan_quoted('"', SyntaxKind::StringLit)
    }

    fn scan_char(&mut self) -> SyntaxKind {
        self.scan_quoted('\'', SyntaxKind::CharLit)
    }

    fn scan_quoted(&mut self, quote: char, kind: SyntaxKind) -> SyntaxKind {
        while let Some(ch) = self.peek() {
            match ch {
                '\n' => return SyntaxKind::ErrorToken,
                '\\' => {
                    self.advance();
                    self.advance();
                }
                c if c == quote => {
                    self.advance();
                    return kind;
                }
                _ => {
                    self.advance();
                }
            }
        }
        SyntaxKind::ErrorToken
    }

    fn scan_operator(&mut self, start: usize, first: char) -> SyntaxKind {
        // A dot directly followed by an identifier is always a separator
        // (qualified names, field access, accessor functions).
        if first == '.' && self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return SyntaxKind::Dot;
        }
        while let Some(ch) = self.peek() {
            if !OPERATOR_CHARS.contains(&ch) {
                break;
            }
            // `--` inside an operator run starts a comment
            if ch == '-' && self.peek_at(1) == Some('-') {
                break;
            }
            self.advance();
        }
        match &self.text[start..self.pos] {
            "=" => SyntaxKind::Equals,
            ":" => SyntaxKind::Colon,
            "|" => SyntaxKind::Pipe,
            "->" => SyntaxKind::Arrow,
            "." => SyntaxKind::Dot,
            ".." => SyntaxKind::DoubleDot,
            _ => SyntaxKind::Operator,
        }
    }
}
