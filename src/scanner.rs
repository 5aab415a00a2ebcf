use crate::error::{Diagnostics, ScanError, ScanErrorKind};
use crate::token::{Token, TokenType};
use phf::phf_map;
use std::iter::Peekable;
use std::str::CharIndices;

// Note: current becomes self.iter.peek()?.0
struct Scanner<'a> {
    source: &'a str,
    iter: Peekable<CharIndices<'a>>,
    start: usize,
    line: usize,
}

/// Scans the whole source, reporting lexical errors and carrying on past them.
/// The returned tokens always end with a single EOF token.
pub fn scan_tokens<'a>(source: &'a str, diagnostics: &mut Diagnostics) -> Vec<Token<'a>> {
    let mut scanner = Scanner {
        source,
        iter: source.char_indices().peekable(),
        start: 0,
        line: 1,
    };
    let mut tokens: Vec<Token<'a>> = Vec::new();

    while let Some(&(idx, _)) = scanner.iter.peek() {
        scanner.start = idx;
        match scanner.scan_token() {
            Ok(Some(token)) => tokens.push(token),
            Ok(None) => (),
            Err(e) => diagnostics.report(e),
        }
    }
    tokens.push(Token {
        tokentype: TokenType::EOF,
        lexeme: "",
        line: scanner.line,
    });
    tracing::debug!(count = tokens.len(), lines = scanner.line, "scanned source");
    tokens
}

impl<'a> Scanner<'a> {
    fn scan_token(&mut self) -> Result<Option<Token<'a>>, ScanError> {
        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(None),
        };
        match c {
            '(' => Ok(Some(self.token(TokenType::LeftParen))),
            ')' => Ok(Some(self.token(TokenType::RightParen))),
            '{' => Ok(Some(self.token(TokenType::LeftBrace))),
            '}' => Ok(Some(self.token(TokenType::RightBrace))),
            ',' => Ok(Some(self.token(TokenType::Comma))),
            '.' => Ok(Some(self.token(TokenType::Dot))),
            '-' => Ok(Some(self.token(TokenType::Minus))),
            '+' => Ok(Some(self.token(TokenType::Plus))),
            ';' => Ok(Some(self.token(TokenType::Semicolon))),
            '*' => Ok(Some(self.token(TokenType::Star))),
            '?' => Ok(Some(self.token(TokenType::Question))),
            ':' => Ok(Some(self.token(TokenType::Colon))),
            '!' => Ok(Some(self.one_or_two('=', TokenType::BangEqual, TokenType::Bang))),
            '=' => Ok(Some(self.one_or_two('=', TokenType::EqualEqual, TokenType::Equal))),
            '<' => Ok(Some(self.one_or_two('=', TokenType::LessEqual, TokenType::Less))),
            '>' => Ok(Some(self.one_or_two('=', TokenType::GreaterEqual, TokenType::Greater))),
            '/' => {
                if self.next_if('/') {
                    while let Some(&(_, c)) = self.iter.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.iter.next();
                    }
                    Ok(None)
                } else if self.next_if('*') {
                    self.block_comment().map(|_| None)
                } else {
                    Ok(Some(self.token(TokenType::Slash)))
                }
            }
            ' ' | '\r' | '\t' => Ok(None),
            '\n' => {
                self.line += 1;
                Ok(None)
            }
            '"' => self.string().map(Some),
            '0'..='9' => Ok(Some(self.number())),
            'a'..='z' | 'A'..='Z' | '_' => Ok(Some(self.identifier())),
            c => Err(self.error(ScanErrorKind::UnexpectedCharacter(c))),
        }
    }
    fn current(&mut self) -> usize {
        match self.iter.peek() {
            None => self.source.len(),
            Some(&(idx, _)) => idx,
        }
    }
    fn token(&mut self, token_type: TokenType<'a>) -> Token<'a> {
        let current = self.current();
        Token {
            tokentype: token_type,
            lexeme: &self.source[self.start..current],
            line: self.line,
        }
    }
    fn one_or_two(
        &mut self,
        second: char,
        matched: TokenType<'a>,
        single: TokenType<'a>,
    ) -> Token<'a> {
        if self.next_if(second) {
            self.token(matched)
        } else {
            self.token(single)
        }
    }
    fn error(&self, kind: ScanErrorKind) -> ScanError {
        ScanError {
            line: self.line,
            kind,
        }
    }
    fn next_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            return true;
        }
        false
    }
    fn advance(&mut self) -> Option<char> {
        self.iter.next().map(|(_, c)| c)
    }
    fn peek(&mut self) -> Option<char> {
        self.iter.peek().map(|&(_, c)| c)
    }
    fn peek_next(&self) -> Option<char> {
        let mut lookahead = self.iter.clone();
        lookahead.next();
        lookahead.next().map(|(_, c)| c)
    }
    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.advance();
        }
    }
    fn block_comment(&mut self) -> Result<(), ScanError> {
        let mut depth = 1;
        while depth > 0 {
            match (self.peek(), self.peek_next()) {
                (None, _) => return Err(self.error(ScanErrorKind::UnterminatedComment)),
                (Some('/'), Some('*')) => {
                    self.advance();
                    self.advance();
                    depth += 1;
                }
                (Some('*'), Some('/')) => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                }
                (Some(c), _) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    self.advance();
                }
            }
        }
        Ok(())
    }
    fn string(&mut self) -> Result<Token<'a>, ScanError> {
        while let Some(c) = self.peek() {
            match c {
                '"' => break,
                '\n' => {
                    self.line += 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
        if self.advance().is_none() {
            return Err(self.error(ScanErrorKind::UnterminatedString));
        }
        let current = self.current();
        // The closing quote is one byte wide.
        let contents = &self.source[self.start + 1..current - 1];
        Ok(self.token(TokenType::String(contents)))
    }
    fn number(&mut self) -> Token<'a> {
        self.advance_while(|c| c.is_ascii_digit());

        if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
            self.advance_while(|c| c.is_ascii_digit());
        }

        let current = self.current();
        // Digits with an optional fraction always parse; too many digits give infinity.
        let value = self.source[self.start..current].parse().unwrap_or(f64::INFINITY);
        self.token(TokenType::Number(value))
    }
    fn identifier(&mut self) -> Token<'a> {
        self.advance_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let current = self.current();
        match KEYWORDS.get(&self.source[self.start..current]) {
            None => self.token(TokenType::Identifier),
            Some(keyword) => self.token(keyword.clone()),
        }
    }
}

static KEYWORDS: phf::Map<&'static str, TokenType<'static>> = phf_map! {
    "and" => TokenType::And,
    "class" => TokenType::Class,
    "else" => TokenType::Else,
    "false" => TokenType::False,
    "for" => TokenType::For,
    "fun" => TokenType::Fun,
    "if" => TokenType::If,
    "nil" => TokenType::Nil,
    "or" => TokenType::Or,
    "print" => TokenType::Print,
    "return" => TokenType::Return,
    "super" => TokenType::Super,
    "this" => TokenType::This,
    "true" => TokenType::True,
    "var" => TokenType::Var,
    "while" => TokenType::While,
};
