use strum_macros::Display;

#[rustfmt::skip]
#[derive(Debug, Clone, PartialEq, Display)]
pub enum TokenType<'a> {
    // Single-character tokens.
    LeftParen, RightParen, LeftBrace, RightBrace,
    Comma, Dot, Minus, Plus, Semicolon, Slash, Star,
    Question, Colon,

    // One or two character tokens.
    Bang, BangEqual,
    Equal, EqualEqual,
    Greater, GreaterEqual,
    Less, LessEqual,

    // Literals.
    Identifier, String(&'a str), Number(f64),

    // Keywords.
    And, Class, Else, False, Fun, For, If, Nil, Or,
    Print, Return, Super, This, True, Var, While,

    EOF
}

/// The literal payload a token or a literal expression carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal<'a> {
    Nil,
    Boolean(bool),
    Number(f64),
    String(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub tokentype: TokenType<'a>,
    pub lexeme: &'a str,
    pub line: usize,
}

impl<'a> Token<'a> {
    /// The literal value for `nil`, `true`, `false`, numbers and strings.
    pub fn literal(&self) -> Option<Literal<'a>> {
        match self.tokentype {
            TokenType::Nil => Some(Literal::Nil),
            TokenType::True => Some(Literal::Boolean(true)),
            TokenType::False => Some(Literal::Boolean(false)),
            TokenType::Number(n) => Some(Literal::Number(n)),
            TokenType::String(s) => Some(Literal::String(s)),
            _ => None,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.tokentype, TokenType::EOF)
    }
}
