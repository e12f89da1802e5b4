//! SQL token definitions

use logos::Logos;

use crate::Span;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"--[^\n]*")] // Skip line comments
#[logos(skip r"/\*([^*]|\*[^/])*\*/")] // Skip block comments
pub enum TokenKind {
    // === Keywords ===
    // Lexed as identifiers and promoted by `tokenize`, so they stay case
    // insensitive without competing with the identifier pattern.
    Select,
    Distinct,
    From,
    Where,
    As,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Returning,
    With,
    Order,
    By,
    Asc,
    Desc,
    Cast,
    Null,
    True,
    False,

    // === Operators ===
    #[token("::")]
    ColonColon,
    #[token("*")]
    Star,
    #[regex(r"[+\-/<>=!%|&^~]+")]
    Operator,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // === Punctuation ===
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,

    // === Literals ===
    #[regex(r"\$[0-9]+")]
    Param,

    #[regex(r"[0-9]+", priority = 2)]
    Int,

    #[regex(r"[0-9]+\.[0-9]+")]
    Float,

    #[regex(r"'([^']|'')*'")]
    String,

    // === Identifiers ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_$]*")]
    Ident,

    #[regex(r#""([^"]|"")+""#)]
    QuotedIdent,

    // === Special ===
    Error,
    Eof,
}

impl TokenKind {
    /// Keyword spelled by an unquoted identifier, if any
    pub fn keyword(text: &str) -> Option<TokenKind> {
        let kind = match text.to_ascii_lowercase().as_str() {
            "select" => TokenKind::Select,
            "distinct" => TokenKind::Distinct,
            "from" => TokenKind::From,
            "where" => TokenKind::Where,
            "as" => TokenKind::As,
            "insert" => TokenKind::Insert,
            "into" => TokenKind::Into,
            "values" => TokenKind::Values,
            "update" => TokenKind::Update,
            "set" => TokenKind::Set,
            "delete" => TokenKind::Delete,
            "returning" => TokenKind::Returning,
            "with" => TokenKind::With,
            "order" => TokenKind::Order,
            "by" => TokenKind::By,
            "asc" => TokenKind::Asc,
            "desc" => TokenKind::Desc,
            "cast" => TokenKind::Cast,
            "null" => TokenKind::Null,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        };
        Some(kind)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Select => "'SELECT'",
            TokenKind::Distinct => "'DISTINCT'",
            TokenKind::From => "'FROM'",
            TokenKind::Where => "'WHERE'",
            TokenKind::As => "'AS'",
            TokenKind::Insert => "'INSERT'",
            TokenKind::Into => "'INTO'",
            TokenKind::Values => "'VALUES'",
            TokenKind::Update => "'UPDATE'",
            TokenKind::Set => "'SET'",
            TokenKind::Delete => "'DELETE'",
            TokenKind::Returning => "'RETURNING'",
            TokenKind::With => "'WITH'",
            TokenKind::Order => "'ORDER'",
            TokenKind::By => "'BY'",
            TokenKind::Asc => "'ASC'",
            TokenKind::Desc => "'DESC'",
            TokenKind::Cast => "'CAST'",
            TokenKind::Null => "'NULL'",
            TokenKind::True => "'TRUE'",
            TokenKind::False => "'FALSE'",
            TokenKind::ColonColon => "'::'",
            TokenKind::Star => "'*'",
            TokenKind::Operator => "operator",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Dot => "'.'",
            TokenKind::Param => "parameter",
            TokenKind::Int => "integer",
            TokenKind::Float => "number",
            TokenKind::String => "string",
            TokenKind::Ident | TokenKind::QuotedIdent => "identifier",
            TokenKind::Error => "invalid input",
            TokenKind::Eof => "end of input",
        }
    }
}

/// A token with its span
#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

/// Tokenize SQL text. Spans are shifted by `base` so tokens of a statement
/// slice keep their offsets in the full text.
pub fn tokenize(source: &str, base: usize) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let mut kind = result.unwrap_or(TokenKind::Error);
        if kind == TokenKind::Ident {
            kind = TokenKind::keyword(lexer.slice()).unwrap_or(kind);
        }
        tokens.push(Token {
            kind,
            span: Span::new(base + range.start, base + range.end),
        });
    }

    let end = base + source.len();
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(end, end),
    });

    tokens
}
