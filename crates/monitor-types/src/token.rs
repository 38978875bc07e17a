//! Lexical tokens of the Monitor command language.

use std::fmt;

use crate::error::MonitorError;
use crate::value::Value;

/// The decoded payload of a [`Token`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A bare word: command names, device names, member names.
    Literal(String),
    /// A quoted string, or a `"""` multi-line string.
    StringLiteral(String),
    /// An `@path` with escapes removed.
    PathLiteral(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Inclusive address range.
    Range { start: u64, end: u64 },
    /// `$name`, holding the name without the sigil.
    Variable(String),
    Comment(String),
    /// `` `cmd` ``, holding the inner command text.
    ExecutionSubstitution(String),
    Equality,
    ConditionalEquality,
    CommandSeparator,
    LeftBrace,
    RightBrace,
    /// A lone `"""`.
    MultilineTerminator,
}

impl TokenKind {
    /// Human-readable kind name used in help and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::StringLiteral(_) => "string",
            Self::PathLiteral(_) => "path",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::Range { .. } => "range",
            Self::Variable(_) => "variable",
            Self::Comment(_) => "comment",
            Self::ExecutionSubstitution(_) => "execution",
            Self::Equality => "equality",
            Self::ConditionalEquality => "conditional equality",
            Self::CommandSeparator => "separator",
            Self::LeftBrace => "left brace",
            Self::RightBrace => "right brace",
            Self::MultilineTerminator => "multiline terminator",
        }
    }
}

/// An immutable token: its decoded kind plus the exact source text it was
/// lexed from, so a line can always be reconstructed for re-parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    kind: TokenKind,
    raw: String,
}

impl Token {
    pub fn new(kind: TokenKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }

    pub fn literal(text: &str) -> Self {
        Self::new(TokenKind::Literal(text.to_string()), text)
    }

    /// A double-quoted string token; quotes and backslashes are escaped in
    /// the raw form.
    pub fn string(text: &str) -> Self {
        let mut raw = String::with_capacity(text.len() + 2);
        raw.push('"');
        for c in text.chars() {
            if c == '"' || c == '\\' {
                raw.push('\\');
            }
            raw.push(c);
        }
        raw.push('"');
        Self::new(TokenKind::StringLiteral(text.to_string()), raw)
    }

    pub fn path(path: &str) -> Self {
        let raw = format!("@{}", path.replace(' ', "\\ "));
        Self::new(TokenKind::PathLiteral(path.to_string()), raw)
    }

    pub fn integer(value: i64) -> Self {
        Self::new(TokenKind::Integer(value), value.to_string())
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(TokenKind::Boolean(value), value.to_string())
    }

    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    /// The original source text of the token.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, TokenKind::Literal(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, TokenKind::Variable(_))
    }

    /// Textual payload of word-like tokens.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Literal(s)
            | TokenKind::StringLiteral(s)
            | TokenKind::PathLiteral(s)
            | TokenKind::Variable(s) => Some(s),
            _ => None,
        }
    }

    /// The token as command text: string contents unquoted, everything else
    /// as written. Used when a stored value is played back as commands.
    pub fn source_text(&self) -> String {
        match &self.kind {
            TokenKind::StringLiteral(s) => s.clone(),
            _ => self.raw.clone(),
        }
    }

    /// The decoded value carried by the token.
    pub fn value(&self) -> Value {
        match &self.kind {
            TokenKind::Literal(s)
            | TokenKind::StringLiteral(s)
            | TokenKind::PathLiteral(s)
            | TokenKind::Variable(s)
            | TokenKind::ExecutionSubstitution(s)
            | TokenKind::Comment(s) => Value::String(s.clone()),
            TokenKind::Integer(i) => Value::Int(*i),
            TokenKind::Float(f) => Value::Float(*f),
            TokenKind::Boolean(b) => Value::Bool(*b),
            TokenKind::Range { start, end } => Value::Range {
                start: *start,
                end: *end,
            },
            _ => Value::String(self.raw.clone()),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Join tokens back into source text, separated by single spaces.
pub fn join_raw(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::raw)
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// TokenizationResult
// ---------------------------------------------------------------------------

/// Outcome of tokenizing one line.
#[derive(Debug)]
pub struct TokenizationResult {
    pub tokens: Vec<Token>,
    /// Count of trailing characters that could not be consumed; 0 on success.
    pub unmatched: usize,
    /// Error raised while decoding a malformed literal, if scanning stopped
    /// because of one.
    pub error: Option<MonitorError>,
}

impl TokenizationResult {
    pub fn is_success(&self) -> bool {
        self.unmatched == 0
    }
}
