//! Token types shared between the Lexer, Preprocessor and Parser.
//!
//! Mirrors the teacher's `parser/lexer.rs` split of `TokenType` (a
//! closed tag set) from `Token` (tag + lexeme + position), but keeps a
//! single `line` field rather than line/column/offset/span, since this
//! language's diagnostics are line-accurate only (§1 Non-goals).

use std::fmt;

/// The closed tag set a token can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Keyword,
    Integer,
    Float,
    String,
    Compare,
    Assignment,
    Operator,
    Comma,
    LeftParen,
    RightParen,
    BlockStart,
    BlockEnd,
    SubscriptLeft,
    SubscriptRight,
    StatementEnd,
    Preprocessing,
    Eof,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Keyword => "keyword",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Compare => "compare",
            Self::Assignment => "assignment",
            Self::Operator => "operator",
            Self::Comma => "comma",
            Self::LeftParen => "(",
            Self::RightParen => ")",
            Self::BlockStart => "{",
            Self::BlockEnd => "}",
            Self::SubscriptLeft => "[",
            Self::SubscriptRight => "]",
            Self::StatementEnd => "statement end",
            Self::Preprocessing => "#",
            Self::Eof => "end of file",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single lexical token: `{ kind, lexeme, line }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }

    /// Human-readable description used in parse/preprocessing error
    /// messages, e.g. `"if" (keyword)`.
    pub fn desc(&self) -> String {
        format!("\"{}\" ({})", self.lexeme, self.kind)
    }
}

/// Fixed keyword set; identifiers promote to `Keyword` at lex time when
/// they match one of these.
pub const KEYWORDS: &[&str] = &[
    "const", "var", "array", "if", "else", "while", "until", "true", "false", "function",
    "clone", "delete", "for", "attribute",
];

/// Identifiers promoted to `Compare` instead, since they're infix
/// comparison operators spelled as words.
pub const COMPARE_WORDS: &[&str] = &["in", "contains"];
