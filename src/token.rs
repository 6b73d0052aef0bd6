//! The token definition for the query language.

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    And, // "and"
    Or,  // "or"
    Not, // "not"
    In,  // "in"

    // Literals
    /// A bareword field path. Dot-separated segments are kept as one
    /// token, e.g. `author.country.code`.
    Name(String),
    /// A double-quoted string with quote escapes already resolved.
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// The `None` keyword.
    Null,

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,

    // Comparison operators
    Eq,          // =
    NotEq,       // !=
    Gt,          // >
    Lt,          // <
    Gte,         // >=
    Lte,         // <=
    Contains,    // ~
    NotContains, // !~

    /// End of input. Always the last token of a lexed stream.
    Eof,
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
