use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the start in the source
    pub start: usize,
    /// Byte offset of the end (exclusive) in the source
    pub end: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column number
    pub col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        Self {
            start,
            end,
            line,
            col,
        }
    }

    pub fn dummy() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 0,
            col: 0,
        }
    }
}

/// Token types for the Rill language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals and names
    IntLit(i64),
    Ident(String),

    // Keywords
    Val,
    Rec,
    Data,
    Fn,
    If,
    Then,
    Else,
    Let,
    In,
    Match,
    With,
    Try,
    Catch,
    Throw,
    Send,
    SendP,
    Recv,
    RecvP,
    NewChan,
    Close,

    // Punctuation and operators
    Arrow,     // ->
    Assign,    // =
    EqEq,      // ==
    AndAnd,    // &&
    OrOr,      // ||
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Percent,   // %
    Semi,      // ;
    SemiSemi,  // ;;
    Bar,       // |
    LParen,    // (
    RParen,    // )

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::IntLit(n) => write!(f, "integer '{}'", n),
            TokenKind::Ident(name) => write!(f, "'{}'", name),
            TokenKind::Val => f.write_str("'val'"),
            TokenKind::Rec => f.write_str("'rec'"),
            TokenKind::Data => f.write_str("'data'"),
            TokenKind::Fn => f.write_str("'fn'"),
            TokenKind::If => f.write_str("'if'"),
            TokenKind::Then => f.write_str("'then'"),
            TokenKind::Else => f.write_str("'else'"),
            TokenKind::Let => f.write_str("'let'"),
            TokenKind::In => f.write_str("'in'"),
            TokenKind::Match => f.write_str("'match'"),
            TokenKind::With => f.write_str("'with'"),
            TokenKind::Try => f.write_str("'try'"),
            TokenKind::Catch => f.write_str("'catch'"),
            TokenKind::Throw => f.write_str("'throw'"),
            TokenKind::Send => f.write_str("'send'"),
            TokenKind::SendP => f.write_str("'sendp'"),
            TokenKind::Recv => f.write_str("'recv'"),
            TokenKind::RecvP => f.write_str("'recvp'"),
            TokenKind::NewChan => f.write_str("'newchan'"),
            TokenKind::Close => f.write_str("'close'"),
            TokenKind::Arrow => f.write_str("'->'"),
            TokenKind::Assign => f.write_str("'='"),
            TokenKind::EqEq => f.write_str("'=='"),
            TokenKind::AndAnd => f.write_str("'&&'"),
            TokenKind::OrOr => f.write_str("'||'"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::Percent => f.write_str("'%'"),
            TokenKind::Semi => f.write_str("';'"),
            TokenKind::SemiSemi => f.write_str("';;'"),
            TokenKind::Bar => f.write_str("'|'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

/// A token with its source span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}
