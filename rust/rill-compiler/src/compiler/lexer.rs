//! Hand-rolled lexer for Rill source code.

use crate::compiler::tokens::{Span, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, col {col}")]
    UnexpectedChar { ch: char, line: usize, col: usize },
    #[error("integer literal out of range at line {line}, col {col}")]
    IntOutOfRange { line: usize, col: usize },
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    byte_offset: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            byte_offset: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        self.byte_offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn span_from(&self, start_offset: usize, line: usize, col: usize) -> Span {
        Span::new(start_offset, self.byte_offset, line, col)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.current() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                // `--` comment to end of line
                Some('-') if self.peek() == Some('-') => {
                    while let Some(ch) = self.current() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, LexError> {
        let (line, col) = (self.line, self.col);
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text.parse::<i64>()
            .map(TokenKind::IntLit)
            .map_err(|_| LexError::IntOutOfRange { line, col })
    }

    fn lex_word(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' || ch == '\'' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        match text.as_str() {
            "val" => TokenKind::Val,
            "rec" => TokenKind::Rec,
            "data" => TokenKind::Data,
            "fn" => TokenKind::Fn,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "let" => TokenKind::Let,
            "in" => TokenKind::In,
            "match" => TokenKind::Match,
            "with" => TokenKind::With,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "throw" => TokenKind::Throw,
            "send" => TokenKind::Send,
            "sendp" => TokenKind::SendP,
            "recv" => TokenKind::Recv,
            "recvp" => TokenKind::RecvP,
            "newchan" => TokenKind::NewChan,
            "close" => TokenKind::Close,
            _ => TokenKind::Ident(text),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let (start, line, col) = (self.byte_offset, self.line, self.col);
            let Some(ch) = self.current() else {
                tokens.push(Token::new(TokenKind::Eof, self.span_from(start, line, col)));
                return Ok(tokens);
            };

            let kind = match ch {
                '0'..='9' => self.lex_number()?,
                ch if ch.is_alphabetic() || ch == '_' => self.lex_word(),
                '-' if self.peek() == Some('>') => {
                    self.advance();
                    self.advance();
                    TokenKind::Arrow
                }
                '-' => {
                    self.advance();
                    TokenKind::Minus
                }
                '=' if self.peek() == Some('=') => {
                    self.advance();
                    self.advance();
                    TokenKind::EqEq
                }
                '=' => {
                    self.advance();
                    TokenKind::Assign
                }
                '&' if self.peek() == Some('&') => {
                    self.advance();
                    self.advance();
                    TokenKind::AndAnd
                }
                '|' if self.peek() == Some('|') => {
                    self.advance();
                    self.advance();
                    TokenKind::OrOr
                }
                '|' => {
                    self.advance();
                    TokenKind::Bar
                }
                ';' if self.peek() == Some(';') => {
                    self.advance();
                    self.advance();
                    TokenKind::SemiSemi
                }
                ';' => {
                    self.advance();
                    TokenKind::Semi
                }
                '+' => {
                    self.advance();
                    TokenKind::Plus
                }
                '*' => {
                    self.advance();
                    TokenKind::Star
                }
                '/' => {
                    self.advance();
                    TokenKind::Slash
                }
                '%' => {
                    self.advance();
                    TokenKind::Percent
                }
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                other => {
                    return Err(LexError::UnexpectedChar {
                        ch: other,
                        line,
                        col,
                    })
                }
            };
            tokens.push(Token::new(kind, self.span_from(start, line, col)));
        }
    }
}
