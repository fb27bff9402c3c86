//! Rill compiler frontend.
//!
//! Turns Rill source text into `Phrase` trees (expressions to calculate or
//! definitions to elaborate) for the runtime to interpret.

pub mod compiler;

use thiserror::Error;

pub use compiler::ast::{BinOp, Case, CtorDef, Defn, Expr, MonOp, Phrase};
pub use compiler::lexer::{LexError, Lexer};
pub use compiler::parser::{ParseError, Parser};
pub use compiler::tokens::{Span, Token, TokenKind};

/// Any error raised while turning source text into phrases.
#[derive(Debug, Error, Clone)]
pub enum FrontendError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("{0}")]
    Parse(#[from] ParseError),
}

/// Parse a whole source file into a sequence of phrases.
///
/// Phrases may be separated by `;;`; the separator is mandatory between two
/// consecutive expression phrases (application by juxtaposition would
/// otherwise swallow the second one).
pub fn parse_program(source: &str) -> Result<Vec<Phrase>, FrontendError> {
    let tokens = Lexer::new(source).tokenize()?;
    let phrases = Parser::new(tokens).parse_program()?;
    Ok(phrases)
}

/// Parse exactly one phrase, as submitted at the REPL prompt.
pub fn parse_phrase(source: &str) -> Result<Phrase, FrontendError> {
    let tokens = Lexer::new(source).tokenize()?;
    let phrase = Parser::new(tokens).parse_phrase()?;
    Ok(phrase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phrase_rejects_trailing_garbage() {
        assert!(parse_phrase("1 + 2 ;; 3").is_err());
    }

    #[test]
    fn test_parse_program_splits_on_separator() {
        let phrases = parse_program("val x = 1 ;; x + 1 ;;").unwrap();
        assert_eq!(phrases.len(), 2);
    }
}
