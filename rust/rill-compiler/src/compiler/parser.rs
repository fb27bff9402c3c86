//! Recursive descent parser for Rill.
//!
//! Precedence, loosest to tightest: `;` (sequencing), `||`, `&&`, `==`,
//! additive, multiplicative, prefix forms, application by juxtaposition.
//! `(e1 | e2 | …)` with two or more branches is a parallel composition.

use crate::compiler::ast::*;
use crate::compiler::tokens::{Token, TokenKind};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected {found} at line {line}, col {col}; expected {expected}")]
    Unexpected {
        found: String,
        expected: String,
        line: usize,
        col: usize,
    },
    #[error("pattern head at line {line}, col {col} must be a constructor name")]
    PatternHeadNotConstructor { line: usize, col: usize },
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// `tokens` must be terminated by an `Eof` token, as the lexer produces.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !matches!(token.kind, TokenKind::Eof) {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::Unexpected {
            found: token.kind.to_string(),
            expected: expected.to_string(),
            line: token.span.line,
            col: token.span.col,
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<String, ParseError> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected(expected))
        }
    }

    // ── Phrases ──

    /// Parse a whole token stream as a sequence of phrases.
    pub fn parse_program(&mut self) -> Result<Vec<Phrase>, ParseError> {
        let mut phrases = Vec::new();
        loop {
            while self.eat(&TokenKind::SemiSemi) {}
            if self.check(&TokenKind::Eof) {
                return Ok(phrases);
            }
            phrases.push(self.parse_phrase_inner()?);
        }
    }

    /// Parse exactly one phrase followed by end of input.
    pub fn parse_phrase(&mut self) -> Result<Phrase, ParseError> {
        let phrase = self.parse_phrase_inner()?;
        self.eat(&TokenKind::SemiSemi);
        self.expect(&TokenKind::Eof, "end of input")?;
        Ok(phrase)
    }

    fn parse_phrase_inner(&mut self) -> Result<Phrase, ParseError> {
        match self.peek().kind {
            TokenKind::Val | TokenKind::Rec | TokenKind::Data => {
                Ok(Phrase::Define(self.parse_defn()?))
            }
            _ => Ok(Phrase::Calculate(self.parse_expr()?)),
        }
    }

    // ── Definitions ──

    fn parse_defn(&mut self) -> Result<Defn, ParseError> {
        match self.peek().kind {
            TokenKind::Val => {
                self.advance();
                let name = self.expect_ident("a name to bind")?;
                self.expect(&TokenKind::Assign, "'='")?;
                Ok(Defn::Val(name, self.parse_expr()?))
            }
            TokenKind::Rec => {
                self.advance();
                let name = self.expect_ident("a name to bind")?;
                self.expect(&TokenKind::Assign, "'='")?;
                Ok(Defn::Rec(name, self.parse_expr()?))
            }
            TokenKind::Data => {
                self.advance();
                let name = self.parse_ctor_name("a type name")?;
                self.expect(&TokenKind::Assign, "'='")?;
                let mut ctors = vec![self.parse_ctor_def()?];
                while self.eat(&TokenKind::Bar) {
                    ctors.push(self.parse_ctor_def()?);
                }
                Ok(Defn::Data(name, ctors))
            }
            _ => Err(self.unexpected("'val', 'rec', or 'data'")),
        }
    }

    fn parse_ctor_name(&mut self, expected: &str) -> Result<String, ParseError> {
        match &self.peek().kind {
            TokenKind::Ident(name) if is_ctor_name(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn parse_ctor_def(&mut self) -> Result<CtorDef, ParseError> {
        let name = self.parse_ctor_name("a constructor name")?;
        let mut params = Vec::new();
        while let TokenKind::Ident(param) = &self.peek().kind {
            if is_ctor_name(param) {
                break;
            }
            params.push(param.clone());
            self.advance();
        }
        Ok(CtorDef { name, params })
    }

    // ── Expressions ──

    pub fn parse_expr(&mut self) -> Result<Rc<Expr>, ParseError> {
        self.parse_seq()
    }

    fn parse_seq(&mut self) -> Result<Rc<Expr>, ParseError> {
        let mut parts = vec![self.parse_disj()?];
        while self.eat(&TokenKind::Semi) {
            parts.push(self.parse_disj()?);
        }
        // right-nested: a ; b ; c  ==  Pipe(a, Pipe(b, c))
        let mut expr = parts.pop().expect("at least one part");
        while let Some(prev) = parts.pop() {
            expr = Rc::new(Expr::Pipe(prev, expr));
        }
        Ok(expr)
    }

    fn parse_disj(&mut self) -> Result<Rc<Expr>, ParseError> {
        let mut left = self.parse_conj()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.parse_conj()?;
            left = Rc::new(Expr::BinPrim(BinOp::Or, left, right));
        }
        Ok(left)
    }

    fn parse_conj(&mut self) -> Result<Rc<Expr>, ParseError> {
        let mut left = self.parse_cmp()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.parse_cmp()?;
            left = Rc::new(Expr::BinPrim(BinOp::And, left, right));
        }
        Ok(left)
    }

    fn parse_cmp(&mut self) -> Result<Rc<Expr>, ParseError> {
        let left = self.parse_arith()?;
        if self.eat(&TokenKind::EqEq) {
            let right = self.parse_arith()?;
            return Ok(Rc::new(Expr::BinPrim(BinOp::Equal, left, right)));
        }
        Ok(left)
    }

    fn parse_arith(&mut self) -> Result<Rc<Expr>, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Plus,
                TokenKind::Minus => BinOp::Minus,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = Rc::new(Expr::BinPrim(op, left, right));
        }
    }

    fn parse_term(&mut self) -> Result<Rc<Expr>, ParseError> {
        let mut left = self.parse_prefix()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Times,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_prefix()?;
            left = Rc::new(Expr::BinPrim(op, left, right));
        }
    }

    fn parse_prefix(&mut self) -> Result<Rc<Expr>, ParseError> {
        match self.peek().kind {
            TokenKind::Send => {
                self.advance();
                let chan = self.parse_atom()?;
                let value = self.parse_atom()?;
                Ok(Rc::new(Expr::Send(chan, value)))
            }
            TokenKind::SendP => {
                self.advance();
                let chan = self.parse_atom()?;
                let value = self.parse_atom()?;
                Ok(Rc::new(Expr::SendP(chan, value)))
            }
            TokenKind::Recv => {
                self.advance();
                Ok(Rc::new(Expr::Receive(self.parse_atom()?)))
            }
            TokenKind::RecvP => {
                self.advance();
                Ok(Rc::new(Expr::ReceiveP(self.parse_atom()?)))
            }
            TokenKind::Close => {
                self.advance();
                Ok(Rc::new(Expr::Close(self.parse_atom()?)))
            }
            TokenKind::Throw => {
                self.advance();
                Ok(Rc::new(Expr::Throw(self.parse_prefix()?)))
            }
            TokenKind::Minus => {
                self.advance();
                Ok(Rc::new(Expr::MonPrim(MonOp::Neg, self.parse_atom()?)))
            }
            _ => self.parse_application(),
        }
    }

    fn starts_atom(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::IntLit(_)
                | TokenKind::Ident(_)
                | TokenKind::NewChan
                | TokenKind::LParen
        )
    }

    fn parse_application(&mut self) -> Result<Rc<Expr>, ParseError> {
        let mut expr = self.parse_atom()?;
        while self.starts_atom() {
            let arg = self.parse_atom()?;
            expr = Rc::new(Expr::Apply(expr, arg));
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Rc<Expr>, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::IntLit(n) => {
                self.advance();
                Ok(Rc::new(Expr::Number(n)))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Rc::new(Expr::Variable(name)))
            }
            TokenKind::NewChan => {
                self.advance();
                Ok(Rc::new(Expr::NewChan))
            }
            TokenKind::LParen => {
                self.advance();
                let first = self.parse_expr()?;
                if self.check(&TokenKind::Bar) {
                    let mut components = vec![first];
                    while self.eat(&TokenKind::Bar) {
                        components.push(self.parse_expr()?);
                    }
                    self.expect(&TokenKind::RParen, "')'")?;
                    return Ok(Rc::new(Expr::Parallel(components)));
                }
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(first)
            }
            TokenKind::Fn => {
                self.advance();
                let param = self.expect_ident("a parameter name")?;
                self.expect(&TokenKind::Arrow, "'->'")?;
                Ok(Rc::new(Expr::Lambda(param, self.parse_expr()?)))
            }
            TokenKind::If => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::Then, "'then'")?;
                let then_branch = self.parse_expr()?;
                self.expect(&TokenKind::Else, "'else'")?;
                let else_branch = self.parse_expr()?;
                Ok(Rc::new(Expr::If(cond, then_branch, else_branch)))
            }
            TokenKind::Let => {
                self.advance();
                let defn = if matches!(
                    self.peek().kind,
                    TokenKind::Val | TokenKind::Rec | TokenKind::Data
                ) {
                    self.parse_defn()?
                } else {
                    // bare `let x = e` is shorthand for `let val x = e`
                    let name = self.expect_ident("a name to bind")?;
                    self.expect(&TokenKind::Assign, "'='")?;
                    Defn::Val(name, self.parse_expr()?)
                };
                self.expect(&TokenKind::In, "'in'")?;
                Ok(Rc::new(Expr::Let(defn, self.parse_expr()?)))
            }
            TokenKind::Match => {
                self.advance();
                let scrutinee = self.parse_expr()?;
                self.expect(&TokenKind::With, "'with'")?;
                Ok(Rc::new(Expr::Match(scrutinee, self.parse_arms()?)))
            }
            TokenKind::Try => {
                self.advance();
                let body = self.parse_expr()?;
                self.expect(&TokenKind::Catch, "'catch'")?;
                Ok(Rc::new(Expr::TryCatch(body, self.parse_arms()?)))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    // ── Match and catch arms ──

    fn parse_arms(&mut self) -> Result<Vec<Case>, ParseError> {
        self.eat(&TokenKind::Bar);
        let mut cases = vec![self.parse_case()?];
        while self.eat(&TokenKind::Bar) {
            cases.push(self.parse_case()?);
        }
        Ok(cases)
    }

    fn parse_case(&mut self) -> Result<Case, ParseError> {
        let pattern = self.parse_pattern()?;
        self.expect(&TokenKind::Arrow, "'->'")?;
        let body = self.parse_expr()?;
        Ok(Case { pattern, body })
    }

    // ── Patterns ──

    fn starts_pattern_atom(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::IntLit(_) | TokenKind::Ident(_) | TokenKind::LParen
        )
    }

    fn parse_pattern(&mut self) -> Result<Rc<Expr>, ParseError> {
        let head_span = self.peek().span;
        let head = self.parse_pattern_atom()?;
        if !self.starts_pattern_atom() {
            return Ok(head);
        }
        // constructor application; matching flattens the spine back out
        let tag = match head.as_ref() {
            Expr::Injector(name, args) if args.is_empty() => name.clone(),
            _ => {
                return Err(ParseError::PatternHeadNotConstructor {
                    line: head_span.line,
                    col: head_span.col,
                })
            }
        };
        let mut spine: Rc<Expr> = Rc::new(Expr::Variable(tag));
        while self.starts_pattern_atom() {
            let arg = self.parse_pattern_atom()?;
            spine = Rc::new(Expr::Apply(spine, arg));
        }
        Ok(spine)
    }

    fn parse_pattern_atom(&mut self) -> Result<Rc<Expr>, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::IntLit(n) => {
                self.advance();
                Ok(Rc::new(Expr::Number(n)))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if is_ctor_name(&name) {
                    Ok(Rc::new(Expr::Injector(name, vec![])))
                } else {
                    Ok(Rc::new(Expr::Variable(name)))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let pattern = self.parse_pattern()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(pattern)
            }
            _ => Err(self.unexpected("a pattern")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::Lexer;

    fn parse_src(src: &str) -> Result<Phrase, ParseError> {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).parse_phrase()
    }

    fn parse_expr_src(src: &str) -> Rc<Expr> {
        match parse_src(src).unwrap() {
            Phrase::Calculate(e) => e,
            Phrase::Define(_) => panic!("expected expression"),
        }
    }

    #[test]
    fn test_parse_precedence() {
        let e = parse_expr_src("1 + 2 * 3");
        assert_eq!(
            e.as_ref(),
            &Expr::BinPrim(
                BinOp::Plus,
                Rc::new(Expr::Number(1)),
                Rc::new(Expr::BinPrim(
                    BinOp::Times,
                    Rc::new(Expr::Number(2)),
                    Rc::new(Expr::Number(3)),
                )),
            )
        );
    }

    #[test]
    fn test_parse_application_left_assoc() {
        let e = parse_expr_src("f x y");
        assert_eq!(
            e.as_ref(),
            &Expr::Apply(
                Rc::new(Expr::Apply(
                    Rc::new(Expr::Variable("f".into())),
                    Rc::new(Expr::Variable("x".into())),
                )),
                Rc::new(Expr::Variable("y".into())),
            )
        );
    }

    #[test]
    fn test_parse_sequencing_right_nested() {
        let e = parse_expr_src("1 ; 2 ; 3");
        assert_eq!(
            e.as_ref(),
            &Expr::Pipe(
                Rc::new(Expr::Number(1)),
                Rc::new(Expr::Pipe(Rc::new(Expr::Number(2)), Rc::new(Expr::Number(3)))),
            )
        );
    }

    #[test]
    fn test_parse_parallel() {
        let e = parse_expr_src("(send c 42 | recv c)");
        let Expr::Parallel(components) = e.as_ref() else {
            panic!("expected parallel, got {:?}", e);
        };
        assert_eq!(components.len(), 2);
        assert!(matches!(components[0].as_ref(), Expr::Send(_, _)));
        assert!(matches!(components[1].as_ref(), Expr::Receive(_)));
    }

    #[test]
    fn test_parse_grouping_is_not_parallel() {
        let e = parse_expr_src("(1 + 2)");
        assert!(matches!(e.as_ref(), Expr::BinPrim(BinOp::Plus, _, _)));
    }

    #[test]
    fn test_parse_let_newchan() {
        let e = parse_expr_src("let c = newchan in recv c");
        let Expr::Let(Defn::Val(name, rhs), body) = e.as_ref() else {
            panic!("expected let");
        };
        assert_eq!(name, "c");
        assert_eq!(rhs.as_ref(), &Expr::NewChan);
        assert!(matches!(body.as_ref(), Expr::Receive(_)));
    }

    #[test]
    fn test_parse_let_body_can_be_any_defn() {
        assert!(parse_src("let rec f = fn x -> f x in f").is_ok());
        assert!(parse_src("let data Box = Box x in Box 1").is_ok());
    }

    #[test]
    fn test_parse_match_arms() {
        let e = parse_expr_src("match xs with | Cons x xs -> x | Nil -> 0");
        let Expr::Match(_, cases) = e.as_ref() else {
            panic!("expected match");
        };
        assert_eq!(cases.len(), 2);
        // `Cons x xs` flattens to an Apply spine headed by the tag
        let Expr::Apply(inner, arg2) = cases[0].pattern.as_ref() else {
            panic!("expected application pattern");
        };
        assert_eq!(arg2.as_ref(), &Expr::Variable("xs".into()));
        let Expr::Apply(head, arg1) = inner.as_ref() else {
            panic!("expected nested application");
        };
        assert_eq!(head.as_ref(), &Expr::Variable("Cons".into()));
        assert_eq!(arg1.as_ref(), &Expr::Variable("x".into()));
        // a bare constructor is a nullary injector pattern
        assert_eq!(
            cases[1].pattern.as_ref(),
            &Expr::Injector("Nil".into(), vec![])
        );
    }

    #[test]
    fn test_parse_pattern_head_must_be_ctor() {
        let err = parse_src("match x with f y -> 0").unwrap_err();
        assert!(matches!(err, ParseError::PatternHeadNotConstructor { .. }));
    }

    #[test]
    fn test_parse_try_catch() {
        let e = parse_expr_src("try throw ExcClosed catch ExcClosed -> 7");
        let Expr::TryCatch(body, cases) = e.as_ref() else {
            panic!("expected try");
        };
        assert!(matches!(body.as_ref(), Expr::Throw(_)));
        assert_eq!(cases.len(), 1);
    }

    #[test]
    fn test_parse_data_defn() {
        let Phrase::Define(Defn::Data(name, ctors)) =
            parse_src("data List = Cons x xs | Nil").unwrap()
        else {
            panic!("expected data definition");
        };
        assert_eq!(name, "List");
        assert_eq!(ctors.len(), 2);
        assert_eq!(ctors[0].name, "Cons");
        assert_eq!(ctors[0].params, vec!["x".to_string(), "xs".to_string()]);
        assert!(ctors[1].params.is_empty());
    }

    #[test]
    fn test_parse_data_requires_uppercase_type() {
        assert!(parse_src("data list = Cons x").is_err());
    }

    #[test]
    fn test_parse_rec_defn() {
        let Phrase::Define(Defn::Rec(name, body)) =
            parse_src("rec loop = fn x -> loop x").unwrap()
        else {
            panic!("expected rec definition");
        };
        assert_eq!(name, "loop");
        assert!(matches!(body.as_ref(), Expr::Lambda(_, _)));
    }

    #[test]
    fn test_parse_negation_binds_tighter_than_mul() {
        let e = parse_expr_src("-2 * 3");
        let Expr::BinPrim(BinOp::Times, left, _) = e.as_ref() else {
            panic!("expected multiplication");
        };
        assert!(matches!(left.as_ref(), Expr::MonPrim(MonOp::Neg, _)));
    }

    #[test]
    fn test_parse_throw_takes_application() {
        let e = parse_expr_src("throw Err 3");
        let Expr::Throw(inner) = e.as_ref() else {
            panic!("expected throw");
        };
        assert!(matches!(inner.as_ref(), Expr::Apply(_, _)));
    }

    #[test]
    fn test_parse_error_reports_position() {
        let err = parse_src("1 +").unwrap_err();
        let ParseError::Unexpected { line, col, .. } = err else {
            panic!("expected unexpected-token error");
        };
        assert_eq!(line, 1);
        assert_eq!(col, 4);
    }
}
