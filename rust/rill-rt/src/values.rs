//! Runtime values.
//!
//! The first group of variants is expressible by user code; `Resume`,
//! `Halted`, and `Waiting` are scheduler-internal markers that must never
//! reach the top-level display.

use crate::chan::ChanId;
use crate::control::Comp;
use crate::env::Env;
use crate::error::RtError;
use rill_compiler::Expr;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    // NOTE: `PartialEq` below is a host-level equality impl used only by
    // `assert_eq!` in tests; it is unrelated to the language-level `==`
    // operator, which is implemented fallibly by `Value::try_equal`.
    Unit,
    Int(i64),
    Bool(bool),
    Chan(ChanId),
    Closure(Rc<ClosureValue>),
    Injection(Rc<InjectionValue>),
    Tuple(Rc<Vec<Value>>),
    /// An injection that propagated through a throw
    Exception(Rc<Value>),

    // Internal markers, never user-visible.
    /// A locally resumable continuation produced by a channel transition
    Resume(Comp<Value>),
    /// "I just blocked on this channel"
    Halted(ChanId),
    /// "I am parked on this channel; check its ready slot before running me"
    Waiting(ChanId),
}

pub struct ClosureValue {
    pub param: String,
    pub env: Env,
    pub body: Rc<Expr>,
}

impl fmt::Debug for ClosureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the captured environment may contain the closure itself
        write!(f, "<closure {}>", self.param)
    }
}

#[derive(Debug)]
pub struct InjectionValue {
    pub tag: String,
    pub args: Vec<Value>,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Chan(a), Value::Chan(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Injection(a), Value::Injection(b)) => a.tag == b.tag && a.args == b.args,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => a == b,
            (Value::Halted(a), Value::Halted(b)) => a == b,
            (Value::Waiting(a), Value::Waiting(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    pub fn closure(param: String, env: Env, body: Rc<Expr>) -> Value {
        Value::Closure(Rc::new(ClosureValue { param, env, body }))
    }

    pub fn injection(tag: &str, args: Vec<Value>) -> Value {
        Value::Injection(Rc::new(InjectionValue {
            tag: tag.to_string(),
            args,
        }))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::new(items))
    }

    pub fn exception(inner: Value) -> Value {
        Value::Exception(Rc::new(inner))
    }

    /// The exception delivered to parties of a closed channel.
    pub fn closed_exception() -> Value {
        Value::exception(Value::injection("ExcClosed", Vec::new()))
    }

    pub fn is_internal_marker(&self) -> bool {
        matches!(
            self,
            Value::Resume(_) | Value::Halted(_) | Value::Waiting(_)
        )
    }

    /// Render for the REPL. Internal markers are an invariant violation.
    pub fn show(&self) -> Result<String, RtError> {
        match self {
            Value::Unit => Ok("unit".to_string()),
            Value::Int(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Chan(id) => Ok(format!("<handle {}>", id)),
            Value::Closure(_) => Ok("<fundef>".to_string()),
            Value::Exception(inner) => {
                Ok(format!("<unhandled exception -> {}>", inner.show()?))
            }
            Value::Tuple(items) => {
                let shown: Result<Vec<String>, RtError> =
                    items.iter().map(Value::show).collect();
                Ok(format!("({})", shown?.join(",")))
            }
            Value::Injection(inj) => {
                if inj.args.is_empty() {
                    return Ok(inj.tag.clone());
                }
                let mut out = inj.tag.clone();
                for arg in &inj.args {
                    out.push(' ');
                    out.push_str(&arg.show_arg()?);
                }
                Ok(out)
            }
            Value::Resume(_) | Value::Halted(_) | Value::Waiting(_) => Err(
                RtError::InvariantViolation("internal marker reached the display".to_string()),
            ),
        }
    }

    /// Like `show`, but parenthesises non-nullary injections so nested
    /// constructor applications stay readable.
    fn show_arg(&self) -> Result<String, RtError> {
        match self {
            Value::Injection(inj) if !inj.args.is_empty() => Ok(format!("({})", self.show()?)),
            _ => self.show(),
        }
    }

    /// `==` semantics: defined for integers, booleans, unit, and exceptions
    /// (by wrapped injection); anything else is a runtime error.
    pub fn try_equal(&self, other: &Value) -> Result<bool, RtError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Unit, Value::Unit) => Ok(true),
            (Value::Exception(a), Value::Exception(b)) => a.structural_eq(b),
            _ => Err(RtError::Incomparable),
        }
    }

    fn structural_eq(&self, other: &Value) -> Result<bool, RtError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Unit, Value::Unit) => Ok(true),
            (Value::Injection(a), Value::Injection(b)) => {
                if a.tag != b.tag || a.args.len() != b.args.len() {
                    return Ok(false);
                }
                for (x, y) in a.args.iter().zip(b.args.iter()) {
                    if !x.structural_eq(y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Err(RtError::Incomparable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chan::ChanTable;

    #[test]
    fn test_show_ground_values() {
        assert_eq!(Value::Int(-3).show().unwrap(), "-3");
        assert_eq!(Value::Bool(true).show().unwrap(), "true");
        assert_eq!(Value::Unit.show().unwrap(), "unit");
    }

    #[test]
    fn test_show_channel_handle() {
        let mut chans = ChanTable::new();
        let id = chans.fresh();
        assert_eq!(Value::Chan(id).show().unwrap(), "<handle 0>");
    }

    #[test]
    fn test_show_tuple_no_spaces() {
        let v = Value::tuple(vec![Value::Unit, Value::Int(42)]);
        assert_eq!(v.show().unwrap(), "(unit,42)");
    }

    #[test]
    fn test_show_injections() {
        assert_eq!(Value::injection("Nil", vec![]).show().unwrap(), "Nil");
        let nested = Value::injection(
            "Cons",
            vec![
                Value::Int(1),
                Value::injection(
                    "Cons",
                    vec![Value::Int(2), Value::injection("Nil", vec![])],
                ),
            ],
        );
        assert_eq!(nested.show().unwrap(), "Cons 1 (Cons 2 Nil)");
    }

    #[test]
    fn test_show_exception() {
        let v = Value::closed_exception();
        assert_eq!(v.show().unwrap(), "<unhandled exception -> ExcClosed>");
    }

    #[test]
    fn test_show_marker_is_invariant_violation() {
        let mut chans = ChanTable::new();
        let id = chans.fresh();
        assert!(matches!(
            Value::Halted(id).show(),
            Err(RtError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_equality_ground() {
        assert_eq!(Value::Int(1).try_equal(&Value::Int(1)), Ok(true));
        assert_eq!(Value::Int(1).try_equal(&Value::Int(2)), Ok(false));
        assert_eq!(Value::Unit.try_equal(&Value::Unit), Ok(true));
        assert_eq!(Value::Bool(true).try_equal(&Value::Bool(false)), Ok(false));
    }

    #[test]
    fn test_equality_exceptions_by_inner_value() {
        let a = Value::closed_exception();
        let b = Value::closed_exception();
        let c = Value::exception(Value::injection("ExcInvalid", vec![]));
        assert_eq!(a.try_equal(&b), Ok(true));
        assert_eq!(a.try_equal(&c), Ok(false));
    }

    #[test]
    fn test_equality_mixed_shapes_is_error() {
        assert_eq!(
            Value::Int(1).try_equal(&Value::Bool(true)),
            Err(RtError::Incomparable)
        );
        let f = Value::closure("x".into(), Env::empty(), Rc::new(Expr::Number(1)));
        assert_eq!(f.try_equal(&f), Err(RtError::Incomparable));
    }
}
