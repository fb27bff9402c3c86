//! Lexically scoped environments.
//!
//! An environment is a persistent chain of frames: `define` prepends a frame
//! and leaves the original environment untouched, so closures capture by
//! structure. Each frame's slot sits behind a `RefCell` solely so that
//! `define_recursive` can patch the binding after building a closure that
//! captures its own frame.

use crate::error::RtError;
use crate::values::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Default)]
pub struct Env(Option<Rc<Frame>>);

struct Frame {
    name: String,
    slot: RefCell<Value>,
    parent: Env,
}

impl Env {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an environment from name/value pairs; later pairs shadow earlier.
    pub fn from_pairs(pairs: &[(&str, Value)]) -> Self {
        let mut env = Env::empty();
        for (name, value) in pairs {
            env = env.define(name, value.clone());
        }
        env
    }

    pub fn maybe_find(&self, name: &str) -> Option<Value> {
        let mut cursor = &self.0;
        while let Some(frame) = cursor {
            if frame.name == name {
                return Some(frame.slot.borrow().clone());
            }
            cursor = &frame.parent.0;
        }
        None
    }

    /// Look a name up; an absent name is a program error, not an exception.
    pub fn find(&self, name: &str) -> Result<Value, RtError> {
        self.maybe_find(name)
            .ok_or_else(|| RtError::UnboundVariable(name.to_string()))
    }

    /// Bind `name`, shadowing any previous binding.
    pub fn define(&self, name: &str, value: Value) -> Env {
        Env(Some(Rc::new(Frame {
            name: name.to_string(),
            slot: RefCell::new(value),
            parent: self.clone(),
        })))
    }

    /// Bind `name` to the value produced by `make`, which receives the
    /// extended environment itself, giving `rec` its self-reference.
    pub fn define_recursive(&self, name: &str, make: impl FnOnce(&Env) -> Value) -> Env {
        let frame = Rc::new(Frame {
            name: name.to_string(),
            slot: RefCell::new(Value::Unit),
            parent: self.clone(),
        });
        let env = Env(Some(Rc::clone(&frame)));
        let value = make(&env);
        *frame.slot.borrow_mut() = value;
        env
    }

    /// Bound names, innermost first, shadowed duplicates removed.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut cursor = &self.0;
        while let Some(frame) = cursor {
            if !names.iter().any(|n| n == &frame.name) {
                names.push(frame.name.clone());
            }
            cursor = &frame.parent.0;
        }
        names
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // recursive frames make a structural dump cycle, so print names only
        write!(f, "Env{:?}", self.names())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_and_shadowing() {
        let env = Env::empty()
            .define("x", Value::Int(1))
            .define("x", Value::Int(2));
        assert!(matches!(env.find("x"), Ok(Value::Int(2))));
    }

    #[test]
    fn test_define_leaves_original_untouched() {
        let outer = Env::empty().define("x", Value::Int(1));
        let inner = outer.define("x", Value::Int(2));
        assert!(matches!(outer.find("x"), Ok(Value::Int(1))));
        assert!(matches!(inner.find("x"), Ok(Value::Int(2))));
    }

    #[test]
    fn test_find_absent_is_error() {
        let err = Env::empty().find("nope").unwrap_err();
        assert_eq!(err, RtError::UnboundVariable("nope".into()));
        assert!(Env::empty().maybe_find("nope").is_none());
    }

    #[test]
    fn test_names_innermost_first_deduped() {
        let env = Env::empty()
            .define("a", Value::Int(1))
            .define("b", Value::Int(2))
            .define("a", Value::Int(3));
        assert_eq!(env.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_define_recursive_sees_itself() {
        use rill_compiler::Expr;
        use std::rc::Rc;

        let env = Env::empty().define_recursive("self", |inner| {
            Value::closure("x".into(), inner.clone(), Rc::new(Expr::Variable("self".into())))
        });
        let Ok(Value::Closure(closure)) = env.find("self") else {
            panic!("expected a closure");
        };
        // the captured environment resolves the recursive name to the closure
        assert!(matches!(closure.env.find("self"), Ok(Value::Closure(_))));
    }
}
