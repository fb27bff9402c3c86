//! Big-step evaluator.
//!
//! `eval` turns an expression and environment into a suspended computation
//! over the channel table; `elab` does the same for definitions. Channel
//! operations capture to the task prompt, throws capture to the exception
//! prompt; everything else is ordinary monadic sequencing.

use crate::chan::ChanState;
use crate::control::{capture, push_prompt, throw_to, Comp, Prompt, Step};
use crate::env::Env;
use crate::error::RtError;
use crate::sched;
use crate::values::Value;
use rill_compiler::{BinOp, Case, CtorDef, Defn, Expr, MonOp};
use std::rc::Rc;

pub fn eval(expr: &Rc<Expr>, env: &Env) -> Comp<Value> {
    match expr.as_ref() {
        Expr::Number(n) => Comp::pure(Value::Int(*n)),

        Expr::Variable(name) => {
            let name = name.clone();
            let env = env.clone();
            Comp::state(move |_| env.find(&name))
        }

        Expr::Lambda(param, body) => {
            Comp::pure(Value::closure(param.clone(), env.clone(), Rc::clone(body)))
        }

        Expr::Apply(f, arg) => {
            let arg = Rc::clone(arg);
            let env2 = env.clone();
            eval(f, env).then(move |fv| {
                eval(&arg, &env2).then(move |av| apply(fv.clone(), av))
            })
        }

        Expr::If(cond, then_branch, else_branch) => {
            let then_branch = Rc::clone(then_branch);
            let else_branch = Rc::clone(else_branch);
            let env2 = env.clone();
            eval(cond, env).then(move |cv| match cv {
                Value::Bool(true) => eval(&then_branch, &env2),
                Value::Bool(false) => eval(&else_branch, &env2),
                _ => Comp::fail(RtError::NonBooleanCondition),
            })
        }

        Expr::Pipe(first, second) => {
            let second = Rc::clone(second);
            let env2 = env.clone();
            eval(first, env).then(move |_| eval(&second, &env2))
        }

        Expr::Let(defn, body) => {
            let body = Rc::clone(body);
            elab(defn, env).then(move |inner| eval(&body, &inner))
        }

        Expr::Injector(tag, args) => {
            let tag = tag.clone();
            eval_list(args, env).then(move |values| Comp::pure(Value::injection(&tag, values)))
        }

        Expr::Match(scrutinee, cases) => {
            let cases = cases.clone();
            let env2 = env.clone();
            eval(scrutinee, env).then(move |v| match select_case(&cases, &v, &env2) {
                Ok(Some((bound, body))) => eval(&body, &bound),
                Ok(None) => throw_to(
                    Prompt::Exc,
                    Value::exception(Value::injection("ExcMatch", Vec::new())),
                ),
                Err(err) => Comp::fail(err),
            })
        }

        Expr::Send(chan, value) => eval_send(chan, value, env).then(route_exception),
        Expr::SendP(chan, value) => eval_send(chan, value, env),
        Expr::Receive(chan) => eval(chan, env).then(receive_prim).then(route_exception),
        Expr::ReceiveP(chan) => eval(chan, env).then(receive_prim),

        Expr::NewChan => Comp::state(|chans| {
            let id = chans.fresh();
            chans.update(id, ChanState::Empty);
            Ok(Value::Chan(id))
        }),

        Expr::Close(chan) => eval(chan, env).then(|cv| match cv {
            Value::Chan(id) => Comp::state(move |chans| chans.close(id).map(|()| Value::Unit)),
            _ => Comp::fail(RtError::ChannelExpected),
        }),

        Expr::Parallel(components) => {
            let tasks: Vec<Comp<Value>> = components
                .iter()
                .map(|component| push_prompt(Prompt::Task, eval(component, env)))
                .collect();
            sched::run_tasks(tasks)
        }

        Expr::TryCatch(body, cases) => {
            let cases = cases.clone();
            let env2 = env.clone();
            push_prompt(Prompt::Exc, eval(body, env)).then(move |v| match v {
                Value::Exception(inner) => match select_case(&cases, &inner, &env2) {
                    Ok(Some((bound, handler))) => eval(&handler, &bound),
                    Ok(None) => throw_to(Prompt::Exc, Value::Exception(inner)),
                    Err(err) => Comp::fail(err),
                },
                other => Comp::pure(other),
            })
        }

        Expr::Throw(e) => eval(e, env).then(|v| match v {
            Value::Injection(_) => throw_to(Prompt::Exc, Value::exception(v)),
            _ => Comp::fail(RtError::ThrowRequiresInjection),
        }),

        Expr::BinPrim(op, left, right) => {
            let op = *op;
            let right = Rc::clone(right);
            let env2 = env.clone();
            eval(left, env).then(move |a| {
                eval(&right, &env2).then(move |b| match apply_binop(op, &a, &b) {
                    Ok(v) => Comp::pure(v),
                    Err(err) => Comp::fail(err),
                })
            })
        }

        Expr::MonPrim(op, e) => {
            let op = *op;
            eval(e, env).then(move |v| match apply_monop(op, &v) {
                Ok(v) => Comp::pure(v),
                Err(err) => Comp::fail(err),
            })
        }
    }
}

/// Elaborate a definition into an extended environment.
pub fn elab(defn: &Defn, env: &Env) -> Comp<Env> {
    match defn {
        Defn::Val(name, rhs) => {
            let name = name.clone();
            let env2 = env.clone();
            eval(rhs, env).then(move |v| Comp::pure(env2.define(&name, v)))
        }
        Defn::Rec(name, rhs) => match rhs.as_ref() {
            Expr::Lambda(param, body) => {
                let extended = env.define_recursive(name, |inner| {
                    Value::closure(param.clone(), inner.clone(), Rc::clone(body))
                });
                Comp::pure(extended)
            }
            _ => Comp::fail(RtError::RecRequiresLambda),
        },
        Defn::Data(_, ctors) => {
            let mut extended = env.clone();
            for ctor in ctors {
                let value = ctor_value(ctor, &extended);
                extended = extended.define(&ctor.name, value);
            }
            Comp::pure(extended)
        }
    }
}

/// A constructor is either its nullary injection or a curried closure that
/// builds the injection once fully applied.
fn ctor_value(ctor: &CtorDef, env: &Env) -> Value {
    if ctor.params.is_empty() {
        return Value::injection(&ctor.name, Vec::new());
    }
    let fields = ctor
        .params
        .iter()
        .map(|p| Rc::new(Expr::Variable(p.clone())))
        .collect();
    let mut body = Rc::new(Expr::Injector(ctor.name.clone(), fields));
    for param in ctor.params.iter().skip(1).rev() {
        body = Rc::new(Expr::Lambda(param.clone(), body));
    }
    Value::closure(ctor.params[0].clone(), env.clone(), body)
}

fn apply(f: Value, arg: Value) -> Comp<Value> {
    match f {
        Value::Closure(closure) => {
            let bound = closure.env.define(&closure.param, arg);
            eval(&closure.body, &bound)
        }
        _ => Comp::fail(RtError::NotAFunction),
    }
}

fn eval_list(items: &[Rc<Expr>], env: &Env) -> Comp<Vec<Value>> {
    match items.split_first() {
        None => Comp::pure(Vec::new()),
        Some((first, rest)) => {
            let rest: Vec<Rc<Expr>> = rest.to_vec();
            let env2 = env.clone();
            eval(first, env).then(move |head| {
                eval_list(&rest, &env2).then(move |tail| {
                    let mut values = Vec::with_capacity(tail.len() + 1);
                    values.push(head.clone());
                    values.extend(tail);
                    Comp::pure(values)
                })
            })
        }
    }
}

// ── Channel operations ──

fn eval_send(chan: &Rc<Expr>, value: &Rc<Expr>, env: &Env) -> Comp<Value> {
    let value = Rc::clone(value);
    let env2 = env.clone();
    eval(chan, env).then(move |cv| {
        eval(&value, &env2).then(move |pv| send_prim(cv.clone(), pv))
    })
}

/// The low-level send: consult the channel under a task-prompt capture.
/// `Halted` bubbles to the scheduler; a `Resume` outcome runs in place.
fn send_prim(chan: Value, payload: Value) -> Comp<Value> {
    let Value::Chan(id) = chan else {
        return Comp::fail(RtError::ChannelExpected);
    };
    capture(Prompt::Task, move |kont| {
        let payload = payload.clone();
        Comp::new(move |chans| {
            match chans.rendezvous_send(id, payload.clone(), kont.clone()) {
                Ok(Value::Resume(local)) => local.run(chans),
                Ok(parked) => Step::Done(parked),
                Err(err) => Step::Fail(err),
            }
        })
    })
}

fn receive_prim(chan: Value) -> Comp<Value> {
    let Value::Chan(id) = chan else {
        return Comp::fail(RtError::ChannelExpected);
    };
    capture(Prompt::Task, move |kont| {
        Comp::new(move |chans| match chans.rendezvous_receive(id, kont.clone()) {
            Ok(Value::Resume(local)) => local.run(chans),
            Ok(parked) => Step::Done(parked),
            Err(err) => Step::Fail(err),
        })
    })
}

/// The `Send`/`Receive` wrappers re-throw an exception outcome (a closed
/// channel) to the nearest handler; `SendP`/`ReceiveP` hand it back raw.
fn route_exception(value: Value) -> Comp<Value> {
    match value {
        Value::Exception(_) => throw_to(Prompt::Exc, value),
        other => Comp::pure(other),
    }
}

// ── Pattern matching ──

fn select_case(
    cases: &[Case],
    value: &Value,
    env: &Env,
) -> Result<Option<(Env, Rc<Expr>)>, RtError> {
    for case in cases {
        if let Some(bound) = match_pattern(&case.pattern, value, env)? {
            return Ok(Some((bound, Rc::clone(&case.body))));
        }
    }
    Ok(None)
}

/// Patterns are a syntactic subset of expressions: variables bind, number
/// literals compare, and `Apply` spines or `Injector` nodes match
/// injections by tag and arity.
fn match_pattern(pattern: &Expr, value: &Value, env: &Env) -> Result<Option<Env>, RtError> {
    match pattern {
        Expr::Variable(name) => Ok(Some(env.define(name, value.clone()))),
        Expr::Number(n) => Ok(match value {
            Value::Int(m) if m == n => Some(env.clone()),
            _ => None,
        }),
        Expr::Injector(tag, args) => match_injection(tag, args, value, env),
        Expr::Apply(_, _) => {
            let (tag, args) = flatten_pattern(pattern)?;
            match_injection(&tag, &args, value, env)
        }
        _ => Err(RtError::MalformedPattern),
    }
}

fn match_injection(
    tag: &str,
    args: &[Rc<Expr>],
    value: &Value,
    env: &Env,
) -> Result<Option<Env>, RtError> {
    let Value::Injection(inj) = value else {
        return Ok(None);
    };
    if inj.tag != tag || inj.args.len() != args.len() {
        return Ok(None);
    }
    let mut bound = env.clone();
    for (pattern, field) in args.iter().zip(inj.args.iter()) {
        match match_pattern(pattern, field, &bound)? {
            Some(next) => bound = next,
            None => return Ok(None),
        }
    }
    Ok(Some(bound))
}

/// Flatten an application spine `((C p1) p2) …` into its head tag and
/// argument patterns.
fn flatten_pattern(pattern: &Expr) -> Result<(String, Vec<Rc<Expr>>), RtError> {
    let mut args = Vec::new();
    let mut cursor = pattern;
    loop {
        match cursor {
            Expr::Apply(head, arg) => {
                args.push(Rc::clone(arg));
                cursor = head.as_ref();
            }
            Expr::Variable(name) => {
                args.reverse();
                return Ok((name.clone(), args));
            }
            Expr::Injector(name, base) if base.is_empty() => {
                args.reverse();
                return Ok((name.clone(), args));
            }
            _ => return Err(RtError::MalformedPattern),
        }
    }
}

// ── Primitive operators ──

fn apply_binop(op: BinOp, a: &Value, b: &Value) -> Result<Value, RtError> {
    match op {
        BinOp::Plus | BinOp::Minus | BinOp::Times | BinOp::Div | BinOp::Mod => {
            let (Value::Int(x), Value::Int(y)) = (a, b) else {
                return Err(RtError::IntegerExpected { op: op.symbol() });
            };
            let result = match op {
                BinOp::Plus => x.checked_add(*y),
                BinOp::Minus => x.checked_sub(*y),
                BinOp::Times => x.checked_mul(*y),
                BinOp::Div => {
                    if *y == 0 {
                        return Err(RtError::DivisionByZero);
                    }
                    floor_div(*x, *y)
                }
                BinOp::Mod => {
                    if *y == 0 {
                        return Err(RtError::DivisionByZero);
                    }
                    floor_mod(*x, *y)
                }
                _ => unreachable!(),
            };
            result.map(Value::Int).ok_or(RtError::ArithmeticOverflow)
        }
        // both operands are always evaluated; && and || do not short-circuit
        BinOp::And | BinOp::Or => {
            let (Value::Bool(x), Value::Bool(y)) = (a, b) else {
                return Err(RtError::BooleanExpected { op: op.symbol() });
            };
            Ok(Value::Bool(if op == BinOp::And { *x && *y } else { *x || *y }))
        }
        BinOp::Equal => a.try_equal(b).map(Value::Bool),
    }
}

fn apply_monop(op: MonOp, v: &Value) -> Result<Value, RtError> {
    match op {
        MonOp::Neg => match v {
            Value::Int(n) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or(RtError::ArithmeticOverflow),
            _ => Err(RtError::IntegerExpected { op: "-" }),
        },
    }
}

/// Division rounding toward negative infinity, as the source language's
/// `div`/`mod` do.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && (a < 0) != (b < 0) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && (r < 0) != (b < 0) {
        Some(r + b)
    } else {
        Some(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_division_rounds_toward_negative_infinity() {
        assert_eq!(floor_div(7, 2), Some(3));
        assert_eq!(floor_div(-7, 2), Some(-4));
        assert_eq!(floor_div(7, -2), Some(-4));
        assert_eq!(floor_div(-7, -2), Some(3));
    }

    #[test]
    fn test_floor_mod_tracks_divisor_sign() {
        assert_eq!(floor_mod(7, 2), Some(1));
        assert_eq!(floor_mod(-7, 2), Some(1));
        assert_eq!(floor_mod(7, -2), Some(-1));
        assert_eq!(floor_mod(-7, -2), Some(-1));
    }

    #[test]
    fn test_binop_type_errors() {
        let err = apply_binop(BinOp::Plus, &Value::Bool(true), &Value::Int(1)).unwrap_err();
        assert_eq!(err, RtError::IntegerExpected { op: "+" });
        let err = apply_binop(BinOp::And, &Value::Int(1), &Value::Bool(true)).unwrap_err();
        assert_eq!(err, RtError::BooleanExpected { op: "&&" });
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        assert_eq!(
            apply_binop(BinOp::Div, &Value::Int(1), &Value::Int(0)),
            Err(RtError::DivisionByZero)
        );
        assert_eq!(
            apply_binop(BinOp::Mod, &Value::Int(1), &Value::Int(0)),
            Err(RtError::DivisionByZero)
        );
    }

    #[test]
    fn test_match_pattern_variable_binds() {
        let env = Env::empty();
        let bound = match_pattern(&Expr::Variable("x".into()), &Value::Int(5), &env)
            .unwrap()
            .expect("variables match anything");
        assert!(matches!(bound.find("x"), Ok(Value::Int(5))));
    }

    #[test]
    fn test_match_pattern_flattens_apply_spine() {
        // pattern `Pair a b` as the parser produces it
        let pattern = Expr::Apply(
            Rc::new(Expr::Apply(
                Rc::new(Expr::Variable("Pair".into())),
                Rc::new(Expr::Variable("a".into())),
            )),
            Rc::new(Expr::Variable("b".into())),
        );
        let value = Value::injection("Pair", vec![Value::Int(1), Value::Int(2)]);
        let bound = match_pattern(&pattern, &value, &Env::empty())
            .unwrap()
            .expect("tags and arity agree");
        assert!(matches!(bound.find("a"), Ok(Value::Int(1))));
        assert!(matches!(bound.find("b"), Ok(Value::Int(2))));
    }

    #[test]
    fn test_match_pattern_arity_mismatch_fails() {
        let pattern = Expr::Apply(
            Rc::new(Expr::Variable("Pair".into())),
            Rc::new(Expr::Variable("a".into())),
        );
        let value = Value::injection("Pair", vec![Value::Int(1), Value::Int(2)]);
        assert!(match_pattern(&pattern, &value, &Env::empty())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_match_pattern_rejects_malformed() {
        let pattern = Expr::Lambda("x".into(), Rc::new(Expr::Number(1)));
        assert!(matches!(
            match_pattern(&pattern, &Value::Int(1), &Env::empty()),
            Err(RtError::MalformedPattern)
        ));
    }

    #[test]
    fn test_ctor_value_nullary_and_curried() {
        let nil = ctor_value(
            &CtorDef {
                name: "Nil".into(),
                params: vec![],
            },
            &Env::empty(),
        );
        assert!(matches!(nil, Value::Injection(_)));
        let cons = ctor_value(
            &CtorDef {
                name: "Cons".into(),
                params: vec!["x".into(), "xs".into()],
            },
            &Env::empty(),
        );
        assert!(matches!(cons, Value::Closure(_)));
    }
}
