//! Two-prompt delimited-control substrate.
//!
//! A `Comp<T>` is a suspended computation over the channel table. Running it
//! yields a `Step`: a final value, a fatal error, or a *bubble*, a capture
//! travelling outward to its prompt that accumulates the continuation
//! between the capture point and the prompt as it passes through each `then`.
//!
//! Captured continuations are shared `Fn` closures and therefore multi-shot:
//! the scheduler re-enters parked continuations, and a handler may resume a
//! capture any number of times. Resuming reinstalls the prompt, so a resumed
//! computation can capture again.

use crate::chan::ChanTable;
use crate::error::RtError;
use crate::values::Value;
use std::fmt;
use std::rc::Rc;

/// The two control delimiters: `Task` suspends at channel operations,
/// `Exc` delimits exception propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Task,
    Exc,
}

/// Outcome of one run of a computation.
pub enum Step<T> {
    Done(T),
    Bubble(Bubble<T>),
    Fail(RtError),
}

/// A capture in flight toward its prompt.
pub struct Bubble<T> {
    pub prompt: Prompt,
    /// The body handed to `capture`; run at the matching prompt.
    pub handler: Rc<dyn Fn(Kont) -> Comp<Value>>,
    /// Everything between the capture point and here, reified.
    pub resume: Rc<dyn Fn(Value) -> Comp<T>>,
}

impl<T: 'static> Bubble<T> {
    /// Post-compose the accumulated continuation with `f`; this is how a
    /// bubble passes outward through a `then`.
    fn map_resume<U: 'static>(self, f: Rc<dyn Fn(T) -> Comp<U>>) -> Bubble<U> {
        let Bubble {
            prompt,
            handler,
            resume,
        } = self;
        Bubble {
            prompt,
            handler,
            resume: Rc::new(move |v| {
                let f = Rc::clone(&f);
                resume(v).then(move |t| f(t))
            }),
        }
    }
}

/// A suspended computation over the channel table.
pub struct Comp<T>(Rc<dyn Fn(&mut ChanTable) -> Step<T>>);

impl<T> Clone for Comp<T> {
    fn clone(&self) -> Self {
        Comp(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Comp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<computation>")
    }
}

impl<T: 'static> Comp<T> {
    pub fn new(f: impl Fn(&mut ChanTable) -> Step<T> + 'static) -> Self {
        Comp(Rc::new(f))
    }

    pub fn fail(err: RtError) -> Self {
        Comp::new(move |_| Step::Fail(err.clone()))
    }

    /// Lift a channel-table operation; it never interacts with prompts.
    pub fn state(f: impl Fn(&mut ChanTable) -> Result<T, RtError> + 'static) -> Self {
        Comp::new(move |chans| match f(chans) {
            Ok(v) => Step::Done(v),
            Err(err) => Step::Fail(err),
        })
    }

    pub fn run(&self, chans: &mut ChanTable) -> Step<T> {
        (self.0)(chans)
    }

    /// Monadic sequencing. `f` must be re-invocable: a bubble that crosses
    /// this `then` folds `f` into its captured continuation.
    pub fn then<U: 'static>(&self, f: impl Fn(T) -> Comp<U> + 'static) -> Comp<U> {
        let m = self.clone();
        let f: Rc<dyn Fn(T) -> Comp<U>> = Rc::new(f);
        Comp::new(move |chans| match m.run(chans) {
            Step::Done(v) => f(v).run(chans),
            Step::Fail(err) => Step::Fail(err),
            Step::Bubble(bubble) => Step::Bubble(bubble.map_resume(Rc::clone(&f))),
        })
    }
}

impl<T: Clone + 'static> Comp<T> {
    pub fn pure(v: T) -> Self {
        Comp::new(move |_| Step::Done(v.clone()))
    }
}

/// A captured sub-continuation. Resuming runs the slice of computation
/// between the capture point and its prompt under a fresh copy of that
/// prompt, so captures are repeatable.
#[derive(Clone)]
pub struct Kont {
    prompt: Prompt,
    resume: Rc<dyn Fn(Value) -> Comp<Value>>,
}

impl Kont {
    pub(crate) fn new(prompt: Prompt, resume: Rc<dyn Fn(Value) -> Comp<Value>>) -> Self {
        Self { prompt, resume }
    }

    pub fn resume(&self, value: Value) -> Comp<Value> {
        let resume = Rc::clone(&self.resume);
        push_prompt(self.prompt, resume(value))
    }
}

impl fmt::Debug for Kont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<continuation to {:?}>", self.prompt)
    }
}

/// Run `body` delimited by `prompt`. A matching bubble has its handler
/// applied to the captured continuation; any other bubble is re-raised with
/// this prompt folded into its continuation.
pub fn push_prompt(prompt: Prompt, body: Comp<Value>) -> Comp<Value> {
    Comp::new(move |chans| match body.run(chans) {
        Step::Done(v) => Step::Done(v),
        Step::Fail(err) => Step::Fail(err),
        Step::Bubble(bubble) => {
            if bubble.prompt == prompt {
                let kont = Kont::new(prompt, bubble.resume);
                (bubble.handler)(kont).run(chans)
            } else {
                let Bubble {
                    prompt: target,
                    handler,
                    resume,
                } = bubble;
                Step::Bubble(Bubble {
                    prompt: target,
                    handler,
                    resume: Rc::new(move |v| push_prompt(prompt, resume(v))),
                })
            }
        }
    })
}

/// Abort to the nearest enclosing `prompt`, handing `handler` the captured
/// continuation.
pub fn capture(prompt: Prompt, handler: impl Fn(Kont) -> Comp<Value> + 'static) -> Comp<Value> {
    let handler: Rc<dyn Fn(Kont) -> Comp<Value>> = Rc::new(handler);
    Comp::new(move |_chans| {
        Step::Bubble(Bubble {
            prompt,
            handler: Rc::clone(&handler),
            resume: Rc::new(|v| Comp::pure(v)),
        })
    })
}

/// Abort to `prompt` with a value, discarding the captured continuation.
pub fn throw_to(prompt: Prompt, value: Value) -> Comp<Value> {
    capture(prompt, move |_kont| Comp::pure(value.clone()))
}

/// Execute a computation with no outer prompt. A bubble escaping here means
/// a `push_prompt` is missing; that is a fatal error, not an exception.
pub fn run_cc<T: 'static>(comp: &Comp<T>, chans: &mut ChanTable) -> Result<T, RtError> {
    match comp.run(chans) {
        Step::Done(v) => Ok(v),
        Step::Fail(err) => Err(err),
        Step::Bubble(_) => Err(RtError::EscapedCapture),
    }
}
