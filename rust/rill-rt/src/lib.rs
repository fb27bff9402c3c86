//! Rill runtime — the evaluation core of the language.
//!
//! Combines the value domain, lexically scoped environments, the rendezvous
//! channel table, a two-prompt delimited-continuation substrate, the big-step
//! evaluator, and the cooperative round-robin scheduler, behind the `obey`
//! driver used by the REPL.

pub mod chan;
pub mod control;
pub mod env;
pub mod error;
pub mod eval;
pub mod interp;
pub mod sched;
pub mod values;

pub use env::Env;
pub use error::RtError;
pub use interp::{initial_env, obey, ProgState};
pub use values::Value;
