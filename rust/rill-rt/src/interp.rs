//! Top-level driver: the initial environment and `obey`.

use crate::chan::ChanTable;
use crate::control::{push_prompt, run_cc, Prompt};
use crate::env::Env;
use crate::error::RtError;
use crate::eval::{elab, eval};
use crate::values::Value;
use rill_compiler::Phrase;

/// The environment every session starts from: boolean and unit names plus
/// the built-in exception injections.
pub fn initial_env() -> Env {
    Env::from_pairs(&[
        ("true", Value::Bool(true)),
        ("false", Value::Bool(false)),
        ("unit", Value::Unit),
        ("ExcClosed", Value::injection("ExcClosed", Vec::new())),
        ("ExcInvalid", Value::injection("ExcInvalid", Vec::new())),
        ("ExcMatch", Value::injection("ExcMatch", Vec::new())),
    ])
}

/// Everything a session threads between phrases.
#[derive(Debug, Clone)]
pub struct ProgState {
    pub env: Env,
    pub chans: ChanTable,
}

impl ProgState {
    pub fn new() -> Self {
        Self {
            env: initial_env(),
            chans: ChanTable::new(),
        }
    }
}

impl Default for ProgState {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute one phrase against the session state.
///
/// The input state is left untouched; the caller only adopts the returned
/// state on success, so a fatal error discards the phrase's effects.
pub fn obey(phrase: &Phrase, state: &ProgState) -> Result<(String, ProgState), RtError> {
    match phrase {
        Phrase::Calculate(expr) => {
            let mut chans = state.chans.clone();
            // the exception prompt catches uncaught throws; the task prompt
            // lets channel operations outside any `Parallel` resolve locally
            // (a closed channel answers immediately; parking has no peer)
            let comp = push_prompt(
                Prompt::Exc,
                push_prompt(Prompt::Task, eval(expr, &state.env)),
            );
            let value = run_cc(&comp, &mut chans)?;
            match value {
                Value::Halted(id) | Value::Waiting(id) => Err(RtError::BlockedAtTopLevel(id)),
                value => {
                    let shown = value.show()?;
                    Ok((
                        shown,
                        ProgState {
                            env: state.env.clone(),
                            chans,
                        },
                    ))
                }
            }
        }
        Phrase::Define(defn) => {
            let mut chans = state.chans.clone();
            let env = run_cc(&elab(defn, &state.env), &mut chans)?;
            Ok((format!("Added definition: {}", defn.name()), ProgState { env, chans }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_env_bindings() {
        let env = initial_env();
        assert!(matches!(env.find("true"), Ok(Value::Bool(true))));
        assert!(matches!(env.find("false"), Ok(Value::Bool(false))));
        assert!(matches!(env.find("unit"), Ok(Value::Unit)));
        for name in ["ExcClosed", "ExcInvalid", "ExcMatch"] {
            let Ok(Value::Injection(inj)) = env.find(name) else {
                panic!("{name} should be a nullary injection");
            };
            assert_eq!(inj.tag, name);
            assert!(inj.args.is_empty());
        }
    }
}
