//! Cooperative round-robin scheduler.
//!
//! Tasks are the per-component computations of a `Parallel`, each already
//! delimited by its own task prompt. A task steps until it finishes with a
//! value or yields `Halted` (it parked on a channel, its continuation stored
//! in the channel table). Parked tasks leave a `Waiting` marker that polls
//! the channel's ready slot on each pass. Results keep their component's
//! original position, so the final tuple is in source order.

use crate::chan::ChanTable;
use crate::control::{throw_to, Comp, Prompt, Step};
use crate::error::RtError;
use crate::values::Value;
use log::{debug, trace};
use std::collections::VecDeque;

enum TaskEntry {
    /// A runnable continuation
    Run(Comp<Value>),
    /// A parked marker (`Waiting`) or a finished result cycling to the end
    Idle(Value),
}

/// Run the components of a `Parallel` to quiescence and tuple their results.
pub fn run_tasks(tasks: Vec<Comp<Value>>) -> Comp<Value> {
    Comp::new(move |chans| run_loop(&tasks, chans))
}

fn run_loop(tasks: &[Comp<Value>], chans: &mut ChanTable) -> Step<Value> {
    let mut running: VecDeque<TaskEntry> =
        tasks.iter().cloned().map(TaskEntry::Run).collect();
    let mut parked: Vec<TaskEntry> = Vec::new();
    let mut waiting = 0usize;
    let mut progressed = true;

    loop {
        let Some(entry) = running.pop_front() else {
            if waiting == 0 {
                return collect(parked);
            }
            if !progressed {
                // every parked task re-parked and nothing completed: deadlock
                debug!(
                    "scheduler: no progress with {} task(s) parked; raising ExcInvalid",
                    waiting
                );
                let deadlock = throw_to(
                    Prompt::Exc,
                    Value::exception(Value::injection("ExcInvalid", Vec::new())),
                );
                return deadlock.run(chans);
            }
            progressed = false;
            running = std::mem::take(&mut parked).into_iter().collect();
            continue;
        };

        match entry {
            TaskEntry::Run(task) => match task.run(chans) {
                Step::Done(Value::Halted(id)) => {
                    trace!("scheduler: task parked on channel[{}]", id);
                    parked.push(TaskEntry::Idle(Value::Waiting(id)));
                    waiting += 1;
                    progressed = true;
                }
                Step::Done(v) => {
                    trace!("scheduler: task finished");
                    parked.push(TaskEntry::Idle(v));
                    progressed = true;
                }
                // an uncaught exception (or stray capture) aborts the whole
                // parallel composition toward the enclosing prompt
                Step::Bubble(bubble) => return Step::Bubble(bubble),
                Step::Fail(err) => return Step::Fail(err),
            },
            TaskEntry::Idle(Value::Waiting(id)) => match chans.drain_ready(id) {
                Ok(Some(resumed)) => {
                    trace!("scheduler: waking task parked on channel[{}]", id);
                    running.push_front(TaskEntry::Run(resumed));
                    waiting -= 1;
                    progressed = true;
                }
                Ok(None) => parked.push(TaskEntry::Idle(Value::Waiting(id))),
                Err(err) => return Step::Fail(err),
            },
            idle => parked.push(idle),
        }
    }
}

fn collect(parked: Vec<TaskEntry>) -> Step<Value> {
    let mut results = Vec::with_capacity(parked.len());
    for entry in parked {
        match entry {
            TaskEntry::Idle(v) if !v.is_internal_marker() => results.push(v),
            _ => {
                return Step::Fail(RtError::InvariantViolation(
                    "scheduler quiesced with an unfinished task".to_string(),
                ))
            }
        }
    }
    Step::Done(Value::tuple(results))
}
