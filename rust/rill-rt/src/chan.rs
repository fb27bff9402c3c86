//! Rendezvous channel table.
//!
//! Each channel is a little state machine: at most one parked party per
//! direction, plus a transient `Ready` slot holding the continuation of a
//! peer whose rendezvous just completed. The scheduler drains `Ready` slots
//! in FIFO order over channel events.

use crate::control::{Comp, Kont};
use crate::error::RtError;
use crate::values::Value;
use log::trace;
use std::collections::BTreeMap;
use std::fmt;

/// Dense channel index; allocation is monotonic and ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChanId(usize);

impl ChanId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ChanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-channel state.
///
/// A channel is never simultaneously in `SendWait` and `RecvWait`, and a
/// `Ready` successor is never itself `Ready`.
#[derive(Debug, Clone)]
pub enum ChanState {
    Empty,
    /// A sender is parked with its payload and resume continuation
    SendWait(Value, Kont),
    /// A receiver is parked with its resume continuation
    RecvWait(Kont),
    /// A rendezvous completed: the woken peer's continuation, plus whatever
    /// remains parked on the channel once the scheduler drains it
    Ready(Comp<Value>, Box<ChanState>),
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct ChanTable {
    states: BTreeMap<ChanId, ChanState>,
    next_id: usize,
}

impl ChanTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id; no state is inserted until `update`.
    pub fn fresh(&mut self) -> ChanId {
        let id = ChanId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Total number of ids ever allocated.
    pub fn allocated(&self) -> usize {
        self.next_id
    }

    pub fn contents(&self, id: ChanId) -> Result<&ChanState, RtError> {
        self.states.get(&id).ok_or(RtError::UnknownChannel(id))
    }

    pub fn update(&mut self, id: ChanId, state: ChanState) {
        self.states.insert(id, state);
    }

    fn take(&mut self, id: ChanId) -> Result<ChanState, RtError> {
        self.states.remove(&id).ok_or(RtError::UnknownChannel(id))
    }

    /// Attempt a send. Returns `Halted` when the sender parked, or `Resume`
    /// with the sender's locally-runnable continuation when the rendezvous
    /// completed immediately (or the channel is closed).
    pub fn rendezvous_send(
        &mut self,
        id: ChanId,
        payload: Value,
        sender: Kont,
    ) -> Result<Value, RtError> {
        match self.take(id)? {
            ChanState::Empty => {
                trace!("channel[{}]: sender parked", id);
                self.update(id, ChanState::SendWait(payload, sender));
                Ok(Value::Halted(id))
            }
            ChanState::RecvWait(receiver) => {
                trace!("channel[{}]: sender met parked receiver", id);
                self.update(
                    id,
                    ChanState::Ready(receiver.resume(payload), Box::new(ChanState::Empty)),
                );
                Ok(Value::Resume(sender.resume(Value::Unit)))
            }
            ChanState::Ready(ready, successor) => match *successor {
                ChanState::Empty => {
                    trace!("channel[{}]: sender parked behind ready slot", id);
                    self.update(
                        id,
                        ChanState::Ready(ready, Box::new(ChanState::SendWait(payload, sender))),
                    );
                    Ok(Value::Halted(id))
                }
                ChanState::Closed => {
                    self.update(id, ChanState::Ready(ready, Box::new(ChanState::Closed)));
                    Ok(Value::Resume(sender.resume(Value::closed_exception())))
                }
                occupied => {
                    self.update(id, ChanState::Ready(ready, Box::new(occupied)));
                    Err(RtError::ContendedChannel(id))
                }
            },
            occupied @ ChanState::SendWait(_, _) => {
                self.update(id, occupied);
                Err(RtError::ContendedChannel(id))
            }
            ChanState::Closed => {
                self.update(id, ChanState::Closed);
                Ok(Value::Resume(sender.resume(Value::closed_exception())))
            }
        }
    }

    /// Attempt a receive; the mirror image of `rendezvous_send`.
    pub fn rendezvous_receive(&mut self, id: ChanId, receiver: Kont) -> Result<Value, RtError> {
        match self.take(id)? {
            ChanState::Empty => {
                trace!("channel[{}]: receiver parked", id);
                self.update(id, ChanState::RecvWait(receiver));
                Ok(Value::Halted(id))
            }
            ChanState::SendWait(payload, sender) => {
                trace!("channel[{}]: receiver met parked sender", id);
                self.update(
                    id,
                    ChanState::Ready(sender.resume(Value::Unit), Box::new(ChanState::Empty)),
                );
                Ok(Value::Resume(receiver.resume(payload)))
            }
            ChanState::Ready(ready, successor) => match *successor {
                ChanState::Empty => {
                    trace!("channel[{}]: receiver parked behind ready slot", id);
                    self.update(
                        id,
                        ChanState::Ready(ready, Box::new(ChanState::RecvWait(receiver))),
                    );
                    Ok(Value::Halted(id))
                }
                ChanState::Closed => {
                    self.update(id, ChanState::Ready(ready, Box::new(ChanState::Closed)));
                    Ok(Value::Resume(receiver.resume(Value::closed_exception())))
                }
                occupied => {
                    self.update(id, ChanState::Ready(ready, Box::new(occupied)));
                    Err(RtError::ContendedChannel(id))
                }
            },
            occupied @ ChanState::RecvWait(_) => {
                self.update(id, occupied);
                Err(RtError::ContendedChannel(id))
            }
            ChanState::Closed => {
                self.update(id, ChanState::Closed);
                Ok(Value::Resume(receiver.resume(Value::closed_exception())))
            }
        }
    }

    /// Close a channel. A parked party is woken with `ExcClosed`; a pending
    /// `Ready` slot is drained before the seal takes effect.
    pub fn close(&mut self, id: ChanId) -> Result<(), RtError> {
        match self.take(id)? {
            ChanState::Empty => {
                trace!("channel[{}]: closed", id);
                self.update(id, ChanState::Closed);
                Ok(())
            }
            ChanState::SendWait(_, sender) => {
                trace!("channel[{}]: closed; waking parked sender", id);
                self.update(
                    id,
                    ChanState::Ready(
                        sender.resume(Value::closed_exception()),
                        Box::new(ChanState::Closed),
                    ),
                );
                Ok(())
            }
            ChanState::RecvWait(receiver) => {
                trace!("channel[{}]: closed; waking parked receiver", id);
                self.update(
                    id,
                    ChanState::Ready(
                        receiver.resume(Value::closed_exception()),
                        Box::new(ChanState::Closed),
                    ),
                );
                Ok(())
            }
            ChanState::Ready(ready, successor) => match *successor {
                ChanState::Empty => {
                    self.update(id, ChanState::Ready(ready, Box::new(ChanState::Closed)));
                    Ok(())
                }
                ChanState::Closed => {
                    self.update(id, ChanState::Ready(ready, Box::new(ChanState::Closed)));
                    Err(RtError::AlreadyClosed(id))
                }
                occupied => {
                    self.update(id, ChanState::Ready(ready, Box::new(occupied)));
                    Err(RtError::ContendedChannel(id))
                }
            },
            ChanState::Closed => {
                self.update(id, ChanState::Closed);
                Err(RtError::AlreadyClosed(id))
            }
        }
    }

    /// Pop the ready continuation, restoring the successor state. Used by
    /// the scheduler when stepping a parked task's marker.
    pub fn drain_ready(&mut self, id: ChanId) -> Result<Option<Comp<Value>>, RtError> {
        match self.take(id)? {
            ChanState::Ready(ready, successor) => {
                self.update(id, *successor);
                Ok(Some(ready))
            }
            other => {
                self.update(id, other);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{run_cc, Prompt};
    use std::rc::Rc;

    fn identity_kont() -> Kont {
        Kont::new(Prompt::Task, Rc::new(|v| Comp::pure(v)))
    }

    fn run_comp(comp: Comp<Value>, chans: &mut ChanTable) -> Value {
        run_cc(&comp, chans).unwrap()
    }

    #[test]
    fn test_fresh_is_monotonic_and_never_reused() {
        let mut chans = ChanTable::new();
        let a = chans.fresh();
        let b = chans.fresh();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        chans.update(a, ChanState::Closed);
        assert_eq!(chans.fresh().index(), 2);
        assert_eq!(chans.allocated(), 3);
    }

    #[test]
    fn test_contents_of_unallocated_state_is_error() {
        let mut chans = ChanTable::new();
        let id = chans.fresh();
        // fresh does not insert a state
        assert_eq!(chans.contents(id).unwrap_err(), RtError::UnknownChannel(id));
    }

    #[test]
    fn test_send_on_empty_parks() {
        let mut chans = ChanTable::new();
        let id = chans.fresh();
        chans.update(id, ChanState::Empty);
        let outcome = chans
            .rendezvous_send(id, Value::Int(1), identity_kont())
            .unwrap();
        assert!(matches!(outcome, Value::Halted(i) if i == id));
        assert!(matches!(chans.contents(id).unwrap(), ChanState::SendWait(_, _)));
    }

    #[test]
    fn test_receive_meets_parked_sender() {
        let mut chans = ChanTable::new();
        let id = chans.fresh();
        chans.update(id, ChanState::Empty);
        chans
            .rendezvous_send(id, Value::Int(7), identity_kont())
            .unwrap();
        let outcome = chans.rendezvous_receive(id, identity_kont()).unwrap();
        let Value::Resume(local) = outcome else {
            panic!("expected a local resumption");
        };
        // receiver resumes with the payload
        assert!(matches!(run_comp(local, &mut chans), Value::Int(7)));
        // the sender's continuation waits in the ready slot, then Empty
        let Some(ready) = chans.drain_ready(id).unwrap() else {
            panic!("expected a ready continuation");
        };
        assert!(matches!(run_comp(ready, &mut chans), Value::Unit));
        assert!(matches!(chans.contents(id).unwrap(), ChanState::Empty));
    }

    #[test]
    fn test_second_sender_while_parked_is_contended() {
        let mut chans = ChanTable::new();
        let id = chans.fresh();
        chans.update(id, ChanState::Empty);
        chans
            .rendezvous_send(id, Value::Int(1), identity_kont())
            .unwrap();
        let err = chans
            .rendezvous_send(id, Value::Int(2), identity_kont())
            .unwrap_err();
        assert_eq!(err, RtError::ContendedChannel(id));
    }

    #[test]
    fn test_close_empty_then_send_yields_closed_exception() {
        let mut chans = ChanTable::new();
        let id = chans.fresh();
        chans.update(id, ChanState::Empty);
        chans.close(id).unwrap();
        let outcome = chans
            .rendezvous_send(id, Value::Int(1), identity_kont())
            .unwrap();
        let Value::Resume(local) = outcome else {
            panic!("expected a local resumption");
        };
        let v = run_comp(local, &mut chans);
        assert_eq!(v.show().unwrap(), "<unhandled exception -> ExcClosed>");
    }

    #[test]
    fn test_close_wakes_parked_receiver_then_seals() {
        let mut chans = ChanTable::new();
        let id = chans.fresh();
        chans.update(id, ChanState::Empty);
        chans.rendezvous_receive(id, identity_kont()).unwrap();
        chans.close(id).unwrap();
        let ready = chans.drain_ready(id).unwrap().expect("receiver is ready");
        let v = run_comp(ready, &mut chans);
        assert_eq!(v.show().unwrap(), "<unhandled exception -> ExcClosed>");
        assert!(matches!(chans.contents(id).unwrap(), ChanState::Closed));
    }

    #[test]
    fn test_double_close_is_error() {
        let mut chans = ChanTable::new();
        let id = chans.fresh();
        chans.update(id, ChanState::Empty);
        chans.close(id).unwrap();
        assert_eq!(chans.close(id).unwrap_err(), RtError::AlreadyClosed(id));
    }

    #[test]
    fn test_ready_successor_is_never_ready() {
        // sender parks behind a ready slot: the successor stays flat
        let mut chans = ChanTable::new();
        let id = chans.fresh();
        chans.update(id, ChanState::Empty);
        chans.rendezvous_receive(id, identity_kont()).unwrap();
        chans
            .rendezvous_send(id, Value::Int(1), identity_kont())
            .unwrap();
        let outcome = chans
            .rendezvous_send(id, Value::Int(2), identity_kont())
            .unwrap();
        assert!(matches!(outcome, Value::Halted(_)));
        let ChanState::Ready(_, successor) = chans.contents(id).unwrap() else {
            panic!("expected a ready slot");
        };
        assert!(matches!(**successor, ChanState::SendWait(_, _)));
    }
}
