//! Fatal runtime errors.
//!
//! These are the non-catchable tier: they indicate a malformed program and
//! abort the current phrase. Language-level exceptions are ordinary
//! `Value::Exception` values routed through the exception prompt instead.

use crate::chan::ChanId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RtError {
    #[error("unbound variable '{0}'")]
    UnboundVariable(String),
    #[error("'{op}' requires integer operands")]
    IntegerExpected { op: &'static str },
    #[error("'{op}' requires boolean operands")]
    BooleanExpected { op: &'static str },
    #[error("integer overflow")]
    ArithmeticOverflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("condition of 'if' must be a boolean")]
    NonBooleanCondition,
    #[error("attempt to apply a value that is not a function")]
    NotAFunction,
    #[error("values of these shapes cannot be compared")]
    Incomparable,
    #[error("'rec' requires a lambda on the right-hand side")]
    RecRequiresLambda,
    #[error("only injection values can be thrown")]
    ThrowRequiresInjection,
    #[error("a channel handle is required here")]
    ChannelExpected,
    #[error("channel {0} is already closed")]
    AlreadyClosed(ChanId),
    #[error("channel {0} is contended: a party is already parked in that role")]
    ContendedChannel(ChanId),
    #[error("unknown channel {0}")]
    UnknownChannel(ChanId),
    #[error("malformed pattern")]
    MalformedPattern,
    #[error("a control capture escaped every prompt")]
    EscapedCapture,
    #[error("the expression blocked on channel {0} with no peer to resume it")]
    BlockedAtTopLevel(ChanId),
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}
