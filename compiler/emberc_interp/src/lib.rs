//! Interpreted execution of the IR.
//!
//! The evaluator runs a function from a built [`emberc_ir::ir::Module`]
//! with runtime-typed arguments. It is used for compile-time constant
//! evaluation, debugging and inspection, constant folding, and testing IR
//! correctness. It is an evaluator, not a JIT: single-threaded, no
//! optimization, every instruction dispatched through one match.
//!
//! The interesting surface is [`interp::Interp`]: a call stack of
//! [`frame::Frame`]s with per-frame operand stacks, a small state machine
//! (`Ready → Running → Suspended/Completed/Error`), breakpoints, step
//! modes, and execution statistics.

pub mod frame;
pub mod interp;
pub mod rtval;

pub use frame::Frame;
pub use interp::{Interp, State, Stats, StepMode};
pub use rtval::{RtKind, RtValue};
