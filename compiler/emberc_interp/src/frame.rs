//! Activation frames.

use crate::rtval::RtValue;
use emberc_ir::error::Error;
use emberc_ir::syntax::FuncRef;

/// The call stack holds at most this many frames; pushing past it is a
/// stack-overflow error, which bounds runaway recursion.
pub const MAX_CALL_DEPTH: usize = 256;

/// Per-frame operand stack depth limit.
pub const OPERAND_STACK_LIMIT: usize = 1024;

#[derive(Debug, Clone)]
/// A single activation record: the function being executed, the program
/// counter into its body block, the flat local slots (parameters first,
/// then block locals), and the operand stack.
pub struct Frame {
    pub func: FuncRef,
    /// Index of the next instruction to execute in the body block.
    pub pc: usize,
    pub locals: Vec<RtValue>,
    stack: Vec<RtValue>,
}

impl Frame {
    pub fn new(func: FuncRef, locals: Vec<RtValue>) -> Self {
        Frame {
            func,
            pc: 0,
            locals,
            stack: Vec::new(),
        }
    }

    pub fn push(&mut self, value: RtValue) -> Result<(), Error> {
        if self.stack.len() >= OPERAND_STACK_LIMIT {
            return Err(Error::Overflow("operand stack".to_string()));
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<RtValue, Error> {
        self.stack
            .pop()
            .ok_or_else(|| Error::BadArgument("operand stack underflow".to_string()))
    }

    /// The operand stack, bottom first.
    pub fn operand_stack(&self) -> &[RtValue] {
        &self.stack
    }
}
