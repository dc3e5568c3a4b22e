//! The evaluator itself.

use crate::frame::{Frame, MAX_CALL_DEPTH};
use crate::rtval::{sign_extend, RtKind, RtValue};
use emberc_ir::error::Error;
use emberc_ir::ir::{Function, Module};
use emberc_ir::syntax::{ExprInstr, ExprOpcode, FuncRef, Instr, Opcode, TypeRef, Value};
use emberc_utils::idx::Idx;
use std::collections::HashSet;
use tracing::{debug, instrument, trace};

/// Size of the simulated heap, reserved for the load/store layer.
const DEFAULT_HEAP_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The evaluator's execution state.
pub enum State {
    /// Ready to execute.
    Ready,
    /// Currently executing.
    Running,
    /// Suspended at a breakpoint or step boundary.
    Suspended,
    /// Execution completed.
    Completed,
    /// An error occurred; [`Interp::reset`] is required before reuse.
    Error,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Ready => "ready",
            State::Running => "running",
            State::Suspended => "suspended",
            State::Completed => "completed",
            State::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Granularity of a single [`Interp::step`].
pub enum StepMode {
    /// Step one instruction.
    Instruction,
    /// Step one source line (requires debug info).
    Line,
    /// Step into a function call.
    Into,
    /// Step over a function call.
    Over,
    /// Step out of the current function.
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// A read-only snapshot of the evaluator's counters.
pub struct Stats {
    pub instructions: u64,
    pub function_calls: u64,
    pub allocations: u64,
    pub call_stack_depth: usize,
    pub max_call_stack_depth: usize,
}

/// Whether an executed instruction already transferred control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    /// Fall through to the next instruction.
    Next,
    /// The instruction set the pc (or changed frames) itself.
    Jump,
}

/// A binary operation shared between block-level and expression-level
/// opcodes. The evaluator's kind checks and width normalization live on
/// this one enum so both instruction shapes behave identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    fn name(&self) -> &'static str {
        match self {
            BinOp::Add => "ADD",
            BinOp::Sub => "SUB",
            BinOp::Mul => "MUL",
            BinOp::Div => "DIV",
            BinOp::Mod => "MOD",
            BinOp::And => "AND",
            BinOp::Or => "OR",
            BinOp::Xor => "XOR",
            BinOp::Shl => "SHL",
            BinOp::Shr => "SHR",
            BinOp::Eq => "EQ",
            BinOp::Ne => "NE",
            BinOp::Lt => "LT",
            BinOp::Le => "LE",
            BinOp::Gt => "GT",
            BinOp::Ge => "GE",
        }
    }

    fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

fn expr_binop(op: ExprOpcode) -> Option<BinOp> {
    match op {
        ExprOpcode::Add => Some(BinOp::Add),
        ExprOpcode::Sub => Some(BinOp::Sub),
        ExprOpcode::Mul => Some(BinOp::Mul),
        ExprOpcode::Div => Some(BinOp::Div),
        ExprOpcode::Mod => Some(BinOp::Mod),
        ExprOpcode::And => Some(BinOp::And),
        ExprOpcode::Or => Some(BinOp::Or),
        ExprOpcode::Xor => Some(BinOp::Xor),
        ExprOpcode::Shl => Some(BinOp::Shl),
        ExprOpcode::Shr => Some(BinOp::Shr),
        ExprOpcode::Eq => Some(BinOp::Eq),
        ExprOpcode::Ne => Some(BinOp::Ne),
        ExprOpcode::Lt => Some(BinOp::Lt),
        ExprOpcode::Le => Some(BinOp::Le),
        ExprOpcode::Gt => Some(BinOp::Gt),
        ExprOpcode::Ge => Some(BinOp::Ge),
        ExprOpcode::Not | ExprOpcode::Call => None,
    }
}

/// An evaluator over one module.
///
/// The module is borrowed read-only for the evaluator's lifetime; a module
/// may back any number of evaluators as long as nobody mutates it
/// concurrently. Execution is single-threaded, cooperative, and blocking:
/// [`Interp::run`] returns only on completion, suspension, or error.
pub struct Interp<'m> {
    module: &'m Module,

    // Execution state
    state: State,
    frames: Vec<Frame>,
    result: RtValue,

    // Global state
    globals: Option<Vec<RtValue>>,
    /// Simulated heap backing for the (reserved) load/store layer.
    heap: Vec<u8>,

    // Debug state
    breakpoints: HashSet<usize>,
    debug_enabled: bool,
    trace_enabled: bool,
    /// Set when resuming from a suspension so the breakpoint that caused
    /// it does not immediately re-trigger.
    skip_breakpoint_once: bool,

    // Statistics
    instructions: u64,
    function_calls: u64,
    allocations: u64,
    max_call_depth: usize,

    // Error state
    last_error: Option<Error>,
    error_message: String,
}

impl<'m> Interp<'m> {
    pub fn new(module: &'m Module) -> Self {
        debug!("interpreter context initialized");
        Interp {
            module,
            state: State::Ready,
            frames: Vec::new(),
            result: RtValue::void(),
            globals: None,
            heap: vec![0; DEFAULT_HEAP_SIZE],
            breakpoints: HashSet::new(),
            debug_enabled: false,
            trace_enabled: false,
            skip_breakpoint_once: false,
            instructions: 0,
            function_calls: 0,
            allocations: 0,
            max_call_depth: 0,
            last_error: None,
            error_message: String::new(),
        }
    }

    // ---- observers ----

    pub fn state(&self) -> State {
        self.state
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Human-readable description of the last error; empty unless the
    /// evaluator is in the error state.
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// The first return value of the most recently completed execution.
    pub fn result(&self) -> RtValue {
        self.result
    }

    pub fn stats(&self) -> Stats {
        Stats {
            instructions: self.instructions,
            function_calls: self.function_calls,
            allocations: self.allocations,
            call_stack_depth: self.frames.len(),
            max_call_stack_depth: self.max_call_depth,
        }
    }

    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// The frame at `depth` below the top; 0 is the current frame.
    pub fn frame_at(&self, depth: usize) -> Option<&Frame> {
        self.frames.len().checked_sub(1 + depth).map(|i| &self.frames[i])
    }

    pub fn heap_capacity(&self) -> usize {
        self.heap.len()
    }

    /// A one-line-per-frame rendering of the call stack, innermost first.
    /// Intended for debugger output and error reports.
    pub fn backtrace(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        for (depth, frame) in self.frames.iter().rev().enumerate() {
            let name = self
                .module
                .function(frame.func)
                .and_then(|f| self.module.name_of(f.name))
                .unwrap_or("<unknown>");
            let _ = writeln!(out, "  [{}] {} @ instruction {}", depth, name, frame.pc);
        }
        out
    }

    // ---- debug controls ----

    pub fn set_debug(&mut self, enable: bool) {
        self.debug_enabled = enable;
    }

    pub fn set_trace(&mut self, enable: bool) {
        self.trace_enabled = enable;
    }

    /// Adds a breakpoint at an instruction index. Idempotent.
    pub fn add_breakpoint(&mut self, index: usize) {
        self.breakpoints.insert(index);
    }

    /// Removes a breakpoint; reports whether it was present.
    pub fn remove_breakpoint(&mut self, index: usize) -> bool {
        self.breakpoints.remove(&index)
    }

    pub fn has_breakpoint(&self, index: usize) -> bool {
        self.breakpoints.contains(&index)
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    // ---- statistics ----

    /// Zeroes the counters without touching execution state.
    pub fn reset_stats(&mut self) {
        self.instructions = 0;
        self.function_calls = 0;
        self.allocations = 0;
        self.max_call_depth = self.frames.len();
    }

    /// Returns the evaluator to the ready state: frames, statistics,
    /// result, and error state are cleared. Debug and trace flags and the
    /// breakpoint set persist.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.globals = None;
        self.state = State::Ready;
        self.result = RtValue::void();
        self.skip_breakpoint_once = false;
        self.instructions = 0;
        self.function_calls = 0;
        self.allocations = 0;
        self.max_call_depth = 0;
        self.last_error = None;
        self.error_message.clear();
    }

    // ---- execution ----

    /// Executes `func` with `args` bound to its parameters by position.
    ///
    /// Returns the function's first return value, or `Void` when the
    /// function declares none or the run suspended at a breakpoint. The
    /// evaluator must be in the ready state; after an error, [`reset`] is
    /// required first.
    ///
    /// [`reset`]: Interp::reset
    #[instrument(skip(self, args))]
    pub fn execute_function(
        &mut self,
        func: FuncRef,
        args: &[RtValue],
    ) -> Result<RtValue, Error> {
        if self.state != State::Ready {
            return Err(Error::BadArgument(format!(
                "interpreter is {}, not ready",
                self.state.as_str()
            )));
        }

        self.ensure_globals();
        self.result = RtValue::void();
        self.push_frame(func, args.to_vec())?;
        self.state = State::Running;
        self.run()?;
        Ok(self.result)
    }

    /// Executes until completion, suspension, or error.
    pub fn run(&mut self) -> Result<(), Error> {
        if self.state != State::Running {
            return Err(Error::BadArgument(
                "interpreter is not running".to_string(),
            ));
        }

        while self.state == State::Running {
            let Some(frame) = self.frames.last() else { break };
            let (pc, func_ref) = (frame.pc, frame.func);

            if self.debug_enabled
                && !self.skip_breakpoint_once
                && self.breakpoints.contains(&pc)
            {
                let in_range = self
                    .module
                    .function(func_ref)
                    .map(|f| pc < f.body.instrs.len())
                    .unwrap_or(false);
                if in_range {
                    debug!(pc, "breakpoint hit");
                    self.state = State::Suspended;
                    break;
                }
            }
            self.skip_breakpoint_once = false;

            if let Err(err) = self.step_instr() {
                return Err(self.record_error(err));
            }
        }

        if self.frames.is_empty() && self.state == State::Running {
            self.state = State::Completed;
        }

        Ok(())
    }

    /// Suspends a running evaluator at the next opportunity.
    pub fn suspend(&mut self) -> Result<(), Error> {
        if self.state != State::Running {
            return Err(Error::BadArgument(
                "only a running interpreter can be suspended".to_string(),
            ));
        }
        self.state = State::Suspended;
        Ok(())
    }

    /// Resumes a suspended evaluator and runs until the next suspension
    /// point or completion. The breakpoint that caused the suspension does
    /// not immediately re-trigger.
    pub fn resume(&mut self) -> Result<(), Error> {
        if self.state != State::Suspended {
            return Err(Error::BadArgument(
                "only a suspended interpreter can be resumed".to_string(),
            ));
        }
        self.state = State::Running;
        self.skip_breakpoint_once = true;
        self.run()
    }

    /// Executes a single step at the given granularity and suspends.
    ///
    /// Only instruction stepping is implemented; the other modes need
    /// debug info the IR does not carry yet.
    pub fn step(&mut self, mode: StepMode) -> Result<(), Error> {
        if self.state != State::Running && self.state != State::Suspended {
            return Err(Error::BadArgument(
                "interpreter is neither running nor suspended".to_string(),
            ));
        }

        match mode {
            StepMode::Instruction => {
                self.state = State::Running;
                if let Err(err) = self.step_instr() {
                    return Err(self.record_error(err));
                }
                self.skip_breakpoint_once = true;
                if self.frames.is_empty() {
                    self.state = State::Completed;
                } else {
                    self.state = State::Suspended;
                }
                Ok(())
            }
            StepMode::Line | StepMode::Into | StepMode::Over | StepMode::Out => {
                Err(Error::Unimplemented("step modes beyond instruction"))
            }
        }
    }

    /// Evaluates a producer-side constant without running a function.
    /// Non-literal values need an activation frame and are out of reach
    /// here.
    pub fn eval_const(&mut self, value: &Value) -> Result<RtValue, Error> {
        match value {
            Value::Void => Ok(RtValue::void()),
            Value::Const { ty, bytes } => RtValue::from_const(self.module, *ty, bytes),
            _ => Err(Error::Unimplemented(
                "constant evaluation of non-literal values",
            )),
        }
    }

    // ---- frame machinery ----

    fn ensure_globals(&mut self) {
        if self.globals.is_none() {
            let globals = self
                .module
                .globals()
                .iter()
                .map(|g| RtValue::undef(g.ty))
                .collect();
            self.globals = Some(globals);
        }
    }

    fn push_frame(&mut self, func_ref: FuncRef, args: Vec<RtValue>) -> Result<(), Error> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(self.fail(
                Error::Overflow("call stack".to_string()),
                "Call stack overflow",
            ));
        }

        let func = match self.module.function(func_ref) {
            Some(func) => func,
            None => {
                return Err(self.fail(Error::InvalidFunction, "Invalid function reference"));
            }
        };

        if args.len() != func.params.len() {
            let message = format!(
                "Argument count mismatch: expected {}, got {}",
                func.params.len(),
                args.len()
            );
            return Err(self.fail(Error::BadArgument(message.clone()), message));
        }

        let mut locals = Vec::with_capacity(func.local_count());
        locals.extend(args);
        for var in &func.body.locals {
            locals.push(RtValue::undef(var.ty));
        }

        self.frames.push(Frame::new(func_ref, locals));
        self.function_calls += 1;
        self.max_call_depth = self.max_call_depth.max(self.frames.len());
        Ok(())
    }

    fn pop_frame(&mut self) -> Result<Frame, Error> {
        self.frames
            .pop()
            .ok_or_else(|| Error::BadArgument("call stack is empty".to_string()))
    }

    fn frame_mut(&mut self) -> Result<&mut Frame, Error> {
        self.frames
            .last_mut()
            .ok_or_else(|| Error::BadArgument("no active frame".to_string()))
    }

    fn push_value(&mut self, value: RtValue) -> Result<(), Error> {
        match self.frame_mut()?.push(value) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err, "Operand stack overflow")),
        }
    }

    fn pop_value(&mut self) -> Result<RtValue, Error> {
        self.frame_mut()?.pop()
    }

    /// Executes exactly one instruction of the current frame, including
    /// frame pop when the pc has fallen off the end of the body.
    fn step_instr(&mut self) -> Result<(), Error> {
        let module = self.module;
        let Some(frame) = self.frames.last() else {
            return Ok(());
        };
        let (func_ref, pc) = (frame.func, frame.pc);

        let Some(func) = module.function(func_ref) else {
            return Err(self.fail(Error::InvalidFunction, "Invalid function in frame"));
        };

        if pc >= func.body.instrs.len() {
            // Fell off the end of the block: implicit return with no
            // values. An empty block completes immediately this way.
            self.pop_frame()?;
            return Ok(());
        }

        let instr = &func.body.instrs[pc];
        if self.trace_enabled {
            trace!(
                function = func_ref.idx(),
                pc,
                opcode = instr.opcode.as_str(),
                "exec"
            );
        }

        let transfer = self.exec_instr(func, instr)?;
        self.instructions += 1;

        if transfer == Transfer::Next {
            if let Some(frame) = self.frames.last_mut() {
                frame.pc += 1;
            }
        }
        Ok(())
    }

    fn exec_instr(&mut self, func: &'m Function, instr: &'m Instr) -> Result<Transfer, Error> {
        match instr.opcode {
            Opcode::Null => Err(self.fail(
                Error::BadArgument("the null opcode is a sentinel".to_string()),
                "Executed the NULL opcode sentinel",
            )),

            Opcode::Add => self.exec_binary(BinOp::Add, &instr.operands),
            Opcode::Sub => self.exec_binary(BinOp::Sub, &instr.operands),
            Opcode::Mul => self.exec_binary(BinOp::Mul, &instr.operands),
            Opcode::Div => self.exec_binary(BinOp::Div, &instr.operands),
            Opcode::Mod => self.exec_binary(BinOp::Mod, &instr.operands),
            Opcode::And => self.exec_binary(BinOp::And, &instr.operands),
            Opcode::Or => self.exec_binary(BinOp::Or, &instr.operands),
            Opcode::Xor => self.exec_binary(BinOp::Xor, &instr.operands),
            Opcode::Shl => self.exec_binary(BinOp::Shl, &instr.operands),
            Opcode::Shr => self.exec_binary(BinOp::Shr, &instr.operands),

            // The simulated-heap layer is not wired up yet. Reporting
            // unimplemented keeps the evaluator honest; silently treating
            // these as no-ops would corrupt every program that uses them.
            Opcode::Load => {
                Err(self.fail(Error::Unimplemented("LOAD"), "LOAD is not implemented"))
            }
            Opcode::Store => {
                Err(self.fail(Error::Unimplemented("STORE"), "STORE is not implemented"))
            }
            Opcode::Alloc => {
                Err(self.fail(Error::Unimplemented("ALLOC"), "ALLOC is not implemented"))
            }
            Opcode::Dealloc => Err(self.fail(
                Error::Unimplemented("DEALLOC"),
                "DEALLOC is not implemented",
            )),

            Opcode::Jmp => self.exec_jmp(func, &instr.operands),
            Opcode::Br => self.exec_br(func, &instr.operands),
            Opcode::Call => self.exec_call(&instr.operands),
            Opcode::Ret => self.exec_ret(func, &instr.operands),
        }
    }

    fn exec_binary(&mut self, op: BinOp, operands: &[Value]) -> Result<Transfer, Error> {
        for operand in operands {
            let value = self.eval_value(operand)?;
            self.push_value(value)?;
        }
        let b = self.pop_value()?;
        let a = self.pop_value()?;
        let result = self.apply_binary(op, a, b)?;
        self.push_value(result)?;
        Ok(Transfer::Next)
    }

    fn exec_jmp(&mut self, func: &Function, operands: &[Value]) -> Result<Transfer, Error> {
        let [target] = operands else {
            return Err(self.fail(
                Error::BadArgument("JMP takes one operand".to_string()),
                "JMP expects exactly one target",
            ));
        };
        let target = self.eval_target(func, target)?;
        self.frame_mut()?.pc = target;
        Ok(Transfer::Jump)
    }

    fn exec_br(&mut self, func: &Function, operands: &[Value]) -> Result<Transfer, Error> {
        let [condition, then_target, else_target] = operands else {
            return Err(self.fail(
                Error::BadArgument("BR takes three operands".to_string()),
                "BR expects (condition, then, else)",
            ));
        };

        let condition = self.eval_value(condition)?;
        let taken = match condition.kind {
            RtKind::Int(v) => v != 0,
            RtKind::Uint(v) => v != 0,
            _ => {
                return Err(self.fail(
                    Error::InvalidType(format!("{} condition", condition.kind_str())),
                    "Branch condition must be an integer",
                ))
            }
        };

        let target = if taken { then_target } else { else_target };
        let target = self.eval_target(func, target)?;
        self.frame_mut()?.pc = target;
        Ok(Transfer::Jump)
    }

    fn exec_call(&mut self, operands: &[Value]) -> Result<Transfer, Error> {
        let Some((callee, arg_values)) = operands.split_first() else {
            return Err(self.fail(
                Error::BadArgument("CALL takes a callee".to_string()),
                "CALL expects a function reference",
            ));
        };
        let Value::Func(func_ref) = callee else {
            return Err(self.fail(
                Error::BadArgument(format!("CALL target is a {}", callee.kind_str())),
                "CALL target must be a function reference",
            ));
        };

        let mut args = Vec::with_capacity(arg_values.len());
        for value in arg_values {
            args.push(self.eval_value(value)?);
        }

        // Resume after the call site once the callee returns.
        self.frame_mut()?.pc += 1;
        self.push_frame(*func_ref, args)?;
        Ok(Transfer::Jump)
    }

    fn exec_ret(&mut self, func: &Function, operands: &[Value]) -> Result<Transfer, Error> {
        for operand in operands {
            let value = self.eval_value(operand)?;
            self.push_value(value)?;
        }

        let ret_count = func.rets.len();
        let mut rets = Vec::with_capacity(ret_count);
        for _ in 0..ret_count {
            rets.push(self.pop_value()?);
        }
        rets.reverse();

        self.pop_frame()?;

        if let Some(caller) = self.frames.last_mut() {
            for value in rets {
                if let Err(err) = caller.push(value) {
                    return Err(self.fail(err, "Operand stack overflow"));
                }
            }
        } else {
            self.result = rets.into_iter().next().unwrap_or_else(RtValue::void);
        }
        Ok(Transfer::Jump)
    }

    fn eval_target(&mut self, func: &Function, value: &Value) -> Result<usize, Error> {
        let target = self.eval_value(value)?;
        let index = match target.kind {
            RtKind::Int(v) if v >= 0 => v as u64,
            RtKind::Uint(v) => v,
            _ => {
                return Err(self.fail(
                    Error::InvalidType(format!("{} jump target", target.kind_str())),
                    "Jump target must be a non-negative instruction index",
                ))
            }
        };

        // A target equal to the instruction count is a jump straight off
        // the end of the block, i.e. an implicit return.
        if index > func.body.instrs.len() as u64 {
            return Err(self.fail(
                Error::BadArgument(format!("jump target {} out of range", index)),
                "Jump target out of range",
            ));
        }
        Ok(index as usize)
    }

    // ---- value evaluation ----

    fn eval_value(&mut self, value: &Value) -> Result<RtValue, Error> {
        match value {
            Value::Void => Ok(RtValue::void()),

            Value::Const { ty, bytes } => RtValue::from_const(self.module, *ty, bytes),

            Value::Var(var) => {
                let frame = self
                    .frames
                    .last()
                    .ok_or_else(|| Error::BadArgument("no active frame".to_string()))?;
                frame.locals.get(var.idx()).copied().ok_or_else(|| {
                    Error::BadArgument("variable reference out of bounds".to_string())
                })
            }

            Value::Global(global) => {
                self.ensure_globals();
                self.globals
                    .as_ref()
                    .and_then(|globals| globals.get(global.idx()))
                    .copied()
                    .ok_or_else(|| {
                        Error::BadArgument("global reference out of bounds".to_string())
                    })
            }

            Value::Func(_) => Err(Error::BadArgument(
                "a function reference is only an operand of CALL".to_string(),
            )),

            Value::Expr(expr) => self.eval_expr(expr),

            Value::Block(_) => Err(Error::Unimplemented("block-valued operands")),
        }
    }

    /// Evaluates an expression tree depth-first, using the current frame's
    /// operand stack for intermediates exactly as the reverse-polish form
    /// of the IR reads.
    fn eval_expr(&mut self, expr: &ExprInstr) -> Result<RtValue, Error> {
        match expr.opcode {
            ExprOpcode::Call => {
                let Some((callee, arg_values)) = expr.operands.split_first() else {
                    return Err(self.fail(
                        Error::BadArgument("call expression takes a callee".to_string()),
                        "CALL expects a function reference",
                    ));
                };
                let Value::Func(func_ref) = callee else {
                    return Err(self.fail(
                        Error::BadArgument(format!("CALL target is a {}", callee.kind_str())),
                        "CALL target must be a function reference",
                    ));
                };
                let mut args = Vec::with_capacity(arg_values.len());
                for value in arg_values {
                    args.push(self.eval_value(value)?);
                }
                self.eval_call(*func_ref, args)
            }

            ExprOpcode::Not => {
                for operand in &expr.operands {
                    let value = self.eval_value(operand)?;
                    self.push_value(value)?;
                }
                let a = self.pop_value()?;
                match a.kind {
                    RtKind::Int(v) => Ok(RtValue::int(a.ty, self.norm_int(a.ty, !v))),
                    RtKind::Uint(v) => Ok(RtValue::uint(a.ty, self.norm_uint(a.ty, !v))),
                    _ => Err(self.fail(
                        Error::InvalidType(format!("{} operand", a.kind_str())),
                        "Type mismatch in NOT operation",
                    )),
                }
            }

            _ => {
                let Some(op) = expr_binop(expr.opcode) else {
                    return Err(Error::BadArgument(
                        "unhandled expression opcode".to_string(),
                    ));
                };
                for operand in &expr.operands {
                    let value = self.eval_value(operand)?;
                    self.push_value(value)?;
                }
                let b = self.pop_value()?;
                let a = self.pop_value()?;
                self.apply_binary(op, a, b)
            }
        }
    }

    /// Runs a call synchronously to completion for expression position:
    /// pushes the frame and steps until the callee (and everything it
    /// called) has returned. Breakpoints are not checked inside; an
    /// expression is one suspension-free statement.
    fn eval_call(&mut self, func_ref: FuncRef, args: Vec<RtValue>) -> Result<RtValue, Error> {
        let ret_count = match self.module.function(func_ref) {
            Some(func) => func.rets.len(),
            None => {
                return Err(self.fail(Error::InvalidFunction, "Invalid function reference"));
            }
        };

        let depth = self.frames.len();
        self.push_frame(func_ref, args)?;
        while self.frames.len() > depth {
            self.step_instr()?;
        }

        if ret_count == 0 {
            Ok(RtValue::void())
        } else {
            // The callee's RET pushed its values onto our operand stack;
            // the first return value is the expression's result.
            let mut rets = Vec::with_capacity(ret_count);
            for _ in 0..ret_count {
                rets.push(self.pop_value()?);
            }
            Ok(rets.pop().unwrap_or_else(RtValue::void))
        }
    }

    // ---- binary semantics ----

    fn apply_binary(&mut self, op: BinOp, a: RtValue, b: RtValue) -> Result<RtValue, Error> {
        match (a.kind, b.kind) {
            (RtKind::Int(x), RtKind::Int(y)) => self.int_binary(op, a.ty, x, y),
            (RtKind::Uint(x), RtKind::Uint(y)) => self.uint_binary(op, a.ty, x, y),
            (RtKind::Float(x), RtKind::Float(y)) => self.float_binary(op, a.ty, x, y),
            _ => Err(self.fail(
                Error::InvalidType(format!(
                    "{} and {} operands",
                    a.kind_str(),
                    b.kind_str()
                )),
                format!("Type mismatch in {} operation", op.name()),
            )),
        }
    }

    fn int_binary(&mut self, op: BinOp, ty: TypeRef, x: i64, y: i64) -> Result<RtValue, Error> {
        let value = match op {
            BinOp::Add => x.wrapping_add(y),
            BinOp::Sub => x.wrapping_sub(y),
            BinOp::Mul => x.wrapping_mul(y),
            BinOp::Div => {
                if y == 0 {
                    return Err(self.fail(Error::DivideByZero, "Division by zero"));
                }
                x.wrapping_div(y)
            }
            BinOp::Mod => {
                if y == 0 {
                    return Err(self.fail(Error::DivideByZero, "Division by zero"));
                }
                x.wrapping_rem(y)
            }
            BinOp::And => x & y,
            BinOp::Or => x | y,
            BinOp::Xor => x ^ y,
            BinOp::Shl => x.wrapping_shl(y as u32 & 63),
            BinOp::Shr => x.wrapping_shr(y as u32 & 63),
            BinOp::Eq => return Ok(RtValue::int(ty, (x == y) as i64)),
            BinOp::Ne => return Ok(RtValue::int(ty, (x != y) as i64)),
            BinOp::Lt => return Ok(RtValue::int(ty, (x < y) as i64)),
            BinOp::Le => return Ok(RtValue::int(ty, (x <= y) as i64)),
            BinOp::Gt => return Ok(RtValue::int(ty, (x > y) as i64)),
            BinOp::Ge => return Ok(RtValue::int(ty, (x >= y) as i64)),
        };
        Ok(RtValue::int(ty, self.norm_int(ty, value)))
    }

    fn uint_binary(&mut self, op: BinOp, ty: TypeRef, x: u64, y: u64) -> Result<RtValue, Error> {
        let value = match op {
            BinOp::Add => x.wrapping_add(y),
            BinOp::Sub => x.wrapping_sub(y),
            BinOp::Mul => x.wrapping_mul(y),
            BinOp::Div => {
                if y == 0 {
                    return Err(self.fail(Error::DivideByZero, "Division by zero"));
                }
                x / y
            }
            BinOp::Mod => {
                if y == 0 {
                    return Err(self.fail(Error::DivideByZero, "Division by zero"));
                }
                x % y
            }
            BinOp::And => x & y,
            BinOp::Or => x | y,
            BinOp::Xor => x ^ y,
            BinOp::Shl => x.wrapping_shl(y as u32 & 63),
            BinOp::Shr => x.wrapping_shr(y as u32 & 63),
            BinOp::Eq => return Ok(RtValue::uint(ty, (x == y) as u64)),
            BinOp::Ne => return Ok(RtValue::uint(ty, (x != y) as u64)),
            BinOp::Lt => return Ok(RtValue::uint(ty, (x < y) as u64)),
            BinOp::Le => return Ok(RtValue::uint(ty, (x <= y) as u64)),
            BinOp::Gt => return Ok(RtValue::uint(ty, (x > y) as u64)),
            BinOp::Ge => return Ok(RtValue::uint(ty, (x >= y) as u64)),
        };
        Ok(RtValue::uint(ty, self.norm_uint(ty, value)))
    }

    fn float_binary(&mut self, op: BinOp, ty: TypeRef, x: f64, y: f64) -> Result<RtValue, Error> {
        if op.is_comparison() {
            let value = match op {
                BinOp::Eq => x == y,
                BinOp::Ne => x != y,
                BinOp::Lt => x < y,
                BinOp::Le => x <= y,
                BinOp::Gt => x > y,
                BinOp::Ge => x >= y,
                _ => false,
            };
            return Ok(RtValue::int(ty, value as i64));
        }

        let value = match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div => {
                if y == 0.0 {
                    return Err(self.fail(Error::DivideByZero, "Division by zero"));
                }
                x / y
            }
            BinOp::Mod => {
                if y == 0.0 {
                    return Err(self.fail(Error::DivideByZero, "Division by zero"));
                }
                x % y
            }
            _ => {
                return Err(self.fail(
                    Error::InvalidType("bitwise operation on float operands".to_string()),
                    format!("Type mismatch in {} operation", op.name()),
                ))
            }
        };
        Ok(RtValue::float(ty, value))
    }

    /// All integer math is done in 64 bits; results are truncated and
    /// sign-extended back to the destination type's declared width when
    /// one is known.
    fn norm_int(&self, ty: TypeRef, value: i64) -> i64 {
        match self.module.ty(ty).and_then(|t| t.int_bits()) {
            Some(bits) if bits < 64 => sign_extend(value as u64 & width_mask(bits), bits),
            _ => value,
        }
    }

    fn norm_uint(&self, ty: TypeRef, value: u64) -> u64 {
        match self.module.ty(ty).and_then(|t| t.int_bits()) {
            Some(bits) if bits < 64 => value & width_mask(bits),
            _ => value,
        }
    }

    // ---- error bookkeeping ----

    /// Transitions to the error state with a user-visible message and hands
    /// the error back for propagation.
    fn fail(&mut self, err: Error, message: impl Into<String>) -> Error {
        self.state = State::Error;
        self.last_error = Some(err.clone());
        self.error_message = message.into();
        debug!(error = %self.error_message, "evaluation failed");
        err
    }

    /// Catch-all for errors raised without going through [`fail`]: makes
    /// sure the state machine and message buffer reflect them.
    ///
    /// [`fail`]: Interp::fail
    fn record_error(&mut self, err: Error) -> Error {
        if self.state != State::Error {
            self.state = State::Error;
            if self.error_message.is_empty() {
                self.error_message = err.to_string();
            }
        }
        if self.last_error.is_none() {
            self.last_error = Some(err.clone());
        }
        err
    }
}

fn width_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
