//! Breakpoints, stepping, suspension, and reset behaviour.

use emberc_frontend::c;
use emberc_interp::{Interp, RtKind, State, Stats, StepMode};
use emberc_ir::error::Error;
use emberc_ir::ir::{BuildConfig, Function, Module};
use emberc_ir::syntax::{Abi, FuncRef, Instr, Opcode, TypeRef, Variable};
use pretty_assertions::assert_eq;

fn c_module() -> Module {
    let mut module = Module::new("debug-tests", BuildConfig::default());
    c::register_types(&mut module).unwrap();
    module
}

fn int_ty(module: &Module) -> TypeRef {
    c::type_by_name(module, "C@int").unwrap().0
}

/// A function whose body is `count` ADD instructions over constants, with
/// no return; it completes by falling off the end of the block.
fn build_adds(module: &mut Module, count: usize) -> FuncRef {
    let i32_ref = int_ty(module);
    let name = module.intern("adds").unwrap();
    let mut func = Function::new(name, Abi::Cdecl);
    for _ in 0..count {
        func.body.push_instr(Instr::new(
            Opcode::Add,
            vec![
                module.const_int(i32_ref, 1).unwrap(),
                module.const_int(i32_ref, 2).unwrap(),
            ],
        ));
    }
    module.add_function(func).unwrap()
}

#[test]
fn breakpoints_suspend_before_the_instruction() {
    let mut module = c_module();
    let adds = build_adds(&mut module, 3);

    let mut interp = Interp::new(&module);
    interp.set_debug(true);
    interp.add_breakpoint(1);

    let result = interp.execute_function(adds, &[]).unwrap();
    // Suspended executions yield no value yet.
    assert_eq!(result.kind, RtKind::Void);
    assert_eq!(interp.state(), State::Suspended);
    assert_eq!(interp.current_frame().unwrap().pc, 1);
    assert_eq!(interp.stats().instructions, 1);

    interp.resume().unwrap();
    assert_eq!(interp.state(), State::Completed);
    assert_eq!(interp.stats().instructions, 3);
}

#[test]
fn breakpoints_require_debug_mode() {
    let mut module = c_module();
    let adds = build_adds(&mut module, 3);

    let mut interp = Interp::new(&module);
    interp.add_breakpoint(1);

    interp.execute_function(adds, &[]).unwrap();
    assert_eq!(interp.state(), State::Completed);
    assert_eq!(interp.stats().instructions, 3);
}

#[test]
fn breakpoint_add_is_idempotent_and_remove_reports_misses() {
    let module = c_module();
    let mut interp = Interp::new(&module);

    interp.add_breakpoint(4);
    interp.add_breakpoint(4);
    assert!(interp.has_breakpoint(4));

    assert!(interp.remove_breakpoint(4));
    assert!(!interp.has_breakpoint(4));
    assert!(!interp.remove_breakpoint(4));

    interp.add_breakpoint(1);
    interp.add_breakpoint(2);
    interp.clear_breakpoints();
    assert!(!interp.has_breakpoint(1));
    assert!(!interp.has_breakpoint(2));
}

#[test]
fn instruction_stepping_walks_one_instruction_at_a_time() {
    let mut module = c_module();
    let adds = build_adds(&mut module, 2);

    let mut interp = Interp::new(&module);
    interp.set_debug(true);
    interp.add_breakpoint(0);

    interp.execute_function(adds, &[]).unwrap();
    assert_eq!(interp.state(), State::Suspended);
    assert_eq!(interp.stats().instructions, 0);

    interp.step(StepMode::Instruction).unwrap();
    assert_eq!(interp.state(), State::Suspended);
    assert_eq!(interp.current_frame().unwrap().pc, 1);
    assert_eq!(interp.stats().instructions, 1);

    interp.step(StepMode::Instruction).unwrap();
    assert_eq!(interp.state(), State::Suspended);
    assert_eq!(interp.stats().instructions, 2);

    // The pc has fallen off the end; one more step pops the frame.
    interp.step(StepMode::Instruction).unwrap();
    assert_eq!(interp.state(), State::Completed);
    assert_eq!(interp.stats().instructions, 2);
}

#[test]
fn unimplemented_step_modes_do_not_disturb_the_state() {
    let mut module = c_module();
    let adds = build_adds(&mut module, 2);

    let mut interp = Interp::new(&module);
    interp.set_debug(true);
    interp.add_breakpoint(0);
    interp.execute_function(adds, &[]).unwrap();

    assert!(matches!(
        interp.step(StepMode::Over),
        Err(Error::Unimplemented(_))
    ));
    assert_eq!(interp.state(), State::Suspended);
}

#[test]
fn control_transitions_reject_wrong_states() {
    let module = c_module();
    let mut interp = Interp::new(&module);

    // Ready is neither running nor suspended.
    assert!(matches!(interp.suspend(), Err(Error::BadArgument(_))));
    assert!(matches!(interp.resume(), Err(Error::BadArgument(_))));
    assert!(matches!(
        interp.step(StepMode::Instruction),
        Err(Error::BadArgument(_))
    ));
    assert!(matches!(interp.run(), Err(Error::BadArgument(_))));
}

#[test]
fn reset_returns_to_a_fresh_context() {
    let mut module = c_module();
    let i32_ref = int_ty(&module);

    let name = module.intern("boom").unwrap();
    let mut func = Function::new(name, Abi::Cdecl);
    let out = module.intern("out").unwrap();
    func.rets.push(Variable::new(out, i32_ref));
    func.body.push_instr(Instr::new(
        Opcode::Div,
        vec![
            module.const_int(i32_ref, 1).unwrap(),
            module.const_int(i32_ref, 0).unwrap(),
        ],
    ));
    let boom = module.add_function(func).unwrap();

    let mut interp = Interp::new(&module);
    interp.set_debug(true);
    interp.set_trace(true);
    interp.add_breakpoint(7);

    interp.execute_function(boom, &[]).unwrap_err();
    assert_eq!(interp.state(), State::Error);
    assert!(interp.last_error().is_some());

    interp.reset();
    assert_eq!(interp.state(), State::Ready);
    assert_eq!(interp.call_depth(), 0);
    assert_eq!(interp.error_message(), "");
    assert!(interp.last_error().is_none());
    assert_eq!(
        interp.stats(),
        Stats {
            instructions: 0,
            function_calls: 0,
            allocations: 0,
            call_stack_depth: 0,
            max_call_stack_depth: 0,
        }
    );
    // Breakpoints persist across reset.
    assert!(interp.has_breakpoint(7));

    // And the context is usable again.
    let err = interp.execute_function(boom, &[]).unwrap_err();
    assert_eq!(err, Error::DivideByZero);
}

#[test]
fn reset_stats_zeroes_counters_without_touching_execution() {
    let mut module = c_module();
    let adds = build_adds(&mut module, 3);

    let mut interp = Interp::new(&module);
    interp.execute_function(adds, &[]).unwrap();
    assert_eq!(interp.stats().instructions, 3);

    interp.reset_stats();
    let stats = interp.stats();
    assert_eq!(stats.instructions, 0);
    assert_eq!(stats.function_calls, 0);
    assert_eq!(stats.max_call_stack_depth, 0);
    // Execution state is untouched.
    assert_eq!(interp.state(), State::Completed);
}

#[test]
fn frame_introspection_walks_the_call_stack() {
    let mut module = c_module();
    let adds = build_adds(&mut module, 3);

    let mut interp = Interp::new(&module);
    interp.set_debug(true);
    interp.add_breakpoint(2);
    interp.execute_function(adds, &[]).unwrap();

    assert_eq!(interp.call_depth(), 1);
    let frame = interp.frame_at(0).unwrap();
    assert_eq!(frame.func, adds);
    assert_eq!(frame.pc, 2);
    assert!(interp.frame_at(1).is_none());

    // The two ADD results are still parked on the operand stack.
    assert_eq!(frame.operand_stack().len(), 2);

    let backtrace = interp.backtrace();
    assert!(backtrace.contains("[0] adds @ instruction 2"));
}

#[test]
fn trace_mode_does_not_disturb_execution() {
    let mut module = c_module();
    let adds = build_adds(&mut module, 2);

    let mut interp = Interp::new(&module);
    interp.set_trace(true);
    interp.execute_function(adds, &[]).unwrap();
    assert_eq!(interp.state(), State::Completed);
    assert_eq!(interp.stats().instructions, 2);
}

#[test]
fn heap_is_reserved_but_allocated() {
    let module = c_module();
    let interp = Interp::new(&module);
    assert_eq!(interp.heap_capacity(), 64 * 1024);
}
