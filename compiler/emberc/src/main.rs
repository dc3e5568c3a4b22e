//! The driver: build a module, evaluate it, emit it.
//!
//! This wires the whole stack together over a small demonstration
//! program, the IR equivalent of:
//!
//! ```c
//! int add(int a, int b) {
//!     return a + b;
//! }
//! ```
//!
//! which is evaluated with `(42, 24)` and then handed to the codegen
//! boundary.
//
// EMBERC_FILTER=debug cargo run

use emberc_interp::{Interp, RtValue};
use emberc_ir::error::Error;
use emberc_ir::ir::{BuildConfig, Function, Module};
use emberc_ir::syntax::{Abi, FuncRef, Instr, Opcode, Value, VarRef, Variable};
use tracing::{debug, error, info};

fn main() {
    init_emberc_logger();
    debug!("logging initialized");

    if let Err(err) = drive() {
        error!("emberc failed: {}", err);
        std::process::exit(1);
    }
}

fn drive() -> Result<(), Error> {
    let config = BuildConfig::default();
    config.target.log_summary();

    let mut module = Module::new("demo", config.clone());
    emberc_frontend::c::register_types(&mut module)?;

    let (add, i32_ref) = build_add(&mut module)?;
    debug!("built module:\n{}", emberc_ir::printer::module_to_string(&module));

    // Evaluate add(42, 24) before emitting anything; the evaluator doubles
    // as a smoke test of the module we just built.
    let mut interp = Interp::new(&module);
    interp.set_trace(true);
    let result = interp.execute_function(
        add,
        &[RtValue::int(i32_ref, 42), RtValue::int(i32_ref, 24)],
    )?;
    let stats = interp.stats();
    info!(
        "add(42, 24) = {} ({} instructions, {} calls, max depth {})",
        result, stats.instructions, stats.function_calls, stats.max_call_stack_depth
    );

    emberc_codegen::entry::emit_module(&config, &module)?;
    info!("wrote {}", config.filename.display());
    Ok(())
}

/// `int add(int a, int b) { return a + b; }`
fn build_add(module: &mut Module) -> Result<(FuncRef, emberc_ir::syntax::TypeRef), Error> {
    let Some((i32_ref, _)) = emberc_frontend::c::type_by_name(module, "C@int") else {
        return Err(Error::InvalidType("C@int is not registered".to_string()));
    };

    let name = module.intern("add")?;
    let mut func = Function::new(name, Abi::Cdecl);

    let a = module.intern("a")?;
    let b = module.intern("b")?;
    let result = module.intern("result")?;
    func.params.push(Variable::new(a, i32_ref));
    func.params.push(Variable::new(b, i32_ref));
    func.rets.push(Variable::new(result, i32_ref));

    func.body.push_instr(Instr::new(
        Opcode::Add,
        vec![
            Value::Var(VarRef::from_usize(0)),
            Value::Var(VarRef::from_usize(1)),
        ],
    ));
    func.body.push_instr(Instr::new(Opcode::Ret, vec![]));

    let func_ref = module.add_function(func)?;
    Ok((func_ref, i32_ref))
}

/// Initialize the logger for the emberc driver.
fn init_emberc_logger() {
    if let Err(err) = emberc_log::Logger::init_logger(emberc_log::LoggerConfig::from_env("EMBERC"))
    {
        eprintln!("Error initializing logger: {:?}", err);
        std::process::exit(1);
    }
}
