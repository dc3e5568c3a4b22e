//! Textual rendering of a module.
//!
//! The text form is reverse-polish: operands precede their operator, so
//! `return a + b` prints as `%a %b add` followed by `ret/1`. Functions are
//! introduced with `#name`, locals with `%name`, globals with `$name`.
//! The output is for humans reading dumps and test failures; nothing
//! parses it back.

use crate::ir::{Function, Global, Module};
use crate::syntax::{Block, ExprInstr, Instr, Value};
use crate::ty::TyKind;
use emberc_utils::idx::Idx;
use std::fmt::{self, Write};

/// Renders the whole module: types, globals, then functions.
pub fn write_module(out: &mut impl Write, module: &Module) -> fmt::Result {
    let name = module.name_of(module.name).unwrap_or("<anonymous>");
    writeln!(out, "; module {}", name)?;

    for ty in module.types().iter() {
        if let Some(name) = module.name_of(ty.name) {
            writeln!(
                out,
                "; type {} = {} (size {}, align {})",
                name,
                ty.kind.as_str(),
                ty.size().bytes(),
                ty.align().bytes()
            )?;
        }
    }

    for global in module.globals().iter() {
        write_global(out, module, global)?;
    }
    for function in module.functions().iter() {
        write_function(out, module, function)?;
    }
    Ok(())
}

fn write_global(out: &mut impl Write, module: &Module, global: &Global) -> fmt::Result {
    let name = module.name_of(global.name).unwrap_or("<unnamed>");
    write!(out, "${} ", name)?;
    write_value(out, module, None, &global.value)?;
    writeln!(out, " =")
}

/// Renders one function as `#name { ... }`.
pub fn write_function(out: &mut impl Write, module: &Module, function: &Function) -> fmt::Result {
    let name = module.name_of(function.name).unwrap_or("<unnamed>");
    write!(out, "#{} (", name)?;
    for (i, param) in function.params.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "%{}", module.name_of(param.name).unwrap_or("_"))?;
    }
    writeln!(out, ") {{")?;
    write_block(out, module, function, &function.body, 1)?;
    writeln!(out, "}}")
}

fn write_block(
    out: &mut impl Write,
    module: &Module,
    function: &Function,
    block: &Block,
    indent: usize,
) -> fmt::Result {
    for instr in &block.instrs {
        write!(out, "{:indent$}", "", indent = indent * 2)?;
        write_instr(out, module, function, instr)?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_instr(
    out: &mut impl Write,
    module: &Module,
    function: &Function,
    instr: &Instr,
) -> fmt::Result {
    for operand in &instr.operands {
        write_value(out, module, Some(function), operand)?;
        write!(out, " ")?;
    }
    match instr.opcode {
        crate::syntax::Opcode::Ret => write!(out, "ret/{}", function.rets.len()),
        opcode => write!(out, "{}", opcode.as_str()),
    }
}

fn write_expr(
    out: &mut impl Write,
    module: &Module,
    function: Option<&Function>,
    expr: &ExprInstr,
) -> fmt::Result {
    write!(out, "(")?;
    for operand in &expr.operands {
        write_value(out, module, function, operand)?;
        write!(out, " ")?;
    }
    write!(out, "{})", expr.opcode.as_str())
}

fn write_value(
    out: &mut impl Write,
    module: &Module,
    function: Option<&Function>,
    value: &Value,
) -> fmt::Result {
    match value {
        Value::Void => write!(out, "void"),

        Value::Const { ty, bytes } => write_const(out, module, *ty, bytes),

        Value::Var(var) => match function.and_then(|f| f.local(*var)) {
            Some(local) => write!(out, "%{}", module.name_of(local.name).unwrap_or("_")),
            None => write!(out, "%{}", var.idx()),
        },

        Value::Global(global) => {
            let name = module
                .global(*global)
                .and_then(|g| module.name_of(g.name))
                .unwrap_or("<unnamed>");
            write!(out, "${}", name)
        }

        Value::Func(func) => {
            let name = module
                .function(*func)
                .and_then(|f| module.name_of(f.name))
                .unwrap_or("<unnamed>");
            write!(out, "#{}", name)
        }

        Value::Expr(expr) => write_expr(out, module, function, expr),

        Value::Block(block) => {
            // Nested blocks are rare; render them inline and flat.
            write!(out, "{{ {} instrs }}", block.instrs.len())
        }
    }
}

/// Renders a constant as `<type>(<literal>)`, e.g. `i32(5)` or `f64(1.5)`.
fn write_const(out: &mut impl Write, module: &Module, ty: crate::syntax::TypeRef, bytes: &[u8]) -> fmt::Result {
    let Some(resolved) = module.ty(ty) else {
        return write!(out, "const(?)");
    };

    let mut raw = [0u8; 8];
    let n = bytes.len().min(8);
    raw[..n].copy_from_slice(&bytes[..n]);
    let word = u64::from_le_bytes(raw);

    match &resolved.kind {
        TyKind::Int { bits } => {
            let shift = 64 - (n as u32 * 8).min(64);
            let value = ((word << shift) as i64) >> shift;
            write!(out, "i{}({})", bits, value)
        }
        TyKind::Uint { bits } => write!(out, "u{}({})", bits, word),
        TyKind::Float { .. } if bytes.len() == 4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(bytes);
            write!(out, "f32({})", f32::from_le_bytes(buf))
        }
        TyKind::Float { .. } if bytes.len() == 8 => {
            write!(out, "f64({})", f64::from_le_bytes(raw))
        }
        kind => write!(out, "{}({} bytes)", kind.as_str(), bytes.len()),
    }
}

/// Convenience wrapper over [`write_module`].
pub fn module_to_string(module: &Module) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_module(&mut out, module);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BuildConfig, Global, Module};
    use crate::syntax::{Abi, Instr, Opcode, Value, Variable};

    fn demo_module() -> Module {
        let mut module = Module::new("demo", BuildConfig::default());
        let i32_ref = module
            .type_builder()
            .named("i32")
            .int(32)
            .build()
            .unwrap();

        let g = module.intern("counter").unwrap();
        let init = module.const_int(i32_ref, 7).unwrap();
        module
            .add_global(Global::new(g, i32_ref).with_value(init))
            .unwrap();

        let name = module.intern("add").unwrap();
        let mut func = Function::new(name, Abi::Cdecl);
        let a = module.intern("a").unwrap();
        let b = module.intern("b").unwrap();
        let out = module.intern("out").unwrap();
        func.params.push(Variable::new(a, i32_ref));
        func.params.push(Variable::new(b, i32_ref));
        func.rets.push(Variable::new(out, i32_ref));
        func.body.push_instr(Instr::new(
            Opcode::Add,
            vec![
                Value::Var(crate::syntax::VarRef::from_usize(0)),
                Value::Var(crate::syntax::VarRef::from_usize(1)),
            ],
        ));
        func.body.push_instr(Instr::new(Opcode::Ret, vec![]));
        module.add_function(func).unwrap();
        module
    }

    #[test]
    fn renders_functions_in_reverse_polish_form() {
        let module = demo_module();
        let text = module_to_string(&module);

        assert!(text.contains("; module demo"));
        assert!(text.contains("; type i32 = int (size 4, align 4)"));
        assert!(text.contains("$counter i32(7) ="));
        assert!(text.contains("#add (%a, %b) {"));
        assert!(text.contains("  %a %b add"));
        assert!(text.contains("  ret/1"));
    }

    #[test]
    fn constants_render_by_kind() {
        let mut module = Module::new("consts", BuildConfig::default());
        let i8_ref = module.type_builder().named("i8").int(8).build().unwrap();
        let f64_ref = module
            .type_builder()
            .named("f64")
            .float(52, 11)
            .build()
            .unwrap();

        let name = module.intern("k").unwrap();
        let mut func = Function::new(name, Abi::Cdecl);
        func.body.push_instr(Instr::new(
            Opcode::Add,
            vec![
                module.const_int(i8_ref, -1).unwrap(),
                module.const_int(i8_ref, 2).unwrap(),
            ],
        ));
        func.body.push_instr(Instr::new(
            Opcode::Mul,
            vec![module.const_float(f64_ref, 1.5).unwrap()],
        ));
        module.add_function(func).unwrap();

        let text = module_to_string(&module);
        assert!(text.contains("i8(-1) i8(2) add"));
        assert!(text.contains("f64(1.5) mul"));
    }

    #[test]
    fn unnamed_variables_fall_back_to_indices() {
        let mut module = Module::new("anon", BuildConfig::default());
        let i32_ref = module.type_builder().int(32).build().unwrap();

        let name = module.intern("f").unwrap();
        let mut func = Function::new(name, Abi::Cdecl);
        func.params
            .push(Variable::new(crate::interner::NO_NAME, i32_ref));
        func.body.push_instr(Instr::new(
            Opcode::Add,
            vec![
                Value::Var(crate::syntax::VarRef::from_usize(0)),
                Value::Var(crate::syntax::VarRef::from_usize(0)),
            ],
        ));
        module.add_function(func).unwrap();

        let text = module_to_string(&module);
        assert!(text.contains("%_ %_ add"));
    }
}
