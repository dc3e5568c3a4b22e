use crate::traits::EmitBackend;
use emberc_abi::target::{Arch, Endian, ObjectFormat, Os};
use emberc_ir::error::Error;
use emberc_ir::ir::{BuildConfig, Function, Global, GlobalAttrs, Module};
use emberc_ir::syntax::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Checks that the configuration describes something the backend can emit.
fn validate_config(config: &BuildConfig) -> Result<(), Error> {
    let target = &config.target;
    if target.arch != Arch::Amd64 {
        return Err(Error::InvalidArchitecture);
    }
    if target.format != ObjectFormat::Binary {
        return Err(Error::InvalidFormat);
    }
    if target.os != Os::None || target.endian != Endian::Little {
        return Err(Error::InvalidArchitecture);
    }
    if config.shared_library && config.static_library {
        return Err(Error::BadArgument(
            "a build cannot be both a shared and a static library".to_string(),
        ));
    }
    Ok(())
}

/// Drives a backend over a fully built module: predefine every symbol,
/// then define globals and functions in arena order, then write the image
/// to `config.filename`. The module is never mutated.
#[instrument(skip_all, fields(module = ?module.name))]
pub fn emit_module_with<B: EmitBackend>(
    backend: &mut B,
    config: &BuildConfig,
    module: &Module,
) -> Result<(), Error> {
    validate_config(config)?;

    // Const globals must have been given a value by now; a constant with
    // no initializer has no bytes to emit.
    for global in module.globals() {
        if global.attrs.contains(GlobalAttrs::CONST) && global.value == Value::Void {
            let name = module.name_of(global.name).unwrap_or("<unnamed>");
            return Err(Error::BadArgument(format!(
                "const global '{}' has no initializer",
                name
            )));
        }
    }

    // Predefine the symbols. That is, declare everything before any body
    // is emitted, so definitions can reference items in any order.
    for global in module.globals() {
        backend.predefine_global(module, global)?;
    }
    for function in module.functions() {
        backend.predefine_function(module, function)?;
    }

    // Now that all symbols are pre-defined, emit the definitions.
    for global in module.globals() {
        backend.define_global(module, global)?;
    }
    for function in module.functions() {
        backend.define_function(module, function)?;
    }

    backend.finish(&config.filename)?;
    info!(path = %config.filename.display(), "module emitted");
    Ok(())
}

/// Emits `module` with the built-in [`RawBinary`] backend.
pub fn emit_module(config: &BuildConfig, module: &Module) -> Result<(), Error> {
    let mut backend = RawBinary::new();
    emit_module_with(&mut backend, config, module)
}

/// The flat-binary backend.
///
/// Symbol bookkeeping is real (duplicate definitions are rejected); the
/// image itself is still empty, since instruction selection has not been
/// brought up. Writing an empty file keeps the driver pipeline and the
/// error surface exercisable end to end.
pub struct RawBinary {
    symbols: HashSet<String>,
    image: Vec<u8>,
}

impl RawBinary {
    pub fn new() -> Self {
        RawBinary {
            symbols: HashSet::new(),
            image: Vec::new(),
        }
    }

    fn declare(&mut self, module: &Module, name: emberc_ir::interner::NameRef) -> Result<(), Error> {
        let Some(name) = module.name_of(name) else {
            // Anonymous items do not take part in symbol resolution.
            return Ok(());
        };
        if !self.symbols.insert(name.to_string()) {
            return Err(Error::DuplicateSymbol(name.to_string()));
        }
        debug!(symbol = name, "declared");
        Ok(())
    }
}

impl Default for RawBinary {
    fn default() -> Self {
        RawBinary::new()
    }
}

impl EmitBackend for RawBinary {
    fn predefine_global(&mut self, module: &Module, global: &Global) -> Result<(), Error> {
        self.declare(module, global.name)
    }

    fn predefine_function(&mut self, module: &Module, function: &Function) -> Result<(), Error> {
        self.declare(module, function.name)
    }

    fn define_global(&mut self, module: &Module, global: &Global) -> Result<(), Error> {
        debug!(
            name = module.name_of(global.name).unwrap_or("<unnamed>"),
            "define global"
        );
        Ok(())
    }

    fn define_function(&mut self, module: &Module, function: &Function) -> Result<(), Error> {
        debug!(
            name = module.name_of(function.name).unwrap_or("<unnamed>"),
            abi = function.abi.as_str(),
            instrs = function.body.instrs.len(),
            "define function"
        );
        Ok(())
    }

    fn finish(&mut self, path: &Path) -> Result<(), Error> {
        fs::write(path, &self.image)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberc_abi::target::Target;
    use emberc_ir::ir::{Function, Global};
    use emberc_ir::syntax::Abi;
    use emberc_ir::ty::TyKind;

    fn module_with_output(dir: &Path) -> (BuildConfig, Module) {
        let config = BuildConfig {
            filename: dir.join("out.bin"),
            ..BuildConfig::default()
        };
        let module = Module::new("emit-tests", config.clone());
        (config, module)
    }

    #[test]
    fn emits_an_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mut module) = module_with_output(dir.path());

        let i32_ref = module.add_type(None, TyKind::Int { bits: 32 }).unwrap();
        let g = module.intern("counter").unwrap();
        module.add_global(Global::new(g, i32_ref)).unwrap();
        let f = module.intern("main").unwrap();
        module.add_function(Function::new(f, Abi::Cdecl)).unwrap();

        emit_module(&config, &module).unwrap();
        assert!(config.filename.exists());
    }

    #[test]
    fn unsupported_architectures_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut config, module) = module_with_output(dir.path());
        config.target = Target::new(
            emberc_abi::target::Arch::Arm64,
            Os::None,
            ObjectFormat::Binary,
            Endian::Little,
        );
        assert_eq!(
            emit_module(&config, &module),
            Err(Error::InvalidArchitecture)
        );
    }

    #[test]
    fn unsupported_formats_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut config, module) = module_with_output(dir.path());
        config.target.format = ObjectFormat::Elf64;
        assert_eq!(emit_module(&config, &module), Err(Error::InvalidFormat));
    }

    #[test]
    fn const_globals_need_an_initializer() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mut module) = module_with_output(dir.path());

        let i32_ref = module.add_type(None, TyKind::Int { bits: 32 }).unwrap();
        let name = module.intern("limit").unwrap();
        module
            .add_global(Global::new(name, i32_ref).with_attrs(GlobalAttrs::CONST))
            .unwrap();

        assert!(matches!(
            emit_module(&config, &module),
            Err(Error::BadArgument(_))
        ));
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mut module) = module_with_output(dir.path());

        let i32_ref = module.add_type(None, TyKind::Int { bits: 32 }).unwrap();
        let first = module.intern("twice").unwrap();
        module.add_global(Global::new(first, i32_ref)).unwrap();
        let second = module.intern("twice").unwrap();
        module.add_global(Global::new(second, i32_ref)).unwrap();

        assert_eq!(
            emit_module(&config, &module),
            Err(Error::DuplicateSymbol("twice".to_string()))
        );
    }
}
