use emberc_ir::error::Error;
use emberc_ir::ir::{Function, Global, Module};
use std::path::Path;

/// The backend half of code generation.
///
/// Emission is two-phase, the way a real object writer wants it: first
/// every symbol is *predefined* (declared, so that references between items
/// can be resolved regardless of order), then every item is *defined*
/// (its body or initializer lowered). The driver calls `finish` exactly
/// once, after all definitions, to write the output image.
///
/// Backends must treat the module as read-only.
pub trait EmitBackend {
    /// Declare a global's symbol before any definitions are emitted.
    fn predefine_global(&mut self, module: &Module, global: &Global) -> Result<(), Error>;

    /// Declare a function's symbol before any definitions are emitted.
    fn predefine_function(&mut self, module: &Module, function: &Function) -> Result<(), Error>;

    /// Emit a global's storage and initializer.
    fn define_global(&mut self, module: &Module, global: &Global) -> Result<(), Error>;

    /// Emit a function's body.
    fn define_function(&mut self, module: &Module, function: &Function) -> Result<(), Error>;

    /// Write the finished image to `path`.
    fn finish(&mut self, path: &Path) -> Result<(), Error>;
}
