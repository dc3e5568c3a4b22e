use crate::error::Error;
use crate::interner::{NameRef, NameTable, NO_NAME};
use crate::syntax::{Abi, Block, FuncRef, GlobalRef, TypeRef, Value, Variable, VarRef};
use crate::ty::{LayoutCtx, Ty, TyKind};
use bitflags::bitflags;
use emberc_abi::target::Target;
use emberc_utils::idx::Idx;
use emberc_utils::index_slice::IdxSlice;
use emberc_utils::index_vec::IdxVec;
use std::path::PathBuf;
use tracing::{debug, instrument};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Attributes of a module-level global.
    pub struct GlobalAttrs: u16 {
        /// The global is declared but not defined.
        const EXTERN = 1 << 0;
        /// The global is visible outside this module.
        const PUBLIC = 1 << 1;
        /// The global will not be changed after initialization. Const
        /// globals must carry a value by emit time; the emitter checks,
        /// not the builder.
        const CONST = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Attributes of a function.
    ///
    /// Conflicting combinations (e.g. `INLINE` together with `NOINLINE`)
    /// are a producer error and are not rejected here.
    pub struct FnAttrs: u16 {
        /// The function is declared but not defined.
        const EXTERN = 1 << 0;
        /// The function is visible outside this module.
        const PUBLIC = 1 << 1;
        /// No side effects; does not modify or inspect any global state.
        const CONST = 1 << 2;
        /// No side effects, but may inspect global state.
        const PURE = 1 << 3;
        /// The function does not return to the caller.
        const NORETURN = 1 << 4;
        /// The function may be inlined.
        const INLINE = 1 << 5;
        /// The function should not be inlined.
        const NOINLINE = 1 << 6;
        /// The function should always be inlined.
        const ALWAYSINLINE = 1 << 7;
        /// The function should not be optimized.
        const NOOPTIMIZE = 1 << 8;
        /// The function can be overridden by another definition.
        const WEAK = 1 << 9;
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Named, typed, optionally-initialized module-level storage.
pub struct Global {
    pub name: NameRef,
    pub ty: TypeRef,
    /// Optional initializer; `Value::Void` when uninitialized.
    pub value: Value,
    pub attrs: GlobalAttrs,
}

impl Global {
    pub fn new(name: NameRef, ty: TypeRef) -> Self {
        Global {
            name,
            ty,
            value: Value::Void,
            attrs: GlobalAttrs::empty(),
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    pub fn with_attrs(mut self, attrs: GlobalAttrs) -> Self {
        self.attrs = attrs;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A function: a named signature plus the block that implements it.
pub struct Function {
    /// The symbol name.
    pub name: NameRef,
    /// The calling convention. [`Abi::Null`] functions take no arguments,
    /// return no values, and do not return to a caller.
    pub abi: Abi,
    pub params: Vec<Variable>,
    pub rets: Vec<Variable>,
    pub body: Block,
    pub attrs: FnAttrs,
}

impl Function {
    pub fn new(name: NameRef, abi: Abi) -> Self {
        Function {
            name,
            abi,
            params: Vec::new(),
            rets: Vec::new(),
            body: Block::new(),
            attrs: FnAttrs::empty(),
        }
    }

    /// Resolves a [`VarRef`] in this function's flat local space:
    /// parameters first, then the body block's locals.
    pub fn local(&self, var: VarRef) -> Option<&Variable> {
        let idx = var.idx();
        if idx < self.params.len() {
            self.params.get(idx)
        } else {
            self.body.locals.get(idx - self.params.len())
        }
    }

    /// The number of addressable locals (parameters plus body locals).
    pub fn local_count(&self) -> usize {
        self.params.len() + self.body.locals.len()
    }
}

#[derive(Debug, Clone)]
/// Consumer-supplied build configuration: the compilation target plus the
/// switches the codegen boundary cares about.
pub struct BuildConfig {
    pub target: Target,
    pub verbose: bool,
    pub debug: bool,
    pub position_independent: bool,
    pub shared_library: bool,
    pub static_library: bool,
    pub generate_debug_info: bool,
    pub generate_symbol_table: bool,
    /// Output path for the codegen collaborator.
    pub filename: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            target: Target::host(),
            verbose: false,
            debug: false,
            position_independent: false,
            shared_library: false,
            static_library: false,
            generate_debug_info: false,
            generate_symbol_table: false,
            filename: PathBuf::from("output.o"),
        }
    }
}

impl BuildConfig {
    /// Whether this configuration describes something the backend can emit.
    pub fn is_valid(&self) -> bool {
        if !self.target.is_supported() {
            return false;
        }

        // Can be neither, or one, but not both.
        if self.shared_library && self.static_library {
            return false;
        }

        true
    }
}

/// The root container of the IR: the name table plus the arenas of types,
/// globals, and functions.
///
/// The arenas are append-only. References never invalidate short of
/// dropping the module itself.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: NameRef,
    names: NameTable,
    types: IdxVec<TypeRef, Ty>,
    globals: IdxVec<GlobalRef, Global>,
    functions: IdxVec<FuncRef, Function>,
    config: BuildConfig,
}

/// Initial capacity for each module arena.
const INITIAL_ARENA_CAPACITY: usize = 16;

impl Module {
    #[instrument(skip(config))]
    pub fn new(name: &str, config: BuildConfig) -> Self {
        let mut names = NameTable::new();
        let name = if name.is_empty() {
            NO_NAME
        } else {
            // The only failure mode is an embedded NUL, which `&str`
            // construction at this boundary makes the producer's problem.
            names.intern(name).unwrap_or(NO_NAME)
        };

        let module = Module {
            name,
            names,
            types: IdxVec::with_capacity(INITIAL_ARENA_CAPACITY),
            globals: IdxVec::with_capacity(INITIAL_ARENA_CAPACITY),
            functions: IdxVec::with_capacity(INITIAL_ARENA_CAPACITY),
            config,
        };
        debug!("module created");
        module
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn target(&self) -> &Target {
        &self.config.target
    }

    // ---- name table ----

    /// Interns `name` into the module's name table.
    pub fn intern(&mut self, name: &str) -> Result<NameRef, Error> {
        self.names.intern(name)
    }

    /// Resolves a name reference; `None` for the absent name and for
    /// out-of-range offsets.
    pub fn name_of(&self, name: NameRef) -> Option<&str> {
        self.names.get(name)
    }

    // ---- arenas ----

    /// Validates `kind`, computes its layout, optionally interns a
    /// diagnostic name, and appends the type. Returns the new reference.
    pub fn add_type(&mut self, name: Option<&str>, kind: TyKind) -> Result<TypeRef, Error> {
        let layout = LayoutCtx::new(self.types.as_slice(), &self.config.target)
            .compute_layout(&kind)?;
        let name = match name {
            Some(name) => self.names.intern(name)?,
            None => NO_NAME,
        };
        let ty = Ty { name, kind, layout };
        debug!(kind = ty.kind.as_str(), "type registered");
        Ok(self.types.push(ty))
    }

    /// Appends a global after checking its cross-references.
    pub fn add_global(&mut self, global: Global) -> Result<GlobalRef, Error> {
        self.check_type_ref(global.ty)?;
        self.check_value(&global.value)?;
        Ok(self.globals.push(global))
    }

    /// Appends a function after checking its signature.
    ///
    /// [`Abi::Null`] declarations must have zero parameters and zero
    /// returns.
    pub fn add_function(&mut self, function: Function) -> Result<FuncRef, Error> {
        if function.abi == Abi::Null
            && (!function.params.is_empty() || !function.rets.is_empty())
        {
            return Err(Error::BadArgument(
                "a null-ABI function cannot declare parameters or returns".to_string(),
            ));
        }

        for var in function
            .params
            .iter()
            .chain(&function.rets)
            .chain(&function.body.locals)
        {
            self.check_type_ref(var.ty)?;
        }

        Ok(self.functions.push(function))
    }

    pub fn ty(&self, ty: TypeRef) -> Option<&Ty> {
        self.types.get(ty)
    }

    pub fn global(&self, global: GlobalRef) -> Option<&Global> {
        self.globals.get(global)
    }

    pub fn function(&self, func: FuncRef) -> Option<&Function> {
        self.functions.get(func)
    }

    pub fn types(&self) -> &IdxSlice<TypeRef, Ty> {
        self.types.as_slice()
    }

    pub fn globals(&self) -> &IdxSlice<GlobalRef, Global> {
        self.globals.as_slice()
    }

    pub fn functions(&self) -> &IdxSlice<FuncRef, Function> {
        self.functions.as_slice()
    }

    // ---- constants ----

    /// Builds a `Value::Const` of type `ty` from raw bytes, checking that
    /// the payload length matches the type's size exactly.
    pub fn const_value(&self, ty: TypeRef, bytes: &[u8]) -> Result<Value, Error> {
        let size = self.check_type_ref(ty)?.size().bytes() as usize;
        if bytes.len() != size {
            return Err(Error::BadArgument(format!(
                "constant payload is {} bytes but the type is {} bytes",
                bytes.len(),
                size
            )));
        }
        Ok(Value::Const {
            ty,
            bytes: bytes.to_vec(),
        })
    }

    /// Builds an integer constant, truncating or sign-extending `value` to
    /// the type's size.
    pub fn const_int(&self, ty: TypeRef, value: i64) -> Result<Value, Error> {
        let resolved = self.check_type_ref(ty)?;
        if !resolved.is_integer() {
            return Err(Error::InvalidType(
                "integer constant of a non-integer type".to_string(),
            ));
        }

        let size = resolved.size().bytes() as usize;
        let fill = if value < 0 { 0xFF } else { 0x00 };
        let mut bytes = vec![fill; size];
        let le = value.to_le_bytes();
        let n = size.min(le.len());
        bytes[..n].copy_from_slice(&le[..n]);
        Ok(Value::Const { ty, bytes })
    }

    /// Builds an unsigned integer constant.
    pub fn const_uint(&self, ty: TypeRef, value: u64) -> Result<Value, Error> {
        let resolved = self.check_type_ref(ty)?;
        if !resolved.is_integer() {
            return Err(Error::InvalidType(
                "integer constant of a non-integer type".to_string(),
            ));
        }

        let size = resolved.size().bytes() as usize;
        let mut bytes = vec![0u8; size];
        let le = value.to_le_bytes();
        let n = size.min(le.len());
        bytes[..n].copy_from_slice(&le[..n]);
        Ok(Value::Const { ty, bytes })
    }

    /// Builds a float constant. Only 4- and 8-byte float layouts have a
    /// host encoding to borrow.
    pub fn const_float(&self, ty: TypeRef, value: f64) -> Result<Value, Error> {
        let resolved = self.check_type_ref(ty)?;
        if !matches!(resolved.kind, TyKind::Float { .. }) {
            return Err(Error::InvalidType(
                "float constant of a non-float type".to_string(),
            ));
        }

        let bytes = match resolved.size().bytes() {
            4 => (value as f32).to_le_bytes().to_vec(),
            8 => value.to_le_bytes().to_vec(),
            n => {
                return Err(Error::BadArgument(format!(
                    "no host encoding for a {}-byte float constant",
                    n
                )))
            }
        };
        Ok(Value::Const { ty, bytes })
    }

    // ---- internal checks ----

    fn check_type_ref(&self, ty: TypeRef) -> Result<&Ty, Error> {
        self.types
            .get(ty)
            .ok_or_else(|| Error::InvalidType("type reference out of bounds".to_string()))
    }

    fn check_value(&self, value: &Value) -> Result<(), Error> {
        match value {
            Value::Const { ty, bytes } => {
                let size = self.check_type_ref(*ty)?.size().bytes() as usize;
                if bytes.len() != size {
                    return Err(Error::BadArgument(format!(
                        "constant payload is {} bytes but the type is {} bytes",
                        bytes.len(),
                        size
                    )));
                }
                Ok(())
            }
            Value::Global(global) => {
                if self.globals.get(*global).is_none() {
                    return Err(Error::InvalidModule(
                        "global reference out of bounds".to_string(),
                    ));
                }
                Ok(())
            }
            Value::Func(func) => {
                if self.functions.get(*func).is_none() {
                    return Err(Error::InvalidFunction);
                }
                Ok(())
            }
            // Variable references, expressions and nested blocks are only
            // meaningful relative to an executing frame; the evaluator
            // checks them when they are actually used.
            Value::Void | Value::Var(_) | Value::Expr(_) | Value::Block(_) => Ok(()),
        }
    }
}

/// The uniform construction path for types: bundles the per-variant fields
/// and a target module, then registers the built type in one step.
///
/// ```
/// # use emberc_ir::ir::{BuildConfig, Module};
/// let mut module = Module::new("demo", BuildConfig::default());
/// let i32_ref = module.type_builder().named("i32").int(32).build().unwrap();
/// assert_eq!(module.ty(i32_ref).unwrap().size().bytes(), 4);
/// ```
pub struct TyBuilder<'m> {
    module: &'m mut Module,
    name: Option<String>,
    kind: TyKind,
}

impl Module {
    pub fn type_builder(&mut self) -> TyBuilder<'_> {
        TyBuilder {
            module: self,
            name: None,
            kind: TyKind::Void,
        }
    }
}

impl<'m> TyBuilder<'m> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn void(mut self) -> Self {
        self.kind = TyKind::Void;
        self
    }

    pub fn int(mut self, bits: u32) -> Self {
        self.kind = TyKind::Int { bits };
        self
    }

    pub fn uint(mut self, bits: u32) -> Self {
        self.kind = TyKind::Uint { bits };
        self
    }

    pub fn float(mut self, mantissa: u32, exponent: u32) -> Self {
        self.kind = TyKind::Float { mantissa, exponent };
        self
    }

    pub fn ptr(mut self, pointee: TypeRef, depth: u32) -> Self {
        self.kind = TyKind::Ptr { pointee, depth };
        self
    }

    pub fn vptr(mut self) -> Self {
        self.kind = TyKind::VPtr;
        self
    }

    pub fn array(mut self, elem: TypeRef, count: u64) -> Self {
        self.kind = TyKind::Array { elem, count };
        self
    }

    pub fn struct_of(mut self, members: Vec<TypeRef>) -> Self {
        self.kind = TyKind::Struct { members };
        self
    }

    pub fn union_of(mut self, members: Vec<TypeRef>) -> Self {
        self.kind = TyKind::Union { members };
        self
    }

    pub fn func(mut self, params: Vec<TypeRef>, rets: Vec<TypeRef>, abi: Abi) -> Self {
        self.kind = TyKind::Func { params, rets, abi };
        self
    }

    pub fn varadic(mut self) -> Self {
        self.kind = TyKind::Varadic;
        self
    }

    /// Validates, computes layout, interns the name, and appends the type
    /// to the module.
    pub fn build(self) -> Result<TypeRef, Error> {
        self.module.add_type(self.name.as_deref(), self.kind)
    }
}
