//! The in-memory intermediate representation.
//!
//! A [`ir::Module`] is a self-contained graph of named types, globals and
//! functions. Entities never point at each other directly; every
//! cross-reference is a typed integer index ([`syntax::TypeRef`],
//! [`syntax::GlobalRef`], [`syntax::FuncRef`], [`syntax::VarRef`]) or a byte
//! offset into the module's name table ([`interner::NameRef`]). The arenas
//! behind those indices only ever grow, so a reference handed out once stays
//! valid for the lifetime of the module.
//!
//! Nothing here enforces SSA or type-correctness of instruction operands;
//! producers are trusted, and the evaluator re-checks operand kinds when it
//! actually executes an instruction.

pub mod error;
pub mod interner;
pub mod ir;
pub mod printer;
pub mod syntax;
pub mod ty;
