//! The codegen boundary.
//!
//! Code generation proper is a collaborator behind the [`traits::EmitBackend`]
//! trait; this crate owns the contract, not the machinery. The entry point
//! [`entry::emit_module`] validates the target configuration, walks a fully
//! built module (globals first, then functions) without mutating it, and
//! hands each item to the backend.

pub mod entry;
pub mod traits;
