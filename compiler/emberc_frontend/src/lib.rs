//! Source-language type registration.
//!
//! A frontend lowering a real language needs the language's scalar types
//! registered in the module under predictable names before it can build
//! functions. This crate provides that registration for C; further
//! frontends follow the same `<lang>@<type name>` naming convention.

pub mod c;
