//! Target and layout primitives shared by the IR, the evaluator, and the
//! codegen boundary.
//!
//! This crate knows how big things are ([`size_and_align`]) and where the
//! compilation is headed ([`target`]). It deliberately knows nothing about
//! the IR itself.

pub mod size_and_align;
pub mod target;
