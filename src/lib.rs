//! Reconstruction of local variables and compiler idioms for decoded
//! [JVM method bodies](https://docs.oracle.com/javase/specs/jvms/se10/html/jvms-4.html).
//!
//! A compiled method body arrives as an instruction tree whose slot
//! accesses are anonymous and whose stack tricks (value duplication,
//! lazily cached `.class` fields, post-increments) are still visible.
//! This crate rebuilds the symbolic variable table — one typed, named,
//! scoped record per slot interpretation — and rewrites those idioms back
//! into their source-level form:
//!
//! - [`analyzer::analyze`] establishes the table and runs multi-pass type
//!   inference over every slot access;
//! - [`reconstruct::post_inc`] collapses duplicate-then-add shapes into
//!   `PostInc` nodes;
//! - [`reconstruct::dot_class`] folds pre-1.5 `class$` cache patterns into
//!   class literals;
//! - [`reconstruct::dup_locals`] declares whatever stack temporaries
//!   survived as explicit locals.
//!
//! Everything is offset-addressed: nodes correlate across rewrites by the
//! bytecode offset they were decoded from, never by reference.

pub mod analyzer;
pub mod descriptor;
pub mod instruction;
pub mod locals;
pub mod method;
pub mod name_gen;
pub mod reconstruct;
pub mod symbols;

pub use analyzer::analyze;
pub use instruction::Instr;
pub use locals::{LocalVariable, LocalVariables, TypeRef};
pub use method::{ClassContext, MethodContext};
pub use name_gen::VariableNameGenerator;
pub use symbols::{ReferenceMap, SymbolTable};
