//! Idiom reconstruction passes.
//!
//! Each pass pattern-matches a compiler-specific instruction shape and
//! rewrites it into the source-level construct it came from. A non-match
//! always leaves the list untouched.

pub mod dot_class;
pub mod dup_locals;
pub mod post_inc;
