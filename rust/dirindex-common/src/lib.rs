//! Core definitions (error model and validation helpers), relied upon by all dirindex-* crates.

pub mod error;
pub mod macros;
pub mod result;

pub use result::Result;
