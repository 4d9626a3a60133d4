//! # ednjit, a JIT front-end for a small typed EDN dialect
//!
//! ednjit reads a single source file written in an EDN-extended surface
//! syntax, parses it into a uniform syntax tree, lowers the tree to typed
//! Cranelift IR, and runs the result through an in-process JIT. The numeric
//! result of a synthetic float64 entry function is reported on success; a
//! structured diagnostic pinpointing the offending source fragment is
//! reported on failure.
//!
//! ## Quick start
//!
//! ```
//! use ednjit::Engine;
//!
//! let mut engine = Engine::new();
//! let output = engine.run("(+ 2 3)").unwrap();
//! assert_eq!(output.value, 5.0);
//! ```
//!
//! ## Pipeline
//!
//! 1. **Reader**: tokenize and parse the EDN surface syntax
//! 2. **Lowerer**: resolve symbols and types, emit Cranelift IR
//! 3. **Engine**: finalize the JIT module and invoke the entry function

pub mod engine;
pub mod env;
pub mod error;
pub mod logging;
pub mod lower;
pub mod reader;
pub mod syntax;
pub mod types;

pub use engine::{Engine, RunOutput};
pub use error::{Diagnostic, Error};
pub use reader::read_str;
pub use syntax::Node;
