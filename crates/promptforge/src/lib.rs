//! Promptforge is a prompt template engine: it parses template source with
//! variable interpolation, conditional sections and iteration, and renders it
//! against caller-supplied bindings.
//!
//! Rendering is a pure function of `(source, bindings)` — no I/O, no clock,
//! no shared state — so parsed templates can be cached and shared freely.

pub mod error;
pub mod parser;
pub mod render;
pub mod value;

// Re-export core types
pub use error::{EngineError, Result};
pub use parser::ParsedTemplate;
pub use render::{OutputContext, render, render_with};
pub use value::{Bindings, Value, bindings_from_json};

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
