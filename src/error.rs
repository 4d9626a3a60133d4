//! Structured compile diagnostics.
//!
//! Every reader and lowerer failure funnels through [`Diagnostic`]: the
//! offending source position, a human message, and the single-line canonical
//! rendering of the node the compiler was looking at. Debug builds also
//! capture the compiler source site that raised the diagnostic.

use crate::reader::SourceLoc;
use crate::syntax::Node;
use std::fmt;
use std::panic::Location;

#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Source file path; `<input>` when not known.
    pub path: Option<String>,
    pub loc: SourceLoc,
    pub message: String,
    /// Canonical rendering of the offending node, empty for token-level
    /// failures.
    pub fragment: String,
    origin: Option<&'static Location<'static>>,
}

impl Diagnostic {
    /// Diagnostic tied to a bare source position.
    #[track_caller]
    pub fn at(loc: SourceLoc, message: impl Into<String>) -> Self {
        Diagnostic {
            path: None,
            loc,
            message: message.into(),
            fragment: String::new(),
            origin: origin(),
        }
    }

    /// Diagnostic tied to a syntax node, rendering the node as context.
    #[track_caller]
    pub fn node(node: &Node, message: impl Into<String>) -> Self {
        Diagnostic {
            path: None,
            loc: node.loc,
            message: message.into(),
            fragment: node.to_string(),
            origin: origin(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

#[track_caller]
fn origin() -> Option<&'static Location<'static>> {
    if cfg!(debug_assertions) {
        Some(Location::caller())
    } else {
        None
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.as_deref().unwrap_or("<input>");
        write!(f, "{}:{}: {}", path, self.loc, self.message)?;
        if !self.fragment.is_empty() {
            write!(f, ": {}", self.fragment)?;
        }
        if let Some(origin) = self.origin {
            write!(f, "\n  raised at {}:{}", origin.file(), origin.line())?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Top-level failure: a structured compile diagnostic, or a backend failure
/// reported with the backend's own message.
#[derive(Debug)]
pub enum Error {
    Compile(Diagnostic),
    Backend(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Compile(diag) => write!(f, "{}", diag),
            Error::Backend(message) => write!(f, "backend error: {}", message),
        }
    }
}

impl std::error::Error for Error {}

impl From<Diagnostic> for Error {
    fn from(diag: Diagnostic) -> Self {
        Error::Compile(diag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_leads_with_location() {
        let diag = Diagnostic::at(SourceLoc::new(3, 7), "unknown variable 'x'")
            .with_path("demo.edn");
        let first = diag.to_string();
        let first = first.lines().next().unwrap();
        assert_eq!(first, "demo.edn:3:7: unknown variable 'x'");
    }

    #[test]
    fn node_diagnostics_carry_the_fragment() {
        let node = crate::reader::read_one("(+ x 1)").unwrap();
        let diag = Diagnostic::node(&node, "unknown variable 'x'");
        assert!(diag.to_string().contains("(+ x 1)"));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn debug_builds_capture_the_raising_site() {
        let diag = Diagnostic::at(SourceLoc::start(), "boom");
        assert!(diag.to_string().contains("error.rs"));
    }
}
