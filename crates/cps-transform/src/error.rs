use std::fmt;
use std::path::PathBuf;

use strum::Display;

/// Result type alias for operations that can fail during a transform run.
pub type TransformResult<T> = Result<T, TransformError>;

/// The four fatal error kinds a single file's transform can produce (spec §7).
///
/// There is no local recovery within a file: the first fatal error aborts
/// emission for that file so partial output is never written.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ErrorKind {
    /// Surface source failed to parse.
    #[strum(serialize = "ParseError")]
    Parse,
    /// The lowerer has no rule for an AST node kind that appears inside a
    /// CPS-transformed region (`for`, `try`, destructuring assignment, ...).
    #[strum(serialize = "UnsupportedConstruct")]
    UnsupportedConstruct,
    /// An invariant of the IR was violated while lowering (e.g. an `Assign`
    /// with more than one target, an attribute chain bottoming out in
    /// something other than a `Name`).
    #[strum(serialize = "StructuralAssertionFailure")]
    StructuralAssertionFailure,
    /// A file could not be opened, read, or written.
    #[strum(serialize = "IOError")]
    Io,
}

/// A fatal, file-scoped transform error, carrying the offending path and a
/// human-readable message naming the construct or condition at fault.
#[derive(Debug, Clone)]
pub struct TransformError {
    pub kind: ErrorKind,
    pub path: Option<PathBuf>,
    pub message: String,
}

impl TransformError {
    pub fn parse(message: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Parse,
            path: None,
            message: message.to_string(),
        }
    }

    pub fn unsupported(construct: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::UnsupportedConstruct,
            path: None,
            message: format!("unsupported construct: {construct}"),
        }
    }

    pub fn structural(detail: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::StructuralAssertionFailure,
            path: None,
            message: detail.to_string(),
        }
    }

    pub fn io(detail: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Io,
            path: None,
            message: detail.to_string(),
        }
    }

    /// Attaches the path this error occurred while processing, for
    /// diagnostics that span multiple files (the CLI driver calls this).
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}: {}: {}", path.display(), self.kind, self.message)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for TransformError {}
