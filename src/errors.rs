use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// One step of a path into the declarative tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSeg {
    /// A map key.
    Key(String),
    /// A list index.
    Index(usize),
}

/// Location of a loading failure inside the input tree.
///
/// Rendered as `$`, `$.choice[2]`, `$.sequence[0].default`, and so on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreePath(pub Vec<PathSeg>);

impl TreePath {
    /// The root path (`$`).
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns this path extended by one map key.
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segs = self.0.clone();
        segs.push(PathSeg::Key(key.into()));
        Self(segs)
    }

    /// Returns this path extended by one list index.
    #[must_use]
    pub fn index(&self, idx: usize) -> Self {
        let mut segs = self.0.clone();
        segs.push(PathSeg::Index(idx));
        Self(segs)
    }
}

impl Display for TreePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.0 {
            match seg {
                PathSeg::Key(k) => write!(f, ".{k}")?,
                PathSeg::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

/// Detailed categorization of a loading failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadingErrorKind {
    #[error("unknown tag {tag:?}")]
    UnknownTag { tag: String },
    #[error("unknown field {field:?} on {tag:?}")]
    UnknownField { tag: String, field: String },
    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("default index {index} is out of range for {len} alternatives")]
    BadDefaultIndex { index: usize, len: usize },
    #[error("breaks list has length {found}, expected {expected}")]
    BreaksLengthMismatch { expected: usize, found: usize },
    #[error("unknown break kind {found:?}")]
    UnknownBreak { found: String },
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("text must not contain newlines")]
    MultilineText,
    #[error("repeat_top cannot be combined with skip")]
    InconsistentFlags,
}

/// Error reported when the input tree is malformed.
///
/// Carries a human-readable message and, where available, a path into the
/// offending part of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingError {
    /// Location of the failure.
    pub path: TreePath,
    /// Detailed categorization of the failure.
    pub kind: LoadingErrorKind,
}

impl LoadingError {
    /// Creates a new [`LoadingError`].
    #[must_use]
    pub fn new(path: TreePath, kind: LoadingErrorKind) -> Self {
        Self { path, kind }
    }
}

impl Display for LoadingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.path)
    }
}

impl std::error::Error for LoadingError {}

/// Error wrapping a failure reported by an embedder-supplied callback
/// (text measure or href resolver).
#[derive(Debug, Error, Clone)]
#[error("embedder callback failed: {0}")]
pub struct EmbedderError(pub String);

impl EmbedderError {
    /// Creates a new [`EmbedderError`] from any message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Any failure a render entry point can report.
#[derive(Debug, Error, Clone)]
pub enum RenderError {
    #[error("loading error: {0}")]
    Loading(#[from] LoadingError),
    #[error("embedder error: {0}")]
    Embedder(#[from] EmbedderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        let path = TreePath::root().key("choice").index(2).key("default");
        assert_eq!(path.to_string(), "$.choice[2].default");
        assert_eq!(TreePath::root().to_string(), "$");
    }

    #[test]
    fn test_loading_error_display() {
        let err = LoadingError::new(
            TreePath::root().key("choice"),
            LoadingErrorKind::BadDefaultIndex { index: 3, len: 2 },
        );
        assert_eq!(
            err.to_string(),
            "default index 3 is out of range for 2 alternatives at $.choice"
        );
    }
}
