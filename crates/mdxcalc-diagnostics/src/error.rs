//! Query errors and the diagnostics rendered from them

use crate::{ErrorCode, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The query cannot be prepared or executed
    Error,
    /// The query ran, but a result may be incomplete
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// A user-facing report about one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: ErrorCode,
    pub stage: Stage,
    pub message: String,
    /// Text of the query the error was raised for
    pub query: Option<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            stage: code.stage(),
            message: message.into(),
            query: None,
            help: code.info().help.map(str::to_string),
        }
    }

    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {}: {}", self.severity, self.code, self.stage, self.message)?;
        if let Some(query) = &self.query {
            write!(f, "\n  in query: {}", query)?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {}", help)?;
        }
        Ok(())
    }
}

/// Error surfaced at the query boundary.
///
/// The stage follows from the code's range; the query text is attached by
/// whoever knows it, usually the engine.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct MdxError {
    code: ErrorCode,
    message: String,
    query: Option<String>,
}

impl MdxError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            query: None,
        }
    }

    /// A configuration or internal failure
    pub fn system(code: ErrorCode, message: impl Into<String>) -> Self {
        debug_assert_eq!(code.stage(), Stage::System);
        Self::new(code, message)
    }

    /// Attach the query text; a query already attached is kept
    pub fn with_context(mut self, query: impl Into<String>) -> Self {
        if self.query.is_none() {
            self.query = Some(query.into());
        }
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn stage(&self) -> Stage {
        self.code.stage()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.code, self.message.clone());
        match &self.query {
            Some(query) => diagnostic.with_query(query.clone()),
            None => diagnostic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MDX0101, MDX0207, MDX0401};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::error(MDX0101, "No function matches signature 'Head(<String>)'")
            .with_query("Head(\"x\")");
        assert_eq!(
            diag.to_string(),
            "error[MDX0101] validation: No function matches signature 'Head(<String>)'\n  \
             in query: Head(\"x\")\n  help: Check the number and types of the arguments"
        );
    }

    #[test]
    fn test_error_to_diagnostic() {
        let err = MdxError::new(MDX0207, "Size of tuple list (16) exceeded limit (15)")
            .with_context("CrossJoin([Product].Members, [Time].[1997].Children)");
        assert_eq!(err.stage(), Stage::Evaluation);
        assert_eq!(err.to_string(), "MDX0207: Size of tuple list (16) exceeded limit (15)");

        let diag = err.to_diagnostic();
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.stage, Stage::Evaluation);
        assert!(diag.query.as_deref().is_some_and(|q| q.starts_with("CrossJoin")));
    }

    #[test]
    fn test_first_context_wins() {
        let err = MdxError::system(MDX0401, "max_phases must be at least 1")
            .with_context("inner")
            .with_context("outer");
        assert_eq!(err.query(), Some("inner"));
    }
}
