//! Error codes following a structured numbering system
//!
//! Error code ranges:
//! - MDX0100-MDX0199: Validation errors (function resolution, conversions)
//! - MDX0200-MDX0299: Evaluation errors (runtime)
//! - MDX0300-MDX0399: Catalog errors (cube, hierarchy, member lookup)
//! - MDX0400-MDX0499: System errors (internal defects, configuration)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// The query stage this code's range belongs to
    pub const fn stage(&self) -> Stage {
        match self.0 {
            100..200 => Stage::Validation,
            200..300 => Stage::Evaluation,
            300..400 => Stage::Catalog,
            _ => Stage::System,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MDX{:04}", self.0)
    }
}

/// Where in a query's life an error arose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Binding calls to functions and checking conversions
    Validation,
    /// Running a compiled calc tree
    Evaluation,
    /// Looking up cube objects
    Catalog,
    /// Configuration and internal defects
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Validation => "validation",
            Stage::Evaluation => "evaluation",
            Stage::Catalog => "catalog",
            Stage::System => "system",
        })
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Validation errors (0100-0199)
    map.insert(100, ErrorInfo::new("Unknown function"));
    map.insert(
        101,
        ErrorInfo::new("No function matches signature")
            .with_help("Check the number and types of the arguments"),
    );
    map.insert(
        102,
        ErrorInfo::new("More than one function matches signature")
            .with_help("Add an explicit conversion to disambiguate the call"),
    );
    map.insert(103, ErrorInfo::new("Invalid implicit conversion"));
    map.insert(104, ErrorInfo::new("Function call has not been resolved"));
    map.insert(105, ErrorInfo::new("Invalid reserved word"));
    map.insert(106, ErrorInfo::new("Type mismatch"));
    map.insert(107, ErrorInfo::new("Unknown parameter"));

    // Evaluation errors (0200-0299)
    map.insert(200, ErrorInfo::new("Evaluation failed"));
    map.insert(201, ErrorInfo::new("Type conversion failed"));
    map.insert(202, ErrorInfo::new("Invalid argument"));
    map.insert(203, ErrorInfo::new("Evaluation depth limit exceeded"));
    map.insert(204, ErrorInfo::new("Query canceled"));
    map.insert(205, ErrorInfo::new("Query timeout"));
    map.insert(206, ErrorInfo::new("Cell request quantum exceeded"));
    map.insert(
        207,
        ErrorInfo::new("Result limit exceeded")
            .with_help("Narrow the query or raise the configured result limit"),
    );

    // Catalog errors (0300-0399)
    map.insert(300, ErrorInfo::new("Member not found"));
    map.insert(301, ErrorInfo::new("Hierarchy not found"));
    map.insert(302, ErrorInfo::new("Inconsistent catalog"));

    // System errors (0400-0499)
    map.insert(400, ErrorInfo::new("Internal error"));
    map.insert(401, ErrorInfo::new("Configuration error"));
    map.insert(402, ErrorInfo::new("Tuple arity mismatch"));

    map
});

// Validation errors
pub const MDX0100: ErrorCode = ErrorCode::new(100);
pub const MDX0101: ErrorCode = ErrorCode::new(101);
pub const MDX0102: ErrorCode = ErrorCode::new(102);
pub const MDX0103: ErrorCode = ErrorCode::new(103);
pub const MDX0104: ErrorCode = ErrorCode::new(104);
pub const MDX0105: ErrorCode = ErrorCode::new(105);
pub const MDX0106: ErrorCode = ErrorCode::new(106);
pub const MDX0107: ErrorCode = ErrorCode::new(107);

// Evaluation errors
pub const MDX0200: ErrorCode = ErrorCode::new(200);
pub const MDX0201: ErrorCode = ErrorCode::new(201);
pub const MDX0202: ErrorCode = ErrorCode::new(202);
pub const MDX0203: ErrorCode = ErrorCode::new(203);
pub const MDX0204: ErrorCode = ErrorCode::new(204);
pub const MDX0205: ErrorCode = ErrorCode::new(205);
pub const MDX0206: ErrorCode = ErrorCode::new(206);
pub const MDX0207: ErrorCode = ErrorCode::new(207);

// Catalog errors
pub const MDX0300: ErrorCode = ErrorCode::new(300);
pub const MDX0301: ErrorCode = ErrorCode::new(301);
pub const MDX0302: ErrorCode = ErrorCode::new(302);

// System errors
pub const MDX0400: ErrorCode = ErrorCode::new(400);
pub const MDX0401: ErrorCode = ErrorCode::new(401);
pub const MDX0402: ErrorCode = ErrorCode::new(402);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(MDX0100.to_string(), "MDX0100");
        assert_eq!(MDX0207.to_string(), "MDX0207");
    }

    #[test]
    fn test_stage_follows_range() {
        assert_eq!(MDX0101.stage(), Stage::Validation);
        assert_eq!(MDX0207.stage(), Stage::Evaluation);
        assert_eq!(MDX0300.stage(), Stage::Catalog);
        assert_eq!(MDX0402.stage(), Stage::System);
        assert_eq!(ErrorCode::new(999).stage(), Stage::System);
        assert_eq!(Stage::Evaluation.to_string(), "evaluation");
    }

    #[test]
    fn test_error_info() {
        assert_eq!(MDX0102.info().description, "More than one function matches signature");
        assert!(MDX0207.info().help.is_some());
        assert_eq!(ErrorCode::new(999).info().description, "Unknown error");
    }
}
