//! Catalog errors

use mdxcalc_diagnostics::{ErrorCode, MDX0300, MDX0301, MDX0302, MdxError};
use thiserror::Error;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised while building or navigating a cube
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Member '{0}' not found")]
    MemberNotFound(String),

    #[error("Hierarchy '{0}' not found")]
    HierarchyNotFound(String),

    #[error("Dimension '{0}' not found")]
    DimensionNotFound(String),

    #[error("Duplicate catalog object '{0}'")]
    Duplicate(String),

    #[error("Hierarchy '{0}' has no members")]
    EmptyHierarchy(String),

    #[error("Hierarchy '{hierarchy}' has {levels} levels, cannot place member '{member}' at depth {depth}")]
    LevelOutOfRange {
        hierarchy: String,
        member: String,
        levels: usize,
        depth: usize,
    },
}

impl CatalogError {
    /// Get the diagnostic code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MemberNotFound(_) => MDX0300,
            Self::HierarchyNotFound(_) | Self::DimensionNotFound(_) => MDX0301,
            Self::Duplicate(_) | Self::EmptyHierarchy(_) | Self::LevelOutOfRange { .. } => MDX0302,
        }
    }
}

impl From<CatalogError> for MdxError {
    fn from(err: CatalogError) -> Self {
        MdxError::new(err.code(), err.to_string())
    }
}
