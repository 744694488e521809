//! Errors raised while resolving, compiling and evaluating expressions

use mdxcalc_diagnostics::{
    ErrorCode, MDX0100, MDX0101, MDX0102, MDX0103, MDX0104, MDX0105, MDX0106, MDX0107, MDX0201,
    MDX0202, MDX0203, MDX0204, MDX0205, MDX0206, MDX0207, MDX0300, MDX0400, MDX0402, MdxError,
};
use mdxcalc_model::CatalogError;
use mdxcalc_types::{CoercionError, DataType};
use thiserror::Error;

/// Result type for calculation operations
pub type CalcResult<T> = Result<T, CalcError>;

/// Errors that can occur during compilation or evaluation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalcError {
    /// A tuple list grew past the configured result limit
    #[error("Size of tuple list ({attempted}) exceeded limit ({limit})")]
    ResourceLimitExceeded { attempted: usize, limit: usize },

    /// A value could not be viewed as the requested type
    #[error("Cannot convert {from} to {to}")]
    TypeConversion { from: String, to: String },

    /// The query was canceled
    #[error("Query canceled")]
    Cancelled,

    /// The query ran longer than its timeout
    #[error("Query timeout of {timeout_ms} ms reached")]
    Timeout { timeout_ms: u64 },

    /// Enough cell requests are queued; the current phase must stop so they
    /// can be loaded. Only the phase loop handles this.
    #[error("Cell request quantum exceeded")]
    QuantumExceeded,

    /// A tuple of the wrong width was added to a tuple collection
    #[error("Tuple arity mismatch: expected {expected}, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// Internal error (should not happen)
    #[error("Internal evaluation error: {message}")]
    Internal { message: String },

    /// A function received an argument it cannot work with
    #[error("Invalid argument to {function}: {message}")]
    InvalidArgument { function: String, message: String },

    /// Function resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Evaluation nested too deeply
    #[error("Maximum evaluation depth ({max}) exceeded")]
    RecursionLimit { max: usize },

    /// A member referenced by name does not exist
    #[error("Member not found: {0}")]
    UnknownMember(String),
}

impl CalcError {
    /// Create a type conversion error
    pub fn type_conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::TypeConversion {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Whether this is the quantum signal rather than a failure
    pub fn is_quantum_exceeded(&self) -> bool {
        matches!(self, Self::QuantumExceeded)
    }

    /// Get the diagnostic error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ResourceLimitExceeded { .. } => MDX0207,
            Self::TypeConversion { .. } => MDX0201,
            Self::Cancelled => MDX0204,
            Self::Timeout { .. } => MDX0205,
            Self::QuantumExceeded => MDX0206,
            Self::ArityMismatch { .. } => MDX0402,
            Self::Internal { .. } => MDX0400,
            Self::InvalidArgument { .. } => MDX0202,
            Self::Resolution(e) => e.code(),
            Self::RecursionLimit { .. } => MDX0203,
            Self::UnknownMember(_) => MDX0300,
        }
    }
}

impl From<CatalogError> for CalcError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::MemberNotFound(name) => Self::UnknownMember(name),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<CalcError> for MdxError {
    fn from(err: CalcError) -> Self {
        MdxError::new(err.code(), err.to_string())
    }
}

/// Errors raised while resolving a function call against the function table
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolutionError {
    /// No function with this name and syntax exists
    #[error("No function matches name '{name}' with syntax {syntax}")]
    UnknownFunction { name: String, syntax: String },

    /// Functions exist but none accepts these arguments
    #[error("No function matches signature '{signature}'")]
    NoMatchingOverload { name: String, signature: String },

    /// Several overloads match at the same lowest cost
    #[error("More than one function matches signature '{signature}': {}", candidates.join(", "))]
    AmbiguousOverload {
        name: String,
        signature: String,
        candidates: Vec<String>,
    },

    /// A conversion that is valid for the types is invalid for the operand
    #[error("Cannot convert {from} to {to}: {reason}")]
    InvalidConversion {
        from: DataType,
        to: DataType,
        reason: String,
    },

    /// A registered signature cannot be interpreted
    #[error("Malformed signature '{flags}' for function '{name}': {reason}")]
    MalformedSignature {
        name: String,
        flags: String,
        reason: String,
    },

    /// A call reached compilation without being resolved
    #[error("Function call '{name}' has not been resolved")]
    UnresolvedCall { name: String },

    /// A symbol was used where the function does not accept it
    #[error("Symbol '{word}' is not a reserved word of function '{name}'")]
    InvalidSymbol { name: String, word: String },

    /// Operands have incompatible types
    #[error("Type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// A parameter was referenced but never declared
    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: String },

    /// Implicit conversion rules rejected a conversion
    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

impl ResolutionError {
    /// Get the diagnostic error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownFunction { .. } => MDX0100,
            Self::NoMatchingOverload { .. } => MDX0101,
            Self::AmbiguousOverload { .. } => MDX0102,
            Self::InvalidConversion { .. } | Self::Coercion(_) => MDX0103,
            Self::UnresolvedCall { .. } => MDX0104,
            Self::InvalidSymbol { .. } => MDX0105,
            Self::TypeMismatch { .. } => MDX0106,
            Self::UnknownParameter { .. } => MDX0107,
            Self::MalformedSignature { .. } => MDX0400,
        }
    }
}

impl From<ResolutionError> for MdxError {
    fn from(err: ResolutionError) -> Self {
        CalcError::Resolution(err).into()
    }
}
