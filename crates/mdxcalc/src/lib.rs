//! MDX calculation engine
//!
//! This crate ties the engine together behind one entry point:
//! - Validating expression trees against a cube and function table
//! - Compiling them into calc trees
//! - Executing them in phases over a cell reader, with cancellation,
//!   timeouts and per-node profiling
//!
//! # Example
//!
//! ```ignore
//! use mdxcalc::{Engine, Expression};
//!
//! let engine = Engine::new(cube.clone(), reader)?;
//! let quarters = Expression::property(Expression::Member(year), "Children");
//! let query = engine.prepare(Expression::function("Sum", vec![quarters]))?;
//! let result = engine.execute(&query)?;
//! println!("{} in {} phases", result.value, result.phases);
//! ```

mod engine;

// Re-export all public APIs from internal crates
pub use mdxcalc_diagnostics as diagnostics;
pub use mdxcalc_eval as eval;
pub use mdxcalc_model as model;
pub use mdxcalc_types as types;

// Convenience re-exports
pub use engine::{Engine, PreparedQuery, QueryResult, QueryStats};
pub use mdxcalc_diagnostics::{MdxError, Result};
pub use mdxcalc_eval::{CalculationProfile, EngineConfig, Expression, Parameter, Value};
