//! mdxcalc catalog model
//!
//! This crate provides the read-only dimensional model the calculation
//! engine navigates, and the cell access interface it reads values through:
//! - Catalog objects: `Cube`, `Dimension`, `Hierarchy`, `Level`, `Member`
//! - `CubeBuilder` for assembling an in-memory cube
//! - `CellReader` trait with in-memory and batching implementations

pub mod catalog;
pub mod error;
pub mod reader;

pub use catalog::*;
pub use error::{CatalogError, CatalogResult};
pub use reader::*;
