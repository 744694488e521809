//! Function resolution: signatures, overload matching and the function table

mod conversion;
mod definition;
mod resolver;
mod syntax;
mod table;

pub use conversion::Conversion;
pub use definition::{CompileFn, FunDef, FunctionDefinition, ResultTypeFn, default_result_type};
pub use resolver::{
    FunctionResolver, MultiResolver, ResolveOutcome, VariadicMatcher, VariadicResolver,
    match_parameters,
};
pub use syntax::{FunctionSignature, Syntax, category_from_flag};
pub use table::FunctionTable;
