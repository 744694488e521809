//! mdxcalc calculation engine
//!
//! This crate compiles validated MDX expression trees into calc trees and
//! evaluates them against a cube:
//! - `expr` / `validator`: expression trees and function resolution
//! - `resolve`: overload matching with implicit conversion costs
//! - `compiler` / `funs`: calc construction and the built-in functions
//! - `calc`: compiled nodes, profiling and hierarchy dependency analysis
//! - `evaluator`: the current-member context with savepoint/restore
//! - `tuple`: tuple lists, cursors and iterables under a result limit
//! - `cancel`: cooperative cancellation, timeouts and phased cell loading

pub mod calc;
pub mod cancel;
pub mod compiler;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod funs;
pub mod resolve;
pub mod timing;
pub mod tuple;
pub mod validator;
pub mod value;

pub use calc::{
    Calc, CalcBase, CalcRef, CalculationProfile, DependencyRule, ResultStyle,
    dependent_hierarchies,
};
pub use cancel::{
    CancellationChecker, CancellationHandle, Execution, PhaseLoop, PhaseOutcome,
};
pub use compiler::ExpCompiler;
pub use config::EngineConfig;
pub use error::{CalcError, CalcResult, ResolutionError};
pub use evaluator::{Evaluator, EvaluatorGuard, Savepoint};
pub use expr::{Expression, Literal, Parameter, ResolvedFunCall, UnresolvedCall, extract_members};
pub use resolve::{
    Conversion, FunDef, FunctionDefinition, FunctionResolver, FunctionSignature, FunctionTable,
    MultiResolver, ResolveOutcome, Syntax,
};
pub use timing::QueryTiming;
pub use tuple::{TupleCollections, TupleCursor, TupleIterable, TupleIterator, TupleList};
pub use validator::{ExpValidator, Validator};
pub use value::Value;

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::EngineConfig;
    use crate::evaluator::Evaluator;
    use mdxcalc_model::{CellReader, Cube, CubeBuilder, DimensionType, InMemoryCellReader};
    use std::sync::{Arc, LazyLock};

    static CUBE: LazyLock<Arc<Cube>> = LazyLock::new(build_cube);

    fn build_cube() -> Arc<Cube> {
        let mut b = CubeBuilder::new("Sales");
        b.dimension("Time", DimensionType::Time);
        b.hierarchy("Time", None, true, &["Year", "Quarter"]).unwrap();
        b.hierarchy("Time", Some("Fiscal"), true, &["Year"]).unwrap();
        for year in ["1997", "1998"] {
            b.member("[Time]", None, year).unwrap();
            let parent = format!("[Time].[{}]", year);
            for q in ["Q1", "Q2", "Q3", "Q4"] {
                b.member("[Time]", Some(&parent), q).unwrap();
            }
        }
        b.member("[Time].[Fiscal]", None, "FY1997").unwrap();

        b.dimension("Store", DimensionType::Standard);
        b.hierarchy("Store", None, true, &["Country", "State"]).unwrap();
        b.member("[Store]", None, "USA").unwrap();
        b.member("[Store]", Some("[Store].[USA]"), "CA").unwrap();
        b.member("[Store]", Some("[Store].[USA]"), "WA").unwrap();

        b.measure("Unit Sales").unwrap();
        b.measure("Store Sales").unwrap();
        b.build().unwrap()
    }

    /// Time (with a second Fiscal hierarchy), Store and two measures
    pub(crate) fn sample_cube() -> Arc<Cube> {
        CUBE.clone()
    }

    /// Facts in 1997 only; 1998 is empty
    pub(crate) fn sample_reader() -> Arc<dyn CellReader> {
        let cube = sample_cube();
        let m = |name: &str| cube.lookup_member(name).unwrap().clone();
        let mut reader = InMemoryCellReader::new();
        let facts = [
            ("[Time].[1997].[Q1]", "[Store].[USA].[CA]", "[Measures].[Unit Sales]", 10.0),
            ("[Time].[1997].[Q2]", "[Store].[USA].[CA]", "[Measures].[Unit Sales]", 20.0),
            ("[Time].[1997].[Q1]", "[Store].[USA].[WA]", "[Measures].[Unit Sales]", 5.0),
            ("[Time].[1997].[Q3]", "[Store].[USA].[WA]", "[Measures].[Unit Sales]", 7.0),
            ("[Time].[1997].[Q1]", "[Store].[USA].[CA]", "[Measures].[Store Sales]", 100.0),
            ("[Time].[1997].[Q2]", "[Store].[USA].[WA]", "[Measures].[Store Sales]", 50.0),
        ];
        for (time, store, measure, value) in facts {
            reader.add_fact([m(time), m(store), m(measure)], value);
        }
        Arc::new(reader)
    }

    pub(crate) fn sample_evaluator() -> Evaluator {
        Evaluator::new(
            sample_cube(),
            sample_reader(),
            Arc::new(EngineConfig::default()),
        )
    }
}
