//! Shared fixtures for the evaluation integration tests
//!
//! A small Sales cube with Time (Year, Quarter) and Store (Country, State)
//! hierarchies, and facts for 1997 only.

#![allow(dead_code)]

use mdxcalc_eval::{
    EngineConfig, Evaluator, ExpValidator, Expression, FunctionTable, Validator,
};
use mdxcalc_model::{CellReader, Cube, CubeBuilder, DimensionType, InMemoryCellReader, MemberRef};
use std::sync::Arc;

pub fn cube() -> Arc<Cube> {
    let mut b = CubeBuilder::new("Sales");
    b.dimension("Time", DimensionType::Time);
    b.hierarchy("Time", None, true, &["Year", "Quarter"]).unwrap();
    for year in ["1997", "1998"] {
        b.member("[Time]", None, year).unwrap();
        let parent = format!("[Time].[{}]", year);
        for q in ["Q1", "Q2", "Q3", "Q4"] {
            b.member("[Time]", Some(&parent), q).unwrap();
        }
    }
    b.dimension("Store", DimensionType::Standard);
    b.hierarchy("Store", None, true, &["Country", "State"]).unwrap();
    b.member("[Store]", None, "USA").unwrap();
    for state in ["CA", "OR", "WA"] {
        b.member("[Store]", Some("[Store].[USA]"), state).unwrap();
    }
    b.measure("Unit Sales").unwrap();
    b.build().unwrap()
}

pub fn member(cube: &Cube, name: &str) -> MemberRef {
    cube.lookup_member(name).unwrap().clone()
}

/// Unit sales: CA 10/20/0/0, OR 0/0/3/0, WA 5/0/7/0 over 1997's quarters
pub fn facts(cube: &Cube) -> InMemoryCellReader {
    let mut reader = InMemoryCellReader::new();
    let facts = [
        ("[Time].[1997].[Q1]", "[Store].[USA].[CA]", 10.0),
        ("[Time].[1997].[Q2]", "[Store].[USA].[CA]", 20.0),
        ("[Time].[1997].[Q3]", "[Store].[USA].[OR]", 3.0),
        ("[Time].[1997].[Q1]", "[Store].[USA].[WA]", 5.0),
        ("[Time].[1997].[Q3]", "[Store].[USA].[WA]", 7.0),
    ];
    for (time, store, value) in facts {
        reader.add_fact(
            [
                member(cube, time),
                member(cube, store),
                member(cube, "[Measures].[Unit Sales]"),
            ],
            value,
        );
    }
    reader
}

pub fn evaluator(cube: &Arc<Cube>, config: EngineConfig) -> Evaluator {
    let reader: Arc<dyn CellReader> = Arc::new(facts(cube));
    Evaluator::new(cube.clone(), reader, Arc::new(config))
}

pub fn member_expr(cube: &Cube, name: &str) -> Expression {
    Expression::Member(member(cube, name))
}

pub fn children(cube: &Cube, name: &str) -> Expression {
    Expression::property(member_expr(cube, name), "Children")
}

pub fn validate(cube: &Arc<Cube>, expr: Expression) -> Expression {
    let table = Arc::new(FunctionTable::builtin().unwrap());
    ExpValidator::new(cube.clone(), table).validate(expr).unwrap()
}
