//! End-to-end engine tests
//!
//! Prepare and execute expressions against a small cube, through both an
//! immediate and a batching cell reader.

use mdxcalc::diagnostics::{MDX0101, MDX0204, MDX0207};
use mdxcalc::eval::Literal;
use mdxcalc::model::{
    BatchingCellReader, CellReader, Cube, CubeBuilder, DimensionType, InMemoryCellReader,
    MemberRef,
};
use mdxcalc::types::Type;
use mdxcalc::{Engine, EngineConfig, Expression, Parameter, Value};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn cube() -> Arc<Cube> {
    let mut b = CubeBuilder::new("Sales");
    b.dimension("Time", DimensionType::Time);
    b.hierarchy("Time", None, true, &["Year", "Quarter"]).unwrap();
    b.member("[Time]", None, "1997").unwrap();
    for q in ["Q1", "Q2", "Q3", "Q4"] {
        b.member("[Time]", Some("[Time].[1997]"), q).unwrap();
    }
    b.dimension("Product", DimensionType::Standard);
    b.hierarchy("Product", None, true, &["Family"]).unwrap();
    for family in ["Drink", "Food"] {
        b.member("[Product]", None, family).unwrap();
    }
    b.measure("Unit Sales").unwrap();
    b.build().unwrap()
}

fn member(cube: &Cube, name: &str) -> MemberRef {
    cube.lookup_member(name).unwrap().clone()
}

/// Drink sells 1, 2, 3, 4 and Food 10, 0, 30, 0 over the quarters
fn facts(cube: &Cube) -> InMemoryCellReader {
    let mut reader = InMemoryCellReader::new();
    let sales = [
        ("Q1", "Drink", 1.0),
        ("Q2", "Drink", 2.0),
        ("Q3", "Drink", 3.0),
        ("Q4", "Drink", 4.0),
        ("Q1", "Food", 10.0),
        ("Q3", "Food", 30.0),
    ];
    for (quarter, family, value) in sales {
        reader.add_fact(
            [
                member(cube, &format!("[Time].[1997].[{}]", quarter)),
                member(cube, &format!("[Product].[{}]", family)),
                member(cube, "[Measures].[Unit Sales]"),
            ],
            value,
        );
    }
    reader
}

fn engine(config: EngineConfig) -> Engine {
    let cube = cube();
    let reader: Arc<dyn CellReader> = Arc::new(facts(&cube));
    Engine::with_config(cube, reader, config).unwrap()
}

fn quarters(engine: &Engine) -> Expression {
    Expression::property(
        Expression::Member(member(engine.cube(), "[Time].[1997]")),
        "Children",
    )
}

fn families(engine: &Engine) -> Expression {
    Expression::property(
        Expression::Hierarchy(engine.cube().hierarchy("[Product]").unwrap().clone()),
        "Members",
    )
}

fn names(value: &Value) -> Vec<Vec<String>> {
    let Value::List(list) = value else {
        panic!("expected a list, got {}", value.kind());
    };
    list.iter()
        .map(|t| t.iter().map(|m| m.name().to_string()).collect())
        .collect()
}

// ============================================================================
// Evaluation
// ============================================================================

#[rstest]
#[case("Sum", 50.0)]
#[case("Avg", 12.5)]
#[case("Median", 7.5)]
fn test_aggregates_over_quarters(#[case] function: &str, #[case] expected: f64) {
    let engine = engine(EngineConfig::default());
    let result = engine
        .evaluate(Expression::function(function, vec![quarters(&engine)]))
        .unwrap();
    assert_eq!(result.value, Value::Double(expected));
}

#[test]
fn test_lazy_set_is_materialized() {
    let engine = engine(EngineConfig::default());
    let query = engine
        .prepare(Expression::function(
            "CrossJoin",
            vec![families(&engine), quarters(&engine)],
        ))
        .unwrap();
    let result = engine.execute(&query).unwrap();
    let tuples = names(&result.value);
    // the All member plus two families, by four quarters
    assert_eq!(tuples.len(), 12);
    assert_eq!(tuples[4], vec!["Drink", "Q1"]);
}

#[test]
fn test_ordered_filter() {
    let engine = engine(EngineConfig::default());
    let food = Expression::Member(member(engine.cube(), "[Product].[Food]"));
    let sales = Expression::Member(member(engine.cube(), "[Measures].[Unit Sales]"));
    let food_sales = Expression::parens(vec![food, sales]);
    let selling = Expression::function(
        "Filter",
        vec![
            quarters(&engine),
            Expression::infix(">", food_sales.clone(), Expression::numeric(0.0)),
        ],
    );
    let ordered = Expression::function(
        "Order",
        vec![selling, food_sales, Expression::symbol("DESC")],
    );
    let result = engine.evaluate(ordered).unwrap();
    assert_eq!(
        names(&result.value),
        vec![vec!["Q3".to_string()], vec!["Q1".to_string()]]
    );
}

#[test]
fn test_batching_reader_needs_a_second_phase() {
    let cube = cube();
    let reader = Arc::new(BatchingCellReader::new(facts(&cube)));
    let engine = Engine::new(cube, reader.clone()).unwrap();
    let query = engine
        .prepare(Expression::function("Sum", vec![quarters(&engine)]))
        .unwrap();

    let first = engine.execute(&query).unwrap();
    assert_eq!(first.value, Value::Double(50.0));
    assert_eq!(first.phases, 2);
    assert_eq!(reader.batch_count(), 1);

    // everything is loaded now
    let second = engine.execute(&query).unwrap();
    assert_eq!(second.phases, 1);
    assert_eq!(query.profile().name, "Sum");
}

#[test]
fn test_parameter_value_overrides_default() {
    let engine = engine(EngineConfig::default());
    let threshold = Arc::new(Parameter::new(
        "Threshold",
        Type::Numeric,
        Literal::Numeric(100.0),
    ));
    let expr = Expression::function(
        "Count",
        vec![Expression::function(
            "Filter",
            vec![
                quarters(&engine),
                Expression::infix(
                    ">",
                    Expression::property(
                        Expression::Member(member(engine.cube(), "[Time].[1997].[Q1]")),
                        "Value",
                    ),
                    Expression::Parameter(threshold),
                ),
            ],
        )],
    );
    let query = engine.prepare(expr).unwrap();

    let by_default = engine.execute(&query).unwrap();
    assert_eq!(by_default.value, Value::Int(0));

    let parameters = HashMap::from([("Threshold".to_string(), Value::Double(5.0))]);
    let supplied = engine
        .execute_with(&query, engine.start_execution(), parameters)
        .unwrap();
    // Q1 sells 11 in total, so every quarter passes
    assert_eq!(supplied.value, Value::Int(4));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_no_matching_overload_reports_expression() {
    let engine = engine(EngineConfig::default());
    let err = engine
        .prepare(Expression::function(
            "Head",
            vec![Expression::string("not a set")],
        ))
        .unwrap_err();
    assert_eq!(err.code(), MDX0101);
    assert!(err.to_string().contains("Head"), "{}", err);
}

#[test]
fn test_result_limit() {
    let engine = engine(EngineConfig::default().with_result_limit(5));
    let query = engine
        .prepare(Expression::function(
            "CrossJoin",
            vec![families(&engine), quarters(&engine)],
        ))
        .unwrap();
    let err = engine.execute(&query).unwrap_err();
    assert_eq!(err.code(), MDX0207);
    assert!(err.to_string().contains("(6)"), "{}", err);
}

#[test]
fn test_cancelled_execution() {
    let engine = engine(EngineConfig::default().with_check_interval(1));
    let query = engine
        .prepare(Expression::function(
            "Filter",
            vec![quarters(&engine), Expression::boolean(true)],
        ))
        .unwrap();
    let execution = engine.start_execution();
    execution.cancellation_handle().cancel();
    let err = engine
        .execute_with(&query, execution, HashMap::new())
        .unwrap_err();
    assert_eq!(err.code(), MDX0204);
}

#[test]
fn test_config_from_json() {
    let cube = cube();
    let reader: Arc<dyn CellReader> = Arc::new(facts(&cube));
    let engine =
        Engine::from_json_config(cube, reader, r#"{ "result_limit": 3, "profiling": false }"#)
            .unwrap();
    assert_eq!(engine.config().result_limit, 3);
    assert!(!engine.config().profiling);
    assert_eq!(engine.config().max_phases, EngineConfig::default().max_phases);
}
