//! Query preparation and execution
//!
//! The engine validates and compiles an expression once, then executes the
//! compiled calc tree as often as needed. Every execution runs in phases:
//! a phase evaluates the tree with a fresh evaluator, and is repeated after
//! the cell reader loads whatever the previous phase queued.

use indexmap::IndexMap;
use mdxcalc_diagnostics::{MDX0400, MdxError, Result};
use mdxcalc_eval::timing::TimingStat;
use mdxcalc_eval::{
    CalcRef, CalcResult, CalculationProfile, EngineConfig, Evaluator,
    ExpCompiler, ExpValidator, Execution, Expression, FunctionTable, Parameter, PhaseLoop,
    QueryTiming, Validator, Value, dependent_hierarchies,
};
use mdxcalc_model::{CellReader, Cube};
use mdxcalc_types::Type;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Name of the timing mark covering one evaluation phase
const EXECUTE_MARK: &str = "execute";

/// Validates, compiles and executes expressions against one cube
pub struct Engine {
    cube: Arc<Cube>,
    reader: Arc<dyn CellReader>,
    config: Arc<EngineConfig>,
    functions: Arc<FunctionTable>,
    running: Mutex<Vec<Weak<Execution>>>,
}

impl Engine {
    /// Create an engine with the default configuration and built-in functions
    pub fn new(cube: Arc<Cube>, reader: Arc<dyn CellReader>) -> Result<Self> {
        Self::with_config(cube, reader, EngineConfig::default())
    }

    pub fn with_config(
        cube: Arc<Cube>,
        reader: Arc<dyn CellReader>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let functions = FunctionTable::builtin()?;
        log::debug!(
            "engine for cube {} with {} function resolvers",
            cube.name(),
            functions.len()
        );
        Ok(Self {
            cube,
            reader,
            config: Arc::new(config),
            functions: Arc::new(functions),
            running: Mutex::new(Vec::new()),
        })
    }

    /// Create an engine from a JSON configuration document
    pub fn from_json_config(
        cube: Arc<Cube>,
        reader: Arc<dyn CellReader>,
        json: &str,
    ) -> Result<Self> {
        Self::with_config(cube, reader, EngineConfig::from_json(json)?)
    }

    /// Replace the function table, e.g. with one holding extra functions
    pub fn with_functions(mut self, functions: FunctionTable) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    pub fn cube(&self) -> &Arc<Cube> {
        &self.cube
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Validate and compile an expression
    pub fn prepare(&self, expr: Expression) -> Result<PreparedQuery> {
        self.prepare_with_parameters(expr, Vec::new())
    }

    /// Validate and compile an expression, declaring `parameters` first
    pub fn prepare_with_parameters(
        &self,
        expr: Expression,
        parameters: Vec<Parameter>,
    ) -> Result<PreparedQuery> {
        let text = expr.to_string();
        let mut validator = ExpValidator::new(self.cube.clone(), self.functions.clone());
        for parameter in parameters {
            validator
                .define_parameter(Arc::new(parameter))
                .map_err(|e| MdxError::from(e).with_context(text.clone()))?;
        }
        let expression = validator
            .validate(expr)
            .map_err(|e| MdxError::from(e).with_context(text.clone()))?;
        let calc = ExpCompiler::new(self.cube.clone(), self.config.clone())
            .compile(&expression)
            .map_err(|e| MdxError::from(e).with_context(text.clone()))?;
        let dependencies = dependent_hierarchies(calc.as_ref(), &self.cube)
            .iter()
            .map(|h| h.unique_name().to_string())
            .collect();
        log::debug!("prepared {} as {} ({})", text, calc.name(), calc.result_style());
        Ok(PreparedQuery {
            text,
            expression,
            calc,
            dependencies,
        })
    }

    /// Register a new execution, which can be cancelled through its handle
    /// or by `cancel_all`
    pub fn start_execution(&self) -> Arc<Execution> {
        let execution = Arc::new(Execution::new(self.config.query_timeout()));
        let mut running = self.running.lock();
        running.retain(|e| e.strong_count() > 0);
        running.push(Arc::downgrade(&execution));
        execution
    }

    /// Cancel every execution still running; returns how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let running = self.running.lock();
        let mut cancelled = 0;
        for execution in running.iter().filter_map(Weak::upgrade) {
            execution.cancel();
            cancelled += 1;
        }
        cancelled
    }

    /// Execute a prepared query with no parameter values
    pub fn execute(&self, query: &PreparedQuery) -> Result<QueryResult> {
        self.execute_with(query, self.start_execution(), HashMap::new())
    }

    /// Execute a prepared query under `execution`.
    ///
    /// A lazily produced set is materialized before it is returned.
    pub fn execute_with(
        &self,
        query: &PreparedQuery,
        execution: Arc<Execution>,
        parameters: HashMap<String, Value>,
    ) -> Result<QueryResult> {
        let mut timing = QueryTiming::new();
        let outcome = PhaseLoop::new(self.config.max_phases)
            .run(self.reader.as_ref(), || {
                let mut evaluator =
                    Evaluator::new(self.cube.clone(), self.reader.clone(), self.config.clone())
                        .with_execution(execution.clone())
                        .with_parameters(parameters.clone());
                evaluator.timing_mut().mark_start(EXECUTE_MARK);
                let value = query
                    .calc
                    .evaluate(&mut evaluator)
                    .and_then(|v| materialize(v, &evaluator));
                evaluator.timing_mut().mark_end(EXECUTE_MARK);
                timing.merge(evaluator.timing());
                value
            })
            .map_err(|e| MdxError::from(e).with_context(query.text.clone()))?;
        log::debug!("executed {} in {} phase(s)", query.text, outcome.phases);
        Ok(QueryResult {
            value: outcome.value,
            phases: outcome.phases,
            timing,
            profile: query.calc.calculation_profile(),
        })
    }

    /// Prepare and execute in one step
    pub fn evaluate(&self, expr: Expression) -> Result<QueryResult> {
        let query = self.prepare(expr)?;
        self.execute(&query)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("cube", &self.cube.name())
            .field("config", &self.config)
            .field("functions", &self.functions.len())
            .finish()
    }
}

fn materialize(value: Value, evaluator: &Evaluator) -> CalcResult<Value> {
    match value {
        Value::Iterable(iterable) => Ok(Value::list(
            evaluator
                .collections()
                .materialize(iterable.as_ref(), evaluator)?,
        )),
        other => Ok(other),
    }
}

/// A validated and compiled expression
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    text: String,
    expression: Expression,
    calc: CalcRef,
    dependencies: Vec<String>,
}

impl PreparedQuery {
    /// The expression as written, before validation
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The validated expression
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn calc(&self) -> &CalcRef {
        &self.calc
    }

    pub fn result_type(&self) -> &Type {
        self.calc.get_type()
    }

    /// Unique names of the hierarchies whose current member can change the
    /// result
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn depends_on(&self, hierarchy: &str) -> bool {
        self.dependencies.iter().any(|h| h == hierarchy)
    }

    /// Profile of every execution of this query so far
    pub fn profile(&self) -> CalculationProfile {
        self.calc.calculation_profile()
    }
}

/// Outcome of one execution
#[derive(Debug)]
pub struct QueryResult {
    pub value: Value,
    /// Number of evaluation phases, at least 1
    pub phases: usize,
    pub timing: QueryTiming,
    /// Profile of the calc tree, cumulative over the query's executions
    pub profile: CalculationProfile,
}

impl QueryResult {
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            phases: self.phases,
            timing: self.timing.stats().clone(),
            profile: self.profile.clone(),
        }
    }
}

/// Serializable execution statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueryStats {
    pub phases: usize,
    pub timing: IndexMap<String, TimingStat>,
    pub profile: CalculationProfile,
}

impl QueryStats {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            MdxError::system(MDX0400, format!("Cannot serialize query statistics: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdxcalc_model::{CubeBuilder, DimensionType, InMemoryCellReader};
    use pretty_assertions::assert_eq;

    fn engine(config: EngineConfig) -> Engine {
        let mut b = CubeBuilder::new("Sales");
        b.dimension("Store", DimensionType::Standard);
        b.hierarchy("Store", None, true, &["State"]).unwrap();
        b.member("[Store]", None, "CA").unwrap();
        b.member("[Store]", None, "WA").unwrap();
        b.measure("Unit Sales").unwrap();
        let cube = b.build().unwrap();

        let mut reader = InMemoryCellReader::new();
        for (store, value) in [("[Store].[CA]", 4.0), ("[Store].[WA]", 6.0)] {
            reader.add_fact(
                [
                    cube.lookup_member(store).unwrap().clone(),
                    cube.lookup_member("[Measures].[Unit Sales]").unwrap().clone(),
                ],
                value,
            );
        }
        Engine::with_config(cube, Arc::new(reader), config).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut b = CubeBuilder::new("Empty");
        b.measure("Count").unwrap();
        let cube = b.build().unwrap();
        let config = EngineConfig::default().with_max_phases(0);
        let err = Engine::with_config(cube, Arc::new(InMemoryCellReader::new()), config)
            .unwrap_err();
        assert!(err.to_string().contains("max_phases"), "{}", err);
    }

    #[test]
    fn test_execute_records_timing_and_profile() {
        let engine = engine(EngineConfig::default());
        let result = engine
            .evaluate(Expression::infix(
                "+",
                Expression::integer(1),
                Expression::integer(2),
            ))
            .unwrap();
        assert_eq!(result.value, Value::Int(3));
        assert_eq!(result.phases, 1);
        assert_eq!(result.timing.get(EXECUTE_MARK).map(|s| s.count), Some(1));
        assert_eq!(result.profile.call_count, 1);
    }

    #[test]
    fn test_stats_serialize() {
        let engine = engine(EngineConfig::default());
        let result = engine.evaluate(Expression::integer(7)).unwrap();
        let json = result.stats().to_json().unwrap();
        assert!(json.contains("\"phases\": 1"), "{}", json);
        assert!(json.contains("\"execute\""), "{}", json);
    }

    #[test]
    fn test_cancel_all_reaches_running_executions() {
        let engine = engine(EngineConfig::default());
        let first = engine.start_execution();
        let second = engine.start_execution();
        drop(second);
        assert_eq!(engine.cancel_all(), 1);
        assert!(first.is_cancelled());
    }

    #[test]
    fn test_dependencies() {
        let engine = engine(EngineConfig::default());
        let constant = engine.prepare(Expression::numeric(1.0)).unwrap();
        assert!(constant.dependencies().is_empty());

        let ca = engine.cube().lookup_member("[Store].[CA]").unwrap().clone();
        let cell = engine
            .prepare(Expression::property(Expression::Member(ca), "Value"))
            .unwrap();
        assert!(!cell.depends_on("[Store]"));
        assert!(cell.depends_on("[Measures]"));
    }
}
