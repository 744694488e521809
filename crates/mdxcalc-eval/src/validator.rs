//! Expression validation
//!
//! Validation resolves every `Call` in a tree, bottom-up, against the
//! function table. Arguments are validated first so their types are known
//! when the call's overloads are matched.

use crate::error::ResolutionError;
use crate::expr::{Expression, Parameter, ResolvedFunCall, UnresolvedCall};
use crate::resolve::FunctionTable;
use indexmap::IndexMap;
use mdxcalc_model::Cube;
use mdxcalc_types::TypeCoercer;
use std::sync::Arc;

/// What function resolution needs from the validating context
pub trait Validator {
    fn cube(&self) -> &Arc<Cube>;

    fn coercer(&self) -> &TypeCoercer;

    fn function_table(&self) -> &FunctionTable;

    /// Resolve every call in `expr`
    fn validate(&mut self, expr: Expression) -> Result<Expression, ResolutionError>;
}

/// The standard validator, which also collects the parameters a query uses
#[derive(Debug)]
pub struct ExpValidator {
    cube: Arc<Cube>,
    functions: Arc<FunctionTable>,
    coercer: TypeCoercer,
    parameters: IndexMap<String, Arc<Parameter>>,
}

impl ExpValidator {
    pub fn new(cube: Arc<Cube>, functions: Arc<FunctionTable>) -> Self {
        Self {
            cube,
            functions,
            coercer: TypeCoercer::new(),
            parameters: IndexMap::new(),
        }
    }

    /// Declare a parameter; redeclaring one with another type is an error
    pub fn define_parameter(&mut self, parameter: Arc<Parameter>) -> Result<(), ResolutionError> {
        match self.parameters.get(&parameter.name) {
            Some(existing) if existing.ty != parameter.ty => Err(ResolutionError::TypeMismatch {
                context: format!("parameter {}", parameter.name),
                expected: existing.ty.to_string(),
                found: parameter.ty.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.parameters.insert(parameter.name.clone(), parameter);
                Ok(())
            }
        }
    }

    pub fn parameter(&self, name: &str) -> Result<&Arc<Parameter>, ResolutionError> {
        self.parameters
            .get(name)
            .ok_or_else(|| ResolutionError::UnknownParameter {
                name: name.to_string(),
            })
    }

    /// Parameters in the order they were first seen
    pub fn parameters(&self) -> impl Iterator<Item = &Arc<Parameter>> {
        self.parameters.values()
    }

    fn resolve_call(&mut self, call: UnresolvedCall) -> Result<Expression, ResolutionError> {
        let UnresolvedCall { name, syntax, args } = call;
        let mut args = args
            .into_iter()
            .map(|a| self.validate(a))
            .collect::<Result<Vec<_>, _>>()?;

        let def = self
            .functions
            .resolve_call(&name, syntax, &mut args, &*self)?;

        for word in args.iter().filter_map(Expression::as_symbol) {
            if !def
                .reserved_words()
                .iter()
                .any(|w| w.eq_ignore_ascii_case(word))
            {
                return Err(ResolutionError::InvalidSymbol {
                    name: def.name().to_string(),
                    word: word.to_string(),
                });
            }
        }

        let ty = def.result_type(&args);
        Ok(Expression::Resolved(ResolvedFunCall { def, args, ty }))
    }
}

impl Validator for ExpValidator {
    fn cube(&self) -> &Arc<Cube> {
        &self.cube
    }

    fn coercer(&self) -> &TypeCoercer {
        &self.coercer
    }

    fn function_table(&self) -> &FunctionTable {
        &self.functions
    }

    fn validate(&mut self, expr: Expression) -> Result<Expression, ResolutionError> {
        match expr {
            Expression::Call(call) => self.resolve_call(call),
            Expression::Parameter(p) => {
                self.define_parameter(p.clone())?;
                Ok(Expression::Parameter(p))
            }
            Expression::Coerce { expr, to, kind } => Ok(Expression::Coerce {
                expr: Box::new(self.validate(*expr)?),
                to,
                kind,
            }),
            Expression::Resolved(mut call) => {
                call.args = call
                    .args
                    .into_iter()
                    .map(|a| self.validate(a))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expression::Resolved(call))
            }
            other => Ok(other),
        }
    }
}
