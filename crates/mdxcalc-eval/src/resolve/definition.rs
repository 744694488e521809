//! Function definitions

use crate::calc::CalcRef;
use crate::compiler::ExpCompiler;
use crate::error::CalcResult;
use crate::expr::{Expression, ResolvedFunCall};
use crate::resolve::{FunctionSignature, Syntax};
use mdxcalc_types::{DataType, MemberScope, Type};
use std::fmt;

/// Builds the calc for one resolved call
pub type CompileFn = fn(&ResolvedFunCall, &ExpCompiler) -> CalcResult<CalcRef>;

/// Derives a call's result type from its (converted) arguments
pub type ResultTypeFn = fn(&[Expression]) -> Type;

/// A single overload a call can be bound to
pub trait FunctionDefinition: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn syntax(&self) -> Syntax;

    fn return_category(&self) -> DataType;

    fn parameter_categories(&self) -> &[DataType];

    /// Reserved words accepted as symbol arguments
    fn reserved_words(&self) -> &[&'static str] {
        &[]
    }

    /// The result type of a call with these arguments
    fn result_type(&self, args: &[Expression]) -> Type {
        default_result_type(self.return_category(), args)
    }

    fn compile_call(&self, call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef>;

    /// Human readable signature, e.g. `Head(<Set>, <Integer>)`
    fn signature(&self) -> String {
        self.syntax().signature(self.name(), self.parameter_categories())
    }
}

/// Scope of a dimensional type
pub(crate) fn scope_of(ty: &Type) -> MemberScope {
    match ty {
        Type::Member(s) | Type::Level(s) | Type::Hierarchy(s) | Type::Dimension(s) => s.clone(),
        Type::Set(element) => scope_of(element),
        _ => MemberScope::unknown(),
    }
}

/// Result type derived from the return category and the first argument.
///
/// A function returning members or sets of members inherits the hierarchy
/// of its first dimensional argument; `Parent` of a `[Time]` member is a
/// `[Time]` member.
pub fn default_result_type(return_category: DataType, args: &[Expression]) -> Type {
    let first = args.first().map(Expression::get_type);
    match return_category {
        DataType::Member => Type::member(first.as_ref().map(scope_of).unwrap_or_default()),
        DataType::Set => match first {
            Some(ty @ Type::Set(_)) => ty,
            Some(Type::Tuple(scopes)) => Type::set(Type::Tuple(scopes)),
            Some(ty) => Type::set(Type::member(scope_of(&ty))),
            None => Type::set(Type::any_member()),
        },
        DataType::Tuple => Type::tuple(args.iter().map(|a| scope_of(&a.get_type()))),
        DataType::Level => Type::Level(first.as_ref().map(scope_of).unwrap_or_default()),
        DataType::Hierarchy => Type::Hierarchy(first.as_ref().map(scope_of).unwrap_or_default()),
        other => Type::from_data_type(other),
    }
}

/// A function definition built from a signature and a compile function
pub struct FunDef {
    signature: FunctionSignature,
    description: String,
    reserved_words: &'static [&'static str],
    compile: CompileFn,
    result_type: Option<ResultTypeFn>,
}

impl FunDef {
    pub fn new(signature: FunctionSignature, description: &str, compile: CompileFn) -> Self {
        Self {
            signature,
            description: description.to_string(),
            reserved_words: &[],
            compile,
            result_type: None,
        }
    }

    pub fn with_reserved_words(mut self, words: &'static [&'static str]) -> Self {
        self.reserved_words = words;
        self
    }

    pub fn with_result_type(mut self, result_type: Option<ResultTypeFn>) -> Self {
        self.result_type = result_type;
        self
    }

    pub fn function_signature(&self) -> &FunctionSignature {
        &self.signature
    }
}

impl fmt::Debug for FunDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunDef")
            .field("signature", &self.signature.describe())
            .field("return", &self.signature.return_category)
            .finish_non_exhaustive()
    }
}

impl FunctionDefinition for FunDef {
    fn name(&self) -> &str {
        &self.signature.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn syntax(&self) -> Syntax {
        self.signature.syntax
    }

    fn return_category(&self) -> DataType {
        self.signature.return_category
    }

    fn parameter_categories(&self) -> &[DataType] {
        &self.signature.parameters
    }

    fn reserved_words(&self) -> &[&'static str] {
        self.reserved_words
    }

    fn result_type(&self, args: &[Expression]) -> Type {
        match self.result_type {
            Some(f) => f(args),
            None => default_result_type(self.return_category(), args),
        }
    }

    fn compile_call(&self, call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
        (self.compile)(call, compiler)
    }
}
