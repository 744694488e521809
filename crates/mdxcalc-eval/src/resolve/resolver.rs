//! Overload matching
//!
//! A resolver knows every overload of one function name and syntax. Given
//! validated arguments it scores each overload by the total cost of the
//! implicit conversions its parameters need; the cheapest wins. Failing to
//! match is an outcome, not an error.

use crate::error::ResolutionError;
use crate::expr::Expression;
use crate::resolve::{
    CompileFn, Conversion, FunDef, FunctionDefinition, FunctionSignature, ResultTypeFn, Syntax,
};
use crate::validator::Validator;
use mdxcalc_types::{DataType, TypeCoercer};
use std::fmt;
use std::sync::Arc;

/// Result of matching arguments against a resolver's overloads
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Resolved {
        def: Arc<dyn FunctionDefinition>,
        cost: u32,
        /// Conversions the arguments need; empty on an exact match
        conversions: Vec<Conversion>,
    },
    NoMatch,
    /// Several overloads match at the same lowest cost
    Ambiguous { candidates: Vec<String>, cost: u32 },
}

impl ResolveOutcome {
    pub fn cost(&self) -> Option<u32> {
        match self {
            Self::Resolved { cost, .. } | Self::Ambiguous { cost, .. } => Some(*cost),
            Self::NoMatch => None,
        }
    }
}

pub trait FunctionResolver: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn syntax(&self) -> Syntax;

    fn description(&self) -> &str;

    /// Match `args` against this resolver's overloads
    fn resolve(
        &self,
        args: &[Expression],
        validator: &dyn Validator,
    ) -> Result<ResolveOutcome, ResolutionError>;

    /// Whether argument `k` must be scalar, i.e. no overload takes a set there
    fn requires_scalar_expression_on_argument(&self, k: usize) -> bool;

    /// Words accepted as symbol arguments
    fn reserved_words(&self) -> &[&'static str] {
        &[]
    }

    /// Signatures of every overload, for error messages
    fn signatures(&self) -> Vec<String>;
}

/// Score `args` against `params`.
///
/// Returns the total cost and the conversions needed, or `None` if some
/// argument cannot be converted.
pub fn match_parameters(
    params: &[DataType],
    args: &[Expression],
    coercer: &TypeCoercer,
) -> Option<(u32, Vec<Conversion>)> {
    if params.len() != args.len() {
        return None;
    }
    let mut total = 0;
    let mut conversions = Vec::new();
    for (ordinal, (param, arg)) in params.iter().zip(args).enumerate() {
        let from = arg.get_type();
        let category = from.data_type();
        if category == *param {
            continue;
        }
        let cost = coercer.conversion_cost(category, *param)?;
        total += cost;
        conversions.push(Conversion {
            ordinal,
            kind: coercer.categorize_conversion(category, *param),
            from,
            to: *param,
            cost,
        });
    }
    Some((total, conversions))
}

/// Pick the cheapest of `matches`; ties at the lowest cost are ambiguous
pub(crate) fn rank(
    matches: Vec<(Arc<dyn FunctionDefinition>, u32, Vec<Conversion>)>,
) -> ResolveOutcome {
    let Some(best) = matches.iter().map(|(_, cost, _)| *cost).min() else {
        return ResolveOutcome::NoMatch;
    };
    let mut winners: Vec<_> = matches.into_iter().filter(|(_, c, _)| *c == best).collect();
    if winners.len() > 1 {
        return ResolveOutcome::Ambiguous {
            candidates: winners.iter().map(|(d, _, _)| d.signature()).collect(),
            cost: best,
        };
    }
    match winners.pop() {
        Some((def, cost, conversions)) => ResolveOutcome::Resolved {
            def,
            cost,
            conversions,
        },
        None => ResolveOutcome::NoMatch,
    }
}

/// A function with several fixed-arity overloads sharing one compile
/// function; each overload is described by a flag string
#[derive(Debug)]
pub struct MultiResolver {
    name: String,
    description: String,
    syntax: Syntax,
    signatures: Vec<FunctionSignature>,
    compile: CompileFn,
    reserved_words: &'static [&'static str],
    result_type: Option<ResultTypeFn>,
    defs: Vec<Arc<dyn FunctionDefinition>>,
}

impl MultiResolver {
    pub fn new(
        name: &str,
        description: &str,
        flags: &[&str],
        compile: CompileFn,
    ) -> Result<Self, ResolutionError> {
        let signatures = flags
            .iter()
            .map(|f| FunctionSignature::parse(name, f))
            .collect::<Result<Vec<_>, _>>()?;
        let Some(syntax) = signatures.first().map(|s| s.syntax) else {
            return Err(ResolutionError::MalformedSignature {
                name: name.to_string(),
                flags: String::new(),
                reason: "no overloads declared".to_string(),
            });
        };
        if let Some(odd) = signatures.iter().find(|s| s.syntax != syntax) {
            return Err(ResolutionError::MalformedSignature {
                name: name.to_string(),
                flags: flags.join(","),
                reason: format!("overloads mix {} and {} syntax", syntax, odd.syntax),
            });
        }
        let mut resolver = Self {
            name: name.to_string(),
            description: description.to_string(),
            syntax,
            signatures,
            compile,
            reserved_words: &[],
            result_type: None,
            defs: Vec::new(),
        };
        resolver.build_defs();
        Ok(resolver)
    }

    pub fn with_reserved_words(mut self, words: &'static [&'static str]) -> Self {
        self.reserved_words = words;
        self.build_defs();
        self
    }

    pub fn with_result_type(mut self, result_type: ResultTypeFn) -> Self {
        self.result_type = Some(result_type);
        self.build_defs();
        self
    }

    fn build_defs(&mut self) {
        self.defs = self
            .signatures
            .iter()
            .map(|sig| {
                Arc::new(
                    FunDef::new(sig.clone(), &self.description, self.compile)
                        .with_reserved_words(self.reserved_words)
                        .with_result_type(self.result_type),
                ) as Arc<dyn FunctionDefinition>
            })
            .collect();
    }
}

impl FunctionResolver for MultiResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn syntax(&self) -> Syntax {
        self.syntax
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn resolve(
        &self,
        args: &[Expression],
        validator: &dyn Validator,
    ) -> Result<ResolveOutcome, ResolutionError> {
        let coercer = validator.coercer();
        let matches = self
            .defs
            .iter()
            .filter_map(|def| {
                match_parameters(def.parameter_categories(), args, coercer)
                    .map(|(cost, conversions)| (def.clone(), cost, conversions))
            })
            .collect();
        Ok(rank(matches))
    }

    fn requires_scalar_expression_on_argument(&self, k: usize) -> bool {
        !self
            .signatures
            .iter()
            .any(|s| s.parameters.get(k) == Some(&DataType::Set))
    }

    fn reserved_words(&self) -> &[&'static str] {
        self.reserved_words
    }

    fn signatures(&self) -> Vec<String> {
        self.signatures.iter().map(FunctionSignature::describe).collect()
    }
}

/// Decides per call which parameter categories a variadic function takes.
///
/// Returns the categories (one per argument) or `None` if the arguments do
/// not fit.
pub type VariadicMatcher = fn(&[Expression]) -> Option<Vec<DataType>>;

/// A function taking any number of arguments, such as `{ }` and `( )`.
///
/// The matcher picks a parameter list for the actual arguments; a
/// definition is then built for that list and scored like any overload.
#[derive(Debug)]
pub struct VariadicResolver {
    name: String,
    description: String,
    syntax: Syntax,
    return_category: DataType,
    matcher: VariadicMatcher,
    compile: CompileFn,
    result_type: ResultTypeFn,
}

impl VariadicResolver {
    pub fn new(
        name: &str,
        description: &str,
        syntax: Syntax,
        return_category: DataType,
        matcher: VariadicMatcher,
        compile: CompileFn,
        result_type: ResultTypeFn,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            syntax,
            return_category,
            matcher,
            compile,
            result_type,
        }
    }
}

impl FunctionResolver for VariadicResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn syntax(&self) -> Syntax {
        self.syntax
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn resolve(
        &self,
        args: &[Expression],
        validator: &dyn Validator,
    ) -> Result<ResolveOutcome, ResolutionError> {
        let Some(parameters) = (self.matcher)(args) else {
            return Ok(ResolveOutcome::NoMatch);
        };
        let Some((cost, conversions)) =
            match_parameters(&parameters, args, validator.coercer())
        else {
            return Ok(ResolveOutcome::NoMatch);
        };
        let signature = FunctionSignature {
            name: self.name.clone(),
            syntax: self.syntax,
            return_category: self.return_category,
            parameters,
        };
        let def = FunDef::new(signature, &self.description, self.compile)
            .with_result_type(Some(self.result_type));
        Ok(ResolveOutcome::Resolved {
            def: Arc::new(def),
            cost,
            conversions,
        })
    }

    fn requires_scalar_expression_on_argument(&self, _k: usize) -> bool {
        self.syntax != Syntax::Braces
    }

    fn signatures(&self) -> Vec<String> {
        vec![format!("{} ...", self.syntax.signature(&self.name, &[]))]
    }
}
