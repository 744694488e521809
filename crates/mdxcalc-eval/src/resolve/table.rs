//! The function table

use crate::error::ResolutionError;
use crate::expr::Expression;
use crate::resolve::{FunctionDefinition, FunctionResolver, ResolveOutcome, Syntax};
use crate::validator::Validator;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Every resolver known to the engine, keyed by upper-cased name and syntax
#[derive(Debug, Default)]
pub struct FunctionTable {
    resolvers: HashMap<(String, Syntax), Vec<Arc<dyn FunctionResolver>>>,
    reserved_words: HashSet<String>,
}

impl FunctionTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the built-in functions
    pub fn builtin() -> Result<Self, ResolutionError> {
        let mut table = Self::new();
        crate::funs::register_all(&mut table)?;
        log::debug!("function table built with {} entries", table.len());
        Ok(table)
    }

    pub fn register(&mut self, resolver: impl FunctionResolver + 'static) {
        self.register_arc(Arc::new(resolver));
    }

    pub fn register_arc(&mut self, resolver: Arc<dyn FunctionResolver>) {
        for word in resolver.reserved_words() {
            self.reserved_words.insert(word.to_ascii_uppercase());
        }
        let key = (resolver.name().to_ascii_uppercase(), resolver.syntax());
        self.resolvers.entry(key).or_default().push(resolver);
    }

    /// Resolvers registered for a name and syntax
    pub fn lookup(&self, name: &str, syntax: Syntax) -> &[Arc<dyn FunctionResolver>] {
        self.resolvers
            .get(&(name.to_ascii_uppercase(), syntax))
            .map_or(&[], Vec::as_slice)
    }

    pub fn is_reserved_word(&self, word: &str) -> bool {
        self.reserved_words.contains(&word.to_ascii_uppercase())
    }

    /// Number of (name, syntax) entries
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Whether argument `k` of the named function must be scalar
    pub fn requires_scalar_expression_on_argument(
        &self,
        name: &str,
        syntax: Syntax,
        k: usize,
    ) -> bool {
        let resolvers = self.lookup(name, syntax);
        !resolvers.is_empty()
            && resolvers
                .iter()
                .all(|r| r.requires_scalar_expression_on_argument(k))
    }

    /// Bind a call to the cheapest matching overload.
    ///
    /// The winner's conversions are checked, then applied to `args` in
    /// place. A tie at the lowest cost, whether inside one resolver or
    /// across resolvers, is an ambiguity error.
    pub fn resolve_call(
        &self,
        name: &str,
        syntax: Syntax,
        args: &mut [Expression],
        validator: &dyn Validator,
    ) -> Result<Arc<dyn FunctionDefinition>, ResolutionError> {
        let resolvers = self.lookup(name, syntax);
        if resolvers.is_empty() {
            return Err(ResolutionError::UnknownFunction {
                name: name.to_string(),
                syntax: syntax.to_string(),
            });
        }

        let outcomes = resolvers
            .iter()
            .map(|r| r.resolve(args, validator))
            .collect::<Result<Vec<_>, _>>()?;
        let signature = || {
            let categories: Vec<_> = args.iter().map(|a| a.get_type().data_type()).collect();
            syntax.signature(name, &categories)
        };

        let Some(best) = outcomes.iter().filter_map(ResolveOutcome::cost).min() else {
            return Err(ResolutionError::NoMatchingOverload {
                name: name.to_string(),
                signature: signature(),
            });
        };

        let mut winner = None;
        let mut candidates = Vec::new();
        for outcome in outcomes {
            match outcome {
                ResolveOutcome::Resolved {
                    def,
                    cost,
                    conversions,
                } if cost == best => {
                    candidates.push(def.signature());
                    winner = Some((def, conversions));
                }
                ResolveOutcome::Ambiguous {
                    candidates: tied,
                    cost,
                } if cost == best => candidates.extend(tied),
                _ => {}
            }
        }
        if candidates.len() > 1 {
            log::debug!("call {} is ambiguous at cost {}", signature(), best);
            return Err(ResolutionError::AmbiguousOverload {
                name: name.to_string(),
                signature: signature(),
                candidates,
            });
        }
        let Some((def, conversions)) = winner else {
            return Err(ResolutionError::NoMatchingOverload {
                name: name.to_string(),
                signature: signature(),
            });
        };

        for conversion in &conversions {
            conversion.check_valid()?;
        }
        for conversion in &conversions {
            conversion.apply(args)?;
        }
        log::debug!(
            "resolved {} to {} with {} conversion(s), cost {}",
            name,
            def.signature(),
            conversions.len(),
            best
        );
        Ok(def)
    }
}
