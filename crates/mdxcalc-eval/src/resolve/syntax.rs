//! Call syntax and signature flags

use crate::error::ResolutionError;
use mdxcalc_types::DataType;
use std::fmt;

/// How a function is written in a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syntax {
    /// `Name(args)`
    Function,
    /// `arg.Name(args)`
    Method,
    /// `arg.Name`
    Property,
    /// `a op b`
    Infix,
    /// `op a`
    Prefix,
    /// `{ a, b }`
    Braces,
    /// `( a, b )`
    Parentheses,
    /// Generated by the engine, never written
    Internal,
}

impl Syntax {
    /// Parse the leading character of a signature flag string
    pub fn from_flag(flag: char) -> Option<Self> {
        Some(match flag {
            'f' => Self::Function,
            'm' => Self::Method,
            'p' => Self::Property,
            'i' => Self::Infix,
            'P' => Self::Prefix,
            'B' => Self::Braces,
            'T' => Self::Parentheses,
            'I' => Self::Internal,
            _ => return None,
        })
    }

    /// Render a call signature such as `<Numeric> + <Numeric>`
    pub fn signature(self, name: &str, params: &[DataType]) -> String {
        let args: Vec<String> = params.iter().map(|p| format!("<{}>", p.name())).collect();
        match self {
            Self::Function | Self::Internal => format!("{}({})", name, args.join(", ")),
            Self::Method => match args.split_first() {
                Some((obj, rest)) => format!("{}.{}({})", obj, name, rest.join(", ")),
                None => format!("{}()", name),
            },
            Self::Property => match args.first() {
                Some(obj) => format!("{}.{}", obj, name),
                None => name.to_string(),
            },
            Self::Infix => match args.as_slice() {
                [l, r] => format!("{} {} {}", l, name, r),
                _ => format!("{}({})", name, args.join(", ")),
            },
            Self::Prefix => match args.as_slice() {
                [operand] => format!("{} {}", name, operand),
                _ => format!("{}({})", name, args.join(", ")),
            },
            Self::Braces => format!("{{{}}}", args.join(", ")),
            Self::Parentheses => format!("({})", args.join(", ")),
        }
    }

    /// The number of parameters this syntax requires, if fixed
    fn fixed_arity(self) -> Option<usize> {
        match self {
            Self::Infix => Some(2),
            Self::Prefix | Self::Property => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Function => "Function",
            Self::Method => "Method",
            Self::Property => "Property",
            Self::Infix => "Infix",
            Self::Prefix => "Prefix",
            Self::Braces => "Braces",
            Self::Parentheses => "Parentheses",
            Self::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// Parse a parameter or return type letter
pub fn category_from_flag(flag: char) -> Option<DataType> {
    Some(match flag {
        'n' => DataType::Numeric,
        'i' => DataType::Integer,
        's' => DataType::String,
        'b' => DataType::Logical,
        'm' => DataType::Member,
        't' => DataType::Tuple,
        'x' => DataType::Set,
        'l' => DataType::Level,
        'h' => DataType::Hierarchy,
        'd' => DataType::Dimension,
        'y' => DataType::Symbol,
        'v' => DataType::Value,
        'e' => DataType::Empty,
        'U' => DataType::Null,
        _ => return None,
    })
}

/// One overload of a function, decoded from its flag string.
///
/// The flags are a syntax letter, a return type letter and one letter per
/// parameter: `"fnnn"` is a function returning numeric from two numerics,
/// `"pxl"` is a property of a level returning a set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSignature {
    pub name: String,
    pub syntax: Syntax,
    pub return_category: DataType,
    pub parameters: Vec<DataType>,
}

impl FunctionSignature {
    pub fn parse(name: &str, flags: &str) -> Result<Self, ResolutionError> {
        let malformed = |reason: &str| ResolutionError::MalformedSignature {
            name: name.to_string(),
            flags: flags.to_string(),
            reason: reason.to_string(),
        };
        let mut chars = flags.chars();
        let syntax = chars
            .next()
            .and_then(Syntax::from_flag)
            .ok_or_else(|| malformed("missing or unknown syntax flag"))?;
        let return_category = chars
            .next()
            .and_then(category_from_flag)
            .ok_or_else(|| malformed("missing or unknown return type"))?;
        let parameters = chars
            .map(|c| category_from_flag(c).ok_or_else(|| malformed("unknown parameter type")))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(arity) = syntax.fixed_arity() {
            if parameters.len() != arity {
                return Err(malformed(&format!(
                    "{} syntax takes {} parameter(s), {} declared",
                    syntax,
                    arity,
                    parameters.len()
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            syntax,
            return_category,
            parameters,
        })
    }

    pub fn describe(&self) -> String {
        self.syntax.signature(&self.name, &self.parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_parse_flags() {
        let sig = FunctionSignature::parse("+", "innn").unwrap();
        assert_eq!(sig.syntax, Syntax::Infix);
        assert_eq!(sig.return_category, DataType::Numeric);
        assert_eq!(sig.parameters, vec![DataType::Numeric, DataType::Numeric]);
        assert_eq!(sig.describe(), "<Numeric> + <Numeric>");
    }

    #[rstest]
    #[case("Members", "pxl", "<Level>.Members")]
    #[case("Head", "fxxi", "Head(<Set>, <Integer>)")]
    #[case("-", "Pnn", "- <Numeric>")]
    #[case("{}", "Bxm", "{<Member>}")]
    fn test_describe(#[case] name: &str, #[case] flags: &str, #[case] expected: &str) {
        assert_eq!(FunctionSignature::parse(name, flags).unwrap().describe(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("z")]
    #[case("f")]
    #[case("fnq")]
    #[case("innnn")]
    #[case("Pn")]
    fn test_malformed(#[case] flags: &str) {
        assert!(matches!(
            FunctionSignature::parse("Foo", flags),
            Err(ResolutionError::MalformedSignature { .. })
        ));
    }
}
