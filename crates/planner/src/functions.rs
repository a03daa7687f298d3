use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arrow_schema::DataType;
use rq_common::{Error, Result};

use crate::logical_plan::Expr;

/// Scalar functions the catalog can bind calls to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    /// Lowercase a string.
    Lower,
    /// Uppercase a string.
    Upper,
    /// Length of a string in bytes.
    Length,
    /// Substring of a string: `substring(str, start[, len])`.
    Substring,
    /// Whether a reference name points at a tag.
    IsTag,
    /// Whether a reference name points at a remote branch.
    IsRemote,
}

impl Func {
    /// Name the function is registered under.
    pub fn name(&self) -> &'static str {
        match self {
            Func::Lower => "lower",
            Func::Upper => "upper",
            Func::Length => "length",
            Func::Substring => "substring",
            Func::IsTag => "is_tag",
            Func::IsRemote => "is_remote",
        }
    }

    /// Value type produced by the function.
    pub fn return_type(&self) -> DataType {
        match self {
            Func::Lower | Func::Upper | Func::Substring => DataType::Utf8,
            Func::Length => DataType::Int64,
            Func::IsTag | Func::IsRemote => DataType::Boolean,
        }
    }
}

/// Builds a resolved function expression from already-resolved arguments.
///
/// Builders validate arity (and argument shape where relevant) and return
/// [`Error::InvalidArgumentCount`] on mismatch; the analyzer passes such
/// errors through verbatim.
pub type FunctionBuilder = Arc<dyn Fn(Vec<Expr>) -> Result<Expr> + Send + Sync>;

/// Name-to-builder registry consulted when resolving function calls.
///
/// Lookup is case-insensitive: names are lowercased on both register and get.
#[derive(Clone)]
pub struct FunctionRegistry {
    builders: HashMap<String, FunctionBuilder>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("builders", &self.builders.len())
            .finish()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Create a registry with every built-in function registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for func in [Func::Lower, Func::Upper, Func::Length, Func::IsTag, Func::IsRemote] {
            registry.register(func.name(), fixed_arity(func, 1));
        }
        registry.register(Func::Substring.name(), substring_builder());
        registry
    }

    /// Register or replace a builder.
    ///
    /// Returns `true` when an existing builder with the same name was
    /// replaced.
    pub fn register(&mut self, name: impl Into<String>, builder: FunctionBuilder) -> bool {
        self.builders
            .insert(name.into().to_ascii_lowercase(), builder)
            .is_some()
    }

    /// Look up a builder by name.
    pub fn get(&self, name: &str) -> Result<FunctionBuilder> {
        self.builders
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))
    }
}

fn fixed_arity(func: Func, arity: usize) -> FunctionBuilder {
    Arc::new(move |args: Vec<Expr>| {
        if args.len() != arity {
            return Err(Error::InvalidArgumentCount {
                function: func.name().to_string(),
                expected: arity.to_string(),
                actual: args.len(),
            });
        }
        Ok(Expr::Function { func, args })
    })
}

fn substring_builder() -> FunctionBuilder {
    Arc::new(|args: Vec<Expr>| {
        if args.len() != 2 && args.len() != 3 {
            return Err(Error::InvalidArgumentCount {
                function: Func::Substring.name().to_string(),
                expected: "2 or 3".to_string(),
                actual: args.len(),
            });
        }
        Ok(Expr::Function {
            func: Func::Substring,
            args,
        })
    })
}
