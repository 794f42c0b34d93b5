//! SQL generation utilities.
//!
//! Identifiers are validated against a strict grammar before being quoted;
//! nothing outside `[A-Za-z_][A-Za-z0-9_]*` is ever interpolated into SQL text.
//! Values never appear in SQL text either: they are accumulated in [`Params`]
//! and referenced by `$n` placeholders.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::{QueryError, QueryResult};
use crate::value::Value;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Check an identifier against the allowed grammar.
pub fn is_valid_identifier(name: &str) -> bool {
    name.len() <= 63 && IDENTIFIER.is_match(name)
}

/// Validate an identifier, returning it unchanged on success.
pub fn validate_identifier(name: &str) -> QueryResult<&str> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(QueryError::invalid_identifier(name))
    }
}

/// Quote an identifier that has already been validated.
pub fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    out.push_str(name);
    out.push('"');
    out
}

/// Validate and quote an identifier.
pub fn quote_identifier(name: &str) -> QueryResult<String> {
    validate_identifier(name).map(quote)
}

/// Positional parameter accumulator.
///
/// Placeholders are numbered in the order values are bound, so fragments must
/// be compiled in the order they appear in the final statement text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: Vec<Value>,
}

impl Params {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder.
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        self.values.push(value.into());
        format!("${}", self.values.len())
    }

    /// Number of bound values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no values are bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the bound values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Take the bound values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// A compiled statement: SQL text plus positionally aligned parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    /// SQL text with `$n` placeholders.
    pub text: String,
    /// Parameters, `parameters[n - 1]` binds `$n`.
    pub parameters: Vec<Value>,
}

impl CompiledStatement {
    /// Create a statement from text and accumulated parameters.
    pub fn new(text: impl Into<String>, params: Params) -> Self {
        Self {
            text: text.into(),
            parameters: params.into_values(),
        }
    }

    /// Get the SQL text.
    pub fn sql(&self) -> &str {
        &self.text
    }

    /// Get the parameters.
    pub fn params(&self) -> &[Value] {
        &self.parameters
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
