//! Predicate documents.
//!
//! A [`Where`] is an ordered list of entries, each a property condition, an
//! `and`/`or` group of nested documents, or an `EXISTS` test against a
//! [`Subquery`]. Top-level entries are AND-combined.
//!
//! ```rust
//! use quarry_query::filter::{Condition, Where};
//!
//! let filter = Where::new()
//!     .eq("store", 12)
//!     .filter("name", Condition::starts_with("Wid"))
//!     .or([
//!         Where::new().filter("price", Condition::lt(10)),
//!         Where::new().eq("onSale", true),
//!     ]);
//! assert_eq!(filter.len(), 3);
//! ```

mod json;

use crate::subquery::Subquery;
use crate::value::Value;

/// A predicate document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    entries: Vec<WhereEntry>,
}

/// One entry of a predicate document.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereEntry {
    /// A condition on a property (or `alias.property`).
    Property {
        /// Property name or dot path.
        path: String,
        /// Condition to apply.
        condition: Condition,
    },
    /// All nested documents must match.
    And(Vec<Where>),
    /// Any nested document must match.
    Or(Vec<Where>),
    /// The subquery returns (or, negated, does not return) rows.
    Exists {
        /// Subquery to test.
        subquery: Box<Subquery>,
        /// `NOT EXISTS` when set.
        negated: bool,
    },
}

/// Pattern match flavor; all are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// Pattern used as given.
    Like,
    /// Value followed by `%`.
    StartsWith,
    /// `%` followed by value.
    EndsWith,
    /// Value wrapped in `%`; JSON containment on JSON columns.
    Contains,
}

impl PatternKind {
    /// Operator name as used in predicate documents.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Contains => "contains",
        }
    }

    /// Wrap a raw value in the wildcards for this flavor.
    pub fn wrap(&self, value: &str) -> String {
        match self {
            Self::Like => value.to_string(),
            Self::StartsWith => format!("{}%", value),
            Self::EndsWith => format!("%{}", value),
            Self::Contains => format!("%{}%", value),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl Comparison {
    /// Parse an operator string. Only the six comparison operators are accepted.
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            _ => None,
        }
    }

    /// SQL operator text.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    /// The operator that holds exactly when this one does not.
    pub fn negate(&self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Gt => Self::Lte,
            Self::Gte => Self::Lt,
            Self::Lt => Self::Gte,
            Self::Lte => Self::Gt,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A bound value.
    Value(Value),
    /// A scalar subquery, typically a single aggregate.
    Subquery(Box<Subquery>),
}

/// A condition on a single property.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equality with a value, membership in a list, or `IS NULL`.
    Equals(Value),
    /// Case-insensitive pattern match (or JSON containment for `Contains`).
    Pattern(PatternKind, Value),
    /// Comparison with a value or a scalar subquery.
    Compare(Comparison, Operand),
    /// Membership in the rows of a subquery.
    In(Box<Subquery>),
    /// Negation of the inner condition.
    Not(Box<Condition>),
    /// Several conditions on the same property, AND-combined.
    All(Vec<Condition>),
}

impl Condition {
    /// Equality (or list membership).
    pub fn equals(value: impl Into<Value>) -> Self {
        Self::Equals(value.into())
    }

    /// Inequality (or list exclusion).
    pub fn not_equals(value: impl Into<Value>) -> Self {
        Self::equals(value).negate()
    }

    /// `ILIKE` with the pattern as given.
    pub fn like(value: impl Into<Value>) -> Self {
        Self::Pattern(PatternKind::Like, value.into())
    }

    /// `ILIKE 'value%'`.
    pub fn starts_with(value: impl Into<Value>) -> Self {
        Self::Pattern(PatternKind::StartsWith, value.into())
    }

    /// `ILIKE '%value'`.
    pub fn ends_with(value: impl Into<Value>) -> Self {
        Self::Pattern(PatternKind::EndsWith, value.into())
    }

    /// `ILIKE '%value%'`, or `@>` on JSON columns.
    pub fn contains(value: impl Into<Value>) -> Self {
        Self::Pattern(PatternKind::Contains, value.into())
    }

    /// `>` value.
    pub fn gt(value: impl Into<Value>) -> Self {
        Self::Compare(Comparison::Gt, Operand::Value(value.into()))
    }

    /// `>=` value.
    pub fn gte(value: impl Into<Value>) -> Self {
        Self::Compare(Comparison::Gte, Operand::Value(value.into()))
    }

    /// `<` value.
    pub fn lt(value: impl Into<Value>) -> Self {
        Self::Compare(Comparison::Lt, Operand::Value(value.into()))
    }

    /// `<=` value.
    pub fn lte(value: impl Into<Value>) -> Self {
        Self::Compare(Comparison::Lte, Operand::Value(value.into()))
    }

    /// Compare against a scalar subquery.
    pub fn compare_subquery(op: Comparison, subquery: Subquery) -> Self {
        Self::Compare(op, Operand::Subquery(Box::new(subquery)))
    }

    /// `IN (subquery)`.
    pub fn in_subquery(subquery: Subquery) -> Self {
        Self::In(Box::new(subquery))
    }

    /// `NOT IN (subquery)`.
    pub fn not_in_subquery(subquery: Subquery) -> Self {
        Self::in_subquery(subquery).negate()
    }

    /// Negate this condition. Negating twice yields the original condition.
    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Combine with another condition on the same property.
    pub fn and(self, other: Condition) -> Self {
        match self {
            Self::All(mut conditions) => {
                conditions.push(other);
                Self::All(conditions)
            }
            first => Self::All(vec![first, other]),
        }
    }
}

impl Where {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality (or list membership) condition.
    pub fn eq(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(path, Condition::equals(value))
    }

    /// Add a negated equality (or list exclusion) condition.
    pub fn not(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(path, Condition::not_equals(value))
    }

    /// Add a condition on a property.
    pub fn filter(mut self, path: impl Into<String>, condition: Condition) -> Self {
        self.entries.push(WhereEntry::Property {
            path: path.into(),
            condition,
        });
        self
    }

    /// Add an `and` group.
    pub fn and(mut self, documents: impl IntoIterator<Item = Where>) -> Self {
        self.entries
            .push(WhereEntry::And(documents.into_iter().collect()));
        self
    }

    /// Add an `or` group.
    pub fn or(mut self, documents: impl IntoIterator<Item = Where>) -> Self {
        self.entries
            .push(WhereEntry::Or(documents.into_iter().collect()));
        self
    }

    /// Require the subquery to return rows.
    pub fn exists(mut self, subquery: Subquery) -> Self {
        self.entries.push(WhereEntry::Exists {
            subquery: Box::new(subquery),
            negated: false,
        });
        self
    }

    /// Require the subquery to return no rows.
    pub fn not_exists(mut self, subquery: Subquery) -> Self {
        self.entries.push(WhereEntry::Exists {
            subquery: Box::new(subquery),
            negated: true,
        });
        self
    }

    /// Append every entry of another document.
    pub fn merge(mut self, other: Where) -> Self {
        self.entries.extend(other.entries);
        self
    }

    /// Entries in order.
    pub fn entries(&self) -> &[WhereEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the document has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<WhereEntry> for Where {
    fn from(entry: WhereEntry) -> Self {
        Self {
            entries: vec![entry],
        }
    }
}

impl FromIterator<WhereEntry> for Where {
    fn from_iter<I: IntoIterator<Item = WhereEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
