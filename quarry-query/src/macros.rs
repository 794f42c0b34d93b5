//! Shorthand macros for predicate documents and records.
//!
//! # Examples
//!
//! ```rust
//! use quarry_query::{and_filter, filter, or_filter, record};
//!
//! // Simple equality filter
//! let f = filter!(store == 12);
//! assert_eq!(f.len(), 1);
//!
//! // Either condition
//! let f = or_filter!(
//!     filter!(name starts_with "Wid"),
//!     filter!(price < 10)
//! );
//!
//! // Every condition
//! let f = and_filter!(filter!(sku is not null), f);
//! assert_eq!(f.len(), 1);
//!
//! let product = record! { "name" => "Widget", "price" => 9.5 };
//! assert_eq!(product.len(), 2);
//! ```

/// Build a single-entry [`Where`](crate::filter::Where).
///
/// # Syntax
///
/// - `filter!(field == value)` - Equality
/// - `filter!(field != value)` - Not equals
/// - `filter!(field > value)` - Greater than
/// - `filter!(field >= value)` - Greater than or equal
/// - `filter!(field < value)` - Less than
/// - `filter!(field <= value)` - Less than or equal
/// - `filter!(field is null)` - IS NULL
/// - `filter!(field is not null)` - IS NOT NULL
/// - `filter!(field like value)` - ILIKE value
/// - `filter!(field contains value)` - ILIKE %value%
/// - `filter!(field starts_with value)` - ILIKE value%
/// - `filter!(field ends_with value)` - ILIKE %value
/// - `filter!(field in [v1, v2, ...])` - list membership
/// - `filter!(field not in [v1, v2, ...])` - list exclusion
///
/// Camel-case property names are written as-is: `filter!(createdAt > at)`.
#[macro_export]
macro_rules! filter {
    ($field:ident == $value:expr) => {{
        $crate::filter::Where::new().eq(stringify!($field), $value)
    }};

    ($field:ident != $value:expr) => {{
        $crate::filter::Where::new().not(stringify!($field), $value)
    }};

    ($field:ident > $value:expr) => {{
        $crate::filter::Where::new().filter(stringify!($field), $crate::filter::Condition::gt($value))
    }};

    ($field:ident >= $value:expr) => {{
        $crate::filter::Where::new().filter(stringify!($field), $crate::filter::Condition::gte($value))
    }};

    ($field:ident < $value:expr) => {{
        $crate::filter::Where::new().filter(stringify!($field), $crate::filter::Condition::lt($value))
    }};

    ($field:ident <= $value:expr) => {{
        $crate::filter::Where::new().filter(stringify!($field), $crate::filter::Condition::lte($value))
    }};

    ($field:ident is null) => {{
        $crate::filter::Where::new().eq(stringify!($field), $crate::value::Value::Null)
    }};

    ($field:ident is not null) => {{
        $crate::filter::Where::new().not(stringify!($field), $crate::value::Value::Null)
    }};

    ($field:ident like $value:expr) => {{
        $crate::filter::Where::new().filter(stringify!($field), $crate::filter::Condition::like($value))
    }};

    ($field:ident contains $value:expr) => {{
        $crate::filter::Where::new().filter(stringify!($field), $crate::filter::Condition::contains($value))
    }};

    ($field:ident starts_with $value:expr) => {{
        $crate::filter::Where::new().filter(stringify!($field), $crate::filter::Condition::starts_with($value))
    }};

    ($field:ident ends_with $value:expr) => {{
        $crate::filter::Where::new().filter(stringify!($field), $crate::filter::Condition::ends_with($value))
    }};

    ($field:ident in [$($value:expr),* $(,)?]) => {{
        $crate::filter::Where::new().eq(
            stringify!($field),
            $crate::value::Value::List(::std::vec![$($crate::value::Value::from($value)),*]),
        )
    }};

    ($field:ident not in [$($value:expr),* $(,)?]) => {{
        $crate::filter::Where::new().not(
            stringify!($field),
            $crate::value::Value::List(::std::vec![$($crate::value::Value::from($value)),*]),
        )
    }};
}

/// Combine documents with AND.
///
/// ```rust
/// use quarry_query::{and_filter, filter};
///
/// let f = and_filter!(filter!(store == 1), filter!(price > 10));
/// assert_eq!(f.len(), 1);
/// ```
#[macro_export]
macro_rules! and_filter {
    ($($filter:expr),+ $(,)?) => {{
        $crate::filter::Where::new().and([$($filter),+])
    }};
}

/// Combine documents with OR.
///
/// ```rust
/// use quarry_query::{filter, or_filter};
///
/// let f = or_filter!(filter!(name == "Widget"), filter!(name == "Gadget"));
/// assert_eq!(f.len(), 1);
/// ```
#[macro_export]
macro_rules! or_filter {
    ($($filter:expr),+ $(,)?) => {{
        $crate::filter::Where::new().or([$($filter),+])
    }};
}

/// Build a [`Record`](crate::value::Record) from `property => value` pairs.
///
/// ```rust
/// use quarry_query::record;
///
/// let store = record! { "id" => 1, "name" => "Acme" };
/// assert_eq!(store.get("name").and_then(|v| v.as_str()), Some("Acme"));
/// ```
#[macro_export]
macro_rules! record {
    () => {{
        $crate::value::Record::new()
    }};

    ($($property:expr => $value:expr),+ $(,)?) => {{
        $crate::value::Record::new()$(.set($property, $value))+
    }};
}
