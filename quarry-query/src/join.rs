//! Join descriptors.

use crate::filter::Where;
use crate::subquery::Subquery;

/// Join flavor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// `INNER JOIN`
    #[default]
    Inner,
    /// `LEFT JOIN`
    Left,
}

impl JoinKind {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// A join to a relation of the queried model.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationJoin {
    /// Relation property.
    pub property: String,
    /// Alias; defaults to the property name.
    pub alias: Option<String>,
    /// Join flavor.
    pub kind: JoinKind,
    /// Extra conditions on the joined model, AND-appended to the ON clause.
    pub on: Option<Where>,
}

impl RelationJoin {
    /// Set the alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add conditions on the joined model.
    pub fn on(mut self, filter: Where) -> Self {
        self.on = Some(match self.on.take() {
            Some(existing) => existing.merge(filter),
            None => filter,
        });
        self
    }

    /// Alias used in SQL.
    pub fn alias_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.property)
    }
}

/// A join to a derived table.
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryJoin {
    /// The derived table.
    pub subquery: Subquery,
    /// Alias; required.
    pub alias: Option<String>,
    /// Join flavor.
    pub kind: JoinKind,
    /// `(base property, subquery column)` equality pairs.
    pub on: Vec<(String, String)>,
}

impl SubqueryJoin {
    /// Set the alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add an equality between a base property and a subquery column.
    pub fn on(mut self, property: impl Into<String>, column: impl Into<String>) -> Self {
        self.on.push((property.into(), column.into()));
        self
    }
}

/// A join descriptor.
///
/// ```rust,ignore
/// repo.find()
///     .join(Join::inner("store").on(Where::new().eq("active", true)))
///     .join(Join::left_subquery(counts).alias("stats").on("id", "product"))
///     .r#where(Where::new().eq("store.name", "Acme"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Join {
    /// Join a relation.
    Relation(RelationJoin),
    /// Join a derived table.
    Subquery(SubqueryJoin),
}

impl Join {
    fn relation(property: impl Into<String>, kind: JoinKind) -> RelationJoin {
        RelationJoin {
            property: property.into(),
            alias: None,
            kind,
            on: None,
        }
    }

    fn derived(subquery: Subquery, kind: JoinKind) -> SubqueryJoin {
        SubqueryJoin {
            subquery,
            alias: None,
            kind,
            on: Vec::new(),
        }
    }

    /// `INNER JOIN` a relation.
    pub fn inner(property: impl Into<String>) -> RelationJoin {
        Self::relation(property, JoinKind::Inner)
    }

    /// `LEFT JOIN` a relation.
    pub fn left(property: impl Into<String>) -> RelationJoin {
        Self::relation(property, JoinKind::Left)
    }

    /// `INNER JOIN` a subquery.
    pub fn inner_subquery(subquery: Subquery) -> SubqueryJoin {
        Self::derived(subquery, JoinKind::Inner)
    }

    /// `LEFT JOIN` a subquery.
    pub fn left_subquery(subquery: Subquery) -> SubqueryJoin {
        Self::derived(subquery, JoinKind::Left)
    }
}

impl From<RelationJoin> for Join {
    fn from(join: RelationJoin) -> Self {
        Self::Relation(join)
    }
}

impl From<SubqueryJoin> for Join {
    fn from(join: SubqueryJoin) -> Self {
        Self::Subquery(join)
    }
}
