//! INSERT statements with conflict handling.

use indexmap::IndexMap;

use crate::compiler::{Scope, compile_where};
use crate::error::{QueryError, QueryResult};
use crate::filter::Where;
use crate::metadata::{ColumnMetadata, ModelMetadata, ModelRegistry};
use crate::sql::{CompiledStatement, Params};
use crate::value::{Record, Value};

use super::{Returning, dml_values, now, returning_sql};

/// Action taken when an insert hits a unique constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictAction {
    /// `DO NOTHING`.
    Ignore,
    /// `DO UPDATE SET`.
    Merge {
        /// Properties to overwrite; `None` means every inserted column that is
        /// not a conflict target or immutable.
        columns: Option<Vec<String>>,
        /// Optional condition on the existing row.
        filter: Option<Where>,
    },
}

/// `ON CONFLICT` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct OnConflict {
    /// Properties forming the conflict target.
    pub targets: Vec<String>,
    /// Predicate for partial unique indexes.
    pub target_where: Option<Where>,
    /// What to do on conflict.
    pub action: ConflictAction,
}

impl OnConflict {
    /// `ON CONFLICT (...) DO NOTHING`.
    pub fn ignore<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            target_where: None,
            action: ConflictAction::Ignore,
        }
    }

    /// `ON CONFLICT (...) DO UPDATE SET ...` over the default column set.
    pub fn merge<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            target_where: None,
            action: ConflictAction::Merge {
                columns: None,
                filter: None,
            },
        }
    }

    /// Restrict the merge to these properties. An empty list degrades to `DO NOTHING`.
    pub fn merge_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.action = match self.action {
            ConflictAction::Merge { filter, .. } => ConflictAction::Merge {
                columns: Some(list),
                filter,
            },
            ConflictAction::Ignore => ConflictAction::Merge {
                columns: Some(list),
                filter: None,
            },
        };
        self
    }

    /// Only merge rows matching this predicate.
    pub fn merge_where(mut self, filter: Where) -> Self {
        self.action = match self.action {
            ConflictAction::Merge { columns, .. } => ConflictAction::Merge {
                columns,
                filter: Some(filter),
            },
            ConflictAction::Ignore => ConflictAction::Merge {
                columns: None,
                filter: Some(filter),
            },
        };
        self
    }

    /// Predicate for a partial unique index target.
    pub fn target_where(mut self, filter: Where) -> Self {
        self.target_where = Some(filter);
        self
    }
}

/// Options for [`compile_insert`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOptions {
    /// RETURNING columns.
    pub returning: Returning,
    /// Conflict handling.
    pub on_conflict: Option<OnConflict>,
}

/// Compile a single- or multi-row INSERT.
///
/// Parameters are numbered column-major: all rows of the first column, then
/// all rows of the second, and so on. Cells a row does not supply render as
/// `DEFAULT`.
pub fn compile_insert(
    registry: &ModelRegistry,
    model: &ModelMetadata,
    records: &[Record],
    options: &InsertOptions,
) -> QueryResult<CompiledStatement> {
    if records.is_empty() {
        return Err(QueryError::empty_statement(&model.name, "insert"));
    }

    let scope = Scope::new(registry, model);
    let rows = records
        .iter()
        .map(|record| row_values(&scope, record))
        .collect::<QueryResult<Vec<_>>>()?;

    let columns: Vec<&ColumnMetadata> = model
        .columns()
        .filter(|c| rows.iter().any(|row| row.contains_key(c.property_name.as_str())))
        .collect();
    if columns.is_empty() {
        return Err(QueryError::empty_statement(&model.name, "insert"));
    }

    let mut params = Params::new();
    let mut cells: Vec<Vec<String>> = vec![Vec::with_capacity(columns.len()); rows.len()];
    for column in &columns {
        for (row, rendered) in rows.iter().zip(cells.iter_mut()) {
            rendered.push(match row.get(column.property_name.as_str()) {
                Some(value) => params.bind(value.clone()),
                None => "DEFAULT".to_string(),
            });
        }
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ",
        model.qualified_table(),
        columns.iter().map(|c| c.quoted()).collect::<Vec<_>>().join(",")
    );
    let tuples: Vec<String> = cells.iter().map(|row| format!("({})", row.join(","))).collect();
    sql.push_str(&tuples.join(","));

    if let Some(on_conflict) = &options.on_conflict {
        sql.push_str(&conflict_sql(&scope, &columns, on_conflict, &mut params)?);
    }

    sql.push_str(&returning_sql(&scope, &options.returning)?);
    Ok(CompiledStatement::new(sql, params))
}

/// Values for one row, with defaults, timestamps and required checks applied.
fn row_values<'m>(scope: &Scope<'m>, record: &Record) -> QueryResult<IndexMap<&'m str, Value>> {
    let model = scope.model;
    let mut row: IndexMap<&str, Value> = dml_values(scope, record)?
        .into_iter()
        .map(|(column, value)| (column.property_name.as_str(), value))
        .collect();

    for column in model.columns() {
        let property = column.property_name.as_str();
        if row.contains_key(property) {
            continue;
        }
        let value = if column.created_at || column.updated_at {
            Some(now())
        } else if column.version {
            Some(Value::Int(1))
        } else {
            column.default.as_ref().map(|default| default.resolve())
        };
        match value {
            Some(value) => {
                row.insert(property, value);
            }
            None if column.required && !column.primary_key => {
                return Err(QueryError::required_field_missing(&model.name, property));
            }
            None => {}
        }
    }
    Ok(row)
}

fn conflict_sql(
    scope: &Scope<'_>,
    inserted: &[&ColumnMetadata],
    on_conflict: &OnConflict,
    params: &mut Params,
) -> QueryResult<String> {
    let model = scope.model;
    let targets = on_conflict
        .targets
        .iter()
        .map(|property| scope.column(property))
        .collect::<QueryResult<Vec<_>>>()?;
    if targets.is_empty() {
        return Err(QueryError::invalid_model(
            &model.name,
            "ON CONFLICT requires at least one target property",
        ));
    }

    let mut sql = format!(
        " ON CONFLICT ({})",
        targets.iter().map(|c| c.quoted()).collect::<Vec<_>>().join(",")
    );
    if let Some(filter) = &on_conflict.target_where {
        if let Some(condition) = compile_where(scope, filter, params)? {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }
    }

    let (columns, filter) = match &on_conflict.action {
        ConflictAction::Ignore => {
            sql.push_str(" DO NOTHING");
            return Ok(sql);
        }
        ConflictAction::Merge { columns, filter } => (columns, filter),
    };

    let merged: Vec<&ColumnMetadata> = match columns {
        Some(properties) => properties
            .iter()
            .map(|property| scope.column(property))
            .filter(|column| !column.as_ref().is_ok_and(|c| c.version))
            .collect::<QueryResult<_>>()?,
        None => inserted
            .iter()
            .copied()
            .filter(|c| {
                !c.primary_key
                    && !c.created_at
                    && !c.version
                    && !targets.iter().any(|t| t.property_name == c.property_name)
            })
            .collect(),
    };
    if merged.is_empty() {
        sql.push_str(" DO NOTHING");
        return Ok(sql);
    }

    let mut assignments: Vec<String> = merged
        .iter()
        .map(|c| format!("{}=EXCLUDED.{}", c.quoted(), c.quoted()))
        .collect();
    if let Some(version) = model.version_column() {
        assignments.push(format!("{}={}+1", version.quoted(), version.quoted()));
    }
    sql.push_str(" DO UPDATE SET ");
    sql.push_str(&assignments.join(","));

    if let Some(filter) = filter {
        let qualified = scope.clone().qualified();
        if let Some(condition) = compile_where(&qualified, filter, params)? {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }
    }
    Ok(sql)
}
