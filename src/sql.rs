//! SQL renderer that turns abstract filters into SELECT statements using sea-query.
//!
//! Each relation hop in a filter path becomes an INNER JOIN against the
//! target table, aliased `rel_{n}`; the join convention is that the hop
//! column on the parent table references the target table's `id`.
//!
//! The renderer treats every non-terminal path segment as a relation hop.
//! A lookup alias whose storage path runs through a scalar column (e.g. a
//! date component like `written.year`) renders through the same join
//! convention and will not produce a column transform; schemas targeting
//! this renderer should only alias onto relation-shaped storage paths.

use std::collections::BTreeMap;

use sea_query::{
    Asterisk, Expr, Func, Iden, JoinType, PostgresQueryBuilder, SelectStatement, SimpleExpr,
    Value,
};
use thiserror::Error;

use crate::filter::{Filter, FilterOp, FilterValue};

/// Table identifier for sea-query: the base table or a join alias.
#[derive(Debug, Clone)]
enum TableRef {
    Base(String),
    Joined(usize),
}

impl Iden for TableRef {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        match self {
            TableRef::Base(name) => write!(s, "{}", name).unwrap(),
            TableRef::Joined(idx) => write!(s, "rel_{}", idx).unwrap(),
        }
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
struct ColumnName(String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    fn new(message: String) -> Self {
        Self { message }
    }
}

/// One pending INNER JOIN: `parent.column = rel_{alias}.id`.
#[derive(Debug, Clone)]
struct JoinStep {
    alias: usize,
    parent: TableRef,
    column: String,
}

/// Renders filters into single-statement SELECT queries.
pub struct SqlRenderer {
    table: String,
    case_sensitive_contains: bool,
}

impl SqlRenderer {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            case_sensitive_contains: false,
        }
    }

    /// Make `Contains`/`NotContains` render as a case-sensitive LIKE.
    pub fn case_sensitive_contains(mut self, yes: bool) -> Self {
        self.case_sensitive_contains = yes;
        self
    }

    /// Render a filter into a `SELECT * FROM {table} ...` statement.
    pub fn render(&self, filter: &Filter) -> Result<String, RenderError> {
        let mut select = SelectStatement::new();
        select.column(Asterisk);
        select.from(TableRef::Base(self.table.clone()));

        // Joins are registered while walking the filter, then attached
        let mut joins: BTreeMap<Vec<String>, JoinStep> = BTreeMap::new();
        let condition = self.condition(filter, &mut joins)?;

        for step in joins.values() {
            select.join(
                JoinType::InnerJoin,
                TableRef::Joined(step.alias),
                Expr::col((step.parent.clone(), ColumnName(step.column.clone())))
                    .equals((TableRef::Joined(step.alias), ColumnName("id".to_string()))),
            );
        }

        if !matches!(filter, Filter::Empty) {
            select.and_where(condition);
        }

        Ok(select.to_string(PostgresQueryBuilder))
    }

    fn condition(
        &self,
        filter: &Filter,
        joins: &mut BTreeMap<Vec<String>, JoinStep>,
    ) -> Result<SimpleExpr, RenderError> {
        match filter {
            Filter::Empty => Ok(Expr::val(true).into()),
            Filter::And(children) => self.combine(children, joins, SimpleExpr::and),
            Filter::Or(children) => self.combine(children, joins, SimpleExpr::or),
            Filter::Not(inner) => Ok(self.condition(inner, joins)?.not()),
            Filter::Compare { path, op, value } => self.comparison(path, *op, value, joins),
        }
    }

    fn combine(
        &self,
        children: &[Filter],
        joins: &mut BTreeMap<Vec<String>, JoinStep>,
        merge: fn(SimpleExpr, SimpleExpr) -> SimpleExpr,
    ) -> Result<SimpleExpr, RenderError> {
        let mut compiled = Vec::with_capacity(children.len());
        for child in children {
            compiled.push(self.condition(child, joins)?);
        }
        Ok(compiled
            .into_iter()
            .reduce(merge)
            .unwrap_or_else(|| Expr::val(true).into()))
    }

    /// Resolve a dotted path to a (table, column) pair, registering the
    /// joins for every relation hop along the way.
    fn column_for(
        &self,
        path: &[String],
        joins: &mut BTreeMap<Vec<String>, JoinStep>,
    ) -> Result<(TableRef, ColumnName), RenderError> {
        let Some((column, hops)) = path.split_last() else {
            return Err(RenderError::new("empty filter path".to_string()));
        };

        let mut table = TableRef::Base(self.table.clone());
        let mut prefix = Vec::with_capacity(hops.len());
        for hop in hops {
            prefix.push(hop.clone());
            let next_alias = joins.len() + 1;
            let step = joins.entry(prefix.clone()).or_insert_with(|| JoinStep {
                alias: next_alias,
                parent: table.clone(),
                column: hop.clone(),
            });
            table = TableRef::Joined(step.alias);
        }
        Ok((table, ColumnName(column.clone())))
    }

    fn comparison(
        &self,
        path: &[String],
        op: FilterOp,
        value: &FilterValue,
        joins: &mut BTreeMap<Vec<String>, JoinStep>,
    ) -> Result<SimpleExpr, RenderError> {
        let (table, column) = self.column_for(path, joins)?;
        let col = Expr::col((table, column));

        let expr = match op {
            FilterOp::Eq => col.eq(sql_value(value)?),
            FilterOp::Ne => col.ne(sql_value(value)?),
            FilterOp::Gt => col.gt(sql_value(value)?),
            FilterOp::Gte => col.gte(sql_value(value)?),
            FilterOp::Lt => col.lt(sql_value(value)?),
            FilterOp::Lte => col.lte(sql_value(value)?),
            FilterOp::Contains | FilterOp::NotContains => {
                let FilterValue::Str(needle) = value else {
                    return Err(RenderError::new(format!(
                        "substring match needs a string value, got {:?}",
                        value
                    )));
                };
                let pattern = format!("%{}%", escape_like(needle));
                let matched = if self.case_sensitive_contains {
                    col.like(pattern)
                } else {
                    Expr::expr(Func::lower(col)).like(pattern.to_lowercase())
                };
                if op == FilterOp::NotContains {
                    matched.not()
                } else {
                    matched
                }
            }
            FilterOp::In | FilterOp::NotIn => {
                let FilterValue::List(items) = value else {
                    return Err(RenderError::new(format!(
                        "membership test needs a list value, got {:?}",
                        value
                    )));
                };
                let values = items
                    .iter()
                    .map(sql_value)
                    .collect::<Result<Vec<_>, _>>()?;
                if op == FilterOp::In {
                    col.is_in(values)
                } else {
                    col.is_not_in(values)
                }
            }
            FilterOp::IsNull => col.is_null(),
            FilterOp::IsNotNull => col.is_not_null(),
        };

        Ok(expr)
    }
}

/// Convert a filter value to a sea-query Value
fn sql_value(value: &FilterValue) -> Result<Value, RenderError> {
    match value {
        FilterValue::Str(s) => Ok(Value::String(Some(Box::new(s.clone())))),
        FilterValue::Int(n) => Ok(Value::BigInt(Some(*n))),
        FilterValue::Float(x) => Ok(Value::Double(Some(*x))),
        FilterValue::Bool(b) => Ok(Value::Bool(Some(*b))),
        FilterValue::Null | FilterValue::List(_) => Err(RenderError::new(format!(
            "value {:?} cannot appear in a scalar comparison",
            value
        ))),
    }
}

/// Escape LIKE wildcards so the needle matches literally.
fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
