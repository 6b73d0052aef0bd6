//! Abstract filter expressions, the translator's output.
//!
//! A [`Filter`] is a plain data tree an executor interprets: it references
//! resolved storage paths, never a concrete storage API, so any backend that
//! understands "filter by field path, operator, value" can execute it. The
//! tree is serializable for transport between processes.

use serde::{Deserialize, Serialize};

use crate::ast::{CompOp, Operand, Value};
use crate::validator::ValidExpr;

/// Comparison operators in the filter vocabulary.
///
/// `Contains`/`NotContains` mean substring match, never equality; whether the
/// match is case-sensitive is an executor policy. `IsNull`/`IsNotNull` on a
/// relation path test whether the reference is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

/// A plain value carried by a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Placeholder for null tests; executors ignore it.
    Null,
    /// Membership list for `In` / `NotIn`.
    List(Vec<FilterValue>),
}

impl From<&Value> for FilterValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Str(s) => FilterValue::Str(s.clone()),
            Value::Int(n) => FilterValue::Int(*n),
            Value::Float(x) => FilterValue::Float(*x),
            Value::Bool(b) => FilterValue::Bool(*b),
            Value::Null => FilterValue::Null,
        }
    }
}

/// A filter expression tree, isomorphic to the validated AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// No restriction at all (the empty query).
    Empty,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Compare {
        /// Resolved storage path segments, lookup aliases applied.
        path: Vec<String>,
        op: FilterOp,
        value: FilterValue,
    },
}

/// Turn a validated AST into an abstract filter.
///
/// Purely structural: all type checking already happened in the validator.
pub fn translate(expr: &ValidExpr) -> Filter {
    match expr {
        ValidExpr::Everything => Filter::Empty,
        ValidExpr::And(left, right) => Filter::And(vec![translate(left), translate(right)]),
        ValidExpr::Or(left, right) => Filter::Or(vec![translate(left), translate(right)]),
        ValidExpr::Not(inner) => Filter::Not(Box::new(translate(inner))),
        ValidExpr::Comparison { path, op, operand } => {
            let path = path.lookup_parts();
            match operand {
                Operand::Single(literal) if literal.value == Value::Null => {
                    // The validator only lets = and != through for None
                    let op = match op {
                        CompOp::NotEq => FilterOp::IsNotNull,
                        _ => FilterOp::IsNull,
                    };
                    Filter::Compare {
                        path,
                        op,
                        value: FilterValue::Null,
                    }
                }
                Operand::Single(literal) => Filter::Compare {
                    path,
                    op: comp_op(*op),
                    value: FilterValue::from(&literal.value),
                },
                Operand::List(items) => Filter::Compare {
                    path,
                    op: comp_op(*op),
                    value: FilterValue::List(
                        items.iter().map(|lit| FilterValue::from(&lit.value)).collect(),
                    ),
                },
            }
        }
    }
}

fn comp_op(op: CompOp) -> FilterOp {
    match op {
        CompOp::Eq => FilterOp::Eq,
        CompOp::NotEq => FilterOp::Ne,
        CompOp::Gt => FilterOp::Gt,
        CompOp::Gte => FilterOp::Gte,
        CompOp::Lt => FilterOp::Lt,
        CompOp::Lte => FilterOp::Lte,
        CompOp::Contains => FilterOp::Contains,
        CompOp::NotContains => FilterOp::NotContains,
        CompOp::In => FilterOp::In,
        CompOp::NotIn => FilterOp::NotIn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::schema::{library_registry, Schema};
    use crate::validator::validate;

    fn translate_query(query: &str) -> Filter {
        let schema = Schema::new(library_registry(), "book").unwrap();
        let ast = parser::parse(query).unwrap();
        translate(&validate(&schema, &ast).unwrap())
    }

    fn compare(path: &[&str], op: FilterOp, value: FilterValue) -> Filter {
        Filter::Compare {
            path: path.iter().map(|s| s.to_string()).collect(),
            op,
            value,
        }
    }

    #[test]
    fn test_end_to_end_example() {
        let filter = translate_query(r#"author.name ~ "Tolkien" and rating >= 4"#);
        assert_eq!(
            filter,
            Filter::And(vec![
                compare(
                    &["author", "name"],
                    FilterOp::Contains,
                    FilterValue::Str("Tolkien".to_string()),
                ),
                compare(&["rating"], FilterOp::Gte, FilterValue::Int(4)),
            ]),
        );
    }

    #[test]
    fn test_empty_query_translates_to_empty_filter() {
        assert_eq!(translate_query(""), Filter::Empty);
    }

    #[test]
    fn test_relation_null_tests() {
        assert_eq!(
            translate_query("author = None"),
            compare(&["author"], FilterOp::IsNull, FilterValue::Null),
        );
        assert_eq!(
            translate_query("author != None"),
            compare(&["author"], FilterOp::IsNotNull, FilterValue::Null),
        );
    }

    #[test]
    fn test_scalar_null_tests() {
        assert_eq!(
            translate_query("name = None"),
            compare(&["name"], FilterOp::IsNull, FilterValue::Null),
        );
    }

    #[test]
    fn test_in_list() {
        assert_eq!(
            translate_query("written_in_year in [1937, 1954]"),
            compare(
                &["written", "year"], // 别名展开
                FilterOp::In,
                FilterValue::List(vec![FilterValue::Int(1937), FilterValue::Int(1954)]),
            ),
        );
    }

    #[test]
    fn test_not_and_or_structure() {
        let filter = translate_query(r#"not is_published = true or rating < 2"#);
        assert_eq!(
            filter,
            Filter::Or(vec![
                Filter::Not(Box::new(compare(
                    &["is_published"],
                    FilterOp::Eq,
                    FilterValue::Bool(true),
                ))),
                compare(&["rating"], FilterOp::Lt, FilterValue::Int(2)),
            ]),
        );
    }

    #[test]
    fn test_filter_is_serializable() {
        let filter = translate_query("rating >= 4");
        let json = serde_json::to_string(&filter).unwrap();
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(filter, back);
    }
}
