//! In-memory filter executor over JSON records.
//!
//! Filters are evaluated against `serde_json::Value` documents: dotted paths
//! descend into nested objects and fan out over arrays, so a to-many relation
//! matches when any of its elements does. This is the reference executor for
//! the abstract filter contract; storage backends implement their own.

use serde_json::Value as Json;

use crate::filter::{Filter, FilterOp, FilterValue};

/// Maximum nesting depth for filter evaluation, a guard against
/// pathological input blowing the stack.
const MAX_FILTER_DEPTH: usize = 64;

/// Executor policy knobs.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Whether `Contains`/`NotContains` match case-sensitively.
    /// The reference behavior is case-insensitive.
    pub case_sensitive_contains: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            case_sensitive_contains: false,
        }
    }
}

/// Keep the records that pass the filter.
pub fn apply(filter: &Filter, records: &[Json], options: &ExecOptions) -> Vec<Json> {
    records
        .iter()
        .filter(|record| matches(filter, record, options))
        .cloned()
        .collect()
}

/// Evaluate the filter against one record.
///
/// A filter nested deeper than the depth bound matches nothing. The
/// decision is made once, up front; truncating mid-recursion would let
/// enclosing `Not` nodes negate the cutoff value.
pub fn matches(filter: &Filter, record: &Json, options: &ExecOptions) -> bool {
    if deeper_than(filter, MAX_FILTER_DEPTH) {
        return false;
    }
    eval(filter, record, options)
}

/// Depth check with recursion bounded by the limit itself.
fn deeper_than(filter: &Filter, limit: usize) -> bool {
    if limit == 0 {
        return true;
    }
    match filter {
        Filter::Empty | Filter::Compare { .. } => false,
        Filter::And(children) | Filter::Or(children) => {
            children.iter().any(|c| deeper_than(c, limit - 1))
        }
        Filter::Not(inner) => deeper_than(inner, limit - 1),
    }
}

fn eval(filter: &Filter, record: &Json, options: &ExecOptions) -> bool {
    match filter {
        Filter::Empty => true,
        Filter::And(children) => children.iter().all(|c| eval(c, record, options)),
        Filter::Or(children) => children.iter().any(|c| eval(c, record, options)),
        Filter::Not(inner) => !eval(inner, record, options),
        Filter::Compare { path, op, value } => compare(record, path, *op, value, options),
    }
}

/// Collect every value reachable through the path; arrays fan out.
fn lookup<'a>(value: &'a Json, path: &[String], out: &mut Vec<&'a Json>) {
    match value {
        Json::Array(items) => {
            for item in items {
                lookup(item, path, out);
            }
        }
        _ if path.is_empty() => out.push(value),
        Json::Object(map) => {
            // path 非空在上一个分支排除
            let (head, rest) = (&path[0], &path[1..]);
            if let Some(next) = map.get(head.as_str()) {
                lookup(next, rest, out);
            }
        }
        _ => {}
    }
}

fn compare(
    record: &Json,
    path: &[String],
    op: FilterOp,
    expected: &FilterValue,
    options: &ExecOptions,
) -> bool {
    let mut candidates = Vec::new();
    lookup(record, path, &mut candidates);

    match op {
        // Absent references count as null
        FilterOp::IsNull => candidates.is_empty() || candidates.iter().all(|v| v.is_null()),
        FilterOp::IsNotNull => candidates.iter().any(|v| !v.is_null()),
        _ => candidates
            .iter()
            .any(|actual| compare_value(actual, op, expected, options)),
    }
}

fn compare_value(actual: &Json, op: FilterOp, expected: &FilterValue, options: &ExecOptions) -> bool {
    match op {
        FilterOp::Eq => values_equal(actual, expected),
        FilterOp::Ne => !values_equal(actual, expected),
        FilterOp::Gt => matches!(ordering(actual, expected), Some(std::cmp::Ordering::Greater)),
        FilterOp::Gte => matches!(
            ordering(actual, expected),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        ),
        FilterOp::Lt => matches!(ordering(actual, expected), Some(std::cmp::Ordering::Less)),
        FilterOp::Lte => matches!(
            ordering(actual, expected),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        ),
        FilterOp::Contains => contains(actual, expected, options),
        FilterOp::NotContains => !contains(actual, expected, options),
        FilterOp::In => match expected {
            FilterValue::List(items) => items.iter().any(|item| values_equal(actual, item)),
            _ => false,
        },
        FilterOp::NotIn => match expected {
            FilterValue::List(items) => !items.iter().any(|item| values_equal(actual, item)),
            _ => false,
        },
        // Null tests are handled before candidate comparison
        FilterOp::IsNull | FilterOp::IsNotNull => false,
    }
}

fn values_equal(actual: &Json, expected: &FilterValue) -> bool {
    match expected {
        FilterValue::Str(s) => actual.as_str() == Some(s.as_str()),
        FilterValue::Int(n) => actual.as_f64() == Some(*n as f64),
        FilterValue::Float(x) => actual.as_f64() == Some(*x),
        FilterValue::Bool(b) => actual.as_bool() == Some(*b),
        FilterValue::Null => actual.is_null(),
        FilterValue::List(_) => false,
    }
}

/// Numbers compare numerically; strings lexicographically, which is
/// correct for the accepted ISO date/time formats.
fn ordering(actual: &Json, expected: &FilterValue) -> Option<std::cmp::Ordering> {
    match expected {
        FilterValue::Int(n) => actual.as_f64()?.partial_cmp(&(*n as f64)),
        FilterValue::Float(x) => actual.as_f64()?.partial_cmp(x),
        FilterValue::Str(s) => Some(actual.as_str()?.cmp(s.as_str())),
        _ => None,
    }
}

fn contains(actual: &Json, expected: &FilterValue, options: &ExecOptions) -> bool {
    let (Some(haystack), FilterValue::Str(needle)) = (actual.as_str(), expected) else {
        return false;
    };
    if options.case_sensitive_contains {
        haystack.contains(needle.as_str())
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{library_registry, Schema};
    use serde_json::json;

    fn books() -> Vec<Json> {
        vec![
            json!({
                "name": "The Hobbit",
                "rating": 4.7,
                "is_published": true,
                "written": "1937-09-21",
                "author": {"name": "J. R. R. Tolkien", "country": {"code": "GB"}},
            }),
            json!({
                "name": "Unfinished draft",
                "rating": 2,
                "is_published": false,
                "written": "2001-01-01",
                "author": null,
            }),
            json!({
                "name": "Good Omens",
                "rating": 4.5,
                "is_published": true,
                "written": "1990-05-01",
                // 多作者: 数组在路径遍历时展开
                "author": [
                    {"name": "Terry Pratchett", "country": {"code": "GB"}},
                    {"name": "Neil Gaiman", "country": {"code": "GB"}},
                ],
            }),
        ]
    }

    fn search(query: &str) -> Vec<String> {
        let schema = Schema::new(library_registry(), "book").unwrap();
        let found =
            crate::apply_search(&schema, query, &books(), &ExecOptions::default()).unwrap();
        found
            .iter()
            .map(|b| b["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_empty_query_returns_everything() {
        assert_eq!(
            search(""),
            vec!["The Hobbit", "Unfinished draft", "Good Omens"]
        );
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(
            search(r#"author.name ~ "Tolkien" and rating >= 4"#),
            vec!["The Hobbit"]
        );
        assert_eq!(search("rating >= 4 and is_published = true").len(), 2);
        assert_eq!(search("rating < 3 or rating > 4.6"), vec![
            "The Hobbit",
            "Unfinished draft"
        ]);
    }

    #[test]
    fn test_contains_is_case_insensitive_by_default() {
        assert_eq!(search(r#"name ~ "hobbit""#), vec!["The Hobbit"]);
    }

    #[test]
    fn test_contains_case_sensitive_option() {
        let schema = Schema::new(library_registry(), "book").unwrap();
        let options = ExecOptions {
            case_sensitive_contains: true,
        };
        let found = crate::apply_search(&schema, r#"name ~ "hobbit""#, &books(), &options).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_relation_null_checks() {
        assert_eq!(search("author = None"), vec!["Unfinished draft"]);
        assert_eq!(search("author != None"), vec!["The Hobbit", "Good Omens"]);
    }

    #[test]
    fn test_array_relation_fans_out() {
        assert_eq!(search(r#"author.name = "Neil Gaiman""#), vec!["Good Omens"]);
    }

    #[test]
    fn test_in_and_not_in() {
        assert_eq!(
            search(r#"author.country.code in ["GB", "IE"]"#),
            vec!["The Hobbit", "Good Omens"]
        );
        assert_eq!(search("rating not in [2]"), vec!["The Hobbit", "Good Omens"]);
    }

    #[test]
    fn test_date_ordering() {
        assert_eq!(
            search(r#"written > "1950-01-01""#),
            vec!["Unfinished draft", "Good Omens"]
        );
    }

    #[test]
    fn test_not_expression() {
        assert_eq!(search("not is_published = true"), vec!["Unfinished draft"]);
    }

    #[test]
    fn test_missing_field_never_matches() {
        // draft 的 author 为 null, 路径查不到值
        assert_eq!(
            search(r#"author.name = "J. R. R. Tolkien""#),
            vec!["The Hobbit"]
        );
    }

    fn nested_not(levels: usize) -> Filter {
        let mut filter = Filter::Compare {
            path: vec!["rating".to_string()],
            op: FilterOp::Gt,
            value: FilterValue::Int(0),
        };
        for _ in 0..levels {
            filter = Filter::Not(Box::new(filter));
        }
        filter
    }

    #[test]
    fn test_depth_guard() {
        // 超过深度上限的过滤器直接判不匹配, 不会栈溢出
        let record = json!({"rating": 5});
        assert!(!matches(&nested_not(200), &record, &ExecOptions::default()));
    }

    #[test]
    fn test_depth_guard_unaffected_by_negation_parity() {
        // 深度判定在进入递归之前一次完成: 奇数层 not 包裹
        // 不会把截断值翻转成匹配
        let record = json!({"rating": 5});
        assert!(!matches(&nested_not(201), &record, &ExecOptions::default()));
        assert!(!matches(&nested_not(202), &record, &ExecOptions::default()));
    }

    #[test]
    fn test_nesting_within_limit_evaluates_normally() {
        let record = json!({"rating": 5});
        // rating > 0 为真; 偶数层 not 保持, 奇数层取反
        assert!(matches(&nested_not(8), &record, &ExecOptions::default()));
        assert!(!matches(&nested_not(9), &record, &ExecOptions::default()));
    }
}
