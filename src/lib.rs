//! recordql: a small query language over structured record collections.
//!
//! Query text flows through a fixed pipeline: the [`lexer`] turns it into
//! tokens, the [`parser`] builds an AST, the [`validator`] type-checks it
//! against a [`schema::Schema`] and the translator in [`filter`] produces an
//! executor-agnostic filter tree. [`exec`] runs filters over in-memory JSON
//! records; [`sql`] renders them as SELECT statements.

pub mod ast;
pub mod config;
pub mod exec;
pub mod filter;
pub mod lexer;
pub mod parser;
pub mod schema;
pub mod sql;
pub mod token;
pub mod validator;

use serde_json::Value as Json;
use thiserror::Error;

pub use exec::ExecOptions;
pub use filter::Filter;
pub use schema::{FieldType, ModelRegistry, Schema, SchemaField};

/// 流水线任一阶段的失败; 阶段遇到第一个错误即终止, 没有部分成功
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Lex(#[from] lexer::LexError),
    #[error(transparent)]
    Syntax(#[from] parser::ParseError),
    #[error(transparent)]
    Validation(#[from] validator::ValidationError),
}

/// 把查询文本编译为可执行的抽象过滤器
pub fn compile(schema: &Schema, query: &str) -> Result<Filter, QueryError> {
    let expr = parser::parse(query)?;
    let valid = validator::validate(schema, &expr)?;
    Ok(filter::translate(&valid))
}

/// 编译查询并在一组 JSON 记录上执行, 返回匹配的记录
pub fn apply_search(
    schema: &Schema,
    query: &str,
    records: &[Json],
    options: &ExecOptions,
) -> Result<Vec<Json>, QueryError> {
    let filter = compile(schema, query)?;
    Ok(exec::apply(&filter, records, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::library_registry;

    #[test]
    fn test_compile_reports_the_failing_stage() {
        let schema = Schema::new(library_registry(), "book").unwrap();
        assert!(matches!(
            compile(&schema, r#"name = "oops"#),
            Err(QueryError::Lex(_))
        ));
        assert!(matches!(
            compile(&schema, "name = "),
            Err(QueryError::Syntax(_))
        ));
        assert!(matches!(
            compile(&schema, "name = 1"),
            Err(QueryError::Validation(_))
        ));
    }

    #[test]
    fn test_compile_produces_a_filter() {
        let schema = Schema::new(library_registry(), "book").unwrap();
        let filter = compile(&schema, "rating >= 4").unwrap();
        assert!(matches!(filter, Filter::Compare { .. }));
    }
}
