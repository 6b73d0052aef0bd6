//! 校验器: 按 Schema 对 AST 做类型检查, 并把字段路径解析为 (实体, 字段) 序列
//!
//! 校验按深度优先、从左到右进行, 遇到第一个问题立即终止并返回错误,
//! 不做部分成功: `is_published = true and gav < 2` 整体失败,
//! 即使左侧单独校验是合法的。

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::ast::{CompOp, Expr, Literal, Operand, Value};
use crate::schema::{FieldResolutionError, FieldType, ResolvedPath, Schema};
use crate::token::Span;

/// 校验错误的种类
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationErrorKind {
    /// 字段或实体无法解析
    #[error(transparent)]
    Resolution(#[from] FieldResolutionError),
    /// 字面量与字段类型不兼容 (包括畸形的日期字符串)
    #[error("{0}")]
    ValueType(String),
    /// 运算符对该字段类型不合法
    #[error("{0}")]
    Operator(String),
}

/// 校验错误: 种类 + 出错处的源码位置
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} (at offset {})", span.start)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub span: Span,
}

impl ValidationError {
    fn value_type(span: Span, message: String) -> Self {
        Self {
            kind: ValidationErrorKind::ValueType(message),
            span,
        }
    }

    fn operator(span: Span, message: String) -> Self {
        Self {
            kind: ValidationErrorKind::Operator(message),
            span,
        }
    }
}

/// 校验后的表达式树, 与输入 AST 同构, 每个比较都带解析后的字段路径
#[derive(Debug, Clone, PartialEq)]
pub enum ValidExpr {
    Everything,
    And(Box<ValidExpr>, Box<ValidExpr>),
    Or(Box<ValidExpr>, Box<ValidExpr>),
    Not(Box<ValidExpr>),
    Comparison {
        path: ResolvedPath,
        op: CompOp,
        operand: Operand,
    },
}

/// 对 AST 做整体校验, 路径从 Schema 的当前实体出发解析
pub fn validate(schema: &Schema, expr: &Expr) -> Result<ValidExpr, ValidationError> {
    match expr {
        Expr::Everything => Ok(ValidExpr::Everything),
        Expr::And(left, right) => Ok(ValidExpr::And(
            Box::new(validate(schema, left)?),
            Box::new(validate(schema, right)?),
        )),
        Expr::Or(left, right) => Ok(ValidExpr::Or(
            Box::new(validate(schema, left)?),
            Box::new(validate(schema, right)?),
        )),
        Expr::Not(inner) => Ok(ValidExpr::Not(Box::new(validate(schema, inner)?))),
        Expr::Comparison { field, op, operand } => {
            let path = schema
                .resolve(schema.current_model(), &field.parts)
                .map_err(|e| ValidationError {
                    kind: e.into(),
                    span: field.span,
                })?;
            check_operand(&path, *op, operand)?;
            Ok(ValidExpr::Comparison {
                path,
                op: *op,
                operand: operand.clone(),
            })
        }
    }
}

fn check_operand(path: &ResolvedPath, op: CompOp, operand: &Operand) -> Result<(), ValidationError> {
    match operand {
        // 解析器保证列表只与 in / not in 搭配; 每个元素独立检查
        Operand::List(items) => items.iter().try_for_each(|item| check_literal(path, op, item)),
        Operand::Single(literal) => check_literal(path, op, literal),
    }
}

fn check_literal(path: &ResolvedPath, op: CompOp, literal: &Literal) -> Result<(), ValidationError> {
    let terminal = path.terminal();

    // None 可以与任何字段比较 (对关系字段即"引用是否存在"),
    // 但只允许 = 和 !=
    if literal.value == Value::Null {
        return if matches!(op, CompOp::Eq | CompOp::NotEq) {
            Ok(())
        } else {
            Err(ValidationError::operator(
                literal.span,
                "None can only be compared with = or !=".to_string(),
            ))
        };
    }

    match &terminal.field_type {
        FieldType::Relation(_) => Err(ValidationError::value_type(
            literal.span,
            format!(
                "Relation field '{}' can only be compared to None",
                terminal.name
            ),
        )),
        FieldType::Str => {
            if !matches!(literal.value, Value::Str(_)) {
                return Err(ValidationError::value_type(
                    literal.span,
                    format!("Expected a string value for field '{}'", terminal.name),
                ));
            }
            Ok(())
        }
        FieldType::Num => {
            if !matches!(literal.value, Value::Int(_) | Value::Float(_)) {
                return Err(ValidationError::value_type(
                    literal.span,
                    format!("Expected a numeric value for field '{}'", terminal.name),
                ));
            }
            reject_contains(op, FieldType::Num.tag(), literal.span)
        }
        FieldType::Bool => {
            if !matches!(literal.value, Value::Bool(_)) {
                return Err(ValidationError::value_type(
                    literal.span,
                    format!("Expected true or false for field '{}'", terminal.name),
                ));
            }
            // 布尔字段不支持大小比较
            if matches!(op, CompOp::Gt | CompOp::Lt | CompOp::Gte | CompOp::Lte) {
                return Err(ValidationError::operator(
                    literal.span,
                    format!("Operator '{}' is not supported for bool fields", op),
                ));
            }
            reject_contains(op, FieldType::Bool.tag(), literal.span)
        }
        ftype @ (FieldType::Date | FieldType::DateTime) => {
            let Value::Str(text) = &literal.value else {
                return Err(ValidationError::value_type(
                    literal.span,
                    format!(
                        "Expected a quoted date/time string for field '{}'",
                        terminal.name
                    ),
                ));
            };
            if !is_valid_timestamp(text) {
                return Err(ValidationError::value_type(
                    literal.span,
                    format!("Invalid date/time value: \"{}\"", text),
                ));
            }
            reject_contains(op, ftype.tag(), literal.span)
        }
    }
}

/// 子串匹配只对字符串字段有意义
fn reject_contains(op: CompOp, type_tag: &str, span: Span) -> Result<(), ValidationError> {
    if matches!(op, CompOp::Contains | CompOp::NotContains) {
        return Err(ValidationError::operator(
            span,
            format!("Operator '{}' is not supported for {} fields", op, type_tag),
        ));
    }
    Ok(())
}

/// 封闭的日期格式集合, 整值匹配: 仅日期、日期+时分、日期+时分秒。
/// 部分或含糊的格式 (裸小时、12小时制后缀) 一律拒绝
fn is_valid_timestamp(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M").is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").is_ok()
}
