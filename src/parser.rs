//! 查询语言的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ 输入为空 → Expr::Everything ("匹配一切"的特殊根节点)
//!   └─ parse_or() (递归下降解析)
//!        ├─ parse_and()
//!        │    ├─ parse_not()
//!        │    │    └─ parse_primary()
//!        │    │         ├─ "(" → 分组表达式 (递归调用 parse_or)
//!        │    │         └─ 字段路径 → parse_comparison()
//!        │    │              ├─ in / not in → 括号列表 (至少一个元素)
//!        │    │              └─ 比较运算符 → 单个字面量
//!        │    │
//!        │    └─ 遇到 and 时，继续解析右侧 NOT 表达式
//!        │
//!        └─ 遇到 or 时，继续解析右侧 AND 表达式
//! ```
//!
//! ## 语法优先级（从高到低）
//!
//! 1. **括号分组** `(expression)`
//! 2. **NOT操作** `not expression`
//! 3. **比较操作** `field > value`, `field in [...]`
//! 4. **AND操作** `expr1 and expr2`
//! 5. **OR操作** `expr1 or expr2`
//!
//! 每个 token 恰好被消费一次, 结尾必须是 `Eof`, 否则解析失败。

use thiserror::Error;

use crate::ast::{CompOp, Expr, FieldPath, Literal, Operand, Value};
use crate::token::{Span, Token, TokenKind};

/// 语法错误: 说明期望的结构以及意外 token 的位置
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self {
            message,
            span: Some(span),
        }
    }
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&Token> {
        if self.position < self.tokens.len() {
            let token = &self.tokens[self.position];
            self.position += 1;
            Some(token)
        } else {
            None
        }
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: &TokenKind) -> Result<&Token, ParseError> {
        if let Some(token) = self.peek() {
            if std::mem::discriminant(&token.kind) == std::mem::discriminant(expected) {
                Ok(self.advance().unwrap())
            } else {
                Err(ParseError::at_position(
                    format!("Expected {:?}, found {:?}", expected, token.kind),
                    token.span,
                ))
            }
        } else {
            Err(ParseError::new(
                format!("Expected {:?}, but reached end of input", expected),
                None,
            ))
        }
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    /// 解析整个查询, 消费全部 token
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        // 空查询解析为特殊的"匹配一切"根节点, 下游据此跳过过滤
        if self.match_token(&TokenKind::Eof) {
            self.advance();
            return Ok(Expr::Everything);
        }

        let expr = self.parse_or_expression()?;
        self.expect(&TokenKind::Eof)?;
        Ok(expr)
    }

    /// 解析OR表达式 (最低优先级)
    ///
    /// 语法: `and_expr (or and_expr)*`
    fn parse_or_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expression()?;

        while self.match_token(&TokenKind::Or) {
            self.advance(); // 消费 or
            let right = self.parse_and_expression()?;
            left = Expr::or(left, right);
        }

        Ok(left)
    }

    /// 解析AND表达式 (中等优先级)
    ///
    /// 语法: `not_expr (and not_expr)*`
    fn parse_and_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_expression()?;

        while self.match_token(&TokenKind::And) {
            self.advance(); // 消费 and
            let right = self.parse_not_expression()?;
            left = Expr::and(left, right);
        }

        Ok(left)
    }

    /// 解析NOT表达式 (较高优先级)
    ///
    /// 语法: `not* primary_expr`, 允许 not 链式调用
    fn parse_not_expression(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&TokenKind::Not) {
            self.advance(); // 消费 not
            let expr = self.parse_not_expression()?;
            Ok(Expr::not(expr))
        } else {
            self.parse_primary_expression()
        }
    }

    /// 解析基础表达式 (最高优先级): 括号分组或比较
    fn parse_primary_expression(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&TokenKind::LParen) {
            self.advance(); // 消费 (
            let expr = self.parse_or_expression()?;
            self.expect(&TokenKind::RParen)?;
            return Ok(expr);
        }
        self.parse_comparison()
    }

    /// 解析比较: `field_path op literal` 或 `field_path [not] in [literal, ...]`
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let field_token = self.expect(&TokenKind::Name(String::new()))?;
        let field = if let TokenKind::Name(name) = &field_token.kind {
            FieldPath::new(
                name.split('.').map(str::to_string).collect(),
                field_token.span,
            )
        } else {
            unreachable!("expect() guarantees a Name token");
        };

        if let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::In => {
                    self.advance(); // 消费 in
                    let values = self.parse_value_list()?;
                    Ok(Expr::Comparison {
                        field,
                        op: CompOp::In,
                        operand: Operand::List(values),
                    })
                }
                TokenKind::Not => {
                    self.advance(); // 消费 not
                    self.expect(&TokenKind::In)?;
                    let values = self.parse_value_list()?;
                    Ok(Expr::Comparison {
                        field,
                        op: CompOp::NotIn,
                        operand: Operand::List(values),
                    })
                }
                kind => {
                    let op = match kind {
                        TokenKind::Eq => CompOp::Eq,
                        TokenKind::NotEq => CompOp::NotEq,
                        TokenKind::Gt => CompOp::Gt,
                        TokenKind::Lt => CompOp::Lt,
                        TokenKind::Gte => CompOp::Gte,
                        TokenKind::Lte => CompOp::Lte,
                        TokenKind::Contains => CompOp::Contains,
                        TokenKind::NotContains => CompOp::NotContains,
                        _ => {
                            return Err(ParseError::at_position(
                                format!("Expected comparison operator, found {:?}", kind),
                                token.span,
                            ));
                        }
                    };
                    self.advance(); // 消费运算符
                    let literal = self.parse_literal()?;
                    Ok(Expr::Comparison {
                        field,
                        op,
                        operand: Operand::Single(literal),
                    })
                }
            }
        } else {
            Err(ParseError::new(
                "Expected comparison operator, but reached end of input".to_string(),
                None,
            ))
        }
    }

    /// 解析括号列表 `[literal, literal, ...]`, 至少需要一个元素
    fn parse_value_list(&mut self) -> Result<Vec<Literal>, ParseError> {
        let open = self.expect(&TokenKind::LBracket)?.span;

        if self.match_token(&TokenKind::RBracket) {
            return Err(ParseError::at_position(
                "List requires at least one value".to_string(),
                open,
            ));
        }

        let mut values = vec![self.parse_literal()?];
        while self.match_token(&TokenKind::Comma) {
            self.advance(); // 消费逗号
            values.push(self.parse_literal()?);
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(values)
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        if let Some(token) = self.advance() {
            let value = match &token.kind {
                TokenKind::Str(s) => Value::Str(s.clone()),
                TokenKind::Int(n) => Value::Int(*n),
                TokenKind::Float(x) => Value::Float(*x),
                TokenKind::Bool(b) => Value::Bool(*b),
                TokenKind::Null => Value::Null,
                kind => {
                    return Err(ParseError::at_position(
                        format!("Expected literal value, found {:?}", kind),
                        token.span,
                    ));
                }
            };
            Ok(Literal::new(value, token.span))
        } else {
            Err(ParseError::new(
                "Expected literal value, but reached end of input".to_string(),
                None,
            ))
        }
    }
}

/// 便捷入口: 词法分析 + 语法分析
pub fn parse(input: &str) -> Result<Expr, crate::QueryError> {
    let tokens = crate::lexer::Lexer::tokenize(input)?;
    let expr = Parser::new(&tokens).parse()?;
    Ok(expr)
}
