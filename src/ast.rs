//! 查询语言的抽象语法树

use std::fmt;

use crate::token::Span;

/// 点分隔的字段路径, 例如 `author.country.code`
///
/// 在解析阶段路径是未解析的名字序列, 由校验器根据 Schema 解析
#[derive(Debug, Clone)]
pub struct FieldPath {
    pub parts: Vec<String>,
    pub span: Span,
}

impl FieldPath {
    pub fn new(parts: Vec<String>, span: Span) -> Self {
        Self { parts, span }
    }
}

// 位置信息不参与结构相等比较
impl PartialEq for FieldPath {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

/// 字面量的值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// `None` 关键字
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::Int(n) => write!(f, "{}", n),
            // 保证小数点存在, 使规范文本重新解析后仍是浮点数
            Value::Float(x) if x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "None"),
        }
    }
}

/// 带源码位置的字面量, 位置用于校验错误报告
#[derive(Debug, Clone)]
pub struct Literal {
    pub value: Value,
    pub span: Span,
}

impl Literal {
    pub fn new(value: Value, span: Span) -> Self {
        Self { value, span }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,          // =
    NotEq,       // !=
    Gt,          // >
    Lt,          // <
    Gte,         // >=
    Lte,         // <=
    Contains,    // ~  (子串匹配)
    NotContains, // !~
    In,          // in [...]
    NotIn,       // not in [...]
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompOp::Eq => "=",
            CompOp::NotEq => "!=",
            CompOp::Gt => ">",
            CompOp::Lt => "<",
            CompOp::Gte => ">=",
            CompOp::Lte => "<=",
            CompOp::Contains => "~",
            CompOp::NotContains => "!~",
            CompOp::In => "in",
            CompOp::NotIn => "not in",
        };
        write!(f, "{}", s)
    }
}

/// 比较的右操作数: 单个字面量, 或 in / not in 使用的字面量列表
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Single(Literal),
    List(Vec<Literal>),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Single(lit) => write!(f, "{}", lit),
            Operand::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// AST 的根节点, 代表一个完整的查询表达式树
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// 空查询的特殊根节点: 匹配一切, 不施加任何过滤
    Everything,
    /// 逻辑与运算 (and)
    And(Box<Expr>, Box<Expr>),
    /// 逻辑或运算 (or)
    Or(Box<Expr>, Box<Expr>),
    /// 逻辑非运算 (not)
    Not(Box<Expr>),
    /// 基础比较运算, 表达式树的叶子节点
    Comparison {
        field: FieldPath,
        op: CompOp,
        operand: Operand,
    },
}

impl Expr {
    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expr, right: Expr) -> Expr {
        Expr::Or(Box::new(left), Box::new(right))
    }

    pub fn not(inner: Expr) -> Expr {
        Expr::Not(Box::new(inner))
    }
}

/// 规范文本形式: 逻辑节点全部加括号, 重新解析后结构不变
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Everything => Ok(()),
            Expr::And(l, r) => write!(f, "({} and {})", l, r),
            Expr::Or(l, r) => write!(f, "({} or {})", l, r),
            Expr::Not(inner) => write!(f, "not {}", inner),
            Expr::Comparison { field, op, operand } => {
                write!(f, "{} {} {}", field, op, operand)
            }
        }
    }
}
