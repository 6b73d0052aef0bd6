//! 查询语言的词法分析器
//!
//! 把原始查询文本切分为带位置信息的 token 流, 流总是以 `Eof` 结束。
//! 词法分析是无状态的: 对同一输入重复调用 [`Lexer::tokenize`] 产生相同结果。

use thiserror::Error;

use crate::token::{Span, Token, TokenKind};

/// 词法错误, 携带出错位置的字节偏移
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("malformed number '{text}' at offset {offset}")]
    MalformedNumber { text: String, offset: usize },
}

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 一次性把整个输入切分为 token 流, 以 `Eof` 结尾
    pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回下一个位置的字符，不推进位置
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, Span::new(start, self.position))
    }

    /// 读取数字字面量, 整数或小数, 符号已由调用者消费
    fn read_number(&mut self, start: usize) -> Result<Token, LexError> {
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == '.' && !is_float && self.peek_next().is_some_and(|d| d.is_ascii_digit())
            {
                is_float = true;
                self.bump();
            } else {
                break;
            }
        }

        // 数字后紧跟字母、下划线或第二个小数点都是畸形字面量, 如 `12.`、`1x`、`1.2.3`
        if let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                let end = self.position + c.len_utf8();
                return Err(LexError::MalformedNumber {
                    text: self.input[start..end].to_string(),
                    offset: start,
                });
            }
        }

        let text = &self.input[start..self.position];
        let kind = if is_float {
            match text.parse::<f64>() {
                Ok(x) => TokenKind::Float(x),
                Err(_) => {
                    return Err(LexError::MalformedNumber {
                        text: text.to_string(),
                        offset: start,
                    })
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => TokenKind::Int(n),
                // i64 放不下的整数退化为浮点数
                Err(_) => match text.parse::<f64>() {
                    Ok(x) => TokenKind::Float(x),
                    Err(_) => {
                        return Err(LexError::MalformedNumber {
                            text: text.to_string(),
                            offset: start,
                        })
                    }
                },
            }
        };
        Ok(self.token(kind, start))
    }

    /// 读取双引号包围的字符串字面量, 支持 `\"` 转义
    /// 注意：开始的引号已经被调用者消费
    fn read_string(&mut self, start: usize) -> Result<Token, LexError> {
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedString { offset: start }),
                Some('"') => {
                    self.bump();
                    return Ok(self.token(TokenKind::Str(value), start));
                }
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        Some('"') => {
                            value.push('"');
                            self.bump();
                        }
                        // 只有引号参与转义, 其余反斜杠按字面保留
                        Some(_) => value.push('\\'),
                        None => return Err(LexError::UnterminatedString { offset: start }),
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
    }

    /// 读取一个标识符片段 (字母、数字、下划线)
    fn read_segment(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 读取裸词: 点分隔的字段路径作为单个 Name token;
    /// 不含点号的整词才做关键字匹配 (大小写敏感)
    fn read_name(&mut self, start: usize) -> Token {
        self.read_segment();
        let mut dotted = false;
        while self.peek() == Some('.')
            && self
                .peek_next()
                .is_some_and(|c| c.is_alphabetic() || c == '_')
        {
            dotted = true;
            self.bump(); // 消费 '.'
            self.read_segment();
        }

        let text = &self.input[start..self.position];
        let kind = if dotted {
            TokenKind::Name(text.to_string())
        } else {
            match text {
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                "in" => TokenKind::In,
                "true" => TokenKind::Bool(true),
                "false" => TokenKind::Bool(false),
                "None" => TokenKind::Null,
                _ => TokenKind::Name(text.to_string()),
            }
        };
        self.token(kind, start)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let start = self.position;

        let Some(c) = self.peek() else {
            return Ok(self.token(TokenKind::Eof, start));
        };

        match c {
            '(' => {
                self.bump();
                Ok(self.token(TokenKind::LParen, start))
            }
            ')' => {
                self.bump();
                Ok(self.token(TokenKind::RParen, start))
            }
            '[' => {
                self.bump();
                Ok(self.token(TokenKind::LBracket, start))
            }
            ']' => {
                self.bump();
                Ok(self.token(TokenKind::RBracket, start))
            }
            ',' => {
                self.bump();
                Ok(self.token(TokenKind::Comma, start))
            }
            '=' => {
                self.bump();
                Ok(self.token(TokenKind::Eq, start))
            }
            '~' => {
                self.bump();
                Ok(self.token(TokenKind::Contains, start))
            }
            '!' => {
                self.bump();
                // 最长匹配: '!' 必须跟 '=' 或 '~'
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        Ok(self.token(TokenKind::NotEq, start))
                    }
                    Some('~') => {
                        self.bump();
                        Ok(self.token(TokenKind::NotContains, start))
                    }
                    _ => Err(LexError::UnexpectedChar {
                        ch: '!',
                        offset: start,
                    }),
                }
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(self.token(TokenKind::Gte, start))
                } else {
                    Ok(self.token(TokenKind::Gt, start))
                }
            }
            '<' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(self.token(TokenKind::Lte, start))
                } else {
                    Ok(self.token(TokenKind::Lt, start))
                }
            }
            '"' => {
                self.bump(); // 消费开始引号
                self.read_string(start)
            }
            '-' | '+' => {
                self.bump();
                if self.peek().is_some_and(|d| d.is_ascii_digit()) {
                    self.read_number(start)
                } else {
                    Err(LexError::UnexpectedChar {
                        ch: c,
                        offset: start,
                    })
                }
            }
            c if c.is_ascii_digit() => self.read_number(start),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_name(start)),
            c => Err(LexError::UnexpectedChar {
                ch: c,
                offset: start,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_literals() {
        assert_eq!(
            kinds("and or not in true false None"),
            vec![
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::In,
                TokenKind::Bool(true),
                TokenKind::Bool(false),
                TokenKind::Null,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        // 大写的 AND 不是关键字, 是普通名字
        assert_eq!(
            kinds("AND"),
            vec![TokenKind::Name("AND".to_string()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("none"),
            vec![TokenKind::Name("none".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_all_operators_and_punctuation() {
        assert_eq!(
            kinds("= != > >= < <= ~ !~ ( ) [ ] ,"),
            vec![
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::Gt,
                TokenKind::Gte,
                TokenKind::Lt,
                TokenKind::Lte,
                TokenKind::Contains,
                TokenKind::NotContains,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Comma,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_dotted_name_is_single_token() {
        assert_eq!(
            kinds("author.country.code"),
            vec![
                TokenKind::Name("author.country.code".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_dotted_name_does_not_hide_keywords() {
        // 点路径里的片段不做关键字匹配
        assert_eq!(
            kinds("user.in"),
            vec![TokenKind::Name("user.in".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 -7 +3 2.5 -0.25"),
            vec![
                TokenKind::Int(42),
                TokenKind::Int(-7),
                TokenKind::Int(3),
                TokenKind::Float(2.5),
                TokenKind::Float(-0.25),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_malformed_numbers() {
        assert!(matches!(
            Lexer::tokenize("12."),
            Err(LexError::MalformedNumber { .. })
        ));
        assert!(matches!(
            Lexer::tokenize("1.2.3"),
            Err(LexError::MalformedNumber { .. })
        ));
        assert!(matches!(
            Lexer::tokenize("1x"),
            Err(LexError::MalformedNumber { .. })
        ));
    }

    #[test]
    fn test_strings_with_escapes() {
        assert_eq!(
            kinds(r#""hello world" "say \"hi\"""#),
            vec![
                TokenKind::Str("hello world".to_string()),
                TokenKind::Str("say \"hi\"".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            Lexer::tokenize(r#"name = "oops"#),
            Err(LexError::UnterminatedString { offset: 7 })
        );
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(
            Lexer::tokenize("a = 1 ; b = 2"),
            Err(LexError::UnexpectedChar { ch: ';', offset: 6 })
        );
        // 孤立的 '!' 不是合法运算符
        assert_eq!(
            Lexer::tokenize("a ! 1"),
            Err(LexError::UnexpectedChar { ch: '!', offset: 2 })
        );
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let tokens = Lexer::tokenize(r#"rating >= 4"#).unwrap();
        assert_eq!(tokens[0].span, Span::new(0, 6));
        assert_eq!(tokens[1].span, Span::new(7, 9));
        assert_eq!(tokens[2].span, Span::new(10, 11));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_empty_input() {
        let tokens = Lexer::tokenize("   ").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn test_full_query() {
        assert_eq!(
            kinds(r#"author.name ~ "Tolkien" and rating >= 4"#),
            vec![
                TokenKind::Name("author.name".to_string()),
                TokenKind::Contains,
                TokenKind::Str("Tolkien".to_string()),
                TokenKind::And,
                TokenKind::Name("rating".to_string()),
                TokenKind::Gte,
                TokenKind::Int(4),
                TokenKind::Eof,
            ]
        );
    }
}
