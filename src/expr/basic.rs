//! A small arithmetic/boolean expression language.
//!
//! Grammar, loosest binding first:
//!
//! 1. `||` / `or`
//! 2. `&&` / `and`
//! 3. `==` `!=` / `eq` `ne`
//! 4. `<` `<=` `>` `>=` / `lt` `le` `gt` `ge`
//! 5. `+` `-`
//! 6. `*` `/` `%`
//! 7. prefix `!` / `not`, unary `-`, literals, variables, parentheses
//!
//! Variables are looked up in the context; an absent variable is null.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::context::ContextMap;
use crate::error::{ProptreeError, Result};
use crate::expr::{Expression, ExpressionEngine, truthy};
use crate::value::Value;

type Outcome<T> = std::result::Result<T, String>;

/// The built-in expression engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicEngine;

impl ExpressionEngine for BasicEngine {
    fn compile(&self, source: &str) -> Result<Arc<dyn Expression>> {
        let root = tokenize(source)
            .and_then(|tokens| Parser { tokens, pos: 0 }.parse())
            .map_err(|reason| ProptreeError::evaluation(source, reason))?;
        Ok(Arc::new(BasicExpression {
            source: source.to_string(),
            root,
        }))
    }
}

#[derive(Debug)]
struct BasicExpression {
    source: String,
    root: Node,
}

impl Expression for BasicExpression {
    fn source(&self) -> &str {
        &self.source
    }

    fn evaluate(&self, ctx: &ContextMap) -> Result<Option<Value>> {
        eval(&self.root, ctx).map_err(|reason| ProptreeError::evaluation(&self.source, reason))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne => 3,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 6,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            BinOp::Lt => ordering.is_lt(),
            BinOp::Le => ordering.is_le(),
            BinOp::Gt => ordering.is_gt(),
            BinOp::Ge => ordering.is_ge(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(Option<Value>),
    Ident(String),
    Bin(BinOp),
    Not,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(Some(value)) => write!(f, "'{value}'"),
            Token::Literal(None) => write!(f, "null"),
            Token::Ident(name) => write!(f, "'{name}'"),
            Token::Bin(op) => write!(f, "'{}'", op.symbol()),
            Token::Not => write!(f, "'!'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
        }
    }
}

#[derive(Debug)]
enum Node {
    Literal(Option<Value>),
    Var(String),
    Not(Box<Node>),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
}

fn keyword(word: &str) -> Option<Token> {
    let token = match word {
        "true" => Token::Literal(Some(Value::Boolean(true))),
        "false" => Token::Literal(Some(Value::Boolean(false))),
        "null" => Token::Literal(None),
        "and" => Token::Bin(BinOp::And),
        "or" => Token::Bin(BinOp::Or),
        "not" => Token::Not,
        "eq" => Token::Bin(BinOp::Eq),
        "ne" => Token::Bin(BinOp::Ne),
        "lt" => Token::Bin(BinOp::Lt),
        "le" => Token::Bin(BinOp::Le),
        "gt" => Token::Bin(BinOp::Gt),
        "ge" => Token::Bin(BinOp::Ge),
        _ => return None,
    };
    Some(token)
}

fn number_literal(text: &str, decimal: bool) -> Outcome<Value> {
    if decimal {
        return text
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|e| format!("bad number '{text}': {e}"));
    }
    let long = text
        .parse::<i64>()
        .map_err(|_| format!("integer literal '{text}' is out of range"))?;
    Ok(i32::try_from(long).map_or(Value::Long(long), Value::Integer))
}

fn tokenize(source: &str) -> Outcome<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while let Some(&c) = chars.get(i) {
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' => {
                let start = i;
                while chars.get(i).is_some_and(char::is_ascii_digit) {
                    i += 1;
                }
                let decimal = chars.get(i) == Some(&'.')
                    && chars.get(i + 1).is_some_and(char::is_ascii_digit);
                if decimal {
                    i += 1;
                    while chars.get(i).is_some_and(char::is_ascii_digit) {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Literal(Some(number_literal(&text, decimal)?)));
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i).copied() {
                        None => return Err("unterminated string literal".into()),
                        Some(ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = chars
                                .get(i + 1)
                                .copied()
                                .ok_or("unterminated string literal")?;
                            text.push(escaped);
                            i += 2;
                        }
                        Some(ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Literal(Some(Value::String(text))));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|ch| ch.is_alphanumeric() || *ch == '_' || *ch == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(keyword(&word).unwrap_or(Token::Ident(word)));
            }
            _ => {
                let next = chars.get(i + 1).copied();
                let (token, width) = match (c, next) {
                    ('&', Some('&')) => (Token::Bin(BinOp::And), 2),
                    ('|', Some('|')) => (Token::Bin(BinOp::Or), 2),
                    ('=', Some('=')) => (Token::Bin(BinOp::Eq), 2),
                    ('!', Some('=')) => (Token::Bin(BinOp::Ne), 2),
                    ('<', Some('=')) => (Token::Bin(BinOp::Le), 2),
                    ('>', Some('=')) => (Token::Bin(BinOp::Ge), 2),
                    ('<', _) => (Token::Bin(BinOp::Lt), 1),
                    ('>', _) => (Token::Bin(BinOp::Gt), 1),
                    ('!', _) => (Token::Not, 1),
                    ('+', _) => (Token::Bin(BinOp::Add), 1),
                    ('-', _) => (Token::Bin(BinOp::Sub), 1),
                    ('*', _) => (Token::Bin(BinOp::Mul), 1),
                    ('/', _) => (Token::Bin(BinOp::Div), 1),
                    ('%', _) => (Token::Bin(BinOp::Rem), 1),
                    _ => return Err(format!("unexpected character '{c}' at offset {i}")),
                };
                tokens.push(token);
                i += width;
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn parse(mut self) -> Outcome<Node> {
        if self.tokens.is_empty() {
            return Err("empty expression".into());
        }
        let node = self.binary(0)?;
        match self.tokens.get(self.pos) {
            None => Ok(node),
            Some(token) => Err(format!("unexpected {token} after expression")),
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn binary(&mut self, min_precedence: u8) -> Outcome<Node> {
        let mut lhs = self.unary()?;
        while let Some(Token::Bin(op)) = self.tokens.get(self.pos) {
            let op = *op;
            if op.precedence() < min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(op.precedence() + 1)?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Outcome<Node> {
        match self.advance() {
            Some(Token::Not) => Ok(Node::Not(Box::new(self.unary()?))),
            Some(Token::Bin(BinOp::Sub)) => Ok(Node::Neg(Box::new(self.unary()?))),
            Some(Token::Bin(BinOp::Add)) => self.unary(),
            Some(Token::Literal(value)) => Ok(Node::Literal(value)),
            Some(Token::Ident(name)) => Ok(Node::Var(name)),
            Some(Token::LParen) => {
                let inner = self.binary(0)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("expected ')'".into()),
                }
            }
            Some(token) => Err(format!("unexpected {token}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

fn eval(node: &Node, ctx: &ContextMap) -> Outcome<Option<Value>> {
    match node {
        Node::Literal(value) => Ok(value.clone()),
        Node::Var(name) => Ok(ctx.get(name).cloned()),
        Node::Not(inner) => {
            let value = eval(inner, ctx)?;
            Ok(Some(Value::Boolean(!truthy(value.as_ref()))))
        }
        Node::Neg(inner) => negate(eval(inner, ctx)?),
        Node::Binary(BinOp::And, lhs, rhs) => {
            let result =
                truthy(eval(lhs, ctx)?.as_ref()) && truthy(eval(rhs, ctx)?.as_ref());
            Ok(Some(Value::Boolean(result)))
        }
        Node::Binary(BinOp::Or, lhs, rhs) => {
            let result =
                truthy(eval(lhs, ctx)?.as_ref()) || truthy(eval(rhs, ctx)?.as_ref());
            Ok(Some(Value::Boolean(result)))
        }
        Node::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, ctx)?;
            let rhs = eval(rhs, ctx)?;
            binary(*op, lhs, rhs)
        }
    }
}

fn binary(op: BinOp, lhs: Option<Value>, rhs: Option<Value>) -> Outcome<Option<Value>> {
    match op {
        BinOp::Eq => Ok(Some(Value::Boolean(equals(lhs.as_ref(), rhs.as_ref())))),
        BinOp::Ne => Ok(Some(Value::Boolean(!equals(lhs.as_ref(), rhs.as_ref())))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = compare(lhs.as_ref(), rhs.as_ref())?;
            Ok(Some(Value::Boolean(op.accepts(ordering))))
        }
        _ => arithmetic(op, lhs, rhs).map(Some),
    }
}

fn negate(value: Option<Value>) -> Outcome<Option<Value>> {
    let negated = match value {
        Some(Value::Integer(i)) => i
            .checked_neg()
            .map_or(Value::Long(-i64::from(i)), Value::Integer),
        Some(Value::Long(l)) => Value::Long(l.checked_neg().ok_or("integer overflow")?),
        Some(Value::Float(f)) => Value::Float(-f),
        Some(Value::Double(d)) => Value::Double(-d),
        Some(other) => return Err(format!("can't negate {}", other.type_label())),
        None => return Err("can't negate null".into()),
    };
    Ok(Some(negated))
}

fn arithmetic(op: BinOp, lhs: Option<Value>, rhs: Option<Value>) -> Outcome<Value> {
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        return Err(format!("null operand for '{}'", op.symbol()));
    };

    if op == BinOp::Add && (lhs.as_str().is_some() || rhs.as_str().is_some()) {
        return Ok(Value::String(format!("{lhs}{rhs}")));
    }

    let divides = matches!(op, BinOp::Div | BinOp::Rem);

    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        if divides && b == 0 {
            return Err("division by zero".into());
        }
        let result = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::Div => a.checked_div(b),
            BinOp::Rem => a.checked_rem(b),
            _ => None,
        };
        return result.map(Value::Long).ok_or_else(|| "integer overflow".into());
    }

    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => {
            if divides && b == 0.0 {
                return Err("division by zero".into());
            }
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                _ => a % b,
            };
            Ok(Value::Double(result))
        }
        _ => Err(format!(
            "can't apply '{}' to {} and {}",
            op.symbol(),
            lhs.type_label(),
            rhs.type_label()
        )),
    }
}

fn equals(lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    match (lhs, rhs) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
                return x == y;
            }
            a == b
        }
        _ => false,
    }
}

fn compare(lhs: Option<&Value>, rhs: Option<&Value>) -> Outcome<Ordering> {
    let (Some(a), Some(b)) = (lhs, rhs) else {
        return Err("can't order null".into());
    };
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Ok(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).ok_or_else(|| "NaN can't be ordered".into());
    }
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Ok(x.cmp(y));
    }
    Err(format!(
        "can't order {} against {}",
        a.type_label(),
        b.type_label()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, ctx: &ContextMap) -> Result<Option<Value>> {
        BasicEngine.compile(source)?.evaluate(ctx)
    }

    fn value(source: &str) -> Option<Value> {
        run(source, ContextMap::empty()).unwrap()
    }

    #[test]
    fn integer_literals_pick_width_by_range() {
        assert_eq!(value("7"), Some(Value::Integer(7)));
        assert_eq!(value("5000000000"), Some(Value::Long(5_000_000_000)));
        assert_eq!(value("-7"), Some(Value::Integer(-7)));
        assert!(BasicEngine.compile("99999999999999999999").is_err());
    }

    #[test]
    fn integer_arithmetic_yields_long() {
        assert_eq!(value("1 + 2 * 3"), Some(Value::Long(7)));
        assert_eq!(value("(1 + 2) * 3"), Some(Value::Long(9)));
        assert_eq!(value("7 % 4"), Some(Value::Long(3)));
    }

    #[test]
    fn float_operand_yields_double() {
        assert_eq!(value("1 + 0.5"), Some(Value::Double(1.5)));
        assert_eq!(value("3 / 2.0"), Some(Value::Double(1.5)));
    }

    #[test]
    fn plus_with_string_concatenates() {
        assert_eq!(value("'port-' + 80"), Some(Value::from("port-80")));
        assert_eq!(value("\"a\" + \"b\""), Some(Value::from("ab")));
    }

    #[test]
    fn comparisons_and_equality() {
        assert_eq!(value("2 > 1"), Some(Value::Boolean(true)));
        assert_eq!(value("2 <= 1"), Some(Value::Boolean(false)));
        assert_eq!(value("1 == 1.0"), Some(Value::Boolean(true)));
        assert_eq!(value("'a' < 'b'"), Some(Value::Boolean(true)));
        assert_eq!(value("'a' != 'a'"), Some(Value::Boolean(false)));
        assert_eq!(value("null == null"), Some(Value::Boolean(true)));
    }

    #[test]
    fn word_operators() {
        assert_eq!(value("1 eq 1 and not false"), Some(Value::Boolean(true)));
        assert_eq!(value("1 ne 1 or 2 gt 3"), Some(Value::Boolean(false)));
    }

    #[test]
    fn variables_come_from_context() {
        let ctx = ContextMap::new().with("x", 2).with("name", "web");
        assert_eq!(run("x == 2", &ctx).unwrap(), Some(Value::Boolean(true)));
        assert_eq!(run("x * 10", &ctx).unwrap(), Some(Value::Long(20)));
        assert_eq!(run("name + '-1'", &ctx).unwrap(), Some(Value::from("web-1")));
    }

    #[test]
    fn absent_variable_is_null() {
        assert_eq!(value("missing"), None);
        assert_eq!(value("missing == 1"), Some(Value::Boolean(false)));
        assert_eq!(value("!missing"), Some(Value::Boolean(true)));
    }

    #[test]
    fn logic_short_circuits() {
        // The right-hand side would fail if evaluated.
        assert_eq!(value("false && 1 / 0"), Some(Value::Boolean(false)));
        assert_eq!(value("true || 1 / 0"), Some(Value::Boolean(true)));
    }

    #[test]
    fn runtime_failures_are_evaluation_errors() {
        let err = run("1 / 0", ContextMap::empty()).unwrap_err();
        assert!(matches!(err, ProptreeError::Evaluation { .. }));
        assert!(err.to_string().contains("division by zero"));
        assert!(run("missing + 1", ContextMap::empty()).is_err());
        assert!(run("'a' < 1", ContextMap::empty()).is_err());
    }

    #[test]
    fn compile_failures() {
        for source in ["", "1 +", "(1", "1 2", "a $ b", "'open"] {
            let err = BasicEngine.compile(source).unwrap_err();
            assert!(matches!(err, ProptreeError::Evaluation { .. }), "{source}");
        }
    }

    #[test]
    fn test_uses_truthiness() {
        let ctx = ContextMap::new().with("n", 0);
        let expr = BasicEngine.compile("n").unwrap();
        assert!(!expr.test(&ctx).unwrap());
        assert_eq!(expr.source(), "n");
    }
}
