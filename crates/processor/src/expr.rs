//! 변환용 표현식 언어
//!
//! 문자열로 주어진 변환 함수를 코드로 실행하지 않고, 작은 표현식 언어로
//! 파싱해 인터프리터로 평가합니다. 부수 효과가 없고 반복문이 없으므로
//! 평가는 항상 유한 시간에 끝납니다.
//!
//! # 문법
//! ```text
//! source  := params "=>" expr | expr
//! params  := IDENT | "(" [IDENT ("," IDENT)*] ")"
//! expr    := binary ["?" expr ":" expr]
//! binary  := unary (OP unary)*          -- 우선순위: || ?? < && < == != < < <= > >= < + - < * / %
//! unary   := ("!" | "-") unary | postfix
//! postfix := primary ("." IDENT | "[" expr "]")*
//! primary := NUMBER | STRING | true | false | null | IDENT | IDENT "(" args ")"
//!          | "(" expr ")" | "[" args "]" | "{" (key ":" expr),* "}"
//! ```
//!
//! 내장 함수: `len`, `lower`, `upper`, `contains`, `matches`, `abs`, `floor`,
//! `ceil`, `round`, `min`, `max`, `num`, `str`

use std::fmt;

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::error::ProcessorError;

/// 허용되는 내장 함수
const BUILTINS: &[&str] = &[
    "len", "lower", "upper", "contains", "matches", "abs", "floor", "ceil", "round", "min",
    "max", "num", "str",
];

/// 구문 트리 최대 깊이
pub const MAX_NESTING_DEPTH: usize = 128;

/// 정수로 표현할 수 있는 최대 크기 (2^53)
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

static NULL: Value = Value::Null;

/// 다문자 구두점 (긴 것부터 매칭)
const PUNCTUATION: &[&str] = &[
    "===", "!==", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "(", ")", "[", "]", "{", "}",
    ",", ".", ":", "?", "+", "-", "*", "/", "%", "<", ">", "!",
];

fn err(msg: impl Into<String>) -> ProcessorError {
    ProcessorError::Expression(msg.into())
}

// ─── 토크나이저 ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

fn tokenize(src: &str) -> Result<Vec<Token>, ProcessorError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    'outer: while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<f64>()
                .map_err(|_| err(format!("invalid number literal '{text}'")))?;
            tokens.push(Token::Num(n));
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
            {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            let mut out = String::new();
            i += 1;
            while i < chars.len() {
                match chars[i] {
                    ch if ch == quote => {
                        i += 1;
                        tokens.push(Token::Str(out));
                        continue 'outer;
                    }
                    '\\' if i + 1 < chars.len() => {
                        out.push(match chars[i + 1] {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                        i += 2;
                    }
                    ch => {
                        out.push(ch);
                        i += 1;
                    }
                }
            }
            return Err(err("unterminated string literal"));
        }

        for p in PUNCTUATION {
            let len = p.chars().count();
            if i + len <= chars.len() && chars[i..i + len].iter().copied().eq(p.chars()) {
                tokens.push(Token::Punct(p));
                i += len;
                continue 'outer;
            }
        }

        return Err(err(format!("unexpected character '{c}' at offset {i}")));
    }
    Ok(tokens)
}

// ─── AST ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Or,
    Coalesce,
    And,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    fn from_punct(p: &str) -> Option<Self> {
        Some(match p {
            "||" => Self::Or,
            "??" => Self::Coalesce,
            "&&" => Self::And,
            "==" | "===" => Self::Eq,
            "!=" | "!==" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            _ => return None,
        })
    }

    fn binding_power(self) -> u8 {
        match self {
            Self::Or | Self::Coalesce => 1,
            Self::And => 2,
            Self::Eq | Self::Ne => 3,
            Self::Lt | Self::Lte | Self::Gt | Self::Gte => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Rem => 6,
        }
    }
}

#[derive(Debug)]
enum Node {
    Lit(Value),
    Var(String),
    Member(Box<Node>, String),
    Index(Box<Node>, Box<Node>),
    Call(String, Vec<Node>),
    /// 정규식 리터럴은 파싱 시점에 컴파일
    Matches(Box<Node>, Regex),
    Not(Box<Node>),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Cond(Box<Node>, Box<Node>, Box<Node>),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
}

// ─── 파서 ────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// 깊이 한 단계를 소비합니다.
    fn enter(&mut self) -> Result<(), ProcessorError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(err(format!(
                "expression nested deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        Ok(())
    }

    /// `f`가 소비한 깊이는 반환 시 되돌립니다.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ProcessorError>,
    ) -> Result<T, ProcessorError> {
        let base = self.depth;
        let result = f(self);
        self.depth = base;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Some(Token::Punct(q)) if *q == p)
    }

    fn eat(&mut self, p: &str) -> bool {
        if self.peek_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, p: &str) -> Result<(), ProcessorError> {
        if self.eat(p) {
            Ok(())
        } else {
            Err(err(format!(
                "expected '{p}' but found {}",
                self.peek().map_or("end of input".to_owned(), |t| format!("{t:?}"))
            )))
        }
    }

    /// `(a, b) =>` 또는 `a =>` 형태의 매개변수 목록
    fn params(&mut self) -> Option<Vec<String>> {
        match (self.tokens.first(), self.tokens.get(1)) {
            (Some(Token::Ident(name)), Some(Token::Punct("=>"))) => {
                let name = name.clone();
                self.pos = 2;
                return Some(vec![name]);
            }
            (Some(Token::Punct("(")), _) => {}
            _ => return None,
        }

        let mut names = Vec::new();
        let mut i = 1;
        loop {
            match self.tokens.get(i) {
                Some(Token::Punct(")")) => break,
                Some(Token::Ident(name)) => {
                    names.push(name.clone());
                    i += 1;
                    match self.tokens.get(i) {
                        Some(Token::Punct(",")) => i += 1,
                        Some(Token::Punct(")")) => {}
                        _ => return None,
                    }
                }
                _ => return None,
            }
        }
        if self.tokens.get(i + 1) == Some(&Token::Punct("=>")) {
            self.pos = i + 2;
            Some(names)
        } else {
            None
        }
    }

    fn expr(&mut self) -> Result<Node, ProcessorError> {
        self.nested(|p| {
            p.enter()?;
            let cond = p.binary(1)?;
            if p.eat("?") {
                let then = p.expr()?;
                p.expect(":")?;
                let otherwise = p.expr()?;
                return Ok(Node::Cond(
                    Box::new(cond),
                    Box::new(then),
                    Box::new(otherwise),
                ));
            }
            Ok(cond)
        })
    }

    fn binary(&mut self, min_bp: u8) -> Result<Node, ProcessorError> {
        self.nested(|p| {
            let mut lhs = p.unary()?;
            loop {
                let op = match p.peek() {
                    Some(Token::Punct(punct)) => match BinOp::from_punct(punct) {
                        Some(op) => op,
                        None => break,
                    },
                    _ => break,
                };
                let bp = op.binding_power();
                if bp < min_bp {
                    break;
                }
                p.pos += 1;
                // 왼쪽 결합 체인도 트리를 한 단계씩 깊게 만듦
                p.enter()?;
                let rhs = p.binary(bp + 1)?;
                lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
            }
            Ok(lhs)
        })
    }

    fn unary(&mut self) -> Result<Node, ProcessorError> {
        if self.eat("!") {
            return self.nested(|p| {
                p.enter()?;
                Ok(Node::Not(Box::new(p.unary()?)))
            });
        }
        if self.eat("-") {
            return self.nested(|p| {
                p.enter()?;
                Ok(Node::Neg(Box::new(p.unary()?)))
            });
        }
        let primary = self.primary()?;
        self.nested(|p| p.postfix(primary))
    }

    fn postfix(&mut self, mut node: Node) -> Result<Node, ProcessorError> {
        loop {
            if self.peek_punct(".") || self.peek_punct("[") {
                self.enter()?;
            }
            if self.eat(".") {
                match self.tokens.get(self.pos).cloned() {
                    Some(Token::Ident(name)) => {
                        self.pos += 1;
                        node = Node::Member(Box::new(node), name);
                    }
                    _ => return Err(err("expected property name after '.'")),
                }
            } else if self.eat("[") {
                let index = self.expr()?;
                self.expect("]")?;
                node = Node::Index(Box::new(node), Box::new(index));
            } else {
                return Ok(node);
            }
        }
    }

    fn args(&mut self, close: &str) -> Result<Vec<Node>, ProcessorError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(",")?;
        }
    }

    fn primary(&mut self) -> Result<Node, ProcessorError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| err("unexpected end of expression"))?;
        self.pos += 1;

        match token {
            Token::Num(n) => Ok(Node::Lit(number(n))),
            Token::Str(s) => Ok(Node::Lit(Value::String(s))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Node::Lit(Value::Bool(true))),
                "false" => Ok(Node::Lit(Value::Bool(false))),
                "null" | "undefined" => Ok(Node::Lit(Value::Null)),
                _ if self.eat("(") => self.call(name),
                _ => Ok(Node::Var(name)),
            },
            Token::Punct("(") => {
                let inner = self.expr()?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Punct("[") => Ok(Node::Array(self.args("]")?)),
            Token::Punct("{") => self.object(),
            Token::Punct(p) => Err(err(format!("unexpected '{p}'"))),
        }
    }

    fn call(&mut self, name: String) -> Result<Node, ProcessorError> {
        if !BUILTINS.contains(&name.as_str()) {
            return Err(err(format!("unknown function '{name}'")));
        }
        let mut args = self.args(")")?;
        if name == "matches" {
            if args.len() != 2 {
                return Err(err("matches() takes exactly 2 arguments"));
            }
            if let Node::Lit(Value::String(pattern)) = &args[1] {
                let regex = Regex::new(pattern)
                    .map_err(|e| err(format!("invalid regex '{pattern}': {e}")))?;
                let subject = args.swap_remove(0);
                return Ok(Node::Matches(Box::new(subject), regex));
            }
        }
        Ok(Node::Call(name, args))
    }

    fn object(&mut self) -> Result<Node, ProcessorError> {
        let mut entries = Vec::new();
        if self.eat("}") {
            return Ok(Node::Object(entries));
        }
        loop {
            let key = match self.tokens.get(self.pos).cloned() {
                Some(Token::Ident(k) | Token::Str(k)) => k,
                _ => return Err(err("expected object key")),
            };
            self.pos += 1;
            self.expect(":")?;
            entries.push((key, self.expr()?));
            if self.eat("}") {
                return Ok(Node::Object(entries));
            }
            self.expect(",")?;
        }
    }
}

// ─── 컴파일된 표현식 ─────────────────────────────────────────────────

/// 파싱된 표현식
pub struct Expression {
    source: String,
    params: Vec<String>,
    body: Node,
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.source)
            .field("params", &self.params)
            .finish()
    }
}

impl Expression {
    /// 표현식을 파싱합니다.
    ///
    /// 매개변수 목록(`(a, b) =>`)이 없으면 `default_params`가 위치 인자 이름이 됩니다.
    pub fn parse(source: &str, default_params: &[&str]) -> Result<Self, ProcessorError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(err("empty expression"));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let params = parser
            .params()
            .unwrap_or_else(|| default_params.iter().map(|p| (*p).to_owned()).collect());
        let body = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(err(format!(
                "unexpected trailing input in '{source}' at token {}",
                parser.pos
            )));
        }
        Ok(Self {
            source: source.to_owned(),
            params,
            body,
        })
    }

    /// 원본 문자열
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 위치 인자를 바인딩해 평가합니다. 부족한 인자는 `null`입니다.
    pub fn eval(&self, args: &[Value]) -> Result<Value, ProcessorError> {
        let scope = Scope {
            names: &self.params,
            values: args,
        };
        scope.eval(&self.body)
    }
}

struct Scope<'a> {
    names: &'a [String],
    values: &'a [Value],
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Result<Value, ProcessorError> {
        let pos = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| err(format!("unknown identifier '{name}'")))?;
        Ok(self.values.get(pos).cloned().unwrap_or(Value::Null))
    }

    fn eval(&self, node: &Node) -> Result<Value, ProcessorError> {
        match node {
            Node::Lit(v) => Ok(v.clone()),
            Node::Var(name) => self.lookup(name),
            Node::Member(target, name) => Ok(member(&self.eval(target)?, name)),
            Node::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                Ok(match (&target, &index) {
                    (Value::Array(items), Value::Number(n)) => n
                        .as_u64()
                        .and_then(|i| items.get(usize::try_from(i).ok()?))
                        .cloned()
                        .unwrap_or(Value::Null),
                    (_, Value::String(key)) => member(&target, key),
                    (Value::String(s), Value::Number(n)) => n
                        .as_u64()
                        .and_then(|i| s.chars().nth(usize::try_from(i).ok()?))
                        .map_or(Value::Null, |c| Value::String(c.to_string())),
                    _ => Value::Null,
                })
            }
            Node::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                call_builtin(name, &values)
            }
            Node::Matches(subject, regex) => {
                Ok(Value::Bool(regex.is_match(&display(&self.eval(subject)?))))
            }
            Node::Not(inner) => Ok(Value::Bool(!truthy(&self.eval(inner)?))),
            Node::Neg(inner) => {
                let v = self.eval(inner)?;
                let n = v
                    .as_f64()
                    .ok_or_else(|| err(format!("cannot negate {v}")))?;
                Ok(number(-n))
            }
            Node::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs),
            Node::Cond(cond, then, otherwise) => {
                if truthy(&self.eval(cond)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Node::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|i| self.eval(i))
                    .collect::<Result<_, _>>()?,
            )),
            Node::Object(entries) => {
                let mut map = Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), self.eval(v)?);
                }
                Ok(Value::Object(map))
            }
        }
    }

    fn binary(&self, op: BinOp, lhs: &Node, rhs: &Node) -> Result<Value, ProcessorError> {
        let left = self.eval(lhs)?;
        // 단락 평가
        match op {
            BinOp::And if !truthy(&left) => return Ok(left),
            BinOp::Or if truthy(&left) => return Ok(left),
            BinOp::Coalesce if !left.is_null() => return Ok(left),
            BinOp::And | BinOp::Or | BinOp::Coalesce => return self.eval(rhs),
            _ => {}
        }
        let right = self.eval(rhs)?;

        match op {
            BinOp::Eq => Ok(Value::Bool(loose_eq(&left, &right))),
            BinOp::Ne => Ok(Value::Bool(!loose_eq(&left, &right))),
            BinOp::Lt | BinOp::Lte | BinOp::Gt | BinOp::Gte => {
                let ord = match (&left, &right) {
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => match (left.as_f64(), right.as_f64()) {
                        (Some(a), Some(b)) => a.partial_cmp(&b),
                        _ => None,
                    },
                };
                Ok(Value::Bool(ord.is_some_and(|o| match op {
                    BinOp::Lt => o.is_lt(),
                    BinOp::Lte => o.is_le(),
                    BinOp::Gt => o.is_gt(),
                    _ => o.is_ge(),
                })))
            }
            BinOp::Add => match (&left, &right) {
                (Value::String(_), _) | (_, Value::String(_)) => {
                    Ok(Value::String(format!("{}{}", display(&left), display(&right))))
                }
                _ => arithmetic(op, &left, &right),
            },
            _ => arithmetic(op, &left, &right),
        }
    }
}

fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, ProcessorError> {
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(err(format!("arithmetic on non-numbers: {left} and {right}")));
    };
    Ok(number(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        _ => a % b,
    }))
}

fn call_builtin(name: &str, args: &[Value]) -> Result<Value, ProcessorError> {
    let arg = |i: usize| args.get(i).unwrap_or(&NULL);
    let num_arg = |i: usize| {
        arg(i)
            .as_f64()
            .ok_or_else(|| err(format!("{name}() expects a number, got {}", arg(i))))
    };
    let str_arg = |i: usize| {
        arg(i)
            .as_str()
            .ok_or_else(|| err(format!("{name}() expects a string, got {}", arg(i))))
    };

    match name {
        "len" => match arg(0) {
            Value::String(s) => Ok(Value::from(s.chars().count())),
            Value::Array(a) => Ok(Value::from(a.len())),
            Value::Object(o) => Ok(Value::from(o.len())),
            other => Err(err(format!("len() not supported for {other}"))),
        },
        "lower" => Ok(Value::String(str_arg(0)?.to_lowercase())),
        "upper" => Ok(Value::String(str_arg(0)?.to_uppercase())),
        "contains" => Ok(Value::Bool(match (arg(0), arg(1)) {
            (Value::String(s), needle) => s.contains(display(needle).as_str()),
            (Value::Array(items), needle) => items.iter().any(|i| loose_eq(i, needle)),
            _ => false,
        })),
        "matches" => {
            let pattern = str_arg(1)?;
            let regex =
                Regex::new(pattern).map_err(|e| err(format!("invalid regex '{pattern}': {e}")))?;
            Ok(Value::Bool(regex.is_match(&display(arg(0)))))
        }
        "abs" => Ok(number(num_arg(0)?.abs())),
        "floor" => Ok(number(num_arg(0)?.floor())),
        "ceil" => Ok(number(num_arg(0)?.ceil())),
        "round" => Ok(number(num_arg(0)?.round())),
        "min" | "max" => {
            let items: Vec<&Value> = match args {
                [Value::Array(items)] => items.iter().collect(),
                _ => args.iter().collect(),
            };
            let mut nums = Vec::with_capacity(items.len());
            for v in items {
                nums.push(
                    v.as_f64()
                        .ok_or_else(|| err(format!("{name}() expects numbers, got {v}")))?,
                );
            }
            let folded = if name == "min" {
                nums.into_iter().reduce(f64::min)
            } else {
                nums.into_iter().reduce(f64::max)
            };
            Ok(folded.map_or(Value::Null, number))
        }
        "num" => Ok(match arg(0) {
            Value::Number(_) => arg(0).clone(),
            Value::String(s) => s.trim().parse::<f64>().map_or(Value::Null, number),
            Value::Bool(b) => Value::from(u8::from(*b)),
            _ => Value::Null,
        }),
        "str" => Ok(Value::String(display(arg(0)))),
        other => Err(err(format!("unknown function '{other}'"))),
    }
}

/// 정수 값이면 정수로, 유한하지 않으면 `null`로 정규화합니다.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// 속성 접근. 배열/문자열의 `length`를 지원하고 없는 속성은 `null`입니다.
fn member(target: &Value, name: &str) -> Value {
    match (target, name) {
        (Value::Object(map), _) => map.get(name).cloned().unwrap_or(Value::Null),
        (Value::Array(items), "length") => Value::from(items.len()),
        (Value::String(s), "length") => Value::from(s.chars().count()),
        _ => Value::Null,
    }
}

/// 조건 평가용 참/거짓 판정
pub(crate) fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// 문자열은 따옴표 없이, 나머지는 JSON 표기로
fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(src: &str, args: &[Value]) -> Value {
        Expression::parse(src, &["event", "index"])
            .unwrap()
            .eval(args)
            .unwrap()
    }

    fn event() -> Value {
        json!({
            "key": "order-1",
            "timestamp": 1000,
            "value": {"amount": 42, "level": "error", "msg": "timeout after 30s", "tags": ["a", "b"]}
        })
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3", &[]), json!(7));
        assert_eq!(eval("(1 + 2) * 3", &[]), json!(9));
        assert_eq!(eval("10 % 4 - 1", &[]), json!(1));
        assert_eq!(eval("7 / 2", &[]), json!(3.5));
    }

    #[test]
    fn member_and_index_access() {
        assert_eq!(eval("event.value.amount * 2", &[event()]), json!(84));
        assert_eq!(eval("event.value.tags[1]", &[event()]), json!("b"));
        assert_eq!(eval("event.value['level']", &[event()]), json!("error"));
        assert_eq!(eval("event.value.tags.length", &[event()]), json!(2));
        assert_eq!(eval("event.value.missing", &[event()]), Value::Null);
    }

    #[test]
    fn arrow_params_bind_positionally() {
        let expr = Expression::parse("(acc, e) => acc + e.value.amount", &[]).unwrap();
        assert_eq!(expr.eval(&[json!(8), event()]).unwrap(), json!(50));

        let expr = Expression::parse("e => e.key", &[]).unwrap();
        assert_eq!(expr.eval(&[event()]).unwrap(), json!("order-1"));
    }

    #[test]
    fn grouping_is_not_mistaken_for_params() {
        assert_eq!(eval("(index) + 1", &[Value::Null, json!(4)]), json!(5));
    }

    #[test]
    fn logic_and_comparison() {
        assert_eq!(
            eval("event.value.level == 'error' && event.value.amount > 40", &[event()]),
            json!(true)
        );
        assert_eq!(eval("!event.value.missing", &[event()]), json!(true));
        assert_eq!(eval("event.value.missing ?? 'default'", &[event()]), json!("default"));
        assert_eq!(eval("0 || 'fallback'", &[]), json!("fallback"));
        assert_eq!(eval("'a' < 'b'", &[]), json!(true));
    }

    #[test]
    fn ternary() {
        assert_eq!(
            eval("event.value.amount > 100 ? 'big' : 'small'", &[event()]),
            json!("small")
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            eval("{id: event.key, n: index, list: [1, 'x', null]}", &[event(), json!(3)]),
            json!({"id": "order-1", "n": 3, "list": [1, "x", null]})
        );
    }

    #[test]
    fn string_concat() {
        assert_eq!(eval("event.key + ':' + index", &[event(), json!(2)]), json!("order-1:2"));
    }

    #[test]
    fn builtins() {
        assert_eq!(eval("upper(event.value.level)", &[event()]), json!("ERROR"));
        assert_eq!(eval("len(event.value.msg)", &[event()]), json!(17));
        assert_eq!(eval("contains(event.value.tags, 'a')", &[event()]), json!(true));
        assert_eq!(eval("matches(event.value.msg, '^timeout')", &[event()]), json!(true));
        assert_eq!(eval("round(2.6) + floor(2.6) + ceil(2.1)", &[]), json!(8));
        assert_eq!(eval("max(3, 9, 4)", &[]), json!(9));
        assert_eq!(eval("min([3, 9, 4])", &[]), json!(3));
        assert_eq!(eval("num('12.5')", &[]), json!(12.5));
        assert_eq!(eval("str(12)", &[]), json!("12"));
        assert_eq!(eval("abs(-3)", &[]), json!(3));
    }

    #[test]
    fn invalid_static_regex_fails_at_parse() {
        let err = Expression::parse("matches(event.key, '[')", &["event"]).unwrap_err();
        assert!(err.to_string().contains("invalid regex"));
    }

    #[test]
    fn invalid_dynamic_regex_fails_at_eval() {
        let expr = Expression::parse("matches(event.key, event.key)", &["event"]).unwrap();
        assert!(expr.eval(&[json!({"key": "("})]).is_err());
    }

    #[test]
    fn parse_errors() {
        assert!(Expression::parse("", &[]).is_err());
        assert!(Expression::parse("1 +", &[]).is_err());
        assert!(Expression::parse("foo(1)", &[]).is_err());
        assert!(Expression::parse("'open", &[]).is_err());
        assert!(Expression::parse("1 2", &[]).is_err());
        assert!(Expression::parse("a ; b", &["a", "b"]).is_err());
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let deep = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let e = Expression::parse(&deep, &[]).unwrap_err();
        assert!(e.to_string().contains("nested deeper"));

        assert!(Expression::parse(&format!("{}1", "!".repeat(10_000)), &[]).is_err());
        assert!(Expression::parse(&vec!["1"; 10_000].join(" + "), &[]).is_err());
        let members = format!("event{}", ".a".repeat(10_000));
        assert!(Expression::parse(&members, &["event"]).is_err());
    }

    #[test]
    fn moderate_nesting_is_accepted() {
        let nested = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(eval(&nested, &[]), json!(1));
        assert_eq!(eval(&vec!["1"; 50].join(" + "), &[]), json!(50));
    }

    #[test]
    fn unknown_identifier_is_eval_error() {
        let expr = Expression::parse("window.alert", &["event"]).unwrap();
        assert!(expr.eval(&[]).is_err());
    }

    #[test]
    fn arithmetic_on_non_numbers_is_error() {
        let expr = Expression::parse("event.value.level * 2", &["event"]).unwrap();
        assert!(expr.eval(&[event()]).is_err());
    }

    #[test]
    fn division_by_zero_is_null() {
        assert_eq!(eval("1 / 0", &[]), Value::Null);
    }
}
