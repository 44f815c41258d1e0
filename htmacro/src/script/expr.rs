//! Expression lexer, AST, parser, and evaluator.
//!
//! The expression language appears in directive attributes (`TRUE="i < 3"`,
//! `SET x="x + 1"`) and inside `{…}` interpolation spans.  It has integer,
//! float and string literals, variables, unary `+ - !`, the binary operators
//! `* / % + - == != < <= > >=`, parentheses, and built-in function calls.
//!
//! Operator precedence is *not* resolved by precedence climbing.  A term
//! sequence is first collected into alternating operand / operator lists and
//! then flattened in three passes:
//!
//! 1. `* / %` pairs are merged left to right;
//! 2. `+ -` pairs are merged left to right;
//! 3. every remaining comparison is folded onto the running left operand, so
//!    `a < b < c` compares the `0`/`1` result of `a < b` against `c`.

use std::ops::Range;

use thiserror::Error;

use super::builtins::Function;
use super::value::Value;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Dependency-injection interface used by the expression evaluator.
///
/// The [`Engine`](crate::engine::Engine) implements this trait to give the
/// evaluator access to the variable environment and the diagnostics sink.
pub trait EvalContext {
    /// Look up a variable.
    fn get_var(&self, name: &str) -> Option<Value>;

    /// Whether a variable is bound, without reading it.
    fn has_var(&self, name: &str) -> bool {
        self.get_var(name).is_some()
    }

    /// Report a non-fatal evaluation problem.
    fn warn(&mut self, message: String);
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnterminatedString,
    UnclosedParen,
    UnclosedArgs(String),
    InvalidNumber(String),
    UnexpectedSymbol(char),
    UnexpectedToken(String),
    MissingOperand(&'static str),
    Empty,
}

/// A failed expression parse, with the byte span of the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} at {}..{}", describe(.kind), .span.start, .span.end)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Range<usize>,
}

fn describe(kind: &ParseErrorKind) -> String {
    match kind {
        ParseErrorKind::UnterminatedString => "unterminated string literal".into(),
        ParseErrorKind::UnclosedParen => "unclosed '('".into(),
        ParseErrorKind::UnclosedArgs(name) => format!("unclosed argument list of {name}()"),
        ParseErrorKind::InvalidNumber(lit) => format!("invalid number '{lit}'"),
        ParseErrorKind::UnexpectedSymbol(c) => format!("unexpected symbol '{c}'"),
        ParseErrorKind::UnexpectedToken(t) => format!("unexpected {t}"),
        ParseErrorKind::MissingOperand(op) => format!("missing operand after '{op}'"),
        ParseErrorKind::Empty => "empty expression".into(),
    }
}

impl ParseError {
    fn new(kind: ParseErrorKind, span: Range<usize>) -> Self {
        ParseError { kind, span }
    }

    /// The part of `src` this error points at.
    pub fn excerpt<'a>(&self, src: &'a str) -> &'a str {
        src.get(self.span.clone()).unwrap_or("")
    }
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,

    Comma,
    LParen,
    RParen,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Int(n) => format!("number {n}"),
            Token::Float(x) => format!("number {x}"),
            Token::Str(_) => "string literal".into(),
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Eof => "end of expression".into(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Bang => "!",
            Token::Eq => "==",
            Token::Ne => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Comma => ",",
            Token::LParen => "(",
            Token::RParen => ")",
            _ => "",
        }
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn read_number(&mut self, start: usize) -> Result<Token, ParseError> {
        while matches!(self.peek(), Some(b'0'..=b'9' | b'.')) {
            self.pos += 1;
        }
        let lit = &self.src[start..self.pos];
        let span = start..self.pos;
        let invalid = || ParseError::new(ParseErrorKind::InvalidNumber(lit.to_owned()), span.clone());
        match lit.matches('.').count() {
            0 => lit.parse().map(Token::Int).map_err(|_| invalid()),
            1 if lit != "." => lit.parse().map(Token::Float).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    /// Read a quoted literal.  A backslash only escapes the closing quote;
    /// any other backslash is kept as written.
    fn read_string(&mut self, start: usize, quote: u8) -> Result<Token, ParseError> {
        let mut s = String::new();
        loop {
            let rest = &self.src[self.pos..];
            let Some(ch) = rest.chars().next() else {
                return Err(ParseError::new(
                    ParseErrorKind::UnterminatedString,
                    start..self.src.len(),
                ));
            };
            self.pos += ch.len_utf8();
            if ch == '\\' && self.peek() == Some(quote) {
                self.pos += 1;
                s.push(quote as char);
            } else if ch as u32 == quote as u32 {
                return Ok(Token::Str(s));
            } else {
                s.push(ch);
            }
        }
    }

    fn read_ident(&mut self, start: usize) -> Token {
        while matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9')) {
            self.pos += 1;
        }
        Token::Ident(self.src[start..self.pos].to_owned())
    }

    fn next_token(&mut self) -> Result<(Token, Range<usize>), ParseError> {
        self.skip_ws();
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Ok((Token::Eof, start..start));
        };
        self.pos += 1;

        let tok = match ch {
            b'0'..=b'9' | b'.' => {
                self.pos = start;
                self.read_number(start)?
            }
            b'"' | b'\'' | b'`' => self.read_string(start, ch)?,
            b'a'..=b'z' | b'A'..=b'Z' => self.read_ident(start),
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'%' => Token::Percent,
            b'!' => {
                if self.eat(b'=') {
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            b'=' if self.eat(b'=') => Token::Eq,
            b'<' => {
                if self.eat(b'=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                if self.eat(b'=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            b',' => Token::Comma,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            _ => {
                let c = self.src[start..].chars().next().unwrap_or('?');
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedSymbol(c),
                    start..start + c.len_utf8(),
                ));
            }
        };
        Ok((tok, start..self.pos))
    }

    fn tokenize(mut self) -> Result<Vec<(Token, Range<usize>)>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = matches!(t.0, Token::Eof);
            tokens.push(t);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BinOp {
    fn from_token(tok: &Token) -> Option<BinOp> {
        Some(match tok {
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            Token::Star => BinOp::Mul,
            Token::Slash => BinOp::Div,
            Token::Percent => BinOp::Rem,
            Token::Eq => BinOp::Eq,
            Token::Ne => BinOp::Neq,
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Lte,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Gte,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Lte => "<=",
            BinOp::Gt => ">",
            BinOp::Gte => ">=",
        }
    }

    fn is_multiplicative(self) -> bool {
        matches!(self, BinOp::Mul | BinOp::Div | BinOp::Rem)
    }

    fn is_additive(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub)
    }
}

/// Expression tree.  Every node owns its children.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Value),
    Var(String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Func(String, Vec<Expr>),
}

impl Expr {
    fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, Range<usize>)>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|t| &t.0).unwrap_or(&Token::Eof)
    }

    fn span(&self) -> Range<usize> {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.1.clone())
            .unwrap_or(0..0)
    }

    fn advance(&mut self) -> (Token, Range<usize>) {
        let t = self
            .tokens
            .get(self.pos)
            .cloned()
            .unwrap_or((Token::Eof, 0..0));
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    /// `expr := term (binop term)*`, flattened by precedence passes.
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut operands = vec![self.parse_term()?];
        let mut ops = Vec::new();
        while let Some(op) = BinOp::from_token(self.peek()) {
            let op_span = self.span();
            self.pos += 1;
            if matches!(self.peek(), Token::Eof | Token::RParen | Token::Comma) {
                return Err(ParseError::new(
                    ParseErrorKind::MissingOperand(op.symbol()),
                    op_span,
                ));
            }
            ops.push(op);
            operands.push(self.parse_term()?);
        }

        let (operands, ops) = merge_pass(operands, ops, BinOp::is_multiplicative);
        let (operands, ops) = merge_pass(operands, ops, BinOp::is_additive);
        let (mut operands, _) = merge_pass(operands, ops, |_| true);
        operands
            .pop()
            .ok_or_else(|| ParseError::new(ParseErrorKind::Empty, self.span()))
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let (tok, span) = self.advance();
        match tok {
            Token::Int(n) => Ok(Expr::Const(Value::Int(n))),
            Token::Float(x) => Ok(Expr::Const(Value::Float(x))),
            Token::Str(s) => Ok(Expr::Const(Value::Str(s))),
            Token::Plus => self.parse_operand_of("+"),
            Token::Minus => Ok(Expr::Neg(Box::new(self.parse_operand_of("-")?))),
            Token::Bang => Ok(Expr::Not(Box::new(self.parse_operand_of("!")?))),
            Token::Ident(name) => {
                // A call only when '(' follows with no space in between.
                let call = matches!(
                    self.tokens.get(self.pos),
                    Some((Token::LParen, s)) if s.start == span.end
                );
                if !call {
                    return Ok(Expr::Var(name));
                }
                self.pos += 1;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        let end = self.span().end;
                        return Err(ParseError::new(
                            ParseErrorKind::UnclosedArgs(name),
                            span.start..end,
                        ));
                    }
                }
                Ok(Expr::Func(name, args))
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                if !self.eat(&Token::RParen) {
                    return Err(ParseError::new(ParseErrorKind::UnclosedParen, span));
                }
                Ok(inner)
            }
            Token::Eof => Err(ParseError::new(ParseErrorKind::Empty, span)),
            other => Err(ParseError::new(
                ParseErrorKind::UnexpectedToken(other.describe()),
                span,
            )),
        }
    }

    fn parse_operand_of(&mut self, op: &'static str) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Token::Eof | Token::RParen | Token::Comma) {
            return Err(ParseError::new(ParseErrorKind::MissingOperand(op), self.span()));
        }
        self.parse_term()
    }
}

/// Merge every operator accepted by `take` with its two neighbours, left to
/// right, and return the operands and operators left over.
fn merge_pass(
    operands: Vec<Expr>,
    ops: Vec<BinOp>,
    take: impl Fn(BinOp) -> bool,
) -> (Vec<Expr>, Vec<BinOp>) {
    let mut rest_operands = Vec::with_capacity(operands.len());
    let mut rest_ops = Vec::with_capacity(ops.len());
    let mut operands = operands.into_iter();
    let Some(mut acc) = operands.next() else {
        return (rest_operands, rest_ops);
    };
    for (op, rhs) in ops.into_iter().zip(operands) {
        if take(op) {
            acc = Expr::binary(op, acc, rhs);
        } else {
            rest_operands.push(acc);
            rest_ops.push(op);
            acc = rhs;
        }
    }
    rest_operands.push(acc);
    (rest_operands, rest_ops)
}

/// Parse an expression string into an AST.
pub fn parse_expr(src: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser::new(tokens);
    if matches!(parser.peek(), Token::Eof) {
        return Err(ParseError::new(ParseErrorKind::Empty, 0..src.len()));
    }
    let expr = parser.parse_expr()?;
    if !matches!(parser.peek(), Token::Eof) {
        let span = parser.span();
        let (tok, _) = parser.advance();
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedToken(tok.describe()),
            span,
        ));
    }
    Ok(expr)
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate an [`Expr`] against the given context.
///
/// Evaluation never fails: problems are reported through
/// [`EvalContext::warn`] and replaced by a default value.
pub fn eval_expr(expr: &Expr, ctx: &mut dyn EvalContext) -> Value {
    match expr {
        Expr::Const(v) => v.clone(),

        Expr::Var(name) => match ctx.get_var(name) {
            Some(v) => v,
            None => {
                ctx.warn(format!("undefined variable '{name}'"));
                Value::Int(0)
            }
        },

        Expr::Not(inner) => Value::from(!eval_expr(inner, ctx).as_bool()),
        Expr::Neg(inner) => eval_expr(inner, ctx).arith_neg(),

        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx);
            let r = eval_expr(rhs, ctx);
            eval_binop(*op, l, r, ctx)
        }

        Expr::Func(name, args) => eval_call(name, args, ctx),
    }
}

fn eval_binop(op: BinOp, l: Value, r: Value, ctx: &mut dyn EvalContext) -> Value {
    use std::cmp::Ordering;
    let divided = match op {
        BinOp::Add => return l.arith_add(&r),
        BinOp::Sub => return l.arith_sub(&r),
        BinOp::Mul => return l.arith_mul(&r),
        BinOp::Div => l.arith_div(&r),
        BinOp::Rem => l.arith_rem(&r),

        BinOp::Eq => return Value::from(l.cmp_value(&r) == Ordering::Equal),
        BinOp::Neq => return Value::from(l.cmp_value(&r) != Ordering::Equal),
        BinOp::Lt => return Value::from(l.cmp_value(&r) == Ordering::Less),
        BinOp::Lte => return Value::from(l.cmp_value(&r) != Ordering::Greater),
        BinOp::Gt => return Value::from(l.cmp_value(&r) == Ordering::Greater),
        BinOp::Gte => return Value::from(l.cmp_value(&r) != Ordering::Less),
    };
    divided.unwrap_or_else(|e| {
        ctx.warn(e);
        Value::Int(0)
    })
}

fn eval_call(name: &str, args: &[Expr], ctx: &mut dyn EvalContext) -> Value {
    let Some(func) = Function::from_name(name) else {
        ctx.warn(format!("unknown function '{name}'"));
        return Value::Int(0);
    };

    let (min, max) = func.arity();
    if args.len() < min {
        ctx.warn(format!(
            "{name}() expects at least {min} argument(s), got {}",
            args.len()
        ));
        return func.zero();
    }
    let args = match max {
        Some(max) if args.len() > max => {
            ctx.warn(format!(
                "{name}() takes {max} argument(s); ignoring {} extra",
                args.len() - max
            ));
            &args[..max]
        }
        _ => args,
    };

    match func {
        Function::If => {
            if eval_expr(&args[0], ctx).as_bool() {
                eval_expr(&args[1], ctx)
            } else {
                eval_expr(&args[2], ctx)
            }
        }
        Function::Defined => match &args[0] {
            Expr::Var(var) => Value::from(ctx.has_var(var)),
            _ => {
                ctx.warn("defined() expects a variable name".into());
                Value::Int(0)
            }
        },
        Function::Eager(builtin) => {
            let values: Vec<Value> = args.iter().map(|a| eval_expr(a, ctx)).collect();
            builtin.call(values).unwrap_or_else(|e| {
                ctx.warn(format!("{name}(): {e}"));
                builtin.zero()
            })
        }
    }
}

/// Convenience: parse and evaluate an expression string.
pub fn eval_str(src: &str, ctx: &mut dyn EvalContext) -> Result<Value, ParseError> {
    let expr = parse_expr(src)?;
    Ok(eval_expr(&expr, ctx))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
