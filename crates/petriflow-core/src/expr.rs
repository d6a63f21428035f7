//! Rate expressions
//!
//! A rate is either a constant or a small arithmetic expression over place
//! tokens and simulated time. Expressions are compiled against a net before a
//! run: every identifier is resolved to a place index up front and every call
//! must name a catalog function, so nothing outside the whitelist is ever
//! evaluated.

use crate::catalog::Function;
use crate::noise::{NoiseBank, NoiseKey};
use crate::{Error, Net, Result, TransitionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transition rate as written in a net description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rate {
    /// A fixed rate
    Constant(f64),
    /// An expression such as `michaelis_menten(S, 10, 2)`
    Expression(String),
}

impl Default for Rate {
    fn default() -> Self {
        Rate::Constant(1.0)
    }
}

impl From<f64> for Rate {
    fn from(value: f64) -> Self {
        Rate::Constant(value)
    }
}

impl From<&str> for Rate {
    fn from(source: &str) -> Self {
        Rate::Expression(source.to_string())
    }
}

impl From<String> for Rate {
    fn from(source: String) -> Self {
        Rate::Expression(source)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Constant(value) => write!(f, "{}", value),
            Rate::Expression(source) => f.write_str(source),
        }
    }
}

impl Rate {
    /// Compile against a symbol table, failing on unknown names
    pub fn compile<S: Symbols + ?Sized>(&self, symbols: &S) -> Result<CompiledRate> {
        match self {
            Rate::Constant(value) if value.is_finite() => Ok(CompiledRate::Constant(*value)),
            Rate::Constant(value) => Err(Error::rate(value.to_string(), "rate is not finite")),
            Rate::Expression(source) => RateExpr::parse(source, symbols).map(CompiledRate::Expression),
        }
    }
}

/// Resolves names used in expressions to place indices
pub trait Symbols {
    /// Registration index of the place a name refers to
    fn resolve_place(&self, name: &str) -> Option<usize>;
}

impl Symbols for Net {
    fn resolve_place(&self, name: &str) -> Option<usize> {
        self.place_index_by_name(name)
    }
}

impl<'s> Symbols for [&'s str] {
    fn resolve_place(&self, name: &str) -> Option<usize> {
        self.iter().position(|candidate| *candidate == name)
    }
}

/// A rate ready for evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledRate {
    Constant(f64),
    Expression(RateExpr),
}

impl CompiledRate {
    /// Evaluate at the given marking and time
    pub fn eval(&self, ctx: &mut EvalContext<'_>) -> Result<f64> {
        match self {
            CompiledRate::Constant(value) => Ok(*value),
            CompiledRate::Expression(expr) => expr.eval(ctx),
        }
    }

    /// Whether evaluation draws from noise processes
    pub fn is_stochastic(&self) -> bool {
        matches!(self, CompiledRate::Expression(expr) if expr.noise_sites() > 0)
    }
}

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Comparison operators; they evaluate to 1 or 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// Expression tree with names already resolved
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal
    Number(f64),
    /// Tokens of a place
    Place { name: String, index: usize },
    /// Simulated time
    Time,
    /// Unary minus
    Neg(Box<Expr>),
    /// Arithmetic
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Comparison
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    /// Lazy conditional: only the taken branch is evaluated
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Catalog function call
    Call(Function, Vec<Expr>),
    /// `sigma·W(t)` for the Wiener process of this call site
    Noise { site: usize, sigma: Box<Expr> },
}

/// Context for evaluating expressions
pub struct EvalContext<'a> {
    /// Tokens of every place in registration order
    pub marking: &'a [f64],
    /// Simulated time
    pub time: f64,
    /// Noise processes, required by `wiener(...)`
    pub noise: Option<&'a mut NoiseBank>,
    /// Transition that owns the expression being evaluated
    pub owner: Option<&'a TransitionId>,
}

impl<'a> EvalContext<'a> {
    /// Create a context without noise
    pub fn new(marking: &'a [f64], time: f64) -> Self {
        Self {
            marking,
            time,
            noise: None,
            owner: None,
        }
    }

    /// Attach the noise bank and the owning transition
    pub fn with_noise(mut self, noise: &'a mut NoiseBank, owner: &'a TransitionId) -> Self {
        self.noise = Some(noise);
        self.owner = Some(owner);
        self
    }
}

/// A compiled rate expression
#[derive(Debug, Clone, PartialEq)]
pub struct RateExpr {
    source: String,
    root: Expr,
    noise_sites: usize,
}

impl RateExpr {
    /// Parse and resolve an expression
    pub fn parse<S: Symbols + ?Sized>(source: &str, symbols: &S) -> Result<Self> {
        let tokens = tokenize(source).map_err(|message| Error::rate(source, message))?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            noise_sites: 0,
            symbols,
        };
        let root = parser
            .parse_root()
            .map_err(|message| Error::rate(source, message))?;
        Ok(Self {
            source: source.to_string(),
            root,
            noise_sites: parser.noise_sites,
        })
    }

    /// The original text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The resolved tree
    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Number of `wiener(...)` call sites
    pub fn noise_sites(&self) -> usize {
        self.noise_sites
    }

    /// Indices of the places the expression reads
    pub fn places(&self) -> Vec<usize> {
        let mut out = Vec::new();
        collect_places(&self.root, &mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Evaluate to a finite number
    pub fn eval(&self, ctx: &mut EvalContext<'_>) -> Result<f64> {
        let value = eval(&self.root, ctx).map_err(|message| Error::rate(&self.source, message))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Error::rate(&self.source, format!("result {} is not finite", value)))
        }
    }
}

fn collect_places(expr: &Expr, out: &mut Vec<usize>) {
    match expr {
        Expr::Place { index, .. } => out.push(*index),
        Expr::Number(_) | Expr::Time => {}
        Expr::Neg(inner) => collect_places(inner, out),
        Expr::Noise { sigma, .. } => collect_places(sigma, out),
        Expr::Binary(_, a, b) | Expr::Compare(_, a, b) => {
            collect_places(a, out);
            collect_places(b, out);
        }
        Expr::If(c, a, b) => {
            collect_places(c, out);
            collect_places(a, out);
            collect_places(b, out);
        }
        Expr::Call(_, args) => args.iter().for_each(|arg| collect_places(arg, out)),
    }
}

fn eval(expr: &Expr, ctx: &mut EvalContext<'_>) -> std::result::Result<f64, String> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Time => Ok(ctx.time),
        Expr::Place { name, index } => ctx
            .marking
            .get(*index)
            .copied()
            .ok_or_else(|| format!("place '{}' is not part of the marking", name)),
        Expr::Neg(inner) => Ok(-eval(inner, ctx)?),
        Expr::Binary(op, a, b) => {
            let a = eval(a, ctx)?;
            let b = eval(b, ctx)?;
            let value = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    a / b
                }
                BinaryOp::Pow => a.powf(b),
            };
            finite(value)
        }
        Expr::Compare(op, a, b) => {
            let a = eval(a, ctx)?;
            let b = eval(b, ctx)?;
            let holds = match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
            };
            Ok(if holds { 1.0 } else { 0.0 })
        }
        Expr::If(cond, then, otherwise) => {
            if eval(cond, ctx)? != 0.0 {
                eval(then, ctx)
            } else {
                eval(otherwise, ctx)
            }
        }
        Expr::Call(function, args) => {
            let values = args
                .iter()
                .map(|arg| eval(arg, ctx))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let value = function
                .apply(&values)
                .map_err(|message| format!("{}: {}", function, message))?;
            finite(value).map_err(|message| format!("{}: {}", function, message))
        }
        Expr::Noise { site, sigma } => {
            let sigma = eval(sigma, ctx)?;
            let time = ctx.time;
            let (noise, owner) = match (ctx.noise.as_deref_mut(), ctx.owner) {
                (Some(noise), Some(owner)) => (noise, owner),
                _ => return Err("wiener() needs a noise context".to_string()),
            };
            let w = noise.sample(&NoiseKey::new(owner.clone(), *site), time);
            Ok(sigma * w)
        }
    }
}

fn finite(value: f64) -> std::result::Result<f64, String> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("non-finite intermediate result {}", value))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(value) => write!(f, "{}", value),
            Token::Ident(name) => f.write_str(name),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Caret => f.write_str("^"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Lt => f.write_str("<"),
            Token::Le => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Ge => f.write_str(">="),
            Token::EqEq => f.write_str("=="),
            Token::Ne => f.write_str("!="),
        }
    }
}

fn tokenize(source: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent only if digits follow, so `2e` stays an error below
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", text))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '*' if next == Some('*') => {
                tokens.push(Token::Caret);
                i += 2;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            _ => {
                let token = match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '^' => Token::Caret,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    '<' => Token::Lt,
                    '>' => Token::Gt,
                    other => return Err(format!("unexpected character '{}'", other)),
                };
                tokens.push(token);
                i += 1;
            }
        }
    }
    Ok(tokens)
}

struct Parser<'s, S: ?Sized> {
    tokens: Vec<Token>,
    pos: usize,
    noise_sites: usize,
    symbols: &'s S,
}

type ParseResult = std::result::Result<Expr, String>;

impl<'s, S: Symbols + ?Sized> Parser<'s, S> {
    fn parse_root(&mut self) -> ParseResult {
        if self.tokens.is_empty() {
            return Err("empty expression".to_string());
        }
        let expr = self.parse_comparison()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(format!("unexpected '{}'", token)),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> std::result::Result<(), String> {
        match self.advance() {
            Some(found) if found == token => Ok(()),
            Some(found) => Err(format!("expected '{}', found '{}'", token, found)),
            None => Err(format!("expected '{}' at end of expression", token)),
        }
    }

    fn parse_comparison(&mut self) -> ParseResult {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::Le) => CompareOp::Le,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::Ge) => CompareOp::Ge,
                Some(Token::EqEq) => CompareOp::Eq,
                Some(Token::Ne) => CompareOp::Ne,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> ParseResult {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_term(&mut self) -> ParseResult {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> ParseResult {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.parse_unary();
        }
        self.parse_power()
    }

    // right-associative, binds tighter than unary minus on its left
    fn parse_power(&mut self) -> ParseResult {
        let base = self.parse_primary()?;
        if self.eat(&Token::Caret) {
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> ParseResult {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::LParen) => {
                let inner = self.parse_comparison()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.eat(&Token::LParen) {
                    let args = self.parse_args()?;
                    self.call(&name, args)
                } else {
                    self.identifier(name)
                }
            }
            Some(token) => Err(format!("unexpected '{}'", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_args(&mut self) -> std::result::Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_comparison()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RParen)?;
            return Ok(args);
        }
    }

    fn identifier(&self, name: String) -> ParseResult {
        if let Some(index) = self.symbols.resolve_place(&name) {
            return Ok(Expr::Place { name, index });
        }
        match name.as_str() {
            "t" | "time" => Ok(Expr::Time),
            _ => Err(format!("unknown identifier '{}'", name)),
        }
    }

    fn call(&mut self, name: &str, mut args: Vec<Expr>) -> ParseResult {
        match name {
            "if" => {
                if args.len() != 3 {
                    return Err(format!("if() takes 3 arguments, got {}", args.len()));
                }
                let otherwise = args.pop();
                let then = args.pop();
                let cond = args.pop();
                match (cond, then, otherwise) {
                    (Some(c), Some(a), Some(b)) => {
                        Ok(Expr::If(Box::new(c), Box::new(a), Box::new(b)))
                    }
                    _ => Err("if() takes 3 arguments".to_string()),
                }
            }
            "wiener" => {
                let sigma = match (args.pop(), args.is_empty()) {
                    (Some(sigma), true) => sigma,
                    _ => return Err("wiener() takes 1 argument".to_string()),
                };
                let site = self.noise_sites;
                self.noise_sites += 1;
                Ok(Expr::Noise {
                    site,
                    sigma: Box::new(sigma),
                })
            }
            _ => {
                let function =
                    Function::lookup(name).ok_or_else(|| format!("unknown function '{}'", name))?;
                let arity = function.arity();
                if !arity.accepts(args.len()) {
                    return Err(format!(
                        "{}() takes {} arguments, got {}",
                        function,
                        arity,
                        args.len()
                    ));
                }
                Ok(Expr::Call(function, args))
            }
        }
    }
}
