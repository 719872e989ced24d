//! Boolean trigger conditions: parsing, evaluation, and term counting.
//!
//! A condition is a boolean expression over dependency names, e.g.
//! `"dep-a && (dep-b || dep-c)"`. Evaluation only cares about *presence*:
//! a variable evaluates true when the parameter view contains its name,
//! false otherwise. Values are opaque markers and are never compared by
//! content inside the expression.
//!
//! The evaluator is deliberately small: identifiers, `&&`, `||`, and
//! parentheses. Anything the system under test accepts beyond that is a
//! setup error here, surfaced before a single event is produced.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;

/// Immutable dependency-name → value view handed to expression evaluation.
///
/// The contract with the expression evaluator is "presence of key ⇒ true".
/// The stored values are carried along only so outcomes can be reported
/// with the literal values that satisfied (or failed) a condition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    /// Create an empty parameter view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a dependency value. A later insert for the same name wins.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Whether a dependency name is present.
    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Literal value recorded for a dependency, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Number of recorded dependency values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for Params {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, "}}")
    }
}

/// An evaluable boolean expression over named variables.
///
/// This is the capability the verifier depends on; any expression
/// implementation satisfying it can back [`Condition`].
pub trait BoolExpr {
    /// The set of variable names referenced by the expression.
    fn variables(&self) -> BTreeSet<&str>;

    /// Evaluate under presence semantics: a variable is true iff `params`
    /// contains its name.
    fn evaluate(&self, params: &Params) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Ast {
    Var(String),
    And(Box<Ast>, Box<Ast>),
    Or(Box<Ast>, Box<Ast>),
}

impl BoolExpr for Ast {
    fn variables(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn evaluate(&self, params: &Params) -> bool {
        match self {
            Ast::Var(name) => params.has(name),
            Ast::And(lhs, rhs) => lhs.evaluate(params) && rhs.evaluate(params),
            Ast::Or(lhs, rhs) => lhs.evaluate(params) || rhs.evaluate(params),
        }
    }
}

impl Ast {
    fn collect_variables<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Ast::Var(name) => {
                names.insert(name.as_str());
            }
            Ast::And(lhs, rhs) | Ast::Or(lhs, rhs) => {
                lhs.collect_variables(names);
                rhs.collect_variables(names);
            }
        }
    }
}

/// Errors produced while parsing a condition expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The expression contains no tokens.
    #[error("empty expression")]
    Empty,

    /// A character outside the expression language was encountered.
    #[error("unexpected character '{ch}' at byte {at}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Byte offset into the condition text.
        at: usize,
    },

    /// A token appeared where the grammar does not allow it.
    #[error("unexpected token '{token}' at byte {at}")]
    UnexpectedToken {
        /// The offending token, rendered as source text.
        token: String,
        /// Byte offset into the condition text.
        at: usize,
    },

    /// The expression ended mid-production.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    And,
    Or,
    LParen,
    RParen,
}

impl Token {
    fn render(&self) -> String {
        match self {
            Token::Ident(name) => name.clone(),
            Token::And => "&&".to_string(),
            Token::Or => "||".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(at, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((Token::LParen, at));
            }
            ')' => {
                chars.next();
                tokens.push((Token::RParen, at));
            }
            '&' | '|' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, next)) if next == ch => {
                        chars.next();
                        let token = if ch == '&' { Token::And } else { Token::Or };
                        tokens.push((token, at));
                    }
                    _ => return Err(ParseError::UnexpectedChar { ch, at }),
                }
            }
            c if is_ident_start(c) => {
                let mut name = String::new();
                while let Some(&(_, next)) = chars.peek() {
                    if !is_ident_continue(next) {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }
                tokens.push((Token::Ident(name), at));
            }
            _ => return Err(ParseError::UnexpectedChar { ch, at }),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    // or := and ( '||' and )*
    fn or(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.and()?;
            lhs = Ast::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // and := primary ( '&&' primary )*
    fn and(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.primary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.primary()?;
            lhs = Ast::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // primary := IDENT | '(' or ')'
    fn primary(&mut self) -> Result<Ast, ParseError> {
        match self.next() {
            Some((Token::Ident(name), _)) => Ok(Ast::Var(name)),
            Some((Token::LParen, _)) => {
                let inner = self.or()?;
                match self.next() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((token, at)) => Err(ParseError::UnexpectedToken {
                        token: token.render(),
                        at,
                    }),
                    None => Err(ParseError::UnexpectedEnd),
                }
            }
            Some((token, at)) => Err(ParseError::UnexpectedToken {
                token: token.render(),
                at,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}

/// A trigger condition: source text, parsed expression, and term count.
///
/// The term count is the number of distinct dependency values that must
/// co-occur for the expression to be satisfiable, derived as (number of
/// `&&` operators) + 1. This is exact for pure conjunctions and only a
/// heuristic once `||` appears; [`Condition::has_or`] lets callers flag
/// such conditions instead of silently trusting the count.
#[derive(Debug, Clone)]
pub struct Condition {
    text: String,
    expr: Ast,
    terms: usize,
    has_or: bool,
}

impl Condition {
    /// Parse a condition text into an evaluable expression.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(ParseError::Empty);
        }

        let and_ops = tokens.iter().filter(|(t, _)| *t == Token::And).count();
        let has_or = tokens.iter().any(|(t, _)| *t == Token::Or);

        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.or()?;
        if let Some((token, at)) = parser.next() {
            return Err(ParseError::UnexpectedToken {
                token: token.render(),
                at,
            });
        }

        Ok(Self {
            text: text.to_string(),
            expr,
            terms: and_ops + 1,
            has_or,
        })
    }

    /// The original condition text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of dependency values expected in a satisfying invocation.
    pub fn terms(&self) -> usize {
        self.terms
    }

    /// Whether the expression contains `||`, making the term count
    /// heuristic rather than exact.
    pub fn has_or(&self) -> bool {
        self.has_or
    }

    /// The set of dependency names the expression references.
    pub fn variables(&self) -> BTreeSet<&str> {
        self.expr.variables()
    }

    /// Evaluate under presence semantics.
    pub fn evaluate(&self, params: &Params) -> bool {
        self.expr.evaluate(params)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
