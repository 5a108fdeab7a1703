//! Variable substitution for bar templates.
//!
//! A template references variables as `:{name}`. A width can be placed between the colon and
//! the brace, `:3{percentage}` right-aligns the value in three columns and `:-3{percentage}`
//! left-aligns it. Calls such as `:{color(green)}` expand the color macros.
//!
//! Rendering substitutes twice, so a variable may expand into further references.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use console::{Alignment, pad_str};

use crate::colors;

/// Closure computing a variable from the ones already resolved
pub type Compute = Arc<dyn Fn(&Resolved) -> String + Send + Sync>;

#[derive(Clone)]
pub enum Value {
    Literal(String),
    Computed(Compute),
}

impl Value {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Resolved) -> String + Send + Sync + 'static,
    {
        Value::Computed(Arc::new(f))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Value::Computed(_) => write!(f, "Computed(..)"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Literal(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Literal(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Literal(value.clone())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Literal(value.to_string())
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Literal(value.to_string())
    }
}

/// Ordered set of template variables, later insertions of a key replace the earlier value
#[derive(Clone, Debug, Default)]
pub struct Variables {
    entries: Vec<(String, Value)>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.set(key, value);
        self
    }

    pub fn set<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let (key, value) = (key.into(), value.into());
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overrides entries with the ones from `other`, key by key
    pub fn merge(&mut self, other: &Variables) -> &mut Self {
        for (key, value) in &other.entries {
            self.set(key.clone(), value.clone());
        }
        self
    }

    pub fn merged(&self, other: &Variables) -> Variables {
        let mut vars = self.clone();
        vars.merge(other);
        vars
    }

    /// Evaluates every variable. Literals come first, computed values then run in order and
    /// see everything resolved before them.
    pub fn resolve(&self) -> Resolved {
        let mut resolved = Resolved::default();
        for (key, value) in &self.entries {
            if let Value::Literal(literal) = value {
                resolved.insert(key, literal.clone());
            }
        }
        for (key, value) in &self.entries {
            if let Value::Computed(compute) = value {
                let computed = compute(&resolved);
                resolved.insert(key, computed);
            }
        }

        resolved
    }
}

/// Variables evaluated to plain strings
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolved(HashMap<String, String>);

impl Resolved {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn insert(&mut self, key: &str, value: String) {
        self.0.insert(key.to_string(), value);
    }
}

/// Renders `text` with `base` variables overridden by `overrides`.
///
/// A computed variable of `base` that is also present in `overrides` wins the first pass,
/// evaluated against the overridden value, and the second pass uses the overridden value.
/// This lets a base variable wrap a builtin one, e.g. `label` computing `":{label}: :{tag}"`.
pub fn render(text: &str, base: &Variables, overrides: &Variables) -> String {
    let plain = base.merged(overrides).resolve();

    let mut first = plain.clone();
    for (key, value) in base.iter() {
        if let Value::Computed(compute) = value
            && overrides.contains(key)
        {
            first.insert(key, compute(&plain));
        }
    }

    substitute(&substitute(text, &first), &plain)
}

/// Single substitution pass; unknown references are left untouched
pub fn substitute(text: &str, scope: &Resolved) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find(':') {
        out.push_str(&rest[..at]);
        let candidate = &rest[at..];
        match Token::parse(candidate) {
            Some(token) => {
                match token.expand(scope) {
                    Some(value) => out.push_str(&token.pad(&value)),
                    None => out.push_str(&candidate[..token.len]),
                }
                rest = &candidate[token.len..];
            }
            None => {
                out.push(':');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);

    out
}

#[derive(Debug, PartialEq)]
struct Token<'a> {
    name: &'a str,
    args: Vec<&'a str>,
    width: i64,
    len: usize,
}

impl<'a> Token<'a> {
    fn parse(input: &'a str) -> Option<Self> {
        let body = input.strip_prefix(':')?;
        let open = body.find('{')?;
        let width = match &body[..open] {
            "" => 0,
            digits => {
                let unsigned = digits.strip_prefix('-').unwrap_or(digits);
                if unsigned.is_empty() || !unsigned.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                digits.parse().ok()?
            }
        };
        let close = open + body[open..].find('}')?;
        let inner = &body[open + 1..close];
        if inner.is_empty() || inner.contains('{') {
            return None;
        }

        let (name, args) = match inner.find('(') {
            Some(paren) if inner.ends_with(')') => {
                let args = inner[paren + 1..inner.len() - 1]
                    .split(',')
                    .map(str::trim)
                    .filter(|arg| !arg.is_empty())
                    .collect();
                (&inner[..paren], args)
            }
            _ => (inner, vec![]),
        };

        Some(Self {
            name,
            args,
            width,
            len: 1 + close + 1,
        })
    }

    fn expand(&self, scope: &Resolved) -> Option<String> {
        scope
            .get(self.name)
            .map(str::to_string)
            .or_else(|| colors::lookup(self.name, &self.args))
    }

    fn pad(&self, value: &str) -> String {
        let width = self.width.unsigned_abs() as usize;
        match self.width {
            0 => value.to_string(),
            w if w > 0 => pad_str(value, width, Alignment::Right, None).into_owned(),
            _ => pad_str(value, width, Alignment::Left, None).into_owned(),
        }
    }
}
