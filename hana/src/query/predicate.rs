use crate::document::Document;
use crate::error::{HanaError, Result};
use crate::util::{compare, string_form, type_name};
use regex::{Regex, RegexBuilder};
use serde_yaml::Value;
use std::cmp::Ordering;
use std::fmt;

/// Names an attribute path and builds predicates and sort keys over it.
///
/// Every operator borrows the builder and returns a fresh [`Predicate`], so
/// several predicates can be built from one `Meta` without sharing state.
///
/// ```
/// use hana::query::Meta;
///
/// let title = Meta::key("title");
/// let is_x = title.eq("x");
/// let is_y = title.eq("y");
/// assert!(is_x.eval(&"x".into()).unwrap());
/// assert!(is_y.eval(&"y".into()).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Meta {
    path: Vec<String>,
}

impl Meta {
    pub fn key(name: impl Into<String>) -> Self {
        Meta {
            path: vec![name.into()],
        }
    }

    pub fn path<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Meta {
            path: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a dotted path such as `author.name`.
    pub fn dotted(path: &str) -> Self {
        Meta::path(path.split('.').filter(|segment| !segment.is_empty()))
    }

    /// Extend the path one level down.
    pub fn get(mut self, name: impl Into<String>) -> Self {
        self.path.push(name.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.path
    }

    fn bind(&self, op: Op) -> Predicate {
        Predicate {
            path: self.path.clone(),
            op,
        }
    }

    pub fn eq(&self, value: impl Into<Value>) -> Predicate {
        self.bind(Op::Eq(value.into()))
    }

    pub fn ne(&self, value: impl Into<Value>) -> Predicate {
        self.bind(Op::Ne(value.into()))
    }

    pub fn lt(&self, value: impl Into<Value>) -> Predicate {
        self.bind(Op::Lt(value.into()))
    }

    pub fn le(&self, value: impl Into<Value>) -> Predicate {
        self.bind(Op::Le(value.into()))
    }

    pub fn gt(&self, value: impl Into<Value>) -> Predicate {
        self.bind(Op::Gt(value.into()))
    }

    pub fn ge(&self, value: impl Into<Value>) -> Predicate {
        self.bind(Op::Ge(value.into()))
    }

    /// Candidate is an element of a list, a substring of a string, or a key
    /// of a mapping.
    pub fn in_(&self, value: impl Into<Value>) -> Predicate {
        self.bind(Op::In(value.into()))
    }

    pub fn not_in(&self, value: impl Into<Value>) -> Predicate {
        self.bind(Op::NotIn(value.into()))
    }

    pub fn starts_with(&self, prefix: impl Into<String>) -> Predicate {
        self.bind(Op::StartsWith(prefix.into()))
    }

    pub fn ends_with(&self, suffix: impl Into<String>) -> Predicate {
        self.bind(Op::EndsWith(suffix.into()))
    }

    /// Regular expression matched from the start of the candidate's string
    /// form. The pattern is compiled here, once.
    pub fn matches(&self, pattern: &str, flags: RegexFlags) -> Result<Predicate> {
        let regex = RegexBuilder::new(&format!(r"\A(?:{pattern})"))
            .case_insensitive(flags.ignore_case)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_all)
            .build()
            .map_err(|e| HanaError::pattern(pattern, e))?;
        Ok(self.bind(Op::Matches(regex)))
    }

    pub fn asc(&self) -> OrderKey {
        OrderKey {
            path: self.path.clone(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(&self) -> OrderKey {
        OrderKey {
            path: self.path.clone(),
            direction: Direction::Desc,
        }
    }
}

/// Options for [`Meta::matches`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegexFlags {
    pub ignore_case: bool,
    pub multi_line: bool,
    pub dot_all: bool,
}

impl RegexFlags {
    pub fn ignore_case() -> Self {
        RegexFlags {
            ignore_case: true,
            ..RegexFlags::default()
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Eq(Value),
    Ne(Value),
    Lt(Value),
    Le(Value),
    Gt(Value),
    Ge(Value),
    In(Value),
    NotIn(Value),
    StartsWith(String),
    EndsWith(String),
    Matches(Regex),
}

impl Op {
    fn name(&self) -> &'static str {
        match self {
            Op::Eq(_) => "==",
            Op::Ne(_) => "!=",
            Op::Lt(_) => "<",
            Op::Le(_) => "<=",
            Op::Gt(_) => ">",
            Op::Ge(_) => ">=",
            Op::In(_) => "in",
            Op::NotIn(_) => "not in",
            Op::StartsWith(_) => "starts with",
            Op::EndsWith(_) => "ends with",
            Op::Matches(_) => "matches",
        }
    }
}

/// A bound condition over one attribute path.
#[derive(Debug, Clone)]
pub struct Predicate {
    path: Vec<String>,
    op: Op,
}

impl Predicate {
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Apply the bound operator to a candidate value: `candidate OP bound`.
    /// Ordering between values of different kinds is a `TypeMismatch`.
    pub fn eval(&self, candidate: &Value) -> Result<bool> {
        match &self.op {
            Op::Eq(bound) => Ok(candidate == bound),
            Op::Ne(bound) => Ok(candidate != bound),
            Op::Lt(bound) => self.ordered(bound, candidate, Ordering::is_lt),
            Op::Le(bound) => self.ordered(bound, candidate, Ordering::is_le),
            Op::Gt(bound) => self.ordered(bound, candidate, Ordering::is_gt),
            Op::Ge(bound) => self.ordered(bound, candidate, Ordering::is_ge),
            Op::In(bound) => self.contained(bound, candidate),
            Op::NotIn(bound) => self.contained(bound, candidate).map(|found| !found),
            Op::StartsWith(prefix) => Ok(string_form(candidate).starts_with(prefix.as_str())),
            Op::EndsWith(suffix) => Ok(string_form(candidate).ends_with(suffix.as_str())),
            Op::Matches(regex) => Ok(regex.is_match(&string_form(candidate))),
        }
    }

    /// Evaluate against a document. `Ok(None)` when the attribute path is
    /// absent on the document.
    pub fn test(&self, doc: &Document) -> Result<Option<bool>> {
        match doc.lookup(&self.path)? {
            Some(value) => self.eval(&value).map(Some),
            None => Ok(None),
        }
    }

    fn ordered(
        &self,
        bound: &Value,
        candidate: &Value,
        accept: fn(Ordering) -> bool,
    ) -> Result<bool> {
        match compare(candidate, bound) {
            Some(ordering) => Ok(accept(ordering)),
            None => Err(self.mismatch(bound, candidate)),
        }
    }

    fn contained(&self, bound: &Value, candidate: &Value) -> Result<bool> {
        match (bound, candidate) {
            (Value::Sequence(items), _) => Ok(items.contains(candidate)),
            (Value::String(haystack), Value::String(needle)) => {
                Ok(haystack.contains(needle.as_str()))
            }
            (Value::Mapping(map), _) => Ok(map.contains_key(candidate)),
            _ => Err(self.mismatch(bound, candidate)),
        }
    }

    fn mismatch(&self, bound: &Value, candidate: &Value) -> HanaError {
        HanaError::TypeMismatch {
            op: self.op.name(),
            bound: type_name(bound),
            candidate: type_name(candidate),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = match &self.op {
            Op::Eq(v) | Op::Ne(v) | Op::Lt(v) | Op::Le(v) | Op::Gt(v) | Op::Ge(v) => string_form(v),
            Op::In(v) | Op::NotIn(v) => string_form(v),
            Op::StartsWith(s) | Op::EndsWith(s) => s.clone(),
            Op::Matches(regex) => regex.as_str().to_string(),
        };
        write!(f, "{} {} {}", self.path.join("."), self.op.name(), bound)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Sort key for [`Filter::order_by`](crate::fileset::Filter::order_by).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    path: Vec<String>,
    direction: Direction,
}

impl OrderKey {
    pub fn new(key: Meta, direction: Direction) -> Self {
        OrderKey {
            path: key.path,
            direction,
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}
