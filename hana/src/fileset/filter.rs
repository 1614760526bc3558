use super::DocumentSet;
use crate::document::Document;
use crate::error::{HanaError, Result};
use crate::query::{Direction, OrderKey, PatternSet, Predicate};
use crate::util::sort_order;
use serde_yaml::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

/// A deferred view over a [`DocumentSet`].
///
/// Selection is the union of the path patterns (all paths when there are
/// none), narrowed by every predicate, optionally ordered and capped. Nothing
/// is evaluated until the view is consumed, and every consumption evaluates
/// the selection afresh against the current state of the set.
///
/// Structural changes (`add`, `remove`, `rename`) go straight to the
/// underlying set, so they are visible to the set and to every later view.
pub struct Filter<'a> {
    set: &'a mut DocumentSet,
    patterns: Vec<String>,
    predicates: Vec<Predicate>,
    limit: Option<usize>,
    order: Option<OrderKey>,
}

impl<'a> Filter<'a> {
    pub(crate) fn new(set: &'a mut DocumentSet) -> Self {
        Filter {
            set,
            patterns: Vec::new(),
            predicates: Vec::new(),
            limit: None,
            order: None,
        }
    }

    // ── Building ───────────────────────────────────────────────────

    /// Add path patterns. Patterns are OR-combined; later patterns take
    /// precedence for negation (`!pattern`). Repeating a pattern moves it to
    /// its latest position.
    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for pattern in patterns {
            let pattern = pattern.into();
            self.patterns.retain(|p| p != &pattern);
            self.patterns.push(pattern);
        }
        self
    }

    pub fn pattern(self, pattern: impl Into<String>) -> Self {
        self.patterns([pattern.into()])
    }

    /// Require `predicate` to hold. Predicates are AND-combined.
    pub fn matching(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Cap the number of results. `0` means no cap.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn order_by(mut self, key: OrderKey) -> Self {
        self.order = Some(key);
        self
    }

    pub fn pattern_list(&self) -> &[String] {
        &self.patterns
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    // ── Consuming ──────────────────────────────────────────────────

    fn select(&self) -> Result<Vec<(&str, &Document)>> {
        let matcher = PatternSet::compile(&self.patterns)?;
        let mut selected = Vec::new();

        for (path, doc) in self.set.iter() {
            if let Some(matcher) = &matcher {
                if !matcher.matches(path) {
                    continue;
                }
            }
            if !self.accepts(path, doc)? {
                continue;
            }
            selected.push((path, doc));

            if self.order.is_none() && self.limit == Some(selected.len()) {
                break;
            }
        }

        if let Some(order) = &self.order {
            selected = sort_selection(selected, order)?;
            if let Some(limit) = self.limit {
                selected.truncate(limit);
            }
        }

        Ok(selected)
    }

    fn accepts(&self, path: &str, doc: &Document) -> Result<bool> {
        for predicate in &self.predicates {
            match predicate.test(doc) {
                Ok(Some(true)) => {}
                Ok(Some(false)) | Ok(None) => return Ok(false),
                Err(e @ HanaError::TypeMismatch { .. }) => {
                    log::debug!("Excluding {path}: {predicate}: {e}");
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    /// Snapshot of the matching paths. The caller may change the set while
    /// walking it.
    pub fn members(&self) -> Result<Vec<String>> {
        Ok(self
            .select()?
            .into_iter()
            .map(|(path, _)| path.to_string())
            .collect())
    }

    /// Matching entries, in insertion order or the requested order.
    pub fn iter(&self) -> Result<impl Iterator<Item = (&str, &Document)> + '_> {
        Ok(self.select()?.into_iter())
    }

    /// Run `f` over every matching document with mutable access.
    pub fn for_each_mut<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&str, &mut Document) -> Result<()>,
    {
        for path in self.members()? {
            if let Some(doc) = self.set.entries.get_mut(path.as_str()) {
                f(&path, doc)?;
            }
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.select()?.len())
    }

    pub fn contains(&self, path: &str) -> Result<bool> {
        Ok(self.select()?.iter().any(|(p, _)| *p == path))
    }

    // ── Delegation to the underlying set ───────────────────────────

    pub fn get(&self, path: &str) -> Result<&Document> {
        self.set.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Result<&mut Document> {
        self.set.get_mut(path)
    }

    pub fn add(&mut self, path: impl Into<String>, doc: Document) -> Option<Document> {
        self.set.add(path, doc)
    }

    pub fn insert_new(&mut self, path: impl Into<String>, doc: Document) -> Result<()> {
        self.set.insert_new(path, doc)
    }

    pub fn remove(&mut self, path: &str) -> Result<Document> {
        self.set.remove(path)
    }

    pub fn rename(&mut self, old: &str, new: impl Into<String>) -> Result<()> {
        self.set.rename(old, new)
    }

    pub fn documents(&self) -> &DocumentSet {
        self.set
    }

    pub fn documents_mut(&mut self) -> &mut DocumentSet {
        self.set
    }
}

/// Stable sort by the resolved key. Documents without the key go last in
/// either direction.
fn sort_selection<'s>(
    selected: Vec<(&'s str, &'s Document)>,
    order: &OrderKey,
) -> Result<Vec<(&'s str, &'s Document)>> {
    let mut keyed: Vec<(Option<Cow<'s, Value>>, (&'s str, &'s Document))> = selected
        .into_iter()
        .map(|entry| -> Result<_> { Ok((entry.1.lookup(order.path())?, entry)) })
        .collect::<Result<_>>()?;

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => match order.direction() {
            Direction::Asc => sort_order(a, b),
            Direction::Desc => sort_order(b, a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    Ok(keyed.into_iter().map(|(_, entry)| entry).collect())
}
