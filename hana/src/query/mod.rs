// Query building blocks - attribute predicates, sort keys and path patterns

mod pattern;
mod predicate;

pub use pattern::PatternSet;
pub use predicate::{Direction, Meta, OrderKey, Predicate, RegexFlags};
