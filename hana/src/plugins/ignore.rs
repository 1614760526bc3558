use crate::error::Result;
use crate::fileset::Filter;
use crate::pipeline::{BuildContext, Stage};
use crate::query::PatternSet;

/// Drops every document whose path matches one of the patterns.
#[derive(Debug, Clone)]
pub struct Ignore {
    matcher: Option<PatternSet>,
}

impl Ignore {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Ignore {
            matcher: PatternSet::compile(patterns)?,
        })
    }
}

impl Stage for Ignore {
    fn name(&self) -> &str {
        "ignore"
    }

    fn run(&self, files: &mut Filter<'_>, _ctx: &mut BuildContext) -> Result<()> {
        let Some(matcher) = &self.matcher else {
            return Ok(());
        };
        for path in files.members()? {
            if matcher.matches(&path) {
                log::debug!("Ignoring {path}");
                files.remove(&path)?;
            }
        }
        Ok(())
    }
}
