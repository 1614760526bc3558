use crate::error::Result;
use crate::fileset::Filter;
use crate::pipeline::{BuildContext, Stage};
use serde_yaml::Mapping;

/// Merges a fixed mapping into every document's attributes.
#[derive(Debug, Clone)]
pub struct Metadata {
    values: Mapping,
}

impl Metadata {
    pub fn new(values: Mapping) -> Self {
        Metadata { values }
    }
}

impl Stage for Metadata {
    fn name(&self) -> &str {
        "metadata"
    }

    fn run(&self, files: &mut Filter<'_>, _ctx: &mut BuildContext) -> Result<()> {
        files.for_each_mut(|_, doc| {
            doc.merge(&self.values);
            Ok(())
        })
    }
}
