pub mod config;
pub mod document;
pub mod error;
pub mod fileset;
pub mod pipeline;
pub mod plugins;
pub mod query;
pub mod util;

pub use config::{parse_config, parse_config_str, SiteConfig};
pub use document::{Contents, Document};
pub use error::{HanaError, Result};
pub use fileset::{DocumentSet, Filter};
pub use pipeline::{stage_fn, Build, BuildContext, Pipeline, Stage, StageRegistry};
pub use query::{Meta, Predicate};
