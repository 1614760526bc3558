pub mod parser;
pub mod types;

pub use parser::{parse_config, parse_config_str, CONFIG_FILE};
pub use types::{PluginConfig, SiteConfig};
