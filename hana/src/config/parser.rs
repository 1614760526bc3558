use super::types::SiteConfig;
use crate::error::Result;
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "hana.yaml";

/// Parse a hana.yaml file. Relative directories are taken relative to the
/// file's own directory.
pub fn parse_config(path: &Path) -> Result<SiteConfig> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config_str(&content)?;
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    Ok(config)
}

/// Parse a hana.yaml string. Paths are left as written.
pub fn parse_config_str(content: &str) -> Result<SiteConfig> {
    let config: SiteConfig = serde_yaml::from_str(content)?;
    Ok(config)
}
