use clap::{Parser, Subcommand, ValueEnum};
use hana::plugins::{FileLoader, FrontMatter};
use hana::{parse_config, Meta, Pipeline, StageRegistry};
use std::path::{Path, PathBuf};
use std::process;

/// Build a static site from a source tree of documents
#[derive(Parser)]
#[command(name = "hana", version, about)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "yaml", global = true)]
    format: OutputFormat,

    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline described by a site configuration
    Build {
        /// Path to the site configuration
        #[arg(long, default_value = hana::config::CONFIG_FILE)]
        config: PathBuf,
        /// Empty the output directory before writing
        #[arg(long)]
        clean: bool,
    },

    /// List the documents of a source tree that match a query
    Ls {
        /// Source directory (default: current directory)
        #[arg(long, default_value = ".")]
        source: PathBuf,
        /// Path patterns, OR-combined (e.g. --pattern "*.md")
        #[arg(long = "pattern")]
        patterns: Vec<String>,
        /// Attribute equality filters, AND-combined (e.g. --where layout=post)
        #[arg(long = "where", value_parser = parse_key_value)]
        conditions: Vec<(String, String)>,
        /// Patterns the loader skips
        #[arg(long)]
        ignore: Vec<String>,
        /// Maximum number of results (0 = no limit)
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Sort by attribute (dotted path)
        #[arg(long)]
        order_by: Option<String>,
        /// Sort descending
        #[arg(long, requires = "order_by")]
        desc: bool,
        /// Parse YAML front matter into attributes first
        #[arg(long)]
        front_matter: bool,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Interpret a command-line value as a YAML scalar (`3`, `true`, `x`).
fn parse_scalar(raw: &str) -> serde_yaml::Value {
    match serde_yaml::from_str::<serde_yaml::Value>(raw) {
        Ok(value @ (serde_yaml::Value::Bool(_)
        | serde_yaml::Value::Number(_)
        | serde_yaml::Value::String(_))) => value,
        _ => serde_yaml::Value::String(raw.to_string()),
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Build { config, clean } => {
            let result = build(&config, clean)?;
            print_output(&result, &cli.format)?;
        }
        Command::Ls {
            source,
            patterns,
            conditions,
            ignore,
            limit,
            order_by,
            desc,
            front_matter,
        } => {
            let query = ListQuery {
                patterns,
                conditions,
                limit,
                order_by,
                desc,
            };
            let docs = list(&source, &ignore, front_matter, &query)?;
            print_output(&serde_json::Value::Array(docs), &cli.format)?;
        }
    }
    Ok(())
}

fn build(config_path: &Path, clean: bool) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let mut config = parse_config(config_path)?;
    config.clean |= clean;
    log::debug!("Loaded site configuration from {}", config_path.display());

    let pipeline = Pipeline::from_config(&config, &StageRegistry::with_builtins())?;
    let stages: Vec<String> = pipeline.stage_names().into_iter().map(String::from).collect();
    let output = pipeline.output().display().to_string();
    let build = pipeline.build()?;

    Ok(serde_json::json!({
        "ok": true,
        "documents": build.files.len(),
        "output": output,
        "stages": stages,
        "started_at": build.context.started_at.to_rfc3339(),
    }))
}

struct ListQuery {
    patterns: Vec<String>,
    conditions: Vec<(String, String)>,
    limit: usize,
    order_by: Option<String>,
    desc: bool,
}

fn list(
    source: &Path,
    ignore: &[String],
    front_matter: bool,
    query: &ListQuery,
) -> Result<Vec<serde_json::Value>, Box<dyn std::error::Error>> {
    let mut pipeline = Pipeline::new(source)?.stage(
        FileLoader::new(source, ignore, None)?,
        Vec::<String>::new(),
    );
    if front_matter {
        pipeline = pipeline.stage(FrontMatter, Vec::<String>::new());
    }
    let mut files = pipeline.build()?.files;

    let mut filter = files
        .query()
        .patterns(query.patterns.iter().cloned())
        .limit(query.limit);
    for (key, raw) in &query.conditions {
        filter = filter.matching(Meta::dotted(key).eq(parse_scalar(raw)));
    }
    if let Some(key) = &query.order_by {
        let key = Meta::dotted(key);
        filter = filter.order_by(if query.desc { key.desc() } else { key.asc() });
    }

    let mut docs = Vec::new();
    for (path, doc) in filter.iter()? {
        let attributes = serde_json::to_value(doc.attributes())?;
        docs.push(serde_json::json!({
            "path": path,
            "binary": doc.is_binary()?,
            "attributes": attributes,
        }));
    }
    Ok(docs)
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_source() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("posts")).unwrap();
        fs::write(root.join("posts/a.md"), "---\nrank: 2\nlayout: post\n---\nA").unwrap();
        fs::write(root.join("posts/b.md"), "---\nrank: 1\nlayout: post\n---\nB").unwrap();
        fs::write(root.join("about.md"), "---\nlayout: page\n---\nAbout").unwrap();
        fs::write(root.join("logo.png"), [0u8, 1, 2]).unwrap();
        tmp
    }

    fn query() -> ListQuery {
        ListQuery {
            patterns: Vec::new(),
            conditions: Vec::new(),
            limit: 0,
            order_by: None,
            desc: false,
        }
    }

    fn paths(docs: &[serde_json::Value]) -> Vec<&str> {
        docs.iter().map(|d| d["path"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("layout=post").unwrap(),
            ("layout".to_string(), "post".to_string())
        );
        assert_eq!(
            parse_key_value("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("layout").is_err());
    }

    #[test]
    fn test_parse_scalar() {
        assert_eq!(parse_scalar("3"), serde_yaml::Value::from(3));
        assert_eq!(parse_scalar("true"), serde_yaml::Value::from(true));
        assert_eq!(parse_scalar("post"), serde_yaml::Value::from("post"));
        assert_eq!(parse_scalar("[a"), serde_yaml::Value::from("[a"));
    }

    #[test]
    fn test_list_all() {
        let src = setup_source();
        let docs = list(src.path(), &[], false, &query()).unwrap();
        assert_eq!(paths(&docs), vec!["about.md", "logo.png", "posts/a.md", "posts/b.md"]);
        assert_eq!(docs[1]["binary"], serde_json::json!(true));
    }

    #[test]
    fn test_list_with_front_matter_conditions_and_order() {
        let src = setup_source();
        let q = ListQuery {
            patterns: vec!["*.md".into()],
            conditions: vec![("layout".into(), "post".into())],
            order_by: Some("rank".into()),
            ..query()
        };
        let docs = list(src.path(), &[], true, &q).unwrap();
        assert_eq!(paths(&docs), vec!["posts/b.md", "posts/a.md"]);
        assert_eq!(docs[0]["attributes"]["rank"], serde_json::json!(1));
    }

    #[test]
    fn test_list_ignore_and_limit() {
        let src = setup_source();
        let q = ListQuery {
            limit: 1,
            ..query()
        };
        let docs = list(src.path(), &["*.png".to_string(), "about.md".to_string()], false, &q)
            .unwrap();
        assert_eq!(paths(&docs), vec!["posts/a.md"]);
    }

    #[test]
    fn test_build_from_config() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("content")).unwrap();
        fs::write(root.join("content/index.md"), "---\ntitle: Home\n---\nHome").unwrap();
        fs::write(
            root.join("hana.yaml"),
            "source: content\noutput: public\nplugins:\n  - name: front_matter\n",
        )
        .unwrap();

        let result = build(&root.join("hana.yaml"), true).unwrap();
        assert_eq!(result["documents"], serde_json::json!(1));
        assert_eq!(
            fs::read_to_string(root.join("public/index.md")).unwrap(),
            "Home"
        );
    }

    #[test]
    fn test_build_missing_config() {
        let tmp = TempDir::new().unwrap();
        assert!(build(&tmp.path().join("hana.yaml"), false).is_err());
    }
}
