//! Build orchestration.
//!
//! A [`Pipeline`] owns one [`DocumentSet`] and an ordered list of stages.
//! Each stage runs exactly once, in registration order, against a
//! [`Filter`] over the set restricted to the patterns it was registered
//! with. The first failing stage aborts the build.

mod registry;

pub use registry::{StageFactory, StageRegistry};

use crate::config::SiteConfig;
use crate::error::{HanaError, Result};
use crate::fileset::{DocumentSet, Filter};
use crate::plugins::{FileLoader, FileWriter};
use chrono::{DateTime, Utc};
use serde_yaml::Mapping;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One processing step of a build.
pub trait Stage {
    /// Name used in logs and in [`HanaError::Stage`].
    fn name(&self) -> &str;

    /// Process the documents visible through `files`.
    fn run(&self, files: &mut Filter<'_>, ctx: &mut BuildContext) -> Result<()>;
}

impl<S: Stage + ?Sized> Stage for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&self, files: &mut Filter<'_>, ctx: &mut BuildContext) -> Result<()> {
        (**self).run(files, ctx)
    }
}

/// A stage built from a closure. See [`stage_fn`].
pub struct FnStage<F> {
    name: String,
    f: F,
}

impl<F> Stage for FnStage<F>
where
    F: Fn(&mut Filter<'_>, &mut BuildContext) -> Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, files: &mut Filter<'_>, ctx: &mut BuildContext) -> Result<()> {
        (self.f)(files, ctx)
    }
}

/// Wrap a closure as a named [`Stage`].
pub fn stage_fn<F>(name: impl Into<String>, f: F) -> FnStage<F>
where
    F: Fn(&mut Filter<'_>, &mut BuildContext) -> Result<()>,
{
    FnStage {
        name: name.into(),
        f,
    }
}

/// Build-wide state shared by every stage.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Global site metadata.
    pub metadata: Mapping,
    pub output: PathBuf,
    pub source: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
}

/// Result of a completed build.
#[derive(Debug)]
pub struct Build {
    pub files: DocumentSet,
    pub context: BuildContext,
}

struct Registered {
    stage: Box<dyn Stage>,
    patterns: Vec<String>,
}

pub struct Pipeline {
    output: PathBuf,
    source: Option<PathBuf>,
    metadata: Mapping,
    documents: DocumentSet,
    stages: Vec<Registered>,
}

impl Pipeline {
    /// Fails with `MissingOutputDirectory` when `output` is empty.
    pub fn new(output: impl Into<PathBuf>) -> Result<Self> {
        let output = output.into();
        if output.as_os_str().is_empty() {
            return Err(HanaError::MissingOutputDirectory);
        }
        Ok(Pipeline {
            output,
            source: None,
            metadata: Mapping::new(),
            documents: DocumentSet::new(),
            stages: Vec::new(),
        })
    }

    /// Assemble `loader -> configured plugins -> writer` from a site config.
    pub fn from_config(config: &SiteConfig, registry: &StageRegistry) -> Result<Self> {
        config.validate()?;
        let source = config
            .source
            .clone()
            .ok_or(HanaError::MissingSourceDirectory)?;
        let output = config
            .output
            .clone()
            .ok_or(HanaError::MissingOutputDirectory)?;

        let loader = FileLoader::new(
            &source,
            &config.ignore,
            config.source_file_keyword.clone(),
        )?;
        let writer = FileWriter::new(&output, config.clean)?;

        let mut pipeline = Pipeline::new(output)?
            .source(source)
            .metadata(config.metadata.clone())
            .stage(loader, Vec::<String>::new());

        for plugin in &config.plugins {
            let stage = registry.create(&plugin.name, &plugin.options)?;
            pipeline = pipeline.stage(stage, plugin.patterns.iter().cloned());
        }

        Ok(pipeline.stage(writer, Vec::<String>::new()))
    }

    /// Seed the set the first stage will see.
    pub fn with_documents(mut self, documents: DocumentSet) -> Self {
        self.documents = documents;
        self
    }

    pub fn metadata(mut self, metadata: Mapping) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Register `stage` to run over the documents matching `patterns`
    /// (every document when empty).
    pub fn stage<S, I, P>(mut self, stage: S, patterns: I) -> Self
    where
        S: Stage + 'static,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.stages.push(Registered {
            stage: Box::new(stage),
            patterns: patterns.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.stage.name()).collect()
    }

    /// Run every stage once, in order. Consumes the pipeline.
    pub fn build(self) -> Result<Build> {
        let mut ctx = BuildContext {
            metadata: self.metadata,
            output: self.output,
            source: self.source,
            started_at: Utc::now(),
        };
        let mut files = self.documents;

        log::info!(
            "Building {} stage(s) into {}",
            self.stages.len(),
            ctx.output.display()
        );

        for Registered { stage, patterns } in &self.stages {
            let name = stage.name();
            let started = Instant::now();
            log::debug!("Running stage {name}");

            let mut view = files.filter(patterns.iter().cloned());
            stage
                .run(&mut view, &mut ctx)
                .map_err(|e| HanaError::Stage {
                    stage: name.to_string(),
                    source: Box::new(e),
                })?;

            log::debug!("Stage {name} finished in {:?}", started.elapsed());
        }

        log::info!(
            "Built {} document(s) in {}ms",
            files.len(),
            (Utc::now() - ctx.started_at).num_milliseconds()
        );
        Ok(Build {
            files,
            context: ctx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::query::Meta;
    use pretty_assertions::assert_eq;
    use serde_yaml::Value;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn pipeline() -> Pipeline {
        Pipeline::new("out").unwrap()
    }

    #[test]
    fn test_empty_output_is_rejected() {
        assert!(matches!(
            Pipeline::new(""),
            Err(HanaError::MissingOutputDirectory)
        ));
    }

    #[test]
    fn test_stages_run_once_in_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut p = pipeline();
        for name in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            p = p.stage(
                stage_fn(name, move |_, _| {
                    order.borrow_mut().push(name);
                    Ok(())
                }),
                Vec::<String>::new(),
            );
        }

        assert_eq!(p.stage_names(), vec!["first", "second", "third"]);
        p.build().unwrap();
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_changes_propagate_to_later_stages() {
        let build = pipeline()
            .stage(
                stage_fn("create", |files, _| {
                    files.add("index.md", Document::with_contents("# Hi"));
                    files.add("style.css", Document::with_contents("body {}"));
                    Ok(())
                }),
                Vec::<String>::new(),
            )
            .stage(
                stage_fn("tag", |files, _| {
                    files.for_each_mut(|_, doc| {
                        doc.set("tagged", true);
                        Ok(())
                    })
                }),
                ["*.md"],
            )
            .stage(
                stage_fn("rename", |files, _| {
                    for path in files.members()? {
                        files.rename(&path, path.replace(".md", ".html"))?;
                    }
                    Ok(())
                }),
                ["*.md"],
            )
            .build()
            .unwrap();

        let paths: Vec<_> = build.files.paths().collect();
        assert_eq!(paths, vec!["style.css", "index.html"]);
        assert_eq!(
            *build.files.get("index.html").unwrap().get("tagged").unwrap(),
            Value::from(true)
        );
        assert!(!build.files.get("style.css").unwrap().contains_key("tagged"));
    }

    #[test]
    fn test_stage_only_sees_its_patterns() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = Rc::clone(&seen);
        let docs: DocumentSet = [
            ("a.md", Document::new()),
            ("b.txt", Document::new()),
            ("c/d.md", Document::new()),
        ]
        .into_iter()
        .collect();

        pipeline()
            .with_documents(docs)
            .stage(
                stage_fn("record", move |files, _| {
                    recorder.borrow_mut().extend(files.members()?);
                    Ok(())
                }),
                ["*.md"],
            )
            .build()
            .unwrap();

        assert_eq!(*seen.borrow(), vec!["a.md", "c/d.md"]);
    }

    #[test]
    fn test_deletion_is_visible_to_later_stages() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = Rc::clone(&seen);
        let docs: DocumentSet = [("a.md", Document::new()), ("b.md", Document::new())]
            .into_iter()
            .collect();

        let build = pipeline()
            .with_documents(docs)
            .stage(
                stage_fn("delete", |files, _| {
                    files.remove("a.md")?;
                    Ok(())
                }),
                ["a.*"],
            )
            .stage(
                stage_fn("record", move |files, _| {
                    recorder.borrow_mut().extend(files.members()?);
                    Ok(())
                }),
                Vec::<String>::new(),
            )
            .build()
            .unwrap();

        assert_eq!(*seen.borrow(), vec!["b.md"]);
        assert!(!build.files.contains("a.md"));
    }

    #[test]
    fn test_failing_stage_aborts_the_build() {
        let ran = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&ran);

        let err = pipeline()
            .stage(
                stage_fn("broken", |files, _| {
                    files.remove("missing.md")?;
                    Ok(())
                }),
                Vec::<String>::new(),
            )
            .stage(
                stage_fn("after", move |_, _| {
                    *flag.borrow_mut() = true;
                    Ok(())
                }),
                Vec::<String>::new(),
            )
            .build()
            .unwrap_err();

        assert!(matches!(&err, HanaError::Stage { stage, .. } if stage == "broken"));
        assert!(matches!(err.root(), HanaError::NotFound { .. }));
        assert!(!*ran.borrow());
    }

    #[test]
    fn test_context_carries_metadata_between_stages() {
        let mut globals = Mapping::new();
        globals.insert("site".into(), "example".into());

        let build = pipeline()
            .metadata(globals)
            .stage(
                stage_fn("count", |files, ctx| {
                    let count = files.count()? as u64;
                    ctx.metadata.insert("pages".into(), count.into());
                    Ok(())
                }),
                Vec::<String>::new(),
            )
            .stage(
                stage_fn("stamp", |files, ctx| {
                    let pages = ctx.metadata.get("pages").cloned().unwrap_or_default();
                    files.for_each_mut(|_, doc| {
                        doc.set("pages", pages.clone());
                        Ok(())
                    })
                }),
                Vec::<String>::new(),
            )
            .with_documents(
                [("a", Document::new()), ("b", Document::new())]
                    .into_iter()
                    .collect(),
            )
            .build()
            .unwrap();

        assert_eq!(build.context.metadata.get("site"), Some(&Value::from("example")));
        assert_eq!(
            *build.files.get("a").unwrap().get("pages").unwrap(),
            Value::from(2)
        );
    }

    #[test]
    fn test_predicate_stage() {
        let docs: DocumentSet = [
            ("a.md", Document::new().with_attr("draft", true)),
            ("b.md", Document::new().with_attr("draft", false)),
        ]
        .into_iter()
        .collect();

        let build = pipeline()
            .with_documents(docs)
            .stage(
                stage_fn("drop-drafts", |files, _| {
                    let drafts = files
                        .documents_mut()
                        .query()
                        .matching(Meta::key("draft").eq(true))
                        .members()?;
                    for path in drafts {
                        files.remove(&path)?;
                    }
                    Ok(())
                }),
                Vec::<String>::new(),
            )
            .build()
            .unwrap();

        assert_eq!(build.files.paths().collect::<Vec<_>>(), vec!["b.md"]);
    }

    #[test]
    fn test_from_config_end_to_end() {
        use crate::config::parse_config;
        use std::fs;
        use tempfile::TempDir;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("content/posts")).unwrap();
        fs::write(
            root.join("content/posts/hello.md"),
            "---\ntitle: Hello\n---\nHello world\n",
        )
        .unwrap();
        fs::write(root.join("content/about.md"), "About").unwrap();
        fs::write(root.join("content/notes.swp"), "junk").unwrap();
        fs::write(
            root.join("hana.yaml"),
            r#"
source: content
output: public
ignore: ["*.swp"]
metadata:
  site_name: Example
plugins:
  - name: front_matter
    patterns: ["*.md"]
  - name: metadata
    patterns: ["posts/**"]
    options:
      layout: post
  - name: ignore
    options: ["about.md"]
"#,
        )
        .unwrap();

        let config = parse_config(&root.join("hana.yaml")).unwrap();
        let pipeline = Pipeline::from_config(&config, &StageRegistry::with_builtins()).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec!["file_loader", "front_matter", "metadata", "ignore", "file_writer"]
        );

        let build = pipeline.build().unwrap();
        assert_eq!(build.files.paths().collect::<Vec<_>>(), vec!["posts/hello.md"]);

        let hello = build.files.get("posts/hello.md").unwrap();
        assert_eq!(*hello.get("title").unwrap(), Value::from("Hello"));
        assert_eq!(*hello.get("layout").unwrap(), Value::from("post"));
        assert_eq!(
            build.context.metadata.get("site_name"),
            Some(&Value::from("Example"))
        );
        assert_eq!(build.context.source, Some(root.join("content")));

        assert_eq!(
            fs::read_to_string(root.join("public/posts/hello.md")).unwrap(),
            "Hello world\n"
        );
        assert!(!root.join("public/about.md").exists());
        assert!(!root.join("public/notes.swp").exists());
    }

    #[test]
    fn test_from_config_rejects_unknown_plugin() {
        use crate::config::parse_config_str;
        use tempfile::TempDir;

        let tmp = TempDir::new().unwrap();
        let mut config =
            parse_config_str("source: .\noutput: out\nplugins:\n  - name: sass\n").unwrap();
        config.resolve_paths(tmp.path());

        let err = Pipeline::from_config(&config, &StageRegistry::with_builtins()).err().unwrap();
        assert!(matches!(err, HanaError::PluginNotFound(name) if name == "sass"));
    }

    #[test]
    fn test_from_config_validates_first() {
        let config = crate::config::parse_config_str("output: out").unwrap();
        let err = Pipeline::from_config(&config, &StageRegistry::new()).err().unwrap();
        assert!(matches!(err, HanaError::MissingSourceDirectory));
    }
}
