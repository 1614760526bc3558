use crate::error::{HanaError, Result};
use crate::fileset::Filter;
use crate::pipeline::{BuildContext, Stage};
use serde_yaml::Value;

/// Lifts a leading `---` YAML block out of text documents into their
/// attributes. Binary documents and documents without front matter are
/// left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontMatter;

impl Stage for FrontMatter {
    fn name(&self) -> &str {
        "front_matter"
    }

    fn run(&self, files: &mut Filter<'_>, _ctx: &mut BuildContext) -> Result<()> {
        files.for_each_mut(|path, doc| {
            if doc.is_binary()? {
                return Ok(());
            }
            let Some(text) = doc.contents()?.as_text() else {
                return Ok(());
            };
            let Some((header, body)) = split_front_matter(text) else {
                return Ok(());
            };
            let (header, body) = (header.to_string(), body.to_string());

            match serde_yaml::from_str::<Value>(&header)? {
                Value::Null => {}
                Value::Mapping(mapping) => doc.merge(&mapping),
                other => {
                    return Err(HanaError::InvalidDocument(format!(
                        "{path}: front matter must be a mapping, found {}",
                        crate::util::type_name(&other)
                    )))
                }
            }
            doc.set_contents(body);
            Ok(())
        })
    }
}

/// Split `text` into its front matter block and the remaining body.
///
/// The block opens with a `---` line at the very start and closes with the
/// next `---` (or `...`) line.
pub fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first_break = text.find('\n')?;
    if text[..first_break].trim_end() != "---" {
        return None;
    }

    let rest = &text[first_break + 1..];
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let fence = line.trim_end();
        if fence == "---" || fence == "..." {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::fileset::DocumentSet;
    use crate::pipeline::Pipeline;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split() {
        let (header, body) = split_front_matter("---\ntitle: Hi\n---\nBody\n").unwrap();
        assert_eq!(header, "title: Hi\n");
        assert_eq!(body, "Body\n");
    }

    #[test]
    fn test_split_empty_block_and_crlf() {
        assert_eq!(split_front_matter("---\n---\nBody"), Some(("", "Body")));
        assert_eq!(
            split_front_matter("---\r\na: 1\r\n---\r\nBody"),
            Some(("a: 1\r\n", "Body"))
        );
    }

    #[test]
    fn test_split_requires_opening_and_closing_fence() {
        assert_eq!(split_front_matter("title: Hi\n---\nBody"), None);
        assert_eq!(split_front_matter("---\ntitle: Hi\nBody"), None);
        assert_eq!(split_front_matter(""), None);
    }

    fn run(docs: DocumentSet) -> Result<DocumentSet> {
        Pipeline::new("out")?
            .with_documents(docs)
            .stage(FrontMatter, Vec::<String>::new())
            .build()
            .map(|build| build.files)
    }

    #[test]
    fn test_front_matter_becomes_attributes() {
        let docs: DocumentSet = [
            (
                "post.md",
                Document::with_contents("---\ntitle: Hello\ntags: [a, b]\n---\n# Hello\n"),
            ),
            ("plain.md", Document::with_contents("no header")),
            ("logo.png", Document::with_contents(vec![0x89, b'P', 0, 0])),
        ]
        .into_iter()
        .collect();

        let files = run(docs).unwrap();

        let post = files.get("post.md").unwrap();
        assert_eq!(*post.get("title").unwrap(), Value::from("Hello"));
        assert_eq!(post.contents().unwrap().as_text(), Some("# Hello\n"));

        let plain = files.get("plain.md").unwrap();
        assert!(plain.attributes().is_empty());
        assert_eq!(plain.contents().unwrap().as_text(), Some("no header"));

        assert!(files.get("logo.png").unwrap().attributes().is_empty());
    }

    #[test]
    fn test_invalid_front_matter_fails_the_build() {
        let docs: DocumentSet = [("bad.md", Document::with_contents("---\n: [\n---\nBody"))]
            .into_iter()
            .collect();
        let err = run(docs).unwrap_err();
        assert!(matches!(err.root(), HanaError::Yaml(_)));
    }
}
