use crate::error::{HanaError, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Compiled gitignore-style path patterns (`*`, `**`, leading `!` negation).
///
/// A path matches when the last pattern that applies to it is a positive
/// one. A pattern naming a directory also matches everything below it.
#[derive(Debug, Clone)]
pub struct PatternSet {
    matcher: Gitignore,
}

impl PatternSet {
    /// Compile `patterns`. Returns `None` for an empty set.
    pub fn compile<I, S>(patterns: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new("");
        let mut any = false;
        for pattern in patterns {
            let pattern = pattern.as_ref();
            builder
                .add_line(None, pattern)
                .map_err(|e| HanaError::pattern(pattern, e))?;
            any = true;
        }
        if !any {
            return Ok(None);
        }
        let matcher = builder
            .build()
            .map_err(|e| HanaError::pattern("<pattern set>", e))?;
        Ok(Some(PatternSet { matcher }))
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(path, false)
            .is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> PatternSet {
        PatternSet::compile(patterns).unwrap().unwrap()
    }

    #[test]
    fn test_empty_set_compiles_to_none() {
        assert!(PatternSet::compile(Vec::<String>::new()).unwrap().is_none());
    }

    #[test]
    fn test_single_segment_wildcard() {
        let p = set(&["*_a"]);
        assert!(p.matches("file_a"));
        assert!(!p.matches("file_b"));
    }

    #[test]
    fn test_basename_pattern_matches_at_any_depth() {
        let p = set(&["*.md"]);
        assert!(p.matches("index.md"));
        assert!(p.matches("blog/post.md"));
        assert!(!p.matches("blog/post.html"));
    }

    #[test]
    fn test_double_star() {
        let p = set(&["blog/**"]);
        assert!(p.matches("blog/2024/post.md"));
        assert!(!p.matches("about.md"));
    }

    #[test]
    fn test_directory_pattern() {
        let p = set(&["drafts/"]);
        assert!(p.matches("drafts/one.md"));
        assert!(!p.matches("posts/one.md"));
    }

    #[test]
    fn test_negation() {
        let p = set(&["*.md", "!draft.md"]);
        assert!(p.matches("post.md"));
        assert!(!p.matches("draft.md"));
    }

    #[test]
    fn test_patterns_are_or_combined() {
        let p = set(&["*.md", "*.txt"]);
        assert!(p.matches("a.md"));
        assert!(p.matches("a.txt"));
        assert!(!p.matches("a.png"));
    }
}
