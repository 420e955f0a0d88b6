use std::fmt;

/// Where a pattern is allowed to start matching within a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The first pattern segment must match the first path segment.
    Root,
    /// The pattern may match after any number of leading directories,
    /// including none.
    AnyDepth,
}

/// A CODEOWNERS pattern rewritten into the shape used for matching.
///
/// Patterns that don't start with `/` or `*` match at any depth, as do
/// `*`-led patterns without a slash such as `*.md`. Patterns without a file
/// extension that don't end with `*` are directory rules that also match
/// everything beneath them. Both rewrites may apply to the same pattern. A
/// pattern consisting of a single `*` matches every path.
///
/// Normalization never fails: any string is a legal pattern, even if it ends
/// up matching nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPattern {
    anchor: Anchor,
    segments: Vec<String>,
    descendants: bool,
}

impl NormalizedPattern {
    pub fn parse(pattern: &str) -> NormalizedPattern {
        if pattern == "*" {
            return NormalizedPattern {
                anchor: Anchor::Root,
                segments: vec!["**".to_owned()],
                descendants: false,
            };
        }

        let anchor = if pattern.starts_with('/')
            || (pattern.starts_with('*') && pattern.trim_end_matches('/').contains('/'))
        {
            Anchor::Root
        } else {
            Anchor::AnyDepth
        };
        let descendants = !has_extension(pattern) && !pattern.ends_with('*');

        // Leading, trailing and repeated slashes only produce empty segments,
        // which never correspond to a path component.
        let segments = pattern
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect();

        NormalizedPattern {
            anchor,
            segments,
            descendants,
        }
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the pattern also matches every path beneath the one it names.
    pub fn matches_descendants(&self) -> bool {
        self.descendants
    }

    /// Render the pattern as the equivalent brace-expansion glob, e.g.
    /// `{**/,}docs{/**,}`.
    pub fn to_glob(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NormalizedPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.anchor {
            Anchor::Root => f.write_str("/")?,
            Anchor::AnyDepth => f.write_str("{**/,}")?,
        }
        f.write_str(&self.segments.join("/"))?;
        if self.descendants {
            f.write_str("{/**,}")?;
        }
        Ok(())
    }
}

// Mirrors the usual `extname` convention: the extension starts at the last
// dot of the final segment, unless that dot is the segment's first character.
fn has_extension(pattern: &str) -> bool {
    let basename = pattern
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    if basename.chars().all(|c| c == '.') {
        return false;
    }
    matches!(basename.rfind('.'), Some(idx) if idx > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_detection() {
        let examples = [
            ("foo.rb", true),
            ("a/b/Dockerfile.test.frontend", true),
            ("*.js", true),
            ("path/to/Docker Thing.test", true),
            ("lib/a.d/", true),
            ("foo", false),
            ("docs/", false),
            (".github", false),
            ("a.b/c", false),
            ("..", false),
            ("", false),
        ];
        for (pattern, expected) in examples {
            assert_eq!(has_extension(pattern), expected, "extension of {:?}", pattern);
        }
    }

    #[test]
    fn test_normalization() {
        let examples = [
            ("*", "/**"),
            ("/containers/dashboard/", "/containers/dashboard{/**,}"),
            (
                "/containers/dashboard/Dockerfile.test.frontend",
                "/containers/dashboard/Dockerfile.test.frontend",
            ),
            ("shared_code/domains/foo", "{**/,}shared_code/domains/foo{/**,}"),
            ("app/models/user.rb", "{**/,}app/models/user.rb"),
            ("*.rb", "{**/,}*.rb"),
            ("*.{js,ts}", "{**/,}*.{js,ts}"),
            ("*/*/mod.rs", "/*/*/mod.rs"),
            ("**/logs", "/**/logs{/**,}"),
            ("docs/*", "{**/,}docs/*"),
            ("/build/**", "/build/**"),
        ];
        for (pattern, glob) in examples {
            assert_eq!(
                NormalizedPattern::parse(pattern).to_glob(),
                glob,
                "normalized form of {:?}",
                pattern
            );
        }
    }

    #[test]
    fn test_match_all() {
        let pattern = NormalizedPattern::parse("*");
        assert_eq!(pattern.anchor(), Anchor::Root);
        assert_eq!(pattern.segments(), &["**".to_owned()]);
        assert!(!pattern.matches_descendants());
    }

    #[test]
    fn test_space_in_pattern() {
        let pattern = NormalizedPattern::parse("/containers/dashboard/Docker Thing.test");
        assert_eq!(
            pattern.segments(),
            &["containers", "dashboard", "Docker Thing.test"].map(String::from)
        );
        assert!(!pattern.matches_descendants());
    }
}
