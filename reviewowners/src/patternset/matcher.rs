use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use super::nfa::{Nfa, StateId};

/// Matches a path against a set of patterns. Includes a thread-safe transition
/// cache keyed by path prefix, so paths that share directories reuse the work
/// done for their parents. Created using a [`super::Builder`].
#[derive(Clone)]
pub struct Matcher {
    nfa: Nfa,
    transition_cache: Arc<RwLock<HashMap<String, Vec<StateId>>>>,
}

impl Matcher {
    pub(crate) fn new(nfa: Nfa) -> Matcher {
        Self {
            nfa,
            transition_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Match a path against the patterns in the set. Returns the ids of every
    /// matching pattern in ascending order. A leading slash, repeated slashes
    /// and a trailing slash don't affect the result.
    pub fn matching_patterns(&self, path: &str) -> Vec<usize> {
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();
        let final_states = self.next_states(&segments);

        let mut matches = final_states
            .into_iter()
            .flat_map(|state_id| self.nfa.state(state_id).terminal_for_patterns.iter().copied())
            .collect::<Vec<_>>();
        matches.sort_unstable();
        matches.dedup();
        matches
    }

    // Given a slice of path segments, return the set of states we're in after
    // stepping through the NFA. The states for each prefix of the path are
    // cached, so only the final segment is new work when sibling files are
    // matched one after another.
    fn next_states(&self, path_segments: &[&str]) -> Vec<StateId> {
        // Base case - no more path segments to match
        let Some((segment, subpath_segments)) = path_segments.split_last() else {
            return self.nfa.initial_states();
        };

        // Get the states for the current path's prefix
        let subpath = subpath_segments.join("/");
        let states = match self.get_cached_states_for(&subpath) {
            Some(states) => states,
            None => {
                let states = self.next_states(subpath_segments);
                self.set_cached_states_for(subpath, states.clone());
                states
            }
        };

        // Follow the matching transitions out of every state we're in
        let mut next_states = Vec::new();
        for state_id in states {
            self.nfa
                .transitions_from(state_id)
                .filter(|transition| transition.is_match(segment))
                .for_each(|transition| next_states.push(transition.target));
        }

        // Automatically traverse epsilon edges
        let epsilon_nodes = next_states
            .iter()
            .flat_map(|&state_id| self.nfa.epsilon_transitions_from(state_id))
            .collect::<Vec<_>>();
        next_states.extend(epsilon_nodes);
        next_states.sort_unstable();
        next_states.dedup();
        next_states
    }

    fn get_cached_states_for(&self, path: &str) -> Option<Vec<StateId>> {
        self.transition_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    fn set_cached_states_for(&self, path: String, states: Vec<StateId>) {
        self.transition_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, states);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::{pattern::NormalizedPattern, patternset::Builder};

    use super::*;

    #[test]
    fn test_literals() {
        let patterns = [
            "/src/parser/mod.rs",
            "/lib/parser/parse.rs",
            "/bin/parser/mod.rs",
            "mod.rs",
        ];
        let matcher = matcher_for_patterns(&patterns);

        assert_matches(&matcher, "src/parser/mod.rs", &patterns, &[0, 3]);
        assert_matches(&matcher, "lib/parser/parse.rs", &patterns, &[1]);
        assert_matches(&matcher, "lib/parser/mod.rs", &patterns, &[3]);
        assert_matches(&matcher, "lib/parser/util.rs", &patterns, &[]);
        assert_matches(&matcher, "src/lexer/mod.rs", &patterns, &[3]);
        assert_matches(&matcher, "src/parser/mod.go", &patterns, &[]);
    }

    #[test]
    fn test_leading_slash_is_ignored() {
        let patterns = ["/shared_code/a", "b.rb"];
        let matcher = matcher_for_patterns(&patterns);

        assert_matches(&matcher, "shared_code/a/b.rb", &patterns, &[0, 1]);
        assert_matches(&matcher, "/shared_code/a/b.rb", &patterns, &[0, 1]);
        assert_matches(&matcher, "//shared_code//a/b.rb", &patterns, &[0, 1]);
    }

    #[test]
    fn test_directory_rules() {
        let patterns = ["shared_code/domains/foo", "/containers/dashboard/", "src"];
        let matcher = matcher_for_patterns(&patterns);

        assert_matches(&matcher, "shared_code/domains/foo", &patterns, &[0]);
        assert_matches(&matcher, "shared_code/domains/foo/a/b/c.rb", &patterns, &[0]);
        assert_matches(&matcher, "nested/shared_code/domains/foo/x.rb", &patterns, &[0]);
        assert_matches(&matcher, "shared_code/domains/foobar/x.rb", &patterns, &[]);
        assert_matches(&matcher, "containers/dashboard/Dockerfile", &patterns, &[1]);
        assert_matches(&matcher, "containers/dashboard", &patterns, &[1]);
        assert_matches(&matcher, "other/containers/dashboard/Dockerfile", &patterns, &[]);
        assert_matches(&matcher, "foo/src/parser/mod.rs", &patterns, &[2]);
    }

    #[test]
    fn test_files_with_extensions_match_exactly() {
        let patterns = ["app/models/user.rb", "/Gemfile.lock"];
        let matcher = matcher_for_patterns(&patterns);

        assert_matches(&matcher, "app/models/user.rb", &patterns, &[0]);
        assert_matches(&matcher, "engines/x/app/models/user.rb", &patterns, &[0]);
        assert_matches(&matcher, "app/models/user.rb/extra", &patterns, &[]);
        assert_matches(&matcher, "Gemfile.lock", &patterns, &[1]);
        assert_matches(&matcher, "vendor/Gemfile.lock", &patterns, &[]);
    }

    #[test]
    fn test_wildcards() {
        let patterns = ["src/*/mod.rs", "src/parser/*", "*/*/mod.rs", "*.md"];
        let matcher = matcher_for_patterns(&patterns);

        assert_matches(&matcher, "src/parser/mod.rs", &patterns, &[0, 1, 2]);
        assert_matches(&matcher, "src/lexer/mod.rs", &patterns, &[0, 2]);
        assert_matches(&matcher, "src/parser/parser.rs", &patterns, &[1]);
        assert_matches(&matcher, "test/lexer/mod.rs", &patterns, &[2]);
        assert_matches(&matcher, "src/parser/subdir/thing.rs", &patterns, &[]);
        assert_matches(&matcher, "README.md", &patterns, &[3]);
        assert_matches(&matcher, "docs/README.md", &patterns, &[3]);
        assert_matches(&matcher, "docs/README.mdx", &patterns, &[]);
    }

    #[test]
    fn test_hidden_entries() {
        let patterns = ["/config/*", "*", ".github"];
        let matcher = matcher_for_patterns(&patterns);

        assert_matches(&matcher, "config/.env", &patterns, &[0, 1]);
        assert_matches(&matcher, ".github/workflows/ci.yml", &patterns, &[1, 2]);
        assert_matches(&matcher, "a/.hidden/b", &patterns, &[1]);
    }

    #[test]
    fn test_double_stars() {
        let patterns = ["/**/baz.rb", "/foo/**/qux.rb", "/build/**"];
        let matcher = matcher_for_patterns(&patterns);

        assert_matches(&matcher, "x/y/baz.rb", &patterns, &[0]);
        assert_matches(&matcher, "baz.rb", &patterns, &[0]);
        assert_matches(&matcher, "foo/qux.rb", &patterns, &[1]);
        assert_matches(&matcher, "foo/bar/baz/qux.rb", &patterns, &[1]);
        assert_matches(&matcher, "bar/qux.rb", &patterns, &[]);
        assert_matches(&matcher, "build/a/b/c", &patterns, &[2]);
    }

    #[test]
    fn test_spaces_and_alternation() {
        let patterns = ["/containers/dashboard/Docker Thing.test", "*.{js,ts}"];
        let matcher = matcher_for_patterns(&patterns);

        assert_matches(&matcher, "containers/dashboard/Docker Thing.test", &patterns, &[0]);
        assert_matches(&matcher, "containers/dashboard/Docker", &patterns, &[]);
        assert_matches(&matcher, "index.ts", &patterns, &[1]);
        assert_matches(&matcher, "index.js", &patterns, &[1]);
    }

    #[test]
    fn test_cache_does_not_change_results() {
        let patterns = ["/a/b.rb", "a"];
        let matcher = matcher_for_patterns(&patterns);

        for _ in 0..3 {
            assert_matches(&matcher, "a/b.rb", &patterns, &[0, 1]);
            assert_matches(&matcher, "a/c.rb", &patterns, &[1]);
            assert_matches(&matcher, "x/a/b.rb", &patterns, &[1]);
        }
    }

    fn assert_matches(matcher: &Matcher, path: &str, patterns: &[&str], expected: &[usize]) {
        assert_eq!(
            HashSet::<usize>::from_iter(matcher.matching_patterns(path)),
            HashSet::from_iter(expected.iter().copied()),
            "expected {:?} to match {:?}",
            path,
            expected.iter().map(|&i| patterns[i]).collect::<Vec<_>>(),
        );
    }

    fn matcher_for_patterns(patterns: &[&str]) -> Matcher {
        let mut builder = Builder::new();
        for pattern in patterns {
            builder.add(&NormalizedPattern::parse(pattern));
        }
        builder.build()
    }
}
