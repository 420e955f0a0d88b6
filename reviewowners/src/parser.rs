use crate::ruleset::{self, Owner};

/// Parse a CODEOWNERS file from a string, returning a `ParseResult` containing
/// the parsed rules and any problems encountered.
pub fn parse(source: &str) -> ParseResult {
    Parser::new(source).parse()
}

/// The result of parsing a CODEOWNERS file. Lines that can't be turned into a
/// rule are left out of `rules` and described in `errors`; parsing never
/// stops early, so `rules` always holds every usable line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub rules: Vec<Rule>,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    /// Convert the `ParseResult` into a `RuleSet`. Any errors are ignored.
    pub fn into_ruleset(self) -> ruleset::RuleSet {
        ruleset::RuleSet::new(self.rules.into_iter().map(|r| r.into()).collect())
    }
}

/// A parsed CODEOWNERS rule. The pattern and each owner are wrapped in
/// `Spanned` to preserve their location in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: Spanned<String>,
    pub owners: Vec<Spanned<Owner>>,
}

impl From<Rule> for ruleset::Rule {
    fn from(rule: Rule) -> Self {
        ruleset::Rule {
            pattern: rule.pattern.0,
            owners: rule.owners.into_iter().map(|o| o.0).collect(),
        }
    }
}

/// A problem found while parsing a CODEOWNERS file. Contains a message
/// describing the problem and a `Span` indicating where it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    fn new(message: impl Into<String>, span: impl Into<Span>) -> ParseError {
        ParseError {
            message: message.into(),
            span: span.into(),
        }
    }
}

/// Start and end byte offsets of a piece of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span(pub usize, pub usize);

impl From<(usize, usize)> for Span {
    fn from((start, end): (usize, usize)) -> Self {
        Span(start, end)
    }
}

/// A value along with the `Span` it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T>(pub T, pub Span);

impl<T> Spanned<T> {
    fn new(val: impl Into<T>, span: impl Into<Span>) -> Spanned<T> {
        Spanned(val.into(), span.into())
    }
}

struct Parser<'a> {
    source: &'a str,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            errors: Vec::new(),
        }
    }

    fn parse(mut self) -> ParseResult {
        let mut rules = Vec::new();
        // Skip a byte order mark, keeping spans relative to the full source.
        let body = self.source.strip_prefix('\u{feff}').unwrap_or(self.source);
        let mut line_start = self.source.len() - body.len();
        for raw_line in body.split_inclusive('\n') {
            let line = raw_line.trim_end_matches(['\n', '\r']);
            if let Some(rule) = self.parse_line(line, line_start) {
                rules.push(rule);
            }
            line_start += raw_line.len();
        }

        ParseResult {
            rules,
            errors: self.errors,
        }
    }

    // The pattern is everything before the first token starting with `@`, so
    // it may contain spaces. Owners are the `@` tokens that follow, up to an
    // optional trailing comment.
    fn parse_line(&mut self, line: &str, line_start: usize) -> Option<Rule> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let tokens = tokens(line);
        let first_owner = tokens.iter().position(|(_, token)| token.starts_with('@'));
        let pattern_end = first_owner.map_or(line.len(), |idx| tokens[idx].0);

        let pattern_text = &line[..pattern_end];
        let pattern = pattern_text.trim();
        if pattern.is_empty() {
            let pos = line_start + pattern_end;
            self.errors.push(ParseError::new("expected pattern", (pos, pos)));
            return None;
        }
        let pattern_start = line_start + (pattern_text.len() - pattern_text.trim_start().len());
        let pattern: Spanned<String> =
            Spanned::new(pattern, (pattern_start, pattern_start + pattern.len()));

        let mut owners = Vec::new();
        for &(offset, token) in first_owner.map_or(&[][..], |idx| &tokens[idx..]) {
            if token.starts_with('#') {
                break;
            }
            let span = (line_start + offset, line_start + offset + token.len());
            match Owner::try_from(token) {
                Ok(owner) => owners.push(Spanned::new(owner, span)),
                Err(err) => self.errors.push(ParseError::new(err.to_string(), span)),
            }
        }

        if owners.is_empty() {
            self.errors
                .push(ParseError::new("expected at least one owner", pattern.1));
            return None;
        }

        Some(Rule { pattern, owners })
    }
}

// Split a line into whitespace-delimited tokens, keeping each token's byte
// offset within the line.
fn tokens(line: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (idx, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(token_start)) => {
                tokens.push((token_start, &line[token_start..idx]));
                start = None;
            }
            (false, None) => start = Some(idx),
            _ => {}
        }
    }
    if let Some(token_start) = start {
        tokens.push((token_start, &line[token_start..]));
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::ruleset::OwnerKind;
    use super::*;

    fn user(name: &str) -> Owner {
        Owner::new(name.to_string(), OwnerKind::User)
    }

    fn team(name: &str) -> Owner {
        Owner::new(name.to_string(), OwnerKind::Team)
    }

    #[test]
    fn test_parser() {
        let examples = vec![
            (
                "foo @bar",
                vec![Rule {
                    pattern: Spanned::new("foo", (0, 3)),
                    owners: vec![Spanned::new(user("@bar"), (4, 8))],
                }],
                vec![],
            ),
            (
                " foo\t@bar  @org/baz ",
                vec![Rule {
                    pattern: Spanned::new("foo", (1, 4)),
                    owners: vec![
                        Spanned::new(user("@bar"), (5, 9)),
                        Spanned::new(team("@org/baz"), (11, 19)),
                    ],
                }],
                vec![],
            ),
            (
                "path/to/Docker Thing.test @owner",
                vec![Rule {
                    pattern: Spanned::new("path/to/Docker Thing.test", (0, 25)),
                    owners: vec![Spanned::new(user("@owner"), (26, 32))],
                }],
                vec![],
            ),
            (
                "# a\nfoo @a\r\n\n  # b\nbar @b",
                vec![
                    Rule {
                        pattern: Spanned::new("foo", (4, 7)),
                        owners: vec![Spanned::new(user("@a"), (8, 10))],
                    },
                    Rule {
                        pattern: Spanned::new("bar", (19, 22)),
                        owners: vec![Spanned::new(user("@b"), (23, 25))],
                    },
                ],
                vec![],
            ),
            (
                "foo @bar # trailing @ignored",
                vec![Rule {
                    pattern: Spanned::new("foo", (0, 3)),
                    owners: vec![Spanned::new(user("@bar"), (4, 8))],
                }],
                vec![],
            ),
            (
                "foo @bar baz",
                vec![Rule {
                    pattern: Spanned::new("foo", (0, 3)),
                    owners: vec![Spanned::new(user("@bar"), (4, 8))],
                }],
                vec![ParseError::new("invalid owner: baz", (9, 12))],
            ),
            (
                "foo",
                vec![],
                vec![ParseError::new("expected at least one owner", (0, 3))],
            ),
            (
                "  @bar",
                vec![],
                vec![ParseError::new("expected pattern", (2, 2))],
            ),
            ("", vec![], vec![]),
        ];

        for (source, rules, errors) in examples {
            assert_eq!(
                Parser::new(source).parse(),
                ParseResult { rules, errors },
                "result mismatch for `{}`",
                source
            );
        }
    }

    #[test]
    fn test_byte_order_mark() {
        let source = "\u{feff}/docs/ @docs\n/src/ @src\n";
        let result = parse(source);
        assert_eq!(result.errors, vec![]);
        assert_eq!(
            result.rules[0],
            Rule {
                pattern: Spanned::new("/docs/", (3, 9)),
                owners: vec![Spanned::new(user("@docs"), (10, 15))],
            }
        );
        assert_eq!(&source[3..9], "/docs/");
        assert_eq!(
            result.into_ruleset().resolve(["docs/a.md", "src/lib.rs"]).into_vec(),
            vec!["docs", "src"]
        );
    }

    #[test]
    fn test_into_ruleset_keeps_order() {
        let ruleset = parse("* @everyone\n/docs/ @docs\nbroken\n").into_ruleset();
        let patterns = ruleset
            .rules()
            .iter()
            .map(|r| r.pattern.as_str())
            .collect::<Vec<_>>();
        assert_eq!(patterns, vec!["*", "/docs/"]);
    }
}
