/// Nondeterministic automaton over path segments. Transitions consume one
/// segment each; epsilon transitions lead to "double star" states that loop
/// on any segment.
#[derive(Clone)]
pub(crate) struct Nfa {
    states: Vec<State>,
}

impl Nfa {
    pub(crate) const START_STATE: StateId = StateId(0);

    pub(crate) fn new() -> Self {
        Self {
            states: vec![State::new()],
        }
    }

    pub(crate) fn add_state(&mut self) -> StateId {
        let id = self.states.len();
        self.states.push(State::new());
        StateId(id as u32)
    }

    #[inline]
    pub(crate) fn state(&self, id: StateId) -> &State {
        &self.states[usize::from(id)]
    }

    #[inline]
    pub(crate) fn state_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[usize::from(id)]
    }

    #[cfg(test)]
    pub(crate) fn states_iter(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }

    pub(crate) fn initial_states(&self) -> Vec<StateId> {
        let mut states = vec![Self::START_STATE];
        if let Some(epsilon_node_id) = self.state(Self::START_STATE).epsilon_transition {
            states.push(epsilon_node_id);
        }
        states
    }

    pub(crate) fn transitions_from(&self, state_id: StateId) -> impl Iterator<Item = &Transition> {
        self.state(state_id).transitions.iter()
    }

    pub(crate) fn epsilon_transitions_from(&self, state_id: StateId) -> Option<StateId> {
        self.state(state_id).epsilon_transition
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct StateId(pub(crate) u32);

impl From<StateId> for usize {
    fn from(id: StateId) -> usize {
        id.0 as usize
    }
}

#[derive(Debug, Clone)]
pub(crate) struct State {
    pub(crate) terminal_for_patterns: Vec<usize>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) epsilon_transition: Option<StateId>,
}

impl State {
    fn new() -> Self {
        Self {
            terminal_for_patterns: Vec::new(),
            transitions: Vec::new(),
            epsilon_transition: None,
        }
    }

    pub(crate) fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub(crate) fn mark_as_terminal(&mut self, pattern_id: usize) {
        self.terminal_for_patterns.push(pattern_id);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Transition {
    pub(crate) path_segment: String,
    condition: TransitionCondition,
    pub(crate) target: StateId,
}

impl Transition {
    pub(crate) fn new(path_segment: String, target: StateId) -> Transition {
        let condition = TransitionCondition::new(&path_segment);
        Self {
            path_segment,
            condition,
            target,
        }
    }

    pub(crate) fn is_match(&self, candidate: &str) -> bool {
        self.condition.is_match(&self.path_segment, candidate)
    }
}

#[derive(Debug, Clone)]
enum TransitionCondition {
    Unconditional,
    Literal,
    Prefix,
    Suffix,
    Contains,
    Regex(regex::Regex),
    Never,
}

impl TransitionCondition {
    fn new(glob: &str) -> Self {
        if glob == "*" {
            return Self::Unconditional;
        }

        let leading_star = glob.starts_with('*');
        let trailing_star = glob.len() > 1 && glob.ends_with('*');
        let mut inner = glob;
        if leading_star {
            inner = &inner[1..];
        }
        if trailing_star {
            inner = &inner[..inner.len() - 1];
        }
        let internal_wildcards = has_wildcard(inner.chars()) || has_alternation(glob);

        match (leading_star, trailing_star, internal_wildcards) {
            (false, false, false) => Self::Literal,
            (false, true, false) => Self::Prefix,
            (true, false, false) => Self::Suffix,
            (true, true, false) => Self::Contains,
            _ => match segment_to_regex(glob) {
                Ok(re) => Self::Regex(re),
                Err(err) => {
                    tracing::warn!(glob, %err, "segment glob never matches");
                    Self::Never
                }
            },
        }
    }

    fn is_match(&self, pattern: &str, candidate: &str) -> bool {
        match self {
            Self::Unconditional => true,
            Self::Literal => pattern == candidate,
            Self::Prefix => candidate.starts_with(pattern.trim_end_matches('*')),
            Self::Suffix => candidate.ends_with(pattern.trim_start_matches('*')),
            Self::Contains => {
                memchr::memmem::find(candidate.as_bytes(), pattern.trim_matches('*').as_bytes())
                    .is_some()
            }
            Self::Regex(re) => re.is_match(candidate),
            Self::Never => false,
        }
    }
}

// Translate a single-segment glob into an anchored regex. `*` and `?` never
// cross a separator, and `{a,b}` groups become alternations.
fn segment_to_regex(glob: &str) -> Result<regex::Regex, regex::Error> {
    let syntax = alternation_syntax(glob);
    let mut regex = String::with_capacity(glob.len() + 8);
    regex.push_str(r#"\A"#);
    for (idx, c) in glob.char_indices() {
        if syntax.binary_search(&idx).is_ok() {
            regex.push_str(match c {
                '{' => "(?:",
                '}' => ")",
                _ => "|",
            });
            continue;
        }
        match c {
            '*' => regex.push_str(r#"[^/]*"#),
            '?' => regex.push_str(r#"[^/]"#),
            _ => {
                if regex_syntax::is_meta_character(c) {
                    regex.push('\\');
                }
                regex.push(c);
            }
        }
    }
    regex.push_str(r#"\z"#);
    regex::Regex::new(&regex)
}

fn has_wildcard(mut char_iter: impl Iterator<Item = char>) -> bool {
    char_iter.any(|c| c == '*' || c == '?')
}

fn has_alternation(glob: &str) -> bool {
    !alternation_syntax(glob).is_empty()
}

// Sorted byte offsets of the braces and commas that act as alternation
// syntax. Each group is judged on its own: it alternates only when it is
// closed and holds a comma directly. Every other brace or comma is literal.
fn alternation_syntax(glob: &str) -> Vec<usize> {
    let mut open: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut syntax = Vec::new();
    for (idx, c) in glob.char_indices() {
        match c {
            '{' => open.push((idx, Vec::new())),
            ',' => {
                if let Some((_, commas)) = open.last_mut() {
                    commas.push(idx);
                }
            }
            '}' => {
                if let Some((start, commas)) = open.pop() {
                    if !commas.is_empty() {
                        syntax.push(start);
                        syntax.extend(commas);
                        syntax.push(idx);
                    }
                }
            }
            _ => {}
        }
    }
    syntax.sort_unstable();
    syntax
}
