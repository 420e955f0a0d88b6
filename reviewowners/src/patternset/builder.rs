use crate::pattern::{Anchor, NormalizedPattern};

use super::{
    nfa::{Nfa, StateId, Transition},
    Matcher,
};

/// Builder for a patternset [`Matcher`]. Calling [`Builder::build`] will
/// consume the builder.
#[derive(Clone)]
pub struct Builder {
    nfa: Nfa,
    next_pattern_id: usize,
}

impl Builder {
    /// Create a new `Builder`.
    pub fn new() -> Self {
        Self {
            nfa: Nfa::new(),
            next_pattern_id: 0,
        }
    }

    /// Build the `Matcher` from the patterns added to the builder. This will
    /// consume the builder.
    pub fn build(self) -> Matcher {
        Matcher::new(self.nfa)
    }

    /// Add a pattern to the builder, returning its id. Ids are assigned in
    /// insertion order, starting at zero.
    pub fn add(&mut self, pattern: &NormalizedPattern) -> usize {
        let pattern_id = self.next_pattern_id;
        self.next_pattern_id += 1;

        // Unanchored patterns may skip any number of leading directories.
        let start_state_id = match pattern.anchor() {
            Anchor::Root => Nfa::START_STATE,
            Anchor::AnyDepth => self.add_epsilon_transition(Nfa::START_STATE),
        };

        let mut end_state_id =
            pattern
                .segments()
                .iter()
                .fold(start_state_id, |from_id, segment| match segment.as_str() {
                    "**" => self.add_epsilon_transition(from_id),
                    _ => self.add_transition(from_id, segment),
                });

        // Directory rules match the directory itself as well as everything
        // below it, which is exactly what a trailing double star state does.
        if pattern.matches_descendants() {
            end_state_id = self.add_epsilon_transition(end_state_id);
        }

        self.nfa
            .state_mut(end_state_id)
            .mark_as_terminal(pattern_id);

        pattern_id
    }

    // Add a regular (non-epsilon) transition from a given state via the
    // provided path segment.
    fn add_transition(&mut self, from_id: StateId, segment: &str) -> StateId {
        let existing_transition = self
            .nfa
            .transitions_from(from_id)
            .find(|t| t.path_segment == segment && t.target != from_id);
        if let Some(t) = existing_transition {
            t.target
        } else {
            let state_id = self.nfa.add_state();
            self.nfa
                .state_mut(from_id)
                .add_transition(Transition::new(segment.to_owned(), state_id));
            state_id
        }
    }

    // Add an epsilon transition from a given state to a new state. If an epsilon transition
    // already exists, return the id of that transition.
    fn add_epsilon_transition(&mut self, from_id: StateId) -> StateId {
        // Double star segments match zero or more of anything, so consecutive
        // double stars collapse into the state that already loops.
        let has_existing_transition = self
            .nfa
            .transitions_from(from_id)
            .any(|t| t.path_segment == "*" && t.target == from_id);
        if has_existing_transition {
            return from_id;
        }

        match self.nfa.state(from_id).epsilon_transition {
            Some(to_id) => to_id,
            None => {
                let state_id = self.nfa.add_state();
                self.nfa
                    .state_mut(state_id)
                    .add_transition(Transition::new("*".to_owned(), state_id));
                self.nfa.state_mut(from_id).epsilon_transition = Some(state_id);
                state_id
            }
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
