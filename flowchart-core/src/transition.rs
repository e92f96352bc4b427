//! Transitions: named actions whose destination depends on conditions.
//!
//! A transition holds an ordered list of outcomes. Each outcome pairs a
//! required [`ConditionSet`] with a destination stage. Resolution walks the
//! outcomes in registration order and picks the first one whose required set
//! is satisfied by the context.

use crate::condition::{origin_flag, CanonicalKey, ConditionSet};
use serde::{Deserialize, Serialize};

/// A single (required conditions, destination) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Conditions the context must satisfy.
    pub when: ConditionSet,

    /// Destination stage.
    pub to: String,
}

impl Outcome {
    pub fn key(&self) -> CanonicalKey {
        self.when.encode()
    }
}

/// A named action and its possible outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub name: String,

    #[serde(default)]
    outcomes: Vec<Outcome>,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcomes: Vec::new(),
        }
    }

    /// Associates `when` with `destination`.
    ///
    /// Registering a set whose canonical key is already present replaces the
    /// destination but keeps the outcome's position in resolution order.
    pub fn register_outcome(&mut self, when: ConditionSet, destination: impl Into<String>) {
        let destination = destination.into();
        if let Some(existing) = self.outcomes.iter_mut().find(|o| o.when == when) {
            tracing::debug!(
                transition = %self.name,
                key = %when,
                old = %existing.to,
                new = %destination,
                "outcome destination replaced"
            );
            existing.to = destination;
            return;
        }
        self.outcomes.push(Outcome {
            when,
            to: destination,
        });
    }

    /// Like [`Transition::register_outcome`], but the outcome only applies
    /// when the action is taken from `origin`.
    pub fn register_outcome_from(
        &mut self,
        origin: &str,
        when: ConditionSet,
        destination: impl Into<String>,
    ) {
        self.register_outcome(when.with(origin_flag(origin), true), destination);
    }

    /// Builder-style [`Transition::register_outcome`].
    pub fn with_outcome(mut self, when: ConditionSet, destination: impl Into<String>) -> Self {
        self.register_outcome(when, destination);
        self
    }

    /// Returns the destination of the first outcome satisfied by `context`.
    pub fn resolve(&self, context: &ConditionSet) -> Option<&str> {
        self.outcomes
            .iter()
            .find(|o| context.satisfies(&o.when))
            .map(|o| o.to.as_str())
    }

    /// Looks up the destination registered for an exact canonical key.
    pub fn destination_for(&self, key: &CanonicalKey) -> Option<&str> {
        self.outcomes
            .iter()
            .find(|o| &o.key() == key)
            .map(|o| o.to.as_str())
    }

    /// Outcomes in resolution order.
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().map(|o| o.to.as_str())
    }

    /// Returns every pair of outcomes that a single context could satisfy
    /// at once. For such pairs, the earlier outcome always wins.
    pub fn overlapping_outcomes(&self) -> Vec<(&Outcome, &Outcome)> {
        let mut pairs = Vec::new();
        for (i, first) in self.outcomes.iter().enumerate() {
            for second in &self.outcomes[i + 1..] {
                if first.when.is_compatible_with(&second.when) {
                    pairs.push((first, second));
                }
            }
        }
        pairs
    }

    /// Collapses outcomes that share a canonical key, as if they had been
    /// registered one by one.
    pub(crate) fn normalize(&mut self) {
        let outcomes = std::mem::take(&mut self.outcomes);
        for outcome in outcomes {
            self.register_outcome(outcome.when, outcome.to);
        }
    }
}
