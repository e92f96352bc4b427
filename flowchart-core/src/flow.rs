//! Flows - stages and transitions assembled into a graph.
//!
//! A flow is assembled with a [`FlowBuilder`] and then sealed into an
//! immutable [`Flow`]. Only a sealed flow can drive assets:
//!
//! ```
//! use flowchart_core::{ConditionSet, FlowBuilder, MemoryAsset, Stage};
//!
//! let mut builder = FlowBuilder::new("butterfly");
//! builder.add_stages(["egg", "caterpillar"].map(Stage::new));
//! builder.connect("egg", "hatch", [(ConditionSet::new(), "caterpillar")]);
//! let flow = builder.seal();
//!
//! let mut bug = MemoryAsset::new("egg");
//! let result = flow.take_action(&mut bug, "hatch").unwrap();
//! assert_eq!(result.to, "caterpillar");
//! ```

use crate::asset::Asset;
use crate::condition::{is_reserved, origin_flag, ConditionSet};
use crate::definition::FlowDefinition;
use crate::error::{AssetError, CoreError};
use crate::stage::Stage;
use crate::transition::Transition;
use std::collections::BTreeMap;
use std::fmt;

/// Result of a successful action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transitioned {
    pub from: String,
    pub action: String,
    pub to: String,
}

/// A problem found while sealing a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Two outcomes of one transition can match the same context.
    Overlap {
        transition: String,
        first: String,
        second: String,
    },
    /// An outcome leads to a stage the flow does not contain.
    UnknownDestination { transition: String, stage: String },
    /// A stage allows an action the flow has no transition for.
    UnknownAction { stage: String, action: String },
    /// An outcome requires an origin stage where its action is not legal,
    /// or requires more than one origin stage.
    UnreachableOutcome { transition: String, origin: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Overlap {
                transition,
                first,
                second,
            } => write!(
                f,
                "outcomes {:?} and {:?} of '{}' overlap; the first registered wins",
                first, second, transition
            ),
            Diagnostic::UnknownDestination { transition, stage } => {
                write!(f, "'{}' leads to unknown stage '{}'", transition, stage)
            }
            Diagnostic::UnknownAction { stage, action } => {
                write!(f, "stage '{}' allows unknown action '{}'", stage, action)
            }
            Diagnostic::UnreachableOutcome { transition, origin } => write!(
                f,
                "'{}' has an outcome from '{}' that can never be taken",
                transition, origin
            ),
        }
    }
}

impl From<Diagnostic> for CoreError {
    fn from(diag: Diagnostic) -> Self {
        match diag {
            Diagnostic::Overlap {
                transition,
                first,
                second,
            } => CoreError::OverlappingOutcomes {
                transition,
                first,
                second,
            },
            other => CoreError::InvalidDefinition {
                reason: other.to_string(),
            },
        }
    }
}

/// A flow under construction.
#[derive(Debug, Clone, Default)]
pub struct FlowBuilder {
    name: String,
    stages: BTreeMap<String, Stage>,
    transitions: BTreeMap<String, Transition>,
}

impl FlowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: BTreeMap::new(),
            transitions: BTreeMap::new(),
        }
    }

    /// Adds a stage, replacing any stage with the same name.
    pub fn add_stage(&mut self, stage: Stage) -> &mut Self {
        if let Some(old) = self.stages.insert(stage.name.clone(), stage) {
            tracing::debug!(flow = %self.name, stage = %old.name, "stage replaced");
        }
        self
    }

    pub fn add_stages(&mut self, stages: impl IntoIterator<Item = Stage>) -> &mut Self {
        for stage in stages {
            self.add_stage(stage);
        }
        self
    }

    /// Adds a transition, replacing any transition with the same name.
    pub fn add_transition(&mut self, transition: Transition) -> &mut Self {
        if let Some(old) = self
            .transitions
            .insert(transition.name.clone(), transition)
        {
            tracing::debug!(flow = %self.name, transition = %old.name, "transition replaced");
        }
        self
    }

    pub fn add_transitions(
        &mut self,
        transitions: impl IntoIterator<Item = Transition>,
    ) -> &mut Self {
        for transition in transitions {
            self.add_transition(transition);
        }
        self
    }

    /// Makes `action` legal from `origin` and registers outcomes that only
    /// apply when the action is taken from `origin`.
    ///
    /// Missing stages and transitions are created on the way.
    pub fn connect<D: Into<String>>(
        &mut self,
        origin: &str,
        action: &str,
        outcomes: impl IntoIterator<Item = (ConditionSet, D)>,
    ) -> &mut Self {
        self.stages
            .entry(origin.to_string())
            .or_insert_with(|| Stage::new(origin))
            .register_action(action);

        let transition = self
            .transitions
            .entry(action.to_string())
            .or_insert_with(|| Transition::new(action));
        for (when, destination) in outcomes {
            transition.register_outcome_from(origin, when, destination);
        }
        self
    }

    pub fn stage_mut(&mut self, name: &str) -> Option<&mut Stage> {
        self.stages.get_mut(name)
    }

    pub fn transition_mut(&mut self, name: &str) -> Option<&mut Transition> {
        self.transitions.get_mut(name)
    }

    /// Lists everything that looks wrong with the flow as built so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut found = Vec::new();

        for stage in self.stages.values() {
            for action in stage.actions() {
                if !self.transitions.contains_key(action) {
                    found.push(Diagnostic::UnknownAction {
                        stage: stage.name.clone(),
                        action: action.to_string(),
                    });
                }
            }
        }

        for transition in self.transitions.values() {
            for outcome in transition.outcomes() {
                if !self.stages.contains_key(&outcome.to) {
                    found.push(Diagnostic::UnknownDestination {
                        transition: transition.name.clone(),
                        stage: outcome.to.clone(),
                    });
                }
                let origins: Vec<&str> = outcome.when.required_origins().collect();
                let reachable = match origins.as_slice() {
                    [] => true,
                    [origin] => self
                        .stages
                        .get(*origin)
                        .map(|s| s.is_action_legal(&transition.name))
                        .unwrap_or(false),
                    _ => false,
                };
                if !reachable {
                    found.push(Diagnostic::UnreachableOutcome {
                        transition: transition.name.clone(),
                        origin: origins.join(", "),
                    });
                }
            }
            for (first, second) in transition.overlapping_outcomes() {
                found.push(Diagnostic::Overlap {
                    transition: transition.name.clone(),
                    first: first.key().to_string(),
                    second: second.key().to_string(),
                });
            }
        }

        found
    }

    /// Seals the flow, logging a warning for every diagnostic.
    pub fn seal(self) -> Flow {
        let (flow, diagnostics) = self.seal_with_diagnostics();
        for diag in diagnostics {
            tracing::warn!(flow = %flow.name, "{}", diag);
        }
        flow
    }

    /// Seals the flow and hands the diagnostics to the caller instead of
    /// logging them.
    pub fn seal_with_diagnostics(self) -> (Flow, Vec<Diagnostic>) {
        let diagnostics = self.diagnostics();
        (self.into_flow(), diagnostics)
    }

    /// Seals the flow, rejecting it if there is any diagnostic.
    pub fn seal_strict(self) -> Result<Flow, CoreError> {
        if let Some(diag) = self.diagnostics().into_iter().next() {
            return Err(diag.into());
        }
        Ok(self.into_flow())
    }

    fn into_flow(self) -> Flow {
        tracing::debug!(
            flow = %self.name,
            stages = self.stages.len(),
            transitions = self.transitions.len(),
            "flow sealed"
        );
        Flow {
            name: self.name,
            stages: self.stages,
            transitions: self.transitions,
        }
    }
}

/// A sealed, read-only flow.
///
/// `Flow` is `Send + Sync`; share it behind an `Arc` to drive many assets
/// from many threads.
#[derive(Debug, Clone)]
pub struct Flow {
    name: String,
    stages: BTreeMap<String, Stage>,
    transitions: BTreeMap<String, Transition>,
}

impl Flow {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.get(name)
    }

    pub fn transition(&self, name: &str) -> Option<&Transition> {
        self.transitions.get(name)
    }

    /// Stages sorted by name.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.values()
    }

    /// Transitions sorted by name.
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    /// Exports the flow in its serializable form.
    pub fn definition(&self) -> FlowDefinition {
        FlowDefinition {
            name: self.name.clone(),
            stages: self.stages.values().cloned().collect(),
            transitions: self.transitions.values().cloned().collect(),
        }
    }

    /// Returns the checksum of the exported definition.
    pub fn checksum(&self) -> Result<String, CoreError> {
        self.definition().checksum()
    }

    /// Actions legal from `stage`, in registration order.
    pub fn legal_actions(&self, stage: &str) -> Result<Vec<&str>, CoreError> {
        self.stages
            .get(stage)
            .map(|s| s.actions().collect())
            .ok_or_else(|| CoreError::UnknownStage {
                flow: self.name.clone(),
                stage: stage.to_string(),
            })
    }

    /// Resolves `action` for `asset` without writing anything back.
    pub fn preview<A: Asset>(&self, asset: &A, action: &str) -> Result<Transitioned, CoreError> {
        let transition =
            self.transitions
                .get(action)
                .ok_or_else(|| CoreError::UnknownAction {
                    flow: self.name.clone(),
                    action: action.to_string(),
                })?;

        let status = asset
            .status()
            .map_err(|e| CoreError::AssetRead { source: e.into() })?;
        let mut context = asset
            .context()
            .map_err(|e| CoreError::AssetRead { source: e.into() })?;

        // Only the engine may set reserved flags.
        if let Some((flag, _)) = context.iter().find(|(name, _)| is_reserved(name)) {
            return Err(CoreError::ReservedFlag {
                stage: status.clone(),
                flag: flag.to_string(),
            });
        }
        // Private copy; the asset's own context is never touched.
        context.add(origin_flag(&status), true);

        let stage = self
            .stages
            .get(&status)
            .ok_or_else(|| CoreError::UnknownStage {
                flow: self.name.clone(),
                stage: status.clone(),
            })?;

        if !stage.is_action_legal(action) {
            tracing::debug!(flow = %self.name, stage = %status, action, "illegal action");
            return Err(CoreError::IllegalAction {
                stage: status,
                action: action.to_string(),
            });
        }

        let to = match transition.resolve(&context) {
            Some(to) => to.to_string(),
            None => {
                tracing::debug!(
                    flow = %self.name,
                    stage = %status,
                    action,
                    context = %context,
                    "no outcome matched"
                );
                return Err(CoreError::NoOutcome {
                    stage: status,
                    action: action.to_string(),
                });
            }
        };

        Ok(Transitioned {
            from: status,
            action: action.to_string(),
            to,
        })
    }

    /// Takes `action` on `asset` and records the resulting stage on it.
    ///
    /// The asset is only written to once every check has passed. If the
    /// write itself fails the error is [`CoreError::Persist`]: the new stage
    /// was computed but must not be assumed committed.
    pub fn take_action<A: Asset>(
        &self,
        asset: &mut A,
        action: &str,
    ) -> Result<Transitioned, CoreError> {
        let result = self.preview(&*asset, action)?;

        if let Err(e) = asset.set_status(&result.to, action) {
            let source: AssetError = e.into();
            tracing::warn!(
                flow = %self.name,
                action,
                from = %result.from,
                to = %result.to,
                error = %source,
                "asset failed to persist new stage"
            );
            return Err(CoreError::Persist {
                stage: result.to,
                action: result.action,
                source,
            });
        }

        tracing::debug!(
            flow = %self.name,
            action,
            from = %result.from,
            to = %result.to,
            "action taken"
        );
        Ok(result)
    }
}
