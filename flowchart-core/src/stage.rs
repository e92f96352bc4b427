//! Stages: the named nodes of a flow.

use serde::{Deserialize, Serialize};

/// A named stage and the actions an asset may take while in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,

    /// Legal actions, in registration order.
    #[serde(default)]
    actions: Vec<String>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    /// Marks `action` as legal from this stage. Registering twice is a no-op.
    pub fn register_action(&mut self, action: impl Into<String>) {
        let action = action.into();
        if !self.is_action_legal(&action) {
            self.actions.push(action);
        }
    }

    /// Builder-style [`Stage::register_action`].
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.register_action(action);
        self
    }

    pub fn is_action_legal(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(String::as_str)
    }

    pub(crate) fn dedup_actions(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.actions.retain(|a| seen.insert(a.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_action_is_idempotent() {
        let mut stage = Stage::new("egg");
        stage.register_action("hatch");
        stage.register_action("seen");
        stage.register_action("hatch");

        assert_eq!(stage.actions().collect::<Vec<_>>(), vec!["hatch", "seen"]);
        assert!(stage.is_action_legal("hatch"));
        assert!(!stage.is_action_legal("emerge"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let stage = Stage::new("cocoon").with_action("emerge");
        let json = serde_json::to_value(&stage).unwrap();
        assert_eq!(json, serde_json::json!({"name": "cocoon", "actions": ["emerge"]}));

        let parsed: Stage = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, stage);
    }

    #[test]
    fn test_missing_actions_defaults_to_empty() {
        let stage: Stage = serde_json::from_str(r#"{"name": "eaten"}"#).unwrap();
        assert_eq!(stage.actions().count(), 0);
    }
}
