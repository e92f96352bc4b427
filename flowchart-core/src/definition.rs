//! Serializable flow definitions.
//!
//! Definitions can be written in JSON or YAML:
//!
//! ```json
//! {
//!   "name": "butterfly",
//!   "stages": [
//!     {"name": "cocoon", "actions": ["emerge"]},
//!     {"name": "butterfly"},
//!     {"name": "moth"}
//!   ],
//!   "transitions": [
//!     {"name": "emerge", "outcomes": [
//!       {"when": {"isBrown": false}, "to": "butterfly"},
//!       {"when": "isBrown:true", "to": "moth"}
//!     ]}
//!   ]
//! }
//! ```
//!
//! Outcome conditions are either canonical keys or flag maps. Exported
//! definitions always use canonical keys, with stages and transitions
//! sorted by name.

use crate::error::CoreError;
use crate::flow::{Flow, FlowBuilder};
use crate::stage::Stage;
use crate::transition::Transition;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Text format of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionFormat {
    #[default]
    Json,
    Yaml,
}

impl DefinitionFormat {
    /// Guesses the format from a file extension. Anything that is not
    /// `.yaml` or `.yml` is treated as JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => DefinitionFormat::Yaml,
            _ => DefinitionFormat::Json,
        }
    }
}

impl std::str::FromStr for DefinitionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(DefinitionFormat::Json),
            "yaml" | "yml" => Ok(DefinitionFormat::Yaml),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

/// A flow as stored or transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub name: String,

    #[serde(default)]
    pub stages: Vec<Stage>,

    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl FlowDefinition {
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CoreError> {
        Ok(serde_json::from_value(json.clone())?)
    }

    pub fn parse(text: &str, format: DefinitionFormat) -> Result<Self, CoreError> {
        match format {
            DefinitionFormat::Json => Ok(serde_json::from_str(text)?),
            DefinitionFormat::Yaml => Ok(serde_yaml::from_str(text)?),
        }
    }

    pub fn render(&self, format: DefinitionFormat) -> Result<String, CoreError> {
        match format {
            DefinitionFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            DefinitionFormat::Yaml => Ok(serde_yaml::to_string(self)?),
        }
    }

    /// Returns the canonical form: stages and transitions sorted by name,
    /// duplicate actions and duplicate outcome keys collapsed.
    pub fn canonical(&self) -> Self {
        let mut def = self.clone();
        for stage in &mut def.stages {
            stage.dedup_actions();
        }
        for transition in &mut def.transitions {
            transition.normalize();
        }
        def.stages.sort_by(|a, b| a.name.cmp(&b.name));
        def.transitions.sort_by(|a, b| a.name.cmp(&b.name));
        def
    }

    /// CRC32C of the canonical JSON form, as 8 hex digits.
    pub fn checksum(&self) -> Result<String, CoreError> {
        let json_bytes = serde_json::to_vec(&self.canonical())?;
        Ok(format!("{:08x}", crc32c::crc32c(&json_bytes)))
    }

    /// Validates names and loads the definition into a builder.
    pub fn into_builder(self) -> Result<FlowBuilder, CoreError> {
        let def = self.canonical();
        if def.name.is_empty() {
            return Err(CoreError::InvalidDefinition {
                reason: "flow name is empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for stage in &def.stages {
            if stage.name.is_empty() {
                return Err(CoreError::InvalidDefinition {
                    reason: "stage with empty name".to_string(),
                });
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(CoreError::InvalidDefinition {
                    reason: format!("duplicate stage '{}'", stage.name),
                });
            }
        }

        seen.clear();
        for transition in &def.transitions {
            if transition.name.is_empty() {
                return Err(CoreError::InvalidDefinition {
                    reason: "transition with empty name".to_string(),
                });
            }
            if !seen.insert(transition.name.as_str()) {
                return Err(CoreError::InvalidDefinition {
                    reason: format!("duplicate transition '{}'", transition.name),
                });
            }
        }

        let mut builder = FlowBuilder::new(def.name);
        builder
            .add_stages(def.stages)
            .add_transitions(def.transitions);
        Ok(builder)
    }

    /// Builds and seals the flow. `strict` turns every diagnostic into an
    /// error.
    pub fn build(self, strict: bool) -> Result<Flow, CoreError> {
        let builder = self.into_builder()?;
        if strict {
            builder.seal_strict()
        } else {
            Ok(builder.seal())
        }
    }
}
