//! Core error types.

use thiserror::Error;

/// Boxed error produced by an asset's own capability implementation.
pub type AssetError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from the flow engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown action '{action}' for flow '{flow}'")]
    UnknownAction { flow: String, action: String },

    #[error("asset reports stage '{stage}' which is not part of flow '{flow}'")]
    UnknownStage { flow: String, stage: String },

    #[error("action '{action}' is not allowed from stage '{stage}'")]
    IllegalAction { stage: String, action: String },

    #[error("no outcome of '{action}' matches the asset's context in stage '{stage}'")]
    NoOutcome { stage: String, action: String },

    #[error("asset in stage '{stage}' reports reserved flag '{flag}'")]
    ReservedFlag { stage: String, flag: String },

    #[error("failed to read asset: {source}")]
    AssetRead {
        #[source]
        source: AssetError,
    },

    #[error("failed to persist stage '{stage}' after '{action}': {source}")]
    Persist {
        stage: String,
        action: String,
        #[source]
        source: AssetError,
    },

    #[error("malformed condition key {key:?}: {reason}")]
    Format { key: String, reason: String },

    #[error("invalid flow definition: {reason}")]
    InvalidDefinition { reason: String },

    #[error("overlapping outcomes on '{transition}': {first:?} and {second:?}")]
    OverlappingOutcomes {
        transition: String,
        first: String,
        second: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CoreError {
    pub(crate) fn format(key: &str, reason: impl Into<String>) -> Self {
        CoreError::Format {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns whether repeating the same call may succeed.
    ///
    /// Only a failed read qualifies: nothing was resolved or written. A
    /// persist failure is left to the caller since the asset's write may
    /// have had partial effects.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::AssetRead { .. })
    }

    /// Returns whether this is an ordinary rejection of the action rather
    /// than a misconfiguration or a failing asset.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CoreError::IllegalAction { .. } | CoreError::NoOutcome { .. }
        )
    }

    /// Returns a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::UnknownAction { .. } => "UNKNOWN_ACTION",
            CoreError::UnknownStage { .. } => "UNKNOWN_STAGE",
            CoreError::IllegalAction { .. } => "ILLEGAL_ACTION",
            CoreError::NoOutcome { .. } => "NO_OUTCOME",
            CoreError::ReservedFlag { .. } => "RESERVED_FLAG",
            CoreError::AssetRead { .. } => "ASSET_READ",
            CoreError::Persist { .. } => "PERSIST_FAILED",
            CoreError::Format { .. } => "BAD_FORMAT",
            CoreError::InvalidDefinition { .. } => "BAD_DEFINITION",
            CoreError::OverlappingOutcomes { .. } => "BAD_DEFINITION",
            CoreError::Json(_) => "BAD_FORMAT",
            CoreError::Yaml(_) => "BAD_FORMAT",
        }
    }
}
