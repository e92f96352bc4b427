//! # flowchart-core
//!
//! Condition-driven stage flows.
//!
//! This crate provides:
//! - Boolean condition sets with a canonical, order-independent encoding
//! - Stages and the actions legal from them
//! - Transitions that pick a destination from the asset's context
//! - Sealed flows that drive any [`Asset`] one action at a time

pub mod asset;
pub mod condition;
pub mod definition;
pub mod error;
pub mod flow;
pub mod stage;
pub mod transition;

pub use asset::{Asset, HistoryEntry, MemoryAsset, SharedAsset};
pub use condition::{is_reserved, origin_flag, CanonicalKey, ConditionSet};
pub use definition::{DefinitionFormat, FlowDefinition};
pub use error::{AssetError, CoreError};
pub use flow::{Diagnostic, Flow, FlowBuilder, Transitioned};
pub use stage::Stage;
pub use transition::{Outcome, Transition};
