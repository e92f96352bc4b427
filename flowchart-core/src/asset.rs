//! The capability contract between a flow and the entity it drives.
//!
//! A flow never looks inside an asset. It reads the asset's stage and
//! context, resolves an action, and asks the asset to record the new stage.
//! Where the stage actually lives is up to the implementation.

use crate::condition::ConditionSet;
use crate::error::AssetError;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

/// Anything with a life-cycle stage that a [`Flow`](crate::Flow) can drive.
pub trait Asset {
    type Error: Into<AssetError>;

    /// Returns the name of the stage the asset is currently in.
    fn status(&self) -> Result<String, Self::Error>;

    /// Records `stage` as the asset's new stage, reached through `action`.
    fn set_status(&mut self, stage: &str, action: &str) -> Result<(), Self::Error>;

    /// Describes the asset's current boolean context.
    ///
    /// Flags that no outcome refers to are harmless. Names starting with
    /// `@` are reserved for the engine.
    fn context(&self) -> Result<ConditionSet, Self::Error>;
}

/// A recorded stage change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub from: String,
    pub action: String,
    pub to: String,
}

/// An asset held entirely in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAsset {
    stage: String,
    flags: ConditionSet,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

impl MemoryAsset {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            flags: ConditionSet::new(),
            history: Vec::new(),
        }
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.add(name, value);
        self
    }

    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.flags.add(name, value);
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn flags(&self) -> &ConditionSet {
        &self.flags
    }

    /// Stage changes in the order they were recorded.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
}

impl Asset for MemoryAsset {
    type Error = Infallible;

    fn status(&self) -> Result<String, Self::Error> {
        Ok(self.stage.clone())
    }

    fn set_status(&mut self, stage: &str, action: &str) -> Result<(), Self::Error> {
        let from = std::mem::replace(&mut self.stage, stage.to_string());
        self.history.push(HistoryEntry {
            from,
            action: action.to_string(),
            to: stage.to_string(),
        });
        Ok(())
    }

    fn context(&self) -> Result<ConditionSet, Self::Error> {
        Ok(self.flags.clone())
    }
}

/// A cloneable handle to an asset shared between callers.
///
/// Each capability call takes the lock on its own. Nothing holds the lock
/// across a whole [`Flow::take_action`](crate::Flow::take_action), so two
/// callers acting on the same asset can interleave their reads and writes.
/// Callers that need one action at a time per asset must serialize around
/// the call themselves, for example by holding [`SharedAsset::lock`] and
/// passing the guarded asset.
#[derive(Debug, Default)]
pub struct SharedAsset<A> {
    inner: Arc<Mutex<A>>,
}

impl<A> SharedAsset<A> {
    pub fn new(asset: A) -> Self {
        Self {
            inner: Arc::new(Mutex::new(asset)),
        }
    }

    /// Locks the asset for exclusive use.
    pub fn lock(&self) -> MutexGuard<'_, A> {
        self.inner.lock()
    }
}

impl<A> Clone for SharedAsset<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Asset> Asset for SharedAsset<A> {
    type Error = A::Error;

    fn status(&self) -> Result<String, Self::Error> {
        self.inner.lock().status()
    }

    fn set_status(&mut self, stage: &str, action: &str) -> Result<(), Self::Error> {
        self.inner.lock().set_status(stage, action)
    }

    fn context(&self) -> Result<ConditionSet, Self::Error> {
        self.inner.lock().context()
    }
}
