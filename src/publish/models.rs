//! Stage Model - Classification, Run State and the Stage Contract

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::scene::{SceneGraph, SceneNode};
use super::PublishError;

/// Stage parameters, a JSON object of named options.
pub type Parameters = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Collect,
    Check,
    Export,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Collect => "Collect",
            Action::Check => "Check",
            Action::Export => "Export",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub failed: bool,
    pub stop_on_failed: bool,
    pub messages: Vec<String>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            failed: false,
            stop_on_failed: true,
            messages: vec![],
        }
    }
}

impl RunState {
    pub fn reset(&mut self) {
        self.failed = false;
        self.messages.clear();
    }

    /// Record a problem and mark the stage failed.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.failed = true;
        self.messages.push(message.into());
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }
}

/// A unit of publish work.
///
/// Content problems are recorded in the stage's [`RunState`]; an `Err` means
/// the run itself cannot continue.
pub trait Stage {
    fn name(&self) -> &'static str;

    /// Short human-readable title.
    fn label(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }

    fn action(&self) -> Action;

    fn state(&self) -> &RunState;

    fn state_mut(&mut self) -> &mut RunState;

    /// Whether a failure of this stage aborts the run unless configured otherwise.
    fn stops_on_failure(&self) -> bool {
        true
    }

    fn default_parameters(&self) -> Parameters {
        Parameters::new()
    }

    fn set_parameters(&mut self, _params: &Parameters) -> Result<(), PublishError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.state_mut().reset();
    }

    fn collect(&mut self, _scene: &SceneGraph) -> Result<Vec<SceneNode>, PublishError> {
        Ok(vec![])
    }

    fn check(&mut self, _items: &[SceneNode]) -> Result<(), PublishError> {
        Ok(())
    }

    fn export(&mut self, _items: &[SceneNode]) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Deserialize a parameter object into a stage's typed options.
pub fn parse_parameters<T: DeserializeOwned>(stage: &str, params: &Parameters) -> Result<T, PublishError> {
    serde_json::from_value(Value::Object(params.clone())).map_err(|source| {
        PublishError::InvalidParameters {
            stage: stage.to_string(),
            source,
        }
    })
}

/// Snapshot of a stage after it ran, handed to reporters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    pub label: String,
    pub action: Action,
    pub failed: bool,
    pub stop_on_failed: bool,
    pub messages: Vec<String>,
}

impl StageReport {
    pub fn from_stage(stage: &dyn Stage) -> Self {
        let state = stage.state();
        Self {
            name: stage.name().to_string(),
            label: stage.label().to_string(),
            action: stage.action(),
            failed: state.failed,
            stop_on_failed: state.stop_on_failed,
            messages: state.messages.clone(),
        }
    }
}
