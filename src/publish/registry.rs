//! Stage Registry - explicitly registered stages and their configured parameters

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::models::{Action, Parameters, Stage};
use super::stages::builtin_stages;
use super::PublishError;

/// Registered stages, keyed by name, in registration order.
pub struct StageRegistry {
    stages: IndexMap<String, Box<dyn Stage>>,
    parameters: IndexMap<String, Parameters>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self {
            stages: IndexMap::new(),
            parameters: IndexMap::new(),
        }
    }

    /// A registry holding every built-in stage.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for stage in builtin_stages() {
            registry.register(stage);
        }
        registry
    }

    /// Register `stage` under its own name with its default parameters.
    ///
    /// A stage registered under an existing name replaces the old one.
    pub fn register(&mut self, stage: Box<dyn Stage>) {
        let name = stage.name().to_string();
        debug!("Registering {} stage {}", stage.action(), name);
        self.parameters.insert(name.clone(), stage.default_parameters());
        if self.stages.insert(name.clone(), stage).is_some() {
            warn!("Stage {} registered twice, keeping the latest", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Stage> {
        self.stages.get(name).map(|s| &**s)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn Stage>> {
        self.stages.get_mut(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.keys().map(String::as_str).collect()
    }

    /// Names of the stages classified as `action`.
    pub fn list(&self, action: Action) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|(_, s)| s.action() == action)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn parameters(&self, name: &str) -> Option<&Parameters> {
        self.parameters.get(name)
    }

    /// Merge `params` over the configured parameters of `name`.
    pub fn set_parameters(&mut self, name: &str, params: Parameters) -> Result<(), PublishError> {
        let current = self
            .parameters
            .get_mut(name)
            .ok_or_else(|| PublishError::UnknownStage(name.to_string()))?;
        current.extend(params);
        Ok(())
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
