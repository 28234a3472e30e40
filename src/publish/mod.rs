//! Publish Pipeline - Collect, Check, Export
//!
//! A playlist names the stages of one run. Stages run strictly in order
//! against one shared item list; a failed stage that stops on failure
//! aborts the rest of the playlist.

pub mod models;
pub mod registry;
pub mod scene;
pub mod stages;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub use models::{Action, Parameters, RunState, Stage, StageReport};
pub use registry::StageRegistry;
pub use scene::{SceneGraph, SceneNode, Shape};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Invalid parameters for {stage}: {source}")]
    InvalidParameters {
        stage: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub name: String,
    /// Overrides merged over the registry's configured parameters.
    #[serde(default)]
    pub parameters: Parameters,
}

impl From<&str> for PlaylistEntry {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: Parameters::new(),
        }
    }
}

/// Ordered stage selection for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(default)]
    pub stages: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, PublishError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn push(mut self, entry: impl Into<PlaylistEntry>) -> Self {
        self.stages.push(entry.into());
        self
    }
}

impl<'a> FromIterator<&'a str> for Playlist {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().map(PlaylistEntry::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReport {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: PipelineState,
    pub stages: Vec<StageReport>,
    pub item_count: usize,
}

impl PublishReport {
    /// Completed with no failed stage.
    pub fn passed(&self) -> bool {
        self.outcome == PipelineState::Completed && self.stages.iter().all(|s| !s.failed)
    }
}

pub type Reporter = Box<dyn Fn(&StageReport)>;

/// Report through the log.
pub fn log_reporter(report: &StageReport) {
    if report.failed {
        warn!("{} ({}): Failed", report.name, report.label);
    } else {
        info!("{} ({}): Passed", report.name, report.label);
    }
    for message in &report.messages {
        info!("    {}", message);
    }
}

/// Runs playlists of registered stages.
pub struct Publisher {
    registry: StageRegistry,
    reporters: Vec<Reporter>,
    items: Vec<SceneNode>,
    state: PipelineState,
}

impl Publisher {
    /// A publisher reporting through [`log_reporter`].
    pub fn new(registry: StageRegistry) -> Self {
        Self {
            registry,
            reporters: vec![Box::new(log_reporter)],
            items: vec![],
            state: PipelineState::Idle,
        }
    }

    /// Replace the default reporter.
    pub fn with_reporters(mut self, reporters: Vec<Reporter>) -> Self {
        self.reporters = reporters;
        self
    }

    pub fn add_reporter(&mut self, reporter: impl Fn(&StageReport) + 'static) {
        self.reporters.push(Box::new(reporter));
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut StageRegistry {
        &mut self.registry
    }

    /// Items collected by the last run.
    pub fn items(&self) -> &[SceneNode] {
        &self.items
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run `playlist` against `scene`.
    ///
    /// Unknown stage names are rejected before any stage runs. An `Err` from
    /// a stage leaves the publisher in the `Aborted` state.
    pub fn publish(&mut self, playlist: &Playlist, scene: &SceneGraph) -> Result<PublishReport, PublishError> {
        if let Some(entry) = playlist.stages.iter().find(|e| !self.registry.contains(&e.name)) {
            return Err(PublishError::UnknownStage(entry.name.clone()));
        }

        let started_at = Utc::now();
        self.state = PipelineState::Running;
        self.items.clear();

        let mut reports = vec![];
        let result = self.run_playlist(playlist, scene, &mut reports);
        self.state = match result {
            Ok(true) => PipelineState::Completed,
            Ok(false) | Err(_) => PipelineState::Aborted,
        };
        result?;

        let report = PublishReport {
            id: Uuid::new_v4().to_string(),
            started_at,
            finished_at: Utc::now(),
            outcome: self.state,
            stages: reports,
            item_count: self.items.len(),
        };
        info!(
            "Publish {} {:?}: {} stages, {} items",
            report.id,
            report.outcome,
            report.stages.len(),
            report.item_count
        );
        Ok(report)
    }

    /// Returns `Ok(false)` when a stage stopped the run.
    fn run_playlist(
        &mut self,
        playlist: &Playlist,
        scene: &SceneGraph,
        reports: &mut Vec<StageReport>,
    ) -> Result<bool, PublishError> {
        for entry in &playlist.stages {
            let mut params = self.registry.parameters(&entry.name).cloned().unwrap_or_default();
            params.extend(entry.parameters.clone());
            let stop_override = match params.remove("stop_on_failed") {
                Some(value) => Some(serde_json::from_value::<bool>(value).map_err(|source| {
                    PublishError::InvalidParameters {
                        stage: entry.name.clone(),
                        source,
                    }
                })?),
                None => None,
            };

            let stage = self
                .registry
                .get_mut(&entry.name)
                .ok_or_else(|| PublishError::UnknownStage(entry.name.clone()))?;

            stage.reset();
            let stop_on_failed = stop_override.unwrap_or_else(|| stage.stops_on_failure());
            stage.state_mut().stop_on_failed = stop_on_failed;
            stage.set_parameters(&params)?;

            let collected = stage.collect(scene)?;
            self.items.extend(collected);
            stage.check(&self.items)?;
            stage.export(&self.items)?;

            let report = StageReport::from_stage(&**stage);
            for reporter in &self.reporters {
                reporter(&report);
            }
            reports.push(report);

            let state = stage.state();
            if state.failed && state.stop_on_failed {
                warn!("Stage {} failed, stopping publish", entry.name);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(StageRegistry::builtin())
    }
}
