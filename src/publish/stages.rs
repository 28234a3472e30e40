//! Built-in publish stages.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::PathBuf;

use super::models::{parse_parameters, Action, Parameters, RunState, Stage};
use super::scene::{SceneGraph, SceneNode, INITIAL_SHADING_GROUP, TRANSFORM};
use super::PublishError;

/// Identity and run-state accessors shared by every stage.
macro_rules! stage_identity {
    ($name:literal, $label:literal, $action:expr) => {
        fn name(&self) -> &'static str {
            $name
        }

        fn label(&self) -> &'static str {
            $label
        }

        fn action(&self) -> Action {
            $action
        }

        fn state(&self) -> &RunState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut RunState {
            &mut self.state
        }
    };
}

fn as_parameters(value: serde_json::Value) -> Parameters {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Parameters::new(),
    }
}

/// Every built-in stage, freshly constructed.
pub fn builtin_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(CollectGeoSets::default()),
        Box::new(CollectGeoSetsMembers::default()),
        Box::new(CheckPostfixes::default()),
        Box::new(CheckForHistory::default()),
        Box::new(CheckMultipleShapeNodes::default()),
        Box::new(CheckFreezedTransforms::default()),
        Box::new(CheckInitialShadingGroupApplied::default()),
        Box::new(ExportItemManifest::default()),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SuffixOptions {
    #[serde(default = "default_geo_suffix")]
    suffix: String,
}

fn default_geo_suffix() -> String {
    "_geo".to_string()
}

#[derive(Debug)]
pub struct CollectGeoSets {
    state: RunState,
    suffix: String,
}

impl Default for CollectGeoSets {
    fn default() -> Self {
        Self {
            state: RunState::default(),
            suffix: default_geo_suffix(),
        }
    }
}

impl Stage for CollectGeoSets {
    stage_identity!("CollectGeoSets", "Sets postfixed '_geo'", Action::Collect);

    fn description(&self) -> &'static str {
        "Collect sets with postfix '_geo'."
    }

    fn default_parameters(&self) -> Parameters {
        as_parameters(json!({ "suffix": default_geo_suffix() }))
    }

    fn set_parameters(&mut self, params: &Parameters) -> Result<(), PublishError> {
        let opts: SuffixOptions = parse_parameters(self.name(), params)?;
        self.suffix = opts.suffix;
        Ok(())
    }

    fn collect(&mut self, scene: &SceneGraph) -> Result<Vec<SceneNode>, PublishError> {
        let sets: Vec<SceneNode> = scene.sets_with_suffix(&self.suffix).cloned().collect();
        match sets.len() {
            0 => self.state.fail(format!(
                "No set detected. Add all publishable geo to a set ending with {}",
                self.suffix
            )),
            1 => self.state.note("Collected 1 geo set."),
            n => self.state.note(format!("Collected {} geo sets.", n)),
        }
        Ok(sets)
    }
}

#[derive(Debug)]
pub struct CollectGeoSetsMembers {
    state: RunState,
    suffix: String,
}

impl Default for CollectGeoSetsMembers {
    fn default() -> Self {
        Self {
            state: RunState::default(),
            suffix: default_geo_suffix(),
        }
    }
}

impl Stage for CollectGeoSetsMembers {
    stage_identity!("CollectGeoSetsMembers", "Members of '_geo' sets", Action::Collect);

    fn description(&self) -> &'static str {
        "Collect members of sets with '_geo' postfix."
    }

    fn default_parameters(&self) -> Parameters {
        as_parameters(json!({ "suffix": default_geo_suffix() }))
    }

    fn set_parameters(&mut self, params: &Parameters) -> Result<(), PublishError> {
        let opts: SuffixOptions = parse_parameters(self.name(), params)?;
        self.suffix = opts.suffix;
        Ok(())
    }

    fn collect(&mut self, scene: &SceneGraph) -> Result<Vec<SceneNode>, PublishError> {
        let mut members = vec![];
        for set in scene.sets_with_suffix(&self.suffix) {
            if set.members.is_empty() {
                self.state.note(format!("No members in set '{}'.", set.name));
            }
            for member in &set.members {
                match scene.find(member) {
                    Some(node) => members.push(node.clone()),
                    None => self
                        .state
                        .note(format!("Member '{}' of set '{}' not in scene.", member, set.name)),
                }
            }
        }
        if members.is_empty() {
            self.state.fail("No set members collected.");
        } else {
            self.state.note(format!("Collected {} Objects.", members.len()));
        }
        Ok(members)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PostfixOptions {
    #[serde(default = "default_postfixes")]
    postfixes: Vec<String>,
}

fn default_postfixes() -> Vec<String> {
    vec!["_geo".to_string()]
}

#[derive(Debug)]
pub struct CheckPostfixes {
    state: RunState,
    postfixes: Vec<String>,
}

impl Default for CheckPostfixes {
    fn default() -> Self {
        Self {
            state: RunState::default(),
            postfixes: default_postfixes(),
        }
    }
}

impl Stage for CheckPostfixes {
    stage_identity!("CheckPostfixes", "Specific Postfixes", Action::Check);

    /// Does not check that the postfix fits the object type.
    fn description(&self) -> &'static str {
        "Check user specified Postfixes."
    }

    fn default_parameters(&self) -> Parameters {
        as_parameters(json!({ "postfixes": default_postfixes() }))
    }

    fn set_parameters(&mut self, params: &Parameters) -> Result<(), PublishError> {
        let opts: PostfixOptions = parse_parameters(self.name(), params)?;
        self.postfixes = opts.postfixes;
        Ok(())
    }

    fn check(&mut self, items: &[SceneNode]) -> Result<(), PublishError> {
        for item in items {
            if !self.postfixes.iter().any(|p| item.name.ends_with(p.as_str())) {
                self.state.fail(format!(
                    "Missing postfix on '{}'. Expected: {:?}",
                    item.name, self.postfixes
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TypeOptions {
    #[serde(default = "default_history_types")]
    types: Vec<String>,
}

fn default_history_types() -> Vec<String> {
    vec![TRANSFORM.to_string()]
}

#[derive(Debug)]
pub struct CheckForHistory {
    state: RunState,
    types: Vec<String>,
}

impl Default for CheckForHistory {
    fn default() -> Self {
        Self {
            state: RunState::default(),
            types: default_history_types(),
        }
    }
}

impl Stage for CheckForHistory {
    stage_identity!("CheckForHistory", "No History", Action::Check);

    fn description(&self) -> &'static str {
        "Check for history."
    }

    fn default_parameters(&self) -> Parameters {
        as_parameters(json!({ "types": default_history_types() }))
    }

    fn set_parameters(&mut self, params: &Parameters) -> Result<(), PublishError> {
        let opts: TypeOptions = parse_parameters(self.name(), params)?;
        self.types = opts.types;
        Ok(())
    }

    fn check(&mut self, items: &[SceneNode]) -> Result<(), PublishError> {
        for node in items.iter().filter(|n| self.types.contains(&n.node_type)) {
            let Some(shape) = node.shapes.first() else {
                continue;
            };
            if !shape.history.is_empty() {
                self.state.fail(format!("Object '{}' has history.", node.name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CheckMultipleShapeNodes {
    state: RunState,
}

impl Stage for CheckMultipleShapeNodes {
    stage_identity!("CheckMultipleShapeNodes", "One shape node only", Action::Check);

    fn description(&self) -> &'static str {
        "Checks for multiple shape nodes in an object."
    }

    fn check(&mut self, items: &[SceneNode]) -> Result<(), PublishError> {
        for node in items.iter().filter(|n| n.shapes.len() > 1) {
            self.state.fail(format!("Multiple shapes detected in {}.", node.name));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CheckFreezedTransforms {
    state: RunState,
}

impl Stage for CheckFreezedTransforms {
    stage_identity!("CheckFreezedTransforms", "Freezed Transforms", Action::Check);

    fn description(&self) -> &'static str {
        "Check for freezed transforms."
    }

    fn check(&mut self, items: &[SceneNode]) -> Result<(), PublishError> {
        for node in items.iter().filter(|n| n.node_type == TRANSFORM) {
            if node.translate.iter().any(|v| *v != 0.0) {
                self.state
                    .fail(format!("Object '{}' has nonzero transformation values.", node.name));
            }
            if node.rotate.iter().any(|v| *v != 0.0) {
                self.state
                    .fail(format!("Object '{}' has nonzero rotation values.", node.name));
            }
            if node.scale.iter().any(|v| *v != 1.0) {
                self.state.fail(format!(
                    "Object '{}' has scale values different from (1,1,1).",
                    node.name
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CheckInitialShadingGroupApplied {
    state: RunState,
}

impl Stage for CheckInitialShadingGroupApplied {
    stage_identity!(
        "CheckInitialShadingGroupApplied",
        "Initial Shading Group",
        Action::Check
    );

    fn description(&self) -> &'static str {
        "Check that only 'initialShadingGroup' is applied."
    }

    fn check(&mut self, items: &[SceneNode]) -> Result<(), PublishError> {
        for node in items {
            let Some(shape) = node.shapes.first() else {
                continue;
            };
            match shape.shading_engines.first() {
                Some(engine) if engine == INITIAL_SHADING_GROUP => {}
                Some(_) => self.state.fail(format!("Object '{}' has shaders assigned.", node.name)),
                None => self
                    .state
                    .fail(format!("Object '{}' has no shading group.", node.name)),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ManifestOptions {
    #[serde(default)]
    path: Option<PathBuf>,
}

/// Writes the names of all collected items as a JSON document.
#[derive(Debug, Default)]
pub struct ExportItemManifest {
    state: RunState,
    path: Option<PathBuf>,
}

impl Stage for ExportItemManifest {
    stage_identity!("ExportItemManifest", "Item Manifest", Action::Export);

    fn description(&self) -> &'static str {
        "Export the collected item names as JSON."
    }

    fn default_parameters(&self) -> Parameters {
        as_parameters(json!({ "path": null }))
    }

    fn set_parameters(&mut self, params: &Parameters) -> Result<(), PublishError> {
        let opts: ManifestOptions = parse_parameters(self.name(), params)?;
        self.path = opts.path;
        Ok(())
    }

    fn export(&mut self, items: &[SceneNode]) -> Result<(), PublishError> {
        let Some(path) = &self.path else {
            self.state.fail("No export path configured.");
            return Ok(());
        };
        let names: Vec<&str> = items.iter().map(|n| n.name.as_str()).collect();
        fs::write(path, serde_json::to_string_pretty(&json!({ "items": names }))?)?;
        self.state
            .note(format!("Wrote {} items to {}.", names.len(), path.display()));
        Ok(())
    }
}
