//! Settings - Project and User Configuration
//!
//! Both documents are plain JSON. Missing files fall back to defaults so a
//! fresh workstation can still browse a project.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The three path templates every project defines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSettings {
    #[serde(default = "default_version_template")]
    pub version: String,
    #[serde(default = "default_release_template")]
    pub release: String,
    #[serde(default = "default_release_history_template")]
    pub release_history: String,
}

fn default_version_template() -> String {
    "${kind}/${name}/${dep}/versions/${name}_${dep}_v${version}_${user}.${extension}".to_string()
}

fn default_release_template() -> String {
    "${kind}/${name}/${dep}/release/${name}_${dep}.${extension}".to_string()
}

fn default_release_history_template() -> String {
    "${kind}/${name}/${dep}/release_history/${name}_${dep}.${extension}".to_string()
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            version: default_version_template(),
            release: default_release_template(),
            release_history: default_release_history_template(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KindSettings {
    #[serde(default)]
    pub start_dep: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default)]
    pub templates: TemplateSettings,
    #[serde(default = "default_kinds")]
    pub kinds: HashMap<String, KindSettings>,
    #[serde(default = "default_start_dep")]
    pub default_start_dep: String,
    /// Department -> scene file relative to the project root. `"default"` is the fallback.
    #[serde(default)]
    pub mother_scenes: HashMap<String, String>,
}

fn default_start_dep() -> String {
    "model".to_string()
}

fn default_kinds() -> HashMap<String, KindSettings> {
    let mut kinds = HashMap::new();
    for kind in ["char", "prop", "set"] {
        kinds.insert(kind.to_string(), KindSettings::default());
    }
    kinds.insert(
        "seq".to_string(),
        KindSettings { start_dep: Some("layout".to_string()) },
    );
    kinds
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            templates: TemplateSettings::default(),
            kinds: default_kinds(),
            default_start_dep: default_start_dep(),
            mother_scenes: HashMap::new(),
        }
    }
}

impl ProjectSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        write_json(self, path)
    }

    /// First department of a new asset of `kind`.
    pub fn start_dep(&self, kind: &str) -> &str {
        self.kinds
            .get(kind)
            .and_then(|k| k.start_dep.as_deref())
            .unwrap_or(&self.default_start_dep)
    }

    pub fn mother_scene(&self, dep: &str) -> Option<&str> {
        self.mother_scenes
            .get(dep)
            .or_else(|| self.mother_scenes.get("default"))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default = "default_project_location")]
    pub local_project_location: PathBuf,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub project_settings: Option<PathBuf>,
}

fn default_project_location() -> PathBuf {
    PathBuf::from(".")
}

fn default_username() -> String {
    "unknown".to_string()
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            local_project_location: default_project_location(),
            username: default_username(),
            project_settings: None,
        }
    }
}

impl UserSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        write_json(self, path)
    }
}

fn read_json<T>(path: &Path) -> Result<T, SettingsError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if !path.is_file() {
        debug!("Settings file {:?} not found, using defaults", path);
        return Ok(T::default());
    }
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SettingsError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), SettingsError> {
    let content = serde_json::to_string_pretty(value).map_err(|source| SettingsError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ProjectSettings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.default_start_dep, "model");
        assert_eq!(settings.start_dep("seq"), "layout");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        fs::write(
            &path,
            r#"{"default_start_dep": "sculpt", "mother_scenes": {"default": "mother.ma"}}"#,
        )
        .unwrap();

        let settings = ProjectSettings::load(&path).unwrap();
        assert_eq!(settings.start_dep("prop"), "sculpt");
        assert_eq!(settings.start_dep("unheard_of"), "sculpt");
        assert_eq!(settings.mother_scene("rig"), Some("mother.ma"));
        assert!(settings.templates.version.contains("${version}"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            UserSettings::load(&path),
            Err(SettingsError::Malformed { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.json");
        let user = UserSettings {
            local_project_location: PathBuf::from("/projects/show"),
            username: "jo".to_string(),
            project_settings: None,
        };
        user.save(&path).unwrap();
        let loaded = UserSettings::load(&path).unwrap();
        assert_eq!(loaded.username, "jo");
        assert_eq!(loaded.local_project_location, PathBuf::from("/projects/show"));
    }
}
