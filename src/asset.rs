//! Asset Model - Departments and Version Histories
//!
//! An asset owns one ordered version history per department. Paths are never
//! stored; they are rendered on demand through the project's templates.

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::settings::{ProjectSettings, UserSettings};
use crate::templates::{Fields, LocationTemplate, TemplateError};

/// Placeholders a version template may use.
pub const VERSION_FIELDS: &[&str] = &[
    "kind", "name", "dep", "user", "version", "extension", "timestamp",
];

/// Placeholders the release and release-history templates may use.
pub const RELEASE_FIELDS: &[&str] = &["kind", "name", "dep", "extension"];

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version selector '{0}', expected 'latest' or a number")]
    InvalidSelector(String),

    #[error("Version number {number} of '{name}' in department '{dep}' is not positive")]
    InvalidVersionNumber { name: String, dep: String, number: u32 },

    #[error("No version number left after the last one of '{name}' in department '{dep}'")]
    VersionOverflow { name: String, dep: String },

    #[error("Version {selector} not found for '{name}' in department '{dep}'")]
    VersionNotFound {
        name: String,
        dep: String,
        selector: VersionSelector,
    },
}

/// Compiled templates and project configuration shared by all assets.
#[derive(Debug)]
pub struct AssetContext {
    pub base_dir: PathBuf,
    pub project: ProjectSettings,
    pub user: UserSettings,
    version: LocationTemplate,
    release: LocationTemplate,
    release_history: LocationTemplate,
}

impl AssetContext {
    pub fn new(project: &ProjectSettings, user: &UserSettings) -> Result<Arc<Self>, TemplateError> {
        let version = LocationTemplate::parse(&project.templates.version)?;
        version.full.require_only(VERSION_FIELDS)?;
        let release = LocationTemplate::parse(&project.templates.release)?;
        release.full.require_only(RELEASE_FIELDS)?;
        let release_history = LocationTemplate::parse(&project.templates.release_history)?;
        release_history.full.require_only(RELEASE_FIELDS)?;

        Ok(Arc::new(Self {
            base_dir: user.local_project_location.clone(),
            project: project.clone(),
            user: user.clone(),
            version,
            release,
            release_history,
        }))
    }

    pub fn version_template(&self) -> &LocationTemplate {
        &self.version
    }
}

/// One immutable scene record inside a department history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub kind: String,
    pub name: String,
    pub extension: String,
    pub dep: String,
    pub user: String,
    pub timestamp: Option<i64>,
    pub number: u32,
}

impl Version {
    /// Four-digit, zero-padded display form.
    pub fn padded(&self) -> String {
        format!("{:04}", self.number)
    }

    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("kind".into(), self.kind.clone());
        fields.insert("name".into(), self.name.clone());
        fields.insert("extension".into(), self.extension.clone());
        fields.insert("dep".into(), self.dep.clone());
        fields.insert("user".into(), self.user.clone());
        fields.insert("version".into(), self.padded());
        if let Some(ts) = self.timestamp {
            fields.insert("timestamp".into(), ts.to_string());
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionSelector {
    #[default]
    Latest,
    Number(u32),
}

impl FromStr for VersionSelector {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "latest" {
            return Ok(Self::Latest);
        }
        s.parse::<u32>()
            .map(Self::Number)
            .map_err(|_| AssetError::InvalidSelector(s.to_string()))
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Number(n) => write!(f, "{:04}", n),
        }
    }
}

/// An asset, identified by its name within a project.
#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    pub kind: String,
    pub name: String,
    pub extension: String,
    deps: IndexMap<String, Vec<Version>>,
    #[serde(skip)]
    context: Arc<AssetContext>,
}

impl Asset {
    /// A brand-new asset, seeded with the empty start department of its kind.
    pub fn new(kind: &str, name: &str, extension: &str, context: Arc<AssetContext>) -> Self {
        let mut asset = Self::reconciled(kind, name, extension, context);
        let start_dep = asset.context.project.start_dep(kind).to_string();
        asset.deps.insert(start_dep, Vec::new());
        asset
    }

    /// An asset rebuilt from an external record; departments come from its versions.
    pub fn reconciled(kind: &str, name: &str, extension: &str, context: Arc<AssetContext>) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            extension: extension.to_string(),
            deps: IndexMap::new(),
            context,
        }
    }

    pub fn context(&self) -> &Arc<AssetContext> {
        &self.context
    }

    pub fn departments(&self) -> Vec<&str> {
        self.deps.keys().map(String::as_str).collect()
    }

    pub fn versions(&self, dep: &str) -> Option<&[Version]> {
        self.deps.get(dep).map(Vec::as_slice)
    }

    /// Append the next version: one more than the last appended, or 1.
    pub fn new_version(&mut self, dep: &str, user: &str) -> Result<&Version, AssetError> {
        let history = self.deps.entry(dep.to_string()).or_default();
        let number = match history.last() {
            Some(last) => last.number.checked_add(1).ok_or_else(|| AssetError::VersionOverflow {
                name: self.name.clone(),
                dep: dep.to_string(),
            })?,
            None => 1,
        };
        history.push(Version {
            kind: self.kind.clone(),
            name: self.name.clone(),
            extension: self.extension.clone(),
            dep: dep.to_string(),
            user: user.to_string(),
            timestamp: Some(Utc::now().timestamp()),
            number,
        });
        Ok(&history[history.len() - 1])
    }

    /// Append a version whose number is already known. Ordering is the caller's concern.
    pub fn add_version_scene(
        &mut self,
        dep: &str,
        user: &str,
        number: u32,
        timestamp: Option<i64>,
    ) -> Result<(), AssetError> {
        if number == 0 {
            return Err(AssetError::InvalidVersionNumber {
                name: self.name.clone(),
                dep: dep.to_string(),
                number,
            });
        }
        let version = Version {
            kind: self.kind.clone(),
            name: self.name.clone(),
            extension: self.extension.clone(),
            dep: dep.to_string(),
            user: user.to_string(),
            timestamp,
            number,
        };
        self.deps.entry(dep.to_string()).or_default().push(version);
        Ok(())
    }

    /// Highest version number in `dep`, compared numerically.
    pub fn latest(&self, dep: &str) -> Option<&Version> {
        self.deps.get(dep)?.iter().max_by_key(|v| v.number)
    }

    pub fn find_version(&self, dep: &str, number: u32) -> Option<&Version> {
        self.deps.get(dep)?.iter().find(|v| v.number == number)
    }

    pub fn select(&self, dep: &str, selector: VersionSelector) -> Option<&Version> {
        match selector {
            VersionSelector::Latest => self.latest(dep),
            VersionSelector::Number(n) => self.find_version(dep, n),
        }
    }

    /// Rendered path of the selected version, or `None` when it does not exist.
    pub fn get_version(&self, dep: &str, selector: VersionSelector) -> Result<Option<PathBuf>, TemplateError> {
        match self.select(dep, selector) {
            Some(version) => self.version_path(version).map(Some),
            None => {
                warn!(
                    "Version {} not found for {} '{}' in department '{}'.",
                    selector, self.kind, self.name, dep
                );
                Ok(None)
            }
        }
    }

    pub fn version_path(&self, version: &Version) -> Result<PathBuf, TemplateError> {
        let fields = version.fields();
        let dir = self.context.version.dir.render(&fields)?;
        let file = self.context.version.file.render(&fields)?;
        Ok(self.context.base_dir.join(dir).join(file))
    }

    fn release_fields(&self, dep: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("kind".into(), self.kind.clone());
        fields.insert("name".into(), self.name.clone());
        fields.insert("dep".into(), dep.to_string());
        fields.insert("extension".into(), self.extension.clone());
        fields
    }

    pub fn release_path(&self, dep: &str) -> Result<PathBuf, TemplateError> {
        let dir = self.context.release.dir.render(&self.release_fields(dep))?;
        Ok(self.context.base_dir.join(dir))
    }

    pub fn release_name(&self, dep: &str) -> Result<String, TemplateError> {
        self.context.release.file.render(&self.release_fields(dep))
    }

    pub fn release(&self, dep: &str) -> Result<PathBuf, TemplateError> {
        Ok(self.release_path(dep)?.join(self.release_name(dep)?))
    }

    pub fn release_history_path(&self, dep: &str) -> Result<PathBuf, TemplateError> {
        let dir = self.context.release_history.dir.render(&self.release_fields(dep))?;
        Ok(self.context.base_dir.join(dir))
    }

    pub fn release_history_name(&self, dep: &str) -> Result<String, TemplateError> {
        self.context.release_history.file.render(&self.release_fields(dep))
    }

    /// Files in the release-history directory, sorted by name.
    pub fn release_history(&self, dep: &str) -> Result<Vec<PathBuf>, AssetError> {
        let dir = self.release_history_path(dep)?;
        if !dir.is_dir() {
            return Ok(vec![]);
        }
        let mut files = vec![];
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Directory holding the versions of `dep`.
    ///
    /// `None` when the directory template needs per-version fields and `dep`
    /// has no version yet.
    pub fn version_dir(&self, dep: &str) -> Result<Option<PathBuf>, TemplateError> {
        let dir = &self.context.version.dir;
        if dir.placeholders().iter().all(|p| RELEASE_FIELDS.contains(p)) {
            let rendered = dir.render(&self.release_fields(dep))?;
            return Ok(Some(self.context.base_dir.join(rendered)));
        }
        match self.latest(dep) {
            Some(version) => Ok(self.version_path(version)?.parent().map(Path::to_path_buf)),
            None => Ok(None),
        }
    }

    /// Make the version, release and release-history directories of every department.
    pub fn create_folders(&self) -> Result<(), AssetError> {
        for dep in self.deps.keys() {
            match self.version_dir(dep)? {
                Some(dir) => fs::create_dir_all(dir)?,
                None => debug!(
                    "Version directory of {} '{}' in '{}' needs a version, skipping",
                    self.kind, self.name, dep
                ),
            }
            fs::create_dir_all(self.release_path(dep)?)?;
            fs::create_dir_all(self.release_history_path(dep)?)?;
        }
        Ok(())
    }
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Asset {}

impl PartialOrd for Asset {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Asset {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}
