//! User Actions - Asset Creation, New Versions and Release Promotion
//!
//! Everything here touches the project directory. The asset model itself
//! stays pure; the creator renders its paths and moves the files.

use chrono::{DateTime, Local};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::asset::{Asset, AssetContext, AssetError, Version, VersionSelector};
use crate::events::{Event, EventBus, EventError};
use crate::names::legalize_name;
use crate::providers::AssetProvider;
use crate::templates::TemplateError;

pub const DEFAULT_EXTENSION: &str = "ma";

#[derive(Debug, Error)]
pub enum CreatorError {
    #[error("Asset name '{0}' is empty after legalization")]
    EmptyName(String),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Event(#[from] EventError),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CreatorError + '_ {
    move |source| CreatorError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn ensure_parent(path: &Path) -> Result<(), CreatorError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    Ok(())
}

/// Performs the file-level user actions of one project.
#[derive(Debug, Clone)]
pub struct AssetCreator {
    context: Arc<AssetContext>,
    extension: String,
}

impl AssetCreator {
    pub fn new(context: Arc<AssetContext>) -> Self {
        Self {
            context,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// File extension of the scenes this creator produces.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_string();
        self
    }

    /// Create a new asset with its first version and announce it on `bus`.
    ///
    /// Returns `None` if an asset of that name already exists. The provider is
    /// only borrowed for the existence check, so subscribers may borrow it
    /// mutably while the event is dispatched.
    pub fn create<P>(
        &self,
        provider: &RefCell<P>,
        bus: &EventBus,
        kind: &str,
        name: &str,
    ) -> Result<Option<Asset>, CreatorError>
    where
        P: AssetProvider + ?Sized,
    {
        let legal = legalize_name(name.trim());
        if legal.is_empty() {
            return Err(CreatorError::EmptyName(name.to_string()));
        }
        if provider.borrow().get(&legal).is_some() {
            info!("Asset {} already exists, skipping", legal);
            return Ok(None);
        }

        let mut asset = Asset::new(kind, &legal, &self.extension, self.context.clone());
        let start_dep = self.context.project.start_dep(kind).to_string();
        let version = asset.new_version(&start_dep, &self.context.user.username)?.clone();
        asset.create_folders()?;

        let target = asset.version_path(&version)?;
        self.copy_mother_scene(&start_dep, &target)?;

        info!("Created {} {} ({} v{})", kind, legal, start_dep, version.padded());
        bus.post(&Event::AssetCreated(asset.clone()))?;
        Ok(Some(asset))
    }

    fn copy_mother_scene(&self, dep: &str, target: &Path) -> Result<(), CreatorError> {
        let Some(relative) = self.context.project.mother_scene(dep) else {
            return Ok(());
        };
        let source = self.context.base_dir.join(relative);
        if !source.is_file() {
            debug!("Mother scene {:?} missing, leaving {:?} empty", source, target);
            return Ok(());
        }
        ensure_parent(target)?;
        fs::copy(&source, target).map_err(io_error(&source))?;
        Ok(())
    }

    /// Append the next version of `dep`, carrying the previous version file forward.
    ///
    /// Returns the appended version with its path. That version is not
    /// necessarily `latest(dep)`, which is the numeric maximum.
    pub fn new_version(&self, asset: &mut Asset, dep: &str) -> Result<(Version, PathBuf), CreatorError> {
        let previous = match asset.latest(dep) {
            Some(version) => Some(asset.version_path(version)?),
            None => None,
        };
        let version = asset.new_version(dep, &self.context.user.username)?.clone();
        let path = asset.version_path(&version)?;
        ensure_parent(&path)?;

        match previous {
            Some(prev) if prev.is_file() => {
                fs::copy(&prev, &path).map_err(io_error(&prev))?;
                debug!("Copied {:?} forward to {:?}", prev, path);
            }
            _ => debug!("No previous file for {} {}, new version starts empty", asset.name, dep),
        }
        info!("New version {} {} v{}", asset.name, dep, version.padded());
        Ok((version, path))
    }

    /// Copy the selected version to the release path of `dep`.
    ///
    /// The version is staged next to the release before anything moves, so a
    /// missing version file leaves the current release in place. An existing
    /// release is then moved into the release history, suffixed with its
    /// modification time.
    pub fn promote(&self, asset: &Asset, dep: &str, selector: VersionSelector) -> Result<PathBuf, CreatorError> {
        let version = asset
            .select(dep, selector)
            .ok_or_else(|| AssetError::VersionNotFound {
                name: asset.name.clone(),
                dep: dep.to_string(),
                selector,
            })?;
        let source = asset.version_path(version)?;
        let release = asset.release(dep)?;
        ensure_parent(&release)?;

        let staging = release.with_file_name(format!(".{}.promote", asset.release_name(dep)?));
        fs::copy(&source, &staging).map_err(io_error(&source))?;

        if release.is_file() {
            match self.archive_release(asset, dep, &release) {
                Ok(archived) => info!("Moved previous release to {:?}", archived),
                Err(e) => {
                    if let Err(cleanup) = fs::remove_file(&staging) {
                        warn!("Could not remove {:?}: {}", staging, cleanup);
                    }
                    return Err(e);
                }
            }
        }

        fs::rename(&staging, &release).map_err(io_error(&staging))?;
        info!(
            "Promoted {} {} v{} to release",
            asset.name,
            dep,
            version.padded()
        );
        Ok(release)
    }

    fn archive_release(&self, asset: &Asset, dep: &str, release: &Path) -> Result<PathBuf, CreatorError> {
        let modified = fs::metadata(release)
            .and_then(|m| m.modified())
            .map_err(io_error(release))?;
        let stamp = DateTime::<Local>::from(modified).format("%Y%m%d_%H%M%S");

        let history_dir = asset.release_history_path(dep)?;
        fs::create_dir_all(&history_dir).map_err(io_error(&history_dir))?;

        let name = asset.release_history_name(dep)?;
        let file = Path::new(&name);
        let stem = file.file_stem().map_or_else(|| name.clone(), |s| s.to_string_lossy().into_owned());
        let archived_name = match file.extension() {
            Some(ext) => format!("{}_{}.{}", stem, stamp, ext.to_string_lossy()),
            None => format!("{}_{}", stem, stamp),
        };

        let archived = history_dir.join(archived_name);
        fs::rename(release, &archived).map_err(io_error(release))?;
        Ok(archived)
    }
}
