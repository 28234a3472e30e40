//! Filesystem provider - rebuilds version histories by matching every file
//! under the project root against the version template.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{AssetProvider, ProviderError};
use crate::asset::{Asset, AssetContext};
use crate::templates::PathPattern;

/// Placeholders the version template needs for the history to be rebuilt.
const REQUIRED_FIELDS: &[&str] = &["name", "dep", "version"];

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    pub scanned: usize,
    pub matched: usize,
    pub skipped: usize,
}

pub struct FilesystemProvider {
    context: Arc<AssetContext>,
    root: PathBuf,
    pattern: PathPattern,
    assets: BTreeMap<String, Asset>,
}

impl FilesystemProvider {
    /// Build the provider without touching the disk.
    pub fn new(context: Arc<AssetContext>) -> Result<Self, ProviderError> {
        let template = &context.version_template().full;
        let placeholders = template.placeholders();
        if let Some(field) = REQUIRED_FIELDS.iter().copied().find(|f| !placeholders.contains(f)) {
            return Err(ProviderError::IncompleteTemplate {
                template: template.to_string(),
                field,
            });
        }

        Ok(Self {
            root: context.base_dir.clone(),
            pattern: template.pattern()?,
            context,
            assets: BTreeMap::new(),
        })
    }

    /// Build the provider and scan the project once.
    pub fn open(context: Arc<AssetContext>) -> Result<Self, ProviderError> {
        let mut provider = Self::new(context)?;
        provider.scan()?;
        Ok(provider)
    }

    /// Rebuild the asset list from the files under the project root.
    ///
    /// The previous list is replaced only when the walk succeeds.
    pub fn scan(&mut self) -> Result<ScanSummary, ProviderError> {
        let start = Instant::now();
        let mut summary = ScanSummary::default();
        let mut assets: BTreeMap<String, Asset> = BTreeMap::new();

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            summary.scanned += 1;

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");

            let Some(fields) = self.pattern.matches(&relative) else {
                debug!("Skipping {:?}: does not match version template", relative);
                summary.skipped += 1;
                continue;
            };

            let field = |key: &str| fields.get(key).map(String::as_str).unwrap_or_default();
            let number = match field("version").parse::<u32>() {
                Ok(0) | Err(_) => {
                    debug!("Skipping {:?}: version '{}' is not a positive number", relative, field("version"));
                    summary.skipped += 1;
                    continue;
                }
                Ok(number) => number,
            };
            let timestamp = fields.get("timestamp").and_then(|ts| ts.parse::<i64>().ok());
            let user = fields.get("user").map(String::as_str).unwrap_or("unknown");

            let name = field("name");
            let asset = assets.entry(name.to_string()).or_insert_with(|| {
                Asset::reconciled(field("kind"), name, field("extension"), self.context.clone())
            });
            asset.add_version_scene(field("dep"), user, number, timestamp)?;
            summary.matched += 1;
        }

        info!(
            "Scanned {:?}: {} files, {} versions, {} assets in {:?}",
            self.root,
            summary.scanned,
            summary.matched,
            assets.len(),
            start.elapsed()
        );
        self.assets = assets;
        Ok(summary)
    }
}

impl AssetProvider for FilesystemProvider {
    fn context(&self) -> &Arc<AssetContext> {
        &self.context
    }

    fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Asset> {
        self.assets.get_mut(name)
    }

    fn list_assets(&self) -> Vec<&Asset> {
        self.assets.values().collect()
    }

    fn reload(&mut self) -> Result<(), ProviderError> {
        self.scan().map(|_| ())
    }

    fn on_asset_created(&mut self, asset: Asset) -> Result<(), ProviderError> {
        self.assets.insert(asset.name.clone(), asset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ProjectSettings, UserSettings};
    use std::fs;
    use std::path::Path;

    fn context(root: &Path, version_template: &str) -> Arc<AssetContext> {
        let mut project = ProjectSettings::default();
        project.templates.version = version_template.to_string();
        let user = UserSettings {
            local_project_location: root.to_path_buf(),
            ..UserSettings::default()
        };
        AssetContext::new(&project, &user).unwrap()
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_template_without_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "${kind}/${name}/${dep}/${name}.${extension}");
        assert!(matches!(
            FilesystemProvider::new(ctx),
            Err(ProviderError::IncompleteTemplate { field: "version", .. })
        ));
    }

    #[test]
    fn test_timestamp_is_optional_field() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(
            dir.path(),
            "${kind}/${name}/${dep}/${name}_v${version}_${timestamp}.${extension}",
        );
        touch(dir.path(), "char/bob/model/bob_v0001_1700000000.ma");

        let p = FilesystemProvider::open(ctx).unwrap();
        let v = p.get("bob").unwrap().latest("model").unwrap();
        assert_eq!(v.timestamp, Some(1_700_000_000));
        assert_eq!(v.user, "unknown");
    }

    #[test]
    fn test_non_numeric_version_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "${kind}/${name}/${dep}/${name}_v${version}.${extension}");
        touch(dir.path(), "char/bob/model/bob_vXX.ma");
        touch(dir.path(), "char/bob/model/bob_v0002.ma");

        let mut p = FilesystemProvider::new(ctx).unwrap();
        let summary = p.scan().unwrap();
        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_version_zero_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "${kind}/${name}/${dep}/${name}_v${version}.${extension}");
        touch(dir.path(), "char/bob/model/bob_v0000.ma");
        touch(dir.path(), "char/bob/model/bob_v0001.ma");

        let mut p = FilesystemProvider::new(ctx).unwrap();
        let summary = p.scan().unwrap();
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(p.get("bob").unwrap().versions("model").unwrap().len(), 1);
    }

    #[test]
    fn test_reload_is_a_full_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "${kind}/${name}/${dep}/${name}_v${version}.${extension}");
        touch(dir.path(), "char/bob/model/bob_v0001.ma");

        let mut p = FilesystemProvider::open(ctx).unwrap();
        assert_eq!(p.get("bob").unwrap().versions("model").unwrap().len(), 1);

        fs::remove_dir_all(dir.path().join("char")).unwrap();
        touch(dir.path(), "prop/cup/model/cup_v0001.ma");
        p.reload().unwrap();

        assert!(p.get("bob").is_none());
        assert!(p.get("cup").is_some());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(
            &dir.path().join("gone"),
            "${kind}/${name}/${dep}/${name}_v${version}.${extension}",
        );
        assert!(matches!(
            FilesystemProvider::open(ctx),
            Err(ProviderError::Walk(_))
        ));
    }

    #[test]
    fn test_failed_reload_keeps_previous_assets() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        let ctx = context(&root, "${kind}/${name}/${dep}/${name}_v${version}.${extension}");
        touch(&root, "char/bob/model/bob_v0001.ma");

        let mut p = FilesystemProvider::open(ctx).unwrap();
        fs::rename(&root, dir.path().join("moved")).unwrap();

        assert!(p.reload().is_err());
        assert_eq!(p.list_assets().len(), 1);
        assert_eq!(p.get("bob").unwrap().latest("model").unwrap().number, 1);
    }
}
