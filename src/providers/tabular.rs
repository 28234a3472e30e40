//! Tabular provider - rebuilds version histories from a spreadsheet-like table.
//!
//! Rows are grouped by asset name. The first row of a group is the asset's
//! header (kind, extension); every further row is one version.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{AssetProvider, ProviderError};
use crate::asset::{Asset, AssetContext, Version};

/// One table row. Columns: asset, kind, extension, dep, version, user, timestamp, comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub dep: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub comment: String,
}

impl TableRow {
    pub fn header(asset: &Asset) -> Self {
        Self {
            asset: asset.name.clone(),
            kind: asset.kind.clone(),
            extension: asset.extension.clone(),
            ..Self::default()
        }
    }

    pub fn version(version: &Version) -> Self {
        Self {
            asset: version.name.clone(),
            dep: version.dep.clone(),
            version: version.padded(),
            user: version.user.clone(),
            timestamp: version.timestamp.map(|ts| ts.to_string()).unwrap_or_default(),
            ..Self::default()
        }
    }

    fn is_header(&self) -> bool {
        !self.kind.is_empty()
    }

    fn version_number(&self) -> Option<u32> {
        self.version.parse().ok()
    }
}

impl From<[&str; 8]> for TableRow {
    fn from(cells: [&str; 8]) -> Self {
        let [asset, kind, extension, dep, version, user, timestamp, comment] = cells;
        Self {
            asset: asset.to_string(),
            kind: kind.to_string(),
            extension: extension.to_string(),
            dep: dep.to_string(),
            version: version.to_string(),
            user: user.to_string(),
            timestamp: timestamp.to_string(),
            comment: comment.to_string(),
        }
    }
}

/// Backing store of a [`TabularProvider`].
pub trait TableSource {
    fn fetch(&self) -> Result<Vec<TableRow>, ProviderError>;

    fn append(&mut self, rows: Vec<TableRow>) -> Result<(), ProviderError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub rows: Vec<TableRow>,
}

impl MemoryTable {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self { rows }
    }
}

impl TableSource for MemoryTable {
    fn fetch(&self) -> Result<Vec<TableRow>, ProviderError> {
        Ok(self.rows.clone())
    }

    fn append(&mut self, rows: Vec<TableRow>) -> Result<(), ProviderError> {
        self.rows.extend(rows);
        Ok(())
    }
}

/// A JSON array of row objects on disk.
#[derive(Debug, Clone)]
pub struct JsonTable {
    path: PathBuf,
}

impl JsonTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSource for JsonTable {
    fn fetch(&self) -> Result<Vec<TableRow>, ProviderError> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn append(&mut self, rows: Vec<TableRow>) -> Result<(), ProviderError> {
        let mut all = if self.path.is_file() {
            self.fetch()?
        } else {
            vec![]
        };
        all.extend(rows);
        fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        Ok(())
    }
}

/// Order rows by asset, header first, then department and numeric version.
fn sort_rows(rows: &mut [TableRow]) -> Result<(), ProviderError> {
    if let Some(bad) = rows
        .iter()
        .find(|r| !r.version.is_empty() && r.version_number().is_none())
    {
        return Err(ProviderError::MalformedRow {
            asset: bad.asset.clone(),
            reason: format!("version '{}' is not a number", bad.version),
        });
    }

    rows.sort_by(|a, b| {
        a.asset
            .cmp(&b.asset)
            .then_with(|| b.is_header().cmp(&a.is_header()))
            .then_with(|| a.dep.cmp(&b.dep))
            .then_with(|| a.version_number().cmp(&b.version_number()))
    });
    Ok(())
}

pub struct TabularProvider<S: TableSource> {
    context: Arc<AssetContext>,
    source: S,
    assets: BTreeMap<String, Asset>,
}

impl<S: TableSource> TabularProvider<S> {
    pub fn new(context: Arc<AssetContext>, source: S) -> Self {
        Self {
            context,
            source,
            assets: BTreeMap::new(),
        }
    }

    pub fn open(context: Arc<AssetContext>, source: S) -> Result<Self, ProviderError> {
        let mut provider = Self::new(context, source);
        provider.reload()?;
        Ok(provider)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn add_version_row(asset: &mut Asset, row: &TableRow) -> Result<(), ProviderError> {
        let number = row
            .version_number()
            .filter(|n| *n > 0)
            .ok_or_else(|| ProviderError::MalformedRow {
                asset: row.asset.clone(),
                reason: format!("row for department '{}' has no positive version", row.dep),
            })?;
        let timestamp = match row.timestamp.as_str() {
            "" => None,
            ts => Some(ts.parse::<i64>().map_err(|_| ProviderError::MalformedRow {
                asset: row.asset.clone(),
                reason: format!("timestamp '{}' is not a number", ts),
            })?),
        };
        let user = if row.user.is_empty() { "unknown" } else { &row.user };
        asset.add_version_scene(&row.dep, user, number, timestamp)?;
        Ok(())
    }
}

impl<S: TableSource> AssetProvider for TabularProvider<S> {
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
        let mut rows = self.source.fetch()?;
        sort_rows(&mut rows)?;

        let mut assets: BTreeMap<String, Asset> = BTreeMap::new();
        for row in &rows {
            if row.asset.is_empty() {
                debug!("Skipping row without asset name");
                continue;
            }
            match assets.get_mut(&row.asset) {
                Some(asset) => Self::add_version_row(asset, row)?,
                None => {
                    let asset = Asset::reconciled(&row.kind, &row.asset, &row.extension, self.context.clone());
                    assets.insert(row.asset.clone(), asset);
                }
            }
        }

        info!("Loaded {} assets from {} rows", assets.len(), rows.len());
        self.assets = assets;
        Ok(())
    }

    /// Appends a header row and one row per existing version.
    fn on_asset_created(&mut self, asset: Asset) -> Result<(), ProviderError> {
        let mut rows = vec![TableRow::header(&asset)];
        for dep in asset.departments() {
            rows.extend(asset.versions(dep).unwrap_or_default().iter().map(TableRow::version));
        }
        self.source.append(rows)?;
        self.assets.insert(asset.name.clone(), asset);
        Ok(())
    }

    fn on_version_added(&mut self, version: &Version) -> Result<(), ProviderError> {
        self.source.append(vec![TableRow::version(version)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ProjectSettings, UserSettings};

    fn context() -> Arc<AssetContext> {
        AssetContext::new(&ProjectSettings::default(), &UserSettings::default()).unwrap()
    }

    fn rows(cells: &[[&str; 8]]) -> Vec<TableRow> {
        cells.iter().map(|c| TableRow::from(*c)).collect()
    }

    #[test]
    fn test_header_and_versions() {
        let table = MemoryTable::new(rows(&[
            ["bob", "char", "ma", "", "", "", "", ""],
            ["bob", "", "", "model", "0001", "jo", "1000", ""],
            ["bob", "", "", "model", "0002", "", "", "fixed uvs"],
        ]));
        let p = TabularProvider::open(context(), table).unwrap();
        let bob = p.get("bob").unwrap();
        assert_eq!(bob.kind, "char");
        assert_eq!(bob.extension, "ma");
        let versions = bob.versions("model").unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[1].user, "unknown");
        assert_eq!(versions[1].timestamp, None);
    }

    #[test]
    fn test_unsorted_rows_are_sorted_before_grouping() {
        let table = MemoryTable::new(rows(&[
            ["lisa", "", "", "rig", "0002", "al", "", ""],
            ["bob", "", "", "model", "0010", "jo", "", ""],
            ["lisa", "char", "mb", "", "", "", "", ""],
            ["bob", "", "", "model", "0009", "jo", "", ""],
            ["lisa", "", "", "rig", "0001", "al", "", ""],
            ["bob", "char", "ma", "", "", "", "", ""],
        ]));
        let p = TabularProvider::open(context(), table).unwrap();

        let names: Vec<_> = p.list_assets().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["bob", "lisa"]);

        let lisa = p.get("lisa").unwrap();
        assert_eq!(lisa.extension, "mb");
        let numbers: Vec<_> = lisa.versions("rig").unwrap().iter().map(|v| v.number).collect();
        assert_eq!(numbers, vec![1, 2]);

        let bob = p.get("bob").unwrap();
        let numbers: Vec<_> = bob.versions("model").unwrap().iter().map(|v| v.number).collect();
        assert_eq!(numbers, vec![9, 10]);
    }

    #[test]
    fn test_malformed_version_is_an_error() {
        let table = MemoryTable::new(rows(&[
            ["bob", "char", "ma", "", "", "", "", ""],
            ["bob", "", "", "model", "v1", "jo", "", ""],
        ]));
        let err = TabularProvider::open(context(), table).err().unwrap();
        assert!(matches!(err, ProviderError::MalformedRow { ref asset, .. } if asset == "bob"));
    }

    #[test]
    fn test_version_zero_is_an_error() {
        let table = MemoryTable::new(rows(&[
            ["bob", "char", "ma", "", "", "", "", ""],
            ["bob", "", "", "model", "0000", "jo", "", ""],
        ]));
        let err = TabularProvider::open(context(), table).err().unwrap();
        assert!(matches!(err, ProviderError::MalformedRow { ref reason, .. } if reason.contains("positive")));
    }

    #[test]
    fn test_malformed_timestamp_is_an_error() {
        let table = MemoryTable::new(rows(&[
            ["bob", "char", "ma", "", "", "", "", ""],
            ["bob", "", "", "model", "1", "jo", "yesterday", ""],
        ]));
        assert!(TabularProvider::open(context(), table).is_err());
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let table = MemoryTable::new(rows(&[
            ["", "", "", "", "", "", "", ""],
            ["cup", "prop", "ma", "", "", "", "", ""],
        ]));
        let p = TabularProvider::open(context(), table).unwrap();
        assert_eq!(p.list_assets().len(), 1);
    }

    #[test]
    fn test_created_asset_round_trips_through_table() {
        let ctx = context();
        let mut p = TabularProvider::open(ctx.clone(), MemoryTable::default()).unwrap();

        let mut asset = Asset::new("prop", "cup", "ma", ctx);
        asset.new_version("model", "jo").unwrap();
        asset.new_version("model", "jo").unwrap();
        p.on_asset_created(asset).unwrap();
        assert_eq!(p.source().rows.len(), 3);

        p.reload().unwrap();
        let cup = p.get("cup").unwrap();
        assert_eq!(cup.kind, "prop");
        assert_eq!(cup.latest("model").unwrap().number, 2);
    }

    #[test]
    fn test_added_version_is_appended() {
        let ctx = context();
        let table = MemoryTable::new(rows(&[["bob", "char", "ma", "", "", "", "", ""]]));
        let mut p = TabularProvider::open(ctx, table).unwrap();

        let version = p.get_mut("bob").unwrap().new_version("rig", "jo").unwrap().clone();
        p.on_version_added(&version).unwrap();
        assert_eq!(p.source().rows[1].version, "0001");

        p.reload().unwrap();
        assert_eq!(p.get("bob").unwrap().latest("rig").unwrap().user, "jo");
    }

    #[test]
    fn test_json_table_append_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = JsonTable::new(dir.path().join("assets.json"));
        table
            .append(rows(&[["bob", "char", "ma", "", "", "", "", ""]]))
            .unwrap();
        table
            .append(rows(&[["bob", "", "", "model", "0001", "jo", "", ""]]))
            .unwrap();

        let p = TabularProvider::open(context(), table).unwrap();
        assert_eq!(p.get("bob").unwrap().versions("model").unwrap().len(), 1);
    }
}
