//! In-memory provider with a fixed seed project.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{AssetProvider, ProviderError};
use crate::asset::{Asset, AssetContext};

const SEED: &[(&str, &str)] = &[
    ("char", "bob"),
    ("char", "lisa"),
    ("prop", "chair"),
    ("prop", "table"),
    ("prop", "fork"),
    ("set", "kitchen"),
    ("set", "park"),
    ("seq", "s0100"),
    ("seq", "s0200"),
    ("seq", "s0250"),
];

pub struct FixtureProvider {
    context: Arc<AssetContext>,
    assets: BTreeMap<String, Asset>,
}

impl FixtureProvider {
    /// The seeded demo project.
    pub fn new(context: Arc<AssetContext>) -> Result<Self, ProviderError> {
        let mut provider = Self::empty(context);
        for (kind, name) in SEED {
            let mut asset = Asset::new(kind, name, "ma", provider.context.clone());
            let start_dep = asset.departments()[0].to_string();
            asset.new_version(&start_dep, "unknown")?;
            if name.contains('e') {
                asset.new_version(&start_dep, "unknown")?;
            } else if !matches!(*kind, "set" | "seq") {
                asset.new_version("shade", "unknown")?;
            }
            if *kind == "char" {
                asset.new_version("rig", "unknown")?;
            }
            provider.assets.insert(name.to_string(), asset);
        }
        Ok(provider)
    }

    pub fn empty(context: Arc<AssetContext>) -> Self {
        Self {
            context,
            assets: BTreeMap::new(),
        }
    }
}

impl AssetProvider for FixtureProvider {
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
        debug!("Fixture provider holds {} assets, nothing to reload", self.assets.len());
        Ok(())
    }

    fn on_asset_created(&mut self, asset: Asset) -> Result<(), ProviderError> {
        self.assets.insert(asset.name.clone(), asset);
        Ok(())
    }
}
