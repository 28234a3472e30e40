//! Asset Providers - Sources of Truth for the Asset Model
//!
//! Every provider rebuilds the same `Asset`/`Version` shape, whatever its
//! backing store looks like.

pub mod filesystem;
pub mod fixture;
pub mod tabular;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

use crate::asset::{Asset, AssetContext, AssetError, Version};
use crate::events::{Event, EventBus, EventKind};
use crate::templates::TemplateError;

pub use filesystem::{FilesystemProvider, ScanSummary};
pub use fixture::FixtureProvider;
pub use tabular::{JsonTable, MemoryTable, TableRow, TableSource, TabularProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Version template '{template}' has no '{field}' placeholder")]
    IncompleteTemplate { template: String, field: &'static str },

    #[error("Malformed row for asset '{asset}': {reason}")]
    MalformedRow { asset: String, reason: String },
}

/// A source of truth for the assets of one project.
pub trait AssetProvider {
    fn context(&self) -> &Arc<AssetContext>;

    fn get(&self, name: &str) -> Option<&Asset>;

    fn get_mut(&mut self, name: &str) -> Option<&mut Asset>;

    /// All assets, ordered by name.
    fn list_assets(&self) -> Vec<&Asset>;

    /// Rebuild the whole asset list from the backing store.
    fn reload(&mut self) -> Result<(), ProviderError>;

    /// Register an asset created by a user action.
    fn on_asset_created(&mut self, asset: Asset) -> Result<(), ProviderError>;

    /// Record a version appended to a provider-owned asset.
    ///
    /// Providers that rediscover versions on reload need not do anything.
    fn on_version_added(&mut self, _version: &Version) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Forward `asset_created` events on `bus` to `provider`.
pub fn attach<P>(bus: &EventBus, provider: Rc<RefCell<P>>)
where
    P: AssetProvider + ?Sized + 'static,
{
    bus.subscribe(EventKind::AssetCreated, move |event| {
        if let Event::AssetCreated(asset) = event {
            provider.borrow_mut().on_asset_created(asset.clone())?;
        }
        Ok(())
    });
}
