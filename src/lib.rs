//! CG3 Pipeline Core - Asset Addressing and Publishing
//!
//! # Ground Rules
//! 1. Templates Are the Address Book: one string both renders and parses a path
//! 2. Providers Are Truth: the asset model is rebuilt, never patched
//! 3. Versions Are Immutable: new work is a new number
//! 4. Checks Report, Errors Abort: failed content is data, broken runs are errors
//! 5. Configuration Is Injected

pub mod asset;
pub mod creator;
pub mod events;
pub mod logging;
pub mod names;
pub mod providers;
pub mod publish;
pub mod settings;
pub mod templates;

pub use asset::{Asset, AssetContext, AssetError, Version, VersionSelector};
pub use creator::{AssetCreator, CreatorError};
pub use events::{Event, EventBus, EventError, EventKind};
pub use names::{legalize_name, split_names};
pub use providers::{AssetProvider, FilesystemProvider, FixtureProvider, ProviderError, TabularProvider};
pub use publish::{
    Action, Parameters, PipelineState, Playlist, PublishError, PublishReport, Publisher, Stage,
    StageRegistry, StageReport,
};
pub use settings::{ProjectSettings, SettingsError, UserSettings};
pub use templates::{Fields, LocationTemplate, PathPattern, PathTemplate, TemplateError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
