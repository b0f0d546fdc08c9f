//! On-demand acquisition of model and voice files
//! Missing files are fetched from a remote source once and reused afterwards

/// Remote sources assets are fetched from
pub mod source;
/// Asset store resolving local paths for a voice
pub mod store;
/// Asset descriptor types
pub mod types;

pub use source::{source_from_config, AssetSource, HfHubSource, HttpSource};
pub use store::AssetStore;
pub use types::{AssetDescriptor, AssetKind, ResolvedAssets};

#[cfg(test)]
pub use source::MockAssetSource;
