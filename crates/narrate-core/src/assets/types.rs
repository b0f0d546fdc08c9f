// Asset descriptor types shared by the store and its callers

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Role of a file in the asset set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// Shared model configuration
    Config,
    /// Shared model weights
    Weights,
    /// Weights for one voice
    Voice,
}

/// One required file: where it lives remotely and where it is cached locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Role in the asset set
    pub kind: AssetKind,
    /// Name inside the remote repository
    pub remote_name: String,
    /// Location under the local asset root
    pub local_path: PathBuf,
}

impl AssetDescriptor {
    /// Sibling path the source writes into before the file is moved into place
    #[must_use]
    pub fn staging_path(&self) -> PathBuf {
        let mut name = self
            .local_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".partial");
        self.local_path.with_file_name(name)
    }
}

/// Local paths of every file a synthesis for one voice needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAssets {
    /// Shared model configuration
    pub config_path: PathBuf,
    /// Shared model weights
    pub weights_path: PathBuf,
    /// Weights for the requested voice
    pub voice_path: PathBuf,
}
