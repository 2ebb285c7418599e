//! Storage Config

use std::path::PathBuf;

use clap::Args;

/// Session state storage settings.
#[derive(Debug, Args)]
pub struct StorageConfig {
    /// File holding the cart, wishlist and recent searches
    #[arg(
        long = "state-path",
        env = "STOREFRONT_STATE_PATH",
        default_value = ".storefront/state.redb"
    )]
    pub state_path: PathBuf,
}
