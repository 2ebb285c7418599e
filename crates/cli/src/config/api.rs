//! Order API Config

use clap::Args;
use storefront_app::orders::OrderApiConfig;

/// Storefront REST API settings.
#[derive(Debug, Args)]
pub struct ApiConfig {
    /// Storefront API root, e.g. `https://shop.example.com/api`
    #[arg(id = "api-base-url", long = "api-base-url", env = "STOREFRONT_API_URL")]
    pub base_url: String,
}

impl From<&ApiConfig> for OrderApiConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
        }
    }
}
