//! Geolocation Config

use clap::Args;

/// Address autofill settings.
#[derive(Debug, Args)]
pub struct GeolocationConfig {
    /// Reverse geocoder root; autofill is off when unset
    #[arg(long = "geocoder-url", env = "STOREFRONT_GEOCODER_URL")]
    pub geocoder_url: Option<String>,
}
