//! CLI configuration module

use clap::Parser;
use storefront_app::context::AppSettings;

use crate::{
    commands::Command,
    config::{
        api::ApiConfig, geolocation::GeolocationConfig, logging::LoggingConfig,
        payments::PaymentConfig, storage::StorageConfig,
    },
};

pub(crate) mod api;
pub(crate) mod geolocation;
pub(crate) mod logging;
pub(crate) mod payments;
pub(crate) mod storage;

pub(crate) use logging::LogFormat;

/// Storefront command line client
#[derive(Debug, Parser)]
#[command(name = "storefront", about = "Storefront CLI", long_about = None)]
pub struct CliConfig {
    /// Order API settings.
    #[command(flatten)]
    pub api: ApiConfig,

    /// Payment gateway settings.
    #[command(flatten)]
    pub payments: PaymentConfig,

    /// Session state storage settings.
    #[command(flatten)]
    pub storage: StorageConfig,

    /// Address autofill settings.
    #[command(flatten)]
    pub geolocation: GeolocationConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// What to do.
    #[command(subcommand)]
    pub(crate) command: Command,
}

impl CliConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Settings for the application context.
    pub fn app_settings(&self) -> AppSettings {
        AppSettings {
            orders: (&self.api).into(),
            paypal: self.payments.paypal(),
            state_path: Some(self.storage.state_path.clone()),
            geocoder_url: self.geolocation.geocoder_url.clone(),
        }
    }
}
