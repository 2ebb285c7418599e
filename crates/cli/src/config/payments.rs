//! Payment Config

use clap::Args;
use storefront_app::payments::PayPalConfig;
use zeroize::Zeroizing;

/// `PayPal` gateway settings. Online payment is disabled unless both
/// credentials are present.
#[derive(Debug, Args)]
pub struct PaymentConfig {
    /// `PayPal` REST API root
    #[arg(
        id = "paypal-base-url",
        long = "paypal-base-url",
        env = "PAYPAL_BASE_URL",
        default_value = "https://api-m.sandbox.paypal.com"
    )]
    pub base_url: String,

    /// `PayPal` OAuth client id
    #[arg(long = "paypal-client-id", env = "PAYPAL_CLIENT_ID")]
    pub client_id: Option<String>,

    /// `PayPal` OAuth client secret
    #[arg(
        long = "paypal-client-secret",
        env = "PAYPAL_CLIENT_SECRET",
        hide_env_values = true
    )]
    pub client_secret: Option<String>,

    /// Currency payments are charged in
    #[arg(long, default_value = "USD")]
    pub currency: String,
}

impl PaymentConfig {
    /// Gateway credentials, if configured.
    pub fn paypal(&self) -> Option<PayPalConfig> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
            return None;
        };

        Some(PayPalConfig {
            base_url: self.base_url.clone(),
            client_id: client_id.clone(),
            client_secret: Zeroizing::new(client_secret.clone()),
            currency: self.currency.clone(),
        })
    }
}
