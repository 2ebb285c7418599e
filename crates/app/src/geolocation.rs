//! Address Autofill
//!
//! Best-effort reverse geocoding used to pre-fill the shipping form. Failures
//! leave the form untouched.

use async_trait::async_trait;
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;
use storefront::checkout::{CheckoutDraft, LocatedAddress};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while locating an address.
#[derive(Debug, Error)]
pub enum GeolocationError {
    /// The shopper declined to share a position.
    #[error("location permission denied")]
    PermissionDenied,

    /// The geocoder could not be reached.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The geocoder had no address for the position.
    #[error("no address found for position")]
    NoMatch,
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
}

/// Resolves a position to a postal address.
#[automock]
#[async_trait]
pub trait AddressLocator: Send + Sync {
    /// Look up the address at `position`.
    async fn locate(&self, position: Coordinates) -> Result<LocatedAddress, GeolocationError>;
}

/// [`AddressLocator`] over a Nominatim-compatible `/reverse` endpoint.
#[derive(Debug, Clone)]
pub struct ReverseGeocoder {
    base_url: String,
    http: Client,
}

impl ReverseGeocoder {
    /// Create a geocoder client rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::new(),
        }
    }
}

#[async_trait]
impl AddressLocator for ReverseGeocoder {
    async fn locate(&self, position: Coordinates) -> Result<LocatedAddress, GeolocationError> {
        let url = format!("{}/reverse", self.base_url.trim_end_matches('/'));

        let response: ReverseResponse = self
            .http
            .get(url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", position.latitude.to_string()),
                ("lon", position.longitude.to_string()),
            ])
            .header(reqwest::header::USER_AGENT, "storefront")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_located().ok_or(GeolocationError::NoMatch)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<ReverseAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct ReverseAddress {
    house_number: Option<String>,
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    postcode: Option<String>,
}

impl ReverseResponse {
    fn into_located(self) -> Option<LocatedAddress> {
        let address = self.address?;

        let street = match (address.house_number, address.road) {
            (Some(number), Some(road)) => Some(format!("{number} {road}")),
            (None, Some(road)) => Some(road),
            _ => None,
        };

        let located = LocatedAddress {
            address: street,
            city: address.city.or(address.town).or(address.village),
            postal_code: address.postcode,
        };

        if located.address.is_none() && located.city.is_none() && located.postal_code.is_none() {
            return None;
        }

        Some(located)
    }
}

/// Look up the shopper's address, if they shared a position.
///
/// Denials and lookup failures are logged and yield `None`.
pub async fn locate_address(
    locator: &dyn AddressLocator,
    position: Option<Coordinates>,
) -> Option<LocatedAddress> {
    let result = match position {
        Some(position) => locator.locate(position).await,
        None => Err(GeolocationError::PermissionDenied),
    };

    match result {
        Ok(located) => {
            debug!(?located, "address located");

            Some(located)
        }
        Err(reason) => {
            info!(%reason, "address autofill skipped");

            None
        }
    }
}

/// Fill blank address fields of `draft` from the shopper's position.
///
/// Returns whether an address was found; the draft is only touched then.
pub async fn autofill_address(
    locator: &dyn AddressLocator,
    position: Option<Coordinates>,
    draft: &mut CheckoutDraft,
) -> bool {
    let Some(located) = locate_address(locator, position).await else {
        return false;
    };

    draft.apply_located_address(located);

    true
}
