use std::io::{self, Write};

use clap::{Args, ValueEnum};
use storefront::{
    checkout::{CheckoutDraft, PaymentMethod, TransitionError},
    customers::CustomerProfile,
    pricing::format_money,
};
use storefront_app::{
    checkout::CheckoutError,
    context::AppContext,
    geolocation::Coordinates,
};
use tracing::debug;

use super::{CommandError, write_notification};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PaymentChoice {
    /// Pay the courier on delivery
    Cod,

    /// Pay now through `PayPal`
    Online,
}

impl From<PaymentChoice> for PaymentMethod {
    fn from(choice: PaymentChoice) -> Self {
        match choice {
            PaymentChoice::Cod => Self::CashOnDelivery,
            PaymentChoice::Online => Self::Online,
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct CheckoutArgs {
    /// Signed-in customer id; orders are attached to this account
    #[arg(long)]
    user_id: Option<String>,

    /// Contact email
    #[arg(long)]
    email: Option<String>,

    /// Recipient name
    #[arg(long)]
    name: Option<String>,

    /// Street address
    #[arg(long)]
    address: Option<String>,

    /// City
    #[arg(long)]
    city: Option<String>,

    /// Postal code
    #[arg(long)]
    postal_code: Option<String>,

    /// Phone number
    #[arg(long)]
    phone: Option<String>,

    /// Payment method
    #[arg(long, value_enum, default_value_t = PaymentChoice::Cod)]
    payment: PaymentChoice,

    /// Latitude used to fill blank address fields
    #[arg(long, requires = "longitude", allow_negative_numbers = true)]
    latitude: Option<f64>,

    /// Longitude used to fill blank address fields
    #[arg(long, requires = "latitude", allow_negative_numbers = true)]
    longitude: Option<f64>,
}

impl CheckoutArgs {
    fn profile(&self) -> Option<CustomerProfile> {
        let id = self.user_id.as_deref()?;

        Some(CustomerProfile {
            id: Some(id.into()),
            email: self.email.clone().unwrap_or_default(),
            ..CustomerProfile::default()
        })
    }

    fn position(&self) -> Option<Coordinates> {
        Some(Coordinates {
            latitude: self.latitude?,
            longitude: self.longitude?,
        })
    }

    fn fill(self, draft: &mut CheckoutDraft) {
        let fields = [
            (&mut draft.email, self.email),
            (&mut draft.name, self.name),
            (&mut draft.address, self.address),
            (&mut draft.city, self.city),
            (&mut draft.postal_code, self.postal_code),
            (&mut draft.phone, self.phone),
        ];

        for (field, value) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }

        draft.payment_method = self.payment.into();
    }
}

pub(crate) async fn run<W: Write>(
    args: CheckoutArgs,
    context: &AppContext,
    out: &mut W,
) -> Result<(), CommandError> {
    let profile = args.profile();
    let position = args.position();
    let session = context.checkout(profile.as_ref());

    session.edit_draft(|draft| args.fill(draft));

    if let Some(locator) = &context.locator {
        let filled = session.autofill_address(locator.as_ref(), position).await;

        debug!(filled, "address autofill");
    }

    if let Err(error) = session.submit_details() {
        write_field_errors(&error, out)?;

        return Err(error.into());
    }

    let totals = session.totals();

    writeln!(out, "Total: {}", format_money(totals.total))?;

    match session.submit().await {
        Ok(order_id) => {
            write_notification(context, out)?;
            writeln!(out, "order_id: {order_id}")?;

            Ok(())
        }
        Err(error) => {
            write_notification(context, out)?;

            Err(error.into())
        }
    }
}

fn write_field_errors<W: Write>(error: &CheckoutError, out: &mut W) -> io::Result<()> {
    let CheckoutError::Transition(TransitionError::InvalidDetails(errors)) = error else {
        return Ok(());
    };

    for problem in errors.errors() {
        writeln!(out, "  {problem}")?;
    }

    Ok(())
}
