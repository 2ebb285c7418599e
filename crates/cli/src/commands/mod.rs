//! Subcommands.

use std::io::{self, Write};

use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use storefront::{
    checkout::FieldError,
    orders::{OrderId, receipt::ReceiptError},
    products::CatalogProduct,
};
use storefront_app::{
    cart_store::CartStoreError, checkout::CheckoutError, context::AppContext,
    orders::OrderServiceError,
};
use thiserror::Error;

mod cart;
mod checkout;
mod orders;
mod searches;
mod wishlist;

/// Errors surfaced to the shell.
#[derive(Debug, Error)]
pub(crate) enum CommandError {
    /// Output could not be written.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),

    /// A cart or wishlist change was refused.
    #[error(transparent)]
    Cart(#[from] CartStoreError),

    /// Checkout did not complete.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// The order service failed.
    #[error(transparent)]
    Orders(#[from] OrderServiceError),

    /// A receipt could not be rendered.
    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    /// The order lookup was not usable.
    #[error(transparent)]
    Lookup(#[from] FieldError),

    /// No order with this id is visible to the lookup.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The requested status is not one orders can be moved to.
    #[error("unrecognised order status {0:?}")]
    UnknownStatus(String),
}

/// What to do.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Manage the cart
    Cart(cart::CartCommand),

    /// Manage the wishlist
    Wishlist(wishlist::WishlistCommand),

    /// Manage recent searches
    Searches(searches::SearchesCommand),

    /// Check out the current cart
    Checkout(checkout::CheckoutArgs),

    /// Look up past orders
    Orders(orders::OrdersCommand),
}

impl Command {
    pub(crate) async fn run<W: Write>(
        self,
        context: &AppContext,
        out: &mut W,
    ) -> Result<(), CommandError> {
        match self {
            Self::Cart(command) => cart::run(command, context, out),
            Self::Wishlist(command) => wishlist::run(command, context, out),
            Self::Searches(command) => searches::run(command, context, out),
            Self::Checkout(args) => checkout::run(args, context, out).await,
            Self::Orders(command) => orders::run(command, context, out).await,
        }
    }
}

/// A product as described on the command line.
#[derive(Debug, Args)]
pub(crate) struct ProductArgs {
    /// Product id
    #[arg(long)]
    id: String,

    /// Display name
    #[arg(long)]
    name: Option<String>,

    /// Unit price
    #[arg(long)]
    price: Option<Decimal>,

    /// Brand
    #[arg(long)]
    brand: Option<String>,

    /// Image URL
    #[arg(long)]
    image: Option<String>,
}

impl From<ProductArgs> for CatalogProduct {
    fn from(args: ProductArgs) -> Self {
        Self {
            id: Some(args.id.into()),
            name: args.name,
            brand: args.brand,
            image: args.image,
            price: args.price,
        }
    }
}

/// Print the notification the last action raised, if it is still showing.
fn write_notification<W: Write>(context: &AppContext, out: &mut W) -> io::Result<()> {
    match context.cart.notifications().current() {
        Some(notification) => writeln!(out, "[{}] {}", notification.severity, notification.message),
        None => Ok(()),
    }
}
