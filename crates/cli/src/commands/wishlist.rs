use std::io::Write;

use clap::{Args, Subcommand};
use storefront::{pricing::format_money, products::CatalogProduct};
use storefront_app::context::AppContext;

use super::{CommandError, ProductArgs, write_notification};

#[derive(Debug, Args)]
pub(crate) struct WishlistCommand {
    #[command(subcommand)]
    command: WishlistSubcommand,
}

#[derive(Debug, Subcommand)]
enum WishlistSubcommand {
    /// Save a product, or forget it if already saved
    Toggle(ProductArgs),

    /// List saved products
    Show,
}

pub(crate) fn run<W: Write>(
    command: WishlistCommand,
    context: &AppContext,
    out: &mut W,
) -> Result<(), CommandError> {
    match command.command {
        WishlistSubcommand::Toggle(args) => {
            context.cart.toggle_wishlist(CatalogProduct::from(args))?;

            write_notification(context, out)?;
        }
        WishlistSubcommand::Show => {
            let wishlist = context.cart.wishlist();

            if wishlist.is_empty() {
                writeln!(out, "Your wishlist is empty.")?;
            }

            for item in wishlist.items() {
                writeln!(
                    out,
                    "{:<12} {:<32} {:>10}",
                    item.id(),
                    item.product().name(),
                    format_money(item.product().price()),
                )?;
            }
        }
    }

    Ok(())
}
