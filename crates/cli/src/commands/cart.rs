use std::io::Write;

use clap::{Args, Subcommand};
use storefront::{pricing::format_money, products::CatalogProduct};
use storefront_app::context::AppContext;

use super::{CommandError, ProductArgs, write_notification};

#[derive(Debug, Args)]
pub(crate) struct CartCommand {
    #[command(subcommand)]
    command: CartSubcommand,
}

#[derive(Debug, Subcommand)]
enum CartSubcommand {
    /// Add a product, or more of one already in the cart
    Add(AddArgs),

    /// Remove a product line
    Remove(LineArgs),

    /// Set a line's quantity
    Update(UpdateArgs),

    /// Empty the cart
    Clear,

    /// List the cart with its totals
    Show,
}

#[derive(Debug, Args)]
struct AddArgs {
    #[command(flatten)]
    product: ProductArgs,

    /// Units to add
    #[arg(long, default_value_t = 1)]
    quantity: u32,
}

#[derive(Debug, Args)]
struct LineArgs {
    /// Product id
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    /// Product id
    #[arg(long)]
    id: String,

    /// New quantity; values below one are refused
    #[arg(long, allow_negative_numbers = true)]
    quantity: i64,
}

pub(crate) fn run<W: Write>(
    command: CartCommand,
    context: &AppContext,
    out: &mut W,
) -> Result<(), CommandError> {
    match command.command {
        CartSubcommand::Add(args) => {
            context
                .cart
                .add_to_cart(CatalogProduct::from(args.product), args.quantity)?;

            write_notification(context, out)?;
            writeln!(out, "cart: {} item(s)", context.cart.cart_count())?;
        }
        CartSubcommand::Remove(args) => {
            if !context.cart.remove_from_cart(&args.id.as_str().into()) {
                writeln!(out, "{} is not in the cart", args.id)?;
            }

            write_notification(context, out)?;
        }
        CartSubcommand::Update(args) => {
            context
                .cart
                .update_quantity(&args.id.as_str().into(), args.quantity)?;

            writeln!(out, "cart: {} item(s)", context.cart.cart_count())?;
        }
        CartSubcommand::Clear => {
            context.cart.clear_cart();

            writeln!(out, "cart cleared")?;
        }
        CartSubcommand::Show => show(context, out)?,
    }

    Ok(())
}

fn show<W: Write>(context: &AppContext, out: &mut W) -> Result<(), CommandError> {
    let cart = context.cart.cart();

    if cart.is_empty() {
        writeln!(out, "Your cart is empty.")?;

        return Ok(());
    }

    for item in cart.items() {
        writeln!(
            out,
            "{:<12} {:<32} {:>4} x {:>10} = {:>10}",
            item.id(),
            item.product.name(),
            item.quantity,
            format_money(item.product.price()),
            format_money(item.line_total()),
        )?;
    }

    let totals = context.cart.totals(context.rates.as_ref());

    writeln!(out)?;
    writeln!(out, "Subtotal: {}", format_money(totals.subtotal))?;
    writeln!(out, "Shipping: {}", format_money(totals.shipping))?;
    writeln!(out, "Tax:      {}", format_money(totals.tax))?;
    writeln!(out, "Total:    {}", format_money(totals.total))?;

    Ok(())
}
