use std::io::Write;

use clap::{Args, Subcommand};
use storefront::{
    orders::{Order, OrderId, OrderLookup, OrderStatus, receipt::write_receipt},
    pricing::format_money,
};
use storefront_app::{
    context::AppContext,
    orders::{OrderHistoryView, change_status, find_order, order_history},
};

use super::CommandError;

#[derive(Debug, Args)]
pub(crate) struct OrdersCommand {
    #[command(subcommand)]
    command: OrdersSubcommand,
}

#[derive(Debug, Subcommand)]
enum OrdersSubcommand {
    /// List orders, newest first
    List(LookupArgs),

    /// Show an order's delivery progress
    Track(OrderArgs),

    /// Print an order receipt
    Receipt(OrderArgs),

    /// Move an order to a new status
    SetStatus(SetStatusArgs),
}

/// Whose orders to look at.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct LookupArgs {
    /// Signed-in customer id
    #[arg(long)]
    user_id: Option<String>,

    /// Guest checkout email
    #[arg(long)]
    email: Option<String>,
}

impl LookupArgs {
    fn lookup(&self) -> Result<OrderLookup, CommandError> {
        match (&self.user_id, &self.email) {
            (Some(user_id), _) => Ok(OrderLookup::User(user_id.as_str().into())),
            (None, email) => Ok(OrderLookup::guest(email.as_deref().unwrap_or_default())?),
        }
    }
}

#[derive(Debug, Args)]
struct OrderArgs {
    #[command(flatten)]
    lookup: LookupArgs,

    /// Order id
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
struct SetStatusArgs {
    #[command(flatten)]
    order: OrderArgs,

    /// New status (pending, processing, shipped, out_for_delivery, delivered, cancelled)
    #[arg(long)]
    status: String,
}

pub(crate) async fn run<W: Write>(
    command: OrdersCommand,
    context: &AppContext,
    out: &mut W,
) -> Result<(), CommandError> {
    let service = context.orders.as_ref();

    match command.command {
        OrdersSubcommand::List(args) => match order_history(service, &args.lookup()?).await? {
            OrderHistoryView::Empty => writeln!(out, "No orders yet.")?,
            OrderHistoryView::Orders(orders) => {
                for order in &orders {
                    write_summary(order, out)?;
                }
            }
        },
        OrdersSubcommand::Track(args) => {
            let order = fetch(context, &args).await?;

            writeln!(out, "Order #{} ({})", order.id, order.status.label())?;
            writeln!(out, "{}", order.tracker())?;
        }
        OrdersSubcommand::Receipt(args) => {
            let order = fetch(context, &args).await?;

            write_receipt(&order, out)?;
        }
        OrdersSubcommand::SetStatus(args) => {
            let next = OrderStatus::from(args.status.clone());

            if next == OrderStatus::Unknown {
                return Err(CommandError::UnknownStatus(args.status));
            }

            let order = fetch(context, &args.order).await?;

            change_status(service, &order, next).await?;

            writeln!(out, "Order #{} is now {}", order.id, next.label())?;
        }
    }

    Ok(())
}

async fn fetch(context: &AppContext, args: &OrderArgs) -> Result<Order, CommandError> {
    let id = OrderId::from(args.id.as_str());

    find_order(context.orders.as_ref(), &args.lookup.lookup()?, &id)
        .await?
        .ok_or(CommandError::OrderNotFound(id))
}

fn write_summary<W: Write>(order: &Order, out: &mut W) -> Result<(), CommandError> {
    let placed = order
        .created_at
        .map_or_else(|| "unknown date".to_string(), |at| at.strftime("%Y-%m-%d").to_string());

    writeln!(
        out,
        "#{:<10} {placed:<12} {:<18} {:>10} {} item(s)",
        order.id,
        order.status.label(),
        format_money(order.total_amount),
        order.unit_count(),
    )?;

    Ok(())
}
