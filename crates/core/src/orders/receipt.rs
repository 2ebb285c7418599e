//! Receipt

use std::io;

use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Style,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    orders::{Order, OrderItem},
    pricing::format_money,
};

/// Errors that can occur when writing a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// The output could not be written.
    #[error("failed to write receipt")]
    IO(#[from] io::Error),
}

/// Write an order as a table of lines followed by its summary.
///
/// The total printed is the order's stored amount, not a recomputation from
/// the lines.
///
/// # Errors
///
/// Returns [`ReceiptError::IO`] if the output cannot be written.
pub fn write_receipt(order: &Order, mut out: impl io::Write) -> Result<(), ReceiptError> {
    let mut builder = Builder::default();

    builder.push_record(["Item", "Brand", "Qty", "Unit Price", "Line Total"]);

    for item in &order.items {
        builder.push_record(item_row(item));
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(2..5), Alignment::right());

    writeln!(out, "Order #{} ({})", order.id, order.status)?;

    if let Some(created_at) = order.created_at {
        writeln!(out, "Placed {}", created_at.strftime("%Y-%m-%d %H:%M UTC"))?;
    }

    writeln!(out, "\n{table}")?;
    writeln!(out, " Total: {}", format_money(order.total_amount))?;
    writeln!(out, " Payment: {}", order.payment_method)?;

    if let Some(details) = &order.payment_details {
        if let Some(transaction) = details.transaction_id() {
            writeln!(out, " Transaction: {transaction}")?;
        }

        if let Some(payer) = details.payer_email() {
            writeln!(out, " Paid by: {payer}")?;
        }
    }

    let shipping = &order.shipping;

    writeln!(
        out,
        " Ship to: {}, {}, {} {}",
        shipping.name, shipping.address, shipping.city, shipping.postal_code
    )?;

    Ok(())
}

fn item_row(item: &OrderItem) -> [String; 5] {
    [
        item.name.clone(),
        item.brand.clone().unwrap_or_default(),
        item.quantity.to_string(),
        format_money(item.price),
        format_money(item.line_total()),
    ]
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use crate::{
        checkout::{PaymentMethod, ShippingDetails},
        orders::{OrderId, OrderStatus},
    };

    use super::*;

    #[test]
    fn receipt_lists_lines_and_stored_total() -> TestResult {
        let order = Order {
            id: OrderId::from("1001"),
            user_id: None,
            items: vec![OrderItem {
                product_id: None,
                name: "Desk Lamp".to_string(),
                quantity: 2,
                price: Decimal::new(5000, 2),
                brand: Some("Lumen".to_string()),
                image: None,
            }],
            total_amount: Decimal::new(10000, 2),
            shipping: ShippingDetails {
                name: "Ada".to_string(),
                city: "London".to_string(),
                ..ShippingDetails::default()
            },
            payment_method: PaymentMethod::CashOnDelivery,
            payment_details: None,
            status: OrderStatus::Shipped,
            created_at: Some(Timestamp::UNIX_EPOCH),
        };

        let mut out = Vec::new();

        write_receipt(&order, &mut out)?;

        let text = String::from_utf8(out)?;

        assert!(text.contains("Order #1001 (Shipped)"), "{text}");
        assert!(text.contains("Desk Lamp"), "{text}");
        assert!(text.contains("Lumen"), "{text}");
        assert!(text.contains("Total: $100.00"), "{text}");
        assert!(text.contains("Placed 1970-01-01 00:00 UTC"), "{text}");

        Ok(())
    }
}
