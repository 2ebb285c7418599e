//! Payer approval at the terminal

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use storefront_app::payments::{PayerApproval, PaymentError, PendingPayment};
use tokio::task;
use tracing::debug;

/// Shows the approval link on stderr and waits for the shopper to confirm.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleApproval;

#[async_trait]
impl PayerApproval for ConsoleApproval {
    async fn approve(&self, payment: &PendingPayment) -> Result<(), PaymentError> {
        let prompt = prompt(payment);

        let answer = match task::spawn_blocking(move || ask(&prompt)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(source)) => return Err(prompt_failed(&source)),
            Err(source) => return Err(prompt_failed(&source)),
        };

        if is_approved(&answer) {
            debug!(gateway_order = %payment.id, "payer approved");

            Ok(())
        } else {
            Err(PaymentError::NotApproved("cancelled by payer".to_string()))
        }
    }
}

fn prompt_failed(source: &dyn std::error::Error) -> PaymentError {
    PaymentError::NotApproved(format!("approval prompt failed: {source}"))
}

fn prompt(payment: &PendingPayment) -> String {
    match &payment.approve_url {
        Some(url) => format!(
            "Approve payment {} at {url}\nPress Enter once approved, or type \"cancel\": ",
            payment.id
        ),
        None => format!(
            "Approve payment {} with your provider\nPress Enter once approved, or type \"cancel\": ",
            payment.id
        ),
    }
}

fn ask(prompt: &str) -> io::Result<String> {
    let mut stderr = io::stderr().lock();

    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    let mut answer = String::new();

    if io::stdin().lock().read_line(&mut answer)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no answer"));
    }

    Ok(answer)
}

fn is_approved(answer: &str) -> bool {
    let answer = answer.trim();

    answer.is_empty() || answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
