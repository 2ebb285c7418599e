//! Checkout Flow
//!
//! ```text
//! Empty ──(cart gains items)──▶ Details ──(valid details)──▶ Payment ──(order persisted)──▶ Confirmed
//!   ▲                             │  ▲                          │
//!   └────────(cart emptied)───────┘  └──────────(back)──────────┘
//! ```

use thiserror::Error;

use crate::{
    checkout::draft::{CheckoutDraft, ShippingDetails, ValidationErrors},
    orders::OrderId,
};

/// Errors raised by checkout step transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Checkout cannot proceed while the cart is empty.
    #[error("the cart is empty")]
    EmptyCart,

    /// The details form did not validate.
    #[error(transparent)]
    InvalidDetails(#[from] ValidationErrors),

    /// The action is not available from the current step.
    #[error("cannot {action} from the {step} step")]
    NotAllowed {
        /// Step the flow was in
        step: &'static str,
        /// Attempted action
        action: &'static str,
    },
}

/// Where the shopper is in checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutStep {
    /// Nothing to check out.
    Empty,

    /// Step 1: contact and shipping details.
    Details,

    /// Step 2: payment, holding the details accepted in step 1.
    Payment(ShippingDetails),

    /// Step 3: the order was persisted.
    Confirmed(OrderId),
}

impl CheckoutStep {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Details => "details",
            Self::Payment(_) => "payment",
            Self::Confirmed(_) => "confirmed",
        }
    }

    /// Step number shown to the shopper, if the step is part of the progression.
    pub fn number(&self) -> Option<u8> {
        match self {
            Self::Empty => None,
            Self::Details => Some(1),
            Self::Payment(_) => Some(2),
            Self::Confirmed(_) => Some(3),
        }
    }
}

/// The checkout step machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutFlow {
    step: CheckoutStep,
}

impl CheckoutFlow {
    /// Enter checkout; an empty cart never reaches the details step.
    pub fn new(cart_is_empty: bool) -> Self {
        Self {
            step: if cart_is_empty {
                CheckoutStep::Empty
            } else {
                CheckoutStep::Details
            },
        }
    }

    /// The current step.
    pub fn step(&self) -> &CheckoutStep {
        &self.step
    }

    /// Whether the flow has finished.
    pub fn is_confirmed(&self) -> bool {
        matches!(self.step, CheckoutStep::Confirmed(_))
    }

    /// React to the cart changing underneath the flow.
    ///
    /// A cart that gains items leaves `Empty`; a cart emptied before the order
    /// is placed returns the flow to `Empty`. `Confirmed` never changes.
    pub fn sync_cart(&mut self, cart_is_empty: bool) {
        match (&self.step, cart_is_empty) {
            (CheckoutStep::Empty, false) => self.step = CheckoutStep::Details,
            (CheckoutStep::Details | CheckoutStep::Payment(_), true) => {
                self.step = CheckoutStep::Empty;
            }
            _ => {}
        }
    }

    /// Submit the details form, moving to the payment step when it validates.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidDetails`] and stays on the details step
    /// when any field fails, or [`TransitionError::NotAllowed`] outside the
    /// details step.
    pub fn submit_details(&mut self, draft: &CheckoutDraft) -> Result<(), TransitionError> {
        match self.step {
            CheckoutStep::Details => {
                self.step = CheckoutStep::Payment(draft.validate()?);

                Ok(())
            }
            CheckoutStep::Empty => Err(TransitionError::EmptyCart),
            _ => Err(self.not_allowed("submit details")),
        }
    }

    /// Return from payment to the details step.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NotAllowed`] outside the payment step.
    pub fn back(&mut self) -> Result<(), TransitionError> {
        match self.step {
            CheckoutStep::Payment(_) => {
                self.step = CheckoutStep::Details;

                Ok(())
            }
            _ => Err(self.not_allowed("go back")),
        }
    }

    /// Details accepted for the payment step.
    pub fn shipping_details(&self) -> Option<&ShippingDetails> {
        match &self.step {
            CheckoutStep::Payment(details) => Some(details),
            _ => None,
        }
    }

    /// Record the persisted order and finish.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NotAllowed`] outside the payment step.
    pub fn confirm(&mut self, order_id: OrderId) -> Result<(), TransitionError> {
        match self.step {
            CheckoutStep::Payment(_) => {
                self.step = CheckoutStep::Confirmed(order_id);

                Ok(())
            }
            _ => Err(self.not_allowed("confirm")),
        }
    }

    fn not_allowed(&self, action: &'static str) -> TransitionError {
        TransitionError::NotAllowed {
            step: self.step.name(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::checkout::draft::{Field, FieldError, PaymentMethod};

    use super::*;

    fn valid_draft() -> CheckoutDraft {
        CheckoutDraft {
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            address: "1 Row".to_string(),
            city: "London".to_string(),
            postal_code: "N1".to_string(),
            phone: "555".to_string(),
            payment_method: PaymentMethod::Online,
        }
    }

    #[test]
    fn empty_cart_starts_in_empty_step() {
        let mut flow = CheckoutFlow::new(true);

        assert_eq!(flow.step(), &CheckoutStep::Empty);
        assert_eq!(
            flow.submit_details(&valid_draft()),
            Err(TransitionError::EmptyCart)
        );
        assert_eq!(flow.step(), &CheckoutStep::Empty);
    }

    #[test]
    fn invalid_details_stay_on_details_step() {
        let mut flow = CheckoutFlow::new(false);
        let draft = CheckoutDraft {
            city: String::new(),
            ..valid_draft()
        };

        let Err(TransitionError::InvalidDetails(errors)) = flow.submit_details(&draft) else {
            panic!("expected validation failure");
        };

        assert_eq!(errors.for_field(Field::City), Some(FieldError::Missing(Field::City)));
        assert_eq!(flow.step(), &CheckoutStep::Details);
    }

    #[test]
    fn happy_path_reaches_confirmed() -> TestResult {
        let mut flow = CheckoutFlow::new(false);

        flow.submit_details(&valid_draft())?;
        assert_eq!(flow.step().number(), Some(2));
        assert_eq!(
            flow.shipping_details().map(|details| details.city.as_str()),
            Some("London")
        );

        flow.confirm(OrderId::from(91_u64))?;

        assert_eq!(flow.step(), &CheckoutStep::Confirmed(OrderId::from("91")));
        assert!(flow.is_confirmed());

        Ok(())
    }

    #[test]
    fn back_returns_to_details() -> TestResult {
        let mut flow = CheckoutFlow::new(false);

        flow.submit_details(&valid_draft())?;
        flow.back()?;

        assert_eq!(flow.step(), &CheckoutStep::Details);

        Ok(())
    }

    #[test]
    fn confirmed_is_terminal() -> TestResult {
        let mut flow = CheckoutFlow::new(false);

        flow.submit_details(&valid_draft())?;
        flow.confirm(OrderId::from("7"))?;

        assert!(flow.back().is_err());
        assert!(flow.confirm(OrderId::from("8")).is_err());

        flow.sync_cart(true);

        assert_eq!(flow.step(), &CheckoutStep::Confirmed(OrderId::from("7")));

        Ok(())
    }

    #[test]
    fn confirm_requires_payment_step() {
        let mut flow = CheckoutFlow::new(false);

        assert_eq!(
            flow.confirm(OrderId::from("1")),
            Err(TransitionError::NotAllowed {
                step: "details",
                action: "confirm"
            })
        );
    }

    #[test]
    fn cart_changes_move_between_empty_and_details() -> TestResult {
        let mut flow = CheckoutFlow::new(true);

        flow.sync_cart(false);
        assert_eq!(flow.step(), &CheckoutStep::Details);

        flow.submit_details(&valid_draft())?;
        flow.sync_cart(true);
        assert_eq!(flow.step(), &CheckoutStep::Empty);

        Ok(())
    }
}
