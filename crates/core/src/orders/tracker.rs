//! Order Tracker
//!
//! Maps an order status onto the five-stage delivery pipeline. Stage `i` is
//! completed iff the status index is at least `i`; only the stage equal to the
//! status is active. Statuses outside the pipeline get a banner instead.

use std::fmt;

use crate::orders::status::{OrderStatus, PIPELINE};

/// One stage of the delivery pipeline as shown to the shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    /// Pipeline status this stage represents
    pub status: OrderStatus,

    /// The order has reached this stage
    pub completed: bool,

    /// The order is currently at this stage
    pub active: bool,
}

/// What the tracker shows for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerView {
    /// The order is somewhere in the pipeline.
    Progress([Stage; 5]),

    /// The order's status is outside the pipeline.
    Banner(OrderStatus),
}

impl TrackerView {
    /// Build the view for a status.
    pub fn for_status(status: OrderStatus) -> Self {
        let Some(current) = status.stage_index() else {
            return Self::Banner(status);
        };

        let mut index = 0;

        Self::Progress(PIPELINE.map(|stage| {
            let view = Stage {
                status: stage,
                completed: current >= index,
                active: current == index,
            };

            index += 1;

            view
        }))
    }

    /// The stages, if the status is in the pipeline.
    pub fn stages(&self) -> Option<&[Stage]> {
        match self {
            Self::Progress(stages) => Some(stages),
            Self::Banner(_) => None,
        }
    }

    /// The stage the order is currently at.
    pub fn active_stage(&self) -> Option<OrderStatus> {
        self.stages()?
            .iter()
            .find(|stage| stage.active)
            .map(|stage| stage.status)
    }

    /// Banner text for statuses outside the pipeline.
    pub fn banner(&self) -> Option<&'static str> {
        match self {
            Self::Progress(_) => None,
            Self::Banner(OrderStatus::Cancelled) => Some("This order was cancelled."),
            Self::Banner(_) => Some("Tracking is unavailable for this order."),
        }
    }
}

impl fmt::Display for TrackerView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress(stages) => {
                let mut first = true;

                for stage in stages {
                    if !first {
                        f.write_str(" ── ")?;
                    }

                    first = false;

                    let marker = match (stage.active, stage.completed) {
                        (true, _) => '●',
                        (false, true) => '✔',
                        (false, false) => '○',
                    };

                    write!(f, "{marker} {}", stage.status.label())?;
                }

                Ok(())
            }
            Self::Banner(_) => f.write_str(self.banner().unwrap_or_default()),
        }
    }
}
