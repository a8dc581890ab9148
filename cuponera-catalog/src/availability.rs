use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::offer::{ApprovalState, Offer};

/// Whether the start/end sale window takes part in sellability.
///
/// `Strict` requires `start_date <= today <= end_date`. `Relaxed` skips the
/// window entirely, for deployments where client/server date skew would
/// otherwise hide offers on their first or last day.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SaleWindowPolicy {
    #[default]
    Strict,
    Relaxed,
}

impl SaleWindowPolicy {
    /// The date the store must re-check the window against, if any.
    pub fn window_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            SaleWindowPolicy::Strict => Some(today),
            SaleWindowPolicy::Relaxed => None,
        }
    }
}

/// Why an offer does not accept purchases right now.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unsellable {
    #[error("offer is not approved ({0})")]
    NotApproved(ApprovalState),

    #[error("offer sale window has not opened yet (starts {0})")]
    NotStarted(NaiveDate),

    #[error("offer sale window closed on {0}")]
    Ended(NaiveDate),

    #[error("offer is sold out")]
    SoldOut,
}

/// Evaluates the availability rules in order: approval, sale window, stock.
pub fn sellability(
    offer: &Offer,
    today: NaiveDate,
    policy: SaleWindowPolicy,
) -> Result<(), Unsellable> {
    if offer.approval_state != ApprovalState::Approved {
        return Err(Unsellable::NotApproved(offer.approval_state));
    }

    if policy == SaleWindowPolicy::Strict {
        if today < offer.start_date {
            return Err(Unsellable::NotStarted(offer.start_date));
        }
        if today > offer.end_date {
            return Err(Unsellable::Ended(offer.end_date));
        }
    }

    if let Some(cap) = offer.inventory_cap {
        if offer.sold_count >= cap {
            return Err(Unsellable::SoldOut);
        }
    }

    Ok(())
}

pub fn is_sellable(offer: &Offer, today: NaiveDate, policy: SaleWindowPolicy) -> bool {
    sellability(offer, today, policy).is_ok()
}
