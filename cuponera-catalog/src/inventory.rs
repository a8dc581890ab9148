use serde::{Deserialize, Serialize};

use crate::offer::Offer;

/// Upper bound offered to the buyer when an offer has no cap.
pub const DEFAULT_MAX_UNCAPPED_QUANTITY: u32 = 99;

/// Point-in-time stock view of an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub cap: Option<u32>,
    pub sold: u32,
}

impl Inventory {
    pub fn of(offer: &Offer) -> Self {
        Self {
            cap: offer.inventory_cap,
            sold: offer.sold_count,
        }
    }

    /// Coupons still available, or `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        self.cap.map(|cap| cap.saturating_sub(self.sold))
    }

    /// Largest quantity the purchase form accepts.
    pub fn max_quantity(&self, uncapped_max: u32) -> u32 {
        match self.remaining() {
            Some(remaining) => remaining.max(1),
            None => uncapped_max,
        }
    }

    /// Checks `quantity` against the cap only. Zero is always rejected.
    pub fn check(&self, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::ZeroQuantity);
        }

        if let Some(remaining) = self.remaining() {
            if quantity > remaining {
                return Err(InventoryError::InsufficientInventory {
                    requested: quantity,
                    available: remaining,
                });
            }
        }

        Ok(())
    }

    pub fn after_sale(&self, quantity: u32) -> Self {
        Self {
            cap: self.cap,
            sold: self.sold.saturating_add(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("Quantity must be at least 1")]
    ZeroQuantity,

    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        requested: u32,
        available: u32,
    },
}
