use std::sync::Arc;

use cuponera_catalog::{sellability, Inventory};
use cuponera_coupon::Coupon;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::card::{validate_card, PaymentCard};
use crate::issuance::{IssuanceEngine, PurchaseRequest};
use crate::repository::OfferRepository;
use crate::{CoreError, CoreResult};

/// Identity supplied by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    pub authenticated: bool,
}

impl Customer {
    pub fn authenticated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            id: String::new(),
            authenticated: false,
        }
    }
}

/// A checkout as assembled by the caller from the route and the form.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub offer_id: Uuid,
    pub quantity: u32,
    pub card: PaymentCard,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub offer_id: Uuid,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
    pub sold_count: u32,
    pub coupons: Vec<Coupon>,
}

/// End-to-end purchase: checks the buyer, the offer, the quantity and the
/// card shape, then hands off to the issuance engine.
pub struct PurchaseWorkflow {
    offers: Arc<dyn OfferRepository>,
    engine: Arc<IssuanceEngine>,
}

impl PurchaseWorkflow {
    pub fn new(
        offers: Arc<dyn OfferRepository>,
        engine: Arc<IssuanceEngine>,
    ) -> Self {
        Self { offers, engine }
    }

    pub async fn checkout(&self, customer: &Customer, req: &CheckoutRequest) -> CoreResult<Receipt> {
        // 1. Authentication is the caller's job; we only honour the verdict
        if !customer.authenticated || customer.id.trim().is_empty() {
            return Err(CoreError::Unauthenticated);
        }

        // 2. Offer
        let offer = self
            .offers
            .get_offer(req.offer_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Offer not found".to_string()))?;

        // 3. Sellability
        let today = self.engine.today();
        if let Err(reason) = sellability(&offer, today, self.engine.rules().sale_window) {
            warn!("Checkout refused for offer {}: {}", offer.id, reason);
            return Err(CoreError::Unavailable("This offer is no longer available".to_string()));
        }

        // 4. Quantity within what the form offers
        let max = Inventory::of(&offer).max_quantity(self.engine.rules().max_uncapped_quantity);
        if req.quantity < 1 || req.quantity > max {
            return Err(CoreError::ValidationError(format!("Quantity must be between 1 and {}", max)));
        }

        // 5. Card shape
        validate_card(&req.card, today).map_err(|e| CoreError::ValidationError(e.to_string()))?;

        // 6. Business prefix
        let business = self
            .offers
            .get_business(offer.business_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Business not found".to_string()))?;

        // 7. Issue
        let issued = self
            .engine
            .purchase(&PurchaseRequest {
                offer_id: offer.id,
                customer_id: customer.id.clone(),
                quantity: req.quantity,
                business_prefix: business.code.clone(),
            })
            .await?;

        info!("Checkout completed: {} x offer {} for {}", req.quantity, offer.id, customer.id);

        Ok(Receipt {
            offer_id: offer.id,
            quantity: req.quantity,
            unit_price: offer.offer_price,
            total: offer.total_for(req.quantity),
            sold_count: issued.sold_count,
            coupons: issued.coupons,
        })
    }
}
