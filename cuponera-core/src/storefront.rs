use std::sync::Arc;

use cuponera_catalog::{sellability, Business, Category, Inventory, Offer};
use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::issuance::IssuanceRules;
use crate::repository::OfferRepository;
use crate::{CoreError, CoreResult};

/// Sellability of an offer as seen by the purchase form.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OfferAvailability {
    pub sellable: bool,
    pub reason: Option<String>,
    /// `None` for uncapped offers.
    pub remaining: Option<u32>,
    pub max_quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferDetail {
    pub offer: Offer,
    pub business: Option<Business>,
    pub category: Option<Category>,
    pub availability: OfferAvailability,
}

/// Catalogue reads. Sold counts are re-read on every call.
pub struct Storefront {
    offers: Arc<dyn OfferRepository>,
    clock: Arc<dyn Clock>,
    rules: IssuanceRules,
}

impl Storefront {
    pub fn new(
        offers: Arc<dyn OfferRepository>,
        clock: Arc<dyn Clock>,
        rules: IssuanceRules,
    ) -> Self {
        Self { offers, clock, rules }
    }

    pub fn availability(&self, offer: &Offer) -> OfferAvailability {
        let inventory = Inventory::of(offer);
        let verdict = sellability(offer, self.clock.today(), self.rules.sale_window);

        OfferAvailability {
            sellable: verdict.is_ok(),
            reason: verdict.err().map(|r| r.to_string()),
            remaining: inventory.remaining(),
            max_quantity: inventory.max_quantity(self.rules.max_uncapped_quantity),
        }
    }

    /// Sellable offers, optionally restricted to one category.
    pub async fn list_sellable(&self, category_id: Option<Uuid>) -> CoreResult<Vec<(Offer, OfferAvailability)>> {
        let offers = self.offers.list_approved_offers().await?;

        Ok(offers
            .into_iter()
            .filter(|o| category_id.map_or(true, |c| o.category_id == c))
            .map(|o| {
                let availability = self.availability(&o);
                (o, availability)
            })
            .filter(|(_, a)| a.sellable)
            .collect())
    }

    pub async fn offer_detail(&self, offer_id: Uuid) -> CoreResult<OfferDetail> {
        let offer = self
            .offers
            .get_offer(offer_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Offer not found".to_string()))?;

        let business = self.offers.get_business(offer.business_id).await?;
        let category = self.offers.get_category(offer.category_id).await?;
        let availability = self.availability(&offer);

        Ok(OfferDetail {
            offer,
            business,
            category,
            availability,
        })
    }

    pub async fn categories(&self) -> CoreResult<Vec<Category>> {
        Ok(self.offers.list_categories().await?)
    }

    pub async fn businesses(&self) -> CoreResult<Vec<Business>> {
        Ok(self.offers.list_businesses().await?)
    }
}
