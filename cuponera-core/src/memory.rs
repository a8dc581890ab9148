use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use cuponera_catalog::{ApprovalState, Business, Category, Offer};
use cuponera_coupon::Coupon;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::repository::{CouponRepository, IssueBatch, IssueError, IssuedBatch, OfferRepository, RepoResult};

#[derive(Default)]
struct MemoryState {
    offers: HashMap<Uuid, Offer>,
    businesses: HashMap<Uuid, Business>,
    categories: HashMap<Uuid, Category>,
    coupons: Vec<Coupon>,
    codes: HashSet<String>,
    fail_next_write: bool,
}

/// In-process store for local runs and tests.
///
/// Every `issue` call runs under one lock: re-check, stage, then apply, so
/// a batch is either fully visible or not at all.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_offer(&self, offer: Offer) {
        self.state.lock().await.offers.insert(offer.id, offer);
    }

    pub async fn put_business(&self, business: Business) {
        self.state.lock().await.businesses.insert(business.id, business);
    }

    pub async fn put_category(&self, category: Category) {
        self.state.lock().await.categories.insert(category.id, category);
    }

    /// Inserts a coupon as-is, bypassing issuance (seeding redeemed or
    /// expired coupons).
    pub async fn put_coupon(&self, coupon: Coupon) {
        let mut state = self.state.lock().await;
        state.codes.insert(coupon.code.clone());
        state.coupons.push(coupon);
    }

    pub async fn offer(&self, id: Uuid) -> Option<Offer> {
        self.state.lock().await.offers.get(&id).cloned()
    }

    pub async fn coupon_count(&self) -> usize {
        self.state.lock().await.coupons.len()
    }

    /// The next `issue` fails after staging its batch.
    pub async fn fail_next_write(&self) {
        self.state.lock().await.fail_next_write = true;
    }
}

#[async_trait]
impl OfferRepository for MemoryStore {
    async fn get_offer(&self, id: Uuid) -> RepoResult<Option<Offer>> {
        Ok(self.offer(id).await)
    }

    async fn list_approved_offers(&self) -> RepoResult<Vec<Offer>> {
        let state = self.state.lock().await;
        let mut offers: Vec<Offer> = state
            .offers
            .values()
            .filter(|o| o.approval_state == ApprovalState::Approved)
            .cloned()
            .collect();
        offers.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(offers)
    }

    async fn get_business(&self, id: Uuid) -> RepoResult<Option<Business>> {
        Ok(self.state.lock().await.businesses.get(&id).cloned())
    }

    async fn list_businesses(&self) -> RepoResult<Vec<Business>> {
        let mut businesses: Vec<Business> = self.state.lock().await.businesses.values().cloned().collect();
        businesses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(businesses)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let mut categories: Vec<Category> = self.state.lock().await.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

#[async_trait]
impl CouponRepository for MemoryStore {
    async fn issue(&self, batch: IssueBatch) -> Result<IssuedBatch, IssueError> {
        let mut state = self.state.lock().await;

        // 1. Re-check against the live row
        let offer = state
            .offers
            .get(&batch.offer_id)
            .ok_or(IssueError::OfferNotFound(batch.offer_id))?;
        batch.recheck(offer)?;

        // 2. Stage: code uniqueness across the store and within the batch
        let mut staged = HashSet::with_capacity(batch.coupons.len());
        for coupon in &batch.coupons {
            if state.codes.contains(&coupon.code) || !staged.insert(coupon.code.clone()) {
                return Err(IssueError::DuplicateCode(coupon.code.clone()));
            }
        }

        if std::mem::take(&mut state.fail_next_write) {
            return Err(IssueError::Storage("injected write failure".to_string()));
        }

        // 3. Apply
        let quantity = batch.quantity();
        let sold_count = {
            let offer = state
                .offers
                .get_mut(&batch.offer_id)
                .ok_or(IssueError::OfferNotFound(batch.offer_id))?;
            offer.sold_count += quantity;
            offer.sold_count
        };
        state.codes.extend(staged);
        state.coupons.extend(batch.coupons.iter().cloned());

        Ok(IssuedBatch {
            coupons: batch.coupons,
            sold_count,
        })
    }

    async fn list_customer_coupons(&self, customer_id: &str) -> RepoResult<Vec<Coupon>> {
        let state = self.state.lock().await;
        Ok(state
            .coupons
            .iter()
            .filter(|c| c.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn get_coupon(&self, id: Uuid) -> RepoResult<Option<Coupon>> {
        let state = self.state.lock().await;
        Ok(state.coupons.iter().find(|c| c.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cuponera_catalog::{SaleWindowPolicy, Unsellable};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn offer(cap: Option<u32>) -> Offer {
        Offer {
            id: Uuid::new_v4(),
            title: "Gimnasio".to_string(),
            description: None,
            business_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            regular_price: 30.0,
            offer_price: 15.0,
            approval_state: ApprovalState::Approved,
            start_date: date(2026, 1, 1),
            end_date: date(2026, 12, 31),
            inventory_cap: cap,
            sold_count: 0,
            usage_deadline: None,
        }
    }

    fn batch(offer: &Offer, codes: &[&str]) -> IssueBatch {
        let today = date(2026, 2, 1);
        IssueBatch {
            offer_id: offer.id,
            coupons: codes
                .iter()
                .map(|c| Coupon::issue(c.to_string(), offer.id, "cliente-1", today, None))
                .collect(),
            today,
            policy: SaleWindowPolicy::Strict,
        }
    }

    #[tokio::test]
    async fn test_issue_applies_counter_and_coupons_together() {
        let store = MemoryStore::new();
        let o = offer(Some(3));
        store.put_offer(o.clone()).await;

        let issued = store.issue(batch(&o, &["GYM0001000001", "GYM0001000002"])).await.unwrap();
        assert_eq!(issued.sold_count, 2);
        assert_eq!(store.coupon_count().await, 2);

        let err = store.issue(batch(&o, &["GYM0001000003", "GYM0001000004"])).await.unwrap_err();
        assert!(matches!(err, IssueError::Inventory(_)));

        store.issue(batch(&o, &["GYM0001000005"])).await.unwrap();
        let err = store.issue(batch(&o, &["GYM0001000006"])).await.unwrap_err();
        assert!(matches!(err, IssueError::NotSellable(Unsellable::SoldOut)));
        assert_eq!(store.offer(o.id).await.unwrap().sold_count, 3);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejects_whole_batch() {
        let store = MemoryStore::new();
        let o = offer(None);
        store.put_offer(o.clone()).await;
        store.issue(batch(&o, &["GYM0001000001"])).await.unwrap();

        let err = store.issue(batch(&o, &["GYM0001000002", "GYM0001000001"])).await.unwrap_err();
        assert!(matches!(err, IssueError::DuplicateCode(code) if code == "GYM0001000001"));
        assert_eq!(store.coupon_count().await, 1);
        assert_eq!(store.offer(o.id).await.unwrap().sold_count, 1);

        let err = store.issue(batch(&o, &["GYM0001000009", "GYM0001000009"])).await.unwrap_err();
        assert!(matches!(err, IssueError::DuplicateCode(_)));
    }

    #[tokio::test]
    async fn test_missing_offer() {
        let store = MemoryStore::new();
        let o = offer(None);
        let err = store.issue(batch(&o, &["GYM0001000001"])).await.unwrap_err();
        assert!(matches!(err, IssueError::OfferNotFound(id) if id == o.id));
    }

    #[tokio::test]
    async fn test_customer_listing_is_scoped() {
        let store = MemoryStore::new();
        let o = offer(None);
        store.put_offer(o.clone()).await;
        store.issue(batch(&o, &["GYM0001000001"])).await.unwrap();
        store
            .put_coupon(Coupon::issue("GYM0009999999".to_string(), o.id, "cliente-2", date(2026, 2, 1), None))
            .await;

        assert_eq!(store.list_customer_coupons("cliente-1").await.unwrap().len(), 1);
        assert_eq!(store.list_customer_coupons("cliente-2").await.unwrap().len(), 1);
        assert!(store.list_customer_coupons("nadie").await.unwrap().is_empty());
    }
}
