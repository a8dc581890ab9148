use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use cuponera_catalog::{
    sellability, Inventory, InventoryError, Offer, SaleWindowPolicy, DEFAULT_MAX_UNCAPPED_QUANTITY,
};
use cuponera_coupon::{validate_prefix, CodeSource, Coupon, RandomCodes};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, error};
use uuid::Uuid;

use crate::clock::Clock;
use crate::repository::{CouponRepository, IssueBatch, IssueError, IssuedBatch, OfferRepository};
use crate::{CoreError, CoreResult};

/// Draws allowed per coupon when deduplicating codes inside one batch.
const DRAWS_PER_COUPON: u32 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IssuanceRules {
    pub sale_window: SaleWindowPolicy,
    /// Full batch retries after a code collision in the store.
    pub code_attempts: u32,
    /// Largest batch accepted for an offer without an inventory cap.
    pub max_uncapped_quantity: u32,
}

impl Default for IssuanceRules {
    fn default() -> Self {
        Self {
            sale_window: SaleWindowPolicy::Strict,
            code_attempts: 5,
            max_uncapped_quantity: DEFAULT_MAX_UNCAPPED_QUANTITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub offer_id: Uuid,
    pub customer_id: String,
    pub quantity: u32,
    pub business_prefix: String,
}

/// Allocates coupons against an offer's bounded inventory.
pub struct IssuanceEngine {
    offers: Arc<dyn OfferRepository>,
    coupons: Arc<dyn CouponRepository>,
    codes: Arc<dyn CodeSource>,
    clock: Arc<dyn Clock>,
    rules: IssuanceRules,
}

impl IssuanceEngine {
    pub fn new(
        offers: Arc<dyn OfferRepository>,
        coupons: Arc<dyn CouponRepository>,
        clock: Arc<dyn Clock>,
        rules: IssuanceRules,
    ) -> Self {
        Self {
            offers,
            coupons,
            codes: Arc::new(RandomCodes),
            clock,
            rules,
        }
    }

    pub fn with_code_source(mut self, codes: Arc<dyn CodeSource>) -> Self {
        self.codes = codes;
        self
    }

    pub fn rules(&self) -> &IssuanceRules {
        &self.rules
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Validates the request, mints `quantity` coupons and commits them
    /// together with the sold-counter increment. Nothing is written unless
    /// every check passes; a failed commit leaves no coupons behind.
    pub async fn purchase(&self, req: &PurchaseRequest) -> CoreResult<IssuedBatch> {
        // 1. Request shape
        if req.quantity == 0 {
            return Err(CoreError::ValidationError(InventoryError::ZeroQuantity.to_string()));
        }
        if req.customer_id.trim().is_empty() {
            return Err(CoreError::ValidationError("Customer id is required".to_string()));
        }
        let prefix = validate_prefix(&req.business_prefix)
            .map_err(|e| CoreError::ValidationError(e.to_string()))?;

        // 2. Offer state as of now
        let offer = self
            .offers
            .get_offer(req.offer_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Offer not found".to_string()))?;

        let today = self.clock.today();

        if let Err(reason) = sellability(&offer, today, self.rules.sale_window) {
            warn!("Purchase rejected for offer {}: {}", offer.id, reason);
            return Err(unavailable(reason));
        }

        if !offer.is_capped() && req.quantity > self.rules.max_uncapped_quantity {
            return Err(CoreError::ValidationError(format!(
                "Quantity must be between 1 and {}",
                self.rules.max_uncapped_quantity
            )));
        }
        Inventory::of(&offer)
            .check(req.quantity)
            .map_err(|e| CoreError::ValidationError(e.to_string()))?;

        // 3. Mint and commit, retrying on code collisions
        for attempt in 1..=self.rules.code_attempts.max(1) {
            let Some(coupons) = self.mint(&prefix, &offer, &req.customer_id, req.quantity, today) else {
                warn!("Could not draw {} distinct codes for prefix {} (attempt {})", req.quantity, prefix, attempt);
                continue;
            };

            let batch = IssueBatch {
                offer_id: offer.id,
                coupons,
                today,
                policy: self.rules.sale_window,
            };

            match self.coupons.issue(batch).await {
                Ok(issued) => {
                    info!(
                        "Issued {} coupons for offer {} to customer {} (sold {})",
                        issued.coupons.len(),
                        offer.id,
                        req.customer_id,
                        issued.sold_count
                    );
                    return Ok(issued);
                }
                Err(IssueError::DuplicateCode(code)) => {
                    warn!("Coupon code collision on {} (attempt {}), regenerating batch", code, attempt);
                }
                Err(e) => return Err(map_issue_error(e)),
            }
        }

        error!("Gave up issuing coupons for offer {} after {} attempts", offer.id, self.rules.code_attempts);
        Err(CoreError::PersistenceFailure(format!(
            "could not allocate unique coupon codes after {} attempts",
            self.rules.code_attempts
        )))
    }

    /// Codes are distinct within the batch; `None` when the source keeps
    /// repeating itself.
    fn mint(
        &self,
        prefix: &str,
        offer: &Offer,
        customer_id: &str,
        quantity: u32,
        today: NaiveDate,
    ) -> Option<Vec<Coupon>> {
        let mut seen = HashSet::with_capacity(quantity as usize);
        let mut coupons = Vec::with_capacity(quantity as usize);
        let mut draws = 0;

        while coupons.len() < quantity as usize {
            if draws >= quantity.saturating_mul(DRAWS_PER_COUPON) {
                return None;
            }
            draws += 1;

            let code = self.codes.next_code(prefix);
            if seen.insert(code.clone()) {
                coupons.push(Coupon::issue(code, offer.id, customer_id, today, offer.usage_deadline));
            }
        }

        Some(coupons)
    }
}

fn unavailable(reason: impl std::fmt::Display) -> CoreError {
    CoreError::Unavailable(format!("This offer is no longer available: {}", reason))
}

fn map_issue_error(err: IssueError) -> CoreError {
    match err {
        IssueError::OfferNotFound(_) => CoreError::NotFound("Offer not found".to_string()),
        IssueError::NotSellable(reason) => unavailable(reason),
        IssueError::Inventory(e @ InventoryError::InsufficientInventory { available: 0, .. }) => unavailable(e),
        IssueError::Inventory(e) => CoreError::ValidationError(e.to_string()),
        IssueError::DuplicateCode(code) => {
            CoreError::PersistenceFailure(format!("duplicate coupon code {}", code))
        }
        IssueError::Storage(msg) => {
            error!("Coupon batch rolled back: {}", msg);
            CoreError::PersistenceFailure(msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::memory::MemoryStore;
    use crate::repository::RepoResult;
    use async_trait::async_trait;
    use cuponera_catalog::{ApprovalState, Business};
    use cuponera_coupon::CouponState;
    use std::sync::Mutex;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2026, 3, 15)
    }

    fn offer(cap: Option<u32>, sold: u32) -> Offer {
        Offer {
            id: Uuid::new_v4(),
            title: "Spa day".to_string(),
            description: Some("Masaje y sauna".to_string()),
            business_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            regular_price: 60.0,
            offer_price: 35.0,
            approval_state: ApprovalState::Approved,
            start_date: date(2026, 3, 1),
            end_date: date(2026, 3, 31),
            inventory_cap: cap,
            sold_count: sold,
            usage_deadline: Some(date(2026, 6, 30)),
        }
    }

    async fn setup(offer: &Offer) -> (Arc<MemoryStore>, IssuanceEngine) {
        let store = Arc::new(MemoryStore::new());
        store.put_offer(offer.clone()).await;
        store
            .put_business(Business {
                id: offer.business_id,
                name: "Relax SA".to_string(),
                code: "REL001".to_string(),
                category_id: None,
            })
            .await;
        let engine = IssuanceEngine::new(
            store.clone(),
            store.clone(),
            Arc::new(FixedClock(today())),
            IssuanceRules::default(),
        );
        (store, engine)
    }

    fn request(offer: &Offer, quantity: u32) -> PurchaseRequest {
        PurchaseRequest {
            offer_id: offer.id,
            customer_id: "cliente-1".to_string(),
            quantity,
            business_prefix: "rel001".to_string(),
        }
    }

    /// Replays a fixed list of codes, then falls back to random ones.
    struct ScriptedCodes(Mutex<Vec<String>>);

    impl CodeSource for ScriptedCodes {
        fn next_code(&self, prefix: &str) -> String {
            let mut script = self.0.lock().unwrap();
            if script.is_empty() {
                RandomCodes.next_code(prefix)
            } else {
                script.remove(0)
            }
        }
    }

    #[tokio::test]
    async fn test_purchase_issues_exact_batch() {
        let o = offer(None, 0);
        let (store, engine) = setup(&o).await;

        let issued = engine.purchase(&request(&o, 3)).await.unwrap();

        assert_eq!(issued.coupons.len(), 3);
        assert_eq!(issued.sold_count, 3);
        let codes: HashSet<&str> = issued.coupons.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes.len(), 3);
        for c in &issued.coupons {
            assert!(c.code.starts_with("REL001"));
            assert_eq!(c.code.len(), 13);
            assert!(c.code[6..].chars().all(|ch| ch.is_ascii_digit()));
            assert_eq!(c.state, CouponState::Disponible);
            assert_eq!(c.purchase_date, today());
            assert_eq!(c.usage_deadline, Some(date(2026, 6, 30)));
            assert_eq!(c.customer_id, "cliente-1");
        }
        assert_eq!(store.offer(o.id).await.unwrap().sold_count, 3);
        assert_eq!(store.list_customer_coupons("cliente-1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_deadline_falls_back_to_purchase_date() {
        let mut o = offer(None, 0);
        o.usage_deadline = None;
        let (_, engine) = setup(&o).await;

        let issued = engine.purchase(&request(&o, 1)).await.unwrap();
        assert_eq!(issued.coupons[0].usage_deadline, Some(today()));
    }

    #[tokio::test]
    async fn test_quantity_above_remaining_is_rejected() {
        let o = offer(Some(10), 8);
        let (store, engine) = setup(&o).await;

        let err = engine.purchase(&request(&o, 3)).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(store.offer(o.id).await.unwrap().sold_count, 8);
        assert_eq!(store.coupon_count().await, 0);

        let issued = engine.purchase(&request(&o, 2)).await.unwrap();
        assert_eq!(issued.sold_count, 10);
        assert_eq!(store.offer(o.id).await.unwrap().sold_count, 10);
    }

    #[tokio::test]
    async fn test_sold_out_offer_is_unavailable() {
        let o = offer(Some(5), 5);
        let (store, engine) = setup(&o).await;

        let err = engine.purchase(&request(&o, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::Unavailable(_)));
        assert_eq!(store.offer(o.id).await.unwrap().sold_count, 5);
    }

    #[tokio::test]
    async fn test_unlimited_offer_accepts_large_batch() {
        let o = offer(None, 0);
        let (store, engine) = setup(&o).await;

        let issued = engine.purchase(&request(&o, 50)).await.unwrap();
        assert_eq!(issued.coupons.len(), 50);
        assert_eq!(store.offer(o.id).await.unwrap().sold_count, 50);
    }

    #[tokio::test]
    async fn test_validation_before_lookup() {
        let o = offer(None, 0);
        let (_, engine) = setup(&o).await;

        let err = engine.purchase(&request(&o, 0)).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let mut bad_prefix = request(&o, 1);
        bad_prefix.business_prefix = "x".to_string();
        let err = engine.purchase(&bad_prefix).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let mut missing = request(&o, 1);
        missing.offer_id = Uuid::new_v4();
        let err = engine.purchase(&missing).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unapproved_and_out_of_window() {
        let mut draft = offer(None, 0);
        draft.approval_state = ApprovalState::Draft;
        let (_, engine) = setup(&draft).await;
        assert!(matches!(
            engine.purchase(&request(&draft, 1)).await.unwrap_err(),
            CoreError::Unavailable(_)
        ));

        let mut ended = offer(None, 0);
        ended.end_date = date(2026, 3, 14);
        let (store, engine) = setup(&ended).await;
        assert!(matches!(
            engine.purchase(&request(&ended, 1)).await.unwrap_err(),
            CoreError::Unavailable(_)
        ));

        // Same offer passes once the window check is relaxed
        let relaxed = IssuanceEngine::new(
            store.clone(),
            store.clone(),
            Arc::new(FixedClock(today())),
            IssuanceRules { sale_window: SaleWindowPolicy::Relaxed, ..Default::default() },
        );
        assert!(relaxed.purchase(&request(&ended, 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_code_collision_is_retried() {
        let o = offer(None, 0);
        let (store, engine) = setup(&o).await;
        store
            .put_coupon(Coupon::issue("REL0011111111".to_string(), o.id, "otro", today(), None))
            .await;

        let engine = engine.with_code_source(Arc::new(ScriptedCodes(Mutex::new(vec![
            "REL0011111111".to_string(),
        ]))));

        let issued = engine.purchase(&request(&o, 1)).await.unwrap();
        assert_ne!(issued.coupons[0].code, "REL0011111111");
        assert_eq!(store.coupon_count().await, 2);
        assert_eq!(store.offer(o.id).await.unwrap().sold_count, 1);
    }

    /// Always hands out the same code.
    struct StuckCodes(String);

    impl CodeSource for StuckCodes {
        fn next_code(&self, _prefix: &str) -> String {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_persistent_collisions_give_up_without_writing() {
        let o = offer(Some(10), 0);
        let (store, engine) = setup(&o).await;
        store
            .put_coupon(Coupon::issue("REL0011111111".to_string(), o.id, "otro", today(), None))
            .await;
        let engine = engine.with_code_source(Arc::new(StuckCodes("REL0011111111".to_string())));

        let err = engine.purchase(&request(&o, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::PersistenceFailure(_)));
        assert!(err.is_retryable());
        assert_eq!(store.coupon_count().await, 1);
        assert_eq!(store.offer(o.id).await.unwrap().sold_count, 0);
    }

    #[tokio::test]
    async fn test_repeating_code_source_cannot_fill_batch() {
        let o = offer(Some(10), 0);
        let (store, engine) = setup(&o).await;
        let engine = engine.with_code_source(Arc::new(StuckCodes("REL0014444444".to_string())));

        let err = engine.purchase(&request(&o, 2)).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.coupon_count().await, 0);
        assert_eq!(store.offer(o.id).await.unwrap().sold_count, 0);
    }

    #[tokio::test]
    async fn test_uncapped_quantity_has_a_ceiling() {
        let o = offer(None, 0);
        let (store, engine) = setup(&o).await;

        let err = engine.purchase(&request(&o, u32::MAX)).await.unwrap_err();
        assert_eq!(err.to_string(), "Quantity must be between 1 and 99");

        let err = engine.purchase(&request(&o, 100)).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(store.coupon_count().await, 0);

        let issued = engine.purchase(&request(&o, 99)).await.unwrap();
        assert_eq!(issued.sold_count, 99);
    }

    #[tokio::test]
    async fn test_intra_batch_duplicates_are_redrawn() {
        let o = offer(None, 0);
        let (_, engine) = setup(&o).await;
        let engine = engine.with_code_source(Arc::new(ScriptedCodes(Mutex::new(vec![
            "REL0012222222".to_string(),
            "REL0012222222".to_string(),
            "REL0013333333".to_string(),
        ]))));

        let issued = engine.purchase(&request(&o, 2)).await.unwrap();
        let codes: Vec<&str> = issued.coupons.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["REL0012222222", "REL0013333333"]);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing_behind() {
        let o = offer(Some(10), 0);
        let (store, engine) = setup(&o).await;
        store.fail_next_write().await;

        let err = engine.purchase(&request(&o, 4)).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.coupon_count().await, 0);
        assert_eq!(store.offer(o.id).await.unwrap().sold_count, 0);

        // The next attempt goes through
        assert!(engine.purchase(&request(&o, 4)).await.is_ok());
        assert_eq!(store.coupon_count().await, 4);
    }

    /// Reads report stock that a concurrent buyer already took.
    struct StaleOffers {
        snapshot: Offer,
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl OfferRepository for StaleOffers {
        async fn get_offer(&self, _id: Uuid) -> RepoResult<Option<Offer>> {
            Ok(Some(self.snapshot.clone()))
        }
        async fn list_approved_offers(&self) -> RepoResult<Vec<Offer>> {
            self.inner.list_approved_offers().await
        }
        async fn get_business(&self, id: Uuid) -> RepoResult<Option<Business>> {
            self.inner.get_business(id).await
        }
        async fn list_businesses(&self) -> RepoResult<Vec<Business>> {
            self.inner.list_businesses().await
        }
        async fn get_category(&self, id: Uuid) -> RepoResult<Option<cuponera_catalog::Category>> {
            self.inner.get_category(id).await
        }
        async fn list_categories(&self) -> RepoResult<Vec<cuponera_catalog::Category>> {
            self.inner.list_categories().await
        }
    }

    #[tokio::test]
    async fn test_store_recheck_catches_stale_read() {
        let stale = offer(Some(5), 3);
        let mut current = stale.clone();
        current.sold_count = 5;

        let (store, _) = setup(&current).await;
        let engine = IssuanceEngine::new(
            Arc::new(StaleOffers { snapshot: stale.clone(), inner: store.clone() }),
            store.clone(),
            Arc::new(FixedClock(today())),
            IssuanceRules::default(),
        );

        let err = engine.purchase(&request(&stale, 2)).await.unwrap_err();
        assert!(matches!(err, CoreError::Unavailable(_)));
        assert_eq!(store.offer(stale.id).await.unwrap().sold_count, 5);
        assert_eq!(store.coupon_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_purchases_never_oversell() {
        let o = offer(Some(10), 0);
        let (store, engine) = setup(&o).await;
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for i in 0..40u32 {
            let engine = engine.clone();
            let mut req = request(&o, 1 + i % 3);
            req.customer_id = format!("cliente-{}", i);
            handles.push(tokio::spawn(async move { engine.purchase(&req).await }));
        }

        let mut issued_total = 0;
        for handle in handles {
            if let Ok(batch) = handle.await.unwrap() {
                issued_total += batch.coupons.len() as u32;
            }
        }

        let sold = store.offer(o.id).await.unwrap().sold_count;
        assert!(sold <= 10);
        assert_eq!(sold, issued_total);
        assert_eq!(store.coupon_count().await, issued_total as usize);
    }
}
