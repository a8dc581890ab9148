use async_trait::async_trait;
use chrono::NaiveDate;
use cuponera_catalog::{sellability, Business, Category, Inventory, InventoryError, Offer, SaleWindowPolicy, Unsellable};
use cuponera_coupon::Coupon;
use uuid::Uuid;

pub type RepoError = Box<dyn std::error::Error + Send + Sync>;
pub type RepoResult<T> = Result<T, RepoError>;

/// Read access to offers and their reference data
#[async_trait]
pub trait OfferRepository: Send + Sync {
    async fn get_offer(&self, id: Uuid) -> RepoResult<Option<Offer>>;

    async fn list_approved_offers(&self) -> RepoResult<Vec<Offer>>;

    async fn get_business(&self, id: Uuid) -> RepoResult<Option<Business>>;

    async fn list_businesses(&self) -> RepoResult<Vec<Business>>;

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>>;

    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
}

/// Coupon persistence. `issue` is the only write path.
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Persists every coupon of the batch and adds the batch size to the
    /// offer's sold counter as one atomic unit. The store must re-run
    /// [`IssueBatch::recheck`] against the offer row it is about to update,
    /// while holding whatever guard serializes concurrent writers.
    async fn issue(&self, batch: IssueBatch) -> Result<IssuedBatch, IssueError>;

    async fn list_customer_coupons(&self, customer_id: &str) -> RepoResult<Vec<Coupon>>;

    async fn get_coupon(&self, id: Uuid) -> RepoResult<Option<Coupon>>;
}

/// A fully minted purchase waiting to be committed.
#[derive(Debug, Clone)]
pub struct IssueBatch {
    pub offer_id: Uuid,
    pub coupons: Vec<Coupon>,
    pub today: NaiveDate,
    pub policy: SaleWindowPolicy,
}

impl IssueBatch {
    pub fn quantity(&self) -> u32 {
        self.coupons.len() as u32
    }

    /// Sellability and stock, evaluated against the row being written.
    pub fn recheck(&self, offer: &Offer) -> Result<(), IssueError> {
        sellability(offer, self.today, self.policy)?;
        Inventory::of(offer).check(self.quantity())?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IssuedBatch {
    pub coupons: Vec<Coupon>,
    /// Sold counter after the increment.
    pub sold_count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("Offer not found: {0}")]
    OfferNotFound(Uuid),

    #[error(transparent)]
    NotSellable(#[from] Unsellable),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Coupon code already exists: {0}")]
    DuplicateCode(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}
