pub mod clock;
pub mod repository;
pub mod issuance;
pub mod card;
pub mod checkout;
pub mod storefront;
pub mod memory;

pub use clock::{Clock, FixedClock, SystemClock};
pub use issuance::{IssuanceEngine, IssuanceRules, PurchaseRequest};
pub use checkout::{CheckoutRequest, Customer, PurchaseWorkflow, Receipt};
pub use storefront::{OfferAvailability, OfferDetail, Storefront};
pub use memory::MemoryStore;

/// Outcomes surfaced to the presentation layer. None of them is fatal.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("Storage failure: {0}")]
    PersistenceFailure(String),
    #[error("You must sign in to purchase")]
    Unauthenticated,
}

impl CoreError {
    /// Only storage failures are worth retrying verbatim.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::PersistenceFailure(_))
    }
}

impl From<repository::RepoError> for CoreError {
    fn from(err: repository::RepoError) -> Self {
        CoreError::PersistenceFailure(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
