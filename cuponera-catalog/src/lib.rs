pub mod offer;
pub mod availability;
pub mod inventory;

pub use offer::{ApprovalState, Business, Category, Offer};
pub use availability::{is_sellable, sellability, SaleWindowPolicy, Unsellable};
pub use inventory::{Inventory, InventoryError, DEFAULT_MAX_UNCAPPED_QUANTITY};
