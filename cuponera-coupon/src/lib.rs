pub mod models;
pub mod generator;
pub mod classifier;

pub use models::{Coupon, CouponState};
pub use generator::{generate_code, generate_code_with, normalize_prefix, validate_prefix, CodeError, CodeSource, RandomCodes};
pub use classifier::{classify, effective_state, CouponBuckets};
