pub mod app_config;
pub mod database;
pub mod offer_repo;
pub mod coupon_repo;
pub mod redis_repo;
pub mod events;

pub use app_config::Config;
pub use database::DbClient;
pub use offer_repo::PostgresOfferRepository;
pub use coupon_repo::PostgresCouponRepository;
pub use redis_repo::{rate_limit_key, RedisClient};
pub use events::EventProducer;
