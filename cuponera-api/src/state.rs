use std::sync::Arc;

use cuponera_core::repository::{CouponRepository, OfferRepository};
use cuponera_core::{Clock, IssuanceEngine, PurchaseWorkflow, Storefront};
use cuponera_store::app_config::BusinessRules;
use cuponera_store::{EventProducer, RedisClient};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub storefront: Arc<Storefront>,
    pub workflow: Arc<PurchaseWorkflow>,
    pub offer_repo: Arc<dyn OfferRepository>,
    pub coupon_repo: Arc<dyn CouponRepository>,
    pub clock: Arc<dyn Clock>,
    pub redis: Option<Arc<RedisClient>>,
    pub kafka: Option<Arc<EventProducer>>,
    pub events_topic: String,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

impl AppState {
    /// Wires the storefront, engine and workflow over one pair of
    /// repositories. Redis and Kafka are attached separately.
    pub fn new(
        offer_repo: Arc<dyn OfferRepository>,
        coupon_repo: Arc<dyn CouponRepository>,
        clock: Arc<dyn Clock>,
        business_rules: BusinessRules,
        auth: AuthConfig,
    ) -> Self {
        let rules = business_rules.issuance_rules();
        let engine = Arc::new(IssuanceEngine::new(
            offer_repo.clone(),
            coupon_repo.clone(),
            clock.clone(),
            rules,
        ));
        let storefront = Arc::new(Storefront::new(
            offer_repo.clone(),
            clock.clone(),
            rules,
        ));
        let workflow = Arc::new(PurchaseWorkflow::new(
            offer_repo.clone(),
            engine,
        ));

        Self {
            storefront,
            workflow,
            offer_repo,
            coupon_repo,
            clock,
            redis: None,
            kafka: None,
            events_topic: String::new(),
            auth,
            business_rules,
        }
    }

    pub fn with_redis(mut self, redis: Arc<RedisClient>) -> Self {
        self.redis = Some(redis);
        self
    }

    pub fn with_kafka(mut self, kafka: Arc<EventProducer>, topic: impl Into<String>) -> Self {
        self.kafka = Some(kafka);
        self.events_topic = topic.into();
        self
    }
}
