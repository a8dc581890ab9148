use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use cuponera_catalog::{Category, Offer};
use cuponera_core::card::PaymentCard;
use cuponera_core::{CheckoutRequest, Customer, OfferAvailability, OfferDetail, Receipt};
use cuponera_shared::models::events::CouponsIssuedEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::customer_identity_middleware;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CatalogueQuery {
    #[serde(rename = "rubroId")]
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CatalogueEntry {
    #[serde(flatten)]
    pub offer: Offer,
    #[serde(rename = "empresaNombre")]
    pub business_name: Option<String>,
    #[serde(flatten)]
    pub availability: OfferAvailability,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseBody {
    #[serde(rename = "cantidad")]
    pub quantity: u32,
    #[serde(flatten)]
    pub card: PaymentCard,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let purchase = Router::new()
        .route("/v1/offers/{id}/purchase", post(purchase_offer))
        .layer(middleware::from_fn_with_state(state, customer_identity_middleware));

    Router::new()
        .route("/v1/categories", get(list_categories))
        .route("/v1/offers", get(list_offers))
        .route("/v1/offers/{id}", get(get_offer))
        .merge(purchase)
}

// ============================================================================
// Catalogue
// ============================================================================

/// GET /v1/categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.storefront.categories().await?))
}

/// GET /v1/offers?rubroId=
async fn list_offers(
    State(state): State<AppState>,
    Query(query): Query<CatalogueQuery>,
) -> Result<Json<Vec<CatalogueEntry>>, AppError> {
    let offers = state.storefront.list_sellable(query.category_id).await?;
    let names: HashMap<Uuid, String> = state
        .storefront
        .businesses()
        .await?
        .into_iter()
        .map(|b| (b.id, b.name))
        .collect();

    let entries = offers
        .into_iter()
        .map(|(offer, availability)| CatalogueEntry {
            business_name: names.get(&offer.business_id).cloned(),
            offer,
            availability,
        })
        .collect();

    Ok(Json(entries))
}

/// GET /v1/offers/{id}
async fn get_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OfferDetail>, AppError> {
    Ok(Json(state.storefront.offer_detail(id).await?))
}

// ============================================================================
// Purchase
// ============================================================================

/// POST /v1/offers/{id}/purchase
async fn purchase_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(customer): Extension<Customer>,
    Json(body): Json<PurchaseBody>,
) -> Result<(StatusCode, Json<Receipt>), AppError> {
    let req = CheckoutRequest {
        offer_id: id,
        quantity: body.quantity,
        card: body.card,
    };

    // 1. Checkout (validation + atomic issuance)
    let receipt = state.workflow.checkout(&customer, &req).await?;

    // 2. Publish, best-effort
    if let Some(kafka) = state.kafka.clone() {
        let event = CouponsIssuedEvent {
            offer_id: receipt.offer_id,
            customer_id: customer.id.clone(),
            quantity: receipt.quantity,
            codes: receipt.coupons.iter().map(|c| c.code.clone()).collect(),
            sold_count: receipt.sold_count,
            timestamp: Utc::now().timestamp(),
        };
        let topic = state.events_topic.clone();

        tokio::spawn(async move {
            match serde_json::to_string(&event) {
                Ok(payload) => {
                    if let Err(e) = kafka.publish(&topic, &event.offer_id.to_string(), &payload).await {
                        tracing::warn!("Dropped {} event for offer {}: {}", CouponsIssuedEvent::EVENT_TYPE, event.offer_id, e);
                    }
                }
                Err(e) => tracing::warn!("Could not encode {} event: {}", CouponsIssuedEvent::EVENT_TYPE, e),
            }
        });
    }

    Ok((StatusCode::CREATED, Json(receipt)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_body_wire_names() {
        let body: PurchaseBody = serde_json::from_value(serde_json::json!({
            "cantidad": 3,
            "numeroTarjeta": "4111 1111 1111 1111",
            "vencimiento": "12/29",
            "cvv": "123"
        }))
        .unwrap();

        assert_eq!(body.quantity, 3);
        assert_eq!(body.card.expiry, "12/29");
        assert_eq!(body.card.number.expose(), "4111 1111 1111 1111");

        let logged = format!("{:?}", body);
        assert!(!logged.contains("4111"));
        assert!(logged.contains("********"));
    }
}
