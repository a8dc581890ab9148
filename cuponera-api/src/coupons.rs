use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    middleware,
    routing::get,
    Extension, Json, Router,
};
use chrono::NaiveDate;
use cuponera_coupon::{classify, effective_state, Coupon, CouponState};
use cuponera_core::Customer;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::customer_auth_middleware;
use crate::state::AppState;

/// Title shown for coupons whose offer no longer exists.
const FALLBACK_OFFER_TITLE: &str = "Oferta";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CouponView {
    #[serde(flatten)]
    pub coupon: Coupon,
    #[serde(rename = "tituloOferta")]
    pub offer_title: String,
}

#[derive(Debug, Serialize)]
pub struct BucketCounts {
    pub disponibles: usize,
    pub canjeados: usize,
    pub vencidos: usize,
}

#[derive(Debug, Serialize)]
pub struct MyCouponsResponse {
    pub disponibles: Vec<CouponView>,
    pub canjeados: Vec<CouponView>,
    pub vencidos: Vec<CouponView>,
    pub conteo: BucketCounts,
}

/// Fields printed on a voucher.
#[derive(Debug, Serialize)]
pub struct VoucherResponse {
    pub codigo: String,
    #[serde(rename = "tituloOferta")]
    pub offer_title: String,
    #[serde(rename = "empresaNombre")]
    pub business_name: Option<String>,
    #[serde(rename = "precioOferta")]
    pub offer_price: f64,
    #[serde(rename = "fechaCompra")]
    pub purchase_date: NaiveDate,
    #[serde(rename = "fechaLimiteUso")]
    pub usage_deadline: Option<NaiveDate>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/coupons", get(list_my_coupons))
        .route("/v1/coupons/{id}/voucher", get(get_voucher))
        .layer(middleware::from_fn_with_state(state, customer_auth_middleware))
}

/// GET /v1/coupons
async fn list_my_coupons(
    State(state): State<AppState>,
    Extension(customer): Extension<Customer>,
) -> Result<Json<MyCouponsResponse>, AppError> {
    let coupons = state
        .coupon_repo
        .list_customer_coupons(&customer.id)
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;

    // 1. Resolve offer titles once per distinct offer
    let mut titles: HashMap<Uuid, String> = HashMap::new();
    for coupon in &coupons {
        if titles.contains_key(&coupon.offer_id) {
            continue;
        }
        let title = state
            .offer_repo
            .get_offer(coupon.offer_id)
            .await
            .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?
            .map(|o| o.title)
            .unwrap_or_else(|| FALLBACK_OFFER_TITLE.to_string());
        titles.insert(coupon.offer_id, title);
    }

    // 2. Classify against the server date
    let buckets = classify(coupons, state.clock.today());

    let view = |list: Vec<Coupon>| -> Vec<CouponView> {
        list.into_iter()
            .map(|coupon| CouponView {
                offer_title: titles
                    .get(&coupon.offer_id)
                    .cloned()
                    .unwrap_or_else(|| FALLBACK_OFFER_TITLE.to_string()),
                coupon,
            })
            .collect()
    };

    let conteo = BucketCounts {
        disponibles: buckets.available.len(),
        canjeados: buckets.redeemed.len(),
        vencidos: buckets.expired.len(),
    };

    Ok(Json(MyCouponsResponse {
        disponibles: view(buckets.available),
        canjeados: view(buckets.redeemed),
        vencidos: view(buckets.expired),
        conteo,
    }))
}

/// GET /v1/coupons/{id}/voucher
async fn get_voucher(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(customer): Extension<Customer>,
) -> Result<Json<VoucherResponse>, AppError> {
    // 1. Ownership; someone else's coupon looks the same as a missing one
    let coupon = state
        .coupon_repo
        .get_coupon(id)
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?
        .filter(|c| c.customer_id == customer.id)
        .ok_or_else(|| AppError::NotFoundError("Coupon not found".to_string()))?;

    // 2. Only coupons that can still be redeemed get a voucher
    if effective_state(&coupon, state.clock.today()) != CouponState::Disponible {
        return Err(AppError::ConflictError("This coupon is no longer available".to_string()));
    }

    // 3. Offer and business details
    let offer = state
        .offer_repo
        .get_offer(coupon.offer_id)
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;

    let business_name = match &offer {
        Some(o) => state
            .offer_repo
            .get_business(o.business_id)
            .await
            .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?
            .map(|b| b.name),
        None => None,
    };

    Ok(Json(VoucherResponse {
        codigo: coupon.code,
        offer_title: offer
            .as_ref()
            .map(|o| o.title.clone())
            .unwrap_or_else(|| FALLBACK_OFFER_TITLE.to_string()),
        business_name,
        offer_price: offer.as_ref().map_or(0.0, |o| o.offer_price),
        purchase_date: coupon.purchase_date,
        usage_deadline: coupon.usage_deadline,
    }))
}
