use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stored lifecycle state of a coupon.
///
/// Only issuance writes `Disponible`; the other two are written by the
/// redemption/expiration process outside this service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CouponState {
    Disponible,
    Canjeado,
    Vencido,
}

impl CouponState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponState::Disponible => "disponible",
            CouponState::Canjeado => "canjeado",
            CouponState::Vencido => "vencido",
        }
    }
}

impl fmt::Display for CouponState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CouponState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disponible" => Ok(CouponState::Disponible),
            "canjeado" => Ok(CouponState::Canjeado),
            "vencido" => Ok(CouponState::Vencido),
            other => Err(format!("unknown coupon state: {}", other)),
        }
    }
}

/// A single redeemable unit issued from a purchase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coupon {
    pub id: Uuid,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "ofertaId")]
    pub offer_id: Uuid,
    #[serde(rename = "clienteId")]
    pub customer_id: String,
    #[serde(rename = "estado")]
    pub state: CouponState,
    #[serde(rename = "fechaCompra")]
    pub purchase_date: NaiveDate,
    /// Copied from the offer at issuance; later offer edits do not apply.
    #[serde(rename = "fechaLimiteUso", default)]
    pub usage_deadline: Option<NaiveDate>,
}

impl Coupon {
    /// A freshly issued coupon. The deadline falls back to the purchase
    /// date when the offer has none.
    pub fn issue(
        code: String,
        offer_id: Uuid,
        customer_id: &str,
        purchase_date: NaiveDate,
        offer_deadline: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            offer_id,
            customer_id: customer_id.to_string(),
            state: CouponState::Disponible,
            purchase_date,
            usage_deadline: Some(offer_deadline.unwrap_or(purchase_date)),
        }
    }
}
