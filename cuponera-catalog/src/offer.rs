use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Moderation state of an offer. Only `Approved` offers can be sold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ApprovalState {
    #[serde(rename = "borrador")]
    Draft,
    #[serde(rename = "aprobada")]
    Approved,
    #[serde(rename = "rechazada")]
    Rejected,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::Draft => "borrador",
            ApprovalState::Approved => "aprobada",
            ApprovalState::Rejected => "rechazada",
        }
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalState {
    type Err = String;

    // Stored values are compared case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "borrador" => Ok(ApprovalState::Draft),
            "aprobada" => Ok(ApprovalState::Approved),
            "rechazada" => Ok(ApprovalState::Rejected),
            other => Err(format!("unknown approval state: {}", other)),
        }
    }
}

/// A discount listing published by a business.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    pub id: Uuid,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "empresaId")]
    pub business_id: Uuid,
    #[serde(rename = "rubroId")]
    pub category_id: Uuid,
    #[serde(rename = "precioRegular")]
    pub regular_price: f64,
    #[serde(rename = "precioOferta")]
    pub offer_price: f64,
    #[serde(rename = "estado")]
    pub approval_state: ApprovalState,
    #[serde(rename = "fechaInicio")]
    pub start_date: NaiveDate,
    #[serde(rename = "fechaFin")]
    pub end_date: NaiveDate,
    /// `None` means unlimited inventory.
    #[serde(rename = "cantidadLimite", default)]
    pub inventory_cap: Option<u32>,
    #[serde(rename = "cuponesVendidos", default)]
    pub sold_count: u32,
    /// Stamped onto every coupon issued from this offer.
    #[serde(rename = "fechaLimiteUso", default)]
    pub usage_deadline: Option<NaiveDate>,
}

impl Offer {
    pub fn is_capped(&self) -> bool {
        self.inventory_cap.is_some()
    }

    pub fn total_for(&self, quantity: u32) -> f64 {
        self.offer_price * quantity as f64
    }
}

/// Merchant record. `code` is the coupon-code prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Business {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "rubroId", default)]
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
}
