use uuid::Uuid;

/// Published once per committed purchase.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct CouponsIssuedEvent {
    pub offer_id: Uuid,
    pub customer_id: String,
    pub quantity: u32,
    pub codes: Vec<String>,
    pub sold_count: u32,
    pub timestamp: i64,
}

impl CouponsIssuedEvent {
    pub const EVENT_TYPE: &'static str = "coupons_issued";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload_shape() {
        let event = CouponsIssuedEvent {
            offer_id: Uuid::nil(),
            customer_id: "cliente-1".to_string(),
            quantity: 2,
            codes: vec!["ABC1231234567".to_string(), "ABC1237654321".to_string()],
            sold_count: 7,
            timestamp: 1_700_000_000,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["codes"].as_array().unwrap().len(), 2);
        assert_eq!(json["sold_count"], 7);
    }
}
