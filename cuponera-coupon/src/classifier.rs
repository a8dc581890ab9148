use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Coupon, CouponState};

/// A customer's coupons partitioned for display.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CouponBuckets {
    pub available: Vec<Coupon>,
    pub redeemed: Vec<Coupon>,
    pub expired: Vec<Coupon>,
}

impl CouponBuckets {
    pub fn len(&self) -> usize {
        self.available.len() + self.redeemed.len() + self.expired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The state a coupon should be shown in on `today`.
///
/// A stored `disponible` coupon whose deadline is before `today` reads as
/// `vencido`. A missing deadline sorts before every date, so it reads as
/// expired too. The stored state is never rewritten.
pub fn effective_state(coupon: &Coupon, today: NaiveDate) -> CouponState {
    match coupon.state {
        CouponState::Canjeado => CouponState::Canjeado,
        CouponState::Vencido => CouponState::Vencido,
        CouponState::Disponible if coupon.usage_deadline < Some(today) => CouponState::Vencido,
        CouponState::Disponible => CouponState::Disponible,
    }
}

/// Every input coupon lands in exactly one bucket; input order is kept
/// within each bucket.
pub fn classify(coupons: impl IntoIterator<Item = Coupon>, today: NaiveDate) -> CouponBuckets {
    let mut buckets = CouponBuckets::default();

    for coupon in coupons {
        match effective_state(&coupon, today) {
            CouponState::Disponible => buckets.available.push(coupon),
            CouponState::Canjeado => buckets.redeemed.push(coupon),
            CouponState::Vencido => buckets.expired.push(coupon),
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn coupon(state: CouponState, deadline: Option<NaiveDate>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: format!("TST{}", rand::random::<u32>() % 9_000_000 + 1_000_000),
            offer_id: Uuid::new_v4(),
            customer_id: "cliente-1".to_string(),
            state,
            purchase_date: date(2026, 1, 1),
            usage_deadline: deadline,
        }
    }

    #[test]
    fn test_redeemed_ignores_dates() {
        let today = date(2026, 6, 1);
        for deadline in [None, Some(date(2020, 1, 1)), Some(date(2030, 1, 1))] {
            let c = coupon(CouponState::Canjeado, deadline);
            assert_eq!(effective_state(&c, today), CouponState::Canjeado);
        }
    }

    #[test]
    fn test_deadline_boundary() {
        let today = date(2026, 6, 1);
        let on_deadline = coupon(CouponState::Disponible, Some(today));
        let day_before = coupon(CouponState::Disponible, Some(date(2026, 5, 31)));

        assert_eq!(effective_state(&on_deadline, today), CouponState::Disponible);
        assert_eq!(effective_state(&day_before, today), CouponState::Vencido);
    }

    #[test]
    fn test_missing_deadline_reads_as_expired() {
        let c = coupon(CouponState::Disponible, None);
        assert_eq!(effective_state(&c, date(2026, 6, 1)), CouponState::Vencido);
    }

    #[test]
    fn test_stored_vencido_stays_expired() {
        let c = coupon(CouponState::Vencido, Some(date(2030, 1, 1)));
        assert_eq!(effective_state(&c, date(2026, 6, 1)), CouponState::Vencido);
    }

    #[test]
    fn test_classify_is_a_partition() {
        let today = date(2026, 6, 1);
        let states = [CouponState::Disponible, CouponState::Canjeado, CouponState::Vencido];
        let deadlines = [None, Some(date(2026, 5, 31)), Some(today), Some(date(2026, 6, 2))];

        let mut input = Vec::new();
        for state in states {
            for deadline in deadlines {
                input.push(coupon(state, deadline));
            }
        }

        let buckets = classify(input.clone(), today);
        assert_eq!(buckets.len(), input.len());

        let ids: HashSet<Uuid> = buckets
            .available
            .iter()
            .chain(&buckets.redeemed)
            .chain(&buckets.expired)
            .map(|c| c.id)
            .collect();
        assert_eq!(ids.len(), input.len());

        // disponible with deadline today or tomorrow
        assert_eq!(buckets.available.len(), 2);
        assert_eq!(buckets.redeemed.len(), 4);
        // 4 stored vencido + disponible with no deadline or yesterday
        assert_eq!(buckets.expired.len(), 6);
    }

    #[test]
    fn test_classify_does_not_mutate_state() {
        let today = date(2026, 6, 1);
        let c = coupon(CouponState::Disponible, Some(date(2026, 1, 1)));
        let buckets = classify(vec![c.clone()], today);
        assert_eq!(buckets.expired, vec![c]);
        assert_eq!(buckets.expired[0].state, CouponState::Disponible);
    }
}
