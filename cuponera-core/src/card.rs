use chrono::{Datelike, NaiveDate};
use cuponera_shared::Masked;
use serde::Deserialize;

/// Card details typed into the purchase form. Only the shape is checked;
/// no charge is attempted.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCard {
    #[serde(rename = "numeroTarjeta")]
    pub number: Masked<String>,
    /// `MM/YY`
    #[serde(rename = "vencimiento")]
    pub expiry: String,
    pub cvv: Masked<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CardError {
    #[error("Invalid card number")]
    InvalidNumber,
    #[error("Expiry must be MM/YY")]
    ExpiryFormat,
    #[error("Invalid expiry month")]
    InvalidMonth,
    #[error("Card has expired")]
    Expired,
    #[error("CVV must be 3 or 4 digits")]
    InvalidCvv,
}

pub fn validate_card(card: &PaymentCard, today: NaiveDate) -> Result<(), CardError> {
    let number: String = card.number.expose().chars().filter(|c| !c.is_whitespace()).collect();
    if !(13..=19).contains(&number.len()) || !is_digits(&number) {
        return Err(CardError::InvalidNumber);
    }

    let (month, year) = parse_expiry(card.expiry.trim())?;
    if !(1..=12).contains(&month) {
        return Err(CardError::InvalidMonth);
    }
    let current_year = (today.year() % 100) as u32;
    if (year, month) < (current_year, today.month()) {
        return Err(CardError::Expired);
    }

    let cvv = card.cvv.expose();
    if !(3..=4).contains(&cvv.len()) || !is_digits(cvv) {
        return Err(CardError::InvalidCvv);
    }

    Ok(())
}

fn is_digits(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_digit())
}

fn parse_expiry(expiry: &str) -> Result<(u32, u32), CardError> {
    let (mm, yy) = expiry.split_once('/').ok_or(CardError::ExpiryFormat)?;
    if mm.len() != 2 || yy.len() != 2 || !is_digits(mm) || !is_digits(yy) {
        return Err(CardError::ExpiryFormat);
    }
    let month = mm.parse().map_err(|_| CardError::ExpiryFormat)?;
    let year = yy.parse().map_err(|_| CardError::ExpiryFormat)?;
    Ok((month, year))
}
