//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

use crate::catalog::TicketTypeId;

use super::OrderError;

/// Amount in minor units (cents) of the order's currency.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * i64::from(quantity),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// ISO 4217 currency code, upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Parses a three-letter code, accepting any case.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim();
        (code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()))
            .then(|| Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self("USD".to_string())
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The person paying for an order. Tickets are issued in their name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub name: String,
    pub email: String,
}

impl Buyer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.name.trim().is_empty() {
            return Err(OrderError::InvalidBuyer("name is required".to_string()));
        }
        let valid_email = self
            .email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !valid_email {
            return Err(OrderError::InvalidBuyer(format!(
                "invalid email address: {}",
                self.email
            )));
        }
        Ok(())
    }
}

/// A priced line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub ticket_type_id: TicketTypeId,

    /// Name at the time of purchase; printed on the ticket.
    pub ticket_type_name: String,

    pub quantity: u32,

    pub unit_price: Money,
}

impl OrderLine {
    pub fn new(
        ticket_type_id: impl Into<TicketTypeId>,
        ticket_type_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            ticket_type_id: ticket_type_id.into(),
            ticket_type_name: ticket_type_name.into(),
            quantity,
            unit_price,
        }
    }

    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Merges lines that name the same ticket type, keeping first-seen order.
pub fn merge_lines(lines: Vec<OrderLine>) -> Vec<OrderLine> {
    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged
            .iter_mut()
            .find(|l| l.ticket_type_id == line.ticket_type_id)
        {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1250).to_string(), "-12.50");
    }

    #[test]
    fn money_sum_and_multiply() {
        let total: Money = [Money::from_cents(1000), Money::from_cents(250)]
            .into_iter()
            .sum();
        assert_eq!(total.cents(), 1250);
        assert_eq!(Money::from_cents(1500).multiply(3).cents(), 4500);
    }

    #[test]
    fn money_serializes_as_cents() {
        assert_eq!(serde_json::to_string(&Money::from_cents(999)).unwrap(), "999");
    }

    #[test]
    fn currency_parse() {
        assert_eq!(Currency::parse("eur").unwrap().as_str(), "EUR");
        assert!(Currency::parse("EURO").is_none());
        assert!(Currency::parse("U$D").is_none());
    }

    #[test]
    fn buyer_validation() {
        assert!(Buyer::new("Ada Lovelace", "ada@example.com").validate().is_ok());
        assert!(Buyer::new("  ", "ada@example.com").validate().is_err());
        assert!(Buyer::new("Ada", "ada.example.com").validate().is_err());
        assert!(Buyer::new("Ada", "@example.com").validate().is_err());
    }

    #[test]
    fn merge_lines_sums_duplicates() {
        let merged = merge_lines(vec![
            OrderLine::new("general", "General Admission", 1, Money::from_cents(10000)),
            OrderLine::new("workshop", "Workshop", 1, Money::from_cents(5000)),
            OrderLine::new("general", "General Admission", 2, Money::from_cents(10000)),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].ticket_type_id.as_str(), "general");
        assert_eq!(merged[0].quantity, 3);
        assert_eq!(merged[0].total_price().cents(), 30000);
    }
}
