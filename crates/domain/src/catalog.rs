//! Ticket types on sale and their prices.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::Money;

/// Slug identifying a ticket type, e.g. `"general"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketTypeId(String);

impl TicketTypeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid_slug(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    }
}

impl std::fmt::Display for TicketTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TicketTypeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TicketTypeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn default_max_per_order() -> u32 {
    10
}

fn default_on_sale() -> bool {
    true
}

/// A kind of ticket that can be bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    pub id: TicketTypeId,

    pub name: String,

    #[serde(rename = "price_cents")]
    pub price: Money,

    /// Total tickets that may be sold. `None` means unlimited.
    #[serde(default)]
    pub capacity: Option<u32>,

    #[serde(default = "default_max_per_order")]
    pub max_per_order: u32,

    #[serde(default = "default_on_sale")]
    pub on_sale: bool,
}

impl TicketType {
    pub fn new(id: impl Into<TicketTypeId>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            capacity: None,
            max_per_order: default_max_per_order(),
            on_sale: true,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_max_per_order(mut self, max: u32) -> Self {
        self.max_per_order = max;
        self
    }

    pub fn off_sale(mut self) -> Self {
        self.on_sale = false;
        self
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid catalog: {0}")]
    Invalid(String),
}

/// Read access to the ticket catalog.
pub trait Catalog: Send + Sync {
    fn get(&self, id: &TicketTypeId) -> Option<TicketType>;

    /// All ticket types, in display order.
    fn list(&self) -> Vec<TicketType>;
}

/// Catalog held in memory, loaded once at startup.
#[derive(Debug, Clone)]
pub struct InMemoryCatalog {
    ticket_types: Vec<TicketType>,
}

impl InMemoryCatalog {
    pub fn new(ticket_types: Vec<TicketType>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for ticket_type in &ticket_types {
            if !ticket_type.id.is_valid_slug() {
                return Err(CatalogError::Invalid(format!(
                    "ticket type id '{}' must be a lowercase slug",
                    ticket_type.id
                )));
            }
            if !seen.insert(ticket_type.id.clone()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate ticket type id '{}'",
                    ticket_type.id
                )));
            }
            if ticket_type.price.is_negative() {
                return Err(CatalogError::Invalid(format!(
                    "ticket type '{}' has a negative price",
                    ticket_type.id
                )));
            }
            if ticket_type.max_per_order == 0 {
                return Err(CatalogError::Invalid(format!(
                    "ticket type '{}' must allow at least one ticket per order",
                    ticket_type.id
                )));
            }
        }

        Ok(Self { ticket_types })
    }

    /// Parses a JSON array of ticket types.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let ticket_types: Vec<TicketType> = serde_json::from_str(json)?;
        Self::new(ticket_types)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Built-in catalog used when no catalog file is configured.
    pub fn conference_defaults() -> Self {
        Self {
            ticket_types: vec![
                TicketType::new("general", "General Admission", Money::from_cents(19900))
                    .with_capacity(500),
                TicketType::new("student", "Student", Money::from_cents(4900))
                    .with_capacity(100)
                    .with_max_per_order(1),
                TicketType::new("workshop", "Workshop Day", Money::from_cents(9900))
                    .with_capacity(40)
                    .with_max_per_order(2),
                TicketType::new("community", "Community Pass", Money::zero())
                    .with_capacity(50)
                    .with_max_per_order(1),
            ],
        }
    }
}

impl Catalog for InMemoryCatalog {
    fn get(&self, id: &TicketTypeId) -> Option<TicketType> {
        self.ticket_types.iter().find(|t| &t.id == id).cloned()
    }

    fn list(&self) -> Vec<TicketType> {
        self.ticket_types.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_applies_defaults() {
        let catalog = InMemoryCatalog::from_json(
            r#"[
                {"id": "general", "name": "General", "price_cents": 15000, "capacity": 300},
                {"id": "vip", "name": "VIP", "price_cents": 45000, "max_per_order": 2, "on_sale": false}
            ]"#,
        )
        .unwrap();

        let general = catalog.get(&"general".into()).unwrap();
        assert_eq!(general.price, Money::from_cents(15000));
        assert_eq!(general.capacity, Some(300));
        assert_eq!(general.max_per_order, 10);
        assert!(general.on_sale);

        let vip = catalog.get(&"vip".into()).unwrap();
        assert_eq!(vip.capacity, None);
        assert!(!vip.on_sale);

        let ids: Vec<_> = catalog.list().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["general".into(), "vip".into()]);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = InMemoryCatalog::new(vec![
            TicketType::new("general", "A", Money::from_cents(100)),
            TicketType::new("general", "B", Money::from_cents(200)),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::Invalid(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn rejects_bad_slugs_and_prices() {
        assert!(
            InMemoryCatalog::new(vec![TicketType::new("General Admission", "GA", Money::zero())])
                .is_err()
        );
        assert!(
            InMemoryCatalog::new(vec![TicketType::new("ga", "GA", Money::from_cents(-1))])
                .is_err()
        );
        assert!(
            InMemoryCatalog::new(vec![
                TicketType::new("ga", "GA", Money::zero()).with_max_per_order(0)
            ])
            .is_err()
        );
    }

    #[test]
    fn unknown_id_is_none() {
        let catalog = InMemoryCatalog::conference_defaults();
        assert!(catalog.get(&"backstage".into()).is_none());
        assert!(catalog.get(&"general".into()).is_some());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = InMemoryCatalog::load("/nonexistent/catalog.json").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
