//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{Grams, Sku};
use crate::domain::events::{DomainEvent, ProductEvent};

#[derive(Clone, Debug, Serialize)]
pub struct Product {
    id: Uuid,
    sku: Sku,
    name: String,
    description: Option<String>,
    category: Option<String>,
    price: Decimal,
    cost_price: Option<Decimal>,
    weight: Option<Grams>,
    stock: u32,
    status: ProductStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str { match self { Self::Active => "active", Self::Archived => "archived" } }
    pub fn parse(s: &str) -> Option<Self> { match s { "active" => Some(Self::Active), "archived" => Some(Self::Archived), _ => None } }
}

/// Editable product attributes, shared by create and update.
#[derive(Clone, Debug, Default)]
pub struct ProductDetails {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub cost_price: Option<Decimal>,
    pub weight: Option<Grams>,
    pub stock: u32,
}

impl Product {
    pub fn create(sku: Sku, details: ProductDetails) -> Result<Self, ProductError> {
        validate(&details)?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut product = Self {
            id, sku: sku.clone(), name: details.name, description: details.description, category: details.category,
            price: details.price, cost_price: details.cost_price, weight: details.weight, stock: details.stock,
            status: ProductStatus::Active, created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, sku: sku.to_string() }));
        Ok(product)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn restore(id: Uuid, sku: Sku, details: ProductDetails, status: ProductStatus, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id, sku, name: details.name, description: details.description, category: details.category,
            price: details.price, cost_price: details.cost_price, weight: details.weight, stock: details.stock,
            status, created_at, updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn category(&self) -> Option<&str> { self.category.as_deref() }
    pub fn price(&self) -> Decimal { self.price }
    pub fn cost_price(&self) -> Option<Decimal> { self.cost_price }
    pub fn weight(&self) -> Option<Grams> { self.weight }
    pub fn stock(&self) -> u32 { self.stock }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_orderable(&self) -> bool { self.status == ProductStatus::Active }

    pub fn update(&mut self, details: ProductDetails) -> Result<(), ProductError> {
        validate(&details)?;
        let price_changed = details.price != self.price || details.cost_price != self.cost_price;
        self.name = details.name;
        self.description = details.description;
        self.category = details.category;
        self.price = details.price;
        self.cost_price = details.cost_price;
        self.weight = details.weight;
        self.stock = details.stock;
        self.touch();
        if price_changed {
            self.raise_event(DomainEvent::Product(ProductEvent::PriceChanged { product_id: self.id, price: self.price, cost_price: self.cost_price }));
        }
        Ok(())
    }

    pub fn set_cost_price(&mut self, cost_price: Decimal) -> Result<(), ProductError> {
        if cost_price.is_sign_negative() { return Err(ProductError::NegativePrice); }
        if self.cost_price == Some(cost_price) { return Ok(()); }
        self.cost_price = Some(cost_price);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::PriceChanged { product_id: self.id, price: self.price, cost_price: self.cost_price }));
        Ok(())
    }

    pub fn archive(&mut self) {
        if self.status == ProductStatus::Archived { return; }
        self.status = ProductStatus::Archived;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Archived { product_id: self.id }));
    }

    pub fn activate(&mut self) {
        if self.status == ProductStatus::Active { return; }
        self.status = ProductStatus::Active;
        self.touch();
    }

    pub fn add_stock(&mut self, qty: u32) { self.stock = self.stock.saturating_add(qty); self.touch(); }

    pub fn remove_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.checked_sub(qty).ok_or_else(|| ProductError::InsufficientStock { sku: self.sku.to_string(), available: self.stock })?;
        self.touch();
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn validate(details: &ProductDetails) -> Result<(), ProductError> {
    if details.name.trim().is_empty() { return Err(ProductError::MissingName); }
    if details.price.is_sign_negative() || details.cost_price.is_some_and(|c| c.is_sign_negative()) {
        return Err(ProductError::NegativePrice);
    }
    Ok(())
}

#[derive(Debug, Clone, Error)]
pub enum ProductError {
    #[error("Missing name")]
    MissingName,
    #[error("Prices cannot be negative")]
    NegativePrice,
    #[error("Insufficient stock for {sku}: {available} available")]
    InsufficientStock { sku: String, available: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(price: i64) -> ProductDetails {
        ProductDetails { name: "Test Product".into(), price: Decimal::new(price, 2), cost_price: Some(Decimal::new(600, 2)), ..Default::default() }
    }

    #[test]
    fn test_product_create() {
        let p = Product::create(Sku::new("TEST-001").unwrap(), details(1999)).unwrap();
        assert_eq!(p.name(), "Test Product");
        assert!(p.is_orderable());
    }

    #[test]
    fn test_stock() {
        let mut p = Product::create(Sku::new("TEST").unwrap(), details(1000)).unwrap();
        p.add_stock(10);
        p.remove_stock(5).unwrap();
        assert_eq!(p.stock(), 5);
        assert!(matches!(p.remove_stock(6), Err(ProductError::InsufficientStock { available: 5, .. })));
    }

    #[test]
    fn test_price_change_raises_event() {
        let mut p = Product::create(Sku::new("TEST").unwrap(), details(1000)).unwrap();
        p.take_events();
        p.update(details(1000)).unwrap();
        assert!(p.take_events().is_empty());
        p.update(details(1200)).unwrap();
        assert_eq!(p.take_events().len(), 1);
    }

    #[test]
    fn test_set_cost_price() {
        let mut p = Product::create(Sku::new("TEST").unwrap(), details(1000)).unwrap();
        p.take_events();
        p.set_cost_price(Decimal::new(450, 2)).unwrap();
        assert_eq!(p.cost_price(), Some(Decimal::new(450, 2)));
        assert_eq!(p.take_events().len(), 1);
        p.set_cost_price(Decimal::new(450, 2)).unwrap();
        assert!(p.take_events().is_empty());
        assert!(matches!(p.set_cost_price(Decimal::new(-1, 2)), Err(ProductError::NegativePrice)));
    }

    #[test]
    fn test_archive_and_validation() {
        let mut p = Product::create(Sku::new("TEST").unwrap(), details(1000)).unwrap();
        p.archive();
        assert!(!p.is_orderable());
        assert!(matches!(Product::create(Sku::new("X").unwrap(), details(-1)), Err(ProductError::NegativePrice)));
    }
}
