use common::AggregateId;
use serde::{Deserialize, Serialize};
use validation::{Rule, ValidationError};

use crate::entity::{Entity, check};
use crate::error::{DomainError, Result};
use crate::events::ProductStockLow;
use crate::value_objects::{Dimensions, Money};

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub min_stock: u32,
    pub category_id: AggregateId,
    pub dimensions: Dimensions,
}

/// A sellable catalog item with tracked stock.
///
/// Stock changes record a [`ProductStockLow`] event whenever stock ends up
/// at or below `min_stock`; drain them with [`take_events`](Self::take_events).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    id: AggregateId,
    name: String,
    description: String,
    price: Money,
    stock: u32,
    min_stock: u32,
    category_id: AggregateId,
    dimensions: Dimensions,
    #[serde(skip)]
    events: Vec<ProductStockLow>,
}

impl Product {
    pub fn new(input: NewProduct) -> std::result::Result<Self, ValidationError> {
        let product = Self {
            id: AggregateId::new(),
            name: input.name,
            description: input.description,
            price: input.price,
            stock: input.stock,
            min_stock: input.min_stock,
            category_id: input.category_id,
            dimensions: input.dimensions,
            events: Vec::new(),
        };
        product.validate()?;
        Ok(product)
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        check(self, |v| {
            v.set_rule("name", [Rule::Required, Rule::String, Rule::Min(1.0)])
                .set_rule("description", [Rule::String, Rule::Max(500.0)])
                .set_rule("price.cents", [Rule::Required, Rule::Integer, Rule::Min(1.0)])
                .set_rule("category_id", [Rule::Required, Rule::Uuid])
                .set_rule("dimensions.width", [Rule::Required, Rule::Number, Rule::Min(0.0)])
                .set_rule("dimensions.height", [Rule::Required, Rule::Number, Rule::Min(0.0)])
                .set_rule("dimensions.depth", [Rule::Required, Rule::Number, Rule::Min(0.0)])
                .set_rule("dimensions.weight", [Rule::Required, Rule::Number, Rule::Min(0.0)])
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn min_stock(&self) -> u32 {
        self.min_stock
    }

    pub fn category_id(&self) -> AggregateId {
        self.category_id
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn is_stock_low(&self) -> bool {
        self.stock <= self.min_stock
    }

    /// Removes `quantity` units from stock.
    pub fn decrease_stock(&mut self, quantity: u32) -> Result<()> {
        if quantity > self.stock {
            return Err(DomainError::InsufficientStock {
                product_id: self.id,
                requested: quantity,
                available: self.stock,
            });
        }
        self.stock -= quantity;
        self.record_if_low();
        Ok(())
    }

    pub fn increase_stock(&mut self, quantity: u32) {
        self.stock = self.stock.saturating_add(quantity);
        self.record_if_low();
    }

    /// Drains the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<ProductStockLow> {
        std::mem::take(&mut self.events)
    }

    fn record_if_low(&mut self) {
        if self.is_stock_low() {
            self.events.push(ProductStockLow {
                product_id: self.id,
                product_name: self.name.clone(),
                stock: self.stock,
                min_stock: self.min_stock,
            });
        }
    }
}

impl Entity for Product {
    const KIND: &'static str = "Product";

    fn id(&self) -> AggregateId {
        self.id
    }
}
