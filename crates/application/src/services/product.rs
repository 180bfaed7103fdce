use std::sync::Arc;

use common::AggregateId;
use domain::{Category, DomainError, Entity, NewProduct, Product, Repository};
use event_queue::Broker;
use mediator::Envelope;

use crate::error::Result;
use crate::outbox::Outbox;

/// Catalog operations on products.
///
/// Stock changes that leave a product at or below its minimum publish a
/// `ProductStockLow` event through the [`Outbox`], stamped with the product
/// id. A stock change is undone when its event can be neither queued nor
/// kept in the outbox.
pub struct ProductService<B: Broker> {
    products: Arc<dyn Repository<Product>>,
    categories: Arc<dyn Repository<Category>>,
    outbox: Arc<Outbox<B>>,
}

impl<B: Broker> ProductService<B> {
    pub fn new(
        products: Arc<dyn Repository<Product>>,
        categories: Arc<dyn Repository<Category>>,
        outbox: Arc<Outbox<B>>,
    ) -> Self {
        Self {
            products,
            categories,
            outbox,
        }
    }

    /// Creates a product in an existing category.
    #[tracing::instrument(skip(self, input), fields(category_id = %input.category_id))]
    pub async fn create(&self, input: NewProduct) -> Result<Product> {
        if self.categories.get_by_id(input.category_id).await?.is_none() {
            return Err(DomainError::CategoryNotFound(input.category_id).into());
        }

        let product = Product::new(input)?;
        let product = self.products.add(product).await?;
        tracing::info!(product_id = %product.id(), "Product created");
        Ok(product)
    }

    pub async fn get(&self, id: AggregateId) -> Result<Product> {
        self.products
            .get_by_id(id)
            .await?
            .ok_or_else(|| DomainError::ProductNotFound(id).into())
    }

    /// Removes stock and reports low stock on the durable queue.
    #[tracing::instrument(skip(self))]
    pub async fn decrease_stock(&self, id: AggregateId, quantity: u32) -> Result<Product> {
        let previous = self.get(id).await?;
        let mut product = previous.clone();
        product.decrease_stock(quantity)?;
        self.save_and_publish(product, previous).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn increase_stock(&self, id: AggregateId, quantity: u32) -> Result<Product> {
        let previous = self.get(id).await?;
        let mut product = previous.clone();
        product.increase_stock(quantity);
        self.save_and_publish(product, previous).await
    }

    async fn save_and_publish(&self, mut product: Product, previous: Product) -> Result<Product> {
        let events: Vec<_> = product
            .take_events()
            .into_iter()
            .map(|event| Envelope::new(product.id().to_string(), event))
            .collect();

        let product = self.products.update(product).await?;
        if events.is_empty() {
            return Ok(product);
        }

        if let Err(e) = self.outbox.publish_all(&events).await {
            if let Err(restore) = self.products.update(previous).await {
                tracing::error!(
                    product_id = %product.id(),
                    error = %restore,
                    "Failed to restore stock after publish failure"
                );
            }
            return Err(e);
        }

        tracing::warn!(
            product_id = %product.id(),
            stock = product.stock(),
            min_stock = product.min_stock(),
            "Product stock is low"
        );
        Ok(product)
    }
}
