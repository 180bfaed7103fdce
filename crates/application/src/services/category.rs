use std::sync::Arc;

use common::AggregateId;
use domain::{Category, DomainError, Entity, Repository};

use crate::error::Result;

/// Creates, reads and deletes categories.
#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn Repository<Category>>,
}

impl CategoryService {
    pub fn new(categories: Arc<dyn Repository<Category>>) -> Self {
        Self { categories }
    }

    #[tracing::instrument(skip(self, name))]
    pub async fn create(&self, name: impl Into<String>, code: i64) -> Result<Category> {
        let category = Category::new(name, code)?;
        let category = self.categories.add(category).await?;
        tracing::info!(category_id = %category.id(), "Category created");
        Ok(category)
    }

    pub async fn get(&self, id: AggregateId) -> Result<Category> {
        self.categories
            .get_by_id(id)
            .await?
            .ok_or_else(|| DomainError::CategoryNotFound(id).into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: AggregateId) -> Result<()> {
        if !self.categories.delete(id).await? {
            return Err(DomainError::CategoryNotFound(id).into());
        }
        tracing::info!("Category deleted");
        Ok(())
    }
}
