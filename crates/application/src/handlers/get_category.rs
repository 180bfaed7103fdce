use std::sync::Arc;

use async_trait::async_trait;
use domain::Category;
use mediator::{EventHandlerError, QueryHandler};

use crate::handlers::service_failure;
use crate::messages::GetCategory;
use crate::services::CategoryService;

/// Answers [`GetCategory`].
pub struct GetCategoryHandler {
    categories: Arc<CategoryService>,
}

impl GetCategoryHandler {
    pub fn new(categories: Arc<CategoryService>) -> Self {
        Self { categories }
    }
}

#[async_trait]
impl QueryHandler<GetCategory> for GetCategoryHandler {
    async fn handle(&self, query: GetCategory) -> Result<Category, EventHandlerError> {
        self.categories
            .get(query.id)
            .await
            .map_err(service_failure)
    }
}
