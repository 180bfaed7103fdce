//! Wiring of repositories, capabilities and handlers into a mediator.

use std::sync::Arc;
use std::time::Duration;

use domain::{
    Category, InMemoryRepository, Payment, PaymentApproved, Product, ProductStockLow,
    PurchaseOrder, PurchaseOrderPlaced, Repository, User,
};
use event_queue::{Broker, EventQueue};
use mediator::{Envelope, Mediator, MediatorError};

use crate::capabilities::{Mailer, PaymentGateway};
use crate::config::NotificationConfig;
use crate::handlers::{
    GetCategoryHandler, MarkOrderPaid, NotifyLowStock, ProcessPaymentHandler, ReserveStock,
};
use crate::messages::{GetCategory, ProcessPayment};
use crate::outbox::{Outbox, OutboxMessage};
use crate::services::{CategoryService, ProductService, PurchaseOrderService};

/// One repository per entity.
#[derive(Clone)]
pub struct Repositories {
    pub categories: Arc<dyn Repository<Category>>,
    pub products: Arc<dyn Repository<Product>>,
    pub users: Arc<dyn Repository<User>>,
    pub orders: Arc<dyn Repository<PurchaseOrder>>,
    pub payments: Arc<dyn Repository<Payment>>,
    pub outbox: Arc<dyn Repository<OutboxMessage>>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            categories: Arc::new(InMemoryRepository::<Category>::new()),
            products: Arc::new(InMemoryRepository::<Product>::new()),
            users: Arc::new(InMemoryRepository::<User>::new()),
            orders: Arc::new(InMemoryRepository::<PurchaseOrder>::new()),
            payments: Arc::new(InMemoryRepository::<Payment>::new()),
            outbox: Arc::new(InMemoryRepository::<OutboxMessage>::new()),
        }
    }
}

/// Everything the handlers depend on.
pub struct AppDeps<B: Broker> {
    pub repositories: Repositories,
    pub mailer: Arc<dyn Mailer>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub queue: Arc<EventQueue<B>>,
    pub notifications: NotificationConfig,
    pub handler_timeout: Option<Duration>,
}

/// Services wired to a shared mediator.
pub struct Application<B: Broker> {
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductService<B>>,
    pub orders: PurchaseOrderService,
    pub outbox: Arc<Outbox<B>>,
    pub mediator: Mediator,
}

/// Registers every application handler:
///
/// | Message | Handler |
/// |---------|---------|
/// | `ProductStockLow` | [`NotifyLowStock`] |
/// | `PurchaseOrderPlaced` | [`ReserveStock`] |
/// | `PaymentApproved` | [`MarkOrderPaid`] |
/// | `ProcessPayment` | [`ProcessPaymentHandler`] |
/// | `GetCategory` | [`GetCategoryHandler`] |
pub fn build_mediator<B: Broker + 'static>(deps: &AppDeps<B>) -> Result<Mediator, MediatorError> {
    let outbox = build_outbox(deps);
    let (categories, products) = catalog_services(deps, &outbox);
    wire(deps, categories, products, outbox)
}

/// Builds the services and the mediator they dispatch through.
pub fn build_application<B: Broker + 'static>(
    deps: &AppDeps<B>,
) -> Result<Application<B>, MediatorError> {
    let outbox = build_outbox(deps);
    let (categories, products) = catalog_services(deps, &outbox);
    let mediator = wire(deps, categories.clone(), products.clone(), outbox.clone())?;
    let repos = &deps.repositories;

    Ok(Application {
        categories,
        products,
        orders: PurchaseOrderService::new(
            repos.orders.clone(),
            repos.users.clone(),
            repos.products.clone(),
            mediator.clone(),
        ),
        outbox,
        mediator,
    })
}

fn build_outbox<B: Broker>(deps: &AppDeps<B>) -> Arc<Outbox<B>> {
    Arc::new(Outbox::new(deps.repositories.outbox.clone(), deps.queue.clone()))
}

fn catalog_services<B: Broker>(
    deps: &AppDeps<B>,
    outbox: &Arc<Outbox<B>>,
) -> (Arc<CategoryService>, Arc<ProductService<B>>) {
    let repos = &deps.repositories;
    let categories = Arc::new(CategoryService::new(repos.categories.clone()));
    let products = Arc::new(ProductService::new(
        repos.products.clone(),
        repos.categories.clone(),
        outbox.clone(),
    ));
    (categories, products)
}

fn wire<B: Broker + 'static>(
    deps: &AppDeps<B>,
    categories: Arc<CategoryService>,
    products: Arc<ProductService<B>>,
    outbox: Arc<Outbox<B>>,
) -> Result<Mediator, MediatorError> {
    let repos = &deps.repositories;
    let mut builder = Mediator::builder();

    if let Some(timeout) = deps.handler_timeout {
        builder.handler_timeout(timeout);
    }

    builder
        .register_event_handler::<Envelope<ProductStockLow>, _>(Arc::new(NotifyLowStock::new(
            deps.mailer.clone(),
            deps.notifications.clone(),
        )))?
        .register_event_handler::<Envelope<PurchaseOrderPlaced>, _>(Arc::new(ReserveStock::new(
            products,
        )))?
        .register_event_handler::<Envelope<PaymentApproved>, _>(Arc::new(MarkOrderPaid::new(
            repos.orders.clone(),
        )))?;

    builder
        .register_command_handler::<ProcessPayment, _>(Arc::new(ProcessPaymentHandler::new(
            repos.orders.clone(),
            repos.payments.clone(),
            deps.gateway.clone(),
            outbox,
        )))?
        .register_query_handler::<GetCategory, _>(Arc::new(GetCategoryHandler::new(categories)))?;

    tracing::info!("Mediator handlers registered");
    Ok(builder.build())
}
