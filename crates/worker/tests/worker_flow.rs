//! The worker delivering application events queued by the services.

use std::sync::Arc;
use std::time::Duration;

use application::{
    AppDeps, Application, InMemoryMailer, InMemoryPaymentGateway, NotificationConfig, OrderLine,
    Repositories, build_application,
};
use common::AggregateId;
use domain::{
    Dimensions, Entity, Money, NewProduct, PaymentApproved, PaymentMethod, Product,
    PurchaseOrderStatus, Repository, User,
};
use event_queue::{EventQueue, InMemoryBroker, JobState, QueueConfig};
use mediator::Envelope;
use worker::EventWorker;

struct Harness {
    app: Application<InMemoryBroker>,
    repos: Repositories,
    broker: InMemoryBroker,
    queue: Arc<EventQueue<InMemoryBroker>>,
    mailer: InMemoryMailer,
    worker: EventWorker<InMemoryBroker>,
}

fn harness() -> Harness {
    let repos = Repositories::in_memory();
    let broker = InMemoryBroker::new();
    let mailer = InMemoryMailer::new();
    let config = QueueConfig {
        attempts: 2,
        delay_ms: 0,
        ..QueueConfig::default()
    };
    let queue = Arc::new(EventQueue::new(broker.clone(), &config));

    let app = build_application(&AppDeps {
        repositories: repos.clone(),
        mailer: Arc::new(mailer.clone()),
        gateway: Arc::new(InMemoryPaymentGateway::new()),
        queue: queue.clone(),
        notifications: NotificationConfig::default(),
        handler_timeout: Some(Duration::from_secs(1)),
    })
    .unwrap();
    let worker = EventWorker::new(broker.clone(), app.mediator.clone(), Duration::from_millis(10));

    Harness {
        app,
        repos,
        broker,
        queue,
        mailer,
        worker,
    }
}

async fn seed(h: &Harness, stock: u32, min_stock: u32) -> (User, Product) {
    let user = User::new("Ana", "ana@example.com", "111.444.777-35").unwrap();
    h.repos.users.add(user.clone()).await.unwrap();

    let category = h.app.categories.create("Office", 7).await.unwrap();
    let product = h
        .app
        .products
        .create(NewProduct {
            name: "Chair".into(),
            description: "Ergonomic chair".into(),
            price: Money::from_cents(40000),
            stock,
            min_stock,
            category_id: category.id(),
            dimensions: Dimensions::new(60.0, 110.0, 60.0, 12.5),
        })
        .await
        .unwrap();

    (user, product)
}

async fn order(h: &Harness, user: &User, product: &Product, quantity: u32) -> AggregateId {
    h.app
        .orders
        .place_order(
            user.id(),
            &[OrderLine {
                product_id: product.id(),
                quantity,
            }],
        )
        .await
        .unwrap()
        .id()
}

#[tokio::test]
async fn worker_sends_low_stock_email() {
    let h = harness();
    let (user, product) = seed(&h, 3, 1).await;
    order(&h, &user, &product, 2).await;

    assert!(h.worker.run_once().await.unwrap());
    assert!(!h.worker.run_once().await.unwrap());

    let sent = h.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Low stock: Chair");
    assert_eq!(sent[0].to, NotificationConfig::default().stock_alert_to);
}

#[tokio::test]
async fn mail_failure_still_completes_job() {
    let h = harness();
    let (user, product) = seed(&h, 3, 1).await;
    h.mailer.set_fail_on_send(Some("smtp down")).await;
    order(&h, &user, &product, 3).await;

    assert!(h.worker.run_once().await.unwrap());

    let jobs = h.broker.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].state, JobState::Completed);
    assert_eq!(h.mailer.sent_count().await, 0);
}

#[tokio::test]
async fn worker_marks_order_paid() {
    let h = harness();
    let (user, product) = seed(&h, 50, 1).await;
    let order_id = order(&h, &user, &product, 1).await;

    h.app.orders.pay(order_id, PaymentMethod::BankSlip).await.unwrap();
    assert_eq!(
        h.app.orders.get(order_id).await.unwrap().status(),
        PurchaseOrderStatus::Pending
    );

    assert!(h.worker.run_once().await.unwrap());
    assert_eq!(
        h.app.orders.get(order_id).await.unwrap().status(),
        PurchaseOrderStatus::Paid
    );
}

#[tokio::test]
async fn approval_for_unknown_order_is_retried_then_parked() {
    let h = harness();
    let order_id = AggregateId::new();
    let id = h
        .queue
        .enqueue(&Envelope::new(
            order_id.to_string(),
            PaymentApproved {
                payment_id: AggregateId::new(),
                order_id,
                amount: Money::from_cents(100),
                transaction_id: "TX-9999".into(),
            },
        ))
        .await
        .unwrap();

    assert!(h.worker.run_once().await.unwrap());
    let job = h.broker.job(id).await.unwrap();
    assert_eq!(job.state, JobState::Waiting);
    assert_eq!(job.attempts_made, 1);

    assert!(h.worker.run_once().await.unwrap());
    let job = h.broker.job(id).await.unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert!(job.last_error.unwrap().contains("PurchaseOrder not found"));
}

#[tokio::test]
async fn run_stops_after_shutdown() {
    let h = harness();
    let (user, product) = seed(&h, 2, 1).await;
    order(&h, &user, &product, 1).await;

    tokio::time::timeout(
        Duration::from_secs(5),
        h.worker.run(async {
            while h.mailer.sent_count().await == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }),
    )
    .await
    .unwrap();

    assert_eq!(h.mailer.sent_count().await, 1);
    assert_eq!(h.broker.jobs().await[0].state, JobState::Completed);
}
