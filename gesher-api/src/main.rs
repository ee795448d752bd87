use gesher_api::{app, state::{AppState, Resiliency}};
use gesher_core::notify::LogNotifier;
use gesher_order::coordinator::FulfillmentCoordinator;
use gesher_order::locks::OrderLocks;
use gesher_order::reconciler::{MockPaymentGateway, PaymentReconciler};
use gesher_store::{DbClient, EventProducer, PgCatalogStore, PgOrderRepository, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gesher_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = gesher_store::app_config::Config::load()?;
    tracing::info!("Starting Gesher API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url).await?;
    db.migrate().await?;

    let redis = Arc::new(RedisClient::new(&config.redis.url).await?);
    let events = Arc::new(EventProducer::new(&config.kafka.brokers)?);

    let orders = Arc::new(PgOrderRepository::new(db.pool.clone()));
    let catalog = Arc::new(PgCatalogStore::new(db.pool.clone()));
    let locks = Arc::new(OrderLocks::new());
    // Gateway stand-in until the production processor is wired in.
    let reconciler = Arc::new(PaymentReconciler::new(Arc::new(MockPaymentGateway)));

    let rules = config.checkout.rules();
    let coordinator = Arc::new(FulfillmentCoordinator::new(
        orders.clone(),
        catalog.clone(),
        reconciler.clone(),
        locks.clone(),
        rules.clone(),
    ));

    let app_state = AppState {
        orders,
        catalog,
        reconciler,
        coordinator,
        notifier: Arc::new(LogNotifier),
        events,
        redis,
        locks,
        rules,
        tiers: config.pricing.tiers(),
        usd_to_ils: config.pricing.usd_to_ils,
        resiliency: Arc::new(Resiliency::new()),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
