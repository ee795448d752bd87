pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod events;
pub mod order_repo;
pub mod redis_repo;

pub use catalog_repo::PgCatalogStore;
pub use database::DbClient;
pub use events::EventProducer;
pub use order_repo::PgOrderRepository;
pub use redis_repo::RedisClient;
