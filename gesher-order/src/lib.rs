pub mod aggregate;
pub mod coordinator;
pub mod item_machine;
pub mod locks;
pub mod memory;
pub mod models;
pub mod reconciler;
pub mod repository;

pub use aggregate::{CheckoutRules, RecomputeOutcome, StatusSuggestion};
pub use coordinator::{BatchSummary, FulfillmentCoordinator, SupplierBatch, SupplierOrderMeta};
pub use item_machine::ItemStateMachine;
pub use locks::OrderLocks;
pub use models::{ItemStatus, Order, OrderItem, OrderStatus, PaymentIntent, PaymentState};
pub use reconciler::PaymentReconciler;
pub use repository::OrderRepository;
