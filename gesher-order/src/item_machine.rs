use crate::models::{AuditEntry, Cancellation, ItemStatus, OrderItem, SupplierOrder};
use chrono::Utc;
use uuid::Uuid;

/// Validates and executes per-item lifecycle transitions. Forward skips are
/// allowed (manual correction of missed scans); backward moves are not, and
/// `Cancelled` is only reachable through `cancel`.
pub struct ItemStateMachine;

#[derive(Debug, thiserror::Error)]
pub enum ItemStateError {
    #[error("Invalid transition from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition {
        from: ItemStatus,
        to: ItemStatus,
        valid: Vec<ItemStatus>,
    },

    #[error("Item already cancelled: {0}")]
    AlreadyCancelled(Uuid),

    #[error("Item already delivered: {0}")]
    AlreadyDelivered(Uuid),

    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Supplier order can only be recorded on a PENDING item, current status is {}", .status.as_str())]
    NotPending { status: ItemStatus },

    #[error("Item already ordered under supplier order {existing}")]
    SupplierOrderConflict { existing: String },
}

/// Whether a supplier-order submission changed anything or was a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Applied,
    AlreadyRecorded,
}

impl ItemStateMachine {
    /// Statuses reachable from the item's current state via `transition`.
    /// Never contains the current status or `Cancelled`.
    pub fn valid_transitions(item: &OrderItem) -> Vec<ItemStatus> {
        let rank = match item.status.pipeline_rank() {
            Some(rank) if item.status != ItemStatus::Delivered => rank,
            _ => return Vec::new(),
        };

        ItemStatus::PIPELINE
            .iter()
            .copied()
            .filter(|s| s.pipeline_rank().is_some_and(|r| r > rank))
            .collect()
    }

    /// Move an item forward through the pipeline. Appends an audit entry;
    /// never mutates pricing.
    pub fn transition(
        item: &mut OrderItem,
        to: ItemStatus,
        notes: Option<String>,
        actor: &str,
    ) -> Result<(), ItemStateError> {
        if item.is_cancelled() {
            return Err(ItemStateError::AlreadyCancelled(item.id));
        }
        if item.status == ItemStatus::Delivered {
            return Err(ItemStateError::AlreadyDelivered(item.id));
        }

        let from_rank = item
            .status
            .pipeline_rank()
            .ok_or(ItemStateError::AlreadyCancelled(item.id))?;
        let forward = to
            .pipeline_rank()
            .is_some_and(|to_rank| to_rank > from_rank);

        if !forward {
            return Err(ItemStateError::InvalidTransition {
                from: item.status,
                to,
                valid: Self::valid_transitions(item),
            });
        }

        item.audit.push(AuditEntry {
            from: item.status,
            to,
            notes,
            actor: actor.to_string(),
            at: Utc::now(),
        });
        item.status = to;
        Ok(())
    }

    /// Cancel the whole line and compute the refund owed for it. Terminal
    /// items are protected; the call has no side effects on failure.
    pub fn cancel(item: &mut OrderItem, reason: &str, actor: &str) -> Result<i64, ItemStateError> {
        if item.is_cancelled() {
            return Err(ItemStateError::AlreadyCancelled(item.id));
        }
        if item.status == ItemStatus::Delivered {
            return Err(ItemStateError::AlreadyDelivered(item.id));
        }

        let refund_agorot = item.line_total_agorot();

        item.audit.push(AuditEntry {
            from: item.status,
            to: ItemStatus::Cancelled,
            notes: Some(reason.to_string()),
            actor: actor.to_string(),
            at: Utc::now(),
        });
        item.cancellation = Some(Cancellation {
            reason: reason.to_string(),
            refund_agorot,
            cancelled_at: Utc::now(),
        });
        item.status = ItemStatus::Cancelled;

        Ok(refund_agorot)
    }

    /// Record that the item was ordered from its supplier. Valid only from
    /// `Pending`; re-submitting the same supplier order number is a no-op.
    pub fn mark_ordered_from_supplier(
        item: &mut OrderItem,
        supplier_order_number: &str,
        tracking_number: Option<String>,
        actor: &str,
    ) -> Result<MarkOutcome, ItemStateError> {
        if let Some(existing) = &item.supplier_order {
            if existing.supplier_order_number == supplier_order_number {
                return Ok(MarkOutcome::AlreadyRecorded);
            }
            return Err(ItemStateError::SupplierOrderConflict {
                existing: existing.supplier_order_number.clone(),
            });
        }

        if item.is_cancelled() {
            return Err(ItemStateError::AlreadyCancelled(item.id));
        }
        if item.status != ItemStatus::Pending {
            return Err(ItemStateError::NotPending {
                status: item.status,
            });
        }

        item.audit.push(AuditEntry {
            from: ItemStatus::Pending,
            to: ItemStatus::Ordered,
            notes: Some(format!("supplier order {}", supplier_order_number)),
            actor: actor.to_string(),
            at: Utc::now(),
        });
        item.supplier_order = Some(SupplierOrder {
            supplier_order_number: supplier_order_number.to_string(),
            tracking_number,
            ordered_at: Utc::now(),
        });
        item.status = ItemStatus::Ordered;

        Ok(MarkOutcome::Applied)
    }
}
