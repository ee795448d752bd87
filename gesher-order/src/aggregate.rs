use crate::models::{ItemStatus, Order, OrderStatus};
use crate::reconciler;
use serde::{Deserialize, Serialize};

/// Checkout-time pricing rules. Passed explicitly so tests can vary the
/// configuration per case; never read from ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRules {
    /// VAT percentage. Prices are tax-inclusive, so the tax share of a
    /// subtotal is `subtotal * rate / (100 + rate)`.
    pub tax_rate: f64,
    pub base_shipping_agorot: i64,
    pub free_shipping_enabled: bool,
    pub free_shipping_threshold_agorot: i64,
    pub minimum_subtotal_agorot: i64,
    pub minimum_items: u32,
}

impl Default for CheckoutRules {
    fn default() -> Self {
        Self {
            tax_rate: 17.0,
            base_shipping_agorot: 3_000,
            free_shipping_enabled: true,
            free_shipping_threshold_agorot: 50_000,
            minimum_subtotal_agorot: 0,
            minimum_items: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSuggestion {
    pub suggested: OrderStatus,
    pub message: String,
}

/// What a recomputation pass changed beyond the pricing snapshot itself.
#[derive(Debug, Clone)]
pub struct RecomputeOutcome {
    pub meets_minimum: bool,
    pub suggestion: Option<StatusSuggestion>,
    pub became_ready_to_charge: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("No active item has reached {}", .status.as_str())]
    StatusNotReached { status: OrderStatus },

    #[error("Order-level status {} cannot be set directly", .0.as_str())]
    NotAcceptable(OrderStatus),

    #[error("Order still has active items and cannot be closed as cancelled")]
    ActiveItemsRemain,
}

/// Capture the checkout pricing. Both the original and the adjusted figures
/// start equal; later mutations only ever move the adjusted side down.
pub fn initialize_pricing(order: &mut Order, rules: &CheckoutRules) {
    let subtotal: i64 = order.active_items().map(|i| i.line_total_agorot()).sum();
    let shipping = shipping_for(subtotal, order.active_items().count(), rules);
    let tax = tax_share(subtotal, rules.tax_rate);

    order.pricing.subtotal_agorot = subtotal;
    order.pricing.shipping_agorot = shipping;
    order.pricing.tax_agorot = tax;
    order.pricing.total_agorot = subtotal + shipping;

    order.pricing.adjusted_subtotal_agorot = subtotal;
    order.pricing.adjusted_shipping_agorot = shipping;
    order.pricing.adjusted_tax_agorot = tax;
    order.pricing.adjusted_total_agorot = subtotal + shipping;
    order.pricing.meets_minimum = meets_minimum(subtotal, order.active_items().count(), rules);
    order.touch();
}

/// Recompute derived totals from the current item set, then re-evaluate
/// payment readiness in the same pass. Pure function of the items and rules.
pub fn recompute(order: &mut Order, rules: &CheckoutRules) -> RecomputeOutcome {
    let subtotal: i64 = order.active_items().map(|i| i.line_total_agorot()).sum();
    let active_count = order.active_items().count();
    // Capped at the checkout shipping: losing the free-shipping threshold
    // through a cancellation must not raise the adjusted total above the
    // original.
    let shipping =
        shipping_for(subtotal, active_count, rules).min(order.pricing.shipping_agorot);

    order.pricing.adjusted_subtotal_agorot = subtotal;
    order.pricing.adjusted_tax_agorot = tax_share(subtotal, rules.tax_rate);
    order.pricing.adjusted_shipping_agorot = shipping;
    order.pricing.adjusted_total_agorot = subtotal + shipping;

    let meets = meets_minimum(subtotal, active_count, rules);
    order.pricing.meets_minimum = meets;
    if !meets {
        tracing::warn!(
            "Order {} below configured minimum after recomputation (subtotal {} agorot, {} items)",
            order.order_number,
            subtotal,
            active_count
        );
    }

    let became_ready_to_charge = reconciler::evaluate_readiness(order);
    order.touch();

    RecomputeOutcome {
        meets_minimum: meets,
        suggestion: suggest_status(order),
        became_ready_to_charge,
    }
}

/// The coarsest common status implied by all active items' pipeline
/// position. Advisory only; the operator commits it via `accept_status`.
pub fn suggest_status(order: &Order) -> Option<StatusSuggestion> {
    let lowest = order
        .active_items()
        .filter_map(|i| i.status.pipeline_rank())
        .min();

    let suggested = match lowest {
        Some(rank) => {
            let status = ItemStatus::PIPELINE[rank as usize];
            OrderStatus::from_item(status)
        }
        // Every item is cancelled; the order has nothing left to fulfill.
        None => OrderStatus::Cancelled,
    };

    if suggested == order.status {
        return None;
    }
    // Holding funds is payment-linked, not pipeline progress; a suggestion
    // back to PENDING while the hold is active would be noise.
    if suggested == OrderStatus::Pending && order.status == OrderStatus::PaymentHold {
        return None;
    }

    Some(StatusSuggestion {
        suggested,
        message: match suggested {
            OrderStatus::Cancelled => "All items are cancelled".to_string(),
            _ => format!("All active items are at or beyond {}", suggested.as_str()),
        },
    })
}

/// Operator acceptance of a suggested order-level status. Rejects statuses
/// no active item has reached; never applied automatically.
pub fn accept_status(order: &mut Order, new_status: OrderStatus) -> Result<(), AggregateError> {
    match new_status {
        OrderStatus::PaymentHold => return Err(AggregateError::NotAcceptable(new_status)),
        OrderStatus::Cancelled => {
            if order.active_items().count() > 0 {
                return Err(AggregateError::ActiveItemsRemain);
            }
        }
        _ => {
            let target_rank = new_status
                .pipeline_rank()
                .ok_or(AggregateError::NotAcceptable(new_status))?;
            let reached = order
                .active_items()
                .all(|i| i.status.pipeline_rank().is_some_and(|r| r >= target_rank));
            if !reached || order.active_items().count() == 0 {
                return Err(AggregateError::StatusNotReached { status: new_status });
            }
        }
    }

    order.status = new_status;
    order.touch();
    Ok(())
}

fn tax_share(subtotal_agorot: i64, tax_rate: f64) -> i64 {
    (subtotal_agorot as f64 * tax_rate / (100.0 + tax_rate)).round() as i64
}

fn shipping_for(subtotal_agorot: i64, active_count: usize, rules: &CheckoutRules) -> i64 {
    if active_count == 0 {
        return 0;
    }
    if rules.free_shipping_enabled && subtotal_agorot >= rules.free_shipping_threshold_agorot {
        return 0;
    }
    rules.base_shipping_agorot
}

fn meets_minimum(subtotal_agorot: i64, active_count: usize, rules: &CheckoutRules) -> bool {
    subtotal_agorot >= rules.minimum_subtotal_agorot
        && active_count as u32 >= rules.minimum_items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_machine::ItemStateMachine;
    use crate::models::{Address, OrderItem, PaymentState, VariantDetails};
    use uuid::Uuid;

    fn address() -> Address {
        Address {
            full_name: "Noa Levi".to_string(),
            street: "Herzl 12".to_string(),
            city: "Tel Aviv".to_string(),
            postal_code: "6688101".to_string(),
            country: "IL".to_string(),
            phone: "+972501234567".to_string().into(),
        }
    }

    fn item(price_agorot: i64, quantity: i32) -> OrderItem {
        OrderItem::new(
            Uuid::new_v4(),
            "Item".to_string(),
            "supplier".to_string(),
            price_agorot,
            quantity,
            VariantDetails::default(),
        )
    }

    fn rules() -> CheckoutRules {
        CheckoutRules {
            tax_rate: 17.0,
            base_shipping_agorot: 3_000,
            free_shipping_enabled: false,
            free_shipping_threshold_agorot: 0,
            minimum_subtotal_agorot: 40_000,
            minimum_items: 1,
        }
    }

    #[test]
    fn cancellation_recomputes_totals_and_flags_minimum() {
        // Subtotal 500 ILS, shipping 30 ILS, minimum 400 ILS. Cancelling the
        // 100 x 2 line drops the subtotal to 300 ILS, below the minimum.
        let items = vec![item(10_000, 2), item(30_000, 1)];
        let cancel_id = items[0].id;
        let mut order = Order::new("GS-1001".to_string(), "noa@example.com".to_string(), address(), items);
        initialize_pricing(&mut order, &rules());
        assert_eq!(order.pricing.total_agorot, 53_000);

        ItemStateMachine::cancel(order.item_mut(cancel_id).unwrap(), "out of stock", "admin")
            .unwrap();
        let outcome = recompute(&mut order, &rules());

        assert_eq!(order.pricing.adjusted_subtotal_agorot, 30_000);
        assert_eq!(order.pricing.adjusted_total_agorot, 33_000);
        assert!(!outcome.meets_minimum);
        assert!(order.pricing.adjusted_total_agorot <= order.pricing.total_agorot);
    }

    #[test]
    fn adjusted_total_equals_active_lines_plus_shipping() {
        let items = vec![item(12_500, 1), item(7_300, 3), item(9_900, 2)];
        let cancel_id = items[1].id;
        let mut order = Order::new("GS-1002".to_string(), "noa@example.com".to_string(), address(), items);
        initialize_pricing(&mut order, &rules());

        ItemStateMachine::cancel(order.item_mut(cancel_id).unwrap(), "changed mind", "admin")
            .unwrap();
        recompute(&mut order, &rules());

        let active_sum: i64 = order.active_items().map(|i| i.line_total_agorot()).sum();
        assert_eq!(
            order.pricing.adjusted_total_agorot,
            active_sum + order.pricing.adjusted_shipping_agorot
        );
    }

    #[test]
    fn shipping_is_zero_when_nothing_remains_to_ship() {
        let items = vec![item(10_000, 1)];
        let cancel_id = items[0].id;
        let mut order = Order::new("GS-1003".to_string(), "noa@example.com".to_string(), address(), items);
        initialize_pricing(&mut order, &rules());

        ItemStateMachine::cancel(order.item_mut(cancel_id).unwrap(), "unavailable", "admin")
            .unwrap();
        recompute(&mut order, &rules());

        assert_eq!(order.pricing.adjusted_shipping_agorot, 0);
        assert_eq!(order.pricing.adjusted_total_agorot, 0);
    }

    #[test]
    fn free_shipping_threshold_zeroes_shipping() {
        let mut free_rules = rules();
        free_rules.free_shipping_enabled = true;
        free_rules.free_shipping_threshold_agorot = 40_000;

        let mut order = Order::new(
            "GS-1004".to_string(),
            "noa@example.com".to_string(),
            address(),
            vec![item(50_000, 1)],
        );
        initialize_pricing(&mut order, &free_rules);

        assert_eq!(order.pricing.shipping_agorot, 0);
        assert_eq!(order.pricing.total_agorot, 50_000);
    }

    #[test]
    fn losing_free_shipping_cannot_raise_the_adjusted_total() {
        let mut free_rules = rules();
        free_rules.free_shipping_enabled = true;
        free_rules.free_shipping_threshold_agorot = 50_000;

        // Qualified for free shipping at checkout; the cancellation drops
        // the subtotal below the threshold.
        let items = vec![item(45_000, 1), item(5_000, 1)];
        let cancel_id = items[1].id;
        let mut order = Order::new("GS-1010".to_string(), "noa@example.com".to_string(), address(), items);
        initialize_pricing(&mut order, &free_rules);
        assert_eq!(order.pricing.shipping_agorot, 0);

        ItemStateMachine::cancel(order.item_mut(cancel_id).unwrap(), "changed mind", "admin")
            .unwrap();
        recompute(&mut order, &free_rules);

        assert_eq!(order.pricing.adjusted_shipping_agorot, 0);
        assert!(order.pricing.adjusted_total_agorot <= order.pricing.total_agorot);
    }

    #[test]
    fn tax_share_is_vat_inclusive() {
        // 117 ILS at 17% VAT contains exactly 17 ILS of tax.
        assert_eq!(tax_share(11_700, 17.0), 1_700);
    }

    #[test]
    fn suggestion_follows_slowest_active_item() {
        let items = vec![item(10_000, 1), item(20_000, 1)];
        let (a, b) = (items[0].id, items[1].id);
        let mut order = Order::new("GS-1005".to_string(), "noa@example.com".to_string(), address(), items);
        initialize_pricing(&mut order, &rules());

        ItemStateMachine::transition(
            order.item_mut(a).unwrap(),
            ItemStatus::ShippedToIsrael,
            None,
            "admin",
        )
        .unwrap();
        ItemStateMachine::transition(
            order.item_mut(b).unwrap(),
            ItemStatus::CustomsIsrael,
            None,
            "admin",
        )
        .unwrap();

        let suggestion = suggest_status(&order).unwrap();
        assert_eq!(suggestion.suggested, OrderStatus::ShippedToIsrael);

        // Suggestions are advisory; order status is untouched.
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn suggestion_is_cancelled_when_no_items_remain() {
        let items = vec![item(10_000, 1)];
        let id = items[0].id;
        let mut order = Order::new("GS-1006".to_string(), "noa@example.com".to_string(), address(), items);
        initialize_pricing(&mut order, &rules());

        ItemStateMachine::cancel(order.item_mut(id).unwrap(), "unavailable", "admin").unwrap();
        let suggestion = suggest_status(&order).unwrap();
        assert_eq!(suggestion.suggested, OrderStatus::Cancelled);
    }

    #[test]
    fn accept_status_requires_items_to_have_reached_it() {
        let items = vec![item(10_000, 1), item(20_000, 1)];
        let a = items[0].id;
        let mut order = Order::new("GS-1007".to_string(), "noa@example.com".to_string(), address(), items);
        initialize_pricing(&mut order, &rules());

        ItemStateMachine::transition(
            order.item_mut(a).unwrap(),
            ItemStatus::ShippedToIsrael,
            None,
            "admin",
        )
        .unwrap();

        // Second item is still PENDING.
        let err = accept_status(&mut order, OrderStatus::ShippedToIsrael).unwrap_err();
        assert!(matches!(err, AggregateError::StatusNotReached { .. }));

        ItemStateMachine::transition(
            order.item_mut(order.items[1].id).unwrap(),
            ItemStatus::ShippedToIsrael,
            None,
            "admin",
        )
        .unwrap();
        accept_status(&mut order, OrderStatus::ShippedToIsrael).unwrap();
        assert_eq!(order.status, OrderStatus::ShippedToIsrael);
    }

    #[test]
    fn accept_cancelled_requires_no_active_items() {
        let items = vec![item(10_000, 1)];
        let id = items[0].id;
        let mut order = Order::new("GS-1008".to_string(), "noa@example.com".to_string(), address(), items);
        initialize_pricing(&mut order, &rules());

        let err = accept_status(&mut order, OrderStatus::Cancelled).unwrap_err();
        assert!(matches!(err, AggregateError::ActiveItemsRemain));

        ItemStateMachine::cancel(order.item_mut(id).unwrap(), "unavailable", "admin").unwrap();
        accept_status(&mut order, OrderStatus::Cancelled).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn recompute_flips_hold_to_ready_when_no_item_is_pending() {
        let items = vec![item(10_000, 1), item(20_000, 1)];
        let (a, b) = (items[0].id, items[1].id);
        let mut order = Order::new("GS-1009".to_string(), "noa@example.com".to_string(), address(), items);
        initialize_pricing(&mut order, &rules());
        order.payment.state = PaymentState::Hold;
        order.payment.hold_agorot = order.pricing.total_agorot;

        ItemStateMachine::mark_ordered_from_supplier(
            order.item_mut(a).unwrap(),
            "SUP-1",
            None,
            "admin",
        )
        .unwrap();
        let outcome = recompute(&mut order, &rules());
        assert!(!outcome.became_ready_to_charge);
        assert_eq!(order.payment.state, PaymentState::Hold);

        ItemStateMachine::mark_ordered_from_supplier(
            order.item_mut(b).unwrap(),
            "SUP-2",
            None,
            "admin",
        )
        .unwrap();
        let outcome = recompute(&mut order, &rules());
        assert!(outcome.became_ready_to_charge);
        assert_eq!(order.payment.state, PaymentState::ReadyToCharge);
    }
}
