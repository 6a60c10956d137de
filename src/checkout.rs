//! Pure checkout arithmetic: cart resolution against the live catalog,
//! decimal totals, minor-unit conversion and the confirmation breakdown.
//! Everything here is side-effect free; the routes own persistence and
//! gateway calls.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::{
    app_error::AppError,
    cart_store::Cart,
    models::{OrderEntity, OrderItemEntity, ProductEntity},
};

/// A cart entry joined with its live catalog record. Entries whose product
/// no longer exists are dropped during resolution, not reported as errors.
#[derive(Debug)]
pub struct ResolvedLine {
    pub product: ProductEntity,
    pub quantity: i32,
}

pub fn resolve_cart(cart: &Cart, products: Vec<ProductEntity>) -> Vec<ResolvedLine> {
    let mut lines: Vec<ResolvedLine> = products
        .into_iter()
        .filter_map(|product| {
            let quantity = cart.get(&product.id.to_string()).copied().unwrap_or(0);
            (quantity > 0).then(|| ResolvedLine { product, quantity })
        })
        .collect();
    lines.sort_by_key(|line| line.product.id);
    lines
}

/// Live price total at checkout time.
pub fn cart_total(lines: &[ResolvedLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.product.price * Decimal::from(line.quantity))
        .sum()
}

/// Total owed on a persisted order, always recomputed from its items.
pub fn items_total(items: &[OrderItemEntity]) -> Decimal {
    items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum()
}

/// Currency subunits for the gateway amount field (x100, half away from zero).
pub fn to_minor_units(amount: Decimal) -> Result<i64, AppError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::BadRequest("Amount out of range for minor units".into()))
}

/// Amount the gateway is instructed to capture. Derived from the persisted
/// items only; the callback carries no amount field and none is accepted.
pub fn capture_amount_minor(items: &[OrderItemEntity]) -> Result<i64, AppError> {
    to_minor_units(items_total(items))
}

/// What a verified callback should do with the locked order row.
#[derive(Debug, PartialEq)]
pub enum Reconciliation {
    /// Already reconciled; a retried callback captures nothing.
    AlreadyPaid,
    /// Capture this amount at the gateway, then mark the order paid.
    Capture { amount_minor_units: i64 },
}

/// Decides the reconciliation step for an order after signature verification
/// and lookup. The `paid` flag is the double-capture guard: the losing side
/// of two racing callbacks sees it set and captures nothing.
pub fn reconcile(
    order: &OrderEntity,
    items: &[OrderItemEntity],
) -> Result<Reconciliation, AppError> {
    if order.paid {
        return Ok(Reconciliation::AlreadyPaid);
    }
    Ok(Reconciliation::Capture {
        amount_minor_units: capture_amount_minor(items)?,
    })
}

/// Display-only figures for the confirmation view. Never persisted and never
/// fed back into payment amounts.
#[derive(Debug, PartialEq)]
pub struct PaymentBreakdown {
    pub subtotal: Decimal,
    pub surcharge: Decimal,
    pub total: Decimal,
}

pub fn payment_breakdown(subtotal: Decimal) -> PaymentBreakdown {
    let surcharge = (subtotal * Decimal::new(18, 2)).round_dp(2);
    PaymentBreakdown {
        subtotal,
        surcharge,
        total: subtotal + surcharge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn product(id: i32, price: Decimal) -> ProductEntity {
        ProductEntity {
            id,
            product_name: format!("Product {id}"),
            category: String::new(),
            subcategory: String::new(),
            price,
            description: String::new(),
            image_url: String::new(),
        }
    }

    fn item(quantity: i32, price: Decimal) -> OrderItemEntity {
        OrderItemEntity {
            id: 0,
            order_id: 1,
            product_id: None,
            product_name: String::new(),
            quantity,
            price,
        }
    }

    fn cart(entries: &[(&str, i32)]) -> Cart {
        entries
            .iter()
            .map(|(id, qty)| (id.to_string(), *qty))
            .collect::<HashMap<_, _>>()
    }

    #[test]
    fn resolves_against_live_catalog_and_sums_to_minor_units() {
        let cart = cart(&[("3", 2), ("7", 1)]);
        let products = vec![product(7, dec!(99.99)), product(3, dec!(250.00))];

        let lines = resolve_cart(&cart, products);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product.id, 3);

        let total = cart_total(&lines);
        assert_eq!(total, dec!(599.99));
        assert_eq!(to_minor_units(total).unwrap(), 59999);
    }

    #[test]
    fn drops_entries_for_missing_products() {
        let cart = cart(&[("3", 2), ("404", 5)]);
        let lines = resolve_cart(&cart, vec![product(3, dec!(10.00))]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product.id, 3);
    }

    #[test]
    fn drops_non_positive_quantities() {
        let cart = cart(&[("3", 0), ("7", -2)]);
        let products = vec![product(3, dec!(10.00)), product(7, dec!(20.00))];
        assert!(resolve_cart(&cart, products).is_empty());
    }

    #[test]
    fn empty_cart_resolves_to_no_lines() {
        let lines = resolve_cart(&Cart::new(), vec![product(1, dec!(5.00))]);
        assert!(lines.is_empty());
    }

    #[test]
    fn minor_units_round_half_away_from_zero() {
        assert_eq!(to_minor_units(dec!(10.005)).unwrap(), 1001);
        assert_eq!(to_minor_units(dec!(10.004)).unwrap(), 1000);
        assert_eq!(to_minor_units(dec!(0.00)).unwrap(), 0);
    }

    #[test]
    fn capture_amount_derives_from_persisted_items_only() {
        // The callback has no amount parameter; the captured amount is a
        // function of the stored receipt lines and nothing else.
        let items = vec![item(2, dec!(250.00)), item(1, dec!(99.99))];
        assert_eq!(capture_amount_minor(&items).unwrap(), 59999);
    }

    fn order(paid: bool) -> OrderEntity {
        OrderEntity {
            id: 1,
            user_id: 42,
            full_name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            postcode: String::new(),
            province: String::new(),
            paid,
            gateway_order_id: Some("order_ABC123".into()),
            gateway_payment_id: paid.then(|| "pay_XYZ789".into()),
            gateway_signature: paid.then(|| "deadbeef".into()),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn unpaid_order_is_captured_for_the_items_amount() {
        let items = vec![item(2, dec!(250.00)), item(1, dec!(99.99))];
        let action = reconcile(&order(false), &items).unwrap();
        assert_eq!(
            action,
            Reconciliation::Capture {
                amount_minor_units: 59999
            }
        );
    }

    #[test]
    fn paid_order_reconciles_to_a_no_op() {
        // A retried or racing callback for an already-paid order must not
        // trigger a second capture, whatever the items sum to.
        let items = vec![item(2, dec!(250.00)), item(1, dec!(99.99))];
        assert_eq!(
            reconcile(&order(true), &items).unwrap(),
            Reconciliation::AlreadyPaid
        );
        assert_eq!(
            reconcile(&order(true), &[]).unwrap(),
            Reconciliation::AlreadyPaid
        );
    }

    #[test]
    fn breakdown_applies_18_percent_surcharge() {
        let breakdown = payment_breakdown(dec!(1000.00));
        assert_eq!(breakdown.subtotal, dec!(1000.00));
        assert_eq!(breakdown.surcharge, dec!(180.00));
        assert_eq!(breakdown.total, dec!(1180.00));
    }

    #[test]
    fn breakdown_rounds_surcharge_to_cents() {
        let breakdown = payment_breakdown(dec!(99.99));
        assert_eq!(breakdown.surcharge, dec!(18.00));
        assert_eq!(breakdown.total, dec!(117.99));
    }
}
