//! Shipping a processing order: carrier label, status change, customer notification.

use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::domain::aggregates::{Customer, Order, OrderError, OrderStatus};
use crate::domain::value_objects::Grams;
use crate::error::{AppError, AppResult};
use crate::integrations::{EmailPayload, EmailReceipt, LabelRequest, ShippingLabel};
use crate::pricing::{PricingError, ServiceTier};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ShipmentResult {
    pub label: ShippingLabel,
    pub order: Order,
    /// `None` when the notification could not be sent; the shipment stands.
    pub notification: Option<EmailReceipt>,
}

pub async fn ship_order(state: &AppState, order_id: Uuid, service: ServiceTier) -> AppResult<ShipmentResult> {
    let order = db::orders::get(&state.db, order_id).await?.ok_or_else(|| AppError::not_found("Order"))?;
    if !order.status().can_transition_to(OrderStatus::Shipped) {
        return Err(OrderError::InvalidTransition { from: order.status(), to: OrderStatus::Shipped }.into());
    }
    let customer = db::customers::find(&state.db, order.customer_id()).await?.ok_or_else(|| AppError::not_found("Customer"))?;

    let mut weight = Grams::default();
    for item in order.items() {
        let product = db::products::get(&state.db, item.product_id).await?;
        let unit = product
            .as_ref()
            .and_then(|p| p.weight())
            .ok_or_else(|| PricingError::IncompleteProductData { product: item.product_name.clone(), field: "weight" })?;
        weight = weight + unit.times(item.quantity);
    }

    let request = LabelRequest {
        order_number: order.order_number().to_string(),
        recipient_name: customer.full_name(),
        recipient_email: customer.email.clone(),
        address: customer.address.clone(),
        city: customer.city.clone(),
        postal_code: customer.postal_code.clone(),
        country: order.destination().clone(),
        weight,
        dimensions: None,
        declared_value: order.revenue(),
        service,
    };
    let label = state.integrations.carrier.create_label(&request).await?;

    // The status may have moved while the carrier was called; the write re-checks it.
    let mut tx = state.db.begin().await?;
    let mut order = db::orders::find(&mut tx, order_id).await?.ok_or_else(|| AppError::not_found("Order"))?;
    if let Err(e) = order.ship(label.tracking_number.clone()) {
        tracing::error!(order_id = %order_id, tracking = %label.tracking_number, "label bought but order can no longer ship");
        return Err(e.into());
    }
    db::orders::update(&mut tx, &order).await?;
    tx.commit().await?;
    tracing::info!(order_id = %order_id, tracking = %label.tracking_number, "label created and order shipped");
    state.events.publish(order.take_events()).await;

    let notification = match state.integrations.mailer.send_email(&shipping_notification(&customer, &order, &label)).await {
        Ok(receipt) => Some(receipt),
        Err(e) => {
            tracing::warn!(order_id = %order_id, error = %e, "shipping notification failed");
            None
        }
    };
    Ok(ShipmentResult { label, order, notification })
}

fn shipping_notification(customer: &Customer, order: &Order, label: &ShippingLabel) -> EmailPayload {
    let text_body = format!(
        "Hello {},\n\nYour order {} is on its way with {}.\nTracking number: {}\nExpected delivery: {}\n\nThank you for your order.",
        customer.first_name, order.order_number(), label.carrier, label.tracking_number, label.estimated_delivery,
    );
    let html_body = format!(
        "<p>Hello {},</p><p>Your order <strong>{}</strong> is on its way with {}.</p>\
         <p>Tracking number: <strong>{}</strong><br>Expected delivery: {}</p><p>Thank you for your order.</p>",
        customer.first_name, order.order_number(), label.carrier, label.tracking_number, label.estimated_delivery,
    );
    EmailPayload {
        to: customer.email.clone(),
        subject: format!("Your order {} has shipped", order.order_number()),
        text_body,
        html_body: Some(html_body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::orders::tests::{customer, product};
    use crate::services::orders::{place, transition, ItemRequest, PlaceOrder};
    use crate::state::tests::test_state;

    async fn pending_order(state: &AppState) -> Order {
        let c = customer(state, "anna@example.nl").await;
        let p = product(state, "MUG-1", 2000, Some(800), Some(750), 5).await;
        let cmd = PlaceOrder {
            customer_id: c.id, order_number: Some("ORD-00000042".into()), destination: None,
            items: vec![ItemRequest { product_id: p.id(), quantity: 2 }], notes: None,
        };
        place(state, cmd).await.unwrap()
    }

    #[tokio::test]
    async fn test_label_ships_processing_order() {
        let state = test_state().await;
        let order = pending_order(&state).await;
        transition(&state, order.id(), OrderStatus::Processing, None).await.unwrap();

        let result = ship_order(&state, order.id(), ServiceTier::Standard).await.unwrap();
        assert_eq!(result.label.tracking_number, "3SMOCKORD00000042");
        assert_eq!(result.order.status(), OrderStatus::Shipped);
        assert_eq!(result.order.tracking_number(), Some("3SMOCKORD00000042"));
        assert!(result.notification.is_some_and(|n| n.mocked));
    }

    #[tokio::test]
    async fn test_label_requires_processing() {
        let state = test_state().await;
        let order = pending_order(&state).await;
        let err = ship_order(&state, order.id(), ServiceTier::Standard).await.unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
        assert_eq!(ship_order(&state, Uuid::new_v4(), ServiceTier::Standard).await.unwrap_err().code(), "not_found");
    }

    #[tokio::test]
    async fn test_shipped_order_keeps_first_label() {
        let state = test_state().await;
        let order = pending_order(&state).await;
        transition(&state, order.id(), OrderStatus::Processing, None).await.unwrap();
        ship_order(&state, order.id(), ServiceTier::Standard).await.unwrap();

        let err = ship_order(&state, order.id(), ServiceTier::Express).await.unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
        let stored = db::orders::get(&state.db, order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Shipped);
        assert_eq!(stored.tracking_number(), Some("3SMOCKORD00000042"));
    }
}
