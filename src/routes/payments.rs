use anyhow::Context;
use axum::{Form, extract::State, response::IntoResponse};
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, DieselError, StdResponse},
    app_state::AppState,
    checkout::{self, PaymentBreakdown, Reconciliation},
    models::{OrderEntity, OrderItemEntity},
    schema::{order_items, orders},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/payments",
        OpenApiRouter::new().routes(utoipa_axum::routes!(payment_callback)),
    )
}

#[derive(Deserialize, ToSchema)]
struct PaymentCallbackReq {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub gateway_signature: String,
}

#[derive(Serialize, ToSchema)]
struct PaymentCallbackRes {
    pub order: OrderEntity,
    pub subtotal: Decimal,
    pub surcharge: Decimal,
    pub total: Decimal,
}

/// Reconcile an asynchronous gateway callback against its order. The
/// signature is checked before anything touches the database; the capture
/// amount is recomputed from the persisted items, never taken from the
/// request; a retried callback for an already-paid order is a no-op.
#[utoipa::path(
    post,
    path = "/callback",
    tags = ["Payments"],
    request_body = PaymentCallbackReq,
    responses(
        (status = 200, description = "Payment reconciled", body = StdResponse<PaymentCallbackRes, String>),
        (status = 400, description = "Signature verification failed"),
        (status = 404, description = "No order matches the gateway order id"),
        (status = 502, description = "Capture failed; order remains unpaid")
    )
)]
async fn payment_callback(
    State(state): State<AppState>,
    Form(body): Form<PaymentCallbackReq>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(err) = state.gateway.verify_signature(
        &body.gateway_order_id,
        &body.gateway_payment_id,
        &body.gateway_signature,
    ) {
        tracing::warn!(
            "Rejected payment callback for gateway order {}: invalid signature",
            body.gateway_order_id
        );
        return Err(err);
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;
    let gateway = state.gateway.clone();

    let (order, breakdown) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                // Row lock serializes racing callbacks for the same order.
                let order: QueryResult<OrderEntity> = orders::table
                    .filter(orders::gateway_order_id.eq(&body.gateway_order_id))
                    .for_update()
                    .get_result(conn)
                    .await;

                let order = match order {
                    Ok(order) => order,
                    Err(DieselError::NotFound) => {
                        tracing::warn!(
                            "Payment callback for unknown gateway order {}",
                            body.gateway_order_id
                        );
                        return Err(AppError::NotFound);
                    }
                    Err(err) => return Err(AppError::Other(err.into())),
                };

                let items: Vec<OrderItemEntity> = order_items::table
                    .filter(order_items::order_id.eq(order.id))
                    .get_results(conn)
                    .await
                    .context("Failed to get order items")?;

                let breakdown = checkout::payment_breakdown(checkout::items_total(&items));

                let amount_minor_units = match checkout::reconcile(&order, &items)? {
                    // Retried callback for an order that is already
                    // reconciled; nothing to capture.
                    Reconciliation::AlreadyPaid => return Ok((order, breakdown)),
                    Reconciliation::Capture { amount_minor_units } => amount_minor_units,
                };

                gateway
                    .capture(&body.gateway_payment_id, amount_minor_units)
                    .await?;

                let order = diesel::update(orders::table.find(order.id))
                    .set((
                        orders::paid.eq(true),
                        orders::gateway_payment_id.eq(&body.gateway_payment_id),
                        orders::gateway_signature.eq(&body.gateway_signature),
                    ))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to mark order paid")?;

                tracing::info!(
                    "Order #{} marked paid ({} minor units captured)",
                    order.id,
                    amount_minor_units
                );

                Ok::<(OrderEntity, PaymentBreakdown), AppError>((order, breakdown))
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(PaymentCallbackRes {
            order,
            subtotal: breakdown.subtotal,
            surcharge: breakdown.surcharge,
            total: breakdown.total,
        }),
        message: Some("Payment reconciled successfully"),
    })
}
