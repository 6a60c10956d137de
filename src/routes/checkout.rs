use anyhow::Context;
use axum::{
    Extension, Json,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    cart_store, checkout,
    middleware::{self, session_id},
    models::{CreateOrderEntity, CreateOrderItemEntity, OrderEntity, ProductEntity},
    schema::{order_items, orders, products},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/checkout",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(initiate_checkout))
            .route_layer(axum::middleware::from_fn(
                middleware::customer_authorization,
            )),
    )
}

#[derive(Deserialize, ToSchema)]
struct CheckoutReq {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postcode: String,
    pub province: String,
}

#[derive(Serialize, ToSchema)]
struct PaymentIntentRes {
    pub order_id: i32,
    pub gateway_order_id: String,
    pub merchant_key: String,
    pub amount_minor_units: i64,
    pub display_amount: Decimal,
    pub currency: String,
    pub callback_url: String,
}

/// Turn the session cart into a persisted order with a pending gateway
/// transaction. Cart entries referencing deleted products are dropped and
/// prices are snapshotted from the live catalog at this moment.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Checkout"],
    security(("bearerAuth" = [])),
    request_body = CheckoutReq,
    responses(
        (status = 200, description = "Checkout initiated", body = StdResponse<PaymentIntentRes, String>),
        (status = 422, description = "Cart resolves to zero items"),
        (status = 502, description = "Gateway rejected the transaction")
    )
)]
async fn initiate_checkout(
    State(state): State<AppState>,
    Extension(user_id): Extension<i32>,
    headers: HeaderMap,
    Json(body): Json<CheckoutReq>,
) -> Result<impl IntoResponse, AppError> {
    let session = session_id(&headers)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = cart_store::get_cart(conn, &session).await?;
    let ids: Vec<i32> = cart.keys().filter_map(|key| key.parse().ok()).collect();
    let catalog: Vec<ProductEntity> = products::table
        .filter(products::id.eq_any(&ids))
        .get_results(conn)
        .await
        .context("Failed to load products")?;

    let lines = checkout::resolve_cart(&cart, catalog);
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let total = checkout::cart_total(&lines);
    let amount_minor_units = checkout::to_minor_units(total)?;

    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        user_id,
                        full_name: body.full_name,
                        email: body.email,
                        phone: body.phone,
                        address: body.address,
                        city: body.city,
                        postcode: body.postcode,
                        province: body.province,
                        paid: false,
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                let items: Vec<CreateOrderItemEntity> = lines
                    .iter()
                    .map(|line| CreateOrderItemEntity {
                        order_id: order.id,
                        product_id: Some(line.product.id),
                        product_name: line.product.product_name.clone(),
                        quantity: line.quantity,
                        price: line.product.price,
                    })
                    .collect();

                diesel::insert_into(order_items::table)
                    .values(items)
                    .execute(conn)
                    .await
                    .context("Failed to create order items")?;

                Ok::<OrderEntity, anyhow::Error>(order)
            })
        })
        .await
        .context("Transaction failed")?;

    // The order is committed before the gateway call. If the gateway refuses,
    // the order stays persisted without a gateway binding and is reconciled
    // out-of-band.
    let gateway_order_id = match state.gateway.create_order(amount_minor_units).await {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!("Order #{} left without a gateway binding: {}", order.id, err);
            return Err(err);
        }
    };

    let order: OrderEntity = diesel::update(orders::table.find(order.id))
        .set(orders::gateway_order_id.eq(&gateway_order_id))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to bind gateway order id")?;

    cart_store::clear_cart(conn, &session).await?;

    tracing::info!(
        "Order #{} created as gateway order {} ({} minor units)",
        order.id,
        gateway_order_id,
        amount_minor_units
    );

    Ok(StdResponse {
        data: Some(PaymentIntentRes {
            order_id: order.id,
            gateway_order_id,
            merchant_key: state.gateway.merchant_key().to_string(),
            amount_minor_units,
            display_amount: total,
            currency: state.gateway.currency().to_string(),
            callback_url: state.gateway.callback_url().to_string(),
        }),
        message: Some("Checkout initiated successfully"),
    })
}
