use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, QueryResult};
use diesel_async::RunQueryDsl;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, DieselError, StdResponse},
    app_state::AppState,
    cart_store::{self, Cart},
    checkout,
    middleware::session_id,
    models::ProductEntity,
    schema::products,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/cart",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_cart))
            .routes(utoipa_axum::routes!(update_cart))
            .routes(utoipa_axum::routes!(add_cart_item))
            .routes(utoipa_axum::routes!(remove_cart_item)),
    )
}

#[derive(Serialize, ToSchema)]
struct CartLineRes {
    pub product: ProductEntity,
    pub quantity: i32,
    pub subtotal: Decimal,
}

#[derive(Serialize, ToSchema)]
struct GetCartRes {
    pub cart_items: Vec<CartLineRes>,
    pub cart_total: Decimal,
}

/// Fetch the session cart resolved against the live catalog. Entries whose
/// product has since been deleted are not shown.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Cart"],
    responses(
        (status = 200, description = "Get cart successfully", body = StdResponse<GetCartRes, String>)
    )
)]
async fn get_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
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
    let cart_total = checkout::cart_total(&lines);
    let cart_items = lines
        .into_iter()
        .map(|line| CartLineRes {
            subtotal: line.product.price * Decimal::from(line.quantity),
            quantity: line.quantity,
            product: line.product,
        })
        .collect();

    Ok(StdResponse {
        data: Some(GetCartRes {
            cart_items,
            cart_total,
        }),
        message: Some("Get cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct AddCartItemReq {
    pub product_id: i32,
}

#[derive(Serialize, ToSchema)]
struct AddCartItemRes {
    pub product_name: String,
    pub price: Decimal,
    pub image_url: String,
    pub quantity: i32,
}

/// Add one unit of a product to the session cart.
#[utoipa::path(
    post,
    path = "/items",
    tags = ["Cart"],
    request_body = AddCartItemReq,
    responses(
        (status = 200, description = "Added item to cart", body = StdResponse<AddCartItemRes, String>),
        (status = 404, description = "Product not found")
    )
)]
async fn add_cart_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AddCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let session = session_id(&headers)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: QueryResult<ProductEntity> =
        products::table.find(body.product_id).get_result(conn).await;

    let product = match product {
        Ok(product) => product,
        Err(DieselError::NotFound) => return Err(AppError::NotFound),
        Err(err) => return Err(AppError::Other(err.into())),
    };

    let mut cart = cart_store::get_cart(conn, &session).await?;
    let quantity = cart
        .entry(product.id.to_string())
        .and_modify(|qty| *qty += 1)
        .or_insert(1);
    let quantity = *quantity;
    cart_store::set_cart(conn, &session, &cart).await?;

    Ok(StdResponse {
        data: Some(AddCartItemRes {
            product_name: product.product_name,
            price: product.price,
            image_url: product.image_url,
            quantity,
        }),
        message: Some("Added item to cart"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateCartReqItem {
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Deserialize, ToSchema)]
struct UpdateCartReq {
    pub cart_items: Vec<UpdateCartReqItem>,
}

/// Set quantities for cart entries. A quantity of zero or less removes the
/// entry; entries not mentioned are left untouched.
#[utoipa::path(
    put,
    path = "/",
    tags = ["Cart"],
    request_body = UpdateCartReq,
    responses(
        (status = 200, description = "Updated cart", body = StdResponse<Cart, String>)
    )
)]
async fn update_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UpdateCartReq>,
) -> Result<impl IntoResponse, AppError> {
    let session = session_id(&headers)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut cart = cart_store::get_cart(conn, &session).await?;
    for item in body.cart_items {
        if item.quantity > 0 {
            cart.insert(item.product_id.to_string(), item.quantity);
        } else {
            cart.remove(&item.product_id.to_string());
        }
    }
    cart_store::set_cart(conn, &session, &cart).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Updated cart"),
    })
}

/// Remove a product from the session cart.
#[utoipa::path(
    delete,
    path = "/items/{product_id}",
    tags = ["Cart"],
    params(
        ("product_id" = i32, Path, description = "Product to remove from the cart")
    ),
    responses(
        (status = 200, description = "Removed item from cart", body = StdResponse<Cart, String>)
    )
)]
async fn remove_cart_item(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let session = session_id(&headers)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut cart = cart_store::get_cart(conn, &session).await?;
    cart.remove(&product_id.to_string());
    cart_store::set_cart(conn, &session, &cart).await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Removed item from cart"),
    })
}
