//! Session-scoped cart storage behind a narrow get/set/clear interface.
//! The cart is an ephemeral map of product-id string to quantity and is
//! deliberately kept apart from the order ledger.

use std::collections::HashMap;

use anyhow::Context;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{app_error::AppError, models::SessionCartEntity, schema::session_carts};

pub type Cart = HashMap<String, i32>;

pub async fn get_cart(conn: &mut AsyncPgConnection, session_id: &str) -> Result<Cart, AppError> {
    let entry: Option<SessionCartEntity> = session_carts::table
        .find(session_id)
        .first(conn)
        .await
        .optional()
        .context("Failed to load session cart")?;

    match entry {
        Some(entry) => {
            Ok(serde_json::from_value(entry.items).context("Malformed session cart payload")?)
        }
        None => Ok(Cart::new()),
    }
}

pub async fn set_cart(
    conn: &mut AsyncPgConnection,
    session_id: &str,
    cart: &Cart,
) -> Result<(), AppError> {
    let items = serde_json::to_value(cart).context("Failed to serialize session cart")?;

    diesel::insert_into(session_carts::table)
        .values((
            session_carts::session_id.eq(session_id),
            session_carts::items.eq(items.clone()),
        ))
        .on_conflict(session_carts::session_id)
        .do_update()
        .set((
            session_carts::items.eq(items),
            session_carts::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await
        .context("Failed to store session cart")?;

    Ok(())
}

pub async fn clear_cart(conn: &mut AsyncPgConnection, session_id: &str) -> Result<(), AppError> {
    diesel::delete(session_carts::table.find(session_id))
        .execute(conn)
        .await
        .context("Failed to clear session cart")?;

    Ok(())
}
