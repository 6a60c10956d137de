use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

use crate::app_error::AppError;

/// Resolves the authenticated customer from the `x-user-id` header and makes
/// it available to handlers as `Extension<i32>`. Token verification itself is
/// owned by the auth service fronting this one.
pub async fn customer_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let user_id = req
        .headers()
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i32>().ok())
        .ok_or(AppError::Unauthorized)?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

/// Carts are keyed by an opaque session id, not by user account.
pub fn session_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-session-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("Missing x-session-id header".into()))
}
