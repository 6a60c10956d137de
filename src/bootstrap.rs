use anyhow::{Context, Result};
use axum::Router;

pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

pub fn init_env() {
    dotenvy::dotenv().ok();
}

pub async fn serve(app: Router, bind_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    tracing::info!("Listening on {}", bind_addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
