use anyhow::Result;
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use storefront_orderservice::{
    api::gateway::GatewayClient, app_state::AppState, bootstrap, config, db, routes,
};
use tower_http::trace::TraceLayer;
use utoipa_swagger_ui::SwaggerUi;

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database_url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let db_pool = db::connect(&config.database_url).await?;
    let gateway = GatewayClient::from_config(&config.gateway)?;
    let state = AppState { db_pool, gateway };

    let routes = routes::carts::routes_with_openapi()
        .merge(routes::checkout::routes_with_openapi())
        .merge(routes::payments::routes_with_openapi())
        .merge(routes::orders::routes_with_openapi());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("Storefront OrderService API")
        .version("1.0.0")
        .build();
    let swagger_ui = SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi);

    let app = Router::new()
        .merge(routes)
        .merge(swagger_ui)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    bootstrap::serve(app, &config.bind_addr).await
}
