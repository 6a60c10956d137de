use crate::{api::gateway::GatewayClient, db::DbPool};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub gateway: GatewayClient,
}
