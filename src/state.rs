use crate::courier::CourierClient;
use crate::db::{DbPool, OrmConn};
use crate::gateway::GatewayClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub courier: CourierClient,
    pub gateway: GatewayClient,
    /// Hours a pending order stays payable before it expires.
    pub payment_window_hours: i64,
}
