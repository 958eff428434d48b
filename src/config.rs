use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub courier_base_url: String,
    pub courier_api_key: String,
    pub gateway_base_url: String,
    pub gateway_server_key: String,
    /// Hours a pending order stays payable before it expires.
    pub payment_window_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let courier_base_url =
            env::var("COURIER_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:9090".to_string());
        let courier_api_key = env::var("COURIER_API_KEY").unwrap_or_default();
        let gateway_base_url =
            env::var("GATEWAY_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:9191".to_string());
        let gateway_server_key = env::var("GATEWAY_SERVER_KEY").unwrap_or_default();
        let payment_window_hours = env::var("PAYMENT_WINDOW_HOURS")
            .ok()
            .and_then(|p| p.parse::<i64>().ok())
            .unwrap_or(24);
        Ok(Self {
            database_url,
            host,
            port,
            courier_base_url,
            courier_api_key,
            gateway_base_url,
            gateway_server_key,
            payment_window_hours,
        })
    }
}
