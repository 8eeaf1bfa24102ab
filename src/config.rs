use std::env;

use crate::tracking::store::DEFAULT_PAGE_SIZE;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub carrier_api_base_url: String,
    pub default_page_size: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        let carrier_api_base_url = env::var("CARRIER_API_BASE_URL")
            .map_err(|_| "CARRIER_API_BASE_URL must be set".to_string())?;

        let listen_addr =
            env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let default_page_size = match env::var("DEFAULT_PAGE_SIZE") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|_| format!("DEFAULT_PAGE_SIZE must be a positive integer, got '{raw}'"))?,
            Err(_) => DEFAULT_PAGE_SIZE,
        };
        if default_page_size == 0 {
            return Err("DEFAULT_PAGE_SIZE must be at least 1".to_string());
        }

        Ok(ServerConfig {
            listen_addr,
            carrier_api_base_url,
            default_page_size,
        })
    }
}
