use std::env;

#[derive(Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub sqlite_path: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_header: String,
    pub bcrypt_cost: u32,
    pub cors_origin: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(38321);

        let sqlite_path = env::var("SQLITE_PATH").unwrap_or_else(|_| "/opt/eventfeed/data.sqlite".to_string());
        let database_url = env::var("DATABASE_URL").ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| "change-me-eventfeed-secret".to_string());

        let token_header = env::var("TOKEN_HEADER").unwrap_or_else(|_| "token".to_string());

        let bcrypt_cost = env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .map(clamp_cost)
            .unwrap_or(bcrypt::DEFAULT_COST);

        let cors_origin = env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string());

        Self {
            server_port,
            sqlite_path,
            database_url,
            jwt_secret,
            token_header,
            bcrypt_cost,
            cors_origin,
        }
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let path = self.sqlite_path.trim();
        if path.starts_with("sqlite:") || path.starts_with("file:") {
            return path.to_string();
        }
        format!("sqlite://{}", path)
    }
}

/// bcrypt rejects costs outside 4..=31.
pub fn clamp_cost(cost: u32) -> u32 {
    cost.clamp(crate::credential::MIN_COST, 31)
}

#[cfg(test)]
impl AppConfig {
    pub fn for_test() -> Self {
        Self {
            server_port: 0,
            sqlite_path: "sqlite::memory:".to_string(),
            database_url: None,
            jwt_secret: "test-secret".to_string(),
            token_header: "token".to_string(),
            bcrypt_cost: crate::credential::MIN_COST,
            cors_origin: "*".to_string(),
        }
    }
}
