use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Cache version tag used by the notification worker; bumping it
    // invalidates every previously cached response on activate.
    pub cache_version: String,

    // Directory served at /static and pre-cached by the worker on install
    pub static_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            database_url: config.get("database_url")?,
            base_url: config.get("base_url")?,
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            cache_version: config
                .get("cache_version")
                .unwrap_or_else(|_| "voltpass-v1".to_string()),
            static_dir: config
                .get("static_dir")
                .unwrap_or_else(|_| "web/static".to_string()),
        })
    }
}
