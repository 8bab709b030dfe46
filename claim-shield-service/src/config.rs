use claim_shield::EngineConfig;

pub const DEFAULT_PORT: u16 = 8000;

/// Configuration for the claim analysis service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub engine: EngineConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            port,
            engine: EngineConfig::from_env(),
        }
    }
}
