/// Engine tunables. The seed default keeps repeated identical requests
/// bit-for-bit reproducible when the caller does not pin one; gap and
/// tire-age defaults apply when the caller omits live race state.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub default_seed: u64,
    pub default_gap_s: f64,
    pub default_tire_age_b: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_seed: 42,
            default_gap_s: 2.5,
            default_tire_age_b: 12,
        }
    }
}

/// Binary-level settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub data_path: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8000);
        let data_path = std::env::var("DATA_PATH").ok();
        ServerConfig { port, data_path }
    }
}
