use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
    pub data_backend: String,
    pub surreal_endpoint: String,
    pub surreal_ns: String,
    pub surreal_db: String,
    pub surreal_user: String,
    pub surreal_pass: String,
    pub witness_service_url: String,
    pub execution_fact_service_url: String,
    pub upstream_timeout_ms: u64,
    pub list_default_size: usize,
    pub list_max_size: usize,
    pub body_limit_bytes: usize,
    pub consul_enabled: bool,
    pub consul_url: String,
    pub consul_service_name: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("bind_address", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("log_level", "info")?
            .set_default("data_backend", "memory")?
            .set_default("surreal_endpoint", "127.0.0.1:8000")?
            .set_default("surreal_ns", "testimonies")?
            .set_default("surreal_db", "testimonies")?
            .set_default("surreal_user", "root")?
            .set_default("surreal_pass", "root")?
            .set_default("witness_service_url", "http://127.0.0.1:4001/witnesses")?
            .set_default(
                "execution_fact_service_url",
                "http://127.0.0.1:4002/execution-facts",
            )?
            .set_default("upstream_timeout_ms", 2000)?
            .set_default("list_default_size", 100)?
            .set_default("list_max_size", 1000)?
            .set_default("body_limit_bytes", 1024 * 1024)?
            .set_default("consul_enabled", false)?
            .set_default("consul_url", "http://127.0.0.1:8500")?
            .set_default("consul_service_name", "testimonies")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}
