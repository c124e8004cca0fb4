// 启动时从环境变量收集配置，之后各处只传显式的配置对象

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub database_path: PathBuf,
    pub scanner_api_url: String,
    pub scanner_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("scanhub_web.db"));

        let scanner_api_url = std::env::var("SCANNER_API_URL")
            .unwrap_or_else(|_| "http://localhost:9000".to_string());

        // 后端调用的保守超时，未配置时取 10 秒
        let scanner_timeout = std::env::var("SCANNER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Self {
            bind_address,
            database_path,
            scanner_api_url,
            scanner_timeout,
        }
    }
}
