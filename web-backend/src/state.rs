use std::path::Path;
use std::str::FromStr;

use scanhub_core::BackendClient;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub backend: BackendClient,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        // 后端客户端在这里构造一次，base_url 和超时来自配置
        let backend = BackendClient::new(&config.scanner_api_url, config.scanner_timeout)
            .map_err(|e| anyhow::anyhow!("Failed to build backend client: {}", e))?;

        let db = init_db(&config.database_path).await?;

        Ok(Self { db, backend })
    }
}

async fn init_db(db_path: &Path) -> anyhow::Result<Pool<Sqlite>> {
    tracing::info!("Database path: {}", db_path.display());

    // 使用 SqliteConnectOptions 来确保数据库文件可以被创建
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    create_schema(&pool).await?;

    tracing::info!("Database initialized successfully");

    Ok(pool)
}

// 建表。findings / artifacts 由扫描后端写入共享库，面板只读
pub(crate) async fn create_schema(pool: &Pool<Sqlite>) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_status (
            scan_id TEXT PRIMARY KEY,
            company_name TEXT NOT NULL,
            domain TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            progress INTEGER NOT NULL DEFAULT 0,
            current_module TEXT,
            total_modules INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            last_updated_at TEXT NOT NULL,
            completed_at TEXT,
            error_message TEXT
        );

        CREATE TABLE IF NOT EXISTS findings (
            id TEXT PRIMARY KEY,
            scan_id TEXT NOT NULL,
            finding_type TEXT NOT NULL,
            severity TEXT NOT NULL DEFAULT 'INFO',
            description TEXT NOT NULL DEFAULT '',
            recommendation TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS artifacts (
            id TEXT PRIMARY KEY,
            scan_id TEXT NOT NULL,
            module TEXT NOT NULL,
            artifact_type TEXT NOT NULL,
            val_text TEXT NOT NULL DEFAULT '',
            severity TEXT NOT NULL DEFAULT 'INFO',
            is_error INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS security_reports (
            report_id TEXT PRIMARY KEY,
            scan_id TEXT NOT NULL UNIQUE,
            report_url TEXT,
            content TEXT,
            summary TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            generated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| anyhow::anyhow!("Failed to create tables: {}", e))?;

    Ok(())
}

// 指向一个没有监听的端口，测试中的后端调用会快速失败
#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    test_state_with_backend("http://127.0.0.1:9").await
}

#[cfg(test)]
pub(crate) async fn test_state_with_backend(backend_url: &str) -> AppState {
    use std::time::Duration;

    let backend = BackendClient::new(backend_url, Duration::from_millis(200))
        .expect("test backend client");

    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    create_schema(&db).await.expect("schema");

    AppState { db, backend }
}
