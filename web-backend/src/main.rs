use actix_cors::Cors;
use actix_files::Files;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use anyhow::Result;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod state;
mod store;

use config::AppConfig;
use state::AppState;

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": "1.0.0"
    }))
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanhub_web=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 初始化配置与状态
    let config = AppConfig::from_env();
    let state = AppState::new(&config).await?;

    // 启动服务器
    let bind_address = config.bind_address.clone();
    tracing::info!("ScanHub web server listening on {}", bind_address);
    tracing::info!("Scanner backend: {}", config.scanner_api_url);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            // API 路由
            .service(api::scan_routes())
            .service(api::report_routes())
            // 健康检查
            .route("/health", web::get().to(health_check))
            // 静态文件服务
            .service(Files::new("/", "./dist").index_file("index.html"))
    })
    .bind(bind_address.as_str())?
    .run()
    .await?;

    Ok(())
}
