use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use scanhub_core::{
    max_severity, merge_status, module_statuses, sort_findings, summarize, ScanDetails,
    ScanStatus, ScanStatusRecord, StoredReport, SECURITY_MODULES,
};

use crate::state::AppState;
use crate::store;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScanRequest {
    pub company_name: String,
    pub domain: String,
}

#[derive(Deserialize)]
pub struct GenerateReportRequest {
    #[serde(default)]
    pub tags: Vec<String>,
}

pub fn configure_scan_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_scans))
        .route("", web::post().to(create_scan))
        .route("/{scan_id}", web::get().to(get_scan))
        .route("/{scan_id}/rerun", web::post().to(rerun_scan))
        .route("/{scan_id}/status", web::get().to(get_scan_status))
        .route("/{scan_id}/artifacts", web::get().to(get_artifacts))
        .route("/{scan_id}/report", web::post().to(generate_report))
        .route("/{scan_id}/report/view", web::get().to(view_report));
}

/// 扫描列表：状态行按 created_at 降序，和发现项聚合成摘要
pub async fn list_scans(state: web::Data<AppState>) -> impl Responder {
    let statuses = match store::list_scan_statuses(&state.db, 100).await {
        Ok(statuses) => statuses,
        Err(e) => {
            tracing::error!("Failed to fetch scan statuses: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to fetch scans",
                "details": e.to_string()
            }));
        }
    };

    // 发现项取不到时列表仍然返回，摘要按零条发现计算
    let findings = match store::list_findings(&state.db, 5000).await {
        Ok(findings) => findings,
        Err(e) => {
            tracing::warn!("Failed to fetch findings for scan list: {}", e);
            Vec::new()
        }
    };

    HttpResponse::Ok().json(summarize(statuses, &findings))
}

/// 创建扫描：先在后端启动执行，拿到 scan_id 后写入初始状态行
pub async fn create_scan(
    state: web::Data<AppState>,
    req: web::Json<CreateScanRequest>,
) -> impl Responder {
    tracing::info!("Creating scan for {} ({})", req.company_name, req.domain);

    let scan_id = match state
        .backend
        .start_scan(&req.company_name, &req.domain)
        .await
    {
        Ok(scan_id) => scan_id,
        Err(e) => {
            tracing::error!("Failed to start scan at backend: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to create scan",
                "details": e.to_string()
            }));
        }
    };

    let now = Utc::now();
    let record = ScanStatusRecord {
        scan_id: scan_id.clone(),
        company_name: req.company_name.clone(),
        domain: req.domain.clone(),
        status: ScanStatus::Queued,
        progress: 0,
        current_module: Some("Initializing".to_string()),
        total_modules: SECURITY_MODULES.len() as u32,
        created_at: now,
        last_updated_at: now,
        completed_at: None,
        error_message: None,
    };

    // 扫描已经在后端运行，状态行写入失败只记日志，不让创建失败
    if let Err(e) = store::upsert_scan_status(&state.db, &record).await {
        tracing::error!("Failed to store initial status for scan {}: {}", scan_id, e);
    }

    HttpResponse::Ok().json(serde_json::json!({ "scanId": scan_id }))
}

/// 重跑扫描：后端重新执行，新的状态行继承原扫描的公司与域名
pub async fn rerun_scan(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let scan_id = path.into_inner();

    let original = match store::fetch_scan_status(&state.db, &scan_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Scan not found"
            }));
        }
        Err(e) => {
            tracing::error!("Failed to fetch scan {} for rerun: {}", scan_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to rerun scan",
                "details": e.to_string()
            }));
        }
    };

    let new_scan_id = match state.backend.rerun_scan(&scan_id).await {
        Ok(new_scan_id) => new_scan_id,
        Err(e) => {
            tracing::error!("Failed to rerun scan {} at backend: {}", scan_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to rerun scan",
                "details": e.to_string()
            }));
        }
    };

    let now = Utc::now();
    let record = ScanStatusRecord {
        scan_id: new_scan_id.clone(),
        company_name: original.company_name,
        domain: original.domain,
        status: ScanStatus::Queued,
        progress: 0,
        current_module: Some("Initializing".to_string()),
        total_modules: SECURITY_MODULES.len() as u32,
        created_at: now,
        last_updated_at: now,
        completed_at: None,
        error_message: None,
    };

    // 与创建一致：新扫描已在后端运行，状态行写入失败不让重跑失败
    if let Err(e) = store::upsert_scan_status(&state.db, &record).await {
        tracing::error!(
            "Failed to store initial status for rerun scan {}: {}",
            new_scan_id,
            e
        );
    }

    HttpResponse::Ok().json(serde_json::json!({ "newScanId": new_scan_id }))
}

/// 扫描详情：状态行 + 排序后的发现项 + 按模块聚合的工件状态
pub async fn get_scan(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let scan_id = path.into_inner();

    let record = match store::fetch_scan_status(&state.db, &scan_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Scan not found"
            }));
        }
        Err(e) => {
            tracing::error!("Failed to fetch scan {}: {}", scan_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to fetch scan details",
                "details": e.to_string()
            }));
        }
    };

    let mut findings = match store::fetch_findings(&state.db, &scan_id).await {
        Ok(findings) => findings,
        Err(e) => {
            tracing::error!("Failed to fetch findings for scan {}: {}", scan_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to fetch scan details",
                "details": e.to_string()
            }));
        }
    };
    sort_findings(&mut findings);

    // 工件缺失不影响详情页，模块状态按无工件处理
    let artifacts = match store::fetch_artifacts(&state.db, &scan_id).await {
        Ok(artifacts) => artifacts,
        Err(e) => {
            tracing::warn!("Failed to fetch artifacts for scan {}: {}", scan_id, e);
            Vec::new()
        }
    };

    let details = ScanDetails {
        total_findings: findings.len() as u32,
        max_severity: max_severity(findings.iter().map(|f| f.severity)),
        total_artifacts: artifacts.len() as u32,
        modules: module_statuses(&artifacts),
        findings,
        status: record,
    };

    HttpResponse::Ok().json(details)
}

/// 调和后的扫描状态。
/// 终态直接走存储；非终态刷新后端读数、合并、尽力写回。
pub async fn get_scan_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let scan_id = path.into_inner();

    let stored = match store::fetch_scan_status(&state.db, &scan_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Scan not found"
            }));
        }
        Err(e) => {
            tracing::error!("Failed to fetch status for scan {}: {}", scan_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to fetch scan status",
                "details": e.to_string()
            }));
        }
    };

    // 终态短路：不再访问后端
    if stored.status.is_terminal() {
        return HttpResponse::Ok().json(stored);
    }

    let live = match state.backend.scan_status(&scan_id).await {
        Ok(live) => live,
        Err(e) => {
            // 后端不可达时退回存储中的旧状态
            tracing::warn!("Backend status check failed for scan {}: {}", scan_id, e);
            return HttpResponse::Ok().json(stored);
        }
    };

    let merged = merge_status(&stored, &live, Utc::now());

    // 写回失败不影响本次读取，下个轮询周期会再次尝试
    if let Err(e) = store::upsert_scan_status(&state.db, &merged).await {
        tracing::error!("Failed to persist merged status for scan {}: {}", scan_id, e);
    }

    HttpResponse::Ok().json(merged)
}

/// 工件代理：透传后端的状态码和响应体
pub async fn get_artifacts(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let scan_id = path.into_inner();

    match state.backend.fetch_artifacts(&scan_id).await {
        Ok((code, body)) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY);
            if !status.is_success() {
                tracing::warn!("Backend artifacts call for scan {} returned {}", scan_id, code);
            }
            HttpResponse::build(status)
                .content_type("application/json")
                .body(body)
        }
        Err(e) => {
            tracing::error!("Failed to proxy artifacts for scan {}: {}", scan_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to fetch artifacts",
                "details": e.to_string()
            }))
        }
    }
}

/// 让后端生成报告并按 scan_id 覆盖存储
pub async fn generate_report(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<GenerateReportRequest>,
) -> impl Responder {
    let scan_id = path.into_inner();

    let generated = match state.backend.generate_report(&scan_id, &req.tags).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Failed to generate report for scan {}: {}", scan_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to generate report",
                "details": e.to_string()
            }));
        }
    };

    let report = StoredReport {
        report_id: Uuid::new_v4().to_string(),
        scan_id: scan_id.clone(),
        report_url: generated.report_url,
        content: generated.content,
        summary: generated.summary,
        tags: req.tags.clone(),
        generated_at: Utc::now(),
    };

    // 报告生成是写路径，存储失败要让调用方看到
    if let Err(e) = store::upsert_report(&state.db, &report).await {
        tracing::error!("Failed to store report for scan {}: {}", scan_id, e);
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "Failed to store report",
            "details": e.to_string()
        }));
    }

    HttpResponse::Ok().json(report)
}

/// 查看报告：有外部 URL 时 302 跳转，否则内嵌渲染存储的内容
pub async fn view_report(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let scan_id = path.into_inner();

    let report = match store::latest_report(&state.db, &scan_id).await {
        Ok(Some(report)) => report,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Report not found"
            }));
        }
        Err(e) => {
            tracing::error!("Failed to fetch report for scan {}: {}", scan_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to fetch report",
                "details": e.to_string()
            }));
        }
    };

    if let Some(url) = report.report_url {
        return HttpResponse::Found()
            .append_header((header::LOCATION, url))
            .finish();
    }

    if let Some(content) = report.content {
        return HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(render_report_page(&scan_id, &content));
    }

    HttpResponse::NotFound().json(serde_json::json!({
        "error": "Report URL not available"
    }))
}

fn render_report_page(scan_id: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Security Report - {scan_id}</title>
  <style>
    body {{ font-family: sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; }}
  </style>
</head>
<body>
{content}
</body>
</html>
"#
    )
}
