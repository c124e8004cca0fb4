use actix_web::{web, HttpResponse, Responder};

use crate::state::AppState;
use crate::store;

pub fn configure_report_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_reports));
}

/// 已生成报告的列表，最新的在前
pub async fn list_reports(state: web::Data<AppState>) -> impl Responder {
    match store::list_reports(&state.db, 100).await {
        Ok(reports) => HttpResponse::Ok().json(reports),
        Err(e) => {
            tracing::error!("Failed to list reports: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to fetch reports",
                "details": e.to_string()
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api;
    use crate::state::test_state;
    use actix_web::{test, App};
    use chrono::{TimeZone, Utc};
    use scanhub_core::StoredReport;

    #[actix_web::test]
    async fn empty_store_returns_empty_list() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(api::report_routes()),
        )
        .await;

        let req = test::TestRequest::get().uri("/reports").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[actix_web::test]
    async fn reports_are_listed_newest_first() {
        let state = test_state().await;
        for (id, scan, hour) in [("r1", "s1", 9), ("r2", "s2", 11), ("r3", "s3", 10)] {
            let report = StoredReport {
                report_id: id.into(),
                scan_id: scan.into(),
                report_url: Some(format!("https://reports.example/{scan}")),
                content: None,
                summary: Some("2 findings".into()),
                tags: Vec::new(),
                generated_at: Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap(),
            };
            store::upsert_report(&state.db, &report).await.unwrap();
        }

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(api::report_routes()),
        )
        .await;

        let req = test::TestRequest::get().uri("/reports").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["reportId"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["r2", "r3", "r1"]);
    }
}
