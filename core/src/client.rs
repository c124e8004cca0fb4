// 面板 API 客户端：对 /scans、/reports 路由的类型化封装，供 UI 和工具使用

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{Result, ScanError};
use crate::model::{ScanDetails, ScanStatusRecord, ScanSummary, StoredReport};
use crate::poll::{start_polling, PollHandle, StatusSource};

#[derive(Clone)]
pub struct DashboardClient {
    http: reqwest::Client,
    base_url: String,
}

impl DashboardClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub async fn list_scans(&self) -> Result<Vec<ScanSummary>> {
        self.get_json(&format!("{}/scans", self.base_url)).await
    }

    pub async fn scan_details(&self, scan_id: &str) -> Result<ScanDetails> {
        self.get_json(&format!("{}/scans/{}", self.base_url, scan_id))
            .await
    }

    pub async fn scan_status(&self, scan_id: &str) -> Result<ScanStatusRecord> {
        self.get_json(&format!("{}/scans/{}/status", self.base_url, scan_id))
            .await
    }

    pub async fn list_reports(&self) -> Result<Vec<StoredReport>> {
        self.get_json(&format!("{}/reports", self.base_url)).await
    }

    /// 提交一次扫描，返回面板分配的 scan_id
    pub async fn create_scan(&self, company_name: &str, domain: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/scans", self.base_url))
            .json(&serde_json::json!({
                "companyName": company_name,
                "domain": domain,
            }))
            .send()
            .await
            .map_err(|e| ScanError::BackendUnavailable(e.to_string()))?;

        let resp = check_status(resp)?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ScanError::InvalidResponse(e.to_string()))?;

        body.get("scanId")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or_else(|| ScanError::InvalidResponse("response carried no scanId".into()))
    }

    /// 按原有配置重跑一次扫描，返回新的 scan_id
    pub async fn rerun_scan(&self, scan_id: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/scans/{}/rerun", self.base_url, scan_id))
            .send()
            .await
            .map_err(|e| ScanError::BackendUnavailable(e.to_string()))?;

        let resp = check_status(resp)?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ScanError::InvalidResponse(e.to_string()))?;

        body.get("newScanId")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or_else(|| ScanError::InvalidResponse("response carried no newScanId".into()))
    }

    pub async fn generate_report(&self, scan_id: &str, tags: &[String]) -> Result<StoredReport> {
        let resp = self
            .http
            .post(format!("{}/scans/{}/report", self.base_url, scan_id))
            .json(&serde_json::json!({ "tags": tags }))
            .send()
            .await
            .map_err(|e| ScanError::BackendUnavailable(e.to_string()))?;

        let resp = check_status(resp)?;
        resp.json::<StoredReport>()
            .await
            .map_err(|e| ScanError::InvalidResponse(e.to_string()))
    }

    /// 对单个扫描启动轮询，交给调用方一个可取消的句柄
    pub fn poll_status<F>(
        self: Arc<Self>,
        scan_id: impl Into<String>,
        interval: Duration,
        on_update: F,
    ) -> PollHandle
    where
        F: FnMut(ScanStatusRecord) + Send + 'static,
    {
        start_polling(self, scan_id, interval, on_update)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::BackendUnavailable(e.to_string()))?;

        let resp = check_status(resp)?;
        resp.json::<T>()
            .await
            .map_err(|e| ScanError::InvalidResponse(e.to_string()))
    }
}

fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    match resp.status() {
        status if status.is_success() => Ok(resp),
        StatusCode::NOT_FOUND => Err(ScanError::NotFound(resp.url().path().to_string())),
        status => Err(ScanError::BackendUnavailable(format!(
            "dashboard returned {}",
            status
        ))),
    }
}

#[async_trait]
impl StatusSource for DashboardClient {
    async fn fetch_status(&self, scan_id: &str) -> Result<ScanStatusRecord> {
        self.scan_status(scan_id).await
    }
}
