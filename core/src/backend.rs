// 扫描后端客户端：触发扫描、查询实时状态、拉取工件与报告

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, ScanError};
use crate::model::ScanStatus;

/// 把后端的状态词表映射到本地词表。
/// 未识别的状态一律乐观地当作 running，绝不映射为终态。
pub fn map_backend_state(state: &str) -> ScanStatus {
    match state.to_ascii_lowercase().as_str() {
        "queued" => ScanStatus::Queued,
        "running" | "processing" => ScanStatus::Running,
        "completed" | "done" => ScanStatus::Completed,
        "failed" | "error" => ScanStatus::Failed,
        _ => ScanStatus::Running,
    }
}

/// 后端 /scan/{id}/status 的响应。
/// 字段命名不受我们控制，用 alias 宽松兼容。
#[derive(Debug, Clone, Deserialize)]
pub struct BackendStatus {
    #[serde(alias = "status")]
    pub state: String,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default, alias = "currentModule")]
    pub current_module: Option<String>,
    #[serde(default, alias = "totalModules")]
    pub total_modules: Option<i64>,
    #[serde(default, alias = "message", alias = "errorMessage")]
    pub error: Option<String>,
}

/// 后端生成的报告
#[derive(Debug, Clone)]
pub struct BackendReport {
    pub report_url: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
}

/// 扫描后端的 HTTP 客户端。
/// base_url 与超时在构造时注入，调用点不读环境变量。
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 启动一次扫描，返回后端分配的 scan_id
    pub async fn start_scan(&self, company_name: &str, domain: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/scan", self.base_url))
            .json(&serde_json::json!({
                "companyName": company_name,
                "domain": domain,
            }))
            .send()
            .await
            .map_err(unavailable)?;

        if !resp.status().is_success() {
            return Err(ScanError::BackendUnavailable(format!(
                "scan start returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ScanError::InvalidResponse(e.to_string()))?;

        ["scanId", "scan_id", "id"]
            .iter()
            .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
            .map(str::to_owned)
            .ok_or_else(|| {
                ScanError::InvalidResponse("backend returned no scan identifier".into())
            })
    }

    /// 对已有扫描触发重新执行，返回新分配的 scan_id
    pub async fn rerun_scan(&self, scan_id: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/scan/{}/rerun", self.base_url, scan_id))
            .send()
            .await
            .map_err(unavailable)?;

        if !resp.status().is_success() {
            return Err(ScanError::BackendUnavailable(format!(
                "scan rerun returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ScanError::InvalidResponse(e.to_string()))?;

        ["newScanId", "new_scan_id", "scanId", "scan_id", "id"]
            .iter()
            .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
            .map(str::to_owned)
            .ok_or_else(|| {
                ScanError::InvalidResponse("backend returned no scan identifier".into())
            })
    }

    /// 查询一次扫描的实时状态
    pub async fn scan_status(&self, scan_id: &str) -> Result<BackendStatus> {
        let resp = self
            .http
            .get(format!("{}/scan/{}/status", self.base_url, scan_id))
            .send()
            .await
            .map_err(unavailable)?;

        if !resp.status().is_success() {
            return Err(ScanError::BackendUnavailable(format!(
                "status query returned {}",
                resp.status()
            )));
        }

        resp.json::<BackendStatus>()
            .await
            .map_err(|e| ScanError::InvalidResponse(e.to_string()))
    }

    /// 原样取回工件响应（状态码 + 响应体），供代理端点透传
    pub async fn fetch_artifacts(&self, scan_id: &str) -> Result<(u16, String)> {
        let resp = self
            .http
            .get(format!("{}/scan/{}/artifacts", self.base_url, scan_id))
            .send()
            .await
            .map_err(unavailable)?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(unavailable)?;
        Ok((status, body))
    }

    /// 请求后端生成报告
    pub async fn generate_report(&self, scan_id: &str, tags: &[String]) -> Result<BackendReport> {
        let mut req = self
            .http
            .get(format!("{}/scan/{}/report", self.base_url, scan_id));
        if !tags.is_empty() {
            req = req.query(&[("tags", tags.join(","))]);
        }

        let resp = req.send().await.map_err(unavailable)?;

        if !resp.status().is_success() {
            return Err(ScanError::BackendUnavailable(format!(
                "report generation returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ScanError::InvalidResponse(e.to_string()))?;

        let report_url = pick_str(&body, &["reportUrl", "report_url", "url"]);
        let content = pick_str(&body, &["report", "html", "content"]);
        let summary = pick_str(&body, &["summary"]);

        if report_url.is_none() && content.is_none() {
            return Err(ScanError::InvalidResponse(
                "backend returned neither report URL nor content".into(),
            ));
        }

        Ok(BackendReport {
            report_url,
            content,
            summary,
        })
    }
}

fn pick_str(body: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .map(str::to_owned)
}

fn unavailable(err: reqwest::Error) -> ScanError {
    ScanError::BackendUnavailable(err.to_string())
}
