// 数据模型：扫描状态、发现项、工件与派生视图

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 扫描器执行的安全模块清单
pub const SECURITY_MODULES: &[&str] = &[
    "spiderfoot",
    "dns_twist",
    "document_exposure",
    "shodan",
    "db_port_scan",
    "endpoint_discovery",
    "tls_scan",
    "nuclei",
    "rate_limit_scan",
    "spf_dmarc",
    "trufflehog",
];

/// 严重性等级，INFO 最低，CRITICAL 最高
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// 未知字符串按 INFO 处理
    pub fn from_db(value: &str) -> Self {
        match value {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Info,
        }
    }
}

/// 所有关联发现项中的最高严重性，空集合返回 INFO
pub fn max_severity<I>(severities: I) -> Severity
where
    I: IntoIterator<Item = Severity>,
{
    severities.into_iter().max().unwrap_or(Severity::Info)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Queued,
    Running,
    Processing,
    Completed,
    Failed,
}

impl ScanStatus {
    /// completed / failed 为终态，到达后不再变化
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Queued => "queued",
            ScanStatus::Running => "running",
            ScanStatus::Processing => "processing",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    /// 未知字符串按 running 处理，绝不当作终态
    pub fn from_db(value: &str) -> Self {
        match value {
            "queued" => ScanStatus::Queued,
            "running" => ScanStatus::Running,
            "processing" => ScanStatus::Processing,
            "completed" => ScanStatus::Completed,
            "failed" => ScanStatus::Failed,
            _ => ScanStatus::Running,
        }
    }
}

/// scan_status 表的一行，扫描的当前状态
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatusRecord {
    pub scan_id: String,
    pub company_name: String,
    pub domain: String,
    pub status: ScanStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_module: Option<String>,
    pub total_modules: u32,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// 单个安全发现，由扫描后端写入，创建后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingRecord {
    pub id: String,
    pub scan_id: String,
    #[serde(rename = "type")]
    pub finding_type: String,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
    pub created_at: DateTime<Utc>,
}

/// 扫描过程中采集的原始工件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    pub id: String,
    pub scan_id: String,
    pub module: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub val_text: String,
    pub severity: Severity,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

/// 列表视图条目，由状态行和发现项聚合而来
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub scan_id: String,
    pub company_name: String,
    pub domain: String,
    pub status: ScanStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_module: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_findings: u32,
    pub max_severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Pending,
    Completed,
    Failed,
}

/// 按模块聚合的执行状态
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStatus {
    pub name: String,
    pub status: ModuleState,
    pub artifacts: u32,
}

/// 详情视图：状态字段 + 排序后的发现项 + 模块状态
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanDetails {
    #[serde(flatten)]
    pub status: ScanStatusRecord,
    pub findings: Vec<FindingRecord>,
    pub modules: Vec<ModuleStatus>,
    pub total_findings: u32,
    pub max_severity: Severity,
    pub total_artifacts: u32,
}

/// 已生成的报告，按 scan_id 覆盖存储
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    pub report_id: String,
    pub scan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
    #[serde(default, rename = "report", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub generated_at: DateTime<Utc>,
}
