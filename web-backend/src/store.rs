// 状态库访问层：scan_status 的读写与 findings / artifacts / 报告的查询

use chrono::{DateTime, Utc};
use scanhub_core::error::{Result, ScanError};
use scanhub_core::{
    ArtifactRecord, FindingRecord, ScanStatus, ScanStatusRecord, Severity, StoredReport,
};
use sqlx::{FromRow, Pool, Sqlite};

#[derive(FromRow)]
struct ScanStatusRow {
    scan_id: String,
    company_name: String,
    domain: String,
    status: String,
    progress: i64,
    current_module: Option<String>,
    total_modules: i64,
    created_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

impl From<ScanStatusRow> for ScanStatusRecord {
    fn from(row: ScanStatusRow) -> Self {
        ScanStatusRecord {
            scan_id: row.scan_id,
            company_name: row.company_name,
            domain: row.domain,
            status: ScanStatus::from_db(&row.status),
            progress: row.progress.clamp(0, 100) as u8,
            current_module: row.current_module,
            total_modules: row.total_modules.max(0) as u32,
            created_at: row.created_at,
            last_updated_at: row.last_updated_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
        }
    }
}

#[derive(FromRow)]
struct FindingRow {
    id: String,
    scan_id: String,
    finding_type: String,
    severity: String,
    description: String,
    recommendation: String,
    created_at: DateTime<Utc>,
}

impl From<FindingRow> for FindingRecord {
    fn from(row: FindingRow) -> Self {
        FindingRecord {
            id: row.id,
            scan_id: row.scan_id,
            finding_type: row.finding_type,
            severity: Severity::from_db(&row.severity),
            description: row.description,
            recommendation: row.recommendation,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ArtifactRow {
    id: String,
    scan_id: String,
    module: String,
    artifact_type: String,
    val_text: String,
    severity: String,
    is_error: bool,
    created_at: DateTime<Utc>,
}

impl From<ArtifactRow> for ArtifactRecord {
    fn from(row: ArtifactRow) -> Self {
        ArtifactRecord {
            id: row.id,
            scan_id: row.scan_id,
            module: row.module,
            artifact_type: row.artifact_type,
            val_text: row.val_text,
            severity: Severity::from_db(&row.severity),
            is_error: row.is_error,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ReportRow {
    report_id: String,
    scan_id: String,
    report_url: Option<String>,
    content: Option<String>,
    summary: Option<String>,
    tags: String,
    generated_at: DateTime<Utc>,
}

impl From<ReportRow> for StoredReport {
    fn from(row: ReportRow) -> Self {
        StoredReport {
            report_id: row.report_id,
            scan_id: row.scan_id,
            report_url: row.report_url,
            content: row.content,
            summary: row.summary,
            tags: serde_json::from_str(&row.tags).unwrap_or_default(),
            generated_at: row.generated_at,
        }
    }
}

fn store_err(err: sqlx::Error) -> ScanError {
    ScanError::Store(err.to_string())
}

pub async fn fetch_scan_status(
    db: &Pool<Sqlite>,
    scan_id: &str,
) -> Result<Option<ScanStatusRecord>> {
    let row = sqlx::query_as::<_, ScanStatusRow>(
        "SELECT scan_id, company_name, domain, status, progress, current_module,
                total_modules, created_at, last_updated_at, completed_at, error_message
         FROM scan_status
         WHERE scan_id = ?",
    )
    .bind(scan_id)
    .fetch_optional(db)
    .await
    .map_err(store_err)?;

    Ok(row.map(ScanStatusRecord::from))
}

pub async fn list_scan_statuses(db: &Pool<Sqlite>, limit: i64) -> Result<Vec<ScanStatusRecord>> {
    let rows = sqlx::query_as::<_, ScanStatusRow>(
        "SELECT scan_id, company_name, domain, status, progress, current_module,
                total_modules, created_at, last_updated_at, completed_at, error_message
         FROM scan_status
         ORDER BY created_at DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db)
    .await
    .map_err(store_err)?;

    Ok(rows.into_iter().map(ScanStatusRecord::from).collect())
}

/// 按 scan_id 覆盖写入，最后写入者生效
pub async fn upsert_scan_status(db: &Pool<Sqlite>, record: &ScanStatusRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO scan_status (scan_id, company_name, domain, status, progress,
                                  current_module, total_modules, created_at,
                                  last_updated_at, completed_at, error_message)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(scan_id) DO UPDATE SET
             status = excluded.status,
             progress = excluded.progress,
             current_module = excluded.current_module,
             total_modules = excluded.total_modules,
             last_updated_at = excluded.last_updated_at,
             completed_at = excluded.completed_at,
             error_message = excluded.error_message",
    )
    .bind(&record.scan_id)
    .bind(&record.company_name)
    .bind(&record.domain)
    .bind(record.status.as_str())
    .bind(i64::from(record.progress))
    .bind(&record.current_module)
    .bind(i64::from(record.total_modules))
    .bind(record.created_at)
    .bind(record.last_updated_at)
    .bind(record.completed_at)
    .bind(&record.error_message)
    .execute(db)
    .await
    .map_err(store_err)?;

    Ok(())
}

pub async fn fetch_findings(db: &Pool<Sqlite>, scan_id: &str) -> Result<Vec<FindingRecord>> {
    let rows = sqlx::query_as::<_, FindingRow>(
        "SELECT id, scan_id, finding_type, severity, description, recommendation, created_at
         FROM findings
         WHERE scan_id = ?
         ORDER BY created_at DESC",
    )
    .bind(scan_id)
    .fetch_all(db)
    .await
    .map_err(store_err)?;

    Ok(rows.into_iter().map(FindingRecord::from).collect())
}

/// 列表视图用的有界页，聚合在内存中完成
pub async fn list_findings(db: &Pool<Sqlite>, limit: i64) -> Result<Vec<FindingRecord>> {
    let rows = sqlx::query_as::<_, FindingRow>(
        "SELECT id, scan_id, finding_type, severity, description, recommendation, created_at
         FROM findings
         ORDER BY created_at DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db)
    .await
    .map_err(store_err)?;

    Ok(rows.into_iter().map(FindingRecord::from).collect())
}

pub async fn fetch_artifacts(db: &Pool<Sqlite>, scan_id: &str) -> Result<Vec<ArtifactRecord>> {
    let rows = sqlx::query_as::<_, ArtifactRow>(
        "SELECT id, scan_id, module, artifact_type, val_text, severity, is_error, created_at
         FROM artifacts
         WHERE scan_id = ?
         ORDER BY created_at ASC",
    )
    .bind(scan_id)
    .fetch_all(db)
    .await
    .map_err(store_err)?;

    Ok(rows.into_iter().map(ArtifactRecord::from).collect())
}

/// 一个扫描只保留最近一次生成的报告
pub async fn upsert_report(db: &Pool<Sqlite>, report: &StoredReport) -> Result<()> {
    let tags = serde_json::to_string(&report.tags)
        .map_err(|e| ScanError::Store(format!("failed to encode tags: {}", e)))?;

    sqlx::query(
        "INSERT INTO security_reports (report_id, scan_id, report_url, content,
                                       summary, tags, generated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(scan_id) DO UPDATE SET
             report_id = excluded.report_id,
             report_url = excluded.report_url,
             content = excluded.content,
             summary = excluded.summary,
             tags = excluded.tags,
             generated_at = excluded.generated_at",
    )
    .bind(&report.report_id)
    .bind(&report.scan_id)
    .bind(&report.report_url)
    .bind(&report.content)
    .bind(&report.summary)
    .bind(tags)
    .bind(report.generated_at)
    .execute(db)
    .await
    .map_err(store_err)?;

    Ok(())
}

pub async fn latest_report(db: &Pool<Sqlite>, scan_id: &str) -> Result<Option<StoredReport>> {
    let row = sqlx::query_as::<_, ReportRow>(
        "SELECT report_id, scan_id, report_url, content, summary, tags, generated_at
         FROM security_reports
         WHERE scan_id = ?
         ORDER BY generated_at DESC
         LIMIT 1",
    )
    .bind(scan_id)
    .fetch_optional(db)
    .await
    .map_err(store_err)?;

    Ok(row.map(StoredReport::from))
}

pub async fn list_reports(db: &Pool<Sqlite>, limit: i64) -> Result<Vec<StoredReport>> {
    let rows = sqlx::query_as::<_, ReportRow>(
        "SELECT report_id, scan_id, report_url, content, summary, tags, generated_at
         FROM security_reports
         ORDER BY generated_at DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db)
    .await
    .map_err(store_err)?;

    Ok(rows.into_iter().map(StoredReport::from).collect())
}
