// 结果聚合：列表摘要、发现项排序、按模块的执行状态

use std::collections::HashMap;

use crate::model::{
    max_severity, ArtifactRecord, FindingRecord, ModuleState, ModuleStatus, ScanStatusRecord,
    ScanSummary, SECURITY_MODULES,
};

/// 把状态行和发现项合成列表视图。
/// 输入的状态行已按 created_at 降序排好，输出保持原有顺序。
pub fn summarize(statuses: Vec<ScanStatusRecord>, findings: &[FindingRecord]) -> Vec<ScanSummary> {
    let mut groups: HashMap<&str, Vec<&FindingRecord>> = HashMap::new();
    for finding in findings {
        groups
            .entry(finding.scan_id.as_str())
            .or_default()
            .push(finding);
    }

    statuses
        .into_iter()
        .map(|record| {
            let group = groups
                .get(record.scan_id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            ScanSummary {
                total_findings: group.len() as u32,
                max_severity: max_severity(group.iter().map(|f| f.severity)),
                scan_id: record.scan_id,
                company_name: record.company_name,
                domain: record.domain,
                status: record.status,
                progress: record.progress,
                current_module: record.current_module,
                created_at: record.created_at,
                completed_at: record.completed_at,
            }
        })
        .collect()
}

/// 严重性降序，同级按 created_at 降序
pub fn sort_findings(findings: &mut [FindingRecord]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(b.created_at.cmp(&a.created_at))
    });
}

/// 按模块名聚合工件得出每个模块的执行状态。
/// 无工件的模块报告 pending；出现过错误工件的模块报告 failed，
/// failed 覆盖 completed，completed 覆盖 pending。
pub fn module_statuses(artifacts: &[ArtifactRecord]) -> Vec<ModuleStatus> {
    let mut statuses: Vec<ModuleStatus> = SECURITY_MODULES
        .iter()
        .map(|name| module_status(name, artifacts))
        .collect();

    // 清单之外的模块名也照常上报，按首次出现的顺序追加
    for artifact in artifacts {
        if !statuses.iter().any(|m| m.name == artifact.module) {
            statuses.push(module_status(&artifact.module, artifacts));
        }
    }

    statuses
}

fn module_status(name: &str, artifacts: &[ArtifactRecord]) -> ModuleStatus {
    let group: Vec<&ArtifactRecord> = artifacts.iter().filter(|a| a.module == name).collect();
    let status = if group.is_empty() {
        ModuleState::Pending
    } else if group.iter().any(|a| a.is_error) {
        ModuleState::Failed
    } else {
        ModuleState::Completed
    };
    ModuleStatus {
        name: name.to_string(),
        status,
        artifacts: group.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScanStatus, Severity};
    use chrono::{TimeZone, Utc};

    fn status_row(scan_id: &str, hour: u32) -> ScanStatusRecord {
        ScanStatusRecord {
            scan_id: scan_id.into(),
            company_name: "Acme".into(),
            domain: "acme.com".into(),
            status: ScanStatus::Completed,
            progress: 100,
            current_module: None,
            total_modules: 11,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap(),
            last_updated_at: Utc.with_ymd_and_hms(2025, 6, 1, hour, 30, 0).unwrap(),
            completed_at: None,
            error_message: None,
        }
    }

    fn finding(scan_id: &str, severity: Severity, minute: u32) -> FindingRecord {
        FindingRecord {
            id: format!("f-{scan_id}-{minute}"),
            scan_id: scan_id.into(),
            finding_type: "tls_weak_cipher".into(),
            severity,
            description: "weak cipher suite offered".into(),
            recommendation: "disable legacy cipher suites".into(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap(),
        }
    }

    fn artifact(scan_id: &str, module: &str, is_error: bool) -> ArtifactRecord {
        ArtifactRecord {
            id: format!("a-{module}-{is_error}"),
            scan_id: scan_id.into(),
            module: module.into(),
            artifact_type: "raw".into(),
            val_text: "…".into(),
            severity: Severity::Info,
            is_error,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn summary_groups_findings_by_scan() {
        let statuses = vec![status_row("s1", 10), status_row("s2", 9)];
        let findings = vec![
            finding("s1", Severity::Medium, 1),
            finding("s1", Severity::Critical, 2),
            finding("s2", Severity::Low, 3),
        ];

        let summaries = summarize(statuses, &findings);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].scan_id, "s1");
        assert_eq!(summaries[0].total_findings, 2);
        assert_eq!(summaries[0].max_severity, Severity::Critical);
        assert_eq!(summaries[1].total_findings, 1);
        assert_eq!(summaries[1].max_severity, Severity::Low);
    }

    #[test]
    fn summary_without_findings_reports_info() {
        let summaries = summarize(vec![status_row("s1", 10)], &[]);
        assert_eq!(summaries[0].total_findings, 0);
        assert_eq!(summaries[0].max_severity, Severity::Info);
    }

    #[test]
    fn findings_sort_by_severity_then_recency() {
        let mut findings = vec![
            finding("s1", Severity::Low, 5),
            finding("s1", Severity::Critical, 1),
            finding("s1", Severity::High, 2),
            finding("s1", Severity::High, 8),
        ];
        sort_findings(&mut findings);

        let order: Vec<Severity> = findings.iter().map(|f| f.severity).collect();
        assert_eq!(
            order,
            [
                Severity::Critical,
                Severity::High,
                Severity::High,
                Severity::Low
            ]
        );
        // 同级 HIGH 之间新的在前
        assert!(findings[1].created_at > findings[2].created_at);
    }

    #[test]
    fn modules_without_artifacts_are_pending() {
        let statuses = module_statuses(&[]);
        assert_eq!(statuses.len(), SECURITY_MODULES.len());
        assert!(statuses.iter().all(|m| m.status == ModuleState::Pending));
    }

    #[test]
    fn error_artifact_marks_module_failed() {
        let artifacts = vec![
            artifact("s1", "nuclei", false),
            artifact("s1", "nuclei", true),
            artifact("s1", "tls_scan", false),
        ];
        let statuses = module_statuses(&artifacts);

        let nuclei = statuses.iter().find(|m| m.name == "nuclei").unwrap();
        assert_eq!(nuclei.status, ModuleState::Failed);
        assert_eq!(nuclei.artifacts, 2);

        let tls = statuses.iter().find(|m| m.name == "tls_scan").unwrap();
        assert_eq!(tls.status, ModuleState::Completed);

        let shodan = statuses.iter().find(|m| m.name == "shodan").unwrap();
        assert_eq!(shodan.status, ModuleState::Pending);
    }

    #[test]
    fn unlisted_module_is_still_reported() {
        let artifacts = vec![artifact("s1", "custom_probe", false)];
        let statuses = module_statuses(&artifacts);
        let custom = statuses.iter().find(|m| m.name == "custom_probe").unwrap();
        assert_eq!(custom.status, ModuleState::Completed);
    }
}
