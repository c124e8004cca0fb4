// 状态合并：把存储的状态行和后端实时读数合成一条最新记录

use chrono::{DateTime, Utc};

use crate::backend::{map_backend_state, BackendStatus};
use crate::model::ScanStatusRecord;

/// 合并优先级规则：
/// - 存储记录已是终态时原样返回，后端的陈旧读数不能使其回退
/// - status / progress / current_module / error_message 取自后端读数
/// - company_name / domain / created_at 以存储记录为准，后端对它们不具权威性
/// - 首次进入终态时写入 completed_at
pub fn merge_status(
    stored: &ScanStatusRecord,
    live: &BackendStatus,
    now: DateTime<Utc>,
) -> ScanStatusRecord {
    if stored.status.is_terminal() {
        return stored.clone();
    }

    let status = map_backend_state(&live.state);

    // 后端未上报进度时保留已有值，进度预期单调不减
    let progress = live
        .progress
        .unwrap_or(i64::from(stored.progress))
        .clamp(0, 100) as u8;

    let error_message = if status == crate::model::ScanStatus::Failed {
        live.error
            .clone()
            .or_else(|| Some("scan failed".to_string()))
    } else {
        None
    };

    let completed_at = if status.is_terminal() {
        stored.completed_at.or(Some(now))
    } else {
        None
    };

    ScanStatusRecord {
        scan_id: stored.scan_id.clone(),
        company_name: stored.company_name.clone(),
        domain: stored.domain.clone(),
        status,
        progress,
        current_module: live.current_module.clone(),
        total_modules: live
            .total_modules
            .map(|n| n.max(0) as u32)
            .unwrap_or(stored.total_modules),
        created_at: stored.created_at,
        last_updated_at: now,
        completed_at,
        error_message,
    }
}
