// ScanHub Core Library
// 核心功能库，包含数据模型、状态合并、结果聚合、轮询器和后端客户端

mod aggregate;
mod backend;
mod client;
mod model;
mod poll;
mod reconcile;

// 重新导出常用类型
pub use aggregate::{module_statuses, sort_findings, summarize};
pub use backend::{map_backend_state, BackendClient, BackendReport, BackendStatus};
pub use client::DashboardClient;
pub use model::{
    max_severity, ArtifactRecord, FindingRecord, ModuleState, ModuleStatus, ScanDetails,
    ScanStatus, ScanStatusRecord, ScanSummary, Severity, StoredReport, SECURITY_MODULES,
};
pub use poll::{start_polling, PollHandle, StatusSource};
pub use reconcile::merge_status;

pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum ScanError {
        #[error("scan not found: {0}")]
        NotFound(String),

        #[error("scanner backend unavailable: {0}")]
        BackendUnavailable(String),

        #[error("invalid backend response: {0}")]
        InvalidResponse(String),

        #[error("store error: {0}")]
        Store(String),
    }

    pub type Result<T> = std::result::Result<T, ScanError>;
}
