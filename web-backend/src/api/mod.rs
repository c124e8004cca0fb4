use actix_web::{web, Scope};

pub mod reports;
pub mod scans;

pub fn scan_routes() -> Scope {
    web::scope("/scans").configure(scans::configure_scan_routes)
}

pub fn report_routes() -> Scope {
    web::scope("/reports").configure(reports::configure_report_routes)
}
