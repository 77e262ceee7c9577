// ==========================================
// 机加工排产系统 - API 层
// ==========================================
// 职责: 界面侧辅助(告警文案/导出计划), 供宿主应用调用
// ==========================================

pub mod alerts;
pub mod export_plan;

// 重导出核心类型
pub use alerts::{
    format_import_failure_alert, format_scheduling_failure_alert, safely_evaluate, Evaluation,
};
pub use export_plan::{compute_pdf_canvas_slices, compute_pdf_page_slices, plan_workbook_sheets};
