// ==========================================
// 机加工排产系统 - 导出计划助手
// ==========================================
// 职责: 工作簿 sheet 规划与 PDF 分页切片(纯计算)
// 红线: 只规划不渲染, xlsx/PDF 的落盘由外部渲染器负责
// ==========================================

use crate::domain::types::ProfileMode;

pub const SHEET_OUTPUT: &str = "Output";
pub const SHEET_SETUP_OUTPUT: &str = "Setup_output";
pub const SHEET_OUTPUT_2: &str = "Output_2";
pub const SHEET_CLIENT_OUT: &str = "Client_Out";
pub const SHEET_FIXED_REPORT: &str = "Fixed_Report";

/// 按档案模式给出工作簿 sheet 清单
///
/// Basic 模式不含调机报表 Setup_output, 其余 sheet 顺序不变。
pub fn plan_workbook_sheets(mode: ProfileMode) -> Vec<&'static str> {
    match mode {
        ProfileMode::Advanced => vec![
            SHEET_OUTPUT,
            SHEET_SETUP_OUTPUT,
            SHEET_OUTPUT_2,
            SHEET_CLIENT_OUT,
            SHEET_FIXED_REPORT,
        ],
        ProfileMode::Basic => vec![
            SHEET_OUTPUT,
            SHEET_OUTPUT_2,
            SHEET_CLIENT_OUT,
            SHEET_FIXED_REPORT,
        ],
    }
}

/// 总像素高度 → 每页切片高度清单
///
/// 贪心按页高切, 末页取余量; 非法入参返回空清单。
pub fn compute_pdf_page_slices(total_height_px: f64, page_height_px: f64) -> Vec<u32> {
    if !total_height_px.is_finite() || !page_height_px.is_finite() {
        return Vec::new();
    }
    if total_height_px <= 0.0 || page_height_px <= 0.0 {
        return Vec::new();
    }

    let mut slices = Vec::new();
    let mut remaining = total_height_px.floor() as u64;
    let step = (page_height_px.floor() as u64).max(1);

    while remaining > 0 {
        let next = step.min(remaining);
        slices.push(next as u32);
        remaining -= next;
    }

    slices
}

/// 画布尺寸 + 目标纸面内容尺寸(毫米) → 每页切片高度清单
///
/// 页高由像素毫米比推出: px_per_mm = canvas_width_px / content_width_mm。
pub fn compute_pdf_canvas_slices(
    canvas_width_px: f64,
    canvas_height_px: f64,
    content_width_mm: f64,
    content_height_mm: f64,
) -> Vec<u32> {
    let inputs = [
        canvas_width_px,
        canvas_height_px,
        content_width_mm,
        content_height_mm,
    ];
    if inputs.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Vec::new();
    }

    let px_per_mm = canvas_width_px / content_width_mm;
    let page_height_px = (content_height_mm * px_per_mm).floor().max(1.0);
    compute_pdf_page_slices(canvas_height_px, page_height_px)
}
