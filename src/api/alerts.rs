// ==========================================
// 机加工排产系统 - 界面告警文案
// ==========================================
// 职责: 排产/导入/校验失败的用户可见文案
// 红线: 文案前缀为对外契约, 逐字不可改动
// ==========================================

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// 排产失败文案, 无具体错误时回落统一兜底语
pub fn format_scheduling_failure_alert(error: Option<&dyn std::error::Error>) -> String {
    match error {
        Some(err) => format!("Scheduling failed: {}", err),
        None => "Scheduling failed: Unknown scheduling error".to_string(),
    }
}

/// 文件导入失败文案
pub fn format_import_failure_alert(error: Option<&dyn std::error::Error>) -> String {
    match error {
        Some(err) => format!("Failed to import Excel file: {}", err),
        None => "Failed to import Excel file: Unknown import error".to_string(),
    }
}

/// 受保护求值的结果: 失败时 value 为兜底值, error 携带文案
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation<T> {
    pub value: T,
    pub error: Option<String>,
}

/// 包住可选的质量评估步骤, 崩溃只降级不传播
///
/// panic 载荷若非文本, 文案回落 "Unknown evaluation error"。
pub fn safely_evaluate<T, F>(evaluate: F, fallback_value: T) -> Evaluation<T>
where
    F: FnOnce() -> T,
{
    match panic::catch_unwind(AssertUnwindSafe(evaluate)) {
        Ok(value) => Evaluation { value, error: None },
        Err(payload) => Evaluation {
            value: fallback_value,
            error: Some(format!("Verification failed: {}", panic_text(payload.as_ref()))),
        },
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "Unknown evaluation error".to_string()
    }
}
