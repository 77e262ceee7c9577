// ==========================================
// 机加工排产系统 - 逐件视图实体
// ==========================================
// 职责: 逐件时刻的宽松输入行、渲染行、核验问题的结构定义
// 红线: 宽松输入任何字段都可缺失; 归一化口径由使用方各自实现
// ==========================================

use crate::domain::lenient;
use crate::domain::schedule::PieceRow;
use crate::domain::types::IssueSeverity;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 宽松时刻行 (外部回灌/核验入口)
// ==========================================

/// 来源不可控的逐件时刻行, 新旧字段名并存
///
/// 同义字段的取值优先级: part > part_number, batch > batch_id,
/// operation_seq > operation, person > operator, run_start > start。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTimelineRow {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub part: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub part_number: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub batch: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub batch_id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub piece: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub operation: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub operation_seq: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub machine: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub person: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub operator: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub handle_mode: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub start: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub run_start: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub end: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub run_end: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
}

impl From<&PieceRow> for RawTimelineRow {
    fn from(row: &PieceRow) -> Self {
        const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
        RawTimelineRow {
            part_number: Some(row.part_number.clone()),
            batch_id: Some(row.batch_id.clone()),
            piece: Some(row.piece as f64),
            operation_seq: Some(row.operation_seq as f64),
            machine: Some(row.machine.clone()),
            person: Some(row.person.clone()),
            handle_mode: Some(row.handle_mode.to_string()),
            run_start: Some(row.run_start.format(FORMAT).to_string()),
            run_end: Some(row.run_end.format(FORMAT).to_string()),
            status: Some(row.status.to_string()),
            ..RawTimelineRow::default()
        }
    }
}

// ==========================================
// 逐件渲染行
// ==========================================

/// 渲染/导出用的逐件行, id 形如 "{part}-{batch}-op{seq}-p{piece}"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceFlowRow {
    pub id: String,
    pub part: String,
    pub batch: String,
    pub piece: u32,
    pub operation_seq: u32,
    pub machine: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: String,
}

/// 构建结果: 精确时刻(逐件仿真回放)或合成均分(仅有批次行时)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceFlowBuildResult {
    pub rows: Vec<PieceFlowRow>,
    pub is_approximate: bool,
}

/// 逐件视图筛选条件, None/缺省即不过滤
#[derive(Debug, Clone, Default)]
pub struct PieceFlowFilter {
    /// 件号, "ALL" 或空等价于不过滤
    pub part: Option<String>,
    pub piece_from: Option<u32>,
    pub piece_to: Option<u32>,
    pub operation_seq: Option<u32>,
    pub machine: Option<String>,
    pub batch: Option<String>,
}

// ==========================================
// 核验问题
// ==========================================

/// 核验问题码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationCode {
    MachineOverlap,
    PrecedenceViolation,
    PersonSingleModeOverlap,
    PersonRunCapacityExceeded,
}

impl fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            VerificationCode::MachineOverlap => "MACHINE_OVERLAP",
            VerificationCode::PrecedenceViolation => "PRECEDENCE_VIOLATION",
            VerificationCode::PersonSingleModeOverlap => "PERSON_SINGLE_MODE_OVERLAP",
            VerificationCode::PersonRunCapacityExceeded => "PERSON_RUN_CAPACITY_EXCEEDED",
        };
        write!(f, "{}", text)
    }
}

/// 一条核验问题, 时间戳为毫秒
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationIssue {
    pub id: String,
    pub code: VerificationCode,
    pub severity: IssueSeverity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_ts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_ts: Option<i64>,
}

/// 核验总报告, 任一 critical 问题即判不通过
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub is_valid: bool,
    pub issues: Vec<VerificationIssue>,
}
